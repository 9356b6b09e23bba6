//! Context values and scoping
//!
//! The global context is one JSON object owned by the session; local
//! context is addressed as a path of resolved names from that root rather
//! than a shared mutable reference. Two rules reproduce the original
//! shared-reference behavior when a scope on the path is a sequence (an
//! ancestor iterating multiple rows):
//!
//! - lookups step into element 0 of a sequence;
//! - installations fan out into every element of every sequence they cross.
//!
//! The one exception is the default empty mapping installed when a region
//! fetched nothing and inherited nothing: in the sequence case it is
//! written to element 0 only.

use serde_json::{Map, Value};
use url::Url;

/// A JSON object.
pub type Object = Map<String, Value>;

/// Tagged shape of a resolved region value. After resolution a region's
/// value is never absent; the resolver defaults to an empty mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Scalar(Value),
    Mapping(Object),
    Sequence(Vec<Value>),
}

impl Resolved {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Resolved::Sequence(items),
            Value::Object(map) => Resolved::Mapping(map),
            other => Resolved::Scalar(other),
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Resolved::Sequence(_))
    }

    /// Elements for per-element expansion; non-sequences are
    /// singleton-wrapped.
    pub fn into_elements(self) -> Vec<Value> {
        match self {
            Resolved::Sequence(items) => items,
            Resolved::Mapping(map) => vec![Value::Object(map)],
            Resolved::Scalar(v) => vec![v],
        }
    }
}

/// Path of resolved names from the global root to a region's local scope.
/// The empty path is the global context itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPath(Vec<String>);

impl ContextPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        ContextPath(segments)
    }

    /// Stable key for per-pass bookkeeping.
    pub(crate) fn key(&self) -> String {
        self.0.join(".")
    }

    fn segments(&self) -> &[String] {
        &self.0
    }
}

/// Seed a global context from the page URL: `href` bound to the full URL,
/// then each decoded query parameter. Values shaped like a collection or
/// mapping literal are parsed as JSON; anything else stays a string.
pub fn seed_global(page_url: &str) -> Object {
    let mut global = Object::new();
    let url = match Url::parse(page_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(url = %page_url, error = %e, "unparseable page url, starting with empty context");
            return global;
        }
    };
    global.insert("href".to_string(), Value::String(url.as_str().to_string()));
    for (key, value) in url.query_pairs() {
        let value = value.to_string();
        let parsed = if looks_like_json_literal(&value) {
            serde_json::from_str(&value).unwrap_or(Value::String(value))
        } else {
            Value::String(value)
        };
        global.insert(key.to_string(), parsed);
    }
    global
}

fn looks_like_json_literal(s: &str) -> bool {
    (s.starts_with('[') && s.ends_with(']')) || (s.starts_with('{') && s.ends_with('}'))
}

/// Read the value addressed by `path`. Crossing a sequence steps into
/// element 0.
pub fn lookup<'a>(global: &'a Value, path: &ContextPath) -> Option<&'a Value> {
    let mut current = global;
    for segment in path.segments() {
        while let Value::Array(items) = current {
            current = items.first()?;
        }
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Install `value` under `name` in the scope addressed by `path`. Every
/// sequence crossed on the way (including the scope itself) fans the
/// installation out into each of its elements.
pub fn install(global: &mut Value, path: &ContextPath, name: &str, value: &Value) {
    fn descend(current: &mut Value, segments: &[String], name: &str, value: &Value) {
        match current {
            Value::Array(items) => {
                for item in items {
                    descend(item, segments, name, value);
                }
            }
            Value::Object(map) => match segments.split_first() {
                None => {
                    map.insert(name.to_string(), value.clone());
                }
                Some((head, tail)) => {
                    if let Some(next) = map.get_mut(head) {
                        descend(next, tail, name, value);
                    }
                }
            },
            _ => {}
        }
    }
    descend(global, path.segments(), name, value);
}

/// Install the default empty mapping under `name` in the scope addressed by
/// `path`. A sequence scope receives it at element 0 only.
pub fn install_default(global: &mut Value, path: &ContextPath, name: &str) {
    let Some(scope) = scope_mut(global, path) else {
        tracing::debug!(path = %path.key(), "scope missing, default binding dropped");
        return;
    };
    let target = match scope {
        Value::Array(items) => items.first_mut(),
        other => Some(other),
    };
    if let Some(Value::Object(map)) = target {
        map.insert(name.to_string(), Value::Object(Object::new()));
    }
}

fn scope_mut<'a>(global: &'a mut Value, path: &ContextPath) -> Option<&'a mut Value> {
    let mut current = global;
    for segment in path.segments() {
        while let Value::Array(items) = current {
            current = items.first_mut()?;
        }
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}

/// Sort a fetched sequence ascending by the `", "`-joined stringified
/// values of `keys` for each element. Comparison is plain code-point
/// order, not locale-aware collation, so the ordering is deterministic
/// across environments.
pub fn sort_sequence(items: &mut [Value], keys: &[String]) {
    items.sort_by(|a, b| sort_key(a, keys).cmp(&sort_key(b, keys)));
}

fn sort_key(item: &Value, keys: &[String]) -> String {
    keys.iter()
        .map(|k| item.get(k).map(stringify).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(", ")
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_seed_global_json_and_string_values() {
        // ?foo=%5B1%2C2%5D&bar=baz
        let global = seed_global("https://example.com/page?foo=%5B1%2C2%5D&bar=baz");
        assert_eq!(global["foo"], json!([1, 2]));
        assert_eq!(global["bar"], json!("baz"));
        assert_eq!(
            global["href"],
            json!("https://example.com/page?foo=%5B1%2C2%5D&bar=baz")
        );
    }

    #[test]
    fn test_seed_global_bad_literal_stays_string() {
        let global = seed_global("https://example.com/?x=%5Bnot%20json");
        assert_eq!(global["x"], json!("[not json"));
    }

    #[test]
    fn test_lookup_steps_into_first_element() {
        let global = json!({"rows": [{"user": {"id": 7}}, {"user": {"id": 8}}]});
        let path = ContextPath::root().child("rows").child("user");
        assert_eq!(lookup(&global, &path), Some(&json!({"id": 7})));
    }

    #[test]
    fn test_install_fans_out_over_sequences() {
        let mut global = json!({"rows": [{"a": 1}, {"a": 2}]});
        let path = ContextPath::root().child("rows");
        install(&mut global, &path, "user", &json!({"id": 7}));
        assert_eq!(global["rows"][0]["user"], json!({"id": 7}));
        assert_eq!(global["rows"][1]["user"], json!({"id": 7}));
    }

    #[test]
    fn test_install_at_root() {
        let mut global = json!({});
        install(&mut global, &ContextPath::root(), "app", &json!([1, 2]));
        assert_eq!(global["app"], json!([1, 2]));
    }

    #[test]
    fn test_install_default_sequence_writes_index_zero_only() {
        let mut global = json!({"rows": [{}, {}]});
        install_default(&mut global, &ContextPath::root().child("rows"), "extra");
        assert_eq!(global["rows"][0]["extra"], json!({}));
        assert!(global["rows"][1].get("extra").is_none());
    }

    #[test]
    fn test_sort_sequence_single_key() {
        let mut items = vec![json!({"id": 2}), json!({"id": 1})];
        sort_sequence(&mut items, &["id".to_string()]);
        assert_eq!(items, vec![json!({"id": 1}), json!({"id": 2})]);

        // already ascending stays put
        let mut items = vec![json!({"id": 1}), json!({"id": 2})];
        sort_sequence(&mut items, &["id".to_string()]);
        assert_eq!(items, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[test]
    fn test_sort_sequence_multiple_keys() {
        let mut items = vec![
            json!({"surname": "b", "given": "z"}),
            json!({"surname": "b", "given": "a"}),
            json!({"surname": "a", "given": "m"}),
        ];
        sort_sequence(&mut items, &["surname".to_string(), "given".to_string()]);
        assert_eq!(items[0]["surname"], "a");
        assert_eq!(items[1]["given"], "a");
        assert_eq!(items[2]["given"], "z");
    }

    #[test]
    fn test_sort_missing_key_sorts_first() {
        let mut items = vec![json!({"n": "x"}), json!({})];
        sort_sequence(&mut items, &["n".to_string()]);
        assert_eq!(items[0], json!({}));
    }

    #[test]
    fn test_resolved_classification() {
        assert!(Resolved::from_value(json!([1])).is_sequence());
        assert_eq!(
            Resolved::from_value(json!({"a": 1})),
            Resolved::Mapping(serde_json::from_value(json!({"a": 1})).unwrap())
        );
        assert_eq!(Resolved::from_value(json!(3)), Resolved::Scalar(json!(3)));
    }

    #[test]
    fn test_into_elements_singleton_wraps() {
        assert_eq!(
            Resolved::from_value(json!({"a": 1})).into_elements(),
            vec![json!({"a": 1})]
        );
        assert_eq!(
            Resolved::from_value(json!([1, 2])).into_elements(),
            vec![json!(1), json!(2)]
        );
    }
}
