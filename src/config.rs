//! Region configuration
//!
//! A region declares its options in the value of its `data-template`
//! attribute as `key: value` pairs separated by semicolons, e.g.
//!
//! ```text
//! data-template="name: members; context: /api/members.json; sort: surname, given"
//! ```
//!
//! Exactly seven keys are recognized; unrecognized keys are ignored and
//! malformed segments are skipped. Parsing is fail-soft by contract: a bad
//! declaration yields absent fields, never an error.

use serde::Serialize;

use crate::dom::{Document, NodeId};

/// Attribute marking a node as a template region.
pub const REGION_ATTR: &str = "data-template";

/// Class on a direct child of a template source selecting it as the body.
pub const INCLUDE_CLASS: &str = "template-include";

/// Class on a direct child of a template source discarding it.
pub const EXCLUDE_CLASS: &str = "template-exclude";

/// Class marking a region as already rendered by a previous pass.
pub const RENDERED_CLASS: &str = "template-rendered";

/// Reserved context key carrying the back-reference to the parent scope.
pub const PARENT_KEY: &str = "PARENT";

/// Declared options of one region. Every field is absent unless declared.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegionConfig {
    /// Template reference: URL plus optional `#fragment` id.
    pub template: Option<String>,
    /// Name the resolved value is bound under.
    pub name: Option<String>,
    /// Remote context URL; itself rendered against the global context.
    pub context: Option<String>,
    /// Sort keys applied to a fetched sequence.
    pub sort: Option<Vec<String>>,
    /// Condition expression wrapped around the template source.
    pub condition: Option<String>,
    /// Explicit block type to wrap with; `none` disables wrapping.
    pub wrap: Option<String>,
    /// Expansion policy; `before` forces per-element rendering.
    pub expand: Option<String>,
}

impl RegionConfig {
    /// Parse a declaration string.
    pub fn parse(declaration: &str) -> Self {
        let mut cfg = RegionConfig::default();
        for segment in declaration.split(';') {
            let Some((key, value)) = segment.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "template" => cfg.template = Some(value.to_string()),
                "name" => cfg.name = Some(value.to_string()),
                "context" => cfg.context = Some(value.to_string()),
                "sort" => {
                    let keys: Vec<String> = value
                        .split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(str::to_string)
                        .collect();
                    if !keys.is_empty() {
                        cfg.sort = Some(keys);
                    }
                }
                "condition" => cfg.condition = Some(value.to_string()),
                "wrap" => cfg.wrap = Some(value.to_string()),
                "expand" => cfg.expand = Some(value.to_string()),
                other => {
                    tracing::debug!(key = %other, "ignoring unrecognized region option");
                }
            }
        }
        cfg
    }

    /// Read the configuration declared on `node`, absent fields for
    /// non-regions.
    pub fn for_node(doc: &Document, node: NodeId) -> Self {
        doc.attr(node, REGION_ATTR)
            .map(Self::parse)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_options() {
        let cfg = RegionConfig::parse(
            "template: /t.html#frag; name: users; context: /api/u.json; \
             sort: surname, given; condition: kind equals \"person\"; wrap: each; expand: before",
        );
        assert_eq!(cfg.template.as_deref(), Some("/t.html#frag"));
        assert_eq!(cfg.name.as_deref(), Some("users"));
        assert_eq!(cfg.context.as_deref(), Some("/api/u.json"));
        assert_eq!(
            cfg.sort,
            Some(vec!["surname".to_string(), "given".to_string()])
        );
        assert_eq!(cfg.condition.as_deref(), Some("kind equals \"person\""));
        assert_eq!(cfg.wrap.as_deref(), Some("each"));
        assert_eq!(cfg.expand.as_deref(), Some("before"));
    }

    #[test]
    fn test_unrecognized_keys_ignored() {
        let cfg = RegionConfig::parse("name: x; bogus: y; frobnicate: z");
        assert_eq!(cfg.name.as_deref(), Some("x"));
        assert_eq!(cfg, RegionConfig {
            name: Some("x".to_string()),
            ..Default::default()
        });
    }

    #[test]
    fn test_malformed_segments_skipped() {
        let cfg = RegionConfig::parse("just words; name: ok; ;;");
        assert_eq!(cfg.name.as_deref(), Some("ok"));
        assert!(cfg.template.is_none());
    }

    #[test]
    fn test_empty_declaration() {
        assert_eq!(RegionConfig::parse(""), RegionConfig::default());
    }

    #[test]
    fn test_context_url_may_contain_colons() {
        let cfg = RegionConfig::parse("context: https://api.example.com/v1/items");
        assert_eq!(cfg.context.as_deref(), Some("https://api.example.com/v1/items"));
    }
}
