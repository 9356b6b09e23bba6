//! Context resolution for one region
//!
//! The central algorithm: select the template source, resolve the region's
//! name, fetch and bind its context, then rewrite the region's markup into
//! an engine-ready fragment for an ancestor's single compile pass (or, for
//! tabular and expand-before regions, render it per element right away).

use serde_json::{Map, Value};

use crate::config::{RegionConfig, EXCLUDE_CLASS, INCLUDE_CLASS, PARENT_KEY, REGION_ATTR};
use crate::context::{self, ContextPath, Resolved};
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::fetch::{self, RemoteFetcher};
use crate::session::Session;

/// Tabular constructs always get per-element expansion: an iteration block
/// spanning row markup would not survive the markup tree.
const TABULAR_TAGS: &[&str] = &["table", "tbody", "tr"];

/// Resolve one region: compute its effective context, bind it under the
/// region's name in the scope at `path`, and rewrite the region's inner
/// markup. Returns the name the value was bound under, which becomes the
/// local scope of nested regions.
pub fn resolve_region<F: RemoteFetcher>(
    session: &mut Session<F>,
    doc: &mut Document,
    node: NodeId,
    path: &ContextPath,
) -> Result<String> {
    let cfg = RegionConfig::for_node(doc, node);
    tracing::debug!(config = ?cfg, "resolving region");

    let mut source = template_source(session, doc, node, &cfg);

    // declared name, else the node's own id, else auto-generated
    let declared = cfg
        .name
        .clone()
        .or_else(|| doc.attr(node, "id").map(str::to_string))
        .unwrap_or_else(|| session.next_auto_name());

    // remote context fetch; the URL itself may be parameterized over the
    // global context
    let mut fetched: Option<Value> = None;
    if let Some(context_url) = &cfg.context {
        let url = match session.engine.render(context_url, &session.global) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url = %context_url, error = %e, "context url render failed, using it verbatim");
                context_url.clone()
            }
        };
        fetched = fetch::fetch_json(&session.fetcher, &url, node, &mut session.events, false);
    }

    // a fetched value is sorted and installed into the parent scope; with
    // nothing fetched the existing binding is read back, and with nothing
    // inherited either the binding defaults to an empty mapping
    let (name, resolved) = match fetched {
        Some(mut value) => {
            if let (Some(keys), Value::Array(items)) = (&cfg.sort, &mut value) {
                context::sort_sequence(items, keys);
            }
            let name = session.claim_name(path, declared);
            context::install(&mut session.global, path, &name, &value);
            (name, Resolved::from_value(value))
        }
        None => {
            let inherited = context::lookup(&session.global, &path.child(&declared))
                .filter(|v| !v.is_null())
                .cloned();
            match inherited {
                Some(value) => (declared, Resolved::from_value(value)),
                None => {
                    context::install_default(&mut session.global, path, &declared);
                    (declared, Resolved::Mapping(Map::new()))
                }
            }
        }
    };

    // condition wrapping, evaluated in the resolved value's scope
    if let Some(condition) = &cfg.condition {
        source = format!("{{{{#condition {condition}}}}}{source}{{{{/condition}}}}");
    }

    // expansion policy
    let tabular = doc
        .tag(node)
        .map(|t| TABULAR_TAGS.iter().any(|x| t.eq_ignore_ascii_case(x)))
        .unwrap_or(false);
    if tabular || cfg.expand.as_deref() == Some("before") {
        source = expand_before(session, &source, path, resolved)?;
    } else if let Some(wrap) = &cfg.wrap {
        if wrap != "none" {
            source = format!("{{{{#{wrap} {name}}}}}{source}{{{{/{wrap}}}}}");
        }
    } else if resolved.is_sequence() {
        source = format!("{{{{#each {name}}}}}{source}{{{{/each}}}}");
    } else {
        source = format!("{{{{#with {name}}}}}{source}{{{{/with}}}}");
    }

    // consume the declaration and rewrite the region's markup
    doc.remove_attr(node, REGION_ATTR);
    doc.set_inner_markup(node, &source);
    Ok(name)
}

/// Render `source` once per element of the resolved value and concatenate
/// the fragments in input order, injecting a back-reference to the parent
/// scope under the reserved key.
fn expand_before<F: RemoteFetcher>(
    session: &Session<F>,
    source: &str,
    path: &ContextPath,
    resolved: Resolved,
) -> Result<String> {
    let parent_scope = context::lookup(&session.global, path)
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    let mut fragments = Vec::new();
    for element in resolved.into_elements() {
        let data = match element {
            Value::Object(mut map) => {
                map.insert(PARENT_KEY.to_string(), parent_scope.clone());
                Value::Object(map)
            }
            // a scalar element has nowhere to carry a back-reference
            other => other,
        };
        fragments.push(session.engine.render(source, &data)?);
    }
    Ok(fragments.concat())
}

/// Select and return the template source for a region: a fetched document
/// fragment when a template reference is declared, the region's own markup
/// otherwise. Fetch failures and unmatched fragment ids fall back to the
/// region's own markup.
fn template_source<F: RemoteFetcher>(
    session: &mut Session<F>,
    doc: &mut Document,
    node: NodeId,
    cfg: &RegionConfig,
) -> String {
    if let Some(reference) = &cfg.template {
        let (url, fragment) = match reference.split_once('#') {
            Some((url, fragment)) => (url, Some(fragment)),
            None => (reference.as_str(), None),
        };
        if let Some(markup) =
            fetch::fetch_markup(&session.fetcher, url, node, &mut session.events, false)
        {
            let mut template_doc = Document::parse(&markup);
            let selected = match fragment {
                Some(id) => template_doc
                    .descendants(Document::root())
                    .into_iter()
                    .find(|&d| template_doc.attr(d, "id") == Some(id)),
                None => Some(Document::root()),
            };
            match selected {
                Some(template_node) => {
                    filter_template_children(&mut template_doc, template_node);
                    return template_doc.inner_markup(template_node).trim().to_string();
                }
                None => {
                    tracing::warn!(template = %reference, "template fragment not found, falling back to region markup");
                }
            }
        }
    }
    filter_template_children(doc, node);
    doc.inner_markup(node).trim().to_string()
}

/// Include/exclude filtering on the direct children of a template source:
/// once any element child is marked include, unmarked element children are
/// discarded; excluded children are discarded unconditionally. Text nodes
/// are left alone.
fn filter_template_children(doc: &mut Document, node: NodeId) {
    let elements: Vec<NodeId> = doc
        .children(node)
        .iter()
        .copied()
        .filter(|&c| doc.is_element(c))
        .collect();
    if elements.iter().any(|&c| doc.has_class(c, INCLUDE_CLASS)) {
        for &child in &elements {
            if !doc.has_class(child, INCLUDE_CLASS) {
                doc.detach(child);
            }
        }
    }
    for &child in &elements {
        if doc.has_class(child, EXCLUDE_CLASS) {
            doc.detach(child);
        }
    }
}
