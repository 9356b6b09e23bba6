//! Top-level render pass and post-processing
//!
//! After the composer finishes its descent from a top-level region, the
//! region's markup is compiled and rendered exactly once against the
//! accumulated global context, and the output replaces the region's markup
//! in one shot. Cosmetic fix-ups run on the rendered output afterwards.

use regex::Regex;

use crate::composer;
use crate::config::{REGION_ATTR, RENDERED_CLASS};
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::fetch::RemoteFetcher;
use crate::session::Session;

/// Render every unprocessed top-level region of `doc` in document order.
pub fn render_document<F: RemoteFetcher>(
    session: &mut Session<F>,
    doc: &mut Document,
) -> Result<()> {
    session.begin_pass();
    for node in top_level_regions(doc) {
        if doc.has_class(node, RENDERED_CLASS) {
            tracing::debug!(node = ?node, "region already rendered, skipping");
            continue;
        }
        composer::compose(session, doc, node)?;

        // one compile+render per top-level region, however deep the nesting
        let source = doc.inner_markup(node);
        let html = session.engine.render(&source, &session.global)?;
        let html = fix_state_attributes(&html);
        doc.set_inner_markup(node, &html);

        promote_deferred_images(doc, node);
        mark_rendered(doc, node);
    }
    Ok(())
}

/// Regions not nested inside another region. Nested regions are owned and
/// driven by their nearest initialized ancestor.
pub(crate) fn top_level_regions(doc: &Document) -> Vec<NodeId> {
    doc.descendants(Document::root())
        .into_iter()
        .filter(|&node| doc.attr(node, REGION_ATTR).is_some())
        .filter(|&node| !has_region_ancestor(doc, node))
        .collect()
}

fn has_region_ancestor(doc: &Document, node: NodeId) -> bool {
    let mut current = node;
    while let Some(parent) = doc.parent(current) {
        if doc.attr(parent, REGION_ATTR).is_some() {
            return true;
        }
        current = parent;
    }
    false
}

/// Rewrite the placeholder state attributes emitted by the
/// setSelected/setChecked helpers: true becomes the real attribute, false
/// disappears.
fn fix_state_attributes(html: &str) -> String {
    let html = html
        .replace("data-selected=\"true\"", "selected=\"selected\"")
        .replace("data-checked=\"true\"", "checked=\"checked\"");
    let false_attr = Regex::new(r#" ?data-(?:selected|checked)="false""#).unwrap();
    false_attr.replace_all(&html, "").into_owned()
}

/// Deferred image loading: promote `data-src` to `src` on every image in
/// the rendered subtree.
fn promote_deferred_images(doc: &mut Document, node: NodeId) {
    for id in doc.descendants(node) {
        let is_img = doc.tag(id).map(|t| t.eq_ignore_ascii_case("img")).unwrap_or(false);
        if !is_img {
            continue;
        }
        if let Some(src) = doc.attr(id, "data-src").map(str::to_string) {
            doc.set_attr(id, "src", &src);
        }
    }
}

/// Persistently mark the region and everything under it as processed so a
/// later pass never reinitializes them.
fn mark_rendered(doc: &mut Document, node: NodeId) {
    doc.add_class(node, RENDERED_CLASS);
    for region in composer::region_descendants(doc, node) {
        doc.add_class(region, RENDERED_CLASS);
    }
}
