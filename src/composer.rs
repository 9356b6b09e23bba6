//! Recursion driver
//!
//! Depth-first, pre-order composition over a region subtree, modeled as an
//! explicit worklist of (node, inherited scope) pairs with a visited set
//! keyed by node identity. A region resolved by an ancestor's rewrite is
//! detached from the live tree by the time it is popped, and the attach
//! guard skips it. Nothing is compiled here: after the descent every nested
//! region's markup has been rewritten into engine-ready fragment text.

use std::collections::HashSet;

use crate::config::REGION_ATTR;
use crate::context::ContextPath;
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::fetch::RemoteFetcher;
use crate::resolver;
use crate::session::Session;

/// Resolve `root` and every region nested under it, threading each region's
/// resolved scope down to its descendants.
pub fn compose<F: RemoteFetcher>(
    session: &mut Session<F>,
    doc: &mut Document,
    root: NodeId,
) -> Result<()> {
    let mut worklist: Vec<(NodeId, ContextPath)> = vec![(root, ContextPath::root())];
    let mut visited: HashSet<NodeId> = HashSet::new();

    while let Some((node, path)) = worklist.pop() {
        if !doc.is_attached(node) {
            tracing::debug!(node = ?node, "skipping region detached by an earlier rewrite");
            continue;
        }
        if !visited.insert(node) {
            continue;
        }

        let name = resolver::resolve_region(session, doc, node, &path)?;
        let child_scope = path.child(&name);

        // the rewrite above reparsed this region's markup, so these are
        // fresh nodes; reversed push keeps document order on the stack
        for region in region_descendants(doc, node).into_iter().rev() {
            worklist.push((region, child_scope.clone()));
        }
    }
    Ok(())
}

/// All descendant regions of `node`, in document order.
pub(crate) fn region_descendants(doc: &Document, node: NodeId) -> Vec<NodeId> {
    doc.descendants(node)
        .into_iter()
        .filter(|&d| doc.attr(d, REGION_ATTR).is_some())
        .collect()
}
