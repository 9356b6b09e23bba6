//! Arena document tree
//!
//! The minimal tree collaborator the composition core needs: parse markup,
//! query descendants, read and replace inner markup, detach nodes. Text is
//! stored verbatim so template expressions survive round trips untouched.
//!
//! Nodes are arena-allocated. Detaching a node (or replacing a node's inner
//! markup) leaves the old nodes in the arena with their ids still valid, but
//! [`Document::is_attached`] reports them as off the live tree.

mod parse;

/// Handle to a node in a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Elements that never take children.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_TAGS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

/// A parsed markup document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Document {
    /// Parse markup into a document. Lenient: never fails. Unmatched close
    /// tags are ignored and anything that does not scan as a tag is kept as
    /// verbatim text.
    pub fn parse(markup: &str) -> Self {
        let mut doc = Document {
            nodes: vec![NodeData {
                kind: NodeKind::Element {
                    tag: String::new(),
                    attrs: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
            }],
        };
        parse::parse_into(&mut doc, Self::root(), markup);
        doc
    }

    /// The synthetic root node.
    pub fn root() -> NodeId {
        NodeId(0)
    }

    pub(crate) fn new_element(&mut self, tag: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_string(),
            attrs,
        })
    }

    pub(crate) fn new_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub(crate) fn append(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Element tag name, `None` for text nodes and the synthetic root.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { tag, .. } if !tag.is_empty() => Some(tag),
            _ => None,
        }
    }

    /// Text content of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(&self.nodes[id.0].kind, NodeKind::Element { .. })
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            if let Some(slot) = attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
                slot.1 = value.to_string();
            } else {
                attrs.push((name.to_string(), value.to_string()));
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        }
    }

    pub fn has_class(&self, id: NodeId, token: &str) -> bool {
        self.attr(id, "class")
            .map(|c| c.split_whitespace().any(|t| t == token))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, id: NodeId, token: &str) {
        if self.has_class(id, token) {
            return;
        }
        let merged = match self.attr(id, "class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {token}"),
            _ => token.to_string(),
        };
        self.set_attr(id, "class", &merged);
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// All descendants of `id` in document (preorder) order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(id, &mut out);
        out
    }

    fn collect_descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &child in &self.nodes[id.0].children {
            out.push(child);
            self.collect_descendants(child, out);
        }
    }

    /// Whether `id` is still reachable from the document root. Guards the
    /// traversal against regions detached by an earlier rewrite.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cur = id;
        while let Some(parent) = self.nodes[cur.0].parent {
            cur = parent;
        }
        cur == Self::root()
    }

    /// Detach `id` from its parent. The node stays in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Serialize the children of `id` back to markup.
    pub fn inner_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in &self.nodes[id.0].children {
            self.write_node(child, &mut out);
        }
        out
    }

    /// Replace the children of `id` with the parse of `markup`. Previous
    /// children become detached.
    pub fn set_inner_markup(&mut self, id: NodeId, markup: &str) {
        let old = std::mem::take(&mut self.nodes[id.0].children);
        for child in old {
            self.nodes[child.0].parent = None;
        }
        parse::parse_into(self, id, markup);
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(&v.replace('"', "&quot;"));
                    out.push('"');
                }
                out.push('>');
                if !is_void(tag) {
                    for &child in &self.nodes[id.0].children {
                        self.write_node(child, out);
                    }
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let doc = Document::parse(r#"<div class="a"><span id="s">hi</span></div>"#);
        assert_eq!(
            doc.inner_markup(Document::root()),
            r#"<div class="a"><span id="s">hi</span></div>"#
        );
    }

    #[test]
    fn test_template_text_survives() {
        let markup = "{{#each rows}}<tr><td>{{n}}</td></tr>{{/each}}";
        let doc = Document::parse(markup);
        assert_eq!(doc.inner_markup(Document::root()), markup);
    }

    #[test]
    fn test_void_elements_take_no_children() {
        let doc = Document::parse(r#"<p><img src="x.png"><br>tail</p>"#);
        let p = doc.children(Document::root())[0];
        assert_eq!(doc.tag(p), Some("p"));
        // img, br and the text are all siblings under <p>
        assert_eq!(doc.children(p).len(), 3);
        assert_eq!(
            doc.inner_markup(Document::root()),
            r#"<p><img src="x.png"><br>tail</p>"#
        );
    }

    #[test]
    fn test_unmatched_close_ignored() {
        let doc = Document::parse("<div>a</span>b</div>");
        assert_eq!(doc.inner_markup(Document::root()), "<div>ab</div>");
    }

    #[test]
    fn test_stray_angle_kept_as_text() {
        let doc = Document::parse("a < b");
        assert_eq!(doc.inner_markup(Document::root()), "a < b");
    }

    #[test]
    fn test_set_inner_markup_reparses() {
        let mut doc = Document::parse("<div id=\"d\"><em>old</em></div>");
        let div = doc.children(Document::root())[0];
        let old_child = doc.children(div)[0];
        doc.set_inner_markup(div, "<span data-template=\"\">new</span>");
        assert!(!doc.is_attached(old_child));
        let span = doc.children(div)[0];
        assert_eq!(doc.tag(span), Some("span"));
        assert_eq!(doc.attr(span, "data-template"), Some(""));
        assert!(doc.is_attached(span));
    }

    #[test]
    fn test_detach_and_is_attached() {
        let mut doc = Document::parse("<ul><li>a</li><li>b</li></ul>");
        let ul = doc.children(Document::root())[0];
        let first = doc.children(ul)[0];
        doc.detach(first);
        assert!(!doc.is_attached(first));
        assert_eq!(doc.inner_markup(Document::root()), "<ul><li>b</li></ul>");
    }

    #[test]
    fn test_class_helpers() {
        let mut doc = Document::parse(r#"<div class="one two"></div>"#);
        let div = doc.children(Document::root())[0];
        assert!(doc.has_class(div, "one"));
        assert!(!doc.has_class(div, "three"));
        doc.add_class(div, "three");
        assert!(doc.has_class(div, "three"));
        // adding twice is a no-op
        doc.add_class(div, "three");
        assert_eq!(doc.attr(div, "class"), Some("one two three"));
    }

    #[test]
    fn test_comment_preserved() {
        let markup = "<div><!-- keep me -->x</div>";
        let doc = Document::parse(markup);
        assert_eq!(doc.inner_markup(Document::root()), markup);
    }
}
