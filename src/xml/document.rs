//! In-memory XML document.
//!
//! A flat arena of nodes addressed by index. Node ids double as the identity
//! keys used to map raw XML results back to tree nodes, so they stay stable
//! for the lifetime of the document.

/// Index of a node inside its document arena.
pub type XmlNodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNodeKind {
    Element {
        tag: String,
        /// Attribute pairs in source/insertion order.
        attributes: Vec<(String, String)>,
        children: Vec<XmlNodeId>,
    },
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub struct XmlNode {
    pub kind: XmlNodeKind,
    pub parent: Option<XmlNodeId>,
    /// Source line (1-based); 0 for built nodes.
    pub line: usize,
}

/// `<!DOCTYPE root SYSTEM "...">` or `PUBLIC "..." "..."`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doctype {
    pub root: String,
    pub id: DoctypeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoctypeId {
    System(String),
    Public(String, String),
}

impl Doctype {
    pub fn system_url(&self) -> &str {
        match &self.id {
            DoctypeId::System(url) => url,
            DoctypeId::Public(_, url) => url,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct XmlDocument {
    nodes: Vec<XmlNode>,
    /// Comments and exactly one element, in document order.
    pub top_level: Vec<XmlNodeId>,
    pub encoding: Option<String>,
    pub doctype: Option<Doctype>,
}

impl XmlDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: XmlNodeId) -> Option<&XmlNode> {
        self.nodes.get(id)
    }

    /// The first (and only) top-level element.
    pub fn root(&self) -> Option<XmlNodeId> {
        self.top_level
            .iter()
            .copied()
            .find(|id| self.is_element(*id))
    }

    pub fn is_element(&self, id: XmlNodeId) -> bool {
        matches!(
            self.nodes.get(id),
            Some(XmlNode {
                kind: XmlNodeKind::Element { .. },
                ..
            })
        )
    }

    pub fn is_comment(&self, id: XmlNodeId) -> bool {
        matches!(
            self.nodes.get(id),
            Some(XmlNode {
                kind: XmlNodeKind::Comment(_),
                ..
            })
        )
    }

    pub fn tag(&self, id: XmlNodeId) -> Option<&str> {
        match self.nodes.get(id).map(|n| &n.kind) {
            Some(XmlNodeKind::Element { tag, .. }) => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn line(&self, id: XmlNodeId) -> usize {
        self.nodes.get(id).map_or(0, |n| n.line)
    }

    pub fn attributes(&self, id: XmlNodeId) -> &[(String, String)] {
        match self.nodes.get(id).map(|n| &n.kind) {
            Some(XmlNodeKind::Element { attributes, .. }) => attributes.as_slice(),
            _ => &[],
        }
    }

    pub fn children(&self, id: XmlNodeId) -> &[XmlNodeId] {
        match self.nodes.get(id).map(|n| &n.kind) {
            Some(XmlNodeKind::Element { children, .. }) => children.as_slice(),
            _ => &[],
        }
    }

    pub fn element_children(&self, id: XmlNodeId) -> impl Iterator<Item = XmlNodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect::<Vec<_>>()
            .into_iter()
    }

    pub fn comment_text(&self, id: XmlNodeId) -> Option<&str> {
        match self.nodes.get(id).map(|n| &n.kind) {
            Some(XmlNodeKind::Comment(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// The siblings around a node, taken from its parent's child list or
    /// from the document top level for parentless nodes.
    pub fn siblings(&self, id: XmlNodeId) -> (Vec<XmlNodeId>, Vec<XmlNodeId>) {
        let list: &[XmlNodeId] = match self.nodes.get(id).and_then(|n| n.parent) {
            Some(parent) => self.children(parent),
            None => self.top_level.as_slice(),
        };
        let position = list.iter().position(|c| *c == id);
        match position {
            Some(pos) => (list[..pos].to_vec(), list[pos + 1..].to_vec()),
            None => (Vec::new(), Vec::new()),
        }
    }

    /// True when the node is whitespace-only text, which only exists to
    /// carry source indentation.
    pub fn is_blank_text(&self, id: XmlNodeId) -> bool {
        match self.nodes.get(id).map(|n| &n.kind) {
            Some(XmlNodeKind::Text(text)) => text.trim().is_empty(),
            _ => false,
        }
    }

    // Builder side, used by the reader and by tree serialization.

    pub fn push_node(&mut self, kind: XmlNodeKind, line: usize) -> XmlNodeId {
        let id = self.nodes.len();
        self.nodes.push(XmlNode {
            kind,
            parent: None,
            line,
        });
        id
    }

    pub fn new_element(&mut self, tag: &str, line: usize) -> XmlNodeId {
        self.push_node(
            XmlNodeKind::Element {
                tag: tag.to_string(),
                attributes: Vec::new(),
                children: Vec::new(),
            },
            line,
        )
    }

    pub fn new_text(&mut self, text: &str) -> XmlNodeId {
        self.push_node(XmlNodeKind::Text(text.to_string()), 0)
    }

    pub fn new_cdata(&mut self, text: &str) -> XmlNodeId {
        self.push_node(XmlNodeKind::CData(text.to_string()), 0)
    }

    pub fn new_comment(&mut self, text: &str) -> XmlNodeId {
        self.push_node(XmlNodeKind::Comment(text.to_string()), 0)
    }

    pub fn append_child(&mut self, parent: XmlNodeId, child: XmlNodeId) {
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(XmlNode {
            kind: XmlNodeKind::Element { children, .. },
            ..
        }) = self.nodes.get_mut(parent)
        {
            children.push(child);
        }
    }

    pub fn append_top_level(&mut self, id: XmlNodeId) {
        self.top_level.push(id);
    }

    pub fn set_attribute(&mut self, id: XmlNodeId, name: &str, value: &str) {
        if let Some(XmlNode {
            kind: XmlNodeKind::Element { attributes, .. },
            ..
        }) = self.nodes.get_mut(id)
        {
            attributes.push((name.to_string(), value.to_string()));
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
