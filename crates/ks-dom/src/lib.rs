//! Mutable document tree used for in-place KML editing.
//!
//! Nodes live in an arena owned by [`Document`] and are addressed by
//! [`NodeId`]. Detached nodes stay in the arena but are unreachable from the
//! root, so they never serialize.

/// ID used to address nodes in the document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Element attribute, kept in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Payload carried by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The synthetic document root; never serialized itself.
    Root,
    Element {
        name: String,
        attributes: Vec<Attribute>,
    },
    Text(String),
    /// Character data written as a `<![CDATA[...]]>` section.
    CData(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        value: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Owned, mutable XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<NodeData>,
    declaration: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            declaration: None,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Raw `<?xml ...?>` declaration, if the source carried one.
    pub fn declaration(&self) -> Option<&str> {
        self.declaration.as_deref()
    }

    pub fn set_declaration(&mut self, declaration: Option<String>) {
        self.declaration = declaration;
    }

    /// First element child of the root.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|id| self.is_element(*id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element { .. })
    }

    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_element_named(&self, id: NodeId, name: &str) -> bool {
        self.element_name(id) == Some(name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match self.kind(id) {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| attribute.value.as_str())
    }

    /// Sets or replaces an attribute; no-op on non-element nodes.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let NodeKind::Element { attributes, .. } = &mut self.nodes[id.0].kind else {
            return;
        };

        match attributes.iter_mut().find(|attribute| attribute.name == name) {
            Some(existing) => existing.value = value.to_owned(),
            None => attributes.push(Attribute {
                name: name.to_owned(),
                value: value.to_owned(),
            }),
        }
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push_node(NodeKind::Element {
            name: name.to_owned(),
            attributes: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_owned()))
    }

    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        self.push_node(kind)
    }

    /// Appends `child` as the last child of `parent`, detaching it from any
    /// previous parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || self.is_ancestor_of(child, parent) {
            return;
        }

        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent.take() else {
            return;
        };
        self.nodes[parent.0].children.retain(|child| *child != id);
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current == self.root()
    }

    /// Returns the first direct element child named `name`, creating and
    /// appending one when none exists. The flag reports whether it was created.
    pub fn find_or_create_child(&mut self, parent: NodeId, name: &str) -> (NodeId, bool) {
        if let Some(existing) = self.first_child_named(parent, name) {
            return (existing, false);
        }

        let created = self.create_element(name);
        self.append_child(parent, created);
        (created, true)
    }

    pub fn first_child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|child| self.is_element_named(*child, name))
    }

    /// Pre-order descendants of `scope`, excluding `scope` itself.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }

        out
    }

    /// Descendant elements named `name`, in document order.
    pub fn elements_named(&self, scope: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.is_element_named(*id, name))
            .collect()
    }

    pub fn first_element_named(&self, scope: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|id| self.is_element_named(*id, name))
    }

    /// Concatenated text of all descendant text and CDATA nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.character_data(id) {
            return text.to_owned();
        }

        self.descendants(id)
            .into_iter()
            .filter_map(|child| self.character_data(child))
            .collect()
    }

    fn character_data(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text(text) | NodeKind::CData(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Replaces all children of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if let NodeKind::Text(existing) | NodeKind::CData(existing) = &mut self.nodes[id.0].kind {
            *existing = text.to_owned();
            return;
        }

        let previous = std::mem::take(&mut self.nodes[id.0].children);
        for child in previous {
            self.nodes[child.0].parent = None;
        }

        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
    }

    fn is_ancestor_of(&self, candidate: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(parent) = current {
            if parent == candidate {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }
}
