use std::borrow::Borrow;
use std::fmt;

/// Caller-chosen identifier of a row, unique within one table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> Self {
        id.clone()
    }
}

/// Id of a row plus the position it had when the handle was taken.
///
/// Resolving a handle checks the position first and falls back to the id
/// index when rows have moved since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowHandle {
    pub(super) id: NodeId,
    pub(super) position: usize,
}

impl RowHandle {
    pub fn id(&self) -> &NodeId {
        &self.id
    }
}

/// Either form a caller may use to name a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    Id(NodeId),
    Handle(RowHandle),
}

impl NodeRef {
    pub fn id(&self) -> &NodeId {
        match self {
            NodeRef::Id(id) => id,
            NodeRef::Handle(handle) => &handle.id,
        }
    }
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        NodeRef::Id(id)
    }
}

impl From<&NodeId> for NodeRef {
    fn from(id: &NodeId) -> Self {
        NodeRef::Id(id.clone())
    }
}

impl From<&str> for NodeRef {
    fn from(id: &str) -> Self {
        NodeRef::Id(NodeId::from(id))
    }
}

impl From<RowHandle> for NodeRef {
    fn from(handle: RowHandle) -> Self {
        NodeRef::Handle(handle)
    }
}

impl From<&RowHandle> for NodeRef {
    fn from(handle: &RowHandle) -> Self {
        NodeRef::Handle(handle.clone())
    }
}

/// Load state of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// Children have never been fetched
    Unloaded,
    /// Children known, row closed
    Collapsed,
    /// Children known, row open
    Expanded,
}

/// A row to insert, as produced by callers, loaders and transforms
#[derive(Debug, Clone, PartialEq)]
pub struct NewRow<C> {
    pub id: NodeId,
    pub content: C,
    /// The row is known to have no children; it is created already loaded
    pub leaf: bool,
}

impl<C> NewRow<C> {
    /// A row whose children will be fetched on first expansion
    pub fn new(id: impl Into<NodeId>, content: C) -> Self {
        Self {
            id: id.into(),
            content,
            leaf: false,
        }
    }

    /// A row known to have no children
    pub fn leaf(id: impl Into<NodeId>, content: C) -> Self {
        Self {
            id: id.into(),
            content,
            leaf: true,
        }
    }
}

/// One rendered row of a [`TreeTable`](super::TreeTable)
#[derive(Debug, Clone)]
pub struct Row<C> {
    pub(super) id: NodeId,
    pub(super) parent: Option<NodeId>,
    pub(super) level: usize,
    pub(super) children_count: usize,
    pub(super) children_loaded: bool,
    pub(super) expanded: bool,
    pub(super) visible: bool,
    pub(super) content: C,
}

impl<C> Row<C> {
    pub(super) fn from_new(new: NewRow<C>, parent: Option<NodeId>, level: usize) -> Self {
        Self {
            id: new.id,
            parent,
            level,
            children_count: 0,
            children_loaded: new.leaf,
            expanded: false,
            visible: false,
            content: new.content,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Parent id; `None` for a root
    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Nesting depth, root = 0
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn children_count(&self) -> usize {
        self.children_count
    }

    pub fn children_loaded(&self) -> bool {
        self.children_loaded
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn state(&self) -> RowState {
        if !self.children_loaded {
            RowState::Unloaded
        } else if self.expanded {
            RowState::Expanded
        } else {
            RowState::Collapsed
        }
    }

    /// Whether to draw an expander: unloaded rows are assumed expandable,
    /// loaded ones only when they have children
    pub fn has_expander(&self) -> bool {
        !self.children_loaded || self.children_count > 0
    }
}
