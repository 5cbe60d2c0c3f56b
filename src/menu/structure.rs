use super::node::{ACTION_TAG, MENU_TAG, Node, NodeData, NodeId, NodeKind};

// ============================================================================
// Arena: owning storage with a parent index
// ============================================================================

/// Nodes are owned by slot; children are listed by id and every slot records
/// its parent, so parent lookup is O(1). Freed slots stay empty and are never
/// reused, which turns stale handles into misses instead of aliases.
#[derive(Clone, Debug, Default)]
pub(crate) struct Arena {
    nodes: Vec<Option<Node>>,
}

impl Arena {
    pub fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)?.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)?.as_mut()
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.get(id).map(|node| &node.data)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.data(id).map(NodeData::kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let index = self.children(parent).iter().position(|child| *child == id)?;
        Some((parent, index))
    }

    pub fn live_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> bool {
        let Some(parent_node) = self.get_mut(parent) else {
            return false;
        };
        let index = index.min(parent_node.children.len());
        parent_node.children.insert(index, child);
        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = Some(parent);
        }
        true
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child)
    }

    /// A fresh node written with the same namespace prefix as `parent`.
    pub fn new_child_node(&self, parent: NodeId, data: NodeData) -> Node {
        let mut node = Node::new(data);
        node.prefix = self.get(parent).and_then(|parent| parent.prefix.clone());
        node
    }

    /// Allocates `data` and appends it under `parent`.
    pub fn push_new(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.alloc(self.new_child_node(parent, data));
        self.append_child(parent, id);
        id
    }

    /// Unlinks `id` from its parent and frees it together with its subtree.
    pub fn remove_subtree(&mut self, id: NodeId) -> Option<NodeId> {
        let (parent, index) = self.index_in_parent(id)?;
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.remove(index);
        }
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(current.0).and_then(Option::take) {
                pending.extend(node.children);
            }
        }
        Some(parent)
    }

    /// Swaps the children at `a` and `b` of `parent`.
    pub fn swap_children(&mut self, parent: NodeId, a: usize, b: usize) -> bool {
        let Some(node) = self.get_mut(parent) else {
            return false;
        };
        if a >= node.children.len() || b >= node.children.len() {
            return false;
        }
        node.children.swap(a, b);
        true
    }

    /// Depth-first pre-order walk starting at `start`.
    pub fn descendants(&self, start: NodeId) -> Descendants<'_> {
        Descendants {
            arena: self,
            stack: vec![start],
        }
    }
}

pub(crate) struct Descendants<'a> {
    arena: &'a Arena,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.arena.children(id).iter().rev().copied());
        Some(id)
    }
}

// ============================================================================
// Insert point resolution
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum InsertPoint {
    /// New node becomes the last child of `parent`.
    Append { parent: NodeId },
    /// New node goes directly after `anchor` inside `parent`.
    After {
        parent: NodeId,
        anchor: NodeId,
        index: usize,
    },
}

impl InsertPoint {
    pub fn parent(self) -> NodeId {
        match self {
            InsertPoint::Append { parent } | InsertPoint::After { parent, .. } => parent,
        }
    }
}

/// Decides where a node with tag `tag` lands when inserted "below" `anchor`.
///
/// 1. No anchor: append to the root, only with `allow_root`.
/// 2. A genuine submenu directly under the root takes the new node as its
///    last child, unless `allow_root` asks for a sibling. An empty nested
///    submenu does the same, but only for new `<menu>` elements.
/// 3. Otherwise the node goes right after the anchor. An action anchor is
///    replaced by its item for anything that is not itself an action.
///
/// The root only ever receives menus.
pub(crate) fn resolve_insert_point(
    arena: &Arena,
    root: NodeId,
    anchor: Option<NodeId>,
    tag: &str,
    allow_root: bool,
) -> Option<InsertPoint> {
    let Some(anchor) = anchor else {
        return (allow_root && tag == MENU_TAG).then_some(InsertPoint::Append { parent: root });
    };

    let kind = arena.kind(anchor)?;
    let parent = arena.parent(anchor);

    let accepts_children = kind == NodeKind::Submenu
        && (parent == Some(root) || (tag == MENU_TAG && arena.children(anchor).is_empty()));
    if accepts_children && !allow_root {
        return Some(InsertPoint::Append { parent: anchor });
    }

    let anchor = if kind == NodeKind::Action && tag != ACTION_TAG {
        arena.parent(anchor)?
    } else {
        anchor
    };
    let (parent, index) = arena.index_in_parent(anchor)?;
    if parent == root && (!allow_root || tag != MENU_TAG) {
        return None;
    }
    Some(InsertPoint::After {
        parent,
        anchor,
        index: index + 1,
    })
}
