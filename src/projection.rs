//! Display rows derived from a [`MenuDocument`].
//!
//! The projection is built once with [`ProjectionTree::build_full`] and then
//! kept in step with the document by replaying the [`Edit`] returned from each
//! mutation through [`ProjectionTree::apply`]. Rows only point back at the
//! document; the document never knows about rows.

use std::collections::HashMap;

use crate::menu::{Edit, MenuDocument, NodeId, NodeKind, Placement};

const TYPE_MENU: &str = "menu";
const TYPE_PIPE: &str = "pipemenu";
const TYPE_ITEM: &str = "item";
const TYPE_SEPARATOR: &str = "separator";
const ACTION_LINK: &str = "Link";
const ACTION_PIPE: &str = "Execute";
const ACTION_MULTIPLE: &str = "Multiple Execute";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RowKind {
    Menu,
    Link,
    Pipe,
    /// Item without actions.
    Item,
    /// Item with exactly one action, shown on a single row.
    CollapsedItem,
    /// Item with several actions, each on a child row.
    ExpandedItem,
    Action,
    Separator,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub kind: RowKind,
    pub label: String,
    pub type_name: String,
    pub action: String,
    pub execute: String,
    /// Node edits are dispatched to. For a collapsed item this is its action.
    pub node: NodeId,
    /// Node the row was derived from.
    pub source: NodeId,
    pub folded: bool,
    /// Menu id this row answers to (menus, pipes) or points at (links).
    target: Option<String>,
    parent: Option<RowId>,
    children: Vec<RowId>,
}

impl Row {
    pub fn parent(&self) -> Option<RowId> {
        self.parent
    }

    pub fn children(&self) -> &[RowId] {
        &self.children
    }

    pub fn columns(&self) -> [&str; 4] {
        [
            self.label.as_str(),
            self.type_name.as_str(),
            self.action.as_str(),
            self.execute.as_str(),
        ]
    }
}

/// A row together with its nesting depth, as handed to the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibleRow {
    pub id: RowId,
    pub depth: usize,
}

struct RowContent {
    kind: RowKind,
    label: String,
    type_name: String,
    action: String,
    execute: String,
    node: NodeId,
    target: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProjectionTree {
    rows: Vec<Option<Row>>,
    roots: Vec<RowId>,
    by_node: HashMap<NodeId, RowId>,
    /// Link rows by the menu id they point at.
    links: HashMap<String, Vec<RowId>>,
}

impl ProjectionTree {
    /// Walks the whole document once.
    pub fn build_full(doc: &MenuDocument) -> Self {
        let mut tree = Self::default();
        for child in doc.children(doc.root()) {
            tree.build_row(doc, *child, None);
        }
        tree
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id.0)?.as_ref()
    }

    fn get_mut(&mut self, id: RowId) -> Option<&mut Row> {
        self.rows.get_mut(id.0)?.as_mut()
    }

    pub fn roots(&self) -> &[RowId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.rows.iter().filter(|row| row.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Row showing `node`, whether as its source or its edit target.
    pub fn row_for(&self, node: NodeId) -> Option<RowId> {
        self.by_node.get(&node).copied()
    }

    /// Rows in document order, skipping the children of folded rows.
    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        let mut visible = Vec::with_capacity(self.rows.len());
        let mut stack: Vec<VisibleRow> = self
            .roots
            .iter()
            .rev()
            .map(|id| VisibleRow { id: *id, depth: 0 })
            .collect();
        while let Some(entry) = stack.pop() {
            let Some(row) = self.get(entry.id) else {
                continue;
            };
            visible.push(entry);
            if !row.folded {
                stack.extend(row.children.iter().rev().map(|id| VisibleRow {
                    id: *id,
                    depth: entry.depth + 1,
                }));
            }
        }
        visible
    }

    /// Labels from the top level down to `id`.
    pub fn row_path(&self, id: RowId) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(row) = current.and_then(|id| self.get(id)) {
            path.push(row.label.as_str());
            current = row.parent;
        }
        path.reverse();
        path
    }

    /// Returns the new fold state, or `None` for rows without children.
    pub fn toggle_fold(&mut self, id: RowId) -> Option<bool> {
        let row = self.get_mut(id)?;
        if row.children.is_empty() {
            return None;
        }
        row.folded = !row.folded;
        Some(row.folded)
    }

    // ------------------------------------------------------------------
    // Edit replay
    // ------------------------------------------------------------------

    /// Patches the rows after a document mutation. `edit` must come from
    /// the last mutation of `doc`; skipping one leaves the rows stale.
    pub fn apply(&mut self, doc: &MenuDocument, edit: &Edit) {
        match *edit {
            Edit::Inserted {
                node,
                parent,
                after,
            } => {
                if doc.classify(parent) == Some(NodeKind::Item) {
                    self.refresh_item(doc, parent);
                    return;
                }
                let row = match after.and_then(|anchor| self.row_for(anchor)) {
                    Some(anchor) => self.insert_after(doc, anchor, node),
                    None => {
                        let parent_row = self.row_for(parent);
                        self.append_child(doc, parent_row, node)
                    }
                };
                if let Some(row) = row {
                    let targets = self.menu_targets(row);
                    self.refresh_links_to(doc, targets);
                }
            }
            Edit::Removed { node, parent } => {
                // A collapsed item row is also found through its action.
                if let Some(row) = self.row_for(node)
                    && self.get(row).is_some_and(|row| row.source == node)
                {
                    let targets = self.menu_targets(row);
                    self.remove(row);
                    self.refresh_links_to(doc, targets);
                }
                if doc.classify(parent) == Some(NodeKind::Item) {
                    self.refresh_item(doc, parent);
                }
            }
            Edit::Updated { node } => {
                let Some(row) = self.row_for(node) else {
                    return;
                };
                let mut targets = self.own_menu_target(row);
                self.update_row(doc, row);
                targets.extend(self.own_menu_target(row));
                self.refresh_links_to(doc, targets);
            }
            Edit::Moved {
                node,
                anchor,
                placement,
            } => {
                let (Some(row), Some(anchor)) = (self.row_for(node), self.row_for(anchor)) else {
                    return;
                };
                let moved = match placement {
                    Placement::Before => self.move_before(row, anchor),
                    Placement::After => self.move_after(row, anchor),
                };
                // Links resolve to the first menu with their id, and the order
                // between the two swapped subtrees just changed.
                if moved {
                    let mut targets = self.menu_targets(row);
                    targets.extend(self.menu_targets(anchor));
                    self.refresh_links_to(doc, targets);
                }
            }
            Edit::ActionAdded { item, .. } => self.refresh_item(doc, item),
        }
    }

    // ------------------------------------------------------------------
    // Patch operations
    // ------------------------------------------------------------------

    /// Adds rows for `node` as the last child of `parent`, or at the top
    /// level when `parent` is `None`.
    pub fn append_child(
        &mut self,
        doc: &MenuDocument,
        parent: Option<RowId>,
        node: NodeId,
    ) -> Option<RowId> {
        self.build_row(doc, node, parent)
    }

    /// Adds rows for `node` as the next sibling of `anchor`.
    pub fn insert_after(&mut self, doc: &MenuDocument, anchor: RowId, node: NodeId) -> Option<RowId> {
        let parent = self.get(anchor)?.parent;
        let id = self.build_row(doc, node, parent)?;
        let siblings = self.siblings_mut(parent)?;
        siblings.retain(|sibling| *sibling != id);
        let index = siblings
            .iter()
            .position(|sibling| *sibling == anchor)
            .map_or(siblings.len(), |index| index + 1);
        siblings.insert(index, id);
        Some(id)
    }

    /// Drops `id` and every row below it.
    pub fn remove(&mut self, id: RowId) -> bool {
        let Some(parent) = self.get(id).map(|row| row.parent) else {
            return false;
        };
        if let Some(siblings) = self.siblings_mut(parent) {
            siblings.retain(|sibling| *sibling != id);
        }
        self.drop_subtree(id);
        true
    }

    /// Re-reads the columns of `id` from the document in place.
    pub fn update_row(&mut self, doc: &MenuDocument, id: RowId) -> bool {
        let Some(row) = self.get(id) else {
            return false;
        };
        let (source, old_node) = (row.source, row.node);
        let Some(content) = derive_row(doc, source) else {
            return false;
        };
        if old_node != content.node && old_node != source {
            self.by_node.remove(&old_node);
        }
        self.by_node.insert(content.node, id);
        self.set_content(id, content);
        true
    }

    pub fn move_before(&mut self, id: RowId, anchor: RowId) -> bool {
        self.reposition(id, anchor, 0)
    }

    pub fn move_after(&mut self, id: RowId, anchor: RowId) -> bool {
        self.reposition(id, anchor, 1)
    }

    fn reposition(&mut self, id: RowId, anchor: RowId, offset: usize) -> bool {
        let (Some(row), Some(anchor_row)) = (self.get(id), self.get(anchor)) else {
            return false;
        };
        if id == anchor || row.parent != anchor_row.parent {
            return false;
        }
        let parent = row.parent;
        let Some(siblings) = self.siblings_mut(parent) else {
            return false;
        };
        siblings.retain(|sibling| *sibling != id);
        let Some(index) = siblings.iter().position(|sibling| *sibling == anchor) else {
            return false;
        };
        siblings.insert(index + offset, id);
        true
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn build_row(&mut self, doc: &MenuDocument, node: NodeId, parent: Option<RowId>) -> Option<RowId> {
        if let Some(parent) = parent
            && self.get(parent).is_none()
        {
            return None;
        }
        let content = derive_row(doc, node)?;
        let kind = content.kind;
        let id = RowId(self.rows.len());
        self.by_node.insert(node, id);
        self.by_node.insert(content.node, id);
        self.rows.push(Some(Row {
            kind,
            label: String::new(),
            type_name: String::new(),
            action: String::new(),
            execute: String::new(),
            node,
            source: node,
            folded: false,
            target: None,
            parent,
            children: Vec::new(),
        }));
        self.set_content(id, content);
        if let Some(siblings) = self.siblings_mut(parent) {
            siblings.push(id);
        }

        match kind {
            RowKind::Menu => {
                for child in doc.children(node) {
                    self.build_row(doc, *child, Some(id));
                }
            }
            RowKind::ExpandedItem => {
                for action in doc.actions(node) {
                    self.build_row(doc, action, Some(id));
                }
            }
            _ => {}
        }
        Some(id)
    }

    /// Re-derives an item row after its action count may have changed.
    fn refresh_item(&mut self, doc: &MenuDocument, item: NodeId) {
        let Some(id) = self.row_for(item) else {
            return;
        };
        let children = self
            .get_mut(id)
            .map(|row| std::mem::take(&mut row.children))
            .unwrap_or_default();
        for child in children {
            self.drop_subtree(child);
        }
        self.update_row(doc, id);
        if self.get(id).map(|row| row.kind) == Some(RowKind::ExpandedItem) {
            for action in doc.actions(item) {
                self.build_row(doc, action, Some(id));
            }
        }
    }

    /// Fills `id` from `content` and keeps the link index in step.
    fn set_content(&mut self, id: RowId, content: RowContent) {
        let Some(row) = self.get_mut(id) else {
            return;
        };
        let old_link = (row.kind == RowKind::Link)
            .then(|| row.target.take())
            .flatten();
        row.fill(content);
        let new_link = (row.kind == RowKind::Link)
            .then(|| row.target.clone())
            .flatten();
        if old_link == new_link {
            return;
        }
        if let Some(old) = old_link {
            self.unindex_link(&old, id);
        }
        if let Some(new) = new_link {
            self.links.entry(new).or_default().push(id);
        }
    }

    fn unindex_link(&mut self, target: &str, id: RowId) {
        if let Some(rows) = self.links.get_mut(target) {
            rows.retain(|row| *row != id);
            if rows.is_empty() {
                self.links.remove(target);
            }
        }
    }

    /// Id of `id` itself when it is a menu or pipe row.
    fn own_menu_target(&self, id: RowId) -> Vec<String> {
        self.get(id)
            .filter(|row| matches!(row.kind, RowKind::Menu | RowKind::Pipe))
            .and_then(|row| row.target.clone())
            .into_iter()
            .collect()
    }

    /// Ids of the menu and pipe rows in the subtree of `id`.
    fn menu_targets(&self, id: RowId) -> Vec<String> {
        let mut targets = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(row) = self.get(current) else {
                continue;
            };
            if matches!(row.kind, RowKind::Menu | RowKind::Pipe)
                && let Some(target) = &row.target
            {
                targets.push(target.clone());
            }
            pending.extend(row.children.iter().copied());
        }
        targets
    }

    // Links show the label of the first menu carrying their id.
    fn refresh_links_to(&mut self, doc: &MenuDocument, mut targets: Vec<String>) {
        targets.sort_unstable();
        targets.dedup();
        for target in targets {
            let links = self.links.get(&target).cloned().unwrap_or_default();
            for link in links {
                self.update_row(doc, link);
            }
        }
    }

    fn drop_subtree(&mut self, id: RowId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(row) = self.rows.get_mut(current.0).and_then(Option::take) else {
                continue;
            };
            for key in [row.node, row.source] {
                if self.by_node.get(&key) == Some(&current) {
                    self.by_node.remove(&key);
                }
            }
            if row.kind == RowKind::Link
                && let Some(target) = &row.target
            {
                self.unindex_link(target, current);
            }
            pending.extend(row.children);
        }
    }

    fn siblings_mut(&mut self, parent: Option<RowId>) -> Option<&mut Vec<RowId>> {
        match parent {
            None => Some(&mut self.roots),
            Some(parent) => self.get_mut(parent).map(|row| &mut row.children),
        }
    }
}

impl Row {
    fn fill(&mut self, content: RowContent) {
        self.kind = content.kind;
        self.label = content.label;
        self.type_name = content.type_name;
        self.action = content.action;
        self.execute = content.execute;
        self.node = content.node;
        self.target = content.target;
    }
}

/// Columns for `node`, or `None` when the node has no row of its own.
fn derive_row(doc: &MenuDocument, node: NodeId) -> Option<RowContent> {
    let kind = doc.classify(node)?;
    let target = if kind.is_menu() {
        doc.id(node).map(str::to_string)
    } else {
        None
    };
    let label = || doc.label(node).unwrap_or_default().to_string();
    let content = |kind, label: String, type_name: &str, action: &str, execute: &str| RowContent {
        kind,
        label,
        type_name: type_name.to_string(),
        action: action.to_string(),
        execute: execute.to_string(),
        node,
        target: target.clone(),
    };

    let content = match kind {
        NodeKind::Submenu => content(RowKind::Menu, label(), TYPE_MENU, "", ""),
        NodeKind::Link => content(RowKind::Link, label(), TYPE_MENU, ACTION_LINK, ""),
        NodeKind::Pipe => content(
            RowKind::Pipe,
            label(),
            TYPE_PIPE,
            ACTION_PIPE,
            doc.execute(node).unwrap_or_default(),
        ),
        NodeKind::Separator => content(RowKind::Separator, label(), TYPE_SEPARATOR, "", ""),
        NodeKind::Item => {
            let actions = doc.actions(node);
            match actions.as_slice() {
                [] => content(RowKind::Item, label(), TYPE_ITEM, "", ""),
                [action] => {
                    action_columns(doc, *action, RowKind::CollapsedItem, label(), TYPE_ITEM)
                }
                _ => content(RowKind::ExpandedItem, label(), TYPE_ITEM, ACTION_MULTIPLE, ""),
            }
        }
        NodeKind::Action => action_columns(doc, node, RowKind::Action, String::new(), ""),
        NodeKind::Other => content(
            RowKind::Other,
            label(),
            doc.tag_name(node).unwrap_or_default(),
            "",
            "",
        ),
        NodeKind::Root | NodeKind::Execute => return None,
    };
    Some(content)
}

fn action_columns(
    doc: &MenuDocument,
    action: NodeId,
    kind: RowKind,
    label: String,
    type_name: &str,
) -> RowContent {
    RowContent {
        kind,
        label,
        type_name: type_name.to_string(),
        action: doc
            .action(action)
            .map(ToString::to_string)
            .unwrap_or_default(),
        execute: doc.execute(action).unwrap_or_default().to_string(),
        node: action,
        target: None,
    }
}

#[cfg(test)]
#[path = "projection_tests.rs"]
mod projection_tests;
