use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

mod error;
mod ids;
mod node;
mod structure;
mod xml;

pub use error::{MenuError, ParseError};
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use node::{ActionName, NodeId, NodeKind};

use node::{ACTION_TAG, ITEM_TAG, MENU_TAG, MenuAttrs, Node, NodeData, ROOT_TAG, SEPARATOR_TAG};
use structure::{Arena, InsertPoint, resolve_insert_point};
use xml::{Element, parse_element_tree, write_element_tree};

pub const OPENBOX_NAMESPACE: &str = "http://openbox.org/";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://openbox.org/ file:///usr/share/openbox/menu.xsd";

pub const ROOT_MENU_ID: &str = "root-menu";
pub const ROOT_MENU_LABEL: &str = "Openbox Menu";
/// Display label of a link whose target id matches no menu.
pub const UNKNOWN_LABEL: &str = "???";
pub const DEFAULT_COMMAND: &str = "command";
pub const NEW_ITEM_LABEL: &str = "New Item";
pub const NEW_MENU_LABEL: &str = "New Menu";
pub const NEW_PIPE_LABEL: &str = "New Pipemenu";
/// Placeholder target of a freshly inserted link.
pub const UNRESOLVED_LINK_ID: &str = "None";

/// Element to create with [`MenuDocument::insert_below`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementTag {
    Menu,
    Item,
    Action,
    Separator,
}

impl ElementTag {
    fn as_str(self) -> &'static str {
        match self {
            ElementTag::Menu => MENU_TAG,
            ElementTag::Item => ITEM_TAG,
            ElementTag::Action => ACTION_TAG,
            ElementTag::Separator => SEPARATOR_TAG,
        }
    }

    // A bare menu element has no label yet and therefore starts out as a link.
    fn bare_data(self) -> NodeData {
        match self {
            ElementTag::Menu => NodeData::Link { id: None },
            ElementTag::Item => NodeData::Item { label: None },
            ElementTag::Action => NodeData::Action {
                name: Some(ActionName::Execute),
            },
            ElementTag::Separator => NodeData::Separator { label: None },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
}

/// What a successful mutation changed. Mutators return `None` when nothing
/// changed; otherwise the projection replays the edit through
/// [`crate::projection::ProjectionTree::apply`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edit {
    /// `node` was created under `parent`, directly after `after` or, when
    /// `after` is `None`, as its last child.
    Inserted {
        node: NodeId,
        parent: NodeId,
        after: Option<NodeId>,
    },
    /// `node` and its subtree were removed from `parent`.
    Removed { node: NodeId, parent: NodeId },
    /// Attributes or payload of `node` changed in place.
    Updated { node: NodeId },
    /// `node` now sits directly before or after `anchor`.
    Moved {
        node: NodeId,
        anchor: NodeId,
        placement: Placement,
    },
    /// `action` was appended to `item`.
    ActionAdded { item: NodeId, action: NodeId },
}

impl Edit {
    /// The node a caller would select after the edit.
    pub fn node(&self) -> NodeId {
        match *self {
            Edit::Inserted { node, .. }
            | Edit::Updated { node }
            | Edit::Moved { node, .. } => node,
            Edit::Removed { parent, .. } => parent,
            Edit::ActionAdded { action, .. } => action,
        }
    }
}

/// An Openbox menu file held in memory.
pub struct MenuDocument {
    arena: Arena,
    root: NodeId,
    path: Option<PathBuf>,
    dirty: bool,
    ids: Box<dyn IdGenerator>,
}

impl fmt::Debug for MenuDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuDocument")
            .field("nodes", &self.arena.live_count())
            .field("path", &self.path)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Default for MenuDocument {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl MenuDocument {
    /// A root holding one empty top-level menu.
    pub fn new_empty() -> Self {
        let mut arena = Arena::default();
        let mut root_node = Node::new(NodeData::Root);
        root_node.extra = vec![
            ("xmlns".to_string(), OPENBOX_NAMESPACE.to_string()),
            ("xmlns:xsi".to_string(), XSI_NAMESPACE.to_string()),
            ("xsi:schemaLocation".to_string(), SCHEMA_LOCATION.to_string()),
        ];
        let root = arena.alloc(root_node);
        arena.push_new(
            root,
            NodeData::Submenu {
                id: Some(ROOT_MENU_ID.to_string()),
                label: ROOT_MENU_LABEL.to_string(),
            },
        );
        Self {
            arena,
            root,
            path: None,
            dirty: false,
            ids: Box::new(RandomIds),
        }
    }

    /// Parses markup. A well-formed document whose root is not
    /// `openbox_menu` yields the empty document instead.
    pub fn parse(xml: &str) -> Result<Self, ParseError> {
        Self::parse_recognized(xml).map(|(document, _)| document)
    }

    fn parse_recognized(xml: &str) -> Result<(Self, bool), ParseError> {
        let element = parse_element_tree(xml)?;
        if element.local_name() != ROOT_TAG {
            warn!(root = element.name.as_str(), "not an openbox menu, using empty document");
            return Ok((Self::new_empty(), false));
        }
        let mut arena = Arena::default();
        let root = build_subtree(&mut arena, &element);
        let document = Self {
            arena,
            root,
            path: None,
            dirty: false,
            ids: Box::new(RandomIds),
        };
        Ok((document, true))
    }

    /// Reads and parses `path` and remembers it for [`Self::save`]. A
    /// substituted empty document does not remember the path, so saving it
    /// never overwrites a foreign file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MenuError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| MenuError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let (mut document, recognized) = Self::parse_recognized(&content)?;
        if recognized {
            document.path = Some(path.to_path_buf());
        }
        debug!(path = %path.display(), nodes = document.arena.live_count(), "menu loaded");
        Ok(document)
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes to the remembered path. `Ok(false)` means there is none and the
    /// caller has to ask for one.
    pub fn save(&mut self) -> Result<bool, MenuError> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        self.save_as(path)?;
        Ok(true)
    }

    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<(), MenuError> {
        let path = path.as_ref();
        let write_error = |source| MenuError::Write {
            path: path.to_path_buf(),
            source,
        };
        let bytes = self.to_xml_bytes().map_err(write_error)?;
        fs::write(path, bytes).map_err(write_error)?;
        self.path = Some(path.to_path_buf());
        self.dirty = false;
        debug!(path = %path.display(), "menu saved");
        Ok(())
    }

    pub fn to_xml_string(&self) -> io::Result<String> {
        let bytes = self.to_xml_bytes()?;
        String::from_utf8(bytes).map_err(io::Error::other)
    }

    fn to_xml_bytes(&self) -> io::Result<Vec<u8>> {
        write_element_tree(&self.to_element(self.root))
    }

    fn to_element(&self, id: NodeId) -> Element {
        let Some(node) = self.arena.get(id) else {
            return Element::default();
        };
        Element {
            name: node.qualified_name(),
            attributes: node.data.attributes(&node.extra),
            text: node.data.text().map(str::to_string),
            children: node
                .children
                .iter()
                .map(|child| self.to_element(*child))
                .collect(),
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.arena.get(node).is_some()
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.arena.children(node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.parent(node)
    }

    /// The first top-level submenu, the one Openbox shows as its root menu.
    pub fn top_level_menu(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|child| self.classify(*child) == Some(NodeKind::Submenu))
    }

    pub fn classify(&self, node: NodeId) -> Option<NodeKind> {
        self.arena.kind(node)
    }

    /// Element name of `node` without its namespace prefix.
    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        Some(self.arena.data(node)?.tag())
    }

    /// Action children of an item, in order.
    pub fn actions(&self, item: NodeId) -> Vec<NodeId> {
        self.children(item)
            .iter()
            .copied()
            .filter(|child| self.classify(*child) == Some(NodeKind::Action))
            .collect()
    }

    fn sole_action(&self, item: NodeId) -> Option<NodeId> {
        match self.children(item) {
            [only] if self.classify(*only) == Some(NodeKind::Action) => Some(*only),
            _ => None,
        }
    }

    fn execute_child(&self, action: NodeId) -> Option<NodeId> {
        self.children(action)
            .iter()
            .copied()
            .find(|child| self.classify(*child) == Some(NodeKind::Execute))
    }

    /// First submenu or pipe menu carrying `id`, in document order.
    pub fn find_menu_by_id(&self, id: &str) -> Option<NodeId> {
        self.arena.descendants(self.root).find(|node| {
            matches!(
                self.arena.data(*node),
                Some(NodeData::Submenu { id: Some(menu_id), .. } | NodeData::Pipe { id: Some(menu_id), .. })
                    if menu_id == id
            )
        })
    }

    /// Ids of every submenu and pipe menu, in document order.
    pub fn menu_ids(&self) -> Vec<String> {
        self.arena
            .descendants(self.root)
            .filter_map(|node| match self.arena.data(node)? {
                NodeData::Submenu { id, .. } | NodeData::Pipe { id, .. } => id.clone(),
                _ => None,
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Field access
    // ------------------------------------------------------------------

    /// Links show the label of the menu they point at; actions show the
    /// label of their item.
    pub fn label(&self, node: NodeId) -> Option<&str> {
        match self.arena.data(node)? {
            NodeData::Link { id } => {
                let target = id.as_deref().and_then(|id| self.find_menu_by_id(id));
                Some(
                    target
                        .and_then(|target| self.arena.data(target)?.label())
                        .unwrap_or(UNKNOWN_LABEL),
                )
            }
            NodeData::Action { .. } => {
                let parent = self.parent(node)?;
                match self.arena.data(parent)? {
                    NodeData::Item { label } => label.as_deref(),
                    _ => None,
                }
            }
            data => data.label(),
        }
    }

    pub fn set_label(&mut self, node: NodeId, text: &str) -> Option<Edit> {
        match self.arena.data(node)? {
            NodeData::Action { .. } => {
                if text.is_empty() {
                    return None;
                }
                let parent = self.parent(node)?;
                if self.classify(parent) != Some(NodeKind::Item) {
                    return None;
                }
                self.set_label(parent, text)
            }
            NodeData::Item { label } => {
                if label.as_deref() == Some(text) {
                    return None;
                }
                self.replace_data(
                    node,
                    NodeData::Item {
                        label: Some(text.to_string()),
                    },
                )
            }
            NodeData::Submenu { .. } | NodeData::Pipe { .. } => {
                self.update_menu_attrs(node, |attrs| attrs.label = Some(text.to_string()))
            }
            _ => None,
        }
    }

    pub fn id(&self, node: NodeId) -> Option<&str> {
        self.arena.data(node)?.id()
    }

    pub fn set_id(&mut self, node: NodeId, id: &str) -> Option<Edit> {
        self.update_menu_attrs(node, |attrs| attrs.id = Some(id.to_string()))
    }

    /// The command of an `Execute` action, of an item's sole action, or of a
    /// pipe menu.
    pub fn execute(&self, node: NodeId) -> Option<&str> {
        match self.arena.data(node)? {
            NodeData::Action { .. } => self.arena.data(self.execute_child(node)?)?.text(),
            NodeData::Item { .. } => self.execute(self.sole_action(node)?),
            NodeData::Pipe { execute, .. } => Some(execute.as_str()),
            _ => None,
        }
    }

    pub fn set_execute(&mut self, node: NodeId, text: &str) -> Option<Edit> {
        match self.arena.data(node)? {
            NodeData::Action { .. } => {
                let child = self.execute_child(node)?;
                if self.arena.data(child)?.text() == Some(text) {
                    return None;
                }
                self.replace_data(
                    child,
                    NodeData::Execute {
                        text: text.to_string(),
                    },
                )?;
                Some(Edit::Updated { node })
            }
            NodeData::Item { .. } => {
                let action = self.sole_action(node)?;
                self.set_execute(action, text)
            }
            NodeData::Pipe { .. } => {
                self.update_menu_attrs(node, |attrs| attrs.execute = Some(text.to_string()))
            }
            _ => None,
        }
    }

    pub fn action(&self, node: NodeId) -> Option<&ActionName> {
        match self.arena.data(node)? {
            NodeData::Action { name } => name.as_ref(),
            NodeData::Item { .. } => self.action(self.sole_action(node)?),
            _ => None,
        }
    }

    /// Renames an action. Leaving `Execute` drops the command; entering it
    /// creates a placeholder command.
    pub fn set_action(&mut self, node: NodeId, name: ActionName) -> Option<Edit> {
        let old = match self.arena.data(node)? {
            NodeData::Action { name } => name.clone(),
            NodeData::Item { .. } => {
                let action = self.sole_action(node)?;
                return self.set_action(action, name);
            }
            _ => return None,
        };
        if old.as_ref() == Some(&name) {
            return None;
        }

        if old.as_ref().is_some_and(ActionName::is_execute) && !name.is_execute() {
            while let Some(child) = self.execute_child(node) {
                self.arena.remove_subtree(child);
            }
        }
        if name.is_execute() && self.execute_child(node).is_none() {
            self.arena.push_new(
                node,
                NodeData::Execute {
                    text: DEFAULT_COMMAND.to_string(),
                },
            );
        }
        self.replace_data(node, NodeData::Action { name: Some(name) })
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Removes `node` and its subtree. Removing the only action of an item
    /// removes the item.
    pub fn delete_node(&mut self, node: NodeId) -> Option<Edit> {
        let parent = self.parent(node)?;
        let target = if self.classify(node) == Some(NodeKind::Action)
            && self.children(parent).len() == 1
        {
            parent
        } else {
            node
        };
        let parent = self.arena.remove_subtree(target)?;
        self.dirty = true;
        debug!(node = target.0, parent = parent.0, "node deleted");
        Some(Edit::Removed {
            node: target,
            parent,
        })
    }

    /// Creates a bare `tag` element relative to `anchor`. See
    /// [`resolve_insert_point`] for the placement rules.
    pub fn insert_below(
        &mut self,
        anchor: Option<NodeId>,
        tag: ElementTag,
        allow_root: bool,
    ) -> Option<Edit> {
        let point = resolve_insert_point(&self.arena, self.root, anchor, tag.as_str(), allow_root)?;
        if tag == ElementTag::Action && self.classify(point.parent()) != Some(NodeKind::Item) {
            return None;
        }
        let node = self
            .arena
            .alloc(self.arena.new_child_node(point.parent(), tag.bare_data()));
        if tag == ElementTag::Action {
            self.arena.push_new(
                node,
                NodeData::Execute {
                    text: DEFAULT_COMMAND.to_string(),
                },
            );
        }
        let after = match point {
            InsertPoint::Append { parent } => {
                self.arena.append_child(parent, node);
                None
            }
            InsertPoint::After {
                parent,
                anchor,
                index,
            } => {
                self.arena.insert_child(parent, index, node);
                Some(anchor)
            }
        };
        self.dirty = true;
        debug!(node = node.0, parent = point.parent().0, tag = tag.as_str(), "node inserted");
        Some(Edit::Inserted {
            node,
            parent: point.parent(),
            after,
        })
    }

    pub fn insert_item_below(&mut self, anchor: Option<NodeId>) -> Option<Edit> {
        let edit = self.insert_below(anchor, ElementTag::Item, false)?;
        self.init_item(edit.node());
        Some(edit)
    }

    pub fn insert_link_below(&mut self, anchor: Option<NodeId>) -> Option<Edit> {
        let edit = self.insert_below(anchor, ElementTag::Menu, false)?;
        self.write_data(
            edit.node(),
            NodeData::Link {
                id: Some(UNRESOLVED_LINK_ID.to_string()),
            },
        );
        Some(edit)
    }

    pub fn insert_pipe_below(&mut self, anchor: Option<NodeId>) -> Option<Edit> {
        let edit = self.insert_below(anchor, ElementTag::Menu, false)?;
        let id = self.ids.next_id("pipe-");
        self.write_data(
            edit.node(),
            NodeData::Pipe {
                id: Some(id),
                label: NEW_PIPE_LABEL.to_string(),
                execute: DEFAULT_COMMAND.to_string(),
            },
        );
        Some(edit)
    }

    /// Inserts a new submenu holding one default item. With no anchor the
    /// menu is appended to the root; otherwise it becomes a sibling.
    pub fn insert_menu_below(&mut self, anchor: Option<NodeId>) -> Option<Edit> {
        let edit = self.insert_below(anchor, ElementTag::Menu, true)?;
        let node = edit.node();
        let id = self.ids.next_id("menu-");
        self.write_data(
            node,
            NodeData::Submenu {
                id: Some(id),
                label: NEW_MENU_LABEL.to_string(),
            },
        );
        let item = self.arena.push_new(node, ElementTag::Item.bare_data());
        self.init_item(item);
        Some(edit)
    }

    pub fn insert_separator_below(&mut self, anchor: Option<NodeId>) -> Option<Edit> {
        self.insert_below(anchor, ElementTag::Separator, false)
    }

    /// Appends a default `Execute` action to an item, or to the item owning
    /// an action.
    pub fn add_action(&mut self, node: NodeId) -> Option<Edit> {
        let item = match self.classify(node)? {
            NodeKind::Item => node,
            NodeKind::Action => self.parent(node)?,
            _ => return None,
        };
        if self.classify(item) != Some(NodeKind::Item) {
            return None;
        }
        let action = self.push_default_action(item);
        self.dirty = true;
        Some(Edit::ActionAdded { item, action })
    }

    pub fn move_up(&mut self, node: NodeId) -> Option<Edit> {
        self.move_by(node, Placement::Before)
    }

    pub fn move_down(&mut self, node: NodeId) -> Option<Edit> {
        self.move_by(node, Placement::After)
    }

    // Actions travel with their item.
    fn move_by(&mut self, node: NodeId, placement: Placement) -> Option<Edit> {
        let node = if self.classify(node)? == NodeKind::Action {
            self.parent(node)?
        } else {
            node
        };
        let (parent, index) = self.arena.index_in_parent(node)?;
        let other = match placement {
            Placement::Before => index.checked_sub(1)?,
            Placement::After => index + 1,
        };
        let anchor = *self.children(parent).get(other)?;
        if !self.arena.swap_children(parent, index, other) {
            return None;
        }
        self.dirty = true;
        Some(Edit::Moved {
            node,
            anchor,
            placement,
        })
    }

    // ------------------------------------------------------------------
    // Internal writes
    // ------------------------------------------------------------------

    fn init_item(&mut self, item: NodeId) {
        self.write_data(
            item,
            NodeData::Item {
                label: Some(NEW_ITEM_LABEL.to_string()),
            },
        );
        self.push_default_action(item);
    }

    fn push_default_action(&mut self, item: NodeId) -> NodeId {
        let action = self.arena.push_new(
            item,
            NodeData::Action {
                name: Some(ActionName::Execute),
            },
        );
        self.arena.push_new(
            action,
            NodeData::Execute {
                text: DEFAULT_COMMAND.to_string(),
            },
        );
        action
    }

    fn write_data(&mut self, node: NodeId, data: NodeData) {
        if let Some(slot) = self.arena.get_mut(node) {
            slot.data = data;
        }
    }

    fn replace_data(&mut self, node: NodeId, data: NodeData) -> Option<Edit> {
        let slot = self.arena.get_mut(node)?;
        if slot.data == data {
            return None;
        }
        slot.data = data;
        self.dirty = true;
        Some(Edit::Updated { node })
    }

    /// Edits the attributes of a menu and re-derives its shape from them.
    fn update_menu_attrs(
        &mut self,
        node: NodeId,
        change: impl FnOnce(&mut MenuAttrs),
    ) -> Option<Edit> {
        let mut attrs = self.arena.data(node)?.menu_attrs()?;
        change(&mut attrs);
        let (data, leftover) = attrs.classify();
        if let Some(execute) = leftover
            && let Some(slot) = self.arena.get_mut(node)
        {
            slot.extra.retain(|(key, _)| key != "execute");
            slot.extra.push(("execute".to_string(), execute));
        }
        self.replace_data(node, data)
    }
}

fn build_subtree(arena: &mut Arena, element: &Element) -> NodeId {
    let (data, extra) = NodeData::from_element(element);
    let mut node = Node::new(data);
    node.extra = extra;
    node.prefix = element.prefix().map(str::to_string);
    let id = arena.alloc(node);
    for child in &element.children {
        let child_id = build_subtree(arena, child);
        arena.append_child(id, child_id);
    }
    id
}

#[cfg(test)]
#[path = "menu_tests.rs"]
mod menu_tests;
