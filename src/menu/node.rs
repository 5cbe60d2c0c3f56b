use std::fmt;

use super::xml::Element;

pub const MENU_TAG: &str = "menu";
pub const ITEM_TAG: &str = "item";
pub const ACTION_TAG: &str = "action";
pub const EXECUTE_TAG: &str = "execute";
pub const SEPARATOR_TAG: &str = "separator";
pub const ROOT_TAG: &str = "openbox_menu";

/// Opaque handle into a [`MenuDocument`](super::MenuDocument).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Submenu,
    Link,
    Pipe,
    Item,
    Action,
    Separator,
    /// Text payload of an `Execute` action. Never shown as its own row.
    Execute,
    /// Element the editor does not interpret; preserved verbatim.
    Other,
}

impl NodeKind {
    pub fn is_menu(self) -> bool {
        matches!(self, NodeKind::Submenu | NodeKind::Link | NodeKind::Pipe)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionName {
    Execute,
    Reconfigure,
    Restart,
    Exit,
    Other(String),
}

impl ActionName {
    /// The names offered when cycling an action.
    pub const CHOICES: [ActionName; 4] = [
        ActionName::Execute,
        ActionName::Reconfigure,
        ActionName::Restart,
        ActionName::Exit,
    ];

    pub fn parse(name: &str) -> Self {
        match name {
            "Execute" => ActionName::Execute,
            "Reconfigure" => ActionName::Reconfigure,
            "Restart" => ActionName::Restart,
            "Exit" => ActionName::Exit,
            other => ActionName::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionName::Execute => "Execute",
            ActionName::Reconfigure => "Reconfigure",
            ActionName::Restart => "Restart",
            ActionName::Exit => "Exit",
            ActionName::Other(name) => name.as_str(),
        }
    }

    pub fn is_execute(&self) -> bool {
        matches!(self, ActionName::Execute)
    }

    /// Next entry of [`Self::CHOICES`]; unknown names wrap to `Execute`.
    pub fn cycled(&self) -> ActionName {
        let position = Self::CHOICES.iter().position(|choice| choice == self);
        match position {
            Some(idx) => Self::CHOICES[(idx + 1) % Self::CHOICES.len()].clone(),
            None => ActionName::Execute,
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payload of a document node. The three menu shapes are derived from
/// attribute presence through [`MenuAttrs::classify`] and never stored in a
/// shape their attributes contradict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum NodeData {
    Root,
    Submenu {
        id: Option<String>,
        label: String,
    },
    Link {
        id: Option<String>,
    },
    Pipe {
        id: Option<String>,
        label: String,
        execute: String,
    },
    Item {
        label: Option<String>,
    },
    /// `None` when the element carries no `name` attribute.
    Action {
        name: Option<ActionName>,
    },
    Execute {
        text: String,
    },
    Separator {
        label: Option<String>,
    },
    Other {
        tag: String,
        text: Option<String>,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct MenuAttrs {
    pub id: Option<String>,
    pub label: Option<String>,
    pub execute: Option<String>,
}

impl MenuAttrs {
    /// No label means link; label plus execute means pipe; otherwise submenu.
    /// An `execute` on a label-less menu has no meaning for a link and is
    /// handed back so it can be preserved as an uninterpreted attribute.
    pub fn classify(self) -> (NodeData, Option<String>) {
        match (self.label, self.execute) {
            (None, execute) => (NodeData::Link { id: self.id }, execute),
            (Some(label), Some(execute)) => (
                NodeData::Pipe {
                    id: self.id,
                    label,
                    execute,
                },
                None,
            ),
            (Some(label), None) => (NodeData::Submenu { id: self.id, label }, None),
        }
    }
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Root => NodeKind::Root,
            NodeData::Submenu { .. } => NodeKind::Submenu,
            NodeData::Link { .. } => NodeKind::Link,
            NodeData::Pipe { .. } => NodeKind::Pipe,
            NodeData::Item { .. } => NodeKind::Item,
            NodeData::Action { .. } => NodeKind::Action,
            NodeData::Execute { .. } => NodeKind::Execute,
            NodeData::Separator { .. } => NodeKind::Separator,
            NodeData::Other { .. } => NodeKind::Other,
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            NodeData::Root => ROOT_TAG,
            NodeData::Submenu { .. } | NodeData::Link { .. } | NodeData::Pipe { .. } => MENU_TAG,
            NodeData::Item { .. } => ITEM_TAG,
            NodeData::Action { .. } => ACTION_TAG,
            NodeData::Execute { .. } => EXECUTE_TAG,
            NodeData::Separator { .. } => SEPARATOR_TAG,
            NodeData::Other { tag, .. } => tag.as_str(),
        }
    }

    pub fn menu_attrs(&self) -> Option<MenuAttrs> {
        match self {
            NodeData::Submenu { id, label } => Some(MenuAttrs {
                id: id.clone(),
                label: Some(label.clone()),
                execute: None,
            }),
            NodeData::Link { id } => Some(MenuAttrs {
                id: id.clone(),
                label: None,
                execute: None,
            }),
            NodeData::Pipe { id, label, execute } => Some(MenuAttrs {
                id: id.clone(),
                label: Some(label.clone()),
                execute: Some(execute.clone()),
            }),
            _ => None,
        }
    }

    /// The stored `label` attribute, if this kind carries one.
    pub fn label(&self) -> Option<&str> {
        match self {
            NodeData::Submenu { label, .. } | NodeData::Pipe { label, .. } => Some(label.as_str()),
            NodeData::Item { label } | NodeData::Separator { label } => label.as_deref(),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            NodeData::Submenu { id, .. } | NodeData::Link { id } | NodeData::Pipe { id, .. } => {
                id.as_deref()
            }
            _ => None,
        }
    }

    /// Builds typed data from a parsed element. Attributes and text the model
    /// does not interpret are returned so they survive a save.
    pub fn from_element(element: &Element) -> (NodeData, Vec<(String, String)>) {
        let mut extra = Vec::new();
        let mut take = |names: &[&str]| -> Vec<Option<String>> {
            let mut found = vec![None; names.len()];
            for (key, value) in &element.attributes {
                match names.iter().position(|name| *name == key.as_str()) {
                    Some(idx) if found[idx].is_none() => found[idx] = Some(value.clone()),
                    _ => extra.push((key.clone(), value.clone())),
                }
            }
            found
        };

        let data = match element.local_name() {
            ROOT_TAG => {
                take(&[]);
                NodeData::Root
            }
            MENU_TAG => {
                let mut found = take(&["id", "label", "execute"]);
                let attrs = MenuAttrs {
                    id: found[0].take(),
                    label: found[1].take(),
                    execute: found[2].take(),
                };
                let (data, leftover) = attrs.classify();
                if let Some(execute) = leftover {
                    extra.push(("execute".to_string(), execute));
                }
                data
            }
            ITEM_TAG => {
                let mut found = take(&["label"]);
                NodeData::Item {
                    label: found[0].take(),
                }
            }
            ACTION_TAG => {
                let mut found = take(&["name"]);
                NodeData::Action {
                    name: found[0].take().map(|name| ActionName::parse(&name)),
                }
            }
            EXECUTE_TAG => {
                take(&[]);
                NodeData::Execute {
                    text: element.text.clone().unwrap_or_default(),
                }
            }
            SEPARATOR_TAG => {
                let mut found = take(&["label"]);
                NodeData::Separator {
                    label: found[0].take(),
                }
            }
            _ => {
                take(&[]);
                NodeData::Other {
                    tag: element.local_name().to_string(),
                    text: element.text.clone(),
                }
            }
        };
        (data, extra)
    }

    /// Attributes in write order, followed by the preserved extras.
    pub fn attributes(&self, extra: &[(String, String)]) -> Vec<(String, String)> {
        let mut attributes = Vec::new();
        let mut push = |key: &str, value: Option<&str>| {
            if let Some(value) = value {
                attributes.push((key.to_string(), value.to_string()));
            }
        };
        match self {
            NodeData::Submenu { id, label } => {
                push("id", id.as_deref());
                push("label", Some(label.as_str()));
            }
            NodeData::Link { id } => push("id", id.as_deref()),
            NodeData::Pipe { id, label, execute } => {
                push("id", id.as_deref());
                push("label", Some(label.as_str()));
                push("execute", Some(execute.as_str()));
            }
            NodeData::Item { label } | NodeData::Separator { label } => {
                push("label", label.as_deref())
            }
            NodeData::Action { name } => push("name", name.as_ref().map(ActionName::as_str)),
            NodeData::Root | NodeData::Execute { .. } | NodeData::Other { .. } => {}
        }
        attributes.extend(extra.iter().cloned());
        attributes
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            NodeData::Execute { text } => Some(text.as_str()),
            NodeData::Other { text, .. } => text.as_deref(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub data: NodeData,
    pub extra: Vec<(String, String)>,
    /// Namespace prefix the element was written with, e.g. `ob` for `<ob:menu>`.
    pub prefix: Option<String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    /// Qualified element name, with the prefix the node was read with.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.data.tag()),
            None => self.data.tag().to_string(),
        }
    }

    pub fn new(data: NodeData) -> Self {
        Self {
            data,
            extra: Vec::new(),
            prefix: None,
            parent: None,
            children: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str, attributes: &[(&str, &str)]) -> Element {
        Element {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: None,
            children: Vec::new(),
        }
    }

    #[test]
    fn menu_shapes_are_mutually_exclusive() {
        let (link, _) = NodeData::from_element(&element("menu", &[("id", "apps")]));
        assert_eq!(link.kind(), NodeKind::Link);

        let (submenu, _) =
            NodeData::from_element(&element("menu", &[("id", "apps"), ("label", "Apps")]));
        assert_eq!(submenu.kind(), NodeKind::Submenu);

        let (pipe, _) = NodeData::from_element(&element(
            "menu",
            &[("id", "p"), ("label", "Places"), ("execute", "places.sh")],
        ));
        assert_eq!(pipe.kind(), NodeKind::Pipe);
    }

    #[test]
    fn prefixed_tags_classify_by_local_name() {
        let (data, _) = NodeData::from_element(&element("ob:item", &[("label", "Term")]));
        assert_eq!(data.kind(), NodeKind::Item);
        assert_eq!(data.label(), Some("Term"));
    }

    #[test]
    fn unknown_attributes_are_preserved() {
        let (data, extra) = NodeData::from_element(&element(
            "item",
            &[("label", "Web"), ("icon", "/usr/share/icons/web.png")],
        ));
        assert_eq!(
            data.attributes(&extra),
            vec![
                ("label".to_string(), "Web".to_string()),
                ("icon".to_string(), "/usr/share/icons/web.png".to_string()),
            ]
        );
    }

    #[test]
    fn execute_on_label_less_menu_is_kept_as_extra() {
        let (data, extra) =
            NodeData::from_element(&element("menu", &[("id", "x"), ("execute", "cmd")]));
        assert_eq!(data.kind(), NodeKind::Link);
        assert_eq!(extra, vec![("execute".to_string(), "cmd".to_string())]);
    }

    #[test]
    fn action_without_name_writes_no_name() {
        let (data, extra) = NodeData::from_element(&element("action", &[]));
        assert_eq!(data, NodeData::Action { name: None });
        assert!(data.attributes(&extra).is_empty());
    }

    #[test]
    fn unknown_elements_keep_local_name_as_tag() {
        let (data, _) = NodeData::from_element(&element("ob:startupnotify", &[]));
        assert_eq!(data.tag(), "startupnotify");
    }

    #[test]
    fn qualified_name_restores_prefix() {
        let mut node = Node::new(NodeData::Item { label: None });
        assert_eq!(node.qualified_name(), "item");
        node.prefix = Some("ob".to_string());
        assert_eq!(node.qualified_name(), "ob:item");
    }

    #[test]
    fn action_names_cycle_through_choices() {
        assert_eq!(ActionName::Execute.cycled(), ActionName::Reconfigure);
        assert_eq!(ActionName::Exit.cycled(), ActionName::Execute);
        assert_eq!(
            ActionName::parse("ShowMenu").cycled(),
            ActionName::Execute
        );
        assert_eq!(ActionName::parse("ShowMenu").as_str(), "ShowMenu");
    }
}
