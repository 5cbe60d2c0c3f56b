use super::*;
use crate::menu::{ActionName, ElementTag, SequentialIds, UNKNOWN_LABEL};

const MENU: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<openbox_menu xmlns="http://openbox.org/">
  <menu id="apps" label="Applications">
    <item label="Editor">
      <action name="Execute"><execute>vim</execute></action>
    </item>
  </menu>
  <menu id="root-menu" label="Openbox 3">
    <item label="Terminal">
      <action name="Execute"><execute>xterm</execute></action>
    </item>
    <item label="Both">
      <action name="Execute"><execute>one</execute></action>
      <action name="Exit"/>
    </item>
    <item label="Bare"/>
    <menu id="apps"/>
    <menu id="places" label="Places" execute="places.sh"/>
    <separator label="End"/>
    <menu id="nested" label="Nested">
      <separator/>
    </menu>
  </menu>
</openbox_menu>
"#;

type Snapshot = Vec<(usize, RowKind, [String; 4], NodeId)>;

fn document() -> MenuDocument {
    MenuDocument::parse(MENU)
        .expect("menu parses")
        .with_id_generator(SequentialIds::default())
}

fn snapshot(tree: &ProjectionTree) -> Snapshot {
    tree.visible_rows()
        .into_iter()
        .map(|entry| {
            let row = tree.get(entry.id).expect("visible row exists");
            (
                entry.depth,
                row.kind,
                row.columns().map(str::to_string),
                row.node,
            )
        })
        .collect()
}

/// The patched projection must match a projection built from scratch.
fn assert_synced(doc: &MenuDocument, tree: &ProjectionTree) {
    let fresh = ProjectionTree::build_full(doc);
    assert_eq!(snapshot(tree), snapshot(&fresh));
    assert_eq!(tree.len(), fresh.len());
}

fn apply(
    doc: &mut MenuDocument,
    tree: &mut ProjectionTree,
    change: impl FnOnce(&mut MenuDocument) -> Option<Edit>,
) -> Edit {
    let edit = change(doc).expect("mutation applies");
    tree.apply(doc, &edit);
    assert_synced(doc, tree);
    edit
}

fn top_menu(doc: &MenuDocument) -> NodeId {
    doc.find_menu_by_id("root-menu").expect("root menu present")
}

fn row_of(tree: &ProjectionTree, node: NodeId) -> &Row {
    let id = tree.row_for(node).expect("node has a row");
    tree.get(id).expect("row is live")
}

#[test]
fn build_full_mirrors_document_order_and_columns() {
    let doc = document();
    let tree = ProjectionTree::build_full(&doc);
    let rows: Vec<(usize, RowKind, [String; 4])> = snapshot(&tree)
        .into_iter()
        .map(|(depth, kind, columns, _)| (depth, kind, columns))
        .collect();
    let cols = |a: &str, b: &str, c: &str, d: &str| {
        [a.to_string(), b.to_string(), c.to_string(), d.to_string()]
    };
    assert_eq!(
        rows,
        vec![
            (0, RowKind::Menu, cols("Applications", "menu", "", "")),
            (1, RowKind::CollapsedItem, cols("Editor", "item", "Execute", "vim")),
            (0, RowKind::Menu, cols("Openbox 3", "menu", "", "")),
            (1, RowKind::CollapsedItem, cols("Terminal", "item", "Execute", "xterm")),
            (1, RowKind::ExpandedItem, cols("Both", "item", "Multiple Execute", "")),
            (2, RowKind::Action, cols("", "", "Execute", "one")),
            (2, RowKind::Action, cols("", "", "Exit", "")),
            (1, RowKind::Item, cols("Bare", "item", "", "")),
            (1, RowKind::Link, cols("Applications", "menu", "Link", "")),
            (1, RowKind::Pipe, cols("Places", "pipemenu", "Execute", "places.sh")),
            (1, RowKind::Separator, cols("End", "separator", "", "")),
            (1, RowKind::Menu, cols("Nested", "menu", "", "")),
            (2, RowKind::Separator, cols("", "separator", "", "")),
        ]
    );
}

#[test]
fn collapsed_row_dispatches_to_its_action() {
    let doc = document();
    let tree = ProjectionTree::build_full(&doc);
    let item = doc.children(top_menu(&doc))[0];
    let action = doc.actions(item)[0];
    let row = row_of(&tree, item);
    assert_eq!(row.node, action);
    assert_eq!(row.source, item);
    assert_eq!(tree.row_for(action), tree.row_for(item));
}

#[test]
fn item_row_follows_action_count() {
    let mut doc = document();
    let mut tree = ProjectionTree::build_full(&doc);
    let bare = doc.children(top_menu(&doc))[2];
    assert_eq!(row_of(&tree, bare).kind, RowKind::Item);

    let first = apply(&mut doc, &mut tree, |doc| doc.add_action(bare)).node();
    assert_eq!(row_of(&tree, bare).kind, RowKind::CollapsedItem);
    assert_eq!(row_of(&tree, bare).execute, "command");

    let second = apply(&mut doc, &mut tree, |doc| doc.add_action(first)).node();
    assert_eq!(row_of(&tree, bare).kind, RowKind::ExpandedItem);
    assert_eq!(row_of(&tree, bare).children().len(), 2);

    apply(&mut doc, &mut tree, |doc| doc.delete_node(second));
    assert_eq!(row_of(&tree, bare).kind, RowKind::CollapsedItem);
    assert!(row_of(&tree, bare).children().is_empty());

    apply(&mut doc, &mut tree, |doc| doc.delete_node(first));
    assert_eq!(tree.row_for(bare), None);
    assert_eq!(tree.row_for(first), None);
}

#[test]
fn inserts_land_where_the_document_put_them() {
    let mut doc = document();
    let mut tree = ProjectionTree::build_full(&doc);
    let top = top_menu(&doc);
    let terminal = doc.children(top)[0];
    let terminal_action = doc.actions(terminal)[0];

    apply(&mut doc, &mut tree, |doc| doc.insert_item_below(Some(terminal_action)));
    apply(&mut doc, &mut tree, |doc| doc.insert_separator_below(Some(top)));
    let link = apply(&mut doc, &mut tree, |doc| doc.insert_link_below(Some(terminal))).node();
    assert_eq!(row_of(&tree, link).label, UNKNOWN_LABEL);
    apply(&mut doc, &mut tree, |doc| doc.insert_pipe_below(Some(link)));

    let nested = doc.find_menu_by_id("nested").expect("nested menu");
    let sibling = apply(&mut doc, &mut tree, |doc| doc.insert_menu_below(Some(nested))).node();
    assert_eq!(row_of(&tree, sibling).children().len(), 1);
}

#[test]
fn menu_inserted_into_empty_document_becomes_a_top_level_row() {
    let mut doc = MenuDocument::new_empty();
    let mut tree = ProjectionTree::build_full(&doc);
    assert_eq!(tree.roots().len(), 1);

    let menu = apply(&mut doc, &mut tree, |doc| doc.insert_menu_below(None)).node();
    assert_eq!(tree.roots().len(), 2);
    assert_eq!(tree.roots()[1], tree.row_for(menu).expect("row"));
}

#[test]
fn inserted_action_expands_its_item() {
    let mut doc = document();
    let mut tree = ProjectionTree::build_full(&doc);
    let terminal = doc.children(top_menu(&doc))[0];
    let action = doc.actions(terminal)[0];
    apply(&mut doc, &mut tree, |doc| {
        doc.insert_below(Some(action), ElementTag::Action, false)
    });
    assert_eq!(row_of(&tree, terminal).kind, RowKind::ExpandedItem);
}

#[test]
fn relabeling_a_menu_refreshes_links_to_it() {
    let mut doc = document();
    let mut tree = ProjectionTree::build_full(&doc);
    let apps = doc.find_menu_by_id("apps").expect("apps menu");
    let link = doc.children(top_menu(&doc))[3];

    apply(&mut doc, &mut tree, |doc| doc.set_label(apps, "Programs"));
    assert_eq!(row_of(&tree, link).label, "Programs");

    apply(&mut doc, &mut tree, |doc| doc.set_id(apps, "programs"));
    assert_eq!(row_of(&tree, link).label, UNKNOWN_LABEL);

    apply(&mut doc, &mut tree, |doc| doc.set_id(link, "places"));
    assert_eq!(row_of(&tree, link).label, "Places");
}

#[test]
fn deleting_a_link_target_leaves_the_link_unknown() {
    let mut doc = document();
    let mut tree = ProjectionTree::build_full(&doc);
    let apps = doc.find_menu_by_id("apps").expect("apps menu");
    let link = doc.children(top_menu(&doc))[3];

    apply(&mut doc, &mut tree, |doc| doc.delete_node(apps));
    assert_eq!(row_of(&tree, link).label, UNKNOWN_LABEL);
}

#[test]
fn inserted_menu_resolves_a_dangling_link() {
    let mut doc = document();
    let mut tree = ProjectionTree::build_full(&doc);
    let link = doc.children(top_menu(&doc))[3];
    let nested = doc.find_menu_by_id("nested").expect("nested menu");

    apply(&mut doc, &mut tree, |doc| doc.set_id(link, "menu-1"));
    assert_eq!(row_of(&tree, link).label, UNKNOWN_LABEL);

    apply(&mut doc, &mut tree, |doc| doc.insert_menu_below(Some(nested)));
    assert_eq!(row_of(&tree, link).label, "New Menu");
}

#[test]
fn moving_menus_with_a_shared_id_relinks_to_the_first() {
    let mut doc = document();
    let mut tree = ProjectionTree::build_full(&doc);
    let link = doc.children(top_menu(&doc))[3];
    let nested = doc.find_menu_by_id("nested").expect("nested menu");

    apply(&mut doc, &mut tree, |doc| doc.set_id(link, "places"));
    apply(&mut doc, &mut tree, |doc| doc.set_id(nested, "places"));
    assert_eq!(row_of(&tree, link).label, "Places");

    apply(&mut doc, &mut tree, |doc| doc.move_up(nested));
    apply(&mut doc, &mut tree, |doc| doc.move_up(nested));
    assert_eq!(row_of(&tree, link).label, "Nested");

    apply(&mut doc, &mut tree, |doc| doc.delete_node(nested));
    assert_eq!(row_of(&tree, link).label, "Places");
}

#[test]
fn field_edits_update_rows_in_place() {
    let mut doc = document();
    let mut tree = ProjectionTree::build_full(&doc);
    let top = top_menu(&doc);
    let terminal = doc.children(top)[0];
    let both = doc.children(top)[1];
    let pipe = doc.children(top)[4];
    let row = tree.row_for(terminal);

    let action = doc.actions(terminal)[0];
    apply(&mut doc, &mut tree, |doc| doc.set_label(action, "Console"));
    apply(&mut doc, &mut tree, |doc| doc.set_execute(terminal, "urxvt"));
    assert_eq!(row_of(&tree, terminal).execute, "urxvt");
    apply(&mut doc, &mut tree, |doc| doc.set_action(terminal, ActionName::Restart));
    assert_eq!(row_of(&tree, terminal).action, "Restart");
    assert_eq!(row_of(&tree, terminal).execute, "");
    assert_eq!(tree.row_for(terminal), row);

    let exit = doc.actions(both)[1];
    apply(&mut doc, &mut tree, |doc| doc.set_action(exit, ActionName::Execute));
    assert_eq!(row_of(&tree, exit).execute, "command");

    apply(&mut doc, &mut tree, |doc| doc.set_execute(pipe, "other.sh"));
    assert_eq!(row_of(&tree, pipe).execute, "other.sh");
}

#[test]
fn moves_reorder_sibling_rows() {
    let mut doc = document();
    let mut tree = ProjectionTree::build_full(&doc);
    let top = top_menu(&doc);
    let both = doc.children(top)[1];
    let action = doc.actions(both)[0];

    apply(&mut doc, &mut tree, |doc| doc.move_up(action));
    apply(&mut doc, &mut tree, |doc| doc.move_down(both));
    apply(&mut doc, &mut tree, |doc| doc.move_down(both));
    let top_row = tree.row_for(top).expect("top row");
    let order: Vec<&str> = tree
        .get(top_row)
        .expect("row")
        .children()
        .iter()
        .map(|id| tree.get(*id).expect("row").label.as_str())
        .collect();
    assert_eq!(order[..3], ["Terminal", "Bare", "Both"]);
}

#[test]
fn removing_a_menu_drops_its_subtree() {
    let mut doc = document();
    let mut tree = ProjectionTree::build_full(&doc);
    let nested = doc.find_menu_by_id("nested").expect("nested menu");
    let separator = doc.children(nested)[0];
    apply(&mut doc, &mut tree, |doc| doc.delete_node(nested));
    assert_eq!(tree.row_for(nested), None);
    assert_eq!(tree.row_for(separator), None);
}

#[test]
fn folding_hides_children_and_paths_follow_parents() {
    let doc = document();
    let mut tree = ProjectionTree::build_full(&doc);
    let top = tree.row_for(top_menu(&doc)).expect("top row");
    let both = tree
        .row_for(doc.children(top_menu(&doc))[1])
        .expect("item row");
    let action_row = tree.get(both).expect("row").children()[1];

    assert_eq!(tree.row_path(action_row), vec!["Openbox 3", "Both", ""]);

    let before = tree.visible_rows().len();
    assert_eq!(tree.toggle_fold(top), Some(true));
    assert_eq!(tree.visible_rows().len(), before - 10);
    assert_eq!(tree.toggle_fold(top), Some(false));
    assert_eq!(tree.visible_rows().len(), before);

    let bare = tree
        .row_for(doc.children(top_menu(&doc))[2])
        .expect("bare row");
    assert_eq!(tree.toggle_fold(bare), None);
}
