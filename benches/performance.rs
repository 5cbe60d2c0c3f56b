use obmenu_tui::{
    menu::{MenuDocument, NodeId, SequentialIds},
    projection::ProjectionTree,
    render,
    theme::Theme,
};
use std::time::{Duration, Instant};

/// Performance benchmark suite for the menu model and its projection
///
/// Run with: cargo test --release --bench performance -- --nocapture
///
/// This measures:
/// - Parsing menu files
/// - Building the projection from scratch
/// - Parent lookups
/// - Insert/delete cycles replayed on the projection
/// - Rendering visible rows
const SMALL_MENU_ITEMS: usize = 10;
const MEDIUM_MENU_ITEMS: usize = 100;
const LARGE_MENU_ITEMS: usize = 1000;
const HUGE_MENU_ITEMS: usize = 10000;

const ITEMS_PER_SUBMENU: usize = 25;
const ITERATIONS: usize = 100;

/// Create menu markup with `num_items` items spread over submenus
fn create_test_menu(num_items: usize) -> String {
    let commands = [
        "xterm",
        "firefox",
        "gimp",
        "thunar",
        "vim ~/.config/openbox/menu.xml",
        "pavucontrol",
    ];

    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<openbox_menu xmlns=\"http://openbox.org/\">\n  <menu id=\"root-menu\" label=\"Openbox 3\">\n",
    );
    let submenus = num_items.div_ceil(ITEMS_PER_SUBMENU);
    let mut remaining = num_items;
    for menu in 0..submenus {
        xml.push_str(&format!(
            "    <menu id=\"menu-{menu}\" label=\"Submenu {menu}\">\n"
        ));
        for i in 0..ITEMS_PER_SUBMENU.min(remaining) {
            match i % 7 {
                0 => xml.push_str("      <separator label=\"Group\"/>\n"),
                1 => xml.push_str(&format!(
                    "      <item label=\"Both {i}\"><action name=\"Execute\"><execute>{}</execute></action><action name=\"Exit\"/></item>\n",
                    commands[i % commands.len()]
                )),
                2 => xml.push_str(&format!(
                    "      <menu id=\"pipe-{menu}-{i}\" label=\"Pipe {i}\" execute=\"obpipe {i}\"/>\n"
                )),
                _ => xml.push_str(&format!(
                    "      <item label=\"Program {i}\"><action name=\"Execute\"><execute>{}</execute></action></item>\n",
                    commands[i % commands.len()]
                )),
            }
        }
        remaining = remaining.saturating_sub(ITEMS_PER_SUBMENU);
        xml.push_str("    </menu>\n");
        if menu > 0 {
            xml.push_str(&format!("    <menu id=\"menu-{}\"/>\n", menu - 1));
        }
    }
    xml.push_str("  </menu>\n</openbox_menu>\n");
    xml
}

fn create_test_document(num_items: usize) -> MenuDocument {
    MenuDocument::parse(&create_test_menu(num_items))
        .expect("generated menu parses")
        .with_id_generator(SequentialIds::default())
}

/// Every node of the document in document order
fn all_nodes(doc: &MenuDocument) -> Vec<NodeId> {
    let mut nodes = Vec::new();
    let mut stack = vec![doc.root()];
    while let Some(node) = stack.pop() {
        nodes.push(node);
        stack.extend(doc.children(node).iter().rev().copied());
    }
    nodes
}

struct BenchmarkResult {
    name: String,
    iterations: usize,
    total_duration: Duration,
    avg_duration: Duration,
    min_duration: Duration,
    max_duration: Duration,
}

impl BenchmarkResult {
    fn print(&self) {
        println!("\n{}", self.name);
        println!("{}", "=".repeat(70));
        println!("Iterations:     {}", self.iterations);
        println!("Total time:     {:?}", self.total_duration);
        println!("Average:        {:?}", self.avg_duration);
        println!("Min:            {:?}", self.min_duration);
        println!("Max:            {:?}", self.max_duration);
        println!(
            "Ops/sec:        {:.2}",
            1_000_000.0 / self.avg_duration.as_micros().max(1) as f64
        );

        if self.avg_duration.as_millis() > 16 {
            println!("\n⚠️  WARNING: Average duration > 16ms (may drop frames)");
        }
    }
}

fn benchmark<F>(name: &str, iterations: usize, mut f: F) -> BenchmarkResult
where
    F: FnMut(),
{
    let mut durations = Vec::with_capacity(iterations);

    // Warmup
    for _ in 0..10 {
        f();
    }

    for _ in 0..iterations {
        let start = Instant::now();
        f();
        durations.push(start.elapsed());
    }

    let total_duration: Duration = durations.iter().sum();
    let avg_duration = total_duration / iterations as u32;
    let min_duration = durations.iter().min().copied().unwrap_or_default();
    let max_duration = durations.iter().max().copied().unwrap_or_default();

    BenchmarkResult {
        name: name.to_string(),
        iterations,
        total_duration,
        avg_duration,
        min_duration,
        max_duration,
    }
}

fn sizes() -> [(&'static str, usize); 4] {
    [
        ("Small (10 items)", SMALL_MENU_ITEMS),
        ("Medium (100 items)", MEDIUM_MENU_ITEMS),
        ("Large (1000 items)", LARGE_MENU_ITEMS),
        ("Huge (10000 items)", HUGE_MENU_ITEMS),
    ]
}

fn iterations_for(name: &str) -> usize {
    if name.contains("Huge") { 10 } else { ITERATIONS }
}

#[test]
fn bench_parse() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║                 PARSE BENCHMARKS                               ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    for (name, items) in sizes() {
        let xml = create_test_menu(items);
        let result = benchmark(&format!("parse - {}", name), iterations_for(name), || {
            let _ = MenuDocument::parse(&xml);
        });
        result.print();
    }
}

#[test]
fn bench_build_full() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              FULL PROJECTION BUILD BENCHMARKS                  ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    for (name, items) in sizes() {
        let doc = create_test_document(items);
        let result = benchmark(
            &format!("build_full - {}", name),
            iterations_for(name),
            || {
                let tree = ProjectionTree::build_full(&doc);
                assert!(!tree.is_empty());
            },
        );
        result.print();
    }
}

#[test]
fn bench_parent_lookup() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║                 PARENT LOOKUP BENCHMARKS                       ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    for (name, items) in sizes() {
        let doc = create_test_document(items);
        let nodes = all_nodes(&doc);
        let result = benchmark(
            &format!("parent x{} - {}", nodes.len(), name),
            ITERATIONS,
            || {
                let found = nodes.iter().filter(|node| doc.parent(**node).is_some()).count();
                assert_eq!(found, nodes.len() - 1);
            },
        );
        result.print();
    }
}

#[test]
fn bench_insert_apply_cycle() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              INSERT / DELETE + APPLY BENCHMARKS                ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    for (name, items) in sizes() {
        let mut doc = create_test_document(items);
        let mut tree = ProjectionTree::build_full(&doc);
        let submenu = doc.find_menu_by_id("menu-0").expect("first submenu");
        let anchor = doc.children(submenu)[0];

        let result = benchmark(
            &format!("insert_item_below + delete_node - {}", name),
            ITERATIONS,
            || {
                let Some(inserted) = doc.insert_item_below(Some(anchor)) else {
                    return;
                };
                tree.apply(&doc, &inserted);
                if let Some(removed) = doc.delete_node(inserted.node()) {
                    tree.apply(&doc, &removed);
                }
            },
        );
        result.print();

        let rebuilt = ProjectionTree::build_full(&doc);
        assert_eq!(tree.len(), rebuilt.len());
    }
}

#[test]
fn bench_render_visible_rows() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║                 RENDER ROWS BENCHMARKS                         ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    let theme = Theme::default();
    for (name, items) in sizes() {
        let doc = create_test_document(items);
        let tree = ProjectionTree::build_full(&doc);
        let result = benchmark(
            &format!("visible_rows + render_rows - {}", name),
            iterations_for(name),
            || {
                let visible = tree.visible_rows();
                let selected = visible.get(visible.len() / 2).map(|row| row.id);
                let _ = render::render_rows(&tree, &visible, selected, 120, &theme);
            },
        );
        result.print();
    }
}
