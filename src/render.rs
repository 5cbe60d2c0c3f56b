use ratatui::{
    style::Style,
    text::{Line, Span},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::projection::{ProjectionTree, Row, RowId, RowKind, VisibleRow};
use crate::theme::Theme;

pub const COLUMN_TITLES: [&str; 4] = ["Label", "Type", "Action", "Execute"];

const INDENT_WIDTH: usize = 2;
const COLUMN_GAP: usize = 2;
const ELLIPSIS: char = '…';
const MARKER_FOLDED: &str = "▸ ";
const MARKER_OPEN: &str = "▾ ";
const MARKER_LEAF: &str = "  ";
const SEPARATOR_RULE: &str = "──────";
const MIN_LABEL_WIDTH: usize = 12;
const MAX_SHORT_COLUMN: usize = 18;

#[derive(Debug)]
pub struct RenderResult {
    pub header: Line<'static>,
    pub lines: Vec<Line<'static>>,
    /// Index into `lines` of the selected row.
    pub selected_line: Option<usize>,
    pub widths: [usize; 4],
}

pub fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(text)
}

/// Cuts `text` to at most `width` terminal cells, ending in an ellipsis when
/// anything was dropped, and pads it to exactly `width`.
pub fn fit_to_width(text: &str, width: usize) -> String {
    let mut out = String::new();
    if display_width(text) <= width {
        out.push_str(text);
    } else if width > 0 {
        let mut used = 0;
        for ch in text.chars() {
            let ch_width = ch.width().unwrap_or(0);
            if used + ch_width + 1 > width {
                break;
            }
            out.push(ch);
            used += ch_width;
        }
        out.push(ELLIPSIS);
    }
    let padding = width.saturating_sub(display_width(&out));
    out.extend(std::iter::repeat_n(' ', padding));
    out
}

fn label_cell(row: &Row, depth: usize) -> String {
    let marker = if row.children().is_empty() {
        MARKER_LEAF
    } else if row.folded {
        MARKER_FOLDED
    } else {
        MARKER_OPEN
    };
    let label = if row.kind == RowKind::Separator && row.label.is_empty() {
        SEPARATOR_RULE
    } else {
        row.label.as_str()
    };
    format!("{}{marker}{label}", " ".repeat(depth * INDENT_WIDTH))
}

/// Splits `width` cells over the four columns. Type and action keep their
/// natural width up to a cap; label and execute share the rest.
pub fn column_widths(tree: &ProjectionTree, visible: &[VisibleRow], width: usize) -> [usize; 4] {
    let mut natural = COLUMN_TITLES.map(display_width);
    for entry in visible {
        let Some(row) = tree.get(entry.id) else {
            continue;
        };
        let cells = [
            display_width(&label_cell(row, entry.depth)),
            display_width(&row.type_name),
            display_width(&row.action),
            display_width(&row.execute),
        ];
        for (slot, cell) in natural.iter_mut().zip(cells) {
            *slot = (*slot).max(cell);
        }
    }

    let available = width.saturating_sub(COLUMN_GAP * 3);
    let type_width = natural[1].min(MAX_SHORT_COLUMN);
    let action_width = natural[2].min(MAX_SHORT_COLUMN);
    let rest = available.saturating_sub(type_width + action_width);
    let label_width = if natural[0] + natural[3] <= rest {
        natural[0]
    } else {
        natural[0].min((rest * 3 / 5).max(MIN_LABEL_WIDTH)).min(rest)
    };
    let execute_width = rest.saturating_sub(label_width);
    [label_width, type_width, action_width, execute_width]
}

pub fn render_rows(
    tree: &ProjectionTree,
    visible: &[VisibleRow],
    selected: Option<RowId>,
    width: usize,
    theme: &Theme,
) -> RenderResult {
    let widths = column_widths(tree, visible, width);
    let gap = " ".repeat(COLUMN_GAP);

    let header_spans: Vec<Span<'static>> = COLUMN_TITLES
        .iter()
        .zip(widths)
        .enumerate()
        .flat_map(|(idx, (title, width))| {
            let mut spans = vec![Span::styled(fit_to_width(title, width), theme.header_style())];
            if idx + 1 < COLUMN_TITLES.len() {
                spans.push(Span::raw(gap.clone()));
            }
            spans
        })
        .collect();

    let mut lines = Vec::with_capacity(visible.len());
    let mut selected_line = None;
    for entry in visible {
        let Some(row) = tree.get(entry.id) else {
            continue;
        };
        let is_selected = selected == Some(entry.id);
        if is_selected {
            selected_line = Some(lines.len());
        }
        let styles: [Style; 4] = if is_selected {
            [theme.selection_style(); 4]
        } else {
            [
                theme.label_style(row.kind),
                theme.muted_style(),
                Style::default(),
                theme.execute_style(),
            ]
        };
        let cells = [
            label_cell(row, entry.depth),
            row.type_name.clone(),
            row.action.clone(),
            row.execute.clone(),
        ];
        let mut spans = Vec::with_capacity(7);
        for (idx, ((cell, width), style)) in cells.iter().zip(widths).zip(styles).enumerate() {
            if idx > 0 {
                let gap_style = if is_selected { style } else { Style::default() };
                spans.push(Span::styled(gap.clone(), gap_style));
            }
            spans.push(Span::styled(fit_to_width(cell, width), style));
        }
        lines.push(Line::from(spans));
    }

    RenderResult {
        header: Line::from(header_spans),
        lines,
        selected_line,
        widths,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::MenuDocument;

    const MENU: &str = r#"<openbox_menu>
  <menu id="root-menu" label="Root">
    <item label="Terminal"><action name="Execute"><execute>xterm</execute></action></item>
    <separator/>
    <menu id="sub" label="日本語メニュー"><item label="x"/></menu>
  </menu>
</openbox_menu>"#;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn fit_pads_and_truncates_by_cell_width() {
        assert_eq!(fit_to_width("abc", 5), "abc  ");
        assert_eq!(fit_to_width("abcdef", 4), "abc…");
        assert_eq!(fit_to_width("日本語", 4), "日… ");
        assert_eq!(fit_to_width("abc", 0), "");
    }

    #[test]
    fn rows_render_with_indent_and_markers() {
        let doc = MenuDocument::parse(MENU).expect("parses");
        let tree = ProjectionTree::build_full(&doc);
        let visible = tree.visible_rows();
        let result = render_rows(&tree, &visible, None, 120, &Theme::default());

        assert_eq!(result.lines.len(), 5);
        let texts: Vec<String> = result.lines.iter().map(line_text).collect();
        assert!(texts[0].starts_with("▾ Root"));
        assert!(texts[1].starts_with("    Terminal"));
        assert!(texts[1].contains("Execute"));
        assert!(texts[1].contains("xterm"));
        assert!(texts[2].starts_with(&format!("    {SEPARATOR_RULE}")));
        assert!(texts[3].starts_with("  ▾ 日本語メニュー"));
        assert!(line_text(&result.header).starts_with("Label"));
    }

    #[test]
    fn every_line_fills_the_width() {
        let doc = MenuDocument::parse(MENU).expect("parses");
        let tree = ProjectionTree::build_full(&doc);
        let visible = tree.visible_rows();
        for width in [30, 60, 200] {
            let result = render_rows(&tree, &visible, None, width, &Theme::default());
            let total: usize = result.widths.iter().sum::<usize>() + COLUMN_GAP * 3;
            assert!(total <= width);
            for line in &result.lines {
                assert_eq!(display_width(&line_text(line)), total);
            }
        }
    }

    #[test]
    fn selected_row_is_reported() {
        let doc = MenuDocument::parse(MENU).expect("parses");
        let tree = ProjectionTree::build_full(&doc);
        let visible = tree.visible_rows();
        let result = render_rows(&tree, &visible, Some(visible[2].id), 80, &Theme::default());
        assert_eq!(result.selected_line, Some(2));
    }
}
