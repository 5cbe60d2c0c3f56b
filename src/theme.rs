use ratatui::style::{Color, Modifier, Style};

use crate::projection::RowKind;

/// Theme configuration for the menu editor
#[derive(Clone, Debug)]
pub struct Theme {
    /// Background color for the tree view
    pub background: Color,

    /// Foreground (text) color for the status bar
    pub status_bar_fg: Color,

    /// Background color for the status bar
    pub status_bar_bg: Color,

    /// Color for the current file name in the status bar
    pub filename_color: Color,

    /// Foreground color for the column header
    pub header_fg: Color,

    /// Foreground color for the selected row
    pub selection_fg: Color,

    /// Background color for the selected row
    pub selection_bg: Color,

    /// Color for submenu labels
    pub menu_color: Color,

    /// Color for links and their resolved labels
    pub link_color: Color,

    /// Color for pipe menus
    pub pipe_color: Color,

    /// Color for separators and elements the editor does not interpret
    pub muted_color: Color,

    /// Color for the execute column
    pub execute_color: Color,

    /// Foreground color for detail fields that cannot be edited
    pub field_disabled_fg: Color,

    /// Foreground color for the field being edited
    pub prompt_fg: Color,

    /// Background color for the field being edited
    pub prompt_bg: Color,

    /// Foreground color for popup entries
    pub menu_fg: Color,

    /// Background color for popups
    pub menu_bg: Color,

    /// Foreground color for the selected popup entry
    pub menu_selected_fg: Color,

    /// Background color for the selected popup entry
    pub menu_selected_bg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Reset,
            status_bar_fg: Color::White,
            status_bar_bg: Color::Blue,
            filename_color: Color::LightYellow,
            header_fg: Color::Gray,
            selection_fg: Color::White,
            selection_bg: Color::LightBlue,
            menu_color: Color::LightYellow,
            link_color: Color::Cyan,
            pipe_color: Color::LightMagenta,
            muted_color: Color::DarkGray,
            execute_color: Color::Green,
            field_disabled_fg: Color::DarkGray,
            prompt_fg: Color::Black,
            prompt_bg: Color::Gray,
            menu_fg: Color::White,
            menu_bg: Color::Black,
            menu_selected_fg: Color::Black,
            menu_selected_bg: Color::White,
        }
    }
}

impl Theme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_bar_style(&self) -> Style {
        Style::default()
            .fg(self.status_bar_fg)
            .bg(self.status_bar_bg)
    }

    pub fn filename_style(&self) -> Style {
        Style::default().fg(self.filename_color)
    }

    pub fn header_style(&self) -> Style {
        Style::default()
            .fg(self.header_fg)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    }

    /// Style for the row under the selection cursor; replaces per-column styles
    pub fn selection_style(&self) -> Style {
        Style::default().fg(self.selection_fg).bg(self.selection_bg)
    }

    /// Style of the label column for a row of `kind`
    pub fn label_style(&self, kind: RowKind) -> Style {
        match kind {
            RowKind::Menu => Style::default()
                .fg(self.menu_color)
                .add_modifier(Modifier::BOLD),
            RowKind::Link => Style::default()
                .fg(self.link_color)
                .add_modifier(Modifier::ITALIC),
            RowKind::Pipe => Style::default().fg(self.pipe_color),
            RowKind::Separator | RowKind::Other => Style::default().fg(self.muted_color),
            RowKind::Item
            | RowKind::CollapsedItem
            | RowKind::ExpandedItem
            | RowKind::Action => Style::default().bg(self.background),
        }
    }

    pub fn muted_style(&self) -> Style {
        Style::default().fg(self.muted_color)
    }

    pub fn execute_style(&self) -> Style {
        Style::default().fg(self.execute_color)
    }

    pub fn field_disabled_style(&self) -> Style {
        Style::default().fg(self.field_disabled_fg)
    }

    pub fn prompt_style(&self) -> Style {
        Style::default().fg(self.prompt_fg).bg(self.prompt_bg)
    }

    /// Get the style for the menu/popup
    pub fn menu_style(&self) -> Style {
        Style::default().fg(self.menu_fg).bg(self.menu_bg)
    }

    pub fn menu_selected_style(&self) -> Style {
        Style::default()
            .fg(self.menu_selected_fg)
            .bg(self.menu_selected_bg)
    }
}
