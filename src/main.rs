use std::{
    io,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Once,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use unicode_width::UnicodeWidthStr;

use obmenu_tui::config::{self, Command, Config};
use obmenu_tui::menu::{ActionName, Edit, MenuDocument, NodeId};
use obmenu_tui::projection::{ProjectionTree, Row, RowId, RowKind};
use obmenu_tui::render::render_rows;
use obmenu_tui::theme::Theme;

const STATUS_TIMEOUT: Duration = Duration::from_secs(4);
const DETAIL_HEIGHT: u16 = 6;
const DISCARD_QUESTION: &str = "You have unsaved changes! Discard? (y/n)";

fn main() -> ExitCode {
    let command = match Config::from_env() {
        Ok(command) => command,
        Err(err) => {
            eprintln!("obmenu: {err}\n\n{}", config::USAGE);
            return ExitCode::from(2);
        }
    };
    let config = match command {
        Command::Help => {
            println!("{}", config::USAGE);
            return ExitCode::SUCCESS;
        }
        Command::Version => {
            println!("obmenu {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Command::Run(config) => config,
    };
    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("obmenu: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<()> {
    let _log_guard = match &config.log_dir {
        Some(dir) => Some(init_logging(dir)?),
        None => None,
    };
    install_panic_hook();
    info!(path = ?config.menu_path, "starting");

    let (document, initial_status) = load_document(config.menu_path.as_deref());
    let mut app = App::new(document, config.menu_path, initial_status);

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().ok();

    let res = run_app(&mut terminal, &mut app).context("application error");

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

fn init_logging(dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let file_appender = tracing_appender::rolling::never(dir, config::LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
        .context("failed to install log subscriber")?;
    Ok(guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            disable_raw_mode().ok();
            execute!(io::stdout(), LeaveAlternateScreen).ok();
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

/// Never fails: problems degrade to an empty document and a status message.
fn load_document(path: Option<&Path>) -> (MenuDocument, Option<String>) {
    let Some(path) = path else {
        return (MenuDocument::new_empty(), Some("New menu".to_string()));
    };
    if !path.exists() {
        return (
            MenuDocument::new_empty(),
            Some(format!("New menu, {} does not exist yet", path.display())),
        );
    }
    match MenuDocument::load(path) {
        Ok(document) if document.path().is_none() => (
            document,
            Some(format!("{} is not an Openbox menu", path.display())),
        ),
        Ok(document) => (document, None),
        Err(err) => {
            warn!(error = %err, "load failed");
            (
                MenuDocument::new_empty(),
                Some(format!("{err}. Starting with empty menu.")),
            )
        }
    }
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();
    let mut needs_redraw = true;

    while !app.should_quit() {
        if needs_redraw {
            terminal
                .draw(|frame| app.draw(frame))
                .context("failed to draw frame")?;
            needs_redraw = false;
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout).context("event poll failed")? {
            let evt = event::read().context("failed to read event")?;
            app.handle_event(evt);
            needs_redraw = true;
        }

        if last_tick.elapsed() >= tick_rate {
            let had_message_before = app.has_status_message();
            app.on_tick();
            last_tick = Instant::now();
            if had_message_before && !app.has_status_message() {
                needs_redraw = true;
            }
        }
    }

    Ok(())
}

// ============================================================================
// "Add" popup
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MenuAction {
    AddMenu,
    AddItem,
    AddExecution,
    AddSeparator,
    AddPipe,
    AddLink,
}

#[derive(Clone, Copy)]
struct MenuItem {
    label: &'static str,
    action: Option<MenuAction>,
    shortcut: char,
}

impl MenuItem {
    fn new(label: &'static str, action: MenuAction, shortcut: char, enabled: bool) -> Self {
        Self {
            label,
            action: enabled.then_some(action),
            shortcut,
        }
    }

    fn is_enabled(&self) -> bool {
        self.action.is_some()
    }
}

enum MenuEntry {
    Section(&'static str),
    Item(MenuItem),
}

struct ContextMenuState {
    entries: Vec<MenuEntry>,
    selected_index: usize,
}

impl ContextMenuState {
    fn new(entries: Vec<MenuEntry>) -> Self {
        let selected_index = entries
            .iter()
            .position(|entry| matches!(entry, MenuEntry::Item(item) if item.is_enabled()))
            .unwrap_or(0);
        Self {
            entries,
            selected_index,
        }
    }

    fn move_selection(&mut self, delta: i32) {
        if self.entries.is_empty() {
            return;
        }

        let len = self.entries.len() as i32;
        let mut idx = self.selected_index as i32;

        for _ in 0..len {
            idx = (idx + delta).rem_euclid(len);
            if matches!(self.entries[idx as usize], MenuEntry::Item(_)) {
                self.selected_index = idx as usize;
                break;
            }
        }
    }

    fn current_action(&self) -> Option<MenuAction> {
        match self.entries.get(self.selected_index) {
            Some(MenuEntry::Item(item)) => item.action,
            _ => None,
        }
    }

    fn shortcut_action(&mut self, key: char) -> (bool, Option<MenuAction>) {
        for (idx, entry) in self.entries.iter().enumerate() {
            if let MenuEntry::Item(item) = entry
                && item.shortcut == key
            {
                self.selected_index = idx;
                return (true, item.action);
            }
        }
        (false, None)
    }
}

/// Entries of the "Add" popup for the selected row. Without a selection
/// only a top-level menu can be added.
fn add_menu_entries(selected: Option<RowKind>) -> Vec<MenuEntry> {
    let has_anchor = selected.is_some();
    let on_item = matches!(
        selected,
        Some(RowKind::Item | RowKind::CollapsedItem | RowKind::ExpandedItem | RowKind::Action)
    );
    vec![
        MenuEntry::Section("Add"),
        MenuEntry::Item(MenuItem::new("Menu", MenuAction::AddMenu, 'm', true)),
        MenuEntry::Item(MenuItem::new("Item", MenuAction::AddItem, 'i', has_anchor)),
        MenuEntry::Item(MenuItem::new(
            "Execution",
            MenuAction::AddExecution,
            'x',
            on_item,
        )),
        MenuEntry::Item(MenuItem::new(
            "Separator",
            MenuAction::AddSeparator,
            's',
            has_anchor,
        )),
        MenuEntry::Item(MenuItem::new("Pipemenu", MenuAction::AddPipe, 'p', has_anchor)),
        MenuEntry::Item(MenuItem::new("Link", MenuAction::AddLink, 'l', has_anchor)),
    ]
}

fn is_context_menu_shortcut(code: KeyCode, modifiers: KeyModifiers) -> bool {
    match code {
        KeyCode::Esc => modifiers.is_empty(),
        KeyCode::Char(' ') => modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

// ============================================================================
// Detail fields and prompts
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Label,
    Id,
    Action,
    Execute,
}

impl Field {
    const ALL: [Field; 4] = [Field::Label, Field::Id, Field::Action, Field::Execute];

    fn title(self) -> &'static str {
        match self {
            Field::Label => "Label",
            Field::Id => "Id",
            Field::Action => "Action",
            Field::Execute => "Execute",
        }
    }
}

/// Whether `field` can be edited on a row of `kind`. Execute is only
/// editable while the action is `Execute`.
fn field_enabled(kind: RowKind, field: Field, action: Option<&ActionName>) -> bool {
    let runs_command = action.is_some_and(ActionName::is_execute);
    match (kind, field) {
        (RowKind::Menu, Field::Label | Field::Id) => true,
        (RowKind::Link, Field::Id) => true,
        (RowKind::Pipe, Field::Label | Field::Id | Field::Execute) => true,
        (RowKind::Item | RowKind::ExpandedItem, Field::Label) => true,
        (RowKind::CollapsedItem, Field::Label | Field::Action) => true,
        (RowKind::CollapsedItem | RowKind::Action, Field::Execute) => runs_command,
        (RowKind::Action, Field::Action) => true,
        _ => false,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PromptTarget {
    Field(Field),
    SaveAs,
    Open,
}

struct Prompt {
    target: PromptTarget,
    input: String,
    /// Cursor position in chars.
    cursor: usize,
}

impl Prompt {
    fn new(target: PromptTarget, initial: &str) -> Self {
        Self {
            target,
            input: initial.to_string(),
            cursor: initial.chars().count(),
        }
    }

    fn title(&self) -> &'static str {
        match self.target {
            PromptTarget::Field(field) => field.title(),
            PromptTarget::SaveAs => "Save as",
            PromptTarget::Open => "Open",
        }
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor)
            .map_or(self.input.len(), |(idx, _)| idx)
    }

    fn insert(&mut self, ch: char) {
        let idx = self.byte_index();
        self.input.insert(idx, ch);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let idx = self.byte_index();
        self.input.remove(idx);
    }

    fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let idx = self.byte_index();
            self.input.remove(idx);
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.input.chars().count();
        self.cursor = self.cursor.saturating_add_signed(delta).min(len);
    }

    /// Display width of the text before the cursor.
    fn cursor_column(&self) -> usize {
        self.input[..self.byte_index()].width()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Discard {
    New,
    Open,
    Quit,
}

// ============================================================================
// Application
// ============================================================================

struct App {
    document: MenuDocument,
    tree: ProjectionTree,
    theme: Theme,
    /// Where Save As points when the document has no path of its own.
    suggested_path: Option<PathBuf>,
    selected: Option<RowId>,
    scroll_top: usize,
    should_quit: bool,
    status_message: Option<(String, Instant)>,
    context_menu: Option<ContextMenuState>,
    prompt: Option<Prompt>,
    pending_discard: Option<Discard>,
    last_viewport_height: usize,
}

impl App {
    fn new(
        document: MenuDocument,
        suggested_path: Option<PathBuf>,
        initial_status: Option<String>,
    ) -> Self {
        let mut app = Self {
            document: MenuDocument::new_empty(),
            tree: ProjectionTree::default(),
            theme: Theme::new(),
            suggested_path,
            selected: None,
            scroll_top: 0,
            should_quit: false,
            status_message: None,
            context_menu: None,
            prompt: None,
            pending_discard: None,
            last_viewport_height: 1,
        };
        app.replace_document(document);
        app.status_message = initial_status.map(|msg| (msg, Instant::now()));
        app
    }

    fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn has_status_message(&self) -> bool {
        self.status_message.is_some()
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    fn replace_document(&mut self, document: MenuDocument) {
        self.tree = ProjectionTree::build_full(&document);
        self.document = document;
        self.selected = self.tree.visible_rows().first().map(|entry| entry.id);
        self.scroll_top = 0;
    }

    fn selected_row(&self) -> Option<&Row> {
        self.tree.get(self.selected?)
    }

    fn selected_node(&self) -> Option<NodeId> {
        self.selected_row().map(|row| row.node)
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        if area.height == 0 || area.width == 0 {
            return;
        }

        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(DETAIL_HEIGHT),
                Constraint::Length(1),
            ])
            .split(area);
        let header_area = vertical[0];
        let tree_area = vertical[1];
        let detail_area = vertical[2];
        let status_area = vertical[3];

        let visible = self.tree.visible_rows();
        let render = render_rows(
            &self.tree,
            &visible,
            self.selected,
            tree_area.width as usize,
            &self.theme,
        );
        let viewport_height = tree_area.height as usize;
        self.last_viewport_height = viewport_height.max(1);
        self.adjust_scroll(render.selected_line, render.lines.len());

        frame.render_widget(Paragraph::new(render.header.clone()), header_area);
        let paragraph = Paragraph::new(Text::from(render.lines))
            .block(Block::default().borders(Borders::NONE))
            .scroll((self.scroll_top as u16, 0));
        frame.render_widget(paragraph, tree_area);
        if visible.is_empty() {
            let hint = Paragraph::new(Line::from(Span::styled(
                "Empty menu. Press Esc and m to add a menu.",
                self.theme.muted_style(),
            )));
            frame.render_widget(hint, tree_area);
        }

        self.draw_details(frame, detail_area);

        let status_line = self.status_line(status_area.width as usize);
        let status_widget = Paragraph::new(status_line)
            .block(Block::default().borders(Borders::NONE))
            .style(self.theme.status_bar_style());
        frame.render_widget(status_widget, status_area);

        if let Some(prompt) = &self.prompt {
            let prefix = format!("{}: ", prompt.title());
            let column = prefix.width() + prompt.cursor_column();
            let x = status_area.x + (column as u16).min(status_area.width.saturating_sub(1));
            frame.set_cursor_position(Position::new(x, status_area.y));
        }

        if self.context_menu.is_some() {
            self.render_context_menu(frame, area);
        }
    }

    fn draw_details(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::TOP)
            .title("Details")
            .border_style(self.theme.muted_style());
        let mut lines = Vec::new();
        if let Some(row) = self.selected_row() {
            let node = row.node;
            let action = self.document.action(node);
            for field in Field::ALL {
                let value = match field {
                    Field::Label => self.document.label(node).unwrap_or_default().to_string(),
                    Field::Id => self.document.id(node).unwrap_or_default().to_string(),
                    Field::Action => action.map(ToString::to_string).unwrap_or_default(),
                    Field::Execute => self.document.execute(node).unwrap_or_default().to_string(),
                };
                let enabled = field_enabled(row.kind, field, action);
                let style = if enabled {
                    Style::default()
                } else {
                    self.theme.field_disabled_style()
                };
                lines.push(Line::from(vec![
                    Span::styled(format!("{:<9}", field.title()), style.add_modifier(Modifier::BOLD)),
                    Span::styled(value, style),
                ]));
            }
        }
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_context_menu(&self, frame: &mut Frame, area: Rect) {
        let Some(menu) = &self.context_menu else {
            return;
        };

        if area.width < 3 || area.height < 3 {
            return;
        }

        let max_label_width = menu
            .entries
            .iter()
            .map(|entry| match entry {
                MenuEntry::Item(item) => item.label.chars().count(),
                MenuEntry::Section(title) => title.chars().count(),
            })
            .max()
            .unwrap_or(0);

        // label, two spaces, shortcut key
        let content_width = (max_label_width + 3) as u16;
        let min_width = 10.min(area.width);
        let width = (content_width + 4).min(area.width).max(min_width);
        let desired_height = (menu.entries.len() as u16 + 2).min(area.height);
        let height = desired_height.max(3.min(area.height));

        let popup_area = Rect::new(
            area.x + (area.width.saturating_sub(width)) / 2,
            area.y + (area.height.saturating_sub(height)) / 2,
            width,
            height,
        );

        frame.render_widget(Clear, popup_area);

        let popup_style = self.theme.menu_style();
        let items: Vec<ListItem> = menu
            .entries
            .iter()
            .map(|entry| match entry {
                MenuEntry::Section(title) => ListItem::new(Line::from(Span::styled(
                    *title,
                    popup_style.add_modifier(Modifier::BOLD),
                ))),
                MenuEntry::Item(item) => {
                    let content = format!(
                        "{label:<width$}  {key}",
                        label = item.label,
                        width = max_label_width,
                        key = item.shortcut,
                    );
                    let style = if item.is_enabled() {
                        Style::default()
                    } else {
                        self.theme.field_disabled_style()
                    };
                    ListItem::new(Line::from(Span::styled(content, style)))
                }
            })
            .collect();

        let mut state = ListState::default();
        state.select(Some(menu.selected_index));

        let list = List::new(items)
            .highlight_style(self.theme.menu_selected_style())
            .style(popup_style)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .style(popup_style)
                    .border_style(Style::default().fg(Color::Gray)),
            );

        frame.render_stateful_widget(list, popup_area, &mut state);
    }

    fn status_line(&mut self, terminal_width: usize) -> Line<'static> {
        self.prune_status_message();

        if let Some(prompt) = &self.prompt {
            return Line::from(vec![
                Span::raw(format!("{}: ", prompt.title())),
                Span::styled(prompt.input.clone(), self.theme.prompt_style()),
            ]);
        }
        if self.pending_discard.is_some() {
            return Line::from(Span::raw(DISCARD_QUESTION));
        }

        let position = self.position_text();
        if let Some((message, _)) = &self.status_message {
            return Line::from(vec![
                Span::raw(format!("{} ", position)),
                Span::raw(message.clone()),
            ]);
        }

        let filename = self
            .document
            .path()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "[unsaved]".to_string());
        let marker = if self.document.is_dirty() { "*" } else { "" };
        let breadcrumbs = self.breadcrumbs_text();

        // Shortcuts ordered from least to most important
        let all_shortcuts = [
            "^N:New",
            "^O:Open",
            "^W:Save As",
            "Esc:Add",
            "^S:Save",
            "^Q:Quit",
        ];

        let mut spans = vec![
            Span::raw(position),
            Span::raw(" "),
            Span::styled(format!("{filename}{marker}"), self.theme.filename_style()),
        ];
        if !breadcrumbs.is_empty() {
            spans.push(Span::raw(" "));
            spans.push(Span::raw(breadcrumbs));
        }

        let left_width: usize = spans.iter().map(|span| span.content.width()).sum();

        // Fit shortcuts from most to least important; stop at the first
        // one that does not fit.
        let min_padding = 1;
        let mut shortcuts_to_show = Vec::new();
        let mut shortcuts_width = 0;
        for shortcut in all_shortcuts.iter().rev() {
            let test_width = if shortcuts_to_show.is_empty() {
                shortcut.width()
            } else {
                shortcuts_width + 1 + shortcut.width()
            };
            if left_width + min_padding + test_width <= terminal_width {
                shortcuts_to_show.insert(0, *shortcut);
                shortcuts_width = test_width;
            } else {
                break;
            }
        }

        if !shortcuts_to_show.is_empty() {
            let padding = terminal_width
                .saturating_sub(left_width)
                .saturating_sub(shortcuts_width)
                .max(min_padding);
            spans.push(Span::raw(" ".repeat(padding)));
            spans.push(Span::raw(shortcuts_to_show.join(" ")));
        }

        Line::from(spans)
    }

    fn prune_status_message(&mut self) {
        if let Some((_, instant)) = &self.status_message
            && instant.elapsed() > STATUS_TIMEOUT
        {
            self.status_message = None;
        }
    }

    fn position_text(&self) -> String {
        let visible = self.tree.visible_rows();
        match self
            .selected
            .and_then(|id| visible.iter().position(|entry| entry.id == id))
        {
            Some(index) => format!("{}/{}", index + 1, visible.len()),
            None => format!("-/{}", visible.len()),
        }
    }

    fn breadcrumbs_text(&self) -> String {
        let Some(selected) = self.selected else {
            return String::new();
        };
        self.tree
            .row_path(selected)
            .into_iter()
            .filter(|label| !label.is_empty())
            .collect::<Vec<_>>()
            .join(" > ")
    }

    fn adjust_scroll(&mut self, selected_line: Option<usize>, total_lines: usize) {
        let viewport = self.last_viewport_height.max(1);
        if let Some(line) = selected_line {
            if line < self.scroll_top {
                self.scroll_top = line;
            } else if line >= self.scroll_top + viewport {
                self.scroll_top = line + 1 - viewport;
            }
        }
        let max_scroll = total_lines.saturating_sub(viewport);
        self.scroll_top = self.scroll_top.min(max_scroll);
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    fn handle_event(&mut self, event: Event) {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event
        else {
            return;
        };

        if self.pending_discard.is_some() {
            self.handle_discard_key(code);
            return;
        }
        if self.prompt.is_some() {
            self.handle_prompt_key(code, modifiers);
            return;
        }
        if self.handle_context_menu_key(code, modifiers) {
            return;
        }
        if self.context_menu.is_some() {
            return;
        }
        if is_context_menu_shortcut(code, modifiers) {
            self.open_context_menu();
            return;
        }

        let control = modifiers.contains(KeyModifiers::CONTROL);
        match code {
            KeyCode::Char('q') if control => self.request_discard(Discard::Quit),
            KeyCode::Char('c') if control => self.request_discard(Discard::Quit),
            KeyCode::Char('n') if control => self.request_discard(Discard::New),
            KeyCode::Char('o') if control => self.request_discard(Discard::Open),
            KeyCode::Char('s') if control => self.save(),
            KeyCode::Char('w') if control => self.open_save_as_prompt(),
            KeyCode::Up if control => self.move_selected(true),
            KeyCode::Down if control => self.move_selected(false),
            KeyCode::Char('K') => self.move_selected(true),
            KeyCode::Char('J') => self.move_selected(false),
            KeyCode::Up | KeyCode::Char('k') => self.select_relative(-1),
            KeyCode::Down | KeyCode::Char('j') => self.select_relative(1),
            KeyCode::PageUp => self.select_relative(-(self.last_viewport_height as isize)),
            KeyCode::PageDown => self.select_relative(self.last_viewport_height as isize),
            KeyCode::Home => self.select_index(0),
            KeyCode::End => self.select_index(usize::MAX),
            KeyCode::Left => self.fold_or_ascend(),
            KeyCode::Right => self.unfold(),
            KeyCode::Enter | KeyCode::Char('e') => self.open_field_prompt(Field::Label),
            KeyCode::Char('i') => self.open_field_prompt(Field::Id),
            KeyCode::Char('x') => self.open_field_prompt(Field::Execute),
            KeyCode::Char('a') => self.cycle_action(),
            KeyCode::Delete | KeyCode::Char('d') => self.delete_selected(),
            _ => {}
        }
    }

    fn on_tick(&mut self) {
        self.prune_status_message();
    }

    fn handle_discard_key(&mut self, code: KeyCode) {
        let Some(pending) = self.pending_discard.take() else {
            return;
        };
        if matches!(code, KeyCode::Char('y') | KeyCode::Char('Y')) {
            self.perform_discard(pending);
        } else {
            self.set_status("Cancelled");
        }
    }

    fn request_discard(&mut self, action: Discard) {
        if self.document.is_dirty() {
            self.pending_discard = Some(action);
        } else {
            self.perform_discard(action);
        }
    }

    fn perform_discard(&mut self, action: Discard) {
        match action {
            Discard::Quit => self.should_quit = true,
            Discard::New => {
                self.replace_document(MenuDocument::new_empty());
                self.set_status("New menu");
            }
            Discard::Open => {
                let initial = self
                    .document
                    .path()
                    .or(self.suggested_path.as_deref())
                    .map(|path| path.display().to_string())
                    .unwrap_or_default();
                self.prompt = Some(Prompt::new(PromptTarget::Open, &initial));
            }
        }
    }

    fn handle_prompt_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Enter => {
                if let Some(prompt) = self.prompt.take() {
                    self.commit_prompt(prompt);
                }
            }
            KeyCode::Backspace => prompt.backspace(),
            KeyCode::Delete => prompt.delete(),
            KeyCode::Left => prompt.move_cursor(-1),
            KeyCode::Right => prompt.move_cursor(1),
            KeyCode::Home => prompt.cursor = 0,
            KeyCode::End => prompt.cursor = prompt.input.chars().count(),
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => prompt.insert(ch),
            _ => {}
        }
    }

    fn commit_prompt(&mut self, prompt: Prompt) {
        let text = prompt.input;
        match prompt.target {
            PromptTarget::Field(field) => {
                let Some(node) = self.selected_node() else {
                    return;
                };
                let edit = match field {
                    Field::Label => self.document.set_label(node, &text),
                    Field::Id => self.document.set_id(node, &text),
                    Field::Execute => self.document.set_execute(node, &text),
                    Field::Action => self.document.set_action(node, ActionName::parse(&text)),
                };
                self.apply_edit(edit);
            }
            PromptTarget::SaveAs => {
                if text.trim().is_empty() {
                    self.set_status("No file name given");
                    return;
                }
                self.save_as(PathBuf::from(text.trim()));
            }
            PromptTarget::Open => {
                if text.trim().is_empty() {
                    return;
                }
                self.open(PathBuf::from(text.trim()));
            }
        }
    }

    fn handle_context_menu_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        let Some(menu) = self.context_menu.as_mut() else {
            return false;
        };

        match code {
            KeyCode::Esc => {
                self.context_menu = None;
                true
            }
            KeyCode::Up => {
                menu.move_selection(-1);
                true
            }
            KeyCode::Down => {
                menu.move_selection(1);
                true
            }
            KeyCode::Enter => {
                if let Some(action) = menu.current_action() {
                    self.context_menu = None;
                    self.execute_menu_action(action);
                }
                true
            }
            KeyCode::Char(' ') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.context_menu = None;
                true
            }
            KeyCode::Char(ch) => {
                let (handled, action) = menu.shortcut_action(ch);
                if let Some(action) = action {
                    self.context_menu = None;
                    self.execute_menu_action(action);
                }
                handled
            }
            _ => false,
        }
    }

    fn open_context_menu(&mut self) {
        let kind = self.selected_row().map(|row| row.kind);
        self.context_menu = Some(ContextMenuState::new(add_menu_entries(kind)));
    }

    fn execute_menu_action(&mut self, action: MenuAction) {
        let anchor = self.selected_node();
        let edit = match action {
            MenuAction::AddMenu => self.document.insert_menu_below(anchor),
            MenuAction::AddItem => self.document.insert_item_below(anchor),
            MenuAction::AddExecution => anchor.and_then(|node| self.document.add_action(node)),
            MenuAction::AddSeparator => self.document.insert_separator_below(anchor),
            MenuAction::AddPipe => self.document.insert_pipe_below(anchor),
            MenuAction::AddLink => self.document.insert_link_below(anchor),
        };
        if !self.apply_edit(edit) {
            self.set_status("Nothing can be added here");
        }
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Replays a document edit on the projection and selects its result.
    fn apply_edit(&mut self, edit: Option<Edit>) -> bool {
        let Some(edit) = edit else {
            return false;
        };
        let previous_index = self.selected_index();
        self.tree.apply(&self.document, &edit);
        let target = match edit {
            Edit::Removed { .. } => None,
            _ => self.tree.row_for(edit.node()),
        };
        match target {
            Some(row) => self.selected = Some(row),
            None => self.select_index(previous_index.unwrap_or(0)),
        }
        true
    }

    fn open_field_prompt(&mut self, field: Field) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let node = row.node;
        if !field_enabled(row.kind, field, self.document.action(node)) {
            self.set_status(format!("{} cannot be edited here", field.title()));
            return;
        }
        let current = match field {
            Field::Label => self.document.label(node),
            Field::Id => self.document.id(node),
            Field::Execute => self.document.execute(node),
            Field::Action => None,
        }
        .unwrap_or_default()
        .to_string();
        self.prompt = Some(Prompt::new(PromptTarget::Field(field), &current));
    }

    fn cycle_action(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let node = row.node;
        let action = self.document.action(node);
        if !field_enabled(row.kind, Field::Action, action) {
            return;
        }
        // A nameless action starts the cycle at Execute.
        let next = action.map_or(ActionName::Execute, ActionName::cycled);
        let edit = self.document.set_action(node, next);
        self.apply_edit(edit);
    }

    fn delete_selected(&mut self) {
        let Some(node) = self.selected_node() else {
            return;
        };
        let edit = self.document.delete_node(node);
        self.apply_edit(edit);
    }

    fn move_selected(&mut self, up: bool) {
        let Some(node) = self.selected_node() else {
            return;
        };
        let edit = if up {
            self.document.move_up(node)
        } else {
            self.document.move_down(node)
        };
        self.apply_edit(edit);
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    fn save(&mut self) {
        match self.document.save() {
            Ok(true) => self.set_status("Saved"),
            Ok(false) => self.open_save_as_prompt(),
            Err(err) => {
                warn!(error = %err, "save failed");
                self.set_status(err.to_string());
            }
        }
    }

    fn open_save_as_prompt(&mut self) {
        let initial = self
            .document
            .path()
            .or(self.suggested_path.as_deref())
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        self.prompt = Some(Prompt::new(PromptTarget::SaveAs, &initial));
    }

    fn save_as(&mut self, path: PathBuf) {
        match self.document.save_as(&path) {
            Ok(()) => self.set_status(format!("Saved {}", path.display())),
            Err(err) => {
                warn!(error = %err, "save failed");
                self.set_status(err.to_string());
            }
        }
    }

    fn open(&mut self, path: PathBuf) {
        let (document, status) = load_document(Some(&path));
        self.suggested_path = Some(path);
        self.replace_document(document);
        self.set_status(status.unwrap_or_else(|| "Opened".to_string()));
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    fn selected_index(&self) -> Option<usize> {
        let selected = self.selected?;
        self.tree
            .visible_rows()
            .iter()
            .position(|entry| entry.id == selected)
    }

    fn select_index(&mut self, index: usize) {
        let visible = self.tree.visible_rows();
        self.selected = visible
            .get(index.min(visible.len().saturating_sub(1)))
            .map(|entry| entry.id);
    }

    fn select_relative(&mut self, delta: isize) {
        let index = self.selected_index().unwrap_or(0);
        self.select_index(index.saturating_add_signed(delta));
    }

    fn fold_or_ascend(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if !row.children().is_empty() && !row.folded {
            if let Some(id) = self.selected {
                self.tree.toggle_fold(id);
            }
        } else if let Some(parent) = row.parent() {
            self.selected = Some(parent);
        }
    }

    fn unfold(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if row.folded {
            if let Some(id) = self.selected {
                self.tree.toggle_fold(id);
            }
        } else if let Some(first) = row.children().first() {
            self.selected = Some(*first);
        }
    }
}
