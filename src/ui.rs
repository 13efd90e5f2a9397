use std::collections::HashMap;
use std::io::{self, Stdout};
use std::ops::Range;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use unicode_width::UnicodeWidthStr;

use crate::daily::Block as DailyBlock;
use crate::entries::{Card, CardPhase, EntryList, LOADING_TEXT, LOAD_FAILED_TEXT};
use crate::nav::{ClickTarget, NavItem, ROW_UNITS};
use crate::preferences::{Section, Theme, FONT_SIZE_MIN};
use crate::reader::{DailyView, Loadable, Reader, FUTURE_NOTE};
use crate::theme::{self, Palette};

const APP_TITLE: &str = "玄門經文";
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const TICK_RATE: Duration = Duration::from_millis(120);
const FRAME_RATE: Duration = Duration::from_millis(16);
const MIN_READING_WIDTH: u16 = 24;
const DRAWER_WIDTH: u16 = 34;
const WHEEL_ROWS: i64 = 3;
const BACK_TO_TOP_LABEL: &str = " ↑ 回到頂部 ";
const FOOTER_HINTS: &str =
    "q 離開 · n 目錄 · j/k 捲動 · Tab 焦點 · Enter 展開 · +/- 字體 · t 主題 · r 重新載入";

pub fn section_title(section: Section) -> &'static str {
    match section {
        Section::Daily => "每日功課",
        Section::Baogao => "寶誥",
        Section::Future => "更多經文",
    }
}

/// Something on the page that reacts to Enter or a click.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Focus {
    Section(Section),
    Card(u32),
    Source(String),
}

#[derive(Debug, Clone)]
struct Target {
    rows: Range<usize>,
    focus: Focus,
}

/// The page flattened into terminal rows, with anchor rows and the row
/// spans of everything clickable.
#[derive(Debug, Default)]
struct PageLayout {
    lines: Vec<Line<'static>>,
    anchors: HashMap<String, usize>,
    targets: Vec<Target>,
}

impl PageLayout {
    fn row(&self) -> usize {
        self.lines.len()
    }

    fn push(&mut self, line: Line<'static>) {
        self.lines.push(line);
    }

    fn extend(&mut self, lines: Vec<Line<'static>>) {
        self.lines.extend(lines);
    }

    fn anchor(&mut self, anchor: &str) {
        self.anchors.insert(anchor.to_string(), self.row());
    }

    fn target(&mut self, start: usize, focus: Focus) {
        let end = self.row().max(start + 1);
        self.targets.push(Target {
            rows: start..end,
            focus,
        });
    }

    fn target_at(&self, row: usize) -> Option<&Target> {
        self.targets.iter().find(|target| target.rows.contains(&row))
    }

    fn anchor_offset(&self, anchor: &str) -> Option<u32> {
        self.anchors.get(anchor).map(|row| *row as u32 * ROW_UNITS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolbarAction {
    Drawer,
    FontDown,
    FontUp,
    Theme,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DrawerRow {
    Group(&'static str),
    Item(NavItem),
}

impl DrawerRow {
    fn anchor(&self) -> Option<&str> {
        match self {
            DrawerRow::Item(item) => item.target.as_deref(),
            DrawerRow::Group(_) => None,
        }
    }
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= TICK_RATE {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

pub struct Model {
    reader: Reader,
    status_message: String,
    spinner: Spinner,
    focus: Option<Focus>,
    layout: PageLayout,
    layout_stale: bool,
    viewport: Rect,
    column: Rect,
    toolbar_hits: Vec<(Range<u16>, ToolbarAction)>,
    toolbar_row: u16,
    back_to_top_hit: Option<Rect>,
    drawer_area: Option<Rect>,
    drawer_selected: usize,
    drawer_offset: usize,
    needs_redraw: bool,
}

impl Model {
    pub fn new(reader: Reader) -> Self {
        let viewport = Rect::new(0, 1, 80, 22);
        let mut model = Self {
            reader,
            status_message: "載入經文中…".to_string(),
            spinner: Spinner::new(),
            focus: None,
            layout: PageLayout::default(),
            layout_stale: true,
            viewport,
            column: viewport,
            toolbar_hits: Vec::new(),
            toolbar_row: 0,
            back_to_top_hit: None,
            drawer_area: None,
            drawer_selected: 0,
            drawer_offset: 0,
            needs_redraw: true,
        };
        model.refresh_layout();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(DisableMouseCapture)?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }
            if self.tick_chrome(Instant::now()) {
                self.needs_redraw = true;
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = if self.reader.chrome().is_animating() {
                FRAME_RATE
            } else {
                TICK_RATE
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(FRAME_RATE)
            };

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                tracing::warn!(error = %format!("{err:#}"), "key action failed");
                                self.status_message = format!("錯誤：{err}");
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Mouse(mouse) => {
                        if let Err(err) = self.handle_mouse(mouse) {
                            tracing::warn!(error = %format!("{err:#}"), "mouse action failed");
                            self.status_message = format!("錯誤：{err}");
                            self.mark_dirty();
                        }
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= TICK_RATE {
                last_tick = Instant::now();
                if self.reader.is_loading() {
                    if self.spinner.advance() {
                        self.needs_redraw = true;
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.layout_stale = true;
        self.needs_redraw = true;
    }

    fn poll_async(&mut self) -> bool {
        let was_loading = self.reader.is_loading();
        if !self.reader.poll() {
            return false;
        }
        if was_loading && !self.reader.is_loading() {
            self.status_message = self.loaded_status();
        }
        true
    }

    fn loaded_status(&self) -> String {
        let failed = self.reader.daily().is_failed() || self.reader.entries().is_failed();
        if failed {
            "部分內容載入失敗，按 r 重新載入".to_string()
        } else {
            String::new()
        }
    }

    fn busy_status(&self) -> String {
        match self.reader.entries().ready().map(EntryList::pending) {
            Some(pending) if pending > 0 => format!("載入寶誥 {pending} 篇…"),
            _ => self.status_message.clone(),
        }
    }

    fn tick_chrome(&mut self, now: Instant) -> bool {
        if self.layout_stale {
            self.refresh_layout();
        }
        let layout = &self.layout;
        self.reader
            .chrome_mut()
            .tick(now, |anchor| layout.anchor_offset(anchor))
    }

    fn refresh_layout(&mut self) {
        let palette = theme::palette(self.reader.prefs().theme());
        let width = reading_width(self.viewport.width, self.reader.prefs().font_size());
        self.layout = build_page(&self.reader, width as usize, palette, self.focus.as_ref());
        let overflow = self
            .layout
            .lines
            .len()
            .saturating_sub(self.viewport.height as usize);
        self.reader
            .chrome_mut()
            .set_max_position(overflow as u32 * ROW_UNITS, Instant::now());
        self.layout_stale = false;
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let now = Instant::now();
        let drawer_open = self.reader.chrome().drawer_open();

        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('+') | KeyCode::Char('=') => self.perform(ToolbarAction::FontUp),
            KeyCode::Char('-') => self.perform(ToolbarAction::FontDown),
            KeyCode::Char('t') => self.perform(ToolbarAction::Theme),
            KeyCode::Char('n') | KeyCode::Char('m') => self.perform(ToolbarAction::Drawer),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('o') => self.open_source()?,
            KeyCode::Esc if drawer_open => {
                self.reader.chrome_mut().close_drawer();
                self.mark_dirty();
            }
            _ if drawer_open => self.handle_drawer_key(code, now),
            KeyCode::Down | KeyCode::Char('j') => self.scroll(1, now),
            KeyCode::Up | KeyCode::Char('k') => self.scroll(-1, now),
            KeyCode::PageDown => self.scroll(self.page_rows(), now),
            KeyCode::PageUp => self.scroll(-self.page_rows(), now),
            KeyCode::Home | KeyCode::Char('g') => {
                self.reader.chrome_mut().back_to_top(now);
                self.needs_redraw = true;
            }
            KeyCode::Tab => self.move_focus(1, now),
            KeyCode::BackTab => self.move_focus(-1, now),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(focus) = self.focus.clone() {
                    self.activate(&focus)?;
                }
            }
            KeyCode::Char(ch @ '1'..='3') => {
                let section = Section::ALL[(ch as u8 - b'1') as usize];
                self.activate(&Focus::Section(section))?;
            }
            _ => {}
        }

        Ok(false)
    }

    fn handle_drawer_key(&mut self, code: KeyCode, now: Instant) {
        match code {
            KeyCode::Down | KeyCode::Char('j') => self.move_drawer_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_drawer_selection(-1),
            KeyCode::Enter | KeyCode::Char(' ') => {
                let rows = drawer_rows(&self.reader);
                if let Some(anchor) = rows.get(self.drawer_selected).and_then(DrawerRow::anchor) {
                    let anchor = anchor.to_string();
                    self.navigate(&anchor, now);
                }
            }
            _ => {}
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent) -> Result<()> {
        let now = Instant::now();
        match event.kind {
            MouseEventKind::ScrollDown => self.scroll(WHEEL_ROWS, now),
            MouseEventKind::ScrollUp => self.scroll(-WHEEL_ROWS, now),
            MouseEventKind::Down(MouseButton::Left) => {
                self.handle_click(event.column, event.row, now)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_click(&mut self, column: u16, row: u16, now: Instant) -> Result<()> {
        let toolbar = self.toolbar_action_at(column, row);

        if self.reader.chrome().drawer_open() {
            if let Some(area) = self.drawer_area.filter(|area| hit(*area, column, row)) {
                let index = self.drawer_offset + row.saturating_sub(area.y + 1) as usize;
                let rows = drawer_rows(&self.reader);
                if let Some(anchor) = rows.get(index).and_then(DrawerRow::anchor) {
                    let anchor = anchor.to_string();
                    self.navigate(&anchor, now);
                }
                return Ok(());
            }
            let target = if toolbar == Some(ToolbarAction::Drawer) {
                ClickTarget::DrawerToggle
            } else {
                ClickTarget::Elsewhere
            };
            if self.reader.chrome_mut().handle_click(target) {
                self.mark_dirty();
                return Ok(());
            }
        }

        if let Some(action) = toolbar {
            self.perform(action);
            return Ok(());
        }

        if self
            .back_to_top_hit
            .is_some_and(|area| hit(area, column, row))
        {
            self.reader.chrome_mut().back_to_top(now);
            self.needs_redraw = true;
            return Ok(());
        }

        if hit(self.column, column, row) {
            let page_row = self.reader.chrome().position_rows() as usize
                + (row - self.column.y) as usize;
            if let Some(target) = self.layout.target_at(page_row) {
                let focus = target.focus.clone();
                self.focus = Some(focus.clone());
                self.activate(&focus)?;
                self.mark_dirty();
            }
        }
        Ok(())
    }

    fn perform(&mut self, action: ToolbarAction) {
        match action {
            ToolbarAction::Drawer => {
                self.reader.chrome_mut().toggle_drawer();
                if self.reader.chrome().drawer_open() {
                    self.drawer_selected = 0;
                    self.drawer_offset = 0;
                    self.move_drawer_selection(1);
                }
            }
            ToolbarAction::FontDown | ToolbarAction::FontUp => {
                let direction = if action == ToolbarAction::FontUp { 1 } else { -1 };
                let size = self.reader.change_font_size(direction);
                self.status_message = format!("字體大小 {size}");
            }
            ToolbarAction::Theme => {
                let theme = self.reader.toggle_theme();
                self.status_message = match theme {
                    Theme::Light => "已切換為淺色主題".to_string(),
                    Theme::Dark => "已切換為深色主題".to_string(),
                };
            }
        }
        self.mark_dirty();
    }

    fn activate(&mut self, focus: &Focus) -> Result<()> {
        match focus {
            Focus::Section(section) => {
                self.reader.toggle_section(*section);
            }
            Focus::Card(id) => {
                self.reader.toggle_entry(*id);
            }
            Focus::Source(url) => self.open_link(url)?,
        }
        self.mark_dirty();
        Ok(())
    }

    fn navigate(&mut self, anchor: &str, now: Instant) {
        tracing::debug!(anchor, "navigating");
        self.reader.navigate(anchor, now);
        self.mark_dirty();
    }

    fn scroll(&mut self, rows: i64, now: Instant) {
        if self.reader.chrome_mut().scroll_rows(rows, now) {
            self.needs_redraw = true;
        }
    }

    fn page_rows(&self) -> i64 {
        (self.viewport.height as i64 - 1).max(1)
    }

    fn reload(&mut self) {
        if self.reader.reload_failed() {
            self.status_message = "重新載入中…".to_string();
        } else {
            self.status_message = "沒有需要重新載入的內容".to_string();
        }
        self.mark_dirty();
    }

    fn move_focus(&mut self, step: i64, now: Instant) {
        if self.layout_stale {
            self.refresh_layout();
        }
        let targets = &self.layout.targets;
        if targets.is_empty() {
            return;
        }
        let current = self
            .focus
            .as_ref()
            .and_then(|focus| targets.iter().position(|target| &target.focus == focus));
        let next = match current {
            Some(index) => (index as i64 + step).rem_euclid(targets.len() as i64) as usize,
            None => {
                let top = self.reader.chrome().position_rows() as usize;
                targets
                    .iter()
                    .position(|target| target.rows.start >= top)
                    .unwrap_or(0)
            }
        };
        let start = targets[next].rows.start;
        self.focus = Some(targets[next].focus.clone());
        self.ensure_row_visible(start, now);
        self.mark_dirty();
    }

    fn ensure_row_visible(&mut self, row: usize, now: Instant) {
        let top = self.reader.chrome().position_rows() as usize;
        let height = self.viewport.height as usize;
        if row < top || row >= top + height {
            let target = row.saturating_sub(2) as u32 * ROW_UNITS;
            self.reader.chrome_mut().smooth_scroll_to(target, now);
        }
    }

    fn move_drawer_selection(&mut self, step: i64) {
        let rows = drawer_rows(&self.reader);
        let interactive: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.anchor().is_some())
            .map(|(index, _)| index)
            .collect();
        if interactive.is_empty() {
            return;
        }
        let next = match interactive.iter().position(|i| *i == self.drawer_selected) {
            Some(pos) => {
                let pos = (pos as i64 + step).clamp(0, interactive.len() as i64 - 1);
                interactive[pos as usize]
            }
            None => interactive[0],
        };
        self.drawer_selected = next;
        self.needs_redraw = true;
    }

    fn open_source(&mut self) -> Result<()> {
        let url = match &self.focus {
            Some(Focus::Source(url)) => Some(url.clone()),
            _ => self.default_source_url(),
        };
        match url {
            Some(url) => self.open_link(&url),
            None => {
                self.status_message = "目前沒有可開啟的來源連結".to_string();
                self.needs_redraw = true;
                Ok(())
            }
        }
    }

    fn default_source_url(&self) -> Option<String> {
        let daily = self.reader.daily().ready().and_then(|view| {
            view.page.blocks.iter().find_map(|block| match block {
                DailyBlock::Byline { url, .. } => Some(url.clone()),
                _ => None,
            })
        });
        daily.or_else(|| {
            self.reader
                .entries()
                .ready()
                .map(|list| list.source_url().to_string())
        })
    }

    fn open_link(&mut self, url: &str) -> Result<()> {
        webbrowser::open(url).with_context(|| format!("開啟連結失敗 {url}"))?;
        self.status_message = format!("已在瀏覽器開啟 {url}");
        self.needs_redraw = true;
        Ok(())
    }

    fn toolbar_action_at(&self, column: u16, row: u16) -> Option<ToolbarAction> {
        if row != self.toolbar_row {
            return None;
        }
        self.toolbar_hits
            .iter()
            .find(|(range, _)| range.contains(&column))
            .map(|(_, action)| *action)
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let palette = *theme::palette(self.reader.prefs().theme());
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(palette.bg)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        if layout[1] != self.viewport {
            self.viewport = layout[1];
            self.layout_stale = true;
        }
        if self.layout_stale {
            self.refresh_layout();
        }

        self.draw_toolbar(frame, layout[0], &palette);
        self.draw_page(frame, layout[1], &palette);
        self.draw_footer(frame, layout[2], &palette);

        if self.reader.chrome().drawer_open() {
            self.draw_drawer(frame, layout[1], &palette);
        } else {
            self.drawer_area = None;
        }
    }

    fn draw_toolbar(&mut self, frame: &mut Frame<'_>, area: Rect, palette: &Palette) {
        let bar = Style::default()
            .fg(palette.text_primary)
            .bg(palette.panel_focused_bg);
        let button = bar.fg(palette.accent).add_modifier(Modifier::BOLD);

        let prefs = self.reader.prefs();
        let buttons = [
            (" A- ".to_string(), Some(ToolbarAction::FontDown)),
            (format!(" {} ", prefs.font_size()), None),
            (" A+ ".to_string(), Some(ToolbarAction::FontUp)),
            (
                format!(" {} ", prefs.theme().toggle_icon()),
                Some(ToolbarAction::Theme),
            ),
        ];
        let right_width: u16 = buttons
            .iter()
            .map(|(label, _)| UnicodeWidthStr::width(label.as_str()) as u16)
            .sum();

        self.toolbar_row = area.y;
        self.toolbar_hits.clear();
        let toggle = " ☰ ";
        let toggle_width = UnicodeWidthStr::width(toggle) as u16;
        self.toolbar_hits
            .push((area.x..area.x + toggle_width, ToolbarAction::Drawer));

        let status = if self.reader.is_loading() {
            format!("{} {}", self.spinner.frame(), self.busy_status())
        } else {
            self.status_message.clone()
        };
        let left = Line::from(vec![
            Span::styled(toggle, button),
            Span::styled(format!(" {APP_TITLE} "), bar.add_modifier(Modifier::BOLD)),
            Span::styled(format!(" {}", status.trim()), bar.fg(palette.text_secondary)),
        ]);

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(right_width)])
            .split(area);
        frame.render_widget(Paragraph::new(left).style(bar), chunks[0]);

        let mut x = chunks[1].x;
        let mut spans = Vec::with_capacity(buttons.len());
        for (label, action) in buttons {
            let width = UnicodeWidthStr::width(label.as_str()) as u16;
            match action {
                Some(action) => {
                    self.toolbar_hits.push((x..x + width, action));
                    spans.push(Span::styled(label, button));
                }
                None => spans.push(Span::styled(label, bar)),
            }
            x += width;
        }
        frame.render_widget(Paragraph::new(Line::from(spans)).style(bar), chunks[1]);
    }

    fn draw_page(&mut self, frame: &mut Frame<'_>, area: Rect, palette: &Palette) {
        let width = reading_width(area.width, self.reader.prefs().font_size());
        let column = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y,
            width,
            height: area.height,
        };
        self.column = column;

        let start = (self.reader.chrome().position_rows() as usize).min(self.layout.lines.len());
        let end = (start + area.height as usize).min(self.layout.lines.len());
        let visible: Vec<Line<'static>> = self.layout.lines[start..end].to_vec();
        let page = Paragraph::new(visible).style(
            Style::default()
                .fg(palette.text_primary)
                .bg(palette.bg),
        );
        frame.render_widget(page, column);

        self.back_to_top_hit = None;
        if self.reader.chrome().back_to_top_visible() && area.height > 1 {
            let label_width = UnicodeWidthStr::width(BACK_TO_TOP_LABEL) as u16;
            let rect = Rect {
                x: area.right().saturating_sub(label_width + 1),
                y: area.bottom() - 1,
                width: label_width.min(area.width),
                height: 1,
            };
            let button = Paragraph::new(BACK_TO_TOP_LABEL).style(
                Style::default()
                    .fg(palette.bg)
                    .bg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            );
            frame.render_widget(button, rect);
            self.back_to_top_hit = Some(rect);
        }
    }

    fn draw_footer(&self, frame: &mut Frame<'_>, area: Rect, palette: &Palette) {
        let footer = Paragraph::new(FOOTER_HINTS)
            .style(
                Style::default()
                    .fg(palette.text_secondary)
                    .bg(palette.panel_bg)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center);
        frame.render_widget(footer, area);
    }

    fn draw_drawer(&mut self, frame: &mut Frame<'_>, area: Rect, palette: &Palette) {
        let drawer = Rect {
            width: DRAWER_WIDTH.min(area.width),
            ..area
        };
        frame.render_widget(Clear, drawer);
        self.drawer_area = Some(drawer);

        let block = Block::default()
            .title(Span::styled(
                " 目錄 ",
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border_focused))
            .style(Style::default().bg(palette.panel_bg));
        let inner = block.inner(drawer);
        frame.render_widget(block, drawer);

        let rows = drawer_rows(&self.reader);
        let height = inner.height as usize;
        if self.drawer_selected < self.drawer_offset {
            self.drawer_offset = self.drawer_selected;
        } else if height > 0 && self.drawer_selected >= self.drawer_offset + height {
            self.drawer_offset = self.drawer_selected + 1 - height;
        }

        let lines: Vec<Line<'static>> = rows
            .iter()
            .enumerate()
            .skip(self.drawer_offset)
            .take(height)
            .map(|(index, row)| drawer_line(row, index == self.drawer_selected, palette))
            .collect();
        frame.render_widget(Paragraph::new(lines), inner);
    }
}

fn hit(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x && column < area.right() && row >= area.y && row < area.bottom()
}

/// Narrows the reading column as the font grows, the way larger type
/// fits fewer characters on a line.
fn reading_width(area_width: u16, font_size: i64) -> u16 {
    let font_size = font_size.max(FONT_SIZE_MIN);
    let scaled = (area_width as i64 * FONT_SIZE_MIN / font_size) as u16;
    scaled.clamp(MIN_READING_WIDTH.min(area_width), area_width)
}

fn drawer_rows(reader: &Reader) -> Vec<DrawerRow> {
    let mut rows = vec![DrawerRow::Group(section_title(Section::Daily))];
    rows.extend(reader.daily_nav().iter().cloned().map(DrawerRow::Item));
    rows.push(DrawerRow::Group(section_title(Section::Baogao)));
    rows.extend(reader.entry_nav().iter().cloned().map(DrawerRow::Item));
    rows
}

fn drawer_line(row: &DrawerRow, selected: bool, palette: &Palette) -> Line<'static> {
    match row {
        DrawerRow::Group(title) => Line::from(Span::styled(
            (*title).to_string(),
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        )),
        DrawerRow::Item(item) if !item.is_interactive() => Line::from(Span::styled(
            format!("  {}", item.label),
            Style::default()
                .fg(palette.text_secondary)
                .add_modifier(Modifier::ITALIC),
        )),
        DrawerRow::Item(item) => {
            let style = if selected {
                Style::default()
                    .fg(palette.text_primary)
                    .bg(palette.panel_selected_bg)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.text_primary)
            };
            let marker = if selected { "▶ " } else { "  " };
            Line::from(Span::styled(format!("{marker}{}", item.label), style))
        }
    }
}

fn build_page(
    reader: &Reader,
    width: usize,
    palette: &Palette,
    focus: Option<&Focus>,
) -> PageLayout {
    let mut page = PageLayout::default();
    for section in Section::ALL {
        let expanded = reader.prefs().section_expanded(section);
        let header = Focus::Section(section);
        let start = page.row();
        let marker = if expanded { "▼" } else { "▶" };
        let mut style = Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD);
        if focus == Some(&header) {
            style = style.bg(palette.panel_selected_bg);
        }
        page.push(Line::from(Span::styled(
            format!("{marker} {}", section_title(section)),
            style,
        )));
        page.target(start, header);
        page.push(Line::default());

        if expanded {
            match section {
                Section::Daily => push_daily(&mut page, reader.daily(), width, palette, focus),
                Section::Baogao => push_entries(&mut page, reader.entries(), width, palette, focus),
                Section::Future => page.extend(wrap_plain(
                    FUTURE_NOTE,
                    width,
                    Style::default()
                        .fg(palette.text_secondary)
                        .add_modifier(Modifier::ITALIC),
                )),
            }
            page.push(Line::default());
        }
    }
    page
}

fn push_status<T>(page: &mut PageLayout, state: &Loadable<T>, width: usize, palette: &Palette) {
    match state {
        Loadable::Loading => page.push(Line::from(Span::styled(
            LOADING_TEXT,
            Style::default()
                .fg(palette.text_secondary)
                .add_modifier(Modifier::ITALIC),
        ))),
        Loadable::Failed(message) => page.extend(wrap_plain(
            message,
            width,
            Style::default()
                .fg(palette.error)
                .add_modifier(Modifier::BOLD),
        )),
        Loadable::Ready(_) => {}
    }
}

fn push_source(
    page: &mut PageLayout,
    label: String,
    url: &str,
    width: usize,
    palette: &Palette,
    focus: Option<&Focus>,
) {
    let target = Focus::Source(url.to_string());
    let mut style = Style::default()
        .fg(palette.accent)
        .add_modifier(Modifier::UNDERLINED);
    if focus == Some(&target) {
        style = style.bg(palette.panel_selected_bg);
    }
    let start = page.row();
    page.extend(wrap_plain(&label, width, style));
    page.target(start, target);
}

fn push_daily(
    page: &mut PageLayout,
    state: &Loadable<DailyView>,
    width: usize,
    palette: &Palette,
    focus: Option<&Focus>,
) {
    let Loadable::Ready(view) = state else {
        push_status(page, state, width, palette);
        return;
    };

    let text = Style::default().fg(palette.text_primary);
    let intro = Style::default()
        .fg(palette.text_secondary)
        .add_modifier(Modifier::ITALIC);

    for block in &view.page.blocks {
        match block {
            DailyBlock::Byline { source, url } => {
                push_source(page, format!("📖 來源：{source}"), url, width, palette, focus);
            }
            DailyBlock::Heading { anchor, title } => {
                page.push(Line::default());
                page.anchor(anchor);
                page.extend(wrap_plain(
                    title,
                    width,
                    Style::default()
                        .fg(palette.highlight)
                        .add_modifier(Modifier::BOLD),
                ));
            }
            DailyBlock::Subheading { anchor, title } => {
                page.push(Line::default());
                page.anchor(anchor);
                page.extend(wrap_with_prefix(
                    title,
                    width,
                    "◆ ",
                    text.add_modifier(Modifier::BOLD),
                ));
            }
            DailyBlock::Intro(line) => page.extend(wrap_plain(line, width, intro)),
            DailyBlock::Paragraph(line) => page.extend(wrap_plain(line, width, text)),
            DailyBlock::Deity(deity) => {
                let label = format!("〔{deity}〕");
                let pad = width.saturating_sub(UnicodeWidthStr::width(label.as_str()));
                page.push(Line::from(vec![
                    Span::raw(" ".repeat(pad)),
                    Span::styled(label, Style::default().fg(palette.highlight)),
                ]));
            }
        }
    }
}

fn push_entries(
    page: &mut PageLayout,
    state: &Loadable<EntryList>,
    width: usize,
    palette: &Palette,
    focus: Option<&Focus>,
) {
    let Loadable::Ready(list) = state else {
        push_status(page, state, width, palette);
        return;
    };

    page.extend(wrap_plain(
        &list.summary_line(),
        width,
        Style::default().fg(palette.text_primary),
    ));
    push_source(
        page,
        format!("來源：{}", list.source()),
        list.source_url(),
        width,
        palette,
        focus,
    );
    page.push(Line::default());

    for card in list.cards() {
        push_card(page, card, width, palette, focus);
        page.push(Line::default());
    }
}

fn push_card(
    page: &mut PageLayout,
    card: &Card,
    width: usize,
    palette: &Palette,
    focus: Option<&Focus>,
) {
    let target = Focus::Card(card.id());
    let focused = focus == Some(&target);
    let start = page.row();
    page.anchor(&card.anchor());

    let mut header = Style::default()
        .fg(palette.text_primary)
        .bg(palette.panel_bg)
        .add_modifier(Modifier::BOLD);
    if focused {
        header = header.bg(palette.panel_selected_bg);
    }
    let marker = if card.expanded() { "▾" } else { "▸" };
    let title = format!("{marker} {}", card.title());
    let number = card.number_label();
    let used = UnicodeWidthStr::width(title.as_str()) + UnicodeWidthStr::width(number.as_str());
    let pad = width.saturating_sub(used).max(1);
    page.push(Line::from(vec![
        Span::styled(title, header),
        Span::styled(" ".repeat(pad), header),
        Span::styled(number, header.fg(palette.text_secondary)),
    ]));

    let body = Style::default().fg(palette.text_primary);
    match card.phase() {
        CardPhase::ExpandedUnloaded => page.extend(wrap_with_prefix(
            LOADING_TEXT,
            width,
            "  ",
            Style::default()
                .fg(palette.text_secondary)
                .add_modifier(Modifier::ITALIC),
        )),
        CardPhase::ExpandedLoaded => {
            if let Some(detail) = card.body() {
                page.extend(wrap_with_prefix(
                    &detail.intro,
                    width,
                    "  ",
                    Style::default().fg(palette.highlight),
                ));
                for line in detail.content.split('\n') {
                    page.extend(wrap_with_prefix(line, width, "  ", body));
                }
            }
        }
        CardPhase::ExpandedError => page.extend(wrap_with_prefix(
            LOAD_FAILED_TEXT,
            width,
            "  ",
            Style::default().fg(palette.error),
        )),
        CardPhase::CollapsedUnloaded | CardPhase::CollapsedLoaded | CardPhase::CollapsedError => {}
    }

    page.target(start, target);
}

fn wrap_with_prefixes(
    text: &str,
    width: usize,
    first_prefix: &str,
    rest_prefix: &str,
    style: Style,
) -> Vec<Line<'static>> {
    if text.trim().is_empty() {
        return vec![Line::from(Span::styled(String::new(), style))];
    }

    if width == 0 {
        return vec![Line::from(Span::styled(format!("{first_prefix}{text}"), style))];
    }

    let min_width = UnicodeWidthStr::width(first_prefix)
        .max(UnicodeWidthStr::width(rest_prefix))
        .saturating_add(2);
    let options = WrapOptions::new(width.max(min_width))
        .initial_indent(first_prefix)
        .subsequent_indent(rest_prefix);

    wrap(text, options)
        .into_iter()
        .map(|cow| Line::from(Span::styled(cow.into_owned(), style)))
        .collect()
}

fn wrap_plain(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    wrap_with_prefixes(text, width, "", "", style)
}

fn wrap_with_prefix(text: &str, width: usize, prefix: &str, style: Style) -> Vec<Line<'static>> {
    wrap_with_prefixes(text, width, prefix, prefix, style)
}
