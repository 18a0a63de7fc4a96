#![allow(clippy::too_many_lines)]

use crate::cli::{Cli, TransportMode};
use crate::config::{self, SLOT_COUNT};
use crate::picker::FileBrowser;
use crate::prefs::{self, Prefs};
use crate::render::{self, GridRenderer, SlotGeometry};
use crate::stream::{OpenSummary, PollResult, SlotView, StreamManager};
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use std::collections::hash_map::DefaultHasher;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const GLYPH_ACTIVE: &str = "▸";
const GLYPH_BULLET: &str = "•";

const COLOR_TEXT: Color = Color::Rgb(231, 235, 243);
const COLOR_MUTED: Color = Color::Rgb(145, 152, 170);
const COLOR_BORDER: Color = Color::Rgb(88, 98, 120);
const COLOR_BORDER_ACTIVE: Color = Color::Rgb(114, 140, 255);
const COLOR_ACCENT: Color = Color::Rgb(102, 216, 255);
const COLOR_SUCCESS: Color = Color::Rgb(103, 212, 142);
const COLOR_WARNING: Color = Color::Rgb(255, 198, 109);
const COLOR_ERROR: Color = Color::Rgb(255, 121, 134);

pub async fn run_tui(cli: Cli) -> Result<()> {
    let mut app = App::load(&cli);
    let mut terminal = init_terminal()?;

    let run_result = run_loop(&mut terminal, &mut app).await;
    // Shared shutdown path: workers are torn down whether the loop ended on
    // quit or on an error, and the terminal is restored before any error
    // surfaces.
    app.close_streams();
    let _ = app.renderer.clear_images(terminal.backend_mut());
    let restore_result = restore_terminal(&mut terminal);

    run_result?;
    restore_result?;
    Ok(())
}

async fn run_loop(terminal: &mut AppTerminal, app: &mut App) -> Result<()> {
    let mut running = true;
    let mut force_ui_draw = true;
    let mut last_ui_signature = None;

    while running {
        app.poll_open_result().await;
        app.drain_streams();

        let current_ui_signature = app.ui_state_signature();
        let should_draw_ui =
            force_ui_draw || last_ui_signature.is_none_or(|prev| prev != current_ui_signature);
        if should_draw_ui {
            terminal
                .draw(|frame| app.draw(frame))
                .context("failed drawing TUI frame")?;
            last_ui_signature = Some(current_ui_signature);
            force_ui_draw = false;
        }

        let graphics_active = app.renderer.kitty_enabled() && app.streams_active();
        if graphics_active || should_draw_ui {
            if let Err(err) = app.flush_graphics(terminal) {
                app.status = format!("graphics render failed: {err:#}");
                force_ui_draw = true;
            }
        }

        while event::poll(Duration::ZERO).context("failed to poll input")? {
            match event::read().context("failed reading input")? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match app.handle_key(key) {
                        AppCommand::None => {}
                        AppCommand::Quit => {
                            running = false;
                            break;
                        }
                    }
                    force_ui_draw = true;
                }
                Event::Resize(_, _) => {
                    // Terminal geometry changed; force a full redraw of TUI chrome.
                    force_ui_draw = true;
                    last_ui_signature = None;
                }
                _ => {}
            }
        }

        if !running {
            break;
        }

        if app.renderer.kitty_enabled() && app.streams_active() {
            tokio::task::yield_now().await;
            continue;
        }
        tokio::time::sleep(app.tick).await;
    }

    Ok(())
}

type AppTerminal = Terminal<CrosstermBackend<io::Stdout>>;

fn init_terminal() -> Result<AppTerminal> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("failed creating terminal")
}

fn restore_terminal(terminal: &mut AppTerminal) -> Result<()> {
    disable_raw_mode().context("failed disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed leaving alternate screen")?;
    terminal.show_cursor().context("failed showing cursor")?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppCommand {
    None,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Phase {
    Idle,
    Opening,
    Running,
}

struct App {
    phase: Phase,
    config_path: String,
    editing_path: bool,
    edit_buffer: String,
    browser: Option<FileBrowser>,
    status: String,
    transport: TransportMode,
    tick: Duration,
    manager: Option<StreamManager>,
    pending_open: Option<JoinHandle<(StreamManager, OpenSummary)>>,
    geometry_tx: watch::Sender<SlotGeometry>,
    geometry_rx: watch::Receiver<SlotGeometry>,
    renderer: GridRenderer,
}

impl App {
    fn new(
        config_path: String,
        transport: TransportMode,
        tick: Duration,
        kitty_enabled: bool,
    ) -> Self {
        let (geometry_tx, geometry_rx) = watch::channel(SlotGeometry::default());
        Self {
            phase: Phase::Idle,
            config_path,
            editing_path: false,
            edit_buffer: String::new(),
            browser: None,
            status: "press s to start the grid".to_owned(),
            transport,
            tick,
            manager: None,
            pending_open: None,
            geometry_tx,
            geometry_rx,
            renderer: GridRenderer::new(kitty_enabled),
        }
    }

    fn load(cli: &Cli) -> Self {
        let saved = match prefs::load_prefs() {
            Ok(prefs) => prefs.last_config_path,
            Err(err) => {
                tracing::warn!("failed loading prefs: {err:#}");
                None
            }
        };
        let config_path = cli
            .config
            .clone()
            .or(saved)
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "channels.json".to_owned());
        Self::new(
            config_path,
            cli.transport,
            Duration::from_millis(cli.tick_ms.max(1)),
            render::detect_kitty_graphics_support(),
        )
    }

    /// Loads the config document and kicks off the open task. Opening is
    /// only legal from idle; a second start while streams are up is refused
    /// so workers can never be double-spawned.
    fn start_streams(&mut self) {
        if self.phase != Phase::Idle {
            self.status = "start rejected: streams already running".to_owned();
            return;
        }

        let path = PathBuf::from(self.config_path.trim());
        let loaded = match config::load_channels(&path) {
            Ok(loaded) => loaded,
            Err(err) => {
                self.status = format!("config error: {err}");
                tracing::error!("failed loading channels: {err:#}");
                return;
            }
        };
        if loaded.entries.is_empty() {
            self.status = "no channels in config".to_owned();
            return;
        }
        if loaded.dropped > 0 {
            tracing::warn!(
                "config lists {} channel(s) beyond the grid; extras ignored",
                loaded.dropped
            );
        }
        self.save_last_config(&path);

        let entries = loaded.entries;
        let transport = self.transport;
        let geometry_rx = self.geometry_rx.clone();
        self.status = format!("opening {} channel(s)", entries.len());
        self.phase = Phase::Opening;
        self.renderer.reset();
        self.pending_open = Some(tokio::spawn(async move {
            StreamManager::open_all(entries, transport, geometry_rx).await
        }));
    }

    async fn poll_open_result(&mut self) {
        let Some(handle) = self.pending_open.take() else {
            return;
        };
        if !handle.is_finished() {
            self.pending_open = Some(handle);
            return;
        }
        match handle.await {
            Ok((manager, summary)) => self.apply_open_summary(manager, summary),
            Err(err) => {
                self.phase = Phase::Idle;
                self.status = format!("open task failed: {err}");
                tracing::error!("stream open task failed: {err}");
            }
        }
    }

    fn apply_open_summary(&mut self, manager: StreamManager, summary: OpenSummary) {
        tracing::info!(
            "opened {} of {} channel(s)",
            summary.opened,
            summary.requested
        );
        if summary.opened == 0 {
            // Keep the manager around so the grid still shows per-slot failure captions.
            self.phase = Phase::Idle;
            self.manager = Some(manager);
            self.status = match summary.failures.first() {
                Some(failure) => format!(
                    "no streams opened (slot {}: {})",
                    failure.slot + 1,
                    failure.detail
                ),
                None => "no streams opened".to_owned(),
            };
            return;
        }
        self.status = if summary.failures.is_empty() {
            format!("streaming {} channel(s)", summary.opened)
        } else {
            format!(
                "streaming {} channel(s), {} failed",
                summary.opened,
                summary.failures.len()
            )
        };
        self.phase = Phase::Running;
        self.manager = Some(manager);
    }

    /// Moves every freshly published frame into the renderer and hands the
    /// replaced buffers back to the workers. Never waits on the network;
    /// slots without a new frame keep their previous image.
    fn drain_streams(&mut self) {
        let Some(manager) = self.manager.as_mut() else {
            return;
        };
        for (slot, result) in manager.poll_all() {
            match result {
                PollResult::Frame(frame) => {
                    if let Some(replaced) = self.renderer.update(slot, frame) {
                        manager.recycle_frame(slot, replaced.rgb);
                    }
                }
                PollResult::Pending => {}
                PollResult::EndOfStream => {
                    tracing::info!("slot {slot} stream ended");
                }
                PollResult::ReadFailure(reason) => {
                    tracing::warn!("slot {slot} stream failed: {reason}");
                }
            }
        }
    }

    /// True while at least one slot still has a live worker. Once every
    /// stream has retired the loop can fall back to tick-paced sleeps.
    fn streams_active(&self) -> bool {
        self.phase == Phase::Running
            && self
                .manager
                .as_ref()
                .is_some_and(|manager| manager.open_count() > 0)
    }

    /// The one shutdown path: aborts a pending open, then tears down every
    /// worker through the manager.
    fn close_streams(&mut self) {
        if let Some(handle) = self.pending_open.take() {
            handle.abort();
        }
        if let Some(mut manager) = self.manager.take() {
            manager.close_all();
        }
        self.phase = Phase::Idle;
    }

    fn flush_graphics(&mut self, terminal: &mut AppTerminal) -> Result<()> {
        if !self.renderer.kitty_enabled() || self.manager.is_none() {
            return Ok(());
        }
        let size = terminal
            .size()
            .context("failed reading terminal size for graphics")?;
        let (_, grid_area, _) = render::view_layout(Rect::new(0, 0, size.width, size.height));
        let grid = render::grid_rects(grid_area);
        self.publish_geometry(&grid);
        self.renderer.flush_graphics(terminal.backend_mut(), &grid)
    }

    /// Tells the workers the current slot size so they scale frames to fit.
    /// Sends only on change; every worker observes the same geometry.
    fn publish_geometry(&self, grid: &[Rect]) {
        let Some(first) = grid.first().copied() else {
            return;
        };
        let geometry = render::slot_pixel_geometry(render::inner_cell(first));
        if *self.geometry_tx.borrow() != geometry {
            let _ = self.geometry_tx.send(geometry);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> AppCommand {
        // Ctrl+C arrives as a key event in raw mode; it quits from any state.
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return AppCommand::Quit;
        }
        if self.editing_path {
            return self.handle_edit_key(key);
        }
        if self.browser.is_some() {
            return self.handle_browser_key(key);
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => AppCommand::Quit,
            KeyCode::Char('e') | KeyCode::Char('i') => {
                self.edit_buffer = self.config_path.clone();
                self.editing_path = true;
                self.status = "editing config path".to_owned();
                AppCommand::None
            }
            KeyCode::Char('o') => {
                self.open_browser();
                AppCommand::None
            }
            KeyCode::Char('s') | KeyCode::Enter => {
                self.start_streams();
                AppCommand::None
            }
            _ => AppCommand::None,
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) -> AppCommand {
        match key.code {
            KeyCode::Enter => {
                self.config_path = self.edit_buffer.trim().to_owned();
                self.editing_path = false;
                self.status = "config path updated".to_owned();
            }
            KeyCode::Esc => {
                self.editing_path = false;
                self.status = "edit cancelled".to_owned();
            }
            _ => edit_text_field(&mut self.edit_buffer, key, true),
        }
        AppCommand::None
    }

    fn handle_browser_key(&mut self, key: KeyEvent) -> AppCommand {
        let Some(browser) = self.browser.as_mut() else {
            return AppCommand::None;
        };
        match key.code {
            KeyCode::Esc => {
                self.browser = None;
                self.status = "browse cancelled".to_owned();
            }
            KeyCode::Up => browser.move_up(),
            KeyCode::Down => browser.move_down(),
            KeyCode::Backspace => {
                if let Err(err) = browser.ascend() {
                    self.status = format!("browse failed: {err}");
                    self.browser = None;
                }
            }
            KeyCode::Enter => match browser.enter() {
                Ok(Some(path)) => {
                    self.config_path = path.display().to_string();
                    self.browser = None;
                    self.status = "config selected".to_owned();
                }
                Ok(None) => {}
                Err(err) => {
                    self.status = format!("browse failed: {err}");
                    self.browser = None;
                }
            },
            _ => {}
        }
        AppCommand::None
    }

    fn open_browser(&mut self) {
        let start = Path::new(self.config_path.trim())
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty() && dir.is_dir())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        match FileBrowser::open(start) {
            Ok(browser) => {
                self.browser = Some(browser);
                self.status = "pick a config document".to_owned();
            }
            Err(err) => self.status = format!("browse failed: {err}"),
        }
    }

    fn save_last_config(&self, path: &Path) {
        let prefs = Prefs {
            last_config_path: Some(path.to_path_buf()),
        };
        if let Err(err) = prefs::save_prefs(&prefs) {
            tracing::warn!("failed saving prefs: {err:#}");
        }
    }

    /// Fingerprint of everything the ratatui layer displays. The loop skips
    /// terminal.draw when it is unchanged; in kitty mode frame sequence
    /// numbers stay out of the hash because pixels flush separately.
    fn ui_state_signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.phase.hash(&mut hasher);
        self.config_path.hash(&mut hasher);
        self.editing_path.hash(&mut hasher);
        self.edit_buffer.hash(&mut hasher);
        self.status.hash(&mut hasher);
        self.pending_open.is_some().hash(&mut hasher);
        self.renderer.kitty_enabled().hash(&mut hasher);
        if let Some(browser) = &self.browser {
            true.hash(&mut hasher);
            browser.dir().hash(&mut hasher);
            browser.cursor().hash(&mut hasher);
            browser.entries().len().hash(&mut hasher);
        } else {
            false.hash(&mut hasher);
        }
        if let Some(manager) = &self.manager {
            for slot in 0..SLOT_COUNT {
                match manager.slot_view(slot) {
                    SlotView::Empty => 0_u8.hash(&mut hasher),
                    SlotView::Failed(caption) => {
                        1_u8.hash(&mut hasher);
                        caption.hash(&mut hasher);
                    }
                    SlotView::Live(snapshot) => {
                        2_u8.hash(&mut hasher);
                        snapshot.label.hash(&mut hasher);
                        snapshot.status.hash(&mut hasher);
                        snapshot.decode_errors.hash(&mut hasher);
                        if !self.renderer.kitty_enabled() {
                            self.renderer.frame_seq(slot).hash(&mut hasher);
                        }
                    }
                }
            }
        }
        hasher.finish()
    }

    fn draw(&self, frame: &mut ratatui::Frame<'_>) {
        let (header_area, grid_area, footer_area) = render::view_layout(frame.area());
        self.draw_header(frame, header_area);

        let grid = render::grid_rects(grid_area);
        for slot in 0..SLOT_COUNT {
            let Some(area) = grid.get(slot).copied() else {
                break;
            };
            self.draw_slot(frame, slot, area);
        }
        self.publish_geometry(&grid);

        self.draw_footer(frame, footer_area);
        if let Some(browser) = &self.browser {
            self.draw_browser(frame, browser, grid_area);
        }
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let (path_text, path_style) = if self.editing_path {
            (
                format!("{}_", self.edit_buffer),
                Style::default()
                    .fg(COLOR_TEXT)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            (self.config_path.clone(), Style::default().fg(COLOR_TEXT))
        };

        let mut info = vec![
            Span::styled(
                phase_label(self.phase),
                Style::default()
                    .fg(phase_color(self.phase))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", transport_label(self.transport)),
                Style::default().fg(COLOR_MUTED),
            ),
            Span::styled(
                if self.renderer.kitty_enabled() {
                    "  kitty"
                } else {
                    "  ascii"
                },
                Style::default().fg(COLOR_MUTED),
            ),
        ];
        if !self.status.is_empty() {
            info.push(Span::styled("  |  ", Style::default().fg(COLOR_BORDER)));
            info.push(Span::styled(
                self.status.clone(),
                status_message_style(&self.status),
            ));
        }

        let panel = Paragraph::new(vec![
            Line::from(vec![
                Span::styled("config ", Style::default().fg(COLOR_MUTED)),
                Span::styled(path_text, path_style),
            ]),
            Line::from(info),
        ])
        .block(panel_block("◉", "XVR Grid", self.editing_path));
        frame.render_widget(panel, area);
    }

    fn draw_slot(&self, frame: &mut ratatui::Frame<'_>, slot: usize, area: Rect) {
        let view = self
            .manager
            .as_ref()
            .map_or(SlotView::Empty, |manager| manager.slot_view(slot));

        let (caption, status_text, status_color) = match &view {
            SlotView::Empty => (
                format!("slot {}", slot + 1),
                "empty".to_owned(),
                COLOR_BORDER,
            ),
            SlotView::Failed(reason) => {
                (format!("slot {}", slot + 1), reason.clone(), COLOR_ERROR)
            }
            SlotView::Live(snapshot) => {
                let mut status = snapshot.status.clone();
                if snapshot.decode_errors > 0 {
                    let _ = write!(&mut status, "  err {}", snapshot.decode_errors);
                }
                (
                    snapshot.label.clone(),
                    status,
                    slot_status_color(&snapshot.status),
                )
            }
        };

        let title = Line::from(vec![
            Span::styled(
                format!(" {GLYPH_BULLET}{} ", slot + 1),
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                caption,
                Style::default()
                    .fg(COLOR_TEXT)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {status_text} "), Style::default().fg(status_color)),
        ]);

        let body = if !self.renderer.kitty_enabled() && matches!(view, SlotView::Live(_)) {
            let inner = render::inner_cell(area);
            self.renderer
                .ascii_frame(slot, usize::from(inner.width), usize::from(inner.height))
                .unwrap_or_default()
        } else {
            String::new()
        };

        frame.render_widget(
            Paragraph::new(body).style(Style::default().fg(COLOR_TEXT)).block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(status_color)),
            ),
            area,
        );
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let hints: &[(&str, &str)] = if self.editing_path {
            &[("Enter", "Save path"), ("Esc", "Cancel")]
        } else if self.browser.is_some() {
            &[
                ("↑/↓", "Move"),
                ("Enter", "Open"),
                ("Backspace", "Up"),
                ("Esc", "Close"),
            ]
        } else {
            &[
                ("s", "Start"),
                ("e", "Edit path"),
                ("o", "Browse"),
                ("q", "Quit"),
            ]
        };
        let footer = Paragraph::new(Line::from(action_hint_spans(hints)))
            .block(panel_block("⌘", "Actions", false));
        frame.render_widget(footer, area);
    }

    fn draw_browser(&self, frame: &mut ratatui::Frame<'_>, browser: &FileBrowser, within: Rect) {
        let popup = centered_rect(within, 70, 80);
        frame.render_widget(Clear, popup);

        let visible_rows = usize::from(popup.height.saturating_sub(2)).saturating_sub(1);
        let start = if visible_rows == 0 {
            0
        } else {
            browser
                .cursor()
                .saturating_sub(visible_rows.saturating_sub(1))
        };

        let mut lines = Vec::with_capacity(visible_rows + 1);
        lines.push(Line::from(Span::styled(
            browser.dir().display().to_string(),
            Style::default().fg(COLOR_MUTED),
        )));
        for (idx, item) in browser
            .entries()
            .iter()
            .enumerate()
            .skip(start)
            .take(visible_rows.max(1))
        {
            let selected = idx == browser.cursor();
            let marker = if selected { GLYPH_ACTIVE } else { " " };
            let name = if item.is_dir {
                format!("{}/", item.name)
            } else {
                item.name.clone()
            };
            let style = if selected {
                Style::default()
                    .fg(COLOR_TEXT)
                    .add_modifier(Modifier::BOLD)
            } else if item.is_dir {
                Style::default().fg(COLOR_MUTED)
            } else {
                Style::default().fg(COLOR_TEXT)
            };
            lines.push(Line::from(vec![
                Span::styled(
                    format!(" {marker} "),
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(name, style),
            ]));
        }

        let panel = Paragraph::new(lines).block(panel_block("◈", "Open Config", true));
        frame.render_widget(panel, popup);
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "idle",
        Phase::Opening => "opening",
        Phase::Running => "streaming",
    }
}

fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Idle => COLOR_MUTED,
        Phase::Opening => COLOR_WARNING,
        Phase::Running => COLOR_SUCCESS,
    }
}

fn transport_label(mode: TransportMode) -> &'static str {
    match mode {
        TransportMode::Tcp => "tcp",
        TransportMode::Udp => "udp",
    }
}

fn edit_text_field(target: &mut String, key: KeyEvent, allow_spaces: bool) {
    match key.code {
        KeyCode::Backspace => {
            let _ = target.pop();
        }
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL)
                || key.modifiers.contains(KeyModifiers::ALT)
            {
                return;
            }
            if !allow_spaces && c == ' ' {
                return;
            }
            target.push(c);
        }
        _ => {}
    }
}

fn panel_block<'a>(glyph: &'a str, title: &'a str, focused: bool) -> Block<'a> {
    let border_color = if focused {
        COLOR_BORDER_ACTIVE
    } else {
        COLOR_BORDER
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Line::from(vec![
            Span::styled(
                format!(" {glyph} "),
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                title,
                Style::default()
                    .fg(COLOR_TEXT)
                    .add_modifier(Modifier::BOLD),
            ),
        ]))
}

fn action_hint_spans(hints: &[(&'static str, &'static str)]) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    for (idx, (key, label)) in hints.iter().enumerate() {
        if idx > 0 {
            spans.push(Span::styled("  |  ", Style::default().fg(COLOR_BORDER)));
        }
        spans.push(Span::styled(
            format!("[{key}]"),
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!(" {label}"),
            Style::default().fg(COLOR_MUTED),
        ));
    }
    spans
}

fn slot_status_color(status: &str) -> Color {
    let lower = status.to_ascii_lowercase();
    if lower.starts_with("error") {
        COLOR_ERROR
    } else if lower.contains("error") {
        COLOR_WARNING
    } else if lower.starts_with("stream ended") {
        COLOR_MUTED
    } else if lower.starts_with("stream") {
        COLOR_SUCCESS
    } else if lower.starts_with("connect") {
        COLOR_WARNING
    } else {
        COLOR_MUTED
    }
}

fn status_message_style(status: &str) -> Style {
    let lower = status.to_ascii_lowercase();
    if lower.contains("fail") || lower.contains("error") || lower.contains("rejected") {
        Style::default().fg(COLOR_ERROR)
    } else if lower.contains("opening") || lower.contains("streaming") {
        Style::default().fg(COLOR_ACCENT)
    } else if lower.contains("selected") || lower.contains("updated") {
        Style::default().fg(COLOR_SUCCESS)
    } else {
        Style::default().fg(COLOR_MUTED)
    }
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let width = (u32::from(area.width) * u32::from(percent_x) / 100) as u16;
    let height = (u32::from(area.height) * u32::from(percent_y) / 100) as u16;
    let width = width.clamp(1, area.width.max(1));
    let height = height.clamp(1, area.height.max(1));
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    }
}
