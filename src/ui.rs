use crate::app::{key_to_msg, update, AppMsg, Effect};
use crate::config::AppConfig;
use crate::dialog::{CrosstermKeys, ScriptedKeys, TerminalDialogHost};
use crate::docmanager::FsDocumentManager;
use crate::engine::TuiEngine;
use crate::form::IdAllocator;
use crate::rename::{rename_dialog, RenameError, RenameOutcome};
use crate::settings::{
    EditorOptions, FileSettings, SettingsDir, SettingsEntry, SettingsFormEditor, StoreError,
};
use crate::theme::Theme;
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::TestBackend;
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

const MAX_LOG_LINES: usize = 200;
const DEBUG_H: u16 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

pub struct Toast {
    pub text: String,
    pub level: ToastLevel,
    pub expires_at_tick: u64,
}

pub(crate) struct AppState {
    pub(crate) config: AppConfig,
    pub(crate) theme: Theme,
    pub(crate) dir: SettingsDir,
    pub(crate) plugins: Vec<String>,
    pub(crate) current: Option<usize>,
    pub(crate) entry: Option<Rc<FileSettings>>,
    pub(crate) editor: SettingsFormEditor<TuiEngine>,
    /// Filled by the editor's save error handler, drained by `update`.
    pub(crate) save_errors: Rc<RefCell<Vec<String>>>,
    pub(crate) tick: u64,
    pub(crate) toast: Option<Toast>,
    pub(crate) debug_log: VecDeque<String>,
    pub(crate) quit: bool,
}

impl AppState {
    pub(crate) fn new(
        config: AppConfig,
        dir: SettingsDir,
        ids: &IdAllocator,
    ) -> Result<Self, StoreError> {
        let theme = Theme::from_mode(config.theme);
        let plugins = dir.plugins()?;
        let engine_theme = theme.clone();
        let mut editor = SettingsFormEditor::new(
            EditorOptions {
                sizes: config.sizes,
                ..Default::default()
            },
            ids,
            |title| TuiEngine::new().with_title(title).with_theme(engine_theme.clone()),
        );
        let save_errors = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&save_errors);
        editor.set_save_error_handler(move |e| sink.borrow_mut().push(e.to_string()));
        editor.on_after_attach();
        Ok(Self {
            config,
            theme,
            dir,
            plugins,
            current: None,
            entry: None,
            editor,
            save_errors,
            tick: 0,
            toast: None,
            debug_log: VecDeque::new(),
            quit: false,
        })
    }

    pub fn dbg(&mut self, msg: impl Into<String>) {
        if self.debug_log.len() >= MAX_LOG_LINES {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(msg.into());
    }

    pub(crate) fn current_plugin(&self) -> Option<&str> {
        self.current
            .and_then(|i| self.plugins.get(i))
            .map(|s| s.as_str())
    }
}

pub(crate) fn open_plugin(state: &mut AppState, index: usize) {
    let Some(name) = state.plugins.get(index).cloned() else {
        return;
    };
    match state.dir.open(&name) {
        Ok(entry) => {
            let entry = Rc::new(entry);
            let shared: Rc<dyn SettingsEntry> = entry.clone();
            state.editor.set_settings(Some(shared));
            state.entry = Some(entry);
            state.current = Some(index);
            state.dbg(format!("opened {name}"));
        }
        Err(e) => {
            tracing::error!(plugin = %name, error = %e, "failed to open settings");
            state.dbg(format!("open {name} failed: {e}"));
            run_effects(
                state,
                vec![Effect::ShowToast {
                    text: format!("Cannot open {name}: {e}"),
                    level: ToastLevel::Error,
                    seconds: 5,
                }],
            );
        }
    }
}

pub(crate) fn run_effects(state: &mut AppState, effects: Vec<Effect>) {
    for eff in effects {
        match eff {
            Effect::OpenPlugin { index } => open_plugin(state, index),
            Effect::ShowToast {
                text,
                level,
                seconds,
            } => {
                let ticks_per_sec = (1000 / state.config.tick_ms.max(1)).max(1);
                let exp = state.tick.saturating_add(seconds.saturating_mul(ticks_per_sec));
                state.toast = Some(Toast {
                    text,
                    level,
                    expires_at_tick: exp,
                });
            }
        }
    }
}

/// Puts the terminal into raw alternate-screen mode until dropped.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("enabling raw mode")?;
        execute!(std::io::stdout(), EnterAlternateScreen).context("entering alternate screen")?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
    }
}

/// `formedit edit <settings-dir> [plugin]`
pub fn run_edit(settings_dir: PathBuf, plugin: Option<String>) -> Result<()> {
    let config = AppConfig::load(Some(&settings_dir)).context("loading formedit config")?;
    let _log_guard = crate::logging::init(&config)?;
    crate::logging::install_panic_hook();
    let ids = IdAllocator::new();
    let mut state = AppState::new(config, SettingsDir::new(&settings_dir), &ids)
        .with_context(|| format!("reading settings dir {}", settings_dir.display()))?;
    tracing::info!(dir = %settings_dir.display(), plugins = state.plugins.len(), "settings editor starting");
    let start = match plugin {
        Some(p) => Some(
            state
                .plugins
                .iter()
                .position(|x| *x == p)
                .with_context(|| format!("no settings schema for plugin {p}"))?,
        ),
        None => (!state.plugins.is_empty()).then_some(0),
    };
    match start {
        Some(i) => open_plugin(&mut state, i),
        None => state.dbg("no plugin settings found"),
    }

    if state.config.headless {
        return run_headless(&mut state);
    }

    let guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(std::io::stdout()))?;
    let tick_rate = Duration::from_millis(state.config.tick_ms);
    let mut last_tick = Instant::now();
    while !state.quit {
        terminal.draw(|f| ui(f, &mut state))?;
        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let effs = update(&mut state, key_to_msg(key));
                    run_effects(&mut state, effs);
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            let effs = update(&mut state, AppMsg::Tick);
            run_effects(&mut state, effs);
            last_tick = Instant::now();
        }
    }
    terminal.show_cursor()?;
    drop(guard);
    if state.editor.is_dirty() {
        tracing::warn!(plugin = state.current_plugin().unwrap_or(""), "quit with unsaved changes");
    }
    Ok(())
}

fn run_headless(state: &mut AppState) -> Result<()> {
    let mut terminal = Terminal::new(TestBackend::new(100, 30))?;
    for _ in 0..state.config.headless_ticks {
        terminal.draw(|f| ui(f, state))?;
        let effs = update(state, AppMsg::Tick);
        run_effects(state, effs);
    }
    let summary = serde_json::json!({
        "ok": state.toast.as_ref().map_or(true, |t| t.level != ToastLevel::Error),
        "plugins": state.plugins,
        "plugin": state.current_plugin(),
        "dirty": state.editor.is_dirty(),
        "can_revert": state.editor.can_revert(),
        "can_save": state.editor.can_save(),
        "ticks": state.tick,
    });
    println!("{summary}");
    Ok(())
}

/// `formedit rename <root> <path>`
pub fn run_rename(root: PathBuf, path: String) -> Result<()> {
    let config = AppConfig::load(Some(&root)).context("loading formedit config")?;
    let _log_guard = crate::logging::init(&config)?;
    crate::logging::install_panic_hook();
    let manager = FsDocumentManager::new(&root);
    let theme = Theme::from_mode(config.theme);
    let engine = TuiEngine::new().with_title("Rename").with_theme(theme.clone());
    let ids = IdAllocator::new();
    let outcome = if config.headless {
        // nothing to type with; open the dialog and dismiss it
        let terminal = Terminal::new(TestBackend::new(80, 24))?;
        let keys = ScriptedKeys::new().key(KeyCode::Esc);
        let mut host = TerminalDialogHost::new(terminal, keys, theme);
        rename_dialog(&manager, &mut host, &ids, engine, &path)
    } else {
        let _guard = TerminalGuard::enter()?;
        let terminal = Terminal::new(CrosstermBackend::new(std::io::stdout()))?;
        let mut host = TerminalDialogHost::new(terminal, CrosstermKeys, theme);
        rename_dialog(&manager, &mut host, &ids, engine, &path)
    };
    match outcome {
        Ok(RenameOutcome::Renamed(contents)) => {
            println!("{}", serde_json::to_string(&contents)?);
            Ok(())
        }
        Ok(RenameOutcome::Cancelled) => {
            println!("{}", serde_json::json!({"cancelled": true, "path": path}));
            Ok(())
        }
        Err(e @ (RenameError::NotRenamed | RenameError::InvalidName { .. })) => {
            eprintln!("{e}");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("renaming {path}")),
    }
}

pub(crate) fn ui(f: &mut Frame, state: &mut AppState) {
    // Clear expired toast
    if let Some(t) = &state.toast {
        if state.tick >= t.expires_at_tick {
            state.toast = None;
        }
    }

    let screen = f.area();
    f.render_widget(Block::default().style(state.theme.base_style()), screen);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(4),
            Constraint::Length(DEBUG_H),
            Constraint::Length(1),
        ])
        .split(screen);

    draw_header(f, chunks[0], state);
    let theme = state.theme.clone();
    state.editor.draw(f, chunks[1], &theme);
    draw_debug(f, chunks[2], state);
    draw_footer(f, chunks[3], state);
}

fn draw_header(f: &mut Frame, area: Rect, state: &AppState) {
    let theme = &state.theme;
    let mut spans = vec![Span::styled(" formedit ", theme.text_active_bold())];
    match (state.current_plugin(), state.current) {
        (Some(name), Some(i)) => {
            spans.push(Span::raw(format!("{name} ")));
            spans.push(Span::styled(
                format!("({}/{})", i + 1, state.plugins.len()),
                theme.text_muted(),
            ));
        }
        _ => spans.push(Span::styled(
            format!("no plugins in {}", state.dir.root().display()),
            theme.text_muted(),
        )),
    }
    if state.editor.is_dirty() {
        spans.push(Span::styled("  ● modified", theme.text_warn_bold()));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_debug(f: &mut Frame, area: Rect, state: &AppState) {
    let b = Block::default()
        .borders(Borders::TOP)
        .border_style(state.theme.border_unfocused())
        .title(Span::styled("Debug", state.theme.group_header()));
    let h = area.height.saturating_sub(1) as usize;
    let start = state.debug_log.len().saturating_sub(h);
    let lines: Vec<Line> = state
        .debug_log
        .iter()
        .skip(start)
        .map(|s| Line::raw(s.clone()))
        .collect();
    let p = Paragraph::new(lines)
        .style(state.theme.text_muted())
        .block(b)
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

fn draw_footer(f: &mut Frame, area: Rect, state: &AppState) {
    let theme = &state.theme;
    let line = match &state.toast {
        Some(t) => {
            let style = match t.level {
                ToastLevel::Info => theme.text_active_bold(),
                ToastLevel::Success => theme.text_success(),
                ToastLevel::Error => theme.text_error(),
            };
            Line::from(Span::styled(t.text.clone(), style))
        }
        None => Line::from(Span::styled(
            "↑/↓ field  ^S save  ^R revert  ^L reload  PgUp/PgDn plugin  ^←/^→ resize  esc quit",
            theme.text_muted(),
        )),
    };
    f.render_widget(Paragraph::new(line), area);
}
