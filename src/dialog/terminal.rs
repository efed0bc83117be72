use super::{Button, ButtonKind, Dialog, DialogBody, DialogFocus, DialogHost, DialogResult, HostError};
use crate::theme::Theme;
use crate::widgets::chrome::{centered_rect, panel_block};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Clear, Paragraph, Wrap};
use std::collections::VecDeque;

/// Where dialog keystrokes come from.
pub trait KeySource {
    /// Next key press, or `None` once input is exhausted.
    fn next_key(&mut self) -> Result<Option<KeyEvent>, HostError>;
}

/// Blocking reads from the real terminal.
#[derive(Debug, Default)]
pub struct CrosstermKeys;

impl KeySource for CrosstermKeys {
    fn next_key(&mut self) -> Result<Option<KeyEvent>, HostError> {
        loop {
            if let Event::Key(k) = event::read()? {
                if k.kind == KeyEventKind::Press {
                    return Ok(Some(k));
                }
            }
        }
    }
}

/// Keys queued up front, for headless runs and tests.
#[derive(Debug, Default)]
pub struct ScriptedKeys(VecDeque<KeyEvent>);

impl ScriptedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, code: KeyCode) -> Self {
        self.0.push_back(KeyEvent::new(code, KeyModifiers::NONE));
        self
    }

    pub fn text(mut self, s: &str) -> Self {
        for c in s.chars() {
            self.0.push_back(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
        self
    }

    pub fn remaining(&self) -> usize {
        self.0.len()
    }
}

impl KeySource for ScriptedKeys {
    fn next_key(&mut self) -> Result<Option<KeyEvent>, HostError> {
        Ok(self.0.pop_front())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Focus {
    Body,
    Button(usize),
}

/// Draws dialogs centered on a ratatui terminal and drives them from a
/// [`KeySource`]. Esc cancels, Tab cycles focus, Enter activates.
pub struct TerminalDialogHost<B: Backend, K: KeySource> {
    terminal: Terminal<B>,
    keys: K,
    theme: Theme,
}

impl<B: Backend, K: KeySource> TerminalDialogHost<B, K> {
    pub fn new(terminal: Terminal<B>, keys: K, theme: Theme) -> Self {
        Self {
            terminal,
            keys,
            theme,
        }
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<B> {
        &mut self.terminal
    }

    pub fn keys(&self) -> &K {
        &self.keys
    }
}

fn draw_dialog(
    f: &mut Frame,
    title: &str,
    body: &mut DialogBody<'_>,
    buttons: &[Button],
    focus: Focus,
    theme: &Theme,
) {
    let rect = centered_rect(70, 60, f.area());
    f.render_widget(Clear, rect);
    let block = panel_block(title, true, theme).style(theme.base_style());
    let inner = block.inner(rect);
    f.render_widget(block, rect);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);
    match body {
        DialogBody::Text(t) => {
            f.render_widget(Paragraph::new(t.as_str()).wrap(Wrap { trim: true }), rows[0]);
        }
        DialogBody::Form(form) => form.draw_body(f, rows[0], focus == Focus::Body),
    }
    let mut spans = Vec::new();
    for (i, b) in buttons.iter().enumerate() {
        let style = if focus == Focus::Button(i) {
            theme.list_cursor_style()
        } else if b.kind == ButtonKind::Warn {
            theme.text_warn_bold()
        } else {
            theme.text_active_bold()
        };
        spans.push(Span::styled(format!("[ {} ]", b.label), style));
        spans.push(Span::raw(" "));
    }
    f.render_widget(
        Paragraph::new(Line::from(spans)).alignment(Alignment::Right),
        rows[1],
    );
}

impl<B: Backend, K: KeySource> DialogHost for TerminalDialogHost<B, K> {
    fn show_dialog(&mut self, dialog: Dialog<'_>) -> Result<DialogResult, HostError> {
        let Dialog {
            title,
            mut body,
            mut buttons,
            focus,
        } = dialog;
        if buttons.is_empty() {
            buttons.push(super::ok_button("OK"));
        }
        let default_button = buttons.len() - 1;
        let has_form = matches!(body, DialogBody::Form(_));
        let mut focus = match focus {
            DialogFocus::Body if has_form => Focus::Body,
            _ => Focus::Button(default_button),
        };
        tracing::debug!(%title, "dialog opened");
        loop {
            let theme = &self.theme;
            self.terminal
                .draw(|f| draw_dialog(f, &title, &mut body, &buttons, focus, theme))?;
            let Some(key) = self.keys.next_key()? else {
                return Err(HostError::Closed);
            };
            let pressed = match (key.code, focus) {
                (KeyCode::Esc, _) => {
                    tracing::debug!(%title, "dialog dismissed");
                    return Ok(DialogResult {
                        button: super::cancel_button(),
                        value: None,
                    });
                }
                (KeyCode::Tab, Focus::Body) => {
                    focus = Focus::Button(0);
                    None
                }
                (KeyCode::Tab, Focus::Button(i)) => {
                    focus = if i + 1 < buttons.len() {
                        Focus::Button(i + 1)
                    } else if has_form {
                        Focus::Body
                    } else {
                        Focus::Button(0)
                    };
                    None
                }
                (KeyCode::Left, Focus::Button(i)) => {
                    focus = Focus::Button(i.saturating_sub(1));
                    None
                }
                (KeyCode::Right, Focus::Button(i)) => {
                    focus = Focus::Button((i + 1).min(default_button));
                    None
                }
                (KeyCode::Enter, Focus::Button(i)) => Some(i),
                (KeyCode::Enter, Focus::Body) => Some(default_button),
                (_, Focus::Body) => {
                    if let DialogBody::Form(form) = &mut body {
                        form.handle_key(key);
                    }
                    None
                }
                _ => None,
            };
            if let Some(i) = pressed {
                let button = buttons[i].clone();
                let value = match &body {
                    DialogBody::Form(form) if button.accept => Some(form.value()),
                    _ => None,
                };
                tracing::debug!(%title, button = %button.label, "dialog resolved");
                return Ok(DialogResult { button, value });
            }
        }
    }
}
