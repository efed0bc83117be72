use crate::settings::SaveOutcome;
use crate::ui::{AppState, ToastLevel};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};


/// Fraction of the width moved per resize step.
const RESIZE_STEP: f64 = 0.05;

#[derive(Debug)]
pub enum AppMsg {
    /// Anything not bound to a global shortcut goes to the user form.
    Key(KeyEvent),
    Save,
    Revert,
    /// Re-read the current plugin's overrides from disk.
    Reload,
    NextPlugin,
    PrevPlugin,
    /// Move the pane split by this fraction of the width.
    Resize(f64),
    Tick,
    Quit,
}

#[derive(Debug, PartialEq)]
pub enum Effect {
    OpenPlugin {
        index: usize,
    },
    ShowToast {
        text: String,
        level: ToastLevel,
        seconds: u64,
    },
}

pub fn key_to_msg(key: KeyEvent) -> AppMsg {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => AppMsg::Quit,
        KeyCode::Char('s') if ctrl => AppMsg::Save,
        KeyCode::Char('r') if ctrl => AppMsg::Revert,
        KeyCode::Char('l') if ctrl => AppMsg::Reload,
        KeyCode::Char('c') if ctrl => AppMsg::Quit,
        KeyCode::Left if ctrl => AppMsg::Resize(-RESIZE_STEP),
        KeyCode::Right if ctrl => AppMsg::Resize(RESIZE_STEP),
        KeyCode::PageDown => AppMsg::NextPlugin,
        KeyCode::PageUp => AppMsg::PrevPlugin,
        _ => AppMsg::Key(key),
    }
}

fn toast(text: impl Into<String>, level: ToastLevel, seconds: u64) -> Effect {
    Effect::ShowToast {
        text: text.into(),
        level,
        seconds,
    }
}

pub fn update(state: &mut AppState, msg: AppMsg) -> Vec<Effect> {
    let mut effects: Vec<Effect> = Vec::new();
    let plugin = state.current_plugin().unwrap_or_default().to_string();
    match msg {
        AppMsg::Key(key) => {
            if state.editor.on_user_key(key) {
                state.dbg(format!("edit {plugin} (dirty: {})", state.editor.is_dirty()));
            }
        }
        AppMsg::Save => match state.editor.save() {
            SaveOutcome::Clean => state.dbg("save: nothing to save"),
            SaveOutcome::Saved => {
                state.dbg(format!("saved {plugin}"));
                effects.push(toast(format!("Saved {plugin}"), ToastLevel::Success, 2));
            }
            SaveOutcome::Failed => {
                let msg = state
                    .save_errors
                    .borrow_mut()
                    .drain(..)
                    .last()
                    .unwrap_or_else(|| "save failed".into());
                state.dbg(format!("save {plugin} failed: {msg}"));
                effects.push(toast(msg, ToastLevel::Error, 5));
            }
        },
        AppMsg::Revert => {
            let was_dirty = state.editor.is_dirty();
            state.editor.revert();
            if was_dirty {
                state.dbg(format!("reverted {plugin}"));
                effects.push(toast("Reverted to saved settings", ToastLevel::Info, 2));
            }
        }
        AppMsg::Reload => {
            if let Some(entry) = state.entry.clone() {
                match entry.reload() {
                    Ok(()) => {
                        state.dbg(format!("reloaded {plugin}"));
                        effects.push(toast(format!("Reloaded {plugin}"), ToastLevel::Info, 2));
                    }
                    Err(e) => {
                        state.dbg(format!("reload {plugin} failed: {e}"));
                        effects.push(toast(e.to_string(), ToastLevel::Error, 5));
                    }
                }
            }
        }
        AppMsg::NextPlugin | AppMsg::PrevPlugin => {
            let n = state.plugins.len();
            if n > 1 {
                let cur = state.current.unwrap_or(0);
                let index = if matches!(msg, AppMsg::NextPlugin) {
                    (cur + 1) % n
                } else {
                    (cur + n - 1) % n
                };
                if state.editor.is_dirty() {
                    state.dbg(format!("discarding unsaved edits to {plugin}"));
                }
                effects.push(Effect::OpenPlugin { index });
            }
        }
        AppMsg::Resize(delta) => {
            let [a, b] = state.editor.sizes();
            let left = (a / (a + b) + delta).clamp(0.1, 0.9);
            state.editor.set_sizes([left, 1.0 - left]);
        }
        AppMsg::Tick => {
            state.tick = state.tick.wrapping_add(1);
        }
        AppMsg::Quit => {
            state.quit = true;
        }
    }
    effects
}
