//! Modal dialogs: what a dialog looks like and who shows it.

pub mod terminal;

use crate::form::{FormEngine, FormValue, FormView};
use crossterm::event::KeyEvent;
use ratatui::prelude::*;

pub use terminal::{CrosstermKeys, KeySource, ScriptedKeys, TerminalDialogHost};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonKind {
    Default,
    Warn,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    /// Accepting buttons resolve the dialog with the body's value.
    pub accept: bool,
    pub kind: ButtonKind,
}

pub fn cancel_button() -> Button {
    Button {
        label: "Cancel".into(),
        accept: false,
        kind: ButtonKind::Default,
    }
}

pub fn ok_button(label: impl Into<String>) -> Button {
    Button {
        label: label.into(),
        accept: true,
        kind: ButtonKind::Default,
    }
}

pub fn warn_button(label: impl Into<String>) -> Button {
    Button {
        label: label.into(),
        accept: true,
        kind: ButtonKind::Warn,
    }
}

/// A form that can sit inside a dialog.
pub trait FormBody {
    fn draw_body(&mut self, f: &mut Frame, area: Rect, focused: bool);
    /// Returns true when the key changed the body's value.
    fn handle_key(&mut self, key: KeyEvent) -> bool;
    fn value(&self) -> FormValue;
}

impl<E: FormEngine> FormBody for FormView<E> {
    fn draw_body(&mut self, f: &mut Frame, area: Rect, focused: bool) {
        self.draw(f, area, focused);
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        self.on_key(key)
    }

    fn value(&self) -> FormValue {
        self.get_value()
    }
}

pub enum DialogBody<'a> {
    Text(String),
    Form(&'a mut dyn FormBody),
}

/// Where keyboard focus starts when the dialog opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogFocus {
    /// The form body, falling back to the default button for text bodies.
    Body,
    /// The last button.
    DefaultButton,
}

pub struct Dialog<'a> {
    pub title: String,
    pub body: DialogBody<'a>,
    pub buttons: Vec<Button>,
    pub focus: DialogFocus,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DialogResult {
    pub button: Button,
    /// The body form's value at acceptance; `None` for cancels and text bodies.
    pub value: Option<FormValue>,
}

impl DialogResult {
    pub fn accepted(&self) -> bool {
        self.button.accept
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
    #[error("input closed before the dialog was answered")]
    Closed,
}

/// Shows modal dialogs and blocks until the user answers.
pub trait DialogHost {
    fn show_dialog(&mut self, dialog: Dialog<'_>) -> Result<DialogResult, HostError>;

    fn show_error_message(&mut self, title: &str, message: &str) -> Result<(), HostError> {
        self.show_dialog(Dialog {
            title: title.to_string(),
            body: DialogBody::Text(message.to_string()),
            buttons: vec![ok_button("Dismiss")],
            focus: DialogFocus::DefaultButton,
        })
        .map(|_| ())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Host that answers dialogs from a script and records what it was shown.
    #[derive(Default)]
    pub struct ScriptedHost {
        /// Button label to press for each dialog, in order.
        pub answers: VecDeque<String>,
        pub titles: Vec<String>,
        pub texts: Vec<String>,
    }

    impl ScriptedHost {
        pub fn answering(labels: &[&str]) -> Self {
            Self {
                answers: labels.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    impl DialogHost for ScriptedHost {
        fn show_dialog(&mut self, dialog: Dialog<'_>) -> Result<DialogResult, HostError> {
            self.titles.push(dialog.title.clone());
            let label = self.answers.pop_front().ok_or(HostError::Closed)?;
            let button = dialog
                .buttons
                .iter()
                .find(|b| b.label == label)
                .cloned()
                .ok_or(HostError::Closed)?;
            let value = match (&dialog.body, button.accept) {
                (DialogBody::Form(body), true) => Some(body.value()),
                _ => None,
            };
            if let DialogBody::Text(t) = &dialog.body {
                self.texts.push(t.clone());
            }
            Ok(DialogResult { button, value })
        }
    }
}
