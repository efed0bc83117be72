//! Terminal implementation of [`FormEngine`] on ratatui.

pub mod fields;
pub mod validate;

use crate::form::{ChangeEvent, FormEngine, FormProps, ValidationError};
use crate::json::deep_equal;
use crate::theme::Theme;
use crate::widgets::chrome::panel_block;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fields::{apply_data, collect, fields_from_schema, FieldContext, FieldKind, FieldValue, FormField};
use ratatui::prelude::*;
use ratatui::widgets::*;
use serde_json::Value as JsonValue;

pub use validate::validate_value;

// Inputs whose change forces the field list to be rebuilt.
#[derive(Clone, PartialEq)]
struct FieldLayout {
    schema: JsonValue,
    ui_schema: JsonValue,
    fields: Option<crate::form::RendererMap>,
    widgets: Option<crate::form::RendererMap>,
    disabled: bool,
}

pub struct TuiEngine {
    props: Option<FormProps>,
    layout: Option<FieldLayout>,
    fields: Vec<FormField>,
    selected: usize,
    errors: Vec<ValidationError>,
    title: String,
    theme: Theme,
}

impl Default for TuiEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiEngine {
    pub fn new() -> Self {
        Self {
            props: None,
            layout: None,
            fields: Vec::new(),
            selected: 0,
            errors: Vec::new(),
            title: String::new(),
            theme: Theme::default(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Schema validation, then the model's custom validator, then its error
    /// transform. Nothing runs when validation is switched off.
    fn run_validation(&self, props: &FormProps, data: &JsonValue) -> Vec<ValidationError> {
        if props.no_validate {
            return Vec::new();
        }
        let mut errs = validate_value(&props.schema, data);
        for fld in &self.fields {
            if let FieldKind::Json {
                expandable: false, ..
            } = fld.kind
            {
                if let Some(obj) = crate::json::get_by_path(data, &fld.path).and_then(|v| v.as_object()) {
                    if obj.keys().any(|k| !fld.initial_keys.contains(k)) {
                        errs.push(ValidationError::new(
                            "additionalProperties",
                            &fld.path,
                            "adding properties is disabled",
                        ));
                    }
                }
            }
        }
        if let Some(custom) = &props.validate {
            custom(data, &mut errs);
        }
        if let Some(transform) = &props.transform_errors {
            errs = transform(errs);
        }
        errs
    }

    fn assign_field_errors(&mut self) {
        for fld in &mut self.fields {
            fld.error = None;
        }
        for err in &self.errors {
            let p = err.path();
            if let Some(fld) = self.fields.iter_mut().find(|f| {
                p == f.path || p.strip_prefix(f.path.as_str()).is_some_and(|r| r.starts_with('.'))
            }) {
                if fld.error.is_none() {
                    fld.error = Some(err.message.clone());
                }
            }
        }
    }

    fn initial_selection(&self) -> usize {
        self.fields
            .iter()
            .position(|f| f.autofocus)
            .or_else(|| self.fields.iter().position(|f| !f.read_only))
            .unwrap_or(0)
    }

    fn edit_selected(&mut self, key: KeyEvent) -> bool {
        let Some(fld) = self.fields.get_mut(self.selected) else {
            return false;
        };
        if fld.read_only {
            return false;
        }
        let changed = match (&fld.kind, &mut fld.value, key.code) {
            (FieldKind::Checkbox, FieldValue::Bool(b), KeyCode::Char(' ') | KeyCode::Enter) => {
                *b = !*b;
                true
            }
            (FieldKind::Select { options, .. }, FieldValue::Choice(sel), KeyCode::Left) => {
                if options.is_empty() {
                    false
                } else {
                    *sel = Some(match *sel {
                        Some(0) | None => options.len() - 1,
                        Some(i) => i - 1,
                    });
                    true
                }
            }
            (
                FieldKind::Select { options, .. },
                FieldValue::Choice(sel),
                KeyCode::Right | KeyCode::Char(' '),
            ) => {
                if options.is_empty() {
                    false
                } else {
                    *sel = Some(match *sel {
                        Some(i) if i + 1 < options.len() => i + 1,
                        _ => 0,
                    });
                    true
                }
            }
            (FieldKind::TextArea, FieldValue::Text(s), KeyCode::Enter) => {
                s.push('\n');
                true
            }
            (FieldKind::Checkbox | FieldKind::Select { .. }, _, _) => false,
            (_, FieldValue::Text(s), KeyCode::Char(c))
                if !key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                s.push(c);
                true
            }
            (_, FieldValue::Text(s), KeyCode::Backspace) => s.pop().is_some(),
            _ => false,
        };
        if changed {
            fld.touched = true;
        }
        changed
    }

    fn field_lines(&self) -> (Vec<Line<'static>>, usize) {
        let theme = &self.theme;
        let mut lines: Vec<Line<'static>> = Vec::new();
        let mut selected_line = 0;
        let mut compact = false;
        if let Some(props) = &self.props {
            compact = props.field_template.as_deref() == Some("compact");
            if props.show_error_list && !self.errors.is_empty() {
                match props.error_list.as_deref() {
                    Some("none") => {}
                    Some("summary") => {
                        let n = self.errors.len();
                        let noun = if n == 1 { "error" } else { "errors" };
                        lines.push(Line::from(Span::styled(format!("{n} {noun}"), theme.text_error())));
                        lines.push(Line::from(""));
                    }
                    _ => {
                        lines.push(Line::from(Span::styled("Errors", theme.text_error())));
                        for e in &self.errors {
                            lines.push(Line::from(Span::styled(
                                format!("  • {}", e.stack),
                                theme.text_error(),
                            )));
                        }
                        lines.push(Line::from(""));
                    }
                }
            }
        }
        let mut last_group: Option<&str> = None;
        for (i, fld) in self.fields.iter().enumerate() {
            if let Some(g) = fld.group.as_deref() {
                if last_group != Some(g) {
                    lines.push(Line::from(Span::styled(format!("-- {g} --"), theme.group_header())));
                    last_group = Some(g);
                }
            }
            let is_sel = i == self.selected;
            if is_sel {
                selected_line = lines.len();
            }
            let sel = if is_sel { '›' } else { ' ' };
            let req = if fld.required { " *" } else { "" };
            let value_style = if fld.read_only {
                theme.text_muted()
            } else if is_sel {
                theme.text_editing_bold()
            } else {
                Style::default()
            };
            let mut shown = match (&fld.kind, &fld.value) {
                (FieldKind::Checkbox, FieldValue::Bool(b)) => {
                    if *b { "[x]".to_string() } else { "[ ]".to_string() }
                }
                (FieldKind::Select { options, .. }, FieldValue::Choice(sel)) => {
                    let cur = sel
                        .and_then(|i| options.get(i).cloned())
                        .unwrap_or_else(|| "(none)".into());
                    format!("‹ {cur} ›")
                }
                (FieldKind::Password, FieldValue::Text(s)) => "•".repeat(s.chars().count()),
                (FieldKind::TextArea, FieldValue::Text(s)) => s.replace('\n', " ⏎ "),
                (_, FieldValue::Text(s)) => s.clone(),
                _ => String::new(),
            };
            if is_sel && !fld.read_only && matches!(fld.value, FieldValue::Text(_)) {
                shown.push('▏');
            }
            lines.push(Line::from(vec![
                Span::raw(format!("{sel} {}{req}: ", fld.label)),
                Span::styled(shown, value_style),
            ]));
            if is_sel && !compact {
                if let Some(desc) = &fld.description {
                    lines.push(Line::from(Span::styled(format!("    {desc}"), theme.text_muted())));
                }
            }
            if let Some(err) = &fld.error {
                lines.push(Line::from(Span::styled(format!("  ! {err}"), theme.text_error())));
            }
        }
        if self.fields.is_empty() {
            lines.push(Line::from(Span::styled("(no settings)", theme.text_muted())));
        }
        (lines, selected_line)
    }
}

impl FormEngine for TuiEngine {
    fn update(&mut self, props: &FormProps) {
        let layout = FieldLayout {
            schema: props.schema.clone(),
            ui_schema: props.ui_schema.clone(),
            fields: props.fields.clone(),
            widgets: props.widgets.clone(),
            disabled: props.disabled,
        };
        let rebuild = self.layout.as_ref() != Some(&layout);
        if rebuild {
            let ctx = FieldContext {
                id_prefix: &props.id_prefix,
                ui_schema: &props.ui_schema,
                fields: props.fields.as_ref(),
                widgets: props.widgets.as_ref(),
                disabled: props.disabled,
            };
            self.fields = fields_from_schema(&props.schema, &ctx);
            self.layout = Some(layout);
        }
        // keep in-progress text when the model just echoes our own edit back
        let echoed = !rebuild && deep_equal(&collect(&self.fields, &props.form_data), &props.form_data);
        if !echoed {
            apply_data(&mut self.fields, &props.form_data);
        }
        if rebuild {
            self.selected = self.initial_selection();
        }
        self.errors = if props.live_validate {
            self.run_validation(props, &props.form_data)
        } else {
            Vec::new()
        };
        self.props = Some(props.clone());
        self.assign_field_errors();
        tracing::trace!(form = %props.id_prefix, fields = self.fields.len(), rebuild, "form engine updated");
    }

    fn draw(&mut self, f: &mut Frame, area: Rect, focused: bool) {
        let (lines, selected_line) = self.field_lines();
        let inner_h = area.height.saturating_sub(2) as usize;
        let scroll = if inner_h > 0 && selected_line >= inner_h {
            (selected_line + 1 - inner_h) as u16
        } else {
            0
        };
        let disabled = self.props.as_ref().map(|p| p.disabled).unwrap_or(false);
        let title = if disabled && !self.title.is_empty() {
            format!("{} (read-only)", self.title)
        } else {
            self.title.clone()
        };
        let block = panel_block(&title, focused && !disabled, &self.theme);
        let p = Paragraph::new(lines)
            .block(block)
            .scroll((scroll, 0))
            .wrap(Wrap { trim: false });
        f.render_widget(p, area);
    }

    fn on_key(&mut self, key: KeyEvent) -> Option<ChangeEvent> {
        let props = self.props.clone()?;
        match key.code {
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                return None;
            }
            KeyCode::Down => {
                if self.selected + 1 < self.fields.len() {
                    self.selected += 1;
                }
                return None;
            }
            _ => {}
        }
        if props.disabled || !self.edit_selected(key) {
            return None;
        }
        let data = collect(&self.fields, &props.form_data);
        let errors = if props.live_validate {
            self.run_validation(&props, &data)
        } else {
            Vec::new()
        };
        self.errors = errors.clone();
        self.assign_field_errors();
        Some(ChangeEvent {
            form_data: Some(data),
            errors,
        })
    }
}
