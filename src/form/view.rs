use super::error::ValidationError;
use super::model::{CustomValidator, ErrorTransformer, FormModel, RendererMap};
use crate::signal::SlotId;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Prefix shared by the ids of every rendered schema form.
pub const SCHEMA_FORM_ID_PREFIX: &str = "formedit-schemaform";

/// Style class every schema form carries in front of its own class name.
pub const SCHEMA_FORM_CLASS: &str = "formedit-SchemaForm";

/// Hands out increasing integers for view id prefixes. Created once at start
/// up and cloned into whatever constructs views; never reset.
#[derive(Clone, Debug, Default)]
pub struct IdAllocator(Arc<AtomicU64>);

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Everything the engine needs to draw one form, copied out of the model.
#[derive(Clone)]
pub struct FormProps {
    pub id_prefix: String,
    pub class_name: String,
    pub schema: JsonValue,
    pub ui_schema: JsonValue,
    pub form_data: JsonValue,
    pub form_context: JsonValue,
    pub autocomplete: Option<String>,
    pub live_validate: bool,
    pub no_validate: bool,
    pub no_html5_validate: bool,
    pub show_error_list: bool,
    pub safe_render_completion: bool,
    pub disabled: bool,
    pub fields: Option<RendererMap>,
    pub widgets: Option<RendererMap>,
    pub error_list: Option<String>,
    pub field_template: Option<String>,
    pub array_field_template: Option<String>,
    pub object_field_template: Option<String>,
    pub validate: Option<CustomValidator>,
    pub transform_errors: Option<ErrorTransformer>,
}

/// What the engine reports after a user edit. `form_data` is `None` when the
/// edit produced no value (the model is then left untouched).
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    pub form_data: Option<JsonValue>,
    pub errors: Vec<ValidationError>,
}

/// The value a form currently holds, as returned by [`FormView::get_value`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormValue {
    pub form_data: JsonValue,
    pub errors: Vec<ValidationError>,
}

/// A schema form renderer. The view pushes a full snapshot through
/// [`FormEngine::update`] whenever the model changed, and feeds whatever
/// [`FormEngine::on_key`] returns back into the model.
pub trait FormEngine {
    fn update(&mut self, props: &FormProps);
    fn draw(&mut self, f: &mut Frame, area: Rect, focused: bool);
    fn on_key(&mut self, key: KeyEvent) -> Option<ChangeEvent>;
}

/// Binds one [`FormModel`] to one engine.
pub struct FormView<E> {
    model: Rc<RefCell<FormModel>>,
    engine: E,
    id_prefix: String,
    stale: Rc<Cell<bool>>,
    slot: SlotId,
}

impl<E: FormEngine> FormView<E> {
    pub fn new(model: FormModel, engine: E, ids: &IdAllocator) -> Self {
        let id_prefix = format!("{SCHEMA_FORM_ID_PREFIX}-{}", ids.next_id());
        let stale = Rc::new(Cell::new(true));
        let s = Rc::clone(&stale);
        let slot = model.state_changed().connect(move |_| s.set(true));
        Self {
            model: Rc::new(RefCell::new(model)),
            engine,
            id_prefix,
            stale,
            slot,
        }
    }

    pub fn model(&self) -> Ref<'_, FormModel> {
        self.model.borrow()
    }

    pub fn model_mut(&self) -> RefMut<'_, FormModel> {
        self.model.borrow_mut()
    }

    pub(crate) fn shared_model(&self) -> Rc<RefCell<FormModel>> {
        Rc::clone(&self.model)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn id_prefix(&self) -> &str {
        &self.id_prefix
    }

    /// True when the model changed since the last [`FormView::render`].
    pub fn is_stale(&self) -> bool {
        self.stale.get()
    }

    pub fn props(&self) -> FormProps {
        let m = self.model.borrow();
        let class_name = if m.class_name().is_empty() {
            SCHEMA_FORM_CLASS.to_string()
        } else {
            format!("{SCHEMA_FORM_CLASS} {}", m.class_name())
        };
        FormProps {
            id_prefix: self.id_prefix.clone(),
            class_name,
            schema: m.schema().clone(),
            ui_schema: m.ui_schema().clone(),
            form_data: m.form_data().clone(),
            form_context: m.form_context().clone(),
            autocomplete: m.autocomplete().map(|s| s.to_string()),
            live_validate: m.live_validate(),
            no_validate: m.no_validate(),
            no_html5_validate: m.no_html5_validate(),
            show_error_list: m.show_error_list(),
            safe_render_completion: m.safe_render_completion(),
            disabled: m.disabled(),
            fields: m.fields().cloned(),
            widgets: m.widgets().cloned(),
            error_list: m.error_list().map(str::to_string),
            field_template: m.field_template().map(str::to_string),
            array_field_template: m.array_field_template().map(str::to_string),
            object_field_template: m.object_field_template().map(str::to_string),
            validate: m.validate().cloned(),
            transform_errors: m.transform_errors().cloned(),
        }
    }

    /// Push the current model snapshot to the engine.
    pub fn render(&mut self) {
        let props = self.props();
        self.engine.update(&props);
        self.stale.set(false);
    }

    pub fn draw(&mut self, f: &mut Frame, area: Rect, focused: bool) {
        if self.stale.get() {
            self.render();
        }
        self.engine.draw(f, area, focused);
    }

    /// Apply an engine change to the model: errors first, then data.
    pub fn on_change(&mut self, evt: ChangeEvent) {
        let ChangeEvent { form_data, errors } = evt;
        if let Some(data) = form_data {
            let mut m = self.model.borrow_mut();
            m.set_errors(errors);
            m.set_form_data(data);
        }
    }

    /// Route a key to the engine. Returns true when the model was updated.
    pub fn on_key(&mut self, key: KeyEvent) -> bool {
        if self.stale.get() {
            self.render();
        }
        match self.engine.on_key(key) {
            Some(evt) if evt.form_data.is_some() => {
                self.on_change(evt);
                true
            }
            _ => false,
        }
    }

    pub fn get_value(&self) -> FormValue {
        let m = self.model.borrow();
        FormValue {
            form_data: m.form_data().clone(),
            errors: m.errors().to_vec(),
        }
    }
}

impl<E> Drop for FormView<E> {
    fn drop(&mut self) {
        if let Ok(m) = self.model.try_borrow() {
            m.state_changed().disconnect(self.slot);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Engine stand-in that records snapshots and replays queued changes.
    #[derive(Default)]
    pub struct RecordingEngine {
        pub updates: Vec<FormProps>,
        pub queued: std::collections::VecDeque<ChangeEvent>,
    }

    impl FormEngine for RecordingEngine {
        fn update(&mut self, props: &FormProps) {
            self.updates.push(props.clone());
        }
        fn draw(&mut self, _f: &mut Frame, _area: Rect, _focused: bool) {}
        fn on_key(&mut self, _key: KeyEvent) -> Option<ChangeEvent> {
            self.queued.pop_front()
        }
    }
}
