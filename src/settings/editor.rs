use super::{SettingsEntry, StoreError};
use crate::form::{ChangeEvent, FormEngine, FormModel, FormOptions, FormView, IdAllocator};
use crate::json::{deep_equal, to_pretty};
use crate::signal::{Signal, SlotId};
use crate::theme::Theme;
use crate::widgets::toolbar::{Toolbar, ToolbarItem};
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use serde_json::{json, Value as JsonValue};
use std::cell::Cell;
use std::rc::Rc;

/// Command ids for the two toolbar actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandBundle {
    pub revert: String,
    pub save: String,
}

impl Default for CommandBundle {
    fn default() -> Self {
        Self {
            revert: "settingeditor:revert".into(),
            save: "settingeditor:save".into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EditorOptions {
    pub commands: CommandBundle,
    /// Relative widths of the defaults and user panes.
    pub sizes: [f64; 2],
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            commands: CommandBundle::default(),
            sizes: [1.0, 1.0],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing to save; the store was not called.
    Clean,
    Saved,
    Failed,
}

struct CommandState {
    ids: Vec<String>,
    can_revert: Cell<bool>,
    can_save: Cell<bool>,
    changed: Signal<Vec<String>>,
}

impl CommandState {
    fn set(&self, can_revert: bool, can_save: bool) {
        self.can_revert.set(can_revert);
        self.can_save.set(can_save);
        self.changed.emit(&self.ids);
    }
}

type SaveErrorHandler = Box<dyn FnMut(&StoreError)>;

/// Two side by side forms over one settings entry: the read-only defaults
/// and the editable user overrides.
pub struct SettingsFormEditor<E: FormEngine> {
    defaults: FormView<E>,
    user: FormView<E>,
    settings: Option<Rc<dyn SettingsEntry>>,
    slot: Option<SlotId>,
    data_slot: Option<SlotId>,
    commands: CommandBundle,
    state: Rc<CommandState>,
    toolbar: Toolbar,
    sizes: [f64; 2],
    on_save_error: SaveErrorHandler,
}

fn empty_model(disabled: bool) -> FormModel {
    FormModel::new(FormOptions {
        schema: Some(json!({})),
        form_data: Some(json!({})),
        disabled: Some(disabled),
        ..Default::default()
    })
}

fn valid_sizes(sizes: [f64; 2]) -> bool {
    sizes.iter().all(|s| s.is_finite() && *s >= 0.0) && sizes[0] + sizes[1] > 0.0
}

impl<E: FormEngine> SettingsFormEditor<E> {
    /// `make_engine` is called once per pane with the pane's title.
    pub fn new(
        options: EditorOptions,
        ids: &IdAllocator,
        mut make_engine: impl FnMut(&str) -> E,
    ) -> Self {
        let defaults = FormView::new(empty_model(true), make_engine("System Defaults"), ids);
        let user = FormView::new(empty_model(false), make_engine("User Preferences"), ids);
        let state = Rc::new(CommandState {
            ids: vec![options.commands.revert.clone(), options.commands.save.clone()],
            can_revert: Cell::new(false),
            can_save: Cell::new(false),
            changed: Signal::new(),
        });
        let sizes = if valid_sizes(options.sizes) {
            options.sizes
        } else {
            [1.0, 1.0]
        };
        Self {
            defaults,
            user,
            settings: None,
            slot: None,
            data_slot: None,
            commands: options.commands,
            state,
            toolbar: Toolbar::new(),
            sizes,
            on_save_error: Box::new(|e| tracing::warn!(error = %e, "unhandled settings save failure")),
        }
    }

    pub fn set_save_error_handler(&mut self, handler: impl FnMut(&StoreError) + 'static) {
        self.on_save_error = Box::new(handler);
    }

    pub fn settings(&self) -> Option<&Rc<dyn SettingsEntry>> {
        self.settings.as_ref()
    }

    /// Bind to `settings`. Rebinding the same plugin keeps unsaved edits.
    pub fn set_settings(&mut self, settings: Option<Rc<dyn SettingsEntry>>) {
        let same = match (&self.settings, &settings) {
            (Some(a), Some(b)) => a.plugin() == b.plugin(),
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }
        if let Some(slot) = self.data_slot.take() {
            self.user.model().form_data_changed().disconnect(slot);
        }
        if let (Some(old), Some(slot)) = (self.settings.take(), self.slot.take()) {
            old.changed().disconnect(slot);
            tracing::debug!(plugin = old.plugin(), "settings editor unbound");
        }
        let Some(entry) = settings else {
            for view in [&self.defaults, &self.user] {
                let mut m = view.model_mut();
                m.set_schema(json!({}));
                m.set_errors(Vec::new());
                m.set_form_data(json!({}));
            }
            self.state.set(false, false);
            return;
        };

        let schema = entry.schema();
        {
            let mut d = self.defaults.model_mut();
            d.set_schema(schema.clone());
            d.set_form_data(entry.default_value());
            d.set_disabled(true);
        }
        {
            let mut u = self.user.model_mut();
            u.set_schema(schema);
            u.set_errors(Vec::new());
            u.set_form_data(entry.user());
        }

        // any write to the user data, from keys or from outside, recomputes the commands
        let weak_entry = Rc::downgrade(&entry);
        let state = Rc::downgrade(&self.state);
        self.data_slot = Some(self.user.model().form_data_changed().connect(move |data| {
            let (Some(entry), Some(state)) = (weak_entry.upgrade(), state.upgrade()) else {
                return;
            };
            let dirty = !deep_equal(data, &entry.user());
            state.set(dirty, dirty);
        }));

        let model = Rc::downgrade(&self.user.shared_model());
        let weak_entry = Rc::downgrade(&entry);
        self.slot = Some(entry.changed().connect(move |_| {
            let (Some(model), Some(entry)) = (model.upgrade(), weak_entry.upgrade()) else {
                return;
            };
            match model.try_borrow_mut() {
                Ok(mut m) => m.set_form_data(entry.user()),
                Err(_) => tracing::warn!(plugin = entry.plugin(), "user form busy; skipped re-pull"),
            };
        }));
        tracing::debug!(plugin = entry.plugin(), "settings editor bound");
        self.settings = Some(entry);
        self.state.set(false, false);
    }

    /// True when the user form differs from the persisted user value.
    pub fn is_dirty(&self) -> bool {
        match &self.settings {
            Some(entry) => !deep_equal(self.user.model().form_data(), &entry.user()),
            None => false,
        }
    }

    pub fn can_revert(&self) -> bool {
        self.state.can_revert.get()
    }

    pub fn can_save(&self) -> bool {
        self.state.can_save.get()
    }

    /// Fires with `[revert, save]` whenever their enabled state is recomputed.
    pub fn commands_changed(&self) -> &Signal<Vec<String>> {
        &self.state.changed
    }

    pub fn commands(&self) -> &CommandBundle {
        &self.commands
    }

    pub fn is_command_enabled(&self, id: &str) -> bool {
        if id == self.commands.revert {
            self.can_revert()
        } else if id == self.commands.save {
            self.can_save()
        } else {
            false
        }
    }

    pub fn revert(&mut self) {
        match &self.settings {
            Some(entry) => {
                let mut m = self.user.model_mut();
                m.set_errors(Vec::new());
                m.set_form_data(entry.user());
            }
            None => self.state.set(false, false),
        }
    }

    pub fn save(&mut self) -> SaveOutcome {
        let Some(entry) = self.settings.clone() else {
            return SaveOutcome::Clean;
        };
        if !self.is_dirty() {
            return SaveOutcome::Clean;
        }
        let data: JsonValue = self.user.model().form_data().clone();
        let result = to_pretty(&data)
            .map_err(|source| StoreError::Parse {
                plugin: entry.plugin().to_string(),
                source,
            })
            .and_then(|raw| entry.save(&raw));
        match result {
            Ok(()) => {
                tracing::debug!(plugin = entry.plugin(), "settings saved");
                self.state.set(false, false);
                SaveOutcome::Saved
            }
            Err(e) => {
                tracing::error!(plugin = entry.plugin(), error = %e, "settings save failed");
                self.state.set(true, false);
                (self.on_save_error)(&e);
                SaveOutcome::Failed
            }
        }
    }

    pub fn sizes(&self) -> [f64; 2] {
        self.sizes
    }

    /// Ignores negative, non-finite or all-zero splits.
    pub fn set_sizes(&mut self, sizes: [f64; 2]) {
        if valid_sizes(sizes) {
            self.sizes = sizes;
        } else {
            tracing::debug!(?sizes, "ignored invalid pane sizes");
        }
    }

    /// Populate the toolbar. Runs once; later calls leave it alone.
    pub fn on_after_attach(&mut self) {
        if !self.toolbar.is_empty() {
            return;
        }
        self.toolbar.add_item("spacer", ToolbarItem::Spacer);
        self.toolbar.add_item(
            "revert",
            ToolbarItem::Command {
                id: self.commands.revert.clone(),
                label: "Revert".into(),
                hint: Some("^R".into()),
            },
        );
        self.toolbar.add_item(
            "save",
            ToolbarItem::Command {
                id: self.commands.save.clone(),
                label: "Save".into(),
                hint: Some("^S".into()),
            },
        );
    }

    pub fn toolbar(&self) -> &Toolbar {
        &self.toolbar
    }

    pub fn defaults_view(&self) -> &FormView<E> {
        &self.defaults
    }

    pub fn user_view(&self) -> &FormView<E> {
        &self.user
    }

    /// Route a key to the user form. Returns true when it changed the data.
    pub fn on_user_key(&mut self, key: KeyEvent) -> bool {
        self.user.on_key(key)
    }

    /// Apply an engine change to the user form directly.
    pub fn handle_user_change(&mut self, evt: ChangeEvent) {
        self.user.on_change(evt);
    }

    pub fn draw(&mut self, f: &mut Frame, area: Rect, theme: &Theme) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(3)])
            .split(area);
        let state = Rc::clone(&self.state);
        let commands = self.commands.clone();
        let enabled = move |id: &str| {
            (id == commands.revert && state.can_revert.get())
                || (id == commands.save && state.can_save.get())
        };
        self.toolbar.draw(f, rows[0], &enabled, theme);

        let total = self.sizes[0] + self.sizes[1];
        let left = ((self.sizes[0] / total) * 100.0).round() as u16;
        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(left),
                Constraint::Percentage(100 - left.min(100)),
            ])
            .split(rows[1]);
        self.defaults.draw(f, panes[0], false);
        self.user.draw(f, panes[1], true);
    }
}

impl<E: FormEngine> Drop for SettingsFormEditor<E> {
    fn drop(&mut self) {
        if let Some(slot) = self.data_slot {
            if let Ok(m) = self.user.shared_model().try_borrow() {
                m.form_data_changed().disconnect(slot);
            }
        }
        if let (Some(entry), Some(slot)) = (&self.settings, self.slot) {
            entry.changed().disconnect(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::view::testing::RecordingEngine;
    use crate::settings::testing::MemorySettings;
    use std::cell::RefCell;

    fn schema() -> JsonValue {
        json!({
            "type": "object",
            "properties": {
                "theme": {"type": "string", "default": "dark"},
                "fontSize": {"type": "integer", "default": 12}
            }
        })
    }

    fn entry(plugin: &str, user: JsonValue) -> Rc<MemorySettings> {
        Rc::new(MemorySettings::new(plugin, schema(), user))
    }

    fn editor() -> SettingsFormEditor<RecordingEngine> {
        SettingsFormEditor::new(EditorOptions::default(), &IdAllocator::new(), |_| {
            RecordingEngine::default()
        })
    }

    fn edit(ed: &mut SettingsFormEditor<RecordingEngine>, data: JsonValue) {
        ed.handle_user_change(ChangeEvent {
            form_data: Some(data),
            errors: vec![],
        });
    }

    #[test]
    fn unbound_editor_is_clean_and_disabled() {
        let ed = editor();
        assert!(!ed.is_dirty());
        assert!(!ed.can_revert());
        assert!(!ed.can_save());
        assert_eq!(ed.user_view().model().schema(), &json!({}));
        assert_eq!(ed.user_view().model().form_data(), &json!({}));
        assert!(ed.defaults_view().model().disabled());
    }

    #[test]
    fn binding_loads_defaults_and_user_values() {
        let mut ed = editor();
        let a = entry("a", json!({"fontSize": 14}));
        ed.set_settings(Some(a.clone() as Rc<dyn SettingsEntry>));
        assert_eq!(ed.defaults_view().model().form_data(), &json!({"theme": "dark", "fontSize": 12}));
        assert!(ed.defaults_view().model().disabled());
        assert_eq!(ed.user_view().model().form_data(), &json!({"fontSize": 14}));
        assert_eq!(ed.user_view().model().schema(), &schema());
        assert_eq!(a.changed().slot_count(), 1);
    }

    #[test]
    fn rebinding_same_plugin_keeps_edits_other_plugin_replaces_them() {
        let mut ed = editor();
        let a = entry("a", json!({}));
        ed.set_settings(Some(a.clone() as Rc<dyn SettingsEntry>));
        edit(&mut ed, json!({"theme": "light"}));
        assert!(ed.is_dirty());

        ed.set_settings(Some(entry("a", json!({})) as Rc<dyn SettingsEntry>));
        assert_eq!(ed.user_view().model().form_data(), &json!({"theme": "light"}));
        assert!(ed.is_dirty());

        let b = entry("b", json!({"fontSize": 20}));
        ed.set_settings(Some(b.clone() as Rc<dyn SettingsEntry>));
        assert_eq!(ed.user_view().model().form_data(), &json!({"fontSize": 20}));
        assert!(!ed.is_dirty());
        assert_eq!(a.changed().slot_count(), 0);
        assert_eq!(b.changed().slot_count(), 1);

        ed.set_settings(None);
        assert_eq!(b.changed().slot_count(), 0);
        assert_eq!(ed.user_view().model().form_data(), &json!({}));
        assert!(!ed.is_dirty());
    }

    #[test]
    fn edits_enable_both_commands_until_reverted() {
        let mut ed = editor();
        let a = entry("a", json!({"fontSize": 14}));
        ed.set_settings(Some(a.clone() as Rc<dyn SettingsEntry>));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        ed.commands_changed().connect(move |ids| s.borrow_mut().push(ids.clone()));

        edit(&mut ed, json!({"fontSize": 16}));
        assert!(ed.is_dirty());
        assert!(ed.can_revert() && ed.can_save());

        ed.revert();
        assert!(!ed.is_dirty());
        assert!(!ed.can_revert() && !ed.can_save());
        assert_eq!(ed.user_view().model().form_data(), &json!({"fontSize": 14}));
        let ids = vec!["settingeditor:revert".to_string(), "settingeditor:save".to_string()];
        assert_eq!(*seen.borrow(), vec![ids.clone(), ids]);
    }

    #[test]
    fn edit_equal_to_persisted_value_is_not_dirty() {
        let mut ed = editor();
        ed.set_settings(Some(entry("a", json!({"fontSize": 14, "theme": "dark"})) as Rc<dyn SettingsEntry>));
        edit(&mut ed, json!({"theme": "dark", "fontSize": 14.0}));
        assert!(!ed.is_dirty());
        assert!(!ed.can_save());
    }

    #[test]
    fn save_on_clean_editor_skips_the_store() {
        let mut ed = editor();
        let a = entry("a", json!({}));
        ed.set_settings(Some(a.clone() as Rc<dyn SettingsEntry>));
        assert_eq!(ed.save(), SaveOutcome::Clean);
        assert!(a.saves.borrow().is_empty());
        let mut unbound = editor();
        assert_eq!(unbound.save(), SaveOutcome::Clean);
    }

    #[test]
    fn save_writes_pretty_json_and_clears_dirty() {
        let mut ed = editor();
        let a = entry("a", json!({}));
        ed.set_settings(Some(a.clone() as Rc<dyn SettingsEntry>));
        edit(&mut ed, json!({"fontSize": 16}));
        assert_eq!(ed.save(), SaveOutcome::Saved);
        assert_eq!(a.saves.borrow().as_slice(), ["{\n  \"fontSize\": 16\n}".to_string()]);
        assert!(!ed.is_dirty());
        assert!(!ed.can_revert() && !ed.can_save());
    }

    #[test]
    fn failed_save_keeps_edit_and_reports_once() {
        let mut ed = editor();
        let a = entry("a", json!({}));
        ed.set_settings(Some(a.clone() as Rc<dyn SettingsEntry>));
        let errors = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::clone(&errors);
        ed.set_save_error_handler(move |err| e.borrow_mut().push(err.to_string()));

        edit(&mut ed, json!({"fontSize": 16}));
        a.fail_next.set(true);
        assert_eq!(ed.save(), SaveOutcome::Failed);
        assert_eq!(errors.borrow().len(), 1);
        assert!(errors.borrow()[0].contains("disk full"));
        assert!(ed.can_revert());
        assert!(!ed.can_save());
        assert!(ed.is_dirty());
        assert_eq!(ed.user_view().model().form_data(), &json!({"fontSize": 16}));

        // retry without re-entering data
        assert_eq!(ed.save(), SaveOutcome::Saved);
        assert_eq!(a.saves.borrow().len(), 2);
    }

    #[test]
    fn external_change_wins_over_local_edit() {
        let mut ed = editor();
        let a = entry("a", json!({}));
        ed.set_settings(Some(a.clone() as Rc<dyn SettingsEntry>));
        edit(&mut ed, json!({"theme": "light"}));
        a.set_externally(json!({"fontSize": 9}));
        assert_eq!(ed.user_view().model().form_data(), &json!({"fontSize": 9}));
        assert!(!ed.is_dirty());
        assert!(!ed.can_save());
    }

    #[test]
    fn direct_model_writes_refresh_the_commands() {
        let mut ed = editor();
        let a = entry("a", json!({"fontSize": 14}));
        ed.set_settings(Some(a.clone() as Rc<dyn SettingsEntry>));
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        ed.commands_changed().connect(move |_| s.set(s.get() + 1));

        ed.user_view().model_mut().set_form_data(json!({"x": 1}));
        assert!(ed.is_dirty());
        assert!(ed.can_revert() && ed.can_save());
        assert_eq!(seen.get(), 1);

        ed.user_view().model_mut().set_form_data(json!({"fontSize": 14}));
        assert!(!ed.is_dirty());
        assert!(!ed.can_revert() && !ed.can_save());
        assert_eq!(seen.get(), 2);

        // other properties leave the commands alone
        ed.user_view().model_mut().set_disabled(false);
        assert_eq!(seen.get(), 2);

        ed.set_settings(None);
        let after_unbind = seen.get();
        ed.user_view().model_mut().set_form_data(json!({"y": 2}));
        assert_eq!(seen.get(), after_unbind);
        assert!(!ed.can_save());
    }

    #[test]
    fn toolbar_is_populated_once_in_fixed_order() {
        let mut ed = editor();
        ed.on_after_attach();
        ed.on_after_attach();
        assert_eq!(ed.toolbar().names(), vec!["spacer", "revert", "save"]);
    }

    #[test]
    fn sizes_reject_degenerate_splits() {
        let mut ed = editor();
        assert_eq!(ed.sizes(), [1.0, 1.0]);
        ed.set_sizes([2.0, 1.0]);
        assert_eq!(ed.sizes(), [2.0, 1.0]);
        ed.set_sizes([0.0, 0.0]);
        ed.set_sizes([-1.0, 1.0]);
        ed.set_sizes([f64::NAN, 1.0]);
        assert_eq!(ed.sizes(), [2.0, 1.0]);
    }

    #[test]
    fn dropping_the_editor_disconnects_from_the_entry() {
        let a = entry("a", json!({}));
        let mut ed = editor();
        ed.set_settings(Some(a.clone() as Rc<dyn SettingsEntry>));
        drop(ed);
        assert_eq!(a.changed().slot_count(), 0);
    }
}
