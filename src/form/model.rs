use super::error::{FormConfigError, ValidationError};
use crate::signal::Signal;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Field or widget name mapped to the renderer the engine should use instead
/// of its default (e.g. `"password"`, `"textarea"`, `"json"`).
pub type RendererMap = BTreeMap<String, String>;

/// Extra validation run after schema validation; pushes its own errors.
pub type CustomValidator = Rc<dyn Fn(&JsonValue, &mut Vec<ValidationError>)>;

/// Post-processing applied to the final error list.
pub type ErrorTransformer = Rc<dyn Fn(Vec<ValidationError>) -> Vec<ValidationError>>;

/// Option keys that describe an HTML form element or its callbacks. The model
/// is the only source of form state, so these are refused outright.
pub const UNSUPPORTED_KEYS: &[&str] = &[
    "id",
    "name",
    "method",
    "target",
    "action",
    "enctype",
    "acceptcharset",
    "onChange",
    "onError",
    "onSubmit",
    "idPrefix",
];

/// Which property a state-changed notification refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelChange {
    Schema,
    UiSchema,
    FormData,
    Errors,
    FormContext,
    ClassName,
    Autocomplete,
    LiveValidate,
    NoValidate,
    NoHtml5Validate,
    ShowErrorList,
    SafeRenderCompletion,
    Disabled,
    Fields,
    Widgets,
    ErrorList,
    FieldTemplate,
    ArrayFieldTemplate,
    ObjectFieldTemplate,
    Validate,
    TransformErrors,
}

/// Initial configuration for a [`FormModel`]. Every `Some` is applied through
/// the matching setter.
#[derive(Clone, Default)]
pub struct FormOptions {
    pub schema: Option<JsonValue>,
    pub ui_schema: Option<JsonValue>,
    pub form_data: Option<JsonValue>,
    pub errors: Option<Vec<ValidationError>>,
    pub form_context: Option<JsonValue>,
    pub class_name: Option<String>,
    pub autocomplete: Option<String>,
    pub live_validate: Option<bool>,
    pub no_validate: Option<bool>,
    pub no_html5_validate: Option<bool>,
    pub show_error_list: Option<bool>,
    pub safe_render_completion: Option<bool>,
    pub disabled: Option<bool>,
    pub fields: Option<RendererMap>,
    pub widgets: Option<RendererMap>,
    pub error_list: Option<String>,
    pub field_template: Option<String>,
    pub array_field_template: Option<String>,
    pub object_field_template: Option<String>,
    pub validate: Option<CustomValidator>,
    pub transform_errors: Option<ErrorTransformer>,
}

impl FormOptions {
    /// Parse camelCase option keys from a JSON object.
    ///
    /// Keys in [`UNSUPPORTED_KEYS`] fail with [`FormConfigError::Unsupported`];
    /// keys the model does not know are skipped.
    pub fn from_json(v: &JsonValue) -> Result<Self, FormConfigError> {
        let obj = v.as_object().ok_or(FormConfigError::NotAnObject)?;
        let mut opts = FormOptions::default();
        for (key, val) in obj {
            if UNSUPPORTED_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "setting form option is not supported, use model state");
                return Err(FormConfigError::Unsupported { key: key.clone() });
            }
            match key.as_str() {
                "schema" => opts.schema = Some(val.clone()),
                "uiSchema" => opts.ui_schema = Some(val.clone()),
                "formData" => opts.form_data = Some(val.clone()),
                "formContext" => opts.form_context = Some(val.clone()),
                "errors" => {
                    let errs: Vec<ValidationError> = serde_json::from_value(val.clone())
                        .map_err(|_| FormConfigError::InvalidType {
                            key: key.clone(),
                            expected: "a list of validation errors",
                        })?;
                    opts.errors = Some(errs);
                }
                "className" => opts.class_name = Some(expect_str(key, val)?),
                "autocomplete" => opts.autocomplete = Some(expect_str(key, val)?),
                "liveValidate" => opts.live_validate = Some(expect_bool(key, val)?),
                "noValidate" => opts.no_validate = Some(expect_bool(key, val)?),
                "noHtml5Validate" => opts.no_html5_validate = Some(expect_bool(key, val)?),
                "showErrorList" => opts.show_error_list = Some(expect_bool(key, val)?),
                "safeRenderCompletion" => {
                    opts.safe_render_completion = Some(expect_bool(key, val)?)
                }
                "disabled" => opts.disabled = Some(expect_bool(key, val)?),
                "fields" => opts.fields = expect_renderers(key, val)?,
                "widgets" => opts.widgets = expect_renderers(key, val)?,
                "ErrorList" => opts.error_list = expect_renderer(key, val)?,
                "FieldTemplate" => opts.field_template = expect_renderer(key, val)?,
                "ArrayFieldTemplate" => opts.array_field_template = expect_renderer(key, val)?,
                "ObjectFieldTemplate" => opts.object_field_template = expect_renderer(key, val)?,
                other => tracing::debug!(key = other, "ignoring unknown form option"),
            }
        }
        Ok(opts)
    }
}

fn expect_bool(key: &str, v: &JsonValue) -> Result<bool, FormConfigError> {
    v.as_bool().ok_or_else(|| FormConfigError::InvalidType {
        key: key.to_string(),
        expected: "a boolean",
    })
}

fn expect_str(key: &str, v: &JsonValue) -> Result<String, FormConfigError> {
    v.as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| FormConfigError::InvalidType {
            key: key.to_string(),
            expected: "a string",
        })
}

fn expect_renderer(key: &str, v: &JsonValue) -> Result<Option<String>, FormConfigError> {
    if v.is_null() {
        return Ok(None);
    }
    v.as_str()
        .map(|s| Some(s.to_string()))
        .ok_or_else(|| FormConfigError::InvalidType {
            key: key.to_string(),
            expected: "a renderer name",
        })
}

fn expect_renderers(key: &str, v: &JsonValue) -> Result<Option<RendererMap>, FormConfigError> {
    if v.is_null() {
        return Ok(None);
    }
    let bad = || FormConfigError::InvalidType {
        key: key.to_string(),
        expected: "an object of renderer names",
    };
    let obj = v.as_object().ok_or_else(bad)?;
    let mut map = RendererMap::new();
    for (name, r) in obj {
        map.insert(name.clone(), r.as_str().ok_or_else(bad)?.to_string());
    }
    Ok(Some(map))
}

/// Observable state of one schema-driven form.
///
/// Every setter stores the new value and then emits exactly one
/// [`ModelChange`] on [`FormModel::state_changed`], whether or not the value
/// differs from the previous one.
pub struct FormModel {
    schema: JsonValue,
    ui_schema: JsonValue,
    form_data: JsonValue,
    errors: Vec<ValidationError>,
    form_context: JsonValue,
    class_name: String,
    autocomplete: Option<String>,
    live_validate: bool,
    no_validate: bool,
    no_html5_validate: bool,
    show_error_list: bool,
    safe_render_completion: bool,
    disabled: bool,
    fields: Option<RendererMap>,
    widgets: Option<RendererMap>,
    error_list: Option<String>,
    field_template: Option<String>,
    array_field_template: Option<String>,
    object_field_template: Option<String>,
    validate: Option<CustomValidator>,
    transform_errors: Option<ErrorTransformer>,
    state_changed: Signal<ModelChange>,
    form_data_changed: Signal<JsonValue>,
}

impl Default for FormModel {
    fn default() -> Self {
        Self {
            schema: empty_schema(),
            ui_schema: empty_schema(),
            form_data: JsonValue::Null,
            errors: Vec::new(),
            form_context: JsonValue::Null,
            class_name: String::new(),
            autocomplete: None,
            live_validate: true,
            no_validate: false,
            no_html5_validate: false,
            show_error_list: false,
            safe_render_completion: false,
            disabled: false,
            fields: None,
            widgets: None,
            error_list: None,
            field_template: None,
            array_field_template: None,
            object_field_template: None,
            validate: None,
            transform_errors: None,
            state_changed: Signal::new(),
            form_data_changed: Signal::new(),
        }
    }
}

impl std::fmt::Debug for FormModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormModel")
            .field("schema", &self.schema)
            .field("form_data", &self.form_data)
            .field("errors", &self.errors.len())
            .field("live_validate", &self.live_validate)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

fn empty_schema() -> JsonValue {
    JsonValue::Object(serde_json::Map::new())
}

impl FormModel {
    pub fn new(options: FormOptions) -> Self {
        let mut m = Self::default();
        let FormOptions {
            schema,
            ui_schema,
            form_data,
            errors,
            form_context,
            class_name,
            autocomplete,
            live_validate,
            no_validate,
            no_html5_validate,
            show_error_list,
            safe_render_completion,
            disabled,
            fields,
            widgets,
            error_list,
            field_template,
            array_field_template,
            object_field_template,
            validate,
            transform_errors,
        } = options;
        if let Some(v) = schema {
            m.set_schema(v);
        }
        if let Some(v) = ui_schema {
            m.set_ui_schema(v);
        }
        if let Some(v) = form_data {
            m.set_form_data(v);
        }
        if let Some(v) = errors {
            m.set_errors(v);
        }
        if let Some(v) = form_context {
            m.set_form_context(v);
        }
        if let Some(v) = class_name {
            m.set_class_name(v);
        }
        if autocomplete.is_some() {
            m.set_autocomplete(autocomplete);
        }
        if let Some(v) = live_validate {
            m.set_live_validate(v);
        }
        if let Some(v) = no_validate {
            m.set_no_validate(v);
        }
        if let Some(v) = no_html5_validate {
            m.set_no_html5_validate(v);
        }
        if let Some(v) = show_error_list {
            m.set_show_error_list(v);
        }
        if let Some(v) = safe_render_completion {
            m.set_safe_render_completion(v);
        }
        if let Some(v) = disabled {
            m.set_disabled(v);
        }
        if fields.is_some() {
            m.set_fields(fields);
        }
        if widgets.is_some() {
            m.set_widgets(widgets);
        }
        if error_list.is_some() {
            m.set_error_list(error_list);
        }
        if field_template.is_some() {
            m.set_field_template(field_template);
        }
        if array_field_template.is_some() {
            m.set_array_field_template(array_field_template);
        }
        if object_field_template.is_some() {
            m.set_object_field_template(object_field_template);
        }
        if validate.is_some() {
            m.set_validate(validate);
        }
        if transform_errors.is_some() {
            m.set_transform_errors(transform_errors);
        }
        m
    }

    pub fn from_json(options: &JsonValue) -> Result<Self, FormConfigError> {
        Ok(Self::new(FormOptions::from_json(options)?))
    }

    pub fn state_changed(&self) -> &Signal<ModelChange> {
        &self.state_changed
    }

    /// Fires after [`ModelChange::FormData`] with the new data. Slots get the
    /// value itself since the model is usually still borrowed by the setter.
    pub fn form_data_changed(&self) -> &Signal<JsonValue> {
        &self.form_data_changed
    }

    fn changed(&self, what: ModelChange) {
        self.state_changed.emit(&what);
    }

    pub fn schema(&self) -> &JsonValue {
        &self.schema
    }

    /// `null` is stored as the empty schema.
    pub fn set_schema(&mut self, schema: JsonValue) {
        self.schema = if schema.is_null() {
            empty_schema()
        } else {
            schema
        };
        self.changed(ModelChange::Schema);
    }

    pub fn ui_schema(&self) -> &JsonValue {
        &self.ui_schema
    }

    pub fn set_ui_schema(&mut self, ui_schema: JsonValue) {
        self.ui_schema = ui_schema;
        self.changed(ModelChange::UiSchema);
    }

    /// The (possibly invalid) value being edited.
    pub fn form_data(&self) -> &JsonValue {
        &self.form_data
    }

    pub fn set_form_data(&mut self, form_data: JsonValue) {
        self.form_data = form_data;
        self.changed(ModelChange::FormData);
        self.form_data_changed.emit(&self.form_data);
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Written by the view when the engine reports a change.
    pub fn set_errors(&mut self, errors: Vec<ValidationError>) {
        self.errors = errors;
        self.changed(ModelChange::Errors);
    }

    pub fn form_context(&self) -> &JsonValue {
        &self.form_context
    }

    pub fn set_form_context(&mut self, form_context: JsonValue) {
        self.form_context = form_context;
        self.changed(ModelChange::FormContext);
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn set_class_name(&mut self, class_name: impl Into<String>) {
        self.class_name = class_name.into();
        self.changed(ModelChange::ClassName);
    }

    pub fn autocomplete(&self) -> Option<&str> {
        self.autocomplete.as_deref()
    }

    pub fn set_autocomplete(&mut self, autocomplete: Option<String>) {
        self.autocomplete = autocomplete;
        self.changed(ModelChange::Autocomplete);
    }

    /// Whether errors are computed on every edit.
    pub fn live_validate(&self) -> bool {
        self.live_validate
    }

    pub fn set_live_validate(&mut self, live_validate: bool) {
        self.live_validate = live_validate;
        self.changed(ModelChange::LiveValidate);
    }

    pub fn no_validate(&self) -> bool {
        self.no_validate
    }

    pub fn set_no_validate(&mut self, no_validate: bool) {
        self.no_validate = no_validate;
        self.changed(ModelChange::NoValidate);
    }

    pub fn no_html5_validate(&self) -> bool {
        self.no_html5_validate
    }

    pub fn set_no_html5_validate(&mut self, no_html5_validate: bool) {
        self.no_html5_validate = no_html5_validate;
        self.changed(ModelChange::NoHtml5Validate);
    }

    pub fn show_error_list(&self) -> bool {
        self.show_error_list
    }

    pub fn set_show_error_list(&mut self, show_error_list: bool) {
        self.show_error_list = show_error_list;
        self.changed(ModelChange::ShowErrorList);
    }

    pub fn safe_render_completion(&self) -> bool {
        self.safe_render_completion
    }

    pub fn set_safe_render_completion(&mut self, safe_render_completion: bool) {
        self.safe_render_completion = safe_render_completion;
        self.changed(ModelChange::SafeRenderCompletion);
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
        self.changed(ModelChange::Disabled);
    }

    pub fn fields(&self) -> Option<&RendererMap> {
        self.fields.as_ref()
    }

    pub fn set_fields(&mut self, fields: Option<RendererMap>) {
        self.fields = fields;
        self.changed(ModelChange::Fields);
    }

    pub fn widgets(&self) -> Option<&RendererMap> {
        self.widgets.as_ref()
    }

    pub fn set_widgets(&mut self, widgets: Option<RendererMap>) {
        self.widgets = widgets;
        self.changed(ModelChange::Widgets);
    }

    /// Renderer for the list of errors above the form.
    pub fn error_list(&self) -> Option<&str> {
        self.error_list.as_deref()
    }

    pub fn set_error_list(&mut self, error_list: Option<String>) {
        self.error_list = error_list;
        self.changed(ModelChange::ErrorList);
    }

    /// Renderer wrapping every field (label, description, errors).
    pub fn field_template(&self) -> Option<&str> {
        self.field_template.as_deref()
    }

    pub fn set_field_template(&mut self, field_template: Option<String>) {
        self.field_template = field_template;
        self.changed(ModelChange::FieldTemplate);
    }

    pub fn array_field_template(&self) -> Option<&str> {
        self.array_field_template.as_deref()
    }

    pub fn set_array_field_template(&mut self, array_field_template: Option<String>) {
        self.array_field_template = array_field_template;
        self.changed(ModelChange::ArrayFieldTemplate);
    }

    pub fn object_field_template(&self) -> Option<&str> {
        self.object_field_template.as_deref()
    }

    pub fn set_object_field_template(&mut self, object_field_template: Option<String>) {
        self.object_field_template = object_field_template;
        self.changed(ModelChange::ObjectFieldTemplate);
    }

    pub fn validate(&self) -> Option<&CustomValidator> {
        self.validate.as_ref()
    }

    pub fn set_validate(&mut self, validate: Option<CustomValidator>) {
        self.validate = validate;
        self.changed(ModelChange::Validate);
    }

    pub fn transform_errors(&self) -> Option<&ErrorTransformer> {
        self.transform_errors.as_ref()
    }

    pub fn set_transform_errors(&mut self, transform_errors: Option<ErrorTransformer>) {
        self.transform_errors = transform_errors;
        self.changed(ModelChange::TransformErrors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn record(model: &FormModel) -> Rc<RefCell<Vec<ModelChange>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        model
            .state_changed()
            .connect(move |c| s.borrow_mut().push(*c));
        seen
    }

    #[test]
    fn defaults_match_engine_expectations() {
        let m = FormModel::default();
        assert_eq!(m.schema(), &json!({}));
        assert!(m.form_data().is_null());
        assert!(m.live_validate());
        assert!(!m.no_validate());
        assert!(!m.no_html5_validate());
        assert!(!m.show_error_list());
        assert!(!m.safe_render_completion());
        assert!(!m.disabled());
        assert!(m.fields().is_none());
        assert!(m.widgets().is_none());
        assert!(m.error_list().is_none());
        assert!(m.field_template().is_none());
        assert!(m.array_field_template().is_none());
        assert!(m.object_field_template().is_none());
        assert!(m.errors().is_empty());
    }

    #[test]
    fn every_setter_call_notifies_once_even_without_change() {
        let mut m = FormModel::default();
        let seen = record(&m);
        m.set_form_data(json!({"a": 1}));
        m.set_form_data(json!({"a": 1}));
        m.set_live_validate(true);
        m.set_disabled(false);
        m.set_schema(json!({}));
        m.set_errors(vec![]);
        m.set_widgets(None);
        m.set_class_name("");
        assert_eq!(
            *seen.borrow(),
            vec![
                ModelChange::FormData,
                ModelChange::FormData,
                ModelChange::LiveValidate,
                ModelChange::Disabled,
                ModelChange::Schema,
                ModelChange::Errors,
                ModelChange::Widgets,
                ModelChange::ClassName,
            ]
        );
    }

    #[test]
    fn template_setters_notify_once_each() {
        let mut m = FormModel::default();
        let seen = record(&m);
        m.set_error_list(Some("summary".into()));
        m.set_field_template(Some("compact".into()));
        m.set_array_field_template(None);
        m.set_object_field_template(Some("flat".into()));
        m.set_error_list(Some("summary".into()));
        assert_eq!(
            *seen.borrow(),
            vec![
                ModelChange::ErrorList,
                ModelChange::FieldTemplate,
                ModelChange::ArrayFieldTemplate,
                ModelChange::ObjectFieldTemplate,
                ModelChange::ErrorList,
            ]
        );
        assert_eq!(m.error_list(), Some("summary"));
        assert_eq!(m.field_template(), Some("compact"));
        assert_eq!(m.object_field_template(), Some("flat"));
    }

    #[test]
    fn template_options_parse_from_json() {
        let m = FormModel::from_json(&json!({
            "ErrorList": "summary",
            "FieldTemplate": "compact",
            "ArrayFieldTemplate": null,
            "ObjectFieldTemplate": "flat"
        }))
        .unwrap();
        assert_eq!(m.error_list(), Some("summary"));
        assert_eq!(m.field_template(), Some("compact"));
        assert!(m.array_field_template().is_none());
        assert_eq!(m.object_field_template(), Some("flat"));
        let err = FormModel::from_json(&json!({"FieldTemplate": 3})).unwrap_err();
        assert!(err.to_string().contains("FieldTemplate"));
    }

    #[test]
    fn form_data_slots_receive_the_new_value() {
        let model = Rc::new(RefCell::new(FormModel::default()));
        let got = Rc::new(RefCell::new(Vec::new()));
        let g = Rc::clone(&got);
        model
            .borrow()
            .form_data_changed()
            .connect(move |v| g.borrow_mut().push(v.clone()));
        model.borrow_mut().set_form_data(json!({"a": 1}));
        model.borrow_mut().set_schema(json!({}));
        assert_eq!(*got.borrow(), vec![json!({"a": 1})]);
    }

    #[test]
    fn notification_observes_the_new_value() {
        let model = Rc::new(RefCell::new(FormModel::default()));
        let observed = Rc::new(RefCell::new(None));
        // The slot cannot borrow the model while the setter holds it, so it
        // records the change and the test reads the model right after.
        let o = Rc::clone(&observed);
        model
            .borrow()
            .state_changed()
            .connect(move |c| *o.borrow_mut() = Some(*c));
        model.borrow_mut().set_form_data(json!(42));
        assert_eq!(*observed.borrow(), Some(ModelChange::FormData));
        assert_eq!(model.borrow().form_data(), &json!(42));
    }

    #[test]
    fn null_schema_is_normalized() {
        let mut m = FormModel::default();
        m.set_schema(JsonValue::Null);
        assert_eq!(m.schema(), &json!({}));
        let m2 = FormModel::from_json(&json!({"schema": null})).unwrap();
        assert_eq!(m2.schema(), &json!({}));
    }

    #[test]
    fn json_options_run_through_setters() {
        let m = FormModel::from_json(&json!({
            "schema": {"type": "object"},
            "uiSchema": {"a": {"ui:autofocus": true}},
            "formData": {"a": "x"},
            "liveValidate": false,
            "showErrorList": true,
            "className": "jp-FileDialog",
            "widgets": {"secret": "password"},
            "somethingElse": 3
        }))
        .unwrap();
        assert_eq!(m.schema(), &json!({"type": "object"}));
        assert_eq!(m.form_data(), &json!({"a": "x"}));
        assert!(!m.live_validate());
        assert!(m.show_error_list());
        assert_eq!(m.class_name(), "jp-FileDialog");
        assert_eq!(
            m.widgets().and_then(|w| w.get("secret")).map(String::as_str),
            Some("password")
        );
    }

    #[test]
    fn unsupported_keys_fail_construction() {
        for key in UNSUPPORTED_KEYS {
            let mut obj = serde_json::Map::new();
            obj.insert((*key).to_string(), json!("x"));
            match FormModel::from_json(&JsonValue::Object(obj)) {
                Err(FormConfigError::Unsupported { key: k }) => assert_eq!(k, *key),
                other => panic!("expected unsupported error for {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn wrong_option_types_are_reported() {
        let err = FormModel::from_json(&json!({"liveValidate": "yes"})).unwrap_err();
        assert!(err.to_string().contains("liveValidate"));
        assert!(matches!(
            FormModel::from_json(&json!([1])),
            Err(FormConfigError::NotAnObject)
        ));
    }

    #[test]
    fn typed_options_apply_custom_functions() {
        let validate: CustomValidator = Rc::new(|_, errs| {
            errs.push(ValidationError::new("custom", "", "nope"));
        });
        let m = FormModel::new(FormOptions {
            validate: Some(validate),
            no_validate: Some(true),
            ..Default::default()
        });
        let mut errs = Vec::new();
        if let Some(v) = m.validate() {
            v(&JsonValue::Null, &mut errs);
        }
        assert_eq!(errs.len(), 1);
        assert!(m.no_validate());
    }
}
