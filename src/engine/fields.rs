use crate::form::RendererMap;
use crate::json::{get_by_path, remove_by_path, set_by_path};
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Choice(Option<usize>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ArrayItemKind {
    String,
    Integer,
    Number,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    Text,
    Password,
    TextArea,
    Number {
        is_integer: bool,
    },
    // primitive items as comma-separated text
    Array {
        item_kind: ArrayItemKind,
    },
    Checkbox,
    Select {
        options: Vec<String>,
        values: Vec<JsonValue>,
    },
    // free-form objects edited as raw JSON
    Json {
        expandable: bool,
        max_properties: Option<usize>,
    },
}

#[derive(Clone, Debug)]
pub struct FormField {
    pub id: String,
    pub path: String,
    pub label: String,
    pub description: Option<String>,
    pub group: Option<String>,
    pub required: bool,
    pub read_only: bool,
    pub autofocus: bool,
    pub kind: FieldKind,
    pub value: FieldValue,
    pub default: Option<JsonValue>,
    pub error: Option<String>,
    // keys present when a JSON field was last loaded; used by the expandable rule
    pub initial_keys: BTreeSet<String>,
    pub touched: bool,
}

/// Inputs that decide how a schema maps to fields.
pub struct FieldContext<'a> {
    pub id_prefix: &'a str,
    pub ui_schema: &'a JsonValue,
    pub fields: Option<&'a RendererMap>,
    pub widgets: Option<&'a RendererMap>,
    pub disabled: bool,
}

/// Whether an object field may gain another property: it must allow
/// additional properties, not opt out via `ui:options.expandable`, and stay
/// under `maxProperties`.
pub fn can_expand(schema: &JsonValue, ui_schema: &JsonValue, form_data: &JsonValue) -> bool {
    let allows_extra = match schema.get("additionalProperties") {
        None | Some(JsonValue::Bool(false)) | Some(JsonValue::Null) => false,
        Some(_) => true,
    };
    if !allows_extra {
        return false;
    }
    let expandable = ui_schema
        .get("ui:options")
        .and_then(|o| o.get("expandable"))
        .and_then(|e| e.as_bool());
    if expandable == Some(false) {
        return false;
    }
    if let Some(max) = schema.get("maxProperties").and_then(|m| m.as_u64()) {
        let count = form_data.as_object().map(|o| o.len()).unwrap_or(0) as u64;
        return count < max;
    }
    true
}

fn ordered_keys(props: &Map<String, JsonValue>, ui: &JsonValue) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    if let Some(order) = ui.get("ui:order").and_then(|o| o.as_array()) {
        for k in order.iter().filter_map(|k| k.as_str()) {
            if props.contains_key(k) && !keys.iter().any(|x| x == k) {
                keys.push(k.to_string());
            }
        }
    }
    for k in props.keys() {
        if !keys.iter().any(|x| x == k) {
            keys.push(k.clone());
        }
    }
    keys
}

/// Build form fields from a JSON Schema. Nested objects with `properties` are
/// flattened into dotted paths under a group header; objects without
/// `properties` become raw JSON fields.
pub fn fields_from_schema(schema: &JsonValue, ctx: &FieldContext<'_>) -> Vec<FormField> {
    let mut out = Vec::new();
    walk(schema, ctx.ui_schema, "", None, ctx, &mut out);
    out
}

fn walk(
    schema: &JsonValue,
    ui: &JsonValue,
    prefix: &str,
    group: Option<String>,
    ctx: &FieldContext<'_>,
    out: &mut Vec<FormField>,
) {
    let Some(props) = schema.get("properties").and_then(|p| p.as_object()) else {
        return;
    };
    let required: BTreeSet<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    for name in ordered_keys(props, ui) {
        let Some(prop) = props.get(&name) else {
            continue;
        };
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        let prop_ui = ui.get(&name).cloned().unwrap_or(JsonValue::Null);
        let label = prop
            .get("title")
            .and_then(|s| s.as_str())
            .unwrap_or(&name)
            .to_string();
        let ty = prop
            .get("type")
            .and_then(|s| s.as_str())
            .unwrap_or("string")
            .to_ascii_lowercase();
        let field_override = ctx
            .fields
            .and_then(|m| m.get(&path))
            .map(|s| s.as_str())
            .or_else(|| prop_ui.get("ui:field").and_then(|s| s.as_str()));
        let widget = ctx
            .widgets
            .and_then(|m| m.get(&path))
            .map(|s| s.as_str())
            .or_else(|| prop_ui.get("ui:widget").and_then(|s| s.as_str()));

        if ty == "object" && prop.get("properties").is_some() && field_override != Some("json") {
            walk(prop, &prop_ui, &path, Some(label), ctx, out);
            continue;
        }

        let kind = if field_override == Some("json") || ty == "object" {
            FieldKind::Json {
                expandable: prop_ui
                    .get("ui:options")
                    .and_then(|o| o.get("expandable"))
                    .and_then(|e| e.as_bool())
                    != Some(false)
                    && !matches!(
                        prop.get("additionalProperties"),
                        None | Some(JsonValue::Bool(false))
                    ),
                max_properties: prop
                    .get("maxProperties")
                    .and_then(|m| m.as_u64())
                    .map(|m| m as usize),
            }
        } else if let Some(en) = prop.get("enum").and_then(|x| x.as_array()) {
            FieldKind::Select {
                options: en
                    .iter()
                    .map(|v| match v {
                        JsonValue::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
                values: en.clone(),
            }
        } else {
            match ty.as_str() {
                "boolean" => FieldKind::Checkbox,
                "integer" | "number" => FieldKind::Number {
                    is_integer: ty == "integer",
                },
                "array" => {
                    let itype = prop
                        .get("items")
                        .and_then(|i| i.get("type"))
                        .and_then(|s| s.as_str())
                        .unwrap_or("string");
                    match itype {
                        "integer" => FieldKind::Array {
                            item_kind: ArrayItemKind::Integer,
                        },
                        "number" => FieldKind::Array {
                            item_kind: ArrayItemKind::Number,
                        },
                        "string" => FieldKind::Array {
                            item_kind: ArrayItemKind::String,
                        },
                        _ => FieldKind::Json {
                            expandable: false,
                            max_properties: None,
                        },
                    }
                }
                _ => match widget {
                    Some("password") => FieldKind::Password,
                    Some("textarea") => FieldKind::TextArea,
                    _ => FieldKind::Text,
                },
            }
        };
        let value = match kind {
            FieldKind::Checkbox => FieldValue::Bool(false),
            FieldKind::Select { .. } => FieldValue::Choice(None),
            _ => FieldValue::Text(String::new()),
        };
        let read_only = ctx.disabled
            || prop.get("readOnly").and_then(|b| b.as_bool()).unwrap_or(false)
            || prop_ui.get("ui:readonly").and_then(|b| b.as_bool()).unwrap_or(false)
            || prop_ui.get("ui:disabled").and_then(|b| b.as_bool()).unwrap_or(false);
        out.push(FormField {
            id: format!("{}_{}", ctx.id_prefix, path.replace('.', "_")),
            path,
            label,
            description: prop
                .get("description")
                .and_then(|d| d.as_str())
                .map(|s| s.to_string()),
            group: group.clone(),
            required: required.contains(name.as_str()),
            read_only,
            autofocus: prop_ui
                .get("ui:autofocus")
                .and_then(|b| b.as_bool())
                .unwrap_or(false),
            kind,
            value,
            default: prop.get("default").cloned(),
            error: None,
            initial_keys: BTreeSet::new(),
            touched: false,
        });
    }
}

fn display(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Load field values from form data, falling back to schema defaults.
pub fn apply_data(fields: &mut [FormField], data: &JsonValue) {
    for fld in fields.iter_mut() {
        let v = get_by_path(data, &fld.path).or(fld.default.as_ref());
        fld.value = match (&fld.kind, v) {
            (FieldKind::Checkbox, Some(JsonValue::Bool(b))) => FieldValue::Bool(*b),
            (FieldKind::Checkbox, _) => FieldValue::Bool(false),
            (FieldKind::Select { values, .. }, Some(v)) => FieldValue::Choice(
                values
                    .iter()
                    .position(|o| crate::json::deep_equal(o, v)),
            ),
            (FieldKind::Select { .. }, None) => FieldValue::Choice(None),
            (FieldKind::Array { .. }, Some(JsonValue::Array(items))) => FieldValue::Text(
                items.iter().map(display).collect::<Vec<_>>().join(", "),
            ),
            (FieldKind::Json { .. }, Some(v)) => {
                FieldValue::Text(serde_json::to_string(v).unwrap_or_default())
            }
            (_, Some(JsonValue::Null)) | (_, None) => FieldValue::Text(String::new()),
            (_, Some(v)) => FieldValue::Text(display(v)),
        };
        fld.initial_keys = v
            .and_then(|v| v.as_object())
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        fld.touched = false;
        fld.error = None;
    }
}

fn parse_number(raw: &str, is_integer: bool) -> Option<JsonValue> {
    if is_integer {
        raw.parse::<i64>().ok().map(JsonValue::from)
    } else {
        raw.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(JsonValue::Number)
    }
}

/// Current JSON value of a field, or `None` when it is empty.
/// Unparseable input is kept as a string so validation reports it.
pub fn field_json(fld: &FormField) -> Option<JsonValue> {
    match (&fld.kind, &fld.value) {
        (FieldKind::Checkbox, FieldValue::Bool(b)) => Some(JsonValue::Bool(*b)),
        (FieldKind::Select { values, .. }, FieldValue::Choice(sel)) => {
            sel.and_then(|i| values.get(i).cloned())
        }
        (FieldKind::Number { is_integer }, FieldValue::Text(s)) => {
            let raw = s.trim();
            if raw.is_empty() {
                return None;
            }
            Some(parse_number(raw, *is_integer).unwrap_or_else(|| JsonValue::String(raw.into())))
        }
        (FieldKind::Array { item_kind }, FieldValue::Text(s)) => {
            let items: Vec<JsonValue> = s
                .split(',')
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(|t| {
                    let parsed = match item_kind {
                        ArrayItemKind::Integer => parse_number(t, true),
                        ArrayItemKind::Number => parse_number(t, false),
                        ArrayItemKind::String => None,
                    };
                    parsed.unwrap_or_else(|| JsonValue::String(t.to_string()))
                })
                .collect();
            if items.is_empty() {
                None
            } else {
                Some(JsonValue::Array(items))
            }
        }
        (FieldKind::Json { .. }, FieldValue::Text(s)) => {
            if s.trim().is_empty() {
                return None;
            }
            Some(serde_json::from_str(s).unwrap_or_else(|_| JsonValue::String(s.clone())))
        }
        (_, FieldValue::Text(s)) => {
            if s.is_empty() {
                None
            } else {
                Some(JsonValue::String(s.clone()))
            }
        }
        _ => None,
    }
}

/// Write field values over `base`. Only fields the user touched, or whose
/// path already exists in `base`, are written, so untouched defaults do not
/// leak into the data. Keys the schema does not describe are preserved.
pub fn collect(fields: &[FormField], base: &JsonValue) -> JsonValue {
    let mut out = if base.is_object() {
        base.clone()
    } else {
        JsonValue::Object(Map::new())
    };
    for fld in fields {
        let present = get_by_path(base, &fld.path).is_some();
        if !fld.touched && !present {
            continue;
        }
        match field_json(fld) {
            Some(v) => set_by_path(&mut out, &fld.path, v),
            None => remove_by_path(&mut out, &fld.path),
        }
    }
    out
}
