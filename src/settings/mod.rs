//! Persisted plugin settings and the dual-form editor bound to them.

pub mod editor;
pub mod file;

use crate::signal::Signal;
use serde_json::{Map, Value as JsonValue};

pub use editor::{CommandBundle, EditorOptions, SaveOutcome, SettingsFormEditor};
pub use file::{FileSettings, SettingsDir};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("settings for {plugin} are not valid JSON: {source}")]
    Parse {
        plugin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("settings for {plugin} must be a JSON object")]
    NotAnObject { plugin: String },
    #[error("settings for {plugin} failed validation: {}", .messages.join("; "))]
    Invalid {
        plugin: String,
        messages: Vec<String>,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("settings store rejected the save: {0}")]
    Rejected(String),
}

/// One plugin's settings as held by a settings store.
pub trait SettingsEntry {
    /// Identity of the plugin the settings belong to.
    fn plugin(&self) -> &str;
    fn schema(&self) -> JsonValue;
    /// Current user overrides.
    fn user(&self) -> JsonValue;
    fn default_value(&self) -> JsonValue;
    /// Replace the user overrides with `raw` (a whole JSON document).
    fn save(&self, raw: &str) -> Result<(), StoreError>;
    /// Fires after the user overrides change, whoever changed them.
    fn changed(&self) -> &Signal<()>;
}

/// Collect `default` values from a schema into a value of the same shape.
pub fn defaults_from_schema(schema: &JsonValue) -> JsonValue {
    if let Some(d) = schema.get("default") {
        return d.clone();
    }
    let Some(props) = schema.get("properties").and_then(|p| p.as_object()) else {
        return JsonValue::Object(Map::new());
    };
    let mut out = Map::new();
    for (name, prop) in props {
        if let Some(d) = prop.get("default") {
            out.insert(name.clone(), d.clone());
        } else if prop.get("properties").is_some() {
            let nested = defaults_from_schema(prop);
            if nested.as_object().is_some_and(|o| !o.is_empty()) {
                out.insert(name.clone(), nested);
            }
        }
    }
    JsonValue::Object(out)
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_follow_schema_shape() {
        let schema = json!({
            "type": "object",
            "properties": {
                "theme": {"type": "string", "default": "dark"},
                "nothing": {"type": "string"},
                "editor": {
                    "type": "object",
                    "properties": {"tabSize": {"type": "integer", "default": 4}}
                },
                "empty": {"type": "object", "properties": {"x": {"type": "string"}}}
            }
        });
        assert_eq!(
            defaults_from_schema(&schema),
            json!({"theme": "dark", "editor": {"tabSize": 4}})
        );
        assert_eq!(defaults_from_schema(&json!({"default": [1]})), json!([1]));
        assert_eq!(defaults_from_schema(&json!({})), json!({}));
    }
}
