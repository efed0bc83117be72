use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One validation failure, shaped after the descriptors JSON Schema
/// validators report: `name` is the failed keyword, `property` the dotted
/// location with a leading dot (`.newPath`), `stack` a one-line summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub name: String,
    pub property: String,
    pub message: String,
    #[serde(default)]
    pub params: JsonValue,
    pub stack: String,
}

impl ValidationError {
    pub fn new(name: impl Into<String>, path: &str, message: impl Into<String>) -> Self {
        let property = if path.is_empty() {
            String::new()
        } else {
            format!(".{path}")
        };
        let message = message.into();
        let stack = if property.is_empty() {
            message.clone()
        } else {
            format!("{property} {message}")
        };
        Self {
            name: name.into(),
            property,
            message,
            params: JsonValue::Null,
            stack,
        }
    }

    pub fn with_params(mut self, params: JsonValue) -> Self {
        self.params = params;
        self
    }

    /// Dotted path without the leading dot.
    pub fn path(&self) -> &str {
        self.property.strip_prefix('.').unwrap_or(&self.property)
    }
}

/// Failure to build a form model from options.
#[derive(Debug, thiserror::Error)]
pub enum FormConfigError {
    #[error("setting `{key}` is not supported, the form model owns this state")]
    Unsupported { key: String },
    #[error("option `{key}` expects {expected}")]
    InvalidType { key: String, expected: &'static str },
    #[error("form options must be a JSON object")]
    NotAnObject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_and_stack_carry_the_path() {
        let e = ValidationError::new("pattern", "newPath", "does not match pattern");
        assert_eq!(e.property, ".newPath");
        assert_eq!(e.path(), "newPath");
        assert_eq!(e.stack, ".newPath does not match pattern");
        let root = ValidationError::new("type", "", "should be object");
        assert_eq!(root.path(), "");
        assert_eq!(root.stack, "should be object");
    }
}
