//! JSON Schema validation with failures reported as form errors.

use crate::form::ValidationError;
use jsonschema::error::ValidationErrorKind;
use serde_json::{json, Value as JsonValue};

/// Validate `data` against `schema`. A schema that is neither an object nor a
/// boolean places no constraints; one that fails to compile yields a single
/// root error named `schema`.
pub fn validate_value(schema: &JsonValue, data: &JsonValue) -> Vec<ValidationError> {
    if !schema.is_object() && !schema.is_boolean() {
        return Vec::new();
    }
    let validator = match jsonschema::validator_for(schema) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "schema does not compile");
            return vec![ValidationError::new("schema", "", format!("invalid schema: {e}"))];
        }
    };
    validator
        .iter_errors(data)
        .map(|err| to_form_error(schema, &err))
        .collect()
}

/// `/editor/tab~1size` to `editor.tab/size`.
fn dotted(pointer: &str) -> String {
    pointer
        .split('/')
        .skip(1)
        .map(|seg| seg.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn to_form_error(schema: &JsonValue, err: &jsonschema::ValidationError<'_>) -> ValidationError {
    let schema_path = err.schema_path.to_string();
    let keyword = schema_path.rsplit('/').next().unwrap_or_default();
    let path = dotted(&err.instance_path.to_string());
    // keyword value, when the failing keyword is reachable without a $ref hop
    let value = schema.pointer(&schema_path);

    if let ValidationErrorKind::Required { property } = &err.kind {
        let name = property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string());
        return ValidationError::new("required", &child(&path, &name), "is a required property")
            .with_params(json!({ "missingProperty": name }));
    }

    let fallback = || ValidationError::new(keyword, &path, err.to_string());
    let Some(value) = value else {
        return fallback();
    };
    let limit = json!({ "limit": value });
    match keyword {
        "type" => {
            let expected = match value {
                JsonValue::Array(ts) => ts
                    .iter()
                    .filter_map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
                other => other.as_str().unwrap_or_default().to_string(),
            };
            ValidationError::new("type", &path, format!("should be {expected}"))
                .with_params(json!({ "type": expected }))
        }
        "enum" => ValidationError::new("enum", &path, "should be equal to one of the allowed values")
            .with_params(json!({ "allowedValues": value })),
        "const" => ValidationError::new("const", &path, "should be equal to constant")
            .with_params(json!({ "allowedValue": value })),
        "pattern" => {
            let pat = value.as_str().unwrap_or_default();
            ValidationError::new("pattern", &path, format!("should match pattern \"{pat}\""))
                .with_params(json!({ "pattern": pat }))
        }
        "minLength" => ValidationError::new(
            keyword,
            &path,
            format!("should NOT be shorter than {value} characters"),
        )
        .with_params(limit),
        "maxLength" => ValidationError::new(
            keyword,
            &path,
            format!("should NOT be longer than {value} characters"),
        )
        .with_params(limit),
        "minItems" => {
            ValidationError::new(keyword, &path, format!("should NOT have fewer than {value} items"))
                .with_params(limit)
        }
        "maxItems" => {
            ValidationError::new(keyword, &path, format!("should NOT have more than {value} items"))
                .with_params(limit)
        }
        "minProperties" => ValidationError::new(
            keyword,
            &path,
            format!("should NOT have fewer than {value} properties"),
        )
        .with_params(limit),
        "maxProperties" => ValidationError::new(
            keyword,
            &path,
            format!("should NOT have more than {value} properties"),
        )
        .with_params(limit),
        "minimum" => ValidationError::new(keyword, &path, format!("should be >= {value}")).with_params(limit),
        "maximum" => ValidationError::new(keyword, &path, format!("should be <= {value}")).with_params(limit),
        "exclusiveMinimum" => {
            ValidationError::new(keyword, &path, format!("should be > {value}")).with_params(limit)
        }
        "exclusiveMaximum" => {
            ValidationError::new(keyword, &path, format!("should be < {value}")).with_params(limit)
        }
        "multipleOf" => ValidationError::new(keyword, &path, format!("should be multiple of {value}"))
            .with_params(json!({ "multipleOf": value })),
        "additionalProperties" => {
            ValidationError::new(keyword, &path, "should NOT have additional properties")
        }
        "oneOf" => ValidationError::new(keyword, &path, "should match exactly one schema in oneOf"),
        "anyOf" => ValidationError::new(keyword, &path, "should match some schema in anyOf"),
        _ => fallback(),
    }
}
