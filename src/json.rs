use serde_json::Value as JsonValue;

/// JSON equality: arrays compare element-wise in order, objects compare by key
/// regardless of insertion order, numbers compare by numeric value.
pub fn deep_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => true,
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x == y,
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            if let (Some(i), Some(j)) = (x.as_i64(), y.as_i64()) {
                return i == j;
            }
            if let (Some(i), Some(j)) = (x.as_u64(), y.as_u64()) {
                return i == j;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(i), Some(j)) => i == j,
                _ => false,
            }
        }
        (JsonValue::String(x), JsonValue::String(y)) => x == y,
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(i, j)| deep_equal(i, j))
        }
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).map(|w| deep_equal(v, w)).unwrap_or(false))
        }
        _ => false,
    }
}

/// Serialize with two-space indentation, the format written back to settings files.
pub fn to_pretty(value: &JsonValue) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Walk a dotted path (`a.b.c`) through nested objects.
pub fn get_by_path<'a>(v: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    if path.is_empty() {
        return None;
    }
    let mut cur = v;
    for seg in path.split('.') {
        cur = cur.as_object()?.get(seg)?;
    }
    Some(cur)
}

/// Set a dotted path, creating intermediate objects. A non-object on the way
/// is replaced by an object.
pub fn set_by_path(v: &mut JsonValue, path: &str, value: JsonValue) {
    let mut cur = v;
    let segs: Vec<&str> = path.split('.').collect();
    for (i, seg) in segs.iter().enumerate() {
        if !cur.is_object() {
            *cur = JsonValue::Object(serde_json::Map::new());
        }
        let Some(obj) = cur.as_object_mut() else {
            return;
        };
        if i + 1 == segs.len() {
            obj.insert((*seg).to_string(), value);
            return;
        }
        cur = obj
            .entry((*seg).to_string())
            .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
    }
}

/// Remove a dotted path. Empty parent objects are left in place.
pub fn remove_by_path(v: &mut JsonValue, path: &str) {
    let mut cur = v;
    let segs: Vec<&str> = path.split('.').collect();
    for (i, seg) in segs.iter().enumerate() {
        let Some(obj) = cur.as_object_mut() else {
            return;
        };
        if i + 1 == segs.len() {
            obj.remove(*seg);
            return;
        }
        match obj.get_mut(*seg) {
            Some(next) => cur = next,
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_key_order_is_ignored() {
        let a: JsonValue = serde_json::from_str(r#"{"a":1,"b":{"x":true,"y":null}}"#).unwrap();
        let b: JsonValue = serde_json::from_str(r#"{"b":{"y":null,"x":true},"a":1}"#).unwrap();
        assert!(deep_equal(&a, &b));
    }

    #[test]
    fn array_order_matters() {
        assert!(!deep_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(deep_equal(&json!([1, [2, 3]]), &json!([1, [2, 3]])));
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(deep_equal(&json!(1), &json!(1.0)));
        assert!(!deep_equal(&json!(1), &json!(1.5)));
        assert!(!deep_equal(&json!(1), &json!("1")));
    }

    #[test]
    fn missing_and_extra_keys_differ() {
        assert!(!deep_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!deep_equal(&json!({"a": null}), &json!({})));
        assert!(!deep_equal(&json!({}), &JsonValue::Null));
    }

    #[test]
    fn pretty_output_uses_two_spaces() {
        let s = to_pretty(&json!({"a": [1]})).unwrap();
        assert_eq!(s, "{\n  \"a\": [\n    1\n  ]\n}");
    }

    #[test]
    fn dotted_paths_create_and_remove() {
        let mut v = json!({"keep": 1});
        set_by_path(&mut v, "outer.inner", json!("x"));
        assert_eq!(get_by_path(&v, "outer.inner"), Some(&json!("x")));
        remove_by_path(&mut v, "outer.inner");
        assert_eq!(v, json!({"keep": 1, "outer": {}}));
        assert!(get_by_path(&v, "").is_none());
    }
}
