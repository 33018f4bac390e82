use serde_json::Value;

/// Reads one property of a JSON value the way a template sees it: object
/// keys, array indices, and `length` on arrays and strings.
pub fn property(value: &Value, key: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(key).cloned(),
        Value::Array(items) => match key {
            "length" => Some(Value::from(items.len())),
            _ => key.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        },
        Value::String(s) if key == "length" => Some(Value::from(s.chars().count())),
        _ => None,
    }
}

/// Follows `parts` from `value`, stopping at the first miss.
pub fn property_path<S: AsRef<str>>(value: Value, parts: &[S]) -> Option<Value> {
    parts
        .iter()
        .try_fold(value, |current, part| property(&current, part.as_ref()))
}

/// The text a value renders as.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < 1e21 => {
                format!("{f:.0}")
            }
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(to_display_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Falsy values other than `0`, plus empty arrays.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Number(_) => false,
        Value::Array(items) => items.is_empty(),
        other => !is_truthy(other),
    }
}
