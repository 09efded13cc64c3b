//! Coercion helpers for untrusted JSON.
//! Every lookup tolerates missing parents and wrong types; nothing here fails.

use serde_json::Value;

/// Walk `path` through nested objects. A missing key or a non-object parent yields `None`.
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.as_object()?.get(*key))
}

/// Coerce a JSON value to a finite number, or `None`.
/// Numbers pass through; strings are parsed after trimming. Everything else is rejected.
pub fn finite(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Finite number or `default`.
pub fn num(value: Option<&Value>, default: f64) -> f64 {
    finite(value).unwrap_or(default)
}

/// Non-negative whole count.
pub fn count(value: Option<&Value>) -> u32 {
    let v = num(value, 0.0).round();
    if v <= 0.0 {
        0
    } else if v >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        v as u32
    }
}

/// String leaf; numbers are rendered, anything else becomes empty.
pub fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Numeric sequence. A non-array is empty; non-numeric entries become 0.
pub fn series(value: Option<&Value>) -> Vec<f64> {
    match value {
        Some(Value::Array(items)) => items.iter().map(|v| num(Some(v), 0.0)).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_survives_missing_parents() {
        let v = json!({"a": {"b": 3}, "c": 7});
        assert_eq!(lookup(&v, &["a", "b"]), Some(&json!(3)));
        assert_eq!(lookup(&v, &["x", "y", "z"]), None);
        assert_eq!(lookup(&v, &["c", "d"]), None);
        assert_eq!(lookup(&Value::Null, &["a"]), None);
    }

    #[test]
    fn num_rejects_non_finite_and_non_numeric() {
        assert_eq!(num(Some(&json!(4.8)), 0.0), 4.8);
        assert_eq!(num(Some(&json!(" 12.5 ")), 0.0), 12.5);
        assert_eq!(num(Some(&json!("abc")), 7.0), 7.0);
        assert_eq!(num(Some(&json!("NaN")), 0.0), 0.0);
        assert_eq!(num(Some(&json!("inf")), 1.0), 1.0);
        assert_eq!(num(Some(&json!("")), 2.0), 2.0);
        assert_eq!(num(Some(&json!(null)), 3.0), 3.0);
        assert_eq!(num(Some(&json!(true)), 0.0), 0.0);
        assert_eq!(num(Some(&json!({"v": 1})), 0.0), 0.0);
        assert_eq!(num(None, 9.0), 9.0);
    }

    #[test]
    fn count_rounds_and_floors() {
        assert_eq!(count(Some(&json!(19.4))), 19);
        assert_eq!(count(Some(&json!(-3))), 0);
        assert_eq!(count(Some(&json!("20"))), 20);
        assert_eq!(count(None), 0);
    }

    #[test]
    fn series_coerces_entries() {
        assert_eq!(series(Some(&json!([1, "2", null, "x"]))), vec![1.0, 2.0, 0.0, 0.0]);
        assert!(series(Some(&json!("not a list"))).is_empty());
    }

    #[test]
    fn text_accepts_strings_and_numbers() {
        assert_eq!(text(Some(&json!("13:00"))), "13:00");
        assert_eq!(text(Some(&json!(13))), "13");
        assert_eq!(text(Some(&json!(null))), "");
        assert_eq!(text(None), "");
    }
}
