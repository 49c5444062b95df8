//! Coercion helpers for loosely-typed JSON input.
//!
//! The scene edit protocol accepts whatever an external generator
//! produced, so every field read goes through one of these total
//! functions: a missing, mistyped or non-finite value falls back to a
//! documented default instead of failing.

use serde_json::Value;

/// Read a numeric field, coercing numbers and numeric strings.
/// Non-finite values and anything unparseable yield `default`.
pub fn coerce_finite(value: Option<&Value>, default: f64) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    match n {
        Some(n) if n.is_finite() => n,
        _ => default,
    }
}

/// Read a string field; numbers are stringified, everything else
/// yields `default`.
pub fn coerce_string(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default.to_string(),
    }
}

/// Read an optional string field; `null`/absent stay `None`.
pub fn coerce_opt_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Read a boolean field.
pub fn coerce_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        _ => default,
    }
}

/// Read an unsigned integer field (versions, nonces).
pub fn coerce_u64(value: Option<&Value>) -> Option<u64> {
    match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        _ => None,
    }
}
