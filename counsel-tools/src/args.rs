//! Argument extraction shared by every handler.
//!
//! The router guarantees `args` is a JSON object; these helpers pull typed
//! fields out of it and turn a missing required field into
//! [`ToolError::InvalidArguments`].

use counsel_core::error::ToolError;
use serde_json::Value;

/// A non-empty string field, trimmed.
pub fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn required_str<'a>(tool: &str, args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    opt_str(args, key).ok_or_else(|| ToolError::InvalidArguments {
        name: tool.to_string(),
        reason: format!("missing required '{key}' parameter"),
    })
}

/// A numeric field. Numeric strings such as `"2.5"` are accepted because
/// models frequently quote numbers.
pub fn opt_f64(args: &Value, key: &str) -> Option<f64> {
    match args.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn required_f64(tool: &str, args: &Value, key: &str) -> Result<f64, ToolError> {
    opt_f64(args, key).ok_or_else(|| ToolError::InvalidArguments {
        name: tool.to_string(),
        reason: format!("missing or non-numeric '{key}' parameter"),
    })
}

pub fn opt_bool(args: &Value, key: &str) -> Option<bool> {
    match args.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
