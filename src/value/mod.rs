//==================================================
// File: value.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: TableScript runtime value representation
// Objective: Provide the Number/Text/Array/Object tagged union and the
//            coercions the dispatcher applies to macro output
//==================================================

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map as JsonMap, Value as JsonValue};

//==================================================
// Section 1.0 - Value Type
//==================================================

/// Runtime values of the macro script language.
///
/// The language has one numeric type, an arbitrary-precision decimal
/// that doubles as its boolean (0 = false, anything else = true), plus
/// text and the two structured JSON shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(Decimal),
    Text(String),
    Array(Vec<JsonValue>),
    Object(JsonMap<String, JsonValue>),
}

impl Value {
    pub fn number(value: i64) -> Self {
        Value::Number(Decimal::from(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    /// The canonical true/false values exposed to macros.
    pub fn truth(value: bool) -> Self {
        Value::Number(if value { Decimal::ONE } else { Decimal::ZERO })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Array(_) => "json array",
            Value::Object(_) => "json object",
        }
    }

    /// Boolean coercion used by every boolean-like parameter.
    ///
    /// Accepts numbers, "true"/"false", numeric text, and native JSON
    /// booleans. This never fails: unparseable input is simply false.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Number(n) => !n.is_zero(),
            Value::Text(s) => match s.trim() {
                "true" => true,
                "false" => false,
                other => parse_decimal(other).map_or(false, |n| !n.is_zero()),
            },
            Value::Array(_) | Value::Object(_) => false,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => parse_decimal(s.trim()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    //==================================================
    // Section 2.0 - JSON Bridging
    //==================================================

    /// Converts a JSON element into a script value, the shape macro
    /// arguments take when unpacked from the synthesized `args` array.
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Text(String::new()),
            JsonValue::Bool(b) => Value::truth(b),
            JsonValue::Number(n) => parse_decimal(&n.to_string())
                .map(Value::Number)
                .unwrap_or_else(|| Value::Text(n.to_string())),
            JsonValue::String(s) => Value::Text(s),
            JsonValue::Array(items) => Value::Array(items),
            JsonValue::Object(map) => Value::Object(map),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Number(n) => serde_json::from_str(&n.to_string())
                .unwrap_or_else(|_| JsonValue::String(n.to_string())),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Array(items) => JsonValue::Array(items.clone()),
            Value::Object(map) => JsonValue::Object(map.clone()),
        }
    }

    /// JSON form used when packing call arguments into `macro.args`.
    ///
    /// Text is kept as a string unless it looks structural, so quoted
    /// arguments are not re-interpreted behind the author's back.
    pub fn to_arg_json(&self) -> JsonValue {
        match self {
            Value::Text(s) => {
                let trimmed = s.trim_start();
                if trimmed.starts_with('[') || trimmed.starts_with('{') {
                    serde_json::from_str(s).unwrap_or_else(|_| JsonValue::String(s.clone()))
                } else {
                    JsonValue::String(s.clone())
                }
            }
            other => other.to_json(),
        }
    }

    /// Interprets raw textual output as a value: JSON if it looks like
    /// JSON, a number if it parses as one, otherwise the literal text.
    pub fn from_output(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            if let Ok(json) = serde_json::from_str::<JsonValue>(trimmed) {
                match json {
                    JsonValue::Array(items) => return Value::Array(items),
                    JsonValue::Object(map) => return Value::Object(map),
                    _ => {}
                }
            }
        }
        if let Some(number) = parse_decimal(trimmed) {
            return Value::Number(number);
        }
        Value::Text(raw.to_string())
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(text)
        .ok()
        .or_else(|| Decimal::from_scientific(text).ok())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Array(items) => {
                let json = JsonValue::Array(items.clone());
                f.write_str(&json.to_string())
            }
            Value::Object(map) => {
                let json = JsonValue::Object(map.clone());
                f.write_str(&json.to_string())
            }
        }
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

//==================================================
// Section 3.0 - Tests
//==================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_coercion_never_fails() {
        assert!(Value::number(3).as_bool());
        assert!(!Value::number(0).as_bool());
        assert!(Value::text("true").as_bool());
        assert!(!Value::text("false").as_bool());
        assert!(Value::text("2.5").as_bool());
        assert!(!Value::text("certainly").as_bool());
        assert!(!Value::Array(Vec::new()).as_bool());
    }

    #[test]
    fn output_conversion_prefers_json_then_number() {
        assert_eq!(
            Value::from_output("[1, 2]"),
            Value::Array(vec![JsonValue::from(1), JsonValue::from(2)])
        );
        assert_eq!(Value::from_output("  42 "), Value::number(42));
        assert_eq!(Value::from_output("1e3"), Value::number(1000));
        assert_eq!(Value::from_output("[broken"), Value::text("[broken"));
        assert_eq!(Value::from_output("hello"), Value::text("hello"));
    }

    #[test]
    fn quoted_arguments_stay_text() {
        assert_eq!(
            Value::text("plain").to_arg_json(),
            JsonValue::String("plain".into())
        );
        assert_eq!(
            Value::text("[1,2]").to_arg_json(),
            serde_json::json!([1, 2])
        );
    }
}
