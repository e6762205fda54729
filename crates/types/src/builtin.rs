//! Built-in scalar types
//!
//! | Type | Element | Text form |
//! |------|---------|-----------|
//! | `String` | `Bytes` (byte-string; `String` accepted and normalized) | UTF-8 |
//! | `UnicodeString` | `String` | itself |
//! | `Integer` | `Int` | base-10 |
//! | `Boolean` | `Bool` | `true` / `false` |
//! | `Binary` | `Bytes` | base64 |
//! | `Date` | `Date` | `%Y-%m-%d` |
//! | `Timestamp` | `Timestamp` | `%Y%m%d%H%M%SZ` |
//! | `Json` | any | JSON text |
//! | `Any` | any | fixup renders text |
//!
//! The two string types only convert between each other; every other type
//! declares its own conversions to and from both string flavours.

use attrflow_core::{Error, Result, Value};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::registry::AttributeType;

/// Default text form of timestamps (directory generalized time)
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%SZ";

/// Default text form of dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const STRING: &str = "String";
const UNICODE_STRING: &str = "UnicodeString";

fn is_string_type(name: &str) -> bool {
    name == STRING || name == UNICODE_STRING
}

/// Boolean-from-string rule: `""`, `"false"`, `"0"` and `"False"` are false
pub fn parse_bool(text: &str) -> bool {
    !matches!(text, "" | "false" | "0" | "False")
}

/// Base-10 integer parsing
///
/// # Errors
///
/// [`Error::TypeConversion`] on non-numeric input.
pub fn parse_int(text: &str) -> Result<i64> {
    text.parse::<i64>()
        .map_err(|e| Error::conversion("Integer", text, e.to_string()))
}

/// Textual content of a string-like element
///
/// # Errors
///
/// [`Error::TypeConversion`] for non-text elements or non-UTF-8 bytes.
pub fn text_of(type_name: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bytes(b) => String::from_utf8(b.clone())
            .map_err(|e| Error::conversion(type_name, format!("{:?}", b), e.to_string())),
        other => Err(Error::conversion(
            type_name,
            other.to_string(),
            format!("expected text, found {}", other.type_name()),
        )),
    }
}

/// Wrap text in the element variant of the requested string type
fn text_value(string_type: &str, text: String) -> Value {
    if string_type == STRING {
        Value::Bytes(text.into_bytes())
    } else {
        Value::String(text)
    }
}

fn expect<'a, T>(
    type_name: &str,
    value: &'a Value,
    extract: impl Fn(&'a Value) -> Option<T>,
) -> Result<T> {
    extract(value).ok_or_else(|| {
        Error::conversion(
            type_name,
            value.to_string(),
            format!("not a {} value", type_name),
        )
    })
}

/// Parse a timestamp in `format`, interpreted as UTC
pub fn parse_timestamp(text: &str, format: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, format)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::conversion("Timestamp", text, e.to_string()))
}

/// Parse a date in `format`
pub fn parse_date(text: &str, format: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, format)
        .map_err(|e| Error::conversion("Date", text, e.to_string()))
}

// =============================================================================
// String / UnicodeString
// =============================================================================

/// Byte-string type; canonical storage form is `Bytes`
#[derive(Debug, Clone, Copy, Default)]
pub struct StringType;

impl AttributeType for StringType {
    fn name(&self) -> &'static str {
        STRING
    }

    fn is_valid_value(&self, values: &[Value]) -> bool {
        values
            .iter()
            .all(|v| matches!(v, Value::Bytes(_) | Value::String(_)))
    }

    fn values_match(&self, a: &[Value], b: &[Value]) -> bool {
        let bytes = |v: &Value| match v {
            Value::Bytes(b) => Some(b.clone()),
            Value::String(s) => Some(s.clone().into_bytes()),
            _ => None,
        };
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| bytes(x) == bytes(y))
    }

    fn fixup(&self, values: Vec<Value>) -> Result<Vec<Value>> {
        Ok(values
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Value::Bytes(s.into_bytes()),
                other => other,
            })
            .collect())
    }

    fn convert_to(&self, target: &str, values: &[Value]) -> Result<Vec<Value>> {
        match target {
            UNICODE_STRING => values
                .iter()
                .map(|v| text_of(UNICODE_STRING, v).map(Value::String))
                .collect(),
            _ => Err(Error::unsupported_conversion(STRING, target)),
        }
    }

    fn convert_from(&self, source: &str, values: &[Value]) -> Result<Vec<Value>> {
        match source {
            UNICODE_STRING => values
                .iter()
                .map(|v| text_of(STRING, v).map(|t| Value::Bytes(t.into_bytes())))
                .collect(),
            _ => Err(Error::unsupported_conversion(source, STRING)),
        }
    }
}

/// Unicode text type
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeStringType;

impl AttributeType for UnicodeStringType {
    fn name(&self) -> &'static str {
        UNICODE_STRING
    }

    fn is_valid_value(&self, values: &[Value]) -> bool {
        values.iter().all(Value::is_string)
    }

    fn convert_to(&self, target: &str, values: &[Value]) -> Result<Vec<Value>> {
        match target {
            STRING => StringType.convert_from(UNICODE_STRING, values),
            _ => Err(Error::unsupported_conversion(UNICODE_STRING, target)),
        }
    }

    fn convert_from(&self, source: &str, values: &[Value]) -> Result<Vec<Value>> {
        match source {
            STRING => StringType.convert_to(UNICODE_STRING, values),
            _ => Err(Error::unsupported_conversion(source, UNICODE_STRING)),
        }
    }
}

// =============================================================================
// Integer
// =============================================================================

/// 64-bit integer type
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerType;

impl AttributeType for IntegerType {
    fn name(&self) -> &'static str {
        "Integer"
    }

    fn is_valid_value(&self, values: &[Value]) -> bool {
        values.iter().all(Value::is_int)
    }

    fn convert_to(&self, target: &str, values: &[Value]) -> Result<Vec<Value>> {
        let ints = values.iter().map(|v| expect("Integer", v, Value::as_int));
        match target {
            t if is_string_type(t) => ints.map(|i| i.map(|i| text_value(t, i.to_string()))).collect(),
            "Boolean" => ints.map(|i| i.map(|i| Value::Bool(i != 0))).collect(),
            "Timestamp" => ints
                .map(|i| {
                    let i = i?;
                    DateTime::<Utc>::from_timestamp(i, 0)
                        .map(Value::Timestamp)
                        .ok_or_else(|| Error::conversion("Timestamp", i.to_string(), "out of range"))
                })
                .collect(),
            _ => Err(Error::unsupported_conversion("Integer", target)),
        }
    }

    fn convert_from(&self, source: &str, values: &[Value]) -> Result<Vec<Value>> {
        match source {
            s if is_string_type(s) => values
                .iter()
                .map(|v| parse_int(&text_of("Integer", v)?).map(Value::Int))
                .collect(),
            "Boolean" => values
                .iter()
                .map(|v| expect("Boolean", v, Value::as_bool).map(|b| Value::Int(i64::from(b))))
                .collect(),
            _ => Err(Error::unsupported_conversion(source, "Integer")),
        }
    }
}

// =============================================================================
// Boolean
// =============================================================================

/// Boolean type
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanType;

impl AttributeType for BooleanType {
    fn name(&self) -> &'static str {
        "Boolean"
    }

    fn is_valid_value(&self, values: &[Value]) -> bool {
        values.iter().all(Value::is_bool)
    }

    fn convert_to(&self, target: &str, values: &[Value]) -> Result<Vec<Value>> {
        let bools = values.iter().map(|v| expect("Boolean", v, Value::as_bool));
        match target {
            t if is_string_type(t) => bools.map(|b| b.map(|b| text_value(t, b.to_string()))).collect(),
            "Integer" => bools.map(|b| b.map(|b| Value::Int(i64::from(b)))).collect(),
            _ => Err(Error::unsupported_conversion("Boolean", target)),
        }
    }

    fn convert_from(&self, source: &str, values: &[Value]) -> Result<Vec<Value>> {
        match source {
            s if is_string_type(s) => values
                .iter()
                .map(|v| text_of("Boolean", v).map(|t| Value::Bool(parse_bool(&t))))
                .collect(),
            "Integer" => values
                .iter()
                .map(|v| expect("Integer", v, Value::as_int).map(|i| Value::Bool(i != 0)))
                .collect(),
            _ => Err(Error::unsupported_conversion(source, "Boolean")),
        }
    }
}

// =============================================================================
// Binary
// =============================================================================

/// Opaque blob type
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryType;

impl AttributeType for BinaryType {
    fn name(&self) -> &'static str {
        "Binary"
    }

    fn is_valid_value(&self, values: &[Value]) -> bool {
        values.iter().all(Value::is_bytes)
    }

    fn convert_to(&self, target: &str, values: &[Value]) -> Result<Vec<Value>> {
        let blobs = values.iter().map(|v| expect("Binary", v, Value::as_bytes));
        match target {
            UNICODE_STRING => blobs.map(|b| b.map(|b| Value::String(BASE64.encode(b)))).collect(),
            STRING => blobs.map(|b| b.map(|b| Value::Bytes(b.to_vec()))).collect(),
            _ => Err(Error::unsupported_conversion("Binary", target)),
        }
    }

    fn convert_from(&self, source: &str, values: &[Value]) -> Result<Vec<Value>> {
        match source {
            UNICODE_STRING => values
                .iter()
                .map(|v| {
                    let text = text_of("Binary", v)?;
                    BASE64
                        .decode(text.as_bytes())
                        .map(Value::Bytes)
                        .map_err(|e| Error::conversion("Binary", text, e.to_string()))
                })
                .collect(),
            STRING => values
                .iter()
                .map(|v| match v {
                    Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
                    Value::String(s) => Ok(Value::Bytes(s.clone().into_bytes())),
                    other => Err(Error::conversion("Binary", other.to_string(), "not a byte-string")),
                })
                .collect(),
            _ => Err(Error::unsupported_conversion(source, "Binary")),
        }
    }
}

// =============================================================================
// Date / Timestamp
// =============================================================================

/// Calendar date type
#[derive(Debug, Clone, Copy, Default)]
pub struct DateType;

impl AttributeType for DateType {
    fn name(&self) -> &'static str {
        "Date"
    }

    fn is_valid_value(&self, values: &[Value]) -> bool {
        values.iter().all(|v| matches!(v, Value::Date(_)))
    }

    fn convert_to(&self, target: &str, values: &[Value]) -> Result<Vec<Value>> {
        let dates = values.iter().map(|v| {
            expect("Date", v, |v| match v {
                Value::Date(d) => Some(*d),
                _ => None,
            })
        });
        match target {
            t if is_string_type(t) => dates
                .map(|d| d.map(|d| text_value(t, d.format(DATE_FORMAT).to_string())))
                .collect(),
            "Timestamp" => dates
                .map(|d| {
                    let date = d?;
                    date.and_hms_opt(0, 0, 0)
                        .map(|naive| Value::Timestamp(naive.and_utc()))
                        .ok_or_else(|| Error::conversion("Timestamp", date.to_string(), "invalid time"))
                })
                .collect(),
            _ => Err(Error::unsupported_conversion("Date", target)),
        }
    }

    fn convert_from(&self, source: &str, values: &[Value]) -> Result<Vec<Value>> {
        match source {
            s if is_string_type(s) => values
                .iter()
                .map(|v| parse_date(&text_of("Date", v)?, DATE_FORMAT).map(Value::Date))
                .collect(),
            "Timestamp" => values
                .iter()
                .map(|v| match v {
                    Value::Timestamp(t) => Ok(Value::Date(t.date_naive())),
                    other => Err(Error::conversion("Date", other.to_string(), "not a timestamp")),
                })
                .collect(),
            _ => Err(Error::unsupported_conversion(source, "Date")),
        }
    }
}

/// UTC instant type
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampType;

impl AttributeType for TimestampType {
    fn name(&self) -> &'static str {
        "Timestamp"
    }

    fn is_valid_value(&self, values: &[Value]) -> bool {
        values.iter().all(|v| matches!(v, Value::Timestamp(_)))
    }

    fn convert_to(&self, target: &str, values: &[Value]) -> Result<Vec<Value>> {
        let instants = values.iter().map(|v| {
            expect("Timestamp", v, |v| match v {
                Value::Timestamp(t) => Some(*t),
                _ => None,
            })
        });
        match target {
            t if is_string_type(t) => instants
                .map(|ts| ts.map(|ts| text_value(t, ts.format(TIMESTAMP_FORMAT).to_string())))
                .collect(),
            "Integer" => instants.map(|ts| ts.map(|ts| Value::Int(ts.timestamp()))).collect(),
            _ => Err(Error::unsupported_conversion("Timestamp", target)),
        }
    }

    fn convert_from(&self, source: &str, values: &[Value]) -> Result<Vec<Value>> {
        match source {
            s if is_string_type(s) => values
                .iter()
                .map(|v| parse_timestamp(&text_of("Timestamp", v)?, TIMESTAMP_FORMAT).map(Value::Timestamp))
                .collect(),
            "Integer" => IntegerType.convert_to("Timestamp", values),
            _ => Err(Error::unsupported_conversion(source, "Timestamp")),
        }
    }
}

// =============================================================================
// Json / Any
// =============================================================================

/// Structured value type with a strict JSON text form
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonType;

impl AttributeType for JsonType {
    fn name(&self) -> &'static str {
        "Json"
    }

    fn is_valid_value(&self, values: &[Value]) -> bool {
        values
            .iter()
            .all(|v| !matches!(v, Value::Bytes(_) | Value::Date(_) | Value::Timestamp(_)))
    }

    fn convert_to(&self, target: &str, values: &[Value]) -> Result<Vec<Value>> {
        if !is_string_type(target) {
            return Err(Error::unsupported_conversion("Json", target));
        }
        values
            .iter()
            .map(|v| {
                let json: serde_json::Value = v.clone().into();
                Ok(text_value(target, serde_json::to_string(&json)?))
            })
            .collect()
    }

    fn convert_from(&self, source: &str, values: &[Value]) -> Result<Vec<Value>> {
        if !is_string_type(source) {
            return Err(Error::unsupported_conversion(source, "Json"));
        }
        values
            .iter()
            .map(|v| {
                let text = text_of("Json", v)?;
                serde_json::from_str::<serde_json::Value>(&text)
                    .map(Value::from)
                    .map_err(|e| Error::conversion("Json", text, e.to_string()))
            })
            .collect()
    }
}

/// Generic type accepting anything; fixup renders every scalar as text
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyType;

impl AttributeType for AnyType {
    fn name(&self) -> &'static str {
        "Any"
    }

    fn is_valid_value(&self, _values: &[Value]) -> bool {
        true
    }

    fn values_match(&self, a: &[Value], b: &[Value]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y || x.to_string() == y.to_string())
    }

    fn fixup(&self, values: Vec<Value>) -> Result<Vec<Value>> {
        Ok(values
            .into_iter()
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::String(_) => v,
                other => Value::String(other.to_string()),
            })
            .collect())
    }

    fn convert_to(&self, target: &str, values: &[Value]) -> Result<Vec<Value>> {
        if !is_string_type(target) {
            return Err(Error::unsupported_conversion("Any", target));
        }
        Ok(self
            .fixup(values.to_vec())?
            .into_iter()
            .map(|v| text_value(target, v.to_string()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_bool_rule() {
        for falsey in ["", "false", "0", "False"] {
            assert!(!parse_bool(falsey), "{falsey:?}");
        }
        for truthy in ["true", "1", "FALSE", "no", " "] {
            assert!(parse_bool(truthy), "{truthy:?}");
        }
    }

    #[test]
    fn test_integer_from_string_rejects_garbage() {
        let err = IntegerType
            .convert_from("String", &[Value::Bytes(b"12a".to_vec())])
            .unwrap_err();
        assert!(matches!(err, Error::TypeConversion { .. }));
        assert_eq!(
            IntegerType
                .convert_from("UnicodeString", &[Value::from("-42")])
                .unwrap(),
            vec![Value::Int(-42)]
        );
    }

    #[test]
    fn test_string_unicode_roundtrip() {
        let values = vec![Value::from("jdoe"), Value::from("Jörg")];
        let bytes = UnicodeStringType.convert_to("String", &values).unwrap();
        assert!(bytes.iter().all(Value::is_bytes));
        assert_eq!(UnicodeStringType.convert_from("String", &bytes).unwrap(), values);
    }

    #[test]
    fn test_string_values_match_across_variants() {
        assert!(StringType.values_match(&[Value::from("a")], &[Value::Bytes(b"a".to_vec())]));
        assert!(!StringType.values_match(&[Value::from("a")], &[]));
    }

    #[test]
    fn test_string_fixup_normalizes_to_bytes() {
        let fixed = StringType.fixup(vec![Value::from("x")]).unwrap();
        assert_eq!(fixed, vec![Value::Bytes(b"x".to_vec())]);
    }

    #[test]
    fn test_timestamp_text_form() {
        let ts = Utc.with_ymd_and_hms(2023, 7, 1, 12, 30, 0).unwrap();
        let text = TimestampType
            .convert_to("UnicodeString", &[Value::Timestamp(ts)])
            .unwrap();
        assert_eq!(text, vec![Value::from("20230701123000Z")]);
        assert_eq!(
            TimestampType.convert_from("UnicodeString", &text).unwrap(),
            vec![Value::Timestamp(ts)]
        );
    }

    #[test]
    fn test_timestamp_integer_roundtrip() {
        let values = vec![Value::Int(1_700_000_000)];
        let ts = TimestampType.convert_from("Integer", &values).unwrap();
        assert_eq!(TimestampType.convert_to("Integer", &ts).unwrap(), values);
    }

    #[test]
    fn test_binary_base64() {
        let blob = vec![Value::Bytes(vec![0, 159, 146, 150])];
        let text = BinaryType.convert_to("UnicodeString", &blob).unwrap();
        assert_eq!(BinaryType.convert_from("UnicodeString", &text).unwrap(), blob);
    }

    #[test]
    fn test_date_text_form() {
        let d = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
        assert_eq!(
            DateType.convert_to("UnicodeString", &[Value::Date(d)]).unwrap(),
            vec![Value::from("2020-02-29")]
        );
        assert!(DateType
            .convert_from("UnicodeString", &[Value::from("2021-02-29")])
            .is_err());
    }

    #[test]
    fn test_json_strict_decode() {
        assert!(JsonType
            .convert_from("UnicodeString", &[Value::from("{\"a\": 1")])
            .is_err());
        let decoded = JsonType
            .convert_from("UnicodeString", &[Value::from("{\"a\": [1, true]}")])
            .unwrap();
        assert!(decoded[0].is_object());
    }

    #[test]
    fn test_any_fixup_renders_text() {
        let fixed = AnyType
            .fixup(vec![Value::Int(5), Value::Null, Value::Bool(true)])
            .unwrap();
        assert_eq!(fixed, vec![Value::from("5"), Value::from("true")]);
    }

    #[test]
    fn test_boolean_validity() {
        assert!(BooleanType.is_valid_value(&[Value::Bool(true), Value::Bool(false)]));
        assert!(!BooleanType.is_valid_value(&[Value::from("true")]));
    }

    #[test]
    fn test_unsupported_pair_rejected_without_values() {
        let types: [&dyn AttributeType; 5] = [&IntegerType, &BooleanType, &BinaryType, &DateType, &TimestampType];
        for t in types {
            assert!(
                matches!(t.convert_to("Json", &[]), Err(Error::UnsupportedConversion { .. })),
                "{} -> Json",
                t.name()
            );
            assert!(
                matches!(t.convert_from("Json", &[]), Err(Error::UnsupportedConversion { .. })),
                "Json -> {}",
                t.name()
            );
        }
        assert!(IntegerType.convert_to("Boolean", &[]).unwrap().is_empty());
        assert_eq!(
            TimestampType.convert_from("Integer", &[Value::Int(0)]).unwrap(),
            vec![Value::Timestamp(Utc.timestamp_opt(0, 0).unwrap())]
        );
    }
}
