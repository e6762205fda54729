//! Date and time filters
//!
//! Each filter records the storage type it produced in `backend_type`, so the
//! save path knows what the values look like after the chain ran.

use attrflow_core::{Error, Result, Value, ValueTable};
use attrflow_types::{parse_date, parse_int, parse_timestamp, DATE_FORMAT, TIMESTAMP_FORMAT};
use chrono::{DateTime, Utc};

use crate::filter::{map_values, opt_param, text, Filter, FilterContext};

fn convert<F>(table: &mut ValueTable, key: &str, backend_type: &str, f: F) -> Result<String>
where
    F: FnMut(&Value) -> Result<Value>,
{
    map_values(table, key, f)?;
    table.require_mut(key)?.backend_type = backend_type.to_string();
    Ok(key.to_string())
}

fn timestamp_of(filter: &str, value: &Value) -> Result<DateTime<Utc>> {
    match value {
        Value::Timestamp(t) => Ok(*t),
        other => Err(Error::conversion(
            filter,
            other.to_string(),
            format!("expected a timestamp, found {}", other.type_name()),
        )),
    }
}

/// Parse text into timestamps using `params[0]` (default `%Y%m%d%H%M%SZ`)
#[derive(Debug, Clone, Copy, Default)]
pub struct StringToDatetime;

impl Filter for StringToDatetime {
    fn name(&self) -> &'static str {
        "StringToDatetime"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let format = opt_param(params, 0).unwrap_or(TIMESTAMP_FORMAT);
        convert(table, key, "Timestamp", |value| {
            parse_timestamp(&text(self.name(), value)?, format).map(Value::Timestamp)
        })
    }
}

/// Format timestamps as text using `params[0]` (default `%Y%m%d%H%M%SZ`)
#[derive(Debug, Clone, Copy, Default)]
pub struct DatetimeToString;

impl Filter for DatetimeToString {
    fn name(&self) -> &'static str {
        "DatetimeToString"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let format = opt_param(params, 0).unwrap_or(TIMESTAMP_FORMAT);
        convert(table, key, "String", |value| {
            Ok(Value::from(timestamp_of(self.name(), value)?.format(format).to_string()))
        })
    }
}

/// Parse text into dates using `params[0]` (default `%Y-%m-%d`)
#[derive(Debug, Clone, Copy, Default)]
pub struct StringToDate;

impl Filter for StringToDate {
    fn name(&self) -> &'static str {
        "StringToDate"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let format = opt_param(params, 0).unwrap_or(DATE_FORMAT);
        convert(table, key, "Date", |value| {
            parse_date(&text(self.name(), value)?, format).map(Value::Date)
        })
    }
}

/// Format dates as text using `params[0]` (default `%Y-%m-%d`)
#[derive(Debug, Clone, Copy, Default)]
pub struct DateToString;

impl Filter for DateToString {
    fn name(&self) -> &'static str {
        "DateToString"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let format = opt_param(params, 0).unwrap_or(DATE_FORMAT);
        convert(table, key, "String", |value| match value {
            Value::Date(d) => Ok(Value::from(d.format(format).to_string())),
            other => Err(Error::conversion(
                self.name(),
                other.to_string(),
                format!("expected a date, found {}", other.type_name()),
            )),
        })
    }
}

/// Unix seconds to timestamps
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerToDatetime;

impl Filter for IntegerToDatetime {
    fn name(&self) -> &'static str {
        "IntegerToDatetime"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, _params: &[String]) -> Result<String> {
        convert(table, key, "Timestamp", |value| {
            let seconds = match value {
                Value::Int(i) => *i,
                other => parse_int(&text(self.name(), other)?)?,
            };
            DateTime::<Utc>::from_timestamp(seconds, 0)
                .map(Value::Timestamp)
                .ok_or_else(|| Error::conversion(self.name(), seconds.to_string(), "timestamp out of range"))
        })
    }
}

/// Timestamps to Unix seconds
#[derive(Debug, Clone, Copy, Default)]
pub struct DatetimeToInteger;

impl Filter for DatetimeToInteger {
    fn name(&self) -> &'static str {
        "DatetimeToInteger"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, _params: &[String]) -> Result<String> {
        convert(table, key, "Integer", |value| {
            Ok(Value::Int(timestamp_of(self.name(), value)?.timestamp()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::testing::Harness;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn test_generalized_time_round_trip() {
        let mut h = Harness::new();
        h.set("createTimestamp", "Timestamp", vec![Value::from("20240131120000Z")]);
        h.run(&StringToDatetime, "createTimestamp", &[]).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(h.values("createTimestamp"), vec![Value::Timestamp(expected)]);
        assert_eq!(h.table.get("createTimestamp").unwrap().backend_type, "Timestamp");

        h.run(&DatetimeToString, "createTimestamp", &[]).unwrap();
        assert_eq!(h.values("createTimestamp"), vec![Value::from("20240131120000Z")]);
        assert_eq!(h.table.get("createTimestamp").unwrap().backend_type, "String");
    }

    #[test]
    fn test_date_with_custom_format() {
        let mut h = Harness::new();
        h.set("birthDate", "Date", vec![Value::from("31.01.1990")]);
        h.run(&StringToDate, "birthDate", &["%d.%m.%Y"]).unwrap();
        let date = NaiveDate::from_ymd_opt(1990, 1, 31).unwrap();
        assert_eq!(h.values("birthDate"), vec![Value::Date(date)]);
        h.run(&DateToString, "birthDate", &[]).unwrap();
        assert_eq!(h.values("birthDate"), vec![Value::from("1990-01-31")]);
    }

    #[test]
    fn test_unix_seconds() {
        let mut h = Harness::new();
        h.set("lastLogin", "Timestamp", vec![Value::Int(86_400)]);
        h.run(&IntegerToDatetime, "lastLogin", &[]).unwrap();
        let expected = Utc.with_ymd_and_hms(1970, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(h.values("lastLogin"), vec![Value::Timestamp(expected)]);
        h.run(&DatetimeToInteger, "lastLogin", &[]).unwrap();
        assert_eq!(h.values("lastLogin"), vec![Value::Int(86_400)]);
        assert_eq!(h.table.get("lastLogin").unwrap().backend_type, "Integer");
    }

    #[test]
    fn test_malformed_text_is_conversion_error() {
        let mut h = Harness::new();
        h.set("createTimestamp", "Timestamp", vec![Value::from("yesterday")]);
        assert!(matches!(
            h.run(&StringToDatetime, "createTimestamp", &[]),
            Err(Error::TypeConversion { .. })
        ));
    }
}
