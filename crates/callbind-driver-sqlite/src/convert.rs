//! Value conversion between callbind and rusqlite

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{Value as SqlValue, ValueRef};

use callbind_core::{CallError, DbType, Result, Value};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Convert a staged parameter value into the value bound on the statement.
///
/// Parameters arrive as text for every non-temporal type. Text declared as a
/// number or boolean is parsed back so SQLite compares it with the right
/// affinity; unparseable text is a type mismatch.
pub(crate) fn value_to_rusqlite(value: &Value, db_type: DbType) -> Result<SqlValue> {
    let Value::String(text) = value else {
        return Ok(native_to_rusqlite(value));
    };

    let trimmed = text.trim();
    let converted = match db_type {
        t if t.is_integer() => trimmed
            .parse::<i64>()
            .map(SqlValue::Integer)
            .map_err(|e| format!("'{}': {}", text, e)),
        t if t.is_numeric() => match trimmed.parse::<i64>() {
            Ok(i) => Ok(SqlValue::Integer(i)),
            Err(_) => trimmed
                .parse::<f64>()
                .map(SqlValue::Real)
                .map_err(|e| format!("'{}': {}", text, e)),
        },
        DbType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(SqlValue::Integer(1)),
            "false" | "0" => Ok(SqlValue::Integer(0)),
            _ => Err(format!("'{}' is not a valid boolean", text)),
        },
        DbType::Raw | DbType::Blob => Ok(SqlValue::Blob(text.as_bytes().to_vec())),
        _ => Ok(SqlValue::Text(text.clone())),
    };

    converted.map_err(|diagnostic| {
        CallError::type_mismatch("String", format!("{:?}", db_type), diagnostic)
    })
}

fn native_to_rusqlite(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(if *b { 1 } else { 0 }),
        Value::Int8(i) => SqlValue::Integer(*i as i64),
        Value::Int16(i) => SqlValue::Integer(*i as i64),
        Value::Int32(i) => SqlValue::Integer(*i as i64),
        Value::Int64(i) => SqlValue::Integer(*i),
        Value::Float32(f) => SqlValue::Real(*f as f64),
        Value::Float64(f) => SqlValue::Real(*f),
        Value::Decimal(d) => SqlValue::Text(d.clone()),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::Date(d) => SqlValue::Text(d.to_string()),
        Value::Time(t) => SqlValue::Text(t.to_string()),
        Value::DateTime(dt) => SqlValue::Text(dt.to_string()),
        Value::DateTimeUtc(dt) => SqlValue::Text(dt.to_rfc3339()),
        Value::Json(j) => SqlValue::Text(j.to_string()),
        Value::Uuid(u) => SqlValue::Text(u.to_string()),
    }
}

/// Column affinity recovered from the declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Declared {
    Date,
    DateTime,
    Boolean,
    Blob,
    Other,
}

fn declared(decl_type: Option<&str>) -> Declared {
    let Some(decl) = decl_type else {
        return Declared::Other;
    };
    let decl = decl.to_ascii_uppercase();
    if decl == "DATE" {
        Declared::Date
    } else if decl.contains("DATETIME") || decl.contains("TIMESTAMP") {
        Declared::DateTime
    } else if decl == "BOOLEAN" || decl == "BOOL" {
        Declared::Boolean
    } else if decl == "BLOB" {
        Declared::Blob
    } else {
        Declared::Other
    }
}

/// Convert a result cell, using the column's declared type to recover dates
/// and booleans that SQLite stores as text or integers.
pub(crate) fn rusqlite_to_value(cell: ValueRef<'_>, decl_type: Option<&str>) -> Value {
    let kind = declared(decl_type);
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if kind == Declared::Boolean => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => {
            let text = String::from_utf8_lossy(s).to_string();
            match kind {
                Declared::Date => parse_date(&text).map_or(Value::String(text), Value::Date),
                Declared::DateTime => {
                    parse_datetime(&text).map_or(Value::String(text), Value::DateTime)
                }
                _ => Value::String(text),
            }
        }
        ValueRef::Blob(b) if kind == Declared::Blob => Value::Bytes(b.to_vec()),
        // Untyped columns may hold text written as a blob
        ValueRef::Blob(b) => match std::str::from_utf8(b) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => Value::Bytes(b.to_vec()),
        },
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(text).map(|dt| dt.date()))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Value::String("1700".into()), DbType::Int32, SqlValue::Integer(1700))]
    #[case(Value::String("5.1".into()), DbType::Decimal, SqlValue::Real(5.1))]
    #[case(Value::String("50".into()), DbType::Decimal, SqlValue::Integer(50))]
    #[case(Value::String("0.25".into()), DbType::Single, SqlValue::Real(0.25))]
    #[case(Value::String("-3".into()), DbType::Double, SqlValue::Integer(-3))]
    #[case(Value::String("true".into()), DbType::Boolean, SqlValue::Integer(1))]
    #[case(Value::String("Smith".into()), DbType::Varchar, SqlValue::Text("Smith".into()))]
    #[case(Value::Null, DbType::Int32, SqlValue::Null)]
    #[case(Value::Bytes(vec![1, 2]), DbType::Blob, SqlValue::Blob(vec![1, 2]))]
    fn test_staged_values_are_retyped(
        #[case] value: Value,
        #[case] db_type: DbType,
        #[case] expected: SqlValue,
    ) {
        assert_eq!(value_to_rusqlite(&value, db_type).unwrap(), expected);
    }

    #[test]
    fn test_temporal_values_bind_as_text() {
        let date = NaiveDate::from_ymd_opt(2004, 8, 17).unwrap();
        assert_eq!(
            value_to_rusqlite(&Value::Date(date), DbType::Date).unwrap(),
            SqlValue::Text("2004-08-17".into())
        );
    }

    #[test]
    fn test_unparseable_number_is_type_mismatch() {
        let err = value_to_rusqlite(&Value::String("fifty".into()), DbType::Int32).unwrap_err();
        assert!(matches!(
            err,
            CallError::TypeMismatch { ref target_type, .. } if target_type == "Int32"
        ));
    }

    #[test]
    fn test_declared_types_recover_values() {
        let date = NaiveDate::from_ymd_opt(2004, 8, 17).unwrap();
        assert_eq!(
            rusqlite_to_value(ValueRef::Text(b"2004-08-17"), Some("DATE")),
            Value::Date(date)
        );
        assert_eq!(
            rusqlite_to_value(ValueRef::Text(b"2004-08-17 09:30:00"), Some("TIMESTAMP")),
            Value::DateTime(date.and_hms_opt(9, 30, 0).unwrap())
        );
        assert_eq!(
            rusqlite_to_value(ValueRef::Integer(1), Some("boolean")),
            Value::Bool(true)
        );
        assert_eq!(
            rusqlite_to_value(ValueRef::Text(b"soon"), Some("DATE")),
            Value::String("soon".into())
        );
        assert_eq!(rusqlite_to_value(ValueRef::Integer(7), None), Value::Int64(7));
        assert_eq!(
            rusqlite_to_value(ValueRef::Blob(&[0xff, 0x00]), Some("BLOB")),
            Value::Bytes(vec![0xff, 0x00])
        );
    }
}
