//! Closed coercion table from database values to record field types
//!
//! Each `to_*` function is one destination column of the table: it lists the
//! source kinds it accepts and rejects everything else. The `Err` string is the
//! conversion diagnostic reported inside `CallError::TypeMismatch`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use callbind_core::Value;

pub type Coerced<T> = std::result::Result<T, String>;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

fn unsupported(value: &Value) -> String {
    format!("no conversion from {} values", value.kind())
}

/// Integer destinations. Range is checked against the target type.
pub fn to_integer<T>(value: &Value) -> Coerced<T>
where
    T: TryFrom<i128>,
{
    let wide: i128 = match value {
        Value::Int8(v) => *v as i128,
        Value::Int16(v) => *v as i128,
        Value::Int32(v) => *v as i128,
        Value::Int64(v) => *v as i128,
        Value::Bool(v) => *v as i128,
        Value::Float32(v) => integral_float(*v as f64)?,
        Value::Float64(v) => integral_float(*v)?,
        Value::Decimal(s) | Value::String(s) => parse_integer(s)?,
        other => return Err(unsupported(other)),
    };
    T::try_from(wide).map_err(|_| format!("value {} is out of range", wide))
}

fn integral_float(v: f64) -> Coerced<i128> {
    if !v.is_finite() {
        return Err(format!("value {} is not finite", v));
    }
    if v.fract() != 0.0 {
        return Err(format!("value {} has a fractional part", v));
    }
    if v.abs() >= i128::MAX as f64 {
        return Err(format!("value {} is out of range", v));
    }
    Ok(v as i128)
}

fn parse_integer(s: &str) -> Coerced<i128> {
    let trimmed = s.trim();
    match trimmed.parse::<i128>() {
        Ok(v) => Ok(v),
        // Numeric text such as "50.0" still counts when it is integral
        Err(int_err) => match trimmed.parse::<f64>() {
            Ok(v) => integral_float(v),
            Err(_) => Err(format!("'{}': {}", s, int_err)),
        },
    }
}

/// Floating point destinations
pub fn to_f64(value: &Value) -> Coerced<f64> {
    match value {
        Value::Int8(v) => Ok(*v as f64),
        Value::Int16(v) => Ok(*v as f64),
        Value::Int32(v) => Ok(*v as f64),
        Value::Int64(v) => Ok(*v as f64),
        Value::Float32(v) => Ok(*v as f64),
        Value::Float64(v) => Ok(*v),
        Value::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
        Value::Decimal(s) | Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("'{}': {}", s, e)),
        other => Err(unsupported(other)),
    }
}

pub fn to_f32(value: &Value) -> Coerced<f32> {
    match value {
        Value::Float32(v) => Ok(*v),
        other => {
            let wide = to_f64(other)?;
            let narrow = wide as f32;
            if wide.is_finite() && narrow.is_infinite() {
                return Err(format!("value {} is out of range", wide));
            }
            Ok(narrow)
        }
    }
}

pub fn to_bool(value: &Value) -> Coerced<bool> {
    match value {
        Value::Bool(v) => Ok(*v),
        Value::Int8(_) | Value::Int16(_) | Value::Int32(_) | Value::Int64(_) => {
            Ok(value.as_i64() != Some(0))
        }
        Value::Float32(v) => finite_truth(*v as f64),
        Value::Float64(v) => finite_truth(*v),
        Value::Decimal(s) | Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(format!("'{}' is not a valid boolean", s)),
        },
        other => Err(unsupported(other)),
    }
}

fn finite_truth(v: f64) -> Coerced<bool> {
    if !v.is_finite() {
        return Err(format!("value {} is not finite", v));
    }
    Ok(v != 0.0)
}

pub fn to_string(value: &Value) -> Coerced<String> {
    match value {
        Value::String(s) | Value::Decimal(s) => Ok(s.clone()),
        Value::Bytes(b) => String::from_utf8(b.clone()).map_err(|e| e.to_string()),
        Value::Null => Err(unsupported(value)),
        other => Ok(other.to_string()),
    }
}

pub fn to_bytes(value: &Value) -> Coerced<Vec<u8>> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        other => Err(unsupported(other)),
    }
}

pub fn to_uuid(value: &Value) -> Coerced<Uuid> {
    match value {
        Value::Uuid(u) => Ok(*u),
        Value::String(s) => Uuid::parse_str(s.trim()).map_err(|e| e.to_string()),
        Value::Bytes(b) => Uuid::from_slice(b).map_err(|e| e.to_string()),
        other => Err(unsupported(other)),
    }
}

pub fn to_date(value: &Value) -> Coerced<NaiveDate> {
    match value {
        Value::Date(d) => Ok(*d),
        Value::DateTime(dt) => Ok(dt.date()),
        Value::DateTimeUtc(dt) => Ok(dt.date_naive()),
        Value::String(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .or_else(|e| parse_datetime(s).map(|dt| dt.date()).map_err(|_| e.to_string()))
                .map_err(|e| format!("'{}': {}", s, e))
        }
        other => Err(unsupported(other)),
    }
}

pub fn to_time(value: &Value) -> Coerced<NaiveTime> {
    match value {
        Value::Time(t) => Ok(*t),
        Value::DateTime(dt) => Ok(dt.time()),
        Value::DateTimeUtc(dt) => Ok(dt.time()),
        Value::String(s) => NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
            .map_err(|e| format!("'{}': {}", s, e)),
        other => Err(unsupported(other)),
    }
}

pub fn to_datetime(value: &Value) -> Coerced<NaiveDateTime> {
    match value {
        Value::DateTime(dt) => Ok(*dt),
        Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
        Value::DateTimeUtc(dt) => Ok(dt.naive_utc()),
        Value::String(s) => parse_datetime(s.trim()),
        other => Err(unsupported(other)),
    }
}

pub fn to_datetime_utc(value: &Value) -> Coerced<DateTime<Utc>> {
    match value {
        Value::DateTimeUtc(dt) => Ok(*dt),
        Value::String(s) => match DateTime::parse_from_rfc3339(s.trim()) {
            Ok(dt) => Ok(dt.with_timezone(&Utc)),
            Err(_) => parse_datetime(s.trim()).map(|dt| dt.and_utc()),
        },
        Value::DateTime(_) | Value::Date(_) => to_datetime(value).map(|dt| dt.and_utc()),
        other => Err(unsupported(other)),
    }
}

pub fn to_json(value: &Value) -> Coerced<serde_json::Value> {
    match value {
        Value::Json(j) => Ok(j.clone()),
        Value::String(s) => serde_json::from_str(s).map_err(|e| e.to_string()),
        other => Err(unsupported(other)),
    }
}

fn parse_datetime(s: &str) -> Coerced<NaiveDateTime> {
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|e| format!("'{}': {}", s, e))
}
