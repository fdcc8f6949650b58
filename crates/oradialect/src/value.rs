//! Bind values and conversions between Rust types and [`Value`].
//!
//! [`ToValue`] lifts a Rust value into a dialect-neutral [`Value`]; the type
//! mapper then lowers it to what Oracle can store (booleans become 0/1, UUIDs
//! become canonical text). [`FromValue`] goes the other way on read and never
//! coerces: a stored `2` is not a boolean.

use crate::error::{OrmError, OrmResult};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

/// A value travelling to or from the database.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    /// An absolute instant, independent of any session time zone.
    Instant(DateTime<Utc>),
    /// A wall-clock timestamp interpreted in the session time zone.
    LocalTimestamp(NaiveDateTime),
    Uuid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Instant(_) => "instant timestamp",
            Value::LocalTimestamp(_) => "local timestamp",
            Value::Uuid(_) => "uuid",
        }
    }
}

/// Convert a Rust value into a [`Value`].
pub trait ToValue {
    fn to_value(&self) -> Value;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

macro_rules! int_to_value {
    ($($t:ty),*) => {
        $(impl ToValue for $t {
            fn to_value(&self) -> Value {
                Value::Int(i64::from(*self))
            }
        })*
    };
}

int_to_value!(i8, i16, i32, i64, u8, u16, u32);

impl ToValue for u64 {
    fn to_value(&self) -> Value {
        match i64::try_from(*self) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Decimal(Decimal::from(*self)),
        }
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl ToValue for Decimal {
    fn to_value(&self) -> Value {
        Value::Decimal(*self)
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for [u8] {
    fn to_value(&self) -> Value {
        Value::Bytes(self.to_vec())
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl<Tz: TimeZone> ToValue for DateTime<Tz> {
    fn to_value(&self) -> Value {
        Value::Instant(self.with_timezone(&Utc))
    }
}

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::LocalTimestamp(*self)
    }
}

impl ToValue for Uuid {
    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

/// Convert a [`Value`] read from the database into a Rust value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> OrmResult<Self>;
}

fn mismatch(expected: &str, value: &Value) -> OrmError {
    OrmError::decode(
        "",
        format!("type mismatch: expected {expected}, got {}", value.type_name()),
    )
}

fn unexpected_null(expected: &str) -> OrmError {
    OrmError::decode("", format!("unexpected NULL for non-optional {expected}"))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> OrmResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(None),
            v => T::from_value(v).map(Some),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            Value::Decimal(d) if *d == Decimal::ZERO => Ok(false),
            Value::Decimal(d) if *d == Decimal::ONE => Ok(true),
            Value::Int(n) => Err(OrmError::decode(
                "",
                format!("type mismatch: boolean column holds {n}, expected 0 or 1"),
            )),
            Value::Decimal(d) => Err(OrmError::decode(
                "",
                format!("type mismatch: boolean column holds {d}, expected 0 or 1"),
            )),
            Value::Null => Err(unexpected_null("bool")),
            v => Err(mismatch("0 or 1", v)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Int(n) => Ok(*n),
            Value::Decimal(d) if d.fract().is_zero() => d
                .to_i64()
                .ok_or_else(|| OrmError::decode("", format!("{d} overflows i64"))),
            Value::Null => Err(unexpected_null("integer")),
            v => Err(mismatch("integer", v)),
        }
    }
}

macro_rules! int_from_value {
    ($($t:ty),*) => {
        $(impl FromValue for $t {
            fn from_value(value: &Value) -> OrmResult<Self> {
                let n = i64::from_value(value)?;
                <$t>::try_from(n).map_err(|_| {
                    OrmError::decode("", format!("{n} overflows {}", stringify!($t)))
                })
            }
        })*
    };
}

int_from_value!(i8, i16, i32, u8, u16, u32);

impl FromValue for u64 {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Int(n) => u64::try_from(*n)
                .map_err(|_| OrmError::decode("", format!("{n} overflows u64"))),
            Value::Decimal(d) if d.fract().is_zero() => d
                .to_u64()
                .ok_or_else(|| OrmError::decode("", format!("{d} overflows u64"))),
            Value::Null => Err(unexpected_null("integer")),
            v => Err(mismatch("integer", v)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(n) => Ok(*n as f64),
            Value::Decimal(d) => d
                .to_f64()
                .ok_or_else(|| OrmError::decode("", format!("{d} is not representable as f64"))),
            Value::Null => Err(unexpected_null("float")),
            v => Err(mismatch("float", v)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> OrmResult<Self> {
        Ok(f64::from_value(value)? as f32)
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Decimal(d) => Ok(*d),
            Value::Int(n) => Ok(Decimal::from(*n)),
            Value::Float(f) => Decimal::try_from(*f)
                .map_err(|e| OrmError::decode("", format!("{f} is not a decimal: {e}"))),
            Value::Null => Err(unexpected_null("decimal")),
            v => Err(mismatch("decimal", v)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Null => Err(unexpected_null("string")),
            v => Err(mismatch("text", v)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Null => Err(unexpected_null("bytes")),
            v => Err(mismatch("bytes", v)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Instant(dt) => Ok(*dt),
            Value::Null => Err(unexpected_null("instant timestamp")),
            v => Err(mismatch("instant timestamp", v)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::LocalTimestamp(ts) => Ok(*ts),
            Value::Null => Err(unexpected_null("local timestamp")),
            v => Err(mismatch("local timestamp", v)),
        }
    }
}

/// Parse a UUID stored as text. Only the 36-character hyphenated form is
/// accepted.
pub fn parse_canonical_uuid(s: &str) -> OrmResult<Uuid> {
    let bytes = s.as_bytes();
    let well_formed = bytes.len() == 36
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => *b == b'-',
            _ => b.is_ascii_hexdigit(),
        });
    if !well_formed {
        return Err(OrmError::decode(
            "",
            format!("format error: {s:?} is not a hyphenated 36-character UUID"),
        ));
    }
    Uuid::parse_str(s).map_err(|e| OrmError::decode("", format!("format error: {e}")))
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Text(s) => parse_canonical_uuid(s),
            Value::Null => Err(unexpected_null("uuid")),
            v => Err(mismatch("uuid", v)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Text(s) => serde_json::from_str(s)
                .map_err(|e| OrmError::decode("", format!("invalid JSON: {e}"))),
            Value::Null => Ok(serde_json::Value::Null),
            v => Err(mismatch("json text", v)),
        }
    }
}
