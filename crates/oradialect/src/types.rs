//! Column types and the value mapper.
//!
//! [`TypeMapper`] answers two questions for a [`ColumnDescriptor`]: what
//! Oracle column type it is stored in, and how a [`Value`] must be lowered
//! before binding. Encoding checks happen before anything reaches the
//! server, so an oversized string or an out-of-range integer fails with a data
//! error naming the column instead of an ORA code.

use crate::config::{DialectConfig, OverflowPolicy};
use crate::error::{ErrorContext, OrmError, OrmResult};
use crate::schema::{ColumnDescriptor, FieldType};
use crate::value::{FromValue, Value, parse_canonical_uuid};
use chrono::SubsecRound;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;

/// Largest RAW column in bytes.
pub const MAX_RAW_LENGTH: u32 = 2_000;
/// Fractional digits kept on encode (microseconds).
const ENCODE_FSP: u16 = 6;

/// An Oracle column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Number {
        precision: Option<u8>,
        scale: Option<i8>,
    },
    BinaryFloat,
    BinaryDouble,
    /// Character-semantics VARCHAR2.
    Varchar2 { size: u32 },
    Char { size: u32 },
    Clob,
    Raw { size: u32 },
    Blob,
    TimestampTz { precision: u8 },
    TimestampLtz { precision: u8 },
    Timestamp { precision: u8 },
    Date,
    Boolean,
    /// A dictionary type this crate never generates.
    Other(String),
}

impl ColumnType {
    /// Render the type as it appears in DDL.
    pub fn to_sql(&self) -> String {
        match self {
            ColumnType::Number {
                precision: Some(p),
                scale: Some(s),
            } if *s != 0 => format!("NUMBER({p},{s})"),
            ColumnType::Number {
                precision: Some(p), ..
            } => format!("NUMBER({p})"),
            ColumnType::Number {
                precision: None, ..
            } => "NUMBER".to_string(),
            ColumnType::BinaryFloat => "BINARY_FLOAT".to_string(),
            ColumnType::BinaryDouble => "BINARY_DOUBLE".to_string(),
            ColumnType::Varchar2 { size } => format!("VARCHAR2({size} CHAR)"),
            ColumnType::Char { size } => format!("CHAR({size})"),
            ColumnType::Clob => "CLOB".to_string(),
            ColumnType::Raw { size } => format!("RAW({size})"),
            ColumnType::Blob => "BLOB".to_string(),
            ColumnType::TimestampTz { precision } => {
                format!("TIMESTAMP({precision}) WITH TIME ZONE")
            }
            ColumnType::TimestampLtz { precision } => {
                format!("TIMESTAMP({precision}) WITH LOCAL TIME ZONE")
            }
            ColumnType::Timestamp { precision } => format!("TIMESTAMP({precision})"),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Other(name) => name.clone(),
        }
    }

    /// Build a column type from `USER_TAB_COLUMNS` fields.
    ///
    /// `char_length` is used for character types and `data_length` for RAW.
    pub fn from_dictionary(
        data_type: &str,
        data_precision: Option<i64>,
        data_scale: Option<i64>,
        char_length: Option<i64>,
        data_length: Option<i64>,
    ) -> Self {
        let upper = data_type.trim().to_ascii_uppercase();
        let len = |v: Option<i64>| v.and_then(|n| u32::try_from(n).ok()).unwrap_or(0);

        if let Some(rest) = upper.strip_prefix("TIMESTAMP") {
            let precision = data_scale
                .and_then(|s| u8::try_from(s).ok())
                .or_else(|| parse_paren_number(rest))
                .unwrap_or(6);
            return if rest.ends_with("WITH LOCAL TIME ZONE") {
                ColumnType::TimestampLtz { precision }
            } else if rest.ends_with("WITH TIME ZONE") {
                ColumnType::TimestampTz { precision }
            } else {
                ColumnType::Timestamp { precision }
            };
        }

        match upper.as_str() {
            "NUMBER" => ColumnType::Number {
                precision: data_precision.and_then(|p| u8::try_from(p).ok()),
                scale: data_scale.and_then(|s| i8::try_from(s).ok()),
            },
            "BINARY_FLOAT" => ColumnType::BinaryFloat,
            "BINARY_DOUBLE" => ColumnType::BinaryDouble,
            "VARCHAR2" | "NVARCHAR2" => ColumnType::Varchar2 {
                size: len(char_length),
            },
            "CHAR" | "NCHAR" => ColumnType::Char {
                size: len(char_length),
            },
            "CLOB" | "NCLOB" => ColumnType::Clob,
            "RAW" => ColumnType::Raw {
                size: len(data_length),
            },
            "BLOB" => ColumnType::Blob,
            "DATE" => ColumnType::Date,
            "BOOLEAN" => ColumnType::Boolean,
            _ => ColumnType::Other(upper),
        }
    }

    /// Integer-scale NUMBERs compare equal whether the scale was spelled
    /// out or not.
    fn normalized(&self) -> Self {
        match self {
            ColumnType::Number {
                precision: Some(p),
                scale: None,
            } => ColumnType::Number {
                precision: Some(*p),
                scale: Some(0),
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

fn parse_paren_number(s: &str) -> Option<u8> {
    let start = s.find('(')?;
    let end = s[start..].find(')')? + start;
    s[start + 1..end].trim().parse().ok()
}

/// How a live column relates to its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeChange {
    Same,
    /// The declared type holds every value of the live type; `MODIFY` is safe.
    Widen,
    /// The declared type is smaller; applying it could lose data.
    Narrow,
    /// Different type families; Oracle cannot convert in place.
    Incompatible,
}

/// Compare a live column type with the declared one.
pub fn compare_types(live: &ColumnType, declared: &ColumnType) -> TypeChange {
    let live = live.normalized();
    let declared = declared.normalized();
    if live == declared {
        return TypeChange::Same;
    }
    let by_size = |a: u32, b: u32| {
        if b > a {
            TypeChange::Widen
        } else {
            TypeChange::Narrow
        }
    };
    match (&live, &declared) {
        (ColumnType::Varchar2 { size: a }, ColumnType::Varchar2 { size: b })
        | (ColumnType::Char { size: a }, ColumnType::Char { size: b })
        | (ColumnType::Raw { size: a }, ColumnType::Raw { size: b }) => by_size(*a, *b),
        (ColumnType::Char { size: a }, ColumnType::Varchar2 { size: b }) => {
            if b >= a {
                TypeChange::Widen
            } else {
                TypeChange::Narrow
            }
        }
        (
            ColumnType::Number {
                precision: p1,
                scale: s1,
            },
            ColumnType::Number {
                precision: p2,
                scale: s2,
            },
        ) => match (p1, p2) {
            (_, None) => TypeChange::Widen,
            (None, Some(_)) => TypeChange::Narrow,
            (Some(p1), Some(p2)) => {
                let (p1, p2) = (i16::from(*p1), i16::from(*p2));
                let s1 = i16::from(s1.unwrap_or(0));
                let s2 = i16::from(s2.unwrap_or(0));
                if p2 >= p1 && s2 >= s1 && (p2 - s2) >= (p1 - s1) {
                    TypeChange::Widen
                } else {
                    TypeChange::Narrow
                }
            }
        },
        (ColumnType::TimestampTz { precision: a }, ColumnType::TimestampTz { precision: b })
        | (ColumnType::TimestampLtz { precision: a }, ColumnType::TimestampLtz { precision: b })
        | (ColumnType::Timestamp { precision: a }, ColumnType::Timestamp { precision: b }) => {
            by_size(u32::from(*a), u32::from(*b))
        }
        _ => TypeChange::Incompatible,
    }
}

fn column_ctx(column: &ColumnDescriptor) -> ErrorContext {
    ErrorContext::default().column(column.name.clone())
}

fn data_error(column: &ColumnDescriptor, message: impl Into<String>) -> OrmError {
    OrmError::Data {
        message: message.into(),
        context: column_ctx(column),
    }
}

fn invalid(column: &ColumnDescriptor, message: impl fmt::Display) -> OrmError {
    OrmError::validation(format!("column '{}': {message}", column.name))
}

/// Maps descriptors to column types and values to bindable values.
#[derive(Debug, Clone, Copy)]
pub struct TypeMapper<'a> {
    config: &'a DialectConfig,
}

impl<'a> TypeMapper<'a> {
    pub fn new(config: &'a DialectConfig) -> Self {
        Self { config }
    }

    /// The column type a descriptor is stored as.
    pub fn data_type_of(&self, column: &ColumnDescriptor) -> OrmResult<ColumnType> {
        self.check_descriptor(column)?;
        let number = |p: u8| ColumnType::Number {
            precision: Some(p),
            scale: Some(0),
        };
        Ok(match column.field_type {
            FieldType::Bool if self.config.native_boolean => ColumnType::Boolean,
            FieldType::Bool => number(1),
            FieldType::Int8 | FieldType::UInt8 => number(3),
            FieldType::Int16 | FieldType::UInt16 => number(5),
            FieldType::Int32 | FieldType::UInt32 => number(10),
            FieldType::Int64 => number(19),
            FieldType::UInt64 => number(20),
            FieldType::Float32 => ColumnType::BinaryFloat,
            FieldType::Float64 => ColumnType::BinaryDouble,
            FieldType::Decimal => match column.precision {
                Some(p) => ColumnType::Number {
                    precision: Some(p),
                    scale: Some(column.scale.unwrap_or(0)),
                },
                None => ColumnType::Number {
                    precision: None,
                    scale: None,
                },
            },
            FieldType::String => match column.size {
                Some(n) if n <= self.config.max_varchar_length => ColumnType::Varchar2 { size: n },
                _ => ColumnType::Clob,
            },
            FieldType::Bytes => match column.size {
                Some(n) if n <= MAX_RAW_LENGTH => ColumnType::Raw { size: n },
                _ => ColumnType::Blob,
            },
            FieldType::InstantTimestamp => ColumnType::TimestampTz {
                precision: column.precision.unwrap_or(self.config.timestamp_precision),
            },
            FieldType::LocalTimestamp => ColumnType::TimestampLtz {
                precision: column.precision.unwrap_or(self.config.timestamp_precision),
            },
            FieldType::Uuid => ColumnType::Char { size: 36 },
            FieldType::Json => ColumnType::Clob,
        })
    }

    /// Inline CHECK condition (without the `CHECK` keyword) the column needs,
    /// given its already-quoted name.
    pub fn check_condition(&self, column: &ColumnDescriptor, quoted: &str) -> Option<String> {
        match column.field_type {
            FieldType::Bool if !self.config.native_boolean => Some(format!("{quoted} IN (0,1)")),
            FieldType::Json => Some(format!("{quoted} IS JSON")),
            _ => None,
        }
    }

    fn check_descriptor(&self, column: &ColumnDescriptor) -> OrmResult<()> {
        let ft = column.field_type;
        if column.size.is_some() && !matches!(ft, FieldType::String | FieldType::Bytes) {
            return Err(invalid(column, format_args!("size is not valid for {ft:?}")));
        }
        if column.size == Some(0) {
            return Err(invalid(column, "size must be positive"));
        }
        match (ft, column.precision) {
            (_, None) => {}
            (FieldType::Decimal, Some(p)) if !(1..=38).contains(&p) => {
                return Err(invalid(
                    column,
                    format_args!("decimal precision {p} is outside 1..=38"),
                ));
            }
            (FieldType::Decimal, Some(_)) => {}
            (FieldType::InstantTimestamp | FieldType::LocalTimestamp, Some(p)) if p > 9 => {
                return Err(invalid(
                    column,
                    format_args!("fractional-second precision {p} is outside 0..=9"),
                ));
            }
            (FieldType::InstantTimestamp | FieldType::LocalTimestamp, Some(_)) => {}
            (_, Some(_)) => {
                return Err(invalid(
                    column,
                    format_args!("precision is not valid for {ft:?}"),
                ));
            }
        }
        if let Some(s) = column.scale {
            if ft != FieldType::Decimal || column.precision.is_none() {
                return Err(invalid(column, "scale requires a decimal with precision"));
            }
            if !(-84..=127).contains(&s) {
                return Err(invalid(column, format_args!("scale {s} is outside -84..=127")));
            }
        }
        if column.identity && !ft.is_integer() {
            return Err(invalid(column, "identity requires an integer type"));
        }
        Ok(())
    }

    /// Lower a value for binding into `column`, checking it fits.
    pub fn encode(&self, value: Value, column: &ColumnDescriptor) -> OrmResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match column.field_type {
            FieldType::Bool => self.encode_bool(value, column),
            ft if ft.is_integer() => encode_integer(value, column),
            FieldType::Float32 | FieldType::Float64 => encode_float(value, column),
            FieldType::Decimal => encode_decimal(value, column),
            FieldType::String => self.encode_string(value, column),
            FieldType::Bytes => match value {
                Value::Bytes(b) => match column.size {
                    Some(n) if b.len() > n as usize => Err(data_error(
                        column,
                        format!("value of {} bytes exceeds RAW size {n}", b.len()),
                    )),
                    _ => Ok(Value::Bytes(b)),
                },
                other => Err(mismatch(column, &other)),
            },
            FieldType::InstantTimestamp => match value {
                Value::Instant(dt) => Ok(Value::Instant(dt.trunc_subsecs(ENCODE_FSP))),
                other => Err(mismatch(column, &other)),
            },
            FieldType::LocalTimestamp => match value {
                Value::LocalTimestamp(ts) => Ok(Value::LocalTimestamp(ts.trunc_subsecs(ENCODE_FSP))),
                other => Err(mismatch(column, &other)),
            },
            FieldType::Uuid => match value {
                Value::Uuid(u) => Ok(Value::Text(u.hyphenated().to_string())),
                Value::Text(s) => parse_canonical_uuid(&s)
                    .map(|u| Value::Text(u.hyphenated().to_string()))
                    .map_err(|_| {
                        data_error(
                            column,
                            format!("format error: {s:?} is not a hyphenated 36-character UUID"),
                        )
                    }),
                other => Err(mismatch(column, &other)),
            },
            FieldType::Json => match value {
                Value::Text(s) => match serde_json::from_str::<serde_json::Value>(&s) {
                    Ok(_) => Ok(Value::Text(s)),
                    Err(e) => Err(data_error(column, format!("invalid JSON: {e}"))),
                },
                other => Err(mismatch(column, &other)),
            },
            _ => Ok(self.encode_untyped(value)),
        }
    }

    /// Lower a value when no column descriptor is known.
    pub fn encode_untyped(&self, value: Value) -> Value {
        match value {
            Value::Bool(b) if !self.config.native_boolean => Value::Int(i64::from(b)),
            Value::Uuid(u) => Value::Text(u.hyphenated().to_string()),
            Value::Instant(dt) => Value::Instant(dt.trunc_subsecs(ENCODE_FSP)),
            Value::LocalTimestamp(ts) => Value::LocalTimestamp(ts.trunc_subsecs(ENCODE_FSP)),
            other => other,
        }
    }

    /// Decode a fetched value for `column`. Errors name the column.
    pub fn decode<T: FromValue>(&self, value: &Value, column: &ColumnDescriptor) -> OrmResult<T> {
        T::from_value(value).map_err(|e| match e {
            OrmError::Decode { message, .. } => OrmError::decode(column.name.clone(), message),
            other => other,
        })
    }

    fn encode_bool(&self, value: Value, column: &ColumnDescriptor) -> OrmResult<Value> {
        let b = match value {
            Value::Bool(b) => b,
            Value::Int(0) => false,
            Value::Int(1) => true,
            Value::Int(n) => {
                return Err(data_error(
                    column,
                    format!("invalid boolean encoding {n}, expected 0 or 1"),
                ));
            }
            other => return Err(mismatch(column, &other)),
        };
        Ok(if self.config.native_boolean {
            Value::Bool(b)
        } else {
            Value::Int(i64::from(b))
        })
    }

    fn encode_string(&self, value: Value, column: &ColumnDescriptor) -> OrmResult<Value> {
        let s = match value {
            Value::Text(s) => s,
            Value::Uuid(u) => u.hyphenated().to_string(),
            other => return Err(mismatch(column, &other)),
        };
        let Some(limit) = column.size else {
            return Ok(Value::Text(s));
        };
        let chars = s.chars().count();
        if chars <= limit as usize {
            return Ok(Value::Text(s));
        }
        match self.config.string_overflow {
            OverflowPolicy::Reject => Err(data_error(
                column,
                format!("value of {chars} characters exceeds column size {limit}"),
            )),
            OverflowPolicy::Truncate => {
                tracing::warn!(
                    column = %column.name,
                    chars,
                    limit,
                    "truncating string value to column size"
                );
                Ok(Value::Text(s.chars().take(limit as usize).collect()))
            }
        }
    }
}

fn mismatch(column: &ColumnDescriptor, value: &Value) -> OrmError {
    data_error(
        column,
        format!(
            "type mismatch: cannot store {} in a {:?} column",
            value.type_name(),
            column.field_type
        ),
    )
}

fn encode_integer(value: Value, column: &ColumnDescriptor) -> OrmResult<Value> {
    let n: i128 = match &value {
        Value::Int(n) => i128::from(*n),
        Value::Decimal(d) if d.fract().is_zero() => d
            .to_i128()
            .ok_or_else(|| data_error(column, format!("{d} is out of range")))?,
        Value::Decimal(d) => {
            return Err(data_error(column, format!("{d} is not an integer")));
        }
        other => return Err(mismatch(column, other)),
    };
    if let Some((lo, hi)) = column.field_type.int_range() {
        if n < lo || n > hi {
            return Err(data_error(
                column,
                format!("{n} is out of range for {:?}", column.field_type),
            ));
        }
    }
    Ok(match i64::try_from(n) {
        Ok(v) => Value::Int(v),
        Err(_) => Value::Decimal(Decimal::from_i128_with_scale(n, 0)),
    })
}

fn encode_float(value: Value, column: &ColumnDescriptor) -> OrmResult<Value> {
    let f = match value {
        Value::Float(f) => f,
        Value::Int(n) => n as f64,
        Value::Decimal(d) => d
            .to_f64()
            .ok_or_else(|| data_error(column, format!("{d} is not representable as a float")))?,
        other => return Err(mismatch(column, &other)),
    };
    if column.field_type == FieldType::Float32 && f.is_finite() && f.abs() > f64::from(f32::MAX) {
        return Err(data_error(column, format!("{f} overflows BINARY_FLOAT")));
    }
    Ok(Value::Float(f))
}

fn encode_decimal(value: Value, column: &ColumnDescriptor) -> OrmResult<Value> {
    let d = match value {
        Value::Decimal(d) => d,
        Value::Int(n) => Decimal::from(n),
        Value::Float(f) => Decimal::try_from(f)
            .map_err(|e| data_error(column, format!("{f} is not a decimal: {e}")))?,
        other => return Err(mismatch(column, &other)),
    };
    let Some(precision) = column.precision else {
        return Ok(Value::Decimal(d));
    };
    let scale = column.scale.unwrap_or(0);
    let rounded = if scale >= 0 {
        d.round_dp_with_strategy(scale as u32, RoundingStrategy::MidpointAwayFromZero)
    } else {
        let factor = 10i128
            .checked_pow(u32::from(scale.unsigned_abs()))
            .and_then(|f| Decimal::try_from_i128_with_scale(f, 0).ok())
            .ok_or_else(|| {
                data_error(
                    column,
                    format!("scale {scale} is outside the representable decimal range"),
                )
            })?;
        d.checked_div(factor)
            .map(|q| q.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|q| q.checked_mul(factor))
            .ok_or_else(|| {
                data_error(column, format!("{d} exceeds NUMBER({precision},{scale})"))
            })?
    };
    let allowed = i32::from(precision) - i32::from(scale);
    if integer_digits(rounded) as i32 > allowed {
        return Err(data_error(
            column,
            format!("{d} exceeds NUMBER({precision},{scale})"),
        ));
    }
    Ok(Value::Decimal(rounded))
}

fn integer_digits(d: Decimal) -> usize {
    let int_part = d.trunc().abs();
    if int_part.is_zero() {
        return 0;
    }
    int_part
        .normalize()
        .to_string()
        .split('.')
        .next()
        .map_or(0, str::len)
}
