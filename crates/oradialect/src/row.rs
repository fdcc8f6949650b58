//! Rows returned by the driver and mapping into Rust types.

use crate::error::{OrmError, OrmResult};
use crate::value::{FromValue, Value};
use std::sync::Arc;

/// One result row. Column lookup by name ignores ASCII case, since Oracle
/// reports unquoted names upper-cased.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row. Extra values beyond the column list are dropped; missing
    /// values read as NULL.
    pub fn new(columns: impl Into<Arc<[String]>>, mut values: Vec<Value>) -> Self {
        let columns = columns.into();
        values.resize(columns.len(), Value::Null);
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(column)))
    }

    /// Raw value of a column.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.position(column).map(|i| &self.values[i])
    }

    /// Decode a column by name.
    pub fn get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        let value = self
            .value(column)
            .ok_or_else(|| OrmError::decode(column, "no such column in row"))?;
        T::from_value(value).map_err(|e| relabel(e, column))
    }

    /// Decode a column by position.
    pub fn get_idx<T: FromValue>(&self, idx: usize) -> OrmResult<T> {
        let value = self
            .values
            .get(idx)
            .ok_or_else(|| OrmError::decode(idx.to_string(), "column index out of range"))?;
        let name = self.columns.get(idx).map_or_else(|| idx.to_string(), Clone::clone);
        T::from_value(value).map_err(|e| relabel(e, &name))
    }
}

fn relabel(err: OrmError, column: &str) -> OrmError {
    match err {
        OrmError::Decode { message, .. } => OrmError::decode(column, message),
        other => other,
    }
}

/// A row produced by `RETURNING ... INTO`, tagged with the index of the
/// input row it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnedRow {
    pub input_index: usize,
    pub row: Row,
}

/// Trait for converting a database row into a Rust value.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> OrmResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row.clone())
    }
}

macro_rules! tuple_from_row {
    ($($t:ident => $i:tt),+) => {
        impl<$($t: FromValue),+> FromRow for ($($t,)+) {
            fn from_row(row: &Row) -> OrmResult<Self> {
                Ok(($(row.get_idx::<$t>($i)?,)+))
            }
        }
    };
}

tuple_from_row!(A => 0);
tuple_from_row!(A => 0, B => 1);
tuple_from_row!(A => 0, B => 1, C => 2);
tuple_from_row!(A => 0, B => 1, C => 2, D => 3);
tuple_from_row!(A => 0, B => 1, C => 2, D => 3, E => 4);
