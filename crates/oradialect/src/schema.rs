//! Table and column descriptors.
//!
//! Descriptors are produced once at model registration and treated as
//! immutable afterwards. They drive DDL generation, typed value encoding and
//! RETURNING out-bind typing.

use crate::error::{OrmError, OrmResult};

/// Dialect-neutral column semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Exact numeric; precision and scale come from the descriptor.
    Decimal,
    String,
    Bytes,
    /// An absolute point in time.
    InstantTimestamp,
    /// A wall-clock time in the session's zone.
    LocalTimestamp,
    Uuid,
    /// JSON document stored as text.
    Json,
}

impl FieldType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            FieldType::Int8
                | FieldType::Int16
                | FieldType::Int32
                | FieldType::Int64
                | FieldType::UInt8
                | FieldType::UInt16
                | FieldType::UInt32
                | FieldType::UInt64
        )
    }

    /// Inclusive value range for integer types.
    pub fn int_range(&self) -> Option<(i128, i128)> {
        Some(match self {
            FieldType::Int8 => (i8::MIN.into(), i8::MAX.into()),
            FieldType::Int16 => (i16::MIN.into(), i16::MAX.into()),
            FieldType::Int32 => (i32::MIN.into(), i32::MAX.into()),
            FieldType::Int64 => (i64::MIN.into(), i64::MAX.into()),
            FieldType::UInt8 => (0, u8::MAX.into()),
            FieldType::UInt16 => (0, u16::MAX.into()),
            FieldType::UInt32 => (0, u32::MAX.into()),
            FieldType::UInt64 => (0, u64::MAX.into()),
            _ => return None,
        })
    }
}

/// A column default as declared on the model.
///
/// Defaults come from schema declarations, never from request data. Text
/// defaults are rendered as literals with quotes doubled.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    CurrentTimestamp,
    /// A trusted SQL expression, emitted verbatim.
    Expression(String),
}

/// Referential action for foreign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub field_type: FieldType,
    /// Character length for strings, byte length for bytes.
    pub size: Option<u32>,
    /// Decimal precision, or fractional-second precision for timestamps.
    pub precision: Option<u8>,
    pub scale: Option<i8>,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
    pub identity: bool,
    pub comment: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            size: None,
            precision: None,
            scale: None,
            nullable: true,
            default: None,
            identity: false,
            comment: None,
        }
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn precision(mut self, precision: u8) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn scale(mut self, scale: i8) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark as an auto-generated identity. Identity columns are NOT NULL.
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self.nullable = false;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Primary key definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// A secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDescriptor {
    pub name: String,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

impl ForeignKeyDescriptor {
    pub fn new(
        name: impl Into<String>,
        columns: &[&str],
        ref_table: impl Into<String>,
        ref_columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ref_table: ref_table.into(),
            ref_columns: ref_columns.iter().map(|c| c.to_string()).collect(),
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        }
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }
}

/// A table: ordered columns plus keys, indexes and foreign keys.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Option<PrimaryKey>,
    pub indexes: Vec<IndexDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    pub comment: Option<String>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            comment: None,
        }
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = Some(PrimaryKey {
            name: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKeyDescriptor) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Look up a column by declared name (case-insensitive).
    pub fn find_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn identity_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.identity)
    }

    /// Structural checks that do not depend on the dialect.
    pub fn validate(&self) -> OrmResult<()> {
        if self.columns.is_empty() {
            return Err(OrmError::validation(format!(
                "table '{}' has no columns",
                self.name
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.to_ascii_uppercase()) {
                return Err(OrmError::validation(format!(
                    "table '{}' declares column '{}' twice",
                    self.name, column.name
                )));
            }
        }
        let known = |c: &String| self.find_column(c).is_some();
        if let Some(pk) = &self.primary_key {
            if pk.columns.is_empty() || !pk.columns.iter().all(known) {
                return Err(OrmError::validation(format!(
                    "primary key of '{}' references unknown columns",
                    self.name
                )));
            }
        }
        for index in &self.indexes {
            if index.columns.is_empty() || !index.columns.iter().all(known) {
                return Err(OrmError::validation(format!(
                    "index '{}' references unknown columns",
                    index.name
                )));
            }
        }
        for fk in &self.foreign_keys {
            if fk.columns.is_empty()
                || fk.columns.len() != fk.ref_columns.len()
                || !fk.columns.iter().all(known)
            {
                return Err(OrmError::validation(format!(
                    "foreign key '{}' has mismatched or unknown columns",
                    fk.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDescriptor {
        TableDescriptor::new("users")
            .column(ColumnDescriptor::new("id", FieldType::Int64).identity())
            .column(ColumnDescriptor::new("name", FieldType::String).size(50).not_null())
            .primary_key(&["id"])
    }

    #[test]
    fn identity_implies_not_null() {
        let t = users();
        let id = t.find_column("ID").unwrap();
        assert!(id.identity);
        assert!(!id.nullable);
        assert_eq!(t.identity_columns().count(), 1);
    }

    #[test]
    fn validate_catches_structural_mistakes() {
        users().validate().unwrap();

        assert!(TableDescriptor::new("empty").validate().is_err());

        let dup = users().column(ColumnDescriptor::new("NAME", FieldType::String));
        assert!(dup.validate().is_err());

        let bad_pk = users().primary_key(&["nope"]);
        assert!(bad_pk.validate().is_err());

        let bad_fk = users().foreign_key(ForeignKeyDescriptor::new(
            "fk_x",
            &["id", "name"],
            "other",
            &["id"],
        ));
        assert!(bad_fk.validate().is_err());
    }

    #[test]
    fn int_ranges() {
        assert_eq!(FieldType::Int8.int_range(), Some((-128, 127)));
        assert_eq!(FieldType::UInt64.int_range().unwrap().1, u64::MAX as i128);
        assert_eq!(FieldType::String.int_range(), None);
    }
}
