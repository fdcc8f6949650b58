//! Error types for oradialect

use std::fmt;
use thiserror::Error;

/// Result type alias for oradialect operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Canonical error kinds exposed to the ORM core.
///
/// This is a closed set: anything the classifier does not recognise is
/// [`ErrorKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DuplicateKey,
    ForeignKeyViolation,
    NotNullViolation,
    /// Raised by the adapter for UPDATE/DELETE without predicates.
    MissingWhereClause,
    /// Raised by the adapter when an expected row is absent.
    RecordNotFound,
    ConnectionFailure,
    Timeout,
    SyntaxOrUnsupportedFeature,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DuplicateKey => "duplicate_key",
            ErrorKind::ForeignKeyViolation => "foreign_key_violation",
            ErrorKind::NotNullViolation => "not_null_violation",
            ErrorKind::MissingWhereClause => "missing_where_clause",
            ErrorKind::RecordNotFound => "record_not_found",
            ErrorKind::ConnectionFailure => "connection_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::SyntaxOrUnsupportedFeature => "syntax_or_unsupported_feature",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an error happened: which operation, table and column were involved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub operation: Option<&'static str>,
    pub table: Option<String>,
    pub column: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation: Some(operation),
            table: None,
            column: None,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.operation.is_none() && self.table.is_none() && self.column.is_none()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let mut parts = Vec::with_capacity(3);
        if let Some(op) = self.operation {
            parts.push(format!("operation={op}"));
        }
        if let Some(ref table) = self.table {
            parts.push(format!("table={table}"));
        }
        if let Some(ref column) = self.column {
            parts.push(format!("column={column}"));
        }
        write!(f, " ({})", parts.join(", "))
    }
}

/// A native error as reported by the driver.
///
/// `code` is the numeric ORA code (`1` for `ORA-00001`). Transport-level
/// failures that never reached the server may have no code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbError {
    pub code: Option<i32>,
    pub message: String,
}

impl DbError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn without_code(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "ORA-{code:05}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DbError {}

/// A native error mapped to a canonical [`ErrorKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub code: Option<i32>,
    pub message: String,
    pub context: ErrorContext,
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(
                f,
                "{}: ORA-{code:05}: {}{}",
                self.kind, self.message, self.context
            ),
            None => write!(f, "{}: {}{}", self.kind, self.message, self.context),
        }
    }
}

/// Error types for dialect operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Malformed DSN, missing driver library, invalid pool or dialect settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// A generic clause has no representation in this dialect, or a statement
    /// template is malformed
    #[error("Translation error: {message}{context}")]
    Translation {
        message: String,
        context: ErrorContext,
    },

    /// A value cannot be encoded for its column (overflow, bad format, too long)
    #[error("Data error: {message}{context}")]
    Data {
        message: String,
        context: ErrorContext,
    },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Native error passed through unmodified
    #[error("Database error: {source}{context}")]
    Database {
        source: DbError,
        context: ErrorContext,
    },

    /// Native error after classification
    #[error("{0}")]
    Classified(ClassifiedError),

    /// UPDATE/DELETE without WHERE predicates
    #[error("Refusing to run a global mutation without WHERE{context}")]
    MissingWhereClause { context: ErrorContext },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Query returned more rows than expected
    #[error("Too many rows: expected {expected}, got {got}")]
    TooManyRows { expected: usize, got: usize },

    /// The dialect cannot express the requested schema feature
    #[error("Unsupported by dialect: {message}{context}")]
    Capability {
        message: String,
        context: ErrorContext,
    },

    /// Genuine DDL failure during migration
    #[error("Migration error: {message}{context}")]
    Migration {
        message: String,
        context: ErrorContext,
    },

    /// Deadline expired while a statement was in flight
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Caller cancelled the call while a statement was in flight
    #[error("Query cancelled")]
    Cancelled,

    /// Pool error
    #[error("Pool error: {0}")]
    Pool(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a too-many-rows error
    pub fn too_many_rows(expected: usize, got: usize) -> Self {
        Self::TooManyRows { expected, got }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a translation error without context
    pub fn translation(message: impl Into<String>) -> Self {
        Self::Translation {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a data error without context
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a capability error without context
    pub fn capability(message: impl Into<String>) -> Self {
        Self::Capability {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Wrap a native driver error
    pub fn database(source: DbError) -> Self {
        Self::Database {
            source,
            context: ErrorContext::default(),
        }
    }

    /// Attach context to errors that carry one. Context already present is
    /// kept; only missing fields are filled in.
    pub fn with_context(mut self, ctx: ErrorContext) -> Self {
        if let Some(existing) = self.context_mut() {
            if existing.operation.is_none() {
                existing.operation = ctx.operation;
            }
            if existing.table.is_none() {
                existing.table = ctx.table;
            }
            if existing.column.is_none() {
                existing.column = ctx.column;
            }
        }
        self
    }

    /// Structured context, when the variant carries one.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Translation { context, .. }
            | Self::Data { context, .. }
            | Self::Database { context, .. }
            | Self::MissingWhereClause { context }
            | Self::Capability { context, .. }
            | Self::Migration { context, .. } => Some(context),
            Self::Classified(c) => Some(&c.context),
            _ => None,
        }
    }

    fn context_mut(&mut self) -> Option<&mut ErrorContext> {
        match self {
            Self::Translation { context, .. }
            | Self::Data { context, .. }
            | Self::Database { context, .. }
            | Self::MissingWhereClause { context }
            | Self::Capability { context, .. }
            | Self::Migration { context, .. } => Some(context),
            Self::Classified(c) => Some(&mut c.context),
            _ => None,
        }
    }

    /// The native ORA code, for native errors.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Self::Database { source, .. } => source.code,
            Self::Classified(c) => c.code,
            _ => None,
        }
    }

    /// Canonical kind of this error.
    ///
    /// Native errors that were not classified (translation disabled) report
    /// [`ErrorKind::Unknown`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Classified(c) => c.kind,
            Self::MissingWhereClause { .. } => ErrorKind::MissingWhereClause,
            Self::NotFound(_) => ErrorKind::RecordNotFound,
            Self::Timeout(_) | Self::Cancelled => ErrorKind::Timeout,
            Self::Pool(_) => ErrorKind::ConnectionFailure,
            Self::Translation { .. } | Self::Capability { .. } => {
                ErrorKind::SyntaxOrUnsupportedFeature
            }
            _ => ErrorKind::Unknown,
        }
    }

    /// Check if this is a duplicate key error
    pub fn is_duplicate_key(&self) -> bool {
        self.kind() == ErrorKind::DuplicateKey
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is a missing WHERE error
    pub fn is_missing_where(&self) -> bool {
        matches!(self, Self::MissingWhereClause { .. })
    }
}

impl From<DbError> for OrmError {
    fn from(err: DbError) -> Self {
        Self::database(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool::managed::PoolError<OrmError>> for OrmError {
    fn from(err: deadpool::managed::PoolError<OrmError>) -> Self {
        match err {
            deadpool::managed::PoolError::Backend(e) => e,
            other => Self::Pool(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_error_renders_ora_code() {
        let err = DbError::new(1, "unique constraint (APP.PK_USERS) violated");
        assert_eq!(
            err.to_string(),
            "ORA-00001: unique constraint (APP.PK_USERS) violated"
        );
    }

    #[test]
    fn context_is_rendered_in_message() {
        let err = OrmError::data("value too long").with_context(
            ErrorContext::new("insert").table("USERS").column("NAME"),
        );
        assert_eq!(
            err.to_string(),
            "Data error: value too long (operation=insert, table=USERS, column=NAME)"
        );
    }

    #[test]
    fn with_context_keeps_existing_fields() {
        let err = OrmError::Data {
            message: "x".into(),
            context: ErrorContext::default().column("NAME"),
        }
        .with_context(ErrorContext::new("insert").table("USERS").column("OTHER"));
        let ctx = err.context().unwrap();
        assert_eq!(ctx.operation, Some("insert"));
        assert_eq!(ctx.table.as_deref(), Some("USERS"));
        assert_eq!(ctx.column.as_deref(), Some("NAME"));
    }

    #[test]
    fn adapter_errors_have_kinds() {
        assert_eq!(
            OrmError::MissingWhereClause {
                context: ErrorContext::new("delete")
            }
            .kind(),
            ErrorKind::MissingWhereClause
        );
        assert_eq!(OrmError::not_found("x").kind(), ErrorKind::RecordNotFound);
        assert_eq!(
            OrmError::translation("unbound").kind(),
            ErrorKind::SyntaxOrUnsupportedFeature
        );
        assert_eq!(
            OrmError::database(DbError::new(1, "dup")).kind(),
            ErrorKind::Unknown
        );
    }
}
