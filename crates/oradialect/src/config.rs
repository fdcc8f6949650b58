//! Dialect configuration.
//!
//! A [`DialectConfig`] is built once per process and shared, immutable, by
//! every component through [`crate::Dialect`].

use crate::error::{OrmError, OrmResult};
use serde::Deserialize;

/// How identifiers are cased before quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierCase {
    /// Upper-case, matching how Oracle stores unquoted identifiers.
    #[default]
    Upper,
    /// Keep the caller's spelling (quoted names become case sensitive).
    Preserve,
}

/// Bind marker syntax emitted in native SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// `:1, :2, ...`
    #[default]
    Numbered,
    /// `:name`
    Named,
}

/// How pagination is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStyle {
    /// `OFFSET :k ROWS FETCH NEXT :m ROWS ONLY` (12c and later)
    #[default]
    OffsetFetch,
    /// `ROWNUM` subquery (pre-12c servers)
    RowNum,
}

/// What to do with a string longer than its sized column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Fail encoding with a data error.
    #[default]
    Reject,
    /// Truncate to the column size. Explicit opt-in only.
    Truncate,
}

/// How identity (auto-increment) columns are emulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStrategy {
    /// Sequence plus `DEFAULT seq.NEXTVAL` on the column.
    #[default]
    SequenceDefault,
    /// Sequence plus a `BEFORE INSERT` trigger.
    Trigger,
}

/// Process-wide dialect settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DialectConfig {
    pub identifier_case: IdentifierCase,
    /// Maximum identifier length in bytes (30 before 12.2, 128 after).
    pub max_identifier_length: usize,
    pub placeholder_style: PlaceholderStyle,
    /// Whether RETURNING ... INTO may be emitted at all.
    pub supports_returning: bool,
    /// Whether the driver binds RETURNING INTO arrays for array DML.
    pub bulk_returning: bool,
    /// Whether the server has a native BOOLEAN column type (23ai).
    pub native_boolean: bool,
    pub pagination: PaginationStyle,
    /// Maximum bind parameters per statement.
    pub max_bind_params: usize,
    /// Maximum rows per multi-row INSERT/MERGE sub-batch.
    pub batch_size: usize,
    /// Largest VARCHAR2 size in characters before falling back to CLOB.
    pub max_varchar_length: u32,
    pub string_overflow: OverflowPolicy,
    pub identity: IdentityStrategy,
    /// Classify native errors into [`crate::ErrorKind`]s.
    pub translate_error: bool,
    /// Allow UPDATE/DELETE without WHERE for every statement.
    pub allow_global_update: bool,
    /// Fractional-second precision for timestamp columns.
    pub timestamp_precision: u8,
    /// Owner schema for introspection. `None` means the session's schema.
    pub schema: Option<String>,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            identifier_case: IdentifierCase::Upper,
            max_identifier_length: 128,
            placeholder_style: PlaceholderStyle::Numbered,
            supports_returning: true,
            bulk_returning: false,
            native_boolean: false,
            pagination: PaginationStyle::OffsetFetch,
            max_bind_params: 65_535,
            batch_size: 1_000,
            max_varchar_length: 4_000,
            string_overflow: OverflowPolicy::Reject,
            identity: IdentityStrategy::SequenceDefault,
            translate_error: false,
            allow_global_update: false,
            timestamp_precision: 6,
            schema: None,
        }
    }
}

impl DialectConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> OrmResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| OrmError::Config(format!("invalid dialect config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Set identifier case policy.
    pub fn identifier_case(mut self, case: IdentifierCase) -> Self {
        self.identifier_case = case;
        self
    }

    /// Set the maximum identifier length.
    pub fn max_identifier_length(mut self, len: usize) -> Self {
        self.max_identifier_length = len;
        self
    }

    /// Set placeholder style.
    pub fn placeholder_style(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder_style = style;
        self
    }

    /// Set pagination style.
    pub fn pagination(mut self, style: PaginationStyle) -> Self {
        self.pagination = style;
        self
    }

    /// Declare whether the driver supports bulk RETURNING INTO.
    pub fn bulk_returning(mut self, enabled: bool) -> Self {
        self.bulk_returning = enabled;
        self
    }

    /// Declare whether RETURNING is supported at all.
    pub fn supports_returning(mut self, enabled: bool) -> Self {
        self.supports_returning = enabled;
        self
    }

    /// Use a native BOOLEAN column type.
    pub fn native_boolean(mut self, enabled: bool) -> Self {
        self.native_boolean = enabled;
        self
    }

    /// Set bind parameter limit.
    pub fn max_bind_params(mut self, n: usize) -> Self {
        self.max_bind_params = n;
        self
    }

    /// Set maximum rows per sub-batch.
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    /// Set string overflow policy.
    pub fn string_overflow(mut self, policy: OverflowPolicy) -> Self {
        self.string_overflow = policy;
        self
    }

    /// Set identity emulation strategy.
    pub fn identity(mut self, strategy: IdentityStrategy) -> Self {
        self.identity = strategy;
        self
    }

    /// Enable native error classification.
    pub fn translate_error(mut self, enabled: bool) -> Self {
        self.translate_error = enabled;
        self
    }

    /// Allow UPDATE/DELETE without WHERE globally.
    pub fn allow_global_update(mut self, allow: bool) -> Self {
        self.allow_global_update = allow;
        self
    }

    /// Set the owner schema used for introspection.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> OrmResult<()> {
        if !(30..=128).contains(&self.max_identifier_length) {
            return Err(OrmError::Config(format!(
                "max_identifier_length must be between 30 and 128, got {}",
                self.max_identifier_length
            )));
        }
        if self.max_bind_params == 0 {
            return Err(OrmError::Config("max_bind_params must be > 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(OrmError::Config("batch_size must be > 0".to_string()));
        }
        if !(1..=32_767).contains(&self.max_varchar_length) {
            return Err(OrmError::Config(format!(
                "max_varchar_length must be between 1 and 32767, got {}",
                self.max_varchar_length
            )));
        }
        if self.timestamp_precision > 9 {
            return Err(OrmError::Config(format!(
                "timestamp_precision must be between 0 and 9, got {}",
                self.timestamp_precision
            )));
        }
        if self.schema.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(OrmError::Config("schema must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Top-level adapter configuration file: dialect settings plus the pool.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub dsn: Option<String>,
    pub dialect: DialectConfig,
    #[cfg(feature = "pool")]
    pub pool: crate::pool::PoolConfig,
}

impl AdapterConfig {
    /// Parse and validate a TOML configuration file's contents.
    pub fn from_toml_str(s: &str) -> OrmResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| OrmError::Config(format!("invalid config: {e}")))?;
        config.dialect.validate()?;
        #[cfg(feature = "pool")]
        config.pool.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        DialectConfig::default().validate().unwrap();
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = DialectConfig::from_toml_str(
            r#"
            identifier_case = "preserve"
            max_identifier_length = 30
            pagination = "row_num"
            placeholder_style = "named"
            translate_error = true
            "#,
        )
        .unwrap();
        assert_eq!(config.identifier_case, IdentifierCase::Preserve);
        assert_eq!(config.max_identifier_length, 30);
        assert_eq!(config.pagination, PaginationStyle::RowNum);
        assert_eq!(config.placeholder_style, PlaceholderStyle::Named);
        assert!(config.translate_error);
        assert_eq!(config.batch_size, 1_000);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(DialectConfig::new().max_identifier_length(10).validate().is_err());
        assert!(DialectConfig::new().batch_size(0).validate().is_err());
        assert!(DialectConfig::from_toml_str("timestamp_precision = 12").is_err());
        assert!(DialectConfig::from_toml_str("pagination = \"limit\"").is_err());
    }
}
