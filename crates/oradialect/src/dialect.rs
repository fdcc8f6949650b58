//! The dialect handle an ORM core talks to.

use crate::classify;
use crate::client::GenericClient;
use crate::config::DialectConfig;
use crate::error::{OrmError, OrmResult};
use crate::ident;
use crate::migrate::Migrator;
use crate::qb::{DeleteQb, InsertQb, MergeQb, MutationQb, SelectQb, SqlQb, UpdateQb};
use crate::query::RawSql;
use crate::schema::ColumnDescriptor;
use crate::statement::ExecPlan;
use crate::types::{ColumnType, TypeMapper};
use std::sync::Arc;

/// A declarative statement the dialect can assemble into native SQL.
pub trait Translate {
    fn translate(&self, config: &DialectConfig) -> OrmResult<ExecPlan>;
}

impl Translate for SelectQb {
    fn translate(&self, config: &DialectConfig) -> OrmResult<ExecPlan> {
        Ok(ExecPlan::single(self.build(config)?))
    }
}

impl Translate for RawSql {
    fn translate(&self, config: &DialectConfig) -> OrmResult<ExecPlan> {
        Ok(ExecPlan::single(self.build(config)?))
    }
}

macro_rules! translate_via_plan {
    ($($t:ty),*) => {
        $(impl Translate for $t {
            fn translate(&self, config: &DialectConfig) -> OrmResult<ExecPlan> {
                self.build_plan(config)
            }
        })*
    };
}

translate_via_plan!(InsertQb, UpdateQb, DeleteQb, MergeQb);

/// Immutable, cheaply cloned dialect handle.
///
/// # Example
///
/// ```ignore
/// use oradialect::{Dialect, DialectConfig, qb};
///
/// let dialect = Dialect::new(DialectConfig::default().translate_error(true));
/// let plan = dialect.translate_statement(&qb::select("users").eq("id", 1).limit(1))?;
/// let migrator = dialect.migrator(&conn);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dialect {
    config: Arc<DialectConfig>,
}

impl Dialect {
    pub fn new(config: DialectConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Validate the configuration before building the handle.
    pub fn try_new(config: DialectConfig) -> OrmResult<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn name(&self) -> &'static str {
        "oracle"
    }

    pub fn config(&self) -> &DialectConfig {
        &self.config
    }

    /// Assemble a native statement (or statements) from a declarative one.
    pub fn translate_statement(&self, statement: &impl Translate) -> OrmResult<ExecPlan> {
        statement.translate(&self.config)
    }

    /// Quote a (possibly qualified) identifier per the case policy.
    pub fn quote_identifier(&self, name: &str) -> OrmResult<String> {
        ident::quote_identifier(name, &self.config)
    }

    /// Native column type of a declared field.
    pub fn data_type_of(&self, column: &ColumnDescriptor) -> OrmResult<ColumnType> {
        TypeMapper::new(&self.config).data_type_of(column)
    }

    pub fn type_mapper(&self) -> TypeMapper<'_> {
        TypeMapper::new(&self.config)
    }

    /// A migrator running on `client`.
    pub fn migrator<'a, C: GenericClient>(&'a self, client: &'a C) -> Migrator<'a, C> {
        Migrator::new(&self.config, client)
    }

    /// An executor running on `client`.
    pub fn executor<'a, C: GenericClient>(&'a self, client: &'a C) -> crate::exec::Executor<'a, C> {
        crate::exec::Executor::new(&self.config, client)
    }

    /// Classify a native error when `translate_error` is enabled; otherwise
    /// return it unchanged.
    pub fn translate_error(&self, err: OrmError) -> OrmError {
        if self.config.translate_error {
            classify::translate(err)
        } else {
            err
        }
    }
}
