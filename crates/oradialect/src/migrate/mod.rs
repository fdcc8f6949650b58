//! Schema migration: reconcile declared tables with the live schema.
//!
//! Each declared table moves through [`TableState`]: an absent table is
//! created, a present one is altered by adding what is missing and widening
//! what is too small. Nothing is dropped or narrowed implicitly; those changes
//! are reported in [`MigrationReport::skipped`] and need one of the explicit
//! calls ([`Migrator::drop_column`], [`Migrator::alter_column`], ...).
//!
//! Running a migration twice against the same declarations emits no DDL the
//! second time. Concurrent migrations of the same tables are not coordinated.
//!
//! # Example
//!
//! ```ignore
//! use oradialect::{Dialect, DialectConfig};
//!
//! let dialect = Dialect::new(DialectConfig::default());
//! let report = dialect.migrator(&client).auto_migrate(&[users, orders]).await?;
//! for change in &report.skipped {
//!     println!("{}.{}: {}", change.table, change.column, change.reason);
//! }
//! ```

mod ddl;
mod diff;
mod introspect;

pub use ddl::{DdlKind, DdlStep};
pub use diff::{ColumnInfo, LiveTable, SkippedChange};

use crate::classify::{is_absent_on_drop, is_present_on_create};
use crate::client::GenericClient;
use crate::config::DialectConfig;
use crate::error::{ErrorContext, OrmError, OrmResult};
use crate::exec::{CallOptions, Executor};
use crate::ident::{quote_identifier, stored_name};
use crate::placeholder::native_markers;
use crate::schema::TableDescriptor;
use crate::statement::Statement;
use crate::types::TypeMapper;
use introspect::StoredTable;

/// Lifecycle of one table during a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    Absent,
    Creating,
    Present,
    Altering,
}

/// The DDL a migration would run, computed without changing anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub steps: Vec<DdlStep>,
    pub skipped: Vec<SkippedChange>,
    /// Target state of every declared table.
    pub tables: Vec<(String, TableState)>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The statements as a script, one per line.
    pub fn to_sql(&self) -> String {
        self.steps
            .iter()
            .map(|s| format!("{};\n", s.sql.trim_end_matches(';')))
            .collect()
    }
}

/// What a migration did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// DDL that ran successfully.
    pub executed: Vec<String>,
    /// DDL whose object was already in the requested state.
    pub tolerated: Vec<String>,
    pub skipped: Vec<SkippedChange>,
}

/// Runs migrations and schema queries over one client.
pub struct Migrator<'a, C: GenericClient> {
    exec: Executor<'a, C>,
}

impl<'a, C: GenericClient> Migrator<'a, C> {
    pub fn new(config: &'a DialectConfig, client: &'a C) -> Self {
        Self {
            exec: Executor::new(config, client),
        }
    }

    /// Apply a deadline or cancellation signal to every statement.
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.exec = self.exec.with_options(options);
        self
    }

    fn config(&self) -> &'a DialectConfig {
        self.exec.config()
    }

    fn stored(&self, table: &str) -> OrmResult<StoredTable> {
        StoredTable::parse(table, self.config())
    }

    /// Check every declaration before any DDL runs.
    fn validate(&self, tables: &[TableDescriptor]) -> OrmResult<()> {
        let mapper = TypeMapper::new(self.config());
        for table in tables {
            let ctx = || ErrorContext::new("migrate").table(table.name.clone());
            table.validate().map_err(|e| e.with_context(ctx()))?;
            for column in &table.columns {
                mapper
                    .data_type_of(column)
                    .map_err(|e| e.with_context(ctx().column(column.name.clone())))?;
            }
            for fk in &table.foreign_keys {
                ddl::check_foreign_key(table, fk)?;
            }
        }
        Ok(())
    }

    /// Compute the DDL `auto_migrate` would run (dry run).
    pub async fn plan(&self, tables: &[TableDescriptor]) -> OrmResult<MigrationPlan> {
        self.validate(tables)?;
        let config = self.config();
        let mut plan = MigrationPlan::default();
        let mut foreign_keys = Vec::new();

        for table in tables {
            let stored = self.stored(&table.name)?;
            let with_comments =
                table.comment.is_some() || table.columns.iter().any(|c| c.comment.is_some());
            let live = introspect::live_table(&self.exec, &stored, with_comments).await?;

            let state = match &live {
                None => {
                    tracing::debug!(
                        target: "oradialect.migrate",
                        table = %table.name,
                        "table state Absent -> Creating"
                    );
                    plan.steps.extend(ddl::create_table(table, config)?);
                    TableState::Creating
                }
                Some(live) => {
                    let (steps, skipped) = diff::diff_table(table, live, config)?;
                    plan.skipped.extend(skipped);
                    if steps.is_empty() {
                        TableState::Present
                    } else {
                        tracing::debug!(
                            target: "oradialect.migrate",
                            table = %table.name,
                            steps = steps.len(),
                            "table state Present -> Altering"
                        );
                        plan.steps.extend(steps);
                        TableState::Altering
                    }
                }
            };
            plan.tables.push((table.name.clone(), state));

            for fk in &table.foreign_keys {
                let exists = match &live {
                    Some(live) => live.has_constraint(&stored_name(&fk.name, config)?),
                    None => false,
                };
                if !exists {
                    foreign_keys.push(ddl::add_foreign_key(table, fk, config)?);
                }
            }
        }

        // Foreign keys go last so tables referencing each other can be created
        // in one batch.
        plan.steps.extend(foreign_keys);
        Ok(plan)
    }

    /// Create missing tables and bring existing ones up to their declaration.
    pub async fn auto_migrate(&self, tables: &[TableDescriptor]) -> OrmResult<MigrationReport> {
        let plan = self.plan(tables).await?;
        let mut report = self.apply(&plan.steps).await?;
        report.skipped = plan.skipped;
        for (table, state) in &plan.tables {
            if *state != TableState::Present {
                tracing::debug!(
                    target: "oradialect.migrate",
                    table = %table,
                    from = ?state,
                    "table state -> Present"
                );
            }
        }
        Ok(report)
    }

    /// Run DDL steps in order, absorbing "already done" errors.
    pub async fn apply(&self, steps: &[DdlStep]) -> OrmResult<MigrationReport> {
        let mut report = MigrationReport::default();
        for step in steps {
            let statement = Statement::ddl(step.sql.clone()).table(step.table.clone());
            tracing::info!(target: "oradialect.migrate", table = %step.table, sql = %step.sql, "running DDL");
            match self.exec.execute(&statement).await {
                Ok(_) => report.executed.push(step.sql.clone()),
                Err(err) if tolerated(step.kind, &err) => {
                    tracing::warn!(
                        target: "oradialect.migrate",
                        table = %step.table,
                        code = ?err.native_code(),
                        sql = %step.sql,
                        "object already in requested state"
                    );
                    report.tolerated.push(step.sql.clone());
                }
                Err(err @ (OrmError::Timeout(_) | OrmError::Cancelled | OrmError::Pool(_))) => {
                    return Err(err);
                }
                Err(err) => {
                    return Err(OrmError::Migration {
                        message: format!("{}: {err}", step.sql),
                        context: ErrorContext::new("migrate").table(step.table.clone()),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn run_one(&self, step: DdlStep) -> OrmResult<MigrationReport> {
        self.apply(std::slice::from_ref(&step)).await
    }

    // ==================== Schema queries ====================

    pub async fn has_table(&self, table: &str) -> OrmResult<bool> {
        let stored = self.stored(table)?;
        introspect::table_exists(&self.exec, &stored).await
    }

    pub async fn has_column(&self, table: &str, column: &str) -> OrmResult<bool> {
        let stored = self.stored(table)?;
        let column = stored_name(column, self.config())?;
        Ok(introspect::columns(&self.exec, &stored)
            .await?
            .iter()
            .any(|c| c.name == column))
    }

    pub async fn has_index(&self, table: &str, index: &str) -> OrmResult<bool> {
        let stored = self.stored(table)?;
        let index = stored_name(index, self.config())?;
        Ok(introspect::index_names(&self.exec, &stored)
            .await?
            .contains(&index))
    }

    pub async fn has_constraint(&self, table: &str, constraint: &str) -> OrmResult<bool> {
        let stored = self.stored(table)?;
        let constraint = stored_name(constraint, self.config())?;
        Ok(introspect::constraint_names(&self.exec, &stored)
            .await?
            .contains(&constraint))
    }

    /// Live columns of a table, in declaration order.
    pub async fn column_types(&self, table: &str) -> OrmResult<Vec<ColumnInfo>> {
        let stored = self.stored(table)?;
        introspect::columns(&self.exec, &stored).await
    }

    pub async fn get_tables(&self) -> OrmResult<Vec<String>> {
        introspect::table_names(&self.exec).await
    }

    pub async fn current_schema(&self) -> OrmResult<String> {
        introspect::current_schema(&self.exec).await
    }

    // ==================== Explicit changes ====================

    pub async fn rename_table(&self, from: &str, to: &str) -> OrmResult<MigrationReport> {
        let config = self.config();
        let sql = format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_identifier(from, config)?,
            quote_identifier(to, config)?
        );
        self.run_one(DdlStep::alter(from, sql)).await
    }

    pub async fn rename_column(&self, table: &str, from: &str, to: &str) -> OrmResult<MigrationReport> {
        let config = self.config();
        let sql = format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            quote_identifier(table, config)?,
            quote_identifier(from, config)?,
            quote_identifier(to, config)?
        );
        self.run_one(DdlStep::alter(table, sql)).await
    }

    pub async fn rename_index(&self, table: &str, from: &str, to: &str) -> OrmResult<MigrationReport> {
        let config = self.config();
        let sql = format!(
            "ALTER INDEX {} RENAME TO {}",
            quote_identifier(from, config)?,
            quote_identifier(to, config)?
        );
        self.run_one(DdlStep::alter(table, sql)).await
    }

    /// Create (or replace) a view over a trusted query. The query may not
    /// carry bind markers.
    pub async fn create_view(&self, name: &str, query: &str, replace: bool) -> OrmResult<MigrationReport> {
        if !native_markers(query)?.is_empty() || query.contains('?') {
            return Err(OrmError::translation("a view query cannot take bind parameters"));
        }
        let sql = format!(
            "CREATE {}VIEW {} AS {}",
            if replace { "OR REPLACE " } else { "" },
            quote_identifier(name, self.config())?,
            query.trim()
        );
        self.run_one(DdlStep::create(name, sql)).await
    }

    pub async fn drop_view(&self, name: &str) -> OrmResult<MigrationReport> {
        let sql = format!("DROP VIEW {}", quote_identifier(name, self.config())?);
        self.run_one(DdlStep::drop(name, sql)).await
    }

    /// Drop a table with its constraints, then its identity sequences.
    pub async fn drop_table(&self, table: &TableDescriptor) -> OrmResult<MigrationReport> {
        let config = self.config();
        let mut steps = vec![DdlStep::drop(
            &table.name,
            format!(
                "DROP TABLE {} CASCADE CONSTRAINTS",
                quote_identifier(&table.name, config)?
            ),
        )];
        for column in table.identity_columns() {
            let seq = ddl::sequence_name(&table.name, &column.name, config)?;
            steps.push(DdlStep::drop(&table.name, format!("DROP SEQUENCE \"{seq}\"")));
        }
        self.apply(&steps).await
    }

    pub async fn drop_column(&self, table: &str, column: &str) -> OrmResult<MigrationReport> {
        let config = self.config();
        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_identifier(table, config)?,
            quote_identifier(column, config)?
        );
        self.run_one(DdlStep::drop(table, sql)).await
    }

    /// Force a column to its declared type and nullability, even when that
    /// narrows it.
    pub async fn alter_column(&self, table: &TableDescriptor, column: &str) -> OrmResult<MigrationReport> {
        let config = self.config();
        let declared = table.find_column(column).ok_or_else(|| {
            OrmError::validation(format!(
                "table '{}' declares no column '{column}'",
                table.name
            ))
        })?;
        let column_type = TypeMapper::new(config).data_type_of(declared)?;
        let mut steps = vec![ddl::modify_type(table, declared, &column_type, config)?];
        let stored = self.stored(&table.name)?;
        let column_name = stored_name(&declared.name, config)?;
        let live_nullable = introspect::columns(&self.exec, &stored)
            .await?
            .into_iter()
            .find(|c| c.name == column_name)
            .map(|c| c.nullable);
        let nullable = ddl::effective_nullable(table, declared);
        if live_nullable.is_some_and(|live| live != nullable) {
            steps.push(ddl::modify_nullable(table, declared, nullable, config)?);
        }
        self.apply(&steps).await
    }

    pub async fn drop_index(&self, table: &str, index: &str) -> OrmResult<MigrationReport> {
        let sql = format!("DROP INDEX {}", quote_identifier(index, self.config())?);
        self.run_one(DdlStep::drop(table, sql)).await
    }

    pub async fn drop_constraint(&self, table: &str, constraint: &str) -> OrmResult<MigrationReport> {
        let config = self.config();
        let sql = format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            quote_identifier(table, config)?,
            quote_identifier(constraint, config)?
        );
        self.run_one(DdlStep::drop(table, sql)).await
    }
}

fn tolerated(kind: DdlKind, err: &OrmError) -> bool {
    match kind {
        DdlKind::Create | DdlKind::Alter => is_present_on_create(err),
        DdlKind::Drop => is_absent_on_drop(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;

    #[test]
    fn tolerated_codes_depend_on_kind() {
        let exists = OrmError::database(DbError::new(955, "ORA-00955: name is already used"));
        let missing = OrmError::database(DbError::new(942, "ORA-00942: table or view does not exist"));
        assert!(tolerated(DdlKind::Create, &exists));
        assert!(!tolerated(DdlKind::Drop, &exists));
        assert!(tolerated(DdlKind::Drop, &missing));
        assert!(!tolerated(DdlKind::Create, &missing));

        let no_code = OrmError::database(DbError::without_code("table does not exist"));
        assert!(!tolerated(DdlKind::Drop, &no_code));

        let indexed = OrmError::database(DbError::new(1408, "ORA-01408: such column list already indexed"));
        let second_pk = OrmError::database(DbError::new(2260, "ORA-02260: table can have only one primary key"));
        assert!(!tolerated(DdlKind::Create, &indexed));
        assert!(!tolerated(DdlKind::Create, &second_pk));
    }

    #[test]
    fn plan_renders_a_script() {
        let plan = MigrationPlan {
            steps: vec![
                DdlStep::create("t", "CREATE TABLE \"T\" (\"A\" NUMBER(10))".into()),
                DdlStep::create("t", "CREATE OR REPLACE TRIGGER X BEFORE INSERT ON T FOR EACH ROW BEGIN NULL; END;".into()),
            ],
            ..MigrationPlan::default()
        };
        assert_eq!(
            plan.to_sql(),
            "CREATE TABLE \"T\" (\"A\" NUMBER(10));\nCREATE OR REPLACE TRIGGER X BEFORE INSERT ON T FOR EACH ROW BEGIN NULL; END;\n"
        );
    }
}
