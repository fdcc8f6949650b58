//! MERGE-based upsert builder.
//!
//! Oracle has no `ON CONFLICT`; an upsert becomes
//!
//! ```text
//! MERGE INTO "T" t
//! USING (SELECT :1 "ID", :2 "NAME" FROM DUAL UNION ALL SELECT :3, :4 FROM DUAL) s
//! ON (t."ID" = s."ID")
//! WHEN MATCHED THEN UPDATE SET t."NAME" = s."NAME"
//! WHEN NOT MATCHED THEN INSERT ("ID", "NAME") VALUES (s."ID", s."NAME")
//! ```

use crate::config::DialectConfig;
use crate::error::{ErrorContext, OrmError, OrmResult};
use crate::placeholder::Emitter;
use crate::qb::insert::{RowSet, rows_per_statement};
use crate::qb::traits::MutationQb;
use crate::qb::write_ident;
use crate::schema::TableDescriptor;
use crate::statement::{ExecPlan, ResultShape, Statement};
use crate::value::{ToValue, Value};

/// Upsert builder matching source rows to target rows on key columns.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeQb {
    table: String,
    descriptor: Option<TableDescriptor>,
    keys: Vec<String>,
    values: RowSet,
    /// Columns overwritten on match; `None` means every non-key column.
    update_columns: Option<Vec<String>>,
    do_nothing: bool,
    returning: Vec<String>,
}

impl MergeQb {
    pub fn new(table: &str, keys: &[&str]) -> Self {
        Self {
            table: table.to_string(),
            descriptor: None,
            keys: keys.iter().map(|k| k.to_string()).collect(),
            values: RowSet::default(),
            update_columns: None,
            do_nothing: false,
            returning: Vec::new(),
        }
    }

    /// Upsert into a described table; values are checked against its columns.
    pub fn for_table(table: &TableDescriptor, keys: &[&str]) -> Self {
        Self {
            descriptor: Some(table.clone()),
            ..Self::new(&table.name, keys)
        }
    }

    /// Set a column value (single-row form).
    pub fn set(mut self, column: &str, value: impl ToValue) -> Self {
        self.values.set(column, value.to_value());
        self
    }

    /// Declare the columns of a multi-row upsert.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.values.columns(columns);
        self
    }

    /// Add one row of values, in [`columns`](Self::columns) order.
    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.values.row(values);
        self
    }

    pub fn rows(mut self, rows: impl IntoIterator<Item = Vec<Value>>) -> Self {
        for row in rows {
            self.values.row(row);
        }
        self
    }

    /// Only overwrite these columns when a row matches.
    pub fn update_columns(mut self, columns: &[&str]) -> Self {
        self.update_columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Leave matching rows untouched; only insert missing ones.
    pub fn do_nothing(mut self) -> Self {
        self.do_nothing = true;
        self
    }

    /// Oracle cannot return rows from MERGE; building fails when this is set.
    pub fn returning(mut self, columns: &[&str]) -> Self {
        self.returning = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    fn context(&self) -> ErrorContext {
        ErrorContext::new("merge").table(self.table.clone())
    }

    fn is_key(&self, column: &str) -> bool {
        self.keys.iter().any(|k| k.eq_ignore_ascii_case(column))
    }

    /// Columns assigned in the MATCHED branch.
    fn update_set(&self) -> OrmResult<Vec<&String>> {
        if self.do_nothing {
            return Ok(Vec::new());
        }
        match &self.update_columns {
            None => Ok(self
                .values
                .columns
                .iter()
                .filter(|c| !self.is_key(c))
                .collect()),
            Some(cols) => {
                let mut set = Vec::with_capacity(cols.len());
                for col in cols {
                    if self.is_key(col) {
                        return Err(OrmError::validation(format!(
                            "MERGE: key column '{col}' cannot be updated"
                        )));
                    }
                    let declared = self
                        .values
                        .columns
                        .iter()
                        .find(|c| c.eq_ignore_ascii_case(col))
                        .ok_or_else(|| {
                            OrmError::validation(format!(
                                "MERGE: update column '{col}' has no value"
                            ))
                        })?;
                    set.push(declared);
                }
                Ok(set)
            }
        }
    }

    fn write_prefixed(out: &mut Emitter<'_>, prefix: &str, column: &str) -> OrmResult<()> {
        out.push_str(prefix);
        out.push('.');
        write_ident(out, column)
    }

    fn build_chunk(
        &self,
        config: &DialectConfig,
        rows: &[Vec<Value>],
        update_set: &[&String],
    ) -> OrmResult<Statement> {
        let columns = &self.values.columns;
        let mut out = Emitter::new(config);
        out.push_str("MERGE INTO ");
        write_ident(&mut out, &self.table)?;
        out.push_str(" t USING (");
        for (i, row) in rows.iter().enumerate() {
            out.push_str(if i == 0 { "SELECT " } else { " UNION ALL SELECT " });
            for (j, (value, column)) in row.iter().zip(columns).enumerate() {
                if j > 0 {
                    out.push_str(", ");
                }
                out.bind(value.clone());
                if i == 0 {
                    out.push(' ');
                    write_ident(&mut out, column)?;
                }
            }
            out.push_str(" FROM DUAL");
        }
        out.push_str(") s ON (");
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                out.push_str(" AND ");
            }
            Self::write_prefixed(&mut out, "t", key)?;
            out.push_str(" = ");
            Self::write_prefixed(&mut out, "s", key)?;
        }
        out.push(')');

        if !update_set.is_empty() {
            out.push_str(" WHEN MATCHED THEN UPDATE SET ");
            for (i, column) in update_set.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                Self::write_prefixed(&mut out, "t", column)?;
                out.push_str(" = ");
                Self::write_prefixed(&mut out, "s", column)?;
            }
        }

        out.push_str(" WHEN NOT MATCHED THEN INSERT (");
        self.values.write_columns(&mut out)?;
        out.push_str(") VALUES (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            Self::write_prefixed(&mut out, "s", column)?;
        }
        out.push(')');

        let (sql, binds) = out.into_parts();
        Ok(Statement::new(sql, binds, ResultShape::RowsAffected)
            .operation("merge")
            .table(self.table.clone()))
    }

    fn plan(&self, config: &DialectConfig) -> OrmResult<ExecPlan> {
        if !self.returning.is_empty() {
            return Err(OrmError::translation(
                "RETURNING is not supported on MERGE; query the rows after the upsert",
            ));
        }
        if self.keys.is_empty() {
            return Err(OrmError::validation("MERGE needs at least one key column"));
        }
        self.values.validate("MERGE")?;
        if let Some(key) = self
            .keys
            .iter()
            .find(|k| !self.values.columns.iter().any(|c| c.eq_ignore_ascii_case(k)))
        {
            return Err(OrmError::validation(format!(
                "MERGE: key column '{key}' has no value"
            )));
        }
        let update_set = self.update_set()?;
        let rows = self.values.encode(config, self.descriptor.as_ref())?;
        let per = rows_per_statement(config, self.values.columns.len())?;
        let statements = rows
            .chunks(per)
            .map(|chunk| self.build_chunk(config, chunk, &update_set))
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(ExecPlan::new(statements))
    }
}

impl MutationQb for MergeQb {
    fn build_plan(&self, config: &DialectConfig) -> OrmResult<ExecPlan> {
        self.plan(config).map_err(|e| e.with_context(self.context()))
    }
}
