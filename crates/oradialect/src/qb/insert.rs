//! INSERT query builder.
//!
//! Oracle has no multi-row `VALUES` list, so several rows are inserted as
//! `INSERT INTO t (..) SELECT :1, :2 FROM DUAL UNION ALL SELECT ...`, split
//! into sub-batches that respect the bind-parameter limit. RETURNING over
//! several rows uses array DML when the driver supports it, otherwise one
//! statement per row inside one transaction.

use crate::config::DialectConfig;
use crate::error::{ErrorContext, OrmError, OrmResult};
use crate::placeholder::Emitter;
use crate::qb::traits::MutationQb;
use crate::qb::{check_returning, encode_for, write_ident, write_returning};
use crate::schema::TableDescriptor;
use crate::statement::{Binds, ExecPlan, ResultShape, ReturningMode, Statement};
use crate::types::TypeMapper;
use crate::value::{ToValue, Value};

/// Columns plus one or more rows of values.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RowSet {
    pub(crate) columns: Vec<String>,
    pub(crate) rows: Vec<Vec<Value>>,
    multi: bool,
    error: Option<String>,
}

impl RowSet {
    /// Add a column to the single row.
    pub(crate) fn set(&mut self, column: &str, value: Value) {
        if self.multi {
            self.error
                .get_or_insert_with(|| "set() cannot be mixed with columns()/row()".to_string());
            return;
        }
        if self.rows.is_empty() {
            self.rows.push(Vec::new());
        }
        self.columns.push(column.to_string());
        self.rows[0].push(value);
    }

    pub(crate) fn columns(&mut self, columns: &[&str]) {
        if !self.multi && !self.rows.is_empty() {
            self.error
                .get_or_insert_with(|| "columns() cannot be mixed with set()".to_string());
            return;
        }
        self.multi = true;
        self.columns = columns.iter().map(|c| c.to_string()).collect();
    }

    pub(crate) fn row(&mut self, values: Vec<Value>) {
        if !self.multi && !self.rows.is_empty() {
            self.error
                .get_or_insert_with(|| "row() cannot be mixed with set()".to_string());
            return;
        }
        self.multi = true;
        self.rows.push(values);
    }

    pub(crate) fn validate(&self, operation: &str) -> OrmResult<()> {
        if let Some(err) = &self.error {
            return Err(OrmError::validation(format!("{operation}: {err}")));
        }
        if self.columns.is_empty() {
            return Err(OrmError::translation(format!(
                "{operation} needs at least one column"
            )));
        }
        if self.rows.is_empty() {
            return Err(OrmError::validation(format!("{operation} has no rows")));
        }
        for (i, c) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|p| p.eq_ignore_ascii_case(c)) {
                return Err(OrmError::validation(format!(
                    "{operation}: column '{c}' is listed twice"
                )));
            }
        }
        if let Some((i, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != self.columns.len())
        {
            return Err(OrmError::validation(format!(
                "{operation}: row {i} has {} values for {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        Ok(())
    }

    /// Encode every value for its column.
    pub(crate) fn encode(
        &self,
        config: &DialectConfig,
        descriptor: Option<&TableDescriptor>,
    ) -> OrmResult<Vec<Vec<Value>>> {
        let mapper = TypeMapper::new(config);
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.columns)
                    .map(|(v, c)| encode_for(&mapper, descriptor, c, v.clone()))
                    .collect()
            })
            .collect()
    }

    pub(crate) fn write_columns(&self, out: &mut Emitter<'_>) -> OrmResult<()> {
        for (i, c) in self.columns.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_ident(out, c)?;
        }
        Ok(())
    }
}

/// Rows per sub-batch so that one statement stays under the bind limit.
pub(crate) fn rows_per_statement(config: &DialectConfig, width: usize) -> OrmResult<usize> {
    if width > config.max_bind_params {
        return Err(OrmError::translation(format!(
            "{width} columns exceed the limit of {} bind parameters per statement",
            config.max_bind_params
        )));
    }
    Ok(config
        .batch_size
        .min(config.max_bind_params / width.max(1))
        .max(1))
}

fn write_binds(out: &mut Emitter<'_>, values: &[Value]) {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.bind(v.clone());
    }
}

/// INSERT query builder.
#[derive(Clone, Debug, PartialEq)]
pub struct InsertQb {
    table: String,
    descriptor: Option<TableDescriptor>,
    values: RowSet,
    returning: Vec<String>,
}

impl InsertQb {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            descriptor: None,
            values: RowSet::default(),
            returning: Vec::new(),
        }
    }

    /// Insert into a described table; values are checked against its columns.
    pub fn for_table(table: &TableDescriptor) -> Self {
        Self {
            table: table.name.clone(),
            descriptor: Some(table.clone()),
            values: RowSet::default(),
            returning: Vec::new(),
        }
    }

    /// Set a column value (single-row form).
    pub fn set(mut self, column: &str, value: impl ToValue) -> Self {
        self.values.set(column, value.to_value());
        self
    }

    /// Set an optional column value (None => skip, leaving the default).
    pub fn set_opt<T: ToValue>(self, column: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Set a JSON column.
    pub fn set_json<T: serde::Serialize>(self, column: &str, value: &T) -> OrmResult<Self> {
        let json = serde_json::to_string(value)
            .map_err(|e| OrmError::data(format!("cannot serialize JSON for '{column}': {e}")))?;
        Ok(self.set(column, json))
    }

    /// Declare the columns of a multi-row insert.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.values.columns(columns);
        self
    }

    /// Add one row of values, in [`columns`](Self::columns) order.
    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.values.row(values);
        self
    }

    /// Add several rows.
    pub fn rows(mut self, rows: impl IntoIterator<Item = Vec<Value>>) -> Self {
        for row in rows {
            self.values.row(row);
        }
        self
    }

    /// Capture columns of the inserted rows with `RETURNING ... INTO`.
    pub fn returning(mut self, columns: &[&str]) -> Self {
        self.returning = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    fn context(&self) -> ErrorContext {
        ErrorContext::new("insert").table(self.table.clone())
    }

    fn statement(&self, out: Emitter<'_>, shape: Option<ResultShape>) -> Statement {
        let (sql, binds) = out.into_parts();
        Statement::new(sql, binds, shape.unwrap_or_default())
            .operation("insert")
            .table(self.table.clone())
    }

    fn write_head(&self, out: &mut Emitter<'_>) -> OrmResult<()> {
        out.push_str("INSERT INTO ");
        write_ident(out, &self.table)?;
        out.push_str(" (");
        self.values.write_columns(out)?;
        out.push(')');
        Ok(())
    }

    /// `INSERT INTO t (..) VALUES (..) [RETURNING .. INTO ..]` for one row.
    fn single_row(
        &self,
        config: &DialectConfig,
        row: &[Value],
        returning_rows: usize,
    ) -> OrmResult<Statement> {
        let mut out = Emitter::new(config);
        self.write_head(&mut out)?;
        out.push_str(" VALUES (");
        write_binds(&mut out, row);
        out.push(')');
        let shape = if self.returning.is_empty() {
            None
        } else {
            let outs = write_returning(
                &mut out,
                self.descriptor.as_ref(),
                &self.returning,
                returning_rows,
            )?;
            Some(ResultShape::Returning(outs))
        };
        Ok(self.statement(out, shape))
    }

    fn union_all(&self, config: &DialectConfig, rows: &[Vec<Value>]) -> OrmResult<Statement> {
        let mut out = Emitter::new(config);
        self.write_head(&mut out)?;
        for (i, row) in rows.iter().enumerate() {
            out.push_str(if i == 0 { " SELECT " } else { " UNION ALL SELECT " });
            write_binds(&mut out, row);
            out.push_str(" FROM DUAL");
        }
        Ok(self.statement(out, None))
    }

    fn plan(&self, config: &DialectConfig) -> OrmResult<ExecPlan> {
        self.values.validate("INSERT")?;
        if !self.returning.is_empty() {
            let probe = Emitter::new(config);
            check_returning(&probe, "INSERT")?;
        }
        let rows = self.values.encode(config, self.descriptor.as_ref())?;
        let n = rows.len();
        let width = self.values.columns.len();

        if self.returning.is_empty() {
            if n == 1 {
                return Ok(ExecPlan::single(self.single_row(config, &rows[0], 0)?));
            }
            let per = rows_per_statement(config, width)?;
            let statements = rows
                .chunks(per)
                .map(|chunk| self.union_all(config, chunk))
                .collect::<OrmResult<Vec<_>>>()?;
            return Ok(ExecPlan::new(statements));
        }

        if n == 1 {
            let mode = if config.bulk_returning {
                ReturningMode::Bulk
            } else {
                ReturningMode::PerRow
            };
            let statement = self.single_row(config, &rows[0], 1)?;
            return Ok(ExecPlan::single(statement).returning(mode, 1));
        }

        if config.bulk_returning {
            // Array DML: one statement per sub-batch, binds one row per execution.
            let mut statements = Vec::new();
            let mut offset = 0;
            for chunk in rows.chunks(config.batch_size) {
                let mut statement = self.single_row(config, &chunk[0], chunk.len())?;
                statement.binds = Binds::Batch(chunk.to_vec());
                statements.push(statement.input_offset(offset));
                offset += chunk.len();
            }
            let mut plan = ExecPlan::new(statements).returning(ReturningMode::Bulk, n);
            plan.atomic = true;
            Ok(plan)
        } else {
            let statements = rows
                .iter()
                .enumerate()
                .map(|(i, row)| Ok(self.single_row(config, row, 1)?.input_offset(i)))
                .collect::<OrmResult<Vec<_>>>()?;
            let mut plan = ExecPlan::new(statements).returning(ReturningMode::PerRow, n);
            plan.atomic = true;
            Ok(plan)
        }
    }
}

impl MutationQb for InsertQb {
    fn build_plan(&self, config: &DialectConfig) -> OrmResult<ExecPlan> {
        self.plan(config).map_err(|e| e.with_context(self.context()))
    }
}
