//! DELETE query builder using the unified expression layer.

use crate::config::DialectConfig;
use crate::error::{ErrorContext, OrmError, OrmResult};
use crate::placeholder::Emitter;
use crate::qb::expr::{Expr, ExprGroup};
use crate::qb::traits::MutationQb;
use crate::qb::{check_returning, write_ident, write_returning};
use crate::statement::{ExecPlan, ResultShape, Statement};
use crate::value::ToValue;

/// DELETE query builder with expression-based WHERE.
#[derive(Clone, Debug)]
pub struct DeleteQb {
    table: String,
    where_group: ExprGroup,
    returning_cols: Vec<String>,
    /// Whether to allow DELETE without WHERE
    allow_all: bool,
}

impl DeleteQb {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            where_group: ExprGroup::new(),
            returning_cols: Vec::new(),
            allow_all: false,
        }
    }

    /// Allow a DELETE without WHERE to remove every row.
    pub fn allow_all(mut self) -> Self {
        self.allow_all = true;
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToValue) -> Self {
        self.where_group.eq(column, value);
        self
    }

    pub fn ne(mut self, column: &str, value: impl ToValue) -> Self {
        self.where_group.ne(column, value);
        self
    }

    pub fn gt(mut self, column: &str, value: impl ToValue) -> Self {
        self.where_group.gt(column, value);
        self
    }

    pub fn gte(mut self, column: &str, value: impl ToValue) -> Self {
        self.where_group.gte(column, value);
        self
    }

    pub fn lt(mut self, column: &str, value: impl ToValue) -> Self {
        self.where_group.lt(column, value);
        self
    }

    pub fn lte(mut self, column: &str, value: impl ToValue) -> Self {
        self.where_group.lte(column, value);
        self
    }

    pub fn in_list<T: ToValue>(mut self, column: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.where_group.in_list(column, values);
        self
    }

    pub fn not_in<T: ToValue>(mut self, column: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.where_group.not_in(column, values);
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.where_group.is_null(column);
        self
    }

    pub fn is_not_null(mut self, column: &str) -> Self {
        self.where_group.is_not_null(column);
        self
    }

    pub fn raw(mut self, sql: &str) -> Self {
        self.where_group.raw(sql);
        self
    }

    pub fn where_template<T: ToValue>(mut self, sql: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.where_group.template(sql, values);
        self
    }

    pub fn and_expr(mut self, expr: Expr) -> Self {
        self.where_group.and_expr(expr);
        self
    }

    /// Capture columns of the deleted rows with `RETURNING ... INTO`.
    pub fn returning(mut self, cols: &[&str]) -> Self {
        self.returning_cols = cols.iter().map(|c| c.to_string()).collect();
        self
    }

    fn context(&self) -> ErrorContext {
        ErrorContext::new("delete").table(self.table.clone())
    }

    fn build_delete(&self, config: &DialectConfig) -> OrmResult<Statement> {
        if !self.where_group.restricts_rows() && !self.allow_all && !config.allow_global_update {
            return Err(OrmError::MissingWhereClause {
                context: self.context(),
            });
        }

        let mut out = Emitter::new(config);
        out.push_str("DELETE FROM ");
        write_ident(&mut out, &self.table)?;
        if !self.where_group.is_empty() {
            out.push_str(" WHERE ");
            self.where_group.write(&mut out)?;
        }

        let shape = if self.returning_cols.is_empty() {
            ResultShape::RowsAffected
        } else {
            check_returning(&out, "DELETE")?;
            ResultShape::Returning(write_returning(&mut out, None, &self.returning_cols, 0)?)
        };

        let (sql, binds) = out.into_parts();
        Ok(Statement::new(sql, binds, shape)
            .operation("delete")
            .table(self.table.clone()))
    }
}

impl MutationQb for DeleteQb {
    fn build_plan(&self, config: &DialectConfig) -> OrmResult<ExecPlan> {
        self.build_delete(config)
            .map(ExecPlan::single)
            .map_err(|e| e.with_context(self.context()))
    }
}
