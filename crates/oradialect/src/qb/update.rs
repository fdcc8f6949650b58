//! UPDATE query builder using the unified expression layer.

use crate::config::DialectConfig;
use crate::error::{ErrorContext, OrmError, OrmResult};
use crate::placeholder::{Args, Emitter};
use crate::qb::expr::{Expr, ExprGroup};
use crate::qb::traits::MutationQb;
use crate::qb::{check_returning, encode_for, write_ident, write_returning};
use crate::schema::TableDescriptor;
use crate::statement::{ExecPlan, ResultShape, Statement};
use crate::types::TypeMapper;
use crate::value::{ToValue, Value};

/// SET field value type.
#[derive(Clone, Debug, PartialEq)]
enum SetField {
    /// Bound value
    Value(Value),
    /// Raw SQL expression
    Raw(String),
}

/// UPDATE query builder with expression-based WHERE.
///
/// An UPDATE without WHERE conditions is refused unless
/// [`allow_all`](Self::allow_all) is set or the dialect allows global
/// updates.
#[derive(Clone, Debug)]
pub struct UpdateQb {
    table: String,
    descriptor: Option<TableDescriptor>,
    set_fields: Vec<(String, SetField)>,
    where_group: ExprGroup,
    returning_cols: Vec<String>,
    allow_all: bool,
}

impl UpdateQb {
    /// Create a new UPDATE query builder.
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            descriptor: None,
            set_fields: Vec::new(),
            where_group: ExprGroup::new(),
            returning_cols: Vec::new(),
            allow_all: false,
        }
    }

    /// Update a described table; SET values are checked against its columns.
    pub fn for_table(table: &TableDescriptor) -> Self {
        Self {
            descriptor: Some(table.clone()),
            ..Self::new(&table.name)
        }
    }

    /// Set a column value.
    pub fn set(mut self, column: &str, value: impl ToValue) -> Self {
        self.set_fields
            .push((column.to_string(), SetField::Value(value.to_value())));
        self
    }

    /// Set an optional column value (None => skip).
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

    /// Set a column to a raw SQL expression, e.g. `count + 1`.
    pub fn set_raw(mut self, column: &str, expr: &str) -> Self {
        self.set_fields
            .push((column.to_string(), SetField::Raw(expr.to_string())));
        self
    }

    // ==================== WHERE conditions ====================

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

    pub fn is_null(mut self, column: &str) -> Self {
        self.where_group.is_null(column);
        self
    }

    pub fn is_not_null(mut self, column: &str) -> Self {
        self.where_group.is_not_null(column);
        self
    }

    /// Add a raw WHERE condition without params.
    pub fn raw(mut self, sql: &str) -> Self {
        self.where_group.raw(sql);
        self
    }

    /// Add a WHERE condition with `?` placeholders.
    pub fn where_template<T: ToValue>(mut self, sql: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.where_group.template(sql, values);
        self
    }

    pub fn and_expr(mut self, expr: Expr) -> Self {
        self.where_group.and_expr(expr);
        self
    }

    /// Allow an UPDATE without WHERE to touch every row.
    pub fn allow_all(mut self) -> Self {
        self.allow_all = true;
        self
    }

    /// Capture columns of the updated rows with `RETURNING ... INTO`.
    pub fn returning(mut self, cols: &[&str]) -> Self {
        self.returning_cols = cols.iter().map(|c| c.to_string()).collect();
        self
    }

    fn context(&self) -> ErrorContext {
        ErrorContext::new("update").table(self.table.clone())
    }

    fn build_update(&self, config: &DialectConfig) -> OrmResult<Statement> {
        if self.set_fields.is_empty() {
            return Err(OrmError::validation("UPDATE has no SET fields"));
        }
        if !self.where_group.restricts_rows() && !self.allow_all && !config.allow_global_update {
            return Err(OrmError::MissingWhereClause {
                context: self.context(),
            });
        }

        let mapper = TypeMapper::new(config);
        let mut out = Emitter::new(config);
        out.push_str("UPDATE ");
        write_ident(&mut out, &self.table)?;
        out.push_str(" SET ");
        for (i, (column, field)) in self.set_fields.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_ident(&mut out, column)?;
            out.push_str(" = ");
            match field {
                SetField::Value(v) => {
                    let v = encode_for(&mapper, self.descriptor.as_ref(), column, v.clone())?;
                    out.bind(v);
                }
                SetField::Raw(expr) => out.template(expr, &Args::new())?,
            }
        }
        if !self.where_group.is_empty() {
            out.push_str(" WHERE ");
            self.where_group.write(&mut out)?;
        }

        let shape = if self.returning_cols.is_empty() {
            ResultShape::RowsAffected
        } else {
            check_returning(&out, "UPDATE")?;
            // The number of updated rows is only known after execution.
            let outs = write_returning(&mut out, self.descriptor.as_ref(), &self.returning_cols, 0)?;
            ResultShape::Returning(outs)
        };

        let (sql, binds) = out.into_parts();
        Ok(Statement::new(sql, binds, shape)
            .operation("update")
            .table(self.table.clone()))
    }
}

impl MutationQb for UpdateQb {
    fn build_plan(&self, config: &DialectConfig) -> OrmResult<ExecPlan> {
        self.build_update(config)
            .map(ExecPlan::single)
            .map_err(|e| e.with_context(self.context()))
    }
}
