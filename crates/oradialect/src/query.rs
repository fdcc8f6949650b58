//! Hand-written SQL with portable markers.

use crate::config::DialectConfig;
use crate::error::OrmResult;
use crate::placeholder::{Args, translate};
use crate::qb::{MutationQb, SqlQb};
use crate::statement::{ExecPlan, ResultShape, Statement};
use crate::value::ToValue;

/// Hand-written SQL using `?` or `@name` markers, translated to native markers
/// when built.
///
/// # Example
///
/// ```ignore
/// use oradialect::{raw, SqlQb};
///
/// let rows = raw("SELECT id, name FROM users WHERE status = @status AND owner = @status")
///     .bind_named("status", "active")
///     .query(&exec)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct RawSql {
    template: String,
    args: Args,
    table: Option<String>,
}

/// Start a hand-written statement.
pub fn raw(template: impl Into<String>) -> RawSql {
    RawSql {
        template: template.into(),
        args: Args::new(),
        table: None,
    }
}

impl RawSql {
    /// Bind the next `?` marker.
    pub fn bind(mut self, value: impl ToValue) -> Self {
        self.args = self.args.bind(value);
        self
    }

    /// Bind every `@name` marker with this name.
    pub fn bind_named(mut self, name: impl Into<String>, value: impl ToValue) -> Self {
        self.args = self.args.bind_named(name, value);
        self
    }

    /// Replace all bound arguments.
    pub fn args(mut self, args: impl Into<Args>) -> Self {
        self.args = args.into();
        self
    }

    /// Table name reported in error context.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    fn translate(&self, config: &DialectConfig) -> OrmResult<Statement> {
        let statement = translate(&self.template, self.args.clone(), config)?;
        Ok(match &self.table {
            Some(table) => statement.table(table.clone()),
            None => statement,
        })
    }
}

impl SqlQb for RawSql {
    fn build(&self, config: &DialectConfig) -> OrmResult<Statement> {
        self.translate(config)
    }
}

impl MutationQb for RawSql {
    fn build_plan(&self, config: &DialectConfig) -> OrmResult<ExecPlan> {
        let mut statement = self.translate(config)?;
        statement.shape = ResultShape::RowsAffected;
        Ok(ExecPlan::single(statement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaceholderStyle;
    use crate::statement::Binds;
    use crate::value::Value;

    #[test]
    fn query_and_mutation_shapes() {
        let config = DialectConfig::default();
        let q = raw("SELECT * FROM t WHERE a = ? AND b = ?").bind(1).bind("x");
        let stmt = q.build(&config).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE a = :1 AND b = :2");
        assert_eq!(stmt.shape, ResultShape::Rows);

        let plan = raw("DELETE FROM t WHERE a = ?").bind(1).build_plan(&config).unwrap();
        assert_eq!(plan.statements[0].shape, ResultShape::RowsAffected);
    }

    #[test]
    fn named_markers_reuse_one_bind() {
        let config = DialectConfig::default().placeholder_style(PlaceholderStyle::Named);
        let stmt = raw("SELECT * FROM t WHERE a = @v OR b = @v")
            .bind_named("v", 7)
            .table("t")
            .build(&config)
            .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE a = :v OR b = :v");
        assert_eq!(stmt.binds, Binds::Named(vec![("v".into(), Value::Int(7))]));
        assert_eq!(stmt.table.as_deref(), Some("t"));
    }

    #[test]
    fn unbound_name_fails() {
        let err = raw("SELECT * FROM t WHERE a = @missing")
            .build(&DialectConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
