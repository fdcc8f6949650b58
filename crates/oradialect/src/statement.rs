//! Native statements and execution plans.

use crate::config::PlaceholderStyle;
use crate::error::{OrmError, OrmResult};
use crate::placeholder::native_markers;
use crate::types::ColumnType;
use crate::value::Value;
use std::collections::BTreeSet;

/// Values bound to a statement's in-markers.
#[derive(Debug, Clone, PartialEq)]
pub enum Binds {
    /// One value per `:n` marker, in order.
    Positional(Vec<Value>),
    /// One value per distinct `:name` marker.
    Named(Vec<(String, Value)>),
    /// Array DML: the statement runs once per inner row.
    Batch(Vec<Vec<Value>>),
}

impl Binds {
    pub fn empty() -> Self {
        Binds::Positional(Vec::new())
    }

    /// Number of values per execution.
    pub fn width(&self) -> usize {
        match self {
            Binds::Positional(v) => v.len(),
            Binds::Named(v) => v.len(),
            Binds::Batch(rows) => rows.first().map_or(0, Vec::len),
        }
    }

    /// Number of times the statement runs.
    pub fn rows(&self) -> usize {
        match self {
            Binds::Batch(rows) => rows.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0
    }
}

impl Default for Binds {
    fn default() -> Self {
        Self::empty()
    }
}

/// A RETURNING ... INTO output parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct OutBind {
    /// Marker as written in SQL, without the colon.
    pub marker: String,
    /// Returned column, as declared.
    pub column: String,
    /// Column type, when a descriptor was available.
    pub column_type: Option<ColumnType>,
    /// Number of values the driver must allocate for; `0` when the count
    /// is only known after execution (UPDATE/DELETE).
    pub rows: usize,
}

/// What a statement produces.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultShape {
    Rows,
    #[default]
    RowsAffected,
    Returning(Vec<OutBind>),
}

/// A native SQL statement with its binds.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Binds,
    pub shape: ResultShape,
    /// Operation tag used for logging and error context.
    pub operation: &'static str,
    /// Target table, when there is one.
    pub table: Option<String>,
    /// Index of this statement's first input row within its plan. Returned
    /// rows are correlated to input rows relative to it.
    pub input_offset: usize,
}

impl Statement {
    pub fn new(sql: impl Into<String>, binds: Binds, shape: ResultShape) -> Self {
        Self {
            sql: sql.into(),
            binds,
            shape,
            operation: "raw",
            table: None,
            input_offset: 0,
        }
    }

    /// A bind-less schema statement.
    pub fn ddl(sql: impl Into<String>) -> Self {
        Self::new(sql, Binds::empty(), ResultShape::RowsAffected).operation("ddl")
    }

    pub fn operation(mut self, operation: &'static str) -> Self {
        self.operation = operation;
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub(crate) fn input_offset(mut self, offset: usize) -> Self {
        self.input_offset = offset;
        self
    }

    pub fn out_binds(&self) -> &[OutBind] {
        match &self.shape {
            ResultShape::Returning(outs) => outs,
            _ => &[],
        }
    }

    /// Check that every marker has exactly one value.
    ///
    /// Positional binds need one value per marker occurrence; named binds one
    /// value per distinct marker name. Out binds count as markers. DDL is not
    /// checked, since trigger bodies use `:NEW` pseudo-records.
    pub fn validate(&self) -> OrmResult<()> {
        if self.operation == "ddl" {
            return Ok(());
        }
        let markers = native_markers(&self.sql)?;
        let outs = self.out_binds();
        let mismatch = |expected: usize, got: usize| {
            OrmError::translation(format!(
                "bind count mismatch in {} statement: {expected} markers, {got} values",
                self.operation
            ))
        };
        match &self.binds {
            Binds::Positional(values) => {
                if markers.len() != values.len() + outs.len() {
                    return Err(mismatch(markers.len(), values.len() + outs.len()));
                }
            }
            Binds::Batch(rows) => {
                let expected = markers.len() - outs.len().min(markers.len());
                if let Some(bad) = rows.iter().find(|r| r.len() != expected) {
                    return Err(mismatch(expected, bad.len()));
                }
            }
            Binds::Named(pairs) => {
                let distinct: BTreeSet<String> =
                    markers.iter().map(|m| m.to_ascii_uppercase()).collect();
                let mut bound: BTreeSet<String> =
                    pairs.iter().map(|(n, _)| n.to_ascii_uppercase()).collect();
                bound.extend(outs.iter().map(|o| o.marker.to_ascii_uppercase()));
                if distinct != bound {
                    return Err(mismatch(distinct.len(), bound.len()));
                }
            }
        }
        for out in outs {
            if !markers.iter().any(|m| m.eq_ignore_ascii_case(&out.marker)) {
                return Err(OrmError::translation(format!(
                    "out bind :{} does not appear in the statement",
                    out.marker
                )));
            }
        }
        Ok(())
    }
}

/// How RETURNING rows of a multi-row operation are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturningMode {
    /// One array DML call binds out arrays for every row.
    Bulk,
    /// One statement execution per input row.
    PerRow,
}

/// One logical operation: statements run in order on one client.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecPlan {
    pub statements: Vec<Statement>,
    /// All statements commit or roll back together.
    pub atomic: bool,
    pub returning: Option<ReturningMode>,
    /// Input rows that must each come back exactly once from RETURNING.
    pub input_rows: Option<usize>,
}

impl ExecPlan {
    pub fn single(statement: Statement) -> Self {
        Self {
            statements: vec![statement],
            atomic: false,
            returning: None,
            input_rows: None,
        }
    }

    pub fn new(statements: Vec<Statement>) -> Self {
        let atomic = statements.len() > 1;
        Self {
            statements,
            atomic,
            returning: None,
            input_rows: None,
        }
    }

    pub fn returning(mut self, mode: ReturningMode, input_rows: usize) -> Self {
        self.returning = Some(mode);
        self.input_rows = Some(input_rows);
        self
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn validate(&self) -> OrmResult<()> {
        self.statements.iter().try_for_each(Statement::validate)
    }
}

/// Marker text for the `n`th (1-based) bind of a given style.
pub(crate) fn marker_name(style: PlaceholderStyle, n: usize) -> String {
    match style {
        PlaceholderStyle::Numbered => n.to_string(),
        PlaceholderStyle::Named => format!("p{n}"),
    }
}
