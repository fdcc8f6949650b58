//! Expression layer for WHERE/HAVING conditions.
//!
//! [`Expr`] supports:
//! - AND/OR/NOT grouping
//! - comparison operators (eq, ne, gt, lt, like, case-insensitive like, ...)
//! - IN / NOT IN with Oracle's 1000-element list limit handled by splitting
//! - templates with `?` placeholders
//! - raw SQL fragments
//!
//! Column names are quoted when the expression is written. Values are never
//! rendered into SQL; each one becomes a bind marker numbered by the
//! statement being assembled.

use crate::error::OrmResult;
use crate::placeholder::{Args, Emitter};
use crate::qb::write_ident;
use crate::types::TypeMapper;
use crate::value::{ToValue, Value};

/// Oracle rejects IN lists longer than this (ORA-01795).
pub(crate) const MAX_IN_LIST: usize = 1000;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    /// Case-insensitive LIKE, written as `UPPER(col) LIKE UPPER(:n)`.
    ILike,
    NotILike,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Like | CompareOp::ILike => "LIKE",
            CompareOp::NotLike | CompareOp::NotILike => "NOT LIKE",
        }
    }

    fn case_insensitive(self) -> bool {
        matches!(self, CompareOp::ILike | CompareOp::NotILike)
    }
}

/// Expression node for building WHERE/HAVING clauses.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// AND group: all conditions must be true.
    And(Vec<Expr>),

    /// OR group: at least one condition must be true.
    Or(Vec<Expr>),

    /// NOT: negate the inner expression.
    Not(Box<Expr>),

    /// Simple comparison: column op :n
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },

    /// NULL check: column IS NULL or column IS NOT NULL
    NullCheck { column: String, is_null: bool },

    /// IN list: column IN (:1, :2, ...) or column NOT IN (...)
    InList {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },

    /// BETWEEN: column BETWEEN :n AND :m
    Between {
        column: String,
        from: Value,
        to: Value,
        negated: bool,
    },

    /// Template with `?` placeholders, one value each.
    Template { sql: String, values: Vec<Value> },

    /// Raw SQL fragment without parameters.
    Raw(String),

    /// Always true (used for empty NOT IN lists).
    True,

    /// Always false (used for empty IN lists).
    False,
}

fn compare(column: impl Into<String>, op: CompareOp, value: impl ToValue) -> Expr {
    Expr::Compare {
        column: column.into(),
        op,
        value: value.to_value(),
    }
}

impl Expr {
    /// Create an AND expression from a list of expressions.
    pub fn and(exprs: Vec<Expr>) -> Self {
        Expr::And(exprs)
    }

    /// Create an OR expression from a list of expressions.
    pub fn or(exprs: Vec<Expr>) -> Self {
        Expr::Or(exprs)
    }

    /// Create a NOT expression.
    pub fn not(expr: Expr) -> Self {
        Expr::Not(Box::new(expr))
    }

    pub fn eq(column: impl Into<String>, value: impl ToValue) -> Self {
        compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl ToValue) -> Self {
        compare(column, CompareOp::Ne, value)
    }

    pub fn gt(column: impl Into<String>, value: impl ToValue) -> Self {
        compare(column, CompareOp::Gt, value)
    }

    pub fn gte(column: impl Into<String>, value: impl ToValue) -> Self {
        compare(column, CompareOp::Gte, value)
    }

    pub fn lt(column: impl Into<String>, value: impl ToValue) -> Self {
        compare(column, CompareOp::Lt, value)
    }

    pub fn lte(column: impl Into<String>, value: impl ToValue) -> Self {
        compare(column, CompareOp::Lte, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl ToValue) -> Self {
        compare(column, CompareOp::Like, pattern)
    }

    pub fn not_like(column: impl Into<String>, pattern: impl ToValue) -> Self {
        compare(column, CompareOp::NotLike, pattern)
    }

    /// Case-insensitive LIKE.
    pub fn ilike(column: impl Into<String>, pattern: impl ToValue) -> Self {
        compare(column, CompareOp::ILike, pattern)
    }

    pub fn not_ilike(column: impl Into<String>, pattern: impl ToValue) -> Self {
        compare(column, CompareOp::NotILike, pattern)
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Expr::NullCheck {
            column: column.into(),
            is_null: true,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Expr::NullCheck {
            column: column.into(),
            is_null: false,
        }
    }

    /// `column IN (values...)`; an empty list is always false.
    pub fn in_list<T: ToValue>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        let values: Vec<Value> = values.into_iter().map(|v| v.to_value()).collect();
        if values.is_empty() {
            return Expr::False;
        }
        Expr::InList {
            column: column.into(),
            values,
            negated: false,
        }
    }

    /// `column NOT IN (values...)`; an empty list is always true.
    pub fn not_in<T: ToValue>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        let values: Vec<Value> = values.into_iter().map(|v| v.to_value()).collect();
        if values.is_empty() {
            return Expr::True;
        }
        Expr::InList {
            column: column.into(),
            values,
            negated: true,
        }
    }

    pub fn between(column: impl Into<String>, from: impl ToValue, to: impl ToValue) -> Self {
        Expr::Between {
            column: column.into(),
            from: from.to_value(),
            to: to.to_value(),
            negated: false,
        }
    }

    pub fn not_between(column: impl Into<String>, from: impl ToValue, to: impl ToValue) -> Self {
        Expr::Between {
            column: column.into(),
            from: from.to_value(),
            to: to.to_value(),
            negated: true,
        }
    }

    /// Create a template expression with `?` placeholders.
    ///
    /// # Example
    /// ```ignore
    /// Expr::template("a = ? OR b = ?", [1, 2])
    /// ```
    pub fn template<T: ToValue>(sql: impl Into<String>, values: impl IntoIterator<Item = T>) -> Self {
        Expr::Template {
            sql: sql.into(),
            values: values.into_iter().map(|v| v.to_value()).collect(),
        }
    }

    /// Create a raw SQL fragment. It may not contain bind markers.
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    /// Check if this expression is empty (contains no conditions).
    pub fn is_empty(&self) -> bool {
        match self {
            Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().all(Expr::is_empty),
            Expr::Not(inner) => inner.is_empty(),
            _ => false,
        }
    }

    /// True when the expression matches every row, e.g. an empty NOT IN list.
    pub fn is_tautology(&self) -> bool {
        match self {
            Expr::True => true,
            Expr::And(exprs) => {
                !self.is_empty() && exprs.iter().all(|e| e.is_empty() || e.is_tautology())
            }
            Expr::Or(exprs) => exprs.iter().any(Expr::is_tautology),
            Expr::Not(inner) => matches!(**inner, Expr::False),
            _ => false,
        }
    }

    /// Caller-written SQL, whose operator precedence is unknown.
    fn is_fragment(&self) -> bool {
        matches!(self, Expr::Template { .. } | Expr::Raw(_))
    }

    /// Write the expression into a statement being assembled.
    pub(crate) fn write(&self, out: &mut Emitter<'_>) -> OrmResult<()> {
        match self {
            Expr::And(exprs) => write_joined(out, exprs, " AND ", |e| {
                matches!(e, Expr::Or(_)) || e.is_fragment()
            }),
            Expr::Or(exprs) => write_joined(out, exprs, " OR ", |e| {
                matches!(e, Expr::And(_)) || e.is_fragment()
            }),
            Expr::Not(inner) => {
                if inner.is_empty() {
                    return Ok(());
                }
                out.push_str("NOT (");
                inner.write(out)?;
                out.push(')');
                Ok(())
            }
            Expr::Compare { column, op, value } => {
                let value = TypeMapper::new(out.config()).encode_untyped(value.clone());
                if op.case_insensitive() {
                    out.push_str("UPPER(");
                    write_ident(out, column)?;
                    out.push_str(") ");
                    out.push_str(op.as_sql());
                    out.push_str(" UPPER(");
                    out.bind(value);
                    out.push(')');
                } else {
                    write_ident(out, column)?;
                    out.push(' ');
                    out.push_str(op.as_sql());
                    out.push(' ');
                    out.bind(value);
                }
                Ok(())
            }
            Expr::NullCheck { column, is_null } => {
                write_ident(out, column)?;
                out.push_str(if *is_null { " IS NULL" } else { " IS NOT NULL" });
                Ok(())
            }
            Expr::InList {
                column,
                values,
                negated,
            } => write_in_list(out, column, values, *negated),
            Expr::Between {
                column,
                from,
                to,
                negated,
            } => {
                let mapper = TypeMapper::new(out.config());
                write_ident(out, column)?;
                out.push_str(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                out.bind(mapper.encode_untyped(from.clone()));
                out.push_str(" AND ");
                out.bind(mapper.encode_untyped(to.clone()));
                Ok(())
            }
            Expr::Template { sql, values } => out.template(sql, &Args::positional(values.clone())),
            Expr::Raw(sql) => out.template(sql, &Args::new()),
            Expr::True => {
                out.push_str("1=1");
                Ok(())
            }
            Expr::False => {
                out.push_str("1=0");
                Ok(())
            }
        }
    }
}

fn write_joined(
    out: &mut Emitter<'_>,
    exprs: &[Expr],
    sep: &str,
    needs_parens: impl Fn(&Expr) -> bool,
) -> OrmResult<()> {
    for (i, e) in exprs.iter().filter(|e| !e.is_empty()).enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        if needs_parens(e) {
            out.push('(');
            e.write(out)?;
            out.push(')');
        } else {
            e.write(out)?;
        }
    }
    Ok(())
}

fn write_in_list(
    out: &mut Emitter<'_>,
    column: &str,
    values: &[Value],
    negated: bool,
) -> OrmResult<()> {
    if values.is_empty() {
        out.push_str(if negated { "1=1" } else { "1=0" });
        return Ok(());
    }
    let mapper = TypeMapper::new(out.config());
    let chunks = values.chunks(MAX_IN_LIST).count();
    if chunks > 1 {
        out.push('(');
    }
    for (i, chunk) in values.chunks(MAX_IN_LIST).enumerate() {
        if i > 0 {
            out.push_str(if negated { " AND " } else { " OR " });
        }
        write_ident(out, column)?;
        out.push_str(if negated { " NOT IN (" } else { " IN (" });
        for (j, v) in chunk.iter().enumerate() {
            if j > 0 {
                out.push_str(", ");
            }
            out.bind(mapper.encode_untyped(v.clone()));
        }
        out.push(')');
    }
    if chunks > 1 {
        out.push(')');
    }
    Ok(())
}

/// A builder for constructing WHERE/HAVING clauses incrementally.
///
/// Expressions added to a group are ANDed together.
#[derive(Clone, Debug, Default)]
pub struct ExprGroup {
    exprs: Vec<Expr>,
}

impl ExprGroup {
    pub fn new() -> Self {
        Self { exprs: Vec::new() }
    }

    /// True when the group holds no predicate at all.
    pub fn is_empty(&self) -> bool {
        self.exprs.iter().all(Expr::is_empty)
    }

    /// True when at least one predicate can filter out rows.
    pub fn restricts_rows(&self) -> bool {
        self.exprs.iter().any(|e| !e.is_empty() && !e.is_tautology())
    }

    /// Add an expression to be ANDed.
    pub fn and_expr(&mut self, expr: Expr) {
        self.exprs.push(expr);
    }

    pub fn eq(&mut self, column: &str, value: impl ToValue) {
        self.exprs.push(Expr::eq(column, value));
    }

    pub fn ne(&mut self, column: &str, value: impl ToValue) {
        self.exprs.push(Expr::ne(column, value));
    }

    pub fn gt(&mut self, column: &str, value: impl ToValue) {
        self.exprs.push(Expr::gt(column, value));
    }

    pub fn gte(&mut self, column: &str, value: impl ToValue) {
        self.exprs.push(Expr::gte(column, value));
    }

    pub fn lt(&mut self, column: &str, value: impl ToValue) {
        self.exprs.push(Expr::lt(column, value));
    }

    pub fn lte(&mut self, column: &str, value: impl ToValue) {
        self.exprs.push(Expr::lte(column, value));
    }

    pub fn like(&mut self, column: &str, pattern: impl ToValue) {
        self.exprs.push(Expr::like(column, pattern));
    }

    pub fn not_like(&mut self, column: &str, pattern: impl ToValue) {
        self.exprs.push(Expr::not_like(column, pattern));
    }

    pub fn ilike(&mut self, column: &str, pattern: impl ToValue) {
        self.exprs.push(Expr::ilike(column, pattern));
    }

    pub fn not_ilike(&mut self, column: &str, pattern: impl ToValue) {
        self.exprs.push(Expr::not_ilike(column, pattern));
    }

    pub fn is_null(&mut self, column: &str) {
        self.exprs.push(Expr::is_null(column));
    }

    pub fn is_not_null(&mut self, column: &str) {
        self.exprs.push(Expr::is_not_null(column));
    }

    pub fn in_list<T: ToValue>(&mut self, column: &str, values: impl IntoIterator<Item = T>) {
        self.exprs.push(Expr::in_list(column, values));
    }

    pub fn not_in<T: ToValue>(&mut self, column: &str, values: impl IntoIterator<Item = T>) {
        self.exprs.push(Expr::not_in(column, values));
    }

    pub fn between(&mut self, column: &str, from: impl ToValue, to: impl ToValue) {
        self.exprs.push(Expr::between(column, from, to));
    }

    pub fn not_between(&mut self, column: &str, from: impl ToValue, to: impl ToValue) {
        self.exprs.push(Expr::not_between(column, from, to));
    }

    /// Add a raw SQL condition.
    pub fn raw(&mut self, sql: &str) {
        self.exprs.push(Expr::raw(sql));
    }

    /// Add a template condition with `?` placeholders.
    pub fn template<T: ToValue>(&mut self, sql: &str, values: impl IntoIterator<Item = T>) {
        self.exprs.push(Expr::template(sql, values));
    }

    /// Add multiple columns with OR case-insensitive LIKE.
    pub fn multi_ilike<T: ToValue + Clone>(&mut self, columns: &[&str], pattern: T) {
        if columns.is_empty() {
            return;
        }
        let or_exprs: Vec<Expr> = columns
            .iter()
            .map(|col| Expr::ilike(*col, pattern.clone()))
            .collect();
        self.exprs.push(Expr::Or(or_exprs));
    }

    // ========== Optional value methods ==========

    pub fn eq_opt<T: ToValue>(&mut self, column: &str, value: Option<T>) {
        if let Some(v) = value {
            self.eq(column, v);
        }
    }

    pub fn like_opt<T: ToValue>(&mut self, column: &str, pattern: Option<T>) {
        if let Some(v) = pattern {
            self.like(column, v);
        }
    }

    pub fn ilike_opt<T: ToValue>(&mut self, column: &str, pattern: Option<T>) {
        if let Some(v) = pattern {
            self.ilike(column, v);
        }
    }

    pub fn gt_opt<T: ToValue>(&mut self, column: &str, value: Option<T>) {
        if let Some(v) = value {
            self.gt(column, v);
        }
    }

    pub fn gte_opt<T: ToValue>(&mut self, column: &str, value: Option<T>) {
        if let Some(v) = value {
            self.gte(column, v);
        }
    }

    pub fn lt_opt<T: ToValue>(&mut self, column: &str, value: Option<T>) {
        if let Some(v) = value {
            self.lt(column, v);
        }
    }

    pub fn lte_opt<T: ToValue>(&mut self, column: &str, value: Option<T>) {
        if let Some(v) = value {
            self.lte(column, v);
        }
    }

    /// Add `column IN (...)` when values is Some and non-empty.
    pub fn in_opt<T: ToValue>(&mut self, column: &str, values: Option<Vec<T>>) {
        if let Some(v) = values {
            if !v.is_empty() {
                self.in_list(column, v);
            }
        }
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }

    /// Write the conditions (without the `WHERE` keyword).
    pub(crate) fn write(&self, out: &mut Emitter<'_>) -> OrmResult<()> {
        let several = self.exprs.iter().filter(|e| !e.is_empty()).count() > 1;
        write_joined(out, &self.exprs, " AND ", |e| {
            matches!(e, Expr::Or(_)) || (several && e.is_fragment())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DialectConfig, PlaceholderStyle};
    use crate::statement::Binds;

    fn render(expr: &Expr) -> (String, Binds) {
        let config = DialectConfig::default();
        let mut out = Emitter::new(&config);
        expr.write(&mut out).unwrap();
        out.into_parts()
    }

    fn sql(expr: &Expr) -> String {
        render(expr).0
    }

    #[test]
    fn simple_eq_quotes_column() {
        let (sql, binds) = render(&Expr::eq("name", "alice"));
        assert_eq!(sql, r#""NAME" = :1"#);
        assert_eq!(binds, Binds::Positional(vec![Value::Text("alice".into())]));
    }

    #[test]
    fn nested_groups_are_parenthesized() {
        let expr = Expr::and(vec![
            Expr::eq("status", "active"),
            Expr::or(vec![Expr::eq("role", "admin"), Expr::eq("role", "root")]),
        ]);
        assert_eq!(
            sql(&expr),
            r#""STATUS" = :1 AND ("ROLE" = :2 OR "ROLE" = :3)"#
        );
    }

    #[test]
    fn ne_uses_standard_operator() {
        assert_eq!(sql(&Expr::ne("a", 1)), r#""A" <> :1"#);
    }

    #[test]
    fn ilike_upper_cases_both_sides() {
        assert_eq!(
            sql(&Expr::ilike("u.name", "%ab%")),
            r#"UPPER("U"."NAME") LIKE UPPER(:1)"#
        );
    }

    #[test]
    fn empty_in_lists() {
        assert_eq!(sql(&Expr::in_list::<i64>("id", vec![])), "1=0");
        assert_eq!(sql(&Expr::not_in::<i64>("id", vec![])), "1=1");
    }

    #[test]
    fn long_in_lists_are_split() {
        let (text, binds) = render(&Expr::in_list("id", 0..1500i64));
        assert!(text.starts_with(r#"("ID" IN (:1, "#));
        assert!(text.contains(r#":1000) OR "ID" IN (:1001, "#));
        assert!(text.ends_with(":1500))"));
        assert_eq!(binds.width(), 1500);

        let negated = sql(&Expr::not_in("id", 0..1001i64));
        assert!(negated.contains(r#":1000) AND "ID" NOT IN (:1001)"#));
    }

    #[test]
    fn bools_bind_as_numbers() {
        let (sql, binds) = render(&Expr::not(Expr::eq("banned", true)));
        assert_eq!(sql, r#"NOT ("BANNED" = :1)"#);
        assert_eq!(binds, Binds::Positional(vec![Value::Int(1)]));
    }

    #[test]
    fn templates_continue_numbering() {
        let expr = Expr::and(vec![
            Expr::eq("a", 1),
            Expr::template("b = ? OR c = ?", [2, 3]),
            Expr::between("d", 4, 5),
        ]);
        assert_eq!(
            sql(&expr),
            r#""A" = :1 AND (b = :2 OR c = :3) AND "D" BETWEEN :4 AND :5"#
        );
    }

    #[test]
    fn raw_fragments_reject_markers() {
        let config = DialectConfig::default();
        let mut out = Emitter::new(&config);
        assert!(Expr::raw("a = ?").write(&mut out).is_err());

        let mut out = Emitter::new(&config);
        assert!(Expr::raw("a = :1").write(&mut out).is_err());
    }

    #[test]
    fn named_style_generates_names() {
        let config = DialectConfig::default().placeholder_style(PlaceholderStyle::Named);
        let mut out = Emitter::new(&config);
        Expr::and(vec![Expr::eq("a", 1), Expr::gt("b", 2)])
            .write(&mut out)
            .unwrap();
        let (sql, binds) = out.into_parts();
        assert_eq!(sql, r#""A" = :p1 AND "B" > :p2"#);
        assert_eq!(binds.width(), 2);
    }

    #[test]
    fn group_emptiness() {
        let mut group = ExprGroup::new();
        assert!(group.is_empty());
        group.and_expr(Expr::and(vec![]));
        assert!(group.is_empty());
        group.eq_opt::<i64>("a", None);
        assert!(group.is_empty());
        group.in_list::<i64>("id", vec![]);
        assert!(!group.is_empty());
        assert!(group.restricts_rows());
    }

    #[test]
    fn tautologies_do_not_restrict_rows() {
        let mut group = ExprGroup::new();
        group.not_in::<i64>("id", vec![]);
        assert!(!group.is_empty());
        assert!(!group.restricts_rows());

        group.and_expr(Expr::or(vec![Expr::eq("a", 1), Expr::not_in::<i64>("b", vec![])]));
        assert!(!group.restricts_rows());

        group.and_expr(Expr::not(Expr::in_list::<i64>("c", vec![])));
        assert!(!group.restricts_rows());

        group.eq("d", 2);
        assert!(group.restricts_rows());
    }
}
