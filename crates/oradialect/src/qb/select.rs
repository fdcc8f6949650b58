//! SELECT query builder.

use crate::client::GenericClient;
use crate::config::{DialectConfig, PaginationStyle};
use crate::error::{OrmError, OrmResult};
use crate::exec::Executor;
use crate::placeholder::{Args, Emitter};
use crate::qb::expr::{Expr, ExprGroup};
use crate::qb::traits::SqlQb;
use crate::qb::{write_ident, write_table_ref};
use crate::statement::{ResultShape, Statement};
use crate::value::ToValue;

/// A select-list, GROUP BY or ORDER BY item.
#[derive(Clone, Debug, PartialEq)]
enum Item {
    /// Quoted as an identifier.
    Column(String),
    /// Trusted SQL expression, copied as written. May not contain markers.
    Raw(String),
}

impl Item {
    fn write(&self, out: &mut Emitter<'_>) -> OrmResult<()> {
        match self {
            Item::Column(c) => write_ident(out, c),
            Item::Raw(sql) => out.template(sql, &Args::new()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Join {
    kind: &'static str,
    table: String,
    on: Expr,
}

/// Row locking for `SELECT ... FOR UPDATE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    /// Wait for locks indefinitely.
    Wait,
    /// `NOWAIT`: fail immediately if a row is locked.
    NoWait,
    /// `WAIT n`: fail after n seconds.
    WaitSeconds(u32),
    /// `SKIP LOCKED`: skip locked rows.
    SkipLocked,
}

/// SELECT query builder with expression-based WHERE/HAVING.
#[derive(Clone, Debug)]
pub struct SelectQb {
    from: String,
    columns: Vec<Item>,
    distinct: bool,
    joins: Vec<Join>,
    where_group: ExprGroup,
    group_by: Vec<Item>,
    having_group: ExprGroup,
    order: Vec<(Item, &'static str)>,
    limit: Option<u64>,
    offset: Option<u64>,
    lock: Option<LockMode>,
}

impl SelectQb {
    /// Create a SELECT builder for `table` or `table alias`.
    pub fn new(table: &str) -> Self {
        Self {
            from: table.to_string(),
            columns: Vec::new(),
            distinct: false,
            joins: Vec::new(),
            where_group: ExprGroup::new(),
            group_by: Vec::new(),
            having_group: ExprGroup::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            lock: None,
        }
    }

    // ==================== SELECT columns ====================

    /// Set SELECT columns; each is quoted (`t.*` is allowed).
    pub fn select_cols(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|c| Item::Column(c.to_string())).collect();
        self
    }

    /// Append one SELECT column.
    pub fn add_select(mut self, col: &str) -> Self {
        self.columns.push(Item::Column(col.to_string()));
        self
    }

    /// Append a SQL expression to the select list, e.g. `COUNT(*) cnt`.
    pub fn select_raw(mut self, expr: &str) -> Self {
        self.columns.push(Item::Raw(expr.to_string()));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ==================== JOIN ====================

    fn join(mut self, kind: &'static str, table: &str, on: Expr) -> Self {
        self.joins.push(Join {
            kind,
            table: table.to_string(),
            on,
        });
        self
    }

    /// Add INNER JOIN with a raw ON condition.
    pub fn inner_join(self, table: &str, on: &str) -> Self {
        self.join("INNER JOIN", table, Expr::raw(on))
    }

    /// Add LEFT JOIN with a raw ON condition.
    pub fn left_join(self, table: &str, on: &str) -> Self {
        self.join("LEFT JOIN", table, Expr::raw(on))
    }

    /// Add RIGHT JOIN with a raw ON condition.
    pub fn right_join(self, table: &str, on: &str) -> Self {
        self.join("RIGHT JOIN", table, Expr::raw(on))
    }

    /// Add FULL OUTER JOIN with a raw ON condition.
    pub fn full_join(self, table: &str, on: &str) -> Self {
        self.join("FULL OUTER JOIN", table, Expr::raw(on))
    }

    /// Add INNER JOIN with an expression ON condition.
    pub fn inner_join_on(self, table: &str, on: Expr) -> Self {
        self.join("INNER JOIN", table, on)
    }

    /// Add LEFT JOIN with an expression ON condition.
    pub fn left_join_on(self, table: &str, on: Expr) -> Self {
        self.join("LEFT JOIN", table, on)
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

    pub fn like(mut self, column: &str, pattern: impl ToValue) -> Self {
        self.where_group.like(column, pattern);
        self
    }

    pub fn ilike(mut self, column: &str, pattern: impl ToValue) -> Self {
        self.where_group.ilike(column, pattern);
        self
    }

    pub fn not_like(mut self, column: &str, pattern: impl ToValue) -> Self {
        self.where_group.not_like(column, pattern);
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

    pub fn in_list<T: ToValue>(mut self, column: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.where_group.in_list(column, values);
        self
    }

    pub fn not_in<T: ToValue>(mut self, column: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.where_group.not_in(column, values);
        self
    }

    pub fn between(mut self, column: &str, from: impl ToValue, to: impl ToValue) -> Self {
        self.where_group.between(column, from, to);
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

    /// Add multi-column case-insensitive search (OR).
    pub fn multi_ilike<T: ToValue + Clone>(mut self, columns: &[&str], pattern: T) -> Self {
        self.where_group.multi_ilike(columns, pattern);
        self
    }

    /// Add a custom expression.
    pub fn and_expr(mut self, expr: Expr) -> Self {
        self.where_group.and_expr(expr);
        self
    }

    // ==================== Optional value helpers ====================

    pub fn eq_opt<T: ToValue>(mut self, column: &str, value: Option<T>) -> Self {
        self.where_group.eq_opt(column, value);
        self
    }

    pub fn like_opt<T: ToValue>(mut self, column: &str, pattern: Option<T>) -> Self {
        self.where_group.like_opt(column, pattern);
        self
    }

    pub fn ilike_opt<T: ToValue>(mut self, column: &str, pattern: Option<T>) -> Self {
        self.where_group.ilike_opt(column, pattern);
        self
    }

    pub fn gte_opt<T: ToValue>(mut self, column: &str, value: Option<T>) -> Self {
        self.where_group.gte_opt(column, value);
        self
    }

    pub fn lte_opt<T: ToValue>(mut self, column: &str, value: Option<T>) -> Self {
        self.where_group.lte_opt(column, value);
        self
    }

    pub fn in_opt<T: ToValue>(mut self, column: &str, values: Option<Vec<T>>) -> Self {
        self.where_group.in_opt(column, values);
        self
    }

    // ==================== Ordering & Grouping ====================

    pub fn order_by_asc(mut self, column: &str) -> Self {
        self.order.push((Item::Column(column.to_string()), " ASC"));
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order.push((Item::Column(column.to_string()), " DESC"));
        self
    }

    /// Add a raw ORDER BY item, e.g. `LOWER(name) NULLS LAST`.
    pub fn order_by_raw(mut self, clause: &str) -> Self {
        self.order.push((Item::Raw(clause.to_string()), ""));
        self
    }

    /// Set GROUP BY columns; each is quoted.
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.group_by = columns.iter().map(|c| Item::Column(c.to_string())).collect();
        self
    }

    /// Add a raw GROUP BY expression.
    pub fn group_by_raw(mut self, expr: &str) -> Self {
        self.group_by.push(Item::Raw(expr.to_string()));
        self
    }

    pub fn having_eq(mut self, column: &str, value: impl ToValue) -> Self {
        self.having_group.eq(column, value);
        self
    }

    pub fn having_gt(mut self, column: &str, value: impl ToValue) -> Self {
        self.having_group.gt(column, value);
        self
    }

    pub fn having_lt(mut self, column: &str, value: impl ToValue) -> Self {
        self.having_group.lt(column, value);
        self
    }

    /// Add HAVING condition with template, e.g. `COUNT(*) > ?`.
    pub fn having_template<T: ToValue>(mut self, sql: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.having_group.template(sql, values);
        self
    }

    // ==================== Pagination & locking ====================

    /// Return at most `n` rows.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Skip the first `n` rows.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Pagination helper.
    ///
    /// `page` is 1-based (clamped to >= 1).
    /// `per_page` is clamped to >= 1.
    pub fn paginate(mut self, page: u64, per_page: u64) -> Self {
        let p = page.max(1);
        let size = per_page.max(1);
        self.limit = Some(size);
        self.offset = Some((p - 1).saturating_mul(size));
        self
    }

    /// Lock selected rows with `FOR UPDATE`.
    pub fn for_update(mut self, mode: LockMode) -> Self {
        self.lock = Some(mode);
        self
    }

    // ==================== Build helpers ====================

    fn paginated(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }

    /// FROM, JOIN, WHERE, GROUP BY and HAVING.
    fn write_body(&self, out: &mut Emitter<'_>) -> OrmResult<()> {
        out.push_str(" FROM ");
        write_table_ref(out, &self.from)?;
        for join in &self.joins {
            out.push(' ');
            out.push_str(join.kind);
            out.push(' ');
            write_table_ref(out, &join.table)?;
            out.push_str(" ON ");
            join.on.write(out)?;
        }
        if !self.where_group.is_empty() {
            out.push_str(" WHERE ");
            self.where_group.write(out)?;
        }
        if !self.group_by.is_empty() {
            out.push_str(" GROUP BY ");
            write_items(out, &self.group_by)?;
        }
        if !self.having_group.is_empty() {
            out.push_str(" HAVING ");
            self.having_group.write(out)?;
        }
        Ok(())
    }

    fn write_select(&self, out: &mut Emitter<'_>) -> OrmResult<()> {
        out.push_str("SELECT ");
        if self.distinct {
            out.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            out.push('*');
        } else {
            write_items(out, &self.columns)?;
        }
        self.write_body(out)?;
        if !self.order.is_empty() {
            out.push_str(" ORDER BY ");
            for (i, (item, dir)) in self.order.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                item.write(out)?;
                out.push_str(dir);
            }
        }
        Ok(())
    }

    fn write_paginated(&self, out: &mut Emitter<'_>) -> OrmResult<()> {
        if !self.paginated() {
            return self.write_select(out);
        }
        if self.lock.is_some() {
            return Err(OrmError::translation(
                "FOR UPDATE cannot be combined with pagination",
            ));
        }
        if self.order.is_empty() {
            tracing::debug!(
                target: "oradialect.sql",
                table = %self.from,
                "pagination without ORDER BY: row selection is undefined"
            );
        }

        match out.config().pagination {
            PaginationStyle::OffsetFetch => {
                self.write_select(out)?;
                if let Some(offset) = self.offset {
                    out.push_str(" OFFSET ");
                    out.bind(offset.to_value());
                    out.push_str(" ROWS");
                }
                if let Some(limit) = self.limit {
                    out.push_str(" FETCH NEXT ");
                    out.bind(limit.to_value());
                    out.push_str(" ROWS ONLY");
                }
            }
            PaginationStyle::RowNum => {
                let lo = self.offset.unwrap_or(0);
                out.push_str("SELECT * FROM (SELECT q__.*, ROWNUM rn__ FROM (");
                self.write_select(out)?;
                out.push_str(") q__");
                if let Some(limit) = self.limit {
                    let hi = lo.checked_add(limit).ok_or_else(|| {
                        OrmError::translation("offset + limit overflows the row number range")
                    })?;
                    out.push_str(" WHERE ROWNUM <= ");
                    out.bind(hi.to_value());
                }
                out.push_str(") WHERE rn__ > ");
                out.bind(lo.to_value());
            }
        }
        Ok(())
    }

    fn write_lock(&self, out: &mut Emitter<'_>) {
        let Some(mode) = self.lock else {
            return;
        };
        out.push_str(" FOR UPDATE");
        match mode {
            LockMode::Wait => {}
            LockMode::NoWait => out.push_str(" NOWAIT"),
            LockMode::WaitSeconds(n) => out.push_str(&format!(" WAIT {n}")),
            LockMode::SkipLocked => out.push_str(" SKIP LOCKED"),
        }
    }

    fn finish(&self, out: Emitter<'_>) -> Statement {
        let (sql, binds) = out.into_parts();
        Statement::new(sql, binds, ResultShape::Rows)
            .operation("select")
            .table(self.from.clone())
    }

    /// Assemble the COUNT query for the same filters.
    ///
    /// Grouped queries are wrapped so the count is of groups.
    pub fn build_count(&self, config: &DialectConfig) -> OrmResult<Statement> {
        let mut out = Emitter::new(config);
        if self.group_by.is_empty() && self.having_group.is_empty() {
            out.push_str("SELECT COUNT(*)");
            self.write_body(&mut out)?;
        } else {
            out.push_str("SELECT COUNT(*) FROM (SELECT 1 c__");
            self.write_body(&mut out)?;
            out.push_str(") t");
        }
        Ok(self.finish(out).operation("count"))
    }

    // ==================== Execution ====================

    /// Execute the COUNT query.
    pub async fn count<C: GenericClient>(&self, exec: &Executor<'_, C>) -> OrmResult<i64> {
        let statement = self.build_count(exec.config())?;
        let row = exec.query_one(&statement).await?;
        row.get_idx(0)
    }
}

fn write_items(out: &mut Emitter<'_>, items: &[Item]) -> OrmResult<()> {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write(out)?;
    }
    Ok(())
}

impl SqlQb for SelectQb {
    fn build(&self, config: &DialectConfig) -> OrmResult<Statement> {
        let mut out = Emitter::new(config);
        self.write_paginated(&mut out)?;
        self.write_lock(&mut out);
        Ok(self.finish(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaceholderStyle;
    use crate::statement::Binds;
    use crate::value::Value;

    fn page_values(statement: &Statement) -> Vec<Value> {
        match &statement.binds {
            Binds::Positional(v) => v.clone(),
            other => panic!("expected positional binds, got {other:?}"),
        }
    }

    fn cfg() -> DialectConfig {
        DialectConfig::default()
    }

    fn sql(qb: &SelectQb) -> String {
        qb.to_sql(&cfg()).unwrap()
    }

    #[test]
    fn simple_select() {
        assert_eq!(sql(&SelectQb::new("users")), r#"SELECT * FROM "USERS""#);
    }

    #[test]
    fn columns_are_quoted() {
        let qb = SelectQb::new("users").select_cols(&["id", "u.name", "t.*"]);
        assert_eq!(
            sql(&qb),
            r#"SELECT "ID", "U"."NAME", "T".* FROM "USERS""#
        );
    }

    #[test]
    fn where_and_join() {
        let qb = SelectQb::new("users u")
            .inner_join("orders o", "u.id = o.user_id")
            .eq("u.status", "active")
            .gt("age", 18);
        assert_eq!(
            sql(&qb),
            r#"SELECT * FROM "USERS" "U" INNER JOIN "ORDERS" "O" ON u.id = o.user_id WHERE "U"."STATUS" = :1 AND "AGE" > :2"#
        );
    }

    #[test]
    fn table_alias_drops_as() {
        let qb = SelectQb::new("users AS u");
        assert_eq!(sql(&qb), r#"SELECT * FROM "USERS" "U""#);
    }

    #[test]
    fn offset_fetch_pagination() {
        let qb = SelectQb::new("users")
            .order_by_desc("created_at")
            .limit(10)
            .offset(20);
        let stmt = qb.build(&cfg()).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT * FROM "USERS" ORDER BY "CREATED_AT" DESC OFFSET :1 ROWS FETCH NEXT :2 ROWS ONLY"#
        );
        assert_eq!(page_values(&stmt), vec![Value::Int(20), Value::Int(10)]);
    }

    #[test]
    fn limit_only_uses_fetch() {
        let qb = SelectQb::new("users").order_by_asc("id").limit(5);
        assert_eq!(
            sql(&qb),
            r#"SELECT * FROM "USERS" ORDER BY "ID" ASC FETCH NEXT :1 ROWS ONLY"#
        );
    }

    #[test]
    fn rownum_pagination_wraps_query() {
        let config = cfg().pagination(PaginationStyle::RowNum);
        let qb = SelectQb::new("users")
            .eq("status", "a")
            .order_by_asc("id")
            .paginate(3, 10);
        let stmt = qb.build(&config).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT * FROM (SELECT q__.*, ROWNUM rn__ FROM (SELECT * FROM "USERS" WHERE "STATUS" = :1 ORDER BY "ID" ASC) q__ WHERE ROWNUM <= :2) WHERE rn__ > :3"#
        );
        assert_eq!(
            page_values(&stmt),
            vec![Value::Text("a".into()), Value::Int(30), Value::Int(20)]
        );
    }

    #[test]
    fn rownum_offset_only_has_no_upper_bound() {
        let config = cfg().pagination(PaginationStyle::RowNum);
        let stmt = SelectQb::new("t").order_by_asc("id").offset(4).build(&config).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT * FROM (SELECT q__.*, ROWNUM rn__ FROM (SELECT * FROM "T" ORDER BY "ID" ASC) q__) WHERE rn__ > :1"#
        );
    }

    #[test]
    fn rownum_overflow_is_rejected() {
        let config = cfg().pagination(PaginationStyle::RowNum);
        let qb = SelectQb::new("t").offset(u64::MAX).limit(1);
        assert!(qb.build(&config).is_err());
    }

    #[test]
    fn for_update_modes() {
        let qb = SelectQb::new("jobs").eq("state", "ready").for_update(LockMode::SkipLocked);
        assert_eq!(
            sql(&qb),
            r#"SELECT * FROM "JOBS" WHERE "STATE" = :1 FOR UPDATE SKIP LOCKED"#
        );
        let qb = SelectQb::new("jobs").for_update(LockMode::WaitSeconds(5));
        assert!(sql(&qb).ends_with("FOR UPDATE WAIT 5"));
    }

    #[test]
    fn for_update_with_pagination_is_a_translation_error() {
        let err = SelectQb::new("jobs")
            .limit(1)
            .for_update(LockMode::NoWait)
            .build(&cfg())
            .unwrap_err();
        assert!(matches!(err, OrmError::Translation { .. }));
    }

    #[test]
    fn group_by_and_having() {
        let qb = SelectQb::new("orders")
            .select_cols(&["user_id"])
            .select_raw("COUNT(*) order_count")
            .group_by(&["user_id"])
            .having_template("COUNT(*) > ?", [5]);
        assert_eq!(
            sql(&qb),
            r#"SELECT "USER_ID", COUNT(*) order_count FROM "ORDERS" GROUP BY "USER_ID" HAVING COUNT(*) > :1"#
        );
    }

    #[test]
    fn count_queries() {
        let qb = SelectQb::new("users").eq("status", "active").limit(10);
        assert_eq!(
            qb.build_count(&cfg()).unwrap().sql,
            r#"SELECT COUNT(*) FROM "USERS" WHERE "STATUS" = :1"#
        );

        let grouped = SelectQb::new("orders")
            .group_by(&["user_id"])
            .having_template("COUNT(*) > ?", [5]);
        assert_eq!(
            grouped.build_count(&cfg()).unwrap().sql,
            r#"SELECT COUNT(*) FROM (SELECT 1 c__ FROM "ORDERS" GROUP BY "USER_ID" HAVING COUNT(*) > :1) t"#
        );
    }

    #[test]
    fn optional_conditions() {
        let status: Option<&str> = Some("active");
        let name: Option<&str> = None;
        let qb = SelectQb::new("users").eq_opt("status", status).eq_opt("name", name);
        assert_eq!(sql(&qb), r#"SELECT * FROM "USERS" WHERE "STATUS" = :1"#);
    }

    #[test]
    fn named_style_pagination() {
        let config = cfg().placeholder_style(PlaceholderStyle::Named);
        let qb = SelectQb::new("users").eq("id", 1).order_by_asc("id").offset(0).limit(1);
        assert_eq!(
            qb.to_sql(&config).unwrap(),
            r#"SELECT * FROM "USERS" WHERE "ID" = :p1 ORDER BY "ID" ASC OFFSET :p2 ROWS FETCH NEXT :p3 ROWS ONLY"#
        );
    }

    #[test]
    fn identifiers_with_injection_are_quoted_or_rejected() {
        let qb = SelectQb::new("users").eq("name; DROP TABLE users", 1);
        assert_eq!(
            sql(&qb),
            r#"SELECT * FROM "USERS" WHERE "NAME; DROP TABLE USERS" = :1"#
        );
        assert!(SelectQb::new("users").eq("a\"b", 1).build(&cfg()).is_err());
    }
}
