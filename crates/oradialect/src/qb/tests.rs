//! Cross-builder tests for the qb module.

use crate::config::{DialectConfig, IdentifierCase, PlaceholderStyle};
use crate::error::OrmError;
use crate::qb::expr::{Expr, ExprGroup};
use crate::qb::{MutationQb, SqlQb, delete, insert, insert_into, merge, select, update};
use crate::schema::{ColumnDescriptor, FieldType, TableDescriptor};
use crate::statement::Binds;
use crate::value::Value;

fn config() -> DialectConfig {
    DialectConfig::default()
}

#[test]
fn test_select_basic() {
    let sql = select("users").to_sql(&config()).unwrap();
    assert_eq!(sql, r#"SELECT * FROM "USERS""#);
}

#[test]
fn test_select_with_conditions() {
    let sql = select("users")
        .eq("status", "active")
        .gt("age", 18i32)
        .limit(10)
        .to_sql(&config())
        .unwrap();
    assert!(sql.starts_with(r#"SELECT * FROM "USERS" WHERE "STATUS" = :1 AND "AGE" > :2"#));
    assert!(sql.ends_with("FETCH NEXT :3 ROWS ONLY"));
}

#[test]
fn test_insert_basic() {
    let plan = insert("users")
        .set("username", "alice")
        .set("email", "alice@example.com")
        .build_plan(&config())
        .unwrap();
    assert_eq!(
        plan.statements[0].sql,
        r#"INSERT INTO "USERS" ("USERNAME", "EMAIL") VALUES (:1, :2)"#
    );
}

#[test]
fn test_update_basic() {
    let plan = update("users")
        .set("status", "inactive")
        .eq("id", 1i64)
        .build_plan(&config())
        .unwrap();
    assert_eq!(
        plan.statements[0].sql,
        r#"UPDATE "USERS" SET "STATUS" = :1 WHERE "ID" = :2"#
    );
}

#[test]
fn test_delete_basic() {
    let plan = delete("users").eq("id", 1i64).build_plan(&config()).unwrap();
    assert_eq!(plan.statements[0].sql, r#"DELETE FROM "USERS" WHERE "ID" = :1"#);
}

#[test]
fn test_merge_basic() {
    let plan = merge("users", &["email"])
        .set("email", "a@b.c")
        .set("name", "a")
        .build_plan(&config())
        .unwrap();
    assert!(plan.statements[0].sql.starts_with(r#"MERGE INTO "USERS" t"#));
}

#[test]
fn test_expr_group_in_select() {
    let mut group = ExprGroup::new();
    group.eq("a", 1);
    group.and_expr(Expr::or(vec![Expr::eq("b", 2), Expr::is_null("b")]));
    let mut qb = select("t");
    for expr in group.exprs() {
        qb = qb.and_expr(expr.clone());
    }
    assert_eq!(
        qb.to_sql(&config()).unwrap(),
        r#"SELECT * FROM "T" WHERE "A" = :1 AND ("B" = :2 OR "B" IS NULL)"#
    );
}

#[test]
fn adversarial_values_only_reach_binds() {
    let payloads = [
        "'; DROP TABLE users; --",
        "x' OR '1'='1",
        "\"; DELETE FROM t; /*",
        "q'[ ]'; COMMIT",
    ];
    for payload in payloads {
        let plan = update("users")
            .set("name", payload)
            .eq("email", payload)
            .build_plan(&config())
            .unwrap();
        let stmt = &plan.statements[0];
        assert!(!stmt.sql.contains(payload));
        assert!(!stmt.sql.contains(';'));
        assert_eq!(
            stmt.binds,
            Binds::Positional(vec![
                Value::Text(payload.into()),
                Value::Text(payload.into())
            ])
        );
    }
}

#[test]
fn adversarial_identifiers_are_rejected_or_quoted() {
    assert!(select("users; DROP TABLE x").to_sql(&config()).is_err());
    assert!(select("t").eq("a\" OR 1=1 --", 1).to_sql(&config()).is_err());
    let plan = insert("t").set("a;b", 1).build_plan(&config()).unwrap();
    assert_eq!(plan.statements[0].sql, r#"INSERT INTO "T" ("A;B") VALUES (:1)"#);
    let sql = select("\"my table\"").to_sql(&config()).unwrap();
    assert_eq!(sql, r#"SELECT * FROM "my table""#);
}

#[test]
fn preserve_case_policy() {
    let config = DialectConfig::default().identifier_case(IdentifierCase::Preserve);
    let sql = select("Users").eq("userName", "x").to_sql(&config).unwrap();
    assert_eq!(sql, r#"SELECT * FROM "Users" WHERE "userName" = :1"#);
}

#[test]
fn named_style_numbers_markers_across_clauses() {
    let config = DialectConfig::default().placeholder_style(PlaceholderStyle::Named);
    let plan = update("t")
        .set("a", 1)
        .where_template("b = ? OR c = ?", [2, 3])
        .returning(&["id"])
        .build_plan(&config)
        .unwrap();
    let stmt = &plan.statements[0];
    assert_eq!(
        stmt.sql,
        r#"UPDATE "T" SET "A" = :p1 WHERE b = :p2 OR c = :p3 RETURNING "ID" INTO :ret1"#
    );
    stmt.validate().unwrap();
}

#[test]
fn typed_insert_reports_column_context() {
    let table = TableDescriptor::new("accounts")
        .column(ColumnDescriptor::new("id", FieldType::Int64).identity())
        .column(ColumnDescriptor::new("age", FieldType::Int8));
    let err = insert_into(&table)
        .set("age", 300)
        .build_plan(&config())
        .unwrap_err();
    assert!(matches!(err, OrmError::Data { .. }));
    let ctx = err.context().unwrap();
    assert_eq!(ctx.operation, Some("insert"));
    assert_eq!(ctx.table.as_deref(), Some("accounts"));
    assert_eq!(ctx.column.as_deref(), Some("age"));
}

#[test]
fn global_guard_applies_to_update_and_delete() {
    assert!(update("t").set("a", 1).build_plan(&config()).unwrap_err().is_missing_where());
    assert!(delete("t").build_plan(&config()).unwrap_err().is_missing_where());
    // An always-false predicate still counts as a predicate.
    delete("t")
        .in_list("id", Vec::<i64>::new())
        .build_plan(&config())
        .unwrap();
}

#[test]
fn always_true_predicates_do_not_satisfy_the_guard() {
    let err = delete("t")
        .not_in("id", Vec::<i64>::new())
        .build_plan(&config())
        .unwrap_err();
    assert!(err.is_missing_where());

    let err = update("t")
        .set("a", 1)
        .and_expr(Expr::not_in::<i64>("id", vec![]))
        .build_plan(&config())
        .unwrap_err();
    assert!(err.is_missing_where());

    let plan = delete("t")
        .not_in("id", Vec::<i64>::new())
        .allow_all()
        .build_plan(&config())
        .unwrap();
    assert_eq!(plan.statements[0].sql, r#"DELETE FROM "T" WHERE 1=1"#);
}
