//! Create a table, insert with RETURNING, read the row back.

mod common;

use common::{Call, MockClient};
use oradialect::{
    ColumnDescriptor, Dialect, DialectConfig, FieldType, MutationQb, OrmError, Row, SqlQb,
    TableDescriptor, Value, insert_into, select,
};
use rust_decimal::Decimal;

fn users() -> TableDescriptor {
    TableDescriptor::new("users")
        .column(ColumnDescriptor::new("id", FieldType::Int64).identity())
        .column(ColumnDescriptor::new("flag", FieldType::Bool))
        .column(ColumnDescriptor::new("name", FieldType::String).size(50).not_null())
        .primary_key(&["id"])
}

#[tokio::test]
async fn create_insert_and_read_back() {
    let dialect = Dialect::new(DialectConfig::default());
    let conn = MockClient::new().on_query(
        r#"FROM "USERS""#,
        None,
        vec![Row::new(
            vec!["ID".to_string(), "FLAG".to_string(), "NAME".to_string()],
            vec![Value::Int(1), Value::Int(1), Value::Text("a".into())],
        )],
    );

    let report = dialect.migrator(&conn).auto_migrate(&[users()]).await.unwrap();
    assert_eq!(
        conn.ddl(),
        vec![
            r#"CREATE SEQUENCE "USERS_ID_SEQ" START WITH 1 INCREMENT BY 1"#.to_string(),
            r#"CREATE TABLE "USERS" ("ID" NUMBER(19) DEFAULT "USERS_ID_SEQ".NEXTVAL NOT NULL, "FLAG" NUMBER(1) CHECK ("FLAG" IN (0,1)), "NAME" VARCHAR2(50 CHAR) NOT NULL, CONSTRAINT "PK_USERS" PRIMARY KEY ("ID"))"#.to_string(),
        ]
    );
    assert_eq!(report.executed.len(), 2);
    assert!(report.tolerated.is_empty());

    let exec = dialect.executor(&conn);
    let ids: Vec<(i64,)> = insert_into(&users())
        .set("flag", true)
        .set("name", "a")
        .returning(&["id"])
        .fetch_returning(&exec)
        .await
        .unwrap();
    assert_eq!(ids, vec![(1,)]);

    let insert = conn
        .calls()
        .into_iter()
        .find(|c| matches!(c, Call::Returning { .. }))
        .unwrap();
    assert_eq!(
        insert,
        Call::Returning {
            sql: r#"INSERT INTO "USERS" ("FLAG", "NAME") VALUES (:1, :2) RETURNING "ID" INTO :3"#
                .to_string(),
            binds: oradialect::Binds::Positional(vec![Value::Int(1), Value::Text("a".into())]),
            outs: vec!["id".to_string()],
        }
    );

    let row = select("users").eq("id", 1).query_one(&exec).await.unwrap();
    assert!(row.get::<bool>("flag").unwrap());
    assert_eq!(row.get::<String>("name").unwrap(), "a");
}

#[tokio::test]
async fn oversized_value_fails_before_dispatch() {
    let dialect = Dialect::new(DialectConfig::default());
    let conn = MockClient::new();
    let exec = dialect.executor(&conn);

    let err = insert_into(&users())
        .set("flag", false)
        .set("name", "x".repeat(51))
        .execute(&exec)
        .await
        .unwrap_err();

    match &err {
        OrmError::Data { context, .. } => {
            assert_eq!(context.table.as_deref(), Some("users"));
            assert_eq!(context.column.as_deref(), Some("name"));
        }
        other => panic!("expected a data error, got {other:?}"),
    }
    assert!(conn.calls().is_empty());

    // Exactly at the limit is fine.
    insert_into(&users())
        .set("name", "x".repeat(50))
        .execute(&exec)
        .await
        .unwrap();
    assert_eq!(conn.calls().len(), 1);
}

#[tokio::test]
async fn out_of_range_decimal_fails_before_dispatch() {
    let dialect = Dialect::new(DialectConfig::default());
    let conn = MockClient::new();
    let exec = dialect.executor(&conn);
    let ledger = TableDescriptor::new("ledger")
        .column(
            ColumnDescriptor::new("amount", FieldType::Decimal)
                .precision(38)
                .scale(-1),
        )
        .column(
            ColumnDescriptor::new("rate", FieldType::Decimal)
                .precision(4)
                .scale(2),
        );

    let err = insert_into(&ledger)
        .set("amount", Decimal::MAX)
        .execute(&exec)
        .await
        .unwrap_err();
    match &err {
        OrmError::Data { context, .. } => {
            assert_eq!(context.table.as_deref(), Some("ledger"));
            assert_eq!(context.column.as_deref(), Some("amount"));
        }
        other => panic!("expected a data error, got {other:?}"),
    }

    let err = insert_into(&ledger)
        .set("rate", Decimal::new(12345, 2))
        .execute(&exec)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Data { .. }));
    assert!(conn.calls().is_empty());

    // Rounded to the column's scale, then sent.
    insert_into(&ledger)
        .set("amount", 1234)
        .set("rate", Decimal::new(12345, 4))
        .execute(&exec)
        .await
        .unwrap();
    match &conn.calls()[0] {
        Call::Execute { binds, .. } => assert_eq!(
            binds,
            &oradialect::Binds::Positional(vec![
                Value::Decimal(Decimal::from(1230)),
                Value::Decimal(Decimal::new(123, 2)),
            ])
        ),
        other => panic!("expected an execute call, got {other:?}"),
    }
}
