//! DDL text generation.
//!
//! Everything here is pure: descriptors in, statements out. Defaults and
//! comments come from schema declarations and are the only literals ever
//! rendered into SQL, with `'` doubled.

use crate::config::{DialectConfig, IdentityStrategy};
use crate::error::{ErrorContext, OrmError, OrmResult};
use crate::ident::{quote_identifier, stored_name};
use crate::schema::{
    ColumnDefault, ColumnDescriptor, ForeignKeyDescriptor, IndexDescriptor, ReferentialAction,
    TableDescriptor,
};
use crate::types::{ColumnType, TypeMapper};

/// How a DDL statement's "already done" errors are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    /// CREATE/ADD: "already exists" codes count as success.
    Create,
    /// MODIFY/COMMENT/RENAME: "already in that state" codes count as success.
    Alter,
    /// DROP: "does not exist" codes count as success.
    Drop,
}

/// One DDL statement of a migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlStep {
    pub sql: String,
    pub kind: DdlKind,
    /// Declared name of the table the statement belongs to.
    pub table: String,
}

impl DdlStep {
    pub(crate) fn create(table: &str, sql: String) -> Self {
        Self {
            sql,
            kind: DdlKind::Create,
            table: table.to_string(),
        }
    }

    pub(crate) fn alter(table: &str, sql: String) -> Self {
        Self {
            sql,
            kind: DdlKind::Alter,
            table: table.to_string(),
        }
    }

    pub(crate) fn drop(table: &str, sql: String) -> Self {
        Self {
            sql,
            kind: DdlKind::Drop,
            table: table.to_string(),
        }
    }
}

fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn column_list(columns: &[String], config: &DialectConfig) -> OrmResult<String> {
    let quoted = columns
        .iter()
        .map(|c| quote_identifier(c, config))
        .collect::<OrmResult<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

/// Stored name of a generated object tied to a column (`USERS_ID_SEQ`).
fn column_object_name(
    table: &str,
    column: &str,
    suffix: &str,
    config: &DialectConfig,
) -> OrmResult<String> {
    let table = stored_name(table, config)?;
    let column = stored_name(column, config)?;
    stored_name(&format!("\"{table}_{column}_{suffix}\""), config)
}

pub(crate) fn sequence_name(table: &str, column: &str, config: &DialectConfig) -> OrmResult<String> {
    let suffix = match config.identifier_case {
        crate::config::IdentifierCase::Upper => "SEQ",
        crate::config::IdentifierCase::Preserve => "seq",
    };
    column_object_name(table, column, suffix, config)
}

pub(crate) fn trigger_name(table: &str, column: &str, config: &DialectConfig) -> OrmResult<String> {
    let suffix = match config.identifier_case {
        crate::config::IdentifierCase::Upper => "TRG",
        crate::config::IdentifierCase::Preserve => "trg",
    };
    column_object_name(table, column, suffix, config)
}

/// Stored name of the primary-key constraint.
pub(crate) fn primary_key_name(table: &TableDescriptor, config: &DialectConfig) -> OrmResult<String> {
    match table.primary_key.as_ref().and_then(|pk| pk.name.as_deref()) {
        Some(name) => stored_name(name, config),
        None => {
            let t = stored_name(&table.name, config)?;
            let prefix = match config.identifier_case {
                crate::config::IdentifierCase::Upper => "PK",
                crate::config::IdentifierCase::Preserve => "pk",
            };
            stored_name(&format!("\"{prefix}_{t}\""), config)
        }
    }
}

fn quoted_stored(name: &str) -> String {
    format!("\"{name}\"")
}

fn is_primary_key(table: &TableDescriptor, column: &ColumnDescriptor) -> bool {
    table.primary_key.as_ref().is_some_and(|pk| {
        pk.columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&column.name))
    })
}

/// Whether the column may hold NULL once created. Primary-key columns never can.
pub(crate) fn effective_nullable(table: &TableDescriptor, column: &ColumnDescriptor) -> bool {
    column.nullable && !column.identity && !is_primary_key(table, column)
}

fn default_sql(
    column: &ColumnDescriptor,
    default: &ColumnDefault,
    config: &DialectConfig,
) -> OrmResult<String> {
    Ok(match default {
        ColumnDefault::Bool(b) if config.native_boolean => {
            if *b { "TRUE" } else { "FALSE" }.to_string()
        }
        ColumnDefault::Bool(b) => i64::from(*b).to_string(),
        ColumnDefault::Int(n) => n.to_string(),
        ColumnDefault::Float(f) if !f.is_finite() => {
            return Err(OrmError::validation(format!(
                "column '{}': default {f} has no NUMBER literal",
                column.name
            )));
        }
        ColumnDefault::Float(f) => f.to_string(),
        ColumnDefault::Text(s) => literal(s),
        ColumnDefault::CurrentTimestamp => "SYSTIMESTAMP".to_string(),
        ColumnDefault::Expression(e) => e.clone(),
    })
}

/// `"NAME" VARCHAR2(50 CHAR) DEFAULT ... NOT NULL CHECK (...)`
pub(crate) fn column_definition(
    table: &TableDescriptor,
    column: &ColumnDescriptor,
    config: &DialectConfig,
) -> OrmResult<String> {
    let mapper = TypeMapper::new(config);
    let name = quote_identifier(&column.name, config)?;
    let mut sql = format!("{name} {}", mapper.data_type_of(column)?.to_sql());

    if column.identity && column.default.is_some() {
        return Err(OrmError::validation(format!(
            "column '{}': an identity column cannot declare a default",
            column.name
        )));
    }
    if column.identity && config.identity == IdentityStrategy::SequenceDefault {
        let seq = sequence_name(&table.name, &column.name, config)?;
        sql.push_str(&format!(" DEFAULT {}.NEXTVAL", quoted_stored(&seq)));
    } else if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default_sql(column, default, config)?);
    }
    if !effective_nullable(table, column) {
        sql.push_str(" NOT NULL");
    }
    if let Some(check) = mapper.check_condition(column, &name) {
        sql.push_str(&format!(" CHECK ({check})"));
    }
    Ok(sql)
}

/// Reject foreign keys Oracle cannot express.
pub(crate) fn check_foreign_key(table: &TableDescriptor, fk: &ForeignKeyDescriptor) -> OrmResult<()> {
    let ctx = || ErrorContext::new("migrate").table(table.name.clone());
    let unsupported = |message: String| {
        OrmError::capability(message).with_context(ctx())
    };
    match fk.on_delete {
        ReferentialAction::NoAction | ReferentialAction::Cascade | ReferentialAction::SetNull => {}
        other => {
            return Err(unsupported(format!(
                "foreign key '{}': ON DELETE {} is not supported",
                fk.name,
                other.as_str()
            )));
        }
    }
    if fk.on_update != ReferentialAction::NoAction {
        return Err(unsupported(format!(
            "foreign key '{}': ON UPDATE {} is not supported",
            fk.name,
            fk.on_update.as_str()
        )));
    }
    if fk.on_delete == ReferentialAction::SetNull {
        for name in &fk.columns {
            let not_null = table
                .find_column(name)
                .is_some_and(|c| !effective_nullable(table, c));
            if not_null {
                return Err(unsupported(format!(
                    "foreign key '{}': ON DELETE SET NULL on NOT NULL column '{name}'",
                    fk.name
                )));
            }
        }
    }
    Ok(())
}

pub(crate) fn create_sequence(table: &str, column: &str, config: &DialectConfig) -> OrmResult<DdlStep> {
    let seq = sequence_name(table, column, config)?;
    Ok(DdlStep::create(
        table,
        format!(
            "CREATE SEQUENCE {} START WITH 1 INCREMENT BY 1",
            quoted_stored(&seq)
        ),
    ))
}

pub(crate) fn create_trigger(table: &str, column: &str, config: &DialectConfig) -> OrmResult<DdlStep> {
    let trg = quoted_stored(&trigger_name(table, column, config)?);
    let seq = quoted_stored(&sequence_name(table, column, config)?);
    let t = quote_identifier(table, config)?;
    let c = quote_identifier(column, config)?;
    Ok(DdlStep::create(
        table,
        format!(
            "CREATE OR REPLACE TRIGGER {trg} BEFORE INSERT ON {t} FOR EACH ROW \
             WHEN (NEW.{c} IS NULL) BEGIN :NEW.{c} := {seq}.NEXTVAL; END;"
        ),
    ))
}

fn identity_steps(
    table: &TableDescriptor,
    column: &ColumnDescriptor,
    config: &DialectConfig,
) -> OrmResult<(DdlStep, Option<DdlStep>)> {
    let seq = create_sequence(&table.name, &column.name, config)?;
    let trigger = match config.identity {
        IdentityStrategy::Trigger => Some(create_trigger(&table.name, &column.name, config)?),
        IdentityStrategy::SequenceDefault => None,
    };
    Ok((seq, trigger))
}

pub(crate) fn create_index(
    table: &TableDescriptor,
    index: &IndexDescriptor,
    config: &DialectConfig,
) -> OrmResult<DdlStep> {
    Ok(DdlStep::create(
        &table.name,
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            quote_identifier(&index.name, config)?,
            quote_identifier(&table.name, config)?,
            column_list(&index.columns, config)?
        ),
    ))
}

pub(crate) fn add_foreign_key(
    table: &TableDescriptor,
    fk: &ForeignKeyDescriptor,
    config: &DialectConfig,
) -> OrmResult<DdlStep> {
    check_foreign_key(table, fk)?;
    let mut sql = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        quote_identifier(&table.name, config)?,
        quote_identifier(&fk.name, config)?,
        column_list(&fk.columns, config)?,
        quote_identifier(&fk.ref_table, config)?,
        column_list(&fk.ref_columns, config)?
    );
    match fk.on_delete {
        ReferentialAction::Cascade => sql.push_str(" ON DELETE CASCADE"),
        ReferentialAction::SetNull => sql.push_str(" ON DELETE SET NULL"),
        _ => {}
    }
    Ok(DdlStep::create(&table.name, sql))
}

pub(crate) fn add_primary_key(table: &TableDescriptor, config: &DialectConfig) -> OrmResult<Option<DdlStep>> {
    let Some(pk) = &table.primary_key else {
        return Ok(None);
    };
    Ok(Some(DdlStep::create(
        &table.name,
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
            quote_identifier(&table.name, config)?,
            quoted_stored(&primary_key_name(table, config)?),
            column_list(&pk.columns, config)?
        ),
    )))
}

pub(crate) fn table_comment(table: &TableDescriptor, comment: &str, config: &DialectConfig) -> OrmResult<DdlStep> {
    Ok(DdlStep::alter(
        &table.name,
        format!(
            "COMMENT ON TABLE {} IS {}",
            quote_identifier(&table.name, config)?,
            literal(comment)
        ),
    ))
}

pub(crate) fn column_comment(
    table: &TableDescriptor,
    column: &ColumnDescriptor,
    comment: &str,
    config: &DialectConfig,
) -> OrmResult<DdlStep> {
    Ok(DdlStep::alter(
        &table.name,
        format!(
            "COMMENT ON COLUMN {}.{} IS {}",
            quote_identifier(&table.name, config)?,
            quote_identifier(&column.name, config)?,
            literal(comment)
        ),
    ))
}

/// Everything needed to bring an absent table into existence, except foreign
/// keys, which are added once every table of a batch exists.
pub(crate) fn create_table(table: &TableDescriptor, config: &DialectConfig) -> OrmResult<Vec<DdlStep>> {
    let mut steps = Vec::new();
    let mut triggers = Vec::new();
    for column in table.identity_columns() {
        let (seq, trigger) = identity_steps(table, column, config)?;
        steps.push(seq);
        triggers.extend(trigger);
    }

    let mut body = table
        .columns
        .iter()
        .map(|c| column_definition(table, c, config))
        .collect::<OrmResult<Vec<_>>>()?;
    if let Some(pk) = &table.primary_key {
        body.push(format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            quoted_stored(&primary_key_name(table, config)?),
            column_list(&pk.columns, config)?
        ));
    }
    steps.push(DdlStep::create(
        &table.name,
        format!(
            "CREATE TABLE {} ({})",
            quote_identifier(&table.name, config)?,
            body.join(", ")
        ),
    ));
    steps.extend(triggers);

    for index in &table.indexes {
        steps.push(create_index(table, index, config)?);
    }
    if let Some(comment) = &table.comment {
        steps.push(table_comment(table, comment, config)?);
    }
    for column in &table.columns {
        if let Some(comment) = &column.comment {
            steps.push(column_comment(table, column, comment, config)?);
        }
    }
    Ok(steps)
}

/// `ALTER TABLE .. ADD (..)`, plus the identity sequence/trigger it needs.
pub(crate) fn add_column(
    table: &TableDescriptor,
    column: &ColumnDescriptor,
    config: &DialectConfig,
) -> OrmResult<Vec<DdlStep>> {
    let mut steps = Vec::new();
    let mut trigger = None;
    if column.identity {
        let (seq, trg) = identity_steps(table, column, config)?;
        steps.push(seq);
        trigger = trg;
    }
    steps.push(DdlStep::create(
        &table.name,
        format!(
            "ALTER TABLE {} ADD ({})",
            quote_identifier(&table.name, config)?,
            column_definition(table, column, config)?
        ),
    ));
    steps.extend(trigger);
    if let Some(comment) = &column.comment {
        steps.push(column_comment(table, column, comment, config)?);
    }
    Ok(steps)
}

pub(crate) fn modify_type(
    table: &TableDescriptor,
    column: &ColumnDescriptor,
    column_type: &ColumnType,
    config: &DialectConfig,
) -> OrmResult<DdlStep> {
    Ok(DdlStep::alter(
        &table.name,
        format!(
            "ALTER TABLE {} MODIFY ({} {})",
            quote_identifier(&table.name, config)?,
            quote_identifier(&column.name, config)?,
            column_type.to_sql()
        ),
    ))
}

pub(crate) fn modify_nullable(
    table: &TableDescriptor,
    column: &ColumnDescriptor,
    nullable: bool,
    config: &DialectConfig,
) -> OrmResult<DdlStep> {
    Ok(DdlStep::alter(
        &table.name,
        format!(
            "ALTER TABLE {} MODIFY ({} {})",
            quote_identifier(&table.name, config)?,
            quote_identifier(&column.name, config)?,
            if nullable { "NULL" } else { "NOT NULL" }
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn users() -> TableDescriptor {
        TableDescriptor::new("users")
            .column(ColumnDescriptor::new("id", FieldType::Int64).identity())
            .column(ColumnDescriptor::new("flag", FieldType::Bool))
            .column(ColumnDescriptor::new("name", FieldType::String).size(50).not_null())
            .primary_key(&["id"])
    }

    #[test]
    fn create_table_with_sequence_default() {
        let steps = create_table(&users(), &DialectConfig::default()).unwrap();
        let sql: Vec<&str> = steps.iter().map(|s| s.sql.as_str()).collect();
        assert_eq!(
            sql,
            vec![
                r#"CREATE SEQUENCE "USERS_ID_SEQ" START WITH 1 INCREMENT BY 1"#,
                concat!(
                    r#"CREATE TABLE "USERS" ("ID" NUMBER(19) DEFAULT "USERS_ID_SEQ".NEXTVAL NOT NULL, "#,
                    r#""FLAG" NUMBER(1) CHECK ("FLAG" IN (0,1)), "#,
                    r#""NAME" VARCHAR2(50 CHAR) NOT NULL, "#,
                    r#"CONSTRAINT "PK_USERS" PRIMARY KEY ("ID"))"#
                ),
            ]
        );
        assert!(steps.iter().all(|s| s.kind == DdlKind::Create));
    }

    #[test]
    fn trigger_identity_strategy() {
        let config = DialectConfig::default().identity(IdentityStrategy::Trigger);
        let steps = create_table(&users(), &config).unwrap();
        assert_eq!(steps.len(), 3);
        assert!(!steps[1].sql.contains("NEXTVAL"));
        assert_eq!(
            steps[2].sql,
            concat!(
                r#"CREATE OR REPLACE TRIGGER "USERS_ID_TRG" BEFORE INSERT ON "USERS" FOR EACH ROW "#,
                r#"WHEN (NEW."ID" IS NULL) BEGIN :NEW."ID" := "USERS_ID_SEQ".NEXTVAL; END;"#
            )
        );
    }

    #[test]
    fn defaults_and_comments_are_literals() {
        let table = TableDescriptor::new("notes")
            .column(
                ColumnDescriptor::new("body", FieldType::String)
                    .size(20)
                    .default_value(ColumnDefault::Text("it's".into()))
                    .comment("the 'body'"),
            )
            .column(
                ColumnDescriptor::new("at", FieldType::InstantTimestamp)
                    .default_value(ColumnDefault::CurrentTimestamp),
            )
            .comment("notes");
        let steps = create_table(&table, &DialectConfig::default()).unwrap();
        assert_eq!(
            steps[0].sql,
            r#"CREATE TABLE "NOTES" ("BODY" VARCHAR2(20 CHAR) DEFAULT 'it''s', "AT" TIMESTAMP(6) WITH TIME ZONE DEFAULT SYSTIMESTAMP)"#
        );
        assert_eq!(steps[1].sql, r#"COMMENT ON TABLE "NOTES" IS 'notes'"#);
        assert_eq!(
            steps[2].sql,
            r#"COMMENT ON COLUMN "NOTES"."BODY" IS 'the ''body'''"#
        );
    }

    #[test]
    fn foreign_key_actions() {
        let config = DialectConfig::default();
        let orders = TableDescriptor::new("orders")
            .column(ColumnDescriptor::new("id", FieldType::Int64))
            .column(ColumnDescriptor::new("user_id", FieldType::Int64))
            .column(ColumnDescriptor::new("owner_id", FieldType::Int64).not_null());

        let cascade = ForeignKeyDescriptor::new("fk_orders_user", &["user_id"], "users", &["id"])
            .on_delete(ReferentialAction::Cascade);
        assert_eq!(
            add_foreign_key(&orders, &cascade, &config).unwrap().sql,
            r#"ALTER TABLE "ORDERS" ADD CONSTRAINT "FK_ORDERS_USER" FOREIGN KEY ("USER_ID") REFERENCES "USERS" ("ID") ON DELETE CASCADE"#
        );

        let restrict = cascade.clone().on_delete(ReferentialAction::Restrict);
        assert!(matches!(
            add_foreign_key(&orders, &restrict, &config),
            Err(OrmError::Capability { .. })
        ));

        let on_update = cascade.clone().on_update(ReferentialAction::Cascade);
        assert!(add_foreign_key(&orders, &on_update, &config).is_err());

        let set_default = cascade.clone().on_delete(ReferentialAction::SetDefault);
        assert!(add_foreign_key(&orders, &set_default, &config).is_err());

        let set_null_on_not_null =
            ForeignKeyDescriptor::new("fk_orders_owner", &["owner_id"], "users", &["id"])
                .on_delete(ReferentialAction::SetNull);
        let err = add_foreign_key(&orders, &set_null_on_not_null, &config).unwrap_err();
        assert_eq!(err.context().unwrap().table.as_deref(), Some("orders"));
    }

    #[test]
    fn long_generated_names_are_shortened() {
        let config = DialectConfig::default().max_identifier_length(30);
        let name = sequence_name("a_really_long_table_name", "a_really_long_column", &config).unwrap();
        assert!(name.len() <= 30);
        assert_eq!(
            name,
            sequence_name("a_really_long_table_name", "a_really_long_column", &config).unwrap()
        );
    }

    #[test]
    fn identity_with_default_is_invalid() {
        let table = TableDescriptor::new("t").column(
            ColumnDescriptor::new("id", FieldType::Int64)
                .identity()
                .default_value(ColumnDefault::Int(1)),
        );
        assert!(create_table(&table, &DialectConfig::default()).is_err());
    }

    #[test]
    fn non_finite_float_defaults_are_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let table = TableDescriptor::new("t").column(
                ColumnDescriptor::new("ratio", FieldType::Float64)
                    .default_value(ColumnDefault::Float(bad)),
            );
            let err = create_table(&table, &DialectConfig::default()).unwrap_err();
            assert!(matches!(err, OrmError::Validation(_)), "{bad}: {err:?}");
            assert!(err.to_string().contains("'ratio'"));
        }

        let table = TableDescriptor::new("t").column(
            ColumnDescriptor::new("ratio", FieldType::Float64)
                .default_value(ColumnDefault::Float(0.5)),
        );
        let steps = create_table(&table, &DialectConfig::default()).unwrap();
        assert_eq!(
            steps[0].sql,
            r#"CREATE TABLE "T" ("RATIO" BINARY_DOUBLE DEFAULT 0.5)"#
        );
    }
}
