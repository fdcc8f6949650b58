//! Declared-versus-live comparison for tables that already exist.

use crate::config::DialectConfig;
use crate::error::OrmResult;
use crate::ident::stored_name;
use crate::migrate::ddl::{self, DdlStep, effective_nullable, primary_key_name};
use crate::schema::TableDescriptor;
use crate::types::{ColumnType, TypeChange, TypeMapper, compare_types};

/// A column as the data dictionary reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Stored name, exactly as in the dictionary.
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

/// What the dictionary knows about one existing table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveTable {
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<String>,
    pub constraints: Vec<String>,
    pub comment: Option<String>,
    pub column_comments: Vec<(String, String)>,
}

impl LiveTable {
    pub fn column(&self, stored: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == stored)
    }

    pub fn has_index(&self, stored: &str) -> bool {
        self.indexes.iter().any(|i| i == stored)
    }

    pub fn has_constraint(&self, stored: &str) -> bool {
        self.constraints.iter().any(|c| c == stored)
    }

    fn column_comment(&self, stored: &str) -> Option<&str> {
        self.column_comments
            .iter()
            .find(|(c, _)| c == stored)
            .map(|(_, text)| text.as_str())
    }
}

/// A declared change the migrator refused to apply implicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedChange {
    pub table: String,
    pub column: String,
    pub reason: String,
}

/// Steps that bring an existing table up to its declaration, plus the
/// changes that would need an explicit call. Foreign keys are left to the
/// caller.
pub(crate) fn diff_table(
    table: &TableDescriptor,
    live: &LiveTable,
    config: &DialectConfig,
) -> OrmResult<(Vec<DdlStep>, Vec<SkippedChange>)> {
    let mapper = TypeMapper::new(config);
    let mut steps = Vec::new();
    let mut skipped = Vec::new();
    let mut skip = |column: &str, reason: String| {
        tracing::warn!(
            target: "oradialect.migrate",
            table = %table.name,
            column,
            %reason,
            "skipping change that needs an explicit migration"
        );
        skipped.push(SkippedChange {
            table: table.name.clone(),
            column: column.to_string(),
            reason,
        });
    };

    for column in &table.columns {
        let stored = stored_name(&column.name, config)?;
        let Some(current) = live.column(&stored) else {
            steps.extend(ddl::add_column(table, column, config)?);
            continue;
        };

        let declared = mapper.data_type_of(column)?;
        match compare_types(&current.column_type, &declared) {
            TypeChange::Same => {}
            TypeChange::Widen => steps.push(ddl::modify_type(table, column, &declared, config)?),
            TypeChange::Narrow => skip(
                &column.name,
                format!("narrowing {} to {declared}", current.column_type),
            ),
            TypeChange::Incompatible => skip(
                &column.name,
                format!("changing {} to {declared}", current.column_type),
            ),
        }

        let nullable = effective_nullable(table, column);
        if nullable && !current.nullable {
            steps.push(ddl::modify_nullable(table, column, true, config)?);
        } else if !nullable && current.nullable {
            skip(&column.name, "tightening NULL to NOT NULL".to_string());
        }

        if let Some(comment) = &column.comment {
            if live.column_comment(&stored) != Some(comment.as_str()) {
                steps.push(ddl::column_comment(table, column, comment, config)?);
            }
        }
    }

    if table.primary_key.is_some() && !live.has_constraint(&primary_key_name(table, config)?) {
        steps.extend(ddl::add_primary_key(table, config)?);
    }
    for index in &table.indexes {
        if !live.has_index(&stored_name(&index.name, config)?) {
            steps.push(ddl::create_index(table, index, config)?);
        }
    }
    if let Some(comment) = &table.comment {
        if live.comment.as_deref() != Some(comment.as_str()) {
            steps.push(ddl::table_comment(table, comment, config)?);
        }
    }
    Ok((steps, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDescriptor, FieldType, IndexDescriptor};

    fn users() -> TableDescriptor {
        TableDescriptor::new("users")
            .column(ColumnDescriptor::new("id", FieldType::Int64).identity())
            .column(ColumnDescriptor::new("name", FieldType::String).size(50).not_null())
            .primary_key(&["id"])
            .index(IndexDescriptor::new("idx_users_name", &["name"]))
    }

    fn col(name: &str, column_type: ColumnType, nullable: bool) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            column_type,
            nullable,
        }
    }

    fn live_users(name_size: u32) -> LiveTable {
        LiveTable {
            columns: vec![
                col(
                    "ID",
                    ColumnType::Number {
                        precision: Some(19),
                        scale: Some(0),
                    },
                    false,
                ),
                col("NAME", ColumnType::Varchar2 { size: name_size }, false),
            ],
            indexes: vec!["PK_USERS".into(), "IDX_USERS_NAME".into()],
            constraints: vec!["PK_USERS".into(), "SYS_C0012".into()],
            ..LiveTable::default()
        }
    }

    #[test]
    fn matching_table_needs_nothing() {
        let (steps, skipped) =
            diff_table(&users(), &live_users(50), &DialectConfig::default()).unwrap();
        assert!(steps.is_empty(), "{steps:?}");
        assert!(skipped.is_empty());
    }

    #[test]
    fn widening_is_applied() {
        let (steps, _) = diff_table(&users(), &live_users(20), &DialectConfig::default()).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(
            steps[0].sql,
            r#"ALTER TABLE "USERS" MODIFY ("NAME" VARCHAR2(50 CHAR))"#
        );
    }

    #[test]
    fn narrowing_is_skipped_and_reported() {
        let (steps, skipped) =
            diff_table(&users(), &live_users(80), &DialectConfig::default()).unwrap();
        assert!(steps.is_empty());
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].column, "name");
    }

    #[test]
    fn missing_columns_indexes_and_relaxed_nulls() {
        let table = users()
            .column(ColumnDescriptor::new("email", FieldType::String).size(100))
            .index(IndexDescriptor::new("uq_users_email", &["email"]).unique());
        let mut live = live_users(50);
        live.columns[1].nullable = true;
        let mut declared = table.clone();
        declared.columns[1].nullable = true;

        let (steps, skipped) = diff_table(&declared, &live, &DialectConfig::default()).unwrap();
        let sql: Vec<&str> = steps.iter().map(|s| s.sql.as_str()).collect();
        assert_eq!(
            sql,
            vec![
                r#"ALTER TABLE "USERS" ADD ("EMAIL" VARCHAR2(100 CHAR))"#,
                r#"CREATE UNIQUE INDEX "UQ_USERS_EMAIL" ON "USERS" ("EMAIL")"#,
            ]
        );
        assert!(skipped.is_empty());

        // Live NOT NULL, declared nullable: relaxing is safe.
        let live = live_users(50);
        let (steps, _) = diff_table(&declared, &live, &DialectConfig::default()).unwrap();
        assert!(steps.iter().any(|s| s.sql == r#"ALTER TABLE "USERS" MODIFY ("NAME" NULL)"#));
    }

    #[test]
    fn type_family_change_is_skipped() {
        let mut live = live_users(50);
        live.columns[1].column_type = ColumnType::Clob;
        let (steps, skipped) = diff_table(&users(), &live, &DialectConfig::default()).unwrap();
        assert!(steps.is_empty());
        assert_eq!(skipped.len(), 1);
    }
}
