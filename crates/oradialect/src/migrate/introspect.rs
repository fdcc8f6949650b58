//! Data dictionary queries.
//!
//! Without an owner schema the `USER_*` views are read. When the dialect
//! config names a schema, or the table name is owner-qualified, the `ALL_*`
//! views are read with an `OWNER` filter instead. Names are compared in their
//! stored spelling.

use crate::client::GenericClient;
use crate::config::DialectConfig;
use crate::error::{OrmError, OrmResult};
use crate::exec::Executor;
use crate::ident::Ident;
use crate::migrate::diff::{ColumnInfo, LiveTable};
use crate::placeholder::{Args, translate};
use crate::row::Row;
use crate::statement::{ResultShape, Statement};
use crate::types::ColumnType;
use crate::value::Value;

/// A table name split into its stored owner (if any) and stored name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredTable {
    pub(crate) owner: Option<String>,
    pub(crate) name: String,
}

impl StoredTable {
    pub(crate) fn parse(table: &str, config: &DialectConfig) -> OrmResult<Self> {
        let ident = Ident::parse(table)?;
        let stored = |part: &crate::ident::IdentPart| {
            Ident {
                parts: vec![part.clone()],
            }
            .stored_name(config)
            .ok_or_else(|| OrmError::validation(format!("'{table}' is not a table name")))
        };
        let owner_from_config = || {
            config
                .schema
                .as_deref()
                .map(|s| crate::ident::stored_name(s, config))
                .transpose()
        };
        match ident.parts.as_slice() {
            [name] => Ok(Self {
                owner: owner_from_config()?,
                name: stored(name)?,
            }),
            [owner, name] => Ok(Self {
                owner: Some(stored(owner)?),
                name: stored(name)?,
            }),
            _ => Err(OrmError::validation(format!(
                "'{table}' is not a table name, expected `[owner.]table`"
            ))),
        }
    }
}

/// `SELECT <columns> FROM USER_<view> WHERE <filter>` with `?` markers, or
/// the `ALL_<view>` form restricted to one owner.
fn dictionary_query(
    config: &DialectConfig,
    owner: Option<&str>,
    view: &str,
    columns: &str,
    filter: Option<&str>,
    mut values: Vec<Value>,
) -> OrmResult<Statement> {
    let mut sql = match owner {
        Some(_) => format!("SELECT {columns} FROM ALL_{view}"),
        None => format!("SELECT {columns} FROM USER_{view}"),
    };
    let mut conditions: Vec<&str> = filter.into_iter().collect();
    if let Some(owner) = owner {
        conditions.push("OWNER = ?");
        values.push(Value::Text(owner.to_string()));
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    Ok(translate(&sql, Args::positional(values), config)?.operation("introspect"))
}

async fn table_query<C: GenericClient>(
    exec: &Executor<'_, C>,
    table: &StoredTable,
    view: &str,
    columns: &str,
    order: &str,
) -> OrmResult<Vec<Row>> {
    let mut statement = dictionary_query(
        exec.config(),
        table.owner.as_deref(),
        view,
        columns,
        Some("TABLE_NAME = ?"),
        vec![Value::Text(table.name.clone())],
    )?;
    statement.sql.push_str(order);
    exec.query(&statement).await
}

fn column_info(row: &Row) -> OrmResult<ColumnInfo> {
    let data_type: String = row.get("DATA_TYPE")?;
    let column_type = ColumnType::from_dictionary(
        &data_type,
        row.get("DATA_PRECISION")?,
        row.get("DATA_SCALE")?,
        row.get("CHAR_LENGTH")?,
        row.get("DATA_LENGTH")?,
    );
    let nullable: String = row.get("NULLABLE")?;
    Ok(ColumnInfo {
        name: row.get("COLUMN_NAME")?,
        column_type,
        nullable: nullable == "Y",
    })
}

/// Columns of a table or view in declaration order; empty when it is absent.
pub(crate) async fn columns<C: GenericClient>(
    exec: &Executor<'_, C>,
    table: &StoredTable,
) -> OrmResult<Vec<ColumnInfo>> {
    let rows = table_query(
        exec,
        table,
        "TAB_COLUMNS",
        "COLUMN_NAME, DATA_TYPE, DATA_PRECISION, DATA_SCALE, CHAR_LENGTH, DATA_LENGTH, NULLABLE",
        " ORDER BY COLUMN_ID",
    )
    .await?;
    rows.iter().map(column_info).collect()
}

/// Whether a table (not a view) with this name exists.
pub(crate) async fn table_exists<C: GenericClient>(
    exec: &Executor<'_, C>,
    table: &StoredTable,
) -> OrmResult<bool> {
    let rows = table_query(exec, table, "TABLES", "TABLE_NAME", "").await?;
    Ok(!rows.is_empty())
}

pub(crate) async fn index_names<C: GenericClient>(
    exec: &Executor<'_, C>,
    table: &StoredTable,
) -> OrmResult<Vec<String>> {
    let rows = table_query(exec, table, "INDEXES", "INDEX_NAME", "").await?;
    rows.iter().map(|r| r.get("INDEX_NAME")).collect()
}

pub(crate) async fn constraint_names<C: GenericClient>(
    exec: &Executor<'_, C>,
    table: &StoredTable,
) -> OrmResult<Vec<String>> {
    let rows = table_query(exec, table, "CONSTRAINTS", "CONSTRAINT_NAME", "").await?;
    rows.iter().map(|r| r.get("CONSTRAINT_NAME")).collect()
}

async fn comments<C: GenericClient>(
    exec: &Executor<'_, C>,
    table: &StoredTable,
) -> OrmResult<(Option<String>, Vec<(String, String)>)> {
    let table_rows = table_query(exec, table, "TAB_COMMENTS", "COMMENTS", "").await?;
    let comment = match table_rows.first() {
        Some(row) => row.get::<Option<String>>("COMMENTS")?,
        None => None,
    };
    let column_rows = table_query(exec, table, "COL_COMMENTS", "COLUMN_NAME, COMMENTS", "").await?;
    let mut column_comments = Vec::new();
    for row in &column_rows {
        if let Some(text) = row.get::<Option<String>>("COMMENTS")? {
            column_comments.push((row.get("COLUMN_NAME")?, text));
        }
    }
    Ok((comment, column_comments))
}

/// Everything the diff needs about a table, or `None` when it is absent.
/// Comments are only read when `with_comments` is set.
pub(crate) async fn live_table<C: GenericClient>(
    exec: &Executor<'_, C>,
    table: &StoredTable,
    with_comments: bool,
) -> OrmResult<Option<LiveTable>> {
    if !table_exists(exec, table).await? {
        return Ok(None);
    }
    let columns = columns(exec, table).await?;
    let indexes = index_names(exec, table).await?;
    let constraints = constraint_names(exec, table).await?;
    let (comment, column_comments) = if with_comments {
        comments(exec, table).await?
    } else {
        (None, Vec::new())
    };
    Ok(Some(LiveTable {
        columns,
        indexes,
        constraints,
        comment,
        column_comments,
    }))
}

/// Stored names of every table visible in the schema.
pub(crate) async fn table_names<C: GenericClient>(exec: &Executor<'_, C>) -> OrmResult<Vec<String>> {
    let config = exec.config();
    let owner = config
        .schema
        .as_deref()
        .map(|s| crate::ident::stored_name(s, config))
        .transpose()?;
    let mut statement = dictionary_query(config, owner.as_deref(), "TABLES", "TABLE_NAME", None, Vec::new())?;
    statement.sql.push_str(" ORDER BY TABLE_NAME");
    let rows = exec.query(&statement).await?;
    rows.iter().map(|r| r.get("TABLE_NAME")).collect()
}

pub(crate) async fn current_schema<C: GenericClient>(exec: &Executor<'_, C>) -> OrmResult<String> {
    let statement = Statement::new(
        "SELECT SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA') FROM DUAL",
        crate::statement::Binds::empty(),
        ResultShape::Rows,
    )
    .operation("introspect");
    exec.query_one(&statement).await?.get_idx(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaceholderStyle;
    use crate::statement::Binds;

    #[test]
    fn user_views_without_owner() {
        let config = DialectConfig::default();
        let stmt = dictionary_query(
            &config,
            None,
            "INDEXES",
            "INDEX_NAME",
            Some("TABLE_NAME = ?"),
            vec![Value::Text("USERS".into())],
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT INDEX_NAME FROM USER_INDEXES WHERE TABLE_NAME = :1");
        assert_eq!(stmt.shape, ResultShape::Rows);
    }

    #[test]
    fn all_views_with_owner() {
        let config = DialectConfig::default().placeholder_style(PlaceholderStyle::Named);
        let table = StoredTable::parse("app.users", &config).unwrap();
        assert_eq!(table.owner.as_deref(), Some("APP"));
        let stmt = dictionary_query(
            &config,
            table.owner.as_deref(),
            "TAB_COLUMNS",
            "COLUMN_NAME",
            Some("TABLE_NAME = ?"),
            vec![Value::Text(table.name.clone())],
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT COLUMN_NAME FROM ALL_TAB_COLUMNS WHERE TABLE_NAME = :p1 AND OWNER = :p2"
        );
        assert_eq!(
            stmt.binds,
            Binds::Named(vec![
                ("p1".into(), Value::Text("USERS".into())),
                ("p2".into(), Value::Text("APP".into())),
            ])
        );
    }

    #[test]
    fn configured_schema_is_the_default_owner() {
        let config = DialectConfig::default().schema("sales");
        let table = StoredTable::parse("\"Orders\"", &config).unwrap();
        assert_eq!(
            table,
            StoredTable {
                owner: Some("SALES".into()),
                name: "Orders".into()
            }
        );
        assert!(StoredTable::parse("a.b.c", &config).is_err());
    }
}
