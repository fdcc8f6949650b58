//! Query builders emitting Oracle SQL.
//!
//! Builders collect columns, values and conditions, then assemble a native
//! [`Statement`](crate::Statement) (or an [`ExecPlan`](crate::ExecPlan) for
//! writes) against a [`DialectConfig`](crate::DialectConfig).
//!
//! # Features
//!
//! - **Quoted identifiers**: table and column names are quoted per the dialect's case policy
//! - **Bind-only values**: values become `:n` / `:name` markers, never SQL text
//! - **Oracle clauses**: OFFSET/FETCH or ROWNUM pagination, RETURNING INTO, MERGE upserts
//! - **Global-mutation guard**: UPDATE/DELETE without WHERE fail unless explicitly allowed
//!
//! # Usage
//!
//! ```ignore
//! use oradialect::qb;
//!
//! let users = qb::select("users")
//!     .eq("status", "active")
//!     .order_by_desc("created_at")
//!     .limit(20)
//!     .fetch_all::<(i64, String), _>(&exec)
//!     .await?;
//!
//! let ids = qb::insert("users")
//!     .set("name", "alice")
//!     .returning(&["id"])
//!     .fetch_returning::<(i64,), _>(&exec)
//!     .await?;
//!
//! qb::update("users")
//!     .set("status", "inactive")
//!     .eq("id", user_id)
//!     .execute(&exec)
//!     .await?;
//! ```

mod delete;
mod expr;
mod insert;
mod merge;
mod select;
mod traits;
mod update;

pub use delete::DeleteQb;
pub use expr::{CompareOp, Expr, ExprGroup};
pub use insert::InsertQb;
pub use merge::MergeQb;
pub use select::{LockMode, SelectQb};
pub use traits::{MutationQb, SqlQb};
pub use update::UpdateQb;

use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::placeholder::Emitter;
use crate::schema::TableDescriptor;
use crate::statement::OutBind;
use crate::types::TypeMapper;
use crate::value::Value;

/// Create a SELECT query builder for the given table.
pub fn select(table: &str) -> SelectQb {
    SelectQb::new(table)
}

/// Create an INSERT query builder for the given table.
pub fn insert(table: &str) -> InsertQb {
    InsertQb::new(table)
}

/// Create an INSERT query builder typed by a table descriptor.
///
/// Values are checked against the declared column types before dispatch.
pub fn insert_into(table: &TableDescriptor) -> InsertQb {
    InsertQb::for_table(table)
}

/// Create an UPDATE query builder for the given table.
pub fn update(table: &str) -> UpdateQb {
    UpdateQb::new(table)
}

/// Create a DELETE query builder for the given table.
///
/// A DELETE without WHERE conditions fails at build time unless
/// [`DeleteQb::allow_all`] is set.
pub fn delete(table: &str) -> DeleteQb {
    DeleteQb::new(table)
}

/// Create a MERGE (upsert) builder matching rows on `keys`.
pub fn merge(table: &str, keys: &[&str]) -> MergeQb {
    MergeQb::new(table, keys)
}

/// Write a (possibly dotted) identifier, quoted.
pub(crate) fn write_ident(out: &mut Emitter<'_>, name: &str) -> OrmResult<()> {
    let ident = Ident::parse(name)?;
    ident.write_sql(out.config(), &mut out.sql);
    Ok(())
}

/// Write `table [alias]`. `table AS alias` is accepted; Oracle does not
/// allow `AS` before a table alias, so it is dropped.
pub(crate) fn write_table_ref(out: &mut Emitter<'_>, table_ref: &str) -> OrmResult<()> {
    let words = split_words(table_ref)?;
    let (table, alias) = match words.as_slice() {
        [table] => (*table, None),
        [table, alias] => (*table, Some(*alias)),
        [table, kw, alias] if kw.eq_ignore_ascii_case("as") => (*table, Some(*alias)),
        _ => {
            return Err(OrmError::validation(format!(
                "invalid table reference {table_ref:?}, expected `table [alias]`"
            )));
        }
    };
    write_ident(out, table)?;
    if let Some(alias) = alias {
        out.push(' ');
        write_ident(out, alias)?;
    }
    Ok(())
}

/// Split on whitespace outside double quotes.
fn split_words(s: &str) -> OrmResult<Vec<&str>> {
    let mut words = Vec::new();
    let mut start = None;
    let mut quoted = false;
    for (i, c) in s.char_indices() {
        match c {
            '"' => {
                quoted = !quoted;
                start.get_or_insert(i);
            }
            c if c.is_whitespace() && !quoted => {
                if let Some(from) = start.take() {
                    words.push(&s[from..i]);
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if quoted {
        return Err(OrmError::validation(format!(
            "unclosed quoted identifier in {s:?}"
        )));
    }
    if let Some(from) = start {
        words.push(&s[from..]);
    }
    Ok(words)
}

/// Encode one column value, using the descriptor's column type when known.
pub(crate) fn encode_for(
    mapper: &TypeMapper<'_>,
    table: Option<&TableDescriptor>,
    column: &str,
    value: Value,
) -> OrmResult<Value> {
    match table.and_then(|t| t.find_column(column)) {
        Some(desc) => mapper.encode(value, desc),
        None => Ok(mapper.encode_untyped(value)),
    }
}

/// Write ` RETURNING c1, c2 INTO :o1, :o2` and describe the out binds.
pub(crate) fn write_returning(
    out: &mut Emitter<'_>,
    table: Option<&TableDescriptor>,
    columns: &[String],
    rows: usize,
) -> OrmResult<Vec<OutBind>> {
    let mapper = TypeMapper::new(out.config());
    out.push_str(" RETURNING ");
    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_ident(out, col)?;
    }
    out.push_str(" INTO ");
    let mut outs = Vec::with_capacity(columns.len());
    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let marker = out.out_marker();
        let column_type = match table.and_then(|t| t.find_column(col)) {
            Some(desc) => Some(mapper.data_type_of(desc)?),
            None => None,
        };
        outs.push(OutBind {
            marker,
            column: col.clone(),
            column_type,
            rows,
        });
    }
    Ok(outs)
}

/// Fail when RETURNING is requested but the dialect cannot emit it.
pub(crate) fn check_returning(out: &Emitter<'_>, operation: &str) -> OrmResult<()> {
    if out.config().supports_returning {
        Ok(())
    } else {
        Err(OrmError::capability(format!(
            "RETURNING on {operation} is disabled for this dialect"
        )))
    }
}

#[cfg(test)]
mod tests;
