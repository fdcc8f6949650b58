//! # oradialect
//!
//! An Oracle Database dialect adapter for ORM cores.
//!
//! ## Features
//!
//! - **Portable statements**: `?` / `@name` markers become `:1` or `:name` binds; values never reach SQL text
//! - **Type mapping**: semantic field types to `NUMBER`, `VARCHAR2`, `TIMESTAMP WITH TIME ZONE`, ...,
//!   with pre-dispatch range and length checks
//! - **Oracle clauses**: OFFSET/FETCH or ROWNUM pagination, `RETURNING ... INTO`, MERGE upserts
//! - **Safe defaults**: UPDATE/DELETE require WHERE unless explicitly allowed
//! - **Migrations**: dictionary introspection and idempotent create/alter DDL, sequences and
//!   triggers for identity columns
//! - **Error classification**: ORA codes mapped to canonical kinds (opt-in)
//!
//! ## Usage
//!
//! ```ignore
//! use oradialect::{Dialect, DialectConfig, MutationQb, SqlQb, qb};
//!
//! let dialect = Dialect::new(DialectConfig::default());
//! dialect.migrator(&conn).auto_migrate(&[users_table]).await?;
//!
//! let exec = dialect.executor(&conn);
//! let ids: Vec<(i64,)> = qb::insert_into(&users_table)
//!     .set("name", "alice")
//!     .set("flag", true)
//!     .returning(&["id"])
//!     .fetch_returning(&exec)
//!     .await?;
//!
//! let page = qb::select("users")
//!     .order_by_asc("id")
//!     .limit(20)
//!     .offset(40)
//!     .query(&exec)
//!     .await?;
//! ```
//!
//! The native driver plugs in through [`GenericClient`] (and
//! [`pool::Connector`] for pooling).

pub mod classify;
pub mod client;
pub mod config;
pub mod dialect;
pub mod dsn;
pub mod error;
pub mod exec;
pub mod ident;
pub mod migrate;
pub mod placeholder;
pub mod qb;
pub mod query;
pub mod row;
pub mod schema;
pub mod statement;
pub mod types;
pub mod value;

pub use client::GenericClient;
pub use config::{
    AdapterConfig, DialectConfig, IdentifierCase, IdentityStrategy, OverflowPolicy,
    PaginationStyle, PlaceholderStyle,
};
pub use dialect::{Dialect, Translate};
pub use dsn::{ConnectParams, parse_dsn};
pub use error::{ClassifiedError, DbError, ErrorContext, ErrorKind, OrmError, OrmResult};
pub use exec::{CallOptions, ExecOutcome, Executor};
pub use ident::{quote_identifier, shorten};
pub use migrate::{MigrationPlan, MigrationReport, Migrator, TableState};
pub use placeholder::{Args, translate};
pub use query::{RawSql, raw};
pub use row::{FromRow, ReturnedRow, Row};
pub use schema::{
    ColumnDefault, ColumnDescriptor, FieldType, ForeignKeyDescriptor, IndexDescriptor,
    PrimaryKey, ReferentialAction, TableDescriptor,
};
pub use statement::{Binds, ExecPlan, OutBind, ResultShape, ReturningMode, Statement};
pub use types::{ColumnType, TypeChange, TypeMapper, compare_types};
pub use value::{FromValue, ToValue, Value};

// Re-export qb module for easy access
pub use qb::{
    DeleteQb, Expr, ExprGroup, InsertQb, MergeQb, MutationQb, SelectQb, SqlQb, UpdateQb, delete,
    insert, insert_into, merge, select, update,
};

#[cfg(feature = "pool")]
pub mod pool;
