//! The client seam between this crate and a native Oracle driver.
//!
//! Anything that can run native SQL with binds (a pooled connection, a
//! test double) implements [`GenericClient`]. The executor and migrator only
//! talk to this trait.

use crate::error::{OrmError, OrmResult};
use crate::row::{ReturnedRow, Row};
use crate::statement::{Binds, OutBind};
use crate::value::Value;

/// A connection able to run native statements.
pub trait GenericClient: Send + Sync {
    /// Run a query and return all rows.
    fn query(
        &self,
        sql: &str,
        binds: &Binds,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Run a statement and return the affected row count.
    fn execute(
        &self,
        sql: &str,
        binds: &Binds,
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Run a statement once per bind row using array DML.
    fn execute_batch(
        &self,
        sql: &str,
        rows: &[Vec<Value>],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Run a statement with `RETURNING ... INTO` out binds.
    ///
    /// Each returned row carries the index of the bind row that produced it
    /// (always `0` for non-batch binds). Row columns are the out binds'
    /// `column` names, in order.
    fn execute_returning(
        &self,
        sql: &str,
        binds: &Binds,
        outs: &[OutBind],
    ) -> impl std::future::Future<Output = OrmResult<Vec<ReturnedRow>>> + Send;

    /// Start a transaction.
    fn begin(&self) -> impl std::future::Future<Output = OrmResult<()>> + Send;

    fn commit(&self) -> impl std::future::Future<Output = OrmResult<()>> + Send;

    fn rollback(&self) -> impl std::future::Future<Output = OrmResult<()>> + Send;

    /// Whether a transaction is open on this client.
    fn in_transaction(&self) -> bool;

    /// Mark the connection unusable. Called after a timed-out or cancelled
    /// statement, whose server-side state is unknown.
    fn invalidate(&self);

    /// Whether the connection may be reused.
    fn is_valid(&self) -> bool {
        true
    }

    /// Create a savepoint inside the current transaction.
    fn savepoint(&self, name: &str) -> impl std::future::Future<Output = OrmResult<()>> + Send {
        let sql = format!("SAVEPOINT {name}");
        async move {
            self.execute(&sql, &Binds::empty()).await?;
            Ok(())
        }
    }

    /// Roll back to a savepoint, keeping the surrounding transaction open.
    fn rollback_to_savepoint(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = OrmResult<()>> + Send {
        let sql = format!("ROLLBACK TO SAVEPOINT {name}");
        async move {
            self.execute(&sql, &Binds::empty()).await?;
            Ok(())
        }
    }

    /// Run a query and return the first row.
    ///
    /// - 0 rows: [`OrmError::NotFound`]
    /// - 1 or more rows: the first row
    fn query_one(
        &self,
        sql: &str,
        binds: &Binds,
    ) -> impl std::future::Future<Output = OrmResult<Row>> + Send {
        async move {
            self.query(sql, binds)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| OrmError::not_found("Expected 1 row, got 0"))
        }
    }

    /// Run a query and require exactly one row.
    fn query_one_strict(
        &self,
        sql: &str,
        binds: &Binds,
    ) -> impl std::future::Future<Output = OrmResult<Row>> + Send {
        async move {
            let mut rows = self.query(sql, binds).await?;
            match rows.len() {
                0 => Err(OrmError::not_found("Expected 1 row, got 0")),
                1 => Ok(rows.remove(0)),
                got => Err(OrmError::too_many_rows(1, got)),
            }
        }
    }

    /// Run a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        binds: &Binds,
    ) -> impl std::future::Future<Output = OrmResult<Option<Row>>> + Send {
        async move { Ok(self.query(sql, binds).await?.into_iter().next()) }
    }
}
