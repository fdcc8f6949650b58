//! Trait definitions for query builders.

use crate::client::GenericClient;
use crate::config::DialectConfig;
use crate::error::OrmResult;
use crate::exec::Executor;
use crate::row::{FromRow, Row};
use crate::statement::{ExecPlan, Statement};

/// Builders that assemble into a single row-producing statement.
pub trait SqlQb: Sync {
    /// Assemble the native statement.
    fn build(&self, config: &DialectConfig) -> OrmResult<Statement>;

    /// Debug helper returning the SQL text.
    fn to_sql(&self, config: &DialectConfig) -> OrmResult<String> {
        Ok(self.build(config)?.sql)
    }

    /// Execute query and return all rows.
    fn query<C: GenericClient>(
        &self,
        exec: &Executor<'_, C>,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send {
        async move {
            let statement = self.build(exec.config())?;
            exec.query(&statement).await
        }
    }

    /// Execute query and return at most one row.
    fn query_opt<C: GenericClient>(
        &self,
        exec: &Executor<'_, C>,
    ) -> impl std::future::Future<Output = OrmResult<Option<Row>>> + Send {
        async move {
            let statement = self.build(exec.config())?;
            exec.query_opt(&statement).await
        }
    }

    /// Execute query and return the first row, or `NotFound`.
    fn query_one<C: GenericClient>(
        &self,
        exec: &Executor<'_, C>,
    ) -> impl std::future::Future<Output = OrmResult<Row>> + Send {
        async move {
            let statement = self.build(exec.config())?;
            exec.query_one(&statement).await
        }
    }

    /// Execute query and map all rows to `T`.
    fn fetch_all<T: FromRow + Send, C: GenericClient>(
        &self,
        exec: &Executor<'_, C>,
    ) -> impl std::future::Future<Output = OrmResult<Vec<T>>> + Send {
        async move {
            let rows = self.query(exec).await?;
            rows.iter().map(T::from_row).collect()
        }
    }

    /// Execute query and map at most one row to `T`.
    fn fetch_opt<T: FromRow + Send, C: GenericClient>(
        &self,
        exec: &Executor<'_, C>,
    ) -> impl std::future::Future<Output = OrmResult<Option<T>>> + Send {
        async move {
            let row = self.query_opt(exec).await?;
            row.as_ref().map(T::from_row).transpose()
        }
    }

    /// Execute query and map the first row to `T`.
    fn fetch_one<T: FromRow + Send, C: GenericClient>(
        &self,
        exec: &Executor<'_, C>,
    ) -> impl std::future::Future<Output = OrmResult<T>> + Send {
        async move {
            let row = self.query_one(exec).await?;
            T::from_row(&row)
        }
    }
}

/// Builders for INSERT/UPDATE/DELETE/MERGE.
///
/// A mutation may need several physical statements (sub-batches, per-row
/// RETURNING), so it assembles an [`ExecPlan`].
pub trait MutationQb: Sync {
    /// Assemble the execution plan.
    fn build_plan(&self, config: &DialectConfig) -> OrmResult<ExecPlan>;

    /// Execute and return the affected row count.
    fn execute<C: GenericClient>(
        &self,
        exec: &Executor<'_, C>,
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send {
        async move {
            let plan = self.build_plan(exec.config())?;
            Ok(exec.run(&plan).await?.rows_affected)
        }
    }

    /// Execute and return the RETURNING rows, one per affected row. For
    /// inserts they are ordered like the input rows.
    fn returning_rows<C: GenericClient>(
        &self,
        exec: &Executor<'_, C>,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send {
        async move {
            let plan = self.build_plan(exec.config())?;
            Ok(exec.run(&plan).await?.rows)
        }
    }

    /// Execute and map the RETURNING rows to `T`.
    fn fetch_returning<T: FromRow + Send, C: GenericClient>(
        &self,
        exec: &Executor<'_, C>,
    ) -> impl std::future::Future<Output = OrmResult<Vec<T>>> + Send {
        async move {
            let rows = self.returning_rows(exec).await?;
            rows.iter().map(T::from_row).collect()
        }
    }
}
