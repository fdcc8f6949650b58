//! Statement execution against a [`GenericClient`].
//!
//! The [`Executor`] is the only place statements meet a connection. It
//! checks bind counts, applies the caller's deadline and cancellation token,
//! wraps multi-statement plans in a transaction (or a savepoint inside a
//! caller transaction), verifies RETURNING correlation and classifies native
//! errors when the dialect asks for it.

use crate::classify;
use crate::client::GenericClient;
use crate::config::DialectConfig;
use crate::error::{ErrorContext, OrmError, OrmResult};
use crate::row::{ReturnedRow, Row};
use crate::statement::{Binds, ExecPlan, ResultShape, Statement};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Savepoint used when a plan runs inside a caller-owned transaction.
const PLAN_SAVEPOINT: &str = "ORADIALECT_PLAN";

/// Per-call deadline and cancellation.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abandon the call once `timeout` has elapsed.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abandon the call when `token` is cancelled.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Result of running a plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Query rows, or RETURNING rows ordered by input row.
    pub rows: Vec<Row>,
}

/// Runs statements and plans on one client.
pub struct Executor<'a, C: GenericClient> {
    config: &'a DialectConfig,
    client: &'a C,
    options: CallOptions,
}

impl<'a, C: GenericClient> Executor<'a, C> {
    pub fn new(config: &'a DialectConfig, client: &'a C) -> Self {
        Self {
            config,
            client,
            options: CallOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.options.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &'a DialectConfig {
        self.config
    }

    pub fn client(&self) -> &'a C {
        self.client
    }

    fn deadline(&self) -> Option<Instant> {
        self.options.timeout.map(|t| Instant::now() + t)
    }

    /// Run a single statement that yields rows.
    pub async fn query(&self, statement: &Statement) -> OrmResult<Vec<Row>> {
        Ok(self.run(&ExecPlan::single(statement.clone())).await?.rows)
    }

    /// Run a query and return the first row, or `NotFound`.
    pub async fn query_one(&self, statement: &Statement) -> OrmResult<Row> {
        self.query(statement)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::not_found("Expected 1 row, got 0"))
    }

    /// Run a query and return the first row, if any.
    pub async fn query_opt(&self, statement: &Statement) -> OrmResult<Option<Row>> {
        Ok(self.query(statement).await?.into_iter().next())
    }

    /// Run a single statement and return the affected row count.
    pub async fn execute(&self, statement: &Statement) -> OrmResult<u64> {
        Ok(self
            .run(&ExecPlan::single(statement.clone()))
            .await?
            .rows_affected)
    }

    /// Run a plan: every statement in order, on this executor's client.
    pub async fn run(&self, plan: &ExecPlan) -> OrmResult<ExecOutcome> {
        if !self.client.is_valid() {
            return Err(OrmError::Pool(
                "connection was invalidated and must be revalidated by the pool".to_string(),
            ));
        }
        plan.validate()?;
        let deadline = self.deadline();

        let implicit = plan.atomic && plan.len() > 1;
        let nested = implicit && self.client.in_transaction();
        if implicit {
            if nested {
                self.guarded(self.client.savepoint(PLAN_SAVEPOINT), deadline)
                    .await?;
            } else {
                self.guarded(self.client.begin(), deadline).await?;
            }
        }

        let result = self.run_statements(plan, deadline).await;

        match result {
            Ok(outcome) => {
                if implicit && !nested {
                    self.guarded(self.client.commit(), deadline).await?;
                }
                Ok(outcome)
            }
            Err(err) => {
                // An abandoned statement left the connection in an unknown
                // state; it is already invalidated and gets no rollback.
                if implicit && !matches!(err, OrmError::Timeout(_) | OrmError::Cancelled) {
                    let rollback = if nested {
                        self.client.rollback_to_savepoint(PLAN_SAVEPOINT).await
                    } else {
                        self.client.rollback().await
                    };
                    if let Err(rollback_err) = rollback {
                        tracing::warn!(
                            target: "oradialect.sql",
                            error = %rollback_err,
                            "rollback after failed plan also failed"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    async fn run_statements(
        &self,
        plan: &ExecPlan,
        deadline: Option<Instant>,
    ) -> OrmResult<ExecOutcome> {
        let mut outcome = ExecOutcome::default();
        let mut returned = Vec::new();

        for statement in &plan.statements {
            tracing::debug!(
                target: "oradialect.sql",
                operation = statement.operation,
                param_count = statement.binds.width(),
                rows = statement.binds.rows(),
                sql = %statement.sql,
                "executing statement"
            );
            let sql = statement.sql.as_str();
            let dispatched = match &statement.shape {
                ResultShape::Rows => {
                    let rows = self
                        .guarded(self.client.query(sql, &statement.binds), deadline)
                        .await;
                    rows.map(|rows| outcome.rows.extend(rows))
                }
                ResultShape::RowsAffected => {
                    let affected = match &statement.binds {
                        Binds::Batch(rows) => {
                            self.guarded(self.client.execute_batch(sql, rows), deadline)
                                .await
                        }
                        binds => self.guarded(self.client.execute(sql, binds), deadline).await,
                    };
                    affected.map(|n| outcome.rows_affected += n)
                }
                ResultShape::Returning(outs) => {
                    let rows = self
                        .guarded(
                            self.client.execute_returning(sql, &statement.binds, outs),
                            deadline,
                        )
                        .await;
                    rows.map(|rows| {
                        outcome.rows_affected += rows.len() as u64;
                        returned.extend(rows.into_iter().map(|r| ReturnedRow {
                            input_index: statement.input_offset + r.input_index,
                            row: r.row,
                        }));
                    })
                }
            };
            dispatched.map_err(|e| self.finish_error(e, statement))?;
        }

        if plan.returning.is_some() || !returned.is_empty() {
            outcome.rows = match plan.input_rows {
                Some(n) => correlate(returned, n)?,
                None => returned.into_iter().map(|r| r.row).collect(),
            };
        }
        Ok(outcome)
    }

    /// Await `fut` unless the deadline passes or the call is cancelled first.
    async fn guarded<T>(
        &self,
        fut: impl Future<Output = OrmResult<T>>,
        deadline: Option<Instant>,
    ) -> OrmResult<T> {
        let cancelled = async {
            match &self.options.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => {
                self.abandon("cancelled");
                Err(OrmError::Cancelled)
            }
            _ = expired => {
                self.abandon("deadline expired");
                Err(OrmError::Timeout(self.options.timeout.unwrap_or_default()))
            }
            res = fut => res,
        }
    }

    fn abandon(&self, reason: &'static str) {
        self.client.invalidate();
        tracing::warn!(
            target: "oradialect.sql",
            reason,
            "abandoned in-flight statement; connection invalidated"
        );
    }

    fn finish_error(&self, err: OrmError, statement: &Statement) -> OrmError {
        let mut ctx = ErrorContext::new(statement.operation);
        if let Some(table) = &statement.table {
            ctx = ctx.table(table.clone());
        }
        let err = err.with_context(ctx);
        if self.config.translate_error {
            classify::translate(err)
        } else {
            err
        }
    }
}

/// Order RETURNING rows by input row, requiring each input row exactly once.
fn correlate(returned: Vec<ReturnedRow>, input_rows: usize) -> OrmResult<Vec<Row>> {
    let mut slots: Vec<Option<Row>> = vec![None; input_rows];
    for r in returned {
        let slot = slots.get_mut(r.input_index).ok_or_else(|| {
            OrmError::Other(format!(
                "RETURNING row tagged with input row {} but only {input_rows} rows were sent",
                r.input_index
            ))
        })?;
        if slot.is_some() {
            return Err(OrmError::Other(format!(
                "input row {} produced more than one RETURNING row",
                r.input_index
            )));
        }
        *slot = Some(r.row);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            row.ok_or_else(|| OrmError::Other(format!("input row {i} produced no RETURNING row")))
        })
        .collect()
}
