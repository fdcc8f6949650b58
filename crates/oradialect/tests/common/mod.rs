//! In-memory recording client for integration tests.

#![allow(dead_code)]

use oradialect::{
    Binds, DbError, GenericClient, OrmError, OrmResult, OutBind, ReturnedRow, Row, Value,
};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// One call the adapter made.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Query { sql: String, binds: Binds },
    Execute { sql: String, binds: Binds },
    Batch { sql: String, rows: Vec<Vec<Value>> },
    Returning { sql: String, binds: Binds, outs: Vec<String> },
    Begin,
    Commit,
    Rollback,
}

impl Call {
    pub fn sql(&self) -> Option<&str> {
        match self {
            Call::Query { sql, .. }
            | Call::Execute { sql, .. }
            | Call::Batch { sql, .. }
            | Call::Returning { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

struct QueryRule {
    pattern: String,
    first_bind: Option<Value>,
    rows: Vec<Row>,
}

struct Failure {
    pattern: String,
    error: DbError,
    skip: usize,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    rules: Vec<QueryRule>,
    failures: Vec<Failure>,
    next_id: i64,
    in_tx: bool,
    reverse_returning: bool,
    drop_returning_row: bool,
    delay: Option<Duration>,
}

pub struct MockClient {
    state: Mutex<State>,
    valid: AtomicBool,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
            valid: AtomicBool::new(true),
        }
    }

    fn with(mut self, f: impl FnOnce(&mut State)) -> Self {
        f(self.state.get_mut().unwrap());
        self
    }

    /// Answer queries containing `pattern` (and, if given, whose first bind
    /// equals `first_bind`) with `rows`. Earlier rules win.
    pub fn on_query(self, pattern: &str, first_bind: Option<Value>, rows: Vec<Row>) -> Self {
        self.with(|s| {
            s.rules.push(QueryRule {
                pattern: pattern.to_string(),
                first_bind,
                rows,
            })
        })
    }

    /// Fail every statement containing `pattern` with ORA-`code`.
    pub fn fail_on(self, pattern: &str, code: i32) -> Self {
        self.fail_after(pattern, code, 0)
    }

    /// Let `skip` matching statements succeed, then fail the rest.
    pub fn fail_after(self, pattern: &str, code: i32, skip: usize) -> Self {
        self.with(|s| {
            s.failures.push(Failure {
                pattern: pattern.to_string(),
                error: DbError::new(code, format!("ORA-{code:05}: simulated")),
                skip,
            })
        })
    }

    /// Make every statement take `delay`.
    pub fn delay(self, delay: Duration) -> Self {
        self.with(|s| s.delay = Some(delay))
    }

    /// Return RETURNING rows in reverse input order.
    pub fn reverse_returning(self) -> Self {
        self.with(|s| s.reverse_returning = true)
    }

    /// Lose the last RETURNING row of each statement.
    pub fn drop_returning_row(self) -> Self {
        self.with(|s| s.drop_returning_row = true)
    }

    /// Simulate a caller-owned open transaction.
    pub fn in_caller_transaction(self) -> Self {
        self.with(|s| s.in_tx = true)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// SQL of every call, in order.
    pub fn sql(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.sql().map(str::to_string))
            .collect()
    }

    /// Schema statements issued through `execute`.
    pub fn ddl(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Execute { sql, .. }
                    if ["CREATE", "ALTER", "DROP", "COMMENT"]
                        .iter()
                        .any(|k| sql.starts_with(k)) =>
                {
                    Some(sql)
                }
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) -> (Option<Duration>, OrmResult<()>) {
        let mut state = self.state.lock().unwrap();
        let outcome = match call.sql() {
            Some(sql) => check_failure(&mut state.failures, sql),
            None => Ok(()),
        };
        state.calls.push(call);
        (state.delay, outcome)
    }

    async fn enter(&self, call: Call) -> OrmResult<()> {
        let (delay, outcome) = self.record(call);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

fn check_failure(failures: &mut [Failure], sql: &str) -> OrmResult<()> {
    for failure in failures.iter_mut().filter(|f| sql.contains(&f.pattern)) {
        if failure.skip > 0 {
            failure.skip -= 1;
        } else {
            return Err(OrmError::database(failure.error.clone()));
        }
    }
    Ok(())
}

fn first_bind(binds: &Binds) -> Option<&Value> {
    match binds {
        Binds::Positional(values) => values.first(),
        Binds::Named(values) => values.first().map(|(_, v)| v),
        Binds::Batch(rows) => rows.first().and_then(|r| r.first()),
    }
}

impl GenericClient for MockClient {
    async fn query(&self, sql: &str, binds: &Binds) -> OrmResult<Vec<Row>> {
        self.enter(Call::Query {
            sql: sql.to_string(),
            binds: binds.clone(),
        })
        .await?;
        let state = self.state.lock().unwrap();
        let rows = state
            .rules
            .iter()
            .find(|r| {
                sql.contains(&r.pattern)
                    && r.first_bind
                        .as_ref()
                        .is_none_or(|v| first_bind(binds) == Some(v))
            })
            .map(|r| r.rows.clone())
            .unwrap_or_default();
        Ok(rows)
    }

    async fn execute(&self, sql: &str, binds: &Binds) -> OrmResult<u64> {
        self.enter(Call::Execute {
            sql: sql.to_string(),
            binds: binds.clone(),
        })
        .await?;
        Ok(1)
    }

    async fn execute_batch(&self, sql: &str, rows: &[Vec<Value>]) -> OrmResult<u64> {
        self.enter(Call::Batch {
            sql: sql.to_string(),
            rows: rows.to_vec(),
        })
        .await?;
        Ok(rows.len() as u64)
    }

    async fn execute_returning(
        &self,
        sql: &str,
        binds: &Binds,
        outs: &[OutBind],
    ) -> OrmResult<Vec<ReturnedRow>> {
        self.enter(Call::Returning {
            sql: sql.to_string(),
            binds: binds.clone(),
            outs: outs.iter().map(|o| o.column.clone()).collect(),
        })
        .await?;
        let inputs = match binds {
            Binds::Batch(rows) => rows.len(),
            _ => 1,
        };
        let columns: Vec<String> = outs.iter().map(|o| o.column.to_ascii_uppercase()).collect();
        let mut state = self.state.lock().unwrap();
        let mut returned = Vec::with_capacity(inputs);
        for input_index in 0..inputs {
            let id = state.next_id;
            state.next_id += 1;
            returned.push(ReturnedRow {
                input_index,
                row: Row::new(columns.clone(), vec![Value::Int(id); columns.len()]),
            });
        }
        if state.reverse_returning {
            returned.reverse();
        }
        if state.drop_returning_row {
            returned.pop();
        }
        Ok(returned)
    }

    async fn begin(&self) -> OrmResult<()> {
        self.enter(Call::Begin).await?;
        self.state.lock().unwrap().in_tx = true;
        Ok(())
    }

    async fn commit(&self) -> OrmResult<()> {
        self.enter(Call::Commit).await?;
        self.state.lock().unwrap().in_tx = false;
        Ok(())
    }

    async fn rollback(&self) -> OrmResult<()> {
        self.enter(Call::Rollback).await?;
        self.state.lock().unwrap().in_tx = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.state.lock().unwrap().in_tx
    }

    fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }
}

/// `USER_TAB_COLUMNS` rows: (name, type, precision, scale, char_length, nullable).
pub fn dictionary_columns(
    columns: &[(&str, &str, Option<i64>, Option<i64>, Option<i64>, bool)],
) -> Vec<Row> {
    let names: Vec<String> = [
        "COLUMN_NAME",
        "DATA_TYPE",
        "DATA_PRECISION",
        "DATA_SCALE",
        "CHAR_LENGTH",
        "DATA_LENGTH",
        "NULLABLE",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let opt = |v: Option<i64>| v.map_or(Value::Null, Value::Int);
    columns
        .iter()
        .map(|(name, ty, precision, scale, chars, nullable)| {
            Row::new(
                names.clone(),
                vec![
                    Value::Text(name.to_string()),
                    Value::Text(ty.to_string()),
                    opt(*precision),
                    opt(*scale),
                    opt(*chars),
                    opt(chars.map(|c| c * 4)),
                    Value::Text(if *nullable { "Y" } else { "N" }.to_string()),
                ],
            )
        })
        .collect()
}

/// Single-column rows, e.g. `INDEX_NAME` values.
pub fn names(column: &str, values: &[&str]) -> Vec<Row> {
    values
        .iter()
        .map(|v| Row::new(vec![column.to_string()], vec![Value::Text(v.to_string())]))
        .collect()
}

pub fn text(s: &str) -> Option<Value> {
    Some(Value::Text(s.to_string()))
}
