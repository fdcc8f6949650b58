//! Connection pool utilities
//!
//! Sessions are opened by a [`Connector`] (the native driver) and pooled with
//! `deadpool`. A session is discarded instead of reused when it was
//! invalidated after a timeout or cancellation, when it outlived
//! `conn_max_lifetime`, when it sat idle longer than `conn_max_idle_time`, or
//! when its ping fails.
//!
//! # Example
//!
//! ```ignore
//! let pool = oradialect::pool::create_pool(
//!     "oracle://app:secret@db:1521/ORCLPDB1",
//!     MyDriver::default(),
//!     PoolConfig::default(),
//! )?;
//! let conn = pool.get().await?;
//! let rows = Executor::new(&config, &*conn).query(&stmt).await?;
//! ```

use crate::client::GenericClient;
use crate::dsn::{ConnectParams, parse_dsn};
use crate::error::{OrmError, OrmResult};
use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use serde::{Deserialize, Deserializer};
use std::future::Future;
use std::time::Duration;

/// Opens native sessions. Implemented by the driver integration.
pub trait Connector: Send + Sync + 'static {
    type Connection: GenericClient + 'static;

    /// Open a new session.
    fn open(
        &self,
        params: &ConnectParams,
    ) -> impl Future<Output = OrmResult<Self::Connection>> + Send;

    /// Cheap liveness check before a pooled session is handed out again.
    fn ping(&self, conn: &Self::Connection) -> impl Future<Output = OrmResult<()>> + Send;
}

/// Pool sizing and session lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Upper bound on open sessions.
    pub max_open: usize,
    /// Sessions kept after use; must not exceed `max_open`.
    pub max_idle: usize,
    /// Sessions older than this are closed on return (seconds in TOML).
    #[serde(deserialize_with = "opt_secs")]
    pub conn_max_lifetime: Option<Duration>,
    /// Sessions idle longer than this are closed (seconds in TOML).
    #[serde(deserialize_with = "opt_secs")]
    pub conn_max_idle_time: Option<Duration>,
    /// How long `get()` waits for a free session (seconds in TOML).
    #[serde(deserialize_with = "opt_secs")]
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: 16,
            max_idle: 16,
            conn_max_lifetime: None,
            conn_max_idle_time: None,
            acquire_timeout: None,
        }
    }
}

fn opt_secs<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
    Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
}

impl PoolConfig {
    pub fn max_open(mut self, n: usize) -> Self {
        self.max_open = n;
        self
    }

    pub fn max_idle(mut self, n: usize) -> Self {
        self.max_idle = n;
        self
    }

    pub fn conn_max_lifetime(mut self, d: Duration) -> Self {
        self.conn_max_lifetime = Some(d);
        self
    }

    pub fn conn_max_idle_time(mut self, d: Duration) -> Self {
        self.conn_max_idle_time = Some(d);
        self
    }

    pub fn acquire_timeout(mut self, d: Duration) -> Self {
        self.acquire_timeout = Some(d);
        self
    }

    pub fn validate(&self) -> OrmResult<()> {
        if self.max_open == 0 {
            return Err(OrmError::Config("pool max_open must be > 0".to_string()));
        }
        if self.max_idle > self.max_open {
            return Err(OrmError::Config(format!(
                "pool max_idle ({}) exceeds max_open ({})",
                self.max_idle, self.max_open
            )));
        }
        let zero = Some(Duration::ZERO);
        if self.conn_max_lifetime == zero || self.conn_max_idle_time == zero {
            return Err(OrmError::Config(
                "pool lifetimes must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// deadpool manager over a [`Connector`].
pub struct Manager<K: Connector> {
    connector: K,
    params: ConnectParams,
    config: PoolConfig,
}

impl<K: Connector> Manager<K> {
    pub fn new(connector: K, params: ConnectParams, config: PoolConfig) -> Self {
        Self {
            connector,
            params,
            config,
        }
    }

    fn expired(&self, metrics: &Metrics) -> Option<&'static str> {
        if self
            .config
            .conn_max_lifetime
            .is_some_and(|max| metrics.age() > max)
        {
            return Some("session exceeded conn_max_lifetime");
        }
        if self
            .config
            .conn_max_idle_time
            .is_some_and(|max| metrics.last_used() > max)
        {
            return Some("session exceeded conn_max_idle_time");
        }
        None
    }
}

impl<K: Connector> managed::Manager for Manager<K> {
    type Type = K::Connection;
    type Error = OrmError;

    async fn create(&self) -> Result<K::Connection, OrmError> {
        tracing::debug!(target: "oradialect.pool", dsn = %self.params.redacted(), "opening session");
        self.connector.open(&self.params).await
    }

    async fn recycle(&self, conn: &mut K::Connection, metrics: &Metrics) -> RecycleResult<OrmError> {
        if !conn.is_valid() {
            tracing::debug!(target: "oradialect.pool", "discarding invalidated session");
            return Err(RecycleError::Backend(OrmError::Pool(
                "session was invalidated".to_string(),
            )));
        }
        if let Some(reason) = self.expired(metrics) {
            tracing::debug!(target: "oradialect.pool", reason, "discarding session");
            return Err(RecycleError::Backend(OrmError::Pool(reason.to_string())));
        }
        if conn.in_transaction() {
            conn.rollback().await.map_err(RecycleError::Backend)?;
        }
        self.connector.ping(conn).await.map_err(RecycleError::Backend)
    }
}

pub type Pool<K> = managed::Pool<Manager<K>>;

/// A session checked out of a [`Pool`]; derefs to the connection.
pub type PooledConnection<K> = managed::Object<Manager<K>>;

/// Parse and validate the DSN and the pool settings, then build the pool.
/// No session is opened until the first `get()`.
pub fn create_pool<K: Connector>(dsn: &str, connector: K, config: PoolConfig) -> OrmResult<Pool<K>> {
    let params = parse_dsn(dsn)?;
    params.validate()?;
    create_pool_with_params(params, connector, config)
}

/// Build a pool from already-parsed connection parameters.
pub fn create_pool_with_params<K: Connector>(
    params: ConnectParams,
    connector: K,
    config: PoolConfig,
) -> OrmResult<Pool<K>> {
    config.validate()?;
    let max_open = config.max_open;
    let acquire_timeout = config.acquire_timeout;
    let mut builder = managed::Pool::builder(Manager::new(connector, params, config)).max_size(max_open);
    if let Some(timeout) = acquire_timeout {
        builder = builder
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .runtime(deadpool::Runtime::Tokio1);
    }
    builder.build().map_err(|e| OrmError::Pool(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        PoolConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(PoolConfig::default().max_open(0).validate().is_err());
        assert!(PoolConfig::default().max_open(4).max_idle(8).validate().is_err());
        assert!(
            PoolConfig::default()
                .conn_max_lifetime(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn lifetimes_are_seconds_in_toml() {
        let config: PoolConfig = toml::from_str(
            r#"
            max_open = 8
            max_idle = 2
            conn_max_lifetime = 3600
            conn_max_idle_time = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.max_open, 8);
        assert_eq!(config.conn_max_lifetime, Some(Duration::from_secs(3600)));
        assert_eq!(config.conn_max_idle_time, Some(Duration::from_secs(60)));
        assert_eq!(config.acquire_timeout, None);
    }
}
