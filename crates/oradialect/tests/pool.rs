#![cfg(feature = "pool")]

mod common;

use common::MockClient;
use oradialect::pool::{Connector, PoolConfig, create_pool};
use oradialect::{ConnectParams, GenericClient, OrmError, OrmResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Default)]
struct MockConnector {
    opened: Arc<AtomicUsize>,
}

impl Connector for MockConnector {
    type Connection = MockClient;

    async fn open(&self, params: &ConnectParams) -> OrmResult<MockClient> {
        assert_eq!(params.user, "scott");
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockClient::new())
    }

    async fn ping(&self, _conn: &MockClient) -> OrmResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn invalidated_sessions_are_not_reused() {
    let connector = MockConnector::default();
    let pool = create_pool(
        "oracle://scott:tiger@db:1521/ORCL",
        connector.clone(),
        PoolConfig::default().max_open(2).max_idle(2),
    )
    .unwrap();
    assert_eq!(connector.opened.load(Ordering::SeqCst), 0);

    let conn = pool.get().await.unwrap();
    drop(conn);
    let conn = pool.get().await.unwrap();
    assert_eq!(connector.opened.load(Ordering::SeqCst), 1);

    conn.invalidate();
    drop(conn);
    let conn = pool.get().await.unwrap();
    assert!(conn.is_valid());
    assert_eq!(connector.opened.load(Ordering::SeqCst), 2);
}

#[test]
fn configuration_errors_are_fatal_at_build() {
    let build =
        |dsn: &str, config: PoolConfig| create_pool(dsn, MockConnector::default(), config).err();

    assert!(matches!(
        build("oracle://db:1521/ORCL", PoolConfig::default()),
        Some(OrmError::Config(_))
    ));
    assert!(matches!(
        build(
            "user=scott connectString=db/ORCL libDir=/nonexistent/instantclient",
            PoolConfig::default(),
        ),
        Some(OrmError::Config(_))
    ));
    assert!(matches!(
        build("user=scott connectString=db/ORCL", PoolConfig::default().max_open(0)),
        Some(OrmError::Config(_))
    ));
}
