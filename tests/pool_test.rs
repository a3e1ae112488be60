//! Integration tests for the connection pool lifecycle.
//!
//! These tests run against temporary SQLite files, except for the ones that
//! check startup failures against a MySQL address nothing listens on.

use awesome_web::config::PoolConfig;
use awesome_web::db::{Pool, select};
use awesome_web::error::DbError;
use awesome_web::models::{DatabaseType, Statement};
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_test::{assert_err, assert_ok};

/// Helper to open a SQLite pool on a temp file
async fn setup_pool(maxsize: u32) -> (Pool, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let config = PoolConfig {
        maxsize,
        acquire_timeout_secs: 5,
        ..PoolConfig::sqlite(temp_file.path().to_string_lossy())
    };
    let pool = Pool::initialize(config).await.unwrap();
    (pool, temp_file)
}

#[tokio::test]
async fn test_checkouts_never_exceed_maxsize() {
    let (pool, _temp) = setup_pool(3).await;
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..12 {
        let pool = pool.clone();
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            let conn = pool.acquire().await.unwrap();
            let status = pool.status();
            peak.fetch_max(status.checked_out, Ordering::SeqCst);
            assert!(status.checked_out <= status.max_size as usize);
            let delay = rand::thread_rng().gen_range(1..=10);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            drop(conn);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak checked out was {}", peak);
    assert_eq!(pool.status().checked_out, 0);
    assert!(pool.status().size <= 3);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_waiter_is_served_after_release() {
    let (pool, _temp) = setup_pool(1).await;
    let held = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let conn = pool.acquire().await?;
            drop(conn);
            Ok::<_, DbError>(())
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished(), "waiter must block while the only connection is out");

    drop(held);
    assert_ok!(waiter.await.unwrap());
    assert_eq!(pool.status().checked_out, 0);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_waiters_are_served_in_arrival_order() {
    let (pool, _temp) = setup_pool(1).await;
    let served = Arc::new(Mutex::new(Vec::new()));
    let held = pool.acquire().await.unwrap();

    let mut waiters = Vec::new();
    for id in 0..4 {
        let pool = pool.clone();
        let served = Arc::clone(&served);
        waiters.push(tokio::spawn(async move {
            let conn = pool.acquire().await?;
            served.lock().unwrap().push(id);
            tokio::time::sleep(Duration::from_millis(5)).await;
            drop(conn);
            Ok::<_, DbError>(())
        }));
        // let each waiter queue up before the next one arrives
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(served.lock().unwrap().is_empty());

    drop(held);
    for waiter in waiters {
        assert_ok!(waiter.await.unwrap());
    }
    assert_eq!(*served.lock().unwrap(), vec![0, 1, 2, 3]);
    assert_eq!(pool.status().checked_out, 0);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_acquire_times_out_when_exhausted() {
    let temp_file = NamedTempFile::new().unwrap();
    let config = PoolConfig {
        maxsize: 1,
        acquire_timeout_secs: 1,
        ..PoolConfig::sqlite(temp_file.path().to_string_lossy())
    };
    let pool = Pool::initialize(config).await.unwrap();

    let held = pool.acquire().await.unwrap();
    let result = pool.acquire().await;
    assert!(
        matches!(result, Err(DbError::Timeout { elapsed_secs: 1, .. })),
        "expected timeout, got {:?}",
        result
    );

    drop(held);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_cancelled_checkout_is_released() {
    let (pool, _temp) = setup_pool(1).await;

    let cancelled = tokio::time::timeout(Duration::from_millis(20), async {
        let _conn = pool.acquire().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    })
    .await;
    assert!(cancelled.is_err());
    assert_eq!(pool.status().checked_out, 0);

    // the single connection is usable again
    let rows = select(&pool, &Statement::new("SELECT 1 AS one"), None)
        .await
        .unwrap();
    assert_eq!(rows[0]["one"], 1);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_discarded_connection_is_replaced() {
    let (pool, _temp) = setup_pool(1).await;

    let conn = pool.acquire().await.unwrap();
    assert_eq!(pool.status().checked_out, 1);
    conn.discard().await;
    assert_eq!(pool.status().checked_out, 0);

    let rows = select(&pool, &Statement::new("SELECT 2 AS two"), None)
        .await
        .unwrap();
    assert_eq!(rows[0]["two"], 2);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_then_rejects() {
    let (pool, _temp) = setup_pool(2).await;
    let finished = Arc::new(AtomicBool::new(false));
    let (started_tx, started_rx) = tokio::sync::oneshot::channel();

    let in_flight = {
        let pool = pool.clone();
        let finished = Arc::clone(&finished);
        tokio::spawn(async move {
            let conn = pool.acquire().await.unwrap();
            started_tx.send(()).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            finished.store(true, Ordering::SeqCst);
            drop(conn);
        })
    };

    started_rx.await.unwrap();
    pool.shutdown().await;
    assert!(
        finished.load(Ordering::SeqCst),
        "shutdown returned before the in-flight operation finished"
    );
    in_flight.await.unwrap();

    assert!(pool.is_closed());
    assert!(matches!(pool.acquire().await, Err(DbError::PoolClosed)));
    let result = select(&pool, &Statement::new("SELECT 1"), None).await;
    assert!(matches!(result, Err(DbError::PoolClosed)));

    // a second shutdown is a no-op
    pool.shutdown().await;
}

#[tokio::test]
async fn test_missing_credentials_is_configuration_error() {
    let config = PoolConfig {
        user: Some("www-data".to_string()),
        db: Some("awesome".to_string()),
        ..PoolConfig::default()
    };
    let err = assert_err!(Pool::initialize(config).await);
    assert!(matches!(err, DbError::Configuration { .. }));
    assert!(err.to_string().contains("password"), "{}", err);
}

#[tokio::test]
async fn test_invalid_sizes_are_configuration_errors() {
    let temp_file = NamedTempFile::new().unwrap();
    let config = PoolConfig {
        minsize: 5,
        maxsize: 2,
        ..PoolConfig::sqlite(temp_file.path().to_string_lossy())
    };
    assert!(matches!(
        Pool::initialize(config).await,
        Err(DbError::Configuration { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_server_is_connection_error() {
    let config = PoolConfig {
        backend: DatabaseType::MySQL,
        host: "127.0.0.1".to_string(),
        port: Some(1),
        user: Some("www-data".to_string()),
        password: Some("www-data".to_string()),
        db: Some("awesome".to_string()),
        acquire_timeout_secs: 1,
        ..PoolConfig::default()
    };
    let result = Pool::initialize(config).await;
    let err = result.unwrap_err();
    assert!(
        matches!(err, DbError::Connection { .. }),
        "expected connection error, got {:?}",
        err
    );
    assert!(err.suggestion().is_some());
}
