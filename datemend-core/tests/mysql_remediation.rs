//! MySQL remediation integration tests.
//!
//! This test suite covers:
//! - Nulling zero-date rows in nullable columns
//! - Relaxing NOT NULL on damaged columns, then fixing them
//! - TIMESTAMP to DATETIME conversion preserving nullability and values
//! - The success-prefix guarantee when a batch fails partway

use datemend_core::models::{ColumnRecord, DateColumnType, Nullability};
use datemend_core::{
    ConnectionSettings, Result, connection, error::DatemendError, remediation, scanner,
};
use sqlx::MySqlPool;
use std::time::Duration;
use testcontainers_modules::{mysql::Mysql, testcontainers::runners::AsyncRunner};

/// Helper function to wait for MySQL to be ready
async fn wait_for_mysql_ready(database_url: &str, max_attempts: u32) -> Result<()> {
    let mut attempts = 0;
    while attempts < max_attempts {
        if let Ok(pool) = MySqlPool::connect(database_url).await {
            if sqlx::query("SELECT 1").fetch_one(&pool).await.is_ok() {
                pool.close().await;
                return Ok(());
            }
            pool.close().await;
        }
        attempts += 1;
        if attempts < max_attempts {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
    Err(DatemendError::connection_failed(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!(
            "MySQL failed to become ready after {} attempts",
            max_attempts
        ),
    )))
}

/// Runs seed statements on one pinned connection so the relaxed
/// `sql_mode` holds for the zero-date inserts.
async fn seed(database_url: &str, statements: &[&str]) {
    let pool = MySqlPool::connect(database_url).await.unwrap();
    let mut conn = pool.acquire().await.unwrap();
    sqlx::query("SET SESSION sql_mode = ''")
        .execute(&mut *conn)
        .await
        .unwrap();
    for statement in statements {
        sqlx::query(statement).execute(&mut *conn).await.unwrap();
    }
    drop(conn);
    pool.close().await;
}

fn settings_for(port: u16) -> ConnectionSettings {
    ConnectionSettings::new("localhost", port, "root", "")
}

async fn scan_schema(pool: &MySqlPool, schema: &str) -> Result<Vec<ColumnRecord>> {
    let metas = scanner::list_date_columns(pool, &[schema.to_string()]).await?;
    Ok(scanner::scan_columns(pool, metas, |_| {}).await)
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn test_fix_bad_rows_clears_zero_dates() -> Result<()> {
    let mysql = Mysql::default().start().await.unwrap();
    let port = mysql.get_host_port_ipv4(3306).await.unwrap();
    let database_url = format!("mysql://root@localhost:{}/test", port);

    wait_for_mysql_ready(&database_url, 30).await?;
    seed(
        &database_url,
        &[
            "CREATE DATABASE shop",
            "CREATE TABLE shop.orders (
                id INT AUTO_INCREMENT PRIMARY KEY,
                created_at DATETIME NOT NULL,
                updated_at TIMESTAMP NULL DEFAULT NULL
            )",
            "INSERT INTO shop.orders (created_at, updated_at) VALUES
                ('0000-00-00 00:00:00', '2024-05-01 10:00:00'),
                ('0000-00-00 00:00:00', '0000-00-00 00:00:00'),
                ('2024-01-15 08:30:00', '2024-05-02 11:00:00')",
        ],
    )
    .await;

    let pool = connection::connect(&settings_for(port))?;
    let records = scan_schema(&pool, "shop").await?;
    let fixable: Vec<ColumnRecord> = records
        .iter()
        .filter(|r| r.is_fixable())
        .cloned()
        .collect();
    assert_eq!(fixable.len(), 1);
    assert_eq!(fixable[0].column, "updated_at");

    let outcome = remediation::fix_bad_rows(&pool, &fixable).await?;
    assert!(outcome.is_complete());
    assert_eq!(outcome.succeeded.len(), 1);
    assert_eq!(outcome.succeeded[0].rows_affected, 1);
    assert_eq!(outcome.rows_touched(), 1);

    assert_eq!(
        scanner::count_bad_rows(&pool, "shop", "orders", "updated_at").await,
        0
    );
    // The NOT NULL column was not in the batch and keeps its damage
    assert_eq!(
        scanner::count_bad_rows(&pool, "shop", "orders", "created_at").await,
        2
    );

    // Only the nulled row changed; clean values survive
    let nulled: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM shop.orders WHERE updated_at IS NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(nulled, 1);

    Ok(())
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn test_allow_null_then_fix() -> Result<()> {
    let mysql = Mysql::default().start().await.unwrap();
    let port = mysql.get_host_port_ipv4(3306).await.unwrap();
    let database_url = format!("mysql://root@localhost:{}/test", port);

    wait_for_mysql_ready(&database_url, 30).await?;
    seed(
        &database_url,
        &[
            "CREATE DATABASE shop",
            "CREATE TABLE shop.orders (
                id INT AUTO_INCREMENT PRIMARY KEY,
                created_at DATETIME NOT NULL
            )",
            "INSERT INTO shop.orders (created_at) VALUES
                ('0000-00-00 00:00:00'),
                ('0000-00-00 00:00:00'),
                ('2024-01-15 08:30:00')",
        ],
    )
    .await;

    let pool = connection::connect(&settings_for(port))?;
    let records = scan_schema(&pool, "shop").await?;
    let locked: Vec<ColumnRecord> = records
        .iter()
        .filter(|r| r.needs_null_permission())
        .cloned()
        .collect();
    assert_eq!(locked.len(), 1);

    // The ALTER rebuilds rows holding zero dates, so it only works with
    // the session's strict mode relaxed; the engine must handle that.
    let outcome = remediation::allow_null_on_columns(&pool, &locked).await?;
    assert!(outcome.is_complete());

    let refreshed = scanner::rescan_column(&pool, "shop", "orders", "created_at")
        .await?
        .expect("created_at should rescan after the ALTER");
    assert_eq!(refreshed.nullable, Nullability::Yes);
    assert_eq!(refreshed.bad_rows, 2, "allowing NULL fixes nothing by itself");
    assert!(refreshed.is_fixable());

    let outcome = remediation::fix_bad_rows(&pool, &[refreshed]).await?;
    assert!(outcome.is_complete());
    assert_eq!(outcome.rows_touched(), 2);
    assert_eq!(
        scanner::count_bad_rows(&pool, "shop", "orders", "created_at").await,
        0
    );

    let survivors: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM shop.orders WHERE created_at IS NOT NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(survivors, 1);

    Ok(())
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn test_convert_preserves_nullability_and_values() -> Result<()> {
    let mysql = Mysql::default().start().await.unwrap();
    let port = mysql.get_host_port_ipv4(3306).await.unwrap();
    let database_url = format!("mysql://root@localhost:{}/test", port);

    wait_for_mysql_ready(&database_url, 30).await?;
    seed(
        &database_url,
        &[
            "CREATE DATABASE telemetry",
            "CREATE TABLE telemetry.events (
                id INT AUTO_INCREMENT PRIMARY KEY,
                happened_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                seen_at TIMESTAMP NULL DEFAULT NULL
            )",
            "INSERT INTO telemetry.events (happened_at, seen_at) VALUES
                ('2024-06-01 12:00:00', '2024-06-01 12:05:00'),
                ('2024-06-02 09:30:00', NULL)",
        ],
    )
    .await;

    let pool = connection::connect(&settings_for(port))?;
    let records = scan_schema(&pool, "telemetry").await?;
    let convertible: Vec<ColumnRecord> = records
        .iter()
        .filter(|r| r.is_convertible())
        .cloned()
        .collect();
    assert_eq!(convertible.len(), 2);

    let outcome = remediation::convert_to_datetime(&pool, &convertible).await?;
    assert!(outcome.is_complete());
    assert_eq!(outcome.succeeded.len(), 2);

    let happened = scanner::rescan_column(&pool, "telemetry", "events", "happened_at")
        .await?
        .expect("happened_at should rescan after conversion");
    assert_eq!(happened.column_type, DateColumnType::Datetime);
    assert_eq!(happened.nullable, Nullability::No);

    let seen = scanner::rescan_column(&pool, "telemetry", "events", "seen_at")
        .await?
        .expect("seen_at should rescan after conversion");
    assert_eq!(seen.column_type, DateColumnType::Datetime);
    assert_eq!(seen.nullable, Nullability::Yes);

    // Wall-clock values clients have been reading must not shift
    let rendered: String = sqlx::query_scalar(
        "SELECT CAST(happened_at AS CHAR) FROM telemetry.events WHERE id = 1",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(rendered, "2024-06-01 12:00:00");

    Ok(())
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn test_batch_failure_keeps_success_prefix() -> Result<()> {
    let mysql = Mysql::default().start().await.unwrap();
    let port = mysql.get_host_port_ipv4(3306).await.unwrap();
    let database_url = format!("mysql://root@localhost:{}/test", port);

    wait_for_mysql_ready(&database_url, 30).await?;
    seed(
        &database_url,
        &[
            "CREATE DATABASE ledger",
            "CREATE TABLE ledger.alpha (
                id INT AUTO_INCREMENT PRIMARY KEY,
                happened_at DATETIME NULL
            )",
            "CREATE TABLE ledger.bravo (
                id INT AUTO_INCREMENT PRIMARY KEY,
                happened_at DATETIME NULL
            )",
            "INSERT INTO ledger.alpha (happened_at) VALUES ('0000-00-00 00:00:00')",
            "INSERT INTO ledger.bravo (happened_at) VALUES ('0000-00-00 00:00:00')",
        ],
    )
    .await;

    let pool = connection::connect(&settings_for(port))?;
    let records = scan_schema(&pool, "ledger").await?;
    let fixable: Vec<ColumnRecord> = records
        .iter()
        .filter(|r| r.is_fixable())
        .cloned()
        .collect();
    assert_eq!(fixable.len(), 2);
    assert_eq!(fixable[0].table, "alpha", "enumeration orders by table name");

    // bravo vanishes before the batch reaches it
    let admin = MySqlPool::connect(&database_url).await.unwrap();
    sqlx::query("DROP TABLE ledger.bravo")
        .execute(&admin)
        .await
        .unwrap();
    admin.close().await;

    let outcome = remediation::fix_bad_rows(&pool, &fixable).await?;
    assert!(!outcome.is_complete());
    assert_eq!(outcome.succeeded.len(), 1);
    assert_eq!(outcome.succeeded[0].record.table, "alpha");
    assert_eq!(outcome.rows_touched(), 1);

    let (index, error) = outcome.failure.as_ref().expect("bravo should fail");
    assert_eq!(*index, 1);
    assert!(error.to_string().contains("bravo"));

    // The prefix is durably applied even though the batch failed
    assert_eq!(
        scanner::count_bad_rows(&pool, "ledger", "alpha", "happened_at").await,
        0
    );

    Ok(())
}
