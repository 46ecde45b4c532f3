//! MySQL connection pool management.
//!
//! The pool is capped at a single connection. Remediation relies on session
//! state (`SET SESSION sql_mode`) and the workflow interleaves prompts with
//! queries, so one long-lived session keeps behaviour predictable.
//!
//! The session time zone is left at the server default so that TIMESTAMP to
//! DATETIME conversions preserve the wall-clock values clients have been
//! reading all along.

use std::time::Duration;

use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::debug;

use crate::Result;
use crate::config::ConnectionSettings;
use crate::error::{DatemendError, redact_database_url};

/// Opens a lazily-connected single-connection pool for the given settings.
///
/// # Errors
/// Returns error if the settings are invalid or the pool cannot be created.
/// The actual TCP connection is established on first use; call [`ping`] to
/// verify the server is reachable.
pub fn connect(settings: &ConnectionSettings) -> Result<MySqlPool> {
    let url = settings.connection_url()?;

    debug!("Opening MySQL pool for {}", redact_database_url(&url));

    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .test_before_acquire(true)
        .connect_lazy(&url)
        .map_err(|e| DatemendError::Connection {
            context: format!(
                "Failed to create MySQL connection pool to {}",
                redact_database_url(&url)
            ),
            source: Box::new(e),
        })?;

    Ok(pool)
}

/// Verifies the server answers queries before any real work starts.
///
/// # Errors
/// Returns a connection error if the server is unreachable or rejects the
/// credentials.
pub async fn ping(pool: &MySqlPool) -> Result<()> {
    let result: i32 = sqlx::query_scalar("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(DatemendError::connection_failed)?;

    if result != 1 {
        return Err(DatemendError::configuration(
            "MySQL ping returned an unexpected result",
        ));
    }

    debug!("MySQL server answered ping");
    Ok(())
}

/// Fetches the server version string for the startup banner.
///
/// # Errors
/// Returns a connection error if the query fails.
pub async fn server_version(pool: &MySqlPool) -> Result<String> {
    sqlx::query_scalar("SELECT VERSION()")
        .fetch_one(pool)
        .await
        .map_err(DatemendError::connection_failed)
}
