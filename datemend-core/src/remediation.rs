//! Remediation operations for zero dates and TIMESTAMP columns.
//!
//! All operations run sequentially over one database session and stop at the
//! first failure. The outcome records the prefix of columns that completed,
//! in submission order, plus the error that ended the batch. Nothing is
//! rolled back; completed columns stay completed.

use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::{MySql, MySqlPool};
use tracing::{debug, info};

use crate::Result;
use crate::error::DatemendError;
use crate::models::ColumnRecord;
use crate::sql;

/// One column the engine finished, with the number of rows it touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediatedColumn {
    pub record: ColumnRecord,
    pub rows_affected: u64,
}

/// Result of a remediation batch.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Columns that completed, in submission order
    pub succeeded: Vec<RemediatedColumn>,
    /// Index into the submitted batch of the failed column, plus the error
    pub failure: Option<(usize, DatemendError)>,
}

impl BatchOutcome {
    /// Total rows touched by the completed prefix.
    pub fn rows_touched(&self) -> u64 {
        self.succeeded.iter().map(|c| c.rows_affected).sum()
    }

    /// Whether every submitted column completed.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Applies `op` to each column in order, stopping at the first failure.
///
/// The completed prefix is always returned. The context is threaded through
/// mutably so database ops can hold their session on it.
pub async fn fold_columns<C, F>(
    context: &mut C,
    columns: &[ColumnRecord],
    mut op: F,
) -> BatchOutcome
where
    F: for<'c> FnMut(&'c mut C, &'c ColumnRecord) -> BoxFuture<'c, Result<u64>>,
{
    let mut succeeded = Vec::with_capacity(columns.len());

    for (index, record) in columns.iter().enumerate() {
        match op(context, record).await {
            Ok(rows_affected) => succeeded.push(RemediatedColumn {
                record: record.clone(),
                rows_affected,
            }),
            Err(e) => {
                return BatchOutcome {
                    succeeded,
                    failure: Some((index, e)),
                };
            }
        }
    }

    BatchOutcome {
        succeeded,
        failure: None,
    }
}

async fn acquire(pool: &MySqlPool) -> Result<PoolConnection<MySql>> {
    pool.acquire().await.map_err(|e| {
        DatemendError::mutation_failed("Failed to acquire a connection for remediation", e)
    })
}

/// Relaxes sql_mode for the session held by `conn`.
///
/// Strict modes reject the zero-date values these statements address, both
/// in UPDATE predicates and in the row rebuild an ALTER performs.
async fn relax_sql_mode(conn: &mut PoolConnection<MySql>) -> Result<()> {
    sqlx::query(sql::RELAX_SQL_MODE)
        .execute(&mut **conn)
        .await
        .map_err(|e| DatemendError::mutation_failed("Failed to relax sql_mode", e))?;

    debug!("Session sql_mode relaxed for remediation");
    Ok(())
}

/// Sets zero-date rows to NULL in each column, stopping at first failure.
///
/// # Errors
/// Returns error only when no work could start at all (connection acquire
/// or session setup failed). Per-column failures end up in the outcome.
pub async fn fix_bad_rows(pool: &MySqlPool, columns: &[ColumnRecord]) -> Result<BatchOutcome> {
    let mut conn = acquire(pool).await?;
    relax_sql_mode(&mut conn).await?;

    let outcome = fold_columns(&mut conn, columns, |conn, record| {
        Box::pin(async move {
            let statement =
                sql::fix_nulls_statement(&record.schema, &record.table, &record.column);
            let result = sqlx::query(&statement)
                .execute(&mut **conn)
                .await
                .map_err(|e| {
                    DatemendError::mutation_failed(
                        format!(
                            "Failed to clear zero dates in {}",
                            record.qualified_name()
                        ),
                        e,
                    )
                })?;

            debug!(
                "Cleared {} zero-date rows in {}",
                result.rows_affected(),
                record.qualified_name()
            );
            Ok(result.rows_affected())
        })
    })
    .await;

    info!(
        "Zero-date fix touched {} rows across {} columns",
        outcome.rows_touched(),
        outcome.succeeded.len()
    );
    Ok(outcome)
}

/// Makes each column nullable, preserving its declared type.
///
/// # Errors
/// Returns error only when no work could start at all; per-column failures
/// end up in the outcome.
pub async fn allow_null_on_columns(
    pool: &MySqlPool,
    columns: &[ColumnRecord],
) -> Result<BatchOutcome> {
    let mut conn = acquire(pool).await?;
    relax_sql_mode(&mut conn).await?;

    let outcome = fold_columns(&mut conn, columns, |conn, record| {
        Box::pin(async move {
            let statement = sql::allow_null_statement(record);
            let result = sqlx::query(&statement)
                .execute(&mut **conn)
                .await
                .map_err(|e| {
                    DatemendError::mutation_failed(
                        format!("Failed to allow NULL on {}", record.qualified_name()),
                        e,
                    )
                })?;

            debug!("Column {} now accepts NULL", record.qualified_name());
            Ok(result.rows_affected())
        })
    })
    .await;

    info!(
        "Allow-NULL completed for {} columns",
        outcome.succeeded.len()
    );
    Ok(outcome)
}

/// Converts each TIMESTAMP column to DATETIME, preserving nullability.
///
/// # Errors
/// Returns error only when no work could start at all; per-column failures
/// end up in the outcome.
pub async fn convert_to_datetime(
    pool: &MySqlPool,
    columns: &[ColumnRecord],
) -> Result<BatchOutcome> {
    let mut conn = acquire(pool).await?;
    relax_sql_mode(&mut conn).await?;

    let outcome = fold_columns(&mut conn, columns, |conn, record| {
        Box::pin(async move {
            let statement = sql::convert_statement(record);
            let result = sqlx::query(&statement)
                .execute(&mut **conn)
                .await
                .map_err(|e| {
                    DatemendError::mutation_failed(
                        format!(
                            "Failed to convert {} to DATETIME",
                            record.qualified_name()
                        ),
                        e,
                    )
                })?;

            debug!("Converted {} to DATETIME", record.qualified_name());
            Ok(result.rows_affected())
        })
    })
    .await;

    info!(
        "Converted {} columns to DATETIME",
        outcome.succeeded.len()
    );
    Ok(outcome)
}
