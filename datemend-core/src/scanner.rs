//! MySQL metadata scanning for date-bearing columns.
//!
//! All introspection goes through information_schema. Count queries use the
//! textual zero-date predicate from [`crate::sql`], so they work regardless
//! of the server's sql_mode.

use serde_json::Value as JsonValue;
use sqlx::{MySqlPool, Row};
use tracing::{debug, warn};

use crate::Result;
use crate::error::DatemendError;
use crate::models::{COUNT_FAILED, ColumnRecord, DateColumnMeta, DateColumnType, Nullability};
use crate::sql;

/// Schemas that are never scanned or touched.
pub const SYSTEM_SCHEMAS: &[&str] = &[
    "information_schema",
    "mysql",
    "performance_schema",
    "sys",
];

/// Whether a schema belongs to the MySQL system namespace.
pub fn is_system_schema(name: &str) -> bool {
    SYSTEM_SCHEMAS.iter().any(|s| name.eq_ignore_ascii_case(s))
}

/// Lists user schemas visible to the connected account.
///
/// System schemas are filtered out unconditionally.
///
/// # Errors
/// Returns a scan error if the catalog query fails; schema enumeration is
/// the entry point of every scan, so there is no useful fallback.
pub async fn list_schemas(pool: &MySqlPool) -> Result<Vec<String>> {
    // Cast to CHAR to avoid VARBINARY type issues in MySQL 8.0+
    let schemata_query = r#"
        SELECT CAST(SCHEMA_NAME AS CHAR) as SCHEMA_NAME
        FROM INFORMATION_SCHEMA.SCHEMATA
        ORDER BY SCHEMA_NAME
    "#;

    let rows = sqlx::query(schemata_query)
        .fetch_all(pool)
        .await
        .map_err(|e| DatemendError::scan_failed("Failed to enumerate schemas", e))?;

    let mut schemas = Vec::new();
    for row in &rows {
        let name: String = row
            .try_get("SCHEMA_NAME")
            .map_err(|e| DatemendError::parse_field("SCHEMA_NAME", None, e))?;
        if !is_system_schema(&name) {
            schemas.push(name);
        }
    }

    debug!("Found {} user schemas", schemas.len());
    Ok(schemas)
}

/// Lists every TIMESTAMP and DATETIME column in the given schemas.
///
/// Only base tables are considered; view columns cannot be repaired in
/// place. Results are ordered by table and ordinal position within each
/// schema. An empty result is not an error.
///
/// # Errors
/// Returns a scan error if a catalog query fails.
pub async fn list_date_columns(
    pool: &MySqlPool,
    schemas: &[String],
) -> Result<Vec<DateColumnMeta>> {
    // Cast to CHAR to avoid VARBINARY type issues in MySQL 8.0+
    let columns_query = r#"
        SELECT
            CAST(c.TABLE_NAME AS CHAR) as TABLE_NAME,
            CAST(c.COLUMN_NAME AS CHAR) as COLUMN_NAME,
            CAST(c.DATA_TYPE AS CHAR) as DATA_TYPE,
            CAST(c.IS_NULLABLE AS CHAR) as IS_NULLABLE,
            CAST(c.COLUMN_DEFAULT AS CHAR) as COLUMN_DEFAULT
        FROM INFORMATION_SCHEMA.COLUMNS c
        JOIN INFORMATION_SCHEMA.TABLES t
          ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME
        WHERE c.TABLE_SCHEMA = ?
        AND t.TABLE_TYPE = 'BASE TABLE'
        AND c.DATA_TYPE IN ('timestamp', 'datetime')
        ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
    "#;

    let mut metas = Vec::new();
    for schema in schemas {
        let rows = sqlx::query(columns_query)
            .bind(schema)
            .fetch_all(pool)
            .await
            .map_err(|e| {
                DatemendError::scan_failed(
                    format!("Failed to list date columns in schema '{}'", schema),
                    e,
                )
            })?;

        for row in &rows {
            let table: String = row
                .try_get("TABLE_NAME")
                .map_err(|e| DatemendError::parse_field("TABLE_NAME", None, e))?;
            let column: String = row
                .try_get("COLUMN_NAME")
                .map_err(|e| DatemendError::parse_field("COLUMN_NAME", Some(&table), e))?;
            let data_type: String = row.try_get("DATA_TYPE").unwrap_or_default();
            let is_nullable: String = row.try_get("IS_NULLABLE").unwrap_or_default();
            let default_value: Option<String> = row.try_get("COLUMN_DEFAULT").ok();

            let Some(column_type) = DateColumnType::from_data_type(&data_type) else {
                continue;
            };

            metas.push(DateColumnMeta {
                schema: schema.clone(),
                table,
                column,
                column_type,
                nullable: Nullability::from_is_nullable(&is_nullable),
                default_value,
            });
        }
    }

    debug!(
        "Found {} date-bearing columns across {} schemas",
        metas.len(),
        schemas.len()
    );
    Ok(metas)
}

/// Counts zero-date rows in one column.
///
/// Failures are logged and reported as [`COUNT_FAILED`] instead of
/// propagated; one broken table must not abort a whole scan.
pub async fn count_bad_rows(pool: &MySqlPool, schema: &str, table: &str, column: &str) -> i64 {
    let statement = sql::count_bad_rows_statement(schema, table, column);

    match sqlx::query_scalar::<_, i64>(&statement)
        .fetch_one(pool)
        .await
    {
        Ok(count) => count,
        Err(e) => {
            warn!(
                "Failed to count zero dates in `{}`.`{}`.`{}`: {}",
                schema, table, column, e
            );
            COUNT_FAILED
        }
    }
}

/// Fetches up to `limit` example rows holding zero dates, rendered as JSON.
///
/// Sampling is best-effort preview material; failures yield an empty vec.
pub async fn sample_bad_rows(
    pool: &MySqlPool,
    schema: &str,
    table: &str,
    column: &str,
    limit: u32,
) -> Vec<JsonValue> {
    let statement = sql::sample_bad_rows_statement(schema, table, column);

    let rows = match sqlx::query(&statement)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            warn!(
                "Failed to sample zero-date rows from `{}`.`{}`: {}",
                schema, table, e
            );
            return Vec::new();
        }
    };

    rows.iter().map(row_to_json).collect()
}

/// Counts zero-date rows for every column, invoking `progress` per record.
///
/// This is the only place inventory records are minted, so a count always
/// rides along with the metadata it was taken for.
pub async fn scan_columns<F>(
    pool: &MySqlPool,
    metas: Vec<DateColumnMeta>,
    mut progress: F,
) -> Vec<ColumnRecord>
where
    F: FnMut(&ColumnRecord),
{
    let mut records = Vec::with_capacity(metas.len());
    for meta in metas {
        let bad_rows = count_bad_rows(pool, &meta.schema, &meta.table, &meta.column).await;
        let record = meta.into_record(bad_rows);
        progress(&record);
        records.push(record);
    }
    records
}

/// Re-reads one column's catalog entry and recounts its zero dates.
///
/// An ALTER may have changed the column's type or nullability, so both are
/// read fresh. Returns `Ok(None)` when the column no longer exists or is no
/// longer a date type; the caller decides how to present that.
///
/// # Errors
/// Returns a scan error if the catalog query fails.
pub async fn rescan_column(
    pool: &MySqlPool,
    schema: &str,
    table: &str,
    column: &str,
) -> Result<Option<ColumnRecord>> {
    // Cast to CHAR to avoid VARBINARY type issues in MySQL 8.0+
    let column_query = r#"
        SELECT
            CAST(DATA_TYPE AS CHAR) as DATA_TYPE,
            CAST(IS_NULLABLE AS CHAR) as IS_NULLABLE,
            CAST(COLUMN_DEFAULT AS CHAR) as COLUMN_DEFAULT
        FROM INFORMATION_SCHEMA.COLUMNS
        WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND COLUMN_NAME = ?
    "#;

    let row = sqlx::query(column_query)
        .bind(schema)
        .bind(table)
        .bind(column)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            DatemendError::scan_failed(
                format!(
                    "Failed to re-read column `{}`.`{}`.`{}`",
                    schema, table, column
                ),
                e,
            )
        })?;

    let Some(row) = row else {
        warn!(
            "Column `{}`.`{}`.`{}` no longer exists on the server",
            schema, table, column
        );
        return Ok(None);
    };

    let data_type: String = row
        .try_get("DATA_TYPE")
        .map_err(|e| DatemendError::parse_field("DATA_TYPE", Some(table), e))?;
    let Some(column_type) = DateColumnType::from_data_type(&data_type) else {
        warn!(
            "Column `{}`.`{}`.`{}` is now '{}', which this tool does not track",
            schema, table, column, data_type
        );
        return Ok(None);
    };

    let is_nullable: String = row.try_get("IS_NULLABLE").unwrap_or_default();
    let default_value: Option<String> = row.try_get("COLUMN_DEFAULT").ok();

    let meta = DateColumnMeta {
        schema: schema.to_string(),
        table: table.to_string(),
        column: column.to_string(),
        column_type,
        nullable: Nullability::from_is_nullable(&is_nullable),
        default_value,
    };

    let bad_rows = count_bad_rows(pool, schema, table, column).await;
    Ok(Some(meta.into_record(bad_rows)))
}

/// Converts a result row to a JSON object.
///
/// Values are read by ordinal so that duplicate column names resolve
/// left-to-right: the trailing CHAR re-read of the zero-date column lands
/// last and wins the map slot.
fn row_to_json(row: &sqlx::mysql::MySqlRow) -> JsonValue {
    use sqlx::Column;

    let mut map = serde_json::Map::new();
    for column in row.columns() {
        let value = extract_column_value(row, column.ordinal());
        map.insert(column.name().to_string(), value);
    }
    JsonValue::Object(map)
}

/// Extracts a column value as a JSON value.
fn extract_column_value(row: &sqlx::mysql::MySqlRow, index: usize) -> JsonValue {
    // Try different types in order of likelihood
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(JsonValue::Bool).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index) {
        return v
            .map(|d| JsonValue::String(d.to_rfc3339()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(index) {
        return v
            .map(|d| JsonValue::String(d.to_string()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(index) {
        return v
            .map(|d| JsonValue::String(d.to_string()))
            .unwrap_or(JsonValue::Null);
    }

    // Unsupported types (and undecodable zero dates) come back as null; the
    // CHAR re-read supplies the text for the column being previewed.
    JsonValue::Null
}
