//! Scan cache persistence.
//!
//! The inventory from the most recent scan is kept in a single JSON document
//! so a restart can skip straight to reporting and remediation. The cache is
//! keyed by (host, port); a document written for a different server is
//! silently ignored and the operator is asked to scan again.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Result;
use crate::error::DatemendError;
use crate::models::{ColumnRecord, Inventory};

/// Connection identity a cache document was written for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConnection {
    pub host: String,
    pub port: u16,
}

/// On-disk shape of the scan cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheDocument {
    pub connection: CacheConnection,
    pub timestamp: DateTime<Utc>,
    pub schemas: Vec<String>,
    pub columns: Vec<ColumnRecord>,
}

impl CacheDocument {
    /// Converts the document back into an inventory, keeping its timestamp.
    pub fn into_inventory(self) -> Inventory {
        Inventory {
            schemas: self.schemas,
            columns: self.columns,
            scanned_at: self.timestamp,
        }
    }
}

/// Loads a cached inventory for the given server, if one exists.
///
/// Absent files, unreadable files, unparsable JSON, documents written for a
/// different (host, port), and documents listing the same column twice all
/// yield `None`. The cache never blocks a run; a miss just means the
/// operator starts with a fresh scan.
pub async fn load(path: &Path, host: &str, port: u16) -> Option<Inventory> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            debug!("No usable cache at {}: {}", path.display(), e);
            return None;
        }
    };

    let document: CacheDocument = match serde_json::from_str(&raw) {
        Ok(document) => document,
        Err(e) => {
            warn!("Ignoring corrupt cache file {}: {}", path.display(), e);
            return None;
        }
    };

    if document.connection.host != host || document.connection.port != port {
        debug!(
            "Cache at {} belongs to {}:{}, not {}:{}; ignoring",
            path.display(),
            document.connection.host,
            document.connection.port,
            host,
            port
        );
        return None;
    }

    let inventory = document.into_inventory();

    // A scan records each (schema, table, column) key exactly once, so a
    // repeat means the document is not one of ours.
    if let Some(duplicate) = inventory.duplicated_column() {
        warn!(
            "Ignoring cache file {}: column {} is listed more than once",
            path.display(),
            duplicate.qualified_name()
        );
        return None;
    }

    debug!(
        "Loaded cached inventory from {} ({} columns, scanned {})",
        path.display(),
        inventory.columns.len(),
        inventory.scanned_at
    );
    Some(inventory)
}

/// Writes the inventory to the cache file, replacing any previous document.
///
/// # Errors
/// Returns error if serialization or the file write fails.
pub async fn save(path: &Path, host: &str, port: u16, inventory: &Inventory) -> Result<()> {
    let document = CacheDocument {
        connection: CacheConnection {
            host: host.to_string(),
            port,
        },
        timestamp: Utc::now(),
        schemas: inventory.schemas.clone(),
        columns: inventory.columns.clone(),
    };

    let json =
        serde_json::to_string_pretty(&document).map_err(|e| DatemendError::Serialization {
            context: "Failed to serialize scan cache".to_string(),
            source: e,
        })?;

    tokio::fs::write(path, json)
        .await
        .map_err(|e| DatemendError::Io {
            context: format!("Failed to write to {}", path.display()),
            source: e,
        })?;

    debug!("Saved scan cache to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateColumnMeta, DateColumnType, Nullability};

    fn sample_inventory() -> Inventory {
        let meta = DateColumnMeta {
            schema: "db1".to_string(),
            table: "orders".to_string(),
            column: "created_at".to_string(),
            column_type: DateColumnType::Datetime,
            nullable: Nullability::No,
            default_value: Some("0000-00-00 00:00:00".to_string()),
        };
        Inventory::new(vec!["db1".to_string()], vec![meta.into_record(5)])
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let inventory = sample_inventory();

        save(&path, "127.0.0.1", 3306, &inventory).await.unwrap();
        let loaded = load(&path, "127.0.0.1", 3306).await.unwrap();

        assert_eq!(loaded.schemas, inventory.schemas);
        assert_eq!(loaded.columns, inventory.columns);
    }

    #[tokio::test]
    async fn test_cache_miss_on_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");

        assert!(load(&path, "127.0.0.1", 3306).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_miss_on_different_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let inventory = sample_inventory();

        save(&path, "127.0.0.1", 3306, &inventory).await.unwrap();

        assert!(load(&path, "db.example.com", 3306).await.is_none());
        assert!(load(&path, "127.0.0.1", 3307).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_miss_on_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        assert!(load(&path, "127.0.0.1", 3306).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_miss_on_duplicated_column_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        // A document listing the same fixable column twice would double
        // every candidate set it seeds; it must not load at all.
        let record = DateColumnMeta {
            schema: "db1".to_string(),
            table: "orders".to_string(),
            column: "created_at".to_string(),
            column_type: DateColumnType::Datetime,
            nullable: Nullability::Yes,
            default_value: None,
        }
        .into_record(3);
        let doubled = Inventory::new(
            vec!["db1".to_string()],
            vec![record.clone(), record],
        );
        save(&path, "127.0.0.1", 3306, &doubled).await.unwrap();

        assert!(load(&path, "127.0.0.1", 3306).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_document_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let inventory = sample_inventory();

        save(&path, "127.0.0.1", 3306, &inventory).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(value["connection"]["host"], "127.0.0.1");
        assert_eq!(value["connection"]["port"], 3306);
        assert!(value["timestamp"].is_string());
        assert_eq!(value["columns"][0]["nullable"], "NO");
        assert_eq!(value["columns"][0]["column_type"], "datetime");
        assert_eq!(value["columns"][0]["bad_rows"], 5);
    }
}
