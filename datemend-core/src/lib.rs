//! Core scan, cache, and remediation engine for datemend.
//!
//! This crate provides everything the interactive binary builds on: MySQL
//! metadata scanning for date-bearing columns, zero-date row counting, the
//! on-disk scan cache, and the remediation operations that repair zero
//! dates and retire TIMESTAMP columns ahead of 2038.
//!
//! # Security Guarantees
//! - No credentials stored or logged in any data structures
//! - Connection URLs are redacted before they reach logs or errors
//! - MySQL system schemas are never scanned or mutated
//!
//! # Architecture
//! The core library follows these patterns:
//! - Free async functions over a shared `MySqlPool` for all database work
//! - Inventory records are minted only together with their zero-date count
//! - Remediation batches stop at the first failure and report the prefix
//!   that completed

pub mod cache;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod models;
pub mod remediation;
pub mod scanner;
pub mod sql;

// Re-export commonly used types
pub use config::ConnectionSettings;
pub use error::{DatemendError, Result, redact_database_url};
pub use logging::init_logging;
pub use models::{
    COUNT_FAILED, ColumnRecord, ColumnStatus, DateColumnMeta, DateColumnType, Inventory,
    Nullability, TableSelection,
};
pub use remediation::{BatchOutcome, RemediatedColumn};
