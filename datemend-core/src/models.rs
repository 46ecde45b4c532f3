//! Core data models for the zero-date inventory.
//!
//! This module defines the structures used to represent date-bearing columns,
//! their zero-date row counts, and the operator's table selections. All models
//! are designed to be serializable for the scan cache.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Sentinel stored in `bad_rows` when the count query for a column failed.
///
/// A failed count is never the same as a count of zero: columns carrying this
/// sentinel are reported but excluded from both zero-date fix sets. Conversion
/// candidacy is unaffected because it depends on the declared type alone.
pub const COUNT_FAILED: i64 = -1;

/// Date-bearing MySQL column types targeted by the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateColumnType {
    Timestamp,
    Datetime,
}

impl DateColumnType {
    /// Parses an information_schema `DATA_TYPE` value.
    pub fn from_data_type(data_type: &str) -> Option<Self> {
        match data_type.to_ascii_lowercase().as_str() {
            "timestamp" => Some(Self::Timestamp),
            "datetime" => Some(Self::Datetime),
            _ => None,
        }
    }

    /// SQL keyword for use in DDL statements.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Timestamp => "TIMESTAMP",
            Self::Datetime => "DATETIME",
        }
    }
}

impl std::fmt::Display for DateColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timestamp => write!(f, "timestamp"),
            Self::Datetime => write!(f, "datetime"),
        }
    }
}

/// Column nullability as reported by information_schema `IS_NULLABLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Nullability {
    #[serde(rename = "YES")]
    Yes,
    #[serde(rename = "NO")]
    No,
}

impl Nullability {
    /// Parses an information_schema `IS_NULLABLE` value.
    pub fn from_is_nullable(value: &str) -> Self {
        if value.eq_ignore_ascii_case("yes") {
            Self::Yes
        } else {
            Self::No
        }
    }

    /// Whether the column accepts NULL.
    pub fn is_nullable(self) -> bool {
        matches!(self, Self::Yes)
    }
}

impl std::fmt::Display for Nullability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "YES"),
            Self::No => write!(f, "NO"),
        }
    }
}

/// Column metadata from information_schema, before any row counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateColumnMeta {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub column_type: DateColumnType,
    pub nullable: Nullability,
    pub default_value: Option<String>,
}

impl DateColumnMeta {
    /// Attaches a bad-row count, producing the full inventory record.
    ///
    /// This is the only way to build a [`ColumnRecord`], so selection logic
    /// never sees a column without a count attached.
    pub fn into_record(self, bad_rows: i64) -> ColumnRecord {
        ColumnRecord {
            schema: self.schema,
            table: self.table,
            column: self.column,
            column_type: self.column_type,
            nullable: self.nullable,
            default_value: self.default_value,
            bad_rows,
        }
    }

    /// Display name in `` `schema`.`table`.`column` `` form.
    pub fn qualified_name(&self) -> String {
        format!("`{}`.`{}`.`{}`", self.schema, self.table, self.column)
    }
}

/// A date-bearing column with its zero-date row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub column_type: DateColumnType,
    pub nullable: Nullability,
    pub default_value: Option<String>,
    /// Number of rows holding a zero-date value, or [`COUNT_FAILED`].
    pub bad_rows: i64,
}

impl ColumnRecord {
    /// Whether the count query for this column failed.
    pub fn count_failed(&self) -> bool {
        self.bad_rows < 0
    }

    /// Whether the column holds at least one zero-date row.
    pub fn has_bad_rows(&self) -> bool {
        self.bad_rows > 0
    }

    /// Whether zero-date rows can be set to NULL directly.
    pub fn is_fixable(&self) -> bool {
        self.has_bad_rows() && self.nullable.is_nullable()
    }

    /// Whether the column must be made nullable before its rows can be fixed.
    pub fn needs_null_permission(&self) -> bool {
        self.has_bad_rows() && !self.nullable.is_nullable()
    }

    /// Whether the column is a candidate for TIMESTAMP to DATETIME conversion.
    ///
    /// Every TIMESTAMP column qualifies, whatever its bad-row count; the
    /// conversion itself does not read the rows that hold zero dates.
    pub fn is_convertible(&self) -> bool {
        self.column_type == DateColumnType::Timestamp
    }

    /// Whether the column default is itself a zero date.
    pub fn has_zero_default(&self) -> bool {
        self.default_value
            .as_deref()
            .is_some_and(|d| d.starts_with("0000-00-00"))
    }

    /// Classification for the inventory report.
    pub fn status(&self) -> ColumnStatus {
        if self.count_failed() {
            ColumnStatus::CountFailed
        } else if self.is_fixable() {
            ColumnStatus::BadFixable
        } else if self.needs_null_permission() {
            ColumnStatus::BadNotNull
        } else {
            ColumnStatus::Clean
        }
    }

    /// Display name in `` `schema`.`table`.`column` `` form.
    pub fn qualified_name(&self) -> String {
        format!("`{}`.`{}`.`{}`", self.schema, self.table, self.column)
    }
}

/// Classification of a column for the inventory report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnStatus {
    /// No zero-date rows
    Clean,
    /// Zero-date rows present and the column accepts NULL
    BadFixable,
    /// Zero-date rows present but the column is NOT NULL
    BadNotNull,
    /// The count query failed; the column is excluded from remediation
    CountFailed,
}

impl ColumnStatus {
    /// Short label for the report table.
    pub fn label(self) -> &'static str {
        match self {
            Self::Clean => "CLEAN",
            Self::BadFixable => "BAD",
            Self::BadNotNull => "BAD (NOT NULL)",
            Self::CountFailed => "ERROR",
        }
    }
}

/// Complete scan result for a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    /// Schemas that were scanned, in enumeration order
    pub schemas: Vec<String>,
    /// All date-bearing columns found, with their counts
    pub columns: Vec<ColumnRecord>,
    /// When the scan completed
    pub scanned_at: chrono::DateTime<chrono::Utc>,
}

impl Inventory {
    /// Creates an inventory stamped with the current time.
    pub fn new(schemas: Vec<String>, columns: Vec<ColumnRecord>) -> Self {
        Self {
            schemas,
            columns,
            scanned_at: chrono::Utc::now(),
        }
    }

    /// Whether the inventory contains no columns at all.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns whose zero-date rows can be nulled directly.
    pub fn fixable_columns(&self) -> Vec<&ColumnRecord> {
        self.columns.iter().filter(|c| c.is_fixable()).collect()
    }

    /// Columns with zero-date rows that are still NOT NULL.
    pub fn not_null_bad_columns(&self) -> Vec<&ColumnRecord> {
        self.columns
            .iter()
            .filter(|c| c.needs_null_permission())
            .collect()
    }

    /// TIMESTAMP columns eligible for conversion to DATETIME.
    pub fn convertible_columns(&self) -> Vec<&ColumnRecord> {
        self.columns.iter().filter(|c| c.is_convertible()).collect()
    }

    /// Columns whose count query failed.
    pub fn failed_columns(&self) -> Vec<&ColumnRecord> {
        self.columns.iter().filter(|c| c.count_failed()).collect()
    }

    /// Columns whose declared DEFAULT is itself a zero date.
    ///
    /// Fixing rows does not touch the DEFAULT, so these columns keep
    /// producing bad rows until their definition changes.
    pub fn zero_default_columns(&self) -> Vec<&ColumnRecord> {
        self.columns
            .iter()
            .filter(|c| c.has_zero_default())
            .collect()
    }

    /// First column whose (schema, table, column) key repeats, if any.
    ///
    /// A scan mints each catalog column exactly once, so a duplicate can
    /// only arrive from a cache document this tool did not write.
    pub fn duplicated_column(&self) -> Option<&ColumnRecord> {
        let mut seen = BTreeSet::new();
        self.columns
            .iter()
            .find(|c| !seen.insert((c.schema.as_str(), c.table.as_str(), c.column.as_str())))
    }

    /// Total zero-date rows across all counted columns.
    pub fn bad_row_total(&self) -> i64 {
        self.columns
            .iter()
            .filter(|c| c.has_bad_rows())
            .map(|c| c.bad_rows)
            .sum()
    }

    /// Number of columns holding at least one zero-date row.
    pub fn bad_column_count(&self) -> usize {
        self.columns.iter().filter(|c| c.has_bad_rows()).count()
    }

    /// Merges a targeted rescan result back into the inventory.
    ///
    /// `None` means the column no longer exists on the server; the record is
    /// kept with its count marked failed so the report does not silently
    /// present it as clean.
    pub fn apply_rescan(
        &mut self,
        schema: &str,
        table: &str,
        column: &str,
        refreshed: Option<ColumnRecord>,
    ) {
        if let Some(slot) = self
            .columns
            .iter_mut()
            .find(|c| c.schema == schema && c.table == table && c.column == column)
        {
            match refreshed {
                Some(record) => *slot = record,
                None => slot.bad_rows = COUNT_FAILED,
            }
        }
    }
}

/// A set of `(schema, table)` pairs chosen by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSelection {
    tables: BTreeSet<(String, String)>,
}

impl TableSelection {
    /// Builds a selection from `(schema, table)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            tables: pairs.into_iter().collect(),
        }
    }

    /// Whether no tables are selected.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Number of selected tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the given table is part of the selection.
    pub fn contains(&self, schema: &str, table: &str) -> bool {
        self.tables.iter().any(|(s, t)| s == schema && t == table)
    }

    /// Restricts candidate columns to the selected tables, preserving order.
    pub fn filter_columns<'a>(
        &self,
        columns: impl IntoIterator<Item = &'a ColumnRecord>,
    ) -> Vec<&'a ColumnRecord> {
        columns
            .into_iter()
            .filter(|c| self.contains(&c.schema, &c.table))
            .collect()
    }
}

/// Distinct `(schema, table)` pairs covered by a candidate set, sorted.
pub fn unique_tables<'a>(
    columns: impl IntoIterator<Item = &'a ColumnRecord>,
) -> Vec<(String, String)> {
    let set: BTreeSet<(String, String)> = columns
        .into_iter()
        .map(|c| (c.schema.clone(), c.table.clone()))
        .collect();
    set.into_iter().collect()
}
