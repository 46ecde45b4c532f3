//! SQL statement construction for count and remediation queries.
//!
//! Identifier names come from information_schema, not operator input, but
//! they are still backtick-quoted (embedded backticks doubled) so unusual
//! table or column names cannot break a statement.

use crate::models::ColumnRecord;

/// Session statement disabling strict mode for a remediation batch.
///
/// Strict sql_mode rejects the very zero-date values the UPDATE touches, so
/// the session is relaxed before mutating.
pub const RELAX_SQL_MODE: &str = "SET SESSION sql_mode = ''";

/// Quotes an identifier with backticks, doubling any embedded backtick.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Builds the `` `schema`.`table` `` form used in statements.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// WHERE predicate matching zero-date values in a column.
///
/// The CAST keeps the comparison textual, so it works for TIMESTAMP and
/// DATETIME columns under any sql_mode and matches both `0000-00-00` and
/// `0000-00-00 00:00:00` renderings.
pub fn zero_date_predicate(column: &str) -> String {
    format!("CAST({} AS CHAR) LIKE '0000-00-00%'", quote_ident(column))
}

/// COUNT of zero-date rows in a column.
pub fn count_bad_rows_statement(schema: &str, table: &str, column: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM {} WHERE {}",
        qualified_table(schema, table),
        zero_date_predicate(column)
    )
}

/// Full-row sample of zero-date rows, with the date column re-read as text.
///
/// `t.*` keeps the whole row for context; the trailing CAST re-selects the
/// zero-date column as CHAR under the same name, so JSON rendering picks up
/// readable text instead of a value the driver cannot decode.
pub fn sample_bad_rows_statement(schema: &str, table: &str, column: &str) -> String {
    let col = quote_ident(column);
    format!(
        "SELECT t.*, CAST(t.{col} AS CHAR) AS {col} FROM {} AS t WHERE {} LIMIT ?",
        qualified_table(schema, table),
        zero_date_predicate(column)
    )
}

/// UPDATE clearing zero-date rows to NULL.
pub fn fix_nulls_statement(schema: &str, table: &str, column: &str) -> String {
    format!(
        "UPDATE {} SET {} = NULL WHERE {}",
        qualified_table(schema, table),
        quote_ident(column),
        zero_date_predicate(column)
    )
}

/// ALTER making a column nullable while preserving its declared type.
pub fn allow_null_statement(record: &ColumnRecord) -> String {
    format!(
        "ALTER TABLE {} MODIFY COLUMN {} {} NULL",
        qualified_table(&record.schema, &record.table),
        quote_ident(&record.column),
        record.column_type.as_sql()
    )
}

/// ALTER converting a column to DATETIME while preserving its nullability.
pub fn convert_statement(record: &ColumnRecord) -> String {
    let null_clause = if record.nullable.is_nullable() {
        "NULL"
    } else {
        "NOT NULL"
    };
    format!(
        "ALTER TABLE {} MODIFY COLUMN {} DATETIME {}",
        qualified_table(&record.schema, &record.table),
        quote_ident(&record.column),
        null_clause
    )
}
