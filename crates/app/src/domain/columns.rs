//! Column encoding shared by the repositories.
//!
//! Amounts and counts are `u64` in the domain and `BIGINT` in storage.

use sqlx::{Row, postgres::PgRow};

/// Read a non-negative `BIGINT` column.
pub(crate) fn try_get_amount(row: &PgRow, col: &str) -> Result<u64, sqlx::Error> {
    let amount_i64: i64 = row.try_get(col)?;

    u64::try_from(amount_i64).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

/// Read a non-negative `INTEGER` column.
pub(crate) fn try_get_count(row: &PgRow, col: &str) -> Result<u32, sqlx::Error> {
    let count_i32: i32 = row.try_get(col)?;

    u32::try_from(count_i32).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

/// Read a `SMALLINT` percentage column.
pub(crate) fn try_get_percentage(row: &PgRow, col: &str) -> Result<u16, sqlx::Error> {
    let percentage_i16: i16 = row.try_get(col)?;

    u16::try_from(percentage_i16).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

/// Encode an amount for a `BIGINT` column.
pub(crate) fn encode_amount(col: &str, amount: u64) -> Result<i64, sqlx::Error> {
    i64::try_from(amount).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

/// Encode a count for an `INTEGER` column.
pub(crate) fn encode_count(col: &str, count: u32) -> Result<i32, sqlx::Error> {
    i32::try_from(count).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

/// Encode a percentage for a `SMALLINT` column.
pub(crate) fn encode_percentage(col: &str, percentage: u16) -> Result<i16, sqlx::Error> {
    i16::try_from(percentage).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}
