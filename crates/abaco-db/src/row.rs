//! Decoding helpers for decimal TEXT columns.

use abaco_core::Money;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

use crate::error::{DbError, DbResult};

fn parse(column: &str, raw: &str) -> DbResult<Decimal> {
    Decimal::from_str(raw).map_err(|e| DbError::InvalidData {
        column: column.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn decimal(row: &SqliteRow, column: &str) -> DbResult<Decimal> {
    let raw: String = row.try_get(column)?;
    parse(column, &raw)
}

pub(crate) fn opt_decimal(row: &SqliteRow, column: &str) -> DbResult<Option<Decimal>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|r| parse(column, &r)).transpose()
}

pub(crate) fn money(row: &SqliteRow, column: &str) -> DbResult<Money> {
    decimal(row, column).map(Money::new)
}

pub(crate) fn opt_money(row: &SqliteRow, column: &str) -> DbResult<Option<Money>> {
    Ok(opt_decimal(row, column)?.map(Money::new))
}

/// Integer column holding a length or a count.
pub(crate) fn usize_col(row: &SqliteRow, column: &str) -> DbResult<usize> {
    let raw: i64 = row.try_get(column)?;
    usize::try_from(raw).map_err(|e| DbError::InvalidData {
        column: column.to_string(),
        reason: e.to_string(),
    })
}
