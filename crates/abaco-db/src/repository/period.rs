//! # Fiscal Period Repository

use abaco_core::{FiscalPeriod, PeriodStatus};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use crate::error::DbResult;
use crate::row::usize_col;

const COLUMNS: &str =
    "code, company_id, name, start_date, end_date, status, subaccount_length";

/// Repository for fiscal periods.
pub struct PeriodRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PeriodRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        PeriodRepository { conn }
    }

    /// Gets a period by code.
    pub async fn get(&mut self, code: &str) -> DbResult<Option<FiscalPeriod>> {
        let sql = format!("SELECT {COLUMNS} FROM fiscal_periods WHERE code = ?1");
        let row = sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref().map(map_period).transpose()
    }

    /// Finds the period of a company containing `date`.
    pub async fn find_by_date(&mut self, company_id: i64, date: NaiveDate) -> DbResult<Option<FiscalPeriod>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM fiscal_periods
             WHERE company_id = ?1 AND start_date <= ?2 AND end_date >= ?2
             ORDER BY start_date LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(company_id)
            .bind(date)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref().map(map_period).transpose()
    }

    /// First period of the same company starting after `period` ends.
    pub async fn next_after(&mut self, period: &FiscalPeriod) -> DbResult<Option<FiscalPeriod>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM fiscal_periods
             WHERE company_id = ?1 AND start_date > ?2
             ORDER BY start_date LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(period.company_id)
            .bind(period.end_date)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref().map(map_period).transpose()
    }

    /// Lists the periods of a company, oldest first.
    pub async fn list(&mut self, company_id: i64) -> DbResult<Vec<FiscalPeriod>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM fiscal_periods WHERE company_id = ?1 ORDER BY start_date"
        );
        let rows = sqlx::query(&sql)
            .bind(company_id)
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(map_period).collect()
    }

    /// Inserts a period.
    pub async fn insert(&mut self, period: &FiscalPeriod) -> DbResult<()> {
        debug!(code = %period.code, "Inserting fiscal period");
        sqlx::query(
            "INSERT INTO fiscal_periods
                (code, company_id, name, start_date, end_date, status, subaccount_length)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&period.code)
        .bind(period.company_id)
        .bind(&period.name)
        .bind(period.start_date)
        .bind(period.end_date)
        .bind(period.status)
        .bind(period.subaccount_length as i64)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn set_status(&mut self, code: &str, status: PeriodStatus) -> DbResult<()> {
        debug!(code, ?status, "Updating period status");
        sqlx::query("UPDATE fiscal_periods SET status = ?1 WHERE code = ?2")
            .bind(status)
            .bind(code)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    /// Grows the sub-account code length; never shrinks it.
    pub async fn grow_subaccount_length(&mut self, code: &str, length: usize) -> DbResult<()> {
        sqlx::query(
            "UPDATE fiscal_periods SET subaccount_length = ?1
             WHERE code = ?2 AND subaccount_length < ?1",
        )
        .bind(length as i64)
        .bind(code)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    /// Whether the period has at least one account.
    pub async fn has_chart_of_accounts(&mut self, code: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE period_code = ?1")
            .bind(code)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count > 0)
    }
}

fn map_period(row: &SqliteRow) -> DbResult<FiscalPeriod> {
    Ok(FiscalPeriod {
        code: row.try_get("code")?,
        company_id: row.try_get("company_id")?,
        name: row.try_get("name")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        status: row.try_get("status")?,
        subaccount_length: usize_col(row, "subaccount_length")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn period(code: &str, year: i32) -> FiscalPeriod {
        FiscalPeriod {
            code: code.to_string(),
            company_id: 1,
            name: code.to_string(),
            start_date: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
            status: PeriodStatus::Open,
            subaccount_length: 10,
        }
    }

    #[tokio::test]
    async fn test_period_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = PeriodRepository::new(&mut conn);

        repo.insert(&period("2025", 2025)).await.unwrap();
        repo.insert(&period("2026", 2026)).await.unwrap();

        let found = repo
            .find_by_date(1, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.code, "2025");

        let next = repo.next_after(&found).await.unwrap().unwrap();
        assert_eq!(next.code, "2026");
        assert!(repo.next_after(&next).await.unwrap().is_none());
        assert!(!repo.has_chart_of_accounts("2025").await.unwrap());
    }

    #[tokio::test]
    async fn test_status_and_length() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = PeriodRepository::new(&mut conn);
        repo.insert(&period("2025", 2025)).await.unwrap();

        repo.set_status("2025", PeriodStatus::Closed).await.unwrap();
        repo.grow_subaccount_length("2025", 12).await.unwrap();
        repo.grow_subaccount_length("2025", 8).await.unwrap();

        let p = repo.get("2025").await.unwrap().unwrap();
        assert_eq!(p.status, PeriodStatus::Closed);
        assert_eq!(p.subaccount_length, 12);
    }
}
