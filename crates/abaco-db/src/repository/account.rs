//! # Chart of Accounts Repository
//!
//! Accounts and sub-accounts are scoped by fiscal period.
//!
//! ## Concurrent Creation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  writer A                         writer B                              │
//! │  get_subaccount(4300000007) None  get_subaccount(4300000007) None       │
//! │  INSERT ✓                         INSERT ✗ UNIQUE(period_code, code)    │
//! │                                   └─► re-read, return A's row           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use abaco_core::{Account, SpecialAccount, SubAccount};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use crate::error::{DbError, DbResult};

const ACCOUNT_COLUMNS: &str = "period_code, code, description, parent_code, special";
const SUBACCOUNT_COLUMNS: &str = "period_code, code, account_code, description, special";

/// Repository for accounts and sub-accounts.
pub struct AccountRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> AccountRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        AccountRepository { conn }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    pub async fn get_account(&mut self, period_code: &str, code: &str) -> DbResult<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE period_code = ?1 AND code = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(period_code)
            .bind(code)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref().map(map_account).transpose()
    }

    /// Account tagged with `special` in a period.
    pub async fn account_by_special(
        &mut self,
        period_code: &str,
        special: SpecialAccount,
    ) -> DbResult<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
             WHERE period_code = ?1 AND special = ?2 ORDER BY code LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(period_code)
            .bind(special)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref().map(map_account).transpose()
    }

    pub async fn accounts(&mut self, period_code: &str) -> DbResult<Vec<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE period_code = ?1 ORDER BY code"
        );
        let rows = sqlx::query(&sql)
            .bind(period_code)
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(map_account).collect()
    }

    /// Inserts an account; an existing account with the same code is kept.
    pub async fn insert_account(&mut self, account: &Account) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO accounts (period_code, code, description, parent_code, special)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (period_code, code) DO NOTHING",
        )
        .bind(&account.period_code)
        .bind(&account.code)
        .bind(&account.description)
        .bind(&account.parent_code)
        .bind(account.special)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Sub-accounts
    // =========================================================================

    pub async fn get_subaccount(&mut self, period_code: &str, code: &str) -> DbResult<Option<SubAccount>> {
        let sql = format!(
            "SELECT {SUBACCOUNT_COLUMNS} FROM subaccounts WHERE period_code = ?1 AND code = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(period_code)
            .bind(code)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref().map(map_subaccount).transpose()
    }

    /// Sub-account tagged with `special` in a period (lowest code first).
    pub async fn subaccount_by_special(
        &mut self,
        period_code: &str,
        special: SpecialAccount,
    ) -> DbResult<Option<SubAccount>> {
        let sql = format!(
            "SELECT {SUBACCOUNT_COLUMNS} FROM subaccounts
             WHERE period_code = ?1 AND special = ?2 ORDER BY code LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(period_code)
            .bind(special)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref().map(map_subaccount).transpose()
    }

    /// Every tagged sub-account of a period.
    pub async fn special_subaccounts(&mut self, period_code: &str) -> DbResult<Vec<SubAccount>> {
        let sql = format!(
            "SELECT {SUBACCOUNT_COLUMNS} FROM subaccounts
             WHERE period_code = ?1 AND special IS NOT NULL ORDER BY code"
        );
        let rows = sqlx::query(&sql)
            .bind(period_code)
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(map_subaccount).collect()
    }

    pub async fn subaccounts(&mut self, period_code: &str) -> DbResult<Vec<SubAccount>> {
        let sql = format!(
            "SELECT {SUBACCOUNT_COLUMNS} FROM subaccounts WHERE period_code = ?1 ORDER BY code"
        );
        let rows = sqlx::query(&sql)
            .bind(period_code)
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(map_subaccount).collect()
    }

    /// Number of sub-accounts under an account.
    pub async fn count_under(&mut self, period_code: &str, account_code: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subaccounts WHERE period_code = ?1 AND account_code = ?2",
        )
        .bind(period_code)
        .bind(account_code)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(count)
    }

    /// Inserts a sub-account, failing with `UniqueViolation` if the code is
    /// already taken in the period.
    pub async fn insert_subaccount(&mut self, sub: &SubAccount) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO subaccounts (period_code, code, account_code, description, special)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&sub.period_code)
        .bind(&sub.code)
        .bind(&sub.account_code)
        .bind(&sub.description)
        .bind(sub.special)
        .execute(&mut *self.conn)
        .await?;

        debug!(period = %sub.period_code, code = %sub.code, "Sub-account created");
        Ok(())
    }

    /// Creates a sub-account, or returns the existing one with the same code.
    ///
    /// A unique violation means another writer created it first; the row is
    /// re-read instead of failing. Only for codes that name one account
    /// regardless of who asks (special and explicit codes).
    pub async fn create_subaccount(&mut self, sub: &SubAccount) -> DbResult<SubAccount> {
        match self.insert_subaccount(sub).await {
            Ok(()) => Ok(sub.clone()),
            Err(e) if e.is_unique_violation() => {
                debug!(period = %sub.period_code, code = %sub.code, "Sub-account already exists, re-reading");
                self.get_subaccount(&sub.period_code, &sub.code)
                    .await?
                    .ok_or_else(|| DbError::not_found("SubAccount", sub.code.clone()))
            }
            Err(e) => Err(e),
        }
    }

    /// Copies every account and sub-account of `from` into `to`.
    ///
    /// Codes already present in `to` are kept.
    pub async fn copy_chart(&mut self, from: &str, to: &str) -> DbResult<u64> {
        let accounts = sqlx::query(
            "INSERT INTO accounts (period_code, code, description, parent_code, special)
             SELECT ?2, code, description, parent_code, special FROM accounts WHERE period_code = ?1
             ON CONFLICT (period_code, code) DO NOTHING",
        )
        .bind(from)
        .bind(to)
        .execute(&mut *self.conn)
        .await?
        .rows_affected();

        let subaccounts = sqlx::query(
            "INSERT INTO subaccounts (period_code, code, account_code, description, special)
             SELECT ?2, code, account_code, description, special FROM subaccounts WHERE period_code = ?1
             ON CONFLICT (period_code, code) DO NOTHING",
        )
        .bind(from)
        .bind(to)
        .execute(&mut *self.conn)
        .await?
        .rows_affected();

        debug!(from, to, accounts, subaccounts, "Chart of accounts copied");
        Ok(accounts + subaccounts)
    }
}

fn map_account(row: &SqliteRow) -> DbResult<Account> {
    Ok(Account {
        code: row.try_get("code")?,
        period_code: row.try_get("period_code")?,
        description: row.try_get("description")?,
        parent_code: row.try_get("parent_code")?,
        special: row.try_get("special")?,
    })
}

fn map_subaccount(row: &SqliteRow) -> DbResult<SubAccount> {
    Ok(SubAccount {
        code: row.try_get("code")?,
        period_code: row.try_get("period_code")?,
        account_code: row.try_get("account_code")?,
        description: row.try_get("description")?,
        special: row.try_get("special")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::period::PeriodRepository;
    use abaco_core::{FiscalPeriod, PeriodStatus};
    use chrono::NaiveDate;

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        for year in [2025, 2026] {
            PeriodRepository::new(&mut conn)
                .insert(&FiscalPeriod {
                    code: year.to_string(),
                    company_id: 1,
                    name: year.to_string(),
                    start_date: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
                    end_date: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
                    status: PeriodStatus::Open,
                    subaccount_length: 10,
                })
                .await
                .unwrap();
        }
        AccountRepository::new(&mut conn)
            .insert_account(&Account {
                code: "430".to_string(),
                period_code: "2025".to_string(),
                description: "Customers".to_string(),
                parent_code: None,
                special: Some(SpecialAccount::Customer),
            })
            .await
            .unwrap();
        db
    }

    fn customer_sub(code: &str) -> SubAccount {
        SubAccount {
            code: code.to_string(),
            period_code: "2025".to_string(),
            account_code: "430".to_string(),
            description: "ACME".to_string(),
            special: None,
        }
    }

    #[tokio::test]
    async fn test_create_subaccount_twice_returns_existing() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = AccountRepository::new(&mut conn);

        repo.create_subaccount(&customer_sub("4300000001")).await.unwrap();
        let mut again = customer_sub("4300000001");
        again.description = "Other".to_string();
        let existing = repo.create_subaccount(&again).await.unwrap();

        assert_eq!(existing.description, "ACME");
        assert_eq!(repo.count_under("2025", "430").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_subaccount_rejects_taken_code() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = AccountRepository::new(&mut conn);

        repo.insert_subaccount(&customer_sub("4300000001")).await.unwrap();
        let err = repo
            .insert_subaccount(&customer_sub("4300000001"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_special_lookup_and_copy() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = AccountRepository::new(&mut conn);

        let account = repo
            .account_by_special("2025", SpecialAccount::Customer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.code, "430");
        repo.create_subaccount(&customer_sub("4300000001")).await.unwrap();

        let copied = repo.copy_chart("2025", "2026").await.unwrap();
        assert_eq!(copied, 2);
        assert!(repo.get_subaccount("2026", "4300000001").await.unwrap().is_some());
        assert_eq!(repo.copy_chart("2025", "2026").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_subaccount_requires_parent_account() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut orphan = customer_sub("5700000000");
        orphan.account_code = "570".to_string();
        let err = AccountRepository::new(&mut conn)
            .create_subaccount(&orphan)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
