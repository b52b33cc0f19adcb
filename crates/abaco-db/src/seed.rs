//! # Default Data Loader
//!
//! Writes the default catalog (chart of accounts, taxes, series,
//! withholdings, payment methods) into a database.

use abaco_core::catalog;
use abaco_core::FiscalPeriod;
use sqlx::SqliteConnection;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::account::AccountRepository;
use crate::repository::master::MasterDataRepository;
use crate::repository::period::PeriodRepository;

/// What [`seed_period`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub accounts: usize,
    pub subaccounts: usize,
}

/// Inserts the period if missing and loads the default chart into it.
///
/// Existing accounts and sub-accounts are kept.
pub async fn seed_period(conn: &mut SqliteConnection, period: &FiscalPeriod) -> DbResult<SeedSummary> {
    if PeriodRepository::new(conn).get(&period.code).await?.is_none() {
        PeriodRepository::new(conn).insert(period).await?;
    }

    let accounts = catalog::default_accounts(&period.code);
    let subaccounts = catalog::default_subaccounts(&period.code, period.subaccount_length)
        .map_err(|e| DbError::Internal(e.to_string()))?;

    let mut repo = AccountRepository::new(conn);
    for account in &accounts {
        repo.insert_account(account).await?;
    }
    for sub in &subaccounts {
        repo.create_subaccount(sub).await?;
    }

    info!(
        period = %period.code,
        accounts = accounts.len(),
        subaccounts = subaccounts.len(),
        "Default chart of accounts loaded"
    );
    Ok(SeedSummary {
        accounts: accounts.len(),
        subaccounts: subaccounts.len(),
    })
}

/// Saves the default taxes, series, withholdings and payment methods.
pub async fn seed_master_data(conn: &mut SqliteConnection) -> DbResult<()> {
    let mut repo = MasterDataRepository::new(conn);
    for tax in catalog::default_taxes() {
        repo.save_tax(&tax).await?;
    }
    for series in catalog::default_series() {
        repo.save_series(&series).await?;
    }
    for withholding in catalog::default_withholdings() {
        repo.save_withholding(&withholding).await?;
    }
    for method in catalog::default_payment_methods() {
        repo.save_payment_method(&method).await?;
    }
    info!("Default master data loaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use abaco_core::SpecialAccount;

    #[tokio::test]
    async fn test_seed_is_repeatable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        let period = FiscalPeriod::calendar_year(1, 2025, 10).unwrap();

        let first = seed_period(&mut tx, &period).await.unwrap();
        let second = seed_period(&mut tx, &period).await.unwrap();
        assert_eq!(first, second);
        seed_master_data(&mut tx).await.unwrap();
        seed_master_data(&mut tx).await.unwrap();

        let cash = AccountRepository::new(&mut tx)
            .subaccount_by_special("2025", SpecialAccount::Cash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cash.code, "5700000000");
        assert_eq!(MasterDataRepository::new(&mut tx).taxes().await.unwrap().len(), 4);
        tx.commit().await.unwrap();
    }
}
