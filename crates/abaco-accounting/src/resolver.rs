//! # Account Resolver
//!
//! Finds the sub-account a posting goes to, creating it on demand.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  explicit code on the entity (subject, tax, product, payment method)    │
//! │       │ exists in period? ──yes──► use it                               │
//! │       │ no ──► create under the longest matching account                │
//! │       ▼                                                                 │
//! │  customer group code (customers only)                                   │
//! │       ▼                                                                 │
//! │  special account of the relevant kind                                   │
//! │       │ tagged sub-account? ──yes──► use it (cached)                    │
//! │       │ tagged account? ──yes──► create a child sub-account             │
//! │       ▼                                                                 │
//! │  None ──► caller aborts with a "<kind>-account-not-found" key           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two writers racing to create the same special or explicit code both
//! succeed: the repository re-reads the row on a unique violation. Generated
//! subject codes never adopt an existing row; a taken code moves on to the
//! next sequence number.

use abaco_core::{
    fill_to_length, FiscalPeriod, PaymentMethod, SpecialAccount, SubAccount, Subject, Tax,
    TradeSide, Withholding,
};
use abaco_db::{AccountRepository, MasterDataRepository, PeriodRepository};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{keys, AccountingError, AccountingResult};

/// Attempts at finding a free sequential subject code.
const MAX_CODE_ATTEMPTS: usize = 100;

/// Resolves sub-accounts for one fiscal period.
#[derive(Debug, Clone)]
pub struct AccountResolver {
    period: FiscalPeriod,
    specials: HashMap<SpecialAccount, SubAccount>,
}

impl AccountResolver {
    /// Creates a resolver for `period` and loads its special sub-accounts.
    pub async fn load(conn: &mut SqliteConnection, period: FiscalPeriod) -> AccountingResult<Self> {
        let mut resolver = AccountResolver {
            period,
            specials: HashMap::new(),
        };
        resolver.refresh(conn).await?;
        Ok(resolver)
    }

    pub fn period(&self) -> &FiscalPeriod {
        &self.period
    }

    /// Reloads the special sub-account cache.
    pub async fn refresh(&mut self, conn: &mut SqliteConnection) -> AccountingResult<()> {
        let subs = AccountRepository::new(conn)
            .special_subaccounts(&self.period.code)
            .await?;
        self.specials.clear();
        for sub in subs {
            if let Some(tag) = sub.special {
                self.specials.entry(tag).or_insert(sub);
            }
        }
        debug!(period = %self.period.code, cached = self.specials.len(), "Special sub-accounts loaded");
        Ok(())
    }

    // =========================================================================
    // Special Accounts
    // =========================================================================

    /// Sub-account tagged `tag`, created under the tagged account if needed.
    pub async fn special(
        &mut self,
        conn: &mut SqliteConnection,
        tag: SpecialAccount,
    ) -> AccountingResult<Option<SubAccount>> {
        if let Some(sub) = self.specials.get(&tag) {
            return Ok(Some(sub.clone()));
        }

        let mut repo = AccountRepository::new(conn);
        let sub = match repo.subaccount_by_special(&self.period.code, tag).await? {
            Some(sub) => sub,
            None => {
                let Some(account) = repo.account_by_special(&self.period.code, tag).await? else {
                    return Ok(None);
                };
                let code = fill_to_length(self.period.subaccount_length, &account.code, "")?;
                repo.create_subaccount(&SubAccount {
                    code,
                    period_code: self.period.code.clone(),
                    account_code: account.code,
                    description: account.description,
                    special: Some(tag),
                })
                .await?
            }
        };

        self.specials.insert(tag, sub.clone());
        Ok(Some(sub))
    }

    /// Sub-account with an explicit code, created if missing.
    ///
    /// The parent is the longest account code that prefixes `code`, or the
    /// account tagged `fallback`.
    pub async fn explicit(
        &mut self,
        conn: &mut SqliteConnection,
        code: &str,
        description: &str,
        fallback: SpecialAccount,
    ) -> AccountingResult<Option<SubAccount>> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }

        let mut repo = AccountRepository::new(conn);
        if let Some(sub) = repo.get_subaccount(&self.period.code, code).await? {
            return Ok(Some(sub));
        }

        let parent = repo
            .accounts(&self.period.code)
            .await?
            .into_iter()
            .filter(|a| code.starts_with(a.code.as_str()) && a.code.len() < code.len())
            .max_by_key(|a| a.code.len());
        let parent = match parent {
            Some(account) => account,
            None => match repo.account_by_special(&self.period.code, fallback).await? {
                Some(account) => account,
                None => return Ok(None),
            },
        };

        let sub = repo
            .create_subaccount(&SubAccount {
                code: code.to_string(),
                period_code: self.period.code.clone(),
                account_code: parent.code,
                description: description.to_string(),
                special: None,
            })
            .await?;
        self.grow_length(conn, code.len()).await?;
        Ok(Some(sub))
    }

    /// Explicit code when set, special account otherwise.
    async fn explicit_or_special(
        &mut self,
        conn: &mut SqliteConnection,
        code: Option<&str>,
        description: &str,
        tag: SpecialAccount,
    ) -> AccountingResult<Option<SubAccount>> {
        if let Some(code) = code.filter(|c| !c.trim().is_empty()) {
            if let Some(sub) = self.explicit(conn, code, description, tag).await? {
                return Ok(Some(sub));
            }
        }
        self.special(conn, tag).await
    }

    async fn grow_length(&mut self, conn: &mut SqliteConnection, length: usize) -> AccountingResult<()> {
        if length > self.period.subaccount_length {
            PeriodRepository::new(conn)
                .grow_subaccount_length(&self.period.code, length)
                .await?;
            debug!(period = %self.period.code, length, "Sub-account length grown");
            self.period.subaccount_length = length;
        }
        Ok(())
    }

    // =========================================================================
    // Subjects
    // =========================================================================

    /// Sub-account of a customer or supplier.
    ///
    /// Generated codes are written back to the subject so the next document
    /// finds them directly.
    pub async fn subject(
        &mut self,
        conn: &mut SqliteConnection,
        subject: &Subject,
    ) -> AccountingResult<Option<SubAccount>> {
        let tag = match subject.side {
            TradeSide::Sale => SpecialAccount::Customer,
            TradeSide::Purchase => SpecialAccount::Supplier,
        };

        if let Some(code) = subject.subaccount.as_deref() {
            if let Some(sub) = self.explicit(conn, code, &subject.name, tag).await? {
                return Ok(Some(sub));
            }
        }

        if subject.side == TradeSide::Sale {
            if let Some(group_code) = subject.group_code.as_deref() {
                let group = MasterDataRepository::new(conn).customer_group(group_code).await?;
                if let Some(code) = group.and_then(|g| g.subaccount) {
                    if let Some(sub) = self.explicit(conn, &code, &subject.name, tag).await? {
                        return Ok(Some(sub));
                    }
                }
            }
        }

        let Some(parent) = AccountRepository::new(conn)
            .account_by_special(&self.period.code, tag)
            .await?
        else {
            return Ok(None);
        };

        let sub = self.create_subject_subaccount(conn, &parent.code, subject).await?;
        self.grow_length(conn, sub.code.len()).await?;

        MasterDataRepository::new(conn)
            .set_subject_subaccount(subject.side, &subject.code, &sub.code)
            .await?;
        debug!(subject = %subject.code, subaccount = %sub.code, "Subject sub-account assigned");
        Ok(Some(sub))
    }

    /// Creates a fresh sub-account for a subject under `parent`.
    ///
    /// Numeric subject codes map onto the sub-account suffix; anything else,
    /// or a suffix already taken, takes the next free sequence number.
    async fn create_subject_subaccount(
        &self,
        conn: &mut SqliteConnection,
        parent: &str,
        subject: &Subject,
    ) -> AccountingResult<SubAccount> {
        let length = self.period.subaccount_length;
        let mut repo = AccountRepository::new(conn);

        let numeric = !subject.code.is_empty() && subject.code.chars().all(|c| c.is_ascii_digit());
        let mut preferred = if numeric {
            Some(fill_to_length(length, parent, subject.code.trim_start_matches('0'))?)
        } else {
            None
        };
        let mut sequence = repo.count_under(&self.period.code, parent).await? + 1;

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = match preferred.take() {
                Some(code) => code,
                None => {
                    let code = fill_to_length(length, parent, &sequence.to_string())?;
                    sequence += 1;
                    code
                }
            };
            let sub = SubAccount {
                code,
                period_code: self.period.code.clone(),
                account_code: parent.to_string(),
                description: subject.name.clone(),
                special: None,
            };
            match repo.insert_subaccount(&sub).await {
                Ok(()) => return Ok(sub),
                Err(e) if e.is_unique_violation() => {
                    debug!(subject = %subject.code, code = %sub.code, "Sub-account code taken, trying next");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AccountingError::configuration(keys::SUBACCOUNT_CODE_EXHAUSTED)
            .with("account", parent)
            .with("subject", &subject.code)
            .with("attempts", MAX_CODE_ATTEMPTS))
    }

    // =========================================================================
    // Taxes and Withholdings
    // =========================================================================

    /// VAT sub-account: output (charged) on sales, input (borne) on purchases.
    pub async fn vat(
        &mut self,
        conn: &mut SqliteConnection,
        side: TradeSide,
        tax: Option<&Tax>,
    ) -> AccountingResult<Option<SubAccount>> {
        let description = tax.map(|t| t.description.as_str()).unwrap_or_default();
        match side {
            TradeSide::Sale => {
                let code = tax.and_then(|t| t.output_subaccount.as_deref());
                self.explicit_or_special(conn, code, description, SpecialAccount::VatOutput)
                    .await
            }
            TradeSide::Purchase => {
                let code = tax.and_then(|t| t.input_subaccount.as_deref());
                self.explicit_or_special(conn, code, description, SpecialAccount::VatInput)
                    .await
            }
        }
    }

    /// Equivalence surcharge sub-account, by side.
    pub async fn surcharge(
        &mut self,
        conn: &mut SqliteConnection,
        side: TradeSide,
        tax: Option<&Tax>,
    ) -> AccountingResult<Option<SubAccount>> {
        let description = tax.map(|t| t.description.as_str()).unwrap_or_default();
        match side {
            TradeSide::Sale => {
                let code = tax.and_then(|t| t.output_surcharge_subaccount.as_deref());
                self.explicit_or_special(conn, code, description, SpecialAccount::SurchargeOutput)
                    .await
            }
            TradeSide::Purchase => {
                let code = tax.and_then(|t| t.input_surcharge_subaccount.as_deref());
                self.explicit_or_special(conn, code, description, SpecialAccount::SurchargeInput)
                    .await
            }
        }
    }

    /// Withholding sub-account, by side.
    pub async fn withholding(
        &mut self,
        conn: &mut SqliteConnection,
        side: TradeSide,
        withholding: Option<&Withholding>,
    ) -> AccountingResult<Option<SubAccount>> {
        let description = withholding.map(|w| w.description.as_str()).unwrap_or_default();
        match side {
            TradeSide::Sale => {
                let code = withholding.and_then(|w| w.sales_subaccount.as_deref());
                self.explicit_or_special(conn, code, description, SpecialAccount::WithholdingSales)
                    .await
            }
            TradeSide::Purchase => {
                let code = withholding.and_then(|w| w.purchase_subaccount.as_deref());
                self.explicit_or_special(conn, code, description, SpecialAccount::WithholdingPurchases)
                    .await
            }
        }
    }

    // =========================================================================
    // Goods
    // =========================================================================

    /// Goods sub-account: product → family → sales/purchases special.
    ///
    /// Rectifying documents always post to the returns accounts.
    pub async fn goods(
        &mut self,
        conn: &mut SqliteConnection,
        side: TradeSide,
        rectifying: bool,
        product_ref: Option<&str>,
    ) -> AccountingResult<Option<SubAccount>> {
        let tag = match (side, rectifying) {
            (TradeSide::Sale, false) => SpecialAccount::Sales,
            (TradeSide::Purchase, false) => SpecialAccount::Purchases,
            (TradeSide::Sale, true) => SpecialAccount::SalesReturns,
            (TradeSide::Purchase, true) => SpecialAccount::PurchaseReturns,
        };
        if rectifying {
            return self.special(conn, tag).await;
        }

        let pick = |sales: Option<String>, purchase: Option<String>| match side {
            TradeSide::Sale => sales,
            TradeSide::Purchase => purchase,
        };

        if let Some(reference) = product_ref {
            let mut master = MasterDataRepository::new(conn);
            if let Some(product) = master.product(reference).await? {
                let family = match product.family_code.as_deref() {
                    Some(code) => master.family(code).await?,
                    None => None,
                };
                let candidates = [
                    pick(product.sales_subaccount, product.purchase_subaccount),
                    family.and_then(|f| pick(f.sales_subaccount, f.purchase_subaccount)),
                ];
                for code in candidates.into_iter().flatten() {
                    if let Some(sub) = self.explicit(conn, &code, &product.description, tag).await? {
                        return Ok(Some(sub));
                    }
                }
            }
        }

        self.special(conn, tag).await
    }

    pub async fn supplied(&mut self, conn: &mut SqliteConnection) -> AccountingResult<Option<SubAccount>> {
        self.special(conn, SpecialAccount::Supplied).await
    }

    pub async fn profit_loss(&mut self, conn: &mut SqliteConnection) -> AccountingResult<Option<SubAccount>> {
        self.special(conn, SpecialAccount::ProfitLoss).await
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Bank or cash sub-account money moves through; cash by default.
    pub async fn payment_bank(
        &mut self,
        conn: &mut SqliteConnection,
        method: Option<&PaymentMethod>,
    ) -> AccountingResult<Option<SubAccount>> {
        let code = method.and_then(|m| m.bank_subaccount.as_deref());
        let description = method.map(|m| m.description.as_str()).unwrap_or_default();
        self.explicit_or_special(conn, code, description, SpecialAccount::Cash)
            .await
    }

    /// Expense sub-account for bank fees.
    pub async fn payment_fee(
        &mut self,
        conn: &mut SqliteConnection,
        method: Option<&PaymentMethod>,
    ) -> AccountingResult<Option<SubAccount>> {
        let code = method.and_then(|m| m.fee_subaccount.as_deref());
        let description = method.map(|m| m.description.as_str()).unwrap_or_default();
        self.explicit_or_special(conn, code, description, SpecialAccount::BankFees)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abaco_core::TaxRegime;
    use abaco_db::seed::seed_period;
    use abaco_db::{Database, DbConfig};

    fn customer(code: &str) -> Subject {
        Subject {
            side: TradeSide::Sale,
            code: code.to_string(),
            name: format!("Customer {code}"),
            tax_id: None,
            subaccount: None,
            group_code: None,
            tax_regime: TaxRegime::General,
            tax_exception: None,
        }
    }

    async fn setup() -> (Database, FiscalPeriod) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let period = FiscalPeriod::calendar_year(1, 2025, 10).unwrap();
        let mut conn = db.acquire().await.unwrap();
        seed_period(&mut conn, &period).await.unwrap();
        drop(conn);
        (db, period)
    }

    #[tokio::test]
    async fn test_special_from_cache_and_creation() {
        let (db, period) = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut resolver = AccountResolver::load(&mut conn, period).await.unwrap();

        let vat = resolver
            .vat(&mut conn, TradeSide::Sale, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vat.code, "4770000000");
        assert_eq!(vat.special, Some(SpecialAccount::VatOutput));
    }

    #[tokio::test]
    async fn test_subject_code_generation_and_write_back() {
        let (db, period) = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut master = MasterDataRepository::new(&mut conn);
        master.save_subject(&customer("12")).await.unwrap();
        master.save_subject(&customer("ACME")).await.unwrap();

        let mut resolver = AccountResolver::load(&mut conn, period).await.unwrap();
        let numeric = resolver
            .subject(&mut conn, &customer("12"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(numeric.code, "4300000012");
        assert_eq!(numeric.account_code, "430");

        let named = resolver
            .subject(&mut conn, &customer("ACME"))
            .await
            .unwrap()
            .unwrap();
        assert!(named.code.starts_with("430"));
        assert_eq!(named.code.len(), 10);
        assert_ne!(named.code, numeric.code);

        let stored = MasterDataRepository::new(&mut conn)
            .subject(TradeSide::Sale, "ACME")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.subaccount.as_deref(), Some(named.code.as_str()));
    }

    fn taken(code: String) -> SubAccount {
        SubAccount {
            description: format!("Other customer {}", &code[7..]),
            code,
            period_code: "2025".to_string(),
            account_code: "430".to_string(),
            special: None,
        }
    }

    #[tokio::test]
    async fn test_subject_skips_code_owned_by_another_customer() {
        let (db, period) = setup().await;
        let mut conn = db.acquire().await.unwrap();
        AccountRepository::new(&mut conn)
            .insert_subaccount(&taken("4300000012".to_string()))
            .await
            .unwrap();
        MasterDataRepository::new(&mut conn)
            .save_subject(&customer("12"))
            .await
            .unwrap();

        let mut resolver = AccountResolver::load(&mut conn, period).await.unwrap();
        let sub = resolver
            .subject(&mut conn, &customer("12"))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(sub.code, "4300000012");
        assert_eq!(sub.description, "Customer 12");

        let other = AccountRepository::new(&mut conn)
            .get_subaccount("2025", "4300000012")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(other.description, "Other customer 012");
    }

    #[tokio::test]
    async fn test_subject_codes_exhausted() {
        let (db, period) = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut accounts = AccountRepository::new(&mut conn);
        for n in 102..=202 {
            accounts.insert_subaccount(&taken(format!("430{n:07}"))).await.unwrap();
        }
        MasterDataRepository::new(&mut conn)
            .save_subject(&customer("ACME"))
            .await
            .unwrap();

        let mut resolver = AccountResolver::load(&mut conn, period).await.unwrap();
        let err = resolver
            .subject(&mut conn, &customer("ACME"))
            .await
            .unwrap_err();
        assert_eq!(err.key(), keys::SUBACCOUNT_CODE_EXHAUSTED);
        assert!(!err.is_validation());

        let stored = MasterDataRepository::new(&mut conn)
            .subject(TradeSide::Sale, "ACME")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.subaccount.is_none());
    }

    #[tokio::test]
    async fn test_explicit_code_created_under_longest_prefix() {
        let (db, period) = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut resolver = AccountResolver::load(&mut conn, period).await.unwrap();

        let sub = resolver
            .explicit(&mut conn, "477000000021", "VAT 21", SpecialAccount::VatOutput)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.account_code, "477");
        assert_eq!(resolver.period().subaccount_length, 12);

        let stored = PeriodRepository::new(&mut conn).get("2025").await.unwrap().unwrap();
        assert_eq!(stored.subaccount_length, 12);
    }

    #[tokio::test]
    async fn test_missing_special_account() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let period = FiscalPeriod::calendar_year(1, 2025, 10).unwrap();
        let mut conn = db.acquire().await.unwrap();
        PeriodRepository::new(&mut conn).insert(&period).await.unwrap();

        let mut resolver = AccountResolver::load(&mut conn, period).await.unwrap();
        assert!(resolver.supplied(&mut conn).await.unwrap().is_none());
        assert!(resolver.subject(&mut conn, &customer("1")).await.unwrap().is_none());
    }
}
