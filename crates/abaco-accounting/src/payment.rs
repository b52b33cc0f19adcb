//! # Payment Entries
//!
//! ```text
//!                  collection (sale)        disbursement (purchase)
//!   subject        C  amount                D  amount
//!   bank / cash    D  amount − fee          C  amount + fee
//!   bank fee       D  fee                   D  fee
//! ```
//!
//! The fee line is omitted when there is no fee.

use abaco_core::{JournalEntry, LineDraft, Payment, TradeSide};
use abaco_db::{MasterDataRepository, PaymentRepository};
use sqlx::SqliteConnection;

use crate::builder::{header, open_period_for, EntryWriter};
use crate::context::AccountingContext;
use crate::error::{keys, AccountingError, AccountingResult};
use crate::resolver::AccountResolver;

/// Builds and stores the entry of a payment; `conn` carries the caller's
/// transaction.
pub(crate) async fn account_payment(
    conn: &mut SqliteConnection,
    ctx: &AccountingContext,
    payment: &Payment,
) -> AccountingResult<JournalEntry> {
    if payment.accounting_entry_id.is_some() {
        return Err(already_generated(payment));
    }
    let stored = PaymentRepository::new(conn)
        .get(&payment.id)
        .await?
        .ok_or_else(|| AccountingError::validation(keys::RECORD_NOT_FOUND).with("payment", &payment.id))?;
    if stored.accounting_entry_id.is_some() {
        return Err(already_generated(payment));
    }
    if payment.amount.is_zero() {
        return Err(AccountingError::validation(keys::DOCUMENT_TOTAL_IS_ZERO).with("payment", &payment.id));
    }

    let period = open_period_for(conn, payment.company_id, payment.date).await?;

    let mut master = MasterDataRepository::new(conn);
    let subject = master
        .subject(payment.side, &payment.subject_code)
        .await?
        .ok_or_else(|| AccountingError::validation(keys::RECORD_NOT_FOUND).with("subject", &payment.subject_code))?;
    let method = master.payment_method(&payment.payment_method).await?;

    let mut resolver = AccountResolver::load(conn, period.clone()).await?;
    let reference = payment.document_code.as_deref().unwrap_or(&payment.id);
    let concept = match payment.side {
        TradeSide::Sale => format!("Collection {} - {}", reference, subject.name),
        TradeSide::Purchase => format!("Payment {} - {}", reference, subject.name),
    };

    let mut writer = EntryWriter::start(
        conn,
        header(&period, payment.date, concept.clone(), payment.document_code.clone(), payment.channel),
    )
    .await?;

    let lines = async {
        let subject_account = resolver.subject(conn, &subject).await?.ok_or_else(|| {
            let key = match payment.side {
                TradeSide::Sale => keys::CUSTOMER_ACCOUNT_NOT_FOUND,
                TradeSide::Purchase => keys::SUPPLIER_ACCOUNT_NOT_FOUND,
            };
            AccountingError::configuration(key).with("subject", &subject.code)
        })?;
        let bank = resolver
            .payment_bank(conn, method.as_ref())
            .await?
            .ok_or_else(|| {
                AccountingError::configuration(keys::PAYMENT_ACCOUNT_NOT_FOUND)
                    .with("method", &payment.payment_method)
            })?;
        let fee_account = if payment.fee.is_zero() {
            None
        } else {
            let account = resolver
                .payment_fee(conn, method.as_ref())
                .await?
                .ok_or_else(|| {
                    AccountingError::configuration(keys::BANK_FEE_ACCOUNT_NOT_FOUND)
                        .with("method", &payment.payment_method)
                })?;
            Some(account)
        };

        let precision = ctx.precision();
        let (amount, fee) = (payment.amount.round(precision), payment.fee.round(precision));
        let (subject_amount, bank_amount) = match payment.side {
            TradeSide::Sale => (-amount, amount - fee),
            TradeSide::Purchase => (amount, -(amount + fee)),
        };

        let counterpart = Some(bank.code.clone());
        writer
            .add(
                conn,
                LineDraft::posting(&subject_account.code, &concept, subject_amount)
                    .with_counterpart(counterpart),
            )
            .await?;
        writer
            .add(
                conn,
                LineDraft::posting(&bank.code, &concept, bank_amount)
                    .with_counterpart(Some(subject_account.code.clone())),
            )
            .await?;
        if let Some(account) = fee_account {
            writer
                .add(
                    conn,
                    LineDraft::posting(&account.code, &concept, fee)
                        .with_counterpart(Some(bank.code.clone())),
                )
                .await?;
        }
        AccountingResult::Ok(())
    }
    .await;

    let built = match lines {
        Ok(()) => writer.finish(conn).await,
        Err(err) => Err(err),
    };

    match built {
        Ok(entry) => {
            PaymentRepository::new(conn)
                .set_accounting_entry(&payment.id, Some(entry.id))
                .await?;
            Ok(entry)
        }
        Err(err) => {
            writer.discard(conn).await?;
            Err(err)
        }
    }
}

fn already_generated(payment: &Payment) -> AccountingError {
    AccountingError::integrity(keys::ACCOUNTING_ENTRY_ALREADY_GENERATED).with("payment", &payment.id)
}
