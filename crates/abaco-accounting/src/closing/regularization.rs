//! Regularization: zeroes income and expense sub-accounts against profit
//! and loss.

use abaco_core::{EntryOperation, JournalEntry, TrialBalance};
use sqlx::SqliteConnection;

use super::write_entry;
use crate::context::AccountingContext;
use crate::error::{keys, AccountingError, AccountingResult};
use crate::resolver::AccountResolver;

/// Posts the regularization entry and applies it to `balance`.
pub(super) async fn run(
    conn: &mut SqliteConnection,
    ctx: &AccountingContext,
    resolver: &mut AccountResolver,
    balance: &mut TrialBalance,
) -> AccountingResult<Option<JournalEntry>> {
    let prefixes = &ctx.closing().result_prefixes;
    if !balance.has_balance(prefixes) {
        return Ok(None);
    }

    let period = resolver.period().clone();
    let profit_loss = resolver.profit_loss(conn).await?.ok_or_else(|| {
        AccountingError::configuration(keys::PROFIT_LOSS_ACCOUNT_NOT_FOUND).with("period", &period.code)
    })?;

    let concept = format!("Regularization {}", period.name);
    let lines = balance.regularization_lines(prefixes, &profit_loss.code, &concept);
    let entry = write_entry(
        conn,
        &period,
        period.end_date,
        concept,
        EntryOperation::Regularization,
        None,
        &lines,
    )
    .await?;
    balance.apply(&lines);
    Ok(Some(entry))
}
