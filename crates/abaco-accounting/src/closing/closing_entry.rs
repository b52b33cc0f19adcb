//! Closing: zeroes every balance-sheet sub-account.

use abaco_core::{EntryOperation, FiscalPeriod, JournalEntry, LineDraft, TrialBalance};
use sqlx::SqliteConnection;

use super::write_entry;
use crate::context::AccountingContext;
use crate::error::AccountingResult;

/// Posts the closing entry. Returns it with its lines, which the opening
/// entry mirrors.
pub(super) async fn run(
    conn: &mut SqliteConnection,
    ctx: &AccountingContext,
    period: &FiscalPeriod,
    balance: &TrialBalance,
    journal_id: Option<i64>,
) -> AccountingResult<(Option<JournalEntry>, Vec<LineDraft>)> {
    let concept = format!("Closing {}", period.name);
    let lines = balance.closing_lines(&ctx.closing().balance_prefixes, &concept);
    if lines.is_empty() {
        return Ok((None, lines));
    }

    let entry = write_entry(
        conn,
        period,
        period.end_date,
        concept,
        EntryOperation::Closing,
        journal_id,
        &lines,
    )
    .await?;
    Ok((Some(entry), lines))
}
