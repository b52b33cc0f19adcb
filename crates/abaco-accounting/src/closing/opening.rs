//! Opening: carries the closed balances into the next period.

use abaco_core::balance::opening_lines;
use abaco_core::{EntryOperation, FiscalPeriod, JournalEntry, LineDraft, PeriodStatus};
use abaco_db::{AccountRepository, PeriodRepository};
use chrono::{Days, Months};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::{write_entry, ClosingParams};
use crate::error::{keys, AccountingError, AccountingResult};

/// Creates the twelve-month period that follows `period`.
///
/// The code is the start year. Period codes are unique across companies, so
/// when another company already owns that year the code takes the company id
/// as a suffix (`2026-2`).
pub(super) async fn create_next_period(
    conn: &mut SqliteConnection,
    period: &FiscalPeriod,
) -> AccountingResult<FiscalPeriod> {
    let start = period.end_date.checked_add_days(Days::new(1));
    let end = start
        .and_then(|d| d.checked_add_months(Months::new(12)))
        .and_then(|d| d.checked_sub_days(Days::new(1)));
    let (Some(start_date), Some(end_date)) = (start, end) else {
        return Err(AccountingError::configuration(keys::PERIOD_NOT_FOUND).with("after", &period.code));
    };

    let year = start_date.format("%Y").to_string();
    let mut next = FiscalPeriod {
        code: year.clone(),
        company_id: period.company_id,
        name: year.clone(),
        start_date,
        end_date,
        status: PeriodStatus::Open,
        subaccount_length: period.subaccount_length,
    };

    let mut periods = PeriodRepository::new(conn);
    match periods.insert(&next).await {
        Ok(()) => {}
        Err(e) if e.is_unique_violation() => {
            debug!(code = %year, company = period.company_id, "Period code taken by another company");
            next.code = format!("{year}-{}", period.company_id);
            periods.insert(&next).await?;
        }
        Err(e) => return Err(e.into()),
    }
    info!(period = %next.code, %start_date, %end_date, "Next fiscal period created");
    Ok(next)
}

/// Posts the opening entry of `next`, mirroring `closing`.
pub(super) async fn run(
    conn: &mut SqliteConnection,
    period: &FiscalPeriod,
    next: &FiscalPeriod,
    closing: &[LineDraft],
    params: &ClosingParams,
) -> AccountingResult<Option<JournalEntry>> {
    if params.copy_chart {
        let copied = AccountRepository::new(conn)
            .copy_chart(&period.code, &next.code)
            .await?;
        debug!(from = %period.code, to = %next.code, copied, "Chart carried forward");
    }
    if closing.is_empty() {
        return Ok(None);
    }

    for line in closing {
        carry_subaccount(conn, period, next, &line.subaccount_code).await?;
    }

    let concept = format!("Opening {}", next.name);
    let lines = opening_lines(closing, &concept);
    let entry = write_entry(
        conn,
        next,
        next.start_date,
        concept,
        EntryOperation::Opening,
        params.opening_journal,
        &lines,
    )
    .await?;
    Ok(Some(entry))
}

/// Makes sure `code` and its account exist in `next`.
async fn carry_subaccount(
    conn: &mut SqliteConnection,
    period: &FiscalPeriod,
    next: &FiscalPeriod,
    code: &str,
) -> AccountingResult<()> {
    let mut accounts = AccountRepository::new(conn);
    if accounts.get_subaccount(&next.code, code).await?.is_some() {
        return Ok(());
    }
    let source = accounts
        .get_subaccount(&period.code, code)
        .await?
        .ok_or_else(|| AccountingError::validation(keys::RECORD_NOT_FOUND).with("subaccount", code))?;

    if accounts.get_account(&next.code, &source.account_code).await?.is_none() {
        let mut account = accounts
            .get_account(&period.code, &source.account_code)
            .await?
            .ok_or_else(|| {
                AccountingError::validation(keys::RECORD_NOT_FOUND).with("account", &source.account_code)
            })?;
        account.period_code = next.code.clone();
        accounts.insert_account(&account).await?;
    }

    let mut carried = source;
    carried.period_code = next.code.clone();
    accounts.create_subaccount(&carried).await?;

    if code.len() > next.subaccount_length {
        PeriodRepository::new(conn)
            .grow_subaccount_length(&next.code, code.len())
            .await?;
    }
    Ok(())
}
