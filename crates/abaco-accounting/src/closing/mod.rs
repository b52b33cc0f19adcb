//! # Period Closing
//!
//! Closes a fiscal period and carries its balances into the next one, or
//! undoes that.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │            exec: regularize ──► close ──► open next                     │
//! │   ┌────────┐ ─────────────────────────────────────────► ┌────────┐     │
//! │   │  OPEN  │                                            │ CLOSED │     │
//! │   └────────┘ ◄───────────────────────────────────────── └────────┘     │
//! │            delete: reopen, drop opening / closing /                     │
//! │                    regularization per flags                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both directions run in one transaction; any failure rolls the whole
//! operation back and leaves the period untouched. Re-running `exec`
//! replaces earlier period-end entries instead of appending new ones.

mod closing_entry;
mod opening;
mod regularization;

use abaco_core::{EntryOperation, FiscalPeriod, JournalEntry, LineDraft, PeriodStatus, TrialBalance};
use abaco_db::{Database, DbError, DocumentRepository, JournalRepository, LedgerFilter, PeriodRepository};
use chrono::NaiveDate;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::builder::{header, EntryWriter};
use crate::context::AccountingContext;
use crate::error::{keys, AccountingError, AccountingResult};
use crate::resolver::AccountResolver;

// =============================================================================
// Parameters and Reports
// =============================================================================

/// Options for [`PeriodClosingPipeline::exec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosingParams {
    /// Journal stamped on the closing entry.
    pub closing_journal: Option<i64>,
    /// Journal stamped on the opening entry.
    pub opening_journal: Option<i64>,
    /// Copy the whole chart of accounts into the next period.
    pub copy_chart: bool,
}

impl Default for ClosingParams {
    fn default() -> Self {
        ClosingParams {
            closing_journal: None,
            opening_journal: None,
            copy_chart: true,
        }
    }
}

/// Which period-end entries [`PeriodClosingPipeline::delete`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReopenParams {
    pub delete_opening: bool,
    pub delete_closing: bool,
    pub delete_regularization: bool,
}

impl Default for ReopenParams {
    fn default() -> Self {
        ReopenParams {
            delete_opening: true,
            delete_closing: true,
            delete_regularization: true,
        }
    }
}

/// Entries written by a closing run. `None` when there was nothing to post.
#[derive(Debug, Clone)]
pub struct ClosingReport {
    pub period_code: String,
    pub next_period_code: String,
    pub regularization: Option<JournalEntry>,
    pub closing: Option<JournalEntry>,
    pub opening: Option<JournalEntry>,
}

/// Entries removed by a reopen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReopenReport {
    pub opening: u64,
    pub closing: u64,
    pub regularization: u64,
}

// =============================================================================
// Pipeline
// =============================================================================

/// Period-end state machine over a fiscal period.
pub struct PeriodClosingPipeline<'a> {
    db: &'a Database,
    ctx: &'a mut AccountingContext,
}

impl<'a> PeriodClosingPipeline<'a> {
    pub fn new(db: &'a Database, ctx: &'a mut AccountingContext) -> Self {
        PeriodClosingPipeline { db, ctx }
    }

    /// Regularizes, closes and opens the next period, then marks the period
    /// closed.
    pub async fn exec(&mut self, period_code: &str, params: &ClosingParams) -> AccountingResult<ClosingReport> {
        let mut tx = self.db.begin().await?;
        match close_period(&mut tx, self.ctx, period_code, params).await {
            Ok(report) => {
                tx.commit().await.map_err(DbError::from)?;
                info!(
                    period = %report.period_code,
                    next = %report.next_period_code,
                    regularization = report.regularization.is_some(),
                    closing = report.closing.is_some(),
                    opening = report.opening.is_some(),
                    "Fiscal period closed"
                );
                Ok(report)
            }
            Err(err) => {
                tx.rollback().await.map_err(DbError::from)?;
                self.ctx.report(&err);
                Err(err)
            }
        }
    }

    /// Reopens the period and deletes the period-end entries selected by
    /// `params`. Safe to call on a period without such entries.
    pub async fn delete(&mut self, period_code: &str, params: &ReopenParams) -> AccountingResult<ReopenReport> {
        let mut tx = self.db.begin().await?;
        match reopen_period(&mut tx, period_code, params).await {
            Ok(report) => {
                tx.commit().await.map_err(DbError::from)?;
                info!(period = period_code, ?report, "Fiscal period reopened");
                Ok(report)
            }
            Err(err) => {
                tx.rollback().await.map_err(DbError::from)?;
                self.ctx.report(&err);
                Err(err)
            }
        }
    }
}

async fn close_period(
    conn: &mut SqliteConnection,
    ctx: &AccountingContext,
    period_code: &str,
    params: &ClosingParams,
) -> AccountingResult<ClosingReport> {
    let period = load_period(conn, period_code).await?;
    if !period.is_open() {
        return Err(AccountingError::configuration(keys::CLOSED_PERIOD).with("period", period_code));
    }
    if !PeriodRepository::new(conn).has_chart_of_accounts(period_code).await? {
        return Err(AccountingError::configuration(keys::PERIOD_WITHOUT_CHART).with("period", period_code));
    }

    let mut resolver = AccountResolver::load(conn, period.clone()).await?;

    let mut documents = DocumentRepository::new(conn);
    let pending = documents
        .invoices_without_entry(period.company_id, period.start_date, period.end_date)
        .await?;
    if let Some(first) = pending.first() {
        return Err(AccountingError::validation(keys::INVOICE_WITHOUT_ENTRY)
            .with("period", period_code)
            .with("code", &first.code)
            .with("count", pending.len()));
    }
    documents
        .lock_invoices(period.company_id, period.start_date, period.end_date)
        .await?;

    let next = PeriodRepository::new(conn).next_after(&period).await?;
    if let Some(next) = &next {
        if !next.is_open() {
            return Err(AccountingError::configuration(keys::NEXT_PERIOD_CLOSED).with("period", &next.code));
        }
    }
    remove_period_end_entries(conn, &period, next.as_ref(), &ReopenParams::default()).await?;

    let mut balance = trial_balance(conn, &period).await?;
    let regularization = regularization::run(conn, ctx, &mut resolver, &mut balance).await?;
    let (closing, closing_lines) =
        closing_entry::run(conn, ctx, &period, &balance, params.closing_journal).await?;

    let next = match next {
        Some(next) => next,
        None => opening::create_next_period(conn, &period).await?,
    };
    let opening = opening::run(conn, &period, &next, &closing_lines, params).await?;

    PeriodRepository::new(conn)
        .set_status(period_code, PeriodStatus::Closed)
        .await?;
    JournalRepository::new(conn)
        .set_period_editable(period_code, false)
        .await?;

    Ok(ClosingReport {
        period_code: period.code,
        next_period_code: next.code,
        regularization,
        closing,
        opening,
    })
}

async fn reopen_period(
    conn: &mut SqliteConnection,
    period_code: &str,
    params: &ReopenParams,
) -> AccountingResult<ReopenReport> {
    let period = load_period(conn, period_code).await?;
    let next = PeriodRepository::new(conn).next_after(&period).await?;
    if params.delete_opening {
        if let Some(next) = &next {
            if !next.is_open() {
                return Err(
                    AccountingError::configuration(keys::NEXT_PERIOD_CLOSED).with("period", &next.code)
                );
            }
        }
    }

    PeriodRepository::new(conn)
        .set_status(period_code, PeriodStatus::Open)
        .await?;
    JournalRepository::new(conn)
        .set_period_editable(period_code, true)
        .await?;

    remove_period_end_entries(conn, &period, next.as_ref(), params).await
}

async fn load_period(conn: &mut SqliteConnection, code: &str) -> AccountingResult<FiscalPeriod> {
    PeriodRepository::new(conn)
        .get(code)
        .await?
        .ok_or_else(|| AccountingError::configuration(keys::PERIOD_NOT_FOUND).with("period", code))
}

async fn remove_period_end_entries(
    conn: &mut SqliteConnection,
    period: &FiscalPeriod,
    next: Option<&FiscalPeriod>,
    params: &ReopenParams,
) -> AccountingResult<ReopenReport> {
    let mut journal = JournalRepository::new(conn);
    let mut report = ReopenReport::default();
    if params.delete_opening {
        if let Some(next) = next {
            report.opening = journal
                .delete_by_operation(&next.code, EntryOperation::Opening)
                .await?;
        }
    }
    if params.delete_closing {
        report.closing = journal
            .delete_by_operation(&period.code, EntryOperation::Closing)
            .await?;
    }
    if params.delete_regularization {
        report.regularization = journal
            .delete_by_operation(&period.code, EntryOperation::Regularization)
            .await?;
    }
    Ok(report)
}

// =============================================================================
// Shared Steps
// =============================================================================

/// Balances of every sub-account posted to in the period.
async fn trial_balance(conn: &mut SqliteConnection, period: &FiscalPeriod) -> AccountingResult<TrialBalance> {
    let filter = LedgerFilter {
        period_code: Some(period.code.clone()),
        ..Default::default()
    };
    let lines = JournalRepository::new(conn).posted_lines(&filter).await?;
    let mut balance = TrialBalance::new();
    for line in &lines {
        balance.add(&line.subaccount_code, line.debit, line.credit);
    }
    Ok(balance)
}

/// Writes a non-editable period-end entry; deleted again if it does not
/// balance.
async fn write_entry(
    conn: &mut SqliteConnection,
    period: &FiscalPeriod,
    date: NaiveDate,
    concept: String,
    operation: EntryOperation,
    journal_id: Option<i64>,
    lines: &[LineDraft],
) -> AccountingResult<JournalEntry> {
    let mut entry = header(period, date, concept, None, None);
    entry.operation = operation;
    entry.journal_id = journal_id;
    entry.editable = false;

    let mut writer = EntryWriter::start(conn, entry).await?;
    let written = async {
        for line in lines {
            writer.add(conn, line.clone()).await?;
        }
        writer.finish(conn).await
    }
    .await;

    match written {
        Ok(entry) => {
            debug!(entry_id = entry.id, ?operation, lines = lines.len(), "Period-end entry written");
            Ok(entry)
        }
        Err(err) => {
            writer.discard(conn).await?;
            Err(err)
        }
    }
}
