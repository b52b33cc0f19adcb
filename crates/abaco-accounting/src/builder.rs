//! # Journal Entry Builder
//!
//! Generates the accounting entry of an invoice or a payment.
//!
//! ## Build Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    preconditions ──Err──────────────────────────────┐                   │
//! │    insert header                                    │                   │
//! │    resolve + insert lines ──Err──► delete entry ────┤                   │
//! │    Σ debit = Σ credit? ──no───► delete entry ───────┤                   │
//! │    stamp entry id on source                         ▼                   │
//! │  COMMIT                                   ROLLBACK + log key            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The source's `accounting_entry_id` is only set once the transaction has
//! committed.

use abaco_core::{Document, EntryOperation, FiscalPeriod, JournalEntry, LineDraft, Money, Payment};
use abaco_db::{Database, DbError, JournalRepository, PeriodRepository};
use chrono::NaiveDate;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::context::AccountingContext;
use crate::error::{keys, AccountingError, AccountingResult};
use crate::grouper::LineGrouper;
use crate::{invoice, payment};

/// What an entry is generated for.
#[derive(Debug)]
pub enum AccountingSource<'a> {
    Invoice(&'a mut Document),
    Payment(&'a mut Payment),
}

/// Generates journal entries inside their own transaction.
pub struct JournalEntryBuilder<'a> {
    db: &'a Database,
    ctx: &'a mut AccountingContext,
    grouper: LineGrouper,
}

impl<'a> JournalEntryBuilder<'a> {
    pub fn new(db: &'a Database, ctx: &'a mut AccountingContext) -> Self {
        JournalEntryBuilder {
            db,
            ctx,
            grouper: LineGrouper::new(),
        }
    }

    pub fn with_grouper(mut self, grouper: LineGrouper) -> Self {
        self.grouper = grouper;
        self
    }

    /// Builds, verifies and commits the entry for `source`.
    ///
    /// On success the source carries the new entry id. On failure nothing
    /// is persisted and the error key is logged in the context.
    pub async fn generate(&mut self, mut source: AccountingSource<'_>) -> AccountingResult<JournalEntry> {
        let mut tx = self.db.begin().await?;

        let outcome = match &mut source {
            AccountingSource::Invoice(doc) => {
                invoice::account_invoice(&mut tx, self.ctx, &self.grouper, &**doc).await
            }
            AccountingSource::Payment(payment) => {
                payment::account_payment(&mut tx, self.ctx, &**payment).await
            }
        };

        let entry = match outcome {
            Ok(entry) => entry,
            Err(err) => {
                tx.rollback().await.map_err(DbError::from)?;
                self.ctx.report(&err);
                return Err(err);
            }
        };

        tx.commit().await.map_err(DbError::from)?;
        match source {
            AccountingSource::Invoice(doc) => doc.accounting_entry_id = Some(entry.id),
            AccountingSource::Payment(payment) => payment.accounting_entry_id = Some(entry.id),
        }
        info!(
            entry_id = entry.id,
            number = entry.number,
            period = %entry.period_code,
            amount = %entry.amount,
            "Accounting entry generated"
        );
        Ok(entry)
    }
}

// =============================================================================
// Shared Steps
// =============================================================================

/// Open period with a chart of accounts containing `date`.
pub(crate) async fn open_period_for(
    conn: &mut SqliteConnection,
    company_id: i64,
    date: NaiveDate,
) -> AccountingResult<FiscalPeriod> {
    let mut periods = PeriodRepository::new(conn);
    let period = periods
        .find_by_date(company_id, date)
        .await?
        .ok_or_else(|| AccountingError::configuration(keys::PERIOD_NOT_FOUND).with("date", date))?;

    if !period.is_open() {
        return Err(AccountingError::configuration(keys::CLOSED_PERIOD).with("period", &period.code));
    }
    if !periods.has_chart_of_accounts(&period.code).await? {
        return Err(
            AccountingError::configuration(keys::PERIOD_WITHOUT_CHART).with("period", &period.code)
        );
    }
    Ok(period)
}

/// An entry being written: header stored, lines appended one by one.
pub(crate) struct EntryWriter {
    entry: JournalEntry,
    document: Option<String>,
}

impl EntryWriter {
    /// Stores the header and returns a writer for its lines.
    pub(crate) async fn start(
        conn: &mut SqliteConnection,
        header: JournalEntry,
    ) -> AccountingResult<Self> {
        let document = header.document.clone();
        let entry = JournalRepository::new(conn).insert_entry(&header).await?;
        Ok(EntryWriter { entry, document })
    }

    /// Appends a line; zero lines are skipped.
    pub(crate) async fn add(&mut self, conn: &mut SqliteConnection, line: LineDraft) -> AccountingResult<()> {
        if line.debit.is_zero() && line.credit.is_zero() {
            return Ok(());
        }
        JournalRepository::new(conn)
            .insert_line(self.entry.id, &line, self.document.as_deref())
            .await?;
        Ok(())
    }

    /// Checks the stored lines balance and records the entry amount.
    pub(crate) async fn finish(&mut self, conn: &mut SqliteConnection) -> AccountingResult<JournalEntry> {
        let mut journal = JournalRepository::new(conn);
        let (debit, credit) = journal.totals(self.entry.id).await?;
        if debit != credit || debit.is_zero() {
            return Err(AccountingError::integrity(keys::UNBALANCED_ENTRY)
                .with("entry", self.entry.number)
                .with("debit", debit)
                .with("credit", credit));
        }
        journal.update_amount(self.entry.id, debit).await?;
        self.entry.amount = debit;
        Ok(self.entry.clone())
    }

    /// Deletes the entry and its lines.
    pub(crate) async fn discard(self, conn: &mut SqliteConnection) -> AccountingResult<()> {
        JournalRepository::new(conn).delete_entry(self.entry.id).await?;
        debug!(entry_id = self.entry.id, "Partially built entry deleted");
        Ok(())
    }
}

/// Header of a normal, editable entry.
pub(crate) fn header(
    period: &FiscalPeriod,
    date: NaiveDate,
    concept: String,
    document: Option<String>,
    channel: Option<i64>,
) -> JournalEntry {
    JournalEntry {
        id: 0,
        number: 0,
        period_code: period.code.clone(),
        journal_id: None,
        channel,
        date,
        concept,
        document,
        operation: EntryOperation::Normal,
        amount: Money::ZERO,
        editable: true,
    }
}
