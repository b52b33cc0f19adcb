//! # Journal Repository
//!
//! Journal entries, their lines, and the joined line reads used by balances
//! and the ledger.
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert_entry()  ──► number = MAX(number) + 1 inside the period         │
//! │  insert_line() × N                                                      │
//! │  totals()        ──► Σ debit, Σ credit (summed in Rust)                 │
//! │     ├── balanced   ──► update_amount()                                  │
//! │     └── unbalanced ──► delete_entry() (lines cascade)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use abaco_core::{EntryOperation, JournalEntry, JournalLine, LineDraft, Money};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use crate::error::DbResult;
use crate::row::{money, opt_decimal, opt_money};

const ENTRY_COLUMNS: &str = "id, number, period_code, journal_id, channel, date, concept, \
                             document, operation, amount, editable";
const LINE_COLUMNS: &str = "id, entry_id, subaccount_code, concept, debit, credit, counterpart, \
                            document, tax_id, tax_base, vat, surcharge";

/// A journal line joined with its entry header.
#[derive(Debug, Clone, PartialEq)]
pub struct PostedLine {
    pub line_id: i64,
    pub entry_id: i64,
    pub entry_number: i64,
    pub period_code: String,
    pub date: NaiveDate,
    pub channel: Option<i64>,
    pub operation: EntryOperation,
    pub subaccount_code: String,
    /// Parent account of the sub-account, when it exists in the entry's period.
    pub account_code: Option<String>,
    pub concept: String,
    pub debit: Money,
    pub credit: Money,
}

/// Filters for [`JournalRepository::posted_lines`]. `None` means unfiltered.
///
/// Range upper bounds on codes compare by prefix: `account_to = "4"` keeps
/// `430` and `4751`.
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub company_id: Option<i64>,
    pub period_code: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub channel: Option<i64>,
    pub account_from: Option<String>,
    pub account_to: Option<String>,
    pub subaccount_from: Option<String>,
    pub subaccount_to: Option<String>,
    pub entry_from: Option<i64>,
    pub entry_to: Option<i64>,
}

/// Repository for journal entries and lines.
pub struct JournalRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> JournalRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        JournalRepository { conn }
    }

    // =========================================================================
    // Entries
    // =========================================================================

    /// Next free entry number in a period.
    pub async fn next_number(&mut self, period_code: &str) -> DbResult<i64> {
        let next: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(number), 0) + 1 FROM journal_entries WHERE period_code = ?1",
        )
        .bind(period_code)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(next)
    }

    /// Inserts an entry header; `id` and `number` of the argument are ignored.
    ///
    /// Returns the stored entry with its id and number.
    pub async fn insert_entry(&mut self, entry: &JournalEntry) -> DbResult<JournalEntry> {
        let number = self.next_number(&entry.period_code).await?;
        let result = sqlx::query(
            "INSERT INTO journal_entries
                (number, period_code, journal_id, channel, date, concept, document,
                 operation, amount, editable)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(number)
        .bind(&entry.period_code)
        .bind(entry.journal_id)
        .bind(entry.channel)
        .bind(entry.date)
        .bind(&entry.concept)
        .bind(&entry.document)
        .bind(entry.operation)
        .bind(entry.amount.to_string())
        .bind(entry.editable)
        .execute(&mut *self.conn)
        .await?;

        let id = result.last_insert_rowid();
        debug!(entry_id = id, number, period = %entry.period_code, "Journal entry inserted");

        Ok(JournalEntry {
            id,
            number,
            ..entry.clone()
        })
    }

    pub async fn get_entry(&mut self, id: i64) -> DbResult<Option<JournalEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref().map(map_entry).transpose()
    }

    /// Entries of a period with the given operation, by number.
    pub async fn entries_by_operation(
        &mut self,
        period_code: &str,
        operation: EntryOperation,
    ) -> DbResult<Vec<JournalEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries
             WHERE period_code = ?1 AND operation = ?2 ORDER BY number"
        );
        let rows = sqlx::query(&sql)
            .bind(period_code)
            .bind(operation)
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(map_entry).collect()
    }

    pub async fn update_amount(&mut self, entry_id: i64, amount: Money) -> DbResult<()> {
        sqlx::query("UPDATE journal_entries SET amount = ?1 WHERE id = ?2")
            .bind(amount.to_string())
            .bind(entry_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    /// Deletes an entry and, by cascade, its lines. Returns whether it existed.
    pub async fn delete_entry(&mut self, entry_id: i64) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM journal_entries WHERE id = ?1")
            .bind(entry_id)
            .execute(&mut *self.conn)
            .await?
            .rows_affected();
        debug!(entry_id, deleted = affected > 0, "Journal entry delete");
        Ok(affected > 0)
    }

    /// Deletes every entry of a period with the given operation.
    pub async fn delete_by_operation(
        &mut self,
        period_code: &str,
        operation: EntryOperation,
    ) -> DbResult<u64> {
        let affected = sqlx::query("DELETE FROM journal_entries WHERE period_code = ?1 AND operation = ?2")
            .bind(period_code)
            .bind(operation)
            .execute(&mut *self.conn)
            .await?
            .rows_affected();
        debug!(period = period_code, ?operation, affected, "Journal entries deleted");
        Ok(affected)
    }

    /// Marks every entry of a period as (non-)editable.
    pub async fn set_period_editable(&mut self, period_code: &str, editable: bool) -> DbResult<()> {
        sqlx::query("UPDATE journal_entries SET editable = ?1 WHERE period_code = ?2")
            .bind(editable)
            .bind(period_code)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Lines
    // =========================================================================

    pub async fn insert_line(
        &mut self,
        entry_id: i64,
        line: &LineDraft,
        document: Option<&str>,
    ) -> DbResult<JournalLine> {
        let result = sqlx::query(
            "INSERT INTO journal_lines
                (entry_id, subaccount_code, concept, debit, credit, counterpart, document,
                 tax_id, tax_base, vat, surcharge)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(entry_id)
        .bind(&line.subaccount_code)
        .bind(&line.concept)
        .bind(line.debit.to_string())
        .bind(line.credit.to_string())
        .bind(&line.counterpart)
        .bind(document)
        .bind(&line.tax_id)
        .bind(line.tax_base.map(|m| m.to_string()))
        .bind(line.vat.map(|d| d.to_string()))
        .bind(line.surcharge.map(|d| d.to_string()))
        .execute(&mut *self.conn)
        .await?;

        Ok(JournalLine {
            id: result.last_insert_rowid(),
            entry_id,
            subaccount_code: line.subaccount_code.clone(),
            concept: line.concept.clone(),
            debit: line.debit,
            credit: line.credit,
            counterpart: line.counterpart.clone(),
            document: document.map(str::to_string),
            tax_id: line.tax_id.clone(),
            tax_base: line.tax_base,
            vat: line.vat,
            surcharge: line.surcharge,
        })
    }

    pub async fn lines(&mut self, entry_id: i64) -> DbResult<Vec<JournalLine>> {
        let sql = format!("SELECT {LINE_COLUMNS} FROM journal_lines WHERE entry_id = ?1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(entry_id)
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(map_line).collect()
    }

    /// `(Σ debit, Σ credit)` of an entry's stored lines.
    pub async fn totals(&mut self, entry_id: i64) -> DbResult<(Money, Money)> {
        let lines = self.lines(entry_id).await?;
        Ok(lines
            .iter()
            .fold((Money::ZERO, Money::ZERO), |(d, c), l| (d + l.debit, c + l.credit)))
    }

    /// Lines joined with their entries, in posting order (date, number, line).
    pub async fn posted_lines(&mut self, filter: &LedgerFilter) -> DbResult<Vec<PostedLine>> {
        let rows = sqlx::query(
            "SELECT l.id AS line_id, e.id AS entry_id, e.number AS entry_number,
                    e.period_code, e.date, e.channel, e.operation,
                    l.subaccount_code, s.account_code, l.concept, l.debit, l.credit
             FROM journal_lines l
             JOIN journal_entries e ON e.id = l.entry_id
             JOIN fiscal_periods p ON p.code = e.period_code
             LEFT JOIN subaccounts s
                    ON s.period_code = e.period_code AND s.code = l.subaccount_code
             WHERE (?1 IS NULL OR p.company_id = ?1)
               AND (?2 IS NULL OR e.period_code = ?2)
               AND (?3 IS NULL OR e.date >= ?3)
               AND (?4 IS NULL OR e.date <= ?4)
               AND (?5 IS NULL OR e.channel = ?5)
               AND (?6 IS NULL OR s.account_code >= ?6)
               AND (?7 IS NULL OR substr(s.account_code, 1, length(?7)) <= ?7)
               AND (?8 IS NULL OR l.subaccount_code >= ?8)
               AND (?9 IS NULL OR substr(l.subaccount_code, 1, length(?9)) <= ?9)
               AND (?10 IS NULL OR e.number >= ?10)
               AND (?11 IS NULL OR e.number <= ?11)
             ORDER BY e.date, e.number, l.id",
        )
        .bind(filter.company_id)
        .bind(&filter.period_code)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.channel)
        .bind(&filter.account_from)
        .bind(&filter.account_to)
        .bind(&filter.subaccount_from)
        .bind(&filter.subaccount_to)
        .bind(filter.entry_from)
        .bind(filter.entry_to)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.iter().map(map_posted).collect()
    }
}

fn map_entry(row: &SqliteRow) -> DbResult<JournalEntry> {
    Ok(JournalEntry {
        id: row.try_get("id")?,
        number: row.try_get("number")?,
        period_code: row.try_get("period_code")?,
        journal_id: row.try_get("journal_id")?,
        channel: row.try_get("channel")?,
        date: row.try_get("date")?,
        concept: row.try_get("concept")?,
        document: row.try_get("document")?,
        operation: row.try_get("operation")?,
        amount: money(row, "amount")?,
        editable: row.try_get("editable")?,
    })
}

fn map_line(row: &SqliteRow) -> DbResult<JournalLine> {
    Ok(JournalLine {
        id: row.try_get("id")?,
        entry_id: row.try_get("entry_id")?,
        subaccount_code: row.try_get("subaccount_code")?,
        concept: row.try_get("concept")?,
        debit: money(row, "debit")?,
        credit: money(row, "credit")?,
        counterpart: row.try_get("counterpart")?,
        document: row.try_get("document")?,
        tax_id: row.try_get("tax_id")?,
        tax_base: opt_money(row, "tax_base")?,
        vat: opt_decimal(row, "vat")?,
        surcharge: opt_decimal(row, "surcharge")?,
    })
}

fn map_posted(row: &SqliteRow) -> DbResult<PostedLine> {
    Ok(PostedLine {
        line_id: row.try_get("line_id")?,
        entry_id: row.try_get("entry_id")?,
        entry_number: row.try_get("entry_number")?,
        period_code: row.try_get("period_code")?,
        date: row.try_get("date")?,
        channel: row.try_get("channel")?,
        operation: row.try_get("operation")?,
        subaccount_code: row.try_get("subaccount_code")?,
        account_code: row.try_get("account_code")?,
        concept: row.try_get("concept")?,
        debit: money(row, "debit")?,
        credit: money(row, "credit")?,
    })
}
