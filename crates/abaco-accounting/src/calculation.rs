//! # Calculation Service
//!
//! Loads what the calculator needs from the database, runs it, and
//! persists the result.
//!
//! ```text
//!   validate ──► load_context ──► Calculator::calculate ──► save lines ──► save document
//!      │         (taxes, zones,        │ false                (caller's transaction)
//!      ▼          series, subject)     ▼
//!  "invalid-data"              "calculation-aborted"
//! ```

use abaco_core::calculator::{CalculationContext, Calculator, Subtotals};
use abaco_core::validation::validate_document;
use abaco_core::{Document, DocumentLine};
use abaco_db::{Database, DbError, DocumentRepository, MasterDataRepository};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::context::AccountingContext;
use crate::error::{keys, AccountingError, AccountingResult, MessageContext};

/// Builds a calculation context for `doc` from master data.
pub async fn load_context(
    conn: &mut SqliteConnection,
    ctx: &AccountingContext,
    doc: &Document,
) -> AccountingResult<CalculationContext> {
    let mut master = MasterDataRepository::new(conn);
    let taxes = master.taxes().await?;
    let zones = master.tax_zones().await?;
    let series = master.series_list().await?;
    let subject = master.subject(doc.side, &doc.subject_code).await?;

    Ok(ctx
        .calculation_context()
        .with_taxes(taxes)
        .with_tax_zones(zones)
        .with_series(series)
        .with_subject(subject))
}

/// Recalculates `doc` and `lines`, persisting them when `persist` is set.
///
/// Discounts outside 0..=100 and negative rates fail with `invalid-data`
/// before anything is computed. Returns `Ok(false)` when a modifier aborted
/// the calculation; nothing is written in that case. Writes go through
/// `conn`, so the caller owns the transaction.
pub async fn calculate(
    conn: &mut SqliteConnection,
    ctx: &mut AccountingContext,
    doc: &mut Document,
    lines: &mut [DocumentLine],
    persist: bool,
) -> AccountingResult<bool> {
    validate_document(doc, lines).map_err(|e| {
        AccountingError::validation(keys::INVALID_DATA)
            .with("code", &doc.code)
            .with("error", e)
    })?;

    let calc = load_context(conn, ctx, doc).await?;
    if !Calculator::calculate(&calc, doc, lines) {
        ctx.messages_mut().warning(
            keys::CALCULATION_ABORTED,
            MessageContext::from([("code".to_string(), doc.code.clone())]),
        );
        return Ok(false);
    }
    debug!(code = %doc.code, total = %doc.total, "Document calculated");

    if persist {
        persist_document(conn, doc, lines).await?;
    }
    Ok(true)
}

/// Subtotals of a stored document, without modifying it.
///
/// `None` when a modifier aborted the calculation.
pub async fn subtotals(
    conn: &mut SqliteConnection,
    ctx: &AccountingContext,
    doc: &Document,
    lines: &[DocumentLine],
) -> AccountingResult<Option<Subtotals>> {
    let calc = load_context(conn, ctx, doc).await?;
    Ok(Calculator::subtotals(&calc, doc, lines))
}

/// Saves every line, then the document with its new totals.
///
/// A new document header is inserted first so its lines have a parent.
async fn persist_document(
    conn: &mut SqliteConnection,
    doc: &mut Document,
    lines: &mut [DocumentLine],
) -> AccountingResult<()> {
    let mut repo = DocumentRepository::new(conn);
    let exists = !doc.id.is_empty() && repo.get(&doc.id).await?.is_some();
    if !exists {
        repo.save(doc).await?;
    }

    for (position, line) in lines.iter_mut().enumerate() {
        line.document_id = doc.id.clone();
        if line.position == 0 {
            line.position = position as i64 + 1;
        }
        repo.save_line(line).await.map_err(|e| save_failed(doc, e))?;
    }
    repo.save(doc).await.map_err(|e| save_failed(doc, e))?;
    Ok(())
}

fn save_failed(doc: &Document, err: DbError) -> AccountingError {
    debug!(code = %doc.code, error = %err, "Document save failed");
    AccountingError::validation(keys::DOCUMENT_SAVE_FAILED)
        .with("code", &doc.code)
        .with("error", err)
}

/// Recalculates and saves a document in its own transaction.
///
/// Nothing is written when the calculation aborts or any save fails.
pub async fn save_document(
    db: &Database,
    ctx: &mut AccountingContext,
    doc: &mut Document,
    lines: &mut [DocumentLine],
) -> AccountingResult<bool> {
    let mut tx = db.begin().await?;
    let outcome = calculate(&mut tx, ctx, doc, lines, true).await;
    match outcome {
        Ok(true) => {
            tx.commit().await.map_err(DbError::from)?;
            info!(code = %doc.code, id = %doc.id, total = %doc.total, "Document saved");
            Ok(true)
        }
        Ok(false) => {
            tx.rollback().await.map_err(DbError::from)?;
            Ok(false)
        }
        Err(err) => {
            tx.rollback().await.map_err(DbError::from)?;
            ctx.report(&err);
            Err(err)
        }
    }
}
