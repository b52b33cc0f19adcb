//! # Invoice Entries
//!
//! Line layout of an invoice entry. Amounts are shown for a sale; a
//! purchase mirrors every sign, and a credit note (negative totals) flips
//! them again.
//!
//! ```text
//!   subject        430x   D  total
//!   VAT            477x   C  tax          ┐ per taxed group, with the
//!   surcharge      477x1  C  surcharge    ┘ tax register filled
//!   withholding    473x   D  withholding
//!   supplied       554x   C  supplied
//!   goods          700x   C  net          one per goods sub-account
//! ```
//!
//! Intra-community purchases post each group's VAT twice: input (debit)
//! and output (credit).

use abaco_core::calculator::{CalculationContext, Calculator, Subtotals, TaxGroup};
use abaco_core::{
    Document, DocumentKind, DocumentLine, JournalEntry, LineDraft, Money, SubAccount, Subject,
    TradeSide,
};
use abaco_db::{DocumentRepository, MasterDataRepository};
use sqlx::SqliteConnection;

use crate::builder::{header, open_period_for, EntryWriter};
use crate::calculation::load_context;
use crate::context::AccountingContext;
use crate::error::{keys, AccountingError, AccountingResult};
use crate::grouper::LineGrouper;
use crate::resolver::AccountResolver;

/// `amount` on the subject's side of the entry: as is for sales, negated
/// for purchases.
fn signed(side: TradeSide, amount: Money) -> Money {
    match side {
        TradeSide::Sale => amount,
        TradeSide::Purchase => -amount,
    }
}

/// Builds and stores the entry of an invoice; `conn` carries the caller's
/// transaction.
pub(crate) async fn account_invoice(
    conn: &mut SqliteConnection,
    ctx: &AccountingContext,
    grouper: &LineGrouper,
    doc: &Document,
) -> AccountingResult<JournalEntry> {
    if doc.kind != DocumentKind::Invoice {
        return Err(AccountingError::validation(keys::DOCUMENT_NOT_ACCOUNTABLE).with("code", &doc.code));
    }
    if doc.accounting_entry_id.is_some() {
        return Err(already_generated(doc));
    }
    let stored = DocumentRepository::new(conn)
        .get(&doc.id)
        .await?
        .ok_or_else(|| AccountingError::validation(keys::RECORD_NOT_FOUND).with("document", &doc.id))?;
    if stored.accounting_entry_id.is_some() {
        return Err(already_generated(doc));
    }
    if doc.total.is_zero() {
        return Err(AccountingError::validation(keys::DOCUMENT_TOTAL_IS_ZERO).with("code", &doc.code));
    }

    let period = open_period_for(conn, doc.company_id, doc.accounting_date()).await?;

    let lines = DocumentRepository::new(conn).lines(&doc.id).await?;
    let calc = load_context(conn, ctx, doc).await?;
    let subtotals = Calculator::subtotals(&calc, doc, &lines)
        .ok_or_else(|| AccountingError::validation(keys::CALCULATION_ABORTED).with("code", &doc.code))?;

    let subject = MasterDataRepository::new(conn)
        .subject(doc.side, &doc.subject_code)
        .await?
        .ok_or_else(|| AccountingError::validation(keys::RECORD_NOT_FOUND).with("subject", &doc.subject_code))?;

    let mut resolver = AccountResolver::load(conn, period.clone()).await?;
    let name = if doc.subject_name.is_empty() {
        &subject.name
    } else {
        &doc.subject_name
    };
    let concept = match doc.side {
        TradeSide::Sale => format!("Invoice {} - {}", doc.code, name),
        TradeSide::Purchase => format!("Supplier invoice {} - {}", doc.code, name),
    };

    let mut writer = EntryWriter::start(
        conn,
        header(&period, doc.accounting_date(), concept.clone(), Some(doc.code.clone()), doc.channel),
    )
    .await?;

    let invoice = InvoicePosting {
        ctx,
        grouper,
        calc: &calc,
        doc,
        lines: &lines,
        subtotals: &subtotals,
        subject: &subject,
        concept: &concept,
    };
    let built = match invoice.post(conn, &mut resolver, &mut writer).await {
        Ok(()) => writer.finish(conn).await,
        Err(err) => Err(err),
    };

    match built {
        Ok(entry) => {
            DocumentRepository::new(conn)
                .set_accounting_entry(&doc.id, Some(entry.id))
                .await?;
            Ok(entry)
        }
        Err(err) => {
            writer.discard(conn).await?;
            Err(err)
        }
    }
}

fn already_generated(doc: &Document) -> AccountingError {
    AccountingError::integrity(keys::ACCOUNTING_ENTRY_ALREADY_GENERATED).with("code", &doc.code)
}

/// Everything the line steps read.
struct InvoicePosting<'a> {
    ctx: &'a AccountingContext,
    grouper: &'a LineGrouper,
    calc: &'a CalculationContext,
    doc: &'a Document,
    lines: &'a [DocumentLine],
    subtotals: &'a Subtotals,
    subject: &'a Subject,
    concept: &'a str,
}

impl InvoicePosting<'_> {
    async fn post(
        &self,
        conn: &mut SqliteConnection,
        resolver: &mut AccountResolver,
        writer: &mut EntryWriter,
    ) -> AccountingResult<()> {
        let side = self.doc.side;
        let subject_account = resolver.subject(conn, self.subject).await?.ok_or_else(|| {
            let key = match side {
                TradeSide::Sale => keys::CUSTOMER_ACCOUNT_NOT_FOUND,
                TradeSide::Purchase => keys::SUPPLIER_ACCOUNT_NOT_FOUND,
            };
            AccountingError::configuration(key).with("subject", &self.subject.code)
        })?;
        let counterpart = Some(subject_account.code.clone());

        writer
            .add(
                conn,
                LineDraft::posting(&subject_account.code, self.concept, signed(side, self.doc.total)),
            )
            .await?;

        for group in self.subtotals.taxed_groups() {
            self.post_taxes(conn, resolver, writer, group, &subject_account).await?;
        }

        let withholding = self.subtotals.total_withholding;
        if !withholding.is_zero() {
            let rate = self.subtotals.withholding_rate;
            let definition = MasterDataRepository::new(conn)
                .withholdings()
                .await?
                .into_iter()
                .find(|w| w.rate == rate);
            let account = resolver
                .withholding(conn, side, definition.as_ref())
                .await?
                .ok_or_else(|| not_found(keys::WITHHOLDING_ACCOUNT_NOT_FOUND, self.doc))?;
            let line = LineDraft::posting(&account.code, self.concept, signed(side, withholding))
                .with_counterpart(counterpart.clone());
            writer.add(conn, line).await?;
        }

        let supplied = self.subtotals.total_supplied;
        if !supplied.is_zero() {
            let account = resolver
                .supplied(conn)
                .await?
                .ok_or_else(|| not_found(keys::SUPPLIED_ACCOUNT_NOT_FOUND, self.doc))?;
            let line = LineDraft::posting(&account.code, self.concept, -signed(side, supplied))
                .with_counterpart(counterpart.clone());
            writer.add(conn, line).await?;
        }

        let rectifying = self.calc.is_rectifying(self.doc);
        let mut resolved = Vec::new();
        for goods in self.grouper.goods(self.doc, self.lines) {
            let account = resolver
                .goods(conn, side, rectifying, goods.product_ref.as_deref())
                .await?
                .ok_or_else(|| {
                    not_found(keys::GOODS_ACCOUNT_NOT_FOUND, self.doc)
                        .with("product", goods.product_ref.as_deref().unwrap_or_default())
                })?;
            resolved.push((account.code, goods.amount));
        }
        let postings = self
            .grouper
            .postings(resolved, self.subtotals.net, self.ctx.precision())?;
        for (code, amount) in postings {
            let line = LineDraft::posting(&code, self.concept, -signed(side, amount))
                .with_counterpart(counterpart.clone());
            writer.add(conn, line).await?;
        }
        Ok(())
    }

    async fn post_taxes(
        &self,
        conn: &mut SqliteConnection,
        resolver: &mut AccountResolver,
        writer: &mut EntryWriter,
        group: &TaxGroup,
        subject_account: &SubAccount,
    ) -> AccountingResult<()> {
        let tax = match group.tax_code.as_deref() {
            Some(code) => Some(self.calc.tax(code).ok_or_else(|| {
                AccountingError::validation(keys::TAX_NOT_FOUND).with("tax", code)
            })?),
            None => None,
        };
        let side = self.doc.side;
        let register = |line: LineDraft| {
            line.with_counterpart(Some(subject_account.code.clone())).with_tax_register(
                self.doc.subject_tax_id.clone(),
                group.net,
                group.vat,
                group.surcharge,
            )
        };

        // (side the account is resolved for, amount on the subject's side)
        let postings: Vec<(TradeSide, Money)> = if group.self_assessed {
            vec![(TradeSide::Purchase, -group.tax), (TradeSide::Sale, group.tax)]
        } else {
            vec![(side, signed(side, group.tax))]
        };
        for (account_side, amount) in postings.iter().copied().filter(|(_, a)| !a.is_zero()) {
            let account = resolver
                .vat(conn, account_side, tax)
                .await?
                .ok_or_else(|| not_found(keys::VAT_ACCOUNT_NOT_FOUND, self.doc))?;
            writer
                .add(conn, register(LineDraft::posting(&account.code, self.concept, -amount)))
                .await?;
        }

        let postings: Vec<(TradeSide, Money)> = if group.self_assessed {
            vec![
                (TradeSide::Purchase, -group.surcharge_amount),
                (TradeSide::Sale, group.surcharge_amount),
            ]
        } else {
            vec![(side, signed(side, group.surcharge_amount))]
        };
        for (account_side, amount) in postings.iter().copied().filter(|(_, a)| !a.is_zero()) {
            let account = resolver
                .surcharge(conn, account_side, tax)
                .await?
                .ok_or_else(|| not_found(keys::SURCHARGE_ACCOUNT_NOT_FOUND, self.doc))?;
            writer
                .add(conn, register(LineDraft::posting(&account.code, self.concept, -amount)))
                .await?;
        }
        Ok(())
    }
}

fn not_found(key: &'static str, doc: &Document) -> AccountingError {
    AccountingError::configuration(key).with("code", &doc.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signed_mirrors_purchases() {
        let amount = Money::new(dec!(121));
        assert_eq!(signed(TradeSide::Sale, amount), amount);
        assert_eq!(signed(TradeSide::Purchase, amount), -amount);
        assert_eq!(signed(TradeSide::Purchase, -amount), amount);
    }
}
