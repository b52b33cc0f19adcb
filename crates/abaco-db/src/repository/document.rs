//! # Document Repository
//!
//! Commercial documents and their lines. Totals are written by the
//! calculator; this repository only stores them.

use abaco_core::{Document, DocumentKind, DocumentLine, TradeSide};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use super::new_id;
use crate::error::DbResult;
use crate::row::{decimal, money};

const DOCUMENT_COLUMNS: &str = "id, company_id, side, kind, code, series_code, subject_code, \
    subject_name, subject_tax_id, date, accrual_date, country, province, tax_regime, operation, \
    tax_exception, payment_method, channel, discount1, discount2, net, net_without_discount, \
    total, total_tax, total_surcharge, total_withholding, total_supplied, total_cost, \
    total_profit, accounting_entry_id, rectified_id, editable";

const LINE_COLUMNS: &str = "id, document_id, position, product_ref, description, quantity, \
    unit_price, discount1, discount2, tax_code, vat, surcharge, withholding, tax_exception, \
    supplied, cost, price_without_discount, total_price";

/// Repository for documents and document lines.
pub struct DocumentRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> DocumentRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        DocumentRepository { conn }
    }

    // =========================================================================
    // Documents
    // =========================================================================

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Document>> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref().map(map_document).transpose()
    }

    /// Inserts or updates a document. An empty id is replaced by a new one.
    ///
    /// Returns the document id.
    pub async fn save(&mut self, doc: &mut Document) -> DbResult<String> {
        if doc.id.is_empty() {
            doc.id = new_id();
        }

        sqlx::query(
            "INSERT INTO documents
                (id, company_id, side, kind, code, series_code, subject_code, subject_name,
                 subject_tax_id, date, accrual_date, country, province, tax_regime, operation,
                 tax_exception, payment_method, channel, discount1, discount2, net,
                 net_without_discount, total, total_tax, total_surcharge, total_withholding,
                 total_supplied, total_cost, total_profit, accounting_entry_id, rectified_id,
                 editable)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30,
                     ?31, ?32)
             ON CONFLICT (id) DO UPDATE SET
                company_id = excluded.company_id,
                side = excluded.side,
                kind = excluded.kind,
                code = excluded.code,
                series_code = excluded.series_code,
                subject_code = excluded.subject_code,
                subject_name = excluded.subject_name,
                subject_tax_id = excluded.subject_tax_id,
                date = excluded.date,
                accrual_date = excluded.accrual_date,
                country = excluded.country,
                province = excluded.province,
                tax_regime = excluded.tax_regime,
                operation = excluded.operation,
                tax_exception = excluded.tax_exception,
                payment_method = excluded.payment_method,
                channel = excluded.channel,
                discount1 = excluded.discount1,
                discount2 = excluded.discount2,
                net = excluded.net,
                net_without_discount = excluded.net_without_discount,
                total = excluded.total,
                total_tax = excluded.total_tax,
                total_surcharge = excluded.total_surcharge,
                total_withholding = excluded.total_withholding,
                total_supplied = excluded.total_supplied,
                total_cost = excluded.total_cost,
                total_profit = excluded.total_profit,
                accounting_entry_id = excluded.accounting_entry_id,
                rectified_id = excluded.rectified_id,
                editable = excluded.editable",
        )
        .bind(&doc.id)
        .bind(doc.company_id)
        .bind(doc.side)
        .bind(doc.kind)
        .bind(&doc.code)
        .bind(&doc.series_code)
        .bind(&doc.subject_code)
        .bind(&doc.subject_name)
        .bind(&doc.subject_tax_id)
        .bind(doc.date)
        .bind(doc.accrual_date)
        .bind(&doc.country)
        .bind(&doc.province)
        .bind(doc.tax_regime)
        .bind(doc.operation)
        .bind(&doc.tax_exception)
        .bind(&doc.payment_method)
        .bind(doc.channel)
        .bind(doc.discount1.to_string())
        .bind(doc.discount2.to_string())
        .bind(doc.net.to_string())
        .bind(doc.net_without_discount.to_string())
        .bind(doc.total.to_string())
        .bind(doc.total_tax.to_string())
        .bind(doc.total_surcharge.to_string())
        .bind(doc.total_withholding.to_string())
        .bind(doc.total_supplied.to_string())
        .bind(doc.total_cost.to_string())
        .bind(doc.total_profit.to_string())
        .bind(doc.accounting_entry_id)
        .bind(&doc.rectified_id)
        .bind(doc.editable)
        .execute(&mut *self.conn)
        .await?;

        debug!(id = %doc.id, code = %doc.code, total = %doc.total, "Document saved");
        Ok(doc.id.clone())
    }

    /// Links (or unlinks) the document's journal entry.
    pub async fn set_accounting_entry(&mut self, id: &str, entry_id: Option<i64>) -> DbResult<()> {
        sqlx::query("UPDATE documents SET accounting_entry_id = ?1 WHERE id = ?2")
            .bind(entry_id)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    /// Invoices of a company dated in `[from, to]` with no journal entry and a
    /// non-zero total, oldest first.
    pub async fn invoices_without_entry(
        &mut self,
        company_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE company_id = ?1 AND kind = ?2 AND accounting_entry_id IS NULL
               AND date >= ?3 AND date <= ?4
             ORDER BY date, code"
        );
        let rows = sqlx::query(&sql)
            .bind(company_id)
            .bind(DocumentKind::Invoice)
            .bind(from)
            .bind(to)
            .fetch_all(&mut *self.conn)
            .await?;

        let docs = rows
            .iter()
            .map(map_document)
            .collect::<DbResult<Vec<_>>>()?;
        Ok(docs.into_iter().filter(|d| !d.total.is_zero()).collect())
    }

    /// Marks every invoice of a company dated in `[from, to]` as non-editable.
    pub async fn lock_invoices(&mut self, company_id: i64, from: NaiveDate, to: NaiveDate) -> DbResult<u64> {
        let affected = sqlx::query(
            "UPDATE documents SET editable = 0
             WHERE company_id = ?1 AND kind = ?2 AND date >= ?3 AND date <= ?4 AND editable = 1",
        )
        .bind(company_id)
        .bind(DocumentKind::Invoice)
        .bind(from)
        .bind(to)
        .execute(&mut *self.conn)
        .await?
        .rows_affected();
        debug!(company_id, %from, %to, affected, "Invoices locked");
        Ok(affected)
    }

    /// Documents of one side and kind, newest first.
    pub async fn list(&mut self, side: TradeSide, kind: DocumentKind) -> DbResult<Vec<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE side = ?1 AND kind = ?2 ORDER BY date DESC, code DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(side)
            .bind(kind)
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(map_document).collect()
    }

    // =========================================================================
    // Lines
    // =========================================================================

    /// Lines of a document in position order.
    pub async fn lines(&mut self, document_id: &str) -> DbResult<Vec<DocumentLine>> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM document_lines WHERE document_id = ?1 ORDER BY position, id"
        );
        let rows = sqlx::query(&sql)
            .bind(document_id)
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(map_line).collect()
    }

    /// Inserts or updates a line. An empty id is replaced by a new one.
    pub async fn save_line(&mut self, line: &mut DocumentLine) -> DbResult<()> {
        if line.id.is_empty() {
            line.id = new_id();
        }

        sqlx::query(
            "INSERT INTO document_lines
                (id, document_id, position, product_ref, description, quantity, unit_price,
                 discount1, discount2, tax_code, vat, surcharge, withholding, tax_exception,
                 supplied, cost, price_without_discount, total_price)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
             ON CONFLICT (id) DO UPDATE SET
                document_id = excluded.document_id,
                position = excluded.position,
                product_ref = excluded.product_ref,
                description = excluded.description,
                quantity = excluded.quantity,
                unit_price = excluded.unit_price,
                discount1 = excluded.discount1,
                discount2 = excluded.discount2,
                tax_code = excluded.tax_code,
                vat = excluded.vat,
                surcharge = excluded.surcharge,
                withholding = excluded.withholding,
                tax_exception = excluded.tax_exception,
                supplied = excluded.supplied,
                cost = excluded.cost,
                price_without_discount = excluded.price_without_discount,
                total_price = excluded.total_price",
        )
        .bind(&line.id)
        .bind(&line.document_id)
        .bind(line.position)
        .bind(&line.product_ref)
        .bind(&line.description)
        .bind(line.quantity.to_string())
        .bind(line.unit_price.to_string())
        .bind(line.discount1.to_string())
        .bind(line.discount2.to_string())
        .bind(&line.tax_code)
        .bind(line.vat.to_string())
        .bind(line.surcharge.to_string())
        .bind(line.withholding.to_string())
        .bind(&line.tax_exception)
        .bind(line.supplied)
        .bind(line.cost.to_string())
        .bind(line.price_without_discount.to_string())
        .bind(line.total_price.to_string())
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    /// Deletes a line. Returns whether it existed.
    pub async fn delete_line(&mut self, id: &str) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM document_lines WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

fn map_document(row: &SqliteRow) -> DbResult<Document> {
    Ok(Document {
        id: row.try_get("id")?,
        company_id: row.try_get("company_id")?,
        side: row.try_get("side")?,
        kind: row.try_get("kind")?,
        code: row.try_get("code")?,
        series_code: row.try_get("series_code")?,
        subject_code: row.try_get("subject_code")?,
        subject_name: row.try_get("subject_name")?,
        subject_tax_id: row.try_get("subject_tax_id")?,
        date: row.try_get("date")?,
        accrual_date: row.try_get("accrual_date")?,
        country: row.try_get("country")?,
        province: row.try_get("province")?,
        tax_regime: row.try_get("tax_regime")?,
        operation: row.try_get("operation")?,
        tax_exception: row.try_get("tax_exception")?,
        payment_method: row.try_get("payment_method")?,
        channel: row.try_get("channel")?,
        discount1: decimal(row, "discount1")?,
        discount2: decimal(row, "discount2")?,
        net: money(row, "net")?,
        net_without_discount: money(row, "net_without_discount")?,
        total: money(row, "total")?,
        total_tax: money(row, "total_tax")?,
        total_surcharge: money(row, "total_surcharge")?,
        total_withholding: money(row, "total_withholding")?,
        total_supplied: money(row, "total_supplied")?,
        total_cost: money(row, "total_cost")?,
        total_profit: money(row, "total_profit")?,
        accounting_entry_id: row.try_get("accounting_entry_id")?,
        rectified_id: row.try_get("rectified_id")?,
        editable: row.try_get("editable")?,
    })
}

fn map_line(row: &SqliteRow) -> DbResult<DocumentLine> {
    Ok(DocumentLine {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        position: row.try_get("position")?,
        product_ref: row.try_get("product_ref")?,
        description: row.try_get("description")?,
        quantity: decimal(row, "quantity")?,
        unit_price: money(row, "unit_price")?,
        discount1: decimal(row, "discount1")?,
        discount2: decimal(row, "discount2")?,
        tax_code: row.try_get("tax_code")?,
        vat: decimal(row, "vat")?,
        surcharge: decimal(row, "surcharge")?,
        withholding: decimal(row, "withholding")?,
        tax_exception: row.try_get("tax_exception")?,
        supplied: row.try_get("supplied")?,
        cost: money(row, "cost")?,
        price_without_discount: money(row, "price_without_discount")?,
        total_price: money(row, "total_price")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use abaco_core::Money;
    use rust_decimal_macros::dec;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn invoice(code: &str, day: u32, total: i64) -> Document {
        let mut doc = Document::new("", TradeSide::Sale, DocumentKind::Invoice, code, date(day));
        doc.series_code = "A".to_string();
        doc.subject_code = "C1".to_string();
        doc.subject_name = "ACME".to_string();
        doc.total = Money::from_units(total);
        doc
    }

    #[tokio::test]
    async fn test_save_assigns_id_and_upserts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = DocumentRepository::new(&mut conn);

        let mut doc = invoice("F1", 1, 121);
        doc.discount1 = dec!(12.5);
        let id = repo.save(&mut doc).await.unwrap();
        assert!(!id.is_empty());

        doc.total = Money::new(dec!(99.99));
        repo.save(&mut doc).await.unwrap();

        let stored = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.total.amount(), dec!(99.99));
        assert_eq!(stored.discount1, dec!(12.5));
        assert_eq!(stored, doc);
    }

    #[tokio::test]
    async fn test_lines_in_position_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = DocumentRepository::new(&mut conn);

        let mut doc = invoice("F1", 1, 0);
        let id = repo.save(&mut doc).await.unwrap();

        for (position, qty) in [(2, dec!(1)), (1, dec!(2.5))] {
            let mut line = DocumentLine::new("", id.clone(), qty, Money::from_units(10));
            line.position = position;
            repo.save_line(&mut line).await.unwrap();
        }

        let lines = repo.lines(&id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].quantity, dec!(2.5));
        assert!(repo.delete_line(&lines[0].id).await.unwrap());
        assert_eq!(repo.lines(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invoices_without_entry_skips_zero_totals() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = DocumentRepository::new(&mut conn);

        repo.save(&mut invoice("F1", 1, 121)).await.unwrap();
        repo.save(&mut invoice("F2", 2, 0)).await.unwrap();
        repo.save(&mut invoice("F3", 20, 50)).await.unwrap();

        let pending = repo.invoices_without_entry(1, date(1), date(10)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].code, "F1");

        assert_eq!(repo.lock_invoices(1, date(1), date(31)).await.unwrap(), 3);
        let listed = repo.list(TradeSide::Sale, DocumentKind::Invoice).await.unwrap();
        assert!(listed.iter().all(|d| !d.editable));
        assert_eq!(listed[0].code, "F3");
    }
}
