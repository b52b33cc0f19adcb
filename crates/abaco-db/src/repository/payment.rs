//! # Payment Repository

use abaco_core::Payment;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::new_id;
use crate::error::DbResult;
use crate::row::money;

const COLUMNS: &str = "id, company_id, side, document_id, document_code, subject_code, amount, \
    fee, date, payment_method, channel, accounting_entry_id";

/// Repository for collections and disbursements.
pub struct PaymentRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PaymentRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        PaymentRepository { conn }
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Payment>> {
        let sql = format!("SELECT {COLUMNS} FROM payments WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref().map(map_payment).transpose()
    }

    /// Payments registered against a document, oldest first.
    pub async fn by_document(&mut self, document_id: &str) -> DbResult<Vec<Payment>> {
        let sql = format!("SELECT {COLUMNS} FROM payments WHERE document_id = ?1 ORDER BY date, id");
        let rows = sqlx::query(&sql)
            .bind(document_id)
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(map_payment).collect()
    }

    /// Inserts or updates a payment. An empty id is replaced by a new one.
    pub async fn save(&mut self, payment: &mut Payment) -> DbResult<String> {
        if payment.id.is_empty() {
            payment.id = new_id();
        }

        sqlx::query(
            "INSERT INTO payments
                (id, company_id, side, document_id, document_code, subject_code, amount, fee,
                 date, payment_method, channel, accounting_entry_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT (id) DO UPDATE SET
                company_id = excluded.company_id,
                side = excluded.side,
                document_id = excluded.document_id,
                document_code = excluded.document_code,
                subject_code = excluded.subject_code,
                amount = excluded.amount,
                fee = excluded.fee,
                date = excluded.date,
                payment_method = excluded.payment_method,
                channel = excluded.channel,
                accounting_entry_id = excluded.accounting_entry_id",
        )
        .bind(&payment.id)
        .bind(payment.company_id)
        .bind(payment.side)
        .bind(&payment.document_id)
        .bind(&payment.document_code)
        .bind(&payment.subject_code)
        .bind(payment.amount.to_string())
        .bind(payment.fee.to_string())
        .bind(payment.date)
        .bind(&payment.payment_method)
        .bind(payment.channel)
        .bind(payment.accounting_entry_id)
        .execute(&mut *self.conn)
        .await?;
        Ok(payment.id.clone())
    }

    pub async fn set_accounting_entry(&mut self, id: &str, entry_id: Option<i64>) -> DbResult<()> {
        sqlx::query("UPDATE payments SET accounting_entry_id = ?1 WHERE id = ?2")
            .bind(entry_id)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}

fn map_payment(row: &SqliteRow) -> DbResult<Payment> {
    Ok(Payment {
        id: row.try_get("id")?,
        company_id: row.try_get("company_id")?,
        side: row.try_get("side")?,
        document_id: row.try_get("document_id")?,
        document_code: row.try_get("document_code")?,
        subject_code: row.try_get("subject_code")?,
        amount: money(row, "amount")?,
        fee: money(row, "fee")?,
        date: row.try_get("date")?,
        payment_method: row.try_get("payment_method")?,
        channel: row.try_get("channel")?,
        accounting_entry_id: row.try_get("accounting_entry_id")?,
    })
}
