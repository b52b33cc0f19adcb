//! Shared fixture: an in-memory database seeded with the 2025 calendar year,
//! the default chart and master data, one customer and one supplier.

#![allow(dead_code)]

use abaco_accounting::{
    calculation, AccountingContext, AccountingSource, EngineConfig, JournalEntryBuilder,
};
use abaco_core::{
    Document, DocumentKind, DocumentLine, FiscalPeriod, JournalEntry, JournalLine, Money, Payment,
    Subject, TaxRegime, TradeSide,
};
use abaco_db::seed::{seed_master_data, seed_period};
use abaco_db::{Database, DbConfig, JournalRepository, MasterDataRepository};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

pub const CUSTOMER: &str = "1";
pub const SUPPLIER: &str = "7";

pub struct Fixture {
    pub db: Database,
    pub ctx: AccountingContext,
    pub period: FiscalPeriod,
}

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap()
}

pub fn subject(side: TradeSide, code: &str) -> Subject {
    Subject {
        side,
        code: code.to_string(),
        name: format!("Subject {code}"),
        tax_id: Some(format!("B{code:0>8}")),
        subaccount: None,
        group_code: None,
        tax_regime: TaxRegime::General,
        tax_exception: None,
    }
}

impl Fixture {
    pub async fn new() -> Self {
        // RUST_LOG=abaco_accounting=debug shows the engine's events.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let period = FiscalPeriod::calendar_year(1, 2025, 10).unwrap();

        let mut conn = db.acquire().await.unwrap();
        seed_period(&mut conn, &period).await.unwrap();
        seed_master_data(&mut conn).await.unwrap();
        let mut master = MasterDataRepository::new(&mut conn);
        master.save_subject(&subject(TradeSide::Sale, CUSTOMER)).await.unwrap();
        master.save_subject(&subject(TradeSide::Purchase, SUPPLIER)).await.unwrap();
        drop(conn);

        Fixture {
            db,
            ctx: AccountingContext::new(EngineConfig::default()),
            period,
        }
    }

    /// A stored, priced invoice dated `on` with one line per `(quantity,
    /// price, tax code)`.
    pub async fn invoice(
        &mut self,
        side: TradeSide,
        code: &str,
        on: NaiveDate,
        lines: &[(i64, i64, Option<&str>)],
    ) -> Document {
        let mut doc = document(side, code, on);
        let mut lines: Vec<DocumentLine> = lines
            .iter()
            .map(|(quantity, price, tax)| line(*quantity, *price, *tax))
            .collect();
        self.save(&mut doc, &mut lines).await;
        doc
    }

    pub async fn save_subject(&self, subject: &Subject) {
        let mut conn = self.db.acquire().await.unwrap();
        MasterDataRepository::new(&mut conn)
            .save_subject(subject)
            .await
            .unwrap();
    }

    pub async fn save(&mut self, doc: &mut Document, lines: &mut [DocumentLine]) {
        let saved = calculation::save_document(&self.db, &mut self.ctx, doc, lines)
            .await
            .unwrap();
        assert!(saved);
    }

    pub async fn account(&mut self, doc: &mut Document) -> abaco_accounting::AccountingResult<JournalEntry> {
        JournalEntryBuilder::new(&self.db, &mut self.ctx)
            .generate(AccountingSource::Invoice(doc))
            .await
    }

    pub async fn account_payment(
        &mut self,
        payment: &mut Payment,
    ) -> abaco_accounting::AccountingResult<JournalEntry> {
        JournalEntryBuilder::new(&self.db, &mut self.ctx)
            .generate(AccountingSource::Payment(payment))
            .await
    }

    pub async fn lines(&self, entry_id: i64) -> Vec<JournalLine> {
        let mut conn = self.db.acquire().await.unwrap();
        JournalRepository::new(&mut conn).lines(entry_id).await.unwrap()
    }

    /// `(sub-account, debit, credit)` of an entry, in insertion order.
    pub async fn movements(&self, entry_id: i64) -> Vec<(String, Money, Money)> {
        self.lines(entry_id)
            .await
            .into_iter()
            .map(|l| (l.subaccount_code, l.debit, l.credit))
            .collect()
    }

    pub async fn entry_count(&self) -> i64 {
        let mut conn = self.db.acquire().await.unwrap();
        sqlx::query_scalar("SELECT COUNT(*) FROM journal_entries")
            .fetch_one(&mut *conn)
            .await
            .unwrap()
    }
}

/// Unsaved series `A` invoice for the default customer or supplier.
pub fn document(side: TradeSide, code: &str, on: NaiveDate) -> Document {
    let mut doc = Document::new("", side, DocumentKind::Invoice, code, on);
    doc.series_code = "A".to_string();
    doc.subject_code = match side {
        TradeSide::Sale => CUSTOMER.to_string(),
        TradeSide::Purchase => SUPPLIER.to_string(),
    };
    doc
}

pub fn line(quantity: i64, price: i64, tax: Option<&str>) -> DocumentLine {
    let mut line = DocumentLine::new("", "", Decimal::from(quantity), Money::from_units(price));
    if let Some(code) = tax {
        line.tax_code = Some(code.to_string());
        line.vat = match code {
            "IVA21" => Decimal::from(21),
            "IVA10" => Decimal::from(10),
            "IVA4" => Decimal::from(4),
            _ => Decimal::ZERO,
        };
    }
    line
}

pub fn money(units: i64) -> Money {
    Money::from_units(units)
}

pub fn movement(code: &str, debit: i64, credit: i64) -> (String, Money, Money) {
    (code.to_string(), money(debit), money(credit))
}
