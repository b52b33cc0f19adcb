//! # Repository Module
//!
//! Database repository implementations for Abaco.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every repository borrows a `&mut SqliteConnection`:                    │
//! │                                                                         │
//! │    let mut tx = db.begin().await?;                                      │
//! │    PeriodRepository::new(&mut tx).get("2025").await?;                   │
//! │    JournalRepository::new(&mut tx).insert_entry(&entry).await?;         │
//! │    tx.commit().await?;                                                  │
//! │                                                                         │
//! │  The same repository works on a pooled connection for reads:           │
//! │                                                                         │
//! │    let mut conn = db.acquire().await?;                                  │
//! │    JournalRepository::new(&mut conn).posted_lines(&filter).await?;      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`period::PeriodRepository`] - Fiscal periods
//! - [`account::AccountRepository`] - Accounts and sub-accounts
//! - [`journal::JournalRepository`] - Journal entries, lines, ledger reads
//! - [`document::DocumentRepository`] - Documents and their lines
//! - [`master::MasterDataRepository`] - Taxes, series, subjects, products...
//! - [`payment::PaymentRepository`] - Receipts and disbursements

pub mod account;
pub mod document;
pub mod journal;
pub mod master;
pub mod payment;
pub mod period;

/// Generates an id for a new document, line or payment.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
