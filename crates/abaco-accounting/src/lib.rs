//! # abaco-accounting: Accounting Engine for Abaco
//!
//! Turns priced documents and payments into balanced journal entries,
//! closes and reopens fiscal periods, and lists the ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Document + lines ──► calculation::save_document ──► stored totals    │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │   Invoice / Payment ──► JournalEntryBuilder ──► entry + lines           │
//! │                           │ AccountResolver                             │
//! │                           │ LineGrouper                                 │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │   period end ──────────► PeriodClosingPipeline                          │
//! │                           regularization ► closing ► opening            │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │   reporting ───────────► Ledger (read-only)                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every writing operation runs inside one database transaction and either
//! commits completely or leaves nothing behind. Failures are returned as
//! [`AccountingError`] and logged by message key in the
//! [`AccountingContext`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use abaco_accounting::{AccountingContext, AccountingSource, EngineConfig, JournalEntryBuilder};
//!
//! let mut ctx = AccountingContext::new(EngineConfig::load(None)?);
//! let entry = JournalEntryBuilder::new(&db, &mut ctx)
//!     .generate(AccountingSource::Invoice(&mut invoice))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod builder;
pub mod calculation;
pub mod closing;
pub mod config;
pub mod context;
pub mod error;
pub mod grouper;
mod invoice;
pub mod ledger;
mod payment;
pub mod resolver;

// =============================================================================
// Re-exports
// =============================================================================

pub use builder::{AccountingSource, JournalEntryBuilder};
pub use closing::{ClosingParams, ClosingReport, PeriodClosingPipeline, ReopenParams, ReopenReport};
pub use config::{ClosingConfig, ConfigError, EngineConfig};
pub use context::{AccountingContext, Message, MessageLevel, MessageLog};
pub use error::{keys, AccountingError, AccountingResult};
pub use grouper::{GoodsAmount, LineGrouper};
pub use ledger::{Ledger, LedgerMode, LedgerParams, LedgerRow};
pub use resolver::AccountResolver;
