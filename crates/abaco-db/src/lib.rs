//! # abaco-db: Database Layer for Abaco
//!
//! This crate provides database access for the Abaco engine.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Abaco Data Flow                                  │
//! │                                                                         │
//! │  abaco-accounting (generate entry, close period, ledger)               │
//! │       │                                                                 │
//! │       │  let mut tx = db.begin().await?;                               │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     abaco-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  (&mut conn)  │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │    │ PeriodRepo    │    │ 001_initial  │  │   │
//! │  │   │ begin()       │◄───│ AccountRepo   │    │   _schema    │  │   │
//! │  │   │ acquire()     │    │ JournalRepo   │    │              │  │   │
//! │  │   └───────────────┘    │ DocumentRepo  │    └──────────────┘  │   │
//! │  │                        │ MasterData    │                       │   │
//! │  │                        │ PaymentRepo   │                       │   │
//! │  │                        └───────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation, configuration and transactions
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`seed`] - Default chart of accounts loader
//!
//! ## Usage
//!
//! ```rust,ignore
//! use abaco_db::{Database, DbConfig, PeriodRepository};
//!
//! let db = Database::new(DbConfig::new("./abaco.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! let period = PeriodRepository::new(&mut tx).get("2025").await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
mod row;
pub mod seed;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::account::AccountRepository;
pub use repository::document::DocumentRepository;
pub use repository::journal::{JournalRepository, LedgerFilter, PostedLine};
pub use repository::master::MasterDataRepository;
pub use repository::payment::PaymentRepository;
pub use repository::period::PeriodRepository;
