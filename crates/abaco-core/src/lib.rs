//! # abaco-core: Pure Business Logic for Abaco
//!
//! This crate is the **heart** of Abaco. It contains the document calculator
//! and the double-entry arithmetic as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Abaco Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Controllers / forms (outside this workspace)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 abaco-accounting (engine)                       │   │
//! │  │   entry builders, period closing, ledger                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ abaco-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌──────────┐  │   │
//! │  │   │   types   │  │   money   │  │ calculator │  │ balance  │  │   │
//! │  │   │ Document  │  │   Money   │  │ LineCalc   │  │ closing  │  │   │
//! │  │   │ Tax, ...  │  │ Precision │  │ Aggregator │  │ math     │  │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    abaco-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money` and `Precision` over exact decimals
//! - [`types`] - Commercial documents, taxes, subjects, payments
//! - [`accounting`] - Chart of accounts, periods, journal entries
//! - [`calculator`] - LineCalculator and the document aggregator
//! - [`balance`] - Balance accumulation and closing line plans
//! - [`fields`] - Typed dispatch for form-bound fields
//! - [`catalog`] - Default chart of accounts, taxes and series
//! - [`validation`] - Business rule validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use abaco_core::money::{Money, Precision};
//! use rust_decimal::Decimal;
//!
//! let net = Money::new(Decimal::new(1709145, 4)); // 170.9145
//! assert_eq!(net.round(Precision::default()).to_string(), "170.91");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod accounting;
pub mod balance;
pub mod calculator;
pub mod catalog;
pub mod error;
pub mod fields;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use accounting::*;
pub use balance::TrialBalance;
pub use error::{CoreError, ValidationError};
pub use money::{Money, Precision};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default number of decimal places for every rounded amount.
pub const DEFAULT_DECIMALS: u32 = 2;

/// Default length of generated sub-account codes.
///
/// ## Business Reason
/// The Spanish chart of accounts uses 10-digit sub-accounts
/// (`4300000001` = customer 1 under account `430`). A fiscal period may grow
/// this when a generated code does not fit.
pub const DEFAULT_SUBACCOUNT_LENGTH: usize = 10;

/// Default company for single-company installations.
pub const DEFAULT_COMPANY_ID: i64 = 1;
