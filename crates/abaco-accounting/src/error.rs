//! # Accounting Error Types
//!
//! Every failure carries a message key; the key is what callers and tests
//! observe, the rendered text is for humans.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Accounting Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Validation    │  │  Configuration  │  │      Integrity          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  total is zero  │  │  missing special│  │  unbalanced entry       │ │
//! │  │  record missing │  │  closed period  │  │  already accounted      │ │
//! │  │  calc aborted   │  │  no chart       │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │        recovered          abort, never          entry deleted,         │
//! │        locally            retried               never half-written     │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Database     │  │      Core       │                              │
//! │  │  (DbError)      │  │  (CoreError)    │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use abaco_core::CoreError;
use abaco_db::DbError;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type alias for accounting operations.
pub type AccountingResult<T> = Result<T, AccountingError>;

/// Parameters attached to a message key (`code`, `subject`, `period`...).
pub type MessageContext = BTreeMap<String, String>;

// =============================================================================
// Message Keys
// =============================================================================

/// Message keys reported by the engine.
pub mod keys {
    pub const ACCOUNTING_ENTRY_ALREADY_GENERATED: &str = "accounting-entry-already-generated";
    pub const DOCUMENT_TOTAL_IS_ZERO: &str = "document-total-is-zero";
    pub const DOCUMENT_NOT_ACCOUNTABLE: &str = "document-not-accountable";
    pub const CLOSED_PERIOD: &str = "closed-period";
    pub const PERIOD_NOT_FOUND: &str = "period-not-found";
    pub const PERIOD_WITHOUT_CHART: &str = "period-without-chart-of-accounts";
    pub const CUSTOMER_ACCOUNT_NOT_FOUND: &str = "customer-account-not-found";
    pub const SUPPLIER_ACCOUNT_NOT_FOUND: &str = "supplier-account-not-found";
    pub const VAT_ACCOUNT_NOT_FOUND: &str = "vat-account-not-found";
    pub const SURCHARGE_ACCOUNT_NOT_FOUND: &str = "surcharge-account-not-found";
    pub const WITHHOLDING_ACCOUNT_NOT_FOUND: &str = "withholding-account-not-found";
    pub const SUPPLIED_ACCOUNT_NOT_FOUND: &str = "supplied-account-not-found";
    pub const GOODS_ACCOUNT_NOT_FOUND: &str = "goods-account-not-found";
    pub const PAYMENT_ACCOUNT_NOT_FOUND: &str = "payment-account-not-found";
    pub const BANK_FEE_ACCOUNT_NOT_FOUND: &str = "bank-fee-account-not-found";
    pub const PROFIT_LOSS_ACCOUNT_NOT_FOUND: &str = "profit-loss-account-not-found";
    pub const SPECIAL_ACCOUNT_NOT_FOUND: &str = "special-account-not-found";
    pub const SUBACCOUNT_CODE_EXHAUSTED: &str = "subaccount-code-exhausted";
    pub const UNBALANCED_ENTRY: &str = "unbalanced-entry";
    pub const TAX_NOT_FOUND: &str = "tax-not-found";
    pub const INVOICE_WITHOUT_ENTRY: &str = "invoice-without-accounting-entry";
    pub const NEXT_PERIOD_CLOSED: &str = "next-period-closed";
    pub const CALCULATION_ABORTED: &str = "calculation-aborted";
    pub const RECORD_NOT_FOUND: &str = "record-not-found";
    pub const DOCUMENT_SAVE_FAILED: &str = "document-save-failed";
    pub const INVALID_DATA: &str = "invalid-data";
    pub const DATABASE_ERROR: &str = "database-error";
}

// =============================================================================
// Error Type
// =============================================================================

/// Accounting engine error.
#[derive(Debug, Error)]
pub enum AccountingError {
    /// Missing or invalid input; the caller recovers locally.
    ///
    /// ## When This Occurs
    /// - Document total is zero
    /// - Subject, tax or document not found
    /// - A calculator modifier stopped the calculation
    #[error("Validation failed: {key} {context:?}")]
    Validation {
        key: &'static str,
        context: MessageContext,
    },

    /// The books are not set up for the operation; never retried.
    ///
    /// ## When This Occurs
    /// - No fiscal period for the date, or it is closed
    /// - Period without chart of accounts
    /// - A special account needed for resolution is missing
    #[error("Configuration error: {key} {context:?}")]
    Configuration {
        key: &'static str,
        context: MessageContext,
    },

    /// The entry being built would corrupt the books; it has been removed.
    ///
    /// ## When This Occurs
    /// - Σ debit ≠ Σ credit after all lines were posted
    /// - The document or payment already has an entry
    #[error("Integrity error: {key} {context:?}")]
    Integrity {
        key: &'static str,
        context: MessageContext,
    },

    /// Persistence failure.
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    /// Domain rule violation from abaco-core.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl AccountingError {
    pub fn validation(key: &'static str) -> Self {
        AccountingError::Validation {
            key,
            context: MessageContext::new(),
        }
    }

    pub fn configuration(key: &'static str) -> Self {
        AccountingError::Configuration {
            key,
            context: MessageContext::new(),
        }
    }

    pub fn integrity(key: &'static str) -> Self {
        AccountingError::Integrity {
            key,
            context: MessageContext::new(),
        }
    }

    /// Adds a context parameter. No-op on wrapped errors.
    pub fn with(mut self, name: &str, value: impl ToString) -> Self {
        if let AccountingError::Validation { context, .. }
        | AccountingError::Configuration { context, .. }
        | AccountingError::Integrity { context, .. } = &mut self
        {
            context.insert(name.to_string(), value.to_string());
        }
        self
    }

    /// Message key of this error.
    pub fn key(&self) -> &'static str {
        match self {
            AccountingError::Validation { key, .. }
            | AccountingError::Configuration { key, .. }
            | AccountingError::Integrity { key, .. } => key,
            AccountingError::Db(DbError::InvalidData { .. }) | AccountingError::Core(_) => {
                keys::INVALID_DATA
            }
            AccountingError::Db(_) => keys::DATABASE_ERROR,
        }
    }

    /// Context parameters (empty for wrapped errors).
    pub fn context(&self) -> MessageContext {
        match self {
            AccountingError::Validation { context, .. }
            | AccountingError::Configuration { context, .. }
            | AccountingError::Integrity { context, .. } => context.clone(),
            AccountingError::Db(err) => {
                MessageContext::from([("error".to_string(), err.to_string())])
            }
            AccountingError::Core(err) => {
                MessageContext::from([("error".to_string(), err.to_string())])
            }
        }
    }

    /// Returns true for validation failures, which only warrant a warning.
    pub fn is_validation(&self) -> bool {
        matches!(self, AccountingError::Validation { .. })
    }

    /// Returns true if this error indicates the books are misconfigured.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AccountingError::Configuration { .. })
    }
}
