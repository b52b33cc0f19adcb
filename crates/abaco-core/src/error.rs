//! # Error Types
//!
//! Domain-specific error types for abaco-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  abaco-core errors (this file)                                         │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  abaco-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  abaco-accounting errors (separate crate)                              │
//! │  └── AccountingError  - Validation / Configuration / Integrity         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → AccountingError → caller          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A tax code referenced by a line does not exist.
    #[error("Tax not found: {0}")]
    TaxNotFound(String),

    /// A generated sub-account code would not fit any sensible length.
    ///
    /// ## When This Occurs
    /// - Prefix plus suffix longer than the hard maximum of 32 digits
    #[error("Sub-account code {code} exceeds maximum length {max}")]
    SubAccountTooLong { code: String, max: usize },

    /// An amount could not be distributed because there was nothing to
    /// distribute it over.
    #[error("Cannot distribute {amount} over an empty set")]
    EmptyDistribution { amount: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when form input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
    },

    /// Invalid format (e.g., invalid decimal, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Unknown form field name.
    #[error("Unknown field: {0}")]
    UnknownField(String),
}

impl ValidationError {
    /// Creates an InvalidFormat error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
