//! # Accounting Context
//!
//! Explicit run state passed through every engine operation: the engine
//! configuration, the calculator modifiers to register, and the message log.
//!
//! ## Message Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  operation fails ──► AccountingError { key, context }                   │
//! │                             │                                           │
//! │                             ▼                                           │
//! │                   AccountingContext::report                             │
//! │                      │               │                                  │
//! │                      ▼               ▼                                  │
//! │               MessageLog        tracing::warn! / error!                 │
//! │          (tests assert keys)    (operators read logs)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use abaco_core::calculator::{CalculationContext, CalculatorModifier};
use abaco_core::Precision;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{ClosingConfig, EngineConfig};
use crate::error::{AccountingError, MessageContext};

// =============================================================================
// Message Log
// =============================================================================

/// Severity of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// One logged message: a translation key plus parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub level: MessageLevel,
    pub key: String,
    pub context: MessageContext,
}

/// Messages recorded during a run, oldest first.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, key: &str, context: MessageContext) {
        info!(key, ?context, "accounting message");
        self.push(MessageLevel::Info, key, context);
    }

    pub fn warning(&mut self, key: &str, context: MessageContext) {
        warn!(key, ?context, "accounting warning");
        self.push(MessageLevel::Warning, key, context);
    }

    pub fn error(&mut self, key: &str, context: MessageContext) {
        error!(key, ?context, "accounting error");
        self.push(MessageLevel::Error, key, context);
    }

    fn push(&mut self, level: MessageLevel, key: &str, context: MessageContext) {
        self.messages.push(Message {
            level,
            key: key.to_string(),
            context,
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Keys in the order they were logged.
    pub fn keys(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.key.as_str()).collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.messages.iter().any(|m| m.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drains the log.
    pub fn take(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }
}

// =============================================================================
// Accounting Context
// =============================================================================

/// Run state for the accounting engine.
///
/// ## Example
/// ```rust
/// use abaco_accounting::{AccountingContext, EngineConfig};
/// use abaco_core::Precision;
///
/// let ctx = AccountingContext::new(EngineConfig::default());
/// assert_eq!(ctx.precision(), Precision::new(2));
/// assert!(ctx.messages().is_empty());
/// ```
#[derive(Clone)]
pub struct AccountingContext {
    config: EngineConfig,
    precision: Precision,
    modifiers: Vec<Arc<dyn CalculatorModifier>>,
    messages: MessageLog,
}

impl AccountingContext {
    pub fn new(config: EngineConfig) -> Self {
        let precision = config.precision();
        AccountingContext {
            config,
            precision,
            modifiers: Vec::new(),
            messages: MessageLog::new(),
        }
    }

    /// Adds a calculator modifier; modifiers run in registration order.
    pub fn register(mut self, modifier: Arc<dyn CalculatorModifier>) -> Self {
        self.modifiers.push(modifier);
        self
    }

    #[inline]
    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn closing(&self) -> &ClosingConfig {
        &self.config.closing
    }

    pub fn modifiers(&self) -> &[Arc<dyn CalculatorModifier>] {
        &self.modifiers
    }

    /// Empty calculation context sharing this context's precision and
    /// modifiers.
    pub fn calculation_context(&self) -> CalculationContext {
        self.modifiers
            .iter()
            .cloned()
            .fold(CalculationContext::new(self.precision), |calc, m| calc.register(m))
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut MessageLog {
        &mut self.messages
    }

    /// Logs an error under its key: validation failures as warnings,
    /// everything else as errors.
    pub fn report(&mut self, err: &AccountingError) {
        let context = err.context();
        if err.is_validation() || err.is_configuration() {
            self.messages.warning(err.key(), context);
        } else {
            self.messages.error(err.key(), context);
        }
    }
}

impl std::fmt::Debug for AccountingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountingContext")
            .field("config", &self.config)
            .field("modifiers", &self.modifiers.len())
            .field("messages", &self.messages)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::keys;

    #[test]
    fn test_report_levels() {
        let mut ctx = AccountingContext::new(EngineConfig::default());
        ctx.report(&AccountingError::configuration(keys::CLOSED_PERIOD).with("period", "2025"));
        ctx.report(&AccountingError::integrity(keys::UNBALANCED_ENTRY));

        let messages = ctx.messages().messages();
        assert_eq!(messages[0].level, MessageLevel::Warning);
        assert_eq!(messages[0].context.get("period").map(String::as_str), Some("2025"));
        assert_eq!(messages[1].level, MessageLevel::Error);
        assert_eq!(ctx.messages().keys(), vec!["closed-period", "unbalanced-entry"]);
        assert!(ctx.messages().contains(keys::UNBALANCED_ENTRY));

        assert_eq!(ctx.messages_mut().take().len(), 2);
        assert!(ctx.messages().is_empty());
    }

    #[test]
    fn test_precision_follows_config() {
        let config = EngineConfig {
            decimal_places: 3,
            ..EngineConfig::default()
        };
        let ctx = AccountingContext::new(config);
        assert_eq!(ctx.precision(), Precision::new(3));
        assert_eq!(ctx.calculation_context().precision(), Precision::new(3));
    }
}
