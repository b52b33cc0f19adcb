//! # Calculator Modifiers
//!
//! The only extensibility point of the calculator. Modifiers are registered
//! on a [`CalculationContext`](super::CalculationContext) and run in
//! registration order at each phase.
//!
//! ## Short-Circuit Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  phase              modifiers run       Stop means                      │
//! │  ─────────────────  ──────────────────  ─────────────────────────────── │
//! │  clear              before the reset    abort calculate() → false       │
//! │  apply              after defaults      skip later modifiers            │
//! │  calculate_line     before the default  skip later modifiers AND the    │
//! │                                         default line formula            │
//! │  adjust_subtotals   after grouping      skip later modifiers            │
//! │  finalize           after totals        skip later modifiers            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::calculator::subtotals::Subtotals;
use crate::types::{Document, DocumentLine};

/// Result of a modifier hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierFlow {
    /// Let the next modifier (and the default behavior) run.
    Continue,
    /// Stop the chain here.
    Stop,
}

impl ModifierFlow {
    #[inline]
    pub fn is_stop(self) -> bool {
        self == ModifierFlow::Stop
    }
}

/// A hook set plugged into the calculator.
///
/// Every hook defaults to [`ModifierFlow::Continue`], so implementors only
/// override the phases they care about.
pub trait CalculatorModifier: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn clear(&self, _doc: &mut Document, _lines: &mut [DocumentLine]) -> ModifierFlow {
        ModifierFlow::Continue
    }

    fn apply(&self, _doc: &mut Document, _lines: &mut [DocumentLine]) -> ModifierFlow {
        ModifierFlow::Continue
    }

    fn calculate_line(&self, _doc: &Document, _line: &mut DocumentLine) -> ModifierFlow {
        ModifierFlow::Continue
    }

    fn adjust_subtotals(&self, _doc: &Document, _subtotals: &mut Subtotals) -> ModifierFlow {
        ModifierFlow::Continue
    }

    fn finalize(&self, _doc: &mut Document, _lines: &mut [DocumentLine]) -> ModifierFlow {
        ModifierFlow::Continue
    }
}

/// Runs `hook` over `modifiers` until one returns [`ModifierFlow::Stop`].
///
/// Returns `Stop` if the chain was cut short.
pub(crate) fn run_chain<'a, I, F>(modifiers: I, mut hook: F) -> ModifierFlow
where
    I: IntoIterator<Item = &'a std::sync::Arc<dyn CalculatorModifier>>,
    F: FnMut(&dyn CalculatorModifier) -> ModifierFlow,
{
    for modifier in modifiers {
        if hook(modifier.as_ref()).is_stop() {
            return ModifierFlow::Stop;
        }
    }
    ModifierFlow::Continue
}
