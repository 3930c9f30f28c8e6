//! Thin bridges from CLI arguments to the reconciliation provider.

pub mod apply;
pub mod checkout;
pub mod export;
pub mod sync;

use crate::resource::{ApplyResult, HgCheckout};
use crate::ui;

/// Render one reconciliation outcome.
pub(crate) fn report(resource: &HgCheckout, outcome: &ApplyResult) {
    match outcome {
        ApplyResult::NoChange => ui::info(&format!("{} already converged", resource.id())),
        ApplyResult::Created => ui::success(&format!(
            "{} cloned from {}",
            resource.id(),
            resource.repository
        )),
        ApplyResult::Modified => {
            ui::success(&format!("{} moved to a new revision", resource.id()));
        }
        ApplyResult::Removed => {
            ui::success(&format!("{} stripped of Mercurial metadata", resource.id()));
        }
        ApplyResult::Skipped { reason } => {
            ui::warn(&format!("{} skipped: {reason}", resource.id()));
        }
    }
}
