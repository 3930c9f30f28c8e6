//! Reconcile every checkout declared in a manifest, sequentially.
//!
//! One reconciliation per destination at a time; entries that fail do not
//! stop the run, but a non-zero failure count fails the command.

use anyhow::{Result, bail};
use colored::Colorize;

use crate::cli::ApplyArgs;
use crate::manifest::{Manifest, Operation, default_path};
use crate::provider::Reconciler;
use crate::resource::ApplyResult;
use crate::ui;

#[derive(Debug, Default)]
struct ApplySummary {
    converged: usize,
    unchanged: usize,
    skipped: usize,
    failed: usize,
}

impl ApplySummary {
    fn add(&mut self, outcome: &ApplyResult) {
        match outcome {
            r if r.is_change() => self.converged += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
            ApplyResult::NoChange => self.unchanged += 1,
            _ => unreachable!(),
        }
    }
}

pub fn run(args: ApplyArgs, dry_run: bool) -> Result<()> {
    let path = match args.manifest {
        Some(path) => path,
        None => default_path()?,
    };
    let manifest = Manifest::load(&path)?;
    if manifest.checkouts.is_empty() {
        ui::info("manifest declares no checkouts");
        return Ok(());
    }

    let mut summary = ApplySummary::default();
    for entry in &manifest.checkouts {
        let reconciler = Reconciler::new(&entry.checkout, dry_run);
        let result = match entry.operation {
            Operation::Sync => reconciler.sync(),
            Operation::Checkout => reconciler.checkout(),
            Operation::Export => reconciler.export(),
        };
        match result {
            Ok(outcome) => {
                summary.add(&outcome);
                super::report(&entry.checkout, &outcome);
            }
            Err(e) => {
                summary.failed += 1;
                ui::error(&format!("{}: {e}", entry.checkout.id()));
            }
        }
    }

    print_summary(&summary);
    if summary.failed > 0 {
        bail!("{} checkout(s) failed to converge", summary.failed);
    }
    Ok(())
}

fn print_summary(summary: &ApplySummary) {
    println!();
    if summary.failed == 0 {
        println!("  {} Checkouts reconciled", "✓".green().bold());
    } else {
        println!("  {} Checkouts reconciled with errors", "⚠".yellow().bold());
    }
    if summary.converged > 0 {
        println!("    • {} converged", summary.converged);
    }
    if summary.unchanged > 0 {
        println!("    • {} already up to date", summary.unchanged);
    }
    if summary.skipped > 0 {
        println!("    • {} skipped (dry run)", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {}", summary.failed, "failed".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_buckets_outcomes() {
        let mut summary = ApplySummary::default();
        summary.add(&ApplyResult::Created);
        summary.add(&ApplyResult::Modified);
        summary.add(&ApplyResult::Removed);
        summary.add(&ApplyResult::NoChange);
        summary.add(&ApplyResult::Skipped {
            reason: "dry run".to_string(),
        });
        assert_eq!(summary.converged, 3);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
    }
}
