//! Self-describing schema patches
//!
//! There is no schema version table. Every [`Patch`] inspects the database to decide whether it
//! still has work to do, so the whole catalog can run on every startup and only the missing
//! steps are applied. Patches are never removed from the catalog and only move forward.
//!
//! Each patch that needs applying runs as its own [`Transaction`]. On MySQL, DDL commits
//! implicitly, so a patch interrupted there is only made safe by its own
//! [`Patch::has_been_applied`] check.

pub mod catalog;
pub mod charset;
pub mod columns;
pub mod data;
pub mod extension;
pub mod optimization;
pub mod rebuild;

pub use catalog::patch_catalog;

use crate::core::connection::SqlConnection;
use crate::core::statement::Executable;
use crate::core::transaction::{run_transaction, short_type_name};
use crate::core::{DatabaseError, Result, Transaction, TransactionContext};
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, error, info, warn};

/// One idempotent schema change
#[async_trait]
pub trait Patch: Send + Sync {
    /// Name used in logs, reports and [`DatabaseError::PatchFailed`]
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>()).to_string()
    }

    /// Whether the database already has this change; must only read
    async fn has_been_applied(&self, tx: &mut TransactionContext<'_>) -> Result<bool>;

    /// Make the change
    ///
    /// Return [`PatchOutcome::AppliedWithWarning`] for problems that should not stop startup.
    async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome>;
}

/// How a patch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    /// Already applied; nothing was done
    Skipped,
    /// Applied, but not everything could be done
    AppliedWithWarning(String),
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOutcome::Applied => write!(f, "applied"),
            PatchOutcome::Skipped => write!(f, "skipped"),
            PatchOutcome::AppliedWithWarning(reason) => write!(f, "applied with warning: {}", reason),
        }
    }
}

/// Outcome of every patch of one catalog run, in catalog order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    entries: Vec<(String, PatchOutcome)>,
}

impl PatchReport {
    fn push(&mut self, patch: String, outcome: PatchOutcome) {
        self.entries.push((patch, outcome));
    }

    pub fn entries(&self) -> &[(String, PatchOutcome)] {
        &self.entries
    }

    pub fn outcome_of(&self, patch: &str) -> Option<&PatchOutcome> {
        self.entries
            .iter()
            .find(|(name, _)| name == patch)
            .map(|(_, outcome)| outcome)
    }

    /// Names of the patches that did work in this run
    pub fn applied(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, outcome)| *outcome != PatchOutcome::Skipped)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn warnings(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(name, outcome)| match outcome {
                PatchOutcome::AppliedWithWarning(reason) => Some((name.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for PatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let applied = self.applied().len();
        writeln!(
            f,
            "{} patches checked, {} applied, {} already in place",
            self.len(),
            applied,
            self.len() - applied
        )?;
        for (name, outcome) in &self.entries {
            if *outcome != PatchOutcome::Skipped {
                writeln!(f, "  {}: {}", name, outcome)?;
            }
        }
        Ok(())
    }
}

/// Runs one patch as a transaction, with foreign-key checks off where the engine allows it
struct PatchRun<'p> {
    patch: &'p dyn Patch,
    outcome: Option<PatchOutcome>,
}

#[async_trait]
impl Transaction for PatchRun<'_> {
    fn name(&self) -> String {
        self.patch.name()
    }

    async fn perform_operations(&mut self, tx: &mut TransactionContext<'_>) -> Result<()> {
        let dialect = tx.dialect();
        if let Some(sql) = dialect.disable_foreign_keys_sql() {
            tx.execute(Executable::new(sql)).await?;
        }

        let applied = self.patch.apply_patch(tx).await;

        if let Some(sql) = dialect.enable_foreign_keys_sql() {
            let restored = tx.execute(Executable::new(sql)).await;
            if applied.is_ok() {
                restored?;
            }
        }

        self.outcome = Some(applied?);
        Ok(())
    }
}

/// Run `patches` in order on one connection
///
/// A patch whose applied check fails is assumed not applied. The first patch that fails to apply stops
/// the run with [`DatabaseError::PatchFailed`].
pub async fn apply_patches(
    conn: &mut dyn SqlConnection,
    patches: &[Box<dyn Patch>],
) -> Result<PatchReport> {
    let mut report = PatchReport::default();

    for patch in patches {
        let name = patch.name();

        let applied = {
            let mut tx = TransactionContext::new(&mut *conn);
            match patch.has_been_applied(&mut tx).await {
                Ok(applied) => applied,
                Err(e) => {
                    warn!(patch = name.as_str(), error = %e, "patch check failed, applying");
                    false
                }
            }
        };
        if applied {
            debug!(patch = name.as_str(), "already applied");
            report.push(name, PatchOutcome::Skipped);
            continue;
        }

        let mut run = PatchRun {
            patch: patch.as_ref(),
            outcome: None,
        };
        if let Err(e) = run_transaction(&mut *conn, &mut run).await {
            let source = match e {
                DatabaseError::TransactionFailed { source, .. } => *source,
                other => other,
            };
            error!(patch = name.as_str(), error = %source, "patch failed");
            return Err(DatabaseError::patch_failed(name, source));
        }

        let outcome = run.outcome.unwrap_or(PatchOutcome::Applied);
        match &outcome {
            PatchOutcome::AppliedWithWarning(reason) => warn!(
                patch = name.as_str(),
                reason = reason.as_str(),
                "patch applied with warning"
            ),
            _ => info!(patch = name.as_str(), "applied patch"),
        }
        report.push(name, outcome);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::tests::RecordingConnection;
    use std::sync::{Arc, Mutex};

    struct FixedPatch {
        applied: bool,
        outcome: std::result::Result<PatchOutcome, &'static str>,
    }

    #[async_trait]
    impl Patch for FixedPatch {
        async fn has_been_applied(&self, _tx: &mut TransactionContext<'_>) -> Result<bool> {
            Ok(self.applied)
        }

        async fn apply_patch(&self, tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
            match &self.outcome {
                Ok(outcome) => {
                    tx.execute(Executable::new("UPDATE fixed")).await?;
                    Ok(outcome.clone())
                }
                Err(sql) => {
                    tx.execute(Executable::new(*sql)).await?;
                    Ok(PatchOutcome::Applied)
                }
            }
        }
    }

    struct BrokenCheck;

    #[async_trait]
    impl Patch for BrokenCheck {
        fn name(&self) -> String {
            "BrokenCheckPatch".to_string()
        }

        async fn has_been_applied(&self, _tx: &mut TransactionContext<'_>) -> Result<bool> {
            Err(DatabaseError::query("no such table"))
        }

        async fn apply_patch(&self, _tx: &mut TransactionContext<'_>) -> Result<PatchOutcome> {
            Ok(PatchOutcome::Applied)
        }
    }

    fn connection() -> (RecordingConnection, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (RecordingConnection { log: log.clone() }, log)
    }

    #[tokio::test]
    async fn test_report_records_each_outcome() {
        let (mut conn, log) = connection();
        let patches: Vec<Box<dyn Patch>> = vec![
            Box::new(FixedPatch {
                applied: true,
                outcome: Ok(PatchOutcome::Applied),
            }),
            Box::new(FixedPatch {
                applied: false,
                outcome: Ok(PatchOutcome::AppliedWithWarning("collation".to_string())),
            }),
            Box::new(BrokenCheck),
        ];

        let report = apply_patches(&mut conn, &patches).await.unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(report.entries()[0].1, PatchOutcome::Skipped);
        assert_eq!(report.warnings(), vec![("FixedPatch", "collation")]);
        assert_eq!(report.outcome_of("BrokenCheckPatch"), Some(&PatchOutcome::Applied));
        assert_eq!(report.applied(), vec!["FixedPatch", "BrokenCheckPatch"]);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "BEGIN IMMEDIATE",
                "UPDATE fixed",
                "COMMIT",
                "BEGIN IMMEDIATE",
                "COMMIT"
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_names_patch_and_stops() {
        let (mut conn, log) = connection();
        let patches: Vec<Box<dyn Patch>> = vec![
            Box::new(FixedPatch {
                applied: false,
                outcome: Err("FAIL"),
            }),
            Box::new(BrokenCheck),
        ];

        let err = apply_patches(&mut conn, &patches).await.unwrap_err();
        match err {
            DatabaseError::PatchFailed { patch, source } => {
                assert_eq!(patch, "FixedPatch");
                assert!(matches!(*source, DatabaseError::QueryError(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("ROLLBACK"));
    }

    #[test]
    fn test_report_display() {
        let mut report = PatchReport::default();
        report.push("DiskUsagePatch".to_string(), PatchOutcome::Applied);
        report.push("VersionTableRemovalPatch".to_string(), PatchOutcome::Skipped);
        assert_eq!(
            report.to_string(),
            "2 patches checked, 1 applied, 1 already in place\n  DiskUsagePatch: applied\n"
        );
    }
}
