/// Undo functionality for reverting the most recent batch.
///
/// This module reverses an [`Operation`](crate::engine::Operation): moved
/// files are moved back to their source paths, copied files are deleted from
/// the destination, and bucket directories left completely empty by the undo
/// are removed. The undo fails closed: filesystem trouble is reported
/// through the returned report, never raised.
use crate::engine::{Operation, OperationKind};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Describes what an undo attempt did.
#[derive(Debug, Serialize)]
pub struct UndoReport {
    /// True if the undo ran to completion and the operation was cleared.
    pub undone: bool,
    /// Files moved back or copies removed.
    pub restored: usize,
    /// Empty bucket directories removed after processing.
    pub removed_dirs: usize,
    /// Non-fatal conditions, such as files missing from their recorded
    /// destination.
    pub warnings: Vec<String>,
    /// Set when the undo aborted partway; the operation is retained for a
    /// retry.
    pub failure: Option<String>,
}

impl UndoReport {
    fn new() -> Self {
        Self {
            undone: false,
            restored: 0,
            removed_dirs: 0,
            warnings: Vec::new(),
            failure: None,
        }
    }

    /// Report for an undo request with no recorded operation.
    pub fn nothing_to_undo() -> Self {
        let mut report = Self::new();
        report.failure = Some("No operation to undo".to_string());
        report
    }

    fn fail(mut self, message: String) -> Self {
        self.failure = Some(message);
        self
    }
}

/// Reverses recorded operations.
pub struct UndoManager;

impl UndoManager {
    /// Undoes one recorded operation.
    ///
    /// Entries whose destination file no longer exists produce a warning and
    /// are skipped; the rest of the manifest is still processed. A
    /// filesystem failure while restoring aborts the undo with
    /// `undone == false`, leaving already-restored files in place so the
    /// caller can retry.
    ///
    /// After all entries are processed, every distinct bucket directory
    /// touched by the undo is removed if and only if it is now completely
    /// empty. Only the directories directly recorded in the manifest are
    /// checked; there is no recursion upward.
    pub fn undo(operation: &Operation) -> UndoReport {
        let mut report = UndoReport::new();
        let mut cleanup_candidates: BTreeSet<PathBuf> = BTreeSet::new();

        for entry in &operation.entries {
            if !entry.dest_path.exists() {
                report.warnings.push(format!(
                    "File not found at recorded destination: {}",
                    entry.dest_path.display()
                ));
                continue;
            }

            let result = match operation.kind {
                OperationKind::Move => fs::rename(&entry.dest_path, &entry.source_path),
                OperationKind::Copy => fs::remove_file(&entry.dest_path),
            };

            match result {
                Ok(()) => {
                    report.restored += 1;
                    if let Some(parent) = entry.dest_path.parent() {
                        cleanup_candidates.insert(parent.to_path_buf());
                    }
                }
                Err(e) => {
                    return report.fail(format!(
                        "Failed to restore {}: {}",
                        entry.dest_path.display(),
                        e
                    ));
                }
            }
        }

        report.removed_dirs = Self::remove_empty_dirs(&cleanup_candidates, &mut report.warnings);
        report.undone = true;
        report
    }

    /// Removes each candidate directory that is now completely empty.
    ///
    /// Non-empty directories are kept. Errors while checking or removing a
    /// directory degrade to warnings; they never fail the undo.
    fn remove_empty_dirs(candidates: &BTreeSet<PathBuf>, warnings: &mut Vec<String>) -> usize {
        let mut removed = 0;
        for dir in candidates {
            if !dir.is_dir() {
                continue;
            }
            match Self::is_empty_dir(dir) {
                Ok(true) => match fs::remove_dir(dir) {
                    Ok(()) => removed += 1,
                    Err(e) => warnings.push(format!(
                        "Could not remove empty directory {}: {}",
                        dir.display(),
                        e
                    )),
                },
                Ok(false) => {}
                Err(e) => warnings.push(format!(
                    "Could not check directory {}: {}",
                    dir.display(),
                    e
                )),
            }
        }
        removed
    }

    fn is_empty_dir(dir: &Path) -> std::io::Result<bool> {
        Ok(fs::read_dir(dir)?.next().is_none())
    }
}
