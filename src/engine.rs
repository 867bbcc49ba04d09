/// Batched copy/move execution and operation history.
///
/// This module provides the sorting engine: it enumerates the source
/// directory, resolves a date for each file, plans a collision-free
/// destination, performs the copy or move, and records a manifest of what it
/// did so the most recent batch can be undone.
use crate::date_resolver::{DateFormat, DateResolver, DateSource};
use crate::path_planner::PathPlanner;
use crate::undo::{UndoManager, UndoReport};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Whether a batch duplicates files or relocates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationKind {
    Copy,
    Move,
}

impl OperationKind {
    /// Returns the verb for progress and summary messages.
    pub fn verb(&self) -> &'static str {
        match self {
            OperationKind::Copy => "copy",
            OperationKind::Move => "move",
        }
    }

    /// Returns the past-tense verb.
    pub fn verb_past(&self) -> &'static str {
        match self {
            OperationKind::Copy => "copied",
            OperationKind::Move => "moved",
        }
    }
}

/// Manifest record for one successfully processed file.
///
/// Immutable once created; owned by the [`Operation`] it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    /// The file's name in the source directory.
    pub name: String,
    /// Where the file was before the batch ran.
    pub source_path: PathBuf,
    /// Where the file (or its copy) ended up.
    pub dest_path: PathBuf,
    /// The date bucket directory name the file was assigned.
    pub date_bucket: String,
    /// Which probe produced the date.
    pub date_source: DateSource,
}

/// The record of one completed batch, used as the sole input to undo.
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    /// Manifest entries in processing order. Never empty: an operation is
    /// only built when at least one file succeeded.
    pub entries: Vec<FileEntry>,
    pub timestamp: DateTime<Local>,
}

/// Bounded in-memory record of past operations.
///
/// Insertion order, oldest evicted past capacity. Undo never consults it:
/// only the engine's last operation is ever acted upon. The history is
/// retained for potential multi-undo later.
#[derive(Debug, Default)]
pub struct OperationLog {
    operations: VecDeque<Operation>,
}

impl OperationLog {
    /// Maximum number of operations retained.
    pub const CAPACITY: usize = 10;

    /// Appends an operation, evicting the oldest when over capacity.
    pub fn record(&mut self, operation: Operation) {
        self.operations.push_back(operation);
        if self.operations.len() > Self::CAPACITY {
            self.operations.pop_front();
        }
    }

    /// Returns the number of recorded operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// A per-file failure recorded during a batch.
///
/// These never abort the batch; they accumulate in the [`BatchReport`].
#[derive(Debug, Clone, Serialize)]
pub struct FileError {
    /// Name of the file that failed.
    pub file_name: String,
    /// What went wrong.
    pub message: String,
}

impl FileError {
    fn new(file_name: &str, message: impl Into<String>) -> Self {
        Self {
            file_name: file_name.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file_name, self.message)
    }
}

/// Result of one batch: everything that succeeded and everything that
/// failed. Both lists empty is a valid outcome (empty source directory).
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub entries: Vec<FileEntry>,
    pub errors: Vec<FileError>,
}

/// Preview row: where a file would go, without touching the filesystem.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedFile {
    pub name: String,
    pub date_bucket: String,
    pub date_source: DateSource,
}

/// Fatal errors that abort a whole engine call.
///
/// Per-file failures are not errors at this level; they are collected in the
/// [`BatchReport`] and the batch continues.
#[derive(Debug)]
pub enum SortError {
    /// The source directory is missing or cannot be listed.
    SourceUnavailable { path: PathBuf, source: io::Error },
}

impl std::fmt::Display for SortError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceUnavailable { path, source } => {
                write!(f, "Source directory unavailable {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SortError {}

/// Result type for engine calls.
pub type SortResult<T> = Result<T, SortError>;

/// The file-sorting engine.
///
/// Each engine value owns its configuration and its own operation history,
/// so multiple independent engines can coexist in one process. All state is
/// in-memory for the process lifetime: undo is only possible within the same
/// run that performed the operation.
///
/// Execution is strictly sequential and synchronous. The engine is not
/// designed for concurrent invocation; callers must issue at most one
/// `copy`/`move_files`/`undo_last` call at a time. A host embedding the
/// engine in a responsive surface should run each batch on a worker and
/// marshal only the final report back.
pub struct SortEngine {
    source_dir: PathBuf,
    dest_root: PathBuf,
    resolver: DateResolver,
    last_operation: Option<Operation>,
    history: OperationLog,
}

impl SortEngine {
    /// Creates an engine for a source directory, destination root, and date
    /// format.
    pub fn new(
        source_dir: impl Into<PathBuf>,
        dest_root: impl Into<PathBuf>,
        format: DateFormat,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            dest_root: dest_root.into(),
            resolver: DateResolver::new(format),
            last_operation: None,
            history: OperationLog::default(),
        }
    }

    /// Copies every file in the source directory into its date bucket.
    ///
    /// Source files are never touched. See [`SortEngine::move_files`] for
    /// the shared batch behavior.
    pub fn copy(&mut self) -> SortResult<BatchReport> {
        self.execute(OperationKind::Copy)
    }

    /// Moves every file in the source directory into its date bucket.
    ///
    /// Files are processed one at a time in name order. A file that fails to
    /// transfer is recorded in the report's error list and the batch
    /// continues; only an unlistable source directory aborts the call. If at
    /// least one file succeeded, the batch is recorded as the last operation
    /// and becomes undoable.
    pub fn move_files(&mut self) -> SortResult<BatchReport> {
        self.execute(OperationKind::Move)
    }

    /// Resolves dates for the current source listing without copying or
    /// moving anything.
    pub fn preview(&self) -> SortResult<Vec<PlannedFile>> {
        let files = self.list_source_files()?;
        Ok(files
            .into_iter()
            .map(|(name, path)| {
                let (date_bucket, date_source) = self.resolver.bucket_for(&path);
                PlannedFile {
                    name,
                    date_bucket,
                    date_source,
                }
            })
            .collect())
    }

    /// Undoes the most recent batch.
    ///
    /// Returns a report with `undone == false` if there is no operation to
    /// undo or the undo failed partway. On failure the last operation is
    /// kept so the undo can be retried; on success it is cleared.
    pub fn undo_last(&mut self) -> UndoReport {
        let Some(operation) = self.last_operation.take() else {
            return UndoReport::nothing_to_undo();
        };

        let report = UndoManager::undo(&operation);
        if !report.undone {
            self.last_operation = Some(operation);
        }
        report
    }

    /// Returns the operation that would be undone next, if any.
    pub fn last_operation(&self) -> Option<&Operation> {
        self.last_operation.as_ref()
    }

    /// Returns how many operations the bounded history currently holds.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Returns the active date format.
    pub fn format(&self) -> DateFormat {
        self.resolver.format()
    }

    fn execute(&mut self, kind: OperationKind) -> SortResult<BatchReport> {
        let files = self.list_source_files()?;

        let mut entries: Vec<FileEntry> = Vec::new();
        let mut errors: Vec<FileError> = Vec::new();

        for (name, source_path) in files {
            let (date_bucket, date_source) = self.resolver.bucket_for(&source_path);

            let dest_path = match PathPlanner::plan(&self.dest_root, &date_bucket, &name) {
                Ok(path) => path,
                Err(e) => {
                    errors.push(FileError::new(
                        &name,
                        format!("failed to prepare destination: {}", e),
                    ));
                    continue;
                }
            };

            // The listing is a snapshot; the file may have vanished since.
            if !source_path.exists() {
                errors.push(FileError::new(&name, "source file not found"));
                continue;
            }

            if let Err(e) = Self::transfer(kind, &source_path, &dest_path) {
                errors.push(FileError::new(&name, format!("failed to {}: {}", kind.verb(), e)));
                continue;
            }

            entries.push(FileEntry {
                name,
                source_path,
                dest_path,
                date_bucket,
                date_source,
            });
        }

        if !entries.is_empty() {
            let operation = Operation {
                kind,
                entries: entries.clone(),
                timestamp: Local::now(),
            };
            self.history.record(operation.clone());
            self.last_operation = Some(operation);
        }

        Ok(BatchReport { entries, errors })
    }

    /// Lists the source directory's regular files, non-recursively, sorted
    /// by name. Subdirectories are ignored.
    fn list_source_files(&self) -> SortResult<Vec<(String, PathBuf)>> {
        let reader = fs::read_dir(&self.source_dir).map_err(|e| SortError::SourceUnavailable {
            path: self.source_dir.clone(),
            source: e,
        })?;

        let mut files = Vec::new();
        for entry in reader {
            let entry = entry.map_err(|e| SortError::SourceUnavailable {
                path: self.source_dir.clone(),
                source: e,
            })?;
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_file() {
                let name = entry.file_name().to_string_lossy().to_string();
                files.push((name, entry.path()));
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Applies the source's modification time to the destination copy.
    ///
    /// Best effort: a timestamp that cannot be read or applied does not fail
    /// the transfer that is already complete byte-wise.
    fn copy_mtime(source: &Path, dest: &Path) {
        if let Ok(modified) = fs::metadata(source).and_then(|m| m.modified())
            && let Ok(dest_file) = fs::File::options().write(true).open(dest)
        {
            let _ = dest_file.set_modified(modified);
        }
    }

    fn transfer(kind: OperationKind, source: &Path, dest: &Path) -> io::Result<()> {
        match kind {
            OperationKind::Copy => {
                fs::copy(source, dest)?;
                Ok(())
            }
            OperationKind::Move => match fs::rename(source, dest) {
                Ok(()) => Ok(()),
                // Rename fails across filesystems; fall back to copy+remove,
                // carrying the file's modification time along.
                Err(_) => {
                    fs::copy(source, dest)?;
                    Self::copy_mtime(source, dest);
                    fs::remove_file(source)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn engine_for(source: &Path, dest: &Path) -> SortEngine {
        SortEngine::new(source, dest, DateFormat::YearMonthDay)
    }

    #[test]
    fn test_copy_leaves_source_untouched() {
        let source = TempDir::new().expect("Failed to create temp directory");
        let dest = TempDir::new().expect("Failed to create temp directory");
        fs::write(source.path().join("a.txt"), "alpha").expect("Failed to write");
        fs::write(source.path().join("b.txt"), "beta").expect("Failed to write");

        let mut engine = engine_for(source.path(), dest.path());
        let report = engine.copy().expect("Copy should succeed");

        assert_eq!(report.entries.len(), 2);
        assert!(report.errors.is_empty());
        assert!(source.path().join("a.txt").exists());
        assert!(source.path().join("b.txt").exists());
        for entry in &report.entries {
            assert!(entry.dest_path.exists());
        }
    }

    #[test]
    fn test_move_empties_source() {
        let source = TempDir::new().expect("Failed to create temp directory");
        let dest = TempDir::new().expect("Failed to create temp directory");
        fs::write(source.path().join("a.txt"), "alpha").expect("Failed to write");

        let mut engine = engine_for(source.path(), dest.path());
        let report = engine.move_files().expect("Move should succeed");

        assert_eq!(report.entries.len(), 1);
        assert!(!source.path().join("a.txt").exists());
        assert!(report.entries[0].dest_path.exists());
    }

    #[test]
    fn test_copy_mtime_carries_timestamp() {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let source = temp.path().join("src.txt");
        let dest = temp.path().join("dst.txt");
        fs::write(&source, "data").expect("Failed to write");
        fs::write(&dest, "data").expect("Failed to write");

        let pinned = std::time::SystemTime::UNIX_EPOCH
            + std::time::Duration::from_secs(1_700_000_000);
        fs::File::options()
            .write(true)
            .open(&source)
            .expect("Failed to open source")
            .set_modified(pinned)
            .expect("Failed to set modification time");

        SortEngine::copy_mtime(&source, &dest);

        let dest_mtime = fs::metadata(&dest)
            .expect("Failed to stat destination")
            .modified()
            .expect("Failed to read modification time");
        assert_eq!(dest_mtime, pinned);
    }

    #[test]
    fn test_empty_source_is_not_an_error() {
        let source = TempDir::new().expect("Failed to create temp directory");
        let dest = TempDir::new().expect("Failed to create temp directory");

        let mut engine = engine_for(source.path(), dest.path());
        let report = engine.copy().expect("Copy should succeed");

        assert!(report.entries.is_empty());
        assert!(report.errors.is_empty());
        assert!(engine.last_operation().is_none());
    }

    #[test]
    fn test_missing_source_directory_is_fatal() {
        let dest = TempDir::new().expect("Failed to create temp directory");
        let mut engine = engine_for(Path::new("/nonexistent/source/dir"), dest.path());

        let result = engine.copy();
        assert!(matches!(result, Err(SortError::SourceUnavailable { .. })));
    }

    #[test]
    fn test_subdirectories_in_source_are_ignored() {
        let source = TempDir::new().expect("Failed to create temp directory");
        let dest = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(source.path().join("nested")).expect("Failed to create dir");
        fs::write(source.path().join("a.txt"), "alpha").expect("Failed to write");

        let mut engine = engine_for(source.path(), dest.path());
        let report = engine.copy().expect("Copy should succeed");

        assert_eq!(report.entries.len(), 1);
        assert!(source.path().join("nested").exists());
    }

    #[test]
    fn test_operation_recorded_only_on_success() {
        let source = TempDir::new().expect("Failed to create temp directory");
        let dest = TempDir::new().expect("Failed to create temp directory");
        fs::write(source.path().join("a.txt"), "alpha").expect("Failed to write");

        let mut engine = engine_for(source.path(), dest.path());
        assert!(engine.last_operation().is_none());
        assert_eq!(engine.history_len(), 0);

        engine.copy().expect("Copy should succeed");
        assert!(engine.last_operation().is_some());
        assert_eq!(engine.history_len(), 1);
    }

    #[test]
    fn test_history_evicts_oldest_past_capacity() {
        let source = TempDir::new().expect("Failed to create temp directory");
        let dest = TempDir::new().expect("Failed to create temp directory");

        let mut engine = engine_for(source.path(), dest.path());
        for i in 0..(OperationLog::CAPACITY + 3) {
            let name = format!("file_{}.txt", i);
            fs::write(source.path().join(&name), "data").expect("Failed to write");
            let report = engine.move_files().expect("Move should succeed");
            assert_eq!(report.entries.len(), 1);
        }

        assert_eq!(engine.history_len(), OperationLog::CAPACITY);
    }

    #[test]
    fn test_preview_does_not_touch_filesystem() {
        let source = TempDir::new().expect("Failed to create temp directory");
        let dest = TempDir::new().expect("Failed to create temp directory");
        fs::write(source.path().join("a.txt"), "alpha").expect("Failed to write");

        let engine = engine_for(source.path(), dest.path());
        let planned = engine.preview().expect("Preview should succeed");

        assert_eq!(planned.len(), 1);
        assert!(source.path().join("a.txt").exists());
        assert_eq!(fs::read_dir(dest.path()).expect("read_dir").count(), 0);
    }

    #[test]
    fn test_new_batch_supersedes_last_operation() {
        let source = TempDir::new().expect("Failed to create temp directory");
        let dest = TempDir::new().expect("Failed to create temp directory");
        fs::write(source.path().join("first.txt"), "1").expect("Failed to write");

        let mut engine = engine_for(source.path(), dest.path());
        engine.move_files().expect("Move should succeed");
        let first = engine.last_operation().expect("should be recorded").entries[0]
            .name
            .clone();

        fs::write(source.path().join("second.txt"), "2").expect("Failed to write");
        engine.move_files().expect("Move should succeed");
        let second = engine.last_operation().expect("should be recorded").entries[0]
            .name
            .clone();

        assert_eq!(first, "first.txt");
        assert_eq!(second, "second.txt");
    }
}
