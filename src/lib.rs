//! datetidy - sort files into date-named subdirectories
//!
//! This library resolves an organizational date for each file in a source
//! directory (EXIF capture date for images, modification time otherwise),
//! plans collision-free destinations inside date bucket directories, runs
//! copy or move batches that tolerate per-file failures, and can undo the
//! most recent batch within the same process run.

pub mod cli;
pub mod date_resolver;
pub mod engine;
pub mod output;
pub mod path_planner;
pub mod undo;

pub use date_resolver::{DateFormat, DateResolver, DateSource};
pub use engine::{
    BatchReport, FileEntry, FileError, Operation, OperationKind, OperationLog, PlannedFile,
    SortEngine, SortError, SortResult,
};
pub use path_planner::PathPlanner;
pub use undo::{UndoManager, UndoReport};

pub use cli::{Cli, run};
