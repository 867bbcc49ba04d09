/// Destination planning for organized files.
///
/// This module turns a destination root, a date bucket name, and a file name
/// into a collision-free destination path, creating the bucket directory on
/// demand.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Plans collision-free destination paths inside date bucket directories.
pub struct PathPlanner;

impl PathPlanner {
    /// Returns a free destination path for `file_name` under
    /// `dest_root/bucket`, creating the bucket directory if needed.
    ///
    /// Directory creation is recursive and idempotent. If the initial
    /// candidate already exists, the file name is suffixed `stem_1.ext`,
    /// `stem_2.ext`, … until an unused name is found. The suffix counter has
    /// no upper bound.
    ///
    /// # Errors
    ///
    /// Returns an error only if the bucket directory cannot be created.
    pub fn plan(dest_root: &Path, bucket: &str, file_name: &str) -> io::Result<PathBuf> {
        let bucket_dir = dest_root.join(bucket);
        fs::create_dir_all(&bucket_dir)?;

        let candidate = bucket_dir.join(file_name);
        if !candidate.exists() {
            return Ok(candidate);
        }

        let (stem, extension) = split_file_name(file_name);
        let mut counter: u64 = 1;
        loop {
            let suffixed = if extension.is_empty() {
                format!("{}_{}", stem, counter)
            } else {
                format!("{}_{}.{}", stem, counter, extension)
            };
            let candidate = bucket_dir.join(suffixed);
            if !candidate.exists() {
                return Ok(candidate);
            }
            counter += 1;
        }
    }
}

/// Splits a file name into stem and extension.
///
/// Dotfiles like `.hidden` are treated as all stem, matching how the
/// collision suffix should land (`.hidden_1`, not `_1.hidden`).
fn split_file_name(file_name: &str) -> (&str, &str) {
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, extension),
        _ => (file_name, ""),
    }
}
