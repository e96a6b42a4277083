//! Output directory bookkeeping.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Create the output directory (and parents) if absent. Existing content is
/// left untouched.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))
}

/// Files directly inside a directory, keyed by path, with their mtimes.
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    files: HashMap<PathBuf, Option<SystemTime>>,
}

impl Snapshot {
    pub fn take(dir: &Path) -> Result<Self> {
        let mut files = HashMap::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
            files.insert(entry.into_path(), modified);
        }
        Ok(Self { files })
    }

    /// Files with extension `ext` that are new in `after` or were modified
    /// since `self` was taken. Sorted by path.
    pub fn produced(&self, after: &Snapshot, ext: &str) -> Vec<PathBuf> {
        let mut produced: Vec<PathBuf> = after
            .files
            .iter()
            .filter(|(path, _)| has_extension(path, ext))
            .filter(|(path, modified)| match self.files.get(*path) {
                None => true,
                Some(before) => *modified > before,
            })
            .map(|(path, _)| path.clone())
            .collect();
        produced.sort();
        produced
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
