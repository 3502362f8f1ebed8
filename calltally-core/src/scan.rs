//! Ruby source discovery with directory pruning.
//!
//! - Excluded directory names prune whole subtrees via `WalkDir::filter_entry`
//! - Files named `<exclude>.<ext>` are skipped
//! - Results are deduplicated and sorted so scans are deterministic

use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{CalltallyResult, IoResultExt};

/// Extensions always scanned.
pub const RUBY_EXTENSIONS: &[&str] = &["rb", "ru", "rake"];

pub const ERB_EXTENSION: &str = "erb";

/// Checks if a directory below the walk root should be pruned.
#[inline]
fn is_excluded_dir(entry: &walkdir::DirEntry, excludes: &HashSet<&str>) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| excludes.contains(name))
}

/// Checks if a file's basename starts with `<exclude>.`.
fn is_excluded_file(path: &Path, excludes: &HashSet<&str>) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| {
            excludes.iter().any(|ex| {
                name.strip_prefix(ex)
                    .is_some_and(|rest| rest.starts_with('.'))
            })
        })
}

fn has_source_extension(path: &Path, include_erb: bool) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| RUBY_EXTENSIONS.contains(&ext) || (include_erb && ext == ERB_EXTENSION))
}

pub fn is_erb(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ERB_EXTENSION)
}

/// Collects Ruby sources under each of `dirs` (relative to `base_dir`).
///
/// Missing dirs are skipped silently. Paths come back in lexical order.
pub fn collect_source_files(
    base_dir: &Path,
    dirs: &[String],
    excludes: &[String],
    include_erb: bool,
) -> Result<Vec<PathBuf>> {
    let excludes: HashSet<&str> = excludes.iter().map(String::as_str).collect();
    let mut files = BTreeSet::new();

    for dir in dirs {
        let root = base_dir.join(dir);
        if !root.is_dir() {
            continue;
        }

        for entry in WalkDir::new(&root)
            .into_iter()
            .filter_entry(|e| !is_excluded_dir(e, &excludes))
        {
            let entry =
                entry.with_context(|| format!("Failed to walk {}", root.display()))?;
            let path = entry.path();
            if entry.file_type().is_file()
                && has_source_extension(path, include_erb)
                && !is_excluded_file(path, &excludes)
            {
                files.insert(path.to_path_buf());
            }
        }
    }

    Ok(files.into_iter().collect())
}

/// Reads a source file, dropping invalid UTF-8 sequences.
pub fn read_source(path: &Path) -> CalltallyResult<String> {
    let bytes = fs::read(path).with_path(path)?;
    Ok(decode_lossy(bytes))
}

fn decode_lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e
            .as_bytes()
            .utf8_chunks()
            .map(|chunk| chunk.valid())
            .collect(),
    }
}
