//! Scan session: collect, tally in parallel, merge, rank.

use anyhow::Result;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[cfg(feature = "erb")]
use crate::erb;
use crate::config::ScanConfig;
use crate::error::{CalltallyError, CalltallyResult};
use crate::parse::parse_ruby;
use crate::report::Report;
use crate::scan::{collect_source_files, read_source};
use crate::tally::{rank, tally_tree, Tally};

/// Number of scan targets listed in the log.
const LOGGED_TARGETS: usize = 10;

/// A file that could not be read or parsed. It contributes nothing.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: CalltallyError,
}

/// Result of a scan session.
#[derive(Debug)]
pub struct ScanOutcome {
    pub report: Report,
    pub tally: Tally,
    pub files_scanned: usize,
    pub failures: Vec<FileFailure>,
}

/// One scan session over a base directory.
pub struct Scanner {
    base_dir: PathBuf,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(base_dir: impl Into<PathBuf>, config: ScanConfig) -> Self {
        Self {
            base_dir: base_dir.into(),
            config,
        }
    }

    /// Runs the session. Per-file failures are collected, not returned.
    pub fn scan(&self) -> Result<ScanOutcome> {
        let include_erb = cfg!(feature = "erb") && self.config.include_erb;
        let files = collect_source_files(
            &self.base_dir,
            &self.config.dirs,
            &self.config.exclude,
            include_erb,
        )?;

        info!("Scan targets: {} files", files.len());
        for file in files.iter().take(LOGGED_TARGETS) {
            info!(" - {}", file.display());
        }

        let per_file: Vec<(PathBuf, CalltallyResult<Tally>)> = files
            .par_iter()
            .map(|path| (path.clone(), tally_file(path, &self.config)))
            .collect();

        let mut tally = Tally::new();
        let mut failures = Vec::new();
        for (path, result) in per_file {
            match result {
                Ok(file_tally) => tally.merge(file_tally),
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "file skipped");
                    failures.push(FileFailure { path, error });
                }
            }
        }

        let report = rank(&tally, self.config.mode, self.config.top);
        Ok(ScanOutcome {
            report,
            tally,
            files_scanned: files.len(),
            failures,
        })
    }
}

/// Reads, parses and walks one file.
pub fn tally_file(path: &Path, config: &ScanConfig) -> CalltallyResult<Tally> {
    let source = read_source(path)?;

    #[cfg(feature = "erb")]
    let source = if crate::scan::is_erb(path) {
        erb::extract_ruby(&source)
    } else {
        source
    };

    let tree = parse_ruby(path, &source)?;
    Ok(tally_tree(&tree, config))
}

/// Runs the per-file pipeline on in-memory Ruby source.
pub fn tally_source(source: &str, config: &ScanConfig) -> CalltallyResult<Tally> {
    let tree = parse_ruby(Path::new("(source)"), source)?;
    Ok(tally_tree(&tree, config))
}
