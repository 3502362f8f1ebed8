//! calltally-core: method-call usage tally engine for Ruby codebases
//!
//! Walks Ruby sources, classifies the receiver of every call site and
//! counts receiver/method pairs, methods and receivers.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use calltally_core::prelude::*;
//!
//! let config = resolve_config(base, CalltallyConfig::default(), None)?;
//! let outcome = Scanner::new(base, config).scan()?;
//! write_report(&outcome.report, OutputFormat::Table, &mut std::io::stdout())?;
//! ```
//!
//! # Module Organization
//!
//! - [`syntax`]: generic syntax tree walked by the engine
//! - [`parse`]: tree-sitter-ruby parsing and lowering
//! - [`tally`]: receiver classification, filtering, aggregation, ranking
//! - [`scan`]: source file discovery
//! - [`scanner`]: scan session over a directory
//! - [`config`]: `.calltally.toml` loading and option layering
//! - [`report`]: table, JSON and CSV output
//! - [`error`]: typed error handling
//!
//! # Cargo Features
//!
//! - `erb` (default): extract Ruby from `.erb` templates

pub mod config;
pub mod error;
pub mod logging;
pub mod parse;
pub mod prelude;
pub mod report;
pub mod scan;
pub mod scanner;
pub mod syntax;
pub mod tally;

#[cfg(feature = "erb")]
pub mod erb;

// Error types
pub use error::{CalltallyError, CalltallyResult, IoResultExt};

// Configuration
pub use config::{
    load_config, resolve_config, resolve_profile, CalltallyConfig, Mode, OutputFormat, Profile,
    ReceiverType, ScanConfig,
};

// Logging
pub use logging::init_structured_logging;

// Parsing
pub use parse::{parse_ruby, MAX_FILE_SIZE, MAX_NESTING_DEPTH};
pub use syntax::{Node, ScopeKind};

// Engine
pub use tally::{
    classify, rank, tally_tree, Admitted, CallVisitor, ContextStack, FilterPipeline, Receiver,
    ReceiverCategory, Rejection, Tally, OPERATOR_METHODS,
};

// Reporting
pub use report::{write_report, NameRow, PairRow, Report, Rows};

// File scanning and sessions
pub use scan::{collect_source_files, read_source};
pub use scanner::{tally_file, tally_source, FileFailure, ScanOutcome, Scanner};

#[cfg(feature = "erb")]
pub use erb::extract_ruby;
