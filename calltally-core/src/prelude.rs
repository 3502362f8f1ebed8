//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use calltally_core::prelude::*;
//! ```

// Errors
pub use crate::error::{CalltallyError, CalltallyResult};

// Configuration
pub use crate::config::{resolve_config, CalltallyConfig, Mode, OutputFormat, ScanConfig};

// Sessions
pub use crate::scanner::{tally_source, ScanOutcome, Scanner};

// Engine
pub use crate::tally::{rank, Tally};

// Reporting
pub use crate::report::{write_report, Report, Rows};
