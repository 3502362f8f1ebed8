//! Structured logging using **tracing**.
//!
//! Logs go to stderr as JSON so stdout stays reserved for the report.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// Call once at program start. `RUST_LOG` wins when set; otherwise only
/// errors are shown, or info and above when `verbose` is on.
pub fn init_structured_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_level(true)
        .with_target(true)
        .with_current_span(true)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "info"
    } else {
        "error"
    }
}
