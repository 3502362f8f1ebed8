//! calltally CLI - rank method-call usage patterns across a Ruby codebase.
//!
//! Features:
//! - Receiver classification (constants, variables, self, call results)
//! - Pairs, methods or receivers views with top-N ranking
//! - `.calltally.toml` project config with CLI overrides
//! - Rails profile auto-detection from the Gemfile
//! - Table, JSON and CSV output

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use calltally_core::{
    init_structured_logging, resolve_config, write_report, CalltallyConfig, Mode, OutputFormat,
    Profile, ReceiverType, ScanConfig, Scanner,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Rank method-call usage patterns in Ruby code",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    scan: ScanArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a directory (the default action)
    Scan(ScanArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
    /// Base directory of the Ruby project
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Project profile: auto, rails or default
    #[arg(long)]
    profile: Option<Profile>,

    /// Directories to scan, relative to PATH
    #[arg(short = 'd', long, value_delimiter = ',')]
    dirs: Option<Vec<String>>,

    /// Extra directory names to exclude
    #[arg(short = 'x', long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,

    /// Number of rows to show
    #[arg(short = 'n', long)]
    top: Option<usize>,

    /// Log scan targets to stderr
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Include .erb templates
    #[arg(long)]
    erb: bool,

    /// Aggregate view: pairs, methods or receivers
    #[arg(long)]
    mode: Option<Mode>,

    /// Only count these receiver identities
    #[arg(long, value_delimiter = ',')]
    receivers: Option<Vec<String>>,

    /// Only count these method names
    #[arg(long, value_delimiter = ',')]
    methods: Option<Vec<String>>,

    /// Attribute receiverless calls to the enclosing class (e.g. `Book#`)
    #[arg(long)]
    include_nil_receiver: bool,

    /// Keep variable names in receiver identities (e.g. `(var:user)`)
    #[arg(long)]
    split_variables: bool,

    /// Only count calls on local variables
    #[arg(long)]
    only_locals: bool,

    /// Only count calls on instance variables
    #[arg(long)]
    only_ivars: bool,

    /// Only count calls on class variables
    #[arg(long)]
    only_cvars: bool,

    /// Only count calls on global variables
    #[arg(long)]
    only_gvars: bool,

    /// Only count calls on constants
    #[arg(long)]
    only_constants: bool,

    /// Only count calls on the result of another call
    #[arg(long)]
    only_results: bool,

    /// Skip operator methods like `==`, `[]` and `<<` (default)
    #[arg(long, overrides_with = "no_skip_operators")]
    skip_operators: bool,

    /// Count operator methods too
    #[arg(long, overrides_with = "skip_operators")]
    no_skip_operators: bool,

    /// Output format: table, json or csv
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Write the report to a file instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Extra config file layered over .calltally.toml
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ScanArgs {
    /// Receiver-type allow-list built from the `--only-*` flags.
    fn receiver_types(&self) -> Option<Vec<ReceiverType>> {
        let types: Vec<ReceiverType> = [
            (self.only_locals, ReceiverType::Locals),
            (self.only_ivars, ReceiverType::Ivars),
            (self.only_cvars, ReceiverType::Cvars),
            (self.only_gvars, ReceiverType::Gvars),
            (self.only_constants, ReceiverType::Constants),
            (self.only_results, ReceiverType::Results),
        ]
        .into_iter()
        .filter_map(|(on, t)| on.then_some(t))
        .collect();

        if types.is_empty() {
            None
        } else {
            Some(types)
        }
    }

    fn skip_operators(&self) -> Option<bool> {
        if self.no_skip_operators {
            Some(false)
        } else if self.skip_operators {
            Some(true)
        } else {
            None
        }
    }

    /// CLI layer of the configuration. Unset flags stay `None` so config
    /// files can supply them.
    fn to_config(&self) -> CalltallyConfig {
        CalltallyConfig {
            profile: self.profile,
            dirs: self.dirs.clone(),
            exclude: self.exclude.clone(),
            top: self.top,
            verbose: self.verbose.then_some(true),
            mode: self.mode,
            receivers: self.receivers.clone(),
            methods: self.methods.clone(),
            include_nil_receiver: self.include_nil_receiver.then_some(true),
            split_variables: self.split_variables.then_some(true),
            receiver_types: self.receiver_types(),
            skip_operators: self.skip_operators(),
            format: self.format,
            output: self.output.clone(),
            include_erb: self.erb.then_some(true),
        }
    }
}

impl Cli {
    fn scan_args(self) -> ScanArgs {
        match self.command {
            Some(Command::Scan(args)) => args,
            None => self.scan,
        }
    }
}

/// Validates the report output path.
///
/// Rejects paths with null bytes and existing directories.
fn validate_output_path(path: &Path) -> Result<PathBuf> {
    if path.to_string_lossy().contains('\0') {
        return Err(anyhow!("Output path contains null bytes"));
    }
    if path.is_dir() {
        return Err(anyhow!("Output path is a directory: {}", path.display()));
    }
    Ok(path.to_path_buf())
}

fn resolve(args: &ScanArgs) -> Result<ScanConfig> {
    let base_dir = &args.path;
    if !base_dir.is_dir() {
        return Err(anyhow!("Not a directory: {}", base_dir.display()));
    }
    resolve_config(base_dir, args.to_config(), args.config.as_deref())
        .with_context(|| format!("Failed to load configuration for {}", base_dir.display()))
}

fn run(base_dir: &Path, config: ScanConfig) -> Result<()> {
    let format = config.format;
    let output = config
        .output
        .as_deref()
        .map(validate_output_path)
        .transpose()?;

    let outcome = Scanner::new(base_dir, config).scan()?;

    for failure in &outcome.failures {
        eprintln!("Error: {}: {}", failure.path.display(), failure.error.message());
    }

    match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_report(&outcome.report, format, &mut writer)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_report(&outcome.report, format, &mut writer)?;
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] calltally internal error: {}", info);
        eprintln!("[PANIC] The process will exit with code 101.");
    }));

    let args = Cli::parse().scan_args();
    let config = resolve(&args)?;
    init_structured_logging(config.verbose);
    run(&args.path, config)
}
