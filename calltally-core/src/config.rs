//! Configuration loading from .calltally.toml and layering with CLI options.
//!
//! Precedence, lowest first: built-in defaults, `<base>/.calltally.toml`,
//! an explicit `--config` file, then command-line values.

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{CalltallyError, CalltallyResult, IoResultExt};

/// Name of the per-project config file looked up in the base directory.
pub const CONFIG_FILE_NAME: &str = ".calltally.toml";

/// Path fragments skipped by default.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "spec",
    "test",
    "vendor",
    "node_modules",
    "tmp",
    "log",
    ".git",
    ".bundle",
];

/// Directories scanned under the rails profile when `dirs` is left at its default.
pub const RAILS_DIRS: &[&str] = &["app", "lib", "config"];

pub const DEFAULT_TOP: usize = 100;

/// Which aggregate view is projected into the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Mode {
    /// Receiver + method pairs
    #[default]
    Pairs,
    /// Method names only
    Methods,
    /// Receiver identities only
    Receivers,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pairs => "pairs",
            Self::Methods => "methods",
            Self::Receivers => "receivers",
        }
    }
}

impl FromStr for Mode {
    type Err = CalltallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pairs" => Ok(Self::Pairs),
            "methods" => Ok(Self::Methods),
            "receivers" => Ok(Self::Receivers),
            _ => Err(CalltallyError::invalid_argument(format!("Unknown mode: {}", s))),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = CalltallyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report rendering format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = CalltallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(CalltallyError::invalid_argument(format!("Unknown format: {}", s))),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = CalltallyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Project profile. `Auto` is resolved against the Gemfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Profile {
    #[default]
    Auto,
    Rails,
    Default,
}

impl FromStr for Profile {
    type Err = CalltallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "rails" => Ok(Self::Rails),
            "default" => Ok(Self::Default),
            _ => Err(CalltallyError::invalid_argument(format!("Unknown profile: {}", s))),
        }
    }
}

impl TryFrom<String> for Profile {
    type Error = CalltallyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Receiver-type labels accepted by the receiver-type allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ReceiverType {
    Locals,
    Ivars,
    Cvars,
    Gvars,
    Results,
    Constants,
    /// No CLI flag yet; only reachable through a config file.
    SelfRef,
    /// Accepted but never matched: receiverless calls are filtered before
    /// their identity is synthesized.
    Implicit,
}

impl ReceiverType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locals => "locals",
            Self::Ivars => "ivars",
            Self::Cvars => "cvars",
            Self::Gvars => "gvars",
            Self::Results => "results",
            Self::Constants => "constants",
            Self::SelfRef => "self",
            Self::Implicit => "implicit",
        }
    }
}

impl FromStr for ReceiverType {
    type Err = CalltallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "locals" => Ok(Self::Locals),
            "ivars" => Ok(Self::Ivars),
            "cvars" => Ok(Self::Cvars),
            "gvars" => Ok(Self::Gvars),
            "results" => Ok(Self::Results),
            "constants" => Ok(Self::Constants),
            "self" => Ok(Self::SelfRef),
            "implicit" => Ok(Self::Implicit),
            _ => Err(CalltallyError::invalid_argument(format!(
                "Unknown receiver type: {}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for ReceiverType {
    type Error = CalltallyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One configuration layer. Every field is optional; unset fields fall
/// through to the layer below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalltallyConfig {
    pub profile: Option<Profile>,
    pub dirs: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub top: Option<usize>,
    pub verbose: Option<bool>,
    pub mode: Option<Mode>,
    pub receivers: Option<Vec<String>>,
    pub methods: Option<Vec<String>>,
    pub include_nil_receiver: Option<bool>,
    pub split_variables: Option<bool>,
    pub receiver_types: Option<Vec<ReceiverType>>,
    pub skip_operators: Option<bool>,
    pub format: Option<OutputFormat>,
    pub output: Option<PathBuf>,
    pub include_erb: Option<bool>,
}

impl CalltallyConfig {
    /// Reads and parses a TOML config file.
    pub fn from_file(path: &Path) -> CalltallyResult<Self> {
        let content = fs::read_to_string(path).with_path(path)?;
        toml::from_str(&content).map_err(|e| CalltallyError::config(path, e.to_string()))
    }

    /// Overlays `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: CalltallyConfig) -> CalltallyConfig {
        CalltallyConfig {
            profile: overrides.profile.or(self.profile),
            dirs: overrides.dirs.or(self.dirs),
            exclude: overrides.exclude.or(self.exclude),
            top: overrides.top.or(self.top),
            verbose: overrides.verbose.or(self.verbose),
            mode: overrides.mode.or(self.mode),
            receivers: overrides.receivers.or(self.receivers),
            methods: overrides.methods.or(self.methods),
            include_nil_receiver: overrides.include_nil_receiver.or(self.include_nil_receiver),
            split_variables: overrides.split_variables.or(self.split_variables),
            receiver_types: overrides.receiver_types.or(self.receiver_types),
            skip_operators: overrides.skip_operators.or(self.skip_operators),
            format: overrides.format.or(self.format),
            output: overrides.output.or(self.output),
            include_erb: overrides.include_erb.or(self.include_erb),
        }
    }
}

/// Fully resolved configuration for one scan session.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Resolved profile (never `Auto`)
    pub profile: Profile,
    pub dirs: Vec<String>,
    pub exclude: Vec<String>,
    pub top: usize,
    pub verbose: bool,
    pub mode: Mode,
    /// Receiver identity allow-list; `None` means unfiltered
    pub receivers: Option<HashSet<String>>,
    /// Method name allow-list; `None` means unfiltered
    pub methods: Option<HashSet<String>>,
    pub include_nil_receiver: bool,
    pub split_variables: bool,
    /// Receiver-type allow-list; `None` or empty means unfiltered
    pub receiver_types: Option<HashSet<ReceiverType>>,
    pub skip_operators: bool,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub include_erb: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            profile: Profile::Default,
            dirs: vec![".".to_string()],
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            top: DEFAULT_TOP,
            verbose: false,
            mode: Mode::Pairs,
            receivers: None,
            methods: None,
            include_nil_receiver: false,
            split_variables: false,
            receiver_types: None,
            skip_operators: true,
            format: OutputFormat::Table,
            output: None,
            include_erb: false,
        }
    }
}

/// Loads `<root>/.calltally.toml` if it exists.
pub fn load_config(root: &Path) -> CalltallyResult<Option<CalltallyConfig>> {
    let path = root.join(CONFIG_FILE_NAME);
    if !path.is_file() {
        return Ok(None);
    }
    CalltallyConfig::from_file(&path).map(Some)
}

/// Resolves the final scan configuration.
///
/// `cli.exclude` is appended to the configured exclude list instead of
/// replacing it. An explicit `config_override` must exist.
pub fn resolve_config(
    base_dir: &Path,
    cli: CalltallyConfig,
    config_override: Option<&Path>,
) -> CalltallyResult<ScanConfig> {
    let mut layered = load_config(base_dir)?.unwrap_or_default();

    if let Some(path) = config_override {
        if !path.is_file() {
            return Err(CalltallyError::config(path, "config file not found"));
        }
        layered = layered.merge(CalltallyConfig::from_file(path)?);
    }

    let mut cli = cli;
    let extra_excludes = cli.exclude.take().unwrap_or_default();
    let merged = layered.merge(cli);

    let defaults = ScanConfig::default();
    let profile = resolve_profile(base_dir, merged.profile.unwrap_or_default());

    let mut dirs = merged.dirs.unwrap_or(defaults.dirs);
    if profile == Profile::Rails && dirs == [".".to_string()] {
        dirs = RAILS_DIRS.iter().map(|s| s.to_string()).collect();
    }

    let mut exclude = merged.exclude.unwrap_or(defaults.exclude);
    for ex in extra_excludes {
        if !exclude.contains(&ex) {
            exclude.push(ex);
        }
    }

    Ok(ScanConfig {
        profile,
        dirs,
        exclude,
        top: merged.top.unwrap_or(defaults.top),
        verbose: merged.verbose.unwrap_or(defaults.verbose),
        mode: merged.mode.unwrap_or(defaults.mode),
        receivers: merged.receivers.map(|v| v.into_iter().collect()),
        methods: merged.methods.map(|v| v.into_iter().collect()),
        include_nil_receiver: merged
            .include_nil_receiver
            .unwrap_or(defaults.include_nil_receiver),
        split_variables: merged.split_variables.unwrap_or(defaults.split_variables),
        receiver_types: merged.receiver_types.map(|v| v.into_iter().collect()),
        skip_operators: merged.skip_operators.unwrap_or(defaults.skip_operators),
        format: merged.format.unwrap_or(defaults.format),
        output: merged.output,
        include_erb: merged.include_erb.unwrap_or(defaults.include_erb),
    })
}

/// Resolves `Auto` to `Rails` when the Gemfile mentions rails.
pub fn resolve_profile(base_dir: &Path, desired: Profile) -> Profile {
    if desired != Profile::Auto {
        return desired;
    }
    let gemfile = base_dir.join("Gemfile");
    match fs::read_to_string(&gemfile) {
        Ok(content) if content.contains("rails") => Profile::Rails,
        _ => Profile::Default,
    }
}
