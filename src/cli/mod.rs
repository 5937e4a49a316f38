//! CLI module for the regression harness
//!
//! ## Commands
//!
//! - *(none)* - Build if needed, then run negative and similarity checks
//! - `discover` - List the fixtures a run would process, without running them
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use miette::{GraphicalReportHandler, GraphicalTheme};

use crate::harness::config::default_build_steps;
use crate::harness::{
    ConsoleReporter, Driver, FailurePolicy, FixtureRegistry, HarnessConfig, HarnessError, HarnessReporter,
    JsonReporter, PairingStrategy,
};
use crate::version::HARNESS_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Create an error with a custom exit code.
    pub fn with_code(message: impl Into<String>, code: i32) -> Self {
        Self::new(message, ExitCode(code))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<HarnessError> for CliError {
    fn from(err: HarnessError) -> Self {
        CliError::failure(render_diagnostic(&err, false))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Regression harness for a command-line HEIC converter
#[derive(Parser, Debug)]
#[command(name = "heic-harness")]
#[command(version = HARNESS_VERSION)]
#[command(about = "Regression harness for a command-line HEIC converter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Anchor directory; relative paths below are resolved against it
    #[arg(long, value_name = "DIR", global = true)]
    pub root: Option<PathBuf>,

    /// Build output directory (default: build)
    #[arg(long, value_name = "DIR", global = true)]
    pub build_dir: Option<PathBuf>,

    /// Converter binary (default: <build-dir>/<binary-name>)
    #[arg(long, value_name = "FILE", global = true)]
    pub binary: Option<PathBuf>,

    /// File name of the converter inside the build directory
    #[arg(long, value_name = "NAME", default_value = "tifig", global = true)]
    pub binary_name: String,

    /// Directory of paired positive fixtures (default: fixtures)
    #[arg(long, value_name = "DIR", global = true)]
    pub fixtures: Option<PathBuf>,

    /// Directory of reference images, if not next to the inputs
    #[arg(long, value_name = "DIR", global = true)]
    pub references: Option<PathBuf>,

    /// Directory of inputs the converter must reject
    #[arg(long, value_name = "DIR", global = true)]
    pub negatives: Option<PathBuf>,

    /// Where converted images are written before scoring
    #[arg(long, value_name = "DIR", global = true)]
    pub scratch_dir: Option<PathBuf>,

    /// Save a similarity heatmap per fixture into this directory
    #[arg(long, value_name = "DIR", global = true)]
    pub heatmap_dir: Option<PathBuf>,

    /// How inputs are paired with references
    #[arg(long, value_enum, default_value_t = Pairing::RefSuffix, global = true)]
    pub pairing: Pairing,

    /// Extension of converted images (png, tiff)
    #[arg(long, value_name = "EXT", default_value = "png", global = true)]
    pub output_ext: String,

    /// Minimum similarity score in [0, 1]
    #[arg(long, value_name = "SCORE", value_parser = parse_threshold, global = true)]
    pub threshold: Option<f64>,

    /// Run every fixture and report all failures instead of stopping at the first
    #[arg(long, global = true)]
    pub keep_going: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Console, global = true)]
    pub format: Format,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Program used for the configure step
    #[arg(long, value_name = "PROGRAM", default_value = "cmake", global = true)]
    pub cmake: String,

    /// Program used for the compile step
    #[arg(long, value_name = "PROGRAM", default_value = "make", global = true)]
    pub make: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the fixtures a run would process
    Discover,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    /// <name>.heic with <name>_ref.jpg
    RefSuffix,
    /// <name>.heic with <name>.jpg
    SameStem,
    /// Sorted inputs with sorted references, by index
    Positional,
}

impl From<Pairing> for PairingStrategy {
    fn from(pairing: Pairing) -> Self {
        match pairing {
            Pairing::RefSuffix => PairingStrategy::RefSuffix,
            Pairing::SameStem => PairingStrategy::SameStem,
            Pairing::Positional => PairingStrategy::Positional,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Console,
    Json,
}

fn parse_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("threshold must be within [0, 1], got {value}"))
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let cwd = env::current_dir().map_err(|e| CliError::failure(format!("Error reading current directory: {e}")))?;
    let config = config_from_args(&cli, &cwd);
    tracing::debug!(?config, "resolved configuration");

    match cli.command {
        Some(Command::Discover) => discover(&config),
        None => run_suite(&config, cli.format, !cli.no_color),
    }
}

/// Build the immutable run configuration from parsed arguments.
pub fn config_from_args(cli: &Cli, cwd: &Path) -> HarnessConfig {
    let root = match &cli.root {
        Some(root) if root.is_absolute() => root.clone(),
        Some(root) => cwd.join(root),
        None => cwd.to_path_buf(),
    };

    let mut config = HarnessConfig::new(&root)
        .with_build_steps(default_build_steps(&root, &cli.cmake, &cli.make))
        .with_pairing(cli.pairing.into())
        .with_output_extension(cli.output_ext.trim_start_matches('.'));

    if let Some(dir) = &cli.build_dir {
        config = config.with_build_dir(dir);
    }
    let binary = cli
        .binary
        .clone()
        .unwrap_or_else(|| config.build_dir.join(&cli.binary_name));
    config = config.with_binary(binary);

    if let Some(dir) = &cli.fixtures {
        config = config.with_fixtures_dir(dir);
    }
    if let Some(dir) = &cli.references {
        config = config.with_references_dir(dir);
    }
    if let Some(dir) = &cli.negatives {
        config = config.with_negatives_dir(dir);
    }
    if let Some(dir) = &cli.scratch_dir {
        config = config.with_scratch_dir(dir);
    }
    if let Some(dir) = &cli.heatmap_dir {
        config = config.with_heatmap_dir(dir);
    }
    if let Some(threshold) = cli.threshold {
        config = config.with_threshold(threshold);
    }
    if cli.keep_going {
        config = config.with_policy(FailurePolicy::KeepGoing);
    }

    config.resolve(cwd)
}

fn run_suite(config: &HarnessConfig, format: Format, color: bool) -> CliResult<ExitCode> {
    let mut reporter: Box<dyn HarnessReporter> = match format {
        Format::Console => Box::new(ConsoleReporter::stdout(color)),
        Format::Json => Box::new(JsonReporter::stdout()),
    };

    let run = Driver::new(config).run(reporter.as_mut());

    if run.exit_code() == 0 {
        return Ok(ExitCode::SUCCESS);
    }

    // The reporter already printed the failure; add the diagnostic for humans.
    let message = match (format, run.first_error()) {
        (Format::Console, Some(err)) => render_diagnostic(err, color),
        _ => String::new(),
    };
    Err(CliError::with_code(message, run.exit_code()))
}

fn discover(config: &HarnessConfig) -> CliResult<ExitCode> {
    let registry = FixtureRegistry::new(config);
    let negatives = registry.discover_negatives()?;
    let positives = registry.discover()?;

    if !negatives.is_empty() {
        println!("negative fixtures ({}):", negatives.len());
        for fixture in &negatives {
            println!("  {}  {}", fixture.id, fixture.input_path.display());
        }
    }
    println!("positive fixtures ({}, pairing: {}):", positives.len(), config.pairing.as_str());
    for fixture in &positives {
        let reference = fixture
            .reference_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!("  {}  {} -> {}", fixture.id, fixture.input_path.display(), reference);
    }
    Ok(ExitCode::SUCCESS)
}

/// Render an error as a miette diagnostic (code, message, cause chain, help).
fn render_diagnostic(err: &HarnessError, color: bool) -> String {
    let theme = if color {
        GraphicalTheme::unicode()
    } else {
        GraphicalTheme::unicode_nocolor()
    };
    let mut out = String::new();
    match GraphicalReportHandler::new_themed(theme).render_report(&mut out, err) {
        Ok(()) => out,
        Err(_) => err.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
