//! Binary entry point for the kitest CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Verify a sample prints exactly what it should
//! kitest verify --main Main.kt --expected expected.txt \
//!     --repo-url https://github.com/example/lib.git --package com.github.example:lib
//!
//! # Materialize a template without building it
//! kitest materialize --dest /tmp/sample --set __PACKAGE__=com.github.example:lib
//!
//! # List bundled templates
//! kitest templates
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use kitest::cli::{parse_setting, run_materialize, run_templates, run_verify, TextInput, VerifyArgs};
use kitest::config::{CliOverrides, ResolvedConfig};
use kitest::output::{emit_response, ErrorResponse};
use kitest_core::template::DEFAULT_TEMPLATE;
use kitest_core::{KitestError, OutputErrorCode};

// ============================================================================
// CLI Structure
// ============================================================================

/// Verify Kotlin sample projects against their expected output.
///
/// All results are printed as JSON on stdout; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "kitest", version, about = "Verify Kotlin sample projects")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Directory holding named templates (default: bundled templates).
    ///
    /// The bundled templates are located in the kitest source tree the binary
    /// was built from; set this (or KITEST_TEMPLATES_DIR) when that tree is
    /// not available.
    #[arg(long, global = true)]
    templates_dir: Option<PathBuf>,

    /// Build tool program (default: gradle).
    #[arg(long, global = true)]
    gradle: Option<String>,

    /// Build timeout in seconds; 0 disables the timeout.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

impl GlobalArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            templates_dir: self.templates_dir.clone(),
            gradle: self.gradle.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Materialize, build and run a sample, and compare its output.
    Verify {
        /// File with the Main.kt source (`-` for stdin).
        #[arg(long, value_name = "FILE")]
        main: Option<PathBuf>,

        /// Main.kt source given inline.
        #[arg(long, conflicts_with = "main")]
        main_code: Option<String>,

        /// Git URL of the dependency repository.
        #[arg(long)]
        repo_url: String,

        /// Module coordinates the repository produces.
        #[arg(long)]
        package: String,

        /// File with the expected stdout (`-` for stdin).
        #[arg(long, value_name = "FILE")]
        expected: Option<PathBuf>,

        /// Expected stdout given inline.
        #[arg(long, conflicts_with = "expected")]
        expected_text: Option<String>,

        /// Workspace directory to use; must not exist (default: temporary).
        #[arg(long)]
        workspace: Option<PathBuf>,

        /// Template name.
        #[arg(long, default_value = DEFAULT_TEMPLATE)]
        template: String,

        /// Keep the temporary workspace if verification fails.
        #[arg(long)]
        keep_workspace: bool,
    },

    /// Copy a template and apply replacements, without building.
    Materialize {
        /// Template name.
        #[arg(long, default_value = DEFAULT_TEMPLATE)]
        template: String,

        /// Destination directory; must not exist.
        #[arg(long)]
        dest: PathBuf,

        /// Replacement in `TOKEN=VALUE` form; applied in the order given.
        #[arg(long = "set", value_name = "TOKEN=VALUE", value_parser = parse_setting)]
        settings: Vec<(String, String)>,
    },

    /// List available templates.
    Templates,
}

// ============================================================================
// Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.log_level);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON like every other response
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();

            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), KitestError> {
    let config = ResolvedConfig::resolve(&cli.global.overrides())?;
    let mut stdout = io::stdout();

    let written = match cli.command {
        Command::Verify {
            main,
            main_code,
            repo_url,
            package,
            expected,
            expected_text,
            workspace,
            template,
            keep_workspace,
        } => {
            let args = VerifyArgs {
                main: TextInput::from_args(main_code, main, "--main")?,
                repo_url,
                package,
                expected: TextInput::from_args(expected_text, expected, "--expected")?,
                workspace,
                template,
                keep_workspace,
            };
            let response = run_verify(&config, args)?;
            emit_response(&response, &mut stdout)
        }
        Command::Materialize {
            template,
            dest,
            settings,
        } => {
            let response = run_materialize(&config, &template, &dest, &settings)?;
            emit_response(&response, &mut stdout)
        }
        Command::Templates => {
            let response = run_templates(&config)?;
            emit_response(&response, &mut stdout)
        }
    };

    written.map_err(|e| KitestError::io("failed to write response", e))?;
    let _ = stdout.flush();
    Ok(())
}
