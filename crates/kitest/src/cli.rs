//! CLI command implementations.
//!
//! Each `run_*` function performs one command and returns its JSON
//! response; argument parsing and output live in the binary.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::info;

use kitest_core::{
    KitestError, KitestResult, Replacements, SampleProject, Verifier, VerifyOptions,
};

use crate::config::ResolvedConfig;
use crate::output::{MaterializeResponse, TemplatesResponse, VerifyResponse};

/// Text given inline or read from a file (`-` for stdin).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextInput {
    Inline(String),
    File(PathBuf),
}

impl TextInput {
    /// Pick the inline value if present, otherwise the file.
    pub fn from_args(inline: Option<String>, file: Option<PathBuf>, what: &str) -> KitestResult<Self> {
        match (inline, file) {
            (Some(text), None) => Ok(TextInput::Inline(text)),
            (None, Some(path)) => Ok(TextInput::File(path)),
            (Some(_), Some(_)) => Err(KitestError::invalid_args(format!(
                "{} given both inline and as a file",
                what
            ))),
            (None, None) => Err(KitestError::invalid_args(format!("{} is required", what))),
        }
    }

    /// Whether this input reads from stdin.
    pub fn is_stdin(&self) -> bool {
        matches!(self, TextInput::File(path) if path == Path::new("-"))
    }

    pub fn read(self) -> KitestResult<String> {
        match self {
            TextInput::Inline(text) => Ok(text),
            TextInput::File(path) if path == Path::new("-") => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .map_err(|e| KitestError::io("failed to read stdin", e))?;
                Ok(text)
            }
            TextInput::File(path) => fs::read_to_string(&path)
                .map_err(|e| KitestError::io(format!("failed to read {}", path.display()), e)),
        }
    }
}

/// Arguments for `kitest verify`.
#[derive(Debug, Clone)]
pub struct VerifyArgs {
    pub main: TextInput,
    pub repo_url: String,
    pub package: String,
    pub expected: TextInput,
    pub workspace: Option<PathBuf>,
    pub template: String,
    pub keep_workspace: bool,
}

/// Build the sample, run it, and compare its output.
pub fn run_verify(config: &ResolvedConfig, args: VerifyArgs) -> KitestResult<VerifyResponse> {
    if args.main.is_stdin() && args.expected.is_stdin() {
        return Err(KitestError::invalid_args(
            "--main and --expected cannot both read from stdin",
        ));
    }
    let sample = SampleProject::new(
        args.main.read()?,
        args.repo_url,
        args.package,
        args.expected.read()?,
    );

    let options = VerifyOptions {
        templates: config.template_store(),
        template: args.template,
        workspace: args.workspace,
        keep_on_failure: args.keep_workspace,
    };
    let verifier = Verifier::new(options, config.runner());

    let report = verifier.verify(&sample)?;
    info!("Verified sample in {}", report.workspace.display());
    Ok(VerifyResponse::from_report(&report))
}

/// Materialize a template without building it.
pub fn run_materialize(
    config: &ResolvedConfig,
    template: &str,
    dest: &Path,
    settings: &[(String, String)],
) -> KitestResult<MaterializeResponse> {
    let mut replacements = Replacements::new();
    for (token, value) in settings {
        replacements.insert(token.as_str(), value.as_str())?;
    }

    let report = config.template_store().materialize(template, dest, &replacements)?;
    Ok(MaterializeResponse::from_report(&report))
}

/// List available templates.
pub fn run_templates(config: &ResolvedConfig) -> KitestResult<TemplatesResponse> {
    let store = config.template_store();
    let names = store.list()?;
    Ok(TemplatesResponse::new(store.root().to_path_buf(), names))
}

/// Parse a `TOKEN=VALUE` replacement; the value may contain `=`.
pub fn parse_setting(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((token, value)) if !token.is_empty() => Ok((token.to_string(), value.to_string())),
        _ => Err(format!(
            "invalid replacement '{}', expected 'TOKEN=VALUE' (e.g., '__PACKAGE__=com.example:lib')",
            s
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================
