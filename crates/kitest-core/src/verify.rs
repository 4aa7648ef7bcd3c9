//! Sample project verification.
//!
//! Verifying a sample acquires a workspace, materializes the template into
//! it, runs the build there and compares stdout with the expected text. The
//! workspace is released on every exit path.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::{KitestError, KitestResult};
use crate::replace::Replacements;
use crate::runner::{BuildRunner, CommandRunner, RunResult, DEFAULT_GRADLE};
use crate::template::{
    MaterializeReport, TemplateStore, DEFAULT_TEMPLATE, MAIN_KT_TOKEN, PACKAGE_TOKEN,
    REPO_URL_TOKEN,
};
use crate::workspace::with_workspace;

// ============================================================================
// Inputs
// ============================================================================

/// A Kotlin sample and the output it must produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleProject {
    /// Full source of `Main.kt`.
    pub main_code: String,
    /// Git URL of the dependency repository.
    pub repo_url: String,
    /// Module coordinates the repository produces.
    pub package_name: String,
    /// Exact stdout expected from running the sample.
    pub expected_output: String,
}

impl SampleProject {
    pub fn new(
        main_code: impl Into<String>,
        repo_url: impl Into<String>,
        package_name: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        SampleProject {
            main_code: main_code.into(),
            repo_url: repo_url.into(),
            package_name: package_name.into(),
            expected_output: expected_output.into(),
        }
    }

    /// Template replacements for this sample.
    pub fn replacements(&self) -> KitestResult<Replacements> {
        Replacements::new()
            .with(PACKAGE_TOKEN, self.package_name.as_str())?
            .with(REPO_URL_TOKEN, self.repo_url.as_str())?
            .with(MAIN_KT_TOKEN, self.main_code.as_str())
    }
}

/// Where and how a sample is verified.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Store the template is looked up in.
    pub templates: TemplateStore,
    /// Template name.
    pub template: String,
    /// Explicit workspace path; must not exist. `None` uses a temporary one.
    pub workspace: Option<PathBuf>,
    /// Keep a temporary workspace when verification fails.
    pub keep_on_failure: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        VerifyOptions {
            templates: TemplateStore::bundled(),
            template: DEFAULT_TEMPLATE.to_string(),
            workspace: None,
            keep_on_failure: false,
        }
    }
}

impl VerifyOptions {
    pub fn with_workspace(mut self, workspace: Option<PathBuf>) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn keep_on_failure(mut self, keep: bool) -> Self {
        self.keep_on_failure = keep;
        self
    }
}

// ============================================================================
// Report
// ============================================================================

/// What a successful verification did.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    /// Workspace directory used.
    pub workspace: PathBuf,
    /// Whether the workspace was temporary (and has been removed).
    pub owned: bool,
    /// Materialization details.
    pub materialized: MaterializeReport,
    /// Captured build output.
    pub run: RunResult,
}

// ============================================================================
// Verifier
// ============================================================================

/// Verifies samples with a given build runner.
#[derive(Debug, Clone)]
pub struct Verifier<R> {
    options: VerifyOptions,
    runner: R,
}

impl<R: BuildRunner> Verifier<R> {
    pub fn new(options: VerifyOptions, runner: R) -> Self {
        Verifier { options, runner }
    }

    /// Verify that `sample` builds and prints exactly its expected output.
    pub fn verify(&self, sample: &SampleProject) -> KitestResult<VerifyReport> {
        let replacements = sample.replacements()?;

        with_workspace(
            self.options.workspace.as_deref(),
            self.options.keep_on_failure,
            |workspace| {
                let project_dir = workspace.project_dir();
                let materialized = self.options.templates.materialize(
                    &self.options.template,
                    &project_dir,
                    &replacements,
                )?;

                let run = self.runner.run(&project_dir)?;
                let run = check_run(run, &sample.expected_output)?;
                info!("Sample output matched ({} bytes)", run.stdout.len());

                Ok(VerifyReport {
                    workspace: workspace.path().to_path_buf(),
                    owned: workspace.is_owned(),
                    materialized,
                    run,
                })
            },
        )
    }
}

/// Check a build result against the expected stdout.
///
/// The comparison is exact; no whitespace is trimmed.
pub fn check_run(run: RunResult, expected_output: &str) -> KitestResult<RunResult> {
    if !run.success() {
        return Err(KitestError::BuildFailed {
            exit_code: run.exit_code,
            stdout: run.stdout,
            stderr: run.stderr,
        });
    }
    if run.stdout != expected_output {
        return Err(KitestError::UnexpectedOutput {
            expected: expected_output.to_string(),
            actual: run.stdout,
        });
    }
    Ok(run)
}

/// Verify a Kotlin sample with the bundled template and `gradle` from `PATH`.
///
/// `temp_project_dir`, when given, must not exist; it is created and left in
/// place. Otherwise a temporary workspace is used and removed afterwards.
pub fn verify_kotlin_sample_project(
    main_code: &str,
    repo_url: &str,
    package_name: &str,
    expected_output: &str,
    temp_project_dir: Option<&Path>,
) -> KitestResult<()> {
    let options = VerifyOptions::default().with_workspace(temp_project_dir.map(Path::to_path_buf));
    let verifier = Verifier::new(options, CommandRunner::gradle(DEFAULT_GRADLE));
    let sample = SampleProject::new(main_code, repo_url, package_name, expected_output);
    verifier.verify(&sample).map(|_| ())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacements_follow_token_order() {
        let sample = SampleProject::new("fun main() {}", "https://x/y.git", "x:y", "");
        let replacements = sample.replacements().unwrap();
        let tokens: Vec<_> = replacements.iter().map(|(t, _)| t).collect();
        assert_eq!(tokens, vec![PACKAGE_TOKEN, REPO_URL_TOKEN, MAIN_KT_TOKEN]);
    }

    #[test]
    fn check_run_accepts_exact_match() {
        let run = RunResult::new(Some(0), "42\n", "");
        assert_eq!(check_run(run.clone(), "42\n").unwrap(), run);
    }

    #[test]
    fn check_run_does_not_trim() {
        let err = check_run(RunResult::new(Some(0), "42\n", ""), "42").unwrap_err();
        match err {
            KitestError::UnexpectedOutput { expected, actual } => {
                assert_eq!(expected, "42");
                assert_eq!(actual, "42\n");
            }
            other => panic!("expected UnexpectedOutput, got {:?}", other),
        }
    }

    #[test]
    fn check_run_reports_failure_before_comparing() {
        let err = check_run(RunResult::new(Some(1), "42\n", "compile error"), "42\n").unwrap_err();
        match err {
            KitestError::BuildFailed {
                exit_code,
                stdout,
                stderr,
            } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(stdout, "42\n");
                assert_eq!(stderr, "compile error");
            }
            other => panic!("expected BuildFailed, got {:?}", other),
        }
    }

    #[test]
    fn check_run_treats_signal_as_failure() {
        let err = check_run(RunResult::new(None, "", ""), "").unwrap_err();
        assert!(matches!(err, KitestError::BuildFailed { exit_code: None, .. }));
    }
}
