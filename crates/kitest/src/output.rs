//! JSON responses written to stdout.
//!
//! Every command prints exactly one JSON object. Success responses carry
//! `"status": "ok"`; failures carry `"status": "error"` and an [`ErrorInfo`].

use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;
use serde_json::json;

use kitest_core::{ChangedFile, KitestError, MaterializeReport, OutputErrorCode, VerifyReport};

/// Version of the response format.
pub const SCHEMA_VERSION: &str = "1";

/// Error payload.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Numeric error code, also the process exit code.
    pub code: u8,
    /// Machine-readable kind.
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn from_error(err: &KitestError) -> Self {
        let code = OutputErrorCode::from(err).code();
        let message = err.to_string();

        let (kind, details) = match err {
            KitestError::AlreadyExists { path } => {
                ("already_exists", Some(json!({ "path": path })))
            }
            KitestError::TemplateNotFound { path } => {
                ("template_not_found", Some(json!({ "path": path })))
            }
            KitestError::DestinationExists { path } => {
                ("destination_exists", Some(json!({ "path": path })))
            }
            KitestError::BuildFailed {
                exit_code,
                stdout,
                stderr,
            } => (
                "build_failed",
                Some(json!({
                    "exit_code": exit_code,
                    "stdout": stdout,
                    "stderr": stderr,
                })),
            ),
            KitestError::BuildTimedOut { timeout } => (
                "build_timed_out",
                Some(json!({ "timeout_secs": timeout.as_secs_f64() })),
            ),
            KitestError::BuildToolNotFound { program } => {
                ("build_tool_not_found", Some(json!({ "program": program })))
            }
            KitestError::UnexpectedOutput { expected, actual } => (
                "unexpected_output",
                Some(json!({ "expected": expected, "actual": actual })),
            ),
            KitestError::InvalidArguments { .. } => ("invalid_arguments", None),
            KitestError::Io { .. } => ("io_failure", None),
        };

        ErrorInfo {
            code,
            kind,
            message,
            details,
        }
    }
}

/// Failure response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &KitestError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

/// Response for `kitest verify`.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub status: String,
    pub schema_version: String,
    pub workspace: PathBuf,
    pub workspace_removed: bool,
    pub changed_files: Vec<PathBuf>,
    pub stdout: String,
}

impl VerifyResponse {
    pub fn from_report(report: &VerifyReport) -> Self {
        VerifyResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            workspace: report.workspace.clone(),
            workspace_removed: report.owned,
            changed_files: changed_paths(&report.materialized.changed),
            stdout: report.run.stdout.clone(),
        }
    }
}

/// Response for `kitest materialize`.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializeResponse {
    pub status: String,
    pub schema_version: String,
    pub destination: PathBuf,
    pub files_copied: usize,
    pub changed_files: Vec<PathBuf>,
    pub skipped_files: Vec<PathBuf>,
}

impl MaterializeResponse {
    pub fn from_report(report: &MaterializeReport) -> Self {
        MaterializeResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            destination: report.destination.clone(),
            files_copied: report.copied.len(),
            changed_files: changed_paths(&report.changed),
            skipped_files: report.skipped.clone(),
        }
    }
}

/// Response for `kitest templates`.
#[derive(Debug, Clone, Serialize)]
pub struct TemplatesResponse {
    pub status: String,
    pub schema_version: String,
    pub root: PathBuf,
    pub templates: Vec<String>,
}

impl TemplatesResponse {
    pub fn new(root: PathBuf, templates: Vec<String>) -> Self {
        TemplatesResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            root,
            templates,
        }
    }
}

fn changed_paths(changed: &[ChangedFile]) -> Vec<PathBuf> {
    changed.iter().map(|f| f.path.clone()).collect()
}

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn to_value<T: Serialize>(response: &T) -> serde_json::Value {
        let mut out = Vec::new();
        emit_response(response, &mut out).unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn build_failure_details_include_streams() {
        let err = KitestError::BuildFailed {
            exit_code: Some(1),
            stdout: "partial".to_string(),
            stderr: "compile error".to_string(),
        };
        let value = to_value(&ErrorResponse::from_error(&err));

        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], 4);
        assert_eq!(value["error"]["kind"], "build_failed");
        assert_eq!(value["error"]["details"]["exit_code"], 1);
        assert_eq!(value["error"]["details"]["stderr"], "compile error");
    }

    #[test]
    fn unexpected_output_details_include_both_sides() {
        let err = KitestError::UnexpectedOutput {
            expected: "43\n".to_string(),
            actual: "42\n".to_string(),
        };
        let value = to_value(&ErrorResponse::from_error(&err));

        assert_eq!(value["error"]["code"], 5);
        assert_eq!(value["error"]["details"]["actual"], "42\n");
        assert_eq!(value["error"]["details"]["expected"], "43\n");
    }

    #[test]
    fn io_failure_has_no_details() {
        let err = KitestError::io("failed to read x", io::Error::other("nope"));
        let value = to_value(&ErrorResponse::from_error(&err));

        assert_eq!(value["error"]["kind"], "io_failure");
        assert!(value["error"].get("details").is_none());
    }

    #[test]
    fn materialize_response_lists_changed_files() {
        let report = MaterializeReport {
            destination: PathBuf::from("/tmp/project"),
            copied: vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")],
            changed: vec![ChangedFile {
                path: PathBuf::from("a.txt"),
                content: "x".to_string(),
            }],
            skipped: vec![],
        };
        let value = to_value(&MaterializeResponse::from_report(&report));

        assert_eq!(value["status"], "ok");
        assert_eq!(value["files_copied"], 2);
        assert_eq!(value["changed_files"][0], "a.txt");
    }
}
