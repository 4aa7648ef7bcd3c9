//! Error types and exit code constants for kitest.
//!
//! `KitestError` is the single error type surfaced by every core operation.
//! Each failure kind is its own variant so test runners can branch on cause.
//!
//! ## Exit Code Mapping
//!
//! - `2`: Invalid arguments (bad input from caller)
//! - `3`: Preconditions (existing workspace/destination, missing template or tool)
//! - `4`: Build failed (non-zero exit, killed, or timed out)
//! - `5`: Unexpected output (build succeeded, stdout differs)
//! - `10`: I/O and internal errors

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable numeric codes for JSON output and process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller.
    InvalidArguments = 2,
    /// A precondition on the filesystem or environment does not hold.
    PreconditionFailed = 3,
    /// The external build did not complete successfully.
    BuildFailed = 4,
    /// The build succeeded but printed something else.
    UnexpectedOutput = 5,
    /// I/O and internal errors.
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Categorized failure of a verification run or one of its steps.
#[derive(Debug, Error)]
pub enum KitestError {
    /// A caller-supplied workspace path already exists.
    #[error("workspace already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    /// The named template has no directory on disk.
    #[error("template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    /// The materialization destination is already present.
    #[error("destination already exists: {}", path.display())]
    DestinationExists { path: PathBuf },

    /// The build tool exited unsuccessfully.
    #[error("build failed: {}", describe_exit(*exit_code))]
    BuildFailed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The build tool ran longer than the configured limit and was killed.
    #[error("build timed out after {timeout:?}")]
    BuildTimedOut { timeout: Duration },

    /// The build tool could not be located.
    #[error("build tool not found: {program}")]
    BuildToolNotFound { program: String },

    /// The build succeeded but stdout did not match the expectation.
    #[error("unexpected output: expected {expected:?}, got {actual:?}")]
    UnexpectedOutput { expected: String, actual: String },

    /// Invalid input from the caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// A filesystem or process operation failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

fn describe_exit(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "terminated without exit code".to_string(),
    }
}

/// Result type for kitest operations.
pub type KitestResult<T> = Result<T, KitestError>;

impl KitestError {
    /// Wrap an I/O error with the operation that failed.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        KitestError::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        KitestError::InvalidArguments {
            message: message.into(),
        }
    }
}

impl From<&KitestError> for OutputErrorCode {
    fn from(err: &KitestError) -> Self {
        match err {
            KitestError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            KitestError::AlreadyExists { .. }
            | KitestError::TemplateNotFound { .. }
            | KitestError::DestinationExists { .. }
            | KitestError::BuildToolNotFound { .. } => OutputErrorCode::PreconditionFailed,
            KitestError::BuildFailed { .. } | KitestError::BuildTimedOut { .. } => {
                OutputErrorCode::BuildFailed
            }
            KitestError::UnexpectedOutput { .. } => OutputErrorCode::UnexpectedOutput,
            KitestError::Io { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<KitestError> for OutputErrorCode {
    fn from(err: KitestError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Tests
// ============================================================================
