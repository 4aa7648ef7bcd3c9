//! Core infrastructure for kitest.
//!
//! kitest checks that a Kotlin sample depending on a GitHub-hosted library
//! builds and prints what it should. This crate holds the pieces:
//!
//! - `workspace` - scoped workspace directories with ownership-based cleanup
//! - `replace` - ordered placeholder replacement
//! - `template` - template copy and substitution with change reporting
//! - `banner` - delimited rendering of changed files for logs
//! - `runner` - external build invocation behind the `BuildRunner` seam
//! - `verify` - the verification sequence
//! - `error` - error type and exit codes

pub mod banner;
pub mod error;
pub mod replace;
pub mod runner;
pub mod template;
pub mod verify;
pub mod workspace;

pub use error::{KitestError, KitestResult, OutputErrorCode};
pub use replace::Replacements;
pub use runner::{BuildRunner, CommandRunner, RunResult};
pub use template::{ChangedFile, MaterializeReport, TemplateStore};
pub use verify::{verify_kotlin_sample_project, SampleProject, Verifier, VerifyOptions, VerifyReport};
pub use workspace::{with_workspace, WorkspaceGuard};
