//! kitest - verify Kotlin sample projects against their expected output.
//!
//! This crate provides the CLI binary. The work itself lives in
//! `kitest-core`.
//!
//! ## Modules
//!
//! - `cli` - CLI command implementations
//! - `config` - layered configuration (defaults, env vars, flags)
//! - `output` - JSON responses

pub mod cli;
pub mod config;
pub mod output;

// Re-export core types for convenience
pub use kitest_core::{
    verify_kotlin_sample_project, KitestError, KitestResult, OutputErrorCode, SampleProject,
    Verifier, VerifyOptions,
};
