//! Layered configuration for the kitest CLI.
//!
//! Precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (`KITEST_TEMPLATES_DIR`, `KITEST_GRADLE`,
//!    `KITEST_TIMEOUT_SECS`)
//! 3. Defaults
//!
//! The default templates directory is the bundled one inside the source tree
//! the binary was built from; installed binaries without that tree need
//! `--templates-dir` or `KITEST_TEMPLATES_DIR`.
//!
//! The core library reads no environment; everything it needs is resolved
//! here and passed in explicitly.

use std::path::PathBuf;
use std::time::Duration;

use kitest_core::runner::{CommandRunner, DEFAULT_BUILD_TIMEOUT, DEFAULT_GRADLE};
use kitest_core::template::{bundled_templates_dir, TemplateStore};
use kitest_core::{KitestError, KitestResult};

pub const ENV_TEMPLATES_DIR: &str = "KITEST_TEMPLATES_DIR";
pub const ENV_GRADLE: &str = "KITEST_GRADLE";
pub const ENV_TIMEOUT_SECS: &str = "KITEST_TIMEOUT_SECS";

// ============================================================================
// Configuration Sources
// ============================================================================

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    /// Built-in default value.
    Default = 0,
    /// From environment variable.
    EnvVar = 1,
    /// From CLI flag (highest precedence).
    CliFlag = 2,
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// --templates-dir flag.
    pub templates_dir: Option<PathBuf>,
    /// --gradle flag.
    pub gradle: Option<String>,
    /// --timeout-secs flag.
    pub timeout_secs: Option<u64>,
}

// ============================================================================
// Resolved Configuration
// ============================================================================

/// Fully resolved settings with their sources.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Directory holding named templates.
    pub templates_dir: ConfigValue<PathBuf>,
    /// Build tool program.
    pub gradle: ConfigValue<String>,
    /// Build timeout; `None` disables it.
    pub timeout: ConfigValue<Option<Duration>>,
}

impl ResolvedConfig {
    /// Resolve from the process environment and `overrides`.
    pub fn resolve(overrides: &CliOverrides) -> KitestResult<Self> {
        Self::resolve_with(|key| std::env::var(key).ok(), overrides)
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with<F>(env: F, overrides: &CliOverrides) -> KitestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ResolvedConfig::defaults();
        config.apply_env_vars(&env)?;
        config.apply_cli_overrides(overrides);
        Ok(config)
    }

    fn defaults() -> Self {
        ResolvedConfig {
            templates_dir: ConfigValue::new(bundled_templates_dir(), ConfigSource::Default),
            gradle: ConfigValue::new(DEFAULT_GRADLE.to_string(), ConfigSource::Default),
            timeout: ConfigValue::new(Some(DEFAULT_BUILD_TIMEOUT), ConfigSource::Default),
        }
    }

    fn apply_env_vars<F>(&mut self, env: &F) -> KitestResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = env(ENV_TEMPLATES_DIR).filter(|v| !v.is_empty()) {
            self.templates_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::EnvVar);
        }

        if let Some(gradle) = env(ENV_GRADLE).filter(|v| !v.is_empty()) {
            self.gradle = ConfigValue::new(gradle, ConfigSource::EnvVar);
        }

        if let Some(raw) = env(ENV_TIMEOUT_SECS).filter(|v| !v.is_empty()) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                KitestError::invalid_args(format!(
                    "{} must be a number of seconds, got '{}'",
                    ENV_TIMEOUT_SECS, raw
                ))
            })?;
            self.timeout = ConfigValue::new(timeout_from_secs(secs), ConfigSource::EnvVar);
        }

        Ok(())
    }

    fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(ref dir) = overrides.templates_dir {
            self.templates_dir = ConfigValue::new(dir.clone(), ConfigSource::CliFlag);
        }

        if let Some(ref gradle) = overrides.gradle {
            self.gradle = ConfigValue::new(gradle.clone(), ConfigSource::CliFlag);
        }

        if let Some(secs) = overrides.timeout_secs {
            self.timeout = ConfigValue::new(timeout_from_secs(secs), ConfigSource::CliFlag);
        }
    }

    pub fn template_store(&self) -> TemplateStore {
        TemplateStore::new(self.templates_dir.value.clone())
    }

    /// The gradle runner described by this configuration.
    pub fn runner(&self) -> CommandRunner {
        CommandRunner::gradle(self.gradle.value.as_str()).with_timeout(self.timeout.value)
    }
}

/// Zero disables the timeout.
fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

// ============================================================================
// Tests
// ============================================================================
