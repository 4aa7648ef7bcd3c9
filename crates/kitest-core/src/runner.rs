//! External build invocation.
//!
//! [`BuildRunner`] is the seam between verification and the build tool.
//! [`CommandRunner`] is the process-backed implementation: it runs a fixed
//! command with the project directory as cwd, captures stdout, stderr and the
//! exit code, and optionally kills the child after a timeout.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::{KitestError, KitestResult};

/// Default limit for a single build invocation.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(600);

/// Build tool invoked when none is configured.
pub const DEFAULT_GRADLE: &str = "gradle";

// ============================================================================
// Run Result
// ============================================================================

/// Captured outcome of one build invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// Exit code, `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl RunResult {
    pub fn new(exit_code: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        RunResult {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

// ============================================================================
// Runner Trait
// ============================================================================

/// Something that can build and run a materialized project.
pub trait BuildRunner {
    /// Run the build in `project_dir` and report what it printed.
    ///
    /// A non-zero exit is reported through [`RunResult::exit_code`], not as an
    /// error; errors are reserved for failing to run at all.
    fn run(&self, project_dir: &Path) -> KitestResult<RunResult>;
}

impl<R: BuildRunner + ?Sized> BuildRunner for &R {
    fn run(&self, project_dir: &Path) -> KitestResult<RunResult> {
        (**self).run(project_dir)
    }
}

impl<R: BuildRunner + ?Sized> BuildRunner for Box<R> {
    fn run(&self, project_dir: &Path) -> KitestResult<RunResult> {
        (**self).run(project_dir)
    }
}

// ============================================================================
// Command Runner
// ============================================================================

/// Runs a fixed command as a child process.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: OsString,
    args: Vec<OsString>,
    timeout: Option<Duration>,
    extra_env: BTreeMap<String, String>,
}

impl CommandRunner {
    pub fn new(program: impl Into<OsString>) -> Self {
        CommandRunner {
            program: program.into(),
            args: Vec::new(),
            timeout: Some(DEFAULT_BUILD_TIMEOUT),
            extra_env: BTreeMap::new(),
        }
    }

    /// `<program> run -q`: run the application with minimal build output.
    pub fn gradle(program: impl Into<OsString>) -> Self {
        CommandRunner::new(program).arg("run").arg("-q")
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the timeout; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The full command line, for logs.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| s.to_string_lossy().to_string())
            .collect()
    }

    fn resolve_program(&self) -> KitestResult<PathBuf> {
        which::which(&self.program).map_err(|_| KitestError::BuildToolNotFound {
            program: self.program.to_string_lossy().to_string(),
        })
    }
}

impl BuildRunner for CommandRunner {
    fn run(&self, project_dir: &Path) -> KitestResult<RunResult> {
        let program = self.resolve_program()?;
        debug!(
            "Running {:?} in {}",
            self.command_line(),
            project_dir.display()
        );

        let mut cmd = Command::new(&program);
        cmd.args(&self.args)
            .current_dir(project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("KITEST_SANDBOX", "1");
        for (key, value) in &self.extra_env {
            cmd.env(key, value);
        }

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| KitestError::io(format!("failed to spawn {}", program.display()), e))?;

        // Drain both pipes while waiting so a chatty build cannot block on a
        // full pipe buffer.
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = wait_for(&mut child, self.timeout)
            .map_err(|e| KitestError::io(format!("failed to wait for {}", program.display()), e))?;
        let duration = start.elapsed();

        let Some(status) = status else {
            // Readers are left detached: a grandchild may still hold the pipes.
            let timeout = self.timeout.unwrap_or_default();
            warn!(
                "Build command timed out after {:?}: {:?}",
                duration,
                self.command_line()
            );
            return Err(KitestError::BuildTimedOut { timeout });
        };

        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);
        debug!("Build finished in {:?} with {:?}", duration, status.code());

        Ok(RunResult {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Wait for `child`, killing and reaping it if `timeout` elapses.
///
/// Returns `None` on timeout.
fn wait_for(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };

    match child.wait_timeout(timeout)? {
        Some(status) => Ok(Some(status)),
        None => {
            let _ = child.kill();
            let _ = child.wait(); // Reap the zombie
            Ok(None)
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf).ok();
            buf
        })
    })
}

fn join_reader(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

// ============================================================================
// Tests
// ============================================================================
