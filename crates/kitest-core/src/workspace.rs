//! Scoped workspace directories with ownership-based cleanup.
//!
//! A workspace is either created by kitest (a fresh temporary directory it
//! owns and removes on release) or supplied by the caller (never created and
//! never removed here). A supplied path that already exists is rejected so a
//! caller's directory is never reused or overwritten.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{KitestError, KitestResult};

/// Prefix for kitest-created temporary directories.
const TEMP_PREFIX: &str = "kitest_";

/// Sub-directory of an owned workspace that receives the project.
pub const PROJECT_DIR_NAME: &str = "project";

// ============================================================================
// Workspace Guard
// ============================================================================

/// Handle for an acquired workspace directory.
///
/// Release happens through [`WorkspaceGuard::release`], which reports
/// deletion failures, or on drop as a best-effort fallback.
#[derive(Debug)]
pub struct WorkspaceGuard {
    /// Resolved workspace path.
    path: PathBuf,
    /// Set while kitest owns the directory and has not released it yet.
    temp_dir: Option<TempDir>,
    /// Whether kitest created the directory.
    owned: bool,
}

impl WorkspaceGuard {
    /// Acquire a workspace.
    ///
    /// With `None`, creates a uniquely named temporary directory owned by the
    /// guard. With `Some(path)`, the path must not exist yet; it is returned
    /// as-is and left for the caller (or the template copy) to create.
    pub fn acquire(path: Option<&Path>) -> KitestResult<Self> {
        match path {
            Some(path) => {
                if path_exists(path)? {
                    return Err(KitestError::AlreadyExists {
                        path: path.to_path_buf(),
                    });
                }
                debug!("Using caller-supplied workspace {}", path.display());
                Ok(WorkspaceGuard {
                    path: path.to_path_buf(),
                    temp_dir: None,
                    owned: false,
                })
            }
            None => {
                let temp_dir = TempDir::with_prefix(TEMP_PREFIX)
                    .map_err(|e| KitestError::io("failed to create temporary workspace", e))?;
                let path = temp_dir.path().to_path_buf();
                info!("Created workspace {}", path.display());
                Ok(WorkspaceGuard {
                    path,
                    temp_dir: Some(temp_dir),
                    owned: true,
                })
            }
        }
    }

    /// The resolved workspace directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the workspace was created by kitest and is removed on release.
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Directory the project should be materialized into.
    ///
    /// An owned workspace already exists, so the project goes one level down;
    /// a supplied path is used directly.
    pub fn project_dir(&self) -> PathBuf {
        if self.owned {
            self.path.join(PROJECT_DIR_NAME)
        } else {
            self.path.clone()
        }
    }

    /// Keep an owned workspace on disk after release.
    pub fn persist(&mut self) {
        if let Some(temp_dir) = self.temp_dir.take() {
            let path = temp_dir.keep();
            info!("Keeping workspace {}", path.display());
        }
    }

    /// Release the workspace, removing it if kitest owns it and it still exists.
    pub fn release(mut self) -> KitestResult<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> KitestResult<()> {
        let Some(temp_dir) = self.temp_dir.take() else {
            return Ok(());
        };

        if !temp_dir.path().exists() {
            debug!("Workspace {} already gone", self.path.display());
            // Nothing left to remove; detach so TempDir does not try.
            let _ = temp_dir.keep();
            return Ok(());
        }

        temp_dir.close().map_err(|e| {
            KitestError::io(
                format!("failed to remove workspace {}", self.path.display()),
                e,
            )
        })?;
        info!("Removed workspace {}", self.path.display());
        Ok(())
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!("Workspace cleanup failed: {}", e);
        }
    }
}

/// Existence check that treats files, directories and dangling symlinks alike.
pub(crate) fn path_exists(path: &Path) -> KitestResult<bool> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(KitestError::io(
            format!("failed to inspect {}", path.display()),
            e,
        )),
    }
}

// ============================================================================
// Scoped Acquisition
// ============================================================================

/// Run `work` inside an acquired workspace and release it on every exit path.
///
/// If `work` fails and `keep_on_failure` is set, an owned workspace is kept
/// instead of removed. An error from `work` takes precedence over a release
/// error, which is then only logged.
pub fn with_workspace<T, F>(path: Option<&Path>, keep_on_failure: bool, work: F) -> KitestResult<T>
where
    F: FnOnce(&WorkspaceGuard) -> KitestResult<T>,
{
    let mut guard = WorkspaceGuard::acquire(path)?;
    let result = work(&guard);

    if result.is_err() && keep_on_failure {
        guard.persist();
    }

    match (result, guard.release()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release_err)) => Err(release_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(release_err)) => {
            warn!("Workspace cleanup failed after error: {}", release_err);
            Err(err)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    mod acquire_tests {
        use super::*;

        #[test]
        fn test_acquire_without_path_creates_owned_dir() {
            let guard = WorkspaceGuard::acquire(None).unwrap();
            assert!(guard.is_owned());
            assert!(guard.path().is_dir());
            assert!(guard
                .path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(TEMP_PREFIX));
        }

        #[test]
        fn test_acquire_missing_path_is_not_created() {
            let parent = TempDir::new().unwrap();
            let target = parent.path().join("ws");

            let guard = WorkspaceGuard::acquire(Some(&target)).unwrap();
            assert!(!guard.is_owned());
            assert_eq!(guard.path(), target.as_path());
            assert!(!target.exists());
        }

        #[test]
        fn test_acquire_existing_dir_fails() {
            let existing = TempDir::new().unwrap();
            let err = WorkspaceGuard::acquire(Some(existing.path())).unwrap_err();
            match err {
                KitestError::AlreadyExists { path } => assert_eq!(path, existing.path()),
                other => panic!("expected AlreadyExists, got {:?}", other),
            }
        }

        #[test]
        fn test_acquire_existing_file_fails() {
            let parent = TempDir::new().unwrap();
            let file = parent.path().join("occupied");
            fs::write(&file, "x").unwrap();

            let err = WorkspaceGuard::acquire(Some(&file)).unwrap_err();
            assert!(matches!(err, KitestError::AlreadyExists { .. }));
        }

        #[test]
        #[cfg(unix)]
        fn test_acquire_dangling_symlink_fails() {
            let parent = TempDir::new().unwrap();
            let link = parent.path().join("link");
            std::os::unix::fs::symlink(parent.path().join("nowhere"), &link).unwrap();

            let err = WorkspaceGuard::acquire(Some(&link)).unwrap_err();
            assert!(matches!(err, KitestError::AlreadyExists { .. }));
        }

        #[test]
        fn test_project_dir_depends_on_ownership() {
            let owned = WorkspaceGuard::acquire(None).unwrap();
            assert_eq!(owned.project_dir(), owned.path().join(PROJECT_DIR_NAME));

            let parent = TempDir::new().unwrap();
            let target = parent.path().join("ws");
            let supplied = WorkspaceGuard::acquire(Some(&target)).unwrap();
            assert_eq!(supplied.project_dir(), target);
        }
    }

    mod release_tests {
        use super::*;

        #[test]
        fn test_release_removes_owned_dir() {
            let guard = WorkspaceGuard::acquire(None).unwrap();
            let path = guard.path().to_path_buf();
            fs::create_dir_all(path.join("project/src")).unwrap();
            fs::write(path.join("project/src/Main.kt"), "fun main() {}").unwrap();

            guard.release().unwrap();
            assert!(!path.exists());
        }

        #[test]
        fn test_release_reports_removal_failure_as_io() {
            let guard = WorkspaceGuard::acquire(None).unwrap();
            let path = guard.path().to_path_buf();
            fs::remove_dir_all(&path).unwrap();
            fs::write(&path, "not a dir").unwrap();

            let err = guard.release().unwrap_err();
            assert!(matches!(err, KitestError::Io { .. }));
            fs::remove_file(&path).ok();
        }

        #[test]
        fn test_release_owned_dir_already_removed_is_noop() {
            let guard = WorkspaceGuard::acquire(None).unwrap();
            let path = guard.path().to_path_buf();
            fs::remove_dir_all(&path).unwrap();

            guard.release().unwrap();
            assert!(!path.exists());
        }

        #[test]
        fn test_release_never_removes_supplied_dir() {
            let parent = TempDir::new().unwrap();
            let target = parent.path().join("ws");

            let guard = WorkspaceGuard::acquire(Some(&target)).unwrap();
            fs::create_dir_all(target.join("nested")).unwrap();
            fs::write(target.join("nested/file.txt"), "keep me").unwrap();

            guard.release().unwrap();
            assert!(target.join("nested/file.txt").exists());
        }

        #[test]
        fn test_drop_removes_owned_dir() {
            let path;
            {
                let guard = WorkspaceGuard::acquire(None).unwrap();
                path = guard.path().to_path_buf();
                assert!(path.exists());
            }
            assert!(!path.exists());
        }

        #[test]
        fn test_persist_keeps_owned_dir() {
            let mut guard = WorkspaceGuard::acquire(None).unwrap();
            let path = guard.path().to_path_buf();

            guard.persist();
            guard.release().unwrap();
            assert!(path.exists());

            fs::remove_dir_all(&path).ok();
        }
    }

    mod scoped_tests {
        use super::*;

        #[test]
        fn test_with_workspace_removes_after_success() {
            let mut seen = PathBuf::new();
            let value = with_workspace(None, false, |ws| {
                seen = ws.path().to_path_buf();
                Ok(7)
            })
            .unwrap();

            assert_eq!(value, 7);
            assert!(!seen.as_os_str().is_empty());
            assert!(!seen.exists());
        }

        #[test]
        fn test_with_workspace_removes_after_failure() {
            let mut seen = PathBuf::new();
            let err = with_workspace(None, false, |ws| -> KitestResult<()> {
                seen = ws.path().to_path_buf();
                Err(KitestError::invalid_args("boom"))
            })
            .unwrap_err();

            assert!(matches!(err, KitestError::InvalidArguments { .. }));
            assert!(!seen.exists());
        }

        #[test]
        fn test_with_workspace_keeps_on_failure_when_asked() {
            let mut seen = PathBuf::new();
            let result = with_workspace(None, true, |ws| -> KitestResult<()> {
                seen = ws.path().to_path_buf();
                Err(KitestError::invalid_args("boom"))
            });

            assert!(result.is_err());
            assert!(seen.exists());
            fs::remove_dir_all(&seen).ok();
        }

        #[test]
        fn test_with_workspace_keep_flag_ignored_on_success() {
            let mut seen = PathBuf::new();
            with_workspace(None, true, |ws| {
                seen = ws.path().to_path_buf();
                Ok(())
            })
            .unwrap();
            assert!(!seen.exists());
        }

        /// Replace the owned directory with a regular file so removal fails.
        fn occupy_with_file(ws: &WorkspaceGuard) {
            fs::remove_dir_all(ws.path()).unwrap();
            fs::write(ws.path(), "not a dir").unwrap();
        }

        #[test]
        fn test_with_workspace_reports_failed_removal() {
            let mut seen = PathBuf::new();
            let err = with_workspace(None, false, |ws| {
                seen = ws.path().to_path_buf();
                occupy_with_file(ws);
                Ok(1)
            })
            .unwrap_err();

            match err {
                KitestError::Io { context, .. } => {
                    assert!(context.contains("failed to remove workspace"), "{}", context)
                }
                other => panic!("expected Io, got {:?}", other),
            }
            fs::remove_file(&seen).ok();
        }

        #[test]
        fn test_with_workspace_work_error_wins_over_failed_removal() {
            let mut seen = PathBuf::new();
            let err = with_workspace(None, false, |ws| -> KitestResult<()> {
                seen = ws.path().to_path_buf();
                occupy_with_file(ws);
                Err(KitestError::invalid_args("boom"))
            })
            .unwrap_err();

            assert!(matches!(err, KitestError::InvalidArguments { .. }));
            fs::remove_file(&seen).ok();
        }

        #[test]
        fn test_with_workspace_rejects_existing_before_work() {
            let existing = TempDir::new().unwrap();
            let mut ran = false;
            let err = with_workspace(Some(existing.path()), false, |_| {
                ran = true;
                Ok(())
            })
            .unwrap_err();

            assert!(matches!(err, KitestError::AlreadyExists { .. }));
            assert!(!ran);
            assert!(existing.path().exists());
        }
    }
}
