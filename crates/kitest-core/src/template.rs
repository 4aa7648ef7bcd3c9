//! Template materialization.
//!
//! A template is a directory tree whose files may contain placeholder tokens
//! of the form `__NAME__`. Materializing it:
//! 1. Copies the whole tree (including empty directories) to a destination
//!    that must not exist yet
//! 2. Applies a [`Replacements`] set to every text file in the copy
//! 3. Rewrites and logs each file whose content changed
//!
//! Files that are not valid UTF-8 are copied verbatim and skipped by
//! substitution with a warning.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::banner::render_changed_file;
use crate::error::{KitestError, KitestResult};
use crate::replace::Replacements;
use crate::workspace::path_exists;

/// Template used for Kotlin sample projects with a GitHub-hosted dependency.
pub const DEFAULT_TEMPLATE: &str = "dependency_from_github";

/// Placeholder for the dependency's module coordinates.
pub const PACKAGE_TOKEN: &str = "__PACKAGE__";

/// Placeholder for the dependency's git repository URL.
pub const REPO_URL_TOKEN: &str = "__REPO_URL__";

/// Placeholder for the contents of `Main.kt`.
pub const MAIN_KT_TOKEN: &str = "__MAIN_KT__";

/// Location of the templates shipped with this crate.
///
/// The path is fixed at compile time and points into the source tree. An
/// installed binary whose source tree has been removed needs an explicit
/// templates directory instead.
pub fn bundled_templates_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("templates")
}

// ============================================================================
// Materialization Report
// ============================================================================

/// A file rewritten by substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFile {
    /// Path relative to the destination root.
    pub path: PathBuf,
    /// Content after substitution.
    pub content: String,
}

/// Outcome of materializing a template.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaterializeReport {
    /// Root of the materialized project.
    pub destination: PathBuf,
    /// Every regular file copied, relative to the destination.
    pub copied: Vec<PathBuf>,
    /// Files rewritten by substitution, in traversal order.
    pub changed: Vec<ChangedFile>,
    /// Files left untouched because they are not valid UTF-8.
    pub skipped: Vec<PathBuf>,
}

// ============================================================================
// Template Store
// ============================================================================

/// A directory containing named templates, one sub-directory each.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        TemplateStore { root: root.into() }
    }

    /// The store for [`bundled_templates_dir`].
    pub fn bundled() -> Self {
        TemplateStore::new(bundled_templates_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a template name to its directory.
    ///
    /// Names are single path components; existence is checked at
    /// materialization time.
    pub fn resolve(&self, name: &str) -> KitestResult<PathBuf> {
        let is_plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains('/')
            && !name.contains('\\');
        if !is_plain {
            return Err(KitestError::invalid_args(format!(
                "invalid template name '{}'",
                name
            )));
        }
        Ok(self.root.join(name))
    }

    /// Names of the templates in this store, sorted.
    pub fn list(&self) -> KitestResult<Vec<String>> {
        if !self.root.is_dir() {
            return Err(KitestError::TemplateNotFound {
                path: self.root.clone(),
            });
        }

        let mut names = Vec::new();
        let entries = fs::read_dir(&self.root).map_err(|e| {
            KitestError::io(format!("failed to read {}", self.root.display()), e)
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| {
                KitestError::io(format!("failed to read {}", self.root.display()), e)
            })?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Materialize template `name` into `destination`.
    pub fn materialize(
        &self,
        name: &str,
        destination: &Path,
        replacements: &Replacements,
    ) -> KitestResult<MaterializeReport> {
        let source = self.resolve(name)?;
        materialize_dir(&source, destination, replacements)
    }
}

// ============================================================================
// Materialization
// ============================================================================

/// Copy `source` to `destination` and apply `replacements` to the copy.
///
/// Fails with `TemplateNotFound` if `source` is not a directory, with
/// `DestinationExists` if anything is already at `destination`, and with
/// `InvalidArguments` if `destination` lies inside `source`. Nothing is
/// written in any of these cases.
pub fn materialize_dir(
    source: &Path,
    destination: &Path,
    replacements: &Replacements,
) -> KitestResult<MaterializeReport> {
    if !source.is_dir() {
        return Err(KitestError::TemplateNotFound {
            path: source.to_path_buf(),
        });
    }
    if path_exists(destination)? {
        return Err(KitestError::DestinationExists {
            path: destination.to_path_buf(),
        });
    }

    if resolve_path(destination)?.starts_with(resolve_path(source)?) {
        return Err(KitestError::invalid_args(format!(
            "destination {} is inside template {}",
            destination.display(),
            source.display()
        )));
    }

    let copied = copy_tree(source, destination)?;
    let (changed, skipped) = replace_in_dir(destination, replacements)?;

    Ok(MaterializeReport {
        destination: destination.to_path_buf(),
        copied,
        changed,
        skipped,
    })
}

/// Canonical form of `path`, which need not exist yet.
///
/// The deepest existing ancestor is canonicalized and the missing
/// components are appended unchanged.
fn resolve_path(path: &Path) -> KitestResult<PathBuf> {
    let absolute = std::path::absolute(path)
        .map_err(|e| KitestError::io(format!("failed to resolve {}", path.display()), e))?;

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing.canonicalize().map_err(|e| {
        KitestError::io(format!("failed to resolve {}", existing.display()), e)
    })?;
    resolved.extend(missing.iter().rev());
    Ok(resolved)
}

/// Recursively copy `source` into a new `destination` directory.
///
/// Symlinks are followed and their targets copied. Returns the relative
/// paths of copied files.
fn copy_tree(source: &Path, destination: &Path) -> KitestResult<Vec<PathBuf>> {
    let mut copied = Vec::new();

    for entry in WalkDir::new(source).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let context = format!("failed to walk template {}", source.display());
            KitestError::io(context, e.into())
        })?;
        let relative_path = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| KitestError::io("template entry outside source", std::io::Error::other(e)))?;
        let dest_path = destination.join(relative_path);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path).map_err(|e| {
                KitestError::io(format!("failed to create {}", dest_path.display()), e)
            })?;
            continue;
        }

        if !entry.file_type().is_file() {
            debug!("Skipping special file {}", entry.path().display());
            continue;
        }

        fs::copy(entry.path(), &dest_path).map_err(|e| {
            KitestError::io(
                format!(
                    "failed to copy {} to {}",
                    entry.path().display(),
                    dest_path.display()
                ),
                e,
            )
        })?;
        debug!("Copied: {}", relative_path.display());
        copied.push(relative_path.to_path_buf());
    }

    Ok(copied)
}

/// Apply `replacements` to every text file under `root`.
///
/// Returns the changed files and the files skipped as non-text.
fn replace_in_dir(
    root: &Path,
    replacements: &Replacements,
) -> KitestResult<(Vec<ChangedFile>, Vec<PathBuf>)> {
    let mut changed = Vec::new();
    let mut skipped = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            KitestError::io(format!("failed to walk {}", root.display()), e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative_path = path.strip_prefix(root).unwrap_or(path).to_path_buf();

        let bytes = fs::read(path)
            .map_err(|e| KitestError::io(format!("failed to read {}", path.display()), e))?;
        let old_text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                warn!("Skipping non-UTF-8 file {}", relative_path.display());
                skipped.push(relative_path);
                continue;
            }
        };

        let new_text = replacements.apply(&old_text);
        if new_text == old_text {
            continue;
        }

        fs::write(path, &new_text)
            .map_err(|e| KitestError::io(format!("failed to write {}", path.display()), e))?;

        let name = entry.file_name().to_string_lossy();
        info!("Templated {}\n{}", relative_path.display(), render_changed_file(&name, &new_text));

        changed.push(ChangedFile {
            path: relative_path,
            content: new_text,
        });
    }

    Ok((changed, skipped))
}

// ============================================================================
// Tests
// ============================================================================
