//! Theme location resolution.
//!
//! A theme identifier is either an installed package name or a path.
//! Package roots are searched first; anything else falls back to a path
//! relative to a base directory. Resolution never fails: whether the
//! directory exists is checked later by whoever reads from it.

use std::env;
use std::io;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR_STR};

/// Directory name package roots are found under
const PACKAGE_DIR: &str = "node_modules";

/// Resolves theme identifiers to absolute directories
#[derive(Debug, Clone, Default)]
pub struct Locator {
    /// Package roots, searched in order
    package_roots: Vec<PathBuf>,
}

impl Locator {
    pub fn new(package_roots: Vec<PathBuf>) -> Self {
        Self { package_roots }
    }

    /// Package roots for the current directory and each of its ancestors
    pub fn from_env() -> Self {
        env::current_dir()
            .map(|cwd| Self::for_dir(&cwd))
            .unwrap_or_default()
    }

    /// Package roots for `dir` and each of its ancestors, nearest first
    pub fn for_dir(dir: &Path) -> Self {
        Self::new(dir.ancestors().map(|dir| dir.join(PACKAGE_DIR)).collect())
    }

    pub fn package_roots(&self) -> &[PathBuf] {
        &self.package_roots
    }

    /// Resolve an identifier against the current directory.
    ///
    /// When the current directory cannot be read, paths resolve against the
    /// filesystem root so the result is still absolute.
    pub fn resolve(&self, id: &str) -> PathBuf {
        self.resolve_from(id, &base_dir(env::current_dir()))
    }

    /// Resolve an identifier, falling back to a path relative to `base`
    pub fn resolve_from(&self, id: &str, base: &Path) -> PathBuf {
        if let Some(dir) = self.find_package(id) {
            return dir;
        }
        normalize(&base.join(id))
    }

    /// Installed directory of a package name
    pub(crate) fn find_package(&self, id: &str) -> Option<PathBuf> {
        if !is_package_name(id) {
            return None;
        }

        self.package_roots
            .iter()
            .map(|root| root.join(id))
            .find(|dir| dir.is_dir())
            .map(|dir| normalize(&dir))
    }
}

/// Bare names and `@scope/name` are package names; anything path-like is not
fn is_package_name(id: &str) -> bool {
    if id.is_empty() || id.starts_with('.') || Path::new(id).is_absolute() {
        return false;
    }

    let mut parts = id.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) => {
            !name.is_empty() && !name.starts_with('@') && !name.contains('\\')
        }
        (Some(scope), Some(name), None) => scope.starts_with('@') && scope.len() > 1 && !name.is_empty(),
        _ => false,
    }
}

fn base_dir(cwd: io::Result<PathBuf>) -> PathBuf {
    cwd.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "current directory unavailable, resolving from root");
        PathBuf::from(MAIN_SEPARATOR_STR)
    })
}

/// Remove `.` and `..` components without touching the filesystem
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Split `name/sub/path` or `@scope/name/sub/path` into package name and subpath
pub(crate) fn split_package(specifier: &str) -> Option<(&str, &str)> {
    let split_at = if specifier.starts_with('@') {
        let scope_end = specifier.find('/')?;
        specifier[scope_end + 1..]
            .find('/')
            .map(|i| scope_end + 1 + i)
    } else {
        specifier.find('/')
    };

    let (name, rest) = match split_at {
        Some(i) => (&specifier[..i], &specifier[i + 1..]),
        None => (specifier, ""),
    };
    is_package_name(name).then_some((name, rest))
}
