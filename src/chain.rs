//! Theme inheritance chains.
//!
//! A chain is the ordered list of theme directories a theme draws from:
//! the theme itself first, then its parent, grandparent, and so on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Ordered theme directories, leaf first. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeChain(Arc<[PathBuf]>);

/// A parent theme reachable by name from a child's sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    /// Base name of the parent directory
    pub name: String,
    /// Absolute parent directory
    pub path: PathBuf,
}

impl ThemeChain {
    /// Chain for a theme without a parent
    pub fn leaf(dir: PathBuf) -> Self {
        Self(Arc::from(vec![dir]))
    }

    /// Chain for `dir` inheriting everything `parent` inherits
    pub fn inherit(dir: PathBuf, parent: Option<&ThemeChain>) -> Self {
        let Some(parent) = parent else {
            return Self::leaf(dir);
        };

        let mut dirs = Vec::with_capacity(parent.len() + 1);
        dirs.push(dir);
        dirs.extend(parent.iter().map(Path::to_path_buf));
        Self(Arc::from(dirs))
    }

    /// The theme this chain belongs to
    #[inline]
    pub fn leaf_dir(&self) -> &Path {
        &self.0[0]
    }

    /// Every ancestor directory, nearest first
    #[inline]
    pub fn parents(&self) -> &[PathBuf] {
        &self.0[1..]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn has_parents(&self) -> bool {
        self.0.len() > 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.0
    }

    /// Name every parent by its directory base name.
    ///
    /// When two parents share a base name the nearest one keeps it.
    pub fn aliases(&self) -> Vec<Alias> {
        let mut aliases: Vec<Alias> = Vec::with_capacity(self.parents().len());

        for parent in self.parents() {
            let Some(name) = parent.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            if aliases.iter().any(|a| a.name == name) {
                tracing::debug!(alias = %name, path = %parent.display(), "alias shadowed by nearer theme");
                continue;
            }
            aliases.push(Alias {
                name,
                path: parent.clone(),
            });
        }

        aliases
    }
}

impl<'a> IntoIterator for &'a ThemeChain {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
