//! Source file listing for the copy task.
//!
//! Each theme in a chain is listed on its own, relative to its own
//! directory, and the per-theme lists are concatenated leaf first. A single
//! listing across all roots could not keep each file relative to the theme
//! it came from.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::chain::ThemeChain;
use crate::error::BuildError;
use crate::paths::{asset_patterns, PatternSet};

/// Files never copied unless development files are included
const DEV_FILES: &[&str] = &[
    // Theme manifest
    "theme.xml",
    // Package managers
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    // Tooling config
    ".gitignore",
    ".npmignore",
    ".npmrc",
    ".editorconfig",
    ".eslintrc",
    ".eslintrc.json",
    ".babelrc",
    ".DS_Store",
];

/// Directories never descended into unless development files are included
const DEV_DIRECTORIES: &[&str] = &["node_modules", ".git", ".svn", ".hg"];

/// A file found under a theme, with its path relative to that theme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub relative: PathBuf,
}

/// Lists files matching glob patterns, relative to a base directory
pub trait SourceProvider: Send + Sync {
    fn src(&self, patterns: &[String], base: &Path) -> Result<Vec<SourceFile>, BuildError>;
}

/// Walks the base directory and keeps regular files matching any pattern
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkSource {
    /// Also list package manifests, VCS and dependency directories
    pub include_dev: bool,
}

impl WalkSource {
    pub fn new(include_dev: bool) -> Self {
        Self { include_dev }
    }
}

impl SourceProvider for WalkSource {
    fn src(&self, patterns: &[String], base: &Path) -> Result<Vec<SourceFile>, BuildError> {
        let patterns = PatternSet::compile(patterns)?;
        if !base.is_dir() {
            tracing::debug!(base = %base.display(), "theme directory missing, nothing to list");
            return Ok(Vec::new());
        }

        let include_dev = self.include_dev;
        let walker = WalkDir::new(base)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| include_dev || e.depth() == 0 || !is_dev_directory(e.file_name()));

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| BuildError::Walk {
                path: source.path().unwrap_or(base).to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() || !patterns.matches(entry.path()) {
                continue;
            }

            let path = entry.into_path();
            let relative = path.strip_prefix(base).unwrap_or(&path).to_path_buf();
            if include_dev || !is_dev_file(&relative) {
                files.push(SourceFile { path, relative });
            }
        }

        Ok(files)
    }
}

#[inline]
fn is_dev_directory(name: &OsStr) -> bool {
    name.to_str().is_some_and(|n| DEV_DIRECTORIES.contains(&n))
}

/// Checks a path relative to its theme directory
#[inline]
fn is_dev_file(relative: &Path) -> bool {
    let in_dev_dir = relative.components().any(|c| match c {
        Component::Normal(name) => is_dev_directory(name),
        _ => false,
    });
    in_dev_dir
        || relative
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|name| DEV_FILES.contains(&name))
}

/// One listing per chain entry, concatenated leaf first
pub fn merge_asset_streams(
    provider: &dyn SourceProvider,
    chain: &ThemeChain,
) -> Result<Vec<SourceFile>, BuildError> {
    let mut merged = Vec::new();
    for dir in chain.iter() {
        merged.extend(provider.src(&asset_patterns(dir), dir)?);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use std::fs;
    use tempfile::TempDir;

    fn relatives(files: &[SourceFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.relative.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_walk_source_lists_root_files_and_assets() {
        let temp = TempDir::new().unwrap();
        let base = fixtures::base_theme(temp.path());

        let files = WalkSource::default()
            .src(&asset_patterns(&base), &base)
            .unwrap();

        let names = relatives(&files);
        assert!(names.contains(&"robots.txt".to_string()));
        assert!(names.contains(&"assets/asset.txt".to_string()));
        assert!(!names.iter().any(|n| n.starts_with("templates/")));
        assert!(!names.iter().any(|n| n.starts_with("scss/")));
    }

    #[test]
    fn test_walk_source_skips_dev_files() {
        let temp = TempDir::new().unwrap();
        let base = fixtures::base_theme(temp.path());
        fs::write(base.join("package.json"), "{}").unwrap();
        fs::create_dir_all(base.join("assets").join("node_modules").join("x")).unwrap();
        fs::write(base.join("assets/node_modules/x/index.js"), "").unwrap();

        let names = relatives(&WalkSource::default().src(&asset_patterns(&base), &base).unwrap());
        assert!(!names.contains(&"package.json".to_string()));
        assert!(!names.iter().any(|n| n.contains("node_modules")));

        let names = relatives(&WalkSource::new(true).src(&asset_patterns(&base), &base).unwrap());
        assert!(names.contains(&"package.json".to_string()));
        assert!(names.contains(&"assets/node_modules/x/index.js".to_string()));
    }

    #[test]
    fn test_walk_source_missing_base_is_empty() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        let files = WalkSource::default()
            .src(&asset_patterns(&missing), &missing)
            .unwrap();
        assert!(files.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_source_reports_symlink_loop() {
        let temp = TempDir::new().unwrap();
        let base = fixtures::base_theme(temp.path());
        std::os::unix::fs::symlink(&base, base.join("assets").join("loop")).unwrap();

        let err = WalkSource::default()
            .src(&asset_patterns(&base), &base)
            .unwrap_err();

        match err {
            BuildError::Walk { path, .. } => assert!(path.starts_with(&base)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_merge_keeps_each_theme_relative_base() {
        let temp = TempDir::new().unwrap();
        let parent = fixtures::parent_theme(temp.path());
        let base = fixtures::base_theme(temp.path());
        let chain = ThemeChain::inherit(base.clone(), Some(&ThemeChain::leaf(parent.clone())));

        let merged = merge_asset_streams(&WalkSource::default(), &chain).unwrap();

        // Leaf files come first
        assert!(merged[0].path.starts_with(&base));
        let parent_asset = merged
            .iter()
            .find(|f| f.path.starts_with(&parent) && f.relative.ends_with("parent.txt"))
            .unwrap();
        assert_eq!(parent_asset.relative, PathBuf::from("assets").join("parent.txt"));
    }
}
