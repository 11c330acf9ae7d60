use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::BuildError;
use crate::sources::SourceFile;

/// Copy a single file from src to dst
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64, BuildError> {
    // Create parent directory if needed
    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| BuildError::create_dir(parent.to_path_buf(), e))?;
        }
    }

    fs::copy(src, dst).map_err(|e| {
        // ENOSPC = 28 on Unix
        if e.raw_os_error() == Some(28) {
            return BuildError::DiskFull {
                path: dst.to_path_buf(),
            };
        }
        BuildError::CopyFailed {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            source: e,
        }
    })
}

/// Write a file, creating its parent directories first
pub fn write_file(dst: &Path, contents: &[u8]) -> Result<u64, BuildError> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::create_dir(parent.to_path_buf(), e))?;
    }
    fs::write(dst, contents).map_err(|e| BuildError::write(dst.to_path_buf(), e))?;
    Ok(contents.len() as u64)
}

/// Remove a directory tree; a missing directory is not an error
pub fn remove_dir(path: &Path) -> Result<(), BuildError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Drop later files whose relative path an earlier file already claims
pub fn with_overrides(sources: Vec<SourceFile>) -> Vec<SourceFile> {
    let mut seen: HashSet<PathBuf> = HashSet::with_capacity(sources.len());
    sources
        .into_iter()
        .filter(|file| seen.insert(file.relative.clone()))
        .collect()
}

/// Copy merged sources into `dst` in parallel, returns (files_copied, bytes_copied).
///
/// Sources are expected leaf first: the first file for a relative path wins.
pub fn copy_sources(sources: Vec<SourceFile>, dst: &Path) -> Result<(u64, u64), BuildError> {
    let files = with_overrides(sources);

    let bytes = files
        .par_iter()
        .map(|file| copy_file(&file.path, &dst.join(&file.relative)))
        .collect::<Result<Vec<u64>, _>>()?;

    Ok((bytes.len() as u64, bytes.iter().sum()))
}
