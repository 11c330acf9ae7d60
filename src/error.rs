use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// ENOSPC on Unix
const ENOSPC: i32 = 28;

/// Errors surfaced by the [`Theme`](crate::theme::Theme) facade
#[derive(Error, Debug)]
pub enum ThemeError {
    #[error("Invalid output path: {path:?}")]
    InvalidOutputPath { path: PathBuf },

    #[error("Theme::{operation}(): no output directory has been set. Use Theme::output_to() to set one.")]
    NoOutputDirectory { operation: &'static str },

    #[error("No layout file named {layout} found in theme chain")]
    NoLayoutFound { layout: String },

    #[error("Failed to render layout {layout}")]
    Render {
        layout: String,
        #[source]
        source: TemplateError,
    },

    #[error("Build task {task} failed")]
    BuildTask {
        task: Task,
        #[source]
        source: BuildError,
    },

    #[error("Output directory {output} would remove theme {theme} when cleaned")]
    OutputContainsTheme { output: PathBuf, theme: PathBuf },

    #[error("Page path must stay inside the output directory: {path:?}")]
    InvalidPagePath { path: PathBuf },

    #[error("Failed to read the current directory")]
    CurrentDir(#[source] std::io::Error),

    #[error("Failed to write page {path}")]
    WritePage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory: {path}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No space left on device for {path}")]
    DiskFull { path: PathBuf },

    #[error("Failed to read theme.xml: {path}")]
    ReadManifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid theme.xml: {path}")]
    InvalidManifest {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Theme inheritance cycle through {path}")]
    ManifestCycle { path: PathBuf },
}

impl ThemeError {
    /// Map a failed page directory creation, detecting a full disk
    pub(crate) fn create_dir(path: PathBuf, source: std::io::Error) -> Self {
        if source.raw_os_error() == Some(ENOSPC) {
            return ThemeError::DiskFull { path };
        }
        ThemeError::CreateDirFailed { path, source }
    }

    /// Map a failed page write, detecting a full disk
    pub(crate) fn write_page(path: PathBuf, source: std::io::Error) -> Self {
        if source.raw_os_error() == Some(ENOSPC) {
            return ThemeError::DiskFull { path };
        }
        ThemeError::WritePage { path, source }
    }

    pub(crate) fn task(task: Task) -> impl FnOnce(BuildError) -> Self {
        move |source| ThemeError::BuildTask { task, source }
    }
}

/// Build pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Clean,
    Copy,
    Styles,
    Scripts,
    Watch,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Clean => "clean",
            Task::Copy => "copy",
            Task::Styles => "styles",
            Task::Scripts => "scripts",
            Task::Watch => "watch",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures inside a single build task
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Failed to remove {path}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {src} to {dst}")]
    CopyFailed {
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory: {path}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No space left on device for {path}")]
    DiskFull { path: PathBuf },

    #[error("Failed to list {path}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Invalid glob pattern {pattern}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Stylesheet {path} failed to compile: {message}")]
    Stylesheet { path: PathBuf, message: String },

    #[error("Cannot resolve module '{specifier}' from {from}")]
    UnresolvedModule { specifier: String, from: PathBuf },

    #[error("Invalid JSON module {path}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("File watcher failed")]
    Watch(#[from] notify::Error),

    #[error("File watcher disconnected")]
    WatchDisconnected,
}

impl BuildError {
    /// Map a failed directory creation, detecting a full disk
    pub(crate) fn create_dir(path: PathBuf, source: std::io::Error) -> Self {
        if source.raw_os_error() == Some(ENOSPC) {
            return BuildError::DiskFull { path };
        }
        BuildError::CreateDirFailed { path, source }
    }

    /// Map a failed file write, detecting a full disk
    pub(crate) fn write(path: PathBuf, source: std::io::Error) -> Self {
        if source.raw_os_error() == Some(ENOSPC) {
            return BuildError::DiskFull { path };
        }
        BuildError::WriteFailed { path, source }
    }
}

/// Template engine outcome for a single layout file
#[derive(Error, Debug)]
pub enum TemplateError {
    /// The layout file does not exist in this theme
    #[error("Template not found: {path}")]
    Missing { path: PathBuf },

    #[error("Failed to render template {path}")]
    Render {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
