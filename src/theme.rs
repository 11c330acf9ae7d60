//! The theme facade: a resolved chain plus an optional output binding.

use std::env;
use std::fs;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::AtomicBool;

use serde_json::Value;
use tracing::{debug, info};

use crate::chain::ThemeChain;
use crate::error::ThemeError;
use crate::location::{normalize, Locator};
use crate::pipeline::{BuildReport, Compiler, Toolchain};
use crate::template::{render_layout, DEFAULT_LAYOUT};

/// A theme and everything it inherits
#[derive(Debug, Clone)]
pub struct Theme {
    chain: ThemeChain,
    toolchain: Toolchain,
    /// Present once an output directory has been bound
    compiler: Option<Compiler>,
}

impl Theme {
    /// Resolve `id` as a package or a path relative to the current directory
    pub fn new(id: &str, parent: Option<&Theme>) -> Self {
        Self::with_locator(&Locator::from_env(), id, parent)
    }

    /// Resolve `id` with an explicit locator
    pub fn with_locator(locator: &Locator, id: &str, parent: Option<&Theme>) -> Self {
        Self::from_dir(locator.resolve(id), parent)
    }

    /// Theme rooted at an already resolved directory
    pub fn from_dir(dir: PathBuf, parent: Option<&Theme>) -> Self {
        let chain = ThemeChain::inherit(dir, parent.map(Theme::chain));
        debug!(
            theme = %chain.leaf_dir().display(),
            depth = chain.len(),
            "resolved theme chain"
        );
        Self {
            chain,
            toolchain: Toolchain::default(),
            compiler: None,
        }
    }

    /// Replace the tools this theme builds and renders with
    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        if let Some(compiler) = self.compiler.take() {
            self.compiler = Some(Compiler::new(
                self.chain.clone(),
                compiler.dest().to_path_buf(),
                toolchain.clone(),
            ));
        }
        self.toolchain = toolchain;
        self
    }

    pub fn chain(&self) -> &ThemeChain {
        &self.chain
    }

    /// The theme's own directory
    pub fn location(&self) -> &Path {
        self.chain.leaf_dir()
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.compiler.as_ref().map(Compiler::dest)
    }

    /// Bind the output directory; relative paths are taken from the current directory.
    ///
    /// Binding again replaces the previous directory.
    pub fn output_to(&mut self, path: impl AsRef<Path>) -> Result<(), ThemeError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ThemeError::InvalidOutputPath {
                path: path.to_path_buf(),
            });
        }

        let dest = if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&env::current_dir().map_err(ThemeError::CurrentDir)?.join(path))
        };

        // Cleaning would delete the theme sources
        if let Some(theme) = self.chain.iter().find(|dir| normalize(dir).starts_with(&dest)) {
            return Err(ThemeError::OutputContainsTheme {
                output: dest,
                theme: theme.to_path_buf(),
            });
        }

        debug!(dest = %dest.display(), "output directory bound");
        self.compiler = Some(Compiler::new(
            self.chain.clone(),
            dest,
            self.toolchain.clone(),
        ));
        Ok(())
    }

    /// Render a layout, searching the chain leaf first
    pub fn compile_string(&self, data: &Value, layout: Option<&str>) -> Result<String, ThemeError> {
        render_layout(
            &self.chain,
            self.toolchain.templates.as_ref(),
            layout.unwrap_or(DEFAULT_LAYOUT),
            data,
        )
    }

    /// Render a layout and write it to `dest` under the output directory
    pub fn compile_page(
        &self,
        dest: impl AsRef<Path>,
        data: &Value,
        layout: Option<&str>,
    ) -> Result<PathBuf, ThemeError> {
        let compiler = self.bound("compile_page")?;

        let path = page_path(compiler.dest(), dest.as_ref())?;
        let html = self.compile_string(data, layout)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ThemeError::create_dir(parent.to_path_buf(), source))?;
        }
        fs::write(&path, html).map_err(|source| ThemeError::write_page(path.clone(), source))?;

        info!(page = %path.display(), "page written");
        Ok(path)
    }

    /// Run the asset build once
    pub fn build(&self) -> Result<BuildReport, ThemeError> {
        self.bound("build")?.run()
    }

    /// Build, then rebuild changed parts until `shutdown` is set.
    ///
    /// Failed builds are handed to `on_error` without ending the watch.
    pub fn build_and_watch<F>(&self, shutdown: &AtomicBool, on_error: F) -> Result<(), ThemeError>
    where
        F: FnMut(ThemeError),
    {
        self.bound("build_and_watch")?
            .run_and_watch(shutdown, on_error)
    }

    fn bound(&self, operation: &'static str) -> Result<&Compiler, ThemeError> {
        self.compiler
            .as_ref()
            .ok_or(ThemeError::NoOutputDirectory { operation })
    }
}

/// `dest` joined under `root`; absolute or escaping paths are rejected
fn page_path(root: &Path, dest: &Path) -> Result<PathBuf, ThemeError> {
    let invalid = || ThemeError::InvalidPagePath {
        path: dest.to_path_buf(),
    };

    let mut parts: Vec<&OsStr> = Vec::new();
    for component in dest.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop().ok_or_else(invalid)?;
            }
            Component::RootDir | Component::Prefix(_) => return Err(invalid()),
        }
    }

    if parts.is_empty() {
        return Err(invalid());
    }
    Ok(parts.iter().fold(root.to_path_buf(), |path, part| path.join(part)))
}
