//! Layered asset build for a theme chain.
//!
//! A build cleans the output directory, then copies assets, compiles the
//! leaf theme's stylesheet and bundles its script. The last three write to
//! disjoint parts of the output (root, `css/`, `js/`) and run in parallel.
//! Watch mode re-runs only the task whose sources changed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::chain::ThemeChain;
use crate::copier::{copy_sources, remove_dir, write_file};
use crate::error::{BuildError, Task, ThemeError};
use crate::paths::WatchPathSet;
use crate::scripts::{ModuleBundler, ScriptBundler, ScriptConfig, SCRIPT_DIR};
use crate::sources::{merge_asset_streams, SourceProvider, WalkSource};
use crate::styles::{GrassCompiler, StyleCompiler, StyleConfig, SASS_DIR};
use crate::template::{TemplateEngine, TeraEngine};
use crate::watch::{TaskPatterns, ThemeWatcher, DEFAULT_DEBOUNCE};

/// Entry file name of the stylesheet and script trees
const ENTRY_STEM: &str = "index";

/// Output directory and name of the compiled stylesheet
pub const CSS_DIR: &str = "css";
pub const STYLESHEET_FILENAME: &str = "style.css";

/// How often watch mode checks the shutdown flag
const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

/// External tools a theme builds and renders with
#[derive(Clone)]
pub struct Toolchain {
    pub sources: Arc<dyn SourceProvider>,
    pub styles: Arc<dyn StyleCompiler>,
    pub scripts: Arc<dyn ScriptBundler>,
    pub templates: Arc<dyn TemplateEngine>,
    pub debounce: Duration,
}

impl Toolchain {
    /// Default tools, optionally copying development files
    pub fn new(include_dev: bool) -> Self {
        Self {
            sources: Arc::new(WalkSource::new(include_dev)),
            styles: Arc::new(GrassCompiler::default()),
            scripts: Arc::new(ModuleBundler),
            templates: Arc::new(TeraEngine),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain")
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

/// Outcome of a one-shot build
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub files_copied: u64,
    pub bytes_copied: u64,
    /// Compiled stylesheet, if the theme has a stylesheet entry
    pub stylesheet: Option<PathBuf>,
    /// Bundled script, if the theme has a script entry
    pub script: Option<PathBuf>,
    pub duration: Duration,
}

/// A build bound to one chain and one output directory
#[derive(Debug, Clone)]
pub struct Compiler {
    chain: ThemeChain,
    dest: PathBuf,
    toolchain: Toolchain,
}

impl Compiler {
    pub fn new(chain: ThemeChain, dest: PathBuf, toolchain: Toolchain) -> Self {
        Self {
            chain,
            dest,
            toolchain,
        }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn chain(&self) -> &ThemeChain {
        &self.chain
    }

    /// Clean, then copy, compile styles and bundle scripts in parallel
    pub fn run(&self) -> Result<BuildReport, ThemeError> {
        self.run_with(false)
    }

    /// Build once, then re-run tasks as their sources change until `shutdown` is set.
    ///
    /// Task failures go to `on_error` and watching continues. Only a failing
    /// watcher ends the loop early.
    pub fn run_and_watch<F>(&self, shutdown: &AtomicBool, mut on_error: F) -> Result<(), ThemeError>
    where
        F: FnMut(ThemeError),
    {
        let paths = WatchPathSet::for_chain(&self.chain);
        let patterns = TaskPatterns::compile(&paths).map_err(ThemeError::task(Task::Watch))?;
        let watcher = ThemeWatcher::new(&self.chain, self.toolchain.debounce)
            .map_err(ThemeError::task(Task::Watch))?;

        if let Err(e) = self.run_with(true) {
            on_error(e);
        }

        while !shutdown.load(Ordering::Relaxed) {
            let Some(batch) = watcher
                .next_batch(SHUTDOWN_POLL)
                .map_err(ThemeError::task(Task::Watch))?
            else {
                continue;
            };

            let tasks = patterns.classify(batch.iter().map(PathBuf::as_path));
            if tasks.is_empty() {
                continue;
            }

            info!(changed = batch.len(), ?tasks, "sources changed");
            self.rerun(&tasks, &mut on_error);
        }

        debug!("watch stopped");
        Ok(())
    }

    fn run_with(&self, watch: bool) -> Result<BuildReport, ThemeError> {
        let start = Instant::now();

        self.clean().map_err(ThemeError::task(Task::Clean))?;

        let (copied, (stylesheet, script)) = rayon::join(
            || self.copy(),
            || rayon::join(|| self.compile_styles(), || self.compile_scripts(watch)),
        );

        let (files_copied, bytes_copied) = copied.map_err(ThemeError::task(Task::Copy))?;
        let stylesheet = stylesheet.map_err(ThemeError::task(Task::Styles))?;
        let script = script.map_err(ThemeError::task(Task::Scripts))?;

        let report = BuildReport {
            files_copied,
            bytes_copied,
            stylesheet,
            script,
            duration: start.elapsed(),
        };
        info!(
            files = report.files_copied,
            elapsed_ms = report.duration.as_millis() as u64,
            dest = %self.dest.display(),
            "build finished"
        );
        Ok(report)
    }

    /// Re-run tasks after a change; never cleans.
    ///
    /// A failed task does not stop the others in the batch.
    fn rerun<F>(&self, tasks: &[Task], on_error: &mut F)
    where
        F: FnMut(ThemeError),
    {
        for &task in tasks {
            let result = match task {
                Task::Copy => self.copy().map(|_| ()),
                Task::Styles => self.compile_styles().map(|_| ()),
                Task::Scripts => self.compile_scripts(true).map(|_| ()),
                Task::Clean | Task::Watch => Ok(()),
            };
            match result {
                Ok(()) => info!(%task, "task re-run"),
                Err(e) => on_error(ThemeError::task(task)(e)),
            }
        }
    }

    fn clean(&self) -> Result<(), BuildError> {
        debug!(dest = %self.dest.display(), "cleaning output");
        remove_dir(&self.dest)
    }

    fn copy(&self) -> Result<(u64, u64), BuildError> {
        debug!("copying assets");
        let sources = merge_asset_streams(self.toolchain.sources.as_ref(), &self.chain)?;
        copy_sources(sources, &self.dest)
    }

    fn compile_styles(&self) -> Result<Option<PathBuf>, BuildError> {
        let entry = self
            .chain
            .leaf_dir()
            .join(SASS_DIR)
            .join(format!("{ENTRY_STEM}.scss"));
        if !entry.is_file() {
            debug!(entry = %entry.display(), "no stylesheet entry");
            return Ok(None);
        }

        debug!(entry = %entry.display(), "compiling stylesheet");
        let config = StyleConfig::for_chain(&self.chain);
        let css = self.toolchain.styles.compile(&entry, config.as_ref())?;

        let out = self.dest.join(CSS_DIR).join(STYLESHEET_FILENAME);
        write_file(&out, css.as_bytes())?;
        Ok(Some(out))
    }

    fn compile_scripts(&self, watch: bool) -> Result<Option<PathBuf>, BuildError> {
        let entry = self
            .chain
            .leaf_dir()
            .join(SCRIPT_DIR)
            .join(format!("{ENTRY_STEM}.js"));
        if !entry.is_file() {
            debug!(entry = %entry.display(), "no script entry");
            return Ok(None);
        }

        debug!(entry = %entry.display(), watch, "bundling scripts");
        let config = ScriptConfig::for_chain(&self.chain, watch);
        let bundle = self.toolchain.scripts.bundle(&entry, &config)?;

        let out = self.dest.join(SCRIPT_DIR).join(config.output_filename);
        write_file(&out, bundle.as_bytes())?;
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use std::collections::BTreeSet;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn file_set(dir: &Path) -> BTreeSet<PathBuf> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().strip_prefix(dir).unwrap().to_path_buf())
            .collect()
    }

    #[test]
    fn test_build_produces_all_outputs() {
        let temp = TempDir::new().unwrap();
        let base = fixtures::base_theme(temp.path());
        let out = temp.path().join("dist");
        let compiler = Compiler::new(ThemeChain::leaf(base), out.clone(), Toolchain::default());

        let report = compiler.run().unwrap();

        assert!(out.join("robots.txt").exists());
        assert!(out.join("assets").join("asset.txt").exists());
        assert!(out.join("css").join("style.css").exists());
        assert!(out.join("js").join("script.js").exists());
        assert_eq!(report.files_copied, 2);
        assert_eq!(report.stylesheet, Some(out.join("css").join("style.css")));
        assert_eq!(report.script, Some(out.join("js").join("script.js")));
    }

    #[test]
    fn test_build_twice_same_files() {
        let temp = TempDir::new().unwrap();
        let base = fixtures::base_theme(temp.path());
        let out = temp.path().join("dist");
        let compiler = Compiler::new(ThemeChain::leaf(base), out.clone(), Toolchain::default());

        compiler.run().unwrap();
        let first = file_set(&out);
        fs::write(out.join("stale.txt"), "left over").unwrap();
        compiler.run().unwrap();

        assert_eq!(file_set(&out), first);
    }

    #[test]
    fn test_build_inherited_chain() {
        let temp = TempDir::new().unwrap();
        let parent = fixtures::parent_theme(temp.path());
        let child = fixtures::child_theme(temp.path());
        let chain = ThemeChain::inherit(child, Some(&ThemeChain::leaf(parent)));
        let out = temp.path().join("dist");

        Compiler::new(chain, out.clone(), Toolchain::default())
            .run()
            .unwrap();

        assert_eq!(
            fs::read_to_string(out.join("robots.txt")).unwrap(),
            "User-agent: child\n"
        );
        assert!(out.join("assets").join("parent.txt").exists());
        let css = fs::read_to_string(out.join("css").join("style.css")).unwrap();
        assert!(css.contains(".parent"));
        assert!(css.contains(".child"));
        let js = fs::read_to_string(out.join("js").join("script.js")).unwrap();
        assert!(js.contains("from parent"));
    }

    #[test]
    fn test_build_without_entries_skips_compilers() {
        let temp = TempDir::new().unwrap();
        let theme = temp.path().join("plain");
        fs::create_dir_all(&theme).unwrap();
        fs::write(theme.join("favicon.ico"), "ico").unwrap();
        let out = temp.path().join("dist");

        let report = Compiler::new(ThemeChain::leaf(theme), out.clone(), Toolchain::default())
            .run()
            .unwrap();

        assert!(report.stylesheet.is_none());
        assert!(report.script.is_none());
        assert!(out.join("favicon.ico").exists());
        assert!(!out.join("css").exists());
    }

    #[derive(Debug)]
    struct FailingStyles;

    impl StyleCompiler for FailingStyles {
        fn compile(&self, entry: &Path, _config: Option<&StyleConfig>) -> Result<String, BuildError> {
            Err(BuildError::Stylesheet {
                path: entry.to_path_buf(),
                message: "broken".to_string(),
            })
        }
    }

    #[test]
    fn test_failed_task_reported_and_other_output_kept() {
        let temp = TempDir::new().unwrap();
        let base = fixtures::base_theme(temp.path());
        let out = temp.path().join("dist");
        let toolchain = Toolchain {
            styles: Arc::new(FailingStyles),
            ..Toolchain::default()
        };

        let err = Compiler::new(ThemeChain::leaf(base), out.clone(), toolchain)
            .run()
            .unwrap_err();

        match err {
            ThemeError::BuildTask { task, .. } => assert_eq!(task, Task::Styles),
            other => panic!("unexpected error: {other:?}"),
        }
        // No rollback of tasks that succeeded
        assert!(out.join("robots.txt").exists());
        assert!(!out.join("css").join("style.css").exists());
    }

    #[test]
    fn test_watch_stops_on_shutdown() {
        let temp = TempDir::new().unwrap();
        let base = fixtures::base_theme(temp.path());
        let out = temp.path().join("dist");
        let compiler = Compiler::new(ThemeChain::leaf(base), out.clone(), Toolchain::default());
        let shutdown = AtomicBool::new(true);

        compiler.run_and_watch(&shutdown, |e| panic!("unexpected error: {e}")).unwrap();

        // The initial build still ran
        assert!(out.join("js").join("script.js").exists());
    }

    #[test]
    fn test_watch_reruns_changed_task() {
        let temp = TempDir::new().unwrap();
        // Canonicalize to handle macOS /var -> /private/var symlinks
        let root = temp.path().canonicalize().unwrap();
        let base = fixtures::base_theme(&root);
        let out = root.join("dist");
        let toolchain = Toolchain {
            debounce: Duration::from_millis(50),
            ..Toolchain::default()
        };
        let compiler = Compiler::new(ThemeChain::leaf(base.clone()), out.clone(), toolchain);
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || compiler.run_and_watch(&shutdown, |e| panic!("unexpected error: {e}")))
        };

        let robots = out.join("robots.txt");
        let deadline = Instant::now() + Duration::from_secs(10);
        while !robots.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        // Let the watcher settle before changing sources
        thread::sleep(Duration::from_millis(200));
        fs::write(base.join("robots.txt"), "User-agent: changed\n").unwrap();

        let mut updated = false;
        while Instant::now() < deadline {
            if fs::read_to_string(&robots).unwrap_or_default() == "User-agent: changed\n" {
                updated = true;
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }

        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap().unwrap();
        assert!(updated);
    }

    /// Wait until `check` holds or the deadline passes
    fn wait_for(deadline: Instant, mut check: impl FnMut() -> bool) -> bool {
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn test_watch_survives_failed_task() {
        let temp = TempDir::new().unwrap();
        // Canonicalize to handle macOS /var -> /private/var symlinks
        let root = temp.path().canonicalize().unwrap();
        let base = fixtures::base_theme(&root);
        let out = root.join("dist");
        let toolchain = Toolchain {
            debounce: Duration::from_millis(50),
            ..Toolchain::default()
        };
        let compiler = Compiler::new(ThemeChain::leaf(base.clone()), out.clone(), toolchain);
        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, errors) = std::sync::mpsc::channel();

        let handle = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                compiler.run_and_watch(&shutdown, |e| {
                    let _ = tx.send(e);
                })
            })
        };

        let css = out.join("css").join("style.css");
        let deadline = Instant::now() + Duration::from_secs(15);
        assert!(wait_for(deadline, || css.exists()));
        thread::sleep(Duration::from_millis(200));

        let entry = base.join("scss").join("index.scss");
        fs::write(&entry, "body { color: ").unwrap();
        let err = errors.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(matches!(
            err,
            ThemeError::BuildTask {
                task: Task::Styles,
                ..
            }
        ));
        assert!(!handle.is_finished());

        fs::write(&entry, ".fixed { color: #123456; }").unwrap();
        let recovered = wait_for(deadline, || {
            fs::read_to_string(&css).unwrap_or_default().contains("#123456")
        });

        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap().unwrap();
        assert!(recovered);
    }
}
