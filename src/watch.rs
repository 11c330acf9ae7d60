//! Debounced filesystem watching over every theme directory of a chain.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tracing::{debug, info};

use crate::chain::ThemeChain;
use crate::error::{BuildError, Task};
use crate::paths::{PatternSet, WatchPathSet};

/// Window rapid changes are coalesced in
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Compiled watch patterns, one set per re-runnable task
#[derive(Debug, Clone)]
pub struct TaskPatterns {
    assets: PatternSet,
    styles: PatternSet,
    scripts: PatternSet,
}

impl TaskPatterns {
    pub fn compile(paths: &WatchPathSet) -> Result<Self, BuildError> {
        Ok(Self {
            assets: PatternSet::compile(&paths.assets)?,
            styles: PatternSet::compile(&paths.styles)?,
            scripts: PatternSet::compile(&paths.scripts)?,
        })
    }

    /// Tasks affected by a batch of changed paths, each listed once, in
    /// copy, styles, scripts order
    pub fn classify<'a, I>(&self, paths: I) -> Vec<Task>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let (mut copy, mut styles, mut scripts) = (false, false, false);
        for path in paths {
            copy |= self.assets.matches(path);
            styles |= self.styles.matches(path);
            scripts |= self.scripts.matches(path);
        }

        [(copy, Task::Copy), (styles, Task::Styles), (scripts, Task::Scripts)]
            .into_iter()
            .filter_map(|(hit, task)| hit.then_some(task))
            .collect()
    }
}

/// Watches theme directories and hands out debounced batches of changed paths
pub struct ThemeWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    events: Receiver<DebounceEventResult>,
}

impl ThemeWatcher {
    pub fn new(chain: &ThemeChain, debounce: Duration) -> Result<Self, BuildError> {
        let (tx, events) = mpsc::channel();
        let mut debouncer = new_debouncer(debounce, tx)?;

        for dir in chain.iter() {
            if !dir.is_dir() {
                debug!(path = %dir.display(), "skipping missing theme directory");
                continue;
            }
            debouncer.watcher().watch(dir, RecursiveMode::Recursive)?;
        }

        info!(
            themes = chain.len(),
            debounce_ms = debounce.as_millis() as u64,
            "watching theme sources"
        );

        Ok(Self {
            _debouncer: debouncer,
            events,
        })
    }

    /// Wait up to `timeout` for the next batch.
    ///
    /// `Ok(None)` means nothing changed in time.
    pub fn next_batch(&self, timeout: Duration) -> Result<Option<Vec<PathBuf>>, BuildError> {
        match self.events.recv_timeout(timeout) {
            Ok(Ok(events)) => Ok(Some(events.into_iter().map(|e| e.path).collect())),
            Ok(Err(e)) => Err(BuildError::Watch(e)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BuildError::WatchDisconnected),
        }
    }
}
