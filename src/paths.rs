//! Glob patterns for each asset category of a theme chain.

use std::path::Path;

use glob::{MatchOptions, Pattern};

use crate::chain::ThemeChain;
use crate::error::BuildError;

/// `*` and `?` never match a path separator
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Patterns to watch per category, in chain order (leaf first)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WatchPathSet {
    /// Root-level files and the `assets/` tree. Re-runs the copy task.
    pub assets: Vec<String>,
    /// Stylesheet sources. Re-runs the styles task.
    pub styles: Vec<String>,
    /// Script sources. Re-runs the scripts task.
    pub scripts: Vec<String>,
}

impl WatchPathSet {
    pub fn for_chain(chain: &ThemeChain) -> Self {
        let mut set = Self::default();

        for dir in chain.iter() {
            set.assets.extend(asset_patterns(dir));
            set.styles.push(format!("{}/scss/**/*.scss", escaped(dir)));
            set.scripts.push(format!("{}/js/**/*.js", escaped(dir)));
        }

        set
    }
}

/// Copyable asset patterns for a single theme directory
pub fn asset_patterns(dir: &Path) -> [String; 2] {
    let root = escaped(dir);
    [format!("{root}/*"), format!("{root}/assets/**/*")]
}

fn escaped(dir: &Path) -> String {
    let dir = dir.to_string_lossy();
    Pattern::escape(dir.trim_end_matches('/'))
}

/// Compiled glob patterns matched as a group
#[derive(Debug, Clone, Default)]
pub struct PatternSet(Vec<Pattern>);

impl PatternSet {
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, BuildError> {
        patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|source| BuildError::Pattern {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// True when any pattern matches the path
    pub fn matches(&self, path: &Path) -> bool {
        self.0
            .iter()
            .any(|pattern| pattern.matches_path_with(path, MATCH_OPTIONS))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
