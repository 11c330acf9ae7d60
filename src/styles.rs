//! Stylesheet compilation with parent theme aliases.
//!
//! A theme that inherits others can `@import "parent";` to pull in the
//! parent's `scss/index.scss`, or `@import "parent/grid";` for any other
//! file under the parent's `scss/` directory. The alias is the parent
//! directory's base name.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use grass::{Options, OutputStyle};
use regex::{Captures, Regex};

use crate::chain::ThemeChain;
use crate::error::BuildError;

/// Stylesheet directory inside every theme
pub const SASS_DIR: &str = "scss";

/// Entry stylesheet module imported for a bare alias
const INDEX_MODULE: &str = "index";

/// A parent theme's stylesheet tree, importable by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleModule {
    pub name: String,
    /// Theme directory the module belongs to
    pub root: PathBuf,
}

impl StyleModule {
    /// Directory imports under this alias resolve against
    pub fn sass_dir(&self) -> PathBuf {
        self.root.join(SASS_DIR)
    }
}

/// Import aliases for a chain with parents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleConfig {
    pub modules: Vec<StyleModule>,
}

impl StyleConfig {
    /// None for a chain without parents
    pub fn for_chain(chain: &ThemeChain) -> Option<Self> {
        if !chain.has_parents() {
            return None;
        }

        let modules = chain
            .aliases()
            .into_iter()
            .map(|alias| StyleModule {
                name: alias.name,
                root: alias.path,
            })
            .collect();
        Some(Self { modules })
    }

    /// Absolute import target for an aliased import, if the name is an alias
    fn resolve(&self, import: &str) -> Option<PathBuf> {
        let (name, rest) = match import.split_once('/') {
            Some((name, rest)) => (name, rest),
            None => (import, INDEX_MODULE),
        };

        self.modules
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.sass_dir().join(rest))
    }
}

/// Turns a stylesheet entry point into CSS
pub trait StyleCompiler: Send + Sync {
    fn compile(&self, entry: &Path, config: Option<&StyleConfig>) -> Result<String, BuildError>;
}

/// Stylesheet compiler backed by grass
#[derive(Debug, Clone, Copy, Default)]
pub struct GrassCompiler {
    pub minified: bool,
}

impl StyleCompiler for GrassCompiler {
    fn compile(&self, entry: &Path, config: Option<&StyleConfig>) -> Result<String, BuildError> {
        let fs = AliasFs { config };

        let style = if self.minified {
            OutputStyle::Compressed
        } else {
            OutputStyle::Expanded
        };

        let options = Options::default().fs(&fs).style(style);

        grass::from_path(entry, &options).map_err(|e| BuildError::Stylesheet {
            path: entry.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Real filesystem that rewrites aliased `@import`s to absolute paths on read
#[derive(Debug)]
struct AliasFs<'a> {
    config: Option<&'a StyleConfig>,
}

impl grass::Fs for AliasFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let bytes = std::fs::read(path)?;
        let Some(config) = self.config else {
            return Ok(bytes);
        };

        let is_sass = path
            .extension()
            .is_some_and(|ext| ext == "scss" || ext == "sass");
        if !is_sass {
            return Ok(bytes);
        }

        let source = String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(rewrite_imports(&source, config).into_bytes())
    }
}

static IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(@import\s+)([^;]+);").expect("import pattern is valid"));

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("quoted pattern is valid"));

fn rewrite_imports(source: &str, config: &StyleConfig) -> String {
    IMPORT
        .replace_all(source, |statement: &Captures| {
            let targets = QUOTED.replace_all(&statement[2], |quoted: &Captures| {
                match config.resolve(&quoted[1]) {
                    Some(path) => format!("\"{}\"", path.to_string_lossy().replace('\\', "/")),
                    None => quoted[0].to_string(),
                }
            });
            format!("{}{};", &statement[1], targets)
        })
        .into_owned()
}
