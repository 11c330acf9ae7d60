//! Script bundling with parent theme aliases.
//!
//! The bundler follows CommonJS `require()` calls from a single entry point
//! and emits one self-executing script. `require('parent/js/menu')` reaches
//! into the parent theme named `parent`.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::chain::ThemeChain;
use crate::error::BuildError;
use crate::location::{normalize, split_package, Locator};

/// Script directory inside every theme
pub const SCRIPT_DIR: &str = "js";

/// Name of the bundled script artifact
pub const BUNDLE_FILENAME: &str = "script.js";

/// Package manifest read for a package's entry point
const PACKAGE_MANIFEST: &str = "package.json";

/// Extensions tried, in order, for a specifier without one
const EXTENSIONS: &[&str] = &["js", "json"];

static REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brequire\(\s*["']([^"']+)["']\s*\)"#).expect("require pattern is valid")
});

/// How a matched module is turned into bundle code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    /// Script source, passed through with its requires rewritten
    Script,
    /// JSON literal exposed as `module.exports`
    Json,
}

/// Applies a loader to modules whose path matches `test` and not `exclude`
#[derive(Debug, Clone)]
pub struct LoaderRule {
    pub test: Regex,
    pub exclude: Option<Regex>,
    pub loader: Loader,
}

impl LoaderRule {
    fn applies(&self, path: &str) -> bool {
        self.test.is_match(path) && !self.exclude.as_ref().is_some_and(|e| e.is_match(path))
    }
}

/// Bundler settings for a theme chain
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    pub watch: bool,
    pub output_filename: &'static str,
    /// Parent directory base name to absolute parent directory
    pub aliases: BTreeMap<String, PathBuf>,
    pub rules: Vec<LoaderRule>,
}

impl ScriptConfig {
    pub fn for_chain(chain: &ThemeChain, watch: bool) -> Self {
        let aliases = chain
            .aliases()
            .into_iter()
            .map(|alias| (alias.name, alias.path))
            .collect();

        Self {
            watch,
            output_filename: BUNDLE_FILENAME,
            aliases,
            rules: default_rules(),
        }
    }

    /// Loader for a module path; unmatched modules are treated as scripts
    pub fn loader_for(&self, path: &Path) -> Loader {
        let path = path.to_string_lossy();
        self.rules
            .iter()
            .find(|rule| rule.applies(&path))
            .map_or(Loader::Script, |rule| rule.loader)
    }
}

fn default_rules() -> Vec<LoaderRule> {
    vec![
        LoaderRule {
            test: Regex::new(r"\.jsx?$").expect("script rule is valid"),
            exclude: Some(Regex::new(r"node_modules").expect("exclude rule is valid")),
            loader: Loader::Script,
        },
        LoaderRule {
            test: Regex::new(r"\.json$").expect("json rule is valid"),
            exclude: None,
            loader: Loader::Json,
        },
    ]
}

/// Turns a script entry point into a single bundled script
pub trait ScriptBundler: Send + Sync {
    fn bundle(&self, entry: &Path, config: &ScriptConfig) -> Result<String, BuildError>;
}

/// CommonJS bundler producing one module table and a small loader
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleBundler;

impl ScriptBundler for ModuleBundler {
    fn bundle(&self, entry: &Path, config: &ScriptConfig) -> Result<String, BuildError> {
        let mut graph = ModuleGraph::default();
        graph.intern(normalize(entry));

        while let Some(id) = graph.pending.pop_front() {
            let path = graph.paths[id].clone();
            let body = load_module(&path, config, &mut graph)?;
            graph.bodies[id] = body;
        }

        Ok(graph.render(entry))
    }
}

#[derive(Debug, Default)]
struct ModuleGraph {
    paths: Vec<PathBuf>,
    bodies: Vec<String>,
    ids: HashMap<PathBuf, usize>,
    pending: VecDeque<usize>,
}

impl ModuleGraph {
    /// Module id for a path, queueing it the first time it is seen
    fn intern(&mut self, path: PathBuf) -> usize {
        if let Some(&id) = self.ids.get(&path) {
            return id;
        }
        let id = self.paths.len();
        self.ids.insert(path.clone(), id);
        self.paths.push(path);
        self.bodies.push(String::new());
        self.pending.push_back(id);
        id
    }

    fn render(&self, entry: &Path) -> String {
        let root = entry.parent().unwrap_or(entry);
        let mut out = String::from("(function (modules) {\n");
        out.push_str("  var cache = {};\n");
        out.push_str("  function load(id) {\n");
        out.push_str("    if (cache[id]) return cache[id].exports;\n");
        out.push_str("    var module = cache[id] = { exports: {} };\n");
        out.push_str("    modules[id].call(module.exports, module, module.exports, load);\n");
        out.push_str("    return module.exports;\n");
        out.push_str("  }\n");
        out.push_str("  load(0);\n");
        out.push_str("})([\n");

        for (id, (path, body)) in self.paths.iter().zip(&self.bodies).enumerate() {
            let label = path.strip_prefix(root).unwrap_or(path);
            let _ = writeln!(out, "/* {id}: {} */", label.display());
            out.push_str("function (module, exports, require) {\n");
            out.push_str(body);
            if !body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("},\n");
        }

        out.push_str("]);\n");
        out
    }
}

fn load_module(path: &Path, config: &ScriptConfig, graph: &mut ModuleGraph) -> Result<String, BuildError> {
    let source = fs::read_to_string(path).map_err(|source| BuildError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;

    match config.loader_for(path) {
        Loader::Json => {
            serde_json::from_str::<serde_json::Value>(&source).map_err(|source| {
                BuildError::InvalidJson {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            Ok(format!("module.exports = {};", source.trim()))
        }
        Loader::Script => rewrite_requires(&source, path, config, graph),
    }
}

/// Replace each `require('specifier')` with `require(<module id>)`
fn rewrite_requires(
    source: &str,
    path: &Path,
    config: &ScriptConfig,
    graph: &mut ModuleGraph,
) -> Result<String, BuildError> {
    let from_dir = path.parent().unwrap_or(path);
    let code = code_mask(source);
    let mut out = String::with_capacity(source.len());
    let mut last = 0;

    for caps in REQUIRE.captures_iter(source) {
        let (Some(call), Some(specifier)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if !code[call.start()] {
            continue;
        }
        let target = resolve_specifier(specifier.as_str(), from_dir, config).ok_or_else(|| {
            BuildError::UnresolvedModule {
                specifier: specifier.as_str().to_string(),
                from: path.to_path_buf(),
            }
        })?;
        let id = graph.intern(target);

        out.push_str(&source[last..call.start()]);
        let _ = write!(out, "require({id})");
        last = call.end();
    }

    out.push_str(&source[last..]);
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    LineComment,
    BlockComment,
    Quoted(u8),
}

/// Flags each byte of `source` that lies outside comments and string literals
fn code_mask(source: &str) -> Vec<bool> {
    let bytes = source.as_bytes();
    let mut code = vec![false; bytes.len()];
    let mut state = Scan::Code;
    let mut i = 0;

    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        match (state, bytes[i]) {
            (Scan::Code, b'/') if next == Some(b'/') => {
                state = Scan::LineComment;
                i += 1;
            }
            (Scan::Code, b'/') if next == Some(b'*') => {
                state = Scan::BlockComment;
                i += 1;
            }
            (Scan::Code, quote @ (b'\'' | b'"' | b'`')) => state = Scan::Quoted(quote),
            (Scan::Code, _) => code[i] = true,
            (Scan::LineComment, b'\n') => {
                state = Scan::Code;
                code[i] = true;
            }
            (Scan::BlockComment, b'*') if next == Some(b'/') => {
                state = Scan::Code;
                i += 1;
            }
            (Scan::Quoted(_), b'\\') => i += 1,
            (Scan::Quoted(quote), b) if b == quote => state = Scan::Code,
            _ => {}
        }
        i += 1;
    }

    code
}

fn resolve_specifier(specifier: &str, from_dir: &Path, config: &ScriptConfig) -> Option<PathBuf> {
    if specifier.starts_with("./") || specifier.starts_with("../") {
        return find_file(&from_dir.join(specifier));
    }

    let (name, rest) = specifier.split_once('/').unwrap_or((specifier, ""));
    if let Some(root) = config.aliases.get(name) {
        return if rest.is_empty() {
            find_file(&root.join(SCRIPT_DIR).join("index.js"))
        } else {
            find_file(&root.join(rest))
        };
    }

    resolve_package(specifier, from_dir)
}

/// Installed package in the nearest `node_modules`, by `main` or `index.js`
fn resolve_package(specifier: &str, from_dir: &Path) -> Option<PathBuf> {
    let (name, rest) = split_package(specifier)?;
    let dir = Locator::for_dir(from_dir).find_package(name)?;
    if !rest.is_empty() {
        return find_file(&dir.join(rest));
    }

    package_main(&dir)
        .and_then(|main| find_file(&dir.join(main)))
        .or_else(|| find_file(&dir.join("index.js")))
}

/// `main` field of a package's `package.json`
fn package_main(dir: &Path) -> Option<String> {
    let manifest = fs::read_to_string(dir.join(PACKAGE_MANIFEST)).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&manifest).ok()?;
    manifest.get("main")?.as_str().map(str::to_string)
}

fn find_file(base: &Path) -> Option<PathBuf> {
    candidates(&normalize(base)).into_iter().find(|p| p.is_file())
}

fn candidates(base: &Path) -> Vec<PathBuf> {
    let mut paths = vec![base.to_path_buf()];
    let file_name = base.file_name().map(|n| n.to_string_lossy().to_string());
    if let Some(name) = file_name {
        paths.extend(EXTENSIONS.iter().map(|ext| base.with_file_name(format!("{name}.{ext}"))));
    }
    paths.push(base.join("index.js"));
    paths
}
