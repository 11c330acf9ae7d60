//! Layout rendering with fallback through the theme chain.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tera::{Context, Tera};

use crate::chain::ThemeChain;
use crate::error::{TemplateError, ThemeError};

/// Layout used when none is requested
pub const DEFAULT_LAYOUT: &str = "default";

/// Template directory inside every theme
pub const TEMPLATE_DIR: &str = "templates";

/// Extension of layout files
pub const TEMPLATE_EXTENSION: &str = "html";

static TEMPLATE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%-?\s*(?:extends|include|import)\s+([^%]*)%\}").expect("template tag pattern is valid")
});

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'`]([^"'`]+)["'`]"#).expect("quoted pattern is valid"));

/// Renders a single template file with data
pub trait TemplateEngine: Send + Sync {
    /// Render `path`. Templates it includes, extends or imports are looked up
    /// by name in `search`, nearest first.
    ///
    /// Fails with [`TemplateError::Missing`] when the file does not exist
    fn render(&self, path: &Path, search: &[PathBuf], data: &Value) -> Result<String, TemplateError>;
}

/// Template engine backed by tera
#[derive(Debug, Clone, Copy, Default)]
pub struct TeraEngine;

impl TemplateEngine for TeraEngine {
    fn render(&self, path: &Path, search: &[PathBuf], data: &Value) -> Result<String, TemplateError> {
        let source = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TemplateError::Missing {
                path: path.to_path_buf(),
            },
            _ => render_error(path, e),
        })?;

        let context = match data {
            Value::Null => Context::new(),
            other => Context::from_value(other.clone()).map_err(|e| render_error(path, e))?,
        };

        let name = template_name(path, search);
        let templates =
            collect_templates(&name, source, search).map_err(|e| render_error(path, e))?;

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| render_error(path, e))?;
        tera.render(&name, &context).map_err(|e| render_error(path, e))
    }
}

/// Name of `path` relative to the search directory holding it
fn template_name(path: &Path, search: &[PathBuf]) -> String {
    let relative = search
        .iter()
        .find_map(|dir| path.strip_prefix(dir).ok())
        .or_else(|| path.file_name().map(Path::new))
        .unwrap_or(path);

    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// The template plus everything it references, transitively.
///
/// Unknown names are left out; tera reports them when rendering.
fn collect_templates(
    name: &str,
    source: String,
    search: &[PathBuf],
) -> io::Result<Vec<(String, String)>> {
    let mut seen = HashSet::from([name.to_string()]);
    let mut pending = vec![(name.to_string(), source)];
    let mut templates = Vec::new();

    while let Some((name, source)) = pending.pop() {
        for reference in references(&source) {
            if !seen.insert(reference.clone()) {
                continue;
            }
            if let Some(path) = find_template(&reference, search) {
                let source = fs::read_to_string(&path)?;
                pending.push((reference, source));
            }
        }
        templates.push((name, source));
    }

    Ok(templates)
}

/// Names used by `extends`, `include` and `import` tags
fn references(source: &str) -> Vec<String> {
    TEMPLATE_TAG
        .captures_iter(source)
        .filter_map(|caps| caps.get(1))
        .flat_map(|args| {
            QUOTED
                .captures_iter(args.as_str())
                .filter_map(|q| q.get(1).map(|m| m.as_str().to_string()))
        })
        .collect()
}

fn find_template(name: &str, search: &[PathBuf]) -> Option<PathBuf> {
    let relative = Path::new(name);
    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }

    search
        .iter()
        .map(|dir| dir.join(relative))
        .find(|path| path.is_file())
}

fn render_error<E>(path: &Path, source: E) -> TemplateError
where
    E: std::error::Error + Send + Sync + 'static,
{
    TemplateError::Render {
        path: path.to_path_buf(),
        source: Box::new(source),
    }
}

/// Path of a layout inside one theme directory
pub fn layout_path(theme_dir: &Path, layout: &str) -> PathBuf {
    theme_dir
        .join(TEMPLATE_DIR)
        .join(format!("{layout}.{TEMPLATE_EXTENSION}"))
}

/// Render the first theme in the chain that has the layout.
///
/// A missing layout moves on to the next theme. Any other failure stops the
/// search and is returned as is.
pub fn render_layout(
    chain: &ThemeChain,
    engine: &dyn TemplateEngine,
    layout: &str,
    data: &Value,
) -> Result<String, ThemeError> {
    let search: Vec<PathBuf> = chain.iter().map(|dir| dir.join(TEMPLATE_DIR)).collect();

    for dir in chain.iter() {
        let path = layout_path(dir, layout);
        match engine.render(&path, &search, data) {
            Ok(html) => {
                tracing::debug!(layout, template = %path.display(), "rendered layout");
                return Ok(html);
            }
            Err(TemplateError::Missing { .. }) => continue,
            Err(source) => {
                return Err(ThemeError::Render {
                    layout: layout.to_string(),
                    source,
                })
            }
        }
    }

    Err(ThemeError::NoLayoutFound {
        layout: layout.to_string(),
    })
}
