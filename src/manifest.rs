//! Parent discovery from `theme.xml` manifests.
//!
//! ```xml
//! <theme>
//!     <title>Child</title>
//!     <parent>../parent</parent>
//! </theme>
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::error::ThemeError;
use crate::location::Locator;
use crate::theme::Theme;

/// Manifest file name inside a theme directory
pub const MANIFEST_FILE: &str = "theme.xml";

/// Parent identifier named by manifest content, if any
pub fn parse_manifest(xml: &str) -> Result<Option<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut in_parent = false;
    let mut parent: Option<String> = None;

    // Read to the end so malformed documents are rejected
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"parent" => {
                in_parent = true;
            }
            Event::Text(e) if in_parent && parent.is_none() => {
                let text = e.unescape()?;
                let text = text.trim();
                if !text.is_empty() {
                    parent = Some(text.to_string());
                }
            }
            Event::End(e) if e.name().as_ref() == b"parent" => {
                in_parent = false;
            }
            Event::Eof => return Ok(parent),
            _ => {}
        }
    }
}

/// Parent identifier declared by the theme in `dir`; `None` without a manifest
pub fn read_parent(dir: &Path) -> Result<Option<String>, ThemeError> {
    let path = dir.join(MANIFEST_FILE);
    let xml = match fs::read_to_string(&path) {
        Ok(xml) => xml,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(ThemeError::ReadManifest { path, source }),
    };

    parse_manifest(&xml).map_err(|source| ThemeError::InvalidManifest { path, source })
}

/// Resolve `id` and follow manifest parents up to the root theme
pub fn discover(locator: &Locator, id: &str) -> Result<Theme, ThemeError> {
    let mut dirs: Vec<PathBuf> = Vec::with_capacity(4);
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut dir = locator.resolve(id);

    loop {
        if !seen.insert(dir.clone()) {
            return Err(ThemeError::ManifestCycle { path: dir });
        }

        let parent = read_parent(&dir)?;
        dirs.push(dir);

        let Some(parent) = parent else { break };
        let current = &dirs[dirs.len() - 1];
        dir = locator.resolve_from(&parent, current);
        debug!(theme = %current.display(), parent = %dir.display(), "manifest parent");
    }

    // Build from the root down so every theme carries its parent's chain
    let leaf = dirs.remove(0);
    let parent = dirs
        .into_iter()
        .rev()
        .fold(None, |parent: Option<Theme>, dir| {
            Some(Theme::from_dir(dir, parent.as_ref()))
        });
    Ok(Theme::from_dir(leaf, parent.as_ref()))
}
