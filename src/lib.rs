//! # themestack
//!
//! Theme inheritance for static sites.
//!
//! A theme is a directory of templates, stylesheets, scripts and static
//! assets that may inherit from a parent theme. This library resolves the
//! chain of themes, renders layouts with fallback through that chain, and
//! builds the merged assets into one output directory.
//!
//! ## Features
//!
//! - Package or path theme resolution
//! - Layout fallback from child to parent themes
//! - Parallel clean, copy, stylesheet and script build using Rayon
//! - Parent stylesheet and script imports by directory name
//! - Debounced watch mode rebuilding only what changed
//!
//! ## Usage
//!
//! ```ignore
//! use themestack::theme::Theme;
//!
//! let parent = Theme::new("shop-theme", None);
//! let mut theme = Theme::new("./themes/child", Some(&parent));
//! theme.output_to("dist")?;
//! theme.build()?;
//! theme.compile_page("index.html", &serde_json::json!({"body": "Kittens"}), None)?;
//! ```

/// Ordered theme directories and parent aliases
pub mod chain;

/// CLI configuration and argument parsing
pub mod config;

/// File copying and output writing
pub mod copier;

/// Error types for theme, build and template operations
pub mod error;

/// Theme identifier resolution
pub mod location;

/// `theme.xml` parsing and parent discovery
pub mod manifest;

/// Watch patterns per asset category
pub mod paths;

/// Clean, copy, style and script build
pub mod pipeline;

/// Script bundling with parent theme aliases
pub mod scripts;

/// Asset listing and merging across the chain
pub mod sources;

/// Stylesheet compilation with parent theme aliases
pub mod styles;

/// Layout rendering with fallback through the chain
pub mod template;

/// The theme facade
pub mod theme;

/// Debounced file watching and change classification
pub mod watch;

#[cfg(test)]
mod fixtures;
