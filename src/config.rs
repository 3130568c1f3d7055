//! Normalizer configuration loaded from YAML rule files.
//!
//! Each concern lives in its own optional file:
//!
//! ```yaml
//! # prefilter.yaml, symbols.yaml, aspect_ratios.yaml
//! tags:
//!   - conditional_dnp
//!
//! # rewrites.yaml
//! tags:
//!   - from: colored_pencil_(artwork)
//!     to: colored_pencil
//!   - from: mlp
//!     to: { name: my_little_pony, source_id: "1234" }
//!
//! # category_weights.yaml
//! categories:
//!   general: 0
//!   species: 1
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::{Category, NamingOrder};

/// Replacement applied to a tag's origin name during load.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Rewrite {
    /// Replace the name only.
    Name(String),
    /// Replace the name and/or the source id.
    Override {
        #[serde(default)]
        name: Option<String>,
        #[serde(default, deserialize_with = "lenient_string")]
        source_id: Option<String>,
    },
}

/// Static rules the normalizer applies while loading tags.
#[derive(Debug, Clone, Default)]
pub struct NormalizerConfig {
    /// Origin names dropped on sight.
    pub prefilter: HashSet<String>,
    /// Reference names forced into the symbol category.
    pub symbols: Vec<String>,
    /// Reference names forced into the aspect ratio category.
    pub aspect_ratios: Vec<String>,
    /// Origin name rewrites, keyed by the name being replaced.
    pub rewrites: HashMap<String, Rewrite>,
    pub naming_order: NamingOrder,
}

/// Locations of the optional rule files.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub prefilter: Option<PathBuf>,
    pub symbols: Option<PathBuf>,
    pub aspect_ratios: Option<PathBuf>,
    pub rewrites: Option<PathBuf>,
    pub category_weights: Option<PathBuf>,
}

#[derive(Deserialize)]
struct TagListFile {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct RewriteEntry {
    from: String,
    to: Rewrite,
}

#[derive(Deserialize)]
struct RewriteFile {
    #[serde(default)]
    tags: Vec<RewriteEntry>,
}

#[derive(Deserialize)]
struct CategoryWeightsFile {
    #[serde(default)]
    categories: HashMap<Category, i64>,
}

impl NormalizerConfig {
    /// Loads every configured file. Missing paths fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured file cannot be read or parsed.
    pub fn load(paths: &ConfigPaths) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = &paths.prefilter {
            config.prefilter = parse_tag_list(&read(path)?)
                .with_context(|| format!("Invalid prefilter file: {}", path.display()))?
                .into_iter()
                .collect();
        }
        if let Some(path) = &paths.symbols {
            config.symbols = parse_tag_list(&read(path)?)
                .with_context(|| format!("Invalid symbols file: {}", path.display()))?;
        }
        if let Some(path) = &paths.aspect_ratios {
            config.aspect_ratios = parse_tag_list(&read(path)?)
                .with_context(|| format!("Invalid aspect ratios file: {}", path.display()))?;
        }
        if let Some(path) = &paths.rewrites {
            config.rewrites = parse_rewrites(&read(path)?)
                .with_context(|| format!("Invalid rewrites file: {}", path.display()))?;
        }
        if let Some(path) = &paths.category_weights {
            config.naming_order = parse_category_weights(&read(path)?)
                .with_context(|| format!("Invalid category weights file: {}", path.display()))?;
        }

        Ok(config)
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Parses a `tags: [...]` document.
pub fn parse_tag_list(yaml: &str) -> Result<Vec<String>> {
    let file: TagListFile = serde_yaml::from_str(yaml)?;
    Ok(file.tags)
}

/// Parses a `tags: [{from, to}]` rewrite document.
pub fn parse_rewrites(yaml: &str) -> Result<HashMap<String, Rewrite>> {
    let file: RewriteFile = serde_yaml::from_str(yaml)?;
    Ok(file
        .tags
        .into_iter()
        .map(|entry| (entry.from, entry.to))
        .collect())
}

/// Parses a `categories: {name: weight}` document on top of the default order.
pub fn parse_category_weights(yaml: &str) -> Result<NamingOrder> {
    let file: CategoryWeightsFile = serde_yaml::from_str(yaml)?;
    Ok(NamingOrder::with_overrides(file.categories))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        Str(String),
        Int(i64),
    }

    Ok(
        Option::<StringOrInt>::deserialize(deserializer)?.map(|value| match value {
            StringOrInt::Str(s) => s,
            StringOrInt::Int(i) => i.to_string(),
        }),
    )
}
