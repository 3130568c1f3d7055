//! Post selection driven by include and exclude tag lists.
//!
//! A selector file is either a plain list of tags to include or a map with
//! `include` and `exclude` lists. Nested lists are flattened:
//!
//! ```yaml
//! include:
//!   - fox
//!   - [wolf, v2:fox_artist]
//! exclude:
//!   - preferred:gore
//! ```
//!
//! Names resolve against stored tags through their preferred, v2 long and
//! v1 names. A `v1:`, `v2:` or `preferred:` prefix narrows the lookup to
//! that one name.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::{Database, PostFilter, TagNameField};
use crate::models::{PostEntity, TagEntity};

/// Formats selected when the caller names none.
pub const DEFAULT_FORMATS: [&str; 2] = ["jpg", "png"];

/// Flattened, deduplicated tag names from a selector file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorLists {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SelectorFile {
    Plain(Vec<Entry>),
    Lists {
        #[serde(default)]
        include: Vec<Entry>,
        #[serde(default)]
        exclude: Vec<Entry>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Name(String),
    Number(i64),
    Group(Vec<Entry>),
}

fn flatten(entries: Vec<Entry>) -> Vec<String> {
    fn walk(entries: Vec<Entry>, seen: &mut HashSet<String>, out: &mut Vec<String>) {
        for entry in entries {
            let name = match entry {
                Entry::Name(name) => name,
                Entry::Number(n) => n.to_string(),
                Entry::Group(group) => {
                    walk(group, seen, out);
                    continue;
                }
            };
            if seen.insert(name.clone()) {
                out.push(name);
            }
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    walk(entries, &mut seen, &mut out);
    out
}

/// Parses a selector document.
pub fn parse_selector(yaml: &str) -> Result<SelectorLists> {
    let lists = match serde_yaml::from_str(yaml)? {
        SelectorFile::Lists { include, exclude } => SelectorLists {
            include: flatten(include),
            exclude: flatten(exclude),
        },
        SelectorFile::Plain(include) => SelectorLists {
            include: flatten(include),
            exclude: Vec::new(),
        },
    };
    Ok(lists)
}

/// A stored post picked by a selector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedPost {
    /// Included tags the post carries, in selector order.
    pub matches: Vec<String>,
    /// The post, with tags unknown to the store dropped.
    #[serde(flatten)]
    pub post: PostEntity,
}

/// Include and exclude lists resolved to preferred names.
pub struct Selector<'a> {
    db: &'a Database,
    /// Where the lists came from; named in warnings.
    origin: String,
    includes: Vec<String>,
    excludes: Vec<String>,
    resolved: HashMap<String, TagEntity>,
}

impl<'a> Selector<'a> {
    /// Reads a selector YAML file and resolves its tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or a lookup
    /// fails. Unknown and ambiguous names are only logged.
    pub fn load(db: &'a Database, path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let lists = parse_selector(&yaml)
            .with_context(|| format!("Invalid selector file: {}", path.display()))?;
        Self::from_lists(db, path.display().to_string(), &lists)
    }

    /// Resolves already parsed lists. `origin` names the lists in warnings.
    pub fn from_lists(
        db: &'a Database,
        origin: impl Into<String>,
        lists: &SelectorLists,
    ) -> Result<Self> {
        let mut selector = Self {
            db,
            origin: origin.into(),
            includes: Vec::new(),
            excludes: Vec::new(),
            resolved: HashMap::new(),
        };

        let includes = selector.resolve_all(&lists.include)?;
        let excludes = selector.resolve_all(&lists.exclude)?;

        for excluded in &excludes {
            if includes.iter().any(|included| included.key() == excluded.key()) {
                warn!(
                    "Tag \"{}\" is both included and excluded in \"{}\"",
                    excluded.preferred_name, selector.origin
                );
            }
        }

        selector.includes = includes.into_iter().map(|t| t.preferred_name).collect();
        selector.excludes = excludes.into_iter().map(|t| t.preferred_name).collect();
        info!(
            includes = selector.includes.len(),
            excludes = selector.excludes.len(),
            "Selector tags verified"
        );
        Ok(selector)
    }

    fn resolve_all(&mut self, names: &[String]) -> Result<Vec<TagEntity>> {
        let mut tags = Vec::new();
        for name in names {
            if let Some(tag) = self.resolve_tag(name)? {
                tags.push(tag);
            }
        }
        Ok(tags)
    }

    /// Finds the one stored tag `name` refers to.
    ///
    /// Returns `None`, with a warning, when no tag or more than one tag
    /// matches.
    pub fn resolve_tag(&mut self, name: &str) -> Result<Option<TagEntity>> {
        let (fields, body): (&[TagNameField], &str) = match name.split_once(':') {
            Some(("v1", body)) => (&[TagNameField::V1], body),
            Some(("v2", body)) => (&[TagNameField::V2], body),
            Some(("preferred", body)) => {
                if let Some(tag) = self.resolved.get(body) {
                    return Ok(Some(tag.clone()));
                }
                (&[TagNameField::Preferred], body)
            }
            _ => (
                &[TagNameField::Preferred, TagNameField::V2, TagNameField::V1],
                name,
            ),
        };

        let mut matches = self.db.find_tags(fields, body)?;
        match matches.len() {
            0 => {
                warn!(
                    "Tag name \"{body}\" not found in the database; skipping tag from the filter: {}",
                    self.origin
                );
                Ok(None)
            }
            1 => {
                let tag = matches.remove(0);
                self.resolved
                    .insert(tag.preferred_name.clone(), tag.clone());
                Ok(Some(tag))
            }
            n => {
                warn!(
                    "Ambiguous tag name \"{body}\" has {n} matches in the database; prefix it with \"v1:\", \"v2:\" or \"preferred:\" (e.g. \"v2:{body}\"); skipping tag from the filter: {}",
                    self.origin
                );
                Ok(None)
            }
        }
    }

    /// Preferred names of the resolved include list.
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Preferred names of the resolved exclude list.
    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// `Some(false)` for an excluded tag, `Some(true)` for an included one,
    /// `None` otherwise. Exclusion wins.
    pub fn check(&self, preferred_name: &str) -> Option<bool> {
        if self.excludes.iter().any(|t| t == preferred_name) {
            Some(false)
        } else if self.includes.iter().any(|t| t == preferred_name) {
            Some(true)
        } else {
            None
        }
    }

    /// Stored posts carrying an included tag and no excluded tag, in one of
    /// `formats`, in insertion order.
    pub fn select(
        &mut self,
        formats: &[String],
        limit: Option<usize>,
    ) -> Result<Vec<SelectedPost>> {
        let default_formats: Vec<String>;
        let formats = if formats.is_empty() {
            default_formats = DEFAULT_FORMATS.map(String::from).to_vec();
            default_formats.as_slice()
        } else {
            formats
        };

        if self.includes.is_empty() {
            return Ok(Vec::new());
        }

        let posts = self.db.select_posts(&PostFilter {
            include: &self.includes,
            exclude: &self.excludes,
            formats,
            limit,
        })?;

        let mut selected = Vec::with_capacity(posts.len());
        for mut post in posts {
            let matches = self
                .includes
                .iter()
                .filter(|t| post.tags.contains(t))
                .cloned()
                .collect();

            let mut known = Vec::with_capacity(post.tags.len());
            for tag in &post.tags {
                if let Some(resolved) = self.resolve_tag(&format!("preferred:{tag}"))? {
                    known.push(resolved.preferred_name);
                }
            }
            post.tags = known;

            selected.push(SelectedPost { matches, post });
        }
        Ok(selected)
    }
}
