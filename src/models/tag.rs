use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{Category, Source, TagKey};

/// Naming scheme generation a tag alias belongs to.
///
/// `V0` is the raw source name, `V1` prefixes the category, `V2` is the
/// cleaned form with an optional category suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagVersion {
    V0,
    V1,
    V2,
}

/// Raw tag record as read from a source dump.
///
/// Short-lived: created per input record and consumed by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoTag {
    pub source: Source,
    pub source_id: String,
    /// Working name; prefilter and rewrite rules may change it.
    pub origin_name: String,
    /// Name exactly as the source reported it. Never mutated.
    pub reference_name: String,
    pub category: Category,
    pub post_count: i64,
    pub aliases: Option<Vec<String>>,
    /// Set when the normalizer moved the tag out of the general category.
    pub renamed: bool,
}

impl ProtoTag {
    /// Creates a proto tag whose origin and reference names are both `name`.
    pub fn new(
        source: Source,
        source_id: impl Into<String>,
        name: impl Into<String>,
        category: Category,
        post_count: i64,
    ) -> Self {
        let name = name.into();
        Self {
            source,
            source_id: source_id.into(),
            origin_name: name.clone(),
            reference_name: name,
            category,
            post_count,
            aliases: None,
            renamed: false,
        }
    }

    /// Attaches alternative names reported by the source.
    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    /// Returns the identity this record resolves to.
    pub fn key(&self) -> TagKey {
        TagKey::new(self.source, self.source_id.clone())
    }
}

/// Canonical tag as persisted after normalization.
///
/// `preferred_name` is the final display name once
/// [`TagNormalizer::normalize`](crate::TagNormalizer::normalize) has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagEntity {
    pub source: Source,
    pub source_id: String,
    pub origin_name: String,
    pub category: Category,
    pub reference_name: String,
    pub v1_name: String,
    pub v2_name: String,
    pub v2_short: String,
    pub preferred_name: String,
    pub post_count: i64,
    pub aliases: Option<Vec<String>>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl TagEntity {
    /// Returns the identity of this tag.
    pub fn key(&self) -> TagKey {
        TagKey::new(self.source, self.source_id.clone())
    }

    /// Returns true if `name` is this tag's reference name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.reference_name == name
            || self
                .aliases
                .as_deref()
                .is_some_and(|aliases| aliases.iter().any(|alias| alias == name))
    }
}
