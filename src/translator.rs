//! Per-source adapters from raw JSON records to tags and posts.
//!
//! Translators return `None` for records that are incomplete or unusable;
//! that is a skip, not an error. Post translators rewrite each raw tag to
//! its preferred name through the [`TagNormalizer`] and silently drop tags
//! the normalizer does not know.

mod danbooru;
mod e621;
mod gelbooru;
mod rule34;

use std::collections::HashMap;

use anyhow::{Result, bail};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::models::{ImageVariant, PostEntity, ProtoTag, Source};
use crate::normalizer::TagNormalizer;

pub use danbooru::{DanbooruPostTranslator, DanbooruTagTranslator};
pub use e621::{E621AliasTranslator, E621PostTranslator, E621TagTranslator};
pub use gelbooru::{GelbooruPostTranslator, GelbooruTagTranslator};
pub use rule34::{Rule34PostTranslator, Rule34TagTranslator};

/// Alternative names keyed by the tag they resolve to.
pub type AliasDictionary = HashMap<String, Vec<String>>;

/// Maps a raw tag record to a proto tag.
pub trait TagTranslator {
    fn translate(&self, data: &Value) -> Option<ProtoTag>;
}

/// Maps a raw post record to a post with normalized tags.
pub trait PostTranslator {
    fn translate(&self, data: &Value, tags: &TagNormalizer) -> Option<PostEntity>;
}

/// One alias pair from a source's alias dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRecord {
    pub source: Source,
    pub source_id: String,
    /// The tag the alias resolves to.
    pub tag_name: String,
    pub alias_name: String,
}

/// Maps a raw alias record to an alias pair.
pub trait AliasTranslator {
    fn translate(&self, data: &Value) -> Option<AliasRecord>;
}

/// Returns the tag translator for `source`.
///
/// # Errors
///
/// Returns an error for sources without tag dumps.
pub fn tag_translator(
    source: Source,
    aliases: Option<AliasDictionary>,
) -> Result<Box<dyn TagTranslator>> {
    let aliases = aliases.unwrap_or_default();
    Ok(match source {
        Source::E621 => Box::new(E621TagTranslator::new(aliases)),
        Source::Danbooru => Box::new(DanbooruTagTranslator::new(aliases)),
        Source::Gelbooru => Box::new(GelbooruTagTranslator::new(aliases)),
        Source::Rule34 => Box::new(Rule34TagTranslator::new(aliases)),
        Source::Rising => bail!("Unsupported source '{source}' for tag import"),
    })
}

/// Returns the post translator for `source`.
///
/// # Errors
///
/// Returns an error for sources without post dumps.
pub fn post_translator(source: Source) -> Result<Box<dyn PostTranslator>> {
    Ok(match source {
        Source::E621 => Box::new(E621PostTranslator),
        Source::Danbooru => Box::new(DanbooruPostTranslator),
        Source::Gelbooru => Box::new(GelbooruPostTranslator),
        Source::Rule34 => Box::new(Rule34PostTranslator),
        Source::Rising => bail!("Unsupported source '{source}' for post import"),
    })
}

/// Returns the alias translator for `source`.
///
/// # Errors
///
/// Only e621 publishes alias dumps; other sources return an error.
pub fn alias_translator(source: Source) -> Result<Box<dyn AliasTranslator>> {
    match source {
        Source::E621 => Ok(Box::new(E621AliasTranslator)),
        other => bail!("Unsupported source '{other}' for alias import"),
    }
}

/// Rewrites raw tag names to preferred names, dropping unknown tags.
pub fn normalize_tags<'a>(
    tags: &TagNormalizer,
    raw: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    raw.into_iter()
        .filter(|name| !name.is_empty())
        .filter_map(|name| tags.normalize_tag(name))
        .map(String::from)
        .collect()
}

/// Builds a variant when url and both dimensions are known.
fn variant(url: Option<&str>, width: Option<u32>, height: Option<u32>) -> Option<ImageVariant> {
    Some(ImageVariant {
        url: url?.to_string(),
        width: width?,
        height: height?,
    })
}

/// Looks up aliases for a tag name in a dictionary.
fn find_aliases(aliases: &AliasDictionary, name: &str) -> Option<Vec<String>> {
    aliases.get(name).cloned()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Str(String),
}

/// Accepts ids given either as numbers or strings.
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Str(s) => s,
    })
}

/// Accepts counts given as numbers or numeric strings; anything else is `None`.
fn lenient_int<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(i)) => Some(i),
        Some(Scalar::Float(f)) => Some(f as i64),
        Some(Scalar::Str(s)) => s.trim().parse().ok(),
        None => None,
    })
}
