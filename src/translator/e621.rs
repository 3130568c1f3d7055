use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use super::{
    AliasDictionary, AliasRecord, AliasTranslator, PostTranslator, TagTranslator, find_aliases,
    lenient_id, lenient_int, normalize_tags, variant,
};
use crate::models::{
    Category, PostEntity, ProtoTag, Rating, Source, aspect_ratio, file_extension,
};
use crate::normalizer::TagNormalizer;

fn category(code: i64) -> Category {
    match code {
        0 => Category::General,
        1 => Category::Artist,
        3 => Category::Copyright,
        4 => Category::Character,
        5 => Category::Species,
        7 => Category::Meta,
        8 => Category::Lore,
        _ => Category::Invalid,
    }
}

#[derive(Deserialize)]
struct RawTag {
    #[serde(deserialize_with = "lenient_id")]
    id: String,
    name: String,
    #[serde(default, deserialize_with = "lenient_int")]
    post_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    category: Option<i64>,
}

pub struct E621TagTranslator {
    aliases: AliasDictionary,
}

impl E621TagTranslator {
    pub fn new(aliases: AliasDictionary) -> Self {
        Self { aliases }
    }
}

impl TagTranslator for E621TagTranslator {
    fn translate(&self, data: &Value) -> Option<ProtoTag> {
        let raw = RawTag::deserialize(data).ok()?;
        let mut tag = ProtoTag::new(
            Source::E621,
            raw.id,
            raw.name,
            category(raw.category.unwrap_or(-1)),
            raw.post_count.unwrap_or(0),
        );
        tag.aliases = find_aliases(&self.aliases, &tag.reference_name);
        Some(tag)
    }
}

#[derive(Deserialize)]
struct RawAlias {
    #[serde(deserialize_with = "lenient_id")]
    id: String,
    antecedent_name: String,
    consequent_name: String,
}

pub struct E621AliasTranslator;

impl AliasTranslator for E621AliasTranslator {
    fn translate(&self, data: &Value) -> Option<AliasRecord> {
        let raw = RawAlias::deserialize(data).ok()?;
        Some(AliasRecord {
            source: Source::E621,
            source_id: raw.id,
            tag_name: raw.consequent_name,
            alias_name: raw.antecedent_name,
        })
    }
}

#[derive(Deserialize)]
struct RawFile {
    width: Option<u32>,
    height: Option<u32>,
    ext: Option<String>,
    size: Option<u64>,
    md5: Option<String>,
    url: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawImage {
    width: Option<u32>,
    height: Option<u32>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct RawScore {
    #[serde(default, deserialize_with = "lenient_int")]
    total: Option<i64>,
}

#[derive(Deserialize)]
struct RawPost {
    #[serde(deserialize_with = "lenient_id")]
    id: String,
    created_at: Option<String>,
    file: RawFile,
    preview: Option<RawImage>,
    sample: Option<RawImage>,
    score: Option<RawScore>,
    #[serde(default)]
    tags: BTreeMap<String, Vec<String>>,
    rating: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    fav_count: Option<i64>,
    #[serde(default)]
    sources: Vec<String>,
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    comment_count: Option<i64>,
}

pub struct E621PostTranslator;

impl PostTranslator for E621PostTranslator {
    fn translate(&self, data: &Value, tags: &TagNormalizer) -> Option<PostEntity> {
        let raw = match RawPost::deserialize(data) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "Skipping malformed e621 post");
                return None;
            }
        };

        let file = raw.file;
        let Some(url) = file.url else {
            debug!(id = %raw.id, "Skipping e621 post without file url");
            return None;
        };
        let (width, height) = (file.width?, file.height?);
        let ratio = aspect_ratio(width, height)?;

        let sample = raw
            .sample
            .and_then(|s| variant(s.url.as_deref(), s.width, s.height));
        let preview = raw
            .preview
            .and_then(|p| variant(p.url.as_deref(), p.width, p.height));
        let full = variant(Some(&url), Some(width), Some(height));
        let medium = sample.clone().or_else(|| full.clone());
        let small = preview.or(sample).or(full);

        let names = raw.tags.values().flatten().map(String::as_str);

        Some(PostEntity {
            source: Source::E621,
            source_id: raw.id,
            rating: Rating::parse_lenient(raw.rating.as_deref().unwrap_or("e")),
            tags: normalize_tags(tags, names),
            description: raw.description.filter(|d| !d.is_empty()),
            origin_urls: raw.sources,
            origin_md5: file.md5,
            origin_format: file.ext.unwrap_or_else(|| file_extension(&url)),
            origin_size: file.size,
            image_url: url,
            image_width: width,
            image_height: height,
            image_ratio: ratio,
            small,
            medium,
            score: raw.score.and_then(|s| s.total),
            favorites_count: raw.fav_count,
            comment_count: raw.comment_count,
            view_count: None,
            created_at: raw
                .created_at
                .and_then(|s| OffsetDateTime::parse(&s, &Rfc3339).ok()),
            timestamp: OffsetDateTime::now_utc(),
        })
    }
}
