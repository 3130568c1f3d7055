use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::debug;

use super::{
    AliasDictionary, PostTranslator, TagTranslator, find_aliases, lenient_id, lenient_int,
    normalize_tags, variant,
};
use crate::models::{
    Category, PostEntity, ProtoTag, Rating, Source, aspect_ratio, file_extension,
};
use crate::normalizer::TagNormalizer;

/// Gelbooru and Rule34 share tag type codes.
pub(super) fn category(code: i64) -> Category {
    match code {
        0 => Category::General,
        1 => Category::Artist,
        3 => Category::Copyright,
        4 => Category::Character,
        5 => Category::Meta,
        _ => Category::Invalid,
    }
}

/// Tag record shape shared by Gelbooru and Rule34.
#[derive(Deserialize)]
pub(super) struct RawTag {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_int")]
    pub count: Option<i64>,
    #[serde(default, rename = "type", deserialize_with = "lenient_int")]
    pub kind: Option<i64>,
}

impl RawTag {
    pub fn into_proto(self, source: Source, aliases: &AliasDictionary) -> ProtoTag {
        let mut tag = ProtoTag::new(
            source,
            self.id,
            self.name,
            category(self.kind.unwrap_or(-1)),
            self.count.unwrap_or(0),
        );
        tag.aliases = find_aliases(aliases, &tag.reference_name);
        tag
    }
}

pub struct GelbooruTagTranslator {
    aliases: AliasDictionary,
}

impl GelbooruTagTranslator {
    pub fn new(aliases: AliasDictionary) -> Self {
        Self { aliases }
    }
}

impl TagTranslator for GelbooruTagTranslator {
    fn translate(&self, data: &Value) -> Option<ProtoTag> {
        let raw = RawTag::deserialize(data).ok()?;
        Some(raw.into_proto(Source::Gelbooru, &self.aliases))
    }
}

#[derive(Deserialize)]
struct RawPost {
    #[serde(deserialize_with = "lenient_id")]
    id: String,
    rating: Option<String>,
    #[serde(default)]
    tags: String,
    file_url: Option<String>,
    image: Option<String>,
    source: Option<String>,
    md5: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    preview_url: Option<String>,
    preview_width: Option<u32>,
    preview_height: Option<u32>,
    sample_url: Option<String>,
    sample_width: Option<u32>,
    sample_height: Option<u32>,
    #[serde(default, deserialize_with = "lenient_int")]
    score: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    comment_count: Option<i64>,
    created_at: Option<String>,
}

/// Parses Gelbooru's `Sat Jan 01 12:00:00 -0500 2023` timestamps.
fn parse_created_at(value: &str) -> Option<OffsetDateTime> {
    let format = format_description!(
        "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute] [year]"
    );
    OffsetDateTime::parse(value, format).ok()
}

pub struct GelbooruPostTranslator;

impl PostTranslator for GelbooruPostTranslator {
    fn translate(&self, data: &Value, tags: &TagNormalizer) -> Option<PostEntity> {
        let raw = match RawPost::deserialize(data) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "Skipping malformed gelbooru post");
                return None;
            }
        };

        let Some(url) = raw.file_url.filter(|u| !u.is_empty()) else {
            debug!(id = %raw.id, "Skipping gelbooru post without file url");
            return None;
        };
        let (width, height) = (raw.width?, raw.height?);
        let ratio = aspect_ratio(width, height)?;

        let full = variant(Some(&url), Some(width), Some(height));
        let medium = variant(
            raw.sample_url.as_deref().filter(|u| !u.is_empty()),
            raw.sample_width.filter(|w| *w > 0),
            raw.sample_height.filter(|h| *h > 0),
        )
        .or_else(|| full.clone());
        let small = variant(
            raw.preview_url.as_deref().filter(|u| !u.is_empty()),
            raw.preview_width,
            raw.preview_height,
        )
        .or_else(|| medium.clone());

        let format = file_extension(raw.image.as_deref().unwrap_or(&url));

        Some(PostEntity {
            source: Source::Gelbooru,
            source_id: raw.id,
            rating: Rating::parse_lenient(raw.rating.as_deref().unwrap_or("e")),
            tags: normalize_tags(tags, raw.tags.split_whitespace()),
            description: None,
            origin_urls: raw.source.into_iter().filter(|s| !s.is_empty()).collect(),
            origin_md5: raw.md5,
            origin_format: format,
            origin_size: None,
            image_url: url,
            image_width: width,
            image_height: height,
            image_ratio: ratio,
            small,
            medium,
            score: raw.score,
            favorites_count: None,
            comment_count: raw.comment_count,
            view_count: None,
            created_at: raw.created_at.as_deref().and_then(parse_created_at),
            timestamp: OffsetDateTime::now_utc(),
        })
    }
}
