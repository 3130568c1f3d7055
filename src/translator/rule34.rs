use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;

use super::gelbooru::RawTag;
use super::{
    AliasDictionary, PostTranslator, TagTranslator, lenient_id, lenient_int, normalize_tags,
    variant,
};
use crate::models::{PostEntity, ProtoTag, Rating, Source, aspect_ratio, file_extension};
use crate::normalizer::TagNormalizer;

pub struct Rule34TagTranslator {
    aliases: AliasDictionary,
}

impl Rule34TagTranslator {
    pub fn new(aliases: AliasDictionary) -> Self {
        Self { aliases }
    }
}

impl TagTranslator for Rule34TagTranslator {
    fn translate(&self, data: &Value) -> Option<ProtoTag> {
        let raw = RawTag::deserialize(data).ok()?;
        Some(raw.into_proto(Source::Rule34, &self.aliases))
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
    hash: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    preview_url: Option<String>,
    sample_url: Option<String>,
    sample_width: Option<u32>,
    sample_height: Option<u32>,
    #[serde(default, deserialize_with = "lenient_int")]
    score: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    comment_count: Option<i64>,
    /// Last change as a unix timestamp; Rule34 has no creation time.
    #[serde(default, deserialize_with = "lenient_int")]
    change: Option<i64>,
}

pub struct Rule34PostTranslator;

impl PostTranslator for Rule34PostTranslator {
    fn translate(&self, data: &Value, tags: &TagNormalizer) -> Option<PostEntity> {
        let raw = match RawPost::deserialize(data) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "Skipping malformed rule34 post");
                return None;
            }
        };

        let Some(url) = raw.file_url.filter(|u| !u.is_empty()) else {
            debug!(id = %raw.id, "Skipping rule34 post without file url");
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
        // Rule34 thumbnails come without dimensions; reuse the sample's.
        let small = match (raw.preview_url.as_deref(), medium.as_ref()) {
            (Some(preview), Some(m)) if !preview.is_empty() => {
                variant(Some(preview), Some(m.width), Some(m.height))
            }
            _ => medium.clone(),
        };

        let format = file_extension(raw.image.as_deref().unwrap_or(&url));

        Some(PostEntity {
            source: Source::Rule34,
            source_id: raw.id,
            rating: Rating::parse_lenient(raw.rating.as_deref().unwrap_or("e")),
            tags: normalize_tags(tags, raw.tags.split_whitespace()),
            description: None,
            origin_urls: Vec::new(),
            origin_md5: raw.hash,
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
            created_at: raw
                .change
                .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok()),
            timestamp: OffsetDateTime::now_utc(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::NormalizerConfig;
    use crate::models::{Category, TagVersion};

    #[test]
    fn tags_share_gelbooru_codes() {
        let translator = Rule34TagTranslator::new(AliasDictionary::new());
        let tag = translator
            .translate(&json!({"id": 3, "name": "samus_aran", "count": 40, "type": 4}))
            .unwrap();
        assert_eq!(tag.source, Source::Rule34);
        assert_eq!(tag.category, Category::Character);

        let invalid = translator
            .translate(&json!({"id": 4, "name": "x", "count": 1, "type": 6}))
            .unwrap();
        assert_eq!(invalid.category, Category::Invalid);
    }

    #[test]
    fn post_uses_change_as_creation_time() {
        let mut normalizer = TagNormalizer::new(NormalizerConfig::default());
        normalizer
            .load(vec![ProtoTag::new(Source::Rule34, "3", "samus_aran", Category::Character, 40)])
            .unwrap();
        normalizer.normalize(TagVersion::V2).unwrap();

        let data = json!({
            "id": 900,
            "rating": "explicit",
            "tags": "samus_aran",
            "file_url": "https://api-cdn.rule34.xxx/images/1/abcd.jpeg",
            "image": "abcd.jpeg",
            "hash": "abcd",
            "width": 1200,
            "height": 900,
            "preview_url": "https://api-cdn.rule34.xxx/thumbnails/1/thumbnail_abcd.jpg",
            "sample_url": "https://api-cdn.rule34.xxx/samples/1/sample_abcd.jpg",
            "sample_width": 850,
            "sample_height": 637,
            "score": 20,
            "change": 1672531200
        });
        let post = Rule34PostTranslator.translate(&data, &normalizer).unwrap();

        assert_eq!(post.rating, Rating::Explicit);
        assert_eq!(post.tags, vec!["samus_aran"]);
        assert_eq!(post.origin_md5.as_deref(), Some("abcd"));
        assert_eq!(post.origin_format, "jpeg");
        assert_eq!(post.small.unwrap().width, 850);
        assert_eq!(
            post.created_at.unwrap(),
            OffsetDateTime::from_unix_timestamp(1_672_531_200).unwrap()
        );
    }

    #[test]
    fn post_with_zero_height_is_skipped() {
        let normalizer = TagNormalizer::new(NormalizerConfig::default());
        let data = json!({"id": 1, "file_url": "https://x/y.png", "width": 10, "height": 0});
        assert!(Rule34PostTranslator.translate(&data, &normalizer).is_none());
    }
}
