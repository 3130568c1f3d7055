use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use super::{
    AliasDictionary, PostTranslator, TagTranslator, find_aliases, lenient_id, lenient_int,
    normalize_tags, variant,
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
        5 => Category::Meta,
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

pub struct DanbooruTagTranslator {
    aliases: AliasDictionary,
}

impl DanbooruTagTranslator {
    pub fn new(aliases: AliasDictionary) -> Self {
        Self { aliases }
    }
}

impl TagTranslator for DanbooruTagTranslator {
    fn translate(&self, data: &Value) -> Option<ProtoTag> {
        let raw = RawTag::deserialize(data).ok()?;
        let mut tag = ProtoTag::new(
            Source::Danbooru,
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
struct RawPost {
    #[serde(deserialize_with = "lenient_id")]
    id: String,
    rating: Option<String>,
    #[serde(default)]
    tag_string: String,
    file_url: Option<String>,
    large_file_url: Option<String>,
    preview_file_url: Option<String>,
    source: Option<String>,
    md5: Option<String>,
    file_ext: Option<String>,
    file_size: Option<u64>,
    image_width: Option<u32>,
    image_height: Option<u32>,
    #[serde(default, deserialize_with = "lenient_int")]
    score: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    fav_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    comment_count: Option<i64>,
    created_at: Option<String>,
}

pub struct DanbooruPostTranslator;

impl PostTranslator for DanbooruPostTranslator {
    fn translate(&self, data: &Value, tags: &TagNormalizer) -> Option<PostEntity> {
        let raw = match RawPost::deserialize(data) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "Skipping malformed danbooru post");
                return None;
            }
        };

        let Some(url) = raw.file_url else {
            debug!(id = %raw.id, "Skipping danbooru post without file url");
            return None;
        };
        let (width, height) = (raw.image_width?, raw.image_height?);
        let ratio = aspect_ratio(width, height)?;

        // Danbooru does not report preview or sample dimensions.
        let full = variant(Some(&url), Some(width), Some(height));
        let medium = raw
            .large_file_url
            .as_deref()
            .and_then(|u| variant(Some(u), Some(width), Some(height)))
            .or_else(|| full.clone());
        let small = raw
            .preview_file_url
            .as_deref()
            .and_then(|u| variant(Some(u), Some(width), Some(height)))
            .or_else(|| medium.clone());

        Some(PostEntity {
            source: Source::Danbooru,
            source_id: raw.id,
            rating: Rating::parse_lenient(raw.rating.as_deref().unwrap_or("e")),
            tags: normalize_tags(tags, raw.tag_string.split_whitespace()),
            description: None,
            origin_urls: raw.source.into_iter().filter(|s| !s.is_empty()).collect(),
            origin_md5: raw.md5,
            origin_format: raw.file_ext.unwrap_or_else(|| file_extension(&url)),
            origin_size: raw.file_size,
            image_url: url,
            image_width: width,
            image_height: height,
            image_ratio: ratio,
            small,
            medium,
            score: raw.score,
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

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::NormalizerConfig;
    use crate::models::TagVersion;

    #[test]
    fn tag_category_five_is_meta() {
        let translator = DanbooruTagTranslator::new(AliasDictionary::new());
        let tag = translator
            .translate(&json!({"id": 1, "name": "highres", "post_count": 5, "category": 5}))
            .unwrap();
        assert_eq!(tag.source, Source::Danbooru);
        assert_eq!(tag.category, Category::Meta);

        let species = translator
            .translate(&json!({"id": 2, "name": "x", "post_count": 5, "category": 8}))
            .unwrap();
        assert_eq!(species.category, Category::Invalid);
    }

    #[test]
    fn post_is_translated() {
        let mut normalizer = TagNormalizer::new(NormalizerConfig::default());
        normalizer
            .load(vec![
                ProtoTag::new(Source::Danbooru, "1", "1girl", Category::General, 100),
                ProtoTag::new(Source::Danbooru, "2", "highres", Category::Meta, 100),
            ])
            .unwrap();
        normalizer.normalize(TagVersion::V2).unwrap();

        let data = json!({
            "id": 77,
            "rating": "q",
            "tag_string": "1girl highres  missing",
            "file_url": "https://cdn.donmai.us/original/aa/bb/aabb.jpg",
            "large_file_url": "https://cdn.donmai.us/sample/aa/bb/sample-aabb.jpg",
            "preview_file_url": "https://cdn.donmai.us/preview/aa/bb/aabb.jpg",
            "source": "",
            "md5": "aabb",
            "file_ext": "jpg",
            "file_size": 1000,
            "image_width": 1000,
            "image_height": 1500,
            "score": 12,
            "fav_count": 3,
            "created_at": "2023-05-04T10:00:00.000-04:00"
        });
        let post = DanbooruPostTranslator.translate(&data, &normalizer).unwrap();

        assert_eq!(post.rating, Rating::Questionable);
        assert_eq!(post.tags, vec!["1girl", "highres"]);
        assert!(post.origin_urls.is_empty());
        assert_eq!(post.image_ratio, 0.67);
        assert!(post.small.unwrap().url.contains("preview"));
        assert!(post.medium.unwrap().url.contains("sample"));
        assert!(post.created_at.is_some());
    }

    #[test]
    fn post_without_dimensions_is_skipped() {
        let normalizer = TagNormalizer::new(NormalizerConfig::default());
        let data = json!({"id": 1, "file_url": "https://x/y.png", "tag_string": ""});
        assert!(DanbooruPostTranslator.translate(&data, &normalizer).is_none());
    }
}
