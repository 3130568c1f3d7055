use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{Rating, Source};

/// A downscaled rendition of a post's image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageVariant {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// A post imported from a source, with tags rewritten to preferred names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostEntity {
    pub source: Source,
    pub source_id: String,
    pub rating: Rating,
    pub tags: Vec<String>,
    pub description: Option<String>,

    pub origin_urls: Vec<String>,
    pub origin_md5: Option<String>,
    pub origin_format: String,
    pub origin_size: Option<u64>,

    pub image_url: String,
    pub image_width: u32,
    pub image_height: u32,
    pub image_ratio: f64,
    pub small: Option<ImageVariant>,
    pub medium: Option<ImageVariant>,

    pub score: Option<i64>,
    pub favorites_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub view_count: Option<i64>,

    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl PostEntity {
    /// Appends tags that are not already present, keeping first occurrences.
    pub fn extend_tags(&mut self, tags: impl IntoIterator<Item = String>) {
        for tag in tags {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }

    /// Removes duplicate tags, keeping the first occurrence of each.
    pub fn dedup_tags(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.tags.retain(|tag| seen.insert(tag.clone()));
    }
}

/// Width over height rounded to two decimals.
pub fn aspect_ratio(width: u32, height: u32) -> Option<f64> {
    if width == 0 || height == 0 {
        return None;
    }
    Some((f64::from(width) / f64::from(height) * 100.0).round() / 100.0)
}

/// File extension of a URL or file name, without the dot.
pub fn file_extension(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    let name = name.split(['?', '#']).next().unwrap_or(name);
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
pub(crate) fn sample_post() -> PostEntity {
    PostEntity {
        source: Source::E621,
        source_id: "100".to_string(),
        rating: Rating::Safe,
        tags: vec!["fox".to_string()],
        description: None,
        origin_urls: Vec::new(),
        origin_md5: None,
        origin_format: "png".to_string(),
        origin_size: None,
        image_url: "https://static.example/a.png".to_string(),
        image_width: 1000,
        image_height: 500,
        image_ratio: 2.0,
        small: None,
        medium: None,
        score: Some(10),
        favorites_count: Some(10),
        comment_count: None,
        view_count: None,
        created_at: None,
        timestamp: OffsetDateTime::UNIX_EPOCH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut post = sample_post();
        post.tags = ["a", "b", "a", "c", "b"].map(String::from).to_vec();
        post.dedup_tags();
        assert_eq!(post.tags, vec!["a", "b", "c"]);
    }

    #[test]
    fn extend_skips_existing_tags() {
        let mut post = sample_post();
        post.extend_tags(vec!["fox".to_string(), "rating_safe".to_string()]);
        assert_eq!(post.tags, vec!["fox", "rating_safe"]);
    }

    #[test]
    fn aspect_ratio_rounds_to_two_decimals() {
        assert_eq!(aspect_ratio(1920, 1080), Some(1.78));
        assert_eq!(aspect_ratio(100, 0), None);
    }

    #[test]
    fn file_extension_ignores_query() {
        assert_eq!(file_extension("https://x/y/abc.JPG?123"), "jpg");
        assert_eq!(file_extension("image.webm"), "webm");
        assert_eq!(file_extension("noext"), "");
    }

    #[test]
    fn post_rejects_unknown_fields() {
        let mut value = serde_json::to_value(sample_post()).unwrap();
        value["selector"] = serde_json::json!("x");
        assert!(serde_json::from_value::<PostEntity>(value).is_err());
    }
}
