//! Synthetic tags derived from post statistics.

use crate::models::{Category, PostEntity, ProtoTag, Rating, Source};

pub const SCORE_ABOVE: [i64; 6] = [100, 250, 500, 1000, 1500, 2000];
pub const SCORE_BELOW: [i64; 6] = [0, 25, 50, 100, 250, 500];
pub const FAVORITES_ABOVE: [i64; 6] = [250, 500, 1000, 2000, 3000, 4000];
pub const FAVORITES_BELOW: [i64; 6] = [25, 50, 100, 250, 500, 1000];
pub const RISING_TYPES: [&str; 2] = ["masterpiece", "unpopular"];

const MASTERPIECE_SCORE: i64 = 650;
const MASTERPIECE_FAVORITES: i64 = 1500;
const UNPOPULAR_SCORE: i64 = 15;

fn label_protos(labels: impl IntoIterator<Item = String>, category: Category) -> Vec<ProtoTag> {
    labels
        .into_iter()
        .map(|label| ProtoTag::new(Source::Rising, label.clone(), label, category, 0))
        .collect()
}

/// Every pseudo-tag as a proto tag from the `rising` source.
///
/// The label doubles as source id, so registering them twice is harmless.
pub fn pseudo_tag_protos() -> Vec<ProtoTag> {
    let mut protos = Vec::new();
    protos.extend(label_protos(
        SCORE_ABOVE.iter().map(|t| format!("score_above_{t}")),
        Category::Score,
    ));
    protos.extend(label_protos(
        SCORE_BELOW.iter().map(|t| format!("score_below_{t}")),
        Category::Score,
    ));
    protos.extend(label_protos(
        FAVORITES_ABOVE.iter().map(|t| format!("favorites_above_{t}")),
        Category::Favorites,
    ));
    protos.extend(label_protos(
        FAVORITES_BELOW.iter().map(|t| format!("favorites_below_{t}")),
        Category::Favorites,
    ));
    protos.extend(label_protos(
        Rating::ALL.iter().map(|r| format!("rating_{}", r.label())),
        Category::Rating,
    ));
    protos.extend(label_protos(
        RISING_TYPES.iter().map(|t| format!("rising_{t}")),
        Category::Rising,
    ));
    protos
}

/// Labels of the pseudo-tags that apply to `post`.
///
/// Missing statistics produce no threshold tags. `rising_masterpiece`
/// requires both score and favorites to be known.
pub fn get_pseudo_tags(post: &PostEntity) -> Vec<String> {
    let mut tags = Vec::new();

    if let Some(score) = post.score {
        tags.extend(
            SCORE_ABOVE
                .iter()
                .filter(|&&t| score > t)
                .map(|t| format!("score_above_{t}")),
        );
        tags.extend(
            SCORE_BELOW
                .iter()
                .filter(|&&t| score < t)
                .map(|t| format!("score_below_{t}")),
        );
    }

    if let Some(favorites) = post.favorites_count {
        tags.extend(
            FAVORITES_ABOVE
                .iter()
                .filter(|&&t| favorites > t)
                .map(|t| format!("favorites_above_{t}")),
        );
        tags.extend(
            FAVORITES_BELOW
                .iter()
                .filter(|&&t| favorites < t)
                .map(|t| format!("favorites_below_{t}")),
        );
    }

    tags.push(format!("rating_{}", post.rating.label()));

    if let (Some(score), Some(favorites)) = (post.score, post.favorites_count)
        && (score >= MASTERPIECE_SCORE || favorites >= MASTERPIECE_FAVORITES)
    {
        tags.push("rising_masterpiece".to_string());
    }

    if post.score.is_some_and(|score| score < UNPOPULAR_SCORE) {
        tags.push("rising_unpopular".to_string());
    }

    tags
}
