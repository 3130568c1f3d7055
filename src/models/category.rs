use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag category shared by every source vocabulary.
///
/// The first group are semantic categories reported by the imageboards; the
/// rest are structural categories assigned by the normalizer itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    General,
    Species,
    Character,
    Artist,
    Copyright,
    Meta,
    Lore,
    Symbol,
    AspectRatio,
    Rating,
    Score,
    Favorites,
    Comments,
    Views,
    Description,
    Rising,
    Invalid,
}

impl Category {
    /// Every category, in default naming order.
    pub const ALL: [Category; 17] = [
        Category::General,
        Category::Species,
        Category::Character,
        Category::Copyright,
        Category::Artist,
        Category::Lore,
        Category::Meta,
        Category::Symbol,
        Category::AspectRatio,
        Category::Rating,
        Category::Score,
        Category::Favorites,
        Category::Comments,
        Category::Views,
        Category::Description,
        Category::Rising,
        Category::Invalid,
    ];

    /// Categories a general tag can be moved into when its name ends in
    /// `_(category)` or `_category`.
    pub const RECATEGORIZABLE: [Category; 4] = [
        Category::Artist,
        Category::Character,
        Category::Copyright,
        Category::Species,
    ];

    /// Returns the lowercase name used in tag prefixes and suffixes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Species => "species",
            Self::Character => "character",
            Self::Artist => "artist",
            Self::Copyright => "copyright",
            Self::Meta => "meta",
            Self::Lore => "lore",
            Self::Symbol => "symbol",
            Self::AspectRatio => "aspect_ratio",
            Self::Rating => "rating",
            Self::Score => "score",
            Self::Favorites => "favorites",
            Self::Comments => "comments",
            Self::Views => "views",
            Self::Description => "description",
            Self::Rising => "rising",
            Self::Invalid => "invalid",
        }
    }

    /// Categories whose tags keep their origin name verbatim in every tier.
    pub fn is_long_name(self) -> bool {
        matches!(
            self,
            Self::Symbol
                | Self::AspectRatio
                | Self::Score
                | Self::Favorites
                | Self::Rating
                | Self::Comments
                | Self::Views
                | Self::Description
                | Self::Rising
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-category priority used to break naming ties.
///
/// Lower weight means more generic, and the more generic tag wins a
/// contested name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingOrder {
    weights: HashMap<Category, i64>,
}

impl NamingOrder {
    /// Builds an order from explicit weights. Categories missing from
    /// `overrides` keep their default weight.
    pub fn with_overrides(overrides: HashMap<Category, i64>) -> Self {
        let mut order = Self::default();
        order.weights.extend(overrides);
        order
    }

    /// Returns the weight of `category`.
    pub fn rank(&self, category: Category) -> i64 {
        self.weights.get(&category).copied().unwrap_or(i64::MAX)
    }
}

impl Default for NamingOrder {
    fn default() -> Self {
        let weights = Category::ALL
            .iter()
            .enumerate()
            .map(|(weight, category)| (*category, weight as i64))
            .collect();
        Self { weights }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&Category::AspectRatio).unwrap();
        assert_eq!(json, r#""aspect_ratio""#);

        let parsed: Category = serde_json::from_str(r#""species""#).unwrap();
        assert_eq!(parsed, Category::Species);
    }

    #[test]
    fn display_matches_serialized_name() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{category}\""));
        }
    }

    #[test]
    fn long_name_categories() {
        assert!(Category::Symbol.is_long_name());
        assert!(Category::Rising.is_long_name());
        assert!(!Category::General.is_long_name());
        assert!(!Category::Meta.is_long_name());
        assert!(!Category::Invalid.is_long_name());
    }

    #[test]
    fn default_order_prefers_general_over_artist() {
        let order = NamingOrder::default();
        assert_eq!(order.rank(Category::General), 0);
        assert!(order.rank(Category::Species) < order.rank(Category::Artist));
        assert!(order.rank(Category::Artist) < order.rank(Category::Meta));
    }

    #[test]
    fn overrides_keep_unlisted_defaults() {
        let order = NamingOrder::with_overrides(HashMap::from([(Category::Artist, -1)]));
        assert_eq!(order.rank(Category::Artist), -1);
        assert_eq!(order.rank(Category::General), 0);
    }
}
