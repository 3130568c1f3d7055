//! Pure name derivation for the v1 and v2 tag namespaces.

use any_ascii::any_ascii;

use crate::config::NormalizerConfig;
use crate::models::{Category, ProtoTag};

const WESTERN_ARTIST: &str = "_(western_artist)";

/// The three derived names of a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameForms {
    /// `category:name`, or the bare name for general tags.
    pub v1: String,
    /// Cleaned name with a `_category` suffix unless general.
    pub v2_long: String,
    /// Cleaned name without suffix.
    pub v2_short: String,
}

impl NameForms {
    fn uniform(name: String) -> Self {
        Self {
            v1: name.clone(),
            v2_long: name.clone(),
            v2_short: name,
        }
    }

    /// Returns true if any form came out empty.
    pub fn has_empty(&self) -> bool {
        self.v1.is_empty() || self.v2_long.is_empty() || self.v2_short.is_empty()
    }
}

/// Symbol and aspect ratio lists that change how names are derived.
#[derive(Debug, Clone, Copy)]
pub struct NamingRules<'a> {
    symbols: &'a [String],
    aspect_ratios: &'a [String],
}

impl<'a> NamingRules<'a> {
    pub fn new(symbols: &'a [String], aspect_ratios: &'a [String]) -> Self {
        Self {
            symbols,
            aspect_ratios,
        }
    }

    pub fn from_config(config: &'a NormalizerConfig) -> Self {
        Self::new(&config.symbols, &config.aspect_ratios)
    }

    /// Returns true if `reference_name` is a configured aspect ratio.
    pub fn is_aspect_ratio(&self, reference_name: &str) -> bool {
        self.aspect_ratios.iter().any(|name| name == reference_name)
    }

    /// Returns true if `reference_name` is a configured symbol.
    pub fn is_symbol(&self, reference_name: &str) -> bool {
        self.symbols.iter().any(|name| name == reference_name)
    }

    /// Derives all three names for a proto tag.
    ///
    /// Configured aspect ratios and symbols are matched on the untouched
    /// reference name and keep it (with `:` turned into `_` for ratios) in
    /// every tier.
    pub fn derive(&self, tag: &ProtoTag) -> NameForms {
        if self.is_aspect_ratio(&tag.reference_name) {
            return NameForms::uniform(tag.reference_name.replace(':', "_"));
        }
        if self.is_symbol(&tag.reference_name) {
            return NameForms::uniform(tag.reference_name.clone());
        }

        NameForms {
            v1: self.v1_name(&tag.origin_name, tag.category),
            v2_long: self.v2_name(&tag.origin_name, tag.category, false),
            v2_short: self.v2_name(&tag.origin_name, tag.category, true),
        }
    }

    /// Override for meta tags that are aspect ratios and general tags that are symbols.
    pub fn special_name(&self, origin_name: &str, category: Category) -> Option<String> {
        match category {
            Category::Meta if self.aspect_ratios.iter().any(|n| n == origin_name) => {
                Some(format!("aspect_ratio:{}", origin_name.replace(':', "_")))
            }
            Category::General if self.symbols.iter().any(|n| n == origin_name) => {
                Some(format!("symbol:{origin_name}"))
            }
            _ => None,
        }
    }

    pub fn v1_name(&self, origin_name: &str, category: Category) -> String {
        if category.is_long_name() {
            return origin_name.to_string();
        }

        let stripped = self
            .special_name(origin_name, category)
            .unwrap_or_else(|| strip_specials(&clean_name(origin_name), category));

        match category {
            Category::General => stripped,
            _ => format!("{category}:{stripped}"),
        }
    }

    pub fn v2_name(&self, origin_name: &str, category: Category, short: bool) -> String {
        if category.is_long_name() {
            return origin_name.to_string();
        }

        let stripped = if self.v1_name(origin_name, category).starts_with("symbol:") {
            origin_name.to_string()
        } else {
            strip_specials(&clean_name(origin_name), category)
        };

        if short || category == Category::General {
            stripped
        } else {
            format!("{stripped}_{category}")
        }
    }
}

/// Folds gender glyphs, transliterates to ASCII, then lowercases and trims.
pub fn clean_name(name: &str) -> String {
    let name = name.replace('♂', "_male").replace('♀', "_female");
    any_ascii(&name).trim().to_lowercase()
}

/// Removes category markers and any character outside `[a-z0-9_/]`.
///
/// Runs of underscores collapse to one; leading and trailing underscores
/// are dropped.
pub fn strip_specials(name: &str, category: Category) -> String {
    let name = name
        .replace(&format!("_({category})"), "")
        .replace(WESTERN_ARTIST, "");

    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '/') {
            continue;
        }
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    out.trim_matches('_').to_string()
}

/// Alias key cleaning: lowercase and trim only, so raw v0 names stay intact.
pub fn clean_alias(alias: &str) -> String {
    alias.trim().to_lowercase()
}
