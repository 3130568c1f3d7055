use crate::models::{EntityId, TagKey};

/// What [`add_tag`](super::TagNormalizer::add_tag) did to an alias slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The alias was new and now points at the tag.
    Created,
    /// The alias already pointed at the tag and gained a tier.
    Extended,
    /// The alias already pointed at the tag with this tier.
    Unchanged,
    /// The alias moved to the tag from a less generic one.
    Replaced { previous: EntityId },
    /// The alias stays with its current owner.
    Kept { owner: EntityId },
}

/// How a clash on a long v2 name was settled during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClashResolution {
    /// Two records were the same tag; the less used one was folded in.
    Merged {
        name: String,
        kept: TagKey,
        removed: TagKey,
    },
    /// Two different tags shared the name; the displaced one keeps its own long name.
    Rebound {
        name: String,
        winner: TagKey,
        displaced: TagKey,
    },
}

/// Counters collected by [`load`](super::TagNormalizer::load).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub tags: usize,
    pub invalid: usize,
    pub prefiltered: usize,
    pub rewritten: usize,
    pub recategorized: usize,
    pub symbols: usize,
    pub aspect_ratios: usize,
}

/// Outcome of [`normalize`](super::TagNormalizer::normalize).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub normalized: usize,
    pub resolutions: Vec<ClashResolution>,
    /// Tags that took a short name from a less generic tag.
    pub promotions: usize,
}

impl NormalizeReport {
    pub fn merges(&self) -> usize {
        self.resolutions
            .iter()
            .filter(|r| matches!(r, ClashResolution::Merged { .. }))
            .count()
    }

    pub fn rebinds(&self) -> usize {
        self.resolutions.len() - self.merges()
    }
}
