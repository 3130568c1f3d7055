use serde::{Deserialize, Serialize};
use std::fmt;

use super::Source;

/// Identity of a tag: the source it came from plus the source's own id.
///
/// Exactly one entity exists per key for the lifetime of a normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagKey {
    pub source: Source,
    pub source_id: String,
}

impl TagKey {
    /// Creates a new tag key.
    pub fn new(source: Source, source_id: impl Into<String>) -> Self {
        Self {
            source,
            source_id: source_id.into(),
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}___{}", self.source, self.source_id)
    }
}

/// Slot of an entity inside a normalizer.
///
/// Only meaningful for the normalizer that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

impl EntityId {
    /// Creates a new entity ID.
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the underlying slot index.
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_key_display_joins_source_and_id() {
        let key = TagKey::new(Source::E621, "1234");
        assert_eq!(key.to_string(), "e621___1234");
    }

    #[test]
    fn keys_differ_by_source() {
        let a = TagKey::new(Source::E621, "1");
        let b = TagKey::new(Source::Danbooru, "1");
        assert_ne!(a, b);
    }
}
