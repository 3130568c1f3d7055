use std::collections::BTreeSet;

use super::{Category, EntityId, TagVersion};

/// Alias index record: one name string bound to one entity.
///
/// A name owns at most one `TagRef`; rebinding replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub entity: EntityId,
    pub category: Category,
    pub versions: BTreeSet<TagVersion>,
    pub count: i64,
}

impl TagRef {
    /// Creates a reference carrying a single tier.
    pub fn new(entity: EntityId, category: Category, version: TagVersion, count: i64) -> Self {
        Self {
            entity,
            category,
            versions: BTreeSet::from([version]),
            count,
        }
    }

    /// Returns true if this binding is a legacy V0 binding and must not move.
    pub fn is_sticky(&self) -> bool {
        self.versions.contains(&TagVersion::V0)
    }
}
