use thiserror::Error;

use crate::models::TagKey;

/// Conditions that abort a normalizer run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizerError {
    /// Two records share a key but disagree on the tag name.
    #[error("Tag clash between \"{incoming}\" and \"{existing}\": both have id {key}")]
    IdentityClash {
        key: TagKey,
        existing: String,
        incoming: String,
    },

    /// A tag's long v2 name was never indexed during load.
    #[error("Long name \"{name}\" of tag {key} is missing from the alias index")]
    MissingLongAlias { name: String, key: TagKey },

    /// The tag holding a contested name no longer owns its own long name,
    /// or no longer exists.
    #[error("Clash on \"{name}\": tag {expected} no longer owns its own name")]
    StaleClashTarget { name: String, expected: String },
}
