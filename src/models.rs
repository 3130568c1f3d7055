mod category;
mod ids;
mod post;
mod source;
mod tag;
mod tag_ref;

pub use category::{Category, NamingOrder};
pub use ids::{EntityId, TagKey};
pub use post::{ImageVariant, PostEntity, aspect_ratio, file_extension};
pub use source::{Rating, Source};
pub use tag::{ProtoTag, TagEntity, TagVersion};
pub use tag_ref::TagRef;

#[cfg(test)]
pub(crate) use post::sample_post;
