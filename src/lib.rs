pub mod config;
pub mod db;
pub mod importer;
pub mod models;
pub mod normalizer;
pub mod selector;
pub mod translator;
pub mod utils;

pub use config::{ConfigPaths, NormalizerConfig, Rewrite};
pub use db::{Database, PostFilter, TagNameField};
pub use importer::{ImportStats, JsonLines, PostImporter, load_aliases, read_tags};
pub use models::{
    Category, EntityId, ImageVariant, NamingOrder, PostEntity, ProtoTag, Rating, Source,
    TagEntity, TagKey, TagRef, TagVersion,
};
pub use normalizer::{
    Binding, ClashResolution, LoadStats, NormalizeReport, NormalizerError, TagNormalizer,
    get_pseudo_tags,
};
pub use selector::{SelectedPost, Selector, SelectorLists};
