//! Tag normalization across source vocabularies.
//!
//! [`TagNormalizer`] gives every tag from every source a single preferred
//! name inside one shared namespace, while keeping the older naming tiers
//! resolvable:
//!
//! - `V0`: the raw source name (`fox_(artist)`)
//! - `V1`: category prefixed (`artist:fox`)
//! - `V2`: cleaned, with a category suffix when needed (`fox_artist`), or
//!   the short form (`fox`) when no more generic tag claims it
//!
//! A run is `load` followed by `normalize`:
//!
//! ```
//! use rising::{Category, NormalizerConfig, ProtoTag, Source, TagNormalizer, TagVersion};
//!
//! # fn main() -> Result<(), rising::NormalizerError> {
//! let mut normalizer = TagNormalizer::new(NormalizerConfig::default());
//! normalizer.load(vec![
//!     ProtoTag::new(Source::E621, "3", "fox", Category::Species, 1000),
//!     ProtoTag::new(Source::E621, "4", "fox_(artist)", Category::Artist, 5),
//! ])?;
//! normalizer.normalize(TagVersion::V2)?;
//!
//! assert_eq!(normalizer.normalize_tag("fox"), Some("fox"));
//! assert_eq!(normalizer.normalize_tag("fox_(artist)"), Some("fox_artist"));
//! # Ok(())
//! # }
//! ```
//!
//! Entities are visited in insertion order in every pass, so identical
//! input order and configuration always yield identical names.

mod error;
mod naming;
mod pseudo;
mod report;

use std::collections::HashMap;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::config::{NormalizerConfig, Rewrite};
use crate::models::{
    Category, EntityId, PostEntity, ProtoTag, TagEntity, TagKey, TagRef, TagVersion,
};

pub use error::NormalizerError;
pub use naming::{NameForms, NamingRules, clean_alias, clean_name, strip_specials};
pub use pseudo::{get_pseudo_tags, pseudo_tag_protos};
pub use report::{Binding, ClashResolution, LoadStats, NormalizeReport};

/// Merges involving fewer posts than this on both sides are not logged.
const SIGNIFICANT_POST_COUNT: i64 = 1;

/// Resolver for tag names across all sources and naming tiers.
///
/// Owns the entities, the alias index and the reference-name index. Not
/// meant to be shared between threads; callers pass it explicitly to
/// whatever needs lookups.
#[derive(Debug, Default)]
pub struct TagNormalizer {
    config: NormalizerConfig,
    /// Insertion-ordered slots; merged entities leave a `None` behind.
    entities: Vec<Option<TagEntity>>,
    id_map: HashMap<TagKey, EntityId>,
    ref_map: HashMap<String, TagRef>,
    original_map: HashMap<String, EntityId>,
    deep_search_misses: HashMap<String, usize>,
}

impl TagNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Rebuilds a normalizer from persisted entities.
    ///
    /// Each entity is indexed under its preferred name only.
    pub fn from_entities(
        config: NormalizerConfig,
        tags: impl IntoIterator<Item = TagEntity>,
        version: TagVersion,
    ) -> Self {
        let mut normalizer = Self::new(config);
        for tag in tags {
            normalizer.add_database_tag(tag, version);
        }
        normalizer
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    fn rules(&self) -> NamingRules<'_> {
        NamingRules::from_config(&self.config)
    }

    fn rank(&self, category: Category) -> i64 {
        self.config.naming_order.rank(category)
    }

    fn entity(&self, id: EntityId) -> Option<&TagEntity> {
        self.entities.get(id.get()).and_then(Option::as_ref)
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut TagEntity> {
        self.entities.get_mut(id.get()).and_then(Option::as_mut)
    }

    fn live_ids(&self) -> Vec<EntityId> {
        self.entities
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| EntityId::new(index))
            .collect()
    }

    fn owner(&self, alias: &str) -> Option<EntityId> {
        self.ref_map.get(alias).map(|r| r.entity)
    }

    fn set_preferred(&mut self, id: EntityId, name: String) {
        if let Some(tag) = self.entity_mut(id) {
            tag.preferred_name = name;
        }
    }

    /// Ingests a stream of proto tags, then registers the pseudo-tags.
    ///
    /// Invalid and prefiltered tags are skipped. General tags named like
    /// `x_(artist)` or `x_species` move to that category, rewrite rules are
    /// applied, and each tag is indexed under its v1, v2 long, v2 short and
    /// raw origin names.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizerError::IdentityClash`] if two records share a key
    /// but not a name. The normalizer should be discarded afterwards.
    pub fn load(
        &mut self,
        tags: impl IntoIterator<Item = ProtoTag>,
    ) -> Result<LoadStats, NormalizerError> {
        let mut stats = LoadStats::default();

        for mut proto in tags {
            stats.tags += 1;

            if proto.category == Category::Invalid {
                stats.invalid += 1;
                continue;
            }

            if self.config.prefilter.contains(&proto.origin_name) {
                stats.prefiltered += 1;
                continue;
            }

            self.recategorize(&mut proto);
            if proto.renamed {
                stats.recategorized += 1;
                debug!(
                    "Recategorized \"{}\" as {} ({})",
                    proto.origin_name,
                    proto.category,
                    proto.key()
                );
            }

            if self.rewrite(&mut proto) {
                stats.rewritten += 1;
            }

            let rules = self.rules();
            if rules.is_aspect_ratio(&proto.reference_name) {
                proto.category = Category::AspectRatio;
                stats.aspect_ratios += 1;
            } else if rules.is_symbol(&proto.reference_name) {
                proto.category = Category::Symbol;
                stats.symbols += 1;
            }
            let names = rules.derive(&proto);

            self.add_tag(&names.v1, &proto, TagVersion::V1)?;
            self.add_tag(&names.v2_long, &proto, TagVersion::V2)?;
            if names.v2_short != names.v2_long {
                self.add_tag(&names.v2_short, &proto, TagVersion::V2)?;
            }
            let origin_name = proto.origin_name.clone();
            self.add_tag(&origin_name, &proto, TagVersion::V0)?;
        }

        self.register_pseudo_tags()?;

        info!(
            "{} tags loaded; {} invalid, {} filtered, {} rewritten, {} recategorized; {} symbols and {} aspect ratios",
            stats.tags,
            stats.invalid,
            stats.prefiltered,
            stats.rewritten,
            stats.recategorized,
            stats.symbols,
            stats.aspect_ratios
        );

        Ok(stats)
    }

    /// Moves a general tag into the category its name ends with and marks it
    /// as renamed.
    fn recategorize(&self, proto: &mut ProtoTag) {
        if proto.category != Category::General {
            return;
        }

        let name = &proto.origin_name;
        let target = Category::RECATEGORIZABLE.into_iter().rev().find(|category| {
            name.ends_with(&format!("_({category})")) || name.ends_with(&format!("_{category}"))
        });

        if let Some(category) = target {
            proto.category = category;
            proto.renamed = true;
        }
    }

    fn rewrite(&self, proto: &mut ProtoTag) -> bool {
        let Some(rewrite) = self.config.rewrites.get(&proto.origin_name) else {
            return false;
        };

        match rewrite {
            Rewrite::Name(name) => proto.origin_name = name.clone(),
            Rewrite::Override { name, source_id } => {
                if let Some(name) = name {
                    proto.origin_name = name.clone();
                }
                if let Some(source_id) = source_id {
                    proto.source_id = source_id.clone();
                }
            }
        }
        true
    }

    /// Registers every pseudo-tag into the shared namespace.
    pub fn register_pseudo_tags(&mut self) -> Result<(), NormalizerError> {
        for proto in pseudo_tag_protos() {
            let label = proto.origin_name.clone();
            self.add_tag(&label, &proto, TagVersion::V2)?;
        }
        Ok(())
    }

    /// Binds `alias` to the entity of `proto` at tier `version`.
    ///
    /// A free alias is bound outright. An alias already owned by the same
    /// entity only gains the tier. An alias owned by another entity moves
    /// only if this entity's category ranks strictly lower and the current
    /// binding carries no `V0` tier.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizerError::IdentityClash`] from
    /// [`register_tag_reference`](Self::register_tag_reference).
    pub fn add_tag(
        &mut self,
        alias: &str,
        proto: &ProtoTag,
        version: TagVersion,
    ) -> Result<Binding, NormalizerError> {
        let alias = clean_alias(alias);
        let id = self.register_tag_reference(proto)?;
        let (category, count) = match self.entity(id) {
            Some(tag) => (tag.category, tag.post_count),
            None => (proto.category, proto.post_count),
        };

        let order = &self.config.naming_order;
        let Some(existing) = self.ref_map.get_mut(&alias) else {
            self.ref_map
                .insert(alias, TagRef::new(id, category, version, count));
            return Ok(Binding::Created);
        };

        if existing.entity == id {
            return Ok(if existing.versions.insert(version) {
                Binding::Extended
            } else {
                Binding::Unchanged
            });
        }

        if order.rank(category) < order.rank(existing.category) && !existing.is_sticky() {
            let previous = existing.entity;
            debug!(
                "Lookup replacement: {alias} -- {previous} => {id}, category {} => {category}",
                existing.category
            );
            *existing = TagRef::new(id, category, version, count);
            return Ok(Binding::Replaced { previous });
        }

        Ok(Binding::Kept {
            owner: existing.entity,
        })
    }

    /// Returns the entity for `proto`'s key, creating it on first sight.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizerError::IdentityClash`] if the key is known under
    /// a different origin name.
    pub fn register_tag_reference(&mut self, proto: &ProtoTag) -> Result<EntityId, NormalizerError> {
        let key = proto.key();

        if let Some(&id) = self.id_map.get(&key) {
            if let Some(existing) = self.entity(id)
                && existing.origin_name != proto.origin_name
            {
                warn!(
                    "Tag clash between \"{}\" and \"{}\" -- both have same ID and source",
                    proto.origin_name, existing.origin_name
                );
                return Err(NormalizerError::IdentityClash {
                    key,
                    existing: existing.origin_name.clone(),
                    incoming: proto.origin_name.clone(),
                });
            }
            self.original_map
                .entry(proto.reference_name.clone())
                .or_insert(id);
            return Ok(id);
        }

        let names = self.rules().derive(proto);
        if names.has_empty() {
            warn!(
                "Tag converts to empty tag name: \"{}\" ({key})",
                proto.origin_name
            );
        }

        let tag = TagEntity {
            source: proto.source,
            source_id: proto.source_id.clone(),
            origin_name: proto.origin_name.clone(),
            category: proto.category,
            reference_name: proto.reference_name.clone(),
            preferred_name: names.v2_long.clone(),
            v1_name: names.v1,
            v2_name: names.v2_long,
            v2_short: names.v2_short,
            post_count: proto.post_count,
            aliases: proto.aliases.clone(),
            timestamp: OffsetDateTime::now_utc(),
        };

        let id = EntityId::new(self.entities.len());
        self.entities.push(Some(tag));
        self.id_map.insert(key, id);
        self.original_map.insert(proto.reference_name.clone(), id);
        Ok(id)
    }

    /// Indexes a persisted entity under its preferred name.
    ///
    /// Only for rebuilding a normalizer from storage; no clash handling.
    pub fn add_database_tag(&mut self, tag: TagEntity, version: TagVersion) {
        let key = tag.key();
        let alias = clean_alias(&tag.preferred_name);
        let tag_ref = TagRef::new(EntityId::new(0), tag.category, version, tag.post_count);
        let reference_name = tag.reference_name.clone();

        let id = match self.id_map.get(&key) {
            Some(&id) => {
                if let Some(previous) = self.entity(id) {
                    let stale = clean_alias(&previous.preferred_name);
                    if stale != alias && self.owner(&stale) == Some(id) {
                        self.ref_map.remove(&stale);
                    }
                }
                self.entities[id.get()] = Some(tag);
                id
            }
            None => {
                let id = EntityId::new(self.entities.len());
                self.entities.push(Some(tag));
                self.id_map.insert(key, id);
                id
            }
        };

        self.original_map.insert(reference_name, id);
        self.ref_map.insert(
            alias,
            TagRef {
                entity: id,
                ..tag_ref
            },
        );
    }

    /// Assigns every entity its final preferred name for `target`.
    ///
    /// `V0` and `V1` copy the origin or v1 name. `V2` first settles clashes
    /// on long names: identical tags are merged (the one with more posts
    /// survives), different tags each keep a name they still hold. A second pass
    /// then hands short names to the most generic claimant.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizerError::MissingLongAlias`] or
    /// [`NormalizerError::StaleClashTarget`] when the alias index points at
    /// a missing entity.
    pub fn normalize(&mut self, target: TagVersion) -> Result<NormalizeReport, NormalizerError> {
        let mut report = NormalizeReport::default();

        for id in self.live_ids() {
            let Some(tag) = self.entity(id) else {
                // merged away earlier in this pass
                continue;
            };

            match target {
                TagVersion::V0 => {
                    let name = tag.origin_name.clone();
                    self.set_preferred(id, name);
                }
                TagVersion::V1 => {
                    let name = tag.v1_name.clone();
                    self.set_preferred(id, name);
                }
                TagVersion::V2 => self.resolve_long_name(id, &mut report)?,
            }
            report.normalized += 1;
        }

        if target == TagVersion::V2 {
            self.promote_short_names(&mut report);
        }

        info!(
            "{} tags normalized, {} merged, {} rebound, {} promoted",
            report.normalized,
            report.merges(),
            report.rebinds(),
            report.promotions
        );

        Ok(report)
    }

    fn resolve_long_name(
        &mut self,
        id: EntityId,
        report: &mut NormalizeReport,
    ) -> Result<(), NormalizerError> {
        let Some(tag) = self.entity(id) else {
            return Ok(());
        };
        let key = tag.key();
        let category = tag.category;
        let count = tag.post_count;
        let short_name = tag.v2_short.clone();
        let long_name = tag.v2_name.clone();
        let long = clean_alias(&long_name);

        if self.owner(&clean_alias(&short_name)) == Some(id) {
            self.set_preferred(id, short_name);
        }

        let Some(other_id) = self.owner(&long) else {
            return Err(NormalizerError::MissingLongAlias {
                name: long_name,
                key,
            });
        };

        if other_id != id {
            let Some(other) = self.entity(other_id) else {
                return Err(NormalizerError::StaleClashTarget {
                    name: long_name,
                    expected: other_id.to_string(),
                });
            };

            if other.v2_name == long_name && other.category == category {
                return self.merge(id, other_id, &long_name, report);
            }

            let other_key = other.key();
            self.ref_map
                .insert(long, TagRef::new(id, category, TagVersion::V2, count));
            let other_name = self.owned_name(other_id);
            warn!(
                "Name clash on \"{long_name}\": {key} takes it, {other_key} keeps \"{other_name}\". Use rewrite or prefilter rules to resolve this conflict if necessary."
            );
            self.set_preferred(other_id, other_name);
            report.resolutions.push(ClashResolution::Rebound {
                name: long_name.clone(),
                winner: key,
                displaced: other_key,
            });
        }

        self.set_preferred(id, long_name);
        Ok(())
    }

    /// First of the entity's own names it still holds in the alias index:
    /// v2 long, v1, v2 short, then the raw origin name. Falls back to the
    /// current preferred name when another tag holds all of them.
    fn owned_name(&self, id: EntityId) -> String {
        let Some(tag) = self.entity(id) else {
            return String::new();
        };

        let held = [&tag.v2_name, &tag.v1_name, &tag.v2_short, &tag.origin_name]
            .into_iter()
            .find(|name| self.owner(&clean_alias(name)) == Some(id));

        match held {
            Some(name) => name.clone(),
            None => {
                warn!(
                    "{} holds none of its names; keeping \"{}\"",
                    tag.key(),
                    tag.preferred_name
                );
                tag.preferred_name.clone()
            }
        }
    }

    /// Folds the less used of two identical tags into the other.
    fn merge(
        &mut self,
        id: EntityId,
        other_id: EntityId,
        name: &str,
        report: &mut NormalizeReport,
    ) -> Result<(), NormalizerError> {
        let (Some(tag), Some(other)) = (self.entity(id), self.entity(other_id)) else {
            return Err(NormalizerError::StaleClashTarget {
                name: name.to_string(),
                expected: other_id.to_string(),
            });
        };

        let (removed_id, kept_id) = if tag.post_count <= other.post_count {
            (id, other_id)
        } else {
            (other_id, id)
        };

        let Some(removed) = self.entities[removed_id.get()].take() else {
            return Ok(());
        };
        self.id_map.remove(&removed.key());

        let Some(kept) = self.entity(kept_id) else {
            return Ok(());
        };
        let kept_key = kept.key();
        let kept_category = kept.category;
        let kept_count = kept.post_count;
        let kept_name = kept.preferred_name.clone();
        let kept_origin = kept.origin_name.clone();

        for alias in [
            &removed.v1_name,
            &removed.v2_name,
            &removed.v2_short,
            &removed.origin_name,
        ] {
            if let Some(slot) = self.ref_map.get_mut(&clean_alias(alias))
                && slot.entity == removed_id
            {
                slot.entity = kept_id;
                slot.category = kept_category;
                slot.count = kept_count;
            }
        }

        if self.original_map.get(&removed.reference_name) == Some(&removed_id) {
            self.original_map
                .insert(removed.reference_name.clone(), kept_id);
        }

        if kept_count >= SIGNIFICANT_POST_COUNT || removed.post_count >= SIGNIFICANT_POST_COUNT {
            warn!(
                "Merged tags: \"{kept_origin}\" and \"{}\" have been merged together as \"{kept_name}\". Use rewrite or prefilter rules to resolve this conflict if necessary.",
                removed.origin_name
            );
        }

        report.resolutions.push(ClashResolution::Merged {
            name: name.to_string(),
            kept: kept_key,
            removed: removed.key(),
        });
        Ok(())
    }

    /// Gives each tag its short name when it is free or held by a less
    /// generic tag. First come wins among equal ranks.
    fn promote_short_names(&mut self, report: &mut NormalizeReport) {
        for id in self.live_ids() {
            let Some(tag) = self.entity(id) else {
                continue;
            };
            let short_name = tag.v2_short.clone();
            let short = clean_alias(&short_name);
            let category = tag.category;
            let count = tag.post_count;

            let origin_name = tag.origin_name.clone();

            let Some(owner) = self.owner(&short) else {
                debug!("Preferring \"{short_name}\" for \"{origin_name}\" ({category})");
                self.ref_map
                    .insert(short, TagRef::new(id, category, TagVersion::V2, count));
                self.set_preferred(id, short_name);
                continue;
            };

            if owner == id {
                self.set_preferred(id, short_name);
                continue;
            }

            let Some(other) = self.entity(owner) else {
                continue;
            };

            // the holder's own long name, not a contested short one
            if other.v2_name == short_name {
                continue;
            }

            if self.rank(category) >= self.rank(other.category) {
                continue;
            }

            let other_category = other.category;
            let other_count = other.post_count;
            let other_long = other.v2_name.clone();
            debug!(
                "Switching \"{}\" ({other_category}) to \"{other_long}\"",
                other.origin_name
            );

            let other_long_alias = clean_alias(&other_long);
            if self.owner(&other_long_alias) != Some(owner) {
                self.ref_map.insert(
                    other_long_alias,
                    TagRef::new(owner, other_category, TagVersion::V2, other_count),
                );
            }
            self.set_preferred(owner, other_long);

            self.ref_map
                .insert(short, TagRef::new(id, category, TagVersion::V2, count));
            self.set_preferred(id, short_name);
            report.promotions += 1;
        }
    }

    /// Resolves any alias of any tier to its entity.
    pub fn get(&self, name: &str) -> Option<&TagEntity> {
        self.owner(&clean_alias(name))
            .and_then(|id| self.entity(id))
    }

    /// Returns the alias index record for `name`.
    pub fn get_ref(&self, name: &str) -> Option<&TagRef> {
        self.ref_map.get(&clean_alias(name))
    }

    /// Looks a tag up by the exact name its source reported.
    pub fn get_by_original_name(&self, reference_name: &str) -> Option<&TagEntity> {
        self.original_map
            .get(reference_name)
            .and_then(|&id| self.entity(id))
    }

    /// Last-resort lookup scanning reference names and source aliases.
    ///
    /// Linear in the number of tags. Misses are counted, see
    /// [`deep_search_misses`](Self::deep_search_misses).
    pub fn get_by_deep_search(&mut self, name: &str) -> Option<&TagEntity> {
        let found = self
            .entities
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|tag| tag.answers_to(name)));

        match found {
            Some(index) => self.entity(EntityId::new(index)),
            None => {
                warn!("Could not locate relevant tag for \"{name}\" -- ignored");
                *self.deep_search_misses.entry(name.to_string()).or_default() += 1;
                None
            }
        }
    }

    pub fn deep_search_misses(&self) -> &HashMap<String, usize> {
        &self.deep_search_misses
    }

    /// Preferred name for a raw source tag, if the tag is known.
    pub fn normalize_tag(&self, raw_name: &str) -> Option<&str> {
        self.get_by_original_name(raw_name)
            .map(|tag| tag.preferred_name.as_str())
    }

    /// Pseudo-tag labels that apply to `post`.
    pub fn get_pseudo_tags(&self, post: &PostEntity) -> Vec<String> {
        get_pseudo_tags(post)
    }

    /// All live entities in insertion order.
    pub fn get_tags(&self) -> impl Iterator<Item = &TagEntity> {
        self.entities.iter().filter_map(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.id_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_map.is_empty()
    }
}
