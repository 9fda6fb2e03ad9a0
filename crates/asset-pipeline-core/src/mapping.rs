//! Bijective correspondence between two representations of an asset.
//!
//! A [`TransferMapping`] pairs the entities and groups below a source root
//! with their counterparts below a target root. Two nodes correspond when
//! their names are equal after stripping each side's transfer suffix. Both
//! directions are indexed so that no target is ever claimed twice.

use crate::graph::{Document, EntityId, GroupId};
use crate::suffix::{strip_transfer_suffix, Representation};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Errors raised while building or mutating a mapping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    /// A root group does not exist in the document.
    #[error("mapping root {0} does not exist")]
    UnknownRoot(GroupId),
    /// Source and target are the same group.
    #[error("source and target root are both {0}")]
    SameRoot(GroupId),
    /// The target is already paired with another source.
    #[error("target {target} is already mapped from {existing}")]
    TargetClaimed {
        /// Node that would be claimed twice
        target: String,
        /// Source already holding it
        existing: String,
    },
    /// A group cannot be created because its parent has no counterpart.
    #[error("group {group} has no mapped parent in the target (parent {parent})")]
    UnmappedParent {
        /// Source group being transferred
        group: String,
        /// Its source parent
        parent: String,
    },
}

/// A root group together with the transfer suffix of its representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRoot {
    /// Root group of the representation
    pub group: GroupId,
    /// Suffix carried by every name below the root
    pub suffix: String,
}

impl MappingRoot {
    /// Create a mapping root.
    #[must_use]
    pub fn new(group: GroupId, suffix: impl Into<String>) -> Self {
        Self {
            group,
            suffix: suffix.into(),
        }
    }

    /// Mapping root for one of the standard representations.
    #[must_use]
    pub fn of(group: GroupId, representation: Representation) -> Self {
        Self::new(group, representation.transfer_suffix())
    }
}

/// Correspondence between a source and a target hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMapping {
    source: MappingRoot,
    target: MappingRoot,
    entity_map: BTreeMap<EntityId, EntityId>,
    entity_sources: BTreeMap<EntityId, EntityId>,
    group_map: BTreeMap<GroupId, GroupId>,
    group_sources: BTreeMap<GroupId, GroupId>,
}

impl TransferMapping {
    /// Build the mapping between `source` and `target` in `document`.
    ///
    /// # Errors
    ///
    /// Returns an error if a root is missing or both roots are the same
    /// group.
    pub fn build(
        document: &Document,
        source: MappingRoot,
        target: MappingRoot,
    ) -> Result<Self, MappingError> {
        let mut mapping = Self {
            source,
            target,
            entity_map: BTreeMap::new(),
            entity_sources: BTreeMap::new(),
            group_map: BTreeMap::new(),
            group_sources: BTreeMap::new(),
        };
        mapping.regenerate(document)?;
        Ok(mapping)
    }

    /// Discard all pairs and recompute them from the current document.
    ///
    /// # Errors
    ///
    /// Returns an error if a root is missing or both roots are the same
    /// group.
    pub fn regenerate(&mut self, document: &Document) -> Result<(), MappingError> {
        let (source_root, target_root) = (self.source.group, self.target.group);
        for root in [source_root, target_root] {
            if !document.contains_group(root) {
                return Err(MappingError::UnknownRoot(root));
            }
        }
        if source_root == target_root {
            return Err(MappingError::SameRoot(source_root));
        }

        self.entity_map.clear();
        self.entity_sources.clear();
        self.group_map.clear();
        self.group_sources.clear();

        self.group_map.insert(source_root, target_root);
        self.group_sources.insert(target_root, source_root);

        let target_groups = index_by_base_name(
            document.descendants(target_root),
            |id| document.group_name(id).to_string(),
            &self.target.suffix,
        );
        for source in document.descendants(source_root) {
            let base = strip_transfer_suffix(document.group_name(source), &self.source.suffix);
            if let Some(target) = target_groups.get(&base) {
                if self.group_sources.contains_key(target) || self.group_map.contains_key(&source) {
                    continue;
                }
                self.group_map.insert(source, *target);
                self.group_sources.insert(*target, source);
            }
        }

        let target_entities = index_by_base_name(
            document.all_entities(target_root),
            |id| document.entity_name(id).to_string(),
            &self.target.suffix,
        );
        for source in document.all_entities(source_root) {
            let base = strip_transfer_suffix(document.entity_name(source), &self.source.suffix);
            if let Some(target) = target_entities.get(&base) {
                if self.entity_sources.contains_key(target) {
                    continue;
                }
                self.entity_map.insert(source, *target);
                self.entity_sources.insert(*target, source);
            }
        }

        tracing::debug!(
            source_root = %source_root,
            target_root = %target_root,
            entities = self.entity_map.len(),
            groups = self.group_map.len(),
            "Generated transfer mapping"
        );
        Ok(())
    }

    /// Source root and suffix.
    #[must_use]
    pub fn source(&self) -> &MappingRoot {
        &self.source
    }

    /// Target root and suffix.
    #[must_use]
    pub fn target(&self) -> &MappingRoot {
        &self.target
    }

    /// Source root group.
    #[must_use]
    pub fn source_root(&self) -> GroupId {
        self.source.group
    }

    /// Target root group.
    #[must_use]
    pub fn target_root(&self) -> GroupId {
        self.target.group
    }

    /// Suffix of the source representation.
    #[must_use]
    pub fn source_suffix(&self) -> &str {
        &self.source.suffix
    }

    /// Suffix of the target representation.
    #[must_use]
    pub fn target_suffix(&self) -> &str {
        &self.target.suffix
    }

    /// Counterpart of a source entity.
    #[must_use]
    pub fn entity_target(&self, source: EntityId) -> Option<EntityId> {
        self.entity_map.get(&source).copied()
    }

    /// Source of a target entity.
    #[must_use]
    pub fn entity_source(&self, target: EntityId) -> Option<EntityId> {
        self.entity_sources.get(&target).copied()
    }

    /// Counterpart of a source group.
    #[must_use]
    pub fn group_target(&self, source: GroupId) -> Option<GroupId> {
        self.group_map.get(&source).copied()
    }

    /// Source of a target group.
    #[must_use]
    pub fn group_source(&self, target: GroupId) -> Option<GroupId> {
        self.group_sources.get(&target).copied()
    }

    /// Whether `group` appears on either side of the group pairs.
    #[must_use]
    pub fn involves_group(&self, group: GroupId) -> bool {
        self.group_map.contains_key(&group) || self.group_sources.contains_key(&group)
    }

    /// Entity pairs, source first.
    pub fn entity_pairs(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.entity_map.iter().map(|(source, target)| (*source, *target))
    }

    /// Group pairs, source first.
    pub fn group_pairs(&self) -> impl Iterator<Item = (GroupId, GroupId)> + '_ {
        self.group_map.iter().map(|(source, target)| (*source, *target))
    }

    /// Number of entity pairs.
    #[must_use]
    pub fn entity_len(&self) -> usize {
        self.entity_map.len()
    }

    /// Number of group pairs, including the roots.
    #[must_use]
    pub fn group_len(&self) -> usize {
        self.group_map.len()
    }

    /// Pair a source entity with a target.
    ///
    /// Returns the target previously paired with `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` is already paired with another source.
    pub fn insert_entity(
        &mut self,
        source: EntityId,
        target: EntityId,
    ) -> Result<Option<EntityId>, MappingError> {
        if let Some(existing) = self.entity_sources.get(&target) {
            if *existing != source {
                return Err(MappingError::TargetClaimed {
                    target: target.to_string(),
                    existing: existing.to_string(),
                });
            }
        }
        let previous = self.entity_map.insert(source, target);
        if let Some(previous) = previous {
            self.entity_sources.remove(&previous);
        }
        self.entity_sources.insert(target, source);
        Ok(previous)
    }

    /// Pair a source group with a target.
    ///
    /// Returns the target previously paired with `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` is already paired with another source.
    pub fn insert_group(
        &mut self,
        source: GroupId,
        target: GroupId,
    ) -> Result<Option<GroupId>, MappingError> {
        if let Some(existing) = self.group_sources.get(&target) {
            if *existing != source {
                return Err(MappingError::TargetClaimed {
                    target: target.to_string(),
                    existing: existing.to_string(),
                });
            }
        }
        let previous = self.group_map.insert(source, target);
        if let Some(previous) = previous {
            self.group_sources.remove(&previous);
        }
        self.group_sources.insert(target, source);
        Ok(previous)
    }

    /// Remove the pair whose source entity is `source`, returning its target.
    pub fn remove_entity_source(&mut self, source: EntityId) -> Option<EntityId> {
        let target = self.entity_map.remove(&source)?;
        self.entity_sources.remove(&target);
        Some(target)
    }

    /// Remove the pair whose source group is `source`, returning its target.
    pub fn remove_group_source(&mut self, source: GroupId) -> Option<GroupId> {
        let target = self.group_map.remove(&source)?;
        self.group_sources.remove(&target);
        Some(target)
    }

    /// Remove the pair whose target entity is `target`, returning its source.
    pub fn remove_entity_target(&mut self, target: EntityId) -> Option<EntityId> {
        let source = self.entity_sources.remove(&target)?;
        self.entity_map.remove(&source);
        Some(source)
    }

    /// Remove the pair whose target group is `target`, returning its source.
    pub fn remove_group_target(&mut self, target: GroupId) -> Option<GroupId> {
        let source = self.group_sources.remove(&target)?;
        self.group_map.remove(&source);
        Some(source)
    }

    /// Drop pairs that reference nodes no longer in `document`.
    ///
    /// Returns the number of dropped pairs.
    pub fn prune(&mut self, document: &Document) -> usize {
        let stale_entities: Vec<EntityId> = self
            .entity_map
            .iter()
            .filter(|(source, target)| {
                !document.contains_entity(**source) || !document.contains_entity(**target)
            })
            .map(|(_, target)| *target)
            .collect();
        let stale_groups: Vec<GroupId> = self
            .group_map
            .iter()
            .filter(|(source, target)| {
                !document.contains_group(**source) || !document.contains_group(**target)
            })
            .map(|(_, target)| *target)
            .collect();
        let dropped = stale_entities.len() + stale_groups.len();
        for target in stale_entities {
            self.remove_entity_target(target);
        }
        for target in stale_groups {
            self.remove_group_target(target);
        }
        if dropped > 0 {
            tracing::debug!(dropped, "Pruned stale mapping pairs");
        }
        dropped
    }

    /// Source entities without a counterpart.
    ///
    /// Derived from the current document and pairs rather than cached, so
    /// it always reflects mutations made since the mapping was built.
    #[must_use]
    pub fn unmatched_source_entities(&self, document: &Document) -> BTreeSet<EntityId> {
        document
            .all_entities(self.source.group)
            .into_iter()
            .filter(|id| !self.entity_map.contains_key(id))
            .collect()
    }

    /// Target entities without a counterpart.
    #[must_use]
    pub fn unmatched_target_entities(&self, document: &Document) -> BTreeSet<EntityId> {
        document
            .all_entities(self.target.group)
            .into_iter()
            .filter(|id| !self.entity_sources.contains_key(id))
            .collect()
    }

    /// Source groups without a counterpart.
    #[must_use]
    pub fn unmatched_source_groups(&self, document: &Document) -> BTreeSet<GroupId> {
        document
            .descendants(self.source.group)
            .into_iter()
            .filter(|id| !self.group_map.contains_key(id))
            .collect()
    }

    /// Target groups without a counterpart.
    #[must_use]
    pub fn unmatched_target_groups(&self, document: &Document) -> BTreeSet<GroupId> {
        document
            .descendants(self.target.group)
            .into_iter()
            .filter(|id| !self.group_sources.contains_key(id))
            .collect()
    }
}

fn index_by_base_name<T, N>(ids: Vec<T>, name: N, suffix: &str) -> HashMap<String, T>
where
    T: Copy,
    N: Fn(T) -> String,
{
    let mut index = HashMap::new();
    for id in ids {
        index
            .entry(strip_transfer_suffix(&name(id), suffix))
            .or_insert(id);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityKind;
    use crate::suffix::{TARGET_SUFFIX, TASK_SUFFIX};
    use proptest::prelude::*;

    fn hierarchy(doc: &mut Document, root_name: &str, suffix: &str, entities: &[&str]) -> GroupId {
        let root = doc.add_group(format!("{root_name}{suffix}"));
        let scene = doc.scene();
        doc.link_child(scene, root).unwrap();
        let geo = doc.add_group(format!("{root_name}.geometry{suffix}"));
        doc.link_child(root, geo).unwrap();
        for name in entities {
            let entity = doc.add_entity(format!("{name}{suffix}"), EntityKind::Mesh);
            doc.link_entity(geo, entity).unwrap();
        }
        root
    }

    #[test]
    fn test_build_matches_by_base_name() {
        let mut doc = Document::default();
        let task = hierarchy(&mut doc, "einar", TASK_SUFFIX, &["GEO-body", "GEO-eyes", "GEO-new"]);
        let target = hierarchy(&mut doc, "einar", TARGET_SUFFIX, &["GEO-body", "GEO-eyes", "GEO-old"]);

        let mapping = TransferMapping::build(
            &doc,
            MappingRoot::of(task, Representation::Task),
            MappingRoot::of(target, Representation::Target),
        )
        .unwrap();

        assert_eq!(mapping.entity_len(), 2);
        assert_eq!(mapping.group_len(), 2);
        assert_eq!(mapping.group_target(task), Some(target));
        let body = doc.find_entity("GEO-body.TASK").unwrap();
        assert_eq!(
            mapping.entity_target(body),
            doc.find_entity("GEO-body.TARGET")
        );

        let unmatched_source: Vec<_> = mapping
            .unmatched_source_entities(&doc)
            .into_iter()
            .map(|id| doc.entity_name(id).to_string())
            .collect();
        assert_eq!(unmatched_source, vec!["GEO-new.TASK"]);
        let unmatched_target: Vec<_> = mapping
            .unmatched_target_entities(&doc)
            .into_iter()
            .map(|id| doc.entity_name(id).to_string())
            .collect();
        assert_eq!(unmatched_target, vec!["GEO-old.TARGET"]);
    }

    #[test]
    fn test_build_rejects_bad_roots() {
        let mut doc = Document::default();
        let root = hierarchy(&mut doc, "einar", TASK_SUFFIX, &[]);
        let missing = doc.add_group("gone");
        doc.remove_group(missing);

        assert_eq!(
            TransferMapping::build(
                &doc,
                MappingRoot::of(root, Representation::Task),
                MappingRoot::of(root, Representation::Target)
            ),
            Err(MappingError::SameRoot(root))
        );
        assert_eq!(
            TransferMapping::build(
                &doc,
                MappingRoot::of(root, Representation::Task),
                MappingRoot::of(missing, Representation::Target)
            ),
            Err(MappingError::UnknownRoot(missing))
        );
    }

    #[test]
    fn test_insert_rejects_claimed_target() {
        let mut doc = Document::default();
        let task = hierarchy(&mut doc, "einar", TASK_SUFFIX, &["GEO-body", "GEO-eyes"]);
        let target = hierarchy(&mut doc, "einar", TARGET_SUFFIX, &["GEO-body"]);
        let mut mapping = TransferMapping::build(
            &doc,
            MappingRoot::of(task, Representation::Task),
            MappingRoot::of(target, Representation::Target),
        )
        .unwrap();
        let eyes = doc.find_entity("GEO-eyes.TASK").unwrap();
        let body_target = doc.find_entity("GEO-body.TARGET").unwrap();

        assert!(matches!(
            mapping.insert_entity(eyes, body_target),
            Err(MappingError::TargetClaimed { .. })
        ));

        let body = mapping.remove_entity_target(body_target).unwrap();
        assert_eq!(mapping.entity_target(body), None);
        assert_eq!(mapping.insert_entity(eyes, body_target), Ok(None));
        assert_eq!(mapping.entity_source(body_target), Some(eyes));
    }

    #[test]
    fn test_prune_drops_deleted_nodes() {
        let mut doc = Document::default();
        let task = hierarchy(&mut doc, "einar", TASK_SUFFIX, &["GEO-body"]);
        let target = hierarchy(&mut doc, "einar", TARGET_SUFFIX, &["GEO-body"]);
        let mut mapping = TransferMapping::build(
            &doc,
            MappingRoot::of(task, Representation::Task),
            MappingRoot::of(target, Representation::Target),
        )
        .unwrap();
        let body_target = doc.find_entity("GEO-body.TARGET").unwrap();
        doc.remove_entity(body_target);

        assert_eq!(mapping.prune(&doc), 1);
        assert_eq!(mapping.entity_len(), 0);
    }

    proptest! {
        #[test]
        fn prop_mapping_is_bijective(
            source_names in proptest::collection::vec("[a-c]{1,2}", 0..12),
            target_names in proptest::collection::vec("[a-c]{1,2}", 0..12),
        ) {
            let mut doc = Document::default();
            let source_refs: Vec<&str> = source_names.iter().map(String::as_str).collect();
            let target_refs: Vec<&str> = target_names.iter().map(String::as_str).collect();
            let task = hierarchy(&mut doc, "asset", TASK_SUFFIX, &source_refs);
            let target = hierarchy(&mut doc, "asset", TARGET_SUFFIX, &target_refs);

            let mapping = TransferMapping::build(
                &doc,
                MappingRoot::of(task, Representation::Task),
                MappingRoot::of(target, Representation::Target),
            ).unwrap();

            let mut seen = BTreeSet::new();
            for (source, target) in mapping.entity_pairs() {
                prop_assert!(seen.insert(target));
                prop_assert_eq!(mapping.entity_source(target), Some(source));
                prop_assert_eq!(
                    strip_transfer_suffix(doc.entity_name(source), TASK_SUFFIX),
                    strip_transfer_suffix(doc.entity_name(target), TARGET_SUFFIX)
                );
            }
            let distinct_shared = source_names
                .iter()
                .collect::<BTreeSet<_>>()
                .intersection(&target_names.iter().collect())
                .count();
            prop_assert_eq!(mapping.entity_len(), distinct_shared);
        }
    }
}
