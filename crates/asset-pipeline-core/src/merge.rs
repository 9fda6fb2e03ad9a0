//! Structural merge run by every task layer.
//!
//! A transfer synchronises the groups a layer owns from the source
//! representation into the target representation, hands over to the
//! layer's strategy for data, and finally redirects every link in the
//! document that still points at merged source content.

use crate::graph::{Document, EntityId, GraphError, GroupId};
use crate::mapping::{MappingError, TransferMapping};
use crate::strategy::{StrategyError, TransferContext, TransferSettings};
use crate::suffix::swap_transfer_suffix;
use crate::task_layer::TaskLayer;
use std::collections::BTreeSet;

/// Errors that abort a layer's transfer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransferError {
    /// A graph mutation failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// The mapping could not be updated.
    #[error(transparent)]
    Mapping(#[from] MappingError),
    /// The layer's strategy failed.
    #[error("transfer_data of `{layer}` failed: {source}")]
    Strategy {
        /// Layer whose strategy failed
        layer: String,
        /// Underlying error
        source: StrategyError,
    },
}

/// What a single layer transfer changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Fully-owned target groups that were cleared and removed
    pub cleared_groups: usize,
    /// Target groups created for unmapped source groups
    pub created_groups: Vec<GroupId>,
    /// Source entities adopted into the target as new content
    pub adopted_entities: Vec<EntityId>,
    /// Target groups unlinked because their source counterpart is gone
    pub unlinked_groups: usize,
    /// Links and memberships redirected by the global assignment pass
    pub reassigned: usize,
}

impl TaskLayer {
    /// Merge this layer's groups and data from the mapping's source into
    /// its target.
    ///
    /// # Errors
    ///
    /// Returns an error if a graph or mapping mutation fails, a created
    /// group has no mapped parent, or the strategy fails. The document is
    /// left partially merged and must be discarded.
    pub fn transfer(
        &self,
        document: &mut Document,
        mapping: &mut TransferMapping,
        settings: &TransferSettings,
    ) -> Result<TransferReport, TransferError> {
        let mut report = TransferReport::default();
        mapping.prune(document);

        report.cleared_groups = self.clear_fully_owned(document, mapping);
        self.transfer_collections(document, mapping, &mut report)?;

        let mut ctx = TransferContext {
            document: &mut *document,
            mapping: &mut *mapping,
            settings,
            layer_id: self.id(),
        };
        self.strategy()
            .transfer_data(&mut ctx)
            .map_err(|source| TransferError::Strategy {
                layer: self.id().to_string(),
                source,
            })?;

        report.reassigned = assign_objects(document, mapping)?;
        tracing::info!(
            layer = %self.id(),
            created = report.created_groups.len(),
            adopted = report.adopted_entities.len(),
            cleared = report.cleared_groups,
            unlinked = report.unlinked_groups,
            reassigned = report.reassigned,
            "Transferred task layer"
        );
        Ok(report)
    }

    /// Remove every fully-owned target group of this layer together with
    /// its contents, dropping the mapping pairs of each removed node first.
    ///
    /// Returns the number of removed top-level fully-owned groups.
    pub fn clear_fully_owned(&self, document: &mut Document, mapping: &mut TransferMapping) -> usize {
        if self.task_suffix().is_empty() {
            return 0;
        }
        let owned: Vec<GroupId> = document
            .descendants(mapping.target_root())
            .into_iter()
            .filter(|id| self.owns_fully_owned_group(document.group_name(*id), mapping.target_suffix()))
            .collect();

        let mut cleared = 0;
        for group in owned {
            if !document.contains_group(group) {
                continue;
            }
            tracing::debug!(layer = %self.id(), group = %document.group_name(group), "Clearing fully owned group");
            clear_group(document, mapping, group);
            mapping.remove_group_target(group);
            document.remove_group(group);
            cleared += 1;
        }
        cleared
    }

    /// Synchronise the target groups owned by this layer with the source.
    ///
    /// # Errors
    ///
    /// Returns an error if a group must be created under a parent with no
    /// mapped target, or a graph mutation fails.
    pub fn transfer_collections(
        &self,
        document: &mut Document,
        mapping: &mut TransferMapping,
        report: &mut TransferReport,
    ) -> Result<(), TransferError> {
        if self.task_suffix().is_empty() {
            tracing::debug!(layer = %self.id(), "Layer owns no groups, skipping structural sync");
            return Ok(());
        }
        let source_root = mapping.source_root();
        for group in self.task_groups(document, source_root, mapping.source_suffix()) {
            self.transfer_group(document, mapping, group, source_root, report)?;
        }

        let target_root = mapping.target_root();
        let unmatched = mapping.unmatched_target_groups(document);
        for child in self.task_groups(document, target_root, mapping.target_suffix()) {
            unlink_unmatched(document, mapping, target_root, child, &unmatched, report);
        }
        Ok(())
    }

    fn transfer_group(
        &self,
        document: &mut Document,
        mapping: &mut TransferMapping,
        source: GroupId,
        source_parent: GroupId,
        report: &mut TransferReport,
    ) -> Result<(), TransferError> {
        let target = match mapping.group_target(source).filter(|id| document.contains_group(*id)) {
            Some(target) => target,
            None => {
                let parent = mapping
                    .group_target(source_parent)
                    .filter(|id| document.contains_group(*id))
                    .ok_or_else(|| MappingError::UnmappedParent {
                        group: document.group_name(source).to_string(),
                        parent: document.group_name(source_parent).to_string(),
                    })?;
                let node = document.group(source).ok_or(GraphError::UnknownGroup(source))?;
                let name = swap_transfer_suffix(&node.name, mapping.source_suffix(), mapping.target_suffix());
                let visibility = node.visibility;

                let created = document.add_group(name);
                if let Some(created_node) = document.group_mut(created) {
                    created_node.visibility = visibility;
                }
                document.link_child(parent, created)?;
                mapping.insert_group(source, created)?;
                tracing::debug!(
                    layer = %self.id(),
                    group = %document.group_name(created),
                    "Created target group"
                );
                report.created_groups.push(created);
                created
            }
        };

        document.unlink_all_entities(target);
        let (members, children) = document
            .group(source)
            .map(|node| (node.entities.clone(), node.children.clone()))
            .ok_or(GraphError::UnknownGroup(source))?;
        for member in members {
            let linked = match mapping.entity_target(member).filter(|id| document.contains_entity(*id)) {
                Some(mapped) => mapped,
                None => {
                    adopt_entity(document, mapping, member);
                    report.adopted_entities.push(member);
                    member
                }
            };
            document.link_entity(target, linked)?;
        }

        for child in children {
            self.transfer_group(document, mapping, child, source, report)?;
        }
        Ok(())
    }
}

fn clear_group(document: &mut Document, mapping: &mut TransferMapping, group: GroupId) {
    for entity in document.unlink_all_entities(group) {
        mapping.remove_entity_target(entity);
    }
    let children = document
        .group(group)
        .map(|node| node.children.clone())
        .unwrap_or_default();
    for child in children {
        document.unlink_child(group, child);
        mapping.remove_group_target(child);
        clear_group(document, mapping, child);
        document.remove_group(child);
    }
}

fn unlink_unmatched(
    document: &mut Document,
    mapping: &mut TransferMapping,
    parent: GroupId,
    group: GroupId,
    unmatched: &BTreeSet<GroupId>,
    report: &mut TransferReport,
) {
    if unmatched.contains(&group) {
        tracing::debug!(group = %document.group_name(group), "Unlinking target group without source");
        document.unlink_child(parent, group);
        mapping.remove_group_target(group);
        report.unlinked_groups += 1;
        return;
    }
    let children = document
        .group(group)
        .map(|node| node.children.clone())
        .unwrap_or_default();
    for child in children {
        unlink_unmatched(document, mapping, group, child, unmatched, report);
    }
}

/// Point an adopted entity's own references at their mapped targets where
/// one exists.
fn adopt_entity(document: &mut Document, mapping: &TransferMapping, entity: EntityId) {
    if let Some(entity) = document.entity_mut(entity) {
        let remapped = entity.rewrite_refs(|referenced| mapping.entity_target(referenced).map(Some));
        tracing::debug!(entity = %entity.name, remapped, "Adopted source entity");
    }
}

/// Redirect every link in `document` that points at a mapped source node
/// to its target counterpart.
///
/// Groups that take part in the mapping are skipped, as are links to the
/// two mapping roots. Rewritten entity memberships also redirect every
/// attachment and deformer reference to the source entity. Returns the
/// number of rewritten links.
///
/// # Errors
///
/// Returns an error if a rewritten group link would create a cycle.
pub fn assign_objects(document: &mut Document, mapping: &TransferMapping) -> Result<usize, GraphError> {
    let roots = [mapping.source_root(), mapping.target_root()];
    let groups: Vec<GroupId> = document
        .groups()
        .map(|node| node.id)
        .filter(|id| !mapping.involves_group(*id))
        .collect();

    let mut rewritten = 0;
    for group in groups {
        let Some((children, members)) = document
            .group(group)
            .map(|node| (node.children.clone(), node.entities.clone()))
        else {
            continue;
        };
        for child in children {
            if roots.contains(&child) {
                continue;
            }
            let Some(target) = mapping.group_target(child).filter(|id| document.contains_group(*id)) else {
                continue;
            };
            document.replace_child(group, child, target)?;
            rewritten += 1;
        }
        for member in members {
            let Some(target) = mapping.entity_target(member).filter(|id| document.contains_entity(*id)) else {
                continue;
            };
            document.replace_entity(group, member, target)?;
            document.remap_entity_references(member, target);
            rewritten += 1;
        }
    }
    if rewritten > 0 {
        tracing::debug!(rewritten, "Reassigned links to merged content");
    }
    Ok(rewritten)
}
