//! Reference transfer strategies.
//!
//! Each strategy copies an explicit list of fields from every mapped source
//! entity to its target. Entities adopted by the structural merge map to
//! themselves and are left alone.

use asset_pipeline_core::{
    Entity, EntityId, EntityKind, GroupId, StrategyError, TransferContext, TransferStrategy,
};
use asset_pipeline_core::suffix::strip_transfer_suffix;
use std::collections::BTreeSet;

/// Deformer kind driven by an armature.
pub const ARMATURE_DEFORMER: &str = "armature";
/// Name prefix of rig widget shapes, which never carry materials.
pub const WIDGET_PREFIX: &str = "WGT-";
/// Suffix of groups holding hair curves.
pub const HAIR_SUFFIX: &str = ".hair";
/// Suffix of groups holding hair particle emitters.
pub const HAIR_PARTICLES_SUFFIX: &str = ".hair.particles";
/// Setting that disables topology transfer in [`ModelingTransfer`].
pub const TRANSFER_TOPOLOGY_SETTING: &str = "transfer_topology";

fn distinct_pairs(ctx: &TransferContext<'_>) -> Vec<(EntityId, EntityId)> {
    ctx.mapping
        .entity_pairs()
        .filter(|(source, target)| source != target)
        .filter(|(_, target)| ctx.document.contains_entity(*target))
        .collect()
}

fn source_entity(ctx: &TransferContext<'_>, id: EntityId) -> Result<Entity, StrategyError> {
    ctx.document
        .entity(id)
        .cloned()
        .ok_or(StrategyError::Graph(asset_pipeline_core::GraphError::UnknownEntity(id)))
}

/// Carries attachments and armature deformers.
///
/// References to entities with a mapped target are pointed at the target;
/// the rest keep the source reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiggingTransfer;

impl TransferStrategy for RiggingTransfer {
    fn transfer_data(&self, ctx: &mut TransferContext<'_>) -> Result<(), StrategyError> {
        for (source, target) in distinct_pairs(ctx) {
            let mut source = source_entity(ctx, source)?;
            source.rewrite_refs(|referenced| ctx.mapping.entity_target(referenced).map(Some));
            let armatures: Vec<_> = source
                .deformers
                .into_iter()
                .filter(|deformer| deformer.kind == ARMATURE_DEFORMER)
                .collect();

            if let Some(target) = ctx.document.entity_mut(target) {
                target.parent = source.parent;
                target.deformers.retain(|deformer| deformer.kind != ARMATURE_DEFORMER);
                target.deformers.extend(armatures);
                tracing::trace!(entity = %target.name, "Transferred rig data");
            }
        }
        Ok(())
    }
}

/// Carries transforms and, when the counts agree or topology transfer is
/// enabled, mesh topology.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelingTransfer;

impl TransferStrategy for ModelingTransfer {
    fn transfer_data(&self, ctx: &mut TransferContext<'_>) -> Result<(), StrategyError> {
        let transfer_topology = ctx.bool_setting(TRANSFER_TOPOLOGY_SETTING, true);
        for (source, target) in distinct_pairs(ctx) {
            let source = source_entity(ctx, source)?;
            let Some(target) = ctx.document.entity_mut(target) else {
                continue;
            };
            target.transform = source.transform;

            let mismatch = matches!(
                (source.topology, target.topology),
                (Some(from), Some(to)) if from.vertices != to.vertices
            );
            if mismatch && !transfer_topology {
                tracing::warn!(
                    layer = ctx.layer_id,
                    entity = %target.name,
                    "Topology mismatch, transferring transform only"
                );
                continue;
            }
            target.topology = source.topology;
        }
        Ok(())
    }
}

/// Carries material slots between entities of the same kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShadingTransfer;

impl TransferStrategy for ShadingTransfer {
    fn transfer_data(&self, ctx: &mut TransferContext<'_>) -> Result<(), StrategyError> {
        for (source, target) in distinct_pairs(ctx) {
            let source = source_entity(ctx, source)?;
            let Some(target) = ctx.document.entity_mut(target) else {
                continue;
            };
            if target.name.starts_with(WIDGET_PREFIX) {
                target.material_slots.clear();
                continue;
            }
            if source.kind != target.kind {
                tracing::warn!(
                    layer = ctx.layer_id,
                    entity = %target.name,
                    source_kind = %source.kind,
                    target_kind = %target.kind,
                    "Entity kinds differ, skipping material transfer"
                );
                continue;
            }
            target.material_slots = source.material_slots;
        }
        Ok(())
    }
}

/// Carries transforms and deformers of hair entities.
///
/// Productions without hair groups are skipped with a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroomingTransfer;

impl GroomingTransfer {
    fn hair_groups(ctx: &TransferContext<'_>) -> Vec<GroupId> {
        let suffix = ctx.mapping.source_suffix();
        ctx.document
            .descendants(ctx.mapping.source_root())
            .into_iter()
            .filter(|group| {
                let name = strip_transfer_suffix(ctx.document.group_name(*group), suffix);
                name.ends_with(HAIR_SUFFIX) || name.ends_with(HAIR_PARTICLES_SUFFIX)
            })
            .collect()
    }
}

impl TransferStrategy for GroomingTransfer {
    fn transfer_data(&self, ctx: &mut TransferContext<'_>) -> Result<(), StrategyError> {
        let groups = Self::hair_groups(ctx);
        if groups.is_empty() {
            tracing::warn!(layer = ctx.layer_id, "No hair groups in source, skipping grooming transfer");
            return Ok(());
        }
        let hair: BTreeSet<EntityId> = groups
            .into_iter()
            .flat_map(|group| ctx.document.all_entities(group))
            .collect();

        for (source, target) in distinct_pairs(ctx) {
            if !hair.contains(&source) {
                continue;
            }
            let mut source = source_entity(ctx, source)?;
            if source.kind != EntityKind::Curve && source.kind != EntityKind::Mesh {
                continue;
            }
            source.rewrite_refs(|referenced| ctx.mapping.entity_target(referenced).map(Some));
            if let Some(target) = ctx.document.entity_mut(target) {
                target.transform = source.transform;
                target.deformers = source.deformers;
            }
        }
        Ok(())
    }
}
