//! Build orchestration.
//!
//! A push merges the current task file of an asset into its latest publish:
//!
//! 1. The publish hierarchy is renamed with the `.PUBLISH` suffix and copies
//!    of the task asset (`.TASK`) and of the merge base (`.TARGET`) are
//!    inserted next to it.
//! 2. Every production layer runs in order. Enabled layers merge
//!    TASK into TARGET, all others carry PUBLISH into TARGET.
//! 3. TARGET takes the place of the publish root, loses its suffix, and
//!    everything no longer reachable from the scene is purged.
//! 4. Hooks run over the result, metadata is refreshed and layers that
//!    were not pushed are locked.
//!
//! A first publish skips the merge and copies the task asset as is.

use crate::context::BuildContext;
use crate::lock_plan::{LockReport, TaskLayerLockPlan};
use crate::provenance::{init_meta_task_layer, refresh_meta_task_layer};
use asset_pipeline_core::suffix::{PUBLISH_SUFFIX, TARGET_SUFFIX, TASK_SUFFIX};
use asset_pipeline_core::{
    assign_objects, AssemblyError, Document, GraphError, GroupId, HookFailure, HookInvocation,
    MappingError, MappingRoot, Representation, Subtree, TaskLayer, TransferError, TransferMapping,
    TransferReport,
};
use asset_pipeline_metadata::publish::{format_version, parse_version, FIRST_VERSION};
use asset_pipeline_metadata::{write_metadata, MetadataTreeAsset, StoreError};
use std::path::PathBuf;

/// Errors that abort a build.
///
/// After an abort the in-memory document may be partially merged and must
/// not be saved.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The layer selection is invalid.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    /// A graph mutation failed outside a layer transfer.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// A mapping could not be built.
    #[error(transparent)]
    Mapping(#[from] MappingError),
    /// A layer's transfer failed.
    #[error("task layer `{layer}` failed: {source}")]
    Transfer {
        /// Layer that failed
        layer: String,
        /// Underlying error
        source: TransferError,
    },
    /// A hook failed.
    #[error(transparent)]
    Hook(#[from] HookFailure),
    /// Metadata could not be written.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A document does not contain the asset's root group.
    #[error("asset root `{0}` not found")]
    MissingAssetRoot(String),
    /// A push was requested with no layer enabled.
    #[error("no task layer enabled for push")]
    NoTaskLayersEnabled,
}

/// The publish a push builds on.
#[derive(Debug, Clone)]
pub struct PreviousPublish {
    /// Publish document
    pub document: Document,
    /// Metadata of the publish
    pub metadata: MetadataTreeAsset,
}

/// Documents and destinations of one build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Task document holding the asset
    pub task: Document,
    /// Path of the task file, recorded as provenance
    pub task_source_path: PathBuf,
    /// Latest publish; `None` creates the first publish
    pub previous: Option<PreviousPublish>,
    /// Version of the new publish; defaults to the one after `previous`
    pub version: Option<u32>,
    /// Where to write the new metadata, if anywhere
    pub metadata_path: Option<PathBuf>,
}

impl BuildRequest {
    /// Request creating the first publish from `task`.
    #[must_use]
    pub fn first_publish(task: Document, task_source_path: impl Into<PathBuf>) -> Self {
        Self {
            task,
            task_source_path: task_source_path.into(),
            previous: None,
            version: None,
            metadata_path: None,
        }
    }

    /// Request pushing `task` onto `previous`.
    #[must_use]
    pub fn push(task: Document, task_source_path: impl Into<PathBuf>, previous: PreviousPublish) -> Self {
        Self {
            previous: Some(previous),
            ..Self::first_publish(task, task_source_path)
        }
    }

    /// Builder-style metadata destination setter.
    #[must_use]
    pub fn with_metadata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata_path = Some(path.into());
        self
    }

    /// Builder-style version setter.
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }
}

/// One layer transfer of a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerTransfer {
    /// Layer id
    pub layer: String,
    /// Representation the layer was merged from
    pub source: Representation,
    /// What the transfer changed
    pub report: TransferReport,
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// The new publish document
    pub document: Document,
    /// Root group of the asset in `document`
    pub asset_root: GroupId,
    /// Metadata of the new publish
    pub metadata: MetadataTreeAsset,
    /// Hooks that ran, in order
    pub hooks_invoked: Vec<HookInvocation>,
    /// Layer transfers, in merge order
    pub transfers: Vec<LayerTransfer>,
    /// Locks applied to the new metadata
    pub lock_report: LockReport,
    /// Whether this build created the first publish
    pub first_publish: bool,
}

/// The asset root in `document`: the scene child named `name`, or failing
/// that any group with that name.
#[must_use]
pub fn find_asset_root(document: &Document, name: &str) -> Option<GroupId> {
    document
        .find_child_by_name(document.scene(), name)
        .or_else(|| document.find_group(name))
}

/// Run a build.
///
/// # Errors
///
/// Returns an error if an asset root is missing, a push enables no layer,
/// a layer transfer or hook fails, or the metadata cannot be written.
pub fn build(context: &BuildContext, request: BuildRequest) -> Result<BuildOutcome, BuildError> {
    let asset_name = context.asset.name.as_str();
    let task_root = find_asset_root(&request.task, asset_name)
        .ok_or_else(|| BuildError::MissingAssetRoot(asset_name.to_string()))?;
    let task_subtree = Subtree::collect(&request.task, task_root)?;

    let mut outcome = match request.previous {
        None => first_publish(context, &request.task, &task_subtree, &request.task_source_path)?,
        Some(previous) => push(context, previous, &task_subtree, &request.task_source_path, request.version)?,
    };

    let pushed = context.pushed_layer_ids();
    outcome.hooks_invoked = context.hooks.dispatch(
        &mut outcome.document,
        outcome.asset_root,
        context.asset.asset_type.as_deref(),
        asset_name,
        &pushed,
    )?;

    if let Some(path) = &request.metadata_path {
        write_metadata(path, &outcome.metadata)?;
    }
    tracing::info!(
        asset = %asset_name,
        version = %outcome.metadata.asset.version,
        first_publish = outcome.first_publish,
        hooks = outcome.hooks_invoked.len(),
        "Build finished"
    );
    Ok(outcome)
}

fn first_publish(
    context: &BuildContext,
    task: &Document,
    task_subtree: &Subtree,
    task_source_path: &std::path::Path,
) -> Result<BuildOutcome, BuildError> {
    let mut document = Document::new(task.group_name(task.scene()));
    let asset_root = document.insert_subtree(task_subtree, "");
    document.link_child(document.scene(), asset_root)?;

    let now = context.environment.now();
    let task_layers = context
        .assembly
        .layers()
        .map(|layer| init_meta_task_layer(layer, task_source_path, &context.environment, now))
        .collect();
    let metadata = MetadataTreeAsset::new(context.asset.to_metadata(format_version(FIRST_VERSION)), task_layers);
    tracing::info!(asset = %context.asset.name, "Created first publish");

    Ok(BuildOutcome {
        document,
        asset_root,
        metadata,
        hooks_invoked: Vec::new(),
        transfers: Vec::new(),
        lock_report: LockReport::default(),
        first_publish: true,
    })
}

fn next_version(previous: &MetadataTreeAsset) -> u32 {
    if let Some(version) = parse_version(&previous.asset.version) {
        return version + 1;
    }
    tracing::warn!(version = %previous.asset.version, "Unreadable previous version");
    FIRST_VERSION + 1
}

fn push(
    context: &BuildContext,
    previous: PreviousPublish,
    task_subtree: &Subtree,
    task_source_path: &std::path::Path,
    version: Option<u32>,
) -> Result<BuildOutcome, BuildError> {
    let assembly = &context.assembly;
    let used_orders = assembly.orders(true);
    let Some(lowest_used) = used_orders.first().copied() else {
        return Err(BuildError::NoTaskLayersEnabled);
    };

    let PreviousPublish {
        mut document,
        metadata: mut meta,
    } = previous;
    let asset_name = context.asset.name.as_str();
    let publish_root = find_asset_root(&document, asset_name)
        .ok_or_else(|| BuildError::MissingAssetRoot(asset_name.to_string()))?;

    let publish_subtree = Subtree::collect(&document, publish_root)?;
    document.add_suffix_to_hierarchy(publish_root, PUBLISH_SUFFIX);
    let task_root = document.insert_subtree(task_subtree, TASK_SUFFIX);

    let base_is_task = assembly.orders(false).first().copied() == Some(lowest_used);
    let base = if base_is_task { task_subtree } else { &publish_subtree };
    let target_root = document.insert_subtree(base, TARGET_SUFFIX);
    tracing::info!(
        asset = %asset_name,
        base = if base_is_task { "task" } else { "publish" },
        "Prepared merge"
    );

    let target = MappingRoot::of(target_root, Representation::Target);
    let mut task_mapping = TransferMapping::build(
        &document,
        MappingRoot::of(task_root, Representation::Task),
        target.clone(),
    )?;
    let mut publish_mapping = TransferMapping::build(
        &document,
        MappingRoot::of(publish_root, Representation::Publish),
        target,
    )?;

    let now = context.environment.now();
    let mut transfers = Vec::new();
    for config in assembly.configs() {
        let layer = config.layer();
        if meta.task_layer(layer.id()).is_none() {
            tracing::warn!(layer = %layer.id(), "Task layer missing from previous metadata, initialising");
            meta.add_task_layer(init_meta_task_layer(layer, task_source_path, &context.environment, now));
        }

        let (mapping, source) = if config.is_used() {
            (&mut task_mapping, Representation::Task)
        } else {
            (&mut publish_mapping, Representation::Publish)
        };
        let report = transfer_layer(layer, &mut document, mapping, context)?;
        transfers.push(LayerTransfer {
            layer: layer.id().to_string(),
            source,
            report,
        });

        if config.is_used() {
            if let Some(record) = meta.task_layer_mut(layer.id()) {
                refresh_meta_task_layer(record, task_source_path, &context.environment, now);
            }
        }
    }

    assign_objects(&mut document, &publish_mapping)?;
    let parents = document.parents_of(publish_root);
    if parents.is_empty() {
        document.link_child(document.scene(), target_root)?;
    }
    for parent in parents {
        document.replace_child(parent, publish_root, target_root)?;
    }
    document.remove_suffix_from_hierarchy(target_root);
    let purged = document.purge_orphans();
    tracing::debug!(groups = purged.groups, entities = purged.entities, "Cleaned up merge");

    let version = version.unwrap_or_else(|| next_version(&meta));
    meta.asset.version = format_version(version);
    let lock_plan = TaskLayerLockPlan::new(assembly.unused_layers().map(TaskLayer::id));
    let lock_report = lock_plan.lock(&mut meta);

    Ok(BuildOutcome {
        document,
        asset_root: target_root,
        metadata: meta,
        hooks_invoked: Vec::new(),
        transfers,
        lock_report,
        first_publish: false,
    })
}

fn transfer_layer(
    layer: &TaskLayer,
    document: &mut Document,
    mapping: &mut TransferMapping,
    context: &BuildContext,
) -> Result<TransferReport, BuildError> {
    layer
        .transfer(document, mapping, &context.settings)
        .map_err(|source| BuildError::Transfer {
            layer: layer.id().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AssetInfo;
    use asset_pipeline_core::{EntityKind, StructureOnly, TaskLayerAssembly};

    fn context(enabled: &[&str]) -> BuildContext {
        let assembly = TaskLayerAssembly::new([
            TaskLayer::new("Rig", "Rig", 0, StructureOnly).with_task_suffix(".rig"),
            TaskLayer::new("Shade", "Shade", 1, StructureOnly).with_task_suffix(".shade"),
        ])
        .unwrap();
        let mut context = BuildContext::new(assembly, AssetInfo::new("einar"));
        for id in enabled {
            context.assembly.set_used(id, true).unwrap();
        }
        context
    }

    fn task() -> Document {
        let mut doc = Document::new("Scene");
        let root = doc.add_group("einar");
        doc.link_child(doc.scene(), root).unwrap();
        let rig = doc.add_group("einar.rig");
        doc.link_child(root, rig).unwrap();
        let armature = doc.add_entity("RIG-einar", EntityKind::Armature);
        doc.link_entity(rig, armature).unwrap();
        doc
    }

    #[test]
    fn test_missing_asset_root() {
        let error = build(&context(&[]), BuildRequest::first_publish(Document::new("Scene"), "task.json"))
            .unwrap_err();
        assert!(matches!(error, BuildError::MissingAssetRoot(name) if name == "einar"));
    }

    #[test]
    fn test_push_requires_enabled_layer() {
        let first = build(&context(&[]), BuildRequest::first_publish(task(), "task.json")).unwrap();
        let previous = PreviousPublish {
            document: first.document,
            metadata: first.metadata,
        };

        let error = build(&context(&[]), BuildRequest::push(task(), "task.json", previous)).unwrap_err();
        assert!(matches!(error, BuildError::NoTaskLayersEnabled));
    }

    #[test]
    fn test_push_version_follows_previous() {
        let first = build(&context(&[]), BuildRequest::first_publish(task(), "task.json")).unwrap();
        assert_eq!(first.metadata.asset.version, "v001");
        let previous = PreviousPublish {
            document: first.document,
            metadata: first.metadata,
        };

        let second = build(&context(&["Rig"]), BuildRequest::push(task(), "task.json", previous.clone())).unwrap();
        assert_eq!(second.metadata.asset.version, "v002");

        let pinned = build(
            &context(&["Rig"]),
            BuildRequest::push(task(), "task.json", previous).with_version(7),
        )
        .unwrap();
        assert_eq!(pinned.metadata.asset.version, "v007");
    }
}
