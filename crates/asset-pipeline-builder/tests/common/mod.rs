#![allow(dead_code)]

use asset_pipeline_builder::{
    build, find_asset_root, AssetInfo, BuildContext, BuildEnvironment, BuildOutcome, BuildRequest,
    PreviousPublish, ShadingTransfer,
};
use asset_pipeline_core::{Document, EntityId, EntityKind, GroupId, StructureOnly, TaskLayer, TaskLayerAssembly};
use asset_pipeline_metadata::MetadataUser;
use chrono::NaiveDate;

pub const ASSET: &str = "einar";

pub fn environment() -> BuildEnvironment {
    BuildEnvironment {
        author: MetadataUser::new("42", "Ada", "Lovelace"),
        hostname: "workstation-7".to_string(),
        software_hash: "abc123".to_string(),
        fixed_time: NaiveDate::from_ymd_opt(2024, 3, 14).and_then(|d| d.and_hms_opt(15, 9, 26)),
    }
}

/// Rig (order 0, `.rig`) and Shade (order 1, `.shade`).
pub fn rig_and_shade() -> TaskLayerAssembly {
    TaskLayerAssembly::new([
        TaskLayer::new("Rig", "Rig", 0, StructureOnly).with_task_suffix(".rig"),
        TaskLayer::new("Shade", "Shade", 1, ShadingTransfer).with_task_suffix(".shade"),
    ])
    .unwrap()
}

pub fn context(assembly: TaskLayerAssembly, enabled: &[&str]) -> BuildContext {
    let mut context = BuildContext::new(assembly, AssetInfo::new(ASSET).with_asset_type("Character"))
        .with_environment(environment());
    context.select_layers(enabled).unwrap();
    context
}

/// Builds task documents shaped `Scene > einar > einar{suffix} > entities`.
pub struct TaskBuilder {
    pub document: Document,
    pub root: GroupId,
}

impl TaskBuilder {
    pub fn new() -> Self {
        let mut document = Document::new("Scene");
        let root = document.add_group(ASSET);
        document.link_child(document.scene(), root).unwrap();
        Self { document, root }
    }

    /// Add `{asset}{suffix}` under `parent` (the asset root if `None`)
    /// holding one mesh per name.
    pub fn group(&mut self, parent: Option<GroupId>, suffix: &str, entities: &[&str]) -> GroupId {
        let parent = parent.unwrap_or(self.root);
        let group = self.document.add_group(format!("{ASSET}{suffix}"));
        self.document.link_child(parent, group).unwrap();
        for name in entities {
            let entity = self.document.add_entity(*name, EntityKind::Mesh);
            self.document.link_entity(group, entity).unwrap();
        }
        group
    }

    pub fn finish(self) -> Document {
        self.document
    }
}

pub fn rig_shade_task(rig: &[&str], shade: &[&str]) -> Document {
    let mut task = TaskBuilder::new();
    task.group(None, ".rig", rig);
    task.group(None, ".shade", shade);
    task.finish()
}

pub fn first_publish(context: &BuildContext, task: Document) -> BuildOutcome {
    build(context, BuildRequest::first_publish(task, "einar/einar.task.json")).unwrap()
}

pub fn previous(outcome: &BuildOutcome) -> PreviousPublish {
    PreviousPublish {
        document: outcome.document.clone(),
        metadata: outcome.metadata.clone(),
    }
}

pub fn push(context: &BuildContext, task: Document, previous: PreviousPublish) -> BuildOutcome {
    build(context, BuildRequest::push(task, "einar/einar.task.json", previous)).unwrap()
}

pub fn group_named(document: &Document, name: &str) -> GroupId {
    document
        .find_group(name)
        .unwrap_or_else(|| panic!("no group named {name}"))
}

pub fn entity_named(document: &Document, name: &str) -> EntityId {
    document
        .find_entity(name)
        .unwrap_or_else(|| panic!("no entity named {name}"))
}

/// Member names of the group named `name`, in link order.
pub fn members(document: &Document, name: &str) -> Vec<String> {
    document
        .group(group_named(document, name))
        .unwrap()
        .entities
        .iter()
        .map(|id| document.entity_name(*id).to_string())
        .collect()
}

/// Every group below the asset root with its sorted member names.
pub fn structure(document: &Document) -> Vec<(String, Vec<String>)> {
    let root = find_asset_root(document, ASSET).unwrap();
    std::iter::once(root)
        .chain(document.descendants(root))
        .map(|group| {
            let node = document.group(group).unwrap();
            let mut names: Vec<String> = node
                .entities
                .iter()
                .map(|id| document.entity_name(*id).to_string())
                .collect();
            names.sort();
            (node.name.clone(), names)
        })
        .collect()
}
