mod common;

use asset_pipeline_builder::{find_asset_root, GroomingTransfer};
use asset_pipeline_core::suffix::FULLY_OWNED_SUFFIX;
use asset_pipeline_core::{EntityKind, Representation, StructureOnly, TaskLayer, TaskLayerAssembly};
use common::*;

#[test]
fn scenario_a_only_enabled_layer_is_merged() {
    let v1 = first_publish(
        &context(rig_and_shade(), &[]),
        rig_shade_task(&["RIG-einar", "WGT-hand"], &["GEO-body", "GEO-eyes"]),
    );

    let outcome = push(
        &context(rig_and_shade(), &["Shade"]),
        rig_shade_task(&["RIG-einar"], &["GEO-body", "GEO-teeth"]),
        previous(&v1),
    );

    assert_eq!(members(&outcome.document, "einar.rig"), vec!["RIG-einar", "WGT-hand"]);
    assert_eq!(members(&outcome.document, "einar.shade"), vec!["GEO-body", "GEO-teeth"]);

    let metadata = &outcome.metadata;
    assert_eq!(metadata.asset.version, "v002");
    assert!(metadata.task_layer("Rig").unwrap().is_locked);
    assert!(!metadata.task_layer("Shade").unwrap().is_locked);
    assert_eq!(outcome.lock_report.locked, vec!["Rig"]);

    let sources: Vec<(&str, Representation)> = outcome
        .transfers
        .iter()
        .map(|transfer| (transfer.layer.as_str(), transfer.source))
        .collect();
    assert_eq!(
        sources,
        vec![("Rig", Representation::Publish), ("Shade", Representation::Task)]
    );
}

#[test]
fn scenario_a_leaves_no_working_copies_behind() {
    let v1 = first_publish(
        &context(rig_and_shade(), &[]),
        rig_shade_task(&["RIG-einar"], &["GEO-body"]),
    );

    let outcome = push(
        &context(rig_and_shade(), &["Shade"]),
        rig_shade_task(&["RIG-einar"], &["GEO-body"]),
        previous(&v1),
    );

    let document = &outcome.document;
    assert_eq!(find_asset_root(document, ASSET), Some(outcome.asset_root));
    assert_eq!(document.group(document.scene()).unwrap().children, vec![outcome.asset_root]);
    for suffix in [".TASK", ".PUBLISH", ".TARGET"] {
        assert!(document.groups().all(|group| !group.name.ends_with(suffix)));
        assert!(document.entities().all(|entity| !entity.name.ends_with(suffix)));
    }
    assert_eq!(document.entities().count(), 2);
}

#[test]
fn scenario_b_first_publish_copies_task() {
    let task = rig_shade_task(&["RIG-einar"], &["GEO-body"]);
    let outcome = first_publish(&context(rig_and_shade(), &[]), task.clone());

    assert!(outcome.first_publish);
    assert!(outcome.transfers.is_empty());
    assert_eq!(structure(&outcome.document), structure(&task));
    let scene = outcome.document.group(outcome.document.scene()).unwrap();
    assert_eq!(scene.children, vec![outcome.asset_root]);

    let metadata = &outcome.metadata;
    assert_eq!(metadata.asset.name, ASSET);
    assert_eq!(metadata.asset.parent_name, "Character");
    assert_eq!(metadata.asset.version, "v001");
    assert_eq!(metadata.task_layer_ids(), vec!["Rig", "Shade"]);
    assert!(metadata.locked_task_layer_ids().is_empty());
    let rig = metadata.task_layer("Rig").unwrap();
    assert_eq!(rig.author.full_name, "Ada Lovelace");
    assert_eq!(rig.hostname, "workstation-7");
}

fn grooming_assembly() -> TaskLayerAssembly {
    TaskLayerAssembly::new([
        TaskLayer::new("Model", "Model", 0, StructureOnly).with_task_suffix(".geo"),
        TaskLayer::new("Groom", "Groom", 1, GroomingTransfer).with_task_suffix(".hair"),
    ])
    .unwrap()
}

fn grooming_task(particles: &[&str]) -> asset_pipeline_core::Document {
    let mut task = TaskBuilder::new();
    task.group(None, ".geo", &["GEO-body"]);
    let hair = task.group(None, ".hair", &[]);
    task.group(Some(hair), &format!(".hair.particles{FULLY_OWNED_SUFFIX}"), particles);
    task.finish()
}

#[test]
fn scenario_c_fully_owned_group_is_rebuilt() {
    let v1 = first_publish(
        &context(grooming_assembly(), &[]),
        grooming_task(&["PS-0", "PS-1", "PS-2", "PS-3", "PS-4"]),
    );
    let owned = format!("einar.hair.particles{FULLY_OWNED_SUFFIX}");
    assert_eq!(members(&v1.document, &owned).len(), 5);

    let outcome = push(
        &context(grooming_assembly(), &["Groom"]),
        grooming_task(&["PS-0", "PS-new"]),
        previous(&v1),
    );

    assert_eq!(members(&outcome.document, &owned), vec!["PS-0", "PS-new"]);
    let groom = outcome
        .transfers
        .iter()
        .find(|transfer| transfer.layer == "Groom")
        .unwrap();
    assert_eq!(groom.report.cleared_groups, 1);
    assert_eq!(groom.report.created_groups.len(), 1);
    assert_eq!(groom.report.adopted_entities.len(), 2);

    let particles = outcome
        .document
        .entities()
        .filter(|entity| entity.name.starts_with("PS-"))
        .count();
    assert_eq!(particles, 2);
}

#[test]
fn scenario_d_external_links_follow_the_merge() {
    let mut v1 = first_publish(
        &context(rig_and_shade(), &[]),
        rig_shade_task(&["RIG-einar"], &["GEO-body"]),
    );
    let document = &mut v1.document;
    let body = entity_named(document, "GEO-body");
    let lighting = document.add_group("lighting");
    document.link_child(document.scene(), lighting).unwrap();
    document.link_entity(lighting, body).unwrap();
    let key = document.add_entity("LGT-key", EntityKind::Other("light".to_string()));
    document.entity_mut(key).unwrap().parent = Some(body);
    document.link_entity(lighting, key).unwrap();

    let outcome = push(
        &context(rig_and_shade(), &["Shade"]),
        rig_shade_task(&["RIG-einar"], &["GEO-body"]),
        previous(&v1),
    );

    let document = &outcome.document;
    let shade = document.group(group_named(document, "einar.shade")).unwrap();
    let merged_body = shade.entities[0];
    assert_eq!(document.entity_name(merged_body), "GEO-body");

    let lighting = document.group(group_named(document, "lighting")).unwrap();
    assert!(lighting.entities.contains(&merged_body));
    let key = document.entity(entity_named(document, "LGT-key")).unwrap();
    assert_eq!(key.parent, Some(merged_body));
    assert_eq!(document.entities().filter(|e| e.name == "GEO-body").count(), 1);
}

#[test]
fn repeated_push_is_idempotent() {
    let task = || rig_shade_task(&["RIG-einar", "WGT-hand"], &["GEO-body", "GEO-eyes"]);
    let v1 = first_publish(&context(rig_and_shade(), &[]), task());
    let both = context(rig_and_shade(), &["Rig", "Shade"]);

    let v2 = push(&both, task(), previous(&v1));
    let v3 = push(&both, task(), previous(&v2));

    assert_eq!(structure(&v2.document), structure(&task()));
    assert_eq!(structure(&v3.document), structure(&v2.document));
    assert_eq!(v3.metadata.asset.version, "v003");
    assert!(v3.lock_report.locked.is_empty());
}

#[test]
fn layers_added_after_previous_publish_get_metadata() {
    let v1 = first_publish(
        &context(rig_and_shade(), &[]),
        rig_shade_task(&["RIG-einar"], &["GEO-body"]),
    );
    let mut assembly_layers: Vec<TaskLayer> = rig_and_shade().layers().cloned().collect();
    assembly_layers.push(TaskLayer::new("Light", "Light", 2, StructureOnly).with_task_suffix(".light"));
    let extended = TaskLayerAssembly::new(assembly_layers).unwrap();

    let outcome = push(
        &context(extended, &["Shade"]),
        rig_shade_task(&["RIG-einar"], &["GEO-body"]),
        previous(&v1),
    );

    assert_eq!(outcome.metadata.task_layer_ids(), vec!["Rig", "Shade", "Light"]);
    assert_eq!(outcome.metadata.locked_task_layer_ids(), vec!["Rig", "Light"]);
}
