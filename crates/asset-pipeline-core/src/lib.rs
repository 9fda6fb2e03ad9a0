//! # Asset Pipeline Core
//!
//! Scene graph model and merge semantics for the layered asset pipeline.
//!
//! This crate provides:
//! - A hierarchical scene graph of groups and entities with link semantics
//! - Suffix-based representation naming (task, publish, target)
//! - Bijective transfer mappings between two representations of an asset
//! - Task layers with pluggable data transfer strategies and their assembly
//! - The generic structural merge run by every task layer
//! - Criteria-matched hooks dispatched in ordered phases

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod graph;
pub mod hook;
pub mod mapping;
pub mod merge;
pub mod strategy;
pub mod suffix;
pub mod task_layer;

pub use graph::{
    Deformer, Document, Entity, EntityId, EntityKind, GraphError, GroupId, GroupNode,
    MaterialSlot, ParamValue, PurgeReport, SlotLink, Subtree, Topology, Transform, Visibility,
};
pub use hook::{
    Hook, HookContext, HookError, HookFailure, HookInvocation, HookPhase, HookQuery,
    HookRegistry, MatchCriteria,
};
pub use mapping::{MappingError, MappingRoot, TransferMapping};
pub use merge::{assign_objects, TransferError, TransferReport};
pub use strategy::{StrategyError, StructureOnly, TransferContext, TransferSettings, TransferStrategy};
pub use suffix::Representation;
pub use task_layer::{AssemblyError, TaskLayer, TaskLayerAssembly, TaskLayerConfig};
