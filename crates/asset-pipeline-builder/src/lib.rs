//! # Asset Pipeline Builder
//!
//! Publishing builds for layered assets.
//!
//! This crate provides:
//! - The build orchestrator that merges a task file into the latest publish
//! - Lock plans freezing the layers a push did not touch
//! - Provenance records for pushed layers
//! - Production configuration and reference transfer strategies
//! - A JSON document provider

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod context;
pub mod lock_plan;
pub mod production;
pub mod provenance;
pub mod provider;
pub mod strategies;

pub use builder::{
    build, find_asset_root, BuildError, BuildOutcome, BuildRequest, LayerTransfer, PreviousPublish,
};
pub use context::{AssetInfo, BuildContext};
pub use lock_plan::{
    plan_previous_publish_locks, LockPlanError, LockReport, PublishLockPlan, TaskLayerLockPlan,
};
pub use production::{ProductionConfig, ProductionConfigError, StrategyKind, TaskLayerDeclaration};
pub use provenance::{init_meta_task_layer, refresh_meta_task_layer, BuildEnvironment};
pub use provider::{DocumentProvider, JsonDocumentProvider, ProviderError};
pub use strategies::{GroomingTransfer, ModelingTransfer, RiggingTransfer, ShadingTransfer};
