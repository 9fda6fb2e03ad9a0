//! Production configuration.
//!
//! A production declares its task layers and the settings shared by their
//! strategies in a JSON document:
//!
//! ```json
//! {
//!   "task_layers": [
//!     { "name": "Rig", "order": 0, "task_suffix": ".rig", "strategy": "rigging" },
//!     { "id": "Shading", "name": "Shade", "order": 1, "task_suffix": ".shade", "strategy": "shading" }
//!   ],
//!   "transfer_settings": { "transfer_topology": true }
//! }
//! ```

use crate::strategies::{GroomingTransfer, ModelingTransfer, RiggingTransfer, ShadingTransfer};
use asset_pipeline_core::{
    AssemblyError, StructureOnly, TaskLayer, TaskLayerAssembly, TransferSettings, TransferStrategy,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors raised while loading a production configuration.
#[derive(Debug, thiserror::Error)]
pub enum ProductionConfigError {
    /// The file could not be read.
    #[error("failed to read production config {}: {source}", path.display())]
    Read {
        /// Config file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The document is not a valid production config.
    #[error("invalid production config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Reference strategy a declared layer runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Structural merge only
    #[default]
    Structure,
    /// Attachments and armature deformers
    Rigging,
    /// Transforms and topology
    Modeling,
    /// Material slots
    Shading,
    /// Hair and particle systems
    Grooming,
}

/// One task layer as declared by a production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLayerDeclaration {
    /// Identity; defaults to the strategy's type name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name
    pub name: String,
    /// Human description
    #[serde(default)]
    pub description: String,
    /// Merge order
    pub order: i32,
    /// Suffix of the groups the layer owns
    #[serde(default)]
    pub task_suffix: String,
    /// Data transfer strategy
    #[serde(default)]
    pub strategy: StrategyKind,
}

impl TaskLayerDeclaration {
    /// Instantiate the declared layer.
    #[must_use]
    pub fn to_task_layer(&self) -> TaskLayer {
        let layer = match self.strategy {
            StrategyKind::Structure => self.layer_with(StructureOnly),
            StrategyKind::Rigging => self.layer_with(RiggingTransfer),
            StrategyKind::Modeling => self.layer_with(ModelingTransfer),
            StrategyKind::Shading => self.layer_with(ShadingTransfer),
            StrategyKind::Grooming => self.layer_with(GroomingTransfer),
        };
        layer
            .with_description(self.description.clone())
            .with_task_suffix(self.task_suffix.clone())
    }

    fn layer_with<S: TransferStrategy + 'static>(&self, strategy: S) -> TaskLayer {
        match &self.id {
            Some(id) => TaskLayer::new(id.clone(), self.name.clone(), self.order, strategy),
            None => TaskLayer::from_strategy(self.name.clone(), self.order, strategy),
        }
    }
}

/// Task layers and strategy settings of a production.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// Declared task layers, in any order
    pub task_layers: Vec<TaskLayerDeclaration>,
    /// Settings handed to every strategy
    #[serde(default)]
    pub transfer_settings: TransferSettings,
}

impl ProductionConfig {
    /// Parse a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ProductionConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, ProductionConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ProductionConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), task_layers = config.task_layers.len(), "Loaded production config");
        Ok(config)
    }

    /// Assemble the declared layers, all disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if two layers share identity or order, or a layer
    /// is invalid.
    pub fn assembly(&self) -> Result<TaskLayerAssembly, AssemblyError> {
        TaskLayerAssembly::new(self.task_layers.iter().map(TaskLayerDeclaration::to_task_layer))
    }
}
