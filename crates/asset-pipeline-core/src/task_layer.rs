//! Task layers and their production assembly.
//!
//! A [`TaskLayer`] is an ownership domain: it owns the direct children of an
//! asset root whose names end with its `task_suffix` and carries a
//! [`TransferStrategy`] for its entity data. A [`TaskLayerAssembly`] holds
//! every layer of a production, ordered by `order`, each wrapped in a
//! [`TaskLayerConfig`] carrying its enable flag.

use crate::graph::{Document, GroupId};
use crate::strategy::TransferStrategy;
use crate::suffix::{strip_transfer_suffix, DELIMITER, FULLY_OWNED_SUFFIX};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Errors raised while assembling task layers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    /// Two layers share the same identity.
    #[error("detected 2 task layers with the same id `{id}`")]
    IdentityConflict {
        /// Conflicting id
        id: String,
    },
    /// Two layers share the same order.
    #[error("task layers `{first}` and `{second}` share order {order}")]
    DuplicateOrder {
        /// Shared order
        order: i32,
        /// Layer registered first
        first: String,
        /// Layer registered second
        second: String,
    },
    /// A layer has an empty name or a negative order.
    #[error("task layer `{id}` is invalid (empty name or negative order)")]
    InvalidTaskLayer {
        /// Offending id
        id: String,
    },
    /// No layer has the requested id.
    #[error("unknown task layer `{0}`")]
    UnknownTaskLayer(String),
}

/// An ownership domain contributing part of an asset.
#[derive(Clone)]
pub struct TaskLayer {
    id: String,
    name: String,
    description: String,
    order: i32,
    task_suffix: String,
    strategy: Arc<dyn TransferStrategy>,
}

impl TaskLayer {
    /// Create a layer with an explicit id.
    pub fn new<S>(id: impl Into<String>, name: impl Into<String>, order: i32, strategy: S) -> Self
    where
        S: TransferStrategy + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            order,
            task_suffix: String::new(),
            strategy: Arc::new(strategy),
        }
    }

    /// Create a layer identified by the type name of its strategy.
    ///
    /// Two layers built from the same strategy type share identity and
    /// cannot be assembled together.
    pub fn from_strategy<S>(name: impl Into<String>, order: i32, strategy: S) -> Self
    where
        S: TransferStrategy + 'static,
    {
        Self::new(short_type_name::<S>(), name, order, strategy)
    }

    /// Builder-style description setter.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder-style task suffix setter.
    #[must_use]
    pub fn with_task_suffix(mut self, task_suffix: impl Into<String>) -> Self {
        self.task_suffix = task_suffix.into();
        self
    }

    /// Identity of the layer.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Position in the production's merge order.
    #[must_use]
    pub fn order(&self) -> i32 {
        self.order
    }

    /// Suffix identifying the groups this layer owns.
    #[must_use]
    pub fn task_suffix(&self) -> &str {
        &self.task_suffix
    }

    /// Layer-specific data transfer.
    #[must_use]
    pub fn strategy(&self) -> &dyn TransferStrategy {
        self.strategy.as_ref()
    }

    /// A layer is valid when it has a name and a non-negative order.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && self.order >= 0
    }

    /// Whether a group name, with `transfer_suffix` stripped, belongs to
    /// this layer.
    #[must_use]
    pub fn owns_group_name(&self, name: &str, transfer_suffix: &str) -> bool {
        !self.task_suffix.is_empty()
            && strip_transfer_suffix(name, transfer_suffix).ends_with(&self.task_suffix)
    }

    /// Whether a fully-owned group name, with `transfer_suffix` stripped,
    /// belongs to this layer.
    ///
    /// The task suffix must end a name segment, so a `.geo` layer does not
    /// own `einar.geometry.props.FULLY_OWNED`.
    #[must_use]
    pub fn owns_fully_owned_group(&self, name: &str, transfer_suffix: &str) -> bool {
        if self.task_suffix.is_empty() {
            return false;
        }
        let base = strip_transfer_suffix(name, transfer_suffix);
        base.contains(FULLY_OWNED_SUFFIX)
            && base.match_indices(self.task_suffix.as_str()).any(|(index, matched)| {
                base[index + matched.len()..]
                    .chars()
                    .next()
                    .map_or(true, |next| next == DELIMITER)
            })
    }

    /// Direct children of `root` owned by this layer.
    #[must_use]
    pub fn task_groups(&self, document: &Document, root: GroupId, transfer_suffix: &str) -> Vec<GroupId> {
        document.group(root).map_or_else(Vec::new, |node| {
            node.children
                .iter()
                .copied()
                .filter(|child| self.owns_group_name(document.group_name(*child), transfer_suffix))
                .collect()
        })
    }
}

impl std::fmt::Debug for TaskLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLayer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("order", &self.order)
            .field("task_suffix", &self.task_suffix)
            .finish_non_exhaustive()
    }
}

fn short_type_name<S>() -> &'static str {
    let full = std::any::type_name::<S>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A task layer with its enable flag.
#[derive(Debug, Clone)]
pub struct TaskLayerConfig {
    layer: TaskLayer,
    used: bool,
}

impl TaskLayerConfig {
    /// Wrap a layer, disabled.
    #[must_use]
    pub fn new(layer: TaskLayer) -> Self {
        Self { layer, used: false }
    }

    /// The wrapped layer.
    #[must_use]
    pub fn layer(&self) -> &TaskLayer {
        &self.layer
    }

    /// Whether the layer is enabled for the current push.
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.used
    }

    /// Enable or disable the layer.
    pub fn set_used(&mut self, used: bool) {
        self.used = used;
    }

    /// Disable the layer.
    pub fn reset(&mut self) {
        self.used = false;
    }
}

impl std::fmt::Display for TaskLayerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(use: {})", self.layer.name, self.used)
    }
}

/// Every task layer of a production, in ascending order.
#[derive(Debug, Clone, Default)]
pub struct TaskLayerAssembly {
    configs: Vec<TaskLayerConfig>,
}

impl TaskLayerAssembly {
    /// Assemble `layers`, sorting them by order.
    ///
    /// # Errors
    ///
    /// Returns an error if a layer is invalid, two layers share identity or
    /// two layers share an order.
    pub fn new(layers: impl IntoIterator<Item = TaskLayer>) -> Result<Self, AssemblyError> {
        let mut configs: Vec<TaskLayerConfig> = Vec::new();
        for layer in layers {
            if !layer.is_valid() {
                return Err(AssemblyError::InvalidTaskLayer { id: layer.id });
            }
            if configs.iter().any(|config| config.layer.id == layer.id) {
                return Err(AssemblyError::IdentityConflict { id: layer.id });
            }
            if let Some(existing) = configs.iter().find(|config| config.layer.order == layer.order) {
                return Err(AssemblyError::DuplicateOrder {
                    order: layer.order,
                    first: existing.layer.id.clone(),
                    second: layer.id,
                });
            }
            configs.push(TaskLayerConfig::new(layer));
        }
        configs.sort_by_key(|config| config.layer.order);
        tracing::debug!(layers = configs.len(), "Assembled task layers");
        Ok(Self { configs })
    }

    /// All configs, in order.
    #[must_use]
    pub fn configs(&self) -> &[TaskLayerConfig] {
        &self.configs
    }

    /// Config of the layer with `id`.
    #[must_use]
    pub fn config(&self, id: &str) -> Option<&TaskLayerConfig> {
        self.configs.iter().find(|config| config.layer.id == id)
    }

    /// Mutable config of the layer with `id`.
    pub fn config_mut(&mut self, id: &str) -> Option<&mut TaskLayerConfig> {
        self.configs.iter_mut().find(|config| config.layer.id == id)
    }

    /// Enable or disable the layer with `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if no layer has that id.
    pub fn set_used(&mut self, id: &str, used: bool) -> Result<(), AssemblyError> {
        let config = self
            .config_mut(id)
            .ok_or_else(|| AssemblyError::UnknownTaskLayer(id.to_string()))?;
        config.set_used(used);
        Ok(())
    }

    /// Disable every layer.
    pub fn reset(&mut self) {
        self.configs.iter_mut().for_each(TaskLayerConfig::reset);
    }

    /// All layers, in order.
    pub fn layers(&self) -> impl Iterator<Item = &TaskLayer> {
        self.configs.iter().map(TaskLayerConfig::layer)
    }

    /// Enabled layers, in order.
    pub fn used_layers(&self) -> impl Iterator<Item = &TaskLayer> {
        self.configs
            .iter()
            .filter(|config| config.used)
            .map(TaskLayerConfig::layer)
    }

    /// Disabled layers, in order.
    pub fn unused_layers(&self) -> impl Iterator<Item = &TaskLayer> {
        self.configs
            .iter()
            .filter(|config| !config.used)
            .map(TaskLayerConfig::layer)
    }

    /// Ids of the enabled layers.
    #[must_use]
    pub fn used_layer_ids(&self) -> BTreeSet<String> {
        self.used_layers().map(|layer| layer.id.clone()).collect()
    }

    /// Display names, in order.
    #[must_use]
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers().map(TaskLayer::name).collect()
    }

    /// Orders of all layers, or of the enabled ones only.
    #[must_use]
    pub fn orders(&self, only_used: bool) -> Vec<i32> {
        self.configs
            .iter()
            .filter(|config| !only_used || config.used)
            .map(|config| config.layer.order)
            .collect()
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Whether the assembly holds no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl std::fmt::Display for TaskLayerAssembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let configs: Vec<String> = self.configs.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", configs.join(", "))
    }
}
