//! Per-layer data transfer.
//!
//! Structural merging is shared by every task layer. What differs between
//! layers is which entity data they carry from source to target; that part
//! is supplied by a [`TransferStrategy`].

use crate::graph::{Document, GraphError};
use crate::mapping::{MappingError, TransferMapping};

/// Free-form settings handed to every strategy.
pub type TransferSettings = serde_json::Map<String, serde_json::Value>;

/// Errors raised by a transfer strategy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    /// Strategy-specific failure.
    #[error("{0}")]
    Failed(String),
    /// A graph mutation failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// A mapping mutation failed.
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// Everything a strategy may read or modify during its transfer step.
pub struct TransferContext<'a> {
    /// Document holding the source and target hierarchies
    pub document: &'a mut Document,
    /// Mapping from source to target
    pub mapping: &'a mut TransferMapping,
    /// Shared transfer settings
    pub settings: &'a TransferSettings,
    /// Id of the layer running the transfer
    pub layer_id: &'a str,
}

impl TransferContext<'_> {
    /// Read a boolean setting, falling back to `default`.
    #[must_use]
    pub fn bool_setting(&self, key: &str, default: bool) -> bool {
        self.settings
            .get(key)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(default)
    }
}

/// Layer-specific data transfer between mapped entities.
pub trait TransferStrategy: Send + Sync {
    /// Carry this layer's data from mapped sources to their targets.
    ///
    /// # Errors
    ///
    /// Returns an error when the transfer cannot proceed; the build is
    /// aborted.
    fn transfer_data(&self, ctx: &mut TransferContext<'_>) -> Result<(), StrategyError>;
}

impl<F> TransferStrategy for F
where
    F: Fn(&mut TransferContext<'_>) -> Result<(), StrategyError> + Send + Sync,
{
    fn transfer_data(&self, ctx: &mut TransferContext<'_>) -> Result<(), StrategyError> {
        self(ctx)
    }
}

/// Strategy that transfers nothing beyond the shared structural merge.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructureOnly;

impl TransferStrategy for StructureOnly {
    fn transfer_data(&self, ctx: &mut TransferContext<'_>) -> Result<(), StrategyError> {
        tracing::trace!(layer = ctx.layer_id, "No data transfer for layer");
        Ok(())
    }
}
