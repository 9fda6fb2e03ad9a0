//! Inputs shared by every build of a production.

use crate::builder::BuildError;
use crate::provenance::BuildEnvironment;
use asset_pipeline_core::{HookRegistry, TaskLayerAssembly, TransferSettings};
use asset_pipeline_metadata::{MetadataAsset, NIL_ID};

/// Identity of the asset being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    /// Asset id
    pub id: String,
    /// Asset name, also the name of its root group
    pub name: String,
    /// Asset type, e.g. `Character`
    pub asset_type: Option<String>,
    /// Id of the asset type
    pub parent_id: String,
    /// Project id
    pub project_id: String,
}

impl AssetInfo {
    /// Asset with only a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NIL_ID.to_string(),
            name: name.into(),
            asset_type: None,
            parent_id: NIL_ID.to_string(),
            project_id: NIL_ID.to_string(),
        }
    }

    /// Builder-style asset type setter.
    #[must_use]
    pub fn with_asset_type(mut self, asset_type: impl Into<String>) -> Self {
        self.asset_type = Some(asset_type.into());
        self
    }

    /// Asset record for a publish with `version`.
    #[must_use]
    pub fn to_metadata(&self, version: impl Into<String>) -> MetadataAsset {
        MetadataAsset {
            name: self.name.clone(),
            parent_id: self.parent_id.clone(),
            parent_name: self.asset_type.clone().unwrap_or_default(),
            project_id: self.project_id.clone(),
            version: version.into(),
            id: self.id.clone(),
            ..MetadataAsset::default()
        }
    }
}

/// Production setup and environment of a build.
///
/// The assembly's enable flags select the layers pushed by the build.
#[derive(Debug)]
pub struct BuildContext {
    /// Production task layers with their enable flags
    pub assembly: TaskLayerAssembly,
    /// Production hooks
    pub hooks: HookRegistry,
    /// Settings handed to every strategy
    pub settings: TransferSettings,
    /// Asset being built
    pub asset: AssetInfo,
    /// User, machine and clock of the build
    pub environment: BuildEnvironment,
}

impl BuildContext {
    /// Context without hooks or settings.
    #[must_use]
    pub fn new(assembly: TaskLayerAssembly, asset: AssetInfo) -> Self {
        Self {
            assembly,
            hooks: HookRegistry::new(),
            settings: TransferSettings::new(),
            asset,
            environment: BuildEnvironment::default(),
        }
    }

    /// Builder-style hooks setter.
    #[must_use]
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Builder-style settings setter.
    #[must_use]
    pub fn with_settings(mut self, settings: TransferSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Builder-style environment setter.
    #[must_use]
    pub fn with_environment(mut self, environment: BuildEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Enable exactly the layers named in `ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if an id names no layer. The selection is left
    /// empty in that case.
    pub fn select_layers<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<(), BuildError> {
        self.assembly.reset();
        for id in ids {
            if let Err(error) = self.assembly.set_used(id.as_ref(), true) {
                self.assembly.reset();
                return Err(error.into());
            }
        }
        tracing::debug!(layers = %self.assembly, "Selected task layers");
        Ok(())
    }

    /// Ids of the enabled layers, in merge order.
    #[must_use]
    pub fn pushed_layer_ids(&self) -> Vec<String> {
        self.assembly.used_layers().map(|layer| layer.id().to_string()).collect()
    }
}
