//! CLI configuration.

use anyhow::{Context, Result};
use asset_pipeline_builder::BuildEnvironment;
use asset_pipeline_metadata::{MetadataUser, NIL_ID};
use std::path::PathBuf;
use uuid::Uuid;

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Production configuration file
    pub production_config: Option<PathBuf>,

    /// Id of the pushing user
    pub author_id: Option<Uuid>,

    /// Given name of the pushing user
    pub author_first_name: String,

    /// Family name of the pushing user
    pub author_last_name: String,

    /// Machine running the build
    pub hostname: String,

    /// Build of the tool
    pub software_hash: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            production_config: None,
            author_id: None,
            author_first_name: "Unknown".to_string(),
            author_last_name: "Unknown".to_string(),
            hostname: "unknown".to_string(),
            software_hash: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ASSET_PIPELINE_CONFIG`: Production configuration path
    /// - `ASSET_PIPELINE_AUTHOR_ID`: Author UUID
    /// - `ASSET_PIPELINE_AUTHOR_FIRST_NAME`: Author given name
    /// - `ASSET_PIPELINE_AUTHOR_LAST_NAME`: Author family name
    /// - `ASSET_PIPELINE_HOSTNAME`: Machine name, `HOSTNAME` otherwise
    /// - `ASSET_PIPELINE_SOFTWARE_HASH`: Tool build identifier
    ///
    /// # Errors
    ///
    /// Returns error if `ASSET_PIPELINE_AUTHOR_ID` is not a UUID.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through `var`, which looks up one variable.
    ///
    /// # Errors
    ///
    /// Returns error if `ASSET_PIPELINE_AUTHOR_ID` is not a UUID.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = var("ASSET_PIPELINE_CONFIG") {
            config.production_config = Some(PathBuf::from(path));
        }

        if let Some(id) = var("ASSET_PIPELINE_AUTHOR_ID") {
            config.author_id = Some(Uuid::parse_str(&id).context("Invalid ASSET_PIPELINE_AUTHOR_ID")?);
        }

        if let Some(first_name) = var("ASSET_PIPELINE_AUTHOR_FIRST_NAME") {
            config.author_first_name = first_name;
        }

        if let Some(last_name) = var("ASSET_PIPELINE_AUTHOR_LAST_NAME") {
            config.author_last_name = last_name;
        }

        if let Some(hostname) = var("ASSET_PIPELINE_HOSTNAME").or_else(|| var("HOSTNAME")) {
            config.hostname = hostname;
        }

        if let Some(hash) = var("ASSET_PIPELINE_SOFTWARE_HASH") {
            config.software_hash = hash;
        }

        Ok(config)
    }

    /// Build environment carried into every push.
    #[must_use]
    pub fn to_environment(&self) -> BuildEnvironment {
        let id = self
            .author_id
            .map_or_else(|| NIL_ID.to_string(), |id| id.to_string());
        BuildEnvironment {
            author: MetadataUser::new(id, &self.author_first_name, &self.author_last_name),
            hostname: self.hostname.clone(),
            software_hash: self.software_hash.clone(),
            fixed_time: None,
        }
    }
}
