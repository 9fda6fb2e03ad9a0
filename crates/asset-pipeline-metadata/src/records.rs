//! Metadata records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Placeholder id for records without a known identity.
pub const NIL_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Timestamp format used in sidecar files.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Review state of a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetStatus {
    /// Waiting for review
    #[default]
    Review,
    /// Approved for use
    Publish,
    /// No longer to be used
    Deprecated,
}

impl AssetStatus {
    /// Persisted name of the status.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AssetStatus::Review => "REVIEW",
            AssetStatus::Publish => "PUBLISH",
            AssetStatus::Deprecated => "DEPRECATED",
        }
    }
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for AssetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REVIEW" => Ok(AssetStatus::Review),
            "PUBLISH" | "PUBLISHED" => Ok(AssetStatus::Publish),
            "DEPRECATED" => Ok(AssetStatus::Deprecated),
            other => Err(format!("unknown asset status `{other}`")),
        }
    }
}

/// A pipeline user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataUser {
    /// User id
    pub id: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Display name
    pub full_name: String,
}

impl Default for MetadataUser {
    fn default() -> Self {
        Self {
            id: NIL_ID.to_string(),
            first_name: "Unknown".to_string(),
            last_name: "Unknown".to_string(),
            full_name: "Unknown".to_string(),
        }
    }
}

impl MetadataUser {
    /// Create a user whose full name joins first and last name.
    #[must_use]
    pub fn new(id: impl Into<String>, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let first_name = first_name.into();
        let last_name = last_name.into();
        Self {
            id: id.into(),
            full_name: format!("{first_name} {last_name}"),
            first_name,
            last_name,
        }
    }
}

/// Provenance of one task layer's contribution to a publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataTaskLayer {
    /// Task layer id
    pub id: String,
    /// Task layer display name
    pub name: String,
    /// Task file the contribution came from, relative to the asset directory
    pub source_path: PathBuf,
    /// Revision of the task file
    pub source_revision: String,
    /// Whether future pushes must keep this contribution
    pub is_locked: bool,
    /// When the layer was first published
    pub created_at: NaiveDateTime,
    /// When the layer was last pushed
    pub updated_at: NaiveDateTime,
    /// Who last pushed the layer
    pub author: MetadataUser,
    /// Build of the tool that wrote the record
    pub software_hash: String,
    /// Machine that wrote the record
    pub hostname: String,
    /// Free-form flags
    pub flags: Vec<String>,
}

/// Identity and state of an asset publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataAsset {
    /// Asset name
    pub name: String,
    /// Id of the parent (asset type)
    pub parent_id: String,
    /// Name of the parent (asset type)
    pub parent_name: String,
    /// Project id
    pub project_id: String,
    /// Publish version, e.g. `v003`
    pub version: String,
    /// Review state
    pub status: AssetStatus,
    /// Asset id
    pub id: String,
    /// Free-form flags
    pub flags: Vec<String>,
}

impl Default for MetadataAsset {
    fn default() -> Self {
        Self {
            name: String::new(),
            parent_id: String::new(),
            parent_name: String::new(),
            project_id: String::new(),
            version: String::new(),
            status: AssetStatus::default(),
            id: NIL_ID.to_string(),
            flags: Vec::new(),
        }
    }
}

/// The metadata of a single publish.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetadataTreeAsset {
    /// Asset record
    pub asset: MetadataAsset,
    /// Task layer records, in production order
    pub task_layers: Vec<MetadataTaskLayer>,
}

impl MetadataTreeAsset {
    /// Create a tree from its parts.
    #[must_use]
    pub fn new(asset: MetadataAsset, task_layers: Vec<MetadataTaskLayer>) -> Self {
        Self { asset, task_layers }
    }

    /// Record of the task layer with `id`.
    #[must_use]
    pub fn task_layer(&self, id: &str) -> Option<&MetadataTaskLayer> {
        self.task_layers.iter().find(|layer| layer.id == id)
    }

    /// Mutable record of the task layer with `id`.
    pub fn task_layer_mut(&mut self, id: &str) -> Option<&mut MetadataTaskLayer> {
        self.task_layers.iter_mut().find(|layer| layer.id == id)
    }

    /// Ids of all task layer records, in order.
    #[must_use]
    pub fn task_layer_ids(&self) -> Vec<&str> {
        self.task_layers.iter().map(|layer| layer.id.as_str()).collect()
    }

    /// Ids of locked task layer records, in order.
    #[must_use]
    pub fn locked_task_layer_ids(&self) -> Vec<&str> {
        self.task_layers
            .iter()
            .filter(|layer| layer.is_locked)
            .map(|layer| layer.id.as_str())
            .collect()
    }

    /// Append a task layer record.
    ///
    /// A record whose id is already present is ignored and `false` is
    /// returned.
    pub fn add_task_layer(&mut self, layer: MetadataTaskLayer) -> bool {
        if self.task_layer(&layer.id).is_some() {
            tracing::warn!(task_layer = %layer.id, "Task layer already present in metadata");
            return false;
        }
        self.task_layers.push(layer);
        true
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::NaiveDate;

    pub fn timestamp(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 14)
            .and_then(|date| date.and_hms_opt(hour, 30, 0))
            .unwrap()
    }

    pub fn task_layer(id: &str, locked: bool) -> MetadataTaskLayer {
        MetadataTaskLayer {
            id: id.to_string(),
            name: id.to_string(),
            source_path: PathBuf::from("einar/einar.rigging.json"),
            source_revision: String::new(),
            is_locked: locked,
            created_at: timestamp(9),
            updated_at: timestamp(11),
            author: MetadataUser::new("42", "Ada", "Lovelace"),
            software_hash: "abc123".to_string(),
            hostname: "workstation-7".to_string(),
            flags: Vec::new(),
        }
    }

    pub fn tree() -> MetadataTreeAsset {
        MetadataTreeAsset::new(
            MetadataAsset {
                name: "einar".to_string(),
                parent_id: "char".to_string(),
                parent_name: "Characters".to_string(),
                project_id: "sprite".to_string(),
                version: "v002".to_string(),
                status: AssetStatus::Review,
                id: NIL_ID.to_string(),
                flags: vec!["hero".to_string()],
            },
            vec![task_layer("Rigging", true), task_layer("Shading", false)],
        )
    }
}
