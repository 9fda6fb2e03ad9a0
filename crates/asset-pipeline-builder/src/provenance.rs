//! Who, where and when of a build.

use asset_pipeline_core::TaskLayer;
use asset_pipeline_metadata::{MetadataTaskLayer, MetadataUser};
use chrono::{NaiveDateTime, SubsecRound};
use std::path::{Path, PathBuf};

/// Identity of the user, machine and tool running a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnvironment {
    /// User pushing
    pub author: MetadataUser,
    /// Machine running the build
    pub hostname: String,
    /// Build of the tool
    pub software_hash: String,
    /// Clock override; `None` reads local time
    pub fixed_time: Option<NaiveDateTime>,
}

impl Default for BuildEnvironment {
    fn default() -> Self {
        Self {
            author: MetadataUser::default(),
            hostname: "unknown".to_string(),
            software_hash: String::new(),
            fixed_time: None,
        }
    }
}

impl BuildEnvironment {
    /// Current time, truncated to whole seconds so it survives a metadata
    /// round trip.
    #[must_use]
    pub fn now(&self) -> NaiveDateTime {
        self.fixed_time
            .unwrap_or_else(|| chrono::Local::now().naive_local())
            .trunc_subsecs(0)
    }
}

/// Fresh, unlocked metadata record for `layer`.
#[must_use]
pub fn init_meta_task_layer(
    layer: &TaskLayer,
    source_path: &Path,
    environment: &BuildEnvironment,
    now: NaiveDateTime,
) -> MetadataTaskLayer {
    MetadataTaskLayer {
        id: layer.id().to_string(),
        name: layer.name().to_string(),
        source_path: source_path.to_path_buf(),
        source_revision: String::new(),
        is_locked: false,
        created_at: now,
        updated_at: now,
        author: environment.author.clone(),
        software_hash: environment.software_hash.clone(),
        hostname: environment.hostname.clone(),
        flags: Vec::new(),
    }
}

/// Record a new push of a layer. Pushing a layer unlocks it.
pub fn refresh_meta_task_layer(
    record: &mut MetadataTaskLayer,
    source_path: &Path,
    environment: &BuildEnvironment,
    now: NaiveDateTime,
) {
    record.source_path = PathBuf::from(source_path);
    record.updated_at = now;
    record.author = environment.author.clone();
    record.software_hash.clone_from(&environment.software_hash);
    record.hostname.clone_from(&environment.hostname);
    record.is_locked = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset_pipeline_core::StructureOnly;
    use chrono::{NaiveDate, Timelike};

    fn environment() -> BuildEnvironment {
        BuildEnvironment {
            author: MetadataUser::new("7", "Grace", "Hopper"),
            hostname: "render-01".to_string(),
            software_hash: "deadbeef".to_string(),
            fixed_time: NaiveDate::from_ymd_opt(2024, 5, 1).and_then(|d| d.and_hms_milli_opt(8, 0, 0, 750)),
        }
    }

    #[test]
    fn test_now_drops_subseconds() {
        let now = environment().now();
        assert_eq!(now.nanosecond(), 0);
    }

    #[test]
    fn test_init_and_refresh() {
        let env = environment();
        let layer = TaskLayer::new("Shading", "Shade", 1, StructureOnly);
        let created = env.now();
        let mut record = init_meta_task_layer(&layer, Path::new("einar/einar.shade.json"), &env, created);
        assert_eq!(record.id, "Shading");
        assert!(!record.is_locked);
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.author.full_name, "Grace Hopper");

        record.is_locked = true;
        let later = created + chrono::Duration::hours(2);
        refresh_meta_task_layer(&mut record, Path::new("einar/einar.v2.json"), &env, later);
        assert!(!record.is_locked);
        assert_eq!(record.created_at, created);
        assert_eq!(record.updated_at, later);
        assert_eq!(record.source_path, PathBuf::from("einar/einar.v2.json"));
    }
}
