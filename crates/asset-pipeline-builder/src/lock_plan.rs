//! Locking task layer contributions in published metadata.
//!
//! Locking is monotonic: a plan only ever sets `is_locked` to `true`, and
//! never touches a record whose id it does not name.

use asset_pipeline_metadata::{load_metadata, write_metadata, MetadataTreeAsset, StoreError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A lock request that could not be honoured. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockPlanError {
    /// The metadata holds no record with the requested id.
    #[error("task layer `{id}` is not present in the metadata of {asset} {version}")]
    MissingTaskLayer {
        /// Requested id
        id: String,
        /// Asset name of the metadata
        asset: String,
        /// Version of the metadata
        version: String,
    },
}

/// Outcome of applying a lock plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockReport {
    /// Ids that were unlocked and are now locked
    pub locked: Vec<String>,
    /// Ids that were locked already
    pub already_locked: Vec<String>,
    /// Requests that were skipped
    pub skipped: Vec<LockPlanError>,
}

impl LockReport {
    /// Whether the plan changed the metadata.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.locked.is_empty()
    }
}

/// The set of task layer ids to lock in a metadata tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskLayerLockPlan {
    ids: BTreeSet<String>,
}

impl TaskLayerLockPlan {
    /// Plan locking `ids`.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Ids to lock.
    #[must_use]
    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }

    /// Whether the plan locks nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Lock every planned id present in `tree`.
    pub fn lock(&self, tree: &mut MetadataTreeAsset) -> LockReport {
        let mut report = LockReport::default();
        for id in &self.ids {
            let asset = tree.asset.name.clone();
            let version = tree.asset.version.clone();
            match tree.task_layer_mut(id) {
                Some(record) if record.is_locked => report.already_locked.push(id.clone()),
                Some(record) => {
                    record.is_locked = true;
                    report.locked.push(id.clone());
                }
                None => {
                    let error = LockPlanError::MissingTaskLayer {
                        id: id.clone(),
                        asset,
                        version,
                    };
                    tracing::warn!(%error, "Skipping lock request");
                    report.skipped.push(error);
                }
            }
        }
        tracing::debug!(
            locked = ?report.locked,
            already_locked = report.already_locked.len(),
            skipped = report.skipped.len(),
            "Applied lock plan"
        );
        report
    }

    /// Lock the planned ids in the sidecar at `path` and write it back.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar cannot be read or written.
    pub fn lock_and_persist(&self, path: &Path) -> Result<LockReport, StoreError> {
        let mut tree = load_metadata(path)?;
        let report = self.lock(&mut tree);
        write_metadata(path, &tree)?;
        Ok(report)
    }
}

/// A lock plan bound to the sidecar of one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishLockPlan {
    /// Sidecar to update
    pub metadata_path: PathBuf,
    /// Ids to lock in it
    pub plan: TaskLayerLockPlan,
}

/// Plans locking the pushed layers in every earlier publish.
///
/// `publishes` holds the sidecar path and metadata of every publish except
/// the one just written. Ids absent from a publish are warned about and
/// left out; publishes with nothing to lock get no plan.
#[must_use]
pub fn plan_previous_publish_locks(
    pushed: &BTreeSet<String>,
    publishes: &[(PathBuf, MetadataTreeAsset)],
) -> Vec<PublishLockPlan> {
    let mut plans = Vec::new();
    for (metadata_path, tree) in publishes {
        let mut ids = Vec::new();
        for id in pushed {
            match tree.task_layer(id) {
                Some(record) if record.is_locked => {}
                Some(_) => ids.push(id.clone()),
                None => tracing::warn!(
                    task_layer = %id,
                    version = %tree.asset.version,
                    "Pushed task layer missing from earlier publish"
                ),
            }
        }
        if !ids.is_empty() {
            plans.push(PublishLockPlan {
                metadata_path: metadata_path.clone(),
                plan: TaskLayerLockPlan::new(ids),
            });
        }
    }
    plans
}
