//! Representation suffixes and name rewriting.
//!
//! While an asset is being merged, three copies of it live in the same
//! document. Each copy is told apart by a suffix appended to every group and
//! entity name in its hierarchy:
//!
//! | Representation | Suffix     |
//! |----------------|------------|
//! | task           | `.TASK`    |
//! | publish        | `.PUBLISH` |
//! | target         | `.TARGET`  |

use serde::{Deserialize, Serialize};

/// Suffix of the working-copy representation.
pub const TASK_SUFFIX: &str = ".TASK";
/// Suffix of the last published representation.
pub const PUBLISH_SUFFIX: &str = ".PUBLISH";
/// Suffix of the representation being assembled.
pub const TARGET_SUFFIX: &str = ".TARGET";
/// Name marker for groups whose contents are replaced wholesale on transfer.
pub const FULLY_OWNED_SUFFIX: &str = ".FULLY_OWNED";
/// Separator between a base name and its suffixes.
pub const DELIMITER: char = '.';

/// One of the three copies of an asset present during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    /// The artist's working copy.
    Task,
    /// The most recent publish.
    Publish,
    /// The publish being assembled.
    Target,
}

impl Representation {
    /// Suffix appended to every name in this representation.
    #[must_use]
    pub fn transfer_suffix(self) -> &'static str {
        match self {
            Representation::Task => TASK_SUFFIX,
            Representation::Publish => PUBLISH_SUFFIX,
            Representation::Target => TARGET_SUFFIX,
        }
    }
}

impl std::fmt::Display for Representation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Representation::Task => write!(f, "task"),
            Representation::Publish => write!(f, "publish"),
            Representation::Target => write!(f, "target"),
        }
    }
}

/// Remove a trailing `suffix` from `name`.
///
/// An empty suffix leaves the name unchanged.
#[must_use]
pub fn strip_transfer_suffix(name: &str, suffix: &str) -> String {
    swap_transfer_suffix(name, suffix, "")
}

/// Replace a trailing `from` in `name` with `to`.
///
/// Names that do not end with `from` are returned unchanged.
#[must_use]
pub fn swap_transfer_suffix(name: &str, from: &str, to: &str) -> String {
    if from.is_empty() {
        return name.to_string();
    }
    match name.strip_suffix(from) {
        Some(base) => format!("{base}{to}"),
        None => name.to_string(),
    }
}

/// Drop the final delimiter-separated segment of `name`.
///
/// Names without a delimiter are returned unchanged.
#[must_use]
pub fn remove_last_segment(name: &str) -> &str {
    match name.rfind(DELIMITER) {
        Some(index) => &name[..index],
        None => name,
    }
}
