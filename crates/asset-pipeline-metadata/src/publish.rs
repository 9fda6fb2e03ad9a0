//! Publish directory layout and version naming.
//!
//! Layout: `{asset_dir}/publish/{asset}.v###.{ext}`, each publish with a
//! metadata sidecar `{asset}.v###.xmp` next to it.

use std::path::{Path, PathBuf};

/// Name of the directory holding publishes.
pub const PUBLISH_DIR: &str = "publish";
/// Extension of metadata sidecar files.
pub const METADATA_EXT: &str = "xmp";
/// Version of the first publish.
pub const FIRST_VERSION: u32 = 1;

/// Render a version number as `v###`.
#[must_use]
pub fn format_version(version: u32) -> String {
    format!("v{version:03}")
}

/// Find the first `v` followed by a version in `text`.
///
/// A version has at least three digits, as written by [`format_version`].
/// Zero padding beyond three digits is rejected.
#[must_use]
pub fn parse_version(text: &str) -> Option<u32> {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().find_map(|(index, byte)| {
        if *byte != b'v' {
            return None;
        }
        let start = index + 1;
        let len = bytes[start..].iter().take_while(|b| b.is_ascii_digit()).count();
        let digits = &text[start..start + len];
        if len == 3 || (len > 3 && !digits.starts_with('0')) {
            digits.parse().ok()
        } else {
            None
        }
    })
}

/// A published revision of an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPublish {
    path: PathBuf,
    version: u32,
}

impl AssetPublish {
    /// Describe the publish stored at `path`, if its name carries a version.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let version = parse_version(path.file_stem()?.to_str()?)?;
        Some(Self { path, version })
    }

    /// Path of the publish document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Version number.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Version rendered as `v###`.
    #[must_use]
    pub fn version_string(&self) -> String {
        format_version(self.version)
    }

    /// Path of the metadata sidecar.
    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.path.with_extension(METADATA_EXT)
    }
}

/// The directory of one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDir {
    path: PathBuf,
    extension: String,
}

impl AssetDir {
    /// Asset directory whose publish documents use `extension`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            extension: extension.into(),
        }
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Asset name used in file names, the directory's own name.
    #[must_use]
    pub fn asset_disk_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Directory holding the publishes.
    #[must_use]
    pub fn publish_dir(&self) -> PathBuf {
        self.path.join(PUBLISH_DIR)
    }

    /// Path of the publish with `version`.
    #[must_use]
    pub fn publish_path(&self, version: u32) -> PathBuf {
        self.publish_dir().join(format!(
            "{}.{}.{}",
            self.asset_disk_name(),
            format_version(version),
            self.extension
        ))
    }

    /// Every publish on disk, in ascending version order.
    ///
    /// A missing publish directory yields no publishes.
    ///
    /// # Errors
    ///
    /// Returns an error if the publish directory cannot be read.
    pub fn publishes(&self) -> std::io::Result<Vec<AssetPublish>> {
        let dir = self.publish_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let prefix = format!("{}.", self.asset_disk_name());
        let mut publishes = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let matches_extension = path
                .extension()
                .is_some_and(|extension| extension.to_string_lossy() == self.extension);
            let matches_asset = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(&prefix));
            if !(matches_extension && matches_asset) {
                continue;
            }
            if let Some(publish) = AssetPublish::from_path(path) {
                publishes.push(publish);
            }
        }
        publishes.sort_by_key(AssetPublish::version);
        Ok(publishes)
    }

    /// The publish with the highest version.
    ///
    /// # Errors
    ///
    /// Returns an error if the publish directory cannot be read.
    pub fn latest_publish(&self) -> std::io::Result<Option<AssetPublish>> {
        Ok(self.publishes()?.pop())
    }

    /// Path of the first publish.
    #[must_use]
    pub fn first_publish_path(&self) -> PathBuf {
        self.publish_path(FIRST_VERSION)
    }

    /// Path of the publish after the latest one, or of the first publish.
    ///
    /// # Errors
    ///
    /// Returns an error if the publish directory cannot be read.
    pub fn next_publish_path(&self) -> std::io::Result<PathBuf> {
        Ok(match self.latest_publish()? {
            Some(latest) => self.publish_path(latest.version + 1),
            None => self.first_publish_path(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!(parse_version("einar.v003"), Some(3));
        assert_eq!(parse_version("einar.v120.backup"), Some(120));
        assert_eq!(parse_version("einar.v1"), None);
        assert_eq!(parse_version("einar.v0001"), None);
        assert_eq!(parse_version("einar.v1000"), Some(1000));
        assert_eq!(parse_version(&format!("einar.{}", format_version(12345))), Some(12345));
        assert_eq!(parse_version("einar"), None);
        assert_eq!(format_version(7), "v007");
    }

    #[test]
    fn test_publish_paths() {
        let dir = AssetDir::new("/lib/char/einar", "json");
        assert_eq!(dir.asset_disk_name(), "einar");
        assert_eq!(
            dir.first_publish_path(),
            PathBuf::from("/lib/char/einar/publish/einar.v001.json")
        );
        let publish = AssetPublish::from_path(dir.publish_path(12)).unwrap();
        assert_eq!(publish.version_string(), "v012");
        assert_eq!(
            publish.metadata_path(),
            PathBuf::from("/lib/char/einar/publish/einar.v012.xmp")
        );
    }

    #[test]
    fn test_publishes_sorted_and_filtered() {
        let root = tempfile::tempdir().unwrap();
        let dir = AssetDir::new(root.path().join("einar"), "json");
        assert_eq!(dir.latest_publish().unwrap(), None);
        assert_eq!(dir.next_publish_path().unwrap(), dir.first_publish_path());

        std::fs::create_dir_all(dir.publish_dir()).unwrap();
        for name in [
            "einar.v002.json",
            "einar.v010.json",
            "einar.v001.json",
            "einar.v002.xmp",
            "other.v099.json",
            "einar.json",
        ] {
            std::fs::write(dir.publish_dir().join(name), "{}").unwrap();
        }

        let versions: Vec<u32> = dir.publishes().unwrap().iter().map(AssetPublish::version).collect();
        assert_eq!(versions, vec![1, 2, 10]);
        assert_eq!(dir.next_publish_path().unwrap(), dir.publish_path(11));
    }

    #[test]
    fn test_versions_roll_over_past_999() {
        let root = tempfile::tempdir().unwrap();
        let dir = AssetDir::new(root.path().join("einar"), "json");
        std::fs::create_dir_all(dir.publish_dir()).unwrap();
        std::fs::write(dir.publish_path(999), "{}").unwrap();

        let next = dir.next_publish_path().unwrap();
        assert!(next.ends_with("einar.v1000.json"));
        std::fs::write(&next, "{}").unwrap();

        assert_eq!(dir.latest_publish().unwrap().map(|p| p.version()), Some(1000));
        let after = dir.next_publish_path().unwrap();
        assert_ne!(after, next);
        assert!(after.ends_with("einar.v1001.json"));
    }
}
