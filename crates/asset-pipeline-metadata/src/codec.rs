//! Conversion between metadata records and element trees.
//!
//! Every record lists its fields explicitly. Scalars render as text:
//! booleans as `true`/`false`, paths with forward slashes, statuses by name
//! and timestamps in [`TIME_FORMAT`]. Repeated fields are written as one
//! child element per item. Nested records are looked up among the direct
//! children of their parent only, so a nested record's own `id` or `name`
//! never shadows the parent's.

use crate::element::Element;
use crate::records::{
    AssetStatus, MetadataAsset, MetadataTaskLayer, MetadataTreeAsset, MetadataUser, TIME_FORMAT,
};
use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Tag of the element holding the task layer records of an asset.
pub const TASK_LAYERS_TAG: &str = "task_layers_production";
const FLAG_TAG: &str = "flag";

/// Errors raised while converting between XML and records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerializationError {
    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Xml(String),
    /// The element has an unexpected tag.
    #[error("expected <{expected}> element, found <{found}>")]
    UnexpectedTag {
        /// Tag the record requires
        expected: &'static str,
        /// Tag encountered
        found: String,
    },
    /// A required field element is missing.
    #[error("{record} is missing <{field}>")]
    MissingElement {
        /// Record being read
        record: &'static str,
        /// Missing field
        field: &'static str,
    },
    /// A field holds text that cannot be converted.
    #[error("{record}.{field} has invalid value `{value}`")]
    InvalidValue {
        /// Record being read
        record: &'static str,
        /// Offending field
        field: &'static str,
        /// Offending text
        value: String,
    },
    /// Two task layer records share an id.
    #[error("task layer `{0}` appears more than once")]
    DuplicateTaskLayer(String),
}

/// A record with an element tree representation.
pub trait MetadataElement: Sized {
    /// Tag of the record's own element.
    const TAG: &'static str;

    /// Convert to an element tagged [`Self::TAG`].
    fn to_element(&self) -> Element;

    /// Reconstruct from an element.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or holds an invalid
    /// value.
    fn from_element(element: &Element) -> Result<Self, SerializationError>;
}

fn leaf(tag: &str, text: impl Into<String>) -> Element {
    Element::new(tag).with_text(text)
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn list_element(tag: &str, values: &[String]) -> Element {
    let mut element = Element::new(tag);
    for value in values {
        element.push(leaf(FLAG_TAG, value.as_str()));
    }
    element
}

fn expect_tag(element: &Element, expected: &'static str) -> Result<(), SerializationError> {
    if element.tag == expected {
        Ok(())
    } else {
        Err(SerializationError::UnexpectedTag {
            expected,
            found: element.tag.clone(),
        })
    }
}

fn field<'a>(
    element: &'a Element,
    record: &'static str,
    name: &'static str,
) -> Result<&'a Element, SerializationError> {
    element
        .child(name)
        .ok_or(SerializationError::MissingElement { record, field: name })
}

fn text_field(element: &Element, record: &'static str, name: &'static str) -> Result<String, SerializationError> {
    field(element, record, name).map(|child| child.text().to_string())
}

fn bool_field(element: &Element, record: &'static str, name: &'static str) -> Result<bool, SerializationError> {
    match field(element, record, name)?.text() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(SerializationError::InvalidValue {
            record,
            field: name,
            value: other.to_string(),
        }),
    }
}

fn time_field(
    element: &Element,
    record: &'static str,
    name: &'static str,
) -> Result<NaiveDateTime, SerializationError> {
    let text = field(element, record, name)?.text();
    NaiveDateTime::parse_from_str(text, TIME_FORMAT).map_err(|_| SerializationError::InvalidValue {
        record,
        field: name,
        value: text.to_string(),
    })
}

/// Repeated fields are optional; a missing element reads as empty.
fn list_field(element: &Element, name: &'static str) -> Vec<String> {
    element.child(name).map_or_else(Vec::new, |list| {
        list.children_named(FLAG_TAG)
            .map(|item| item.text().to_string())
            .collect()
    })
}

impl MetadataElement for MetadataUser {
    const TAG: &'static str = "User";

    fn to_element(&self) -> Element {
        let mut element = Element::new(Self::TAG);
        element.push(leaf("id", self.id.as_str()));
        element.push(leaf("first_name", self.first_name.as_str()));
        element.push(leaf("last_name", self.last_name.as_str()));
        element.push(leaf("full_name", self.full_name.as_str()));
        element
    }

    fn from_element(element: &Element) -> Result<Self, SerializationError> {
        const RECORD: &str = "MetadataUser";
        Ok(Self {
            id: text_field(element, RECORD, "id")?,
            first_name: text_field(element, RECORD, "first_name")?,
            last_name: text_field(element, RECORD, "last_name")?,
            full_name: text_field(element, RECORD, "full_name")?,
        })
    }
}

impl MetadataElement for MetadataTaskLayer {
    const TAG: &'static str = "TaskLayer";

    fn to_element(&self) -> Element {
        let mut element = Element::new(Self::TAG).with_attribute("id", self.id.as_str());
        element.push(leaf("id", self.id.as_str()));
        element.push(leaf("name", self.name.as_str()));
        element.push(leaf("source_path", path_text(&self.source_path)));
        element.push(leaf("source_revision", self.source_revision.as_str()));
        element.push(leaf("is_locked", bool_text(self.is_locked)));
        element.push(leaf("created_at", self.created_at.format(TIME_FORMAT).to_string()));
        element.push(leaf("updated_at", self.updated_at.format(TIME_FORMAT).to_string()));
        let mut author = self.author.to_element();
        author.tag = "author".to_string();
        element.push(author);
        element.push(leaf("software_hash", self.software_hash.as_str()));
        element.push(leaf("hostname", self.hostname.as_str()));
        element.push(list_element("flags", &self.flags));
        element
    }

    fn from_element(element: &Element) -> Result<Self, SerializationError> {
        const RECORD: &str = "MetadataTaskLayer";
        expect_tag(element, Self::TAG)?;
        Ok(Self {
            id: text_field(element, RECORD, "id")?,
            name: text_field(element, RECORD, "name")?,
            source_path: PathBuf::from(text_field(element, RECORD, "source_path")?),
            source_revision: text_field(element, RECORD, "source_revision")?,
            is_locked: bool_field(element, RECORD, "is_locked")?,
            created_at: time_field(element, RECORD, "created_at")?,
            updated_at: time_field(element, RECORD, "updated_at")?,
            author: MetadataUser::from_element(field(element, RECORD, "author")?)?,
            software_hash: text_field(element, RECORD, "software_hash")?,
            hostname: text_field(element, RECORD, "hostname")?,
            flags: list_field(element, "flags"),
        })
    }
}

impl MetadataElement for MetadataAsset {
    const TAG: &'static str = "Asset";

    fn to_element(&self) -> Element {
        let mut element = Element::new(Self::TAG).with_attribute("id", self.id.as_str());
        element.push(leaf("name", self.name.as_str()));
        element.push(leaf("parent_id", self.parent_id.as_str()));
        element.push(leaf("parent_name", self.parent_name.as_str()));
        element.push(leaf("project_id", self.project_id.as_str()));
        element.push(leaf("version", self.version.as_str()));
        element.push(leaf("status", self.status.name()));
        element.push(leaf("id", self.id.as_str()));
        element.push(list_element("flags", &self.flags));
        element
    }

    fn from_element(element: &Element) -> Result<Self, SerializationError> {
        const RECORD: &str = "MetadataAsset";
        expect_tag(element, Self::TAG)?;
        let status_text = field(element, RECORD, "status")?.text();
        let status = status_text
            .parse::<AssetStatus>()
            .map_err(|_| SerializationError::InvalidValue {
                record: RECORD,
                field: "status",
                value: status_text.to_string(),
            })?;
        Ok(Self {
            name: text_field(element, RECORD, "name")?,
            parent_id: text_field(element, RECORD, "parent_id")?,
            parent_name: text_field(element, RECORD, "parent_name")?,
            project_id: text_field(element, RECORD, "project_id")?,
            version: text_field(element, RECORD, "version")?,
            status,
            id: text_field(element, RECORD, "id")?,
            flags: list_field(element, "flags"),
        })
    }
}

impl MetadataElement for MetadataTreeAsset {
    const TAG: &'static str = MetadataAsset::TAG;

    fn to_element(&self) -> Element {
        let mut element = self.asset.to_element();
        let mut layers = Element::new(TASK_LAYERS_TAG);
        for layer in &self.task_layers {
            layers.push(layer.to_element());
        }
        element.push(layers);
        element
    }

    fn from_element(element: &Element) -> Result<Self, SerializationError> {
        let asset = MetadataAsset::from_element(element)?;
        let layers = field(element, "MetadataTreeAsset", TASK_LAYERS_TAG)?;
        let mut seen = BTreeSet::new();
        let mut task_layers = Vec::new();
        for child in layers.children_named(MetadataTaskLayer::TAG) {
            let layer = MetadataTaskLayer::from_element(child)?;
            if !seen.insert(layer.id.clone()) {
                return Err(SerializationError::DuplicateTaskLayer(layer.id));
            }
            task_layers.push(layer);
        }
        Ok(Self { asset, task_layers })
    }
}

/// Render a metadata tree as an XML document.
///
/// # Errors
///
/// Returns an error if the writer fails.
pub fn to_xml_string(tree: &MetadataTreeAsset) -> Result<String, SerializationError> {
    tree.to_element().to_xml_string()
}

/// Parse a metadata tree from an XML document.
///
/// # Errors
///
/// Returns an error for malformed XML or a record that cannot be
/// reconstructed.
pub fn from_xml_str(xml: &str) -> Result<MetadataTreeAsset, SerializationError> {
    MetadataTreeAsset::from_element(&Element::from_xml_str(xml)?)
}
