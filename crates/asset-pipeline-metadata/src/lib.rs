//! # Asset Pipeline Metadata
//!
//! Records persisted next to every publish of an asset.
//!
//! ## Records
//!
//! - `MetadataAsset`: asset identity, version and status
//! - `MetadataTaskLayer`: per-layer provenance and lock state
//! - `MetadataTreeAsset`: one asset record plus its task layer records
//!
//! ## Sidecar files
//!
//! Each publish `{asset}/publish/{asset}.v###.{ext}` has a sidecar
//! `{asset}.v###.xmp` holding one `MetadataTreeAsset` as pretty-printed XML.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod element;
pub mod publish;
pub mod records;
pub mod store;

pub use codec::{MetadataElement, SerializationError};
pub use element::Element;
pub use publish::{AssetDir, AssetPublish};
pub use records::{
    AssetStatus, MetadataAsset, MetadataTaskLayer, MetadataTreeAsset, MetadataUser, NIL_ID,
};
pub use store::{load_metadata, write_metadata, StoreError};
