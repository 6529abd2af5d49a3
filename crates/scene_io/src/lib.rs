//! Scene persistence: the format-agnostic scene description tree and the
//! XML and binary codecs built on it.
//!
//! Loading follows one algorithm regardless of source format: parse the
//! document into a [`SceneDesc`], then instantiate it through
//! [`create_content_from_desc`]. Saving serializes straight from the live
//! [`Scene`](scene_core::Scene).

mod binary;
mod content;
mod desc;
mod xml;

pub use binary::{load_binary, scene_desc_from_binary, to_binary};
pub use content::{create_content_from_desc, LoadError};
pub use desc::{sort_entity_descs, AssetDesc, AttributeDesc, ComponentDesc, EntityDesc, SceneDesc};
pub use xml::{load_xml, scene_desc_from_xml, to_xml_string};
