//! Replicable entity-component scene graph.
//!
//! A [`Scene`] is a registry of [`Entity`] objects, each holding a set of
//! [`Component`]s, each holding typed [`Attribute`] cells. The scene can be
//! built up and mutated by any number of collaborator modules (rendering,
//! scripting, network sync); every mutation records a [`SceneEvent`] carrying
//! a replication intent, which collaborators drain once per frame to decide
//! what to propagate.
//!
//! Identity is a 32-bit id space partitioned into three ranges (replicated,
//! local, unacked-pending) so that server-assigned, purely-local and
//! awaiting-acknowledgment objects can never collide. When a server
//! acknowledges locally created entities under new ids, the
//! [`ParentingTracker`] rewrites any parent references that were recorded
//! against the old pending ids.
//!
//! All mutation happens on one logical thread; there is no internal locking.
//! The embedding application drives deferred work (end-of-frame creation
//! events, attribute interpolation) through [`Scene::update`].

mod action;
mod attribute;
mod change;
mod component;
mod entity;
mod events;
mod ids;
mod registry;
mod scene;
mod tracker;
pub mod wire;

pub use action::{EntityAction, ExecScope};
pub use attribute::{
    attribute_type_names, AssetReference, AssetReferenceList, Attribute, AttributeError,
    AttributeMetadata, AttributeSpec, AttributeTypeId, AttributeValue, EntityReference,
    InterpolationMode, Variant,
};
pub use change::AttributeChange;
pub use component::{
    AttributeUpdate, Component, ComponentError, ComponentStructure, DYNAMIC_COMPONENT_TYPE_ID,
    NAME_COMPONENT_TYPE_ID,
};
pub use entity::Entity;
pub use events::{EventQueue, SceneEvent};
pub use ids::{ComponentId, EntityId, IdAllocator};
pub use registry::{
    ComponentRegistry, ComponentTypeDef, PlaceholderAttr, PlaceholderDef, RegistryError,
};
pub use scene::{Scene, SceneError};
pub use tracker::ParentingTracker;

pub use scene_math::{Color, Transform};
