//! Replication intents attached to every mutation.

use serde::{Deserialize, Serialize};

/// Describes whether a mutation should be observed and propagated.
///
/// `Default` is a request to substitute the emitter's configured intent; it
/// is always resolved to one of the other three before observers see the
/// event. Two distinct resolution rules exist on purpose: component-level
/// emitters fall back to the component's update mode, entity-lifecycle
/// emitters fall back to `Replicate` (entity lifecycle is always
/// network-relevant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AttributeChange {
    /// Use the emitting object's configured default intent.
    #[default]
    Default,
    /// Do not emit any event at all.
    Disconnected,
    /// Emit the event but never replicate over the network.
    LocalOnly,
    /// Emit the event and replicate it.
    Replicate,
}

impl AttributeChange {
    /// Resolves `Default` against `fallback` and suppresses `Disconnected`.
    ///
    /// Returns `None` when no event should be emitted.
    #[must_use]
    pub fn resolved(self, fallback: AttributeChange) -> Option<AttributeChange> {
        let effective = match self {
            AttributeChange::Default => fallback,
            other => other,
        };
        match effective {
            AttributeChange::Disconnected => None,
            AttributeChange::Default => Some(AttributeChange::Replicate),
            other => Some(other),
        }
    }

    /// Resolution rule for entity-lifecycle events (created, removed,
    /// temporary toggled): `Default` becomes `Replicate`.
    #[must_use]
    pub fn resolved_for_entity(self) -> Option<AttributeChange> {
        self.resolved(AttributeChange::Replicate)
    }

    /// Resolution rule for reparenting events: local entities default to
    /// `LocalOnly`, replicated ones to `Replicate`.
    #[must_use]
    pub fn resolved_for_parenting(self, entity_is_local: bool) -> Option<AttributeChange> {
        self.resolved(if entity_is_local {
            AttributeChange::LocalOnly
        } else {
            AttributeChange::Replicate
        })
    }
}
