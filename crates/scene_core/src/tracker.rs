//! Reconciliation of parent references after server id assignment.
//!
//! On a client, a batch-imported subtree is first assigned unacked ids; the
//! authority later renumbers every entity. Parent-reference attributes
//! recorded against the old unacked ids become stale the moment the new ids
//! arrive. The tracker collects the old→new mapping while acks stream in and
//! reports when the whole batch is known, at which point the scene rewrites
//! the stale references in one pass.
//!
//! One tracker handles one import epoch at a time: new imports must refuse
//! to start while [`ParentingTracker::is_tracking`] reports an outstanding
//! reconciliation, to avoid interleaving two independent remapping epochs.

use std::collections::HashMap;

use tracing::debug;

use crate::ids::EntityId;

/// Tracks unacked entity ids of one import until the authority has
/// acknowledged them all.
#[derive(Debug, Default)]
pub struct ParentingTracker {
    unacked: Vec<EntityId>,
    unacked_to_acked: HashMap<EntityId, EntityId>,
}

impl ParentingTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a reconciliation is outstanding.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        !self.unacked.is_empty()
    }

    /// Registers an entity's current (unacked) id as pending. Must be called
    /// after the entity is created and before the authority acks it.
    pub fn track(&mut self, entity: EntityId) {
        debug!(entity = %entity, "tracking unacked id");
        self.unacked.push(entity);
    }

    /// Records an acknowledgment. Returns `true` when this ack drained the
    /// pending set, i.e. new ids for every tracked entity are now known and
    /// the caller should run the parent-reference fix-up.
    pub fn ack(&mut self, new_id: EntityId, old_id: EntityId) -> bool {
        if !self.unacked.contains(&old_id) {
            return false;
        }
        self.unacked.retain(|id| *id != old_id);
        self.unacked_to_acked.insert(old_id, new_id);
        self.unacked.is_empty()
    }

    /// Takes the completed old→new mapping, resetting the tracker for the
    /// next import epoch.
    #[must_use]
    pub fn take_mapping(&mut self) -> HashMap<EntityId, EntityId> {
        std::mem::take(&mut self.unacked_to_acked)
    }
}
