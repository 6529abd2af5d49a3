//! Change notifications consumed by collaborator modules.
//!
//! Every structural or attribute mutation records a [`SceneEvent`] carrying
//! an already-resolved replication intent (observers never see
//! [`AttributeChange::Default`]). Events are recorded synchronously inside
//! the mutating call, in mutation order; a network synchronizer or renderer
//! drains the queue once per frame.

use crate::action::ExecScope;
use crate::change::AttributeChange;
use crate::ids::{ComponentId, EntityId};

/// A single observed mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// An entity finished construction. Deferred to the end of the frame in
    /// which it was created, so a whole batch of components can be attached
    /// before any observer reacts.
    EntityCreated {
        entity: EntityId,
        change: AttributeChange,
    },
    /// Recorded before the entity's components are detached, so dependents
    /// still see live state during cleanup.
    EntityRemoved {
        entity: EntityId,
        change: AttributeChange,
    },
    /// The authority assigned a final id to a locally created entity.
    EntityAcked { entity: EntityId, old_id: EntityId },
    EntityParentChanged {
        entity: EntityId,
        new_parent: Option<EntityId>,
        change: AttributeChange,
    },
    EntityTemporaryToggled {
        entity: EntityId,
        temporary: bool,
        change: AttributeChange,
    },
    ComponentAdded {
        entity: EntityId,
        component: ComponentId,
        type_id: u32,
        change: AttributeChange,
    },
    /// Recorded before detachment.
    ComponentRemoved {
        entity: EntityId,
        component: ComponentId,
        type_id: u32,
        change: AttributeChange,
    },
    /// The authority assigned a final id to a locally created component.
    ComponentAcked {
        entity: EntityId,
        component: ComponentId,
        old_id: ComponentId,
    },
    AttributeChanged {
        entity: EntityId,
        component: ComponentId,
        attribute: String,
        change: AttributeChange,
    },
    AttributeAdded {
        entity: EntityId,
        component: ComponentId,
        attribute: String,
        change: AttributeChange,
    },
    /// Recorded before the attribute slot is cleared.
    AttributeRemoved {
        entity: EntityId,
        component: ComponentId,
        attribute: String,
        change: AttributeChange,
    },
    ActionTriggered {
        entity: EntityId,
        action: String,
        params: Vec<String>,
        scope: ExecScope,
    },
    /// The whole scene was cleared.
    SceneCleared,
}

/// Ordered queue of pending events.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<SceneEvent>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: SceneEvent) {
        self.events.push(event);
    }

    /// Takes all pending events, leaving the queue empty.
    #[must_use]
    pub fn drain(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, SceneEvent> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_queue() {
        let mut q = EventQueue::new();
        q.push(SceneEvent::SceneCleared);
        q.push(SceneEvent::EntityCreated {
            entity: EntityId(1),
            change: AttributeChange::Replicate,
        });
        let drained = q.drain();
        assert_eq!(drained.len(), 2);
        assert!(q.is_empty());
    }

    #[test]
    fn test_order_preserved() {
        let mut q = EventQueue::new();
        for i in 1..=3 {
            q.push(SceneEvent::EntityRemoved {
                entity: EntityId(i),
                change: AttributeChange::Replicate,
            });
        }
        let ids: Vec<u32> = q
            .drain()
            .into_iter()
            .map(|e| match e {
                SceneEvent::EntityRemoved { entity, .. } => entity.0,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
