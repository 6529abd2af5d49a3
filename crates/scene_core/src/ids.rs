//! Entity and component identity.
//!
//! Every entity and every component carries a 32-bit unsigned id partitioned
//! into three disjoint ranges:
//!
//! - *replicated*: `1 ..= 0x3FFF_FFFF` — authoritative ids assigned by the
//!   scene authority (server or standalone process).
//! - *unacked*: `0x4000_0000 ..= 0x7FFF_FFFF` — a sub-band of the replicated
//!   half used by a client for objects it created locally and that are
//!   pending renumbering by the authority.
//! - *local*: `0x8000_0000 ..= 0xFFFF_FFFF` — never sent over the network,
//!   meaningful only within one process.

use serde::{Deserialize, Serialize};

/// First id of the replicated range. Id 0 is the "unassigned" sentinel.
pub const FIRST_REPLICATED_ID: u32 = 1;
/// First id of the unacked sub-band.
pub const FIRST_UNACKED_ID: u32 = 0x4000_0000;
/// First id of the local range.
pub const FIRST_LOCAL_ID: u32 = 0x8000_0000;

/// A unique entity identifier within one [`Scene`](crate::Scene).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct EntityId(pub u32);

/// A component identifier, unique within its parent entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ComponentId(pub u32);

macro_rules! id_common {
    ($ty:ident) => {
        impl $ty {
            /// The "unassigned" sentinel.
            pub const ZERO: $ty = $ty(0);

            #[must_use]
            pub const fn value(self) -> u32 {
                self.0
            }

            /// True for a non-zero id.
            #[must_use]
            pub const fn is_assigned(self) -> bool {
                self.0 != 0
            }

            /// True if the id lies in the local (never replicated) range.
            #[must_use]
            pub const fn is_local(self) -> bool {
                self.0 >= FIRST_LOCAL_ID
            }

            /// True if the id lies in the replicated half, including the
            /// unacked sub-band.
            #[must_use]
            pub const fn is_replicated(self) -> bool {
                self.0 != 0 && self.0 < FIRST_LOCAL_ID
            }

            /// True if the id is pending acknowledgment by the authority.
            #[must_use]
            pub const fn is_unacked(self) -> bool {
                self.0 >= FIRST_UNACKED_ID && self.0 < FIRST_LOCAL_ID
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $ty {
            fn from(raw: u32) -> Self {
                $ty(raw)
            }
        }
    };
}

id_common!(EntityId);
id_common!(ComponentId);

/// Issues unused ids in the three ranges.
///
/// The allocator only tracks cursors; the caller supplies an `in_use` check so
/// that ids observed from external sources (files, the network) are never
/// handed out twice. Range exhaustion is not handled: the ranges are a
/// billion ids wide and a live scene never approaches that.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    replicated: u32,
    unacked: u32,
    local: u32,
}

impl IdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            replicated: FIRST_REPLICATED_ID - 1,
            unacked: FIRST_UNACKED_ID - 1,
            local: FIRST_LOCAL_ID - 1,
        }
    }

    /// Next unused replicated-range id.
    pub fn allocate_replicated(&mut self, mut in_use: impl FnMut(u32) -> bool) -> u32 {
        loop {
            self.replicated = self.replicated.wrapping_add(1);
            if self.replicated == 0 || self.replicated >= FIRST_UNACKED_ID {
                self.replicated = FIRST_REPLICATED_ID;
            }
            if !in_use(self.replicated) {
                return self.replicated;
            }
        }
    }

    /// Next unused unacked-range id.
    pub fn allocate_unacked(&mut self, mut in_use: impl FnMut(u32) -> bool) -> u32 {
        loop {
            self.unacked = self.unacked.wrapping_add(1);
            if !(FIRST_UNACKED_ID..FIRST_LOCAL_ID).contains(&self.unacked) {
                self.unacked = FIRST_UNACKED_ID;
            }
            if !in_use(self.unacked) {
                return self.unacked;
            }
        }
    }

    /// Next unused local-range id.
    pub fn allocate_local(&mut self, mut in_use: impl FnMut(u32) -> bool) -> u32 {
        loop {
            self.local = self.local.wrapping_add(1);
            if self.local < FIRST_LOCAL_ID {
                self.local = FIRST_LOCAL_ID;
            }
            if !in_use(self.local) {
                return self.local;
            }
        }
    }

    /// Advances the replicated cursor to at least `high_water`.
    ///
    /// Called whenever a replicated-range id is assigned out-of-band (loaded
    /// from a file or specified by a caller) so that later auto-allocation
    /// never collides with it.
    pub fn reset_replicated(&mut self, high_water: u32) {
        if high_water > self.replicated && high_water < FIRST_UNACKED_ID {
            self.replicated = high_water;
        }
    }

    /// Restores the allocator to its initial state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_are_disjoint() {
        let mut alloc = IdAllocator::new();
        let r = alloc.allocate_replicated(|_| false);
        let u = alloc.allocate_unacked(|_| false);
        let l = alloc.allocate_local(|_| false);
        assert_eq!(r, FIRST_REPLICATED_ID);
        assert_eq!(u, FIRST_UNACKED_ID);
        assert_eq!(l, FIRST_LOCAL_ID);
        assert!(EntityId(r).is_replicated() && !EntityId(r).is_unacked());
        assert!(EntityId(u).is_unacked() && EntityId(u).is_replicated());
        assert!(EntityId(l).is_local() && !EntityId(l).is_replicated());
    }

    #[test]
    fn test_in_use_skipped() {
        let mut alloc = IdAllocator::new();
        let taken = [1u32, 2, 3];
        let id = alloc.allocate_replicated(|id| taken.contains(&id));
        assert_eq!(id, 4);
    }

    #[test]
    fn test_reset_replicated_advances_cursor() {
        let mut alloc = IdAllocator::new();
        alloc.reset_replicated(100);
        assert_eq!(alloc.allocate_replicated(|_| false), 101);
        // Never moves backwards.
        alloc.reset_replicated(50);
        assert_eq!(alloc.allocate_replicated(|_| false), 102);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut alloc = IdAllocator::new();
        alloc.allocate_replicated(|_| false);
        alloc.allocate_local(|_| false);
        alloc.reset();
        assert_eq!(alloc.allocate_replicated(|_| false), FIRST_REPLICATED_ID);
        assert_eq!(alloc.allocate_local(|_| false), FIRST_LOCAL_ID);
    }

    #[test]
    fn test_zero_is_unassigned() {
        assert!(!EntityId::ZERO.is_assigned());
        assert!(!EntityId::ZERO.is_replicated());
        assert!(!EntityId::ZERO.is_local());
    }
}
