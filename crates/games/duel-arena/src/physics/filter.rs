//! Group and category filtering for contact tests.

use duel_core::entity::EntityId;

/// Group value meaning "no group". Entity ids start at 1, so it never
/// collides with a real group.
pub const NO_GROUP: u64 = 0;

pub const DEFAULT_CATEGORY: u32 = 1 << 0;
pub const PROJECTILE_CATEGORY: u32 = 1 << 1;
pub const ALL_CATEGORIES: u32 = u32::MAX;

/// Decides whether two proxies are tested for contact at all.
///
/// Proxies sharing a non-zero `group` never touch. Otherwise each side's
/// `categories` must intersect the other side's `mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionFilter {
    pub group: u64,
    pub categories: u32,
    pub mask: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            group: NO_GROUP,
            categories: DEFAULT_CATEGORY,
            mask: ALL_CATEGORIES,
        }
    }
}

impl CollisionFilter {
    /// An agent shares its group with every projectile it fires.
    pub fn agent(agent_id: EntityId) -> Self {
        Self {
            group: agent_id,
            ..Self::default()
        }
    }

    pub fn projectile(attacker_id: EntityId) -> Self {
        Self {
            group: attacker_id,
            categories: PROJECTILE_CATEGORY,
            mask: ALL_CATEGORIES & !PROJECTILE_CATEGORY,
        }
    }

    pub fn obstacle() -> Self {
        Self::default()
    }

    pub fn rejects(&self, other: &CollisionFilter) -> bool {
        if self.group != NO_GROUP && self.group == other.group {
            return true;
        }
        (self.categories & other.mask) == 0 || (other.categories & self.mask) == 0
    }
}
