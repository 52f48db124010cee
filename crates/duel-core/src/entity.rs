use serde::{Deserialize, Serialize};

use crate::constants;
use crate::math::Vec2;

/// Unique, never reused identifier for every simulated thing, boundary walls included.
pub type EntityId = u64;

/// Discriminator for the three kinds of simulated entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Agent,
    Projectile,
    Obstacle,
}

/// State shared by everything that moves.
pub trait DynamicState {
    fn id(&self) -> EntityId;
    fn position(&self) -> Vec2;
    fn velocity(&self) -> Vec2;
    fn set_position(&mut self, position: Vec2);
    fn set_velocity(&mut self, velocity: Vec2);
}

/// A competing agent. Exactly one exists per player for the whole match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Commanded heading in degrees. Survives a zero velocity.
    pub angle: f32,
    pub health: u32,
    pub shield_enabled: bool,
}

impl AgentState {
    pub fn new(id: EntityId, position: Vec2) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            angle: 0.0,
            health: constants::agent::MAX_HEALTH,
            shield_enabled: false,
        }
    }

    /// Subtract `amount` from health, saturating at zero.
    pub fn apply_damage(&mut self, amount: u32) {
        self.health = self.health.saturating_sub(amount);
    }

    pub fn is_eliminated(&self) -> bool {
        self.health == 0
    }
}

impl DynamicState for AgentState {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn velocity(&self) -> Vec2 {
        self.velocity
    }

    fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }
}

/// A shot in flight. Destroyed on its first qualifying contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileState {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Agent that fired this projectile. Fixed at creation.
    pub attacker_id: EntityId,
}

impl ProjectileState {
    pub fn new(id: EntityId, position: Vec2, direction: f32, attacker_id: EntityId) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::from_angle_magnitude(direction, constants::combat::PROJECTILE_SPEED),
            attacker_id,
        }
    }
}

impl DynamicState for ProjectileState {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn velocity(&self) -> Vec2 {
        self.velocity
    }

    fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }
}

/// Static axis-aligned rectangle. `position` is its center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: EntityId,
    pub position: Vec2,
    pub width: f32,
    pub height: f32,
}

impl Obstacle {
    pub fn new(id: EntityId, position: Vec2, width: f32, height: f32) -> Self {
        Self {
            id,
            position,
            width,
            height,
        }
    }

    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}
