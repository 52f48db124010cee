//! Shared types for the duel arena: vector math, entity state, fixed
//! arena constants and the viewer wire protocol.

pub mod constants;
pub mod entity;
pub mod math;
pub mod net;
pub mod outcome;

pub use entity::{AgentState, DynamicState, EntityId, EntityKind, Obstacle, ProjectileState};
pub use math::Vec2;
