//! Per-agent timers, movement API and the player-overridable behavior hooks.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use duel_core::constants::{agent, combat, shield, timing};
use duel_core::entity::{AgentState, EntityId, Obstacle};
use duel_core::math::Vec2;

use crate::physics::shape::circle_facing_rect;

/// Slack for the contact-distance test in velocity clipping.
const CONTACT_TOLERANCE: f32 = 0.5;

/// Error raised by a behavior hook. Ends the match on the fault path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "behavior panicked".to_string()
        };
        Self(message)
    }
}

impl std::fmt::Display for HookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HookError {}

pub type HookResult = Result<(), HookError>;

/// Player-supplied agent logic.
///
/// Every hook receives an [`AgentApi`] scoped to the calling agent. Returning
/// an error, or panicking, faults the agent.
pub trait Behavior: Send {
    /// Name reported in results when the match config does not override it.
    fn name(&self) -> &str {
        "Agent"
    }

    /// Called once per tick after timers advance.
    fn run(&mut self, agent: &mut AgentApi<'_>) -> HookResult;

    fn on_enemy_scanned(&mut self, _agent: &mut AgentApi<'_>, _position: Vec2) -> HookResult {
        Ok(())
    }

    fn on_obstacle_scanned(
        &mut self,
        _agent: &mut AgentApi<'_>,
        _obstacle: &Obstacle,
    ) -> HookResult {
        Ok(())
    }

    fn on_damage_taken(&mut self, _agent: &mut AgentApi<'_>) -> HookResult {
        Ok(())
    }

    fn on_obstacle_hit(&mut self, _agent: &mut AgentApi<'_>) -> HookResult {
        Ok(())
    }
}

/// Run a hook, turning a panic into a [`HookError`].
pub fn guard_hook(hook: impl FnOnce() -> HookResult) -> HookResult {
    catch_unwind(AssertUnwindSafe(hook)).unwrap_or_else(|payload| Err(HookError::from_panic(payload)))
}

/// A projectile an agent asked for. The match assigns its id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRequest {
    pub position: Vec2,
    pub direction: f32,
    pub attacker_id: EntityId,
}

/// An obstacle an agent is touching.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleContact {
    pub obstacle: Obstacle,
    /// Point on the agent's surface facing the obstacle. Refreshed on every
    /// clip so it follows the agent while it slides.
    pub point: Vec2,
}

/// Engine-side state of one agent.
#[derive(Debug, Clone)]
pub struct AgentController {
    pub(crate) state: AgentState,
    name: String,
    shield_time: f32,
    shield_cooldown: f32,
    attack_cooldown: f32,
    /// Obstacles currently touched.
    collisions: BTreeMap<EntityId, ObstacleContact>,
}

impl AgentController {
    pub fn new(state: AgentState, name: impl Into<String>) -> Self {
        Self {
            state,
            name: name.into(),
            shield_time: 0.0,
            shield_cooldown: 0.0,
            attack_cooldown: 0.0,
            collisions: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shield_time(&self) -> f32 {
        self.shield_time
    }

    pub fn shield_cooldown(&self) -> f32 {
        self.shield_cooldown
    }

    pub fn attack_cooldown(&self) -> f32 {
        self.attack_cooldown
    }

    pub fn tracked_collisions(&self) -> &BTreeMap<EntityId, ObstacleContact> {
        &self.collisions
    }

    pub fn activate_shield(&mut self) {
        if self.state.shield_enabled || self.shield_cooldown > 0.0 {
            return;
        }
        self.state.shield_enabled = true;
        self.shield_time = shield::ACTIVE_DURATION;
    }

    pub fn deactivate_shield(&mut self) {
        if !self.state.shield_enabled {
            return;
        }
        self.state.shield_enabled = false;
        self.shield_cooldown = shield::COOLDOWN;
    }

    fn speed_cap(&self) -> f32 {
        if self.attack_cooldown > 0.0 {
            agent::ATTACK_MAX_SPEED
        } else {
            agent::MAX_SPEED
        }
    }

    pub fn set_movement_speed(&mut self, speed: f32) {
        // f32::max maps NaN to 0
        let speed = speed.max(0.0).min(self.speed_cap());
        self.state.velocity = Vec2::from_angle_magnitude(self.state.angle, speed);
    }

    pub fn set_movement_direction(&mut self, angle: f32) {
        if !angle.is_finite() {
            return;
        }
        self.state.angle = angle;
        self.state.velocity = Vec2::from_angle_magnitude(angle, self.state.velocity.magnitude());
    }

    /// Fire toward `direction` degrees. Returns whether a shot was queued.
    pub fn attack_ranged(&mut self, direction: f32, spawns: &mut Vec<SpawnRequest>) -> bool {
        if self.attack_cooldown > 0.0 || !direction.is_finite() {
            return false;
        }
        self.attack_cooldown = combat::ATTACK_COOLDOWN;
        spawns.push(SpawnRequest {
            position: self.state.position,
            direction,
            attacker_id: self.state.id,
        });
        if self.state.velocity.magnitude() > agent::ATTACK_MAX_SPEED {
            self.state.velocity =
                Vec2::from_angle_magnitude(self.state.angle, agent::ATTACK_MAX_SPEED);
        }
        true
    }

    pub(crate) fn add_collision(&mut self, obstacle: &Obstacle, contact: Vec2) {
        self.collisions.insert(
            obstacle.id,
            ObstacleContact {
                obstacle: obstacle.clone(),
                point: contact,
            },
        );
    }

    pub(crate) fn remove_collision(&mut self, obstacle_id: EntityId) {
        self.collisions.remove(&obstacle_id);
    }

    /// Timer phase of the per-tick update.
    pub(crate) fn advance_timers(&mut self) {
        let dec = timing::TICK_DT;
        if self.state.shield_enabled {
            self.shield_time = (self.shield_time - dec).max(0.0);
            if self.shield_time <= 0.0 {
                self.deactivate_shield();
            }
        } else {
            self.shield_cooldown = (self.shield_cooldown - dec).max(0.0);
        }
        self.attack_cooldown = (self.attack_cooldown - dec).max(0.0);
    }

    /// Zero each velocity component that points back into a touched obstacle.
    ///
    /// Face contacts block one axis. A corner contact blocks no axis, so the
    /// part of the velocity along the contact normal is removed instead.
    pub(crate) fn clip_velocity(&mut self) {
        let pos = self.state.position;
        let reach = agent::RADIUS - CONTACT_TOLERANCE;
        let v = &mut self.state.velocity;
        for contact in self.collisions.values_mut() {
            contact.point = circle_facing_rect(
                pos,
                agent::RADIUS,
                contact.obstacle.position,
                contact.obstacle.half_extents(),
            );
            let offset = contact.point - pos;
            let blocks_x = offset.x.abs() >= reach;
            let blocks_y = offset.y.abs() >= reach;
            if blocks_x && v.x != 0.0 && v.x.signum() == offset.x.signum() {
                v.x = 0.0;
            }
            if blocks_y && v.y != 0.0 && v.y.signum() == offset.y.signum() {
                v.y = 0.0;
            }
            if !blocks_x && !blocks_y {
                let normal = offset.normalize_or_zero();
                let into = v.dot(normal);
                if into > 0.0 {
                    *v = *v - normal * into;
                }
            }
        }
    }

    /// Full per-tick update: timers, `run`, then velocity clipping.
    pub fn tick(
        &mut self,
        behavior: &mut dyn Behavior,
        others: &[AgentState],
        spawns: &mut Vec<SpawnRequest>,
    ) -> HookResult {
        self.advance_timers();
        let result = {
            let mut api = AgentApi::new(self, others, spawns);
            guard_hook(|| behavior.run(&mut api))
        };
        self.clip_velocity();
        result
    }
}

/// The calls available to behavior code, scoped to one agent for one hook call.
pub struct AgentApi<'a> {
    controller: &'a mut AgentController,
    others: &'a [AgentState],
    spawns: &'a mut Vec<SpawnRequest>,
}

impl<'a> AgentApi<'a> {
    pub fn new(
        controller: &'a mut AgentController,
        others: &'a [AgentState],
        spawns: &'a mut Vec<SpawnRequest>,
    ) -> Self {
        Self {
            controller,
            others,
            spawns,
        }
    }

    pub fn id(&self) -> EntityId {
        self.controller.state.id
    }

    pub fn get_health(&self) -> u32 {
        self.controller.state.health
    }

    pub fn get_position(&self) -> Vec2 {
        self.controller.state.position
    }

    /// Positions of every other agent, in world order.
    pub fn get_agents_position(&self) -> Vec<Vec2> {
        self.others.iter().map(|a| a.position).collect()
    }

    /// Health of every other agent, in world order.
    pub fn get_agents_health(&self) -> Vec<u32> {
        self.others.iter().map(|a| a.health).collect()
    }

    pub fn is_shield_activated(&self) -> bool {
        self.controller.state.shield_enabled
    }

    pub fn activate_shield(&mut self) {
        self.controller.activate_shield();
    }

    pub fn deactivate_shield(&mut self) {
        self.controller.deactivate_shield();
    }

    pub fn get_shield_time(&self) -> f32 {
        self.controller.shield_time
    }

    pub fn get_shield_cooldown_time(&self) -> f32 {
        self.controller.shield_cooldown
    }

    pub fn get_attack_cooldown_time(&self) -> f32 {
        self.controller.attack_cooldown
    }

    pub fn attack_ranged(&mut self, direction: f32) -> bool {
        self.controller.attack_ranged(direction, self.spawns)
    }

    pub fn set_movement_speed(&mut self, speed: f32) {
        self.controller.set_movement_speed(speed);
    }

    pub fn set_movement_direction(&mut self, angle: f32) {
        self.controller.set_movement_direction(angle);
    }

    pub fn get_movement_speed(&self) -> f32 {
        self.controller.state.velocity.magnitude()
    }

    /// Commanded heading in degrees.
    pub fn get_movement_direction(&self) -> f32 {
        self.controller.state.angle
    }
}
