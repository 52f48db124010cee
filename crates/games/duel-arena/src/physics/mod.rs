//! Kinematic collision world for agents, projectiles and static obstacles.
//!
//! Proxies never respond to forces. Game logic writes velocities into the
//! entity states, [`PhysicsEngine::step`] copies them in, integrates, reports
//! contact begin/separate events through the registered callbacks, and writes
//! positions and velocities back.

pub mod filter;
pub mod shape;

use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;

use duel_core::constants::{agent, combat};
use duel_core::entity::{AgentState, EntityId, EntityKind, Obstacle, ProjectileState};
use duel_core::math::Vec2;

pub use filter::CollisionFilter;
pub use shape::Shape;

/// Upper bound on substeps per `step` call.
const MAX_SUBSTEPS: usize = 32;

/// Largest distance a proxy may travel in one substep.
const MAX_SUBSTEP_TRAVEL: f32 = combat::PROJECTILE_RADIUS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicsError {
    DuplicateId(EntityId),
}

impl std::fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "entity {id} is already registered"),
        }
    }
}

impl std::error::Error for PhysicsError {}

/// Id and kind of a proxy, as handed to callbacks and scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyRef {
    pub id: EntityId,
    pub kind: EntityKind,
}

/// A collision proxy. Holds its entity id so lookups go both ways.
#[derive(Debug, Clone)]
pub struct Body {
    pub id: EntityId,
    pub kind: EntityKind,
    pub shape: Shape,
    pub filter: CollisionFilter,
    pub position: Vec2,
    pub velocity: Vec2,
    pub is_static: bool,
}

impl Body {
    pub fn body_ref(&self) -> BodyRef {
        BodyRef {
            id: self.id,
            kind: self.kind,
        }
    }
}

/// Where the world reads commanded velocities from and writes results to.
pub trait EntityStates {
    /// Current velocity of a dynamic entity, or `None` if the state is gone.
    fn velocity(&self, id: EntityId) -> Option<Vec2>;

    fn sync(&mut self, id: EntityId, position: Vec2, velocity: Vec2);
}

/// Removals requested by callbacks during a step. Staged proxies take no
/// further part in the step and are detached once it finishes.
#[derive(Debug, Default)]
pub struct StepCommands {
    removed: BTreeSet<EntityId>,
}

impl StepCommands {
    pub fn remove(&mut self, id: EntityId) {
        self.removed.insert(id);
    }

    pub fn is_removed(&self, id: EntityId) -> bool {
        self.removed.contains(&id)
    }
}

pub type CollisionCallback<C> =
    Box<dyn FnMut(&mut C, &mut StepCommands, BodyRef, BodyRef, Vec2) + Send>;
pub type SeparateCallback<C> = Box<dyn FnMut(&mut C, &mut StepCommands, BodyRef, BodyRef) + Send>;

/// Scan results. Two agents plus a handful of nearby walls fit inline.
pub type ScanHits = SmallVec<[BodyRef; 8]>;

pub struct PhysicsEngine<C> {
    bodies: BTreeMap<EntityId, Body>,
    /// Dynamic proxies whose state is synced each step.
    tracked: Vec<EntityId>,
    /// Pairs `(low id, high id)` currently overlapping.
    active: BTreeSet<(EntityId, EntityId)>,
    on_collision: Option<CollisionCallback<C>>,
    on_separate: Option<SeparateCallback<C>>,
}

impl<C> Default for PhysicsEngine<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> PhysicsEngine<C> {
    pub fn new() -> Self {
        Self {
            bodies: BTreeMap::new(),
            tracked: Vec::new(),
            active: BTreeSet::new(),
            on_collision: None,
            on_separate: None,
        }
    }

    pub fn add_agent(&mut self, state: &AgentState) -> Result<(), PhysicsError> {
        self.insert(Body {
            id: state.id,
            kind: EntityKind::Agent,
            shape: Shape::Circle {
                radius: agent::RADIUS,
            },
            filter: CollisionFilter::agent(state.id),
            position: state.position,
            velocity: state.velocity,
            is_static: false,
        })
    }

    pub fn add_projectile(&mut self, state: &ProjectileState) -> Result<(), PhysicsError> {
        self.insert(Body {
            id: state.id,
            kind: EntityKind::Projectile,
            shape: Shape::Circle {
                radius: combat::PROJECTILE_RADIUS,
            },
            filter: CollisionFilter::projectile(state.attacker_id),
            position: state.position,
            velocity: state.velocity,
            is_static: false,
        })
    }

    pub fn add_obstacle(&mut self, obstacle: &Obstacle) -> Result<(), PhysicsError> {
        self.insert(Body {
            id: obstacle.id,
            kind: EntityKind::Obstacle,
            shape: Shape::rect(obstacle.width, obstacle.height),
            filter: CollisionFilter::obstacle(),
            position: obstacle.position,
            velocity: Vec2::ZERO,
            is_static: true,
        })
    }

    fn insert(&mut self, body: Body) -> Result<(), PhysicsError> {
        if self.bodies.contains_key(&body.id) {
            return Err(PhysicsError::DuplicateId(body.id));
        }
        if !body.is_static {
            self.tracked.push(body.id);
        }
        self.bodies.insert(body.id, body);
        Ok(())
    }

    /// Detach the proxy for `id`. Returns whether it existed.
    pub fn remove_object(&mut self, id: EntityId) -> bool {
        if self.bodies.remove(&id).is_none() {
            return false;
        }
        self.active.retain(|&(a, b)| a != id && b != id);
        true
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.bodies.contains_key(&id)
    }

    pub fn body(&self, id: EntityId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Ids of the dynamic proxies that were live after the last step.
    pub fn tracked(&self) -> &[EntityId] {
        &self.tracked
    }

    /// Replace the begin-contact handler.
    pub fn add_on_collision_callback(&mut self, callback: CollisionCallback<C>) {
        self.on_collision = Some(callback);
    }

    /// Replace the end-contact handler.
    pub fn add_on_separate_callback(&mut self, callback: SeparateCallback<C>) {
        self.on_separate = Some(callback);
    }

    /// Every proxy intersecting the circle `(position, radius)`, in id order.
    /// The querying entity is not excluded.
    pub fn scan_area(&self, position: Vec2, radius: f32) -> ScanHits {
        self.bodies
            .values()
            .filter(|b| b.shape.intersects_circle(b.position, position, radius))
            .map(Body::body_ref)
            .collect()
    }
}

impl<C: EntityStates> PhysicsEngine<C> {
    /// Advance the world by `dt` seconds.
    pub fn step(&mut self, dt: f32, ctx: &mut C) {
        let bodies = &self.bodies;
        self.tracked.retain(|id| bodies.contains_key(id));

        let mut fastest = 0.0f32;
        for id in &self.tracked {
            if let Some(body) = self.bodies.get_mut(id) {
                if let Some(v) = ctx.velocity(*id) {
                    body.velocity = if v.is_finite() { v } else { Vec2::ZERO };
                }
                fastest = fastest.max(body.velocity.magnitude());
            }
        }

        let substeps = ((fastest * dt / MAX_SUBSTEP_TRAVEL).ceil() as usize).clamp(1, MAX_SUBSTEPS);
        let h = dt / substeps as f32;
        let mut commands = StepCommands::default();

        for _ in 0..substeps {
            for id in &self.tracked {
                if commands.is_removed(*id) {
                    continue;
                }
                if let Some(body) = self.bodies.get_mut(id) {
                    body.position += body.velocity * h;
                }
            }
            self.detect_contacts(ctx, &mut commands);
        }

        for id in std::mem::take(&mut commands.removed) {
            self.remove_object(id);
        }
        let bodies = &self.bodies;
        self.tracked.retain(|id| bodies.contains_key(id));

        for id in &self.tracked {
            if let Some(body) = self.bodies.get(id) {
                ctx.sync(*id, body.position, body.velocity);
            }
        }
    }

    fn detect_contacts(&mut self, ctx: &mut C, commands: &mut StepCommands) {
        let live: Vec<&Body> = self
            .bodies
            .values()
            .filter(|b| !commands.is_removed(b.id))
            .collect();

        let mut touching = BTreeSet::new();
        let mut begins = Vec::new();
        for (i, a) in live.iter().enumerate() {
            for b in &live[i + 1..] {
                if a.is_static && b.is_static {
                    continue;
                }
                if a.filter.rejects(&b.filter) {
                    continue;
                }
                if let Some(point) = shape::contact(a.shape, a.position, b.shape, b.position) {
                    let pair = (a.id, b.id);
                    touching.insert(pair);
                    if !self.active.contains(&pair) {
                        begins.push((a.body_ref(), b.body_ref(), point));
                    }
                }
            }
        }

        let ended: Vec<(EntityId, EntityId)> =
            self.active.difference(&touching).copied().collect();
        self.active = touching;

        for (a, b, point) in begins {
            if commands.is_removed(a.id) || commands.is_removed(b.id) {
                self.active.remove(&(a.id, b.id));
                continue;
            }
            if !is_projectile_agent_pair(a.kind, b.kind) {
                for id in [a.id, b.id] {
                    if let Some(body) = self.bodies.get_mut(&id)
                        && !body.is_static
                    {
                        body.velocity = Vec2::ZERO;
                    }
                }
            }
            tracing::trace!("contact begin {}/{}", a.id, b.id);
            if let Some(callback) = self.on_collision.as_mut() {
                callback(ctx, commands, a, b, point);
            }
        }

        for (a, b) in ended {
            if commands.is_removed(a) || commands.is_removed(b) {
                continue;
            }
            let (Some(ba), Some(bb)) = (self.bodies.get(&a), self.bodies.get(&b)) else {
                continue;
            };
            let (ra, rb) = (ba.body_ref(), bb.body_ref());
            tracing::trace!("contact end {a}/{b}");
            if let Some(callback) = self.on_separate.as_mut() {
                callback(ctx, commands, ra, rb);
            }
        }
    }
}

fn is_projectile_agent_pair(a: EntityKind, b: EntityKind) -> bool {
    matches!(
        (a, b),
        (EntityKind::Projectile, EntityKind::Agent) | (EntityKind::Agent, EntityKind::Projectile)
    )
}
