use std::collections::BTreeMap;

use duel_core::constants::{agent, combat, timing};
use duel_core::entity::{AgentState, DynamicState, EntityId, EntityKind, Obstacle, ProjectileState};
use duel_core::math::Vec2;
use duel_core::outcome::{EndReason, MatchResults, PlayerResult};

use crate::agent::{
    AgentApi, AgentController, Behavior, HookError, HookResult, SpawnRequest, guard_hook,
};
use crate::arena::{ArenaLayout, boundary_walls, generate_arena, load_arena};
use crate::config::MatchConfig;
use crate::physics::{BodyRef, EntityStates, PhysicsEngine, PhysicsError, StepCommands};

/// Lifecycle of a match. Never returns to `Running` once `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Setup,
    Running,
    Ended,
}

#[derive(Debug)]
pub enum MatchError {
    Physics(PhysicsError),
    NotEnoughAgents(usize),
    TooManyAgents(usize),
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Physics(e) => write!(f, "physics: {e}"),
            Self::NotEnoughAgents(n) => write!(f, "a match needs 2 agents, got {n}"),
            Self::TooManyAgents(n) => write!(f, "a match supports 2 agents, got {n}"),
        }
    }
}

impl std::error::Error for MatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Physics(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PhysicsError> for MatchError {
    fn from(e: PhysicsError) -> Self {
        Self::Physics(e)
    }
}

/// Receives per-tick output. Implemented by the transport layer.
pub trait MatchSink {
    fn send_states(&mut self, tick: u64, agents: &[AgentState], projectiles: &[ProjectileState]);
    fn send_destroy(&mut self, id: EntityId, kind: EntityKind);
    fn send_player_error(&mut self, agent_id: EntityId, message: &str);
    fn send_results(&mut self, results: &MatchResults);
}

/// Monotonic id source. Ids are never reused within a match.
#[derive(Debug)]
pub struct IdGenerator {
    next: EntityId,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdGenerator {
    pub fn next_id(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        id
    }
}

struct AgentSlot {
    controller: AgentController,
    behavior: Box<dyn Behavior>,
    fault: Option<HookError>,
    fault_reported: bool,
    survival_time: Option<f32>,
}

/// Entity stores and per-tick bookkeeping. This is the context the collision
/// world hands to its callbacks.
pub struct MatchState {
    agents: Vec<AgentSlot>,
    projectiles: BTreeMap<EntityId, ProjectileState>,
    obstacles: BTreeMap<EntityId, Obstacle>,
    spawns: Vec<SpawnRequest>,
    destroyed: Vec<(EntityId, EntityKind)>,
}

impl MatchState {
    fn agent_index(&self, id: EntityId) -> Option<usize> {
        self.agents.iter().position(|s| s.controller.state.id == id)
    }

    /// Snapshot of every agent except `index`, in world order.
    fn others(&self, index: usize) -> Vec<AgentState> {
        self.agents
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, s)| s.controller.state.clone())
            .collect()
    }

    fn has_fault(&self) -> bool {
        self.agents.iter().any(|s| s.fault.is_some())
    }

    fn record_fault(slot: &mut AgentSlot, error: HookError) {
        tracing::warn!(
            agent = slot.controller.state.id,
            name = slot.controller.name(),
            "behavior fault: {error}"
        );
        slot.fault = Some(error);
    }

    /// Invoke one behavior hook for the agent at `index`. Faulted agents are skipped.
    fn call_hook<F>(&mut self, index: usize, hook: F)
    where
        F: FnOnce(&mut dyn Behavior, &mut AgentApi<'_>) -> HookResult,
    {
        let others = self.others(index);
        let Some(slot) = self.agents.get_mut(index) else {
            return;
        };
        if slot.fault.is_some() {
            return;
        }
        let mut api = AgentApi::new(&mut slot.controller, &others, &mut self.spawns);
        let behavior = slot.behavior.as_mut();
        if let Err(e) = guard_hook(|| hook(behavior, &mut api)) {
            Self::record_fault(slot, e);
        }
    }

    fn destroy_projectile(&mut self, commands: &mut StepCommands, id: EntityId) {
        if self.projectiles.remove(&id).is_some() {
            commands.remove(id);
            self.destroyed.push((id, EntityKind::Projectile));
            tracing::debug!(projectile = id, "projectile destroyed");
        }
    }

    fn projectile_hit_agent(
        &mut self,
        commands: &mut StepCommands,
        projectile_id: EntityId,
        agent_id: EntityId,
    ) {
        if let Some(index) = self.agent_index(agent_id) {
            let state = &mut self.agents[index].controller.state;
            if state.shield_enabled {
                tracing::debug!(agent = agent_id, projectile = projectile_id, "shield absorbed hit");
            } else {
                state.apply_damage(combat::DAMAGE);
                tracing::debug!(
                    agent = agent_id,
                    projectile = projectile_id,
                    health = state.health,
                    "damage applied"
                );
                self.call_hook(index, |b, api| b.on_damage_taken(api));
            }
        }
        self.destroy_projectile(commands, projectile_id);
    }

    fn agent_hit_obstacle(&mut self, agent_id: EntityId, obstacle_id: EntityId, contact: Vec2) {
        let Some(index) = self.agent_index(agent_id) else {
            return;
        };
        let Some(obstacle) = self.obstacles.get(&obstacle_id) else {
            return;
        };
        self.agents[index]
            .controller
            .add_collision(obstacle, contact);
        self.call_hook(index, |b, api| b.on_obstacle_hit(api));
    }

    fn agent_left_obstacle(&mut self, agent_id: EntityId, obstacle_id: EntityId) {
        if let Some(index) = self.agent_index(agent_id) {
            self.agents[index].controller.remove_collision(obstacle_id);
        }
    }

    fn dynamic(&self, id: EntityId) -> Option<&dyn DynamicState> {
        if let Some(p) = self.projectiles.get(&id) {
            return Some(p);
        }
        self.agents
            .iter()
            .find(|s| s.controller.state.id == id)
            .map(|s| &s.controller.state as &dyn DynamicState)
    }

    fn dynamic_mut(&mut self, id: EntityId) -> Option<&mut dyn DynamicState> {
        if let Some(p) = self.projectiles.get_mut(&id) {
            return Some(p);
        }
        self.agents
            .iter_mut()
            .find(|s| s.controller.state.id == id)
            .map(|s| &mut s.controller.state as &mut dyn DynamicState)
    }
}

impl EntityStates for MatchState {
    fn velocity(&self, id: EntityId) -> Option<Vec2> {
        self.dynamic(id).map(|s| s.velocity())
    }

    fn sync(&mut self, id: EntityId, position: Vec2, velocity: Vec2) {
        if let Some(state) = self.dynamic_mut(id) {
            state.set_position(position);
            state.set_velocity(velocity);
        }
    }
}

/// Begin-contact classification.
fn on_collision(
    state: &mut MatchState,
    commands: &mut StepCommands,
    a: BodyRef,
    b: BodyRef,
    contact: Vec2,
) {
    use EntityKind::{Agent, Obstacle, Projectile};
    match (a.kind, b.kind) {
        (Projectile, Projectile) => {
            state.destroy_projectile(commands, a.id);
            state.destroy_projectile(commands, b.id);
        },
        (Agent, Agent) | (Obstacle, Obstacle) => {},
        (Projectile, Agent) => state.projectile_hit_agent(commands, a.id, b.id),
        (Agent, Projectile) => state.projectile_hit_agent(commands, b.id, a.id),
        (Projectile, Obstacle) => state.destroy_projectile(commands, a.id),
        (Obstacle, Projectile) => state.destroy_projectile(commands, b.id),
        (Agent, Obstacle) => state.agent_hit_obstacle(a.id, b.id, contact),
        (Obstacle, Agent) => state.agent_hit_obstacle(b.id, a.id, contact),
    }
}

fn on_separate(state: &mut MatchState, _commands: &mut StepCommands, a: BodyRef, b: BodyRef) {
    match (a.kind, b.kind) {
        (EntityKind::Agent, EntityKind::Obstacle) => state.agent_left_obstacle(a.id, b.id),
        (EntityKind::Obstacle, EntityKind::Agent) => state.agent_left_obstacle(b.id, a.id),
        _ => {},
    }
}

/// One two-agent match on a fixed timestep.
pub struct Game {
    world: PhysicsEngine<MatchState>,
    state: MatchState,
    ids: IdGenerator,
    phase: MatchPhase,
    tick: u64,
    config: MatchConfig,
    results: Option<MatchResults>,
}

impl Game {
    /// Set up a match on the configured arena.
    pub fn new(config: MatchConfig, behaviors: Vec<Box<dyn Behavior>>) -> Result<Self, MatchError> {
        let layout = load_arena(config.arena_path.as_deref());
        Self::with_layout(config, layout, behaviors)
    }

    pub fn with_layout(
        config: MatchConfig,
        layout: ArenaLayout,
        behaviors: Vec<Box<dyn Behavior>>,
    ) -> Result<Self, MatchError> {
        match behaviors.len() {
            n if n < 2 => return Err(MatchError::NotEnoughAgents(n)),
            n if n > 2 => return Err(MatchError::TooManyAgents(n)),
            _ => {},
        }
        let layout = if layout.spawn_points.len() < behaviors.len() {
            tracing::warn!(
                "Arena '{}' has {} spawn points, using built-in layout",
                layout.name,
                layout.spawn_points.len()
            );
            generate_arena()
        } else {
            layout
        };

        let mut world = PhysicsEngine::new();
        let mut ids = IdGenerator::default();
        let mut state = MatchState {
            agents: Vec::with_capacity(behaviors.len()),
            projectiles: BTreeMap::new(),
            obstacles: BTreeMap::new(),
            spawns: Vec::new(),
            destroyed: Vec::new(),
        };

        for spec in boundary_walls().iter().chain(&layout.obstacles) {
            let obstacle = Obstacle::new(ids.next_id(), spec.center(), spec.width, spec.height);
            world.add_obstacle(&obstacle)?;
            state.obstacles.insert(obstacle.id, obstacle);
        }

        for (i, (behavior, spawn)) in behaviors.into_iter().zip(&layout.spawn_points).enumerate() {
            let agent_state = AgentState::new(ids.next_id(), spawn.position());
            world.add_agent(&agent_state)?;
            let name = config
                .agent_names
                .get(i)
                .cloned()
                .unwrap_or_else(|| behavior.name().to_string());
            state.agents.push(AgentSlot {
                controller: AgentController::new(agent_state, name),
                behavior,
                fault: None,
                fault_reported: false,
                survival_time: None,
            });
        }

        world.add_on_collision_callback(Box::new(on_collision));
        world.add_on_separate_callback(Box::new(on_separate));

        tracing::info!(
            arena = %layout.name,
            obstacles = state.obstacles.len(),
            "match set up"
        );

        Ok(Self {
            world,
            state,
            ids,
            phase: MatchPhase::Setup,
            tick: 0,
            config,
            results: None,
        })
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds since the first tick.
    pub fn elapsed(&self) -> f32 {
        self.tick as f32 * timing::TICK_DT
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentController> {
        self.state.agents.iter().map(|s| &s.controller)
    }

    pub fn agent(&self, id: EntityId) -> Option<&AgentController> {
        self.state
            .agent_index(id)
            .map(|i| &self.state.agents[i].controller)
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &ProjectileState> {
        self.state.projectiles.values()
    }

    pub fn obstacles(&self) -> impl Iterator<Item = &Obstacle> {
        self.state.obstacles.values()
    }

    pub fn world(&self) -> &PhysicsEngine<MatchState> {
        &self.world
    }

    pub fn results(&self) -> Option<&MatchResults> {
        self.results.as_ref()
    }

    /// Register a projectile fired by `attacker_id` immediately.
    pub fn create_projectile(
        &mut self,
        position: Vec2,
        direction: f32,
        attacker_id: EntityId,
    ) -> Result<EntityId, MatchError> {
        let id = self.ids.next_id();
        let projectile = ProjectileState::new(id, position, direction, attacker_id);
        self.world.add_projectile(&projectile)?;
        self.state.projectiles.insert(id, projectile);
        tracing::debug!(projectile = id, attacker = attacker_id, direction, "projectile created");
        Ok(id)
    }

    /// Turn attacks queued by behavior hooks into projectiles.
    fn flush_spawns(&mut self) -> Result<(), MatchError> {
        for req in std::mem::take(&mut self.state.spawns) {
            self.create_projectile(req.position, req.direction, req.attacker_id)?;
        }
        Ok(())
    }

    /// Advance the match by one fixed timestep. A no-op once the match has ended.
    pub fn tick(&mut self, sink: &mut dyn MatchSink) -> Result<(), MatchError> {
        match self.phase {
            MatchPhase::Ended => return Ok(()),
            MatchPhase::Setup => {
                self.phase = MatchPhase::Running;
                tracing::info!("match started");
            },
            MatchPhase::Running => {},
        }
        self.tick += 1;

        let outcome = 'phases: {
            self.flush_spawns()?;
            self.world.step(timing::TICK_DT, &mut self.state);
            self.flush_spawns()?;
            if self.state.has_fault() {
                break 'phases Some(self.fault_results());
            }

            self.run_agents();
            self.flush_spawns()?;
            if self.state.has_fault() {
                break 'phases Some(self.fault_results());
            }

            self.run_scans();
            self.flush_spawns()?;
            if self.state.has_fault() {
                break 'phases Some(self.fault_results());
            }

            self.check_end()
        };

        self.report(sink, outcome);
        Ok(())
    }

    /// Tick until the match ends, unpaced.
    pub fn run_loop(&mut self, sink: &mut dyn MatchSink) -> Result<MatchResults, MatchError> {
        loop {
            if let Some(results) = &self.results {
                return Ok(results.clone());
            }
            self.tick(sink)?;
        }
    }

    fn run_agents(&mut self) {
        for i in 0..self.state.agents.len() {
            let others = self.state.others(i);
            let MatchState { agents, spawns, .. } = &mut self.state;
            let slot = &mut agents[i];
            if slot.fault.is_some() {
                continue;
            }
            if let Err(e) = slot
                .controller
                .tick(slot.behavior.as_mut(), &others, spawns)
            {
                MatchState::record_fault(slot, e);
            }
        }
    }

    fn run_scans(&mut self) {
        for i in 0..self.state.agents.len() {
            let (self_id, position) = {
                let s = &self.state.agents[i].controller.state;
                (s.id, s.position)
            };
            for hit in self.world.scan_area(position, agent::SCAN_RADIUS) {
                if hit.id == self_id {
                    continue;
                }
                match hit.kind {
                    EntityKind::Agent => {
                        let Some(j) = self.state.agent_index(hit.id) else {
                            continue;
                        };
                        let seen = self.state.agents[j].controller.state.position;
                        self.state
                            .call_hook(i, |b, api| b.on_enemy_scanned(api, seen));
                    },
                    EntityKind::Obstacle => {
                        let Some(obstacle) = self.state.obstacles.get(&hit.id).cloned() else {
                            continue;
                        };
                        self.state
                            .call_hook(i, |b, api| b.on_obstacle_scanned(api, &obstacle));
                    },
                    EntityKind::Projectile => {},
                }
            }
        }
    }

    fn player_results(&self, winner: impl Fn(&AgentSlot) -> bool) -> Vec<PlayerResult> {
        self.state
            .agents
            .iter()
            .map(|s| PlayerResult {
                agent_id: s.controller.state.id,
                name: s.controller.name().to_string(),
                winner: winner(s),
                faulted: s.fault.is_some(),
                survival_time: s.survival_time,
            })
            .collect()
    }

    fn fault_results(&mut self) -> MatchResults {
        let elapsed = self.elapsed();
        for slot in &mut self.state.agents {
            if slot.fault.is_some() {
                slot.survival_time = Some(elapsed);
            }
        }
        let tie = self.state.agents.iter().all(|s| s.fault.is_some());
        MatchResults {
            players: self.player_results(|s| !tie && s.fault.is_none()),
            tie,
            fault: true,
            reason: EndReason::Fault,
        }
    }

    /// Elimination first, then the time limit.
    fn check_end(&mut self) -> Option<MatchResults> {
        let elapsed = self.elapsed();
        let mut eliminated = 0;
        for slot in &mut self.state.agents {
            if slot.controller.state.is_eliminated() {
                eliminated += 1;
                slot.survival_time = Some(elapsed);
                self.state
                    .destroyed
                    .push((slot.controller.state.id, EntityKind::Agent));
            }
        }
        if eliminated > 0 {
            let tie = eliminated == self.state.agents.len();
            return Some(MatchResults {
                players: self.player_results(|s| !tie && !s.controller.state.is_eliminated()),
                tie,
                fault: false,
                reason: EndReason::Elimination,
            });
        }

        if self.config.time_limit_reached(elapsed) {
            let best = self
                .state
                .agents
                .iter()
                .map(|s| s.controller.state.health)
                .max()
                .unwrap_or(0);
            let leaders = self
                .state
                .agents
                .iter()
                .filter(|s| s.controller.state.health == best)
                .count();
            let tie = leaders > 1;
            return Some(MatchResults {
                players: self.player_results(|s| !tie && s.controller.state.health == best),
                tie,
                fault: false,
                reason: EndReason::TimeLimit,
            });
        }
        None
    }

    fn report(&mut self, sink: &mut dyn MatchSink, outcome: Option<MatchResults>) {
        for (id, kind) in self.state.destroyed.drain(..) {
            sink.send_destroy(id, kind);
        }
        for slot in &mut self.state.agents {
            if let Some(error) = &slot.fault
                && !slot.fault_reported
            {
                sink.send_player_error(slot.controller.state.id, &error.0);
                slot.fault_reported = true;
            }
        }

        let agents: Vec<AgentState> = self
            .state
            .agents
            .iter()
            .map(|s| s.controller.state.clone())
            .collect();
        let projectiles: Vec<ProjectileState> = self.state.projectiles.values().cloned().collect();
        sink.send_states(self.tick, &agents, &projectiles);

        if let Some(results) = outcome {
            self.phase = MatchPhase::Ended;
            tracing::info!(
                tick = self.tick,
                reason = ?results.reason,
                tie = results.tie,
                winner = results.winner().map(|p| p.name.as_str()),
                "match ended"
            );
            sink.send_results(&results);
            self.results = Some(results);
        }
    }

    #[cfg(test)]
    fn set_health(&mut self, id: EntityId, health: u32) {
        if let Some(i) = self.state.agent_index(id) {
            self.state.agents[i].controller.state.health = health;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::arena::ObstacleSpec;
    use crate::test_helpers::{
        HookCounts, RecordingSink, Scripted, duel_on, idle, open_duel, run_ticks,
    };
    use duel_core::constants::arena::{HEIGHT, WIDTH};

    fn shooter(direction: f32) -> Box<dyn Behavior> {
        Scripted::new("Shooter")
            .on_run(move |api, tick| {
                if tick == 1 {
                    api.attack_ranged(direction);
                }
                Ok(())
            })
            .boxed()
    }

    fn ids(game: &Game) -> (EntityId, EntityId) {
        let v: Vec<EntityId> = game.agents().map(|a| a.state().id).collect();
        (v[0], v[1])
    }

    fn health(game: &Game, id: EntityId) -> u32 {
        game.agent(id).map(|a| a.state().health).unwrap_or(0)
    }

    fn projectile_ids(sink: &RecordingSink) -> Vec<EntityId> {
        let mut seen: Vec<EntityId> = sink
            .states()
            .flat_map(|(_, _, ps)| ps.iter().map(|p| p.id))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        seen
    }

    // ================================================================
    // Setup
    // ================================================================

    #[test]
    fn agent_count_enforced() {
        let err = Game::new(MatchConfig::default(), vec![idle("A")]).err();
        assert!(matches!(err, Some(MatchError::NotEnoughAgents(1))));
        let err = Game::new(
            MatchConfig::default(),
            vec![idle("A"), idle("B"), idle("C")],
        )
        .err();
        assert!(matches!(err, Some(MatchError::TooManyAgents(3))));
    }

    #[test]
    fn setup_registers_walls_and_agents() {
        let game = Game::new(MatchConfig::default(), vec![idle("A"), idle("B")]).unwrap();
        assert_eq!(game.phase(), MatchPhase::Setup);
        // 4 walls + 9 boxes + 2 agents
        assert_eq!(game.obstacles().count(), 13);
        assert_eq!(game.world().len(), 15);
        let names: Vec<&str> = game.agents().map(|a| a.name()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn config_names_override_behavior_names() {
        let config = MatchConfig {
            agent_names: vec!["Alice".to_string()],
            ..MatchConfig::default()
        };
        let game = Game::new(config, vec![idle("A"), idle("B")]).unwrap();
        let names: Vec<&str> = game.agents().map(|a| a.name()).collect();
        assert_eq!(names, vec!["Alice", "B"]);
    }

    // ================================================================
    // Combat
    // ================================================================

    #[test]
    fn projectile_damages_enemy_and_is_removed() {
        let counts = HookCounts::shared();
        let target = Scripted::new("Target").counting(Arc::clone(&counts)).boxed();
        let mut game = open_duel(
            Vec2::new(100.0, 800.0),
            Vec2::new(200.0, 800.0),
            shooter(0.0),
            target,
        );
        let (a, b) = ids(&game);
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 30);

        assert_eq!(health(&game, a), agent::MAX_HEALTH);
        assert_eq!(health(&game, b), agent::MAX_HEALTH - combat::DAMAGE);
        assert_eq!(HookCounts::get(&counts.damage_taken), 1);

        let fired = projectile_ids(&sink);
        assert_eq!(fired.len(), 1);
        assert!(!game.world().contains(fired[0]));
        assert_eq!(game.projectiles().count(), 0);
        assert!(
            sink.destroyed()
                .contains(&(fired[0], EntityKind::Projectile))
        );
    }

    #[test]
    fn shield_blocks_damage_but_consumes_projectile() {
        let counts = HookCounts::shared();
        let target = Scripted::new("Target")
            .counting(Arc::clone(&counts))
            .on_run(|api, tick| {
                if tick == 1 {
                    api.activate_shield();
                }
                Ok(())
            })
            .boxed();
        let mut game = open_duel(
            Vec2::new(100.0, 800.0),
            Vec2::new(200.0, 800.0),
            shooter(0.0),
            target,
        );
        let (_, b) = ids(&game);
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 30);

        assert_eq!(health(&game, b), agent::MAX_HEALTH);
        assert_eq!(HookCounts::get(&counts.damage_taken), 0);
        assert_eq!(game.projectiles().count(), 0);
        assert_eq!(sink.destroyed().len(), 1);
    }

    #[test]
    fn repeated_attack_within_cooldown_fires_once() {
        let spammer = Scripted::new("Spammer")
            .on_run(|api, _| {
                api.attack_ranged(0.0);
                Ok(())
            })
            .boxed();
        let mut game = open_duel(
            Vec2::new(100.0, 800.0),
            Vec2::new(200.0, 800.0),
            spammer,
            idle("Target"),
        );
        let (_, b) = ids(&game);
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 25);

        assert_eq!(projectile_ids(&sink).len(), 1);
        assert_eq!(health(&game, b), agent::MAX_HEALTH - combat::DAMAGE);
    }

    #[test]
    fn create_projectile_registers_immediately() {
        let mut game = open_duel(
            Vec2::new(100.0, 800.0),
            Vec2::new(900.0, 100.0),
            idle("A"),
            idle("B"),
        );
        let (a, _) = ids(&game);
        let p = game
            .create_projectile(Vec2::new(100.0, 800.0), 0.0, a)
            .unwrap();
        assert!(game.world().contains(p));
        let q = game
            .create_projectile(Vec2::new(100.0, 800.0), 0.0, a)
            .unwrap();
        assert!(q > p);
    }

    #[test]
    fn projectile_stops_at_wall() {
        let mut game = open_duel(
            Vec2::new(900.0, 500.0),
            Vec2::new(100.0, 100.0),
            shooter(0.0),
            idle("B"),
        );
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 30);
        assert_eq!(game.projectiles().count(), 0);
        assert_eq!(sink.destroyed().len(), 1);
        for (_, _, projectiles) in sink.states() {
            for p in projectiles {
                assert!(p.position.x <= WIDTH);
            }
        }
    }

    // ================================================================
    // Movement against obstacles
    // ================================================================

    #[test]
    fn agent_contained_by_boundary_walls() {
        let runner = Scripted::new("Runner")
            .on_run(|api, _| {
                api.set_movement_direction(45.0);
                api.set_movement_speed(agent::MAX_SPEED);
                Ok(())
            })
            .boxed();
        let mut game = open_duel(
            Vec2::new(850.0, 850.0),
            Vec2::new(100.0, 100.0),
            runner,
            idle("B"),
        );
        let (a, _) = ids(&game);
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 120);

        for (_, agents, _) in sink.states() {
            for s in agents {
                assert!((0.0..=WIDTH).contains(&s.position.x), "x = {}", s.position.x);
                assert!((0.0..=HEIGHT).contains(&s.position.y), "y = {}", s.position.y);
            }
        }
        // Pinned in the corner against both walls
        let state = game.agent(a).unwrap().state();
        assert_eq!(state.velocity, Vec2::ZERO);
        assert_eq!(game.agent(a).unwrap().tracked_collisions().len(), 2);
    }

    #[test]
    fn obstacle_contact_blocks_one_axis_only() {
        let counts = HookCounts::shared();
        let hits = Arc::clone(&counts);
        let pusher = Scripted::new("Pusher")
            .counting(Arc::clone(&counts))
            .on_run(move |api, _| {
                let angle = if HookCounts::get(&hits.obstacle_hit) == 0 {
                    0.0
                } else {
                    30.0
                };
                api.set_movement_direction(angle);
                api.set_movement_speed(agent::MAX_SPEED);
                Ok(())
            })
            .boxed();
        let layout = ArenaLayout {
            obstacles: vec![ObstacleSpec {
                x: 300.0,
                y: 500.0,
                width: 50.0,
                height: 50.0,
            }],
            ..ArenaLayout::open(&[Vec2::new(200.0, 500.0), Vec2::new(800.0, 100.0)])
        };
        let mut game = duel_on(layout, pusher, idle("B"));
        let (a, _) = ids(&game);
        let mut sink = RecordingSink::new();

        for _ in 0..30 {
            game.tick(&mut sink).unwrap();
            if HookCounts::get(&counts.obstacle_hit) > 0 {
                break;
            }
        }
        assert_eq!(HookCounts::get(&counts.obstacle_hit), 1);

        let x_at_hit = game.agent(a).unwrap().state().position.x;
        let v = game.agent(a).unwrap().state().velocity;
        assert_eq!(v.x, 0.0);
        assert!(v.y > 0.0);

        run_ticks(&mut game, &mut sink, 3);
        let state = game.agent(a).unwrap().state();
        assert!((state.position.x - x_at_hit).abs() < 1e-3);
        assert!(state.velocity.y > 0.0);
        assert!(x_at_hit < 275.0);
    }

    #[test]
    fn agent_slides_back_up_a_wall_after_sliding_down() {
        let slider = Scripted::new("Slider")
            .on_run(|api, tick| {
                api.set_movement_direction(if tick <= 40 { 135.0 } else { 225.0 });
                api.set_movement_speed(agent::MAX_SPEED);
                Ok(())
            })
            .boxed();
        let mut game = open_duel(
            Vec2::new(60.0, 300.0),
            Vec2::new(800.0, 100.0),
            slider,
            idle("B"),
        );
        let (a, _) = ids(&game);
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 40);
        let low = game.agent(a).unwrap().state().position;
        assert!(low.y > 450.0, "should have slid down the wall, y = {}", low.y);

        run_ticks(&mut game, &mut sink, 10);
        let state = game.agent(a).unwrap().state();
        assert_eq!(state.velocity.x, 0.0);
        assert!(state.velocity.y < 0.0, "v = {:?}", state.velocity);
        assert!(state.position.y < low.y - 30.0, "y = {}", state.position.y);
        assert!(state.position.x >= 0.0);
    }

    #[test]
    fn diagonal_approach_does_not_enter_box_corner() {
        let runner = Scripted::new("Runner")
            .on_run(|api, _| {
                api.set_movement_direction(45.0);
                api.set_movement_speed(agent::MAX_SPEED);
                Ok(())
            })
            .boxed();
        let layout = ArenaLayout {
            obstacles: vec![ObstacleSpec {
                x: 400.0,
                y: 400.0,
                width: 100.0,
                height: 100.0,
            }],
            ..ArenaLayout::open(&[Vec2::new(250.0, 250.0), Vec2::new(800.0, 100.0)])
        };
        let mut game = duel_on(layout, runner, idle("B"));
        let (a, _) = ids(&game);
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 60);

        for (tick, agents, _) in sink.states() {
            let p = agents[0].position;
            let inside = (p.x - 400.0).abs() < 50.0 && (p.y - 400.0).abs() < 50.0;
            assert!(!inside, "tick {tick}: center entered the box at {p:?}");
        }
        let state = game.agent(a).unwrap().state();
        assert!(state.position.distance(Vec2::new(350.0, 350.0)) < agent::RADIUS + 1.0);
        assert_eq!(game.agent(a).unwrap().tracked_collisions().len(), 1);
    }

    // ================================================================
    // Scanning
    // ================================================================

    #[test]
    fn nearby_enemy_and_walls_are_scanned() {
        let counts = HookCounts::shared();
        let watcher = Scripted::new("Watcher").counting(Arc::clone(&counts)).boxed();
        let mut game = open_duel(
            Vec2::new(100.0, 500.0),
            Vec2::new(300.0, 500.0),
            watcher,
            idle("B"),
        );
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 3);
        assert_eq!(HookCounts::get(&counts.enemy_scanned), 3);
        // Only the left wall is within range
        assert_eq!(HookCounts::get(&counts.obstacle_scanned), 3);
        assert_eq!(HookCounts::get(&counts.run), 3);
    }

    #[test]
    fn distant_enemy_not_scanned() {
        let counts = HookCounts::shared();
        let watcher = Scripted::new("Watcher").counting(Arc::clone(&counts)).boxed();
        let mut game = open_duel(
            Vec2::new(500.0, 500.0),
            Vec2::new(900.0, 900.0),
            watcher,
            idle("B"),
        );
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 3);
        assert_eq!(HookCounts::get(&counts.enemy_scanned), 0);
        assert_eq!(HookCounts::get(&counts.obstacle_scanned), 0);
    }

    // ================================================================
    // Match end
    // ================================================================

    #[test]
    fn elimination_ends_match() {
        let mut game = open_duel(
            Vec2::new(100.0, 800.0),
            Vec2::new(200.0, 800.0),
            shooter(0.0),
            idle("Target"),
        );
        let (a, b) = ids(&game);
        game.set_health(b, combat::DAMAGE);
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 30);

        assert_eq!(game.phase(), MatchPhase::Ended);
        let results = sink.results().unwrap();
        assert_eq!(results.reason, EndReason::Elimination);
        assert!(!results.tie);
        assert_eq!(results.winner().map(|p| p.agent_id), Some(a));
        let loser = results.player(b).unwrap();
        let expected = game.tick_count() as f32 * timing::TICK_DT;
        assert_eq!(loser.survival_time, Some(expected));
        assert_eq!(results.player(a).unwrap().survival_time, None);
        assert!(sink.destroyed().contains(&(b, EntityKind::Agent)));
    }

    #[test]
    fn ended_match_ignores_further_ticks() {
        let mut game = open_duel(
            Vec2::new(100.0, 800.0),
            Vec2::new(200.0, 800.0),
            shooter(0.0),
            idle("Target"),
        );
        let (_, b) = ids(&game);
        game.set_health(b, combat::DAMAGE);
        let mut sink = RecordingSink::new();
        let results = game.run_loop(&mut sink).unwrap();
        let ticks = game.tick_count();
        let events = sink.events.len();
        run_ticks(&mut game, &mut sink, 5);
        assert_eq!(game.tick_count(), ticks);
        assert_eq!(sink.events.len(), events);
        assert_eq!(game.results(), Some(&results));
    }

    #[test]
    fn simultaneous_elimination_is_a_tie() {
        let mut game = open_duel(
            Vec2::new(300.0, 500.0),
            Vec2::new(500.0, 500.0),
            shooter(0.0),
            shooter(180.0),
        );
        let (a, b) = ids(&game);
        game.set_health(a, combat::DAMAGE);
        game.set_health(b, combat::DAMAGE);
        let mut sink = RecordingSink::new();
        let results = game.run_loop(&mut sink).unwrap();

        assert!(results.tie);
        assert!(results.winner().is_none());
        assert!(results.players.iter().all(|p| !p.winner));
        let times: Vec<Option<f32>> = results.players.iter().map(|p| p.survival_time).collect();
        assert_eq!(times[0], times[1]);
        assert!(times[0].is_some());
    }

    #[test]
    fn time_limit_favours_healthier_agent() {
        let config = MatchConfig {
            time_limit_secs: 1.0,
            ..MatchConfig::default()
        };
        let layout = ArenaLayout::open(&[Vec2::new(100.0, 100.0), Vec2::new(900.0, 900.0)]);
        let mut game = Game::with_layout(config.clone(), layout.clone(), vec![idle("A"), idle("B")])
            .unwrap();
        let mut sink = RecordingSink::new();
        let results = game.run_loop(&mut sink).unwrap();
        assert_eq!(results.reason, EndReason::TimeLimit);
        assert!(results.tie);
        assert!(results.players.iter().all(|p| p.survival_time.is_none()));
        assert!(game.tick_count() <= 31);

        let mut game = Game::with_layout(config, layout, vec![idle("A"), idle("B")]).unwrap();
        let (a, b) = ids(&game);
        game.set_health(b, 50);
        let results = game.run_loop(&mut RecordingSink::new()).unwrap();
        assert!(!results.tie);
        assert_eq!(results.winner().map(|p| p.agent_id), Some(a));
    }

    // ================================================================
    // Faults
    // ================================================================

    #[test]
    fn run_error_faults_agent() {
        let broken = Scripted::new("Broken")
            .on_run(|_, tick| {
                if tick == 3 {
                    Err(HookError::new("boom"))
                } else {
                    Ok(())
                }
            })
            .boxed();
        let mut game = open_duel(
            Vec2::new(100.0, 100.0),
            Vec2::new(900.0, 900.0),
            broken,
            idle("B"),
        );
        let (a, b) = ids(&game);
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 10);

        assert_eq!(game.phase(), MatchPhase::Ended);
        assert_eq!(game.tick_count(), 3);
        assert_eq!(sink.player_errors(), vec![(a, "boom".to_string())]);
        let results = sink.results().unwrap();
        assert!(results.fault);
        assert_eq!(results.reason, EndReason::Fault);
        assert!(results.player(a).unwrap().faulted);
        assert_eq!(results.winner().map(|p| p.agent_id), Some(b));
    }

    #[test]
    fn both_agents_panicking_is_a_tie() {
        let panicky = || {
            Scripted::new("Panicky")
                .on_run(|_, _| panic!("player bug"))
                .boxed()
        };
        let mut game = open_duel(
            Vec2::new(100.0, 100.0),
            Vec2::new(900.0, 900.0),
            panicky(),
            panicky(),
        );
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 2);

        let results = sink.results().unwrap();
        assert!(results.tie && results.fault);
        assert!(results.players.iter().all(|p| p.faulted && !p.winner));
        assert_eq!(sink.player_errors().len(), 2);
        assert_eq!(sink.player_errors()[0].1, "player bug");
    }

    #[test]
    fn fault_in_collision_hook_ends_match() {
        let fragile = Scripted::new("Fragile")
            .on_damage(|_| Err(HookError::new("cannot take a hit")))
            .boxed();
        let mut game = open_duel(
            Vec2::new(100.0, 800.0),
            Vec2::new(200.0, 800.0),
            shooter(0.0),
            fragile,
        );
        let (a, b) = ids(&game);
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 30);

        let results = sink.results().unwrap();
        assert_eq!(results.reason, EndReason::Fault);
        assert!(results.player(b).unwrap().faulted);
        assert_eq!(results.winner().map(|p| p.agent_id), Some(a));
        // Damage still landed before the hook raised
        assert_eq!(health(&game, b), agent::MAX_HEALTH - combat::DAMAGE);
    }

    mod proptests {
        use super::*;
        use crate::arena::generate_arena;
        use proptest::prelude::*;

        fn brawler(headings: Vec<f32>, speed: f32) -> Box<dyn Behavior> {
            Scripted::new("Brawler")
                .on_run(move |api, tick| {
                    let heading = headings[(tick as usize / 15) % headings.len()];
                    api.set_movement_direction(heading);
                    api.set_movement_speed(speed);
                    if let Some(enemy) = api.get_agents_position().first() {
                        api.attack_ranged((*enemy - api.get_position()).angle());
                    }
                    Ok(())
                })
                .boxed()
        }

        proptest! {
            #[test]
            fn invariants_hold_through_random_fights(
                a_headings in proptest::collection::vec(-180.0f32..180.0, 1..8),
                b_headings in proptest::collection::vec(-180.0f32..180.0, 1..8),
                a_speed in 0.0f32..400.0,
                b_speed in 0.0f32..400.0,
            ) {
                let mut game = duel_on(
                    generate_arena(),
                    brawler(a_headings, a_speed),
                    brawler(b_headings, b_speed),
                );
                let mut sink = RecordingSink::new();
                run_ticks(&mut game, &mut sink, 150);

                let mut destroyed = std::collections::BTreeSet::new();
                for event in &sink.events {
                    match event {
                        crate::test_helpers::SinkEvent::Destroy(id, EntityKind::Projectile) => {
                            prop_assert!(destroyed.insert(*id), "projectile {} destroyed twice", id);
                        },
                        crate::test_helpers::SinkEvent::States { agents, projectiles, .. } => {
                            for s in agents {
                                prop_assert!(s.health <= agent::MAX_HEALTH);
                                prop_assert!((0.0..=WIDTH).contains(&s.position.x));
                                prop_assert!((0.0..=HEIGHT).contains(&s.position.y));
                            }
                            for p in projectiles {
                                prop_assert!(!destroyed.contains(&p.id), "projectile {} came back", p.id);
                            }
                        },
                        _ => {},
                    }
                }
            }
        }
    }
}
