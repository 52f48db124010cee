pub mod agent;
pub mod arena;
pub mod config;
pub mod game;
pub mod physics;

pub use agent::{AgentApi, AgentController, Behavior, HookError, HookResult};
pub use config::MatchConfig;
pub use game::{Game, MatchError, MatchPhase, MatchSink};

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use duel_core::entity::{AgentState, EntityId, EntityKind, Obstacle, ProjectileState};
    use duel_core::math::Vec2;
    use duel_core::outcome::MatchResults;

    use crate::agent::{AgentApi, Behavior, HookResult};
    use crate::arena::ArenaLayout;
    use crate::config::MatchConfig;
    use crate::game::{Game, MatchSink};

    /// Everything a match reported, in order.
    #[derive(Debug, Clone, PartialEq)]
    pub enum SinkEvent {
        States {
            tick: u64,
            agents: Vec<AgentState>,
            projectiles: Vec<ProjectileState>,
        },
        Destroy(EntityId, EntityKind),
        PlayerError(EntityId, String),
        Results(MatchResults),
    }

    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub events: Vec<SinkEvent>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn destroyed(&self) -> Vec<(EntityId, EntityKind)> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    SinkEvent::Destroy(id, kind) => Some((*id, *kind)),
                    _ => None,
                })
                .collect()
        }

        pub fn player_errors(&self) -> Vec<(EntityId, String)> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    SinkEvent::PlayerError(id, msg) => Some((*id, msg.clone())),
                    _ => None,
                })
                .collect()
        }

        pub fn results(&self) -> Option<&MatchResults> {
            self.events.iter().find_map(|e| match e {
                SinkEvent::Results(r) => Some(r),
                _ => None,
            })
        }

        /// Every `(tick, agents, projectiles)` snapshot.
        pub fn states(&self) -> impl Iterator<Item = (u64, &[AgentState], &[ProjectileState])> {
            self.events.iter().filter_map(|e| match e {
                SinkEvent::States {
                    tick,
                    agents,
                    projectiles,
                } => Some((*tick, agents.as_slice(), projectiles.as_slice())),
                _ => None,
            })
        }
    }

    impl MatchSink for RecordingSink {
        fn send_states(
            &mut self,
            tick: u64,
            agents: &[AgentState],
            projectiles: &[ProjectileState],
        ) {
            self.events.push(SinkEvent::States {
                tick,
                agents: agents.to_vec(),
                projectiles: projectiles.to_vec(),
            });
        }

        fn send_destroy(&mut self, id: EntityId, kind: EntityKind) {
            self.events.push(SinkEvent::Destroy(id, kind));
        }

        fn send_player_error(&mut self, agent_id: EntityId, message: &str) {
            self.events
                .push(SinkEvent::PlayerError(agent_id, message.to_string()));
        }

        fn send_results(&mut self, results: &MatchResults) {
            self.events.push(SinkEvent::Results(results.clone()));
        }
    }

    /// How often each hook fired. Shared with the test through an `Arc`.
    #[derive(Debug, Default)]
    pub struct HookCounts {
        pub run: AtomicUsize,
        pub enemy_scanned: AtomicUsize,
        pub obstacle_scanned: AtomicUsize,
        pub damage_taken: AtomicUsize,
        pub obstacle_hit: AtomicUsize,
    }

    impl HookCounts {
        pub fn shared() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn get(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    type RunFn = Box<dyn FnMut(&mut AgentApi<'_>, u64) -> HookResult + Send>;
    type EventFn = Box<dyn FnMut(&mut AgentApi<'_>) -> HookResult + Send>;

    /// A behavior assembled from closures. `run` also receives the 1-based
    /// tick number.
    pub struct Scripted {
        name: String,
        ticks: u64,
        counts: Arc<HookCounts>,
        run: Option<RunFn>,
        on_damage: Option<EventFn>,
        on_obstacle_hit: Option<EventFn>,
    }

    impl Scripted {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                ticks: 0,
                counts: HookCounts::shared(),
                run: None,
                on_damage: None,
                on_obstacle_hit: None,
            }
        }

        pub fn counting(mut self, counts: Arc<HookCounts>) -> Self {
            self.counts = counts;
            self
        }

        pub fn on_run(
            mut self,
            f: impl FnMut(&mut AgentApi<'_>, u64) -> HookResult + Send + 'static,
        ) -> Self {
            self.run = Some(Box::new(f));
            self
        }

        pub fn on_damage(
            mut self,
            f: impl FnMut(&mut AgentApi<'_>) -> HookResult + Send + 'static,
        ) -> Self {
            self.on_damage = Some(Box::new(f));
            self
        }

        pub fn on_obstacle_hit(
            mut self,
            f: impl FnMut(&mut AgentApi<'_>) -> HookResult + Send + 'static,
        ) -> Self {
            self.on_obstacle_hit = Some(Box::new(f));
            self
        }

        pub fn boxed(self) -> Box<dyn Behavior> {
            Box::new(self)
        }
    }

    impl Behavior for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        fn run(&mut self, agent: &mut AgentApi<'_>) -> HookResult {
            self.ticks += 1;
            self.counts.run.fetch_add(1, Ordering::SeqCst);
            match self.run.as_mut() {
                Some(f) => f(agent, self.ticks),
                None => Ok(()),
            }
        }

        fn on_enemy_scanned(&mut self, _agent: &mut AgentApi<'_>, _position: Vec2) -> HookResult {
            self.counts.enemy_scanned.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_obstacle_scanned(
            &mut self,
            _agent: &mut AgentApi<'_>,
            _obstacle: &Obstacle,
        ) -> HookResult {
            self.counts.obstacle_scanned.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_damage_taken(&mut self, agent: &mut AgentApi<'_>) -> HookResult {
            self.counts.damage_taken.fetch_add(1, Ordering::SeqCst);
            match self.on_damage.as_mut() {
                Some(f) => f(agent),
                None => Ok(()),
            }
        }

        fn on_obstacle_hit(&mut self, agent: &mut AgentApi<'_>) -> HookResult {
            self.counts.obstacle_hit.fetch_add(1, Ordering::SeqCst);
            match self.on_obstacle_hit.as_mut() {
                Some(f) => f(agent),
                None => Ok(()),
            }
        }
    }

    /// A behavior that never acts.
    pub fn idle(name: &str) -> Box<dyn Behavior> {
        Scripted::new(name).boxed()
    }

    /// A match on an obstacle-free arena with agents at `a` and `b`.
    pub fn open_duel(a: Vec2, b: Vec2, first: Box<dyn Behavior>, second: Box<dyn Behavior>) -> Game {
        duel_on(ArenaLayout::open(&[a, b]), first, second)
    }

    pub fn duel_on(layout: ArenaLayout, first: Box<dyn Behavior>, second: Box<dyn Behavior>) -> Game {
        Game::with_layout(MatchConfig::default(), layout, vec![first, second])
            .unwrap_or_else(|e| panic!("test match setup failed: {e}"))
    }

    /// Tick `n` times, stopping early if the match ends.
    pub fn run_ticks(game: &mut Game, sink: &mut RecordingSink, n: usize) {
        for _ in 0..n {
            game.tick(sink)
                .unwrap_or_else(|e| panic!("tick failed: {e}"));
        }
    }
}
