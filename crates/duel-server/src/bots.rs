//! Sample behaviors for demo matches and tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use duel_arena::{AgentApi, Behavior, HookResult};
use duel_core::constants::agent;
use duel_core::math::Vec2;

/// Heading toward `target` from the calling agent, in degrees.
fn aim_at(api: &AgentApi<'_>, target: Vec2) -> f32 {
    (target - api.get_position()).angle()
}

/// Never moves, never fires.
#[derive(Debug, Default)]
pub struct Idle;

impl Behavior for Idle {
    fn name(&self) -> &str {
        "Idle"
    }

    fn run(&mut self, _agent: &mut AgentApi<'_>) -> HookResult {
        Ok(())
    }
}

/// Moves at a constant speed, turning a quarter turn whenever it bumps into
/// something. Fires at every enemy it scans.
#[derive(Debug)]
pub struct Circler {
    heading: f32,
    speed: f32,
}

impl Circler {
    pub fn new(heading: f32) -> Self {
        Self {
            heading,
            speed: agent::MAX_SPEED * 0.8,
        }
    }
}

impl Behavior for Circler {
    fn name(&self) -> &str {
        "Circler"
    }

    fn run(&mut self, api: &mut AgentApi<'_>) -> HookResult {
        api.set_movement_direction(self.heading);
        api.set_movement_speed(self.speed);
        Ok(())
    }

    fn on_enemy_scanned(&mut self, api: &mut AgentApi<'_>, position: Vec2) -> HookResult {
        api.attack_ranged(aim_at(api, position));
        Ok(())
    }

    fn on_obstacle_hit(&mut self, api: &mut AgentApi<'_>) -> HookResult {
        self.heading = (self.heading + 90.0) % 360.0;
        api.set_movement_direction(self.heading);
        Ok(())
    }
}

/// Stands still, shoots whatever it scans and raises its shield when hit.
#[derive(Debug, Default)]
pub struct Turret;

impl Behavior for Turret {
    fn name(&self) -> &str {
        "Turret"
    }

    fn run(&mut self, api: &mut AgentApi<'_>) -> HookResult {
        api.set_movement_speed(0.0);
        Ok(())
    }

    fn on_enemy_scanned(&mut self, api: &mut AgentApi<'_>, position: Vec2) -> HookResult {
        api.attack_ranged(aim_at(api, position));
        Ok(())
    }

    fn on_damage_taken(&mut self, api: &mut AgentApi<'_>) -> HookResult {
        if !api.is_shield_activated() && api.get_shield_cooldown_time() <= 0.0 {
            api.activate_shield();
        }
        Ok(())
    }
}

/// Picks a fresh random heading every so often and on every bump. Fires
/// with a little spread. Deterministic for a given seed.
#[derive(Debug)]
pub struct Wanderer {
    rng: StdRng,
    heading: f32,
    ticks_until_turn: u32,
}

impl Wanderer {
    const MIN_LEG_TICKS: u32 = 15;
    const MAX_LEG_TICKS: u32 = 90;
    const SPREAD_DEGREES: f32 = 8.0;

    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let heading = rng.random_range(0.0..360.0);
        Self {
            rng,
            heading,
            ticks_until_turn: Self::MIN_LEG_TICKS,
        }
    }

    fn turn(&mut self) {
        self.heading = self.rng.random_range(0.0..360.0);
        self.ticks_until_turn = self
            .rng
            .random_range(Self::MIN_LEG_TICKS..=Self::MAX_LEG_TICKS);
    }
}

impl Behavior for Wanderer {
    fn name(&self) -> &str {
        "Wanderer"
    }

    fn run(&mut self, api: &mut AgentApi<'_>) -> HookResult {
        if self.ticks_until_turn == 0 {
            self.turn();
        }
        self.ticks_until_turn -= 1;
        api.set_movement_direction(self.heading);
        api.set_movement_speed(agent::MAX_SPEED * 0.6);
        Ok(())
    }

    fn on_enemy_scanned(&mut self, api: &mut AgentApi<'_>, position: Vec2) -> HookResult {
        if api.get_attack_cooldown_time() <= 0.0 {
            let spread = self
                .rng
                .random_range(-Self::SPREAD_DEGREES..=Self::SPREAD_DEGREES);
            api.attack_ranged(aim_at(api, position) + spread);
        }
        Ok(())
    }

    fn on_obstacle_hit(&mut self, api: &mut AgentApi<'_>) -> HookResult {
        self.turn();
        api.set_movement_direction(self.heading);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_arena::test_helpers::{RecordingSink, Scripted, idle, open_duel, run_ticks};
    use duel_core::constants::{arena, combat};

    fn agent_states(game: &duel_arena::Game) -> Vec<duel_core::entity::AgentState> {
        game.agents().map(|a| a.state().clone()).collect()
    }

    // ================================================================
    // Circler
    // ================================================================

    #[test]
    fn circler_turns_at_wall() {
        let mut game = open_duel(
            Vec2::new(800.0, 500.0),
            Vec2::new(100.0, 900.0),
            Box::new(Circler::new(0.0)),
            idle("Far"),
        );
        let mut sink = RecordingSink::new();
        // Reaches the right wall around tick 26, then heads down.
        run_ticks(&mut game, &mut sink, 45);

        let circler = &agent_states(&game)[0];
        assert!((circler.angle - 90.0).abs() < 1e-3, "angle = {}", circler.angle);
        assert!(circler.position.x < arena::WIDTH);
        assert!(circler.position.y > 500.0);
    }

    #[test]
    fn circler_fires_at_scanned_enemy() {
        let mut game = open_duel(
            Vec2::new(100.0, 500.0),
            Vec2::new(300.0, 500.0),
            Box::new(Circler::new(270.0)),
            idle("Target"),
        );
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 20);

        let target = &agent_states(&game)[1];
        assert!(target.health < agent::MAX_HEALTH);
    }

    // ================================================================
    // Turret
    // ================================================================

    #[test]
    fn turret_hits_target_in_range() {
        let mut game = open_duel(
            Vec2::new(100.0, 500.0),
            Vec2::new(300.0, 500.0),
            Box::new(Turret),
            idle("Target"),
        );
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 30);

        let states = agent_states(&game);
        assert_eq!(states[0].position, Vec2::new(100.0, 500.0));
        assert_eq!(states[1].health, agent::MAX_HEALTH - combat::DAMAGE);
    }

    #[test]
    fn turret_shields_after_damage() {
        let shooter = Scripted::new("Shooter")
            .on_run(|api, tick| {
                if tick == 1 {
                    api.attack_ranged(180.0);
                }
                Ok(())
            })
            .boxed();
        let mut game = open_duel(
            Vec2::new(100.0, 500.0),
            Vec2::new(300.0, 500.0),
            Box::new(Turret),
            shooter,
        );
        let mut sink = RecordingSink::new();
        run_ticks(&mut game, &mut sink, 20);

        let turret = &agent_states(&game)[0];
        assert_eq!(turret.health, agent::MAX_HEALTH - combat::DAMAGE);
        assert!(turret.shield_enabled);
    }

    // ================================================================
    // Wanderer
    // ================================================================

    #[test]
    fn wanderer_is_deterministic_per_seed() {
        let run = |seed: u64| {
            let mut game = open_duel(
                Vec2::new(500.0, 500.0),
                Vec2::new(100.0, 100.0),
                Box::new(Wanderer::new(seed)),
                idle("Idle"),
            );
            let mut sink = RecordingSink::new();
            run_ticks(&mut game, &mut sink, 120);
            agent_states(&game)
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn wanderer_stays_inside_arena() {
        let mut game = open_duel(
            Vec2::new(500.0, 500.0),
            Vec2::new(100.0, 100.0),
            Box::new(Wanderer::new(42)),
            Box::new(Idle),
        );
        let mut sink = RecordingSink::new();
        for _ in 0..300 {
            run_ticks(&mut game, &mut sink, 1);
            let p = agent_states(&game)[0].position;
            assert!((0.0..=arena::WIDTH).contains(&p.x), "x = {}", p.x);
            assert!((0.0..=arena::HEIGHT).contains(&p.y), "y = {}", p.y);
        }
    }

    #[test]
    fn wanderer_leg_lengths_stay_in_bounds() {
        let mut w = Wanderer::new(3);
        for _ in 0..100 {
            w.turn();
            assert!((Wanderer::MIN_LEG_TICKS..=Wanderer::MAX_LEG_TICKS).contains(&w.ticks_until_turn));
            assert!((0.0..360.0).contains(&w.heading));
        }
    }
}
