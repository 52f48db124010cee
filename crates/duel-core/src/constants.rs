//! Fixed arena constants. None of these are configurable at runtime.

/// Simulation clock.
pub mod timing {
    /// Fixed simulation rate in Hz.
    pub const TICKS_PER_SECOND: u32 = 30;
    /// Simulated seconds per tick.
    pub const TICK_DT: f32 = 1.0 / TICKS_PER_SECOND as f32;
}

/// Playable area. Origin is the top-left corner, y grows downward.
pub mod arena {
    pub const WIDTH: f32 = 1000.0;
    pub const HEIGHT: f32 = 1000.0;
    /// Thickness of the four boundary walls placed just outside the playable rectangle.
    pub const WALL_THICKNESS: f32 = 20.0;
}

/// Agent body and movement limits.
pub mod agent {
    /// Circular hitbox radius. Approximates the sprite; tune freely.
    pub const RADIUS: f32 = 30.0;
    pub const MAX_HEALTH: u32 = 100;
    /// Normal speed cap (units/s).
    pub const MAX_SPEED: f32 = 250.0;
    /// Speed cap while the attack cooldown is running.
    pub const ATTACK_MAX_SPEED: f32 = 125.0;
    /// Radius of the per-tick surroundings scan.
    pub const SCAN_RADIUS: f32 = 300.0;
}

/// Ranged attack.
pub mod combat {
    pub const DAMAGE: u32 = 10;
    /// Seconds between shots.
    pub const ATTACK_COOLDOWN: f32 = 1.0;
    pub const PROJECTILE_SPEED: f32 = 600.0;
    /// Circular hitbox radius, smaller than an agent's.
    pub const PROJECTILE_RADIUS: f32 = 5.0;
}

/// Shield timers in seconds.
pub mod shield {
    pub const ACTIVE_DURATION: f32 = 10.0;
    pub const COOLDOWN: f32 = 20.0;
}
