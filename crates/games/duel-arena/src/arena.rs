use serde::{Deserialize, Serialize};

use duel_core::constants::arena::{HEIGHT, WALL_THICKNESS, WIDTH};
use duel_core::math::Vec2;

/// Side length of the boxes in the built-in layout.
const BOX_SIZE: f32 = 50.0;

/// A static rectangle in a layout file. `x`/`y` is the center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSpec {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ObstacleSpec {
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Where an agent slot starts the match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub x: f32,
    pub y: f32,
}

impl SpawnPoint {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Interior obstacles and spawn points. Boundary walls are never part of a
/// layout; the match always adds them itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaLayout {
    pub name: String,
    pub width: f32,
    pub height: f32,
    pub obstacles: Vec<ObstacleSpec>,
    pub spawn_points: Vec<SpawnPoint>,
}

impl ArenaLayout {
    /// An empty arena with the given spawn points.
    pub fn open(spawn_points: &[Vec2]) -> Self {
        Self {
            name: "open".to_string(),
            width: WIDTH,
            height: HEIGHT,
            obstacles: Vec::new(),
            spawn_points: spawn_points
                .iter()
                .map(|p| SpawnPoint { x: p.x, y: p.y })
                .collect(),
        }
    }

    /// A layout is usable when it matches the fixed arena size and has room
    /// for two agents.
    pub fn validate(&self) -> Result<(), String> {
        if (self.width - WIDTH).abs() > f32::EPSILON || (self.height - HEIGHT).abs() > f32::EPSILON
        {
            return Err(format!(
                "arena is {}x{}, expected {WIDTH}x{HEIGHT}",
                self.width, self.height
            ));
        }
        if self.spawn_points.len() < 2 {
            return Err(format!(
                "need 2 spawn points, found {}",
                self.spawn_points.len()
            ));
        }
        if let Some(o) = self
            .obstacles
            .iter()
            .find(|o| o.width <= 0.0 || o.height <= 0.0)
        {
            return Err(format!("obstacle at ({}, {}) has no area", o.x, o.y));
        }
        Ok(())
    }
}

/// The four walls framing the playable rectangle. Their inner faces lie on
/// the arena edges.
pub fn boundary_walls() -> [ObstacleSpec; 4] {
    let t = WALL_THICKNESS;
    [
        // left
        ObstacleSpec {
            x: -t / 2.0,
            y: HEIGHT / 2.0,
            width: t,
            height: HEIGHT + 2.0 * t,
        },
        // right
        ObstacleSpec {
            x: WIDTH + t / 2.0,
            y: HEIGHT / 2.0,
            width: t,
            height: HEIGHT + 2.0 * t,
        },
        // top
        ObstacleSpec {
            x: WIDTH / 2.0,
            y: -t / 2.0,
            width: WIDTH + 2.0 * t,
            height: t,
        },
        // bottom
        ObstacleSpec {
            x: WIDTH / 2.0,
            y: HEIGHT + t / 2.0,
            width: WIDTH + 2.0 * t,
            height: t,
        },
    ]
}

/// Load a layout from a JSON file, returning `None` if the file is missing or invalid.
pub fn load_arena_from_file(path: &str) -> Option<ArenaLayout> {
    let content = std::fs::read_to_string(path).ok()?;
    let layout = match serde_json::from_str::<ArenaLayout>(&content) {
        Ok(layout) => layout,
        Err(e) => {
            tracing::warn!("Failed to parse {path}: {e}");
            return None;
        },
    };
    match layout.validate() {
        Ok(()) => Some(layout),
        Err(e) => {
            tracing::warn!("Rejected arena {path}: {e}");
            None
        },
    }
}

/// Load the configured layout, falling back to `generate_arena()`.
pub fn load_arena(path: Option<&str>) -> ArenaLayout {
    path.and_then(load_arena_from_file)
        .unwrap_or_else(generate_arena)
}

/// Built-in layout: a column of boxes near each spawn and a diagonal
/// cluster in the middle.
pub fn generate_arena() -> ArenaLayout {
    let mut obstacles = Vec::with_capacity(9);
    let boxed = |x: f32, y: f32| ObstacleSpec {
        x,
        y,
        width: BOX_SIZE,
        height: BOX_SIZE,
    };

    // Upper-left column
    let left_x = 3.0 * BOX_SIZE + BOX_SIZE / 2.0;
    for i in 0..3 {
        obstacles.push(boxed(left_x, 3.0 * BOX_SIZE + i as f32 * BOX_SIZE));
    }

    // Center diagonal
    let (cx, cy) = (WIDTH / 2.0, HEIGHT / 2.0);
    for i in -1..=1 {
        let offset = i as f32 * BOX_SIZE;
        obstacles.push(boxed(cx + offset, cy + offset));
    }

    // Lower-right column
    let right_x = WIDTH - left_x;
    for i in 0..3 {
        obstacles.push(boxed(right_x, HEIGHT - 3.0 * BOX_SIZE - i as f32 * BOX_SIZE));
    }

    ArenaLayout {
        name: "default".to_string(),
        width: WIDTH,
        height: HEIGHT,
        obstacles,
        spawn_points: vec![
            SpawnPoint {
                x: 100.0,
                y: HEIGHT - 100.0,
            },
            SpawnPoint {
                x: WIDTH - 100.0,
                y: 100.0,
            },
        ],
    }
}
