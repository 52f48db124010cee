use serde::{Deserialize, Serialize};

/// Runtime match settings. Arena constants live in `duel_core::constants`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Simulated match length cap in seconds. `0` disables the cap.
    pub time_limit_secs: f32,
    /// Optional JSON arena layout. The built-in layout is used when unset.
    pub arena_path: Option<String>,
    /// Display names reported in results, by agent slot. Missing entries fall
    /// back to the behavior's own name.
    pub agent_names: Vec<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 180.0,
            arena_path: None,
            agent_names: Vec::new(),
        }
    }
}

impl MatchConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("DUEL_MATCH_CONFIG")
            && let Some(config) = Self::load_from_file(&path)
        {
            return config;
        }
        Self::load_from_file("config/match.toml").unwrap_or_default()
    }

    /// Parse a TOML file, returning `None` if it is missing or invalid.
    pub fn load_from_file(path: &str) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        match toml::from_str::<Self>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Failed to parse {path}: {e}");
                None
            },
        }
    }

    /// Whether `elapsed` simulated seconds exhaust the time limit.
    pub fn time_limit_reached(&self, elapsed: f32) -> bool {
        self.time_limit_secs > 0.0 && elapsed >= self.time_limit_secs
    }
}
