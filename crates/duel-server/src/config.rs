use serde::Deserialize;

/// How a match session is driven and how much output it may buffer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Tick at the simulation rate. When false the match runs as fast as the
    /// broadcast channel drains.
    pub pace_ticks: bool,
    /// Encoded frames buffered between the session and its reader.
    pub broadcast_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            pace_ticks: true,
            broadcast_capacity: 1024,
        }
    }
}

impl RealtimeConfig {
    /// An unpaced session, for replays and tests.
    pub fn unpaced() -> Self {
        Self {
            pace_ticks: false,
            ..Self::default()
        }
    }

    /// Load from `DUEL_SERVER_CONFIG` or `config/server.toml`, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let path = std::env::var("DUEL_SERVER_CONFIG")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "config/server.toml".to_string());

        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<RealtimeConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from {path}");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse {path}: {e}, using defaults");
                    RealtimeConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No {path} found, using defaults");
                RealtimeConfig::default()
            },
        };

        if let Ok(val) = std::env::var("DUEL_PACE_TICKS")
            && let Ok(pace) = val.parse::<bool>()
        {
            config.pace_ticks = pace;
        }
        if let Ok(val) = std::env::var("DUEL_BROADCAST_CAPACITY")
            && let Ok(n) = val.parse::<usize>()
        {
            config.broadcast_capacity = n;
        }

        config
    }

    /// Channel capacity, never zero.
    pub fn channel_capacity(&self) -> usize {
        self.broadcast_capacity.max(1)
    }
}
