use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::game::constants::map::{
    DEFAULT_HEIGHT, DEFAULT_WIDTH, MAX_COMBATANTS, MAX_DIMENSION, MAX_HUMANS, MIN_DIMENSION,
};
use crate::game::constants::tick::TICK_RATE;
use crate::game::state::GameMode;
use crate::game::systems::ai_profile::Difficulty;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid must be odd-sized between {min} and {max}, got {0}x{1}", min = MIN_DIMENSION, max = MAX_DIMENSION)]
    InvalidDimensions(i32, i32),
    #[error("At most {max} human players per room, got {0}", max = MAX_HUMANS)]
    TooManyHumans(usize),
    #[error("A match needs 2 to {max} combatants, got {0}", max = MAX_COMBATANTS)]
    InvalidPopulation(usize),
    #[error("Invalid game mode: {0}")]
    InvalidMode(String),
    #[error("Invalid server setting: {0}")]
    InvalidServer(String),
    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for the metrics HTTP endpoint
    pub metrics_port: u16,
    /// Maximum number of concurrent game rooms
    pub max_rooms: usize,
    /// Main loop rate in Hz
    pub tick_rate: u32,
    /// Bot-only rooms started at boot
    pub demo_rooms: usize,
    /// JSON file with the match settings for new rooms
    pub match_settings_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            metrics_port: 9090,
            max_rooms: 100,
            tick_rate: TICK_RATE,
            demo_rooms: 1,
            match_settings_path: None,
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("METRICS_PORT") {
            match port.parse::<u16>() {
                Ok(parsed) if parsed > 0 => config.metrics_port = parsed,
                Ok(_) => tracing::warn!("METRICS_PORT must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid METRICS_PORT '{}', using default", port),
            }
        }

        if let Ok(max_rooms) = std::env::var("MAX_ROOMS") {
            if let Ok(parsed) = max_rooms.parse::<usize>() {
                if parsed > 0 && parsed <= 10000 {
                    config.max_rooms = parsed;
                } else {
                    tracing::warn!("MAX_ROOMS must be 1-10000, using default");
                }
            } else {
                tracing::warn!("Invalid MAX_ROOMS '{}', using default", max_rooms);
            }
        }

        if let Ok(rate) = std::env::var("TICK_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if (1..=240).contains(&parsed) => config.tick_rate = parsed,
                Ok(_) => tracing::warn!("TICK_RATE must be 1-240, using default"),
                Err(_) => tracing::warn!("Invalid TICK_RATE '{}', using default", rate),
            }
        }

        if let Ok(demo) = std::env::var("DEMO_ROOMS") {
            if let Ok(parsed) = demo.parse::<usize>() {
                config.demo_rooms = parsed;
            } else {
                tracing::warn!("Invalid DEMO_ROOMS '{}', using default", demo);
            }
        }

        if let Ok(path) = std::env::var("MATCH_SETTINGS_PATH") {
            config.match_settings_path = Some(path);
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metrics_port == 0 {
            return Err(ConfigError::InvalidServer("metrics port cannot be 0".to_string()));
        }
        if self.max_rooms == 0 {
            return Err(ConfigError::InvalidServer("max_rooms must be at least 1".to_string()));
        }
        if self.tick_rate == 0 {
            return Err(ConfigError::InvalidServer("tick_rate must be at least 1".to_string()));
        }
        if self.demo_rooms > self.max_rooms {
            return Err(ConfigError::InvalidServer("demo_rooms cannot exceed max_rooms".to_string()));
        }
        Ok(())
    }

    /// Tick duration in milliseconds
    pub fn tick_interval_ms(&self) -> u64 {
        1000 / u64::from(self.tick_rate.max(1))
    }

    /// Match settings from `match_settings_path`, or the defaults
    pub fn load_match_settings(&self) -> Result<MatchSettings, ConfigError> {
        match &self.match_settings_path {
            Some(path) => MatchSettings::load(path),
            None => Ok(MatchSettings::default()),
        }
    }
}

/// Per-room match configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    pub width: i32,
    pub height: i32,
    /// Human players required before the match starts
    pub humans: usize,
    pub bots: usize,
    pub difficulty: Difficulty,
    pub mode: GameMode,
    /// Fixed RNG seed for reproducible matches
    pub seed: Option<u64>,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            humans: 1,
            bots: 1,
            difficulty: Difficulty::Medium,
            mode: GameMode::LastStanding,
            seed: None,
        }
    }
}

impl MatchSettings {
    /// Bot-only settings for demo rooms
    pub fn demo(bots: usize, difficulty: Difficulty) -> Self {
        Self {
            humans: 0,
            bots,
            difficulty,
            ..Self::default()
        }
    }

    pub fn total_combatants(&self) -> usize {
        self.humans + self.bots
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_dim = |d: i32| (MIN_DIMENSION..=MAX_DIMENSION).contains(&d) && d % 2 == 1;
        if !valid_dim(self.width) || !valid_dim(self.height) {
            return Err(ConfigError::InvalidDimensions(self.width, self.height));
        }
        if self.humans > MAX_HUMANS {
            return Err(ConfigError::TooManyHumans(self.humans));
        }
        let total = self.total_combatants();
        if !(2..=MAX_COMBATANTS).contains(&total) {
            return Err(ConfigError::InvalidPopulation(total));
        }
        match self.mode {
            GameMode::Lives(0) => Err(ConfigError::InvalidMode("Lives needs at least 1 life".to_string())),
            GameMode::FirstToKills(0) => {
                Err(ConfigError::InvalidMode("FirstToKills needs a target of at least 1".to_string()))
            }
            _ => Ok(()),
        }
    }
}
