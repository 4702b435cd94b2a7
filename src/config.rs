//! Server Configuration
//!
//! Every gameplay constant lives in [`ArenaConfig`]; transport settings live
//! in [`ServerConfig`]. Both deserialize from an optional JSON file with
//! per-field defaults, then environment overrides are applied on top.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::vec2::Vec2;

/// Environment variable overriding the listen address.
pub const ENV_BIND_ADDR: &str = "COREGUARD_BIND_ADDR";

/// Environment variable naming the JSON config file.
pub const ENV_CONFIG_PATH: &str = "COREGUARD_CONFIG";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Config file is not valid JSON for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Offending value
        value: String,
    },

    /// A value is out of range.
    #[error("Invalid config value `{field}`: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}

// =============================================================================
// ARENA (GAMEPLAY) CONFIG
// =============================================================================

/// Gameplay constants for one arena.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArenaConfig {
    /// Physics/rules tick rate (Hz)
    pub tick_rate: u32,
    /// Snapshot broadcast interval (ms)
    pub broadcast_interval_ms: u64,
    /// Upper bound on a single measured step (s)
    pub max_step_secs: f64,

    /// Post-spawn invincibility (ms)
    pub safe_time_ms: f64,
    /// Rounded team score that ends a round
    pub goal: i64,
    /// Score per second while central
    pub score_rate: f64,
    /// Seconds between round end and reset
    pub countdown_secs: f64,

    /// Force magnitude applied to a core along the movement intent
    pub core_force: f64,
    /// Guard spring factor (force per px of displacement)
    pub guard_attraction: f64,
    /// Velocity fraction lost per 1/60 s
    pub air_friction: f64,
    /// Mass per unit area for cores and guards
    pub density: f64,
    /// Core radius (px)
    pub core_radius: f64,
    /// Guard radius (px)
    pub guard_radius: f64,

    /// Half extent of the playable square (px)
    pub arena_half_size: f64,
    /// Wall thickness (px)
    pub wall_thickness: f64,
    /// Length of each inner wall (px)
    pub inner_wall_length: f64,
    /// Distance of the inner walls from the centre line (px)
    pub inner_wall_offset: f64,
    /// Maximum central-zone radius (px)
    pub zone_cap_radius: f64,

    /// Core/guard pairs created per team
    pub cores_per_team: usize,
    /// Spawn point of team 1 and team 2
    pub team_homes: [Vec2; 2],

    /// Display names are truncated to this many characters
    pub max_name_length: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::TICK_RATE,
            broadcast_interval_ms: 20,
            max_step_secs: 0.1,

            safe_time_ms: 4000.0,
            goal: 100,
            score_rate: 1.0,
            countdown_secs: 10.0,

            core_force: 1000.0,
            guard_attraction: 3.0,
            air_friction: 0.01,
            density: 0.001,
            core_radius: 30.0,
            guard_radius: 20.0,

            arena_half_size: 1000.0,
            wall_thickness: 50.0,
            inner_wall_length: 1000.0,
            inner_wall_offset: 500.0,
            zone_cap_radius: 1500.0,

            cores_per_team: 4,
            team_homes: [Vec2::new(0.0, -800.0), Vec2::new(0.0, 800.0)],

            max_name_length: 16,
        }
    }
}

impl ArenaConfig {
    /// Nominal physics step (s).
    pub fn tick_secs(&self) -> f64 {
        1.0 / self.tick_rate.max(1) as f64
    }

    /// Check every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid { field, reason: "must be positive" })
            }
        }

        fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid { field, reason: "must not be negative" })
            }
        }

        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid { field: "tickRate", reason: "must be positive" });
        }
        if self.broadcast_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "broadcastIntervalMs",
                reason: "must be positive",
            });
        }
        if self.goal <= 0 {
            return Err(ConfigError::Invalid { field: "goal", reason: "must be positive" });
        }
        if self.cores_per_team == 0 {
            return Err(ConfigError::Invalid {
                field: "coresPerTeam",
                reason: "each team needs at least one core",
            });
        }
        if self.max_name_length == 0 {
            return Err(ConfigError::Invalid {
                field: "maxNameLength",
                reason: "must be positive",
            });
        }

        positive("maxStepSecs", self.max_step_secs)?;
        non_negative("safeTimeMs", self.safe_time_ms)?;
        non_negative("scoreRate", self.score_rate)?;
        non_negative("countdownSecs", self.countdown_secs)?;
        non_negative("coreForce", self.core_force)?;
        non_negative("guardAttraction", self.guard_attraction)?;
        positive("density", self.density)?;
        positive("coreRadius", self.core_radius)?;
        positive("guardRadius", self.guard_radius)?;
        positive("arenaHalfSize", self.arena_half_size)?;
        positive("wallThickness", self.wall_thickness)?;
        positive("zoneCapRadius", self.zone_cap_radius)?;

        if !(0.0..1.0).contains(&self.air_friction) {
            return Err(ConfigError::Invalid {
                field: "airFriction",
                reason: "must be in [0, 1)",
            });
        }
        if !self.team_homes.iter().all(|home| home.is_finite()) {
            return Err(ConfigError::Invalid { field: "teamHomes", reason: "must be finite" });
        }

        Ok(())
    }
}

// =============================================================================
// SERVER (TRANSPORT) CONFIG
// =============================================================================

/// Transport configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// Per-connection outbound queue depth; snapshots are dropped when full
    pub outbound_queue: usize,
    /// Inbound world command queue depth
    pub command_queue: usize,
    /// Version string announced in `welcome`
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: 256,
            outbound_queue: 64,
            command_queue: 1024,
            version: crate::VERSION.to_string(),
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

/// Complete runtime configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gameplay constants
    pub arena: ArenaConfig,
    /// Transport settings
    pub server: ServerConfig,
}

impl Config {
    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration.
    ///
    /// `path` (or `COREGUARD_CONFIG` when `path` is `None`) names an optional
    /// JSON file; a missing file means defaults. Environment overrides are
    /// applied last and the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from);
        let path = path.map(Path::to_path_buf).or(env_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
                Self::from_json(&text)?
            }
            _ => Self::default(),
        };

        config.apply_env()?;
        config.arena.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = std::env::var(ENV_BIND_ADDR) {
            self.server.bind_addr = value
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { var: ENV_BIND_ADDR, value })?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
