use std::str::FromStr;

use crate::graph::constants::{buckets, class, grid, nearest};
use crate::graph::policy::RoutingPolicy;
use crate::util::vec2::Vec2;

/// Configuration validation failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("cell_size must be > 0, got {0}")]
    InvalidCellSize(f32),
    #[error("world bounds are empty: min {min:?} max {max:?}")]
    InvalidWorldBounds { min: Vec2, max: Vec2 },
    #[error("server_max_tick_rate must be > 0, got {0}")]
    InvalidTickRate(f32),
    #[error("target_actors_per_bucket must be at least 1")]
    ZeroBucketSize,
    #[error("frequency_bucket_count must be at least 1 when set")]
    ZeroBucketCount,
    #[error("nearest_cutoff_distance must be > 0, got {0}")]
    InvalidCutoff(f32),
    #[error("default_cull_distance must be > 0, got {0}")]
    InvalidCullDistance(f32),
    #[error("tick_rate_hz must be at least 1")]
    ZeroDriverTickRate,
}

/// Replication graph configuration
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Edge length of a spatial grid cell (world units)
    pub cell_size: f32,
    /// Lower corner of the world bounds covered by the grid
    pub world_min: Vec2,
    /// Upper corner of the world bounds covered by the grid
    pub world_max: Vec2,
    /// Server replication tick rate, used to turn update frequencies into periods
    pub server_max_tick_rate: f32,
    /// Actors per frequency-limited bucket
    pub target_actors_per_bucket: usize,
    /// Fixed bucket count (overrides `target_actors_per_bucket` when set)
    pub frequency_bucket_count: Option<usize>,
    /// K for the nearest-actor nodes
    pub max_nearest_actors: usize,
    /// Nearest-actor interest cutoff (world units)
    pub nearest_cutoff_distance: f32,
    /// Grid cull distance for classes that do not set one (world units)
    pub default_cull_distance: f32,
    /// Running under the spatial networking stack (interest handled by the runtime)
    pub spatial_networking: bool,
    /// Performance scenario: player characters / NPCs / player states routed to nearest-K nodes
    pub custom_performance_scenario: bool,
    /// Exempt every class from dynamic re-bucketing
    pub disable_spatial_rebuilds: bool,
    /// Replicate the owning player state on alternating frames only
    pub throttle_owner_player_state: bool,
    /// Replicated base class routed to the dynamic grid even before it is loaded
    pub replicated_base_class: Option<String>,
    /// Classes routed to the nearest-players node in the performance scenario
    pub nearest_player_classes: Vec<String>,
    /// Player-state class routed to the nearest-player-states node in the performance scenario
    pub nearest_player_state_class: Option<String>,
    /// Classes always replicated when spatial networking is enabled
    pub always_replicate_classes: Vec<String>,
    /// Classes exempt from dynamic re-bucketing
    pub rebuild_exempt_classes: Vec<String>,
    /// Extra explicit routing entries, applied after the built-in seeds
    pub policy_overrides: Vec<(String, RoutingPolicy)>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            cell_size: grid::CELL_SIZE,
            world_min: Vec2::new(-grid::WORLD_EXTENT, -grid::WORLD_EXTENT),
            world_max: Vec2::new(grid::WORLD_EXTENT, grid::WORLD_EXTENT),
            server_max_tick_rate: class::SERVER_MAX_TICK_RATE,
            target_actors_per_bucket: buckets::TARGET_ACTORS_PER_FRAME,
            frequency_bucket_count: None,
            max_nearest_actors: nearest::MAX_NEAREST_ACTORS,
            nearest_cutoff_distance: nearest::CUTOFF_DISTANCE,
            default_cull_distance: class::NET_CULL_DISTANCE_SQUARED.sqrt(),
            spatial_networking: false,
            custom_performance_scenario: false,
            disable_spatial_rebuilds: false,
            throttle_owner_player_state: true,
            replicated_base_class: None,
            nearest_player_classes: Vec::new(),
            nearest_player_state_class: None,
            always_replicate_classes: Vec::new(),
            rebuild_exempt_classes: Vec::new(),
            policy_overrides: Vec::new(),
        }
    }
}

impl GraphConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(size) = env_parse::<f32>("REPGRAPH_CELL_SIZE") {
            if size > 0.0 {
                config.cell_size = size;
            } else {
                tracing::warn!("REPGRAPH_CELL_SIZE must be > 0, using default");
            }
        }

        if let Some(extent) = env_parse::<f32>("REPGRAPH_WORLD_EXTENT") {
            if extent > 0.0 {
                config.world_min = Vec2::new(-extent, -extent);
                config.world_max = Vec2::new(extent, extent);
            } else {
                tracing::warn!("REPGRAPH_WORLD_EXTENT must be > 0, using default");
            }
        }

        if let Some(rate) = env_parse::<f32>("REPGRAPH_TICK_RATE") {
            if rate > 0.0 {
                config.server_max_tick_rate = rate;
            } else {
                tracing::warn!("REPGRAPH_TICK_RATE must be > 0, using default");
            }
        }

        if let Some(spatial) = env_flag("REPGRAPH_SPATIAL_NETWORKING") {
            config.spatial_networking = spatial;
            if spatial {
                config.target_actors_per_bucket = buckets::TARGET_ACTORS_PER_FRAME_SPATIAL;
            }
        }

        if let Some(size) = env_parse::<usize>("REPGRAPH_BUCKET_SIZE") {
            if size > 0 {
                config.target_actors_per_bucket = size;
            } else {
                tracing::warn!("REPGRAPH_BUCKET_SIZE must be >= 1, using default");
            }
        }

        if let Some(count) = env_parse::<usize>("REPGRAPH_BUCKET_COUNT") {
            if count > 0 {
                config.frequency_bucket_count = Some(count);
            } else {
                tracing::warn!("REPGRAPH_BUCKET_COUNT must be >= 1, ignoring");
            }
        }

        if let Some(n) = env_parse::<usize>("REPGRAPH_NEAREST_N") {
            config.max_nearest_actors = n;
        }

        if let Some(cutoff) = env_parse::<f32>("REPGRAPH_NEAREST_CUTOFF") {
            if cutoff > 0.0 {
                config.nearest_cutoff_distance = cutoff;
            } else {
                tracing::warn!("REPGRAPH_NEAREST_CUTOFF must be > 0, using default");
            }
        }

        if let Some(cull) = env_parse::<f32>("REPGRAPH_DEFAULT_CULL_DISTANCE") {
            if cull > 0.0 {
                config.default_cull_distance = cull;
            } else {
                tracing::warn!("REPGRAPH_DEFAULT_CULL_DISTANCE must be > 0, using default");
            }
        }

        if let Some(flag) = env_flag("REPGRAPH_CUSTOM_SCENARIO") {
            config.custom_performance_scenario = flag;
        }

        if let Some(flag) = env_flag("REPGRAPH_DISABLE_SPATIAL_REBUILDS") {
            config.disable_spatial_rebuilds = flag;
        }

        if let Some(flag) = env_flag("REPGRAPH_THROTTLE_PLAYER_STATE") {
            config.throttle_owner_player_state = flag;
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cell_size > 0.0) {
            return Err(ConfigError::InvalidCellSize(self.cell_size));
        }
        if !(self.world_min.x < self.world_max.x && self.world_min.y < self.world_max.y) {
            return Err(ConfigError::InvalidWorldBounds {
                min: self.world_min,
                max: self.world_max,
            });
        }
        if !(self.server_max_tick_rate > 0.0) {
            return Err(ConfigError::InvalidTickRate(self.server_max_tick_rate));
        }
        if self.target_actors_per_bucket == 0 {
            return Err(ConfigError::ZeroBucketSize);
        }
        if self.frequency_bucket_count == Some(0) {
            return Err(ConfigError::ZeroBucketCount);
        }
        if !(self.nearest_cutoff_distance > 0.0) {
            return Err(ConfigError::InvalidCutoff(self.nearest_cutoff_distance));
        }
        if !(self.default_cull_distance > 0.0) {
            return Err(ConfigError::InvalidCullDistance(self.default_cull_distance));
        }
        Ok(())
    }
}

/// Demo tick driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Replication frames per second
    pub tick_rate_hz: u32,
    /// Stop after this many frames (runs until Ctrl+C when unset)
    pub frame_limit: Option<u64>,
    /// Number of simulated client connections
    pub connections: usize,
    /// Spatialized dynamic actors in the demo world
    pub dynamic_actors: usize,
    /// Frequency-limited player states
    pub player_states: usize,
    /// Nearest-K candidates
    pub nearest_candidates: usize,
    /// Frames to wait before the expected population census runs
    pub census_delay_frames: u32,
    /// Seed for actor placement and movement
    pub seed: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30,
            frame_limit: None,
            connections: 1,
            dynamic_actors: 1900,
            player_states: 50,
            nearest_candidates: 49,
            // 30 seconds at the default tick rate
            census_delay_frames: 30 * 30,
            seed: 0x5eed,
        }
    }
}

impl DriverConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(rate) = env_parse::<u32>("DRIVER_TICK_RATE") {
            if rate > 0 {
                config.tick_rate_hz = rate;
                config.census_delay_frames = rate.saturating_mul(30);
            } else {
                tracing::warn!("DRIVER_TICK_RATE must be > 0, using default");
            }
        }

        if let Some(limit) = env_parse::<u64>("DRIVER_FRAME_LIMIT") {
            config.frame_limit = Some(limit);
        }

        if let Some(connections) = env_parse::<usize>("DRIVER_CONNECTIONS") {
            if (1..=4096).contains(&connections) {
                config.connections = connections;
            } else {
                tracing::warn!("DRIVER_CONNECTIONS must be 1-4096, using default");
            }
        }

        if let Some(count) = env_parse::<usize>("DRIVER_DYNAMIC_ACTORS") {
            config.dynamic_actors = count;
        }

        if let Some(count) = env_parse::<usize>("DRIVER_PLAYER_STATES") {
            config.player_states = count;
        }

        if let Some(count) = env_parse::<usize>("DRIVER_NEAREST_CANDIDATES") {
            config.nearest_candidates = count;
        }

        if let Some(delay) = env_parse::<u32>("DRIVER_CENSUS_DELAY_FRAMES") {
            config.census_delay_frames = delay;
        }

        if let Some(seed) = env_parse::<u64>("DRIVER_SEED") {
            config.seed = seed;
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate_hz == 0 {
            return Err(ConfigError::ZeroDriverTickRate);
        }
        Ok(())
    }
}

/// Parse an environment variable, warning (and ignoring it) when malformed
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
            None
        }
    }
}

/// Parse a boolean flag: 1/0, true/false, on/off
fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
            None
        }
    }
}
