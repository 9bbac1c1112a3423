/// Spatial grid defaults
pub mod grid {
    /// Edge length of a grid cell in world units
    pub const CELL_SIZE: f32 = 10_000.0;
    /// Half-extent of the world along each axis (grid covers [-EXTENT, EXTENT])
    pub const WORLD_EXTENT: f32 = 2_097_152.0;
    /// Initial capacity for the cell map of a cull layer
    pub const LAYER_INITIAL_CELLS: usize = 256;
    /// Initial capacity for per-cell occupant lists
    pub const CELL_INITIAL_CAPACITY: usize = 8;
}

/// Per-class replication defaults (legacy per-actor settings)
pub mod class {
    /// Default cull distance squared for an actor (15000 units)
    pub const NET_CULL_DISTANCE_SQUARED: f32 = 225_000_000.0;
    /// Default update frequency in Hz
    pub const NET_UPDATE_FREQUENCY: f32 = 100.0;
    /// Default server replication tick rate in Hz
    pub const SERVER_MAX_TICK_RATE: f32 = 30.0;
    /// Default frames an actor channel may stay open without relevancy
    pub const ACTOR_CHANNEL_FRAME_TIMEOUT: u32 = 4;
    /// Class name prefixes of generated/transient artifact classes
    pub const TRANSIENT_PREFIXES: [&str; 2] = ["SKEL_", "REINST_"];
}

/// Frequency-limited bucket defaults
pub mod buckets {
    /// Actors per bucket returned to each connection per frame
    pub const TARGET_ACTORS_PER_FRAME: usize = 2;
    /// Actors per bucket when spatial networking is enabled. The owning
    /// connection's player state is no longer replicated every frame there.
    pub const TARGET_ACTORS_PER_FRAME_SPATIAL: usize = 16;
}

/// Nearest-K defaults
pub mod nearest {
    /// Maximum actors returned as interest per connection
    pub const MAX_NEAREST_ACTORS: usize = 1024;
    /// Interest cutoff distance (world units)
    pub const CUTOFF_DISTANCE: f32 = 15_000.0;
}

/// Per-connection defaults
pub mod connection {
    /// Inline capacity of the visible streaming level set
    pub const VISIBLE_LEVELS_INLINE: usize = 8;
    /// Inline capacity of the viewer list for one connection
    pub const VIEWERS_INLINE: usize = 2;
}
