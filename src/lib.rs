//! Replication Graph
//!
//! Per-connection relevancy for a replicated game server: actors are routed
//! by class to spatial, always-relevant, frequency-limited and nearest-K
//! nodes, and each tick every connection gathers its candidate and interest
//! lists from them.
//!
//! # Features
//!
//! - `console` - Debug console commands (routing printout, runtime tunables) (enabled by default)

pub mod config;
pub mod graph;
pub mod scenario;
pub mod util;

#[cfg(feature = "console")]
pub mod console;
