//! Replication graph
//!
//! Per-connection relevancy: which actors each client connection should be
//! sent this frame, and which actors are of interest to it.

pub mod class_registry;
pub mod constants;
pub mod nodes;
pub mod policy;
pub mod replication_graph;
pub mod scheduler;
pub mod types;

pub use class_registry::{ClassId, ClassRegistry};
pub use policy::RoutingPolicy;
pub use replication_graph::{ConnectionGather, GraphStats, ReplicationGraph, Route};
pub use types::{ActorId, ActorInfo, ConnectionId, GraphError, LevelName, NetViewer};
