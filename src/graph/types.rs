//! Shared handles and per-actor / per-connection bookkeeping
//!
//! The graph never owns actor lifetime: these types describe what the
//! simulation told us about an actor and what we remember per connection.

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use uuid::Uuid;

use super::class_registry::ClassId;
use crate::util::vec2::Vec2;

/// Replication frame counter (incremented once per server replication tick)
pub type ReplicationFrame = u32;

/// Opaque handle of a replicable actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// Network connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Streaming level name (cheap to clone, compared by content)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LevelName(Arc<str>);

impl LevelName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LevelName {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl fmt::Display for LevelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What routing needs to know about a newly replicated (or departing) actor
#[derive(Debug, Clone, PartialEq)]
pub struct ActorInfo {
    pub actor: ActorId,
    pub class: ClassId,
    /// Streaming level the actor lives in, `None` for the persistent level
    pub streaming_level: Option<LevelName>,
}

/// Global (connection independent) state of a live actor
#[derive(Debug, Clone)]
pub struct GlobalActorInfo {
    pub class: ClassId,
    pub location: Vec2,
    pub streaming_level: Option<LevelName>,
    pub dormant: bool,
    /// False while the actor is torn off / pending destruction
    pub valid_for_replication: bool,
}

/// Shared per-actor info map. Nodes read it during gather; only the
/// simulation-facing entry points on the graph write to it.
#[derive(Debug, Default)]
pub struct GlobalActorInfoMap {
    actors: FxHashMap<ActorId, GlobalActorInfo>,
}

impl GlobalActorInfoMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, actor: ActorId, info: GlobalActorInfo) -> Option<GlobalActorInfo> {
        self.actors.insert(actor, info)
    }

    pub fn remove(&mut self, actor: ActorId) -> Option<GlobalActorInfo> {
        self.actors.remove(&actor)
    }

    #[inline]
    pub fn get(&self, actor: ActorId) -> Option<&GlobalActorInfo> {
        self.actors.get(&actor)
    }

    #[inline]
    pub fn get_mut(&mut self, actor: ActorId) -> Option<&mut GlobalActorInfo> {
        self.actors.get_mut(&actor)
    }

    #[inline]
    pub fn location(&self, actor: ActorId) -> Option<Vec2> {
        self.actors.get(&actor).map(|info| info.location)
    }

    /// Whether an actor may be handed to the replication driver this frame
    #[inline]
    pub fn is_valid_for_replication(&self, actor: ActorId) -> bool {
        self.actors
            .get(&actor)
            .map_or(false, |info| info.valid_for_replication)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActorId, &GlobalActorInfo)> {
        self.actors.iter().map(|(id, info)| (*id, info))
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn clear(&mut self) {
        self.actors.clear();
    }
}

/// Per-connection settings for one actor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionActorInfo {
    /// Overrides the class cull distance for this connection
    pub cull_distance_squared: Option<f32>,
    /// Overrides the class replication period for this connection
    pub replication_period_frame: Option<u32>,
    pub dormant_on_connection: bool,
}

impl ConnectionActorInfo {
    pub fn set_cull_distance_squared(&mut self, value: f32) {
        self.cull_distance_squared = Some(value);
    }
}

#[derive(Debug, Default)]
pub struct ConnectionActorInfoMap {
    actors: FxHashMap<ActorId, ConnectionActorInfo>,
}

impl ConnectionActorInfoMap {
    pub fn find_or_add(&mut self, actor: ActorId) -> &mut ConnectionActorInfo {
        self.actors.entry(actor).or_default()
    }

    pub fn get(&self, actor: ActorId) -> Option<&ConnectionActorInfo> {
        self.actors.get(&actor)
    }

    pub fn remove(&mut self, actor: ActorId) {
        self.actors.remove(&actor);
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

/// One (controller, view target) pair of a connection for this tick
#[derive(Debug, Clone, PartialEq)]
pub struct NetViewer {
    /// Connection the viewer belongs to (a child connection for split screen)
    pub connection: ConnectionId,
    /// The controlling actor (player controller)
    pub controller: ActorId,
    /// The actor the camera is attached to
    pub view_target: ActorId,
    /// Pawn possessed by the controller, if it is a player controller
    pub pawn: Option<ActorId>,
    /// Player state owned by the controller
    pub player_state: Option<ActorId>,
    /// View location in world space
    pub location: Vec2,
}

impl NetViewer {
    /// Viewer whose controller is also its view target
    pub fn new(connection: ConnectionId, controller: ActorId, location: Vec2) -> Self {
        Self {
            connection,
            controller,
            view_target: controller,
            pawn: None,
            player_state: None,
            location,
        }
    }
}

/// Per-actor annotations handed downstream alongside a gathered list
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ActorOverrides {
    /// Replicate at least this often (in frames)
    pub min_replication_period: Option<u32>,
    /// Cull distance forced to zero for this connection
    pub zero_cull_distance: bool,
}

/// Merged output of every node's gather for one connection.
///
/// Actors keep the order in which they were first gathered; later
/// duplicates are dropped.
#[derive(Debug, Default)]
pub struct GatheredActorLists {
    actors: Vec<ActorId>,
    seen: FxHashSet<ActorId>,
    overrides: FxHashMap<ActorId, ActorOverrides>,
    lists: usize,
}

impl GatheredActorLists {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, actor: ActorId) {
        if self.seen.insert(actor) {
            self.actors.push(actor);
        }
    }

    /// Append a node's list, counting it as one gathered list
    pub fn add_list(&mut self, actors: &[ActorId]) {
        if actors.is_empty() {
            return;
        }
        self.lists += 1;
        for &actor in actors {
            self.add(actor);
        }
    }

    pub fn force_zero_cull_distance(&mut self, actor: ActorId) {
        self.overrides.entry(actor).or_default().zero_cull_distance = true;
    }

    pub fn force_replication_period(&mut self, actor: ActorId, period: u32) {
        let entry = self.overrides.entry(actor).or_default();
        entry.min_replication_period = Some(entry.min_replication_period.map_or(period, |p| p.min(period)));
    }

    pub fn actors(&self) -> &[ActorId] {
        &self.actors
    }

    pub fn overrides(&self, actor: ActorId) -> Option<&ActorOverrides> {
        self.overrides.get(&actor)
    }

    pub fn contains(&self, actor: ActorId) -> bool {
        self.seen.contains(&actor)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Number of non-empty node lists merged into this result
    pub fn list_count(&self) -> usize {
        self.lists
    }
}

/// Errors surfaced from the gather path. Everything else in the graph
/// degrades (logs and continues) instead of failing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),
    #[error("{node} supports exactly one viewer per connection, got {viewers}")]
    ViewerCount { node: &'static str, viewers: usize },
}
