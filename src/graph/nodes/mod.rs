//! Routing nodes
//!
//! Each node owns the membership lists for one routing policy and answers two
//! per-connection queries: the replication candidates and the interest set.
//! Nodes never share membership: an actor routed to one node is in no other
//! node's list.

pub mod always_relevant;
pub mod connection;
pub mod frequency;
pub mod grid;
pub mod nearest;
pub mod view_target;

use serde::Serialize;

use super::types::{
    ActorId, ConnectionActorInfoMap, ConnectionId, GatheredActorLists, GlobalActorInfoMap, GraphError,
    NetViewer, ReplicationFrame,
};
use connection::StreamingLevelActors;

/// Everything a node may read (and the per-connection state it may write)
/// while gathering for one connection
pub struct GatherParams<'a> {
    pub frame: ReplicationFrame,
    pub connection: ConnectionId,
    /// Order in which the connection was opened (0 for the first)
    pub connection_order: u32,
    pub viewers: &'a [NetViewer],
    pub actors: &'a GlobalActorInfoMap,
    pub connection_actors: &'a mut ConnectionActorInfoMap,
    pub streaming_levels: &'a StreamingLevelActors,
}

/// Snapshot of a node's membership for debug output
#[derive(Debug, Clone, Serialize)]
pub struct NodeStats {
    pub name: &'static str,
    /// Actors owned by the node
    pub actors: usize,
    /// Internal lists (cells, buckets, levels)
    pub lists: usize,
}

pub trait ReplicationNode {
    fn name(&self) -> &'static str;

    /// Called once per replication frame before any connection is gathered
    fn prepare(&mut self, _frame: ReplicationFrame, _actors: &GlobalActorInfoMap) {}

    /// Append this node's replication candidates for one connection
    fn gather_actor_lists(
        &mut self,
        params: &mut GatherParams<'_>,
        out: &mut GatheredActorLists,
    ) -> Result<(), GraphError>;

    /// Append this node's interest set for one connection
    fn gather_interest(
        &mut self,
        params: &mut GatherParams<'_>,
        out: &mut GatheredActorLists,
    ) -> Result<(), GraphError>;

    fn stats(&self) -> NodeStats;
}

/// Remove `actor` from an unordered list, warning when it is missing
pub(crate) fn remove_fast(list: &mut Vec<ActorId>, actor: ActorId, node: &str) -> bool {
    match list.iter().position(|&a| a == actor) {
        Some(idx) => {
            list.swap_remove(idx);
            true
        }
        None => {
            tracing::warn!("Attempted to remove {} from {} but it was not found", actor, node);
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::graph::class_registry::ClassId;
    use crate::graph::types::GlobalActorInfo;
    use crate::util::vec2::Vec2;

    /// Owned backing storage for `GatherParams` in node tests
    pub struct Fixture {
        pub actors: GlobalActorInfoMap,
        pub connection_actors: ConnectionActorInfoMap,
        pub streaming_levels: StreamingLevelActors,
        pub connection: ConnectionId,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self {
                actors: GlobalActorInfoMap::new(),
                connection_actors: ConnectionActorInfoMap::default(),
                streaming_levels: StreamingLevelActors::default(),
                connection: ConnectionId::new(),
            }
        }

        pub fn spawn(&mut self, id: u64, location: Vec2) -> ActorId {
            let actor = ActorId(id);
            self.actors.insert(
                actor,
                GlobalActorInfo {
                    class: ClassId(0),
                    location,
                    streaming_level: None,
                    dormant: false,
                    valid_for_replication: true,
                },
            );
            actor
        }

        pub fn params<'a>(&'a mut self, frame: ReplicationFrame, viewers: &'a [NetViewer]) -> GatherParams<'a> {
            GatherParams {
                frame,
                connection: self.connection,
                connection_order: 0,
                viewers,
                actors: &self.actors,
                connection_actors: &mut self.connection_actors,
                streaming_levels: &self.streaming_levels,
            }
        }
    }
}
