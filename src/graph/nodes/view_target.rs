//! Viewers and their view targets for every connection (spatial networking)
//!
//! Stands in for the per-connection always-relevant node when spatial
//! networking handles level and owner relevancy.

use super::{GatherParams, NodeStats, ReplicationNode};
use crate::graph::types::{ActorId, GatheredActorLists, GraphError, NetViewer};

#[derive(Debug, Default)]
pub struct GlobalViewTargetNode {
    list: Vec<ActorId>,
}

impl GlobalViewTargetNode {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect(&mut self, viewers: &[NetViewer]) {
        self.list.clear();
        for viewer in viewers {
            for actor in [Some(viewer.controller), Some(viewer.view_target), viewer.pawn]
                .into_iter()
                .flatten()
            {
                if !self.list.contains(&actor) {
                    self.list.push(actor);
                }
            }
        }
    }
}

impl ReplicationNode for GlobalViewTargetNode {
    fn name(&self) -> &'static str {
        "GlobalViewTarget"
    }

    fn gather_actor_lists(
        &mut self,
        params: &mut GatherParams<'_>,
        out: &mut GatheredActorLists,
    ) -> Result<(), GraphError> {
        self.collect(params.viewers);
        out.add_list(&self.list);
        Ok(())
    }

    fn gather_interest(
        &mut self,
        params: &mut GatherParams<'_>,
        out: &mut GatheredActorLists,
    ) -> Result<(), GraphError> {
        self.collect(params.viewers);
        out.add_list(&self.list);
        Ok(())
    }

    fn stats(&self) -> NodeStats {
        NodeStats {
            name: self.name(),
            actors: self.list.len(),
            lists: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::nodes::test_support::Fixture;
    use crate::util::vec2::Vec2;

    #[test]
    fn test_viewer_target_and_distinct_pawn() {
        let mut fixture = Fixture::new();
        let conn = fixture.connection;
        let viewers = [NetViewer {
            view_target: ActorId(2),
            pawn: Some(ActorId(3)),
            ..NetViewer::new(conn, ActorId(1), Vec2::ZERO)
        }];
        let mut node = GlobalViewTargetNode::new();

        let mut out = GatheredActorLists::new();
        let mut params = fixture.params(0, &viewers);
        assert!(node.gather_actor_lists(&mut params, &mut out).is_ok());
        assert_eq!(out.actors(), &[ActorId(1), ActorId(2), ActorId(3)]);
    }

    #[test]
    fn test_pawn_equal_to_view_target_listed_once() {
        let mut fixture = Fixture::new();
        let conn = fixture.connection;
        let viewers = [NetViewer {
            view_target: ActorId(2),
            pawn: Some(ActorId(2)),
            ..NetViewer::new(conn, ActorId(1), Vec2::ZERO)
        }];
        let mut node = GlobalViewTargetNode::new();

        let mut out = GatheredActorLists::new();
        let mut params = fixture.params(0, &viewers);
        assert!(node.gather_interest(&mut params, &mut out).is_ok());
        assert_eq!(out.actors(), &[ActorId(1), ActorId(2)]);
    }
}
