//! Global always-relevant list: the same actors for every connection

use super::{remove_fast, GatherParams, NodeStats, ReplicationNode};
use crate::graph::types::{ActorId, GatheredActorLists, GraphError};

#[derive(Debug, Default)]
pub struct ActorListNode {
    actors: Vec<ActorId>,
}

impl ActorListNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, actor: ActorId) {
        self.actors.push(actor);
    }

    /// Returns false (and warns) when the actor was never added
    pub fn remove(&mut self, actor: ActorId) -> bool {
        let name = self.name();
        remove_fast(&mut self.actors, actor, name)
    }

    pub fn contains(&self, actor: ActorId) -> bool {
        self.actors.contains(&actor)
    }

    pub fn actors(&self) -> &[ActorId] {
        &self.actors
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

impl ReplicationNode for ActorListNode {
    fn name(&self) -> &'static str {
        "AlwaysRelevant"
    }

    fn gather_actor_lists(
        &mut self,
        _params: &mut GatherParams<'_>,
        out: &mut GatheredActorLists,
    ) -> Result<(), GraphError> {
        out.add_list(&self.actors);
        Ok(())
    }

    fn gather_interest(
        &mut self,
        _params: &mut GatherParams<'_>,
        out: &mut GatheredActorLists,
    ) -> Result<(), GraphError> {
        out.add_list(&self.actors);
        Ok(())
    }

    fn stats(&self) -> NodeStats {
        NodeStats {
            name: self.name(),
            actors: self.actors.len(),
            lists: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::nodes::test_support::Fixture;

    #[test]
    fn test_returns_whole_set_every_frame() {
        let mut fixture = Fixture::new();
        let mut node = ActorListNode::new();
        node.add(ActorId(1));
        node.add(ActorId(2));

        for frame in 0..3 {
            let mut out = GatheredActorLists::new();
            let mut params = fixture.params(frame, &[]);
            assert!(node.gather_actor_lists(&mut params, &mut out).is_ok());
            assert_eq!(out.actors(), &[ActorId(1), ActorId(2)]);
        }
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut node = ActorListNode::new();
        node.add(ActorId(1));

        assert!(!node.remove(ActorId(9)));
        assert_eq!(node.len(), 1);
        assert!(node.remove(ActorId(1)));
        assert!(node.is_empty());
    }
}
