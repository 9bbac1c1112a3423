//! Frequency-limited buckets for player-state style populations
//!
//! The population is split into buckets every frame and each connection gets
//! `buckets[frame % bucket_count]`, so every member is returned once per
//! `bucket_count` frames. Buckets are rebuilt from scratch in `prepare`:
//! members leaving never leave holes behind.

use tracing::{trace, warn};

use super::{GatherParams, NodeStats, ReplicationNode};
use crate::graph::types::{ActorId, GatheredActorLists, GlobalActorInfoMap, GraphError, ReplicationFrame};

#[derive(Debug)]
pub struct FrequencyBucketNode {
    /// Live members in spawn order
    population: Vec<ActorId>,
    buckets: Vec<Vec<ActorId>>,
    /// Members valid for replication this frame
    interest: Vec<ActorId>,
    force_net_update: Vec<ActorId>,
    /// Requested since the last prepare
    pending_force_net_update: Vec<ActorId>,
    target_actors_per_bucket: usize,
    fixed_bucket_count: Option<usize>,
}

impl FrequencyBucketNode {
    pub fn new(target_actors_per_bucket: usize, fixed_bucket_count: Option<usize>) -> Self {
        Self {
            population: Vec::new(),
            buckets: vec![Vec::new()],
            interest: Vec::new(),
            force_net_update: Vec::new(),
            pending_force_net_update: Vec::new(),
            target_actors_per_bucket: target_actors_per_bucket.max(1),
            fixed_bucket_count: fixed_bucket_count.filter(|&n| n > 0),
        }
    }

    pub fn add(&mut self, actor: ActorId) {
        self.population.push(actor);
    }

    pub fn remove(&mut self, actor: ActorId) -> bool {
        self.pending_force_net_update.retain(|&a| a != actor);
        match self.population.iter().position(|&a| a == actor) {
            // Keep spawn order so bucket assignment stays stable
            Some(idx) => {
                self.population.remove(idx);
                true
            }
            None => {
                warn!("Attempted to remove {} from {} but it was not found", actor, self.name());
                false
            }
        }
    }

    pub fn contains(&self, actor: ActorId) -> bool {
        self.population.contains(&actor)
    }

    /// Return `actor` to every connection next frame, outside its bucket
    pub fn force_net_update(&mut self, actor: ActorId) -> bool {
        if !self.contains(actor) {
            return false;
        }
        if !self.pending_force_net_update.contains(&actor) {
            self.pending_force_net_update.push(actor);
        }
        true
    }

    pub fn set_target_actors_per_bucket(&mut self, target: usize) {
        self.target_actors_per_bucket = target.max(1);
    }

    /// Fix the number of buckets instead of the bucket size (`None` to undo)
    pub fn set_bucket_count(&mut self, count: Option<usize>) {
        self.fixed_bucket_count = count.filter(|&n| n > 0);
    }

    pub fn target_actors_per_bucket(&self) -> usize {
        self.target_actors_per_bucket
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn buckets(&self) -> &[Vec<ActorId>] {
        &self.buckets
    }

    pub fn population(&self) -> &[ActorId] {
        &self.population
    }

    fn bucket_size(&self, valid: usize) -> usize {
        match self.fixed_bucket_count {
            Some(count) => valid.div_ceil(count).max(1),
            None => self.target_actors_per_bucket,
        }
    }
}

impl ReplicationNode for FrequencyBucketNode {
    fn name(&self) -> &'static str {
        "FrequencyBuckets"
    }

    fn prepare(&mut self, frame: ReplicationFrame, actors: &GlobalActorInfoMap) {
        self.force_net_update.clear();
        std::mem::swap(&mut self.force_net_update, &mut self.pending_force_net_update);

        self.interest.clear();
        self.interest.extend(
            self.population
                .iter()
                .copied()
                .filter(|&actor| actors.is_valid_for_replication(actor)),
        );

        let bucket_size = self.bucket_size(self.interest.len());
        let mut buckets = std::mem::take(&mut self.buckets);
        for bucket in &mut buckets {
            bucket.clear();
        }
        let mut used = 1;
        if buckets.is_empty() {
            buckets.push(Vec::with_capacity(bucket_size));
        }

        for &actor in &self.interest {
            if buckets[used - 1].len() >= bucket_size {
                if buckets.len() == used {
                    buckets.push(Vec::with_capacity(bucket_size));
                }
                used += 1;
            }
            buckets[used - 1].push(actor);
        }
        buckets.truncate(used);
        self.buckets = buckets;

        trace!(
            "Frame {}: {} bucketed members in {} buckets of {}",
            frame,
            self.interest.len(),
            self.buckets.len(),
            bucket_size
        );
    }

    fn gather_actor_lists(
        &mut self,
        params: &mut GatherParams<'_>,
        out: &mut GatheredActorLists,
    ) -> Result<(), GraphError> {
        let idx = params.frame as usize % self.buckets.len().max(1);
        if let Some(bucket) = self.buckets.get(idx) {
            out.add_list(bucket);
        }
        out.add_list(&self.force_net_update);
        Ok(())
    }

    fn gather_interest(
        &mut self,
        _params: &mut GatherParams<'_>,
        out: &mut GatheredActorLists,
    ) -> Result<(), GraphError> {
        out.add_list(&self.interest);
        out.add_list(&self.force_net_update);
        Ok(())
    }

    fn stats(&self) -> NodeStats {
        NodeStats {
            name: self.name(),
            actors: self.population.len(),
            lists: self.buckets.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::nodes::test_support::Fixture;
    use crate::util::vec2::Vec2;
    use std::collections::HashMap;

    fn populated(fixture: &mut Fixture, node: &mut FrequencyBucketNode, count: u64) {
        for id in 0..count {
            node.add(fixture.spawn(id, Vec2::ZERO));
        }
    }

    fn gather(node: &mut FrequencyBucketNode, fixture: &mut Fixture, frame: u32) -> GatheredActorLists {
        let mut out = GatheredActorLists::new();
        let mut params = fixture.params(frame, &[]);
        assert!(node.gather_actor_lists(&mut params, &mut out).is_ok());
        out
    }

    #[test]
    fn test_rotation_covers_population_exactly_once() {
        let mut fixture = Fixture::new();
        let mut node = FrequencyBucketNode::new(10, None);
        populated(&mut fixture, &mut node, 50);

        let mut seen: HashMap<ActorId, usize> = HashMap::new();
        for frame in 0..5 {
            node.prepare(frame, &fixture.actors);
            assert_eq!(node.bucket_count(), 5);
            let out = gather(&mut node, &mut fixture, frame);
            assert_eq!(out.len(), 10);
            for &actor in out.actors() {
                *seen.entry(actor).or_default() += 1;
            }
        }
        assert_eq!(seen.len(), 50);
        assert!(seen.values().all(|&n| n == 1));
    }

    #[test]
    fn test_invalid_actors_skipped() {
        let mut fixture = Fixture::new();
        let mut node = FrequencyBucketNode::new(2, None);
        populated(&mut fixture, &mut node, 4);
        if let Some(info) = fixture.actors.get_mut(ActorId(1)) {
            info.valid_for_replication = false;
        }

        node.prepare(0, &fixture.actors);
        assert_eq!(node.buckets(), &[vec![ActorId(0), ActorId(2)], vec![ActorId(3)]]);
    }

    #[test]
    fn test_fixed_bucket_count() {
        let mut fixture = Fixture::new();
        let mut node = FrequencyBucketNode::new(2, Some(4));
        populated(&mut fixture, &mut node, 10);

        node.prepare(0, &fixture.actors);
        let sizes: Vec<_> = node.buckets().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);

        node.set_bucket_count(None);
        node.prepare(1, &fixture.actors);
        assert_eq!(node.bucket_count(), 5);
    }

    #[test]
    fn test_empty_population() {
        let mut fixture = Fixture::new();
        let mut node = FrequencyBucketNode::new(10, None);
        node.prepare(7, &fixture.actors);
        assert_eq!(node.bucket_count(), 1);
        assert!(gather(&mut node, &mut fixture, 7).is_empty());
    }

    #[test]
    fn test_force_net_update_for_one_frame() {
        let mut fixture = Fixture::new();
        let mut node = FrequencyBucketNode::new(10, None);
        populated(&mut fixture, &mut node, 30);

        // Actor 25 lives in bucket 2
        assert!(node.force_net_update(ActorId(25)));
        assert!(!node.force_net_update(ActorId(99)));

        node.prepare(0, &fixture.actors);
        let out = gather(&mut node, &mut fixture, 0);
        assert!(out.contains(ActorId(25)));
        assert_eq!(out.len(), 11);
        assert_eq!(out.list_count(), 2);

        node.prepare(1, &fixture.actors);
        let out = gather(&mut node, &mut fixture, 1);
        assert!(!out.contains(ActorId(25)));
    }

    #[test]
    fn test_interest_is_whole_population() {
        let mut fixture = Fixture::new();
        let mut node = FrequencyBucketNode::new(10, None);
        populated(&mut fixture, &mut node, 25);
        node.prepare(0, &fixture.actors);

        let mut out = GatheredActorLists::new();
        let mut params = fixture.params(0, &[]);
        assert!(node.gather_interest(&mut params, &mut out).is_ok());
        assert_eq!(out.len(), 25);
    }

    #[test]
    fn test_remove() {
        let mut fixture = Fixture::new();
        let mut node = FrequencyBucketNode::new(10, None);
        populated(&mut fixture, &mut node, 3);

        assert!(node.remove(ActorId(1)));
        assert!(!node.remove(ActorId(1)));
        assert_eq!(node.population(), &[ActorId(0), ActorId(2)]);
    }
}
