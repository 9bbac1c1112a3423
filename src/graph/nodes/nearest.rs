//! Nearest-K node
//!
//! Every member is a replication candidate; only the K closest to the
//! connection's single viewer (within a fixed cutoff) are interest.

use tracing::warn;

use super::{GatherParams, NodeStats, ReplicationNode};
use crate::graph::types::{ActorId, GatheredActorLists, GraphError};
use crate::util::vec2::Vec2;

#[derive(Debug)]
pub struct NearestActorsNode {
    name: &'static str,
    /// Members with their location as of the last candidate gather
    population: Vec<(ActorId, Vec2)>,
    max_nearest_actors: usize,
    cutoff_distance_squared: f32,
    sorted: Vec<(f32, ActorId)>,
    scratch: Vec<ActorId>,
}

impl NearestActorsNode {
    pub fn new(name: &'static str, max_nearest_actors: usize, cutoff_distance: f32) -> Self {
        Self {
            name,
            population: Vec::new(),
            max_nearest_actors,
            cutoff_distance_squared: cutoff_distance * cutoff_distance,
            sorted: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub fn add(&mut self, actor: ActorId, location: Vec2) {
        self.population.push((actor, location));
    }

    pub fn remove(&mut self, actor: ActorId) -> bool {
        match self.population.iter().position(|(a, _)| *a == actor) {
            Some(idx) => {
                self.population.swap_remove(idx);
                true
            }
            None => {
                warn!("Attempted to remove {} from {} but it was not found", actor, self.name);
                false
            }
        }
    }

    pub fn contains(&self, actor: ActorId) -> bool {
        self.population.iter().any(|(a, _)| *a == actor)
    }

    pub fn set_max_nearest_actors(&mut self, max: usize) {
        self.max_nearest_actors = max;
    }

    pub fn max_nearest_actors(&self) -> usize {
        self.max_nearest_actors
    }

    pub fn len(&self) -> usize {
        self.population.len()
    }

    pub fn is_empty(&self) -> bool {
        self.population.is_empty()
    }
}

impl ReplicationNode for NearestActorsNode {
    fn name(&self) -> &'static str {
        self.name
    }

    fn gather_actor_lists(
        &mut self,
        params: &mut GatherParams<'_>,
        out: &mut GatheredActorLists,
    ) -> Result<(), GraphError> {
        if self.population.is_empty() {
            return Ok(());
        }

        // Cache actor location
        self.scratch.clear();
        for (actor, location) in &mut self.population {
            if let Some(current) = params.actors.location(*actor) {
                *location = current;
            }
            self.scratch.push(*actor);
        }
        out.add_list(&self.scratch);
        Ok(())
    }

    fn gather_interest(
        &mut self,
        params: &mut GatherParams<'_>,
        out: &mut GatheredActorLists,
    ) -> Result<(), GraphError> {
        let count = self.population.len();
        if count == 0 {
            return Ok(());
        }

        self.scratch.clear();
        if count <= self.max_nearest_actors {
            self.scratch.extend(self.population.iter().map(|(a, _)| *a));
            out.add_list(&self.scratch);
            return Ok(());
        }

        let viewer = match params.viewers {
            [viewer] => viewer,
            viewers => {
                warn!("{} got {} viewers for {}", self.name, viewers.len(), params.connection);
                debug_assert!(false, "{} supports exactly one viewer per connection", self.name);
                return Err(GraphError::ViewerCount {
                    node: self.name,
                    viewers: viewers.len(),
                });
            }
        };

        self.sorted.clear();
        for &(actor, location) in &self.population {
            let distance_squared = viewer.location.distance_sq_to(location);
            if distance_squared < self.cutoff_distance_squared {
                self.sorted.push((distance_squared, actor));
            }
        }

        if self.sorted.len() > self.max_nearest_actors {
            self.sorted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            self.sorted.truncate(self.max_nearest_actors);
        }

        self.scratch.extend(self.sorted.iter().map(|(_, a)| *a));
        out.add_list(&self.scratch);
        Ok(())
    }

    fn stats(&self) -> NodeStats {
        NodeStats {
            name: self.name,
            actors: self.population.len(),
            lists: 1,
        }
    }
}
