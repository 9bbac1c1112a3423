//! Per-connection always-relevant node and the streaming-level lists it reads
//!
//! Every frame the node returns the connection's viewers, their view targets
//! and pawns, the owning player state (throttled to every other frame), and
//! the always-relevant actors of streaming levels the client has visible.
//! A per-viewer history of the last pawn and view target detects transitions
//! so the cull distance reset happens once per change, not every frame.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{trace, warn};

use super::{GatherParams, NodeStats, ReplicationNode};
use crate::graph::constants::connection::{VIEWERS_INLINE, VISIBLE_LEVELS_INLINE};
use crate::graph::types::{ActorId, ConnectionId, GatheredActorLists, GraphError, LevelName};

/// Always-relevant actors of streaming levels, keyed by level name.
/// Owned by the graph, read by every connection's node.
#[derive(Debug, Default)]
pub struct StreamingLevelActors {
    levels: FxHashMap<LevelName, Vec<ActorId>>,
}

impl StreamingLevelActors {
    pub fn add(&mut self, level: &LevelName, actor: ActorId) {
        let list = self.levels.entry(level.clone()).or_default();
        if !list.contains(&actor) {
            list.push(actor);
        }
    }

    /// The level's list is kept even when it becomes empty
    pub fn remove(&mut self, level: &LevelName, actor: ActorId) -> bool {
        let removed = self.levels.get_mut(level).map_or(false, |list| {
            match list.iter().position(|&a| a == actor) {
                Some(idx) => {
                    list.swap_remove(idx);
                    true
                }
                None => false,
            }
        });
        if !removed {
            warn!(
                "Attempted to remove {} from streaming level {} list but it was not found",
                actor, level
            );
        }
        removed
    }

    pub fn get(&self, level: &LevelName) -> Option<&[ActorId]> {
        self.levels.get(level).map(Vec::as_slice)
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn actor_count(&self) -> usize {
        self.levels.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }
}

#[derive(Debug, Clone)]
struct TransitionRecord {
    connection: ConnectionId,
    last_viewer: Option<ActorId>,
    last_view_target: Option<ActorId>,
}

#[derive(Debug)]
pub struct AlwaysRelevantForConnectionNode {
    replication_list: Vec<ActorId>,
    visible_levels: SmallVec<[LevelName; VISIBLE_LEVELS_INLINE]>,
    history: SmallVec<[TransitionRecord; VIEWERS_INLINE]>,
    initialized_player_state: bool,
    throttle_player_state: bool,
}

impl AlwaysRelevantForConnectionNode {
    pub fn new(throttle_player_state: bool) -> Self {
        Self {
            replication_list: Vec::new(),
            visible_levels: SmallVec::new(),
            history: SmallVec::new(),
            initialized_player_state: false,
            throttle_player_state,
        }
    }

    pub fn on_level_visibility_add(&mut self, level: LevelName) {
        if !self.visible_levels.contains(&level) {
            self.visible_levels.push(level);
        }
    }

    pub fn on_level_visibility_remove(&mut self, level: &LevelName) {
        self.visible_levels.retain(|l| l != level);
    }

    /// Levels that still need replication for this connection
    pub fn visible_levels(&self) -> &[LevelName] {
        &self.visible_levels
    }

    pub fn reset_world_state(&mut self) {
        self.visible_levels.clear();
        self.history.clear();
    }

    fn push_unique(&mut self, actor: ActorId) {
        if !self.replication_list.contains(&actor) {
            self.replication_list.push(actor);
        }
    }
}

/// Record `actor` as the latest value of `last`. On change, the actor that
/// left and the one that arrived both get a zero cull distance on this
/// connection.
fn note_transition(
    actor: ActorId,
    last: &mut Option<ActorId>,
    params: &mut GatherParams<'_>,
    forced: &mut SmallVec<[ActorId; 4]>,
) {
    if *last == Some(actor) {
        return;
    }
    if let Some(previous) = last.replace(actor) {
        if params.actors.get(previous).is_some() {
            params.connection_actors.find_or_add(previous).set_cull_distance_squared(0.0);
            forced.push(previous);
        }
    }
    trace!("Setting cull distance to 0 for {} on {}", actor, params.connection);
    params.connection_actors.find_or_add(actor).set_cull_distance_squared(0.0);
    forced.push(actor);
}

impl ReplicationNode for AlwaysRelevantForConnectionNode {
    fn name(&self) -> &'static str {
        "AlwaysRelevantForConnection"
    }

    fn gather_actor_lists(
        &mut self,
        params: &mut GatherParams<'_>,
        out: &mut GatheredActorLists,
    ) -> Result<(), GraphError> {
        self.replication_list.clear();
        let mut forced: SmallVec<[ActorId; 4]> = SmallVec::new();

        for viewer in params.viewers {
            self.push_unique(viewer.controller);
            self.push_unique(viewer.view_target);

            if let Some(player_state) = viewer.player_state {
                // Every other frame, alternating by connection
                let replicate_ps =
                    !self.throttle_player_state || params.connection_order % 2 == params.frame % 2;
                if replicate_ps {
                    if !self.initialized_player_state {
                        self.initialized_player_state = true;
                        params.connection_actors.find_or_add(player_state).replication_period_frame = Some(1);
                        out.force_replication_period(player_state, 1);
                    }
                    self.push_unique(player_state);
                }
            }

            let idx = match self.history.iter().position(|r| r.connection == viewer.connection) {
                Some(idx) => idx,
                None => {
                    self.history.push(TransitionRecord {
                        connection: viewer.connection,
                        last_viewer: None,
                        last_view_target: None,
                    });
                    self.history.len() - 1
                }
            };

            let record = &mut self.history[idx];
            if let Some(pawn) = viewer.pawn {
                note_transition(pawn, &mut record.last_viewer, params, &mut forced);
            }
            note_transition(viewer.view_target, &mut record.last_view_target, params, &mut forced);

            if let Some(pawn) = viewer.pawn {
                if pawn != viewer.view_target {
                    self.push_unique(pawn);
                }
            }
        }

        for &actor in &forced {
            self.push_unique(actor);
            out.force_zero_cull_distance(actor);
        }

        // Drop history of viewers no longer present
        let viewers = params.viewers;
        self.history
            .retain(|record| viewers.iter().any(|v| v.connection == record.connection));

        out.add_list(&self.replication_list);

        let mut idx = self.visible_levels.len();
        while idx > 0 {
            idx -= 1;
            match params.streaming_levels.get(&self.visible_levels[idx]) {
                None => {
                    // No always relevant lists for that level
                    self.visible_levels.swap_remove(idx);
                }
                Some([]) => {
                    warn!(
                        "Empty always-relevant list for streaming level {} on {}",
                        self.visible_levels[idx], params.connection
                    );
                }
                Some(list) => {
                    let all_dormant = list.iter().all(|&actor| {
                        params
                            .connection_actors
                            .get(actor)
                            .map_or(false, |info| info.dormant_on_connection)
                    });
                    if all_dormant {
                        self.visible_levels.swap_remove(idx);
                    } else {
                        out.add_list(list);
                    }
                }
            }
        }

        Ok(())
    }

    fn gather_interest(
        &mut self,
        params: &mut GatherParams<'_>,
        out: &mut GatheredActorLists,
    ) -> Result<(), GraphError> {
        let mut interest: SmallVec<[ActorId; 8]> = SmallVec::new();
        for viewer in params.viewers {
            interest.push(viewer.controller);
            interest.push(viewer.view_target);
            if let Some(player_state) = viewer.player_state {
                interest.push(player_state);
            }
        }
        out.add_list(&interest);

        for level in self.visible_levels.iter().rev() {
            if let Some(list) = params.streaming_levels.get(level) {
                out.add_list(list);
            }
        }
        Ok(())
    }

    fn stats(&self) -> NodeStats {
        NodeStats {
            name: self.name(),
            actors: self.replication_list.len(),
            lists: self.visible_levels.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::nodes::test_support::Fixture;
    use crate::graph::types::NetViewer;
    use crate::util::vec2::Vec2;

    const CONTROLLER: ActorId = ActorId(1);
    const PLAYER_STATE: ActorId = ActorId(2);

    fn viewer(connection: ConnectionId, view_target: ActorId) -> NetViewer {
        NetViewer {
            view_target,
            pawn: Some(view_target),
            player_state: Some(PLAYER_STATE),
            ..NetViewer::new(connection, CONTROLLER, Vec2::ZERO)
        }
    }

    fn gather(node: &mut AlwaysRelevantForConnectionNode, fixture: &mut Fixture, frame: u32, viewers: &[NetViewer]) -> GatheredActorLists {
        let mut out = GatheredActorLists::new();
        let mut params = fixture.params(frame, viewers);
        assert!(node.gather_actor_lists(&mut params, &mut out).is_ok());
        out
    }

    fn spawn_pawns(fixture: &mut Fixture) {
        for id in 1..=12 {
            fixture.spawn(id, Vec2::ZERO);
        }
    }

    #[test]
    fn test_viewer_target_and_pawn() {
        let mut fixture = Fixture::new();
        let conn = fixture.connection;
        spawn_pawns(&mut fixture);
        let mut node = AlwaysRelevantForConnectionNode::new(true);

        let mut spectating = viewer(conn, ActorId(10));
        spectating.pawn = Some(ActorId(11));
        let out = gather(&mut node, &mut fixture, 0, &[spectating]);

        assert!(out.contains(CONTROLLER));
        assert!(out.contains(ActorId(10)));
        assert!(out.contains(ActorId(11)));
        assert!(out.contains(PLAYER_STATE));
    }

    #[test]
    fn test_player_state_throttled_and_initialized_once() {
        let mut fixture = Fixture::new();
        let conn = fixture.connection;
        spawn_pawns(&mut fixture);
        let mut node = AlwaysRelevantForConnectionNode::new(true);
        let viewers = [viewer(conn, ActorId(10))];

        // Connection order 0 replicates the player state on even frames
        let odd = gather(&mut node, &mut fixture, 1, &viewers);
        assert!(!odd.contains(PLAYER_STATE));

        let even = gather(&mut node, &mut fixture, 2, &viewers);
        assert!(even.contains(PLAYER_STATE));
        assert_eq!(
            even.overrides(PLAYER_STATE).and_then(|o| o.min_replication_period),
            Some(1)
        );
        assert_eq!(
            fixture.connection_actors.get(PLAYER_STATE).and_then(|i| i.replication_period_frame),
            Some(1)
        );

        let next_even = gather(&mut node, &mut fixture, 4, &viewers);
        assert!(next_even.contains(PLAYER_STATE));
        assert!(next_even.overrides(PLAYER_STATE).is_none());

        let mut unthrottled = AlwaysRelevantForConnectionNode::new(false);
        let out = gather(&mut unthrottled, &mut fixture, 1, &viewers);
        assert!(out.contains(PLAYER_STATE));
    }

    #[test]
    fn test_view_target_transition_forces_zero_cull_once() {
        let mut fixture = Fixture::new();
        let conn = fixture.connection;
        spawn_pawns(&mut fixture);
        let mut node = AlwaysRelevantForConnectionNode::new(true);
        let x = ActorId(10);
        let y = ActorId(11);

        let first = gather(&mut node, &mut fixture, 0, &[viewer(conn, x)]);
        assert!(first.overrides(x).map_or(false, |o| o.zero_cull_distance));

        let steady = gather(&mut node, &mut fixture, 1, &[viewer(conn, x)]);
        assert!(steady.overrides(x).is_none());

        let changed = gather(&mut node, &mut fixture, 2, &[viewer(conn, y)]);
        for actor in [x, y] {
            assert!(changed.contains(actor));
            assert!(changed.overrides(actor).map_or(false, |o| o.zero_cull_distance));
            assert_eq!(
                fixture.connection_actors.get(actor).and_then(|i| i.cull_distance_squared),
                Some(0.0)
            );
        }

        let after = gather(&mut node, &mut fixture, 3, &[viewer(conn, y)]);
        assert!(after.overrides(x).is_none());
        assert!(after.overrides(y).is_none());
        assert!(!after.contains(x));
    }

    #[test]
    fn test_history_pruned_for_absent_viewers() {
        let mut fixture = Fixture::new();
        let conn = fixture.connection;
        spawn_pawns(&mut fixture);
        let mut node = AlwaysRelevantForConnectionNode::new(true);

        let first = viewer(conn, ActorId(10));
        let mut split = viewer(conn, ActorId(11));
        split.connection = ConnectionId::new();
        gather(&mut node, &mut fixture, 0, &[first.clone(), split]);
        assert_eq!(node.history.len(), 2);

        gather(&mut node, &mut fixture, 1, &[first]);
        assert_eq!(node.history.len(), 1);

        gather(&mut node, &mut fixture, 2, &[]);
        assert!(node.history.is_empty());
    }

    #[test]
    fn test_streaming_levels() {
        let mut fixture = Fixture::new();
        let conn = fixture.connection;
        spawn_pawns(&mut fixture);
        let level_a = LevelName::from("Level_A");
        let level_b = LevelName::from("Level_B");
        let missing = LevelName::from("Level_Missing");
        fixture.streaming_levels.add(&level_a, ActorId(5));
        fixture.streaming_levels.add(&level_b, ActorId(6));

        let mut node = AlwaysRelevantForConnectionNode::new(true);
        node.on_level_visibility_add(level_a.clone());
        node.on_level_visibility_add(level_b.clone());
        node.on_level_visibility_add(missing.clone());

        fixture.connection_actors.find_or_add(ActorId(6)).dormant_on_connection = true;
        let viewers = [viewer(conn, ActorId(10))];
        let out = gather(&mut node, &mut fixture, 0, &viewers);

        assert!(out.contains(ActorId(5)));
        assert!(!out.contains(ActorId(6)));
        // Missing list and all-dormant level are dropped
        assert_eq!(node.visible_levels(), &[level_a.clone()]);

        node.on_level_visibility_remove(&level_a);
        let out = gather(&mut node, &mut fixture, 1, &viewers);
        assert!(!out.contains(ActorId(5)));
    }

    #[test]
    fn test_empty_level_list_is_kept() {
        let mut fixture = Fixture::new();
        let conn = fixture.connection;
        let level = LevelName::from("Level_Empty");
        fixture.streaming_levels.add(&level, ActorId(5));
        assert!(fixture.streaming_levels.remove(&level, ActorId(5)));
        assert!(!fixture.streaming_levels.remove(&level, ActorId(5)));

        let mut node = AlwaysRelevantForConnectionNode::new(true);
        node.on_level_visibility_add(level.clone());
        gather(&mut node, &mut fixture, 0, &[]);
        assert_eq!(node.visible_levels(), &[level]);
    }

    #[test]
    fn test_interest_ignores_throttle_and_dormancy() {
        let mut fixture = Fixture::new();
        let conn = fixture.connection;
        spawn_pawns(&mut fixture);
        let level = LevelName::from("Level_A");
        fixture.streaming_levels.add(&level, ActorId(6));
        fixture.connection_actors.find_or_add(ActorId(6)).dormant_on_connection = true;

        let mut node = AlwaysRelevantForConnectionNode::new(true);
        node.on_level_visibility_add(level);
        let viewers = [viewer(conn, ActorId(10))];

        let mut out = GatheredActorLists::new();
        let mut params = fixture.params(1, &viewers);
        assert!(node.gather_interest(&mut params, &mut out).is_ok());
        assert!(out.contains(PLAYER_STATE));
        assert!(out.contains(ActorId(6)));
        assert_eq!(node.visible_levels().len(), 1);
    }

    #[test]
    fn test_reset_world_state() {
        let mut fixture = Fixture::new();
        let conn = fixture.connection;
        spawn_pawns(&mut fixture);
        let mut node = AlwaysRelevantForConnectionNode::new(true);
        node.on_level_visibility_add(LevelName::from("Level_A"));
        gather(&mut node, &mut fixture, 0, &[viewer(conn, ActorId(10))]);

        node.reset_world_state();
        assert!(node.visible_levels().is_empty());
        assert!(node.history.is_empty());
    }
}
