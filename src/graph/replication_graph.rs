//! Graph dispatcher
//!
//! Owns every node, routes actor add/remove events to exactly one node by
//! class policy, and merges each node's per-connection output into one
//! replication list and one interest list.
//!
//! Tick order:
//! 1. simulation events (`add_network_actor`, `set_location`, ...) applied immediately
//! 2. `begin_replication_frame` runs due tasks, then every node's `prepare`
//! 3. `gather_for_connection` once per connection, in connection open order

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::class_registry::{ClassId, ClassRegistry};
use super::nodes::always_relevant::ActorListNode;
use super::nodes::connection::{AlwaysRelevantForConnectionNode, StreamingLevelActors};
use super::nodes::frequency::FrequencyBucketNode;
use super::nodes::grid::GridSpatialization2D;
use super::nodes::nearest::NearestActorsNode;
use super::nodes::view_target::GlobalViewTargetNode;
use super::nodes::{GatherParams, NodeStats, ReplicationNode};
use super::policy::{build_class_settings, ClassReplicationInfo, ClassSettings, RoutingPolicy};
use super::scheduler::TaskScheduler;
use super::types::{
    ActorId, ActorInfo, ConnectionActorInfo, ConnectionActorInfoMap, ConnectionId, GatheredActorLists,
    GlobalActorInfo, GlobalActorInfoMap, GraphError, LevelName, NetViewer, ReplicationFrame,
};
use crate::config::{ConfigError, GraphConfig};
use crate::util::vec2::Vec2;

/// Node an actor was routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Route {
    NotRouted,
    Grid,
    AlwaysRelevant,
    StreamingLevel,
    FrequencyBuckets,
    NearestPlayers,
    NearestPlayerStates,
}

/// Per-connection output of one gather
#[derive(Debug, Default)]
pub struct ConnectionGather {
    /// Replication candidates, de-duplicated in gather order
    pub replication: GatheredActorLists,
    /// Interest set
    pub interest: GatheredActorLists,
}

#[derive(Debug)]
struct ConnectionState {
    id: ConnectionId,
    order: u32,
    actor_info: ConnectionActorInfoMap,
    /// Absent under spatial networking
    always_relevant: Option<AlwaysRelevantForConnectionNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub frame: ReplicationFrame,
    pub actors: usize,
    pub connections: usize,
    pub streaming_levels: usize,
    pub streaming_level_actors: usize,
    pub nodes: Vec<NodeStats>,
}

pub struct ReplicationGraph {
    config: GraphConfig,
    registry: ClassRegistry,
    settings: ClassSettings,
    rebuild_exempt_classes: Vec<ClassId>,

    actors: GlobalActorInfoMap,
    streaming_levels: StreamingLevelActors,

    grid: GridSpatialization2D,
    always_relevant: ActorListNode,
    frequency: FrequencyBucketNode,
    nearest_players: NearestActorsNode,
    nearest_player_states: NearestActorsNode,
    view_target: Option<GlobalViewTargetNode>,

    connections: Vec<ConnectionState>,
    next_connection_order: u32,
    frame: ReplicationFrame,
    scheduler: TaskScheduler<ReplicationGraph>,
}

impl ReplicationGraph {
    /// Validate the config, classify every registered class and create the
    /// global nodes
    pub fn new(config: GraphConfig, registry: ClassRegistry) -> Result<Self, ConfigError> {
        config.validate()?;

        let settings = build_class_settings(&registry, &config);
        let rebuild_exempt_classes = config
            .rebuild_exempt_classes
            .iter()
            .filter_map(|name| {
                let class = registry.find(name);
                if class.is_none() {
                    warn!("Rebuild-exempt class {} is not registered", name);
                }
                class
            })
            .collect();

        let mut grid = GridSpatialization2D::new(config.cell_size, config.world_min, config.world_max)
            .with_default_cull_distance_squared(config.default_cull_distance * config.default_cull_distance);
        grid.set_rebuilds_disabled(config.disable_spatial_rebuilds);

        let view_target = config.spatial_networking.then(GlobalViewTargetNode::new);

        info!(
            "Replication graph ready: {} classes, {} routing entries, cell size {}, spatial networking {}",
            registry.len(),
            settings.policies.len(),
            config.cell_size,
            config.spatial_networking
        );

        Ok(Self {
            frequency: FrequencyBucketNode::new(config.target_actors_per_bucket, config.frequency_bucket_count),
            nearest_players: NearestActorsNode::new(
                "NearestPlayers",
                config.max_nearest_actors,
                config.nearest_cutoff_distance,
            ),
            nearest_player_states: NearestActorsNode::new(
                "NearestPlayerStates",
                config.max_nearest_actors,
                config.nearest_cutoff_distance,
            ),
            always_relevant: ActorListNode::new(),
            view_target,
            grid,
            config,
            registry,
            settings,
            rebuild_exempt_classes,
            actors: GlobalActorInfoMap::new(),
            streaming_levels: StreamingLevelActors::default(),
            connections: Vec::new(),
            next_connection_order: 0,
            frame: 0,
            scheduler: TaskScheduler::new(),
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn actors(&self) -> &GlobalActorInfoMap {
        &self.actors
    }

    pub fn frame(&self) -> ReplicationFrame {
        self.frame
    }

    pub fn classify(&self, class: ClassId) -> RoutingPolicy {
        self.settings.policies.classify(&self.registry, class)
    }

    pub fn class_info(&self, class: ClassId) -> ClassReplicationInfo {
        self.settings.class_info.get(&self.registry, class)
    }

    pub fn print_routing(&self) -> String {
        self.settings.policies.render(&self.registry)
    }

    // ========================================================================
    // Actors
    // ========================================================================

    /// Track a newly replicated actor and route it
    pub fn add_network_actor(&mut self, info: ActorInfo, location: Vec2) -> Route {
        let previous = self.actors.insert(
            info.actor,
            GlobalActorInfo {
                class: info.class,
                location,
                streaming_level: info.streaming_level.clone(),
                dormant: false,
                valid_for_replication: true,
            },
        );
        if let Some(previous) = previous {
            warn!("{} added twice, re-routing", info.actor);
            self.route_remove(&ActorInfo {
                actor: info.actor,
                class: previous.class,
                streaming_level: previous.streaming_level,
            });
        }
        self.route_add(&info)
    }

    /// Forget an actor, removing it from the node it was routed to
    pub fn remove_network_actor(&mut self, actor: ActorId) -> Route {
        let Some(global) = self.actors.get(actor) else {
            warn!("Attempted to remove untracked {}", actor);
            return Route::NotRouted;
        };
        let info = ActorInfo {
            actor,
            class: global.class,
            streaming_level: global.streaming_level.clone(),
        };
        let route = self.route_remove(&info);
        self.actors.remove(actor);
        for connection in &mut self.connections {
            connection.actor_info.remove(actor);
        }
        route
    }

    fn is_bucketed(&self, class: ClassId) -> bool {
        self.registry.is_child_of(class, self.registry.engine().player_state)
    }

    fn is_rebuild_exempt(&self, class: ClassId) -> bool {
        self.rebuild_exempt_classes
            .iter()
            .any(|&exempt| self.registry.is_child_of(class, exempt))
    }

    /// Hand the actor to the single node owning its class policy
    pub fn route_add(&mut self, info: &ActorInfo) -> Route {
        let policy = self.classify(info.class);
        let spatial = self.config.spatial_networking;
        let (location, dormant) = self
            .actors
            .get(info.actor)
            .map_or((Vec2::ZERO, false), |g| (g.location, g.dormant));

        match policy {
            RoutingPolicy::NotRouted => {
                // Player states are handled by the frequency limited buckets
                if self.is_bucketed(info.class) {
                    self.frequency.add(info.actor);
                    Route::FrequencyBuckets
                } else {
                    trace!("Not routed: {} ({})", info.actor, self.registry.name(info.class));
                    Route::NotRouted
                }
            }
            RoutingPolicy::AlwaysReplicate => {
                self.always_relevant.add(info.actor);
                Route::AlwaysRelevant
            }
            RoutingPolicy::RelevantAllConnections => match &info.streaming_level {
                Some(level) if !spatial => {
                    self.streaming_levels.add(level, info.actor);
                    Route::StreamingLevel
                }
                _ => {
                    self.always_relevant.add(info.actor);
                    Route::AlwaysRelevant
                }
            },
            RoutingPolicy::NearestPlayers => {
                self.nearest_players.add(info.actor, location);
                Route::NearestPlayers
            }
            RoutingPolicy::NearestPlayerStates => {
                self.nearest_player_states.add(info.actor, location);
                Route::NearestPlayerStates
            }
            RoutingPolicy::SpatializeStatic => {
                let cull = self.class_info(info.class).cull_distance_squared;
                self.grid.add_static(info.actor, location, cull);
                Route::Grid
            }
            RoutingPolicy::SpatializeDynamic => {
                let cull = self.class_info(info.class).cull_distance_squared;
                let exempt = self.is_rebuild_exempt(info.class);
                self.grid.add_dynamic(info.actor, location, cull, exempt);
                Route::Grid
            }
            RoutingPolicy::SpatializeDormant => {
                let cull = self.class_info(info.class).cull_distance_squared;
                let exempt = self.is_rebuild_exempt(info.class);
                self.grid.add_dormant(info.actor, location, cull, dormant, exempt);
                Route::Grid
            }
        }
    }

    /// Mirror of `route_add`; a missing actor is a logged no-op
    pub fn route_remove(&mut self, info: &ActorInfo) -> Route {
        let policy = self.classify(info.class);
        let spatial = self.config.spatial_networking;

        match policy {
            RoutingPolicy::NotRouted => {
                if self.is_bucketed(info.class) {
                    self.frequency.remove(info.actor);
                    Route::FrequencyBuckets
                } else {
                    Route::NotRouted
                }
            }
            RoutingPolicy::AlwaysReplicate => {
                self.always_relevant.remove(info.actor);
                Route::AlwaysRelevant
            }
            RoutingPolicy::RelevantAllConnections => match &info.streaming_level {
                Some(level) if !spatial => {
                    self.streaming_levels.remove(level, info.actor);
                    Route::StreamingLevel
                }
                _ => {
                    self.always_relevant.remove(info.actor);
                    Route::AlwaysRelevant
                }
            },
            RoutingPolicy::NearestPlayers => {
                self.nearest_players.remove(info.actor);
                Route::NearestPlayers
            }
            RoutingPolicy::NearestPlayerStates => {
                self.nearest_player_states.remove(info.actor);
                Route::NearestPlayerStates
            }
            RoutingPolicy::SpatializeStatic => {
                self.grid.remove_static(info.actor);
                Route::Grid
            }
            RoutingPolicy::SpatializeDynamic => {
                self.grid.remove_dynamic(info.actor);
                Route::Grid
            }
            RoutingPolicy::SpatializeDormant => {
                self.grid.remove_dormant(info.actor);
                Route::Grid
            }
        }
    }

    /// Every node list currently holding `actor`
    pub fn routes_of(&self, actor: ActorId) -> Vec<Route> {
        let mut routes = Vec::new();
        if self.grid.contains(actor) {
            routes.push(Route::Grid);
        }
        if self.always_relevant.contains(actor) {
            routes.push(Route::AlwaysRelevant);
        }
        let in_level = self
            .actors
            .get(actor)
            .and_then(|g| g.streaming_level.as_ref())
            .and_then(|level| self.streaming_levels.get(level))
            .map_or(false, |list| list.contains(&actor));
        if in_level {
            routes.push(Route::StreamingLevel);
        }
        if self.frequency.contains(actor) {
            routes.push(Route::FrequencyBuckets);
        }
        if self.nearest_players.contains(actor) {
            routes.push(Route::NearestPlayers);
        }
        if self.nearest_player_states.contains(actor) {
            routes.push(Route::NearestPlayerStates);
        }
        routes
    }

    pub fn set_location(&mut self, actor: ActorId, location: Vec2) {
        match self.actors.get_mut(actor) {
            Some(info) => info.location = location,
            None => trace!("Location update for untracked {}", actor),
        }
    }

    pub fn set_valid_for_replication(&mut self, actor: ActorId, valid: bool) {
        if let Some(info) = self.actors.get_mut(actor) {
            info.valid_for_replication = valid;
        }
    }

    /// Global dormancy change; dormant-policy actors move between the
    /// grid's static and dynamic lists
    pub fn set_dormant(&mut self, actor: ActorId, dormant: bool) {
        let Some(info) = self.actors.get_mut(actor) else {
            return;
        };
        if info.dormant == dormant {
            return;
        }
        info.dormant = dormant;
        let (class, location) = (info.class, info.location);
        if self.classify(class) == RoutingPolicy::SpatializeDormant {
            self.grid.set_dormant(actor, dormant, location);
        }
    }

    /// Returns false when the actor is not bucketed
    pub fn force_net_update(&mut self, actor: ActorId) -> bool {
        let forced = self.frequency.force_net_update(actor);
        if !forced {
            debug!("Force net update ignored for {}, not in a frequency bucket", actor);
        }
        forced
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Allocate per-connection state; returns the connection order number
    pub fn init_connection(&mut self, id: ConnectionId) -> u32 {
        if let Some(existing) = self.connections.iter().find(|c| c.id == id) {
            warn!("{} initialized twice", id);
            return existing.order;
        }
        let order = self.next_connection_order;
        self.next_connection_order += 1;
        let always_relevant = (!self.config.spatial_networking)
            .then(|| AlwaysRelevantForConnectionNode::new(self.config.throttle_owner_player_state));
        self.connections.push(ConnectionState {
            id,
            order,
            actor_info: ConnectionActorInfoMap::default(),
            always_relevant,
        });
        debug!("Initialized {} as connection #{}", id, order);
        order
    }

    pub fn close_connection(&mut self, id: ConnectionId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.id != id);
        let removed = self.connections.len() != before;
        if !removed {
            warn!("Attempted to close unknown {}", id);
        }
        removed
    }

    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.iter().map(|c| c.id)
    }

    fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut ConnectionState> {
        self.connections.iter_mut().find(|c| c.id == id)
    }

    pub fn on_level_visibility_add(&mut self, id: ConnectionId, level: LevelName) {
        match self.connection_mut(id) {
            Some(ConnectionState {
                always_relevant: Some(node),
                ..
            }) => node.on_level_visibility_add(level),
            Some(_) => trace!("Level visibility ignored under spatial networking"),
            None => warn!("Level {} made visible on unknown {}", level, id),
        }
    }

    pub fn on_level_visibility_remove(&mut self, id: ConnectionId, level: &LevelName) {
        match self.connection_mut(id) {
            Some(ConnectionState {
                always_relevant: Some(node),
                ..
            }) => node.on_level_visibility_remove(level),
            Some(_) => {}
            None => warn!("Level {} hidden on unknown {}", level, id),
        }
    }

    pub fn set_dormant_on_connection(&mut self, id: ConnectionId, actor: ActorId, dormant: bool) {
        match self.connection_mut(id) {
            Some(connection) => connection.actor_info.find_or_add(actor).dormant_on_connection = dormant,
            None => warn!("Dormancy change for {} on unknown {}", actor, id),
        }
    }

    pub fn connection_actor_info(&self, id: ConnectionId, actor: ActorId) -> Option<&ConnectionActorInfo> {
        self.connections
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| c.actor_info.get(actor))
    }

    pub fn visible_levels(&self, id: ConnectionId) -> Vec<LevelName> {
        self.connections
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| c.always_relevant.as_ref())
            .map(|node| node.visible_levels().to_vec())
            .unwrap_or_default()
    }

    /// Drop per-connection and streaming-level state on a world transition
    pub fn reset_world_state(&mut self) {
        self.streaming_levels.clear();
        for connection in &mut self.connections {
            if let Some(node) = &mut connection.always_relevant {
                node.reset_world_state();
            }
        }
        info!("Replication graph world state reset");
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Run due tasks, then let nodes rebuild their per-frame lists
    pub fn begin_replication_frame(&mut self, frame: ReplicationFrame) {
        self.frame = frame;

        for task in self.scheduler.take_due(frame) {
            task.run(self);
        }

        let actors = &self.actors;
        self.grid.prepare(frame, actors);
        self.always_relevant.prepare(frame, actors);
        self.frequency.prepare(frame, actors);
        self.nearest_players.prepare(frame, actors);
        self.nearest_player_states.prepare(frame, actors);
        if let Some(node) = &mut self.view_target {
            node.prepare(frame, actors);
        }
    }

    /// Replication candidates and interest set of one connection
    pub fn gather_for_connection(
        &mut self,
        id: ConnectionId,
        viewers: &[NetViewer],
    ) -> Result<ConnectionGather, GraphError> {
        let frame = self.frame;
        let Self {
            connections,
            actors,
            streaming_levels,
            grid,
            always_relevant,
            frequency,
            nearest_players,
            nearest_player_states,
            view_target,
            ..
        } = self;

        let connection = connections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(GraphError::UnknownConnection(id))?;

        let mut params = GatherParams {
            frame,
            connection: id,
            connection_order: connection.order,
            viewers,
            actors,
            connection_actors: &mut connection.actor_info,
            streaming_levels,
        };

        let mut gather = ConnectionGather::default();
        let mut nodes: Vec<&mut dyn ReplicationNode> = Vec::with_capacity(7);
        nodes.push(grid);
        nodes.push(nearest_players);
        nodes.push(nearest_player_states);
        nodes.push(frequency);
        nodes.push(always_relevant);
        if let Some(node) = view_target {
            nodes.push(node);
        }
        if let Some(node) = &mut connection.always_relevant {
            nodes.push(node);
        }

        for node in nodes {
            node.gather_actor_lists(&mut params, &mut gather.replication)?;
            node.gather_interest(&mut params, &mut gather.interest)?;
        }

        Ok(gather)
    }

    // ========================================================================
    // Tunables
    // ========================================================================

    /// Run `task` at the start of the next replication frame
    pub fn schedule_next_frame<F>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(&mut ReplicationGraph) + Send + 'static,
    {
        self.scheduler.schedule(self.frame.wrapping_add(1), name, task);
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    pub fn set_target_actors_per_bucket(&mut self, target: usize) {
        self.config.target_actors_per_bucket = target;
        self.config.frequency_bucket_count = None;
        self.frequency.set_target_actors_per_bucket(target);
        self.frequency.set_bucket_count(None);
    }

    pub fn set_frequency_bucket_count(&mut self, count: usize) {
        self.config.frequency_bucket_count = Some(count);
        self.frequency.set_bucket_count(Some(count));
    }

    pub fn frequency_bucket_count(&self) -> usize {
        self.frequency.bucket_count()
    }

    pub fn set_max_nearest_actors(&mut self, max: usize) {
        self.config.max_nearest_actors = max;
        self.nearest_players.set_max_nearest_actors(max);
        self.nearest_player_states.set_max_nearest_actors(max);
    }

    pub fn set_disable_spatial_rebuilds(&mut self, disabled: bool) {
        self.config.disable_spatial_rebuilds = disabled;
        self.grid.set_rebuilds_disabled(disabled);
    }

    pub fn grid(&self) -> &GridSpatialization2D {
        &self.grid
    }

    pub fn stats(&self) -> GraphStats {
        let mut nodes = vec![
            self.grid.stats(),
            self.always_relevant.stats(),
            self.frequency.stats(),
            self.nearest_players.stats(),
            self.nearest_player_states.stats(),
        ];
        if let Some(node) = &self.view_target {
            nodes.push(node.stats());
        }
        GraphStats {
            frame: self.frame,
            actors: self.actors.len(),
            connections: self.connections.len(),
            streaming_levels: self.streaming_levels.level_count(),
            streaming_level_actors: self.streaming_levels.actor_count(),
            nodes,
        }
    }
}
