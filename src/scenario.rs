//! Benchmark world for the replication graph
//!
//! One always-relevant game state, a field of moving props on a 100x100 grid,
//! frequency-limited player states and NPCs routed to the nearest-K node.
//! Used by the demo driver, the end-to-end tests and the benchmark.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::{ConfigError, DriverConfig, GraphConfig};
use crate::graph::class_registry::{ClassId, ClassRegistry};
use crate::graph::replication_graph::ReplicationGraph;
use crate::graph::types::{ActorId, ActorInfo, ConnectionId, GraphError, NetViewer, ReplicationFrame};
use crate::util::vec2::Vec2;

/// Population and layout of the benchmark world
#[derive(Debug, Clone)]
pub struct ScenarioSpec {
    /// Edge length of the square world, starting at the origin
    pub world_size: f32,
    pub cell_size: f32,
    /// Cull distance of the moving prop class
    pub cull_distance: f32,
    pub bucket_size: usize,
    pub nearest_k: usize,
    pub dynamic_actors: usize,
    pub player_states: usize,
    pub nearest_candidates: usize,
    pub connections: usize,
    /// Max per-axis movement of a prop per frame
    pub jitter: f32,
    pub seed: u64,
}

impl Default for ScenarioSpec {
    fn default() -> Self {
        Self {
            world_size: 100.0,
            cell_size: 10.0,
            cull_distance: 15.0,
            bucket_size: 10,
            nearest_k: 10,
            dynamic_actors: 1900,
            player_states: 50,
            nearest_candidates: 49,
            connections: 1,
            jitter: 0.5,
            seed: 0x5eed,
        }
    }
}

impl ScenarioSpec {
    pub fn from_driver(driver: &DriverConfig) -> Self {
        Self {
            dynamic_actors: driver.dynamic_actors,
            player_states: driver.player_states,
            nearest_candidates: driver.nearest_candidates,
            connections: driver.connections,
            seed: driver.seed,
            ..Self::default()
        }
    }

    /// Graph settings matching this world
    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig {
            cell_size: self.cell_size,
            world_min: Vec2::ZERO,
            world_max: Vec2::new(self.world_size, self.world_size),
            target_actors_per_bucket: self.bucket_size,
            max_nearest_actors: self.nearest_k,
            // Whole world inside the cutoff
            nearest_cutoff_distance: self.world_size * 2.0,
            custom_performance_scenario: true,
            nearest_player_classes: vec![class_names::NPC.to_string()],
            ..GraphConfig::default()
        }
    }
}

pub mod class_names {
    pub const GAME_STATE: &str = "BenchGameState";
    pub const MOVING_PROP: &str = "BenchMovingProp";
    pub const PLAYER_STATE: &str = "BenchPlayerState";
    pub const NPC: &str = "BenchNPC";
    pub const PLAYER_CONTROLLER: &str = "BenchPlayerController";
}

#[derive(Debug, Clone, Copy)]
struct ScenarioClasses {
    game_state: ClassId,
    moving_prop: ClassId,
    player_state: ClassId,
    npc: ClassId,
    player_controller: ClassId,
}

fn register_classes(registry: &mut ClassRegistry, cull_distance: f32) -> ScenarioClasses {
    let engine = *registry.engine();
    ScenarioClasses {
        game_state: registry.register(class_names::GAME_STATE, engine.game_state_base, |_| {}),
        moving_prop: registry.register(class_names::MOVING_PROP, engine.actor, |d| {
            d.defaults.replicates = true;
            d.defaults.net_cull_distance_squared = cull_distance * cull_distance;
            d.defaults.net_update_frequency = 30.0;
        }),
        player_state: registry.register(class_names::PLAYER_STATE, engine.player_state, |_| {}),
        npc: registry.register(class_names::NPC, engine.character, |_| {}),
        player_controller: registry.register(class_names::PLAYER_CONTROLLER, engine.player_controller, |_| {}),
    }
}

/// Live actor count bounds for one class, checked by the delayed census
#[derive(Debug, Clone, Serialize)]
pub struct ExpectedActorCount {
    pub class: String,
    pub min: usize,
    pub max: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CensusEntry {
    pub class: String,
    pub count: usize,
    pub min: usize,
    pub max: usize,
}

impl CensusEntry {
    pub fn is_within(&self) -> bool {
        (self.min..=self.max).contains(&self.count)
    }
}

/// Tolerated overshoot of an expected population
fn with_slack(count: usize) -> usize {
    (count as f64 * 1.05).ceil() as usize
}

/// Per-connection result of one frame
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub connection: ConnectionId,
    pub replication: usize,
    pub interest: usize,
    pub lists: usize,
}

pub struct Scenario {
    pub graph: ReplicationGraph,
    /// One viewer per connection
    pub connections: Vec<(ConnectionId, NetViewer)>,
    pub always_relevant: Vec<ActorId>,
    pub dynamic: Vec<ActorId>,
    pub player_states: Vec<ActorId>,
    pub nearest: Vec<ActorId>,
    classes: ScenarioClasses,
    spec: ScenarioSpec,
    rng: StdRng,
    next_actor: u64,
}

impl Scenario {
    pub fn build(spec: &ScenarioSpec) -> Result<Self, ConfigError> {
        let mut registry = ClassRegistry::new();
        let classes = register_classes(&mut registry, spec.cull_distance);
        let graph = ReplicationGraph::new(spec.graph_config(), registry)?;

        let mut scenario = Self {
            graph,
            connections: Vec::with_capacity(spec.connections),
            always_relevant: Vec::with_capacity(1),
            dynamic: Vec::with_capacity(spec.dynamic_actors),
            player_states: Vec::with_capacity(spec.player_states),
            nearest: Vec::with_capacity(spec.nearest_candidates),
            classes,
            spec: spec.clone(),
            rng: StdRng::seed_from_u64(spec.seed),
            next_actor: 0,
        };

        let game_state = scenario.spawn(classes.game_state, Vec2::ZERO);
        scenario.always_relevant.push(game_state);

        for _ in 0..spec.dynamic_actors {
            let location = scenario.random_location();
            let actor = scenario.spawn(classes.moving_prop, location);
            scenario.dynamic.push(actor);
        }
        for _ in 0..spec.player_states {
            let actor = scenario.spawn(classes.player_state, Vec2::ZERO);
            scenario.player_states.push(actor);
        }
        for _ in 0..spec.nearest_candidates {
            let location = scenario.random_location();
            let actor = scenario.spawn(classes.npc, location);
            scenario.nearest.push(actor);
        }

        for _ in 0..spec.connections {
            let connection = ConnectionId::new();
            scenario.graph.init_connection(connection);
            let controller = scenario.spawn(classes.player_controller, Vec2::ZERO);
            scenario
                .connections
                .push((connection, NetViewer::new(connection, controller, Vec2::ZERO)));
        }

        info!(
            "Scenario ready: {} actors ({} dynamic, {} bucketed, {} nearest), {} connections",
            scenario.population(),
            scenario.dynamic.len(),
            scenario.player_states.len(),
            scenario.nearest.len(),
            scenario.connections.len()
        );
        Ok(scenario)
    }

    fn spawn(&mut self, class: ClassId, location: Vec2) -> ActorId {
        let actor = ActorId(self.next_actor);
        self.next_actor += 1;
        self.graph.add_network_actor(
            ActorInfo {
                actor,
                class,
                streaming_level: None,
            },
            location,
        );
        actor
    }

    fn random_location(&mut self) -> Vec2 {
        let size = self.spec.world_size;
        Vec2::new(self.rng.gen_range(0.0..size), self.rng.gen_range(0.0..size))
    }

    pub fn spec(&self) -> &ScenarioSpec {
        &self.spec
    }

    /// Routed actors (viewer controllers excluded)
    pub fn population(&self) -> usize {
        self.always_relevant.len() + self.dynamic.len() + self.player_states.len() + self.nearest.len()
    }

    /// Nudge every moving prop, staying inside the world
    pub fn jitter(&mut self) {
        let jitter = self.spec.jitter;
        if jitter <= 0.0 {
            return;
        }
        let lo = Vec2::ZERO;
        let hi = Vec2::new(self.spec.world_size, self.spec.world_size);
        for i in 0..self.dynamic.len() {
            let actor = self.dynamic[i];
            let Some(current) = self.graph.actors().location(actor) else {
                continue;
            };
            let delta = Vec2::new(
                self.rng.gen_range(-jitter..=jitter),
                self.rng.gen_range(-jitter..=jitter),
            );
            self.graph.set_location(actor, (current + delta).clamp(lo, hi));
        }
    }

    /// Move props, prepare the graph and gather for every connection
    pub fn run_frame(&mut self, frame: ReplicationFrame) -> Result<Vec<ConnectionReport>, GraphError> {
        self.jitter();
        self.graph.begin_replication_frame(frame);

        let mut reports = Vec::with_capacity(self.connections.len());
        for (connection, viewer) in &self.connections {
            let gathered = self
                .graph
                .gather_for_connection(*connection, std::slice::from_ref(viewer))?;
            reports.push(ConnectionReport {
                connection: *connection,
                replication: gathered.replication.len(),
                interest: gathered.interest.len(),
                lists: gathered.replication.list_count(),
            });
        }
        debug!("Frame {}: gathered for {} connections", frame, reports.len());
        Ok(reports)
    }

    /// Populations the census expects once the world has settled
    pub fn expected_actor_counts(&self) -> Vec<ExpectedActorCount> {
        let npcs = self.spec.nearest_candidates;
        let players = self.spec.player_states;
        vec![
            ExpectedActorCount {
                class: class_names::NPC.to_string(),
                min: npcs.saturating_sub(1),
                max: with_slack(npcs),
            },
            ExpectedActorCount {
                class: class_names::PLAYER_STATE.to_string(),
                min: players,
                max: with_slack(players),
            },
        ]
    }

    /// Count live actors per expected class (subclasses included)
    pub fn census(&self) -> Vec<CensusEntry> {
        let registry = self.graph.registry();
        self.expected_actor_counts()
            .into_iter()
            .map(|expected| {
                let count = match registry.find(&expected.class) {
                    Some(class) => self
                        .graph
                        .actors()
                        .iter()
                        .filter(|(_, info)| registry.is_child_of(info.class, class))
                        .count(),
                    None => 0,
                };
                CensusEntry {
                    class: expected.class,
                    count,
                    min: expected.min,
                    max: expected.max,
                }
            })
            .collect()
    }

    /// Log the census; returns false when any class is out of bounds
    pub fn log_census(&self) -> bool {
        let mut ok = true;
        for entry in self.census() {
            if entry.is_within() {
                info!("Census {}: {} live (expected {}..={})", entry.class, entry.count, entry.min, entry.max);
            } else {
                error!(
                    "Census {}: {} live, expected {}..={}",
                    entry.class, entry.count, entry.min, entry.max
                );
                ok = false;
            }
        }
        ok
    }

    /// Destroy one NPC (used to exercise removal and the census lower bound)
    pub fn despawn_npc(&mut self) -> Option<ActorId> {
        let actor = self.nearest.pop()?;
        self.graph.remove_network_actor(actor);
        Some(actor)
    }

    pub fn npc_class(&self) -> ClassId {
        self.classes.npc
    }
}
