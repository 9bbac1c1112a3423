//! 2D uniform grid over world space for spatialized actors
//!
//! Actors are bucketed by `floor(position / cell_size)` after clamping to the
//! world bounds. Each distinct cull distance gets its own layer of cells so
//! the number of cells visited per viewer follows the class cull distance
//! instead of one global radius.
//!
//! Static actors are placed once. Dynamic actors are re-bucketed in
//! `prepare` when their cached cell no longer matches their position, unless
//! they are rebuild-exempt. Dormant-policy actors sit in the static list while
//! dormant and move to the dynamic list when they wake.

use hashbrown::HashMap;
use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use super::{GatherParams, NodeStats, ReplicationNode};
use crate::graph::constants::class::NET_CULL_DISTANCE_SQUARED;
use crate::graph::constants::grid::{CELL_INITIAL_CAPACITY, LAYER_INITIAL_CELLS};
use crate::graph::types::{ActorId, GatheredActorLists, GlobalActorInfoMap, GraphError, ReplicationFrame};
use crate::util::vec2::Vec2;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// How an actor was added to the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridMode {
    Static,
    Dynamic,
    Dormant,
}

#[derive(Debug, Default)]
struct GridCell {
    statics: Vec<ActorId>,
    dynamics: Vec<ActorId>,
}

impl GridCell {
    fn list_mut(&mut self, dynamic: bool) -> &mut Vec<ActorId> {
        if dynamic {
            &mut self.dynamics
        } else {
            &mut self.statics
        }
    }

    fn is_empty(&self) -> bool {
        self.statics.is_empty() && self.dynamics.is_empty()
    }
}

/// Cells for one cull distance
#[derive(Debug)]
struct CullLayer {
    cull_distance_squared: f32,
    /// Cells visited on each side of the viewer's cell
    cell_radius: i32,
    cells: HashMap<CellKey, GridCell>,
}

#[derive(Debug, Clone, Copy)]
struct GridEntry {
    mode: GridMode,
    layer: usize,
    cell: CellKey,
    /// Currently stored in the cell's dynamic list
    dynamic: bool,
    rebuild_exempt: bool,
}

#[derive(Debug)]
pub struct GridSpatialization2D {
    cell_size: f32,
    inv_cell_size: f32,
    world_min: Vec2,
    world_max: Vec2,
    min_cell: CellKey,
    max_cell: CellKey,
    layers: Vec<CullLayer>,
    entries: FxHashMap<ActorId, GridEntry>,
    /// Used for classes without a positive cull distance
    default_cull_distance_squared: f32,
    rebuilds_disabled: bool,
    pending_moves: Vec<(ActorId, CellKey)>,
    /// Dynamic actors that changed cell during the last prepare
    moved_last_frame: usize,
}

impl GridSpatialization2D {
    pub fn new(cell_size: f32, world_min: Vec2, world_max: Vec2) -> Self {
        let inv_cell_size = 1.0 / cell_size;
        let key = |p: Vec2| ((p.x * inv_cell_size).floor() as i32, (p.y * inv_cell_size).floor() as i32);
        Self {
            cell_size,
            inv_cell_size,
            world_min,
            world_max,
            min_cell: key(world_min),
            max_cell: key(world_max),
            layers: Vec::new(),
            entries: FxHashMap::default(),
            default_cull_distance_squared: NET_CULL_DISTANCE_SQUARED,
            rebuilds_disabled: false,
            pending_moves: Vec::new(),
            moved_last_frame: 0,
        }
    }

    pub fn with_default_cull_distance_squared(mut self, cull_distance_squared: f32) -> Self {
        if cull_distance_squared > 0.0 {
            self.default_cull_distance_squared = cull_distance_squared;
        }
        self
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Convert world position to cell key
    #[inline]
    pub fn cell_key(&self, position: Vec2) -> CellKey {
        let p = position.clamp(self.world_min, self.world_max);
        (
            (p.x * self.inv_cell_size).floor() as i32,
            (p.y * self.inv_cell_size).floor() as i32,
        )
    }

    /// Suppress all dynamic re-bucketing, regardless of per-class exemption
    pub fn set_rebuilds_disabled(&mut self, disabled: bool) {
        self.rebuilds_disabled = disabled;
    }

    pub fn rebuilds_disabled(&self) -> bool {
        self.rebuilds_disabled
    }

    pub fn add_static(&mut self, actor: ActorId, location: Vec2, cull_distance_squared: f32) {
        self.insert(actor, GridMode::Static, location, cull_distance_squared, false, false);
    }

    pub fn add_dynamic(&mut self, actor: ActorId, location: Vec2, cull_distance_squared: f32, rebuild_exempt: bool) {
        self.insert(actor, GridMode::Dynamic, location, cull_distance_squared, true, rebuild_exempt);
    }

    /// Dormant actors start in the static list and move on wake
    pub fn add_dormant(
        &mut self,
        actor: ActorId,
        location: Vec2,
        cull_distance_squared: f32,
        dormant: bool,
        rebuild_exempt: bool,
    ) {
        self.insert(actor, GridMode::Dormant, location, cull_distance_squared, !dormant, rebuild_exempt);
    }

    pub fn remove_static(&mut self, actor: ActorId) -> bool {
        self.remove(actor, GridMode::Static)
    }

    pub fn remove_dynamic(&mut self, actor: ActorId) -> bool {
        self.remove(actor, GridMode::Dynamic)
    }

    pub fn remove_dormant(&mut self, actor: ActorId) -> bool {
        self.remove(actor, GridMode::Dormant)
    }

    /// Dormancy change of a `Dormant`-mode actor. Going dormant pins it to the
    /// static list at `location`, waking makes it dynamic again.
    pub fn set_dormant(&mut self, actor: ActorId, dormant: bool, location: Vec2) {
        let Some(entry) = self.entries.get(&actor).copied() else {
            return;
        };
        if entry.mode != GridMode::Dormant || entry.dynamic != dormant {
            return;
        }

        let new_cell = self.cell_key(location);
        self.detach(actor, entry);
        let layer = &mut self.layers[entry.layer];
        layer
            .cells
            .entry(new_cell)
            .or_insert_with(GridCell::default)
            .list_mut(!dormant)
            .push(actor);
        self.entries.insert(
            actor,
            GridEntry {
                cell: new_cell,
                dynamic: !dormant,
                ..entry
            },
        );
        trace!("{} {} in grid cell {:?}", actor, if dormant { "went dormant" } else { "woke" }, new_cell);
    }

    /// Current cell of an actor, if it is in the grid
    pub fn cell_of(&self, actor: ActorId) -> Option<CellKey> {
        self.entries.get(&actor).map(|e| e.cell)
    }

    /// Whether the actor is currently re-bucketed on movement
    pub fn is_tracked_dynamic(&self, actor: ActorId) -> bool {
        self.entries.get(&actor).map_or(false, |e| e.dynamic)
    }

    pub fn contains(&self, actor: ActorId) -> bool {
        self.entries.contains_key(&actor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn moved_last_frame(&self) -> usize {
        self.moved_last_frame
    }

    fn layer_for(&mut self, cull_distance_squared: f32) -> usize {
        let cull_distance_squared = if cull_distance_squared > 0.0 {
            cull_distance_squared
        } else {
            self.default_cull_distance_squared
        };
        if let Some(idx) = self
            .layers
            .iter()
            .position(|l| l.cull_distance_squared == cull_distance_squared)
        {
            return idx;
        }
        // Never visit more than the whole grid, however large the cull distance
        let span = (self.max_cell.0 - self.min_cell.0).max(self.max_cell.1 - self.min_cell.1);
        let radius = (cull_distance_squared.sqrt() / self.cell_size).ceil();
        let cell_radius = if radius < span as f32 { radius as i32 } else { span };
        self.layers.push(CullLayer {
            cull_distance_squared,
            cell_radius,
            cells: HashMap::with_capacity(LAYER_INITIAL_CELLS),
        });
        self.layers.len() - 1
    }

    fn insert(
        &mut self,
        actor: ActorId,
        mode: GridMode,
        location: Vec2,
        cull_distance_squared: f32,
        dynamic: bool,
        rebuild_exempt: bool,
    ) {
        if let Some(existing) = self.entries.get(&actor).copied() {
            warn!("{} added to the grid twice, replacing previous entry", actor);
            self.detach(actor, existing);
        }

        let layer = self.layer_for(cull_distance_squared);
        let cell = self.cell_key(location);
        self.layers[layer]
            .cells
            .entry(cell)
            .or_insert_with(|| GridCell {
                statics: Vec::with_capacity(CELL_INITIAL_CAPACITY),
                dynamics: Vec::with_capacity(CELL_INITIAL_CAPACITY),
            })
            .list_mut(dynamic)
            .push(actor);
        self.entries.insert(
            actor,
            GridEntry {
                mode,
                layer,
                cell,
                dynamic,
                rebuild_exempt,
            },
        );
    }

    fn remove(&mut self, actor: ActorId, mode: GridMode) -> bool {
        match self.entries.remove(&actor) {
            Some(entry) => {
                if entry.mode != mode {
                    warn!("{} removed from the grid as {:?} but was added as {:?}", actor, mode, entry.mode);
                }
                self.detach(actor, entry);
                true
            }
            None => {
                warn!("Attempted to remove {} from the grid but it was not found", actor);
                false
            }
        }
    }

    /// Remove the actor from its cell list (the entry map is left alone)
    fn detach(&mut self, actor: ActorId, entry: GridEntry) {
        let Some(cell) = self.layers[entry.layer].cells.get_mut(&entry.cell) else {
            return;
        };
        let list = cell.list_mut(entry.dynamic);
        if let Some(idx) = list.iter().position(|&a| a == actor) {
            list.swap_remove(idx);
        }
    }
}

impl ReplicationNode for GridSpatialization2D {
    fn name(&self) -> &'static str {
        "GridSpatialization2D"
    }

    fn prepare(&mut self, _frame: ReplicationFrame, actors: &GlobalActorInfoMap) {
        self.moved_last_frame = 0;
        if self.rebuilds_disabled {
            return;
        }

        let mut moves = std::mem::take(&mut self.pending_moves);
        moves.clear();
        for (actor, entry) in &self.entries {
            if !entry.dynamic || entry.rebuild_exempt {
                continue;
            }
            let Some(location) = actors.location(*actor) else {
                continue;
            };
            let cell = self.cell_key(location);
            if cell != entry.cell {
                moves.push((*actor, cell));
            }
        }

        for &(actor, cell) in &moves {
            let Some(entry) = self.entries.get(&actor).copied() else {
                continue;
            };
            self.detach(actor, entry);
            self.layers[entry.layer]
                .cells
                .entry(cell)
                .or_insert_with(GridCell::default)
                .dynamics
                .push(actor);
            if let Some(e) = self.entries.get_mut(&actor) {
                e.cell = cell;
            }
        }

        self.moved_last_frame = moves.len();
        self.pending_moves = moves;
    }

    fn gather_actor_lists(
        &mut self,
        params: &mut GatherParams<'_>,
        out: &mut GatheredActorLists,
    ) -> Result<(), GraphError> {
        for viewer in params.viewers {
            let (cx, cy) = self.cell_key(viewer.location);
            for layer in &self.layers {
                let r = layer.cell_radius;
                let x_range =
                    cx.saturating_sub(r).max(self.min_cell.0)..=cx.saturating_add(r).min(self.max_cell.0);
                for x in x_range {
                    let y_range =
                        cy.saturating_sub(r).max(self.min_cell.1)..=cy.saturating_add(r).min(self.max_cell.1);
                    for y in y_range {
                        if let Some(cell) = layer.cells.get(&(x, y)) {
                            out.add_list(&cell.statics);
                            out.add_list(&cell.dynamics);
                        }
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
        self.gather_actor_lists(params, out)
    }

    fn stats(&self) -> NodeStats {
        NodeStats {
            name: self.name(),
            actors: self.entries.len(),
            lists: self
                .layers
                .iter()
                .map(|l| l.cells.values().filter(|c| !c.is_empty()).count())
                .sum(),
        }
    }
}
