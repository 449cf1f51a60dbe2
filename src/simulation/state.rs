use std::collections::{BTreeMap, HashMap, HashSet};

use rand_chacha::ChaCha8Rng;

use crate::ability::AbilityId;
use crate::board::{BOARD_SIZE, Board, Coord, Move, PkType, SpeciesId};
use crate::simulation::combo::{Combo, ComboEffect, ComboId, EraseMode, Erasure};
use crate::simulation::feeder::Feeder;

const CELLS: usize = (BOARD_SIZE * BOARD_SIZE) as usize;

/// Per-cell bookkeeping array indexed by in-bounds coordinates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CellGrid<T: Copy>([T; CELLS]);

impl<T: Copy + Default> CellGrid<T> {
    pub(crate) fn new() -> Self {
        CellGrid([T::default(); CELLS])
    }

    fn slot(coord: Coord) -> Option<usize> {
        if coord.in_bounds() {
            Some(((coord.row - 1) * BOARD_SIZE + coord.col - 1) as usize)
        } else {
            None
        }
    }

    pub(crate) fn get(&self, coord: Coord) -> T {
        Self::slot(coord).map(|i| self.0[i]).unwrap_or_default()
    }

    pub(crate) fn set(&mut self, coord: Coord, value: T) {
        if let Some(i) = Self::slot(coord) {
            self.0[i] = value;
        }
    }
}

/// Active run kept for merging later same-orientation matches into its chain.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ActiveRun {
    pub run: Vec<Coord>,
    pub horizontal: bool,
    pub chain_head: ComboId,
}

/// Scoring breakdown of one finalised combo.
#[derive(Debug, Clone, PartialEq)]
pub struct ComboRecord {
    pub number: u32,
    pub species: SpeciesId,
    pub size: usize,
    pub horizontal: bool,
    pub ability: AbilityId,
    pub attack: f64,
    pub type_multiplier: f64,
    pub chain_multiplier: f64,
    pub block_multiplier: f64,
    pub ability_multiplier: f64,
    pub bonus: f64,
    pub score: f64,
    pub currency: u64,
}

/// The mutable working copy one cascade run owns exclusively.
#[derive(Debug, Clone)]
pub struct TrialState {
    pub board: Board,
    pub feeder: Feeder,
    pub rng: ChaCha8Rng,
    pub weight: f64,
    pub score: f64,
    pub currency: u64,
    pub blocks_cleared: u32,
    pub disruptions_cleared: u32,
    pub combos: u32,
    pub history: Vec<ComboRecord>,
    pub truncated: bool,
    pub iterations: u32,
    start_meter: u32,
    pub(crate) time: u64,
    pub(crate) last_gravity: u64,
    pub(crate) next_bump: Option<u64>,
    pub(crate) next_combo_time: u64,
    pub(crate) falling: CellGrid<bool>,
    pub(crate) fall_offset: CellGrid<u32>,
    pub(crate) original: CellGrid<bool>,
    pub(crate) scheduled: BTreeMap<u64, Vec<ComboEffect>>,
    pub(crate) pending: Vec<Combo>,
    pub(crate) claimed: HashSet<Coord>,
    pub(crate) active: HashMap<Coord, Option<ComboId>>,
    pub(crate) active_runs: BTreeMap<ComboId, ActiveRun>,
    pub(crate) type_boost: HashMap<PkType, f64>,
    pub(crate) move_cells: Vec<Coord>,
    pub(crate) last_combo_id: ComboId,
    pub(crate) changed: bool,
}

impl TrialState {
    pub fn new(board: Board, feeder: Feeder, rng: ChaCha8Rng, weight: f64) -> Self {
        let mut original = CellGrid::new();
        for coord in Coord::all() {
            original.set(coord, !board.is_air(coord));
        }
        let start_meter = board.meter();
        TrialState {
            board,
            feeder,
            rng,
            weight,
            score: 0.0,
            currency: 0,
            blocks_cleared: 0,
            disruptions_cleared: 0,
            combos: 0,
            history: Vec::new(),
            truncated: false,
            iterations: 0,
            start_meter,
            time: 0,
            last_gravity: 0,
            next_bump: None,
            next_combo_time: 0,
            falling: CellGrid::new(),
            fall_offset: CellGrid::new(),
            original,
            scheduled: BTreeMap::new(),
            pending: Vec::new(),
            claimed: HashSet::new(),
            active: HashMap::new(),
            active_runs: BTreeMap::new(),
            type_boost: HashMap::new(),
            move_cells: Vec::new(),
            last_combo_id: 0,
            changed: true,
        }
    }

    /// Swap two cells as the player's move. Both cells gain activation priority.
    pub fn apply_move(&mut self, mv: Move) -> bool {
        if !self.board.apply_move(mv) {
            return false;
        }
        let a = self.original.get(mv.from);
        let b = self.original.get(mv.to);
        self.original.set(mv.from, b);
        self.original.set(mv.to, a);
        self.move_cells = vec![mv.from, mv.to];
        self.changed = true;
        true
    }

    /// Net change of the evolution meter since the trial started.
    pub fn meter_progress(&self) -> i64 {
        self.board.meter() as i64 - self.start_meter as i64
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn is_falling(&self, coord: Coord) -> bool {
        self.falling.get(coord)
    }

    pub fn was_present_at_start(&self, coord: Coord) -> bool {
        self.original.get(coord)
    }

    pub fn is_active(&self, coord: Coord) -> bool {
        self.active.contains_key(&coord)
    }

    pub fn is_claimed(&self, coord: Coord) -> bool {
        self.claimed.contains(&coord)
    }

    /// Combos detected but not yet activated, in activation order.
    pub fn pending(&self) -> &[Combo] {
        &self.pending
    }

    /// Claimed coordinates in row-major order.
    pub fn claims(&self) -> Vec<Coord> {
        Coord::all().filter(|c| self.claimed.contains(c)).collect()
    }

    /// A settled, unreserved, non-empty cell that abilities may pick.
    pub fn selectable(&self, coord: Coord) -> bool {
        coord.in_bounds()
            && !self.board.is_air(coord)
            && !self.is_active(coord)
            && !self.is_claimed(coord)
            && !self.is_falling(coord)
    }

    /// Coordinates in row-major order satisfying [`TrialState::selectable`] and `pred`.
    pub fn selectable_where(&self, mut pred: impl FnMut(Coord) -> bool) -> Vec<Coord> {
        Coord::all()
            .filter(|&c| self.selectable(c) && pred(c))
            .collect()
    }

    /// Id of the active combo on the opposite orientation sharing a cell with `combo`.
    pub fn crossing_combo(&self, combo: &Combo) -> Option<ComboId> {
        self.active_runs.iter().find_map(|(&id, run)| {
            (id != combo.id
                && run.horizontal != combo.horizontal
                && run.run.iter().any(|c| combo.run.contains(c)))
            .then_some(id)
        })
    }

    pub fn add_score(&mut self, amount: f64) {
        self.score += amount;
    }

    pub fn add_currency(&mut self, amount: u64) {
        self.currency += amount;
    }

    pub fn type_boost(&self, kind: PkType) -> f64 {
        self.type_boost.get(&kind).copied().unwrap_or(1.0)
    }

    /// Raise a type's damage multiplier; lower values never replace a higher boost.
    pub fn boost_type(&mut self, kind: PkType, multiplier: f64) {
        let entry = self.type_boost.entry(kind).or_insert(1.0);
        if multiplier > *entry {
            *entry = multiplier;
        }
    }

    pub(crate) fn next_combo_id(&mut self) -> ComboId {
        self.last_combo_id += 1;
        self.last_combo_id
    }

    pub(crate) fn schedule(&mut self, delay: u32, effect: ComboEffect) {
        let at = self.time + delay.max(1) as u64;
        self.scheduled.entry(at).or_default().push(effect);
    }

    /// Reserve `coords` and erase them after `delay`. Already-active cells are skipped.
    pub fn schedule_erase(
        &mut self,
        coords: Vec<Coord>,
        mode: EraseMode,
        delay: u32,
        source: Option<ComboId>,
    ) {
        let mut owned = Vec::with_capacity(coords.len());
        for c in coords {
            if c.in_bounds() && !self.board.is_air(c) && !self.is_active(c) && !owned.contains(&c) {
                self.claimed.remove(&c);
                self.active.insert(c, source);
                owned.push(c);
            }
        }
        if owned.is_empty() {
            return;
        }
        self.changed = true;
        self.schedule(
            delay,
            ComboEffect::Erase {
                coords: owned,
                mode,
                source,
            },
        );
    }

    /// Replace a cell's species in place, keeping its fall bookkeeping.
    pub fn transform(&mut self, coord: Coord, species: SpeciesId) {
        if self.board.set_species(coord, species) {
            self.changed = true;
        }
    }

    pub(crate) fn take_due_effects(&mut self) -> Vec<ComboEffect> {
        let mut due = Vec::new();
        while let Some(entry) = self.scheduled.first_entry() {
            if *entry.key() > self.time {
                break;
            }
            due.extend(entry.remove());
        }
        due
    }

    pub(crate) fn next_effect_time(&self) -> Option<u64> {
        self.scheduled.keys().next().copied()
    }

    /// Convert covered cells according to `mode`, tallying what was cleared.
    pub(crate) fn erase(&mut self, coords: &[Coord], mode: EraseMode, source: Option<ComboId>) {
        for &c in coords {
            let cell = self.board.get(c);
            match mode.classify(cell) {
                Erasure::Clear => {
                    if cell.species.is_disruption() {
                        self.disruptions_cleared += 1;
                    } else {
                        self.blocks_cleared += 1;
                    }
                    if cell.frozen {
                        self.disruptions_cleared += 1;
                    }
                    if cell.clouded {
                        self.disruptions_cleared += 1;
                    }
                    self.board.set_species(c, SpeciesId::AIR);
                    self.original.set(c, false);
                    self.falling.set(c, false);
                    self.fall_offset.set(c, 0);
                    self.move_cells.retain(|m| *m != c);
                    self.changed = true;
                }
                Erasure::Thaw => {
                    self.board.set_frozen(c, false);
                    self.disruptions_cleared += 1;
                    self.changed = true;
                }
                Erasure::Uncloud => {
                    self.board.set_clouded(c, false);
                    self.disruptions_cleared += 1;
                    self.changed = true;
                }
                Erasure::Skip => {}
            }
            self.active.remove(&c);
        }
        if let Some(id) = source {
            self.active_runs.remove(&id);
        }
        self.changed = true;
    }

    /// Current board masked to tiles that were present when the trial started.
    pub fn result_board(&self) -> Board {
        let mut board = self.board.clone();
        for coord in Coord::all() {
            if !self.original.get(coord) {
                board.set_species(coord, SpeciesId::AIR);
            }
        }
        board
    }
}
