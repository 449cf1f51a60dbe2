use std::collections::VecDeque;

use rand::seq::SliceRandom;

use crate::board::{BOARD_SIZE, Coord, PkType, SpeciesId};
use crate::simulation::combo::{Combo, EraseMode};
use crate::simulation::context::TrialContext;
use crate::simulation::state::TrialState;

use super::DEFAULT_ERASURE_DELAY;

// === Progressive selectors ===

fn pick(
    state: &mut TrialState,
    combo: &Combo,
    count: usize,
    pred: impl Fn(&TrialState, Coord) -> bool,
) -> Vec<Coord> {
    let view: &TrialState = state;
    let candidates = view.selectable_where(|c| !combo.contains(c) && pred(view, c));
    candidates
        .choose_multiple(&mut state.rng, count)
        .copied()
        .collect()
}

fn same_species(state: &mut TrialState, combo: &Combo, count: usize) -> Vec<Coord> {
    pick(state, combo, count, |s, c| s.board.species_at(c) == combo.species)
}

pub(super) fn same_species_one(state: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> Vec<Coord> {
    same_species(state, combo, 1)
}

pub(super) fn same_species_two(state: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> Vec<Coord> {
    same_species(state, combo, 2)
}

pub(super) fn same_type_two(state: &mut TrialState, ctx: &TrialContext<'_>, combo: &Combo) -> Vec<Coord> {
    let kind = ctx.catalog.get(combo.species).kind;
    pick(state, combo, 2, |s, c| {
        let species = s.board.species_at(c);
        species.is_matchable() && !species.is_disruption() && ctx.catalog.get(species).kind == kind
    })
}

pub(super) fn other_species_one(state: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> Vec<Coord> {
    pick(state, combo, 1, |s, c| {
        let species = s.board.species_at(c);
        species != combo.species && species.is_matchable() && !species.is_disruption()
    })
}

/// Extra blocks turn into the combo's species before they are erased with it.
pub(super) fn convert_to_own_species(
    state: &mut TrialState,
    _: &TrialContext<'_>,
    combo: &Combo,
    coords: &[Coord],
) {
    for &c in coords {
        state.transform(c, combo.species);
    }
}

// === Plans ===

fn is_disruptive(state: &TrialState, c: Coord) -> bool {
    let cell = state.board.get(c);
    cell.species.is_disruption() || cell.frozen || cell.clouded
}

fn waves(groups: impl IntoIterator<Item = Vec<Coord>>) -> VecDeque<Vec<Coord>> {
    groups
        .into_iter()
        .map(|wave| wave.into_iter().filter(|c| c.in_bounds()).collect::<Vec<_>>())
        .filter(|wave| !wave.is_empty())
        .collect()
}

/// Cells matching `pred`, grouped by Manhattan distance from the combo centre.
fn rings(state: &TrialState, combo: &Combo, pred: impl Fn(&TrialState, Coord) -> bool) -> VecDeque<Vec<Coord>> {
    let center = combo.center();
    waves((1..=2 * BOARD_SIZE).map(|d| {
        Coord::all()
            .filter(|&c| c.manhattan(center) == d && pred(state, c))
            .collect()
    }))
}

/// Matching cells in random chunks of `size`.
fn chunks(
    state: &mut TrialState,
    size: usize,
    pred: impl Fn(&TrialState, Coord) -> bool,
) -> VecDeque<Vec<Coord>> {
    let view: &TrialState = state;
    let mut cells: Vec<Coord> = Coord::all().filter(|&c| pred(view, c)).collect();
    cells.shuffle(&mut state.rng);
    waves(cells.chunks(size.max(1)).map(|chunk| chunk.to_vec()))
}

pub(super) fn plan_cross(_: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> VecDeque<Vec<Coord>> {
    let center = combo.center();
    waves((1..BOARD_SIZE).map(|d| {
        vec![
            center.offset(-d, 0),
            center.offset(d, 0),
            center.offset(0, -d),
            center.offset(0, d),
        ]
    }))
}

pub(super) fn plan_diamond(state: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> VecDeque<Vec<Coord>> {
    let mut plan = rings(state, combo, |_, _| true);
    plan.truncate(2);
    plan
}

pub(super) fn plan_diagonals(_: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> VecDeque<Vec<Coord>> {
    let center = combo.center();
    waves((1..BOARD_SIZE).map(|d| {
        vec![
            center.offset(-d, -d),
            center.offset(-d, d),
            center.offset(d, -d),
            center.offset(d, d),
        ]
    }))
}

/// The centre column first, then the columns either side of it.
pub(super) fn plan_columns(_: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> VecDeque<Vec<Coord>> {
    let col = combo.center().col;
    let column = |c: i32| (1..=BOARD_SIZE).map(move |r| Coord::new(r, c));
    waves([
        column(col).collect::<Vec<_>>(),
        column(col - 1).chain(column(col + 1)).collect(),
    ])
}

/// Disruptions one row per wave, from the bottom row up.
pub(super) fn plan_rows(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> VecDeque<Vec<Coord>> {
    let view: &TrialState = state;
    waves((1..=BOARD_SIZE).rev().map(|r| {
        (1..=BOARD_SIZE)
            .map(|c| Coord::new(r, c))
            .filter(|&c| is_disruptive(view, c))
            .collect()
    }))
}

pub(super) fn plan_disruption_waves(state: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> VecDeque<Vec<Coord>> {
    rings(state, combo, is_disruptive)
}

pub(super) fn plan_frozen(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> VecDeque<Vec<Coord>> {
    chunks(state, 3, |s, c| s.board.is_frozen(c))
}

pub(super) fn plan_metal(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> VecDeque<Vec<Coord>> {
    chunks(state, 2, |s, c| s.board.species_at(c) == SpeciesId::METAL)
}

pub(super) fn plan_everything_disrupted(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> VecDeque<Vec<Coord>> {
    let view: &TrialState = state;
    waves([Coord::all().filter(|&c| is_disruptive(view, c)).collect::<Vec<_>>()])
}

/// Obstruction tiles, lowest row first.
pub(super) fn plan_obstructions(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> VecDeque<Vec<Coord>> {
    let view: &TrialState = state;
    waves((1..=BOARD_SIZE).rev().map(|r| {
        (1..=BOARD_SIZE)
            .map(|c| Coord::new(r, c))
            .filter(|&c| matches!(view.board.species_at(c), SpeciesId::WOOD | SpeciesId::METAL))
            .collect()
    }))
}

pub(super) fn plan_bottom_row(_: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> VecDeque<Vec<Coord>> {
    waves([BOARD_SIZE, BOARD_SIZE - 1].map(|r| (1..=BOARD_SIZE).map(|c| Coord::new(r, c)).collect::<Vec<_>>()))
}

// === Side effects ===

/// Thaws and unclouds ordinary tiles across the board.
pub(super) fn soothe(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    let view: &TrialState = state;
    let targets = view.selectable_where(|c| {
        let cell = view.board.get(c);
        !cell.species.is_disruption() && (cell.frozen || cell.clouded)
    });
    state.schedule_erase(targets, EraseMode::Disruptions, DEFAULT_ERASURE_DELAY, None);
}

pub(super) fn sky_boost(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    state.boost_type(PkType::Dragon, 1.5);
    state.boost_type(PkType::Flying, 1.5);
}
