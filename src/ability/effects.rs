use rand::seq::SliceRandom;

use crate::board::{Coord, PkType, SpeciesId, StatusKind};
use crate::simulation::combo::{Combo, EraseMode};
use crate::simulation::context::TrialContext;
use crate::simulation::state::TrialState;

use super::DEFAULT_ERASURE_DELAY;

/// Turns an inflicted status lasts.
const STATUS_TURNS: u32 = 3;

// === Status ===

fn inflict(state: &mut TrialState, kind: StatusKind) {
    state.board.set_status(kind, STATUS_TURNS);
}

pub(super) fn inflict_freeze(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    inflict(state, StatusKind::Freeze);
}

pub(super) fn inflict_sleep(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    inflict(state, StatusKind::Sleep);
}

pub(super) fn inflict_paralysis(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    inflict(state, StatusKind::Paralyze);
}

pub(super) fn inflict_fear(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    inflict(state, StatusKind::Fear);
}

pub(super) fn inflict_poison(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    inflict(state, StatusKind::Poison);
}

pub(super) fn inflict_burn(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    inflict(state, StatusKind::Burn);
}

/// Extends an active status by two turns.
pub(super) fn prolong(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    let status = state.board.status();
    if status.is_active() {
        state.board.set_status(status.kind, status.duration + 2);
    }
}

/// Thaws and unclouds every tile of the combo's own species.
pub(super) fn stabilize(state: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) {
    let view: &TrialState = state;
    let targets = view.selectable_where(|c| {
        let cell = view.board.get(c);
        cell.species == combo.species && (cell.frozen || cell.clouded)
    });
    state.schedule_erase(targets, EraseMode::Disruptions, DEFAULT_ERASURE_DELAY, None);
}

// === Disruption clearing ===

/// Reserve up to `count` random selectable cells matching `pred` for erasure.
pub(crate) fn clear_random(
    state: &mut TrialState,
    count: usize,
    mode: EraseMode,
    pred: impl Fn(&TrialState, Coord) -> bool,
) -> Vec<Coord> {
    let view: &TrialState = state;
    let candidates = view.selectable_where(|c| pred(view, c));
    let picks: Vec<Coord> = candidates
        .choose_multiple(&mut state.rng, count)
        .copied()
        .collect();
    state.schedule_erase(picks.clone(), mode, DEFAULT_ERASURE_DELAY, None);
    picks
}

fn is_wood(state: &TrialState, c: Coord) -> bool {
    state.board.species_at(c) == SpeciesId::WOOD
}

fn is_metal(state: &TrialState, c: Coord) -> bool {
    state.board.species_at(c) == SpeciesId::METAL
}

fn is_frozen(state: &TrialState, c: Coord) -> bool {
    state.board.is_frozen(c)
}

fn is_disruption(state: &TrialState, c: Coord) -> bool {
    state.board.species_at(c).is_disruption() || state.board.is_frozen(c)
}

pub(super) fn rock_break(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    clear_random(state, 3, EraseMode::Disruptions, is_wood);
}

pub(super) fn rock_break_plus(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    clear_random(state, 6, EraseMode::Disruptions, is_wood);
}

pub(super) fn block_smash(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    clear_random(state, 3, EraseMode::Disruptions, is_metal);
}

pub(super) fn block_smash_plus(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    clear_random(state, 6, EraseMode::Disruptions, is_metal);
}

pub(super) fn barrier_bash(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    clear_random(state, 3, EraseMode::Disruptions, is_frozen);
}

pub(super) fn barrier_bash_plus(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    clear_random(state, 6, EraseMode::Disruptions, is_frozen);
}

pub(super) fn eject(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    clear_random(state, 1, EraseMode::Disruptions, is_disruption);
}

pub(super) fn eject_plus(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    clear_random(state, 3, EraseMode::Disruptions, is_disruption);
}

pub(super) fn cloud_clear(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    for c in Coord::all() {
        if state.board.is_clouded(c) {
            state.board.set_clouded(c, false);
            state.disruptions_cleared += 1;
        }
    }
}

pub(super) fn pickup(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) {
    state.add_currency(100);
}

pub(super) fn pickup_plus(state: &mut TrialState, ctx: &TrialContext<'_>, combo: &Combo) {
    pickup(state, ctx, combo);
    state.add_currency(200);
}

// === Type boosts ===

fn cheer_with(state: &mut TrialState, ctx: &TrialContext<'_>, combo: &Combo, multiplier: f64) {
    let kind = ctx.catalog.get(combo.species).kind;
    state.boost_type(kind, multiplier);
}

pub(super) fn cheer(state: &mut TrialState, ctx: &TrialContext<'_>, combo: &Combo) {
    cheer_with(state, ctx, combo, 1.5);
}

pub(super) fn super_cheer(state: &mut TrialState, ctx: &TrialContext<'_>, combo: &Combo) {
    cheer_with(state, ctx, combo, 2.0);
}

/// Every type fielded by the team hits harder.
pub(super) fn encourage(state: &mut TrialState, ctx: &TrialContext<'_>, _: &Combo) {
    let mut kinds: Vec<PkType> = ctx
        .team
        .roster
        .iter()
        .map(|&s| ctx.catalog.get(s).kind)
        .collect();
    kinds.dedup();
    for kind in kinds {
        state.boost_type(kind, 1.2);
    }
}

// === Replacement ===

/// Turn up to `count` random cells matching `pred` into the combo's species.
pub(crate) fn convert_random(
    state: &mut TrialState,
    combo: &Combo,
    count: usize,
    pred: impl Fn(&TrialState, Coord) -> bool,
) {
    let view: &TrialState = state;
    let candidates = view.selectable_where(|c| !combo.contains(c) && pred(view, c));
    let picks: Vec<Coord> = candidates
        .choose_multiple(&mut state.rng, count)
        .copied()
        .collect();
    for c in picks {
        state.transform(c, combo.species);
    }
}

pub(super) fn mimic(state: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) {
    convert_random(state, combo, 3, |s, c| {
        let species = s.board.species_at(c);
        species != combo.species && species.is_matchable() && !species.is_disruption()
    });
}

pub(super) fn reclaim(state: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) {
    convert_random(state, combo, 2, |s, c| is_wood(s, c) || is_metal(s, c));
}

// === Progressive ===

/// One more tile of the combo's type per step.
pub(super) fn same_type_tile(state: &mut TrialState, ctx: &TrialContext<'_>, combo: &Combo) -> Vec<Coord> {
    let kind = ctx.catalog.get(combo.species).kind;
    let view: &TrialState = state;
    let candidates = view.selectable_where(|c| {
        let species = view.board.species_at(c);
        !combo.contains(c)
            && species.is_matchable()
            && !species.is_disruption()
            && ctx.catalog.get(species).kind == kind
    });
    candidates.choose(&mut state.rng).copied().into_iter().collect()
}

// === Meter ===

fn boost_meter(state: &mut TrialState, ctx: &TrialContext<'_>, amount: i64) {
    if ctx.team.mega_slot.is_some() {
        state.board.adjust_meter(amount, ctx.team.mega_threshold);
    }
}

pub(super) fn mega_boost(state: &mut TrialState, ctx: &TrialContext<'_>, _: &Combo) {
    boost_meter(state, ctx, 3);
}

pub(super) fn mega_boost_plus(state: &mut TrialState, ctx: &TrialContext<'_>, _: &Combo) {
    boost_meter(state, ctx, 6);
}

pub(super) fn mega_boost_plus_plus(state: &mut TrialState, ctx: &TrialContext<'_>, _: &Combo) {
    boost_meter(state, ctx, 10);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::AbilityId;
    use crate::board::{Board, SpeciesCatalog, SpeciesDef};
    use crate::simulation::context::{Stage, Team};
    use crate::simulation::feeder::Feeder;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Fixture {
        catalog: SpeciesCatalog,
        team: Team,
        stage: Stage,
        fire: SpeciesId,
        water: SpeciesId,
    }

    fn fixture() -> Fixture {
        let mut catalog = SpeciesCatalog::new();
        let fire = catalog.insert(SpeciesDef::new("Vulpix", 50, PkType::Fire, AbilityId::Cheer));
        let water = catalog.insert(SpeciesDef::new("Squirtle", 50, PkType::Water, AbilityId::None));
        Fixture {
            team: Team::new(vec![fire, water]).with_mega(fire, 10),
            catalog,
            stage: Stage::default(),
            fire,
            water,
        }
    }

    fn combo(species: SpeciesId) -> Combo {
        let run = vec![Coord::new(6, 1), Coord::new(6, 2), Coord::new(6, 3)];
        Combo {
            id: 1,
            cells: run.clone(),
            run,
            horizontal: true,
            species,
            chain_head: 1,
            number: 1,
            ability: AbilityId::None,
            counter: 0,
            touches_move: false,
        }
    }

    fn state(board: Board) -> TrialState {
        TrialState::new(board, Feeder::new(), ChaCha8Rng::seed_from_u64(4), 1.0)
    }

    #[test]
    fn rock_break_reserves_up_to_three_wood_tiles() {
        let f = fixture();
        let ctx = TrialContext::new(&f.catalog, &f.team, &f.stage);
        let mut board = Board::new();
        for col in 1..=5 {
            board.set_species(Coord::new(5, col), SpeciesId::WOOD);
        }
        board.set_species(Coord::new(5, 6), SpeciesId::METAL);
        let mut s = state(board);
        rock_break(&mut s, &ctx, &combo(f.fire));
        let reserved: Vec<Coord> = Coord::all().filter(|c| s.is_active(*c)).collect();
        assert_eq!(reserved.len(), 3);
        assert!(reserved.iter().all(|c| s.board.species_at(*c) == SpeciesId::WOOD));
        assert!(!s.is_active(Coord::new(5, 6)));
    }

    #[test]
    fn cloud_clear_counts_each_cloud() {
        let f = fixture();
        let ctx = TrialContext::new(&f.catalog, &f.team, &f.stage);
        let mut board = Board::new();
        board.set_species(Coord::new(6, 1), f.water);
        board.set_species(Coord::new(6, 2), f.water);
        board.set_clouded(Coord::new(6, 1), true);
        board.set_clouded(Coord::new(6, 2), true);
        let mut s = state(board);
        cloud_clear(&mut s, &ctx, &combo(f.fire));
        assert_eq!(s.disruptions_cleared, 2);
        assert!(!s.board.is_clouded(Coord::new(6, 1)));
    }

    #[test]
    fn super_cheer_outranks_cheer() {
        let f = fixture();
        let ctx = TrialContext::new(&f.catalog, &f.team, &f.stage);
        let mut s = state(Board::new());
        cheer(&mut s, &ctx, &combo(f.fire));
        assert_eq!(s.type_boost(PkType::Fire), 1.5);
        super_cheer(&mut s, &ctx, &combo(f.fire));
        assert_eq!(s.type_boost(PkType::Fire), 2.0);
        cheer(&mut s, &ctx, &combo(f.fire));
        assert_eq!(s.type_boost(PkType::Fire), 2.0);
        assert_eq!(s.type_boost(PkType::Water), 1.0);
    }

    #[test]
    fn mimic_converts_other_species() {
        let f = fixture();
        let ctx = TrialContext::new(&f.catalog, &f.team, &f.stage);
        let mut board = Board::new();
        for col in 1..=3 {
            board.set_species(Coord::new(6, col), f.fire);
        }
        for col in 1..=6 {
            board.set_species(Coord::new(5, col), f.water);
        }
        let mut s = state(board);
        mimic(&mut s, &ctx, &combo(f.fire));
        let converted = (1..=6)
            .filter(|&col| s.board.species_at(Coord::new(5, col)) == f.fire)
            .count();
        assert_eq!(converted, 3);
    }

    #[test]
    fn same_type_tile_picks_outside_the_combo() {
        let f = fixture();
        let ctx = TrialContext::new(&f.catalog, &f.team, &f.stage);
        let mut board = Board::new();
        for col in 1..=4 {
            board.set_species(Coord::new(6, col), f.fire);
        }
        board.set_species(Coord::new(6, 5), f.water);
        let mut s = state(board);
        assert_eq!(same_type_tile(&mut s, &ctx, &combo(f.fire)), vec![Coord::new(6, 4)]);
    }

    #[test]
    fn mega_boost_respects_threshold() {
        let f = fixture();
        let ctx = TrialContext::new(&f.catalog, &f.team, &f.stage);
        let mut s = state(Board::new());
        mega_boost_plus_plus(&mut s, &ctx, &combo(f.water));
        mega_boost(&mut s, &ctx, &combo(f.water));
        assert_eq!(s.board.meter(), 10);
    }

    #[test]
    fn prolong_only_extends_active_status() {
        let f = fixture();
        let ctx = TrialContext::new(&f.catalog, &f.team, &f.stage);
        let mut s = state(Board::new());
        prolong(&mut s, &ctx, &combo(f.fire));
        assert!(!s.board.status().is_active());
        inflict_burn(&mut s, &ctx, &combo(f.fire));
        prolong(&mut s, &ctx, &combo(f.fire));
        assert_eq!(s.board.status().duration, STATUS_TURNS + 2);
        assert_eq!(s.board.status().kind, StatusKind::Burn);
    }
}
