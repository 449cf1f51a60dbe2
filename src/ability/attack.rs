use rand::Rng;

use crate::board::{Effectiveness, PkType, SpeciesId, StatusKind};
use crate::simulation::combo::Combo;
use crate::simulation::context::TrialContext;
use crate::simulation::state::TrialState;

const MULTIPLIER_CAP: f64 = 3.0;

fn effectiveness(ctx: &TrialContext<'_>, combo: &Combo) -> Effectiveness {
    ctx.catalog
        .get(combo.species)
        .kind
        .effectiveness(ctx.stage.target)
}

pub(super) fn double(_: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> f64 {
    2.0
}

pub(super) fn one_and_half(_: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> f64 {
    1.5
}

pub(super) fn triple(_: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> f64 {
    3.0
}

pub(super) fn power_of_four(_: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> f64 {
    if combo.size() == 4 { 1.5 } else { 1.0 }
}

pub(super) fn power_of_four_plus(state: &mut TrialState, ctx: &TrialContext<'_>, combo: &Combo) -> f64 {
    power_of_four(state, ctx, combo) * if combo.size() == 4 { 4.0 / 3.0 } else { 1.0 }
}

pub(super) fn power_of_five(_: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> f64 {
    if combo.size() >= 5 { 1.5 } else { 1.0 }
}

/// Resisted targets are hit as if neutral, then doubled.
pub(super) fn pierce(_: &mut TrialState, ctx: &TrialContext<'_>, combo: &Combo) -> f64 {
    match effectiveness(ctx, combo) {
        Effectiveness::NotVery => 4.0,
        _ => 2.0,
    }
}

pub(super) fn step_up(_: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> f64 {
    if combo.number >= 2 { 2.0 } else { 1.0 }
}

pub(super) fn chain_reaction(_: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> f64 {
    (1.0 + 0.1 * combo.number.saturating_sub(1) as f64).min(MULTIPLIER_CAP)
}

/// Doubles when the previous finalised combo came from the same species.
pub(super) fn hitting_streak(state: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> f64 {
    match state.history.last() {
        Some(last) if last.species == combo.species => 2.0,
        _ => 1.0,
    }
}

pub(super) fn risk_taker(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> f64 {
    state.rng.gen_range(1..=3) as f64
}

pub(super) fn double_normal(_: &mut TrialState, ctx: &TrialContext<'_>, combo: &Combo) -> f64 {
    if ctx.catalog.get(combo.species).kind == PkType::Normal {
        2.0
    } else {
        1.0
    }
}

pub(super) fn last_ditch_effort(_: &mut TrialState, ctx: &TrialContext<'_>, _: &Combo) -> f64 {
    if ctx.stage.moves_remaining <= 3 { 3.0 } else { 1.0 }
}

/// Grows with the number of obstructions and frozen tiles on the board.
pub(super) fn counterattack(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> f64 {
    let disruptions = state
        .board
        .count_where(|c| c.frozen || c.species == SpeciesId::WOOD || c.species == SpeciesId::METAL);
    (1.0 + 0.1 * disruptions as f64).min(MULTIPLIER_CAP)
}

/// Grows with the number of same-species tiles left outside the combo.
pub(super) fn crowd_control(state: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> f64 {
    let view: &TrialState = state;
    let others = view
        .selectable_where(|c| view.board.species_at(c) == combo.species)
        .len();
    (1.0 + 0.1 * others as f64).min(MULTIPLIER_CAP)
}

pub(super) fn cross_attack(state: &mut TrialState, _: &TrialContext<'_>, combo: &Combo) -> f64 {
    if state.crossing_combo(combo).is_some() {
        3.0
    } else {
        1.0
    }
}

pub(super) fn super_effective_plus(_: &mut TrialState, ctx: &TrialContext<'_>, combo: &Combo) -> f64 {
    if effectiveness(ctx, combo) == Effectiveness::Super {
        1.5
    } else {
        1.0
    }
}

/// Grows with the other roster members sharing the species' type.
pub(super) fn swarm(_: &mut TrialState, ctx: &TrialContext<'_>, combo: &Combo) -> f64 {
    let kind = ctx.catalog.get(combo.species).kind;
    let allies = ctx
        .team
        .roster
        .iter()
        .filter(|&&s| s != combo.species && ctx.catalog.get(s).kind == kind)
        .count();
    (1.0 + 0.5 * allies as f64).min(MULTIPLIER_CAP)
}

pub(super) fn opportunist(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> f64 {
    if state.board.status().is_active() { 2.0 } else { 1.0 }
}

fn exploit(state: &TrialState, kind: StatusKind) -> f64 {
    let status = state.board.status();
    if status.is_active() && status.kind == kind {
        2.5
    } else {
        1.0
    }
}

pub(super) fn exploit_sleep(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> f64 {
    exploit(state, StatusKind::Sleep)
}

pub(super) fn exploit_freeze(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> f64 {
    exploit(state, StatusKind::Freeze)
}

pub(super) fn exploit_paralysis(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> f64 {
    exploit(state, StatusKind::Paralyze)
}

pub(super) fn exploit_fear(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> f64 {
    exploit(state, StatusKind::Fear)
}

pub(super) fn exploit_burn(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> f64 {
    exploit(state, StatusKind::Burn)
}

pub(super) fn exploit_poison(state: &mut TrialState, _: &TrialContext<'_>, _: &Combo) -> f64 {
    exploit(state, StatusKind::Poison)
}
