use std::collections::VecDeque;

use rand::Rng;
use tracing::{trace, warn};

use crate::ability::{self, AbilityDef, AbilityId};
use crate::board::{Coord, SpeciesId};
use crate::simulation::combo::{Combo, ComboEffect, EraseMode};
use crate::simulation::context::TrialContext;
use crate::simulation::scoring::{COIN_VALUE, block_multiplier, chain_multiplier};
use crate::simulation::state::{ActiveRun, ComboRecord, TrialState};

/// Default cap on engine iterations for one trial.
pub const MAX_ITERATIONS: u32 = 1000;
/// Minimum ticks between two combo activations.
pub const COMBO_INTERVAL: u64 = 6;
/// Ticks before an obstruction next to an activating combo shatters.
pub const SHATTER_DELAY: u32 = 18;

/// Run the cascade until no event remains or the iteration cap is hit.
pub fn run_cascade(state: &mut TrialState, ctx: &TrialContext<'_>) {
    loop {
        if state.iterations >= ctx.max_iterations {
            state.truncated = true;
            warn!(
                iterations = state.iterations,
                time = state.time,
                score = state.score,
                "Trial hit the iteration cap, keeping partial state"
            );
            break;
        }
        state.iterations += 1;

        state.gravity_tick();
        for effect in state.take_due_effects() {
            state.apply_effect(effect, ctx);
        }
        state.gravity_tick();

        if state.changed {
            state.changed = false;
            state.detect_combos();
        }
        if state.time >= state.next_combo_time {
            state.activate_best(ctx);
        }

        match state.next_event_time() {
            Some(at) => state.time = at,
            None => break,
        }
    }
}

impl TrialState {
    /// Earliest future tick at which something can happen.
    fn next_event_time(&self) -> Option<u64> {
        let mut candidates = vec![self.next_effect_time(), self.next_bump];
        if !self.pending.is_empty() {
            candidates.push(Some(self.next_combo_time));
        }
        if self.changed {
            candidates.push(Some(self.time + 1));
        }
        candidates
            .into_iter()
            .flatten()
            .min()
            .map(|at| at.max(self.time + 1))
    }

    fn apply_effect(&mut self, effect: ComboEffect, ctx: &TrialContext<'_>) {
        match effect {
            ComboEffect::Activate(combo) => self.dispatch(combo, None, ctx),
            ComboEffect::ActivateWithPlan { combo, plan } => self.dispatch(combo, Some(plan), ctx),
            ComboEffect::Erase {
                coords,
                mode,
                source,
            } => self.erase(&coords, mode, source),
        }
    }

    /// Pop the highest-priority pending combo whose cells are still free and start it.
    fn activate_best(&mut self, ctx: &TrialContext<'_>) {
        while !self.pending.is_empty() {
            let mut combo = self.pending.remove(0);
            combo.cells.retain(|c| {
                !self.active.contains_key(c) && self.board.species_at(*c) == combo.species
            });
            if combo.cells.is_empty() {
                continue;
            }

            self.combos += 1;
            combo.id = self.next_combo_id();
            if combo.chain_head == 0 {
                combo.chain_head = combo.id;
            }
            combo.number = self.combos;
            combo.ability = self.roll_ability(&combo, ctx);

            for c in &combo.cells {
                self.claimed.remove(c);
                self.active.insert(*c, Some(combo.id));
            }
            self.active_runs.insert(
                combo.id,
                ActiveRun {
                    run: combo.run.clone(),
                    horizontal: combo.horizontal,
                    chain_head: combo.chain_head,
                },
            );
            self.shatter_around(&combo);
            self.changed = true;
            self.next_combo_time = self.time + COMBO_INTERVAL;
            trace!(
                combo = combo.id,
                size = combo.size(),
                ability = %combo.ability,
                time = self.time,
                "Combo activated"
            );
            self.dispatch(combo, None, ctx);
            return;
        }
    }

    /// Decide whether the combo's ability fires.
    fn roll_ability(&mut self, combo: &Combo, ctx: &TrialContext<'_>) -> AbilityId {
        let def = ability::resolve(combo.species, &self.board, ctx);
        if !combo.is_chain_head() || ctx.team.disabled.contains(&def.id) {
            return AbilityId::None;
        }
        let odds = def.odds_for(combo.size());
        if odds == 0 || odds < ctx.team.trigger_threshold {
            return AbilityId::None;
        }
        if odds >= 100 || self.rng.gen_range(0..100u8) < odds {
            def.id
        } else {
            AbilityId::None
        }
    }

    /// Obstructions next to the run shatter after a delay; adjacent clouds lift at once.
    fn shatter_around(&mut self, combo: &Combo) {
        let mut wood = Vec::new();
        for c in &combo.run {
            for n in c.neighbors() {
                if !n.in_bounds() || combo.run.contains(&n) {
                    continue;
                }
                if self.board.species_at(n) == SpeciesId::WOOD
                    && !self.is_active(n)
                    && !self.is_claimed(n)
                    && !wood.contains(&n)
                {
                    wood.push(n);
                }
                if self.board.is_clouded(n) && !self.is_active(n) {
                    self.board.set_clouded(n, false);
                    self.disruptions_cleared += 1;
                }
            }
        }
        for n in wood {
            self.schedule_erase(vec![n], EraseMode::Force, SHATTER_DELAY, None);
        }
    }

    /// One step of the ability dispatch protocol for an active combo.
    fn dispatch(
        &mut self,
        mut combo: Combo,
        plan: Option<VecDeque<Vec<Coord>>>,
        ctx: &TrialContext<'_>,
    ) {
        let def = combo.ability.def();
        let mut plan = match (plan, def.plan) {
            (Some(plan), _) => Some(plan),
            (None, Some(make)) => Some(make(self, ctx, &combo)),
            (None, None) => None,
        };
        let extras = match plan.as_mut() {
            Some(waves) => waves.pop_front().unwrap_or_default(),
            None => def
                .extra_blocks
                .map(|select| select(self, ctx, &combo))
                .unwrap_or_default(),
        };

        if let Some(effect) = def.side_effect {
            effect(self, ctx, &combo);
        }

        if extras.is_empty() || combo.counter >= def.value_limit {
            self.finalize(combo, &def, ctx);
            return;
        }

        let room = def.value_limit.saturating_sub(combo.counter) as usize;
        let mut fresh: Vec<Coord> = Vec::new();
        for c in extras {
            if fresh.len() >= room {
                break;
            }
            if c.in_bounds()
                && !self.board.is_air(c)
                && !self.is_active(c)
                && !self.is_falling(c)
                && !combo.contains(c)
                && !fresh.contains(&c)
            {
                fresh.push(c);
            }
        }
        let waves_left = plan.as_ref().is_some_and(|waves| !waves.is_empty());
        if fresh.is_empty() && !waves_left {
            self.finalize(combo, &def, ctx);
            return;
        }

        combo.counter += fresh.len() as u32;
        if let Some(effect) = def.extra_block_effect {
            effect(self, ctx, &combo, &fresh);
        }
        for c in &fresh {
            self.claimed.remove(c);
            self.active.insert(*c, Some(combo.id));
        }
        combo.cells.extend(fresh);
        self.changed = true;

        let next = match plan {
            Some(plan) => ComboEffect::ActivateWithPlan { combo, plan },
            None => ComboEffect::Activate(combo),
        };
        self.schedule(def.repeat_delay, next);
    }

    /// Score the combo, advance the meter and schedule its erasure.
    fn finalize(&mut self, combo: Combo, def: &AbilityDef, ctx: &TrialContext<'_>) {
        let species = ctx.catalog.get(combo.species);
        let size = combo.size();
        let block = block_multiplier(size);
        let chain = chain_multiplier(combo.number);

        let mut record = ComboRecord {
            number: combo.number,
            species: combo.species,
            size,
            horizontal: combo.horizontal,
            ability: combo.ability,
            attack: 0.0,
            type_multiplier: 1.0,
            chain_multiplier: chain,
            block_multiplier: block,
            ability_multiplier: 1.0,
            bonus: 0.0,
            score: 0.0,
            currency: 0,
        };

        if combo.species == SpeciesId::COIN {
            record.currency = (COIN_VALUE * block).round() as u64;
            self.add_currency(record.currency);
        } else {
            record.attack = species.attack_at(ctx.team.level_of(combo.species)) as f64;
            record.type_multiplier = species.kind.effectiveness(ctx.stage.target).multiplier()
                * self.type_boost(species.kind);
            record.ability_multiplier = def
                .score_multiplier
                .map_or(1.0, |multiplier| multiplier(self, ctx, &combo));
            let value = if def.is_progressive() {
                combo.counter
            } else {
                size as u32
            };
            record.bonus = def.bonus.score(value, record.attack, record.type_multiplier);
            record.score = record.attack
                * record.type_multiplier
                * chain
                * block
                * record.ability_multiplier
                + record.bonus;
            self.add_score(record.score);
        }

        if ctx.team.is_mega_slot(combo.species) {
            let gained = combo
                .cells
                .iter()
                .filter(|c| !self.board.is_frozen(**c))
                .count();
            self.board
                .adjust_meter(gained as i64, ctx.team.mega_threshold);
        }

        trace!(
            combo = combo.id,
            number = combo.number,
            score = record.score,
            currency = record.currency,
            "Combo finalized"
        );
        self.history.push(record);

        let (run_cells, extra_cells): (Vec<Coord>, Vec<Coord>) =
            combo.cells.iter().partition(|c| combo.run.contains(c));
        if !extra_cells.is_empty() && def.extra_erase_mode != EraseMode::Normal {
            self.schedule(
                def.erasure_delay,
                ComboEffect::Erase {
                    coords: extra_cells,
                    mode: def.extra_erase_mode,
                    source: None,
                },
            );
            self.schedule(
                def.erasure_delay,
                ComboEffect::Erase {
                    coords: run_cells,
                    mode: EraseMode::Normal,
                    source: Some(combo.id),
                },
            );
        } else {
            self.schedule(
                def.erasure_delay,
                ComboEffect::Erase {
                    coords: combo.cells.clone(),
                    mode: EraseMode::Normal,
                    source: Some(combo.id),
                },
            );
        }

        if let Some(post) = def.post_clear {
            post(self, ctx, &combo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Move, PkType, SpeciesCatalog, SpeciesDef};
    use crate::simulation::context::{Stage, Team};
    use crate::simulation::feeder::Feeder;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Fixture {
        catalog: SpeciesCatalog,
        team: Team,
        stage: Stage,
        a: SpeciesId,
        b: SpeciesId,
        c: SpeciesId,
    }

    fn fixture(ability: AbilityId, target: PkType) -> Fixture {
        let mut catalog = SpeciesCatalog::new();
        let a = catalog.insert(SpeciesDef::new("Eevee", 50, PkType::Normal, ability));
        let b = catalog.insert(SpeciesDef::new("Vulpix", 50, PkType::Fire, AbilityId::None));
        let c = catalog.insert(SpeciesDef::new("Squirtle", 50, PkType::Water, AbilityId::None));
        Fixture {
            team: Team::new(vec![a, b, c]),
            catalog,
            stage: Stage {
                target,
                ..Stage::default()
            },
            a,
            b,
            c,
        }
    }

    fn run(board: Board, feeder: Feeder, mv: Option<Move>, f: &Fixture) -> TrialState {
        let ctx = TrialContext::new(&f.catalog, &f.team, &f.stage);
        let mut state = TrialState::new(board, feeder, ChaCha8Rng::seed_from_u64(11), 1.0);
        if let Some(mv) = mv {
            assert!(state.apply_move(mv));
        }
        run_cascade(&mut state, &ctx);
        state
    }

    #[test]
    fn empty_board_resolves_to_nothing() {
        let f = fixture(AbilityId::None, PkType::None);
        let state = run(Board::new(), Feeder::new(), None, &f);
        assert_eq!(state.score, 0.0);
        assert_eq!(state.currency, 0);
        assert_eq!(state.blocks_cleared, 0);
        assert_eq!(state.combos, 0);
        assert!(!state.truncated);
    }

    #[test]
    fn top_row_run_falls_matches_and_clears() {
        let f = fixture(AbilityId::None, PkType::None);
        let mut board = Board::new();
        for col in 1..=3 {
            board.set_species(Coord::new(1, col), f.a);
        }
        let state = run(board, Feeder::new(), None, &f);
        for coord in Coord::all() {
            assert!(state.board.is_air(coord), "{coord:?} not cleared");
        }
        assert_eq!(state.blocks_cleared, 3);
        assert_eq!(state.combos, 1);
        let record = &state.history[0];
        assert_eq!(record.block_multiplier, 1.0);
        assert_eq!(record.chain_multiplier, 1.0);
        assert_eq!(state.score, 50.0);
    }

    #[test]
    fn swap_into_vertical_four_scores_block_bonus() {
        let f = fixture(AbilityId::None, PkType::Water);
        let mut board = Board::new();
        board.set_species(Coord::new(3, 1), f.a);
        board.set_species(Coord::new(4, 1), f.a);
        board.set_species(Coord::new(5, 1), f.b);
        board.set_species(Coord::new(6, 1), f.a);
        board.set_species(Coord::new(5, 2), f.a);
        board.set_species(Coord::new(6, 2), f.c);
        let mv = Move::new(Coord::new(5, 2), Coord::new(5, 1));
        let state = run(board, Feeder::new(), Some(mv), &f);

        let record = &state.history[0];
        assert_eq!(record.size, 4);
        assert!(!record.horizontal);
        assert_eq!(record.block_multiplier, 1.5);
        assert_eq!(record.type_multiplier, 1.0);
        assert_eq!(record.chain_multiplier, 1.0);
        assert_eq!(record.ability_multiplier, 1.0);
        assert_eq!(record.score, 75.0);
        // the swapped-out tile stays put beside the cleared column
        assert_eq!(state.board.species_at(Coord::new(6, 1)), SpeciesId::AIR);
        assert_eq!(state.board.species_at(Coord::new(5, 2)), f.b);
    }

    #[test]
    fn second_combo_gets_chain_multiplier() {
        let f = fixture(AbilityId::None, PkType::None);
        let mut board = Board::new();
        // clearing the bottom run drops (5,3) between the two tiles on its right
        for col in 1..=3 {
            board.set_species(Coord::new(6, col), f.a);
        }
        board.set_species(Coord::new(6, 4), f.b);
        board.set_species(Coord::new(6, 5), f.b);
        board.set_species(Coord::new(5, 3), f.b);
        let state = run(board, Feeder::new(), None, &f);
        assert_eq!(state.combos, 2);
        assert_eq!(state.history[1].species, f.b);
        assert_eq!(state.history[1].chain_multiplier, 1.1);
        assert_eq!(state.history[1].size, 3);
        assert!((state.score - 105.0).abs() < 1e-9);
    }

    #[test]
    fn frozen_tile_in_a_run_thaws_instead_of_clearing() {
        let f = fixture(AbilityId::None, PkType::None);
        let mut board = Board::new();
        for col in 1..=3 {
            board.set_species(Coord::new(6, col), f.a);
        }
        board.set_frozen(Coord::new(6, 2), true);
        let state = run(board, Feeder::new(), None, &f);
        assert_eq!(state.blocks_cleared, 2);
        assert_eq!(state.disruptions_cleared, 1);
        assert_eq!(state.board.species_at(Coord::new(6, 2)), f.a);
        assert!(!state.board.is_frozen(Coord::new(6, 2)));
    }

    #[test]
    fn adjacent_wood_shatters() {
        let f = fixture(AbilityId::None, PkType::None);
        let mut board = Board::new();
        for col in 1..=3 {
            board.set_species(Coord::new(6, col), f.a);
        }
        board.set_species(Coord::new(6, 4), SpeciesId::WOOD);
        board.set_species(Coord::new(6, 6), SpeciesId::WOOD);
        let state = run(board, Feeder::new(), None, &f);
        assert!(state.board.is_air(Coord::new(6, 4)));
        assert_eq!(state.board.species_at(Coord::new(6, 6)), SpeciesId::WOOD);
        assert_eq!(state.disruptions_cleared, 1);
    }

    #[test]
    fn currency_tiles_pay_out_instead_of_scoring() {
        let f = fixture(AbilityId::None, PkType::None);
        let mut board = Board::new();
        for col in 1..=4 {
            board.set_species(Coord::new(6, col), SpeciesId::COIN);
        }
        let state = run(board, Feeder::new(), None, &f);
        assert_eq!(state.currency, 150);
        assert_eq!(state.score, 0.0);
    }

    #[test]
    fn disabled_ability_never_fires() {
        let mut f = fixture(AbilityId::CrossAttack, PkType::None);
        f.team.disabled.insert(AbilityId::CrossAttack);
        let mut board = Board::new();
        for col in 1..=3 {
            board.set_species(Coord::new(6, col), f.a);
        }
        let state = run(board, Feeder::new(), None, &f);
        assert_eq!(state.history[0].ability, AbilityId::None);
    }

    #[test]
    fn certain_ability_fires_on_chain_head() {
        let f = fixture(AbilityId::MegaKangaskhan, PkType::None);
        let mut board = Board::new();
        for col in 1..=3 {
            board.set_species(Coord::new(6, col), f.a);
        }
        let state = run(board, Feeder::new(), None, &f);
        assert_eq!(state.history[0].ability, AbilityId::MegaKangaskhan);
        assert_eq!(state.score, 100.0);
    }

    #[test]
    fn threshold_above_odds_suppresses_ability() {
        let mut f = fixture(AbilityId::HyperPunch, PkType::None);
        f.team.trigger_threshold = 50;
        let mut board = Board::new();
        for col in 1..=3 {
            board.set_species(Coord::new(6, col), f.a);
        }
        let state = run(board, Feeder::new(), None, &f);
        assert_eq!(state.history[0].ability, AbilityId::None);
    }

    #[test]
    fn progressive_ability_clears_extra_tiles() {
        let f = fixture(AbilityId::MegaLucario, PkType::None);
        let mut catalog = f.catalog.clone();
        catalog.insert(
            SpeciesDef::new("Eevee", 50, PkType::Normal, AbilityId::None)
                .with_mega("Mega Eevee", AbilityId::MegaLucario),
        );
        let team = f.team.clone().with_mega(f.a, 0);
        let ctx = TrialContext::new(&catalog, &team, &f.stage);

        let mut board = Board::new();
        for col in 1..=3 {
            board.set_species(Coord::new(6, col), f.a);
        }
        board.set_species(Coord::new(6, 5), f.a);
        board.set_species(Coord::new(6, 6), f.a);
        let mut state = TrialState::new(board, Feeder::new(), ChaCha8Rng::seed_from_u64(3), 1.0);
        run_cascade(&mut state, &ctx);

        assert_eq!(state.history[0].ability, AbilityId::MegaLucario);
        assert_eq!(state.blocks_cleared, 5);
        assert!(state.board.is_air(Coord::new(6, 6)));
        // two extra tiles add a scaled bonus: 50 × 2 × 0.2
        assert!((state.history[0].bonus - 20.0).abs() < 1e-9);
        assert_eq!(state.board.meter(), 0);
    }

    #[test]
    fn meter_rises_for_the_evolution_slot_species() {
        let f = fixture(AbilityId::None, PkType::None);
        let team = f.team.clone().with_mega(f.a, 100);
        let ctx = TrialContext::new(&f.catalog, &team, &f.stage);
        let mut board = Board::new();
        for col in 1..=4 {
            board.set_species(Coord::new(6, col), f.a);
        }
        let mut state = TrialState::new(board, Feeder::new(), ChaCha8Rng::seed_from_u64(3), 1.0);
        run_cascade(&mut state, &ctx);
        assert_eq!(state.board.meter(), 4);
    }

    #[test]
    fn iteration_cap_keeps_partial_state() {
        let f = fixture(AbilityId::None, PkType::None);
        let ctx = TrialContext::new(&f.catalog, &f.team, &f.stage).with_max_iterations(2);
        let mut board = Board::new();
        board.set_species(Coord::new(1, 1), f.a);
        let mut state = TrialState::new(board, Feeder::new(), ChaCha8Rng::seed_from_u64(3), 1.0);
        run_cascade(&mut state, &ctx);
        assert!(state.truncated);
        assert_eq!(state.iterations, 2);
    }
}
