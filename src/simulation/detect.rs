use crate::ability::AbilityId;
use crate::board::{BOARD_SIZE, Coord, SpeciesId};
use crate::simulation::combo::Combo;
use crate::simulation::state::TrialState;

/// Straight line from the near corner of the bounding box of `coords` to its far corner.
pub(crate) fn bounding_line(coords: &[Coord]) -> Vec<Coord> {
    let (Some(min_row), Some(max_row), Some(min_col), Some(max_col)) = (
        coords.iter().map(|c| c.row).min(),
        coords.iter().map(|c| c.row).max(),
        coords.iter().map(|c| c.col).min(),
        coords.iter().map(|c| c.col).max(),
    ) else {
        return Vec::new();
    };
    let d_row = (max_row - min_row).signum();
    let d_col = (max_col - min_col).signum();
    let steps = (max_row - min_row).max(max_col - min_col);
    (0..=steps)
        .map(|i| Coord::new(min_row + i * d_row, min_col + i * d_col))
        .collect()
}

impl TrialState {
    fn matchable_at(&self, coord: Coord) -> Option<SpeciesId> {
        let species = self.board.species_at(coord);
        (species.is_matchable() && !self.is_falling(coord)).then_some(species)
    }

    /// Maximal runs of 3+ same-species settled tiles, rows first then columns.
    fn scan_runs(&self) -> Vec<(Vec<Coord>, bool, SpeciesId)> {
        let mut runs = Vec::new();
        for horizontal in [true, false] {
            for line in 1..=BOARD_SIZE {
                let mut run: Vec<Coord> = Vec::new();
                let mut run_species: Option<SpeciesId> = None;
                for step in 1..=BOARD_SIZE + 1 {
                    let coord = if horizontal {
                        Coord::new(line, step)
                    } else {
                        Coord::new(step, line)
                    };
                    let species = self.matchable_at(coord);
                    if species.is_some() && species == run_species {
                        run.push(coord);
                        continue;
                    }
                    if let Some(s) = run_species {
                        if run.len() >= 3 {
                            runs.push((std::mem::take(&mut run), horizontal, s));
                        }
                    }
                    run = vec![coord];
                    run_species = species;
                }
            }
        }
        runs
    }

    /// Rebuild every claim and pending combo from the current board.
    pub(crate) fn detect_combos(&mut self) {
        self.claimed.clear();
        self.pending.clear();
        for (run, horizontal, species) in self.scan_runs() {
            self.add_candidate(run, horizontal, species);
        }
        self.pending.sort_by_key(|c| c.priority());
    }

    fn add_candidate(&mut self, run: Vec<Coord>, horizontal: bool, species: SpeciesId) {
        let fresh: Vec<Coord> = run
            .iter()
            .copied()
            .filter(|c| !self.is_active(*c))
            .collect();
        if fresh.is_empty() {
            return;
        }

        let mut line = run;
        let mut chain_head = 0;
        for active in self.active_runs.values() {
            if active.horizontal == horizontal && active.run.iter().any(|c| line.contains(c)) {
                let mut union = line.clone();
                union.extend(active.run.iter().copied());
                line = bounding_line(&union);
                if chain_head == 0 {
                    chain_head = active.chain_head;
                }
            }
        }

        let touches_move = line.iter().any(|c| self.move_cells.contains(c));
        for c in &fresh {
            self.claimed.insert(*c);
        }
        self.pending.push(Combo {
            id: 0,
            run: line,
            cells: fresh,
            horizontal,
            species,
            chain_head,
            number: 0,
            ability: AbilityId::None,
            counter: 0,
            touches_move,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::simulation::feeder::Feeder;
    use crate::simulation::state::ActiveRun;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const A: SpeciesId = SpeciesId(4);
    const B: SpeciesId = SpeciesId(5);

    fn settled(cells: &[(i32, i32, SpeciesId)]) -> TrialState {
        let mut board = Board::new();
        for &(r, c, s) in cells {
            board.set_species(Coord::new(r, c), s);
        }
        TrialState::new(board, Feeder::new(), ChaCha8Rng::seed_from_u64(0), 1.0)
    }

    #[test]
    fn bounding_line_spans_box_corners() {
        let line = bounding_line(&[Coord::new(6, 4), Coord::new(6, 1), Coord::new(6, 2)]);
        assert_eq!(
            line,
            vec![
                Coord::new(6, 1),
                Coord::new(6, 2),
                Coord::new(6, 3),
                Coord::new(6, 4)
            ]
        );
        assert!(bounding_line(&[]).is_empty());
    }

    #[test]
    fn finds_horizontal_and_vertical_runs() {
        let mut state = settled(&[
            (6, 1, A),
            (6, 2, A),
            (6, 3, A),
            (6, 4, B),
            (4, 6, B),
            (5, 6, B),
            (6, 6, B),
        ]);
        state.detect_combos();
        assert_eq!(state.pending().len(), 2);
        let first = &state.pending()[0];
        assert!(first.horizontal);
        assert_eq!(first.species, A);
        assert_eq!(first.size(), 3);
        let second = &state.pending()[1];
        assert!(!second.horizontal);
        assert_eq!(second.species, B);
        assert_eq!(state.claims().len(), 6);
    }

    #[test]
    fn pairs_and_obstructions_never_match() {
        let mut state = settled(&[
            (6, 1, A),
            (6, 2, A),
            (6, 3, B),
            (5, 1, SpeciesId::WOOD),
            (5, 2, SpeciesId::WOOD),
            (5, 3, SpeciesId::WOOD),
        ]);
        state.detect_combos();
        assert!(state.pending().is_empty());
        assert!(state.claims().is_empty());
    }

    #[test]
    fn falling_tiles_are_excluded() {
        let mut state = settled(&[(3, 1, A), (3, 2, A), (3, 3, A)]);
        state.refresh_falling();
        state.detect_combos();
        assert!(state.pending().is_empty());
    }

    #[test]
    fn detection_is_idempotent_on_a_stable_board() {
        let mut state = settled(&[
            (6, 1, A),
            (6, 2, A),
            (6, 3, A),
            (6, 4, A),
            (5, 1, B),
            (4, 1, B),
            (3, 1, B),
        ]);
        state.refresh_falling();
        state.detect_combos();
        let claims = state.claims();
        let pending = state.pending().to_vec();
        state.detect_combos();
        assert_eq!(state.claims(), claims);
        assert_eq!(state.pending(), pending.as_slice());
    }

    #[test]
    fn run_extending_an_active_combo_merges_into_its_line() {
        let mut state = settled(&[
            (6, 1, A),
            (6, 2, A),
            (6, 3, A),
            (6, 4, A),
        ]);
        for col in 1..=3 {
            state.active.insert(Coord::new(6, col), Some(7));
        }
        state.active_runs.insert(
            7,
            ActiveRun {
                run: vec![Coord::new(6, 1), Coord::new(6, 2), Coord::new(6, 3)],
                horizontal: true,
                chain_head: 7,
            },
        );
        state.detect_combos();
        assert_eq!(state.pending().len(), 1);
        let merged = &state.pending()[0];
        assert_eq!(merged.size(), 4);
        assert_eq!(merged.cells, vec![Coord::new(6, 4)]);
        assert_eq!(merged.chain_head, 7);
    }

    #[test]
    fn fully_active_run_is_not_a_candidate() {
        let mut state = settled(&[(6, 1, A), (6, 2, A), (6, 3, A)]);
        for col in 1..=3 {
            state.active.insert(Coord::new(6, col), Some(1));
        }
        state.detect_combos();
        assert!(state.pending().is_empty());
    }
}
