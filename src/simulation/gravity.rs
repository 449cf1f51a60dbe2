use crate::board::{BOARD_SIZE, Coord, SpeciesId};
use crate::simulation::state::TrialState;

/// Ticks a falling tile needs to cross one row.
pub const FALL_QUANTUM: u32 = 4;

impl TrialState {
    /// Cells that hold their position and stop anything above them.
    fn is_stationary(&self, coord: Coord) -> bool {
        self.board.is_frozen(coord) || self.is_claimed(coord) || self.is_active(coord)
    }

    /// Advance falling tiles by the ticks elapsed since the last call, inject
    /// feeder tiles into empty top cells, then recompute who is still falling.
    pub(crate) fn gravity_tick(&mut self) {
        let elapsed = self.time.saturating_sub(self.last_gravity).min(u32::MAX as u64) as u32;
        self.last_gravity = self.time;

        for col in 1..=BOARD_SIZE {
            for row in (1..=BOARD_SIZE).rev() {
                let start = Coord::new(row, col);
                if !self.falling.get(start) {
                    continue;
                }
                let mut offset = self.fall_offset.get(start).saturating_add(elapsed);
                let mut here = start;
                while offset >= FALL_QUANTUM {
                    let below = here.offset(1, 0);
                    if !below.in_bounds() || !self.board.is_air(below) {
                        offset = FALL_QUANTUM;
                        break;
                    }
                    self.shift_down(here);
                    here = below;
                    offset -= FALL_QUANTUM;
                }
                self.fall_offset.set(here, offset);
            }

            let top = Coord::new(1, col);
            if self.board.is_air(top) && self.feeder.has_more(col) {
                if let Some(species) = self.feeder.poll(col) {
                    self.spawn(top, species);
                }
            }
        }
        self.refresh_falling();
    }

    fn spawn(&mut self, coord: Coord, species: SpeciesId) {
        self.board.set_species(coord, species);
        self.original.set(coord, false);
        self.falling.set(coord, false);
        self.fall_offset.set(coord, 0);
        self.changed = true;
    }

    /// Move the tile at `coord` one row down into the empty cell below it.
    fn shift_down(&mut self, coord: Coord) {
        let below = coord.offset(1, 0);
        let cell = self.board.get(coord);
        self.board.set_cell(below, cell);
        self.board.set_species(coord, SpeciesId::AIR);

        let original = self.original.get(coord);
        self.original.set(below, original);
        self.original.set(coord, false);
        self.falling.set(below, true);
        self.falling.set(coord, false);
        self.fall_offset.set(coord, 0);

        for m in self.move_cells.iter_mut() {
            if *m == coord {
                *m = below;
            }
        }
        self.changed = true;
    }

    /// Recompute the falling flag of every tile from the blockers beneath it
    /// and the next tick at which a falling tile crosses a row.
    pub(crate) fn refresh_falling(&mut self) {
        let mut next_bump: Option<u64> = None;
        for col in 1..=BOARD_SIZE {
            // lowest row the next movable tile up the column can settle on
            let mut floor = BOARD_SIZE;
            for row in (1..=BOARD_SIZE).rev() {
                let coord = Coord::new(row, col);
                if self.board.is_air(coord) {
                    self.falling.set(coord, false);
                    self.fall_offset.set(coord, 0);
                    continue;
                }
                if self.is_stationary(coord) {
                    self.land(coord);
                    floor = row - 1;
                    continue;
                }
                if floor > row {
                    if !self.falling.get(coord) {
                        self.falling.set(coord, true);
                        self.fall_offset.set(coord, 0);
                    }
                    let wait = FALL_QUANTUM.saturating_sub(self.fall_offset.get(coord)).max(1);
                    let at = self.time + wait as u64;
                    next_bump = Some(next_bump.map_or(at, |t| t.min(at)));
                } else {
                    self.land(coord);
                }
                floor -= 1;
            }
        }
        self.next_bump = next_bump;
    }

    fn land(&mut self, coord: Coord) {
        if self.falling.get(coord) {
            self.falling.set(coord, false);
            self.changed = true;
        }
        self.fall_offset.set(coord, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::simulation::feeder::Feeder;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const A: SpeciesId = SpeciesId(4);
    const B: SpeciesId = SpeciesId(5);

    fn state(board: Board, feeder: Feeder) -> TrialState {
        TrialState::new(board, feeder, ChaCha8Rng::seed_from_u64(0), 1.0)
    }

    fn settle(state: &mut TrialState) {
        state.gravity_tick();
        while let Some(t) = state.next_bump {
            state.time = t;
            state.gravity_tick();
        }
    }

    #[test]
    fn floating_tile_falls_to_bottom() {
        let mut board = Board::new();
        board.set_species(Coord::new(1, 3), A);
        let mut state = state(board, Feeder::new());
        state.refresh_falling();
        assert!(state.is_falling(Coord::new(1, 3)));
        assert_eq!(state.next_bump, Some(FALL_QUANTUM as u64));
        settle(&mut state);
        assert_eq!(state.board.species_at(Coord::new(6, 3)), A);
        assert!(state.board.is_air(Coord::new(1, 3)));
        assert!(!state.is_falling(Coord::new(6, 3)));
        // five rows at one quantum each
        assert_eq!(state.time, 5 * FALL_QUANTUM as u64);
        assert!(state.was_present_at_start(Coord::new(6, 3)));
    }

    #[test]
    fn frozen_tile_holds_the_column() {
        let mut board = Board::new();
        board.set_species(Coord::new(2, 1), A);
        board.set_frozen(Coord::new(2, 1), true);
        board.set_species(Coord::new(1, 1), B);
        let mut state = state(board, Feeder::new());
        settle(&mut state);
        assert_eq!(state.board.species_at(Coord::new(2, 1)), A);
        assert_eq!(state.board.species_at(Coord::new(1, 1)), B);
        assert_eq!(state.next_bump, None);
    }

    #[test]
    fn stacked_tiles_keep_their_order() {
        let mut board = Board::new();
        board.set_species(Coord::new(2, 2), A);
        board.set_species(Coord::new(3, 2), B);
        let mut state = state(board, Feeder::new());
        settle(&mut state);
        assert_eq!(state.board.species_at(Coord::new(6, 2)), B);
        assert_eq!(state.board.species_at(Coord::new(5, 2)), A);
        assert!(state.board.is_air(Coord::new(4, 2)));
    }

    #[test]
    fn feeder_refills_empty_columns_with_new_tiles() {
        let mut feeder = Feeder::new();
        feeder.push(4, A);
        feeder.push(4, B);
        let mut state = state(Board::new(), feeder);
        settle(&mut state);
        assert_eq!(state.board.species_at(Coord::new(6, 4)), A);
        assert_eq!(state.board.species_at(Coord::new(5, 4)), B);
        assert!(!state.feeder.has_more(4));
        assert!(!state.was_present_at_start(Coord::new(6, 4)));
        assert!(state.result_board().is_air(Coord::new(6, 4)));
    }

    #[test]
    fn supported_board_is_not_falling() {
        let mut board = Board::new();
        for col in 1..=6 {
            board.set_species(Coord::new(6, col), A);
        }
        let mut state = state(board, Feeder::new());
        state.changed = false;
        state.gravity_tick();
        assert_eq!(state.next_bump, None);
        assert!(!state.changed);
    }
}
