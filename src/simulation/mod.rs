pub mod combo;
pub mod context;
mod detect;
pub mod engine;
pub mod feeder;
mod gravity;
pub mod scoring;
pub mod state;

use std::panic::{AssertUnwindSafe, catch_unwind};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::board::{Board, Move};

pub use combo::{Combo, ComboEffect, ComboId, EraseMode};
pub use context::{DropRule, Stage, Team, TrialContext};
pub use engine::{MAX_ITERATIONS, run_cascade};
pub use feeder::Feeder;
pub use state::{ComboRecord, TrialState};

/// Why a single trial contributed nothing. Sibling trials are unaffected.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialError {
    /// The engine hit an internal fault; the message is the panic payload.
    Panicked(String),
    /// The candidate swap could not be applied to the starting board.
    InvalidMove(Move),
}

impl std::fmt::Display for TrialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrialError::Panicked(msg) => write!(f, "Trial panicked: {}", msg),
            TrialError::InvalidMove(mv) => write!(f, "Move {} cannot be applied", mv),
        }
    }
}

impl std::error::Error for TrialError {}

/// Inputs owned by one trial.
#[derive(Debug, Clone)]
pub struct TrialSetup {
    pub board: Board,
    pub mv: Option<Move>,
    pub feeder: Feeder,
    pub weight: f64,
    pub seed: u64,
}

/// Execute one trial: apply the move to a private copy of the board, then run
/// the cascade to completion. Internal faults are caught and reported as
/// [`TrialError::Panicked`] instead of unwinding into the caller.
pub fn run_trial(setup: TrialSetup, ctx: &TrialContext<'_>) -> Result<TrialState, TrialError> {
    let TrialSetup {
        board,
        mv,
        feeder,
        weight,
        seed,
    } = setup;
    let mut state = TrialState::new(board, feeder, ChaCha8Rng::seed_from_u64(seed), weight);
    if let Some(mv) = mv {
        if !state.apply_move(mv) {
            return Err(TrialError::InvalidMove(mv));
        }
    }

    isolate(move || {
        run_cascade(&mut state, ctx);
        state
    })
}

/// Run one unit of trial work, turning a panic into [`TrialError::Panicked`].
fn isolate<F>(work: F) -> Result<TrialState, TrialError>
where
    F: FnOnce() -> TrialState,
{
    catch_unwind(AssertUnwindSafe(work)).map_err(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        TrialError::Panicked(msg)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::AbilityId;
    use crate::board::{Coord, PkType, SpeciesCatalog, SpeciesDef, SpeciesId};

    fn catalog() -> (SpeciesCatalog, SpeciesId, SpeciesId) {
        let mut catalog = SpeciesCatalog::new();
        let a = catalog.insert(SpeciesDef::new("Eevee", 50, PkType::Normal, AbilityId::None));
        let b = catalog.insert(SpeciesDef::new("Vulpix", 50, PkType::Fire, AbilityId::None));
        (catalog, a, b)
    }

    fn setup(board: Board, mv: Option<Move>, feeder: Feeder, seed: u64) -> TrialSetup {
        TrialSetup {
            board,
            mv,
            feeder,
            weight: 1.0,
            seed,
        }
    }

    #[test]
    fn empty_board_without_move_scores_nothing() {
        let (catalog, a, _) = catalog();
        let team = Team::new(vec![a]);
        let stage = Stage::default();
        let ctx = TrialContext::new(&catalog, &team, &stage);
        let state = run_trial(setup(Board::new(), None, Feeder::new(), 1), &ctx).unwrap();
        assert_eq!(state.score, 0.0);
        assert_eq!(state.currency, 0);
        assert_eq!(state.blocks_cleared, 0);
    }

    #[test]
    fn move_from_empty_cell_is_rejected() {
        let (catalog, a, _) = catalog();
        let team = Team::new(vec![a]);
        let stage = Stage::default();
        let ctx = TrialContext::new(&catalog, &team, &stage);
        let mv = Move::new(Coord::new(1, 1), Coord::new(1, 2));
        let err = run_trial(setup(Board::new(), Some(mv), Feeder::new(), 1), &ctx).unwrap_err();
        assert_eq!(err, TrialError::InvalidMove(mv));
        assert!(err.to_string().contains("(1,1)->(1,2)"));
    }

    #[test]
    fn same_seed_reproduces_the_trial() {
        let (catalog, a, b) = catalog();
        let team = Team::new(vec![a, b]);
        let stage = Stage::default();
        let ctx = TrialContext::new(&catalog, &team, &stage);
        let mut board = Board::new();
        for col in 1..=6 {
            board.set_species(Coord::new(6, col), if col % 2 == 0 { a } else { b });
        }
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let feeder = Feeder::filled(12, &[a, b], &mut rng);

        let first = run_trial(setup(board.clone(), None, feeder.clone(), 9), &ctx).unwrap();
        let second = run_trial(setup(board, None, feeder, 9), &ctx).unwrap();
        assert_eq!(first.score, second.score);
        assert_eq!(first.board, second.board);
        assert_eq!(first.combos, second.combos);
    }

    #[test]
    fn feeder_tiles_are_masked_from_the_result_board() {
        let (catalog, a, b) = catalog();
        let team = Team::new(vec![a, b]);
        let stage = Stage::default();
        let ctx = TrialContext::new(&catalog, &team, &stage);
        let mut board = Board::new();
        for col in 1..=3 {
            board.set_species(Coord::new(6, col), a);
        }
        let mut feeder = Feeder::new();
        feeder.push(1, b);
        let state = run_trial(setup(board, None, feeder, 1), &ctx).unwrap();
        assert_eq!(state.board.species_at(Coord::new(6, 1)), b);
        assert!(state.result_board().is_air(Coord::new(6, 1)));
    }

    #[test]
    fn panicking_cascade_becomes_a_trial_error() {
        let err = isolate(|| panic!("cell out of range")).unwrap_err();
        assert_eq!(err, TrialError::Panicked("cell out of range".to_string()));

        let row = 9;
        let err = isolate(move || panic!("row {} out of range", row)).unwrap_err();
        assert_eq!(err, TrialError::Panicked("row 9 out of range".to_string()));
    }

    #[test]
    fn trial_error_display() {
        assert_eq!(
            TrialError::Panicked("boom".into()).to_string(),
            "Trial panicked: boom"
        );
    }
}
