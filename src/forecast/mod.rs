pub mod aggregate;
pub mod result;
pub mod scheduler;

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::board::{Board, Move, SpeciesCatalog};
use crate::config::ForecastConfig;
use crate::simulation::{self, Feeder, Stage, Team, TrialContext, TrialSetup};

pub use aggregate::aggregate;
pub use result::{Distribution, TrialOutcome, TrialResult};
pub use scheduler::{ForecastBatch, ForecastScheduler};

/// Everything one computation reads. Shared read-only by every trial.
#[derive(Debug, Clone)]
pub struct ForecastInput {
    pub catalog: SpeciesCatalog,
    pub team: Team,
    pub stage: Stage,
    pub board: Board,
    /// Candidate moves; `None` forecasts the board as it stands.
    pub moves: Vec<Option<Move>>,
}

impl From<crate::config::Scenario> for ForecastInput {
    fn from(scenario: crate::config::Scenario) -> Self {
        ForecastInput {
            catalog: scenario.catalog,
            team: scenario.team,
            stage: scenario.stage,
            board: scenario.board,
            moves: scenario.moves,
        }
    }
}

/// Runs trials on a bounded worker pool and merges them per move.
///
/// Every computation gets a fresh epoch. Starting a computation while another
/// is in flight replaces the pool; the abandoned batch keeps running on the
/// old pool until it drains, and its results are dropped on arrival.
pub struct Forecaster {
    config: ForecastConfig,
    epoch: AtomicU64,
    in_flight: AtomicUsize,
    pool: Mutex<Arc<ThreadPool>>,
}

fn build_pool(threads: usize) -> Result<ThreadPool, String> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("forecast-{}", i))
        .build()
        .map_err(|e| format!("Cannot build worker pool: {}", e))
}

/// Per-trial seed derived from the computation's base seed.
fn trial_seed(base: u64, move_index: usize, trial_index: usize) -> u64 {
    base.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add((move_index as u64) << 32)
        .wrapping_add(trial_index as u64)
}

impl Forecaster {
    pub fn new(config: ForecastConfig) -> Result<Self, String> {
        config.validate()?;
        let pool = build_pool(config.effective_threads())?;
        Ok(Forecaster {
            config,
            epoch: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            pool: Mutex::new(Arc::new(pool)),
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.current_epoch() == epoch
    }

    /// Mint a new epoch, invalidating any computation in flight. A busy pool
    /// is swapped for a fresh one so the new batch does not queue behind it.
    pub fn begin(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            match build_pool(self.config.effective_threads()) {
                Ok(pool) => {
                    if let Ok(mut slot) = self.pool.lock() {
                        *slot = Arc::new(pool);
                    }
                    debug!(epoch, "Replaced busy worker pool");
                }
                Err(e) => warn!(epoch, error = %e, "Keeping busy worker pool"),
            }
        }
        epoch
    }

    /// Start a new computation and run it to completion. `None` when a newer
    /// computation superseded this one before it finished.
    pub fn compute(&self, input: &ForecastInput) -> Option<Vec<TrialResult>> {
        let epoch = self.begin();
        self.compute_for_epoch(input, epoch)
    }

    /// Run the computation tagged `epoch` (from [`Forecaster::begin`]).
    pub fn compute_for_epoch(&self, input: &ForecastInput, epoch: u64) -> Option<Vec<TrialResult>> {
        let pool = match self.pool.lock() {
            Ok(slot) => Arc::clone(&slot),
            Err(_) => {
                warn!(epoch, "Worker pool lock poisoned");
                return None;
            }
        };
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let results = self.run_batch(&pool, input, epoch);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        results
    }

    fn run_batch(&self, pool: &ThreadPool, input: &ForecastInput, epoch: u64) -> Option<Vec<TrialResult>> {
        let started = SystemTime::now();
        let clock = Instant::now();
        let base_seed = if self.config.seed == 0 {
            rand::random::<u64>()
        } else {
            self.config.seed
        };

        // One feeder set per computation so every move sees the same drops.
        let possible: Vec<_> = input
            .team
            .roster
            .iter()
            .copied()
            .filter(|s| s.is_matchable())
            .collect();
        let mut feed_rng = ChaCha8Rng::seed_from_u64(base_seed);
        let feeders = Feeder::permutations(
            &input.stage.drop_rules,
            self.config.min_feed_height,
            &possible,
            self.config.trial_count,
            &mut feed_rng,
        );

        let ctx = TrialContext::new(&input.catalog, &input.team, &input.stage)
            .with_max_iterations(self.config.max_iterations);

        let mut results = Vec::with_capacity(input.moves.len());
        for (move_index, &mv) in input.moves.iter().enumerate() {
            let outcomes: Vec<TrialOutcome> = pool.install(|| {
                feeders
                    .par_iter()
                    .enumerate()
                    .filter_map(|(trial, (feeder, weight))| {
                        let setup = TrialSetup {
                            board: input.board.clone(),
                            mv,
                            feeder: feeder.fork(),
                            weight: *weight,
                            seed: trial_seed(base_seed, move_index, trial),
                        };
                        match simulation::run_trial(setup, &ctx) {
                            Ok(state) => {
                                if state.truncated {
                                    warn!(epoch, trial, iterations = state.iterations, "Trial hit the iteration cap");
                                }
                                Some(TrialOutcome::from(&state))
                            }
                            Err(e) => {
                                warn!(epoch, trial, error = %e, "Trial contributed no result");
                                None
                            }
                        }
                    })
                    .collect()
            });

            // join point: a newer computation makes everything here stale
            if !self.is_current(epoch) {
                debug!(epoch, current = self.current_epoch(), "Dropping stale computation");
                return None;
            }
            if let Some(result) = aggregate(mv, &outcomes, epoch, started) {
                results.push(result);
            }
        }

        info!(
            epoch,
            moves = input.moves.len(),
            trials = feeders.len(),
            elapsed_ms = clock.elapsed().as_millis() as u64,
            "Forecast complete"
        );
        Some(results)
    }

    /// Best move first: mean score, then mean currency, then mean blocks cleared.
    pub fn rank(results: &mut [TrialResult]) {
        results.sort_by(|a, b| {
            let key = |r: &TrialResult| [r.score.mean, r.currency.mean, r.blocks_cleared.mean];
            let (ka, kb) = (key(a), key(b));
            ka.iter()
                .zip(kb.iter())
                .map(|(x, y)| y.partial_cmp(x).unwrap_or(CmpOrdering::Equal))
                .find(|o| *o != CmpOrdering::Equal)
                .unwrap_or(CmpOrdering::Equal)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::AbilityId;
    use crate::board::{Coord, PkType, SpeciesDef};
    use crate::simulation::DropRule;

    fn config(seed: u64) -> ForecastConfig {
        ForecastConfig {
            trial_count: 8,
            min_feed_height: 8,
            worker_threads: 2,
            seed,
            ..ForecastConfig::default()
        }
    }

    fn input(moves: Vec<Option<Move>>) -> ForecastInput {
        let mut catalog = SpeciesCatalog::new();
        let a = catalog.insert(SpeciesDef::new("Eevee", 50, PkType::Normal, AbilityId::None));
        let b = catalog.insert(SpeciesDef::new("Vulpix", 50, PkType::Fire, AbilityId::None));
        let mut board = Board::new();
        board.set_species(Coord::new(6, 1), a);
        board.set_species(Coord::new(6, 2), a);
        board.set_species(Coord::new(6, 3), b);
        board.set_species(Coord::new(5, 3), a);
        ForecastInput {
            catalog,
            team: Team::new(vec![a, b]),
            stage: Stage::default(),
            board,
            moves,
        }
    }

    fn completing_move() -> Move {
        Move::new(Coord::new(5, 3), Coord::new(6, 3))
    }

    #[test]
    fn one_result_per_candidate_move() {
        let forecaster = Forecaster::new(config(11)).unwrap();
        let results = forecaster
            .compute(&input(vec![None, Some(completing_move())]))
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].mv, None);
        assert_eq!(results[1].mv, Some(completing_move()));
        assert_eq!(results[0].epoch, forecaster.current_epoch());
        assert!(results.iter().all(|r| r.trials == 8));
    }

    #[test]
    fn completing_a_run_scores_at_least_the_first_combo() {
        let forecaster = Forecaster::new(config(3)).unwrap();
        let results = forecaster.compute(&input(vec![Some(completing_move())])).unwrap();
        // the three Eevee tiles on row 6 clear for 50 × 1.0 × 1.0 × 1.0
        assert!(results[0].score.min >= 50.0);
        assert!(results[0].blocks_cleared.min >= 3.0);
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let first = Forecaster::new(config(21))
            .unwrap()
            .compute(&input(vec![Some(completing_move())]))
            .unwrap();
        let second = Forecaster::new(config(21))
            .unwrap()
            .compute(&input(vec![Some(completing_move())]))
            .unwrap();
        assert_eq!(first[0].score, second[0].score);
        assert_eq!(first[0].board, second[0].board);
    }

    #[test]
    fn invalid_moves_contribute_no_result() {
        let forecaster = Forecaster::new(config(5)).unwrap();
        let bad = Move::new(Coord::new(1, 1), Coord::new(1, 2));
        let results = forecaster.compute(&input(vec![Some(bad)])).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn stale_epoch_is_dropped() {
        let forecaster = Forecaster::new(config(5)).unwrap();
        let stale = forecaster.begin();
        let _ = forecaster.begin();
        assert!(forecaster.compute_for_epoch(&input(vec![None]), stale).is_none());
    }

    #[test]
    fn drop_rules_multiply_trials() {
        let forecaster = Forecaster::new(config(8)).unwrap();
        let mut input = input(vec![None]);
        input.stage.drop_rules = vec![DropRule {
            column: 4,
            alternatives: vec![vec![crate::board::SpeciesId::WOOD]; 3],
        }];
        let results = forecaster.compute(&input).unwrap();
        // 3 permutations × ceil(8 / 3) replicas
        assert_eq!(results[0].trials, 9);
    }

    #[test]
    fn rank_puts_the_scoring_move_first() {
        // a full board with no runs: standing still clears nothing
        let mut input = input(vec![None]);
        let (a, b) = (input.team.roster[0], input.team.roster[1]);
        for coord in Coord::all() {
            let odd_row = coord.row % 2 == 1;
            let first_pair = matches!(coord.col, 1 | 2 | 5 | 6);
            input.board.set_species(coord, if odd_row == first_pair { a } else { b });
        }
        let swap = Move::new(Coord::new(5, 3), Coord::new(6, 3));
        input.moves = vec![None, Some(swap)];

        let forecaster = Forecaster::new(config(13)).unwrap();
        let mut results = forecaster.compute(&input).unwrap();
        assert_eq!(results[0].score.max, 0.0);
        Forecaster::rank(&mut results);
        assert_eq!(results[0].mv, Some(swap));
        assert!(results[0].score.min >= 100.0);
    }

    #[test]
    fn zero_trial_count_is_rejected() {
        let bad = ForecastConfig {
            trial_count: 0,
            ..ForecastConfig::default()
        };
        match Forecaster::new(bad) {
            Ok(_) => panic!("zero trials should not build a forecaster"),
            Err(e) => assert!(e.contains("trial_count")),
        }
    }
}
