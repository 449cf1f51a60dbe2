use std::time::SystemTime;

use serde::{Serialize, Serializer};

use crate::board::{Board, Move};
use crate::simulation::TrialState;

/// Weighted summary of one metric across the trials of a move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Distribution {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

impl Distribution {
    /// Summarise `(value, weight)` samples. Non-positive total weight falls
    /// back to equal weights. Returns `None` for an empty sample set.
    pub fn from_weighted(samples: &[(f64, f64)]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let total: f64 = samples.iter().map(|&(_, w)| w.max(0.0)).sum();
        let weight_of = |w: f64| if total > 0.0 { w.max(0.0) } else { 1.0 };
        let norm = if total > 0.0 { total } else { samples.len() as f64 };

        let mean = samples.iter().map(|&(v, w)| v * weight_of(w)).sum::<f64>() / norm;
        let variance = samples
            .iter()
            .map(|&(v, w)| weight_of(w) * (v - mean).powi(2))
            .sum::<f64>()
            / norm;
        let min = samples.iter().map(|&(v, _)| v).fold(f64::INFINITY, f64::min);
        let max = samples.iter().map(|&(v, _)| v).fold(f64::NEG_INFINITY, f64::max);

        Some(Distribution {
            mean,
            min,
            max,
            std_dev: variance.sqrt(),
        })
    }
}

/// The values one finished trial contributes to aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    /// Result board with feeder-introduced tiles masked out.
    pub board: Board,
    pub weight: f64,
    pub score: f64,
    pub currency: u64,
    pub meter_progress: i64,
    pub blocks_cleared: u32,
    pub disruptions_cleared: u32,
    pub combos: u32,
    pub truncated: bool,
}

impl From<&TrialState> for TrialOutcome {
    fn from(state: &TrialState) -> Self {
        TrialOutcome {
            board: state.result_board(),
            weight: state.weight,
            score: state.score,
            currency: state.currency,
            meter_progress: state.meter_progress(),
            blocks_cleared: state.blocks_cleared,
            disruptions_cleared: state.disruptions_cleared,
            combos: state.combos,
            truncated: state.truncated,
        }
    }
}

/// Aggregated forecast for one candidate move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    #[serde(rename = "move")]
    pub mv: Option<Move>,
    /// The most likely result board.
    #[serde(serialize_with = "serialize_board")]
    pub board: Board,
    pub score: Distribution,
    pub currency: Distribution,
    pub meter_progress: Distribution,
    pub blocks_cleared: Distribution,
    pub disruptions_cleared: Distribution,
    pub combos: Distribution,
    /// Trials that contributed.
    pub trials: usize,
    /// Contributing trials that hit the iteration cap.
    pub truncated: usize,
    /// Computation the result belongs to.
    pub epoch: u64,
    pub started: SystemTime,
}

fn serialize_board<S: Serializer>(board: &Board, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&board.canonical())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_unit_weight_sample_is_exact() {
        let d = Distribution::from_weighted(&[(123.456, 1.0)]).unwrap();
        assert_eq!(d.mean, 123.456);
        assert_eq!(d.min, 123.456);
        assert_eq!(d.max, 123.456);
        assert_eq!(d.std_dev, 0.0);
    }

    #[test]
    fn weights_shift_the_mean() {
        let d = Distribution::from_weighted(&[(0.0, 0.25), (100.0, 0.75)]).unwrap();
        assert!((d.mean - 75.0).abs() < 1e-9);
        assert_eq!(d.min, 0.0);
        assert_eq!(d.max, 100.0);
        // sqrt(0.25 * 75^2 + 0.75 * 25^2)
        assert!((d.std_dev - 1875.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn zero_total_weight_falls_back_to_equal_weights() {
        let d = Distribution::from_weighted(&[(2.0, 0.0), (4.0, 0.0)]).unwrap();
        assert_eq!(d.mean, 3.0);
    }

    #[test]
    fn empty_samples_have_no_distribution() {
        assert!(Distribution::from_weighted(&[]).is_none());
    }
}
