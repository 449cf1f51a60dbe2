use std::collections::HashMap;
use std::time::SystemTime;

use crate::board::{Board, Move};

use super::result::{Distribution, TrialOutcome, TrialResult};

/// Merge the finished trials of one candidate move into a single weighted
/// forecast. Returns `None` when no trial contributed.
///
/// The result board is the one with the highest cumulative weight across
/// trials; on a tie the board seen first wins.
pub fn aggregate(
    mv: Option<Move>,
    outcomes: &[TrialOutcome],
    epoch: u64,
    started: SystemTime,
) -> Option<TrialResult> {
    if outcomes.is_empty() {
        return None;
    }

    let board = most_likely_board(outcomes)?;
    let metric = |value: fn(&TrialOutcome) -> f64| {
        let samples: Vec<(f64, f64)> = outcomes.iter().map(|o| (value(o), o.weight)).collect();
        Distribution::from_weighted(&samples)
    };

    Some(TrialResult {
        mv,
        board,
        score: metric(|o| o.score)?,
        currency: metric(|o| o.currency as f64)?,
        meter_progress: metric(|o| o.meter_progress as f64)?,
        blocks_cleared: metric(|o| o.blocks_cleared as f64)?,
        disruptions_cleared: metric(|o| o.disruptions_cleared as f64)?,
        combos: metric(|o| o.combos as f64)?,
        trials: outcomes.len(),
        truncated: outcomes.iter().filter(|o| o.truncated).count(),
        epoch,
        started,
    })
}

fn most_likely_board(outcomes: &[TrialOutcome]) -> Option<Board> {
    // index into `seen` keeps discovery order for tie-breaking
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut seen: Vec<(&Board, f64)> = Vec::new();
    for outcome in outcomes {
        let key = outcome.board.canonical();
        match index.get(&key) {
            Some(&i) => seen[i].1 += outcome.weight,
            None => {
                index.insert(key, seen.len());
                seen.push((&outcome.board, outcome.weight));
            }
        }
    }

    let mut best: Option<(&Board, f64)> = None;
    for &(board, weight) in &seen {
        if best.is_none_or(|(_, w)| weight > w) {
            best = Some((board, weight));
        }
    }
    best.map(|(board, _)| board.clone())
}
