/// Cumulative combo counts at which the chain multiplier steps up.
const CHAIN_BREAKPOINTS: [(u32, f64); 8] = [
    (1, 1.0),
    (2, 1.1),
    (5, 1.15),
    (10, 1.2),
    (25, 1.3),
    (50, 1.4),
    (75, 1.5),
    (100, 2.0),
];

/// Currency granted per currency-tile match before the block multiplier.
pub const COIN_VALUE: f64 = 100.0;

/// Multiplier for a match of `size` tiles; sizes clamp to `[3, 6]`.
pub fn block_multiplier(size: usize) -> f64 {
    match size.clamp(3, 6) {
        6 => 3.0,
        n => (n as f64 - 1.0) / 2.0,
    }
}

/// Step multiplier for the `count`-th combo of a trial.
pub fn chain_multiplier(count: u32) -> f64 {
    CHAIN_BREAKPOINTS
        .iter()
        .rev()
        .find(|(at, _)| count >= *at)
        .map_or(1.0, |(_, m)| *m)
}
