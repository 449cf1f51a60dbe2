use std::collections::VecDeque;

use rand::Rng;
use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::board::{BOARD_SIZE, SpeciesId};
use crate::simulation::context::DropRule;

/// Per-column queues of tiles waiting to drop onto the board.
#[derive(Debug, Clone, PartialEq)]
pub struct Feeder {
    id: Uuid,
    columns: [VecDeque<SpeciesId>; BOARD_SIZE as usize],
}

impl Default for Feeder {
    fn default() -> Self {
        Self::new()
    }
}

fn column_index(column: i32) -> Option<usize> {
    if (1..=BOARD_SIZE).contains(&column) {
        Some((column - 1) as usize)
    } else {
        None
    }
}

impl Feeder {
    /// A feeder with every column empty.
    pub fn new() -> Self {
        Feeder {
            id: Uuid::new_v4(),
            columns: Default::default(),
        }
    }

    /// A feeder with every column filled to `height` from `possible`.
    pub fn filled(height: usize, possible: &[SpeciesId], rng: &mut impl Rng) -> Self {
        let mut feeder = Feeder::new();
        feeder.fill_to(height, possible, rng);
        feeder
    }

    /// Independent copy with its own identity.
    pub fn fork(&self) -> Self {
        Feeder {
            id: Uuid::new_v4(),
            columns: self.columns.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn has_more(&self, column: i32) -> bool {
        column_index(column).is_some_and(|i| !self.columns[i].is_empty())
    }

    /// Dequeue the next tile for `column`.
    pub fn poll(&mut self, column: i32) -> Option<SpeciesId> {
        column_index(column).and_then(|i| self.columns[i].pop_front())
    }

    pub fn push(&mut self, column: i32, species: SpeciesId) {
        if let Some(i) = column_index(column) {
            self.columns[i].push_back(species);
        }
    }

    pub fn height(&self, column: i32) -> usize {
        column_index(column).map_or(0, |i| self.columns[i].len())
    }

    /// Top every column up to `height` with uniformly chosen species.
    pub fn fill_to(&mut self, height: usize, possible: &[SpeciesId], rng: &mut impl Rng) {
        if possible.is_empty() {
            return;
        }
        for queue in self.columns.iter_mut() {
            while queue.len() < height {
                if let Some(&species) = possible.choose(rng) {
                    queue.push_back(species);
                }
            }
        }
    }

    /// Enumerate every feeder implied by `rules`, fill each to `min_height`, and
    /// replicate so the total approximates `trial_count`. Weights sum to 1.
    pub fn permutations(
        rules: &[DropRule],
        min_height: usize,
        possible: &[SpeciesId],
        trial_count: usize,
        rng: &mut impl Rng,
    ) -> Vec<(Feeder, f64)> {
        let mut perms: Vec<(Feeder, f64)> = vec![(Feeder::new(), 1.0)];
        for rule in rules {
            if column_index(rule.column).is_none() || rule.alternatives.is_empty() {
                continue;
            }
            let share = 1.0 / rule.alternatives.len() as f64;
            let mut next = Vec::with_capacity(perms.len() * rule.alternatives.len());
            for (feeder, weight) in &perms {
                for alternative in &rule.alternatives {
                    let mut branch = feeder.fork();
                    for &species in alternative {
                        branch.push(rule.column, species);
                    }
                    next.push((branch, weight * share));
                }
            }
            perms = next;
        }

        let replicas = trial_count.div_ceil(perms.len()).max(1);
        let mut trials = Vec::with_capacity(perms.len() * replicas);
        for (feeder, weight) in &perms {
            for _ in 0..replicas {
                let mut trial = feeder.fork();
                trial.fill_to(min_height, possible, rng);
                trials.push((trial, weight / replicas as f64));
            }
        }
        trials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn empty_feeder_has_nothing() {
        let mut feeder = Feeder::new();
        for col in 1..=6 {
            assert!(!feeder.has_more(col));
            assert_eq!(feeder.poll(col), None);
        }
        assert!(!feeder.has_more(0));
        assert!(!feeder.has_more(7));
    }

    #[test]
    fn poll_is_fifo() {
        let mut feeder = Feeder::new();
        feeder.push(2, SpeciesId(5));
        feeder.push(2, SpeciesId(6));
        assert!(feeder.has_more(2));
        assert_eq!(feeder.poll(2), Some(SpeciesId(5)));
        assert_eq!(feeder.poll(2), Some(SpeciesId(6)));
        assert!(!feeder.has_more(2));
    }

    #[test]
    fn filled_reaches_height_from_possible_set() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let possible = [SpeciesId(4), SpeciesId(5)];
        let feeder = Feeder::filled(9, &possible, &mut rng);
        for col in 1..=6 {
            assert_eq!(feeder.height(col), 9);
        }
        let mut copy = feeder.clone();
        while let Some(s) = copy.poll(3) {
            assert!(possible.contains(&s));
        }
    }

    #[test]
    fn fork_has_new_identity_same_contents() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let feeder = Feeder::filled(3, &[SpeciesId(4)], &mut rng);
        let forked = feeder.fork();
        assert_ne!(feeder.id(), forked.id());
        assert_eq!(feeder.height(1), forked.height(1));
    }

    #[test]
    fn permutations_cover_rule_product_with_unit_weight() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let rules = vec![
            DropRule {
                column: 1,
                alternatives: vec![vec![SpeciesId::WOOD], vec![SpeciesId::METAL]],
            },
            DropRule {
                column: 4,
                alternatives: vec![vec![SpeciesId::COIN], vec![], vec![SpeciesId::WOOD]],
            },
        ];
        let trials = Feeder::permutations(&rules, 6, &[SpeciesId(4)], 12, &mut rng);
        // 6 permutations, 2 replicas each
        assert_eq!(trials.len(), 12);
        let total: f64 = trials.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);

        let mut heads: Vec<SpeciesId> = trials
            .iter()
            .map(|(f, _)| f.clone().poll(1).unwrap_or(SpeciesId::AIR))
            .collect();
        heads.dedup();
        assert!(heads.contains(&SpeciesId::WOOD));
        assert!(heads.contains(&SpeciesId::METAL));
        for (feeder, _) in &trials {
            assert!(feeder.height(2) >= 6);
        }
    }

    #[test]
    fn permutations_without_rules_replicate_trial_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let trials = Feeder::permutations(&[], 4, &[SpeciesId(4)], 5, &mut rng);
        assert_eq!(trials.len(), 5);
        for (_, w) in &trials {
            assert!((w - 0.2).abs() < 1e-12);
        }
    }
}
