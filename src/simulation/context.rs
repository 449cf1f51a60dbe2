use std::collections::{HashMap, HashSet};

use crate::ability::AbilityId;
use crate::board::{PkType, SpeciesCatalog, SpeciesId};

/// Team definition consumed read-only by every trial.
#[derive(Debug, Clone, Default)]
pub struct Team {
    /// Species that can drop in from the feeder.
    pub roster: Vec<SpeciesId>,
    pub levels: HashMap<SpeciesId, u8>,
    /// Species occupying the evolution slot, if any.
    pub mega_slot: Option<SpeciesId>,
    /// Meter progress at which the evolution slot switches to its alternate ability.
    pub mega_threshold: u32,
    pub disabled: HashSet<AbilityId>,
    /// Abilities whose odds for a match size fall below this percentage never fire.
    pub trigger_threshold: u8,
}

impl Team {
    pub fn new(roster: Vec<SpeciesId>) -> Self {
        Team {
            roster,
            ..Default::default()
        }
    }

    pub fn with_mega(mut self, species: SpeciesId, threshold: u32) -> Self {
        self.mega_slot = Some(species);
        self.mega_threshold = threshold;
        self
    }

    pub fn level_of(&self, species: SpeciesId) -> u8 {
        self.levels.get(&species).copied().unwrap_or(1)
    }

    pub fn is_mega_slot(&self, species: SpeciesId) -> bool {
        self.mega_slot == Some(species)
    }
}

/// Alternative leading sequences a column's feeder may start with.
#[derive(Debug, Clone, PartialEq)]
pub struct DropRule {
    pub column: i32,
    pub alternatives: Vec<Vec<SpeciesId>>,
}

/// Stage definition; read-only inputs to a few conditional abilities.
#[derive(Debug, Clone)]
pub struct Stage {
    pub target: PkType,
    pub moves_remaining: u32,
    pub health_remaining: u32,
    pub health_max: u32,
    pub drop_rules: Vec<DropRule>,
}

impl Default for Stage {
    fn default() -> Self {
        Stage {
            target: PkType::None,
            moves_remaining: 10,
            health_remaining: 10_000,
            health_max: 10_000,
            drop_rules: Vec::new(),
        }
    }
}

/// Immutable inputs shared by every trial of one computation.
#[derive(Debug, Clone, Copy)]
pub struct TrialContext<'a> {
    pub catalog: &'a SpeciesCatalog,
    pub team: &'a Team,
    pub stage: &'a Stage,
    pub max_iterations: u32,
}

impl<'a> TrialContext<'a> {
    pub fn new(catalog: &'a SpeciesCatalog, team: &'a Team, stage: &'a Stage) -> Self {
        TrialContext {
            catalog,
            team,
            stage,
            max_iterations: super::engine::MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}
