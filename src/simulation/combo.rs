use std::collections::VecDeque;

use crate::ability::AbilityId;
use crate::board::{Cell, Coord, SpeciesId};

pub type ComboId = u32;

/// A straight-line run of matched tiles, plus whatever cells its ability added.
#[derive(Debug, Clone, PartialEq)]
pub struct Combo {
    pub id: ComboId,
    /// The matched line, merged with any same-orientation run it extended.
    pub run: Vec<Coord>,
    /// Cells this combo owns and will erase: the run cells it activated plus extras.
    pub cells: Vec<Coord>,
    pub horizontal: bool,
    pub species: SpeciesId,
    /// Id of the first combo in this activation chain; equal to `id` for a chain head.
    pub chain_head: ComboId,
    /// Cumulative combo count at activation (1 for the first combo of a trial).
    pub number: u32,
    /// Ability resolved at activation; `AbilityId::None` when it did not fire.
    pub ability: AbilityId,
    /// Running value counter for progressive abilities.
    pub counter: u32,
    pub touches_move: bool,
}

impl Combo {
    pub fn size(&self) -> usize {
        self.run.len()
    }

    pub fn is_chain_head(&self) -> bool {
        self.chain_head == self.id
    }

    /// Middle cell of the run.
    pub fn center(&self) -> Coord {
        self.run
            .get(self.run.len() / 2)
            .copied()
            .unwrap_or(Coord::new(0, 0))
    }

    pub fn contains(&self, coord: Coord) -> bool {
        self.run.contains(&coord) || self.cells.contains(&coord)
    }

    /// Sort key for activation order; lower activates first.
    pub fn priority(&self) -> (u8, i32, i32, u8) {
        let bottom = self.run.iter().map(|c| c.row).max().unwrap_or(0);
        let left = self.run.iter().map(|c| c.col).min().unwrap_or(0);
        (
            if self.touches_move { 0 } else { 1 },
            -bottom,
            left,
            if self.horizontal { 0 } else { 1 },
        )
    }
}

/// How an erase effect treats each cell it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseMode {
    /// Frozen cells thaw instead of clearing; unbreakable obstructions survive.
    Normal,
    /// Only obstructions, currency, frozen and clouded state are removed.
    Disruptions,
    /// Clears the cell regardless of its flags.
    Force,
}

/// What an erase does to one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Erasure {
    Clear,
    Thaw,
    Uncloud,
    Skip,
}

impl EraseMode {
    pub fn classify(self, cell: Cell) -> Erasure {
        if cell.species.is_air() {
            return Erasure::Skip;
        }
        match self {
            EraseMode::Force => Erasure::Clear,
            EraseMode::Normal => {
                if cell.frozen {
                    Erasure::Thaw
                } else if cell.species == SpeciesId::METAL {
                    Erasure::Skip
                } else {
                    Erasure::Clear
                }
            }
            EraseMode::Disruptions => {
                if cell.frozen {
                    Erasure::Thaw
                } else if cell.species.is_disruption() {
                    Erasure::Clear
                } else if cell.clouded {
                    Erasure::Uncloud
                } else {
                    Erasure::Skip
                }
            }
        }
    }
}

/// A pending or in-progress action over a list of coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum ComboEffect {
    Activate(Combo),
    /// Plan-driven activation: one coordinate set from `plan` is consumed per tick.
    ActivateWithPlan {
        combo: Combo,
        plan: VecDeque<Vec<Coord>>,
    },
    Erase {
        coords: Vec<Coord>,
        mode: EraseMode,
        source: Option<ComboId>,
    },
}
