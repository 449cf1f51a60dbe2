use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::ability::AbilityId;
use crate::board::{Board, Coord, Move, PkType, SpeciesCatalog, SpeciesDef, SpeciesId, StatusKind};
use crate::simulation::{DropRule, Stage, Team};

/// On-disk layout of a scenario file.
#[derive(Debug, Clone, Deserialize)]
struct ScenarioFile {
    /// Six rows of whitespace-separated cell tokens, top row first.
    board: Vec<String>,
    /// Candidate swaps as `[from_row, from_col, to_row, to_col]`.
    #[serde(default)]
    moves: Vec<[i32; 4]>,
    /// Forecast every swap that changes the board instead of `moves`.
    #[serde(default)]
    all_moves: bool,
    /// Also forecast leaving the board as it is.
    #[serde(default)]
    include_no_move: bool,
    #[serde(default)]
    species: Vec<SpeciesDef>,
    team: TeamSection,
    #[serde(default)]
    stage: StageSection,
}

#[derive(Debug, Clone, Deserialize)]
struct TeamSection {
    roster: Vec<String>,
    #[serde(default)]
    levels: HashMap<String, u8>,
    #[serde(default)]
    mega_slot: Option<String>,
    #[serde(default)]
    mega_threshold: u32,
    #[serde(default)]
    meter: u32,
    #[serde(default)]
    disabled: Vec<AbilityId>,
    #[serde(default)]
    trigger_threshold: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
struct StageSection {
    #[serde(default = "default_target")]
    target: PkType,
    #[serde(default = "default_moves_remaining")]
    moves_remaining: u32,
    #[serde(default = "default_health")]
    health_remaining: u32,
    #[serde(default = "default_health")]
    health_max: u32,
    #[serde(default)]
    status: StatusKind,
    #[serde(default)]
    status_turns: u32,
    #[serde(default)]
    drops: Vec<DropSection>,
}

#[derive(Debug, Clone, Deserialize)]
struct DropSection {
    column: i32,
    alternatives: Vec<Vec<String>>,
}

fn default_target() -> PkType {
    PkType::None
}
fn default_moves_remaining() -> u32 {
    10
}
fn default_health() -> u32 {
    10_000
}

impl Default for StageSection {
    fn default() -> Self {
        StageSection {
            target: default_target(),
            moves_remaining: default_moves_remaining(),
            health_remaining: default_health(),
            health_max: default_health(),
            status: StatusKind::None,
            status_turns: 0,
            drops: Vec::new(),
        }
    }
}

/// A fully resolved puzzle position: catalog, team, stage, board and the
/// candidate moves to forecast. `None` in `moves` stands for "no move".
#[derive(Debug, Clone)]
pub struct Scenario {
    pub catalog: SpeciesCatalog,
    pub team: Team,
    pub stage: Stage,
    pub board: Board,
    pub moves: Vec<Option<Move>>,
}

impl Scenario {
    pub fn from_file(path: &Path, default_threshold: u8) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path, default_threshold)
    }

    /// Parse and resolve a scenario. `default_threshold` applies when the team
    /// does not set its own trigger threshold.
    pub fn from_toml_str(
        content: &str,
        source_path: &Path,
        default_threshold: u8,
    ) -> Result<Self, String> {
        let file: ScenarioFile = toml::from_str(content)
            .map_err(|e| format!("Invalid TOML in {}: {}", source_path.display(), e))?;
        file.resolve(default_threshold)
            .map_err(|e| format!("{}:\n{}", source_path.display(), e))
    }
}

fn lookup(catalog: &SpeciesCatalog, name: &str, what: &str, errors: &mut Vec<String>) -> Option<SpeciesId> {
    let id = catalog.id_of(name);
    if id.is_none() {
        errors.push(format!("{}: unknown species '{}'", what, name));
    }
    id
}

impl ScenarioFile {
    fn resolve(self, default_threshold: u8) -> Result<Scenario, String> {
        let mut errors = Vec::new();

        let mut catalog = SpeciesCatalog::new();
        for def in self.species {
            catalog.insert(def);
        }

        // === Team ===
        let roster: Vec<SpeciesId> = self
            .team
            .roster
            .iter()
            .filter_map(|name| lookup(&catalog, name, "team.roster", &mut errors))
            .collect();
        if self.team.roster.is_empty() {
            errors.push("team.roster must name at least one species".to_string());
        }
        let mut team = Team::new(roster);
        for (name, &level) in &self.team.levels {
            if let Some(id) = lookup(&catalog, name, "team.levels", &mut errors) {
                team.levels.insert(id, level);
            }
        }
        if let Some(name) = &self.team.mega_slot {
            if let Some(id) = lookup(&catalog, name, "team.mega_slot", &mut errors) {
                if !team.roster.contains(&id) {
                    errors.push(format!("team.mega_slot '{}' is not on the roster", name));
                }
                team = team.with_mega(id, self.team.mega_threshold);
            }
        }
        team.disabled = self.team.disabled.into_iter().collect::<HashSet<_>>();
        team.trigger_threshold = self.team.trigger_threshold.unwrap_or(default_threshold);
        if team.trigger_threshold > 100 {
            errors.push(format!(
                "team.trigger_threshold must be 0-100, got {}",
                team.trigger_threshold
            ));
        }

        // === Stage ===
        let mut drop_rules = Vec::new();
        for drop in &self.stage.drops {
            if !(1..=crate::board::BOARD_SIZE).contains(&drop.column) {
                errors.push(format!("stage.drops: column must be 1-6, got {}", drop.column));
                continue;
            }
            let alternatives = drop
                .alternatives
                .iter()
                .map(|seq| {
                    seq.iter()
                        .filter_map(|name| lookup(&catalog, name, "stage.drops", &mut errors))
                        .collect()
                })
                .collect();
            drop_rules.push(DropRule {
                column: drop.column,
                alternatives,
            });
        }
        let stage = Stage {
            target: self.stage.target,
            moves_remaining: self.stage.moves_remaining,
            health_remaining: self.stage.health_remaining,
            health_max: self.stage.health_max,
            drop_rules,
        };

        // === Board ===
        let board = match Board::parse_rows(&self.board, &catalog) {
            Ok(mut board) => {
                board.set_meter(self.team.meter);
                board.set_status(self.stage.status, self.stage.status_turns);
                Some(board)
            }
            Err(e) => {
                errors.push(e);
                None
            }
        };

        // === Moves ===
        let mut moves: Vec<Option<Move>> = Vec::new();
        if self.include_no_move {
            moves.push(None);
        }
        if let Some(board) = &board {
            if self.all_moves {
                moves.extend(board.legal_moves().into_iter().map(Some));
            } else {
                for [fr, fc, tr, tc] in &self.moves {
                    let mv = Move::new(Coord::new(*fr, *fc), Coord::new(*tr, *tc));
                    if board.clone().apply_move(mv) {
                        moves.push(Some(mv));
                    } else {
                        errors.push(format!("moves: {} cannot be applied to the board", mv));
                    }
                }
            }
        }
        if moves.is_empty() {
            moves.push(None);
        }

        match (errors.is_empty(), board) {
            (true, Some(board)) => Ok(Scenario {
                catalog,
                team,
                stage,
                board,
                moves,
            }),
            _ => Err(errors.join("\n")),
        }
    }
}
