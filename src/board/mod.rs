pub mod species;

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

pub use species::{Effectiveness, PkType, SpeciesCatalog, SpeciesDef, SpeciesId};

/// Rows and columns on the board, 1-based.
pub const BOARD_SIZE: i32 = 6;
const CELL_COUNT: usize = (BOARD_SIZE * BOARD_SIZE) as usize;

// === Coordinates ===

/// A board position. Row 1 is the top row, column 1 the leftmost column.
/// Values outside `[1, 6]` are representable; the board treats them as no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub row: i32,
    pub col: i32,
}

impl Coord {
    pub const fn new(row: i32, col: i32) -> Self {
        Coord { row, col }
    }

    pub fn in_bounds(self) -> bool {
        (1..=BOARD_SIZE).contains(&self.row) && (1..=BOARD_SIZE).contains(&self.col)
    }

    pub fn offset(self, d_row: i32, d_col: i32) -> Coord {
        Coord::new(self.row + d_row, self.col + d_col)
    }

    /// Orthogonal neighbours, in-bounds or not.
    pub fn neighbors(self) -> [Coord; 4] {
        [
            self.offset(-1, 0),
            self.offset(1, 0),
            self.offset(0, -1),
            self.offset(0, 1),
        ]
    }

    pub fn manhattan(self, other: Coord) -> i32 {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }

    fn index(self) -> Option<usize> {
        if self.in_bounds() {
            Some(((self.row - 1) * BOARD_SIZE + (self.col - 1)) as usize)
        } else {
            None
        }
    }

    /// Every in-bounds coordinate in row-major order.
    pub fn all() -> impl Iterator<Item = Coord> {
        (1..=BOARD_SIZE).flat_map(|row| (1..=BOARD_SIZE).map(move |col| Coord::new(row, col)))
    }
}

/// A candidate swap of two cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Coord,
    pub to: Coord,
}

impl Move {
    pub fn new(from: Coord, to: Coord) -> Self {
        Move { from, to }
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{})->({},{})",
            self.from.row, self.from.col, self.to.row, self.to.col
        )
    }
}

// === Status ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StatusKind {
    #[default]
    None,
    Burn,
    Sleep,
    Freeze,
    Paralyze,
    Fear,
    Poison,
}

/// Board-level status modifier with its remaining duration in turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Status {
    pub kind: StatusKind,
    pub duration: u32,
}

impl Status {
    pub fn is_active(&self) -> bool {
        self.kind != StatusKind::None && self.duration > 0
    }
}

// === Board ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cell {
    pub species: SpeciesId,
    pub frozen: bool,
    pub clouded: bool,
}

impl Cell {
    pub fn new(species: SpeciesId) -> Self {
        Cell {
            species,
            frozen: false,
            clouded: false,
        }
    }
}

/// The 6×6 grid plus board-level meter progress and status.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Board {
    cells: [Cell; CELL_COUNT],
    meter: u32,
    status: Status,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Board {
            cells: [Cell::default(); CELL_COUNT],
            meter: 0,
            status: Status::default(),
        }
    }

    /// Cell at `coord`; out-of-range reads yield an empty cell.
    pub fn get(&self, coord: Coord) -> Cell {
        coord.index().map(|i| self.cells[i]).unwrap_or_default()
    }

    pub fn species_at(&self, coord: Coord) -> SpeciesId {
        self.get(coord).species
    }

    pub fn is_frozen(&self, coord: Coord) -> bool {
        self.get(coord).frozen
    }

    pub fn is_clouded(&self, coord: Coord) -> bool {
        self.get(coord).clouded
    }

    pub fn is_air(&self, coord: Coord) -> bool {
        self.species_at(coord).is_air()
    }

    /// Write a species, keeping flags only where the new species allows them.
    /// Returns false when `coord` is out of range.
    pub fn set_species(&mut self, coord: Coord, species: SpeciesId) -> bool {
        let Some(i) = coord.index() else {
            return false;
        };
        let cell = &mut self.cells[i];
        cell.species = species;
        if !species.is_freezable() {
            cell.frozen = false;
        }
        if species.is_air() {
            cell.clouded = false;
        }
        true
    }

    /// Returns the resulting frozen flag; freezing a non-freezable species is rejected.
    pub fn set_frozen(&mut self, coord: Coord, frozen: bool) -> bool {
        let Some(i) = coord.index() else {
            return false;
        };
        let cell = &mut self.cells[i];
        cell.frozen = frozen && cell.species.is_freezable();
        cell.frozen
    }

    /// Returns the resulting cloud flag; empty cells cannot be clouded.
    pub fn set_clouded(&mut self, coord: Coord, clouded: bool) -> bool {
        let Some(i) = coord.index() else {
            return false;
        };
        let cell = &mut self.cells[i];
        cell.clouded = clouded && !cell.species.is_air();
        cell.clouded
    }

    pub fn set_cell(&mut self, coord: Coord, cell: Cell) -> bool {
        if !self.set_species(coord, cell.species) {
            return false;
        }
        self.set_frozen(coord, cell.frozen);
        self.set_clouded(coord, cell.clouded);
        true
    }

    /// Reset every cell to empty. Meter and status are kept.
    pub fn clear(&mut self) {
        self.cells = [Cell::default(); CELL_COUNT];
    }

    pub fn can_move(&self, coord: Coord) -> bool {
        coord.in_bounds() && !self.is_frozen(coord) && !self.is_air(coord)
    }

    fn is_obstruction(&self, coord: Coord) -> bool {
        matches!(self.species_at(coord), SpeciesId::WOOD | SpeciesId::METAL)
    }

    fn can_pick_up(&self, coord: Coord) -> bool {
        self.can_move(coord) && !self.is_obstruction(coord)
    }

    fn can_receive(&self, coord: Coord) -> bool {
        coord.in_bounds() && !self.is_frozen(coord) && !self.is_obstruction(coord)
    }

    /// Apply a swap. Neither end may be frozen or an obstruction and the source
    /// must hold a tile; otherwise the board is left untouched and false is
    /// returned.
    pub fn apply_move(&mut self, mv: Move) -> bool {
        if mv.from == mv.to || !self.can_pick_up(mv.from) || !self.can_receive(mv.to) {
            return false;
        }
        let a = self.get(mv.from);
        let b = self.get(mv.to);
        self.set_cell(mv.from, b);
        self.set_cell(mv.to, a);
        true
    }

    /// Every swap that changes the board, each unordered pair listed once.
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        for from in Coord::all().filter(|&c| self.can_pick_up(c)) {
            for to in Coord::all() {
                if to == from || !self.can_receive(to) || self.get(to) == self.get(from) {
                    continue;
                }
                if self.can_pick_up(to) && to < from {
                    continue;
                }
                moves.push(Move::new(from, to));
            }
        }
        moves
    }

    pub fn meter(&self) -> u32 {
        self.meter
    }

    /// Shift meter progress by `delta`, clamped to `[0, cap]`. Returns the new value.
    pub fn adjust_meter(&mut self, delta: i64, cap: u32) -> u32 {
        let next = (self.meter as i64 + delta).clamp(0, cap as i64);
        // an already over-cap meter is never raised further
        self.meter = if delta > 0 && self.meter >= cap {
            self.meter
        } else {
            next as u32
        };
        self.meter
    }

    pub fn set_meter(&mut self, meter: u32) {
        self.meter = meter;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, kind: StatusKind, duration: u32) {
        self.status = Status { kind, duration };
    }

    pub fn count_where(&self, mut pred: impl FnMut(Cell) -> bool) -> usize {
        self.cells.iter().filter(|c| pred(**c)).count()
    }

    /// Deterministic text form; equal boards produce equal strings.
    pub fn canonical(&self) -> String {
        let mut out = String::with_capacity(CELL_COUNT * 4 + 16);
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                out.push(if i as i32 % BOARD_SIZE == 0 { '/' } else { ',' });
            }
            let _ = write!(out, "{}", cell.species.0);
            if cell.frozen {
                out.push('*');
            }
            if cell.clouded {
                out.push('~');
            }
        }
        let _ = write!(
            out,
            "|m{}|{:?}:{}",
            self.meter, self.status.kind, self.status.duration
        );
        out
    }

    /// Parse six rows of whitespace-separated tokens: a species name, optionally
    /// suffixed with `*` (frozen) and/or `~` (clouded), or `.` for an empty cell.
    pub fn parse_rows(rows: &[String], catalog: &SpeciesCatalog) -> Result<Board, String> {
        if rows.len() != BOARD_SIZE as usize {
            return Err(format!(
                "board must have {} rows, got {}",
                BOARD_SIZE,
                rows.len()
            ));
        }
        let mut board = Board::new();
        let mut errors = Vec::new();
        for (r, line) in rows.iter().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != BOARD_SIZE as usize {
                errors.push(format!(
                    "row {} must have {} cells, got {}",
                    r + 1,
                    BOARD_SIZE,
                    tokens.len()
                ));
                continue;
            }
            for (c, token) in tokens.iter().enumerate() {
                let coord = Coord::new(r as i32 + 1, c as i32 + 1);
                let frozen = token.contains('*');
                let clouded = token.contains('~');
                let name = token.trim_end_matches(['*', '~']);
                let species = if name == "." {
                    SpeciesId::AIR
                } else {
                    match catalog.id_of(name) {
                        Some(id) => id,
                        None => {
                            errors.push(format!(
                                "row {} col {}: unknown species '{}'",
                                r + 1,
                                c + 1,
                                name
                            ));
                            continue;
                        }
                    }
                };
                board.set_species(coord, species);
                board.set_frozen(coord, frozen);
                board.set_clouded(coord, clouded);
            }
        }
        if errors.is_empty() {
            Ok(board)
        } else {
            Err(errors.join("\n"))
        }
    }

    /// Human-readable grid using catalog names, inverse of [`Board::parse_rows`].
    pub fn render(&self, catalog: &SpeciesCatalog) -> String {
        let mut out = String::new();
        for row in 1..=BOARD_SIZE {
            let tokens: Vec<String> = (1..=BOARD_SIZE)
                .map(|col| {
                    let cell = self.get(Coord::new(row, col));
                    let mut token = if cell.species.is_air() {
                        ".".to_string()
                    } else {
                        catalog.name_of(cell.species).to_string()
                    };
                    if cell.frozen {
                        token.push('*');
                    }
                    if cell.clouded {
                        token.push('~');
                    }
                    token
                })
                .collect();
            out.push_str(&tokens.join(" "));
            out.push('\n');
        }
        out
    }
}
