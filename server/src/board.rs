//! Sparse trail grid and collision lookup.

use serde::ser::{Serialize, Serializer};
use shared::{BoardConfig, Cell, Player};
use std::collections::HashMap;

/// Occupancy map of painted cells keyed by integer board position.
///
/// Only painted positions are stored. A slot holds at most one cell and a
/// later paint at the same position replaces the earlier one.
#[derive(Debug, Clone)]
pub struct TrailGrid {
    width: i32,
    height: i32,
    cells: HashMap<(i32, i32), Cell>,
}

impl TrailGrid {
    /// Creates an empty grid for a board of the given pixel size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as i32,
            height: height as i32,
            cells: HashMap::new(),
        }
    }

    pub fn for_config(config: &BoardConfig) -> Self {
        Self::new(config.board_width, config.board_height)
    }

    /// True if `(x, y)` is a cell position on the board
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// Cell painted at `(x, y)`, if any
    pub fn get(&self, x: i32, y: i32) -> Option<&Cell> {
        self.cells.get(&(x, y))
    }

    /// Stores a cell at its own position. Returns false and leaves the grid
    /// untouched if the position is off the board.
    pub fn paint(&mut self, cell: Cell) -> bool {
        if !self.in_bounds(cell.x, cell.y) {
            return false;
        }
        self.cells.insert((cell.x, cell.y), cell);
        true
    }

    /// Number of painted cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterates every painted cell in no particular order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// Tests whether the player is about to run into a painted cell.
    ///
    /// Of the 3x3 neighbourhood around the player's cell only the neighbour
    /// lying in the direction of travel is considered. If that slot is
    /// occupied, the occupant is tested for overlap against a square of the
    /// occupant's size placed at the player's cell.
    pub fn collides(&self, player: &Player) -> bool {
        let (x, y) = player.cell_position();
        let (dx, dy) = player.direction();

        if !self.in_bounds(x + dx, y + dy) {
            return false;
        }

        self.get(x + dx, y + dy)
            .map_or(false, |cell| cell.overlaps(x, y))
    }
}

impl Serialize for TrailGrid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.cells.values())
    }
}
