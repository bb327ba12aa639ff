use serde::{Deserialize, Serialize};

/// A painted trail cell.
///
/// The cell size is copied from the configuration at paint time so a cell
/// keeps its footprint even if the configuration changes between games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub x: i32,
    pub y: i32,
    pub color: String,
    pub cell_size: i32,
}

impl Cell {
    pub fn new(x: i32, y: i32, color: impl Into<String>, cell_size: u32) -> Self {
        Self {
            x,
            y,
            color: color.into(),
            cell_size: cell_size as i32,
        }
    }

    /// Checks whether a square of the same size placed at `(other_x, other_y)`
    /// overlaps this cell. Touching edges do not count.
    pub fn overlaps(&self, other_x: i32, other_y: i32) -> bool {
        other_x < self.x + self.cell_size
            && other_x + self.cell_size > self.x
            && other_y < self.y + self.cell_size
            && other_y + self.cell_size > self.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_same_origin() {
        let cell = Cell::new(10, 10, "#ff0000", 2);
        assert!(cell.overlaps(10, 10));
    }

    #[test]
    fn test_overlap_adjacent_pixel() {
        let cell = Cell::new(11, 10, "#ff0000", 2);
        assert!(cell.overlaps(10, 10));
        assert!(cell.overlaps(10, 9));
    }

    #[test]
    fn test_exact_touch_is_not_overlap() {
        let cell = Cell::new(12, 10, "#ff0000", 2);
        assert!(!cell.overlaps(10, 10));

        let unit = Cell::new(11, 10, "#ff0000", 1);
        assert!(!unit.overlaps(10, 10));
    }

    #[test]
    fn test_serialized_field_names() {
        let cell = Cell::new(3, 4, "blue", 5);
        let json = serde_json::to_value(&cell).unwrap();
        assert_eq!(json["x"], 3);
        assert_eq!(json["y"], 4);
        assert_eq!(json["color"], "blue");
        assert_eq!(json["cellSize"], 5);
    }
}
