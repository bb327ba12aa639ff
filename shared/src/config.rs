//! Board configuration shared by the server and its clients.

use serde::{Deserialize, Serialize};

pub const DEFAULT_CELL_SIZE: u32 = 2;
pub const DEFAULT_BOARD_WIDTH: u32 = 1024;
pub const DEFAULT_BOARD_HEIGHT: u32 = 768;
pub const DEFAULT_TURN_SPEED: f64 = 0.05;
pub const DEFAULT_SPEED: u32 = 2;

pub const MAX_BOARD_WIDTH: u32 = 1500;
pub const MAX_BOARD_HEIGHT: u32 = 900;
pub const MAX_CELL_SIZE: u32 = 10;
pub const MAX_TURN_SPEED: f64 = 0.5;
pub const MAX_SPEED: u32 = 10;

/// Parameters of a single game, frozen once the game has started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    /// Side length of a painted trail cell in pixels
    pub cell_size: u32,
    pub board_width: u32,
    pub board_height: u32,
    /// Radians turned per simulated step while a key is held
    pub turn_speed: f64,
    /// Simulated steps per tick
    pub speed: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            board_width: DEFAULT_BOARD_WIDTH,
            board_height: DEFAULT_BOARD_HEIGHT,
            turn_speed: DEFAULT_TURN_SPEED,
            speed: DEFAULT_SPEED,
        }
    }
}

/// Partial configuration sent by a client in an `updateConfig` message.
///
/// Missing fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    #[serde(default)]
    pub cell_size: Option<u32>,
    #[serde(default)]
    pub board_width: Option<u32>,
    #[serde(default)]
    pub board_height: Option<u32>,
    #[serde(default)]
    pub turn_speed: Option<f64>,
    #[serde(default)]
    pub speed: Option<u32>,
}

impl BoardConfig {
    /// Merges an update into the configuration, clamping every value into
    /// its allowed range instead of rejecting it.
    pub fn apply(&mut self, update: &ConfigUpdate) {
        if let Some(width) = update.board_width {
            self.board_width = width.clamp(1, MAX_BOARD_WIDTH);
        }
        if let Some(height) = update.board_height {
            self.board_height = height.clamp(1, MAX_BOARD_HEIGHT);
        }
        if let Some(cell_size) = update.cell_size {
            self.cell_size = cell_size.clamp(1, MAX_CELL_SIZE);
        }
        if let Some(turn_speed) = update.turn_speed {
            if turn_speed.is_finite() {
                self.turn_speed = turn_speed.clamp(0.0, MAX_TURN_SPEED);
            }
        }
        if let Some(speed) = update.speed {
            self.speed = speed.clamp(1, MAX_SPEED);
        }
    }

    /// Returns true if the floating point position lies on the board.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.board_width as f64 && y < self.board_height as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BoardConfig::default();
        assert_eq!(config.cell_size, 2);
        assert_eq!(config.board_width, 1024);
        assert_eq!(config.board_height, 768);
        assert_eq!(config.speed, 2);
    }

    #[test]
    fn test_update_clamps_to_maximum() {
        let mut config = BoardConfig::default();
        config.apply(&ConfigUpdate {
            board_width: Some(5000),
            board_height: Some(5000),
            cell_size: Some(50),
            ..Default::default()
        });

        assert_eq!(config.board_width, MAX_BOARD_WIDTH);
        assert_eq!(config.board_height, MAX_BOARD_HEIGHT);
        assert_eq!(config.cell_size, MAX_CELL_SIZE);
    }

    #[test]
    fn test_update_keeps_missing_fields() {
        let mut config = BoardConfig::default();
        config.apply(&ConfigUpdate {
            board_width: Some(640),
            ..Default::default()
        });

        assert_eq!(config.board_width, 640);
        assert_eq!(config.board_height, DEFAULT_BOARD_HEIGHT);
        assert_eq!(config.cell_size, DEFAULT_CELL_SIZE);
    }

    #[test]
    fn test_update_rejects_degenerate_values() {
        let mut config = BoardConfig::default();
        config.apply(&ConfigUpdate {
            cell_size: Some(0),
            speed: Some(0),
            turn_speed: Some(f64::NAN),
            ..Default::default()
        });

        assert_eq!(config.cell_size, 1);
        assert_eq!(config.speed, 1);
        assert_eq!(config.turn_speed, DEFAULT_TURN_SPEED);
    }

    #[test]
    fn test_update_deserializes_from_partial_json() {
        let update: ConfigUpdate =
            serde_json::from_str(r#"{"boardWidth":5000,"cellSize":50}"#).unwrap();
        assert_eq!(update.board_width, Some(5000));
        assert_eq!(update.cell_size, Some(50));
        assert_eq!(update.board_height, None);
    }

    #[test]
    fn test_contains() {
        let config = BoardConfig {
            board_width: 100,
            board_height: 50,
            ..Default::default()
        };

        assert!(config.contains(0.0, 0.0));
        assert!(config.contains(99.9, 49.9));
        assert!(!config.contains(100.0, 10.0));
        assert!(!config.contains(10.0, 50.0));
        assert!(!config.contains(-0.1, 10.0));
    }
}
