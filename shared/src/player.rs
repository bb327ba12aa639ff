//! Per-player kinematics, input flags and lifecycle.
//!
//! A player moves exactly one board unit per simulated step along its
//! heading. Holding a key rotates the heading by the configured turn speed
//! each step. The backwards step mirrors the forward one by negating the
//! sign of both the turn and the move, which lets the server rewind a player
//! a few frames when a late input arrives.

use crate::config::BoardConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::protocol::ProtocolError;

/// Name given to players that register without one
pub const DEFAULT_PLAYER_NAME: &str = "Unnamed";

/// Steering keys a client can press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
}

impl FromStr for Key {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Key::Left),
            "right" => Ok(Key::Right),
            other => Err(ProtocolError::UnknownKey(other.to_string())),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Left => write!(f, "left"),
            Key::Right => write!(f, "right"),
        }
    }
}

/// A key state change reported by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Down(Key),
    Up(Key),
}

/// Registration payload of a `registerPlayer` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub color: String,
}

fn default_name() -> String {
    DEFAULT_PLAYER_NAME.to_string()
}

/// A registered player.
///
/// Only identity, score and liveness go over the wire; the kinematic state
/// stays on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: u32,
    pub score: u32,
    pub color: String,
    pub name: String,
    pub connected: bool,
    pub alive: bool,

    #[serde(skip)]
    pub x: f64,
    #[serde(skip)]
    pub y: f64,
    #[serde(skip)]
    pub movement_angle: f64,
    /// Highest input frame already reconciled for this player
    #[serde(skip)]
    pub latest_game_frame: u32,
    /// Remaining steps of the current trail gap
    #[serde(skip)]
    pub no_trail_frames: u32,
    #[serde(skip)]
    pub left_pressed: bool,
    #[serde(skip)]
    pub right_pressed: bool,
    #[serde(skip)]
    turn_speed: f64,
}

impl Player {
    /// Creates a freshly registered player. Registered players are dead
    /// until the next game starts.
    pub fn new(id: u32, info: PlayerInfo) -> Self {
        let name = if info.name.is_empty() {
            default_name()
        } else {
            info.name
        };

        Self {
            id,
            score: 0,
            color: info.color,
            name,
            connected: true,
            alive: false,
            x: 0.0,
            y: 0.0,
            movement_angle: 0.0,
            latest_game_frame: 0,
            no_trail_frames: 0,
            left_pressed: false,
            right_pressed: false,
            turn_speed: BoardConfig::default().turn_speed,
        }
    }

    /// Revives the player at a random spawn point inside the middle half of
    /// the board, facing right with no keys held.
    pub fn reset<R: Rng + ?Sized>(&mut self, config: &BoardConfig, rng: &mut R) {
        let (min_x, max_x) = spawn_range(config.board_width);
        let (min_y, max_y) = spawn_range(config.board_height);

        self.alive = true;
        self.no_trail_frames = 0;
        self.latest_game_frame = 0;
        self.x = rng.gen_range(min_x..max_x) as f64;
        self.y = rng.gen_range(min_y..max_y) as f64;
        self.movement_angle = 0.0;
        self.left_pressed = false;
        self.right_pressed = false;
        self.turn_speed = config.turn_speed;
    }

    pub fn turn_speed(&self) -> f64 {
        self.turn_speed
    }

    /// Rotates the heading if a key is held. Left wins when both are held.
    pub fn process_turn(&mut self, sign: f64) {
        if self.left_pressed {
            self.movement_angle -= self.turn_speed * sign;
        } else if self.right_pressed {
            self.movement_angle += self.turn_speed * sign;
        }
    }

    /// Moves one unit along the heading.
    pub fn process_move(&mut self, sign: f64) {
        self.x += self.movement_angle.cos() * sign;
        self.y += self.movement_angle.sin() * sign;
    }

    /// Advances the player one simulated step.
    pub fn process_frame(&mut self) {
        self.process_turn(1.0);
        self.process_move(1.0);
    }

    /// Undoes one simulated step.
    ///
    /// This is only an approximate inverse of [`Player::process_frame`] while
    /// turning, since the move uses the already rewound heading.
    pub fn process_frame_backwards(&mut self) {
        self.process_turn(-1.0);
        self.process_move(-1.0);
    }

    /// Applies a key change. Pressing a key releases the opposite one.
    pub fn apply_input(&mut self, input: KeyInput) {
        match input {
            KeyInput::Down(Key::Left) => {
                self.left_pressed = true;
                self.right_pressed = false;
            }
            KeyInput::Down(Key::Right) => {
                self.right_pressed = true;
                self.left_pressed = false;
            }
            KeyInput::Up(Key::Left) => self.left_pressed = false,
            KeyInput::Up(Key::Right) => self.right_pressed = false,
        }
    }

    pub fn in_gap(&self) -> bool {
        self.no_trail_frames > 0
    }

    /// Integer cell the player currently occupies
    pub fn cell_position(&self) -> (i32, i32) {
        (self.x.floor() as i32, self.y.floor() as i32)
    }

    /// Direction of travel on each axis, each in {-1, 0, 1}
    pub fn direction(&self) -> (i32, i32) {
        (
            sign(self.movement_angle.cos()),
            sign(self.movement_angle.sin()),
        )
    }
}

fn spawn_range(extent: u32) -> (u32, u32) {
    let min = extent / 4;
    let max = (extent * 3 / 4).max(min + 1);
    (min, max)
}

fn sign(value: f64) -> i32 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// Liveness entry of a partial state update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub id: u32,
    pub alive: bool,
}

impl From<&Player> for PlayerStatus {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            alive: player.alive,
        }
    }
}
