//! # Shared game types
//!
//! Types used on both sides of the wire: the JSON message envelope, the
//! board configuration, trail cells and the player state machine. The
//! player's stepping functions live here so that any client wanting to
//! predict its own trajectory runs exactly the same arithmetic as the
//! authoritative server.

pub mod cell;
pub mod config;
pub mod player;
pub mod protocol;

pub use cell::Cell;
pub use config::{BoardConfig, ConfigUpdate};
pub use player::{Key, KeyInput, Player, PlayerInfo, PlayerStatus};
pub use protocol::{GameMessage, MessageType, ProtocolError, BROADCAST_ID};
