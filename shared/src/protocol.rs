//! JSON message envelope exchanged with browser clients.
//!
//! Every message in either direction is a flat object
//! `{ "type", "content", "playerId", "gameFrame" }`. The `content` field is
//! a string and frequently carries a nested JSON document.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::player::{Key, KeyInput};

/// `playerId` used for messages that are not about a single player
pub const BROADCAST_ID: i64 = -1;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown key {0:?}")]
    UnknownKey(String),
    #[error("unexpected message type {0:?}")]
    UnexpectedType(MessageType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    RegisterPlayer,
    UpdateConfig,
    Rejected,
    #[serde(rename = "keydown")]
    KeyDown,
    #[serde(rename = "keyup")]
    KeyUp,
    StartGame,
    Connection,
    Identity,
    GameState,
    PartialState,
    PlayerDied,
    PlayerDisconnected,
    PlayerRemoved,
    GameOver,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub content: String,
    #[serde(default = "broadcast_id")]
    pub player_id: i64,
    #[serde(default)]
    pub game_frame: i64,
}

fn broadcast_id() -> i64 {
    BROADCAST_ID
}

impl GameMessage {
    pub fn new(kind: MessageType, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            player_id: BROADCAST_ID,
            game_frame: 0,
        }
    }

    pub fn with_player(mut self, player_id: u32) -> Self {
        self.player_id = player_id as i64;
        self
    }

    pub fn with_frame(mut self, game_frame: u32) -> Self {
        self.game_frame = game_frame as i64;
        self
    }

    /// Builds a message whose content is the JSON encoding of `payload`.
    pub fn with_payload<T: Serialize>(
        kind: MessageType,
        payload: &T,
    ) -> Result<Self, ProtocolError> {
        Ok(Self::new(kind, serde_json::to_string(payload)?))
    }

    /// Decodes the JSON document carried in `content`.
    pub fn payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_str(&self.content)?)
    }

    /// Interprets a `keydown`/`keyup` message as a key change.
    pub fn key_input(&self) -> Result<KeyInput, ProtocolError> {
        let key: Key = self.content.parse()?;
        match self.kind {
            MessageType::KeyDown => Ok(KeyInput::Down(key)),
            MessageType::KeyUp => Ok(KeyInput::Up(key)),
            other => Err(ProtocolError::UnexpectedType(other)),
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}
