//! Frames carried on the game server WebSocket.

use serde::{Deserialize, Serialize};

use super::game::SessionId;

/// First client frame on every socket; binds the connection to a session.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub playlist_video_id: SessionId,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerIndex {
    pub player_index: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ScoreSnapshot {
    #[serde(default)]
    pub scores: Vec<u32>,
    /// Apples still on the board (snake only).
    #[serde(default)]
    pub apples_left: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GameOver {
    pub winner: u8,
    #[serde(default)]
    pub scores: Vec<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Winners {
    pub winners: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighScoreReached {
    pub score_id: u64,
}

/// Server-to-client messages, tagged by `message_type`.
///
/// Tags this client does not know decode to [`InboundMessage::Unknown`].
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum InboundMessage {
    PlayerIndexMessage(PlayerIndex),
    ScoreUpdate(ScoreSnapshot),
    SinglePlayerScore(ScoreSnapshot),
    MultiPlayerScore(ScoreSnapshot),
    GameOver(GameOver),
    MultiPlayerWinners(Winners),
    HighScore(HighScoreReached),
    #[serde(other)]
    Unknown,
}
