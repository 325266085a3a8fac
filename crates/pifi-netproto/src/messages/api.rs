//! JSON bodies exchanged with the appliance's HTTP API.

use serde::{Deserialize, Serialize};

use super::game::{GameKind, SessionId};
use crate::constants::PONG_NUM_PLAYERS;

/// `POST /api/enqueue_or_join_game` request body.
///
/// Joins the game currently waiting for players when it matches `title`,
/// otherwise enqueues a new one with these settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EnqueueOrJoinGame {
    pub title: GameKind,
    pub difficulty: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_players: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apple_count: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_score: Option<u8>,
}

impl EnqueueOrJoinGame {
    pub fn snake(difficulty: u8, num_players: u8, apple_count: u16) -> Self {
        Self {
            title: GameKind::Snake,
            difficulty,
            num_players: Some(num_players),
            apple_count: Some(apple_count),
            target_score: None,
        }
    }

    pub fn pong(difficulty: u8, target_score: u8) -> Self {
        Self {
            title: GameKind::Pong,
            difficulty,
            num_players: None,
            apple_count: None,
            target_score: Some(target_score),
        }
    }

    /// Number of players the game is declared for.
    pub fn declared_players(&self) -> u8 {
        match self.title {
            GameKind::Snake => self.num_players.unwrap_or(1),
            GameKind::Pong => PONG_NUM_PLAYERS,
        }
    }
}

/// `POST /api/enqueue_or_join_game` response body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct EnqueueOrJoinGameResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub playlist_video_id: Option<SessionId>,
    #[serde(default)]
    pub did_join_existing_game: Option<bool>,
    #[serde(default)]
    pub num_players: Option<u8>,
    #[serde(default)]
    pub apple_count: Option<u16>,
    #[serde(default)]
    pub target_score: Option<u8>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /api/snake` response body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct GameStatus {
    pub is_game_joinable: bool,
    #[serde(default)]
    pub game_joinable_countdown_s: Option<u32>,
    #[serde(default)]
    pub vol_pct: Option<f64>,
}

/// `GET /api/vol_pct` response and `POST /api/vol_pct` body.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct VolPct {
    pub vol_pct: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubmitGameScoreInitials {
    pub score_id: u64,
    pub initials: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessResponse {
    #[serde(default)]
    pub success: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HighScore {
    /// Null until the player finished entering initials.
    #[serde(default)]
    pub initials: Option<String>,
    pub score: u32,
}

/// `GET /api/high_scores?game_type=` response body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct HighScores {
    #[serde(default)]
    pub high_scores: Vec<HighScore>,
}
