use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, FromRepr, IntoStaticStr};

/// Which arcade game a session runs.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GameKind {
    Snake,
    Pong,
}

/// Opaque game session identifier.
///
/// The appliance hands out the playlist item id of the queued game, so on the
/// wire it travels as `playlist_video_id`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Snake direction codes understood by the game server.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum SnakeDirection {
    Up = 1,
    Down = 2,
    Left = 3,
    Right = 4,
}

impl SnakeDirection {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Pong paddle movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum PaddleDirection {
    Up,
    Down,
}
