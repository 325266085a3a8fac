use std::time::Duration;

use clap::Parser;
use pifi_netproto::{
    constants::GAME_SERVER_PORT,
    messages::{api::EnqueueOrJoinGame, game::GameKind},
};

use crate::slots::DeviceProfile;

/// Connection and game settings for one arcade client.
#[derive(Parser, Debug, Clone)]
#[command(name = "pifi-arcade")]
pub struct ArcadeConfig {
    /// Appliance host name or address
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Talk to the appliance over https/wss
    #[arg(long)]
    pub https: bool,

    /// Port of the appliance HTTP API
    #[arg(long, default_value_t = 80)]
    pub http_port: u16,

    /// Port of the game server WebSocket
    #[arg(long, default_value_t = GAME_SERVER_PORT)]
    pub ws_port: u16,

    /// Game to start or join (snake, pong)
    #[arg(long, default_value = "snake")]
    pub game: GameKind,

    /// Game difficulty
    #[arg(long, default_value_t = 5)]
    pub difficulty: u8,

    /// Snake: number of players the new game waits for
    #[arg(long, default_value_t = 1)]
    pub num_players: u8,

    /// Snake: apples on the board
    #[arg(long, default_value_t = 15)]
    pub apple_count: u16,

    /// Pong: points needed to win
    #[arg(long, default_value_t = 5)]
    pub target_score: u8,

    /// Treat this client as a touch-primary device (one local player)
    #[arg(long)]
    pub touch: bool,

    /// Appliance status poll interval in milliseconds (0 disables polling)
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,
}

impl ArcadeConfig {
    pub fn api_base_url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.http_port)
    }

    pub fn ws_url(&self) -> String {
        let scheme = if self.https { "wss" } else { "ws" };
        format!("{scheme}://{}:{}/", self.host, self.ws_port)
    }

    pub fn game_config(&self) -> EnqueueOrJoinGame {
        match self.game {
            GameKind::Snake => {
                EnqueueOrJoinGame::snake(self.difficulty, self.num_players, self.apple_count)
            }
            GameKind::Pong => EnqueueOrJoinGame::pong(self.difficulty, self.target_score),
        }
    }

    pub fn device(&self) -> DeviceProfile {
        if self.touch {
            DeviceProfile::Touch
        } else {
            DeviceProfile::Desktop
        }
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_ms > 0).then(|| Duration::from_millis(self.poll_interval_ms))
    }
}
