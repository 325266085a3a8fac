/// Port the appliance's game WebSocket server listens on.
pub const GAME_SERVER_PORT: u16 = 8765;

pub const ENQUEUE_OR_JOIN_GAME_PATH: &str = "/api/enqueue_or_join_game";

/// Appliance status polled by the join control (joinability, countdown, volume).
pub const GAME_STATUS_PATH: &str = "/api/snake";

pub const VOL_PCT_PATH: &str = "/api/vol_pct";

pub const SUBMIT_INITIALS_PATH: &str = "/api/submit_game_score_initials";

pub const HIGH_SCORES_PATH: &str = "/api/high_scores";

/// How long a multiplayer game waits for players after it starts playing.
pub const MAX_MULTI_PLAYER_JOIN_TIME_S: u32 = 11;

/// High score initials are always exactly this many letters.
pub const INITIALS_LEN: usize = 3;

/// Reason attached to the normal close frame sent when a session is superseded.
pub const NEW_GAME_CLOSE_REASON: &str = "closing because new game";

/// Reason attached to the normal close frame sent after the game ended.
pub const GAME_OVER_CLOSE_REASON: &str = "closing because game over";

pub const DIFFICULTY_RANGE: std::ops::RangeInclusive<u8> = 1..=9;
pub const NUM_PLAYERS_RANGE: std::ops::RangeInclusive<u8> = 1..=4;
pub const APPLE_COUNT_RANGE: std::ops::RangeInclusive<u16> = 1..=500;
pub const TARGET_SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=99;

/// Pong is always played by two paddles.
pub const PONG_NUM_PLAYERS: u8 = 2;
