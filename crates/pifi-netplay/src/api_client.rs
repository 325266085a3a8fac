//! HTTP client for the appliance API.
//!
//! The request that creates or joins a game slot lives here, next to the
//! smaller status/volume/high-score calls the join control and the
//! initials flow depend on. `ureq` is blocking, so every call runs on
//! tokio's blocking pool.

use std::future::Future;

use pifi_netproto::{
    constants::{
        APPLE_COUNT_RANGE, DIFFICULTY_RANGE, ENQUEUE_OR_JOIN_GAME_PATH, GAME_STATUS_PATH,
        HIGH_SCORES_PATH, INITIALS_LEN, MAX_MULTI_PLAYER_JOIN_TIME_S, NUM_PLAYERS_RANGE,
        SUBMIT_INITIALS_PATH, TARGET_SCORE_RANGE, VOL_PCT_PATH,
    },
    messages::{
        api::{
            EnqueueOrJoinGame, EnqueueOrJoinGameResponse, GameStatus, HighScore, HighScores,
            SubmitGameScoreInitials, SuccessResponse, VolPct,
        },
        game::{GameKind, SessionId},
    },
};
use tracing::{debug, warn};

use crate::error::NetplayError;

/// Outcome of a successful `enqueue_or_join_game` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinResult {
    pub session_id: SessionId,
    /// Players the game was declared for, as echoed by the appliance.
    pub player_capacity: Option<u8>,
    pub did_join_existing_game: bool,
    pub apple_count: Option<u16>,
    pub target_score: Option<u8>,
}

impl TryFrom<EnqueueOrJoinGameResponse> for JoinResult {
    type Error = NetplayError;

    fn try_from(resp: EnqueueOrJoinGameResponse) -> Result<Self, Self::Error> {
        if resp.success == Some(false) {
            return Err(NetplayError::server_rejected(
                resp.error.unwrap_or_else(|| "appliance refused the game".to_string()),
            ));
        }
        let session_id = resp.playlist_video_id.ok_or_else(|| {
            NetplayError::server_rejected("response carried no playlist_video_id")
        })?;
        Ok(Self {
            session_id,
            player_capacity: resp.num_players,
            did_join_existing_game: resp.did_join_existing_game.unwrap_or(false),
            apple_count: resp.apple_count,
            target_score: resp.target_score,
        })
    }
}

/// Latest appliance-level status, used only for the join control affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollSnapshot {
    pub is_game_joinable: bool,
    pub countdown_seconds: Option<u32>,
    pub volume_pct: Option<u8>,
}

impl From<GameStatus> for PollSnapshot {
    fn from(status: GameStatus) -> Self {
        Self {
            is_game_joinable: status.is_game_joinable,
            countdown_seconds: status
                .game_joinable_countdown_s
                .map(|s| s.min(MAX_MULTI_PLAYER_JOIN_TIME_S)),
            volume_pct: status.vol_pct.map(clamp_vol_pct),
        }
    }
}

fn clamp_vol_pct(vol: f64) -> u8 {
    vol.round().clamp(0.0, 100.0) as u8
}

/// Appliance operations the session core needs.
pub trait ApplianceApi: Send + Sync + 'static {
    /// Atomically create or join the pending game slot.
    fn enqueue_or_join_game(
        &self,
        config: &EnqueueOrJoinGame,
    ) -> impl Future<Output = Result<JoinResult, NetplayError>> + Send;

    fn game_status(&self) -> impl Future<Output = Result<PollSnapshot, NetplayError>> + Send;

    fn volume(&self) -> impl Future<Output = Result<u8, NetplayError>> + Send;

    fn set_volume(&self, vol_pct: u8) -> impl Future<Output = Result<(), NetplayError>> + Send;

    /// `initials` must already be normalized with [`normalize_initials`].
    fn submit_initials(
        &self,
        score_id: u64,
        initials: &str,
    ) -> impl Future<Output = Result<bool, NetplayError>> + Send;

    fn high_scores(
        &self,
        kind: GameKind,
    ) -> impl Future<Output = Result<Vec<HighScore>, NetplayError>> + Send;
}

/// Basic numeric bounds; the appliance does the real validation.
pub fn check_bounds(config: &EnqueueOrJoinGame) -> Result<(), NetplayError> {
    if !DIFFICULTY_RANGE.contains(&config.difficulty) {
        return Err(NetplayError::server_rejected(format!(
            "difficulty {} out of range",
            config.difficulty
        )));
    }
    if let Some(n) = config.num_players
        && !NUM_PLAYERS_RANGE.contains(&n)
    {
        return Err(NetplayError::server_rejected(format!(
            "num_players {n} out of range"
        )));
    }
    if let Some(n) = config.apple_count
        && !APPLE_COUNT_RANGE.contains(&n)
    {
        return Err(NetplayError::server_rejected(format!(
            "apple_count {n} out of range"
        )));
    }
    if let Some(n) = config.target_score
        && !TARGET_SCORE_RANGE.contains(&n)
    {
        return Err(NetplayError::server_rejected(format!(
            "target_score {n} out of range"
        )));
    }
    Ok(())
}

/// Uppercase and check high score initials.
pub fn normalize_initials(initials: &str) -> Result<String, NetplayError> {
    let trimmed = initials.trim();
    if trimmed.chars().count() != INITIALS_LEN || !trimmed.chars().all(|c| c.is_ascii_alphabetic())
    {
        return Err(NetplayError::InvalidInitials(initials.to_string()));
    }
    Ok(trimmed.to_ascii_uppercase())
}

/// [`ApplianceApi`] over the appliance's JSON HTTP API.
#[derive(Clone)]
pub struct HttpApplianceApi {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpApplianceApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn blocking<T, F>(&self, call: F) -> Result<T, HttpFailure>
    where
        F: FnOnce(&ureq::Agent) -> Result<T, HttpFailure> + Send + 'static,
        T: Send + 'static,
    {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || call(&agent))
            .await
            .map_err(|e| HttpFailure::Network(format!("request task failed: {e}")))?
    }
}

/// Internal classification of a failed HTTP call.
#[derive(Debug)]
enum HttpFailure {
    Network(String),
    Rejected(String),
}

impl From<ureq::Error> for HttpFailure {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Rejected(format!("HTTP {code}")),
            ureq::Error::Json(e) => Self::Rejected(format!("malformed response: {e}")),
            other => Self::Network(other.to_string()),
        }
    }
}

impl HttpFailure {
    fn into_join_error(self) -> NetplayError {
        match self {
            Self::Network(reason) => NetplayError::network(reason),
            Self::Rejected(reason) => NetplayError::server_rejected(reason),
        }
    }

    fn into_api_error(self) -> NetplayError {
        match self {
            Self::Network(reason) | Self::Rejected(reason) => NetplayError::Api(reason),
        }
    }
}

fn get_json<T: serde::de::DeserializeOwned>(
    agent: &ureq::Agent,
    url: &str,
    query: Option<(&str, &str)>,
) -> Result<T, HttpFailure> {
    let mut request = agent.get(url);
    if let Some((key, value)) = query {
        request = request.query(key, value);
    }
    let mut resp = request.call()?;
    Ok(resp.body_mut().read_json::<T>()?)
}

fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
    agent: &ureq::Agent,
    url: &str,
    body: &B,
) -> Result<T, HttpFailure> {
    let mut resp = agent.post(url).send_json(body)?;
    Ok(resp.body_mut().read_json::<T>()?)
}

impl ApplianceApi for HttpApplianceApi {
    async fn enqueue_or_join_game(
        &self,
        config: &EnqueueOrJoinGame,
    ) -> Result<JoinResult, NetplayError> {
        let url = self.url(ENQUEUE_OR_JOIN_GAME_PATH);
        let body = config.clone();
        debug!(%url, title = %body.title, "Posting enqueue_or_join_game");
        let resp: EnqueueOrJoinGameResponse = self
            .blocking(move |agent| post_json(agent, &url, &body))
            .await
            .map_err(HttpFailure::into_join_error)?;
        JoinResult::try_from(resp)
    }

    async fn game_status(&self) -> Result<PollSnapshot, NetplayError> {
        let url = self.url(GAME_STATUS_PATH);
        let status: GameStatus = self
            .blocking(move |agent| get_json(agent, &url, None))
            .await
            .map_err(HttpFailure::into_api_error)?;
        Ok(status.into())
    }

    async fn volume(&self) -> Result<u8, NetplayError> {
        let url = self.url(VOL_PCT_PATH);
        let vol: VolPct = self
            .blocking(move |agent| get_json(agent, &url, None))
            .await
            .map_err(HttpFailure::into_api_error)?;
        Ok(clamp_vol_pct(vol.vol_pct))
    }

    async fn set_volume(&self, vol_pct: u8) -> Result<(), NetplayError> {
        let url = self.url(VOL_PCT_PATH);
        let body = VolPct {
            vol_pct: f64::from(vol_pct),
        };
        let _: VolPct = self
            .blocking(move |agent| post_json(agent, &url, &body))
            .await
            .map_err(HttpFailure::into_api_error)?;
        Ok(())
    }

    async fn submit_initials(&self, score_id: u64, initials: &str) -> Result<bool, NetplayError> {
        let url = self.url(SUBMIT_INITIALS_PATH);
        let body = SubmitGameScoreInitials {
            score_id,
            initials: initials.to_string(),
        };
        let resp: SuccessResponse = self
            .blocking(move |agent| post_json(agent, &url, &body))
            .await
            .map_err(HttpFailure::into_api_error)?;
        if !resp.success {
            warn!(score_id, "Appliance did not accept initials");
        }
        Ok(resp.success)
    }

    async fn high_scores(&self, kind: GameKind) -> Result<Vec<HighScore>, NetplayError> {
        let url = self.url(HIGH_SCORES_PATH);
        let game_type: &'static str = kind.into();
        let scores: HighScores = self
            .blocking(move |agent| get_json(agent, &url, Some(("game_type", game_type))))
            .await
            .map_err(HttpFailure::into_api_error)?;
        Ok(scores.high_scores)
    }
}
