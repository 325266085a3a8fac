//! Join control state and the appliance status poller.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, trace, warn};

use crate::api_client::{ApplianceApi, PollSnapshot};

/// The in-flight join, if any, and when the last one finished.
#[derive(Debug, Default, Clone, Copy)]
pub struct JoinAttempt {
    in_progress: bool,
    finish_time: Option<Instant>,
}

impl JoinAttempt {
    /// Start an attempt. A second call while one is in flight is a no-op
    /// that returns `false`.
    pub fn begin(&mut self) -> bool {
        if self.in_progress {
            return false;
        }
        self.in_progress = true;
        true
    }

    pub fn finish(&mut self, now: Instant) {
        self.in_progress = false;
        self.finish_time = Some(now);
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn finish_time(&self) -> Option<Instant> {
        self.finish_time
    }

    /// A poll may drive the join control only if it was started after the
    /// last attempt finished, and never while one is in flight.
    pub fn admits_poll(&self, poll_started_at: Instant) -> bool {
        !self.in_progress && self.finish_time.is_none_or(|t| poll_started_at > t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinLabel {
    #[default]
    NewGame,
    /// A game on the appliance is waiting for players.
    JoinGame { countdown_s: Option<u32> },
}

impl JoinLabel {
    pub fn text(&self) -> String {
        match self {
            Self::NewGame => "New game".to_string(),
            Self::JoinGame {
                countdown_s: Some(s),
            } => format!("Join game ({s}s)"),
            Self::JoinGame { countdown_s: None } => "Join game".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinControl {
    pub enabled: bool,
    pub label: JoinLabel,
}

impl Default for JoinControl {
    fn default() -> Self {
        Self {
            enabled: true,
            label: JoinLabel::NewGame,
        }
    }
}

impl JoinControl {
    /// Apply an accepted poll. `has_room` is whether a local slot is free.
    pub fn apply_poll(&mut self, snapshot: &PollSnapshot, has_room: bool) {
        self.label = if snapshot.is_game_joinable {
            JoinLabel::JoinGame {
                countdown_s: snapshot.countdown_seconds,
            }
        } else {
            JoinLabel::NewGame
        };
        self.enabled = has_room;
    }
}

/// One completed poll, stamped with when it was sent.
#[derive(Debug, Clone, Copy)]
pub struct PollResult {
    pub started_at: Instant,
    pub snapshot: PollSnapshot,
}

/// Poll the appliance status every `interval` until the receiver goes away.
///
/// Failed polls are logged and skipped.
pub async fn run_poller<A: ApplianceApi>(
    api: Arc<A>,
    interval: Duration,
    tx: mpsc::Sender<PollResult>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let started_at = Instant::now();
        match api.game_status().await {
            Ok(snapshot) => {
                trace!(?snapshot, "Polled appliance status");
                if tx.send(PollResult { started_at, snapshot }).await.is_err() {
                    debug!("Poll receiver dropped, stopping poller");
                    break;
                }
            }
            Err(e) => warn!("Status poll failed: {}", e),
        }
    }
}
