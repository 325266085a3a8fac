//! Game event interpretation and the view state it drives.

use pifi_netproto::messages::{
    game::GameKind,
    socket::{GameOver, InboundMessage, ScoreSnapshot},
};
use tracing::{debug, info};

use crate::{poller::JoinControl, slots::LocalPlayers};

pub const WAITING_FOR_GAME: &str = "Waiting for game...";
pub const CONNECTED_WAITING: &str = "Connected! Waiting for game to start...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinnerText {
    pub text: String,
    /// `None` when the result is announced neutrally (several local players).
    pub victory: Option<bool>,
}

/// Everything a front end needs to draw the game page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    pub game: GameKind,
    pub join_control: JoinControl,
    pub status: Option<String>,
    pub scores: Vec<u32>,
    /// Snake only.
    pub apples_left: Option<u32>,
    /// Remote indices played from this device, highlighted in the score list.
    pub my_players: Vec<u8>,
    pub player_indicator: Option<String>,
    pub winner: Option<WinnerText>,
    pub winners_board: Option<Vec<u8>>,
    /// `score_id` awaiting initials.
    pub initials_entry: Option<u64>,
    pub volume_pct: Option<u8>,
    /// Last routed control as `(slot_index, label)`. Cosmetic only.
    pub last_pressed: Option<(usize, &'static str)>,
    pub local_players: usize,
    pub capacity: usize,
    pub last_error: Option<String>,
}

impl GameView {
    pub fn new(game: GameKind, capacity: usize) -> Self {
        Self {
            game,
            join_control: JoinControl::default(),
            status: None,
            scores: Vec::new(),
            apples_left: None,
            my_players: Vec::new(),
            player_indicator: None,
            winner: None,
            winners_board: None,
            initials_entry: None,
            volume_pct: None,
            last_pressed: None,
            local_players: 0,
            capacity,
            last_error: None,
        }
    }

    /// Fresh per-game state for a newly entered session.
    pub fn reset_for_session(&mut self, player_count: usize, apples_left: Option<u32>) {
        self.scores = vec![0; player_count];
        self.apples_left = apples_left;
        self.my_players.clear();
        self.player_indicator = None;
        self.winner = None;
        self.winners_board = None;
        self.initials_entry = None;
        self.last_pressed = None;
    }
}

/// Side effects the session must carry out after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    BindRemoteIndex(u8),
    /// Game over: tear down slots and give the join control back.
    EndSession,
    SuspendInput { score_id: u64 },
}

#[derive(Debug, Default)]
pub struct GameEventInterpreter {
    winners_shown: bool,
}

impl GameEventInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.winners_shown = false;
    }

    pub fn apply(
        &mut self,
        msg: InboundMessage,
        local: &LocalPlayers,
        view: &mut GameView,
    ) -> Option<Reaction> {
        match msg {
            InboundMessage::PlayerIndexMessage(p) => {
                if !view.my_players.contains(&p.player_index) {
                    view.my_players.push(p.player_index);
                }
                view.player_indicator = Some(if local.count > 1 {
                    "You are both players (local 2P)".to_string()
                } else {
                    format!("You are Player {}", u32::from(p.player_index) + 1)
                });
                Some(Reaction::BindRemoteIndex(p.player_index))
            }
            InboundMessage::ScoreUpdate(s)
            | InboundMessage::SinglePlayerScore(s)
            | InboundMessage::MultiPlayerScore(s) => {
                apply_scores(s, view);
                None
            }
            InboundMessage::GameOver(over) => {
                let winner = winner_text(&over, local);
                info!(winner = over.winner, text = %winner.text, "Game over");
                if !over.scores.is_empty() {
                    view.scores = over.scores;
                }
                view.winner = Some(winner);
                view.status = None;
                Some(Reaction::EndSession)
            }
            InboundMessage::MultiPlayerWinners(w) => {
                if self.winners_shown {
                    debug!("Winners board already shown");
                } else {
                    self.winners_shown = true;
                    view.winners_board = Some(w.winners);
                }
                None
            }
            InboundMessage::HighScore(h) => {
                info!(score_id = h.score_id, "High score reached");
                view.initials_entry = Some(h.score_id);
                Some(Reaction::SuspendInput {
                    score_id: h.score_id,
                })
            }
            InboundMessage::Unknown => {
                debug!("Ignoring unknown message type");
                None
            }
        }
    }
}

fn apply_scores(snapshot: ScoreSnapshot, view: &mut GameView) {
    view.status = None;
    view.scores = snapshot.scores;
    if snapshot.apples_left.is_some() {
        view.apples_left = snapshot.apples_left;
    }
}

fn winner_text(over: &GameOver, local: &LocalPlayers) -> WinnerText {
    if local.count > 1 {
        return WinnerText {
            text: format!("PLAYER {} WINS!", u32::from(over.winner) + 1),
            victory: None,
        };
    }
    let won = local.remote_indices.first() == Some(&over.winner);
    WinnerText {
        text: if won { "YOU WIN!" } else { "YOU LOSE" }.to_string(),
        victory: Some(won),
    }
}
