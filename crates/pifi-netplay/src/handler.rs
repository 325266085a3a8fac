//! Async driver for the game session.
//!
//! One task owns the [`SessionManager`] and feeds it, one event at a time:
//! - socket frames and closes from every live [`SessionSocket`]
//! - join sequences (HTTP request and socket open, run concurrently)
//! - appliance status polls
//! - front end commands
//!
//! After every event the current [`GameView`] is published on a watch channel.

use std::{sync::Arc, time::Duration};

use pifi_netproto::messages::{
    api::{EnqueueOrJoinGame, HighScore},
    game::SessionId,
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    api_client::{ApplianceApi, JoinResult, check_bounds},
    config::ArcadeConfig,
    error::NetplayError,
    events::{GameView, Reaction},
    input::PhysicalControl,
    poller::{PollResult, run_poller},
    session::SessionManager,
    slots::DeviceProfile,
    socket::{self, SessionSocket, SocketEvent, SocketEventKind, SocketId},
};

/// Settings the handler needs from the client configuration.
#[derive(Debug, Clone)]
pub struct HandlerOptions {
    pub ws_url: String,
    pub game_config: EnqueueOrJoinGame,
    pub device: DeviceProfile,
    /// `None` disables the status poller.
    pub poll_interval: Option<Duration>,
}

impl From<&ArcadeConfig> for HandlerOptions {
    fn from(cfg: &ArcadeConfig) -> Self {
        Self {
            ws_url: cfg.ws_url(),
            game_config: cfg.game_config(),
            device: cfg.device(),
            poll_interval: cfg.poll_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArcadeCommand {
    /// Click on the join/new game control.
    NewGame,
    Input(PhysicalControl),
    /// Slider moved; the new volume is sent right away.
    SetVolume(u8),
    /// Slider let go.
    ReleaseVolume,
    SubmitInitials(String),
    SkipInitials,
    FetchHighScores,
    Shutdown,
}

/// Discrete notifications for the front end. Continuous state is in [`GameView`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArcadeEvent {
    Joined {
        session_id: SessionId,
        slot_index: usize,
        did_join_existing_game: bool,
    },
    Superseded {
        previous: SessionId,
    },
    JoinFailed(String),
    GameOver {
        text: String,
    },
    SocketClosed {
        slot_index: usize,
        reason: String,
    },
    HighScore {
        score_id: u64,
    },
    InitialsRejected(String),
    InitialsSubmitted {
        accepted: bool,
    },
    HighScores(Vec<HighScore>),
    Error(String),
}

#[derive(Debug)]
enum JoinEvent {
    SocketOpened(SocketId),
    Completed(Result<(JoinResult, SessionSocket), NetplayError>),
}

#[derive(Debug)]
enum TaskDone {
    Volume(Result<u8, NetplayError>),
    VolumeSet(Result<(), NetplayError>),
    Initials(Result<bool, NetplayError>),
    HighScores(Result<Vec<HighScore>, NetplayError>),
}

pub struct SessionHandler<A> {
    api: Arc<A>,
    options: HandlerOptions,
    manager: SessionManager<SessionSocket>,
    next_socket_id: u64,
    command_rx: mpsc::Receiver<ArcadeCommand>,
    event_tx: mpsc::Sender<ArcadeEvent>,
    view_tx: watch::Sender<GameView>,
    socket_tx: mpsc::Sender<SocketEvent>,
    socket_rx: mpsc::Receiver<SocketEvent>,
    join_tx: mpsc::Sender<JoinEvent>,
    join_rx: mpsc::Receiver<JoinEvent>,
    poll_tx: mpsc::Sender<PollResult>,
    poll_rx: mpsc::Receiver<PollResult>,
    task_tx: mpsc::Sender<TaskDone>,
    task_rx: mpsc::Receiver<TaskDone>,
}

impl<A: ApplianceApi> SessionHandler<A> {
    pub fn new(
        api: A,
        options: HandlerOptions,
        event_tx: mpsc::Sender<ArcadeEvent>,
    ) -> (Self, mpsc::Sender<ArcadeCommand>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (socket_tx, socket_rx) = mpsc::channel(256);
        let (join_tx, join_rx) = mpsc::channel(8);
        let (poll_tx, poll_rx) = mpsc::channel(4);
        let (task_tx, task_rx) = mpsc::channel(8);

        let manager = SessionManager::new(
            options.game_config.clone(),
            options.device,
            options.poll_interval,
        );
        let (view_tx, _) = watch::channel(manager.view().clone());

        (
            Self {
                api: Arc::new(api),
                options,
                manager,
                next_socket_id: 0,
                command_rx,
                event_tx,
                view_tx,
                socket_tx,
                socket_rx,
                join_tx,
                join_rx,
                poll_tx,
                poll_rx,
                task_tx,
                task_rx,
            },
            command_tx,
        )
    }

    /// Subscribe to view updates.
    pub fn view(&self) -> watch::Receiver<GameView> {
        self.view_tx.subscribe()
    }

    /// Run until [`ArcadeCommand::Shutdown`] or until every command sender is gone.
    pub async fn run(mut self) -> Result<(), NetplayError> {
        let poller: Option<JoinHandle<()>> = self.options.poll_interval.map(|interval| {
            tokio::spawn(run_poller(self.api.clone(), interval, self.poll_tx.clone()))
        });

        let api = self.api.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(TaskDone::Volume(api.volume().await)).await;
        });

        info!(game = %self.manager.game(), ws_url = %self.options.ws_url, "Arcade session started");

        loop {
            // Socket traffic first so a burst of frames is never starved by polls.
            tokio::select! {
                biased;

                Some(event) = self.socket_rx.recv() => {
                    self.handle_socket_event(event).await;
                }
                Some(event) = self.join_rx.recv() => {
                    self.handle_join_event(event).await;
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(ArcadeCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }
                Some(done) = self.task_rx.recv() => {
                    self.handle_task_done(done).await;
                }
                Some(poll) = self.poll_rx.recv() => {
                    self.manager.apply_poll(&poll, Instant::now());
                }
            }
            self.publish();
        }

        if let Some(poller) = poller {
            poller.abort();
        }
        self.manager.shutdown();
        self.publish();
        info!("Arcade session stopped");
        Ok(())
    }

    fn publish(&self) {
        self.view_tx.send_if_modified(|view| {
            if view == self.manager.view() {
                false
            } else {
                *view = self.manager.view().clone();
                true
            }
        });
    }

    async fn emit(&self, event: ArcadeEvent) {
        if self.event_tx.send(event).await.is_err() {
            debug!("Event receiver dropped");
        }
    }

    async fn handle_command(&mut self, cmd: ArcadeCommand) {
        match cmd {
            ArcadeCommand::NewGame => self.start_join(),
            ArcadeCommand::Input(control) => {
                self.manager.handle_input(control);
            }
            ArcadeCommand::SetVolume(vol_pct) => {
                self.manager.begin_volume_change(vol_pct);
                let api = self.api.clone();
                let tx = self.task_tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(TaskDone::VolumeSet(api.set_volume(vol_pct).await)).await;
                });
            }
            ArcadeCommand::ReleaseVolume => self.manager.release_volume(Instant::now()),
            ArcadeCommand::SubmitInitials(initials) => match self.manager.take_initials(&initials) {
                Ok(Some((score_id, initials))) => {
                    let api = self.api.clone();
                    let tx = self.task_tx.clone();
                    tokio::spawn(async move {
                        let result = api.submit_initials(score_id, &initials).await;
                        let _ = tx.send(TaskDone::Initials(result)).await;
                    });
                }
                Ok(None) => debug!("No high score awaiting initials"),
                Err(e) => self.emit(ArcadeEvent::InitialsRejected(e.to_string())).await,
            },
            ArcadeCommand::SkipInitials => self.manager.finish_initials(),
            ArcadeCommand::FetchHighScores => {
                let api = self.api.clone();
                let tx = self.task_tx.clone();
                let kind = self.manager.game();
                tokio::spawn(async move {
                    let _ = tx.send(TaskDone::HighScores(api.high_scores(kind).await)).await;
                });
            }
            ArcadeCommand::Shutdown => {}
        }
    }

    /// Launch the HTTP join and the socket open together; the first failure
    /// drops the other half.
    fn start_join(&mut self) {
        if !self.manager.begin_join() {
            return;
        }
        self.next_socket_id += 1;
        let socket_id = SocketId(self.next_socket_id);
        let api = self.api.clone();
        let config = self.manager.config().clone();
        let url = self.options.ws_url.clone();
        let socket_tx = self.socket_tx.clone();
        let join_tx = self.join_tx.clone();
        debug!(%socket_id, "Join sequence started");

        tokio::spawn(async move {
            let outcome = async {
                check_bounds(&config)?;
                let request = api.enqueue_or_join_game(&config);
                let open = async {
                    let socket = socket::connect(&url, socket_id, socket_tx).await?;
                    let _ = join_tx.send(JoinEvent::SocketOpened(socket_id)).await;
                    Ok::<_, NetplayError>(socket)
                };
                tokio::try_join!(request, open)
            }
            .await;
            let _ = join_tx.send(JoinEvent::Completed(outcome)).await;
        });
    }

    async fn handle_join_event(&mut self, event: JoinEvent) {
        match event {
            JoinEvent::SocketOpened(socket_id) => {
                debug!(%socket_id, "Join socket open");
                self.manager.socket_opened();
            }
            JoinEvent::Completed(outcome) => {
                let did_join_existing_game = outcome
                    .as_ref()
                    .is_ok_and(|(result, _)| result.did_join_existing_game);
                match self.manager.complete_join(Instant::now(), outcome) {
                    Ok(admission) => {
                        if let Some(previous) = admission.superseded {
                            self.emit(ArcadeEvent::Superseded { previous }).await;
                        }
                        self.emit(ArcadeEvent::Joined {
                            session_id: admission.session_id,
                            slot_index: admission.slot_index,
                            did_join_existing_game,
                        })
                        .await;
                    }
                    Err(e) => self.emit(ArcadeEvent::JoinFailed(e.to_string())).await,
                }
            }
        }
    }

    async fn handle_socket_event(&mut self, event: SocketEvent) {
        match event.kind {
            SocketEventKind::Message(text) => {
                match self.manager.handle_socket_message(event.socket_id, &text) {
                    Some(Reaction::EndSession) => {
                        let text = self
                            .manager
                            .view()
                            .winner
                            .as_ref()
                            .map(|w| w.text.clone())
                            .unwrap_or_default();
                        self.emit(ArcadeEvent::GameOver { text }).await;
                    }
                    Some(Reaction::SuspendInput { score_id }) => {
                        self.emit(ArcadeEvent::HighScore { score_id }).await;
                    }
                    Some(Reaction::BindRemoteIndex(_)) | None => {}
                }
            }
            SocketEventKind::Closed { state, reason } => {
                if let Some(slot_index) =
                    self.manager
                        .handle_socket_closed(event.socket_id, state, &reason)
                {
                    self.emit(ArcadeEvent::SocketClosed { slot_index, reason })
                        .await;
                }
            }
        }
    }

    async fn handle_task_done(&mut self, done: TaskDone) {
        match done {
            TaskDone::Volume(Ok(vol_pct)) => self.manager.apply_volume(vol_pct, Instant::now()),
            TaskDone::Volume(Err(e)) => warn!("Reading volume failed: {}", e),
            TaskDone::VolumeSet(Ok(())) => {}
            TaskDone::VolumeSet(Err(e)) => warn!("Setting volume failed: {}", e),
            TaskDone::Initials(result) => {
                self.manager.finish_initials();
                match result {
                    Ok(accepted) => self.emit(ArcadeEvent::InitialsSubmitted { accepted }).await,
                    Err(e) => {
                        warn!("Submitting initials failed: {}", e);
                        self.emit(ArcadeEvent::Error(e.to_string())).await;
                    }
                }
            }
            TaskDone::HighScores(Ok(scores)) => self.emit(ArcadeEvent::HighScores(scores)).await,
            TaskDone::HighScores(Err(e)) => {
                warn!("Fetching high scores failed: {}", e);
                self.emit(ArcadeEvent::Error(e.to_string())).await;
            }
        }
    }
}
