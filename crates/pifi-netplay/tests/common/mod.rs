#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use pifi_netplay::{
    ApplianceApi, ArcadeCommand, ArcadeEvent, DeviceProfile, GameView, HandlerOptions, JoinResult,
    NetplayError, PollSnapshot, SessionHandler,
};
use pifi_netproto::messages::{
    api::{EnqueueOrJoinGame, HighScore},
    game::{GameKind, SessionId},
};
use tokio::net::TcpListener;
use tokio::sync::{Notify, mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub const DEADLINE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Appliance

#[derive(Default)]
struct FakeInner {
    sessions: Mutex<VecDeque<u64>>,
    requests: Mutex<Vec<EnqueueOrJoinGame>>,
    responded_at: Mutex<Vec<Instant>>,
    gate: Mutex<Option<Arc<Notify>>>,
    fail_join: AtomicBool,
    status: Mutex<PollSnapshot>,
    status_calls: AtomicUsize,
    volume_reads: AtomicUsize,
    volumes: Mutex<Vec<u8>>,
    initials: Mutex<Vec<(u64, String)>>,
}

/// Scripted appliance. Clones share state so a test can inspect what the
/// handler did with its copy.
#[derive(Clone, Default)]
pub struct FakeAppliance {
    inner: Arc<FakeInner>,
}

impl FakeAppliance {
    pub fn with_sessions(ids: &[u64]) -> Self {
        let fake = Self::default();
        fake.inner.sessions.lock().unwrap().extend(ids.iter().copied());
        fake
    }

    /// Hold every join request until the returned gate is notified once per request.
    pub fn gate_joins(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.inner.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn fail_joins(&self) {
        self.inner.fail_join.store(true, Ordering::SeqCst);
    }

    pub fn set_status(&self, status: PollSnapshot) {
        *self.inner.status.lock().unwrap() = status;
    }

    pub fn requests(&self) -> Vec<EnqueueOrJoinGame> {
        self.inner.requests.lock().unwrap().clone()
    }

    pub fn responded_at(&self) -> Vec<Instant> {
        self.inner.responded_at.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.inner.status_calls.load(Ordering::SeqCst)
    }

    pub fn volume_reads(&self) -> usize {
        self.inner.volume_reads.load(Ordering::SeqCst)
    }

    pub fn volumes(&self) -> Vec<u8> {
        self.inner.volumes.lock().unwrap().clone()
    }

    pub fn initials(&self) -> Vec<(u64, String)> {
        self.inner.initials.lock().unwrap().clone()
    }
}

impl ApplianceApi for FakeAppliance {
    async fn enqueue_or_join_game(
        &self,
        config: &EnqueueOrJoinGame,
    ) -> Result<JoinResult, NetplayError> {
        self.inner.requests.lock().unwrap().push(config.clone());
        let gate = self.inner.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.inner.fail_join.load(Ordering::SeqCst) {
            return Err(NetplayError::network("connection refused"));
        }
        let id = self.inner.sessions.lock().unwrap().pop_front().unwrap_or(1);
        self.inner.responded_at.lock().unwrap().push(Instant::now());
        Ok(JoinResult {
            session_id: SessionId(id),
            player_capacity: Some(config.declared_players()),
            did_join_existing_game: false,
            apple_count: config.apple_count,
            target_score: config.target_score,
        })
    }

    async fn game_status(&self) -> Result<PollSnapshot, NetplayError> {
        self.inner.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.inner.status.lock().unwrap())
    }

    async fn volume(&self) -> Result<u8, NetplayError> {
        self.inner.volume_reads.fetch_add(1, Ordering::SeqCst);
        let polled = self.inner.status.lock().unwrap().volume_pct;
        let set = self.inner.volumes.lock().unwrap().last().copied();
        Ok(polled.or(set).unwrap_or(50))
    }

    async fn set_volume(&self, vol_pct: u8) -> Result<(), NetplayError> {
        self.inner.volumes.lock().unwrap().push(vol_pct);
        Ok(())
    }

    async fn submit_initials(&self, score_id: u64, initials: &str) -> Result<bool, NetplayError> {
        self.inner
            .initials
            .lock()
            .unwrap()
            .push((score_id, initials.to_string()));
        Ok(true)
    }

    async fn high_scores(&self, _kind: GameKind) -> Result<Vec<HighScore>, NetplayError> {
        Ok(vec![HighScore {
            initials: Some("AAA".to_string()),
            score: 30,
        }])
    }
}

// ---------------------------------------------------------------------------
// Game server

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Closed(Option<String>),
}

/// Server side of one accepted client socket.
pub struct ServerConn {
    pub accepted_at: Instant,
    frames: mpsc::UnboundedReceiver<(Instant, Frame)>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
}

impl ServerConn {
    pub async fn next_frame(&mut self) -> (Instant, Frame) {
        timeout(DEADLINE, self.frames.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("connection task ended")
    }

    pub async fn next_text(&mut self) -> String {
        match self.next_frame().await {
            (_, Frame::Text(text)) => text,
            (_, other) => panic!("expected text frame, got {other:?}"),
        }
    }

    /// Wait for the client to close, skipping any text still in flight.
    pub async fn closed(&mut self) -> Option<String> {
        loop {
            if let (_, Frame::Closed(reason)) = self.next_frame().await {
                return reason;
            }
        }
    }

    pub async fn assert_silent(&mut self, window: Duration) {
        if let Ok(frame) = timeout(window, self.frames.recv()).await {
            panic!("unexpected client frame {frame:?}");
        }
    }

    pub fn send_json(&self, value: serde_json::Value) {
        if let Some(tx) = &self.outbound {
            let _ = tx.send(Message::Text(value.to_string().into()));
        }
    }

    /// Drop the TCP connection without a close frame.
    pub fn hang_up(&mut self) {
        self.outbound = None;
    }
}

pub struct GameServer {
    pub addr: SocketAddr,
    conns: mpsc::UnboundedReceiver<ServerConn>,
}

impl GameServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (conn_tx, conns) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                let accepted_at = Instant::now();
                let (frames_tx, frames) = mpsc::unbounded_channel();
                let (out_tx, out_rx) = mpsc::unbounded_channel();
                tokio::spawn(serve_conn(ws, frames_tx, out_rx));
                if conn_tx
                    .send(ServerConn {
                        accepted_at,
                        frames,
                        outbound: Some(out_tx),
                    })
                    .is_err()
                {
                    break;
                }
            }
        });

        Self { addr, conns }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    pub async fn accept(&mut self) -> ServerConn {
        timeout(DEADLINE, self.conns.recv())
            .await
            .expect("timed out waiting for client socket")
            .expect("listener stopped")
    }
}

async fn serve_conn(
    mut ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    frames_tx: mpsc::UnboundedSender<(Instant, Frame)>,
    mut out_rx: mpsc::UnboundedReceiver<Message>,
) {
    loop {
        tokio::select! {
            out = out_rx.recv() => match out {
                Some(msg) => {
                    if ws.send(msg).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = ws.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = frames_tx.send((Instant::now(), Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.as_str().to_owned());
                    let _ = frames_tx.send((Instant::now(), Frame::Closed(reason)));
                    break;
                }
                Some(Ok(_)) => {}
                _ => {
                    let _ = frames_tx.send((Instant::now(), Frame::Closed(None)));
                    break;
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Client

pub struct Client {
    pub cmd: mpsc::Sender<ArcadeCommand>,
    pub events: mpsc::Receiver<ArcadeEvent>,
    pub view: watch::Receiver<GameView>,
}

impl Client {
    pub async fn send(&self, cmd: ArcadeCommand) {
        self.cmd.send(cmd).await.unwrap();
    }

    pub async fn next_event(&mut self) -> ArcadeEvent {
        timeout(DEADLINE, self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    pub async fn wait_view(&mut self, pred: impl FnMut(&GameView) -> bool) -> GameView {
        timeout(DEADLINE, self.view.wait_for(pred))
            .await
            .expect("timed out waiting for view")
            .expect("view channel closed")
            .clone()
    }
}

/// Status polling every `interval`, as the page does once a second.
pub fn polling_options(
    server: &GameServer,
    game_config: EnqueueOrJoinGame,
    device: DeviceProfile,
    interval: Duration,
) -> HandlerOptions {
    HandlerOptions {
        poll_interval: Some(interval),
        device,
        ..options(server, game_config)
    }
}

pub fn options(server: &GameServer, game_config: EnqueueOrJoinGame) -> HandlerOptions {
    HandlerOptions {
        ws_url: server.url(),
        game_config,
        device: DeviceProfile::Desktop,
        poll_interval: None,
    }
}

pub fn spawn_client(api: FakeAppliance, options: HandlerOptions) -> Client {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let (event_tx, events) = mpsc::channel(64);
    let (handler, cmd) = SessionHandler::new(api, options, event_tx);
    let view = handler.view();
    tokio::spawn(async move {
        let _ = handler.run().await;
    });
    Client { cmd, events, view }
}
