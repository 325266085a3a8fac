//! WebSocket connection to the game server, one per local player slot.
//!
//! A [`SessionSocket`] owns a writer task (outbound text and close frames)
//! and a reader task (inbound text frames, close detection). The reader is
//! the socket's only listener; closing the socket aborts it, so nothing read
//! after a teardown can reach the session.

use std::fmt;
use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use futures_util::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tracing::{debug, info, trace, warn};

use crate::error::NetplayError;

/// Identifies one socket for the lifetime of the client.
///
/// Events carry it so the session can tell which slot (if any) they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(pub u64);

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket#{}", self.0)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Connecting = 0,
    Open = 1,
    ClosedNormal = 2,
    ClosedError = 3,
}

impl SocketState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::ClosedNormal,
            _ => Self::ClosedError,
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Self::ClosedNormal | Self::ClosedError)
    }
}

/// Events forwarded from a socket's reader task to the session handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEvent {
    pub socket_id: SocketId,
    pub kind: SocketEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEventKind {
    /// A text frame from the game server.
    Message(String),
    /// The connection ended without this client asking for it.
    Closed { state: SocketState, reason: String },
}

/// What the slot manager needs from a bound connection.
pub trait SessionTransport: Send + 'static {
    fn id(&self) -> SocketId;

    fn state(&self) -> SocketState;

    /// Queue a text frame. Returns `false` (and drops the frame) unless the
    /// socket is open. Never blocks and never queues for later delivery.
    fn send_text(&self, text: String) -> bool;

    /// Close with a normal status and detach the listener.
    fn close(&mut self, reason: &str);

    /// Whether inbound frames can still be delivered from this socket.
    fn has_listener(&self) -> bool;
}

enum SocketCommand {
    Text(String),
    Close(String),
}

pub struct SessionSocket {
    id: SocketId,
    state: Arc<AtomicU8>,
    cmd_tx: mpsc::Sender<SocketCommand>,
    reader: Option<JoinHandle<()>>,
}

/// Open a socket to `url`.
///
/// Resolves only once the connection is open; an error before that point is
/// reported as [`NetplayError::SocketOpenFailed`].
pub async fn connect(
    url: &str,
    id: SocketId,
    event_tx: mpsc::Sender<SocketEvent>,
) -> Result<SessionSocket, NetplayError> {
    debug!(%id, %url, "Opening game socket");
    let state = Arc::new(AtomicU8::new(SocketState::Connecting as u8));

    let (ws, _response) = connect_async(url).await.map_err(|e| {
        state.store(SocketState::ClosedError as u8, Ordering::Release);
        NetplayError::SocketOpenFailed(format!("{url}: {e}"))
    })?;
    state.store(SocketState::Open as u8, Ordering::Release);
    info!(%id, "Game socket open");

    let (write, read) = ws.split();
    let (cmd_tx, cmd_rx) = mpsc::channel::<SocketCommand>(256);

    let writer_state = state.clone();
    tokio::spawn(async move {
        writer_loop(write, cmd_rx, id, writer_state).await;
    });

    let reader_state = state.clone();
    let reader = tokio::spawn(async move {
        reader_loop(read, id, reader_state, event_tx).await;
    });

    Ok(SessionSocket {
        id,
        state,
        cmd_tx,
        reader: Some(reader),
    })
}

impl SessionTransport for SessionSocket {
    fn id(&self) -> SocketId {
        self.id
    }

    fn state(&self) -> SocketState {
        SocketState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn send_text(&self, text: String) -> bool {
        if self.state() != SocketState::Open {
            trace!(id = %self.id, "Dropping frame, socket not open");
            return false;
        }
        match self.cmd_tx.try_send(SocketCommand::Text(text)) {
            Ok(()) => true,
            Err(e) => {
                debug!(id = %self.id, "Dropping frame: {}", e);
                false
            }
        }
    }

    fn close(&mut self, reason: &str) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if self.state().is_closed() {
            return;
        }
        self.state
            .store(SocketState::ClosedNormal as u8, Ordering::Release);
        let _ = self.cmd_tx.try_send(SocketCommand::Close(reason.to_string()));
        debug!(id = %self.id, reason, "Closed game socket");
    }

    fn has_listener(&self) -> bool {
        self.reader.as_ref().is_some_and(|r| !r.is_finished())
    }
}

impl Drop for SessionSocket {
    fn drop(&mut self) {
        self.close("client dropped socket");
    }
}

impl fmt::Debug for SessionSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSocket")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

async fn writer_loop<S>(
    mut sink: S,
    mut cmd_rx: mpsc::Receiver<SocketCommand>,
    id: SocketId,
    state: Arc<AtomicU8>,
) where
    S: futures_util::Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            SocketCommand::Text(text) => {
                trace!(%id, frame = %text, "Sending frame");
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!(%id, "Write error: {}", e);
                    state.store(SocketState::ClosedError as u8, Ordering::Release);
                    break;
                }
            }
            SocketCommand::Close(reason) => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: reason.into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!(%id, "Close frame not delivered: {}", e);
                }
                break;
            }
        }
    }

    let _ = sink.close().await;
}

async fn reader_loop<S, E>(
    mut stream: S,
    id: SocketId,
    state: Arc<AtomicU8>,
    event_tx: mpsc::Sender<SocketEvent>,
) where
    S: futures_util::Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let (final_state, reason) = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                trace!(%id, frame = %text.as_str(), "Received frame");
                let event = SocketEvent {
                    socket_id: id,
                    kind: SocketEventKind::Message(text.as_str().to_owned()),
                };
                if event_tx.send(event).await.is_err() {
                    debug!(%id, "Session gone, stopping reader");
                    return;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| f.reason.as_str().to_owned())
                    .unwrap_or_default();
                info!(%id, %reason, "Server closed game socket");
                break (SocketState::ClosedNormal, reason);
            }
            Some(Ok(other)) => {
                trace!(%id, "Ignoring non-text frame: {:?}", other);
            }
            Some(Err(e)) => {
                warn!(%id, "Read error: {}", e);
                break (SocketState::ClosedError, e.to_string());
            }
            None => {
                break (
                    SocketState::ClosedError,
                    "connection dropped".to_string(),
                );
            }
        }
    };

    state.store(final_state as u8, Ordering::Release);
    let _ = event_tx
        .send(SocketEvent {
            socket_id: id,
            kind: SocketEventKind::Closed {
                state: final_state,
                reason,
            },
        })
        .await;
}
