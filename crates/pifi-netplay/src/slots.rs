//! Local player slots bound into the current game session.

use pifi_netproto::{
    codec::encode_handshake,
    constants::NEW_GAME_CLOSE_REASON,
    messages::game::SessionId,
};
use tracing::{debug, info, warn};

use crate::{
    error::NetplayError,
    socket::{SessionTransport, SocketId, SocketState},
};

/// Kind of device the client runs on; decides how many people can share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceProfile {
    #[default]
    Desktop,
    /// Touch-primary device (phone, tablet). Only one local player fits.
    Touch,
}

impl DeviceProfile {
    pub fn capacity(self) -> usize {
        match self {
            Self::Desktop => 2,
            Self::Touch => 1,
        }
    }
}

/// One local participant and the socket it exclusively owns.
#[derive(Debug)]
pub struct LocalPlayerSlot<T> {
    pub slot_index: usize,
    /// Assigned by the server through `player_index_message`.
    pub remote_player_index: Option<u8>,
    socket: T,
}

impl<T: SessionTransport> LocalPlayerSlot<T> {
    pub fn socket(&self) -> &T {
        &self.socket
    }

    /// Open and still delivering frames.
    pub fn is_live(&self) -> bool {
        self.socket.state() == SocketState::Open && self.socket.has_listener()
    }
}

/// Outcome of admitting a freshly joined socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub slot_index: usize,
    pub session_id: SessionId,
    /// Previous session whose slots were torn down to make room.
    pub superseded: Option<SessionId>,
    pub capacity_reached: bool,
}

impl Admission {
    /// First local slot of a session, so per-game state starts fresh.
    pub fn first_in_session(&self) -> bool {
        self.slot_index == 0
    }
}

/// Summary of the bound slots handed to the event interpreter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalPlayers {
    pub count: usize,
    /// Remote indices in slot order, for slots the server has already named.
    pub remote_indices: Vec<u8>,
}

/// Ordered local slots for one client, capped by device capacity.
#[derive(Debug)]
pub struct PlayerSlots<T> {
    capacity: usize,
    session_id: Option<SessionId>,
    slots: Vec<LocalPlayerSlot<T>>,
}

impl<T: SessionTransport> PlayerSlots<T> {
    pub fn new(device: DeviceProfile) -> Self {
        Self {
            capacity: device.capacity(),
            session_id: None,
            slots: Vec::with_capacity(device.capacity()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Some bound socket has died; the next join rebuilds every slot.
    pub fn needs_rebuild(&self) -> bool {
        self.slots.iter().any(|s| !s.is_live())
    }

    /// Whether a join could be admitted right now.
    pub fn has_room(&self) -> bool {
        !self.is_full() || self.needs_rebuild()
    }

    /// Session of the most recent successful join.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocalPlayerSlot<T>> {
        self.slots.iter()
    }

    /// Bind `socket` to a new slot in `session_id`.
    ///
    /// A socket that is no longer open is refused before anything else is
    /// touched. A different session then tears down every existing slot, as
    /// does a same-session join while one of the bound sockets is dead (the
    /// user is reconnecting by hand). Only then is the handshake sent and
    /// the slot registered.
    pub fn admit(&mut self, session_id: SessionId, mut socket: T) -> Result<Admission, NetplayError> {
        if socket.state() != SocketState::Open {
            let state = socket.state();
            socket.close(NEW_GAME_CLOSE_REASON);
            return Err(NetplayError::SocketClosedUnexpectedly(format!(
                "{} was {state:?} when its join completed",
                socket.id()
            )));
        }

        let mut superseded = None;
        match self.session_id {
            Some(current) if current != session_id => {
                info!(previous = %current, next = %session_id, "Superseding game session");
                self.clear(NEW_GAME_CLOSE_REASON);
                self.session_id = Some(session_id);
                superseded = Some(current);
            }
            Some(_) if self.needs_rebuild() => {
                info!(%session_id, "Rejoining after a dropped socket, rebuilding slots");
                self.clear(NEW_GAME_CLOSE_REASON);
            }
            _ => {}
        }

        if self.is_full() {
            warn!(capacity = self.capacity, "No free local player slot");
            socket.close(NEW_GAME_CLOSE_REASON);
            return Err(NetplayError::SlotCapacityReached(self.capacity));
        }

        let handshake = encode_handshake(session_id)?;
        if !socket.send_text(handshake) {
            socket.close(NEW_GAME_CLOSE_REASON);
            return Err(NetplayError::SocketClosedUnexpectedly(format!(
                "{} closed before handshake",
                socket.id()
            )));
        }

        let slot_index = self.slots.len();
        self.session_id = Some(session_id);
        self.slots.push(LocalPlayerSlot {
            slot_index,
            remote_player_index: None,
            socket,
        });
        info!(%session_id, slot_index, "Local player joined");

        Ok(Admission {
            slot_index,
            session_id,
            superseded,
            capacity_reached: self.is_full(),
        })
    }

    /// Close every bound socket and drop all slots. Returns how many were dropped.
    ///
    /// The session id is kept so a later join can still tell whether it
    /// landed in the same game.
    pub fn clear(&mut self, reason: &str) -> usize {
        let dropped = self.slots.len();
        for mut slot in self.slots.drain(..) {
            slot.socket.close(reason);
            debug!(slot_index = slot.slot_index, socket = %slot.socket.id(), "Slot released");
        }
        dropped
    }

    /// Detach a socket that closed on its own. The slot stays until the next
    /// join rebuilds, but no longer counts against capacity.
    pub fn mark_dropped(&mut self, socket_id: SocketId, reason: &str) -> Option<usize> {
        let slot = self.slots.iter_mut().find(|s| s.socket.id() == socket_id)?;
        slot.socket.close(reason);
        Some(slot.slot_index)
    }

    pub fn slot_for_socket(&self, socket_id: SocketId) -> Option<usize> {
        self.slots
            .iter()
            .find(|s| s.socket.id() == socket_id)
            .map(|s| s.slot_index)
    }

    /// Send a frame on a slot's socket; dropped when the slot or its socket is gone.
    pub fn send(&self, slot_index: usize, text: String) -> bool {
        self.slots
            .get(slot_index)
            .is_some_and(|slot| slot.socket.send_text(text))
    }

    /// Record the server-assigned index on the most recently joined slot.
    pub fn bind_remote_index(&mut self, remote_index: u8) -> Option<usize> {
        let slot = self.slots.last_mut()?;
        slot.remote_player_index = Some(remote_index);
        debug!(slot_index = slot.slot_index, remote_index, "Remote player index bound");
        Some(slot.slot_index)
    }

    pub fn local_players(&self) -> LocalPlayers {
        LocalPlayers {
            count: self.slots.len(),
            remote_indices: self
                .slots
                .iter()
                .filter_map(|s| s.remote_player_index)
                .collect(),
        }
    }
}
