//! Client-side game session state machine.
//!
//! [`SessionManager`] owns the local slots, the input router, the event
//! interpreter, the join attempt and the view. It does no I/O of its own:
//! the async handler feeds it completed joins, socket events, polls and
//! user commands, one at a time.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pifi_netproto::{
    codec::decode_inbound,
    constants::GAME_OVER_CLOSE_REASON,
    messages::{api::EnqueueOrJoinGame, game::GameKind},
};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::{
    api_client::{JoinResult, normalize_initials},
    error::NetplayError,
    events::{CONNECTED_WAITING, GameEventInterpreter, GameView, Reaction, WAITING_FOR_GAME},
    input::{InputRouter, PhysicalControl, Route},
    poller::{JoinAttempt, PollResult},
    slots::{Admission, DeviceProfile, PlayerSlots},
    socket::{SessionTransport, SocketId, SocketState},
    volume::VolumeLock,
};

/// Poll interval assumed for the volume lock when polling is off.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct SessionManager<T> {
    config: EnqueueOrJoinGame,
    slots: PlayerSlots<T>,
    router: InputRouter,
    interpreter: GameEventInterpreter,
    join: JoinAttempt,
    volume: VolumeLock,
    view: GameView,
}

impl<T: SessionTransport> SessionManager<T> {
    pub fn new(
        config: EnqueueOrJoinGame,
        device: DeviceProfile,
        poll_interval: Option<Duration>,
    ) -> Self {
        let slots = PlayerSlots::new(device);
        let view = GameView::new(config.title, slots.capacity());
        Self {
            config,
            slots,
            router: InputRouter::new(),
            interpreter: GameEventInterpreter::new(),
            join: JoinAttempt::default(),
            volume: VolumeLock::new(poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL)),
            view,
        }
    }

    pub fn game(&self) -> GameKind {
        self.config.title
    }

    pub fn config(&self) -> &EnqueueOrJoinGame {
        &self.config
    }

    pub fn view(&self) -> &GameView {
        &self.view
    }

    pub fn slots(&self) -> &PlayerSlots<T> {
        &self.slots
    }

    pub fn router(&self) -> &InputRouter {
        &self.router
    }

    pub fn join_attempt(&self) -> &JoinAttempt {
        &self.join
    }

    /// Start a join. Returns `false` when the control is disabled or an
    /// attempt is already in flight; the click is then a no-op.
    pub fn begin_join(&mut self) -> bool {
        if !self.view.join_control.enabled || !self.join.begin() {
            debug!("Join request ignored");
            return false;
        }
        self.view.join_control.enabled = false;
        self.view.status = Some(WAITING_FOR_GAME.to_string());
        self.view.winner = None;
        self.view.winners_board = None;
        self.view.last_error = None;
        true
    }

    pub fn socket_opened(&mut self) {
        if self.join.in_progress() {
            self.view.status = Some(CONNECTED_WAITING.to_string());
        }
    }

    /// Reconcile both halves of a join.
    ///
    /// On success the socket is bound to a new slot (tearing down a
    /// superseded session first) and inputs are rebound. On failure the
    /// join control is re-enabled and nothing is bound.
    pub fn complete_join(
        &mut self,
        now: Instant,
        outcome: Result<(JoinResult, T), NetplayError>,
    ) -> Result<Admission, NetplayError> {
        self.join.finish(now);

        let admitted = outcome.and_then(|(result, socket)| {
            let admission = self.slots.admit(result.session_id, socket)?;
            Ok((result, admission))
        });

        match admitted {
            Ok((result, admission)) => {
                if admission.superseded.is_some() || admission.first_in_session() {
                    let players = result
                        .player_capacity
                        .unwrap_or_else(|| self.config.declared_players());
                    self.interpreter.reset();
                    self.view
                        .reset_for_session(usize::from(players), result.apple_count.map(u32::from));
                }
                self.router.rebind(self.config.title, self.slots.len());
                self.view.local_players = self.slots.len();
                self.view.join_control.enabled = !admission.capacity_reached;
                info!(
                    session_id = %admission.session_id,
                    slot_index = admission.slot_index,
                    joined_existing = result.did_join_existing_game,
                    "Join complete"
                );
                Ok(admission)
            }
            Err(e) => {
                warn!("Join failed: {}", e);
                self.view.join_control.enabled = self.slots.has_room();
                self.view.status = None;
                self.view.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Handle a text frame. Frames from sockets no longer bound to a slot
    /// are dropped.
    pub fn handle_socket_message(&mut self, socket_id: SocketId, text: &str) -> Option<Reaction> {
        let Some(slot_index) = self.slots.slot_for_socket(socket_id) else {
            debug!(socket = %socket_id, "Dropping frame from unbound socket");
            return None;
        };
        trace!(slot_index, frame = text, "Inbound frame");

        let msg = match decode_inbound(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(slot_index, "Malformed frame ignored: {}", e);
                return None;
            }
        };

        let local = self.slots.local_players();
        let reaction = self.interpreter.apply(msg, &local, &mut self.view)?;
        match reaction {
            Reaction::BindRemoteIndex(index) => {
                self.slots.bind_remote_index(index);
            }
            Reaction::EndSession => {
                self.slots.clear(GAME_OVER_CLOSE_REASON);
                self.router.clear();
                self.view.local_players = 0;
                self.view.join_control.enabled = true;
            }
            Reaction::SuspendInput { score_id } => {
                debug!(score_id, "Input suspended for initials entry");
                self.router.suspend();
            }
        }
        Some(reaction)
    }

    /// A bound socket closed without being asked to. Returns the slot it
    /// belonged to, or `None` for sockets already torn down.
    ///
    /// The slot is kept for the score display but frees its capacity, so
    /// polls cannot disable the control again before the user rejoins.
    pub fn handle_socket_closed(
        &mut self,
        socket_id: SocketId,
        state: SocketState,
        reason: &str,
    ) -> Option<usize> {
        let slot_index = self.slots.mark_dropped(socket_id, reason)?;
        let err = NetplayError::SocketClosedUnexpectedly(format!("{state:?}: {reason}"));
        warn!(slot_index, "{}", err);
        self.view.join_control.enabled = true;
        self.view.status = None;
        self.view.last_error = Some(err.to_string());
        Some(slot_index)
    }

    /// Route a control press and send it. Dropped silently when unbound,
    /// suspended, or the slot's socket is not open.
    pub fn handle_input(&mut self, control: PhysicalControl) -> Option<Route> {
        let route = self.router.route(control)?;
        let text = route.command.encode(unix_seconds());
        if !self.slots.send(route.slot_index, text) {
            trace!(slot_index = route.slot_index, "Input dropped");
        }
        self.view.last_pressed = Some((route.slot_index, route.command.label()));
        Some(route)
    }

    /// Returns whether the poll was allowed to touch the join control.
    pub fn apply_poll(&mut self, poll: &PollResult, now: Instant) -> bool {
        if let Some(vol) = poll.snapshot.volume_pct {
            self.apply_volume(vol, now);
        }

        if !self.join.admits_poll(poll.started_at) {
            debug!("Ignoring poll started before the last join finished");
            return false;
        }
        let has_room = self.slots.has_room();
        self.view.join_control.apply_poll(&poll.snapshot, has_room);
        true
    }

    /// Show a volume read from the appliance unless the user holds the slider.
    pub fn apply_volume(&mut self, vol_pct: u8, now: Instant) {
        if self.volume.accepts(now) {
            self.view.volume_pct = Some(vol_pct.min(100));
        }
    }

    pub fn begin_volume_change(&mut self, vol_pct: u8) {
        self.volume.grab();
        self.view.volume_pct = Some(vol_pct.min(100));
    }

    pub fn release_volume(&mut self, now: Instant) {
        self.volume.mark_releasable(now);
    }

    /// Validate initials for the pending high score. `Ok(None)` when no
    /// entry is pending.
    pub fn take_initials(&mut self, initials: &str) -> Result<Option<(u64, String)>, NetplayError> {
        let Some(score_id) = self.view.initials_entry else {
            return Ok(None);
        };
        let initials = normalize_initials(initials)?;
        Ok(Some((score_id, initials)))
    }

    /// Leave the initials entry. Routing stays suspended until the next join.
    pub fn finish_initials(&mut self) {
        self.view.initials_entry = None;
    }

    pub fn shutdown(&mut self) {
        let dropped = self.slots.clear(GAME_OVER_CLOSE_REASON);
        self.router.clear();
        self.view.local_players = 0;
        debug!(dropped, "Session manager shut down");
    }
}

fn unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use pifi_netproto::messages::game::SessionId;

    use super::*;
    use crate::{
        api_client::PollSnapshot,
        input::Key,
        poller::JoinLabel,
        socket::mock::{MockHandle, MockTransport},
    };

    fn snake_manager(device: DeviceProfile) -> SessionManager<MockTransport> {
        SessionManager::new(
            EnqueueOrJoinGame::snake(5, 2, 15),
            device,
            Some(Duration::from_secs(1)),
        )
    }

    fn join_result(session: u64) -> JoinResult {
        JoinResult {
            session_id: SessionId(session),
            player_capacity: Some(2),
            did_join_existing_game: false,
            apple_count: Some(15),
            target_score: None,
        }
    }

    fn join(
        mgr: &mut SessionManager<MockTransport>,
        session: u64,
        socket: u64,
    ) -> MockHandle {
        assert!(mgr.begin_join());
        let (transport, wire) = MockTransport::open(socket);
        mgr.complete_join(Instant::now(), Ok((join_result(session), transport)))
            .unwrap();
        wire
    }

    fn key(k: Key) -> PhysicalControl {
        PhysicalControl::Key(k)
    }

    #[test]
    fn first_join_binds_all_keys_to_slot_zero() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        let wire = join(&mut mgr, 10, 1);

        assert_eq!(mgr.slots().len(), 1);
        assert!(mgr.view().join_control.enabled);
        assert_eq!(mgr.view().scores, vec![0, 0]);
        assert_eq!(mgr.handle_input(key(Key::ArrowUp)).unwrap().slot_index, 0);
        assert_eq!(mgr.handle_input(key(Key::D)).unwrap().slot_index, 0);
        assert_eq!(
            wire.lock().unwrap().sent,
            vec![r#"{"playlist_video_id":10}"#, "1", "4"]
        );
        assert_eq!(mgr.view().last_pressed, Some((0, "right")));
    }

    #[test]
    fn second_local_player_takes_wasd_and_fills_capacity() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        let wire_a = join(&mut mgr, 10, 1);
        let wire_b = join(&mut mgr, 10, 2);

        assert!(wire_a.lock().unwrap().listener);
        assert!(!mgr.view().join_control.enabled);

        assert_eq!(mgr.handle_input(key(Key::W)).unwrap().slot_index, 1);
        assert_eq!(mgr.handle_input(key(Key::ArrowLeft)).unwrap().slot_index, 0);
        assert_eq!(wire_a.lock().unwrap().sent[1..], ["3".to_string()]);
        assert_eq!(wire_b.lock().unwrap().sent[1..], ["1".to_string()]);
    }

    #[test]
    fn game_over_tears_down_and_reenables() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        let wire_a = join(&mut mgr, 10, 1);
        let wire_b = join(&mut mgr, 10, 2);
        assert!(!mgr.view().join_control.enabled);

        let reaction = mgr.handle_socket_message(
            SocketId(1),
            r#"{"message_type":"game_over","winner":0,"scores":[5,3]}"#,
        );
        assert_eq!(reaction, Some(Reaction::EndSession));
        assert_eq!(
            mgr.view().winner.as_ref().map(|w| w.text.as_str()),
            Some("PLAYER 1 WINS!")
        );
        assert!(mgr.view().join_control.enabled);
        assert!(mgr.slots().is_empty());

        assert_eq!(mgr.handle_input(key(Key::W)), None);
        for wire in [wire_a, wire_b] {
            let wire = wire.lock().unwrap();
            assert_eq!(wire.state, SocketState::ClosedNormal);
            assert_eq!(wire.sent.len(), 1);
        }
    }

    #[test]
    fn new_session_supersedes_and_resets_scores() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        let wire_a = join(&mut mgr, 10, 1);
        mgr.handle_socket_message(
            SocketId(1),
            r#"{"message_type":"score_update","scores":[4,2]}"#,
        );
        assert_eq!(mgr.view().scores, vec![4, 2]);

        let wire_b = join(&mut mgr, 11, 2);
        assert_eq!(wire_a.lock().unwrap().state, SocketState::ClosedNormal);
        assert!(!wire_a.lock().unwrap().listener);
        assert_eq!(mgr.view().scores, vec![0, 0]);
        assert_eq!(mgr.slots().session_id(), Some(SessionId(11)));
        assert_eq!(wire_b.lock().unwrap().sent[0], r#"{"playlist_video_id":11}"#);

        assert_eq!(
            mgr.handle_socket_message(
                SocketId(1),
                r#"{"message_type":"game_over","winner":0,"scores":[9,9]}"#,
            ),
            None
        );
        assert_eq!(mgr.view().winner, None);
        assert_eq!(mgr.slots().len(), 1);
    }

    #[test]
    fn repeated_score_update_is_stable() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        join(&mut mgr, 10, 1);
        let frame = r#"{"message_type":"multi_player_score","scores":[2,7],"apples_left":3}"#;
        mgr.handle_socket_message(SocketId(1), frame);
        let first = mgr.view().clone();
        mgr.handle_socket_message(SocketId(1), frame);
        assert_eq!(mgr.view(), &first);
    }

    #[test]
    fn click_during_join_is_coalesced() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        assert!(mgr.begin_join());
        assert!(!mgr.begin_join());
        assert_eq!(mgr.view().status.as_deref(), Some(WAITING_FOR_GAME));
        mgr.socket_opened();
        assert_eq!(mgr.view().status.as_deref(), Some(CONNECTED_WAITING));
    }

    #[test]
    fn failed_join_reenables_control() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        assert!(mgr.begin_join());
        assert!(!mgr.view().join_control.enabled);

        let err = mgr
            .complete_join(Instant::now(), Err(NetplayError::network("refused")))
            .unwrap_err();
        assert!(matches!(err, NetplayError::JoinRequestFailed { .. }));
        assert!(mgr.view().join_control.enabled);
        assert!(mgr.slots().is_empty());
        assert_eq!(mgr.view().status, None);
    }

    #[test]
    fn stale_poll_cannot_touch_join_control() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        let poll_start = Instant::now();
        join(&mut mgr, 10, 1);
        join(&mut mgr, 10, 2);
        assert!(!mgr.view().join_control.enabled);

        let stale = PollResult {
            started_at: poll_start,
            snapshot: PollSnapshot {
                is_game_joinable: false,
                countdown_seconds: None,
                volume_pct: Some(30),
            },
        };
        assert!(!mgr.apply_poll(&stale, Instant::now()));
        assert!(!mgr.view().join_control.enabled);
        assert_eq!(mgr.view().volume_pct, Some(30));

        let fresh = PollResult {
            started_at: Instant::now() + Duration::from_millis(10),
            snapshot: PollSnapshot {
                is_game_joinable: true,
                countdown_seconds: Some(6),
                volume_pct: None,
            },
        };
        assert!(mgr.apply_poll(&fresh, Instant::now()));
        assert!(!mgr.view().join_control.enabled);
        assert_eq!(
            mgr.view().join_control.label,
            JoinLabel::JoinGame { countdown_s: Some(6) }
        );
    }

    #[test]
    fn fresh_poll_reenables_when_room() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        assert!(mgr.begin_join());
        let during = Instant::now();
        let poll = PollResult {
            started_at: during,
            snapshot: PollSnapshot::default(),
        };
        assert!(!mgr.apply_poll(&poll, Instant::now()));
        assert!(!mgr.view().join_control.enabled);

        mgr.complete_join(Instant::now(), Err(NetplayError::network("down")))
            .unwrap_err();
        let later = PollResult {
            started_at: Instant::now() + Duration::from_millis(5),
            snapshot: PollSnapshot::default(),
        };
        assert!(mgr.apply_poll(&later, Instant::now()));
        assert!(mgr.view().join_control.enabled);
    }

    #[test]
    fn touch_device_fills_after_one_join() {
        let mut mgr = snake_manager(DeviceProfile::Touch);
        join(&mut mgr, 10, 1);
        assert!(!mgr.view().join_control.enabled);
        assert!(!mgr.begin_join());
        let quadrant = PhysicalControl::Quadrant(pifi_netproto::messages::game::SnakeDirection::Left);
        assert_eq!(mgr.handle_input(quadrant).unwrap().slot_index, 0);
    }

    #[test]
    fn unexpected_close_keeps_scores_and_reenables() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        join(&mut mgr, 10, 1);
        join(&mut mgr, 10, 2);
        mgr.handle_socket_message(
            SocketId(2),
            r#"{"message_type":"score_update","scores":[1,1]}"#,
        );

        assert_eq!(
            mgr.handle_socket_closed(SocketId(2), SocketState::ClosedError, "reset"),
            Some(1)
        );
        assert!(mgr.view().join_control.enabled);
        assert_eq!(mgr.view().scores, vec![1, 1]);
        assert_eq!(
            mgr.handle_socket_closed(SocketId(99), SocketState::ClosedError, "x"),
            None
        );
    }

    #[test]
    fn poll_after_dropped_socket_keeps_join_available() {
        let mut mgr = snake_manager(DeviceProfile::Touch);
        let wire = join(&mut mgr, 10, 1);
        assert!(!mgr.view().join_control.enabled);

        wire.lock().unwrap().state = SocketState::ClosedError;
        assert_eq!(
            mgr.handle_socket_closed(SocketId(1), SocketState::ClosedError, "reset"),
            Some(0)
        );
        assert!(mgr.view().join_control.enabled);

        let fresh = PollResult {
            started_at: Instant::now() + Duration::from_millis(5),
            snapshot: PollSnapshot::default(),
        };
        assert!(mgr.apply_poll(&fresh, Instant::now()));
        assert!(mgr.view().join_control.enabled);

        join(&mut mgr, 10, 2);
        assert_eq!(mgr.slots().len(), 1);
        assert_eq!(mgr.slots().slot_for_socket(SocketId(2)), Some(0));
        assert!(!mgr.view().join_control.enabled);
    }

    #[test]
    fn close_event_alone_frees_room() {
        let mut mgr = snake_manager(DeviceProfile::Touch);
        let wire = join(&mut mgr, 10, 1);

        mgr.handle_socket_closed(SocketId(1), SocketState::ClosedError, "reset");
        assert!(!wire.lock().unwrap().listener);

        let fresh = PollResult {
            started_at: Instant::now() + Duration::from_millis(5),
            snapshot: PollSnapshot::default(),
        };
        mgr.apply_poll(&fresh, Instant::now());
        assert!(mgr.view().join_control.enabled);
        assert!(mgr.begin_join());
    }

    #[test]
    fn startup_volume_respects_held_slider() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        mgr.apply_volume(40, Instant::now());
        assert_eq!(mgr.view().volume_pct, Some(40));

        mgr.begin_volume_change(90);
        mgr.apply_volume(10, Instant::now());
        assert_eq!(mgr.view().volume_pct, Some(90));
    }

    #[test]
    fn high_score_suspends_until_next_join() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        join(&mut mgr, 10, 1);
        mgr.handle_socket_message(SocketId(1), r#"{"message_type":"high_score","score_id":77}"#);
        assert_eq!(mgr.handle_input(key(Key::ArrowUp)), None);

        assert!(matches!(
            mgr.take_initials("zz"),
            Err(NetplayError::InvalidInitials(_))
        ));
        assert_eq!(mgr.take_initials("abc").unwrap(), Some((77, "ABC".to_string())));
        mgr.finish_initials();
        assert_eq!(mgr.take_initials("abc").unwrap(), None);
        assert_eq!(mgr.handle_input(key(Key::ArrowUp)), None);

        join(&mut mgr, 10, 2);
        assert!(mgr.handle_input(key(Key::ArrowUp)).is_some());
    }

    #[test]
    fn player_index_binds_latest_slot() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        join(&mut mgr, 10, 1);
        mgr.handle_socket_message(
            SocketId(1),
            r#"{"message_type":"player_index_message","player_index":1}"#,
        );
        assert_eq!(mgr.view().player_indicator.as_deref(), Some("You are Player 2"));
        assert_eq!(mgr.slots().local_players().remote_indices, vec![1]);

        mgr.handle_socket_message(SocketId(1), r#"{"message_type":"game_over","winner":1}"#);
        assert_eq!(
            mgr.view().winner.as_ref().map(|w| w.text.as_str()),
            Some("YOU WIN!")
        );
    }

    #[test]
    fn held_volume_ignores_polls() {
        let mut mgr = snake_manager(DeviceProfile::Desktop);
        mgr.begin_volume_change(70);
        let poll = PollResult {
            started_at: Instant::now(),
            snapshot: PollSnapshot {
                volume_pct: Some(20),
                ..Default::default()
            },
        };
        mgr.apply_poll(&poll, Instant::now());
        assert_eq!(mgr.view().volume_pct, Some(70));

        let released = Instant::now();
        mgr.release_volume(released);
        mgr.apply_poll(&poll, released + Duration::from_secs(2));
        assert_eq!(mgr.view().volume_pct, Some(20));
    }
}
