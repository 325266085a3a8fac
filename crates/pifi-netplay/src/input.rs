//! Routing of physical controls to local player slots.
//!
//! Which slot a control drives depends on the game and on how many local
//! players have joined. The whole table is rebuilt whenever that count
//! changes, so a control is always routed to exactly one slot.

use std::collections::HashMap;

use pifi_netproto::{
    codec::{encode_paddle_direction, encode_snake_direction},
    messages::game::{GameKind, PaddleDirection, SnakeDirection},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    W,
    A,
    S,
    D,
}

impl Key {
    pub const ARROWS: [Key; 4] = [Key::ArrowUp, Key::ArrowDown, Key::ArrowLeft, Key::ArrowRight];
    pub const WASD: [Key; 4] = [Key::W, Key::S, Key::A, Key::D];
}

/// On-screen pong button column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchZone {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalControl {
    Key(Key),
    /// Snake touch pad quadrant.
    Quadrant(SnakeDirection),
    /// Pong on-screen up/down button.
    ZoneButton {
        zone: TouchZone,
        direction: PaddleDirection,
    },
}

/// A direction for one player, ready to encode onto the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Snake(SnakeDirection),
    Paddle(PaddleDirection),
}

impl Command {
    /// Wire token. Only paddle moves carry the timestamp.
    pub fn encode(self, unix_seconds: f64) -> String {
        match self {
            Self::Snake(d) => encode_snake_direction(d),
            Self::Paddle(d) => encode_paddle_direction(d, unix_seconds),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Snake(d) => d.into(),
            Self::Paddle(d) => d.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub slot_index: usize,
    pub command: Command,
}

fn command_for(kind: GameKind, control: PhysicalControl) -> Option<Command> {
    use PhysicalControl as C;
    match kind {
        GameKind::Snake => {
            let dir = match control {
                C::Key(Key::ArrowUp | Key::W) => SnakeDirection::Up,
                C::Key(Key::ArrowDown | Key::S) => SnakeDirection::Down,
                C::Key(Key::ArrowLeft | Key::A) => SnakeDirection::Left,
                C::Key(Key::ArrowRight | Key::D) => SnakeDirection::Right,
                C::Quadrant(d) => d,
                C::ZoneButton { .. } => return None,
            };
            Some(Command::Snake(dir))
        }
        GameKind::Pong => {
            let dir = match control {
                C::Key(Key::ArrowUp | Key::W) => PaddleDirection::Up,
                C::Key(Key::ArrowDown | Key::S) => PaddleDirection::Down,
                C::ZoneButton { direction, .. } => direction,
                _ => return None,
            };
            Some(Command::Paddle(dir))
        }
    }
}

/// Physical control to slot assignment for the current local player count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBindingTable {
    kind: GameKind,
    routes: HashMap<PhysicalControl, usize>,
}

impl InputBindingTable {
    /// Bindings for `slot_count` joined local players.
    ///
    /// One player gets every control. With two, snake puts the arrows on slot
    /// 0 and WASD on slot 1; pong puts W/S on slot 0, Up/Down on slot 1, and
    /// splits the touch zones left/right.
    pub fn for_players(kind: GameKind, slot_count: usize) -> Self {
        let mut routes = HashMap::new();
        if slot_count == 0 {
            return Self { kind, routes };
        }
        let shared = slot_count == 1;
        let second = if shared { 0 } else { 1 };

        match kind {
            GameKind::Snake => {
                for key in Key::ARROWS {
                    routes.insert(PhysicalControl::Key(key), 0);
                }
                for key in Key::WASD {
                    routes.insert(PhysicalControl::Key(key), second);
                }
                for dir in [
                    SnakeDirection::Up,
                    SnakeDirection::Down,
                    SnakeDirection::Left,
                    SnakeDirection::Right,
                ] {
                    routes.insert(PhysicalControl::Quadrant(dir), 0);
                }
            }
            GameKind::Pong => {
                for key in [Key::W, Key::S] {
                    routes.insert(PhysicalControl::Key(key), 0);
                }
                for key in [Key::ArrowUp, Key::ArrowDown] {
                    routes.insert(PhysicalControl::Key(key), second);
                }
                for direction in [PaddleDirection::Up, PaddleDirection::Down] {
                    routes.insert(
                        PhysicalControl::ZoneButton {
                            zone: TouchZone::Left,
                            direction,
                        },
                        0,
                    );
                    routes.insert(
                        PhysicalControl::ZoneButton {
                            zone: TouchZone::Right,
                            direction,
                        },
                        second,
                    );
                }
            }
        }
        Self { kind, routes }
    }

    pub fn lookup(&self, control: PhysicalControl) -> Option<Route> {
        let slot_index = *self.routes.get(&control)?;
        let command = command_for(self.kind, control)?;
        Some(Route {
            slot_index,
            command,
        })
    }
}

#[derive(Debug, Default)]
pub struct InputRouter {
    table: Option<InputBindingTable>,
    suspended: bool,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all bindings; also lifts a suspension.
    pub fn rebind(&mut self, kind: GameKind, slot_count: usize) {
        self.table = Some(InputBindingTable::for_players(kind, slot_count));
        self.suspended = false;
    }

    /// Stop routing until the next [`rebind`](Self::rebind).
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn clear(&mut self) {
        self.table = None;
        self.suspended = false;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn table(&self) -> Option<&InputBindingTable> {
        self.table.as_ref()
    }

    pub fn route(&self, control: PhysicalControl) -> Option<Route> {
        if self.suspended {
            return None;
        }
        self.table.as_ref()?.lookup(control)
    }
}
