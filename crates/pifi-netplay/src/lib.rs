//! pifi arcade client library
//!
//! Client side of the pifi multiplayer game protocol (snake, pong): joining
//! or creating a game on the appliance, one game server socket per local
//! player, routing local controls to the right socket, and turning server
//! events into view state.
//!
//! # Architecture
//!
//! - [`api_client`]: HTTP calls to the appliance (join, status, volume, high scores)
//! - [`socket`]: WebSocket connection to the game server
//! - [`slots`]: Local player slots and session supersede rules
//! - [`input`]: Control to slot routing
//! - [`events`]: Inbound message interpretation and the view model
//! - [`poller`]: Join control state and the status poller
//! - [`volume`]: Volume slider lock
//! - [`session`]: The synchronous session state machine
//! - [`handler`]: Async driver tying it all together
//! - [`config`]: Command line configuration
//! - [`error`]: Error types

pub mod api_client;
pub mod config;
pub mod error;
pub mod events;
pub mod handler;
pub mod input;
pub mod poller;
pub mod session;
pub mod slots;
pub mod socket;
pub mod volume;

// Re-export commonly used types
pub use api_client::{ApplianceApi, HttpApplianceApi, JoinResult, PollSnapshot};
pub use config::ArcadeConfig;
pub use error::{JoinFailure, NetplayError};
pub use events::{GameView, WinnerText};
pub use handler::{ArcadeCommand, ArcadeEvent, HandlerOptions, SessionHandler};
pub use input::{Key, PhysicalControl, TouchZone};
pub use poller::{JoinControl, JoinLabel};
pub use session::SessionManager;
pub use slots::DeviceProfile;
pub use socket::{SessionSocket, SessionTransport, SocketId, SocketState};
