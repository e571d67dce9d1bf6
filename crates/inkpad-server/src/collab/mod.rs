//! Realtime relay.
//!
//! Clients join one room per notebook over a WebSocket and exchange ephemeral
//! edit events with the other members. Nothing relayed here is persisted.

pub mod protocol;
pub mod rooms;
pub mod session;
mod websocket;

pub use protocol::{ClientEvent, ServerEvent};
pub use rooms::{ConnectionId, RoomRegistry, RoomSubscription};
pub use session::{RelayError, RelaySession};
pub use websocket::router;
