//! Transport layer for the live session channel.
//!
//! Provides:
//! - Wire protocol (JSON frames `{type, data, session?}`)
//! - `Connection` - One WebSocket per session with an explicit state machine
//! - `Router` - Inbound demultiplexing and outbound command helpers
//! - `SessionChannel` - Connection + router + dispatcher, with opt-in reconnect

pub mod channel;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod reconnect;
pub mod router;

#[cfg(test)]
mod test_support;

pub use channel::{SessionChannel, SessionChannelBuilder};
pub use connection::{Connection, ConnectionState, TransportEvent};
pub use error::TransportError;
pub use protocol::{Frame, InboundMessage, OutboundMessage, ServerEvent};
pub use reconnect::ReconnectPolicy;
pub use router::{HandlerError, Router, SubscriptionId};
