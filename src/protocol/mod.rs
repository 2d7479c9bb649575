//! # Protocol Messages
//!
//! Message bodies exchanged with the peer and the routing of inbound events.
//!
//! ## Components
//! - **Handshake**: the first frame of every session
//! - **Command**: command/event vocabulary and request bodies
//! - **Dispatcher**: application handlers keyed by event or command name
//!
//! ## Authorization
//! Only `Handshake` and `Close` frames may be sent until the peer has sent a
//! dispatch-class message (`"cmd": "DISPATCH"`), normally the `READY` event.

pub mod command;
pub mod dispatcher;
pub mod handshake;

pub use command::{Command, CommandRequest, Event};
pub use dispatcher::Dispatcher;
pub use handshake::HandshakeRequest;
