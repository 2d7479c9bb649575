//! # discord-ipc
//!
//! Local IPC client for the Discord rich presence protocol.
//!
//! The crate talks to the desktop client over its local socket (a named pipe
//! on Windows) using length-prefixed frames whose bodies are JSON documents.
//! It ships its own small document model rather than a general JSON library:
//! a closed [`Value`] type, a hardened parser and a compact serializer.
//!
//! ## Layout
//! - [`core`]: `Value`, parser, serializer, `Packet` and the frame codec
//! - [`transport`]: the `Transport` contract, the local socket transport and
//!   endpoint discovery
//! - [`protocol`]: handshake, command/event bodies and the event dispatcher
//! - [`client`]: the session engine ([`IpcClient`])
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging,
//!   timing, nonces and metrics
//!
//! ## Quick start
//! ```rust,no_run
//! use discord_ipc::{IpcClient, Value};
//!
//! # async fn run() -> discord_ipc::Result<()> {
//! let client = IpcClient::new("123456789012345678");
//! client.connect().await?;
//!
//! let mut activity = Value::object();
//! activity.insert("details", "Editing a file")?;
//! client.set_activity(activity).await?;
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use client::{ConnectionState, IpcClient};
pub use config::IpcConfig;
pub use crate::core::{Map, Opcode, Packet, Value};
pub use error::{ProtocolError, Result};
pub use transport::{LocalTransport, Transport};
