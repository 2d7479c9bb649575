//! Session handshake.
//!
//! The client opens every session with a `Handshake` frame carrying the
//! protocol version and its application ID:
//!
//! ```text
//! {"client_id":"<id>","v":1}
//! ```
//!
//! The peer answers with a `DISPATCH`/`READY` frame once it accepts, or with
//! `Close` if it does not.

use tracing::debug;

use crate::config::{ClientConfig, PROTOCOL_VERSION};
use crate::core::packet::{Opcode, Packet};
use crate::core::value::{Map, Value};
use crate::error::{ProtocolError, Result};

/// Handshake body sent as the first frame of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub version: i32,
    pub client_id: String,
}

impl HandshakeRequest {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            client_id: client_id.into(),
        }
    }

    /// Handshake for the session described by `config`
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            version: config.protocol_version,
            client_id: config.client_id.clone(),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        body.insert("v".to_string(), Value::from(self.version));
        body.insert("client_id".to_string(), Value::from(self.client_id.as_str()));
        Value::Object(body)
    }

    /// Read a handshake body back, as a peer would.
    ///
    /// # Errors
    /// `MissingKey`/`TypeMismatch` if a field is absent or has the wrong type,
    /// `HandshakeError` if the client ID is empty.
    pub fn from_value(body: &Value) -> Result<Self> {
        let version = *body.at("v")?.get_as::<i32>()?;
        let client_id = body.at("client_id")?.get_as::<String>()?.clone();
        if client_id.is_empty() {
            return Err(ProtocolError::HandshakeError("empty client_id".to_string()));
        }
        Ok(Self { version, client_id })
    }

    pub fn to_packet(&self) -> Packet {
        debug!(version = self.version, client_id = %self.client_id, "Building handshake");
        Packet::new(Opcode::Handshake, self.to_value())
    }
}
