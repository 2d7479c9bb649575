//! # Error Types
//!
//! Error handling for the IPC client, the value model and its codec.
//!
//! This module defines every error variant that can occur, from low-level
//! socket failures up to type mismatches on a decoded document.
//!
//! ## Error Categories
//! - **Malformed input**: text that is not a valid document (never retried)
//! - **Type mismatch**: typed access against the wrong variant (a programming error)
//! - **Transport failures**: I/O errors, closed or missing connections
//! - **Authorization**: application sends attempted before the peer is ready
//! - **Framing**: invalid headers, unknown opcodes, oversized bodies
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! ## Example Usage
//! ```rust
//! use discord_ipc::error::{ProtocolError, Result};
//! use discord_ipc::core::parser::parse;
//!
//! fn client_id(text: &str) -> Result<String> {
//!     let doc = parse(text)?;
//!     Ok(doc.at("client_id")?.get_as::<String>()?.clone())
//! }
//!
//! assert_eq!(client_id(r#"{"client_id":"42"}"#).unwrap(), "42");
//! assert!(matches!(
//!     client_id(r#"{"client_id":42}"#),
//!     Err(ProtocolError::TypeMismatch { .. })
//! ));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Dispatcher-related error messages
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on dispatcher";

    /// Parser errors
    pub const ERR_EMPTY_INPUT: &str = "empty input";
    pub const ERR_UNEXPECTED_CHAR: &str = "unexpected character";
    pub const ERR_UNEXPECTED_END: &str = "unexpected end of input";
    pub const ERR_UNTERMINATED_STRING: &str = "unterminated string";
    pub const ERR_INVALID_ESCAPE: &str = "invalid escape sequence";
    pub const ERR_INVALID_UNICODE: &str = "invalid unicode escape";
    pub const ERR_CONTROL_CHAR: &str = "unescaped control character in string";
    pub const ERR_INVALID_LITERAL: &str = "invalid literal";
    pub const ERR_INVALID_NUMBER: &str = "invalid number";
    pub const ERR_INTEGER_RANGE: &str = "integer out of range";
    pub const ERR_EXPECTED_KEY: &str = "expected string key";
    pub const ERR_EXPECTED_COLON: &str = "expected ':' after key";
    pub const ERR_EXPECTED_COMMA: &str = "expected ',' or closing delimiter";
    pub const ERR_TRAILING_COMMA: &str = "trailing comma";
    pub const ERR_TRAILING_CHARACTERS: &str = "trailing characters after value";
    pub const ERR_TOO_DEEP: &str = "maximum nesting depth exceeded";

    /// Handshake errors
    pub const ERR_HANDSHAKE_SEND: &str = "Failed to send handshake frame";
}

// ProtocolError is the primary error type for all client operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed input at byte {position}: {reason}")]
    MalformedInput {
        position: usize,
        reason: &'static str,
    },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Missing key: {0}")]
    MissingKey(String),

    #[error("Invalid frame header")]
    InvalidHeader,

    #[error("Unknown opcode: {0}")]
    UnknownOpcode(i32),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Frame body is not valid UTF-8")]
    InvalidUtf8,

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Client is already connected")]
    AlreadyConnected,

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Not authorized to send application frames yet")]
    Unauthorized,

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("No IPC endpoint found")]
    EndpointNotFound,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether the byte stream is still aligned on a frame boundary after
    /// this error was raised while receiving.
    ///
    /// A body that fails to decode was read in full, so the next frame can
    /// still be read. Anything that interrupted the read itself, or a length
    /// header that could not be honoured, leaves the stream misaligned.
    pub fn is_boundary_safe(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedInput { .. }
                | ProtocolError::InvalidUtf8
                | ProtocolError::UnknownOpcode(_)
        )
    }

    /// Whether a failed application send may succeed if attempted again.
    ///
    /// Transport hiccups and a session that is not authorized yet can clear
    /// up; an encoding failure or a closed connection cannot.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_)
                | ProtocolError::TransportError(_)
                | ProtocolError::Timeout
                | ProtocolError::Unauthorized
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
