//! # Core Protocol Components
//!
//! The document model, its text codec, and the binary frame format.
//!
//! ## Components
//! - **Value**: dynamic tagged union used for every message body
//! - **Parser / Serializer**: text codec for `Value`
//! - **Packet**: opcode + body, with byte-level encode/decode
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [Opcode(4)] [Length(4)] [Body(N), UTF-8 text]
//! ```
//! Integers use the native byte order; both peers live on the same host.
//!
//! ## Limits
//! - Maximum body size: 16MB, checked before allocation
//! - Maximum document nesting: 128 levels

pub mod codec;
pub mod packet;
pub mod parser;
pub mod serializer;
pub mod value;

pub use packet::{Opcode, Packet};
pub use value::{Map, Value};
