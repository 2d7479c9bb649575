//! # Transport Layer
//!
//! Byte-stream channels between the client and the peer process.
//!
//! ## Components
//! - **Transport**: async contract the protocol engine is written against
//! - **Local**: Unix domain socket (Windows: named pipe) implementation
//! - **Endpoint**: discovery of the peer's socket or pipe path
//!
//! The engine reads exact-size chunks (header, then body) rather than a
//! decoded stream so it can bound the wait for the *start* of a frame while
//! reading the rest of it without a deadline.

pub mod endpoint;
pub mod local;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

pub use local::LocalTransport;

/// Exact-size byte channel used by the IPC client.
///
/// Methods take `&self`: the client's caller and its receive task share one
/// transport, so implementations serialize writers and readers internally.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Establish the channel.
    async fn connect(&self) -> Result<()>;

    /// Close the channel. Returns `false` if it was already closed.
    async fn close(&self) -> bool;

    /// Write all of `data` or fail.
    async fn send(&self, data: &[u8]) -> Result<()>;

    /// Read exactly `len` bytes or fail.
    async fn recv(&self, len: usize) -> Result<Vec<u8>>;

    /// Read exactly `len` bytes, giving up with `Ok(None)` if they have not
    /// all arrived within `timeout`. Bytes that did arrive are kept for the
    /// next read.
    async fn recv_with_timeout(&self, len: usize, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// Synchronously wake any pending read so it fails promptly. Used from
    /// `Drop`, where nothing can be awaited.
    fn cancel(&self) {}
}
