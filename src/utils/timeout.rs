//! Timing defaults and async timeout wrappers.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// How long the receive task waits for the next frame header
pub const RECV_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Delay between attempts of a retried application send
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Pause between the `Close` frame and closing the socket
pub const CLOSE_GRACE: Duration = Duration::from_millis(25);

/// Extra time `close` allows the receive task to finish, on top of one poll
/// interval and the close grace period
pub const RECEIVER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound on establishing the socket connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `fut`, failing with `ProtocolError::Timeout` if it does not finish in `duration`.
pub async fn with_timeout<F, T>(duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

/// Like [`with_timeout`] but reports an elapsed timer as `Ok(None)`.
pub async fn poll_with_timeout<F, T>(duration: Duration, fut: F) -> Result<Option<T>>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result.map(Some),
        Err(_) => Ok(None),
    }
}
