//! Local socket transport.
//!
//! On Unix this connects to a Unix domain socket; on Windows to a named pipe.
//! Any pre-connected async stream can be wrapped with
//! [`LocalTransport::from_stream`], which is how in-process peers are wired up.
//!
//! Reads and writes are serialized by separate locks so the receive task can
//! wait on the socket while the caller sends. Received bytes are staged in a
//! buffer owned by the read lock, so a read abandoned by a timeout keeps
//! whatever had arrived.

use async_trait::async_trait;
use bytes::BytesMut;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::config::TransportConfig;
use crate::error::{ProtocolError, Result};
use crate::transport::{endpoint, Transport};
use crate::utils::timeout::{poll_with_timeout, with_timeout, CONNECT_TIMEOUT};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct ReadState {
    stream: Option<BoxedReader>,
    pending: BytesMut,
}

/// Transport over the local IPC socket or pipe.
pub struct LocalTransport {
    endpoint: Option<PathBuf>,
    connect_timeout: Duration,
    reader: Mutex<ReadState>,
    writer: Mutex<Option<BoxedWriter>>,
    open: AtomicBool,
    closed: AtomicBool,
    cancel: CancellationToken,
}

impl LocalTransport {
    /// Transport that discovers the endpoint on `connect`, unless `config`
    /// names one explicitly.
    pub fn new(config: &TransportConfig) -> Self {
        Self::build(config.endpoint.clone(), config.connect_timeout, None)
    }

    /// Transport bound to an explicit socket or pipe path.
    pub fn with_endpoint(path: impl Into<PathBuf>) -> Self {
        Self::build(Some(path.into()), CONNECT_TIMEOUT, None)
    }

    /// Wrap an already-connected stream. `connect` then just marks it open.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        Self::build(None, CONNECT_TIMEOUT, Some((Box::new(read), Box::new(write))))
    }

    fn build(
        endpoint: Option<PathBuf>,
        connect_timeout: Duration,
        halves: Option<(BoxedReader, BoxedWriter)>,
    ) -> Self {
        let (reader, writer) = match halves {
            Some((r, w)) => (Some(r), Some(w)),
            None => (None, None),
        };
        Self {
            endpoint,
            connect_timeout,
            reader: Mutex::new(ReadState {
                stream: reader,
                pending: BytesMut::new(),
            }),
            writer: Mutex::new(writer),
            open: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Configured endpoint, if any.
    pub fn endpoint(&self) -> Option<&Path> {
        self.endpoint.as_deref()
    }

    /// Whether the transport is currently open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn dial(&self) -> Result<(BoxedReader, BoxedWriter)> {
        let path = match &self.endpoint {
            Some(path) => path.clone(),
            None => endpoint::find_ipc_endpoint()?,
        };
        debug!(endpoint = %path.display(), "Dialing IPC endpoint");
        with_timeout(self.connect_timeout, open_stream(&path)).await
    }

    async fn fill(&self, len: usize) -> Result<Vec<u8>> {
        let mut state = self.reader.lock().await;
        let ReadState { stream, pending } = &mut *state;
        let stream = stream.as_mut().ok_or(ProtocolError::NotConnected)?;

        while pending.len() < len {
            pending.reserve(len - pending.len());
            if stream.read_buf(pending).await? == 0 {
                return Err(ProtocolError::ConnectionClosed);
            }
        }
        Ok(pending.split_to(len).to_vec())
    }
}

fn open_failed(path: &Path, err: &std::io::Error) -> ProtocolError {
    ProtocolError::TransportError(format!("cannot open {}: {err}", path.display()))
}

#[cfg(unix)]
async fn open_stream(path: &Path) -> Result<(BoxedReader, BoxedWriter)> {
    let stream = tokio::net::UnixStream::connect(path)
        .await
        .map_err(|e| open_failed(path, &e))?;
    let (read, write) = stream.into_split();
    Ok((Box::new(read), Box::new(write)))
}

#[cfg(windows)]
async fn open_stream(path: &Path) -> Result<(BoxedReader, BoxedWriter)> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let client = ClientOptions::new()
        .open(path)
        .map_err(|e| open_failed(path, &e))?;
    let (read, write) = tokio::io::split(client);
    Ok((Box::new(read), Box::new(write)))
}

#[async_trait]
impl Transport for LocalTransport {
    #[instrument(skip(self), fields(endpoint = ?self.endpoint))]
    async fn connect(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ProtocolError::ConnectionClosed);
        }
        if self.open.load(Ordering::Acquire) {
            return Err(ProtocolError::AlreadyConnected);
        }

        let mut reader = self.reader.lock().await;
        let mut writer = self.writer.lock().await;
        if reader.stream.is_none() || writer.is_none() {
            let (read, write) = self.dial().await?;
            reader.stream = Some(read);
            *writer = Some(write);
        }

        self.open.store(true, Ordering::Release);
        info!("IPC transport connected");
        Ok(())
    }

    async fn close(&self) -> bool {
        self.closed.store(true, Ordering::Release);
        if !self.open.swap(false, Ordering::AcqRel) {
            return false;
        }

        // Wake any blocked reader or writer before taking their locks.
        self.cancel.cancel();

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        let mut reader = self.reader.lock().await;
        reader.stream = None;
        reader.pending.clear();

        debug!("IPC transport closed");
        true
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        if !self.is_open() {
            return Err(ProtocolError::NotConnected);
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ProtocolError::NotConnected)?;

        let write = async {
            writer.write_all(data).await?;
            writer.flush().await?;
            Ok::<(), ProtocolError>(())
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(ProtocolError::ConnectionClosed),
            result = write => result,
        }
    }

    async fn recv(&self, len: usize) -> Result<Vec<u8>> {
        if !self.is_open() {
            return Err(ProtocolError::NotConnected);
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(ProtocolError::ConnectionClosed),
            result = self.fill(len) => result,
        }
    }

    async fn recv_with_timeout(&self, len: usize, timeout: Duration) -> Result<Option<Vec<u8>>> {
        poll_with_timeout(timeout, self.recv(len)).await
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("endpoint", &self.endpoint)
            .field("open", &self.is_open())
            .finish()
    }
}
