//! # IPC Client
//!
//! The protocol engine: frames, sends, receives and dispatches messages for a
//! single session with the peer.
//!
//! ## Session lifecycle
//! 1. `connect()` opens the transport, sends the handshake and spawns the
//!    receive task.
//! 2. The peer answers with a `DISPATCH`/`READY` frame, which authorizes the
//!    session. Until then only `Handshake` and `Close` frames can be sent.
//! 3. `close()` (or a `Close` frame from the peer) sends `Close`, waits a short
//!    grace period and shuts the transport down. A closed client cannot be
//!    reconnected.
//!
//! ## Receive task
//! The task is the only reader. It answers `Ping` with `Pong`, authorizes on
//! dispatch frames, forwards `Frame` bodies to the event [`Dispatcher`] and
//! runs the closing sequence on `Close`. A malformed body or unknown opcode is
//! dropped; any error that leaves the stream off a frame boundary closes the
//! session.
//!
//! ## Example
//! ```rust,no_run
//! use discord_ipc::client::IpcClient;
//! use discord_ipc::core::value::Value;
//! use discord_ipc::protocol::Event;
//!
//! # async fn run() -> discord_ipc::error::Result<()> {
//! let client = IpcClient::new("123456789012345678");
//! client.on_event(Event::Ready.as_str(), |body| {
//!     println!("ready: {body}");
//!     Ok(())
//! })?;
//! client.connect().await?;
//!
//! let mut activity = Value::object();
//! activity.insert("state", "Exploring")?;
//! client.set_activity(activity).await?;
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ClientConfig, IpcConfig};
use crate::core::packet::{decode_length, decode_opcode, Opcode, Packet, HEADER_SIZE};
use crate::core::parser::parse_bytes;
use crate::core::value::Value;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::command::{is_dispatch, CommandRequest, Event};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::handshake::HandshakeRequest;
use crate::transport::{LocalTransport, Transport};
use crate::utils::metrics::{Metrics, MetricsSnapshot};
use crate::utils::timeout::RECEIVER_JOIN_TIMEOUT;

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected { authorized: bool },
    /// Terminal
    Closing,
}

/// State shared between the caller and the receive task.
pub(crate) struct Session<T: Transport> {
    config: ClientConfig,
    transport: T,
    authorized: AtomicBool,
    shutting_down: AtomicBool,
    connected: AtomicBool,
    dispatcher: Dispatcher,
    metrics: Metrics,
}

impl<T: Transport> Session<T> {
    pub(crate) fn new(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            authorized: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            dispatcher: Dispatcher::new(),
            metrics: Metrics::new(),
        }
    }

    fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::Acquire)
    }

    fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Encode and write one frame, enforcing the authorization gate.
    pub(crate) async fn send_packet(&self, packet: &Packet) -> Result<()> {
        if !packet.opcode.bypasses_authorization() && !self.is_authorized() {
            self.metrics.unauthorized_rejection();
            debug!(opcode = packet.opcode.name(), "Refusing send before authorization");
            return Err(ProtocolError::Unauthorized);
        }

        let bytes = packet.to_bytes()?;
        match self.transport.send(&bytes).await {
            Ok(()) => {
                self.metrics.packet_sent(bytes.len() as u64);
                debug!(opcode = packet.opcode.name(), bytes = bytes.len(), "Sent packet");
                Ok(())
            }
            Err(e) => {
                self.metrics.send_failure();
                Err(e)
            }
        }
    }

    /// Read one frame.
    ///
    /// Waits at most `poll_timeout` for the frame to start (`Ok(None)` if it
    /// does not); the rest of the frame is read without a deadline.
    pub(crate) async fn recv_packet(&self) -> Result<Option<Packet>> {
        let Some(opcode_bytes) = self
            .transport
            .recv_with_timeout(4, self.config.poll_timeout)
            .await?
        else {
            return Ok(None);
        };

        let raw_opcode = decode_opcode(&opcode_bytes)?;
        let len = decode_length(&self.transport.recv(4).await?)?;
        let body = self.transport.recv(len).await?;
        self.metrics.packet_received((HEADER_SIZE + len) as u64);

        // The whole frame has been consumed; errors below keep the boundary.
        let opcode = Opcode::try_from(raw_opcode)?;
        let body = parse_bytes(&body)?;

        debug!(opcode = opcode.name(), bytes = len, "Received packet");
        Ok(Some(Packet { opcode, body }))
    }

    async fn handle_packet(&self, packet: Packet) {
        match packet.opcode {
            Opcode::Ping => {
                let pong = Packet::new(Opcode::Pong, packet.body);
                match self.send_packet(&pong).await {
                    Ok(()) => self.metrics.ping_answered(),
                    Err(e) => warn!(error = %e, "Failed to answer ping"),
                }
            }
            Opcode::Frame => {
                if is_dispatch(&packet.body) && !self.authorized.swap(true, Ordering::AcqRel) {
                    info!("IPC session authorized");
                }
                match self.dispatcher.dispatch(&packet.body) {
                    Ok(true) => {}
                    Ok(false) => debug!(body = %packet.body, "No handler for frame"),
                    Err(e) => warn!(error = %e, "Event handler failed"),
                }
            }
            Opcode::Close => {
                info!(body = %packet.body, "Peer closed the connection");
                self.close_sequence().await;
            }
            Opcode::Handshake | Opcode::Pong => {
                debug!(opcode = packet.opcode.name(), "Ignoring packet");
            }
        }
    }

    /// Send `Close`, wait out the grace period and close the transport.
    ///
    /// Only the first caller sends `Close`, waits and can report `true`.
    /// Later callers still close the transport, which is how a dropped
    /// client's receive task releases the socket, but always report `false`.
    async fn close_sequence(&self) -> bool {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            self.transport.close().await;
            return false;
        }

        if self.connected.load(Ordering::Acquire) {
            if let Err(e) = self.send_packet(&Packet::close()).await {
                debug!(error = %e, "Close frame not delivered");
            }
            tokio::time::sleep(self.config.close_grace).await;
        }

        let closed = self.transport.close().await;
        if closed {
            self.metrics.log_metrics();
        }
        closed
    }
}

async fn receive_loop<T: Transport>(session: Arc<Session<T>>) {
    while !session.is_shutting_down() {
        match session.recv_packet().await {
            Ok(None) => continue,
            Ok(Some(packet)) => session.handle_packet(packet).await,
            Err(e) if e.is_boundary_safe() => {
                session.metrics.packet_dropped();
                warn!(error = %e, "Dropping unreadable message");
            }
            Err(e) => {
                if !session.is_shutting_down() {
                    error!(error = %e, "Receive failed, closing connection");
                }
                session.close_sequence().await;
                break;
            }
        }
    }
    info!("IPC connection closed");
}

/// Client for one IPC session
pub struct IpcClient<T: Transport = LocalTransport> {
    session: Arc<Session<T>>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl IpcClient<LocalTransport> {
    /// Client for `client_id` that discovers the local endpoint on connect.
    pub fn new(client_id: impl Into<String>) -> Self {
        let config = IpcConfig::default();
        Self::with_transport(
            ClientConfig::with_client_id(client_id),
            LocalTransport::new(&config.transport),
        )
    }

    /// Client built from a full configuration.
    ///
    /// # Errors
    /// `ConfigError` if the configuration does not validate.
    pub fn from_config(config: &IpcConfig) -> Result<Self> {
        config.validate_strict()?;
        Ok(Self::with_transport(
            config.client.clone(),
            LocalTransport::new(&config.transport),
        ))
    }
}

impl<T: Transport> IpcClient<T> {
    /// Client over an arbitrary transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            session: Arc::new(Session::new(config, transport)),
            receiver: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.session.config
    }

    /// Open the transport, send the handshake and start the receive task.
    ///
    /// # Errors
    /// `AlreadyConnected` on a connected client, `ConnectionClosed` on a
    /// closed one, otherwise whatever the transport or handshake reported.
    /// On failure the client stays disconnected.
    #[instrument(skip(self), fields(client_id = %self.session.config.client_id))]
    pub async fn connect(&self) -> Result<()> {
        let mut receiver = self.receiver.lock().await;
        let session = &self.session;

        if session.is_shutting_down() {
            return Err(ProtocolError::ConnectionClosed);
        }
        if session.connected.load(Ordering::Acquire) {
            return Err(ProtocolError::AlreadyConnected);
        }

        session.transport.connect().await?;

        let handshake = HandshakeRequest::from_config(&session.config).to_packet();
        session.metrics.handshake_attempt();
        if let Err(e) = session.send_packet(&handshake).await {
            error!(error = %e, "Handshake failed");
            session.transport.close().await;
            return Err(ProtocolError::HandshakeError(format!(
                "{}: {e}",
                constants::ERR_HANDSHAKE_SEND
            )));
        }

        session.connected.store(true, Ordering::Release);
        *receiver = Some(tokio::spawn(receive_loop(Arc::clone(session))));

        info!("IPC connected, awaiting authorization");
        Ok(())
    }

    /// Close the session. Returns whether this call closed the transport.
    ///
    /// Safe to call repeatedly; later calls return `false` without waiting
    /// out the grace period. The receive task is joined by whichever call
    /// finds it still registered.
    #[instrument(skip(self))]
    pub async fn close(&self) -> bool {
        let closed = self.session.close_sequence().await;

        // The task may have closed the transport itself; join it either way.
        if let Some(handle) = self.receiver.lock().await.take() {
            let bound = self.session.config.poll_timeout
                + self.session.config.close_grace
                + RECEIVER_JOIN_TIMEOUT;
            match tokio::time::timeout(bound, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Receive task ended abnormally"),
                Err(_) => warn!("Receive task did not finish in time, detaching"),
            }
        }
        closed
    }

    /// Send one frame without retrying.
    ///
    /// # Errors
    /// `Unauthorized` for application frames before the session is
    /// authorized (nothing is written); transport errors otherwise.
    pub async fn send_packet(&self, packet: &Packet) -> Result<()> {
        self.session.send_packet(packet).await
    }

    /// Send `packet`, retrying up to `max_retries` times after a retryable
    /// failure with `retry_backoff` between attempts. Returns the last
    /// attempt's result.
    pub async fn attempt_send_payload(&self, packet: &Packet, max_retries: u32) -> Result<()> {
        let mut result = self.session.send_packet(packet).await;

        for attempt in 1..=max_retries {
            let Err(e) = &result else { break };
            if !e.is_retryable() || self.session.is_shutting_down() {
                break;
            }
            warn!(attempt, max_retries, error = %e, "Send failed, retrying");
            self.session.metrics.send_retry();
            tokio::time::sleep(self.session.config.retry_backoff).await;
            result = self.session.send_packet(packet).await;
        }

        result
    }

    /// Send an application command with the configured retry policy.
    pub async fn send_command(&self, request: &CommandRequest) -> Result<()> {
        let packet = Packet::new(Opcode::Frame, request.to_value());
        self.attempt_send_payload(&packet, self.session.config.max_send_retries)
            .await
    }

    /// Publish `activity` as this process's presence.
    pub async fn set_activity(&self, activity: Value) -> Result<()> {
        self.send_command(&CommandRequest::set_activity(std::process::id(), Some(activity)))
            .await
    }

    /// Remove this process's presence.
    pub async fn clear_activity(&self) -> Result<()> {
        self.send_command(&CommandRequest::set_activity(std::process::id(), None))
            .await
    }

    /// Ask the peer to deliver `evt` events.
    pub async fn subscribe(&self, evt: Event) -> Result<()> {
        self.send_command(&CommandRequest::subscribe(evt)).await
    }

    /// Stop receiving `evt` events.
    pub async fn unsubscribe(&self, evt: Event) -> Result<()> {
        self.send_command(&CommandRequest::unsubscribe(evt)).await
    }

    /// Accept or decline a join request from `user_id`.
    pub async fn respond_to_join_request(&self, user_id: &str, accept: bool) -> Result<()> {
        self.send_command(&CommandRequest::join_reply(user_id, accept))
            .await
    }

    /// Register a handler for inbound frames whose `evt` (or, failing that,
    /// `cmd`) equals `name`. Handlers run on the receive task.
    pub fn on_event<F>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        self.session.dispatcher.register(name, handler)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.session.dispatcher
    }

    pub fn state(&self) -> ConnectionState {
        if self.session.is_shutting_down() {
            ConnectionState::Closing
        } else if self.session.connected.load(Ordering::Acquire) {
            ConnectionState::Connected {
                authorized: self.session.is_authorized(),
            }
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.session.is_authorized()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.session.metrics.snapshot()
    }
}

impl<T: Transport> Drop for IpcClient<T> {
    fn drop(&mut self) {
        // The receive task notices the cancelled read and finishes the close.
        self.session.shutting_down.store(true, Ordering::Release);
        self.session.transport.cancel();
    }
}

impl<T: Transport> std::fmt::Debug for IpcClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcClient")
            .field("client_id", &self.session.config.client_id)
            .field("state", &self.state())
            .finish()
    }
}
