//! End-to-end session tests against an in-process peer.
//!
//! The peer side is a `Framed<DuplexStream, FrameCodec>`, the client side a
//! `LocalTransport` over the other end of the duplex pipe.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use discord_ipc::client::{ConnectionState, IpcClient};
use discord_ipc::config::{ClientConfig, MAX_PAYLOAD_SIZE};
use discord_ipc::core::codec::FrameCodec;
use discord_ipc::core::packet::{Opcode, Packet};
use discord_ipc::core::parser::parse;
use discord_ipc::core::value::Value;
use discord_ipc::error::{ProtocolError, Result};
use discord_ipc::protocol::Event;
use discord_ipc::transport::{LocalTransport, Transport};
use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, AsyncWriteExt, DuplexStream};
use tokio::sync::Mutex;
use tokio_util::codec::Framed;

type Peer = Framed<DuplexStream, FrameCodec>;

fn test_config() -> ClientConfig {
    ClientConfig {
        poll_timeout: Duration::from_millis(20),
        retry_backoff: Duration::from_millis(10),
        ..ClientConfig::with_client_id("1234")
    }
}

fn client_and_peer() -> (IpcClient, Peer) {
    let (ours, theirs) = duplex(64 * 1024);
    let client = IpcClient::with_transport(test_config(), LocalTransport::from_stream(ours));
    (client, Framed::new(theirs, FrameCodec))
}

async fn next_packet(peer: &mut Peer) -> Packet {
    tokio::time::timeout(Duration::from_secs(2), peer.next())
        .await
        .expect("peer timed out waiting for a frame")
        .expect("stream ended")
        .expect("frame should decode")
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

/// Connect, consume the handshake and authorize with `READY`.
async fn ready_session() -> (IpcClient, Peer) {
    let (client, mut peer) = client_and_peer();
    client.connect().await.unwrap();
    assert_eq!(next_packet(&mut peer).await.opcode, Opcode::Handshake);

    let ready = parse(r#"{"cmd":"DISPATCH","evt":"READY","data":{"v":1}}"#).unwrap();
    peer.send(Packet::new(Opcode::Frame, ready)).await.unwrap();
    wait_until(|| client.is_authorized()).await;
    (client, peer)
}

#[tokio::test]
async fn test_handshake_is_first_frame() {
    let (client, mut peer) = client_and_peer();
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.connect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected { authorized: false });

    let handshake = next_packet(&mut peer).await;
    assert_eq!(handshake.opcode, Opcode::Handshake);
    assert_eq!(handshake.body, parse(r#"{"v":1,"client_id":"1234"}"#).unwrap());
    assert_eq!(client.metrics().handshakes_total, 1);
}

#[tokio::test]
async fn test_application_frames_wait_for_dispatch() {
    let (client, mut peer) = client_and_peer();
    client.connect().await.unwrap();
    next_packet(&mut peer).await;

    let frame = Packet::new(Opcode::Frame, parse(r#"{"cmd":"SUBSCRIBE"}"#).unwrap());
    assert!(matches!(
        client.send_packet(&frame).await,
        Err(ProtocolError::Unauthorized)
    ));

    // A non-dispatch frame does not authorize.
    let response = parse(r#"{"cmd":"SET_ACTIVITY","evt":null}"#).unwrap();
    peer.send(Packet::new(Opcode::Frame, response)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!client.is_authorized());

    let ready = parse(r#"{"cmd":"DISPATCH","evt":"READY"}"#).unwrap();
    peer.send(Packet::new(Opcode::Frame, ready)).await.unwrap();
    wait_until(|| client.is_authorized()).await;
    assert_eq!(client.state(), ConnectionState::Connected { authorized: true });

    client.send_packet(&frame).await.unwrap();
    assert_eq!(next_packet(&mut peer).await, frame);
}

#[tokio::test]
async fn test_ping_is_answered_with_same_body() {
    let (client, mut peer) = ready_session().await;

    let body = parse(r#"{"nonce":"abc","n":[1,2.5,null]}"#).unwrap();
    peer.send(Packet::new(Opcode::Ping, body.clone())).await.unwrap();

    let pong = next_packet(&mut peer).await;
    assert_eq!(pong.opcode, Opcode::Pong);
    assert_eq!(pong.body, body);
    wait_until(|| client.metrics().pings_answered == 1).await;
}

#[tokio::test]
async fn test_ping_before_authorization_goes_unanswered() {
    let (client, mut peer) = client_and_peer();
    client.connect().await.unwrap();
    next_packet(&mut peer).await;

    let body = parse(r#"{"n":1}"#).unwrap();
    peer.send(Packet::new(Opcode::Ping, body.clone())).await.unwrap();

    let silent = tokio::time::timeout(Duration::from_millis(150), peer.next()).await;
    assert!(silent.is_err(), "no pong may be sent before authorization");
    wait_until(|| client.metrics().unauthorized_rejections == 1).await;
    assert_eq!(client.metrics().pings_answered, 0);

    // Once authorized the same ping is answered.
    let ready = parse(r#"{"cmd":"DISPATCH","evt":"READY"}"#).unwrap();
    peer.send(Packet::new(Opcode::Frame, ready)).await.unwrap();
    wait_until(|| client.is_authorized()).await;
    peer.send(Packet::new(Opcode::Ping, body.clone())).await.unwrap();

    let pong = next_packet(&mut peer).await;
    assert_eq!(pong, Packet::new(Opcode::Pong, body));
    wait_until(|| client.metrics().pings_answered == 1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_senders_never_interleave_frames() {
    const TASKS: i32 = 8;
    const PER_TASK: i32 = 25;

    let (client, mut peer) = ready_session().await;
    let client = Arc::new(client);

    let mut handles = Vec::new();
    for task in 0..TASKS {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            for seq in 0..PER_TASK {
                let body = parse(&format!(
                    r#"{{"task":{task},"seq":{seq},"pad":"{}"}}"#,
                    "x".repeat(512)
                ))
                .unwrap();
                client
                    .send_packet(&Packet::new(Opcode::Frame, body))
                    .await
                    .unwrap();
            }
        }));
    }

    let mut next_seq = vec![0; TASKS as usize];
    for _ in 0..TASKS * PER_TASK {
        let packet = next_packet(&mut peer).await;
        assert_eq!(packet.opcode, Opcode::Frame);
        let task = *packet.body.at("task").unwrap().get_as::<i32>().unwrap();
        let seq = *packet.body.at("seq").unwrap().get_as::<i32>().unwrap();
        assert_eq!(seq, next_seq[task as usize], "frames of task {task} out of order");
        next_seq[task as usize] += 1;
    }

    for handle in handles {
        handle.await.unwrap();
    }
    assert!(next_seq.iter().all(|&n| n == PER_TASK));
    assert_eq!(client.metrics().packets_sent, 1 + (TASKS * PER_TASK) as u64);
}

#[tokio::test]
async fn test_events_reach_registered_handler() {
    let (client, mut peer) = ready_session().await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    client
        .on_event(Event::ActivityJoin.as_str(), move |body| {
            let secret = body.at("data")?.at("secret")?.get_as::<String>()?.clone();
            tx.send(secret)
                .map_err(|e| ProtocolError::Custom(e.to_string()))
        })
        .unwrap();

    let join = parse(r#"{"cmd":"DISPATCH","evt":"ACTIVITY_JOIN","data":{"secret":"s3cr3t"}}"#)
        .unwrap();
    peer.send(Packet::new(Opcode::Frame, join)).await.unwrap();

    let secret = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(secret, "s3cr3t");
}

#[tokio::test]
async fn test_malformed_body_is_dropped_and_stream_continues() {
    let (client, mut peer) = client_and_peer();
    client.connect().await.unwrap();
    next_packet(&mut peer).await;

    let bad = b"{\"cmd\":";
    let mut raw = 1i32.to_ne_bytes().to_vec();
    raw.extend_from_slice(&(bad.len() as i32).to_ne_bytes());
    raw.extend_from_slice(bad);
    peer.get_mut().write_all(&raw).await.unwrap();

    let ready = parse(r#"{"cmd":"DISPATCH","evt":"READY"}"#).unwrap();
    peer.send(Packet::new(Opcode::Frame, ready)).await.unwrap();

    wait_until(|| client.is_authorized()).await;
    assert_eq!(client.metrics().dropped_packets, 1);
    assert_eq!(client.state(), ConnectionState::Connected { authorized: true });
}

#[tokio::test]
async fn test_set_and_clear_activity() {
    let (client, mut peer) = ready_session().await;

    let mut activity = Value::object();
    activity.insert("state", "In a match").unwrap();
    client.set_activity(activity.clone()).await.unwrap();

    let sent = next_packet(&mut peer).await;
    assert_eq!(sent.opcode, Opcode::Frame);
    assert_eq!(sent.body.at("cmd").unwrap().as_str(), Some("SET_ACTIVITY"));
    assert!(sent.body.at("nonce").unwrap().is::<String>());
    let args = sent.body.at("args").unwrap();
    let pid = i64::from(std::process::id());
    let sent_pid = match args.at("pid").unwrap() {
        Value::Int32(n) => i64::from(*n),
        Value::Int64(n) => *n,
        other => panic!("pid has type {}", other.type_name()),
    };
    assert_eq!(sent_pid, pid);
    assert_eq!(args.at("activity").unwrap(), &activity);

    client.clear_activity().await.unwrap();
    let cleared = next_packet(&mut peer).await;
    assert!(!cleared.body.at("args").unwrap().has("activity").unwrap());
}

#[tokio::test]
async fn test_subscribe_carries_event() {
    let (client, mut peer) = ready_session().await;
    client.subscribe(Event::ActivityJoinRequest).await.unwrap();

    let sent = next_packet(&mut peer).await;
    assert_eq!(sent.body.at("cmd").unwrap().as_str(), Some("SUBSCRIBE"));
    assert_eq!(sent.body.at("evt").unwrap().as_str(), Some("ACTIVITY_JOIN_REQUEST"));
}

#[tokio::test]
async fn test_unauthorized_activity_exhausts_retries() {
    let (client, mut peer) = client_and_peer();
    client.connect().await.unwrap();
    next_packet(&mut peer).await;

    let result = client.set_activity(Value::object()).await;
    assert!(matches!(result, Err(ProtocolError::Unauthorized)));

    let metrics = client.metrics();
    assert_eq!(metrics.unauthorized_rejections, 4);
    assert_eq!(metrics.send_retries, 3);
}

#[tokio::test]
async fn test_close_twice() {
    let (client, mut peer) = ready_session().await;

    assert!(client.close().await);
    assert_eq!(client.state(), ConnectionState::Closing);
    assert_eq!(next_packet(&mut peer).await, Packet::close());

    let second = tokio::time::timeout(Duration::from_millis(100), client.close())
        .await
        .expect("second close must not block");
    assert!(!second);

    assert!(matches!(client.connect().await, Err(ProtocolError::ConnectionClosed)));
}

#[tokio::test]
async fn test_peer_close_shuts_session_down() {
    let (client, mut peer) = ready_session().await;

    let body = parse(r#"{"code":1000,"message":"bye"}"#).unwrap();
    peer.send(Packet::new(Opcode::Close, body)).await.unwrap();

    assert_eq!(next_packet(&mut peer).await.opcode, Opcode::Close);
    wait_until(|| client.state() == ConnectionState::Closing).await;

    // The transport is shut down once the grace period passes.
    let end = tokio::time::timeout(Duration::from_secs(2), peer.next()).await.unwrap();
    assert!(end.is_none());
    assert!(!client.close().await);
}

#[tokio::test]
async fn test_peer_disconnect_closes_session() {
    let (client, peer) = ready_session().await;
    drop(peer);
    wait_until(|| client.state() == ConnectionState::Closing).await;

    // The receive task started the closing sequence, so this call reports
    // false even if it lands inside the task's grace period.
    assert!(!client.close().await);
    assert!(!client.close().await);
}

#[tokio::test]
async fn test_connect_twice_rejected() {
    let (client, _peer) = client_and_peer();
    client.connect().await.unwrap();
    assert!(matches!(client.connect().await, Err(ProtocolError::AlreadyConnected)));
}

#[tokio::test]
async fn test_close_before_connect() {
    let (client, _peer) = client_and_peer();
    assert!(!client.close().await);
    assert_eq!(client.state(), ConnectionState::Closing);
}

#[tokio::test]
async fn test_drop_releases_transport() {
    let (client, mut peer) = ready_session().await;
    drop(client);

    let end = tokio::time::timeout(Duration::from_secs(2), peer.next()).await.unwrap();
    assert!(end.is_none());
}

/// Accepts the handshake, delivers one `READY` frame, then fails every
/// application send.
struct FailingTransport {
    inbound: Mutex<VecDeque<u8>>,
    open: AtomicBool,
    frame_sends: Arc<AtomicUsize>,
}

impl FailingTransport {
    fn new(frame_sends: Arc<AtomicUsize>) -> Self {
        let ready = Packet::new(
            Opcode::Frame,
            parse(r#"{"cmd":"DISPATCH","evt":"READY"}"#).unwrap(),
        );
        Self {
            inbound: Mutex::new(ready.to_bytes().unwrap().into()),
            open: AtomicBool::new(false),
            frame_sends,
        }
    }
}

#[async_trait]
impl Transport for FailingTransport {
    async fn connect(&self) -> Result<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> bool {
        self.open.swap(false, Ordering::SeqCst)
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        let opcode = i32::from_ne_bytes(data[..4].try_into().unwrap());
        if opcode == Opcode::Frame.as_i32() {
            self.frame_sends.fetch_add(1, Ordering::SeqCst);
            return Err(ProtocolError::TransportError("pipe is full".to_string()));
        }
        Ok(())
    }

    async fn recv(&self, len: usize) -> Result<Vec<u8>> {
        let mut inbound = self.inbound.lock().await;
        if inbound.len() < len {
            return Err(ProtocolError::ConnectionClosed);
        }
        Ok(inbound.drain(..len).collect())
    }

    async fn recv_with_timeout(&self, len: usize, timeout: Duration) -> Result<Option<Vec<u8>>> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(ProtocolError::ConnectionClosed);
        }
        {
            let mut inbound = self.inbound.lock().await;
            if inbound.len() >= len {
                return Ok(Some(inbound.drain(..len).collect()));
            }
        }
        tokio::time::sleep(timeout).await;
        Ok(None)
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_bound_against_failing_transport() {
    let frame_sends = Arc::new(AtomicUsize::new(0));
    let client = IpcClient::with_transport(
        ClientConfig::with_client_id("1234"),
        FailingTransport::new(frame_sends.clone()),
    );
    client.connect().await.unwrap();
    wait_until(|| client.is_authorized()).await;

    let packet = Packet::new(Opcode::Frame, Value::object());
    let started = tokio::time::Instant::now();
    let result = client.attempt_send_payload(&packet, 3).await;

    assert!(matches!(result, Err(ProtocolError::TransportError(_))));
    assert_eq!(frame_sends.load(Ordering::SeqCst), 4);
    assert!(started.elapsed() >= Duration::from_secs(3));

    let metrics = client.metrics();
    assert_eq!(metrics.send_failures, 4);
    assert_eq!(metrics.send_retries, 3);

    assert!(client.close().await);
}

#[tokio::test(start_paused = true)]
async fn test_encoding_failure_is_not_retried() {
    let frame_sends = Arc::new(AtomicUsize::new(0));
    let client = IpcClient::with_transport(
        ClientConfig::with_client_id("1234"),
        FailingTransport::new(frame_sends.clone()),
    );
    client.connect().await.unwrap();
    wait_until(|| client.is_authorized()).await;

    let oversized = Packet::new(Opcode::Frame, Value::from("x".repeat(MAX_PAYLOAD_SIZE)));
    let started = tokio::time::Instant::now();
    let result = client.attempt_send_payload(&oversized, 3).await;

    assert!(matches!(result, Err(ProtocolError::OversizedPacket(_))));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(frame_sends.load(Ordering::SeqCst), 0);
    assert_eq!(client.metrics().send_retries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_sends_once() {
    let frame_sends = Arc::new(AtomicUsize::new(0));
    let client = IpcClient::with_transport(
        ClientConfig::with_client_id("1234"),
        FailingTransport::new(frame_sends.clone()),
    );
    client.connect().await.unwrap();
    wait_until(|| client.is_authorized()).await;

    let packet = Packet::new(Opcode::Frame, Value::object());
    assert!(client.attempt_send_payload(&packet, 0).await.is_err());
    assert_eq!(frame_sends.load(Ordering::SeqCst), 1);
}
