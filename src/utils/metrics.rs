//! Observability and Metrics
//!
//! Per-client counters for monitoring session health: traffic, send
//! failures, retries and dropped inbound frames.
//!
//! Uses atomic counters so the caller and the receive task can both record.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector owned by one client session
#[derive(Debug)]
pub struct Metrics {
    /// Handshake frames sent
    pub handshakes_total: AtomicU64,
    /// Frames written to the transport
    pub packets_sent: AtomicU64,
    /// Frames decoded from the transport
    pub packets_received: AtomicU64,
    /// Bytes written, headers included
    pub bytes_sent: AtomicU64,
    /// Bytes read, headers included
    pub bytes_received: AtomicU64,
    /// Transport writes that failed
    pub send_failures: AtomicU64,
    /// Retries performed after a failed application send
    pub send_retries: AtomicU64,
    /// Application sends refused before authorization
    pub unauthorized_rejections: AtomicU64,
    /// Inbound frames dropped because their body or opcode was invalid
    pub dropped_packets: AtomicU64,
    /// Ping frames answered with a pong
    pub pings_answered: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            handshakes_total: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            send_retries: AtomicU64::new(0),
            unauthorized_rejections: AtomicU64::new(0),
            dropped_packets: AtomicU64::new(0),
            pings_answered: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a handshake attempt
    pub fn handshake_attempt(&self) {
        self.handshakes_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame sent
    pub fn packet_sent(&self, byte_count: u64) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a frame received
    pub fn packet_received(&self, byte_count: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a failed transport write
    pub fn send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a send retry
    pub fn send_retry(&self) {
        self.send_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a send refused by the authorization gate
    pub fn unauthorized_rejection(&self) {
        self.unauthorized_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an inbound frame that was dropped
    pub fn packet_dropped(&self) {
        self.dropped_packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a ping answered
    pub fn ping_answered(&self) {
        self.pings_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            handshakes_total: self.handshakes_total.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            send_retries: self.send_retries.load(Ordering::Relaxed),
            unauthorized_rejections: self.unauthorized_rejections.load(Ordering::Relaxed),
            dropped_packets: self.dropped_packets.load(Ordering::Relaxed),
            pings_answered: self.pings_answered.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            handshakes_total = snapshot.handshakes_total,
            packets_sent = snapshot.packets_sent,
            packets_received = snapshot.packets_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            send_failures = snapshot.send_failures,
            send_retries = snapshot.send_retries,
            unauthorized_rejections = snapshot.unauthorized_rejections,
            dropped_packets = snapshot.dropped_packets,
            pings_answered = snapshot.pings_answered,
            uptime_seconds = snapshot.uptime_seconds,
            "IPC session metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub handshakes_total: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_failures: u64,
    pub send_retries: u64,
    pub unauthorized_rejections: u64,
    pub dropped_packets: u64,
    pub pings_answered: u64,
    pub uptime_seconds: u64,
}
