//! Link statistics
//!
//! Written by the reader/parser tasks and by `send`, read from anywhere.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the link counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkStats {
    /// Frame bytes handed to the transport
    pub bytes_sent: u64,
    /// Frames handed to the transport
    pub messages_sent: u64,
    /// Raw bytes read, noise included
    pub bytes_received: u64,
    /// Complete frames with a valid CRC
    pub messages_received: u64,
    /// Complete frames whose CRC did not match
    pub bad_crc: u64,
    /// CRC-valid frames that could not be decoded or dispatched
    pub dropped: u64,
}

/// Shared, monotonically increasing counters for one connection
#[derive(Debug, Default)]
pub struct LinkStatistics {
    bytes_sent: AtomicU64,
    messages_sent: AtomicU64,
    bytes_received: AtomicU64,
    messages_received: AtomicU64,
    bad_crc: AtomicU64,
    dropped: AtomicU64,
}

impl LinkStatistics {
    /// All counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one outgoing frame of `bytes` bytes
    pub fn record_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Count raw bytes read from the transport
    pub fn record_bytes_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Count one CRC-valid frame
    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one frame that failed its CRC
    pub fn record_bad_crc(&self) {
        self.bad_crc.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one valid frame that could not be dispatched
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values
    pub fn snapshot(&self) -> LinkStats {
        LinkStats {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bad_crc: self.bad_crc.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
