//! UDP-to-TCP relay core.
//!
//! This module provides:
//! - Datagram decoding (ASCII passthrough or hex escape)
//! - UDP ingress listeners, one per remote endpoint
//! - The shared relay queue
//! - The single forwarding worker delivering over TCP
//!
//! ## Architecture
//!
//! ```text
//! Sender -> UDP -> IngressListener[i] -> decode -> relay queue -> Forwarder -> TCP -> Endpoint[i]
//! ```
//!
//! Each listener owns one UDP socket and is bound to exactly one remote
//! endpoint for its lifetime. All listeners feed one unbounded FIFO queue
//! whose sole consumer is the forwarder, which opens a fresh TCP connection
//! per message.

mod codec;
mod forwarder;
mod listener;

pub use codec::{decode, DecodeError, HEX_MARKER, MAX_DATAGRAM_LEN};
pub use forwarder::{Forwarder, ForwarderStats, DEFAULT_ATTEMPT_TIMEOUT, MAX_REPLY_LEN};
pub use listener::{IngressListener, ListenerStats};

use std::fmt;

use tokio::sync::mpsc;

/// A remote TCP forwarding target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Address string accepted by `TcpStream::connect`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A decoded payload queued for delivery to its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Decoded payload bytes (trailing line-feed not yet appended).
    pub payload: Vec<u8>,
    /// Remote endpoint to deliver to.
    pub destination: Endpoint,
}

/// Create the relay queue connecting all ingress listeners to the forwarder.
///
/// Unbounded by design: producers never block on push, and a slow or
/// unreachable remote grows the queue instead of stalling ingress. Strict
/// FIFO across all producers for the single consumer.
pub fn relay_queue() -> (
    mpsc::UnboundedSender<WorkItem>,
    mpsc::UnboundedReceiver<WorkItem>,
) {
    mpsc::unbounded_channel()
}
