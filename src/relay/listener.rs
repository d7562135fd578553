//! UDP ingress listeners.
//!
//! Each listener owns one UDP socket bound to its own local port and feeds
//! decoded payloads into the shared relay queue, tagged with the one remote
//! endpoint assigned at construction. The relay is a fixed 1:1 mapping from
//! local UDP port to remote TCP endpoint, independent of who sent the
//! datagram.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::codec::{self, MAX_DATAGRAM_LEN};
use super::{Endpoint, WorkItem};

/// Statistics for one ingress listener.
#[derive(Debug, Default)]
pub struct ListenerStats {
    /// Total datagrams received.
    pub datagrams_received: AtomicU64,
    /// Datagrams decoded and enqueued for delivery.
    pub datagrams_enqueued: AtomicU64,
    /// Datagrams dropped because hex decoding failed.
    pub decode_failures: AtomicU64,
}

/// A UDP listener relaying to one fixed remote endpoint.
pub struct IngressListener {
    /// The UDP socket, owned exclusively for the listener's lifetime.
    socket: UdpSocket,
    /// Remote endpoint attached to every work item this listener produces.
    target: Endpoint,
    /// Producer handle of the shared relay queue.
    queue: mpsc::UnboundedSender<WorkItem>,
    /// Statistics.
    stats: Arc<ListenerStats>,
}

impl IngressListener {
    /// Bind a listener on `local_port`, relaying to `target`.
    ///
    /// Binding happens eagerly so the supervisor can fail startup outright
    /// when a port is unavailable, instead of running with one endpoint
    /// silently uncovered.
    pub async fn bind(
        local_port: u16,
        target: Endpoint,
        queue: mpsc::UnboundedSender<WorkItem>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", local_port)).await?;
        let local_addr = socket.local_addr()?;

        info!(
            local_addr = %local_addr,
            target = %target,
            "Listener bound"
        );

        Ok(Self {
            socket,
            target,
            queue,
            stats: Arc::new(ListenerStats::default()),
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Get a handle to the listener statistics.
    pub fn stats(&self) -> Arc<ListenerStats> {
        Arc::clone(&self.stats)
    }

    /// Run the receive loop.
    ///
    /// Receives up to [`MAX_DATAGRAM_LEN`] bytes per datagram, decodes, and
    /// enqueues. Malformed hex datagrams are dropped and counted; the loop
    /// keeps receiving. Returns only when the queue's consumer is gone.
    pub async fn run(self) -> io::Result<()> {
        let local_addr = self.socket.local_addr()?;
        info!(local_addr = %local_addr, target = %self.target, "Listener started");

        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, sender)) => {
                    self.stats
                        .datagrams_received
                        .fetch_add(1, Ordering::Relaxed);

                    let payload = match codec::decode(&buf[..len]) {
                        Ok(payload) => payload,
                        Err(e) => {
                            self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                sender = %sender,
                                target = %self.target,
                                error = %e,
                                "Dropping malformed datagram"
                            );
                            continue;
                        }
                    };

                    debug!(
                        sender = %sender,
                        target = %self.target,
                        payload_len = payload.len(),
                        "Datagram decoded"
                    );

                    let item = WorkItem {
                        payload,
                        destination: self.target.clone(),
                    };
                    if self.queue.send(item).is_err() {
                        warn!(target = %self.target, "Relay queue closed, stopping listener");
                        return Ok(());
                    }

                    self.stats
                        .datagrams_enqueued
                        .fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    error!(error = %e, "Receive error");
                    // Brief sleep to avoid tight loop on persistent errors
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::relay_queue;

    #[tokio::test]
    async fn enqueues_decoded_datagrams_for_its_target() {
        let (tx, mut rx) = relay_queue();
        let target = Endpoint::new("127.0.0.1", 9000);
        let listener = IngressListener::bind(0, target.clone(), tx).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stats = listener.stats();
        tokio::spawn(listener.run());

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(b"hello", ("127.0.0.1", addr.port()))
            .await
            .unwrap();

        let item = rx.recv().await.unwrap();
        assert_eq!(item.payload, b"hello");
        assert_eq!(item.destination, target);
        assert_eq!(stats.datagrams_enqueued.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn drops_malformed_hex_and_keeps_receiving() {
        let (tx, mut rx) = relay_queue();
        let target = Endpoint::new("127.0.0.1", 9000);
        let listener = IngressListener::bind(0, target, tx).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stats = listener.stats();
        tokio::spawn(listener.run());

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(b"\\bzz", ("127.0.0.1", addr.port()))
            .await
            .unwrap();
        client
            .send_to(b"\\bff00", ("127.0.0.1", addr.port()))
            .await
            .unwrap();

        // Only the valid datagram comes through, already hex-decoded.
        let item = rx.recv().await.unwrap();
        assert_eq!(item.payload, vec![0xFF, 0x00]);
        assert_eq!(stats.decode_failures.load(Ordering::Relaxed), 1);
    }
}
