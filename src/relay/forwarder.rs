//! Single-consumer TCP delivery worker.
//!
//! All outbound deliveries are serialized through one task, in strict queue
//! order. Each work item gets a fresh connection, one write, and a
//! best-effort read of the reply, all under a single per-attempt deadline.
//! A down, slow, or refusing endpoint costs at most its own deadline and
//! never stops the worker.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::WorkItem;

/// Default deadline covering connect, send, and reply read for one attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound on reply bytes read after a send.
pub const MAX_REPLY_LEN: usize = 128;

/// Byte appended to every payload before sending.
const PAYLOAD_TERMINATOR: u8 = 0x0A;

/// Statistics for the forwarding worker.
#[derive(Debug, Default)]
pub struct ForwarderStats {
    /// Work items dequeued.
    pub items_dequeued: AtomicU64,
    /// Payloads fully sent (with or without a reply).
    pub delivered: AtomicU64,
    /// Attempts that failed to connect, send, or read.
    pub delivery_failures: AtomicU64,
    /// Deliveries that produced reply bytes.
    pub replies_received: AtomicU64,
}

/// The single consumer of the relay queue.
pub struct Forwarder {
    /// Consumer handle of the shared relay queue.
    queue: mpsc::UnboundedReceiver<WorkItem>,
    /// Deadline for one whole delivery attempt.
    attempt_timeout: Duration,
    /// Statistics.
    stats: Arc<ForwarderStats>,
}

impl Forwarder {
    /// Create a forwarder with the default attempt deadline.
    pub fn new(queue: mpsc::UnboundedReceiver<WorkItem>) -> Self {
        Self::with_timeout(queue, DEFAULT_ATTEMPT_TIMEOUT)
    }

    /// Create a forwarder with a custom attempt deadline.
    pub fn with_timeout(queue: mpsc::UnboundedReceiver<WorkItem>, attempt_timeout: Duration) -> Self {
        Self {
            queue,
            attempt_timeout,
            stats: Arc::new(ForwarderStats::default()),
        }
    }

    /// Get a handle to the forwarder statistics.
    pub fn stats(&self) -> Arc<ForwarderStats> {
        Arc::clone(&self.stats)
    }

    /// Run the delivery loop.
    ///
    /// Dequeues work items in arrival order and attempts each exactly once.
    /// Failures are counted and logged, never retried and never escalated.
    /// Returns only when every producer handle has been dropped.
    pub async fn run(mut self) {
        while let Some(item) = self.queue.recv().await {
            self.stats.items_dequeued.fetch_add(1, Ordering::Relaxed);

            let deadline = Instant::now() + self.attempt_timeout;
            match self.deliver(&item, deadline).await {
                Ok(Some(reply)) => {
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    self.stats.replies_received.fetch_add(1, Ordering::Relaxed);
                    info!(
                        destination = %item.destination,
                        payload_len = item.payload.len(),
                        reply_len = reply.len(),
                        "Delivered, reply received"
                    );
                }
                Ok(None) => {
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    info!(
                        destination = %item.destination,
                        payload_len = item.payload.len(),
                        "Delivered, no reply"
                    );
                }
                Err(e) => {
                    let failures = self.stats.delivery_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(
                        destination = %item.destination,
                        failures,
                        error = %e,
                        "Delivery failed"
                    );
                }
            }
        }

        debug!("Relay queue closed, forwarder exiting");
    }

    /// One connect/send/read attempt under a single deadline.
    ///
    /// Returns the reply bytes, or `None` when the remote closed or stayed
    /// silent until the deadline. The connection is dropped on return; it is
    /// never reused across messages.
    async fn deliver(&self, item: &WorkItem, deadline: Instant) -> io::Result<Option<Vec<u8>>> {
        let mut stream = timeout_at(deadline, TcpStream::connect(item.destination.addr()))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timeout"))??;

        let mut buf = Vec::with_capacity(item.payload.len() + 1);
        buf.extend_from_slice(&item.payload);
        buf.push(PAYLOAD_TERMINATOR);

        timeout_at(deadline, stream.write_all(&buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "send timeout"))??;

        debug!(
            destination = %item.destination,
            sent_len = buf.len(),
            "Payload sent"
        );

        // Reply is best effort: silence until the deadline, or EOF before
        // any data, is a no-reply outcome rather than a failure.
        let mut reply = vec![0u8; MAX_REPLY_LEN];
        match timeout_at(deadline, stream.read(&mut reply)).await {
            Err(_) | Ok(Ok(0)) => Ok(None),
            Ok(Ok(len)) => {
                reply.truncate(len);
                Ok(Some(reply))
            }
            Ok(Err(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{relay_queue, Endpoint};

    #[tokio::test]
    async fn refused_connection_is_counted_not_fatal() {
        // Grab a local port that nothing listens on.
        let unused = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = unused.local_addr().unwrap().port();
        drop(unused);

        let (tx, rx) = relay_queue();
        let forwarder = Forwarder::with_timeout(rx, Duration::from_millis(250));
        let stats = forwarder.stats();

        tx.send(WorkItem {
            payload: b"cue".to_vec(),
            destination: Endpoint::new("127.0.0.1", dead_port),
        })
        .unwrap();
        drop(tx);

        // run() terminates once the only producer is dropped and the queue
        // drains, so a hung worker would fail this test by timeout.
        forwarder.run().await;

        assert_eq!(stats.items_dequeued.load(Ordering::Relaxed), 1);
        assert_eq!(stats.delivery_failures.load(Ordering::Relaxed), 1);
        assert_eq!(stats.delivered.load(Ordering::Relaxed), 0);
    }
}
