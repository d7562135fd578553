//! cue-relay
//!
//! UDP-to-TCP relay for show-control cues.
//!
//! This service:
//! - Loads an ordered endpoint list from a text file
//! - Binds one UDP ingress listener per endpoint on sequential local ports
//! - Decodes datagrams (ASCII passthrough, or hex behind a `\b` marker)
//! - Funnels all decoded payloads into one shared FIFO queue
//! - Delivers each payload over a fresh TCP connection, newline-terminated,
//!   under a single per-attempt deadline

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cue_relay::config::{self, Config};
use cue_relay::relay::{relay_queue, Forwarder, IngressListener};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to RELAY_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting cue-relay");

    let endpoints = config::load_endpoints(&config.endpoints_file).with_context(|| {
        format!(
            "loading endpoint list from {}",
            config.endpoints_file.display()
        )
    })?;

    info!(
        endpoint_count = endpoints.len(),
        base_port = config.base_port,
        attempt_timeout_ms = config.attempt_timeout.as_millis() as u64,
        "Configuration loaded"
    );

    let (queue_tx, queue_rx) = relay_queue();

    // Bind every listener before spawning any receive loop: a port that
    // cannot be bound fails startup outright instead of leaving one
    // endpoint silently uncovered.
    let mut listeners = Vec::with_capacity(endpoints.len());
    for (i, endpoint) in endpoints.into_iter().enumerate() {
        let local_port = config
            .base_port
            .checked_add(i as u16)
            .context("local port assignment overflows the port range")?;

        match IngressListener::bind(local_port, endpoint.clone(), queue_tx.clone()).await {
            Ok(listener) => listeners.push(listener),
            Err(e) => {
                error!(
                    local_port,
                    target = %endpoint,
                    error = %e,
                    "Failed to bind listener"
                );
                return Err(e).with_context(|| format!("binding UDP port {local_port}"));
            }
        }
    }

    for listener in listeners {
        tokio::spawn(async move {
            if let Err(e) = listener.run().await {
                error!(error = %e, "Listener error");
            }
        });
    }

    // Each listener holds its own producer handle; drop the supervisor's so
    // the forwarder only sees the queue close if every listener stops.
    drop(queue_tx);

    // Run the forwarder on the main task (never returns in normal operation).
    Forwarder::with_timeout(queue_rx, config.attempt_timeout)
        .run()
        .await;

    Ok(())
}
