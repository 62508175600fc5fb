//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::fmt::Display;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use fanout_core::{ClientId, Envelope};
use futures::{Sink, Stream, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::inbound::run_inbound;
use super::outbound::{OutboundOptions, run_outbound, write};
use crate::config::ServerConfig;
use crate::errors::CloseReason;
use crate::hub::{HubHandle, Mailbox};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Per-session limits and timers.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Outbound mailbox bound.
    pub mailbox_capacity: usize,
    /// Max inbound payload in bytes.
    pub max_message_size: usize,
    /// Read deadline, reset by every inbound frame.
    pub pong_wait: Duration,
    /// Write-side settings.
    pub outbound: OutboundOptions,
}

impl From<&ServerConfig> for SessionConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            mailbox_capacity: config.mailbox_capacity,
            max_message_size: config.max_message_size,
            pong_wait: config.pong_wait(),
            outbound: OutboundOptions {
                ping_period: config.ping_period(),
                write_wait: config.write_wait(),
                coalesce: config.coalesce,
            },
        }
    }
}

/// Split an upgraded socket and run the session on it.
pub async fn serve_socket(
    socket: WebSocket,
    client_id: ClientId,
    hub: HubHandle,
    config: SessionConfig,
    cancel: CancellationToken,
) -> CloseReason {
    let (sink, stream) = socket.split();
    run_session(sink, stream, client_id, hub, config, cancel).await
}

/// Run a session over any frame transport.
///
/// 1. Writes a `register` envelope naming the client's identity straight to
///    the transport, so it never occupies a mailbox slot
/// 2. Registers a fresh mailbox with the hub; aborts if the hub is gone
/// 3. Spawns the outbound pump and runs the inbound pump inline
/// 4. Returns once both pumps stopped, with the reason that ended the session
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_session<K, S, E>(
    mut sink: K,
    stream: S,
    client_id: ClientId,
    hub: HubHandle,
    config: SessionConfig,
    cancel: CancellationToken,
) -> CloseReason
where
    K: Sink<Message> + Unpin + Send + 'static,
    K::Error: Display + Send,
    S: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Display + Send,
{
    match Envelope::welcome(&client_id).to_json() {
        Ok(json) => {
            let welcome = Message::Text(json.into());
            if let Err(reason) = write(&mut sink, welcome, config.outbound.write_wait).await {
                warn!(%reason, "failed to send identity announcement");
                return reason;
            }
        }
        Err(e) => warn!(error = %e, "failed to encode welcome"),
    }

    let (mailbox, rx) = Mailbox::channel(client_id.clone(), config.mailbox_capacity);
    if !hub.register(mailbox.clone()).await {
        let _ = mailbox.close();
        warn!("hub unavailable, dropping connection");
        return CloseReason::Cancelled;
    }

    let started = Instant::now();
    info!(mailbox_capacity = mailbox.capacity(), "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let outbound = tokio::spawn(run_outbound(sink, rx, config.outbound, cancel.clone()));
    let inbound_reason = run_inbound(
        stream,
        client_id,
        &hub,
        config.max_message_size,
        config.pong_wait,
        cancel,
    )
    .await;
    let outbound_reason = outbound
        .await
        .unwrap_or_else(|e| CloseReason::Write(e.to_string()));

    // Whichever pump stopped first carries the cause; the other reports
    // Cancelled or MailboxClosed as a consequence.
    let reason = if matches!(inbound_reason, CloseReason::Cancelled) {
        outbound_reason
    } else {
        inbound_reason
    };

    if reason.is_expected() {
        info!(%reason, "client disconnected");
    } else {
        warn!(%reason, "client disconnected");
    }
    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.kind()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    reason
}
