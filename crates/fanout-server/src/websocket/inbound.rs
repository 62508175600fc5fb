//! Inbound pump: transport frames to routed envelopes.

use std::borrow::Cow;
use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::Message;
use fanout_core::{ClientId, Envelope};
use futures::{Stream, StreamExt};
use tokio::time::timeout_at;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::liveness::Liveness;
use crate::errors::CloseReason;
use crate::hub::HubHandle;

/// Read frames until the peer goes away, the read deadline passes, a frame
/// is too large, or `cancel` fires.
///
/// Each text or binary frame is decoded with the session identity stamped as
/// sender and submitted to the hub. On exit this pump unregisters the
/// session and cancels `cancel` so the outbound pump stops too.
pub async fn run_inbound<S, E>(
    mut stream: S,
    client_id: ClientId,
    hub: &HubHandle,
    max_message_size: usize,
    pong_wait: Duration,
    cancel: CancellationToken,
) -> CloseReason
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let reason = read_loop(
        &mut stream,
        &client_id,
        hub,
        max_message_size,
        pong_wait,
        &cancel,
    )
    .await;
    debug!(client_id = %client_id, %reason, "inbound pump stopped");
    hub.unregister(client_id).await;
    cancel.cancel();
    reason
}

async fn read_loop<S, E>(
    stream: &mut S,
    client_id: &ClientId,
    hub: &HubHandle,
    max_message_size: usize,
    pong_wait: Duration,
    cancel: &CancellationToken,
) -> CloseReason
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut liveness = Liveness::new(pong_wait);
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => return CloseReason::Cancelled,
            next = timeout_at(liveness.deadline(), stream.next()) => next,
        };
        let msg = match next {
            Err(_) => return CloseReason::ReadTimeout(liveness.window()),
            Ok(None) => return CloseReason::PeerClosed,
            Ok(Some(Err(e))) => return CloseReason::Read(e.to_string()),
            Ok(Some(Ok(msg))) => msg,
        };
        liveness.touch();

        let text = match &msg {
            Message::Text(t) => {
                if let Some(reason) = oversized(t.len(), max_message_size) {
                    return reason;
                }
                Cow::Borrowed(t.as_str())
            }
            Message::Binary(b) => {
                if let Some(reason) = oversized(b.len(), max_message_size) {
                    return reason;
                }
                String::from_utf8_lossy(b)
            }
            Message::Ping(_) | Message::Pong(_) => {
                trace!("keepalive frame");
                continue;
            }
            Message::Close(_) => return CloseReason::PeerClosed,
        };

        hub.route(Envelope::decode(&text, client_id)).await;
    }
}

fn oversized(size: usize, limit: usize) -> Option<CloseReason> {
    (size > limit).then_some(CloseReason::FrameTooLarge { size, limit })
}
