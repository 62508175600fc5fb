//! Outbound pump: mailbox to transport, plus keepalive pings.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::errors::CloseReason;
use crate::hub::Payload;

/// Floor for the keepalive period; a zero period cannot drive a ticker.
const MIN_PING_PERIOD: Duration = Duration::from_millis(1);

/// Write-side settings for one session.
#[derive(Debug, Clone, Copy)]
pub struct OutboundOptions {
    /// Interval between keepalive pings.
    pub ping_period: Duration,
    /// Deadline for each write.
    pub write_wait: Duration,
    /// Join payloads that are already queued into one frame.
    pub coalesce: bool,
}

/// Drain the mailbox into the transport until the mailbox closes, a write
/// fails or times out, or `cancel` fires.
///
/// Sends a keepalive ping every `ping_period`. Never unregisters; on exit
/// it cancels `cancel` so the inbound pump stops and does the cleanup.
pub async fn run_outbound<K>(
    mut sink: K,
    mut rx: mpsc::Receiver<Payload>,
    options: OutboundOptions,
    cancel: CancellationToken,
) -> CloseReason
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let reason = write_loop(&mut sink, &mut rx, options, &cancel).await;
    debug!(%reason, "outbound pump stopped");
    cancel.cancel();
    reason
}

async fn write_loop<K>(
    sink: &mut K,
    rx: &mut mpsc::Receiver<Payload>,
    options: OutboundOptions,
    cancel: &CancellationToken,
) -> CloseReason
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let period = options.ping_period.max(MIN_PING_PERIOD);
    let mut ping = interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let result = tokio::select! {
            () = cancel.cancelled() => {
                send_close(sink, options.write_wait).await;
                return CloseReason::Cancelled;
            }
            payload = rx.recv() => match payload {
                Some(first) => {
                    let frame = if options.coalesce {
                        coalesce(&first, rx)
                    } else {
                        first.to_string()
                    };
                    write(sink, Message::Text(frame.into()), options.write_wait).await
                }
                None => {
                    send_close(sink, options.write_wait).await;
                    return CloseReason::MailboxClosed;
                }
            },
            _ = ping.tick() => {
                trace!("sending keepalive ping");
                write(sink, Message::Ping(Vec::new().into()), options.write_wait).await
            }
        };
        if let Err(reason) = result {
            return reason;
        }
    }
}

/// Join `first` with every payload queued behind it at this moment,
/// separated by newlines.
fn coalesce(first: &Payload, rx: &mut mpsc::Receiver<Payload>) -> String {
    let mut frame = String::from(&**first);
    for _ in 0..rx.len() {
        let Ok(next) = rx.try_recv() else { break };
        frame.push('\n');
        frame.push_str(&next);
    }
    frame
}

/// Send one frame, bounded by `wait`.
pub(crate) async fn write<K>(sink: &mut K, msg: Message, wait: Duration) -> Result<(), CloseReason>
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    match timeout(wait, sink.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(CloseReason::Write(e.to_string())),
        Err(_) => Err(CloseReason::WriteTimeout(wait)),
    }
}

/// Best-effort close frame; the transport may already be gone.
async fn send_close<K>(sink: &mut K, wait: Duration)
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    if let Err(reason) = write(sink, Message::Close(None), wait).await {
        trace!(%reason, "close frame not sent");
    }
}
