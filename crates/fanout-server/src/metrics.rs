//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Call once at startup; a second install fails with [`BuildError`].
/// Without a recorder every metric macro is a no-op.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render the Prometheus text exposition.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket connections accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Open WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket connections ended (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Connection lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Payloads accepted into a mailbox (counter).
pub const HUB_MESSAGES_ROUTED_TOTAL: &str = "hub_messages_routed_total";
/// Direct envelopes whose target was not registered (counter).
pub const HUB_MESSAGES_DROPPED_TOTAL: &str = "hub_messages_dropped_total";
/// Members removed because their mailbox was full or closed (counter).
pub const HUB_EVICTIONS_TOTAL: &str = "hub_evictions_total";
/// Registered members (gauge).
pub const HUB_CLIENTS_REGISTERED: &str = "hub_clients_registered";
