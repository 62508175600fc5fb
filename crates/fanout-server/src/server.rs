//! `FanoutServer`: Axum HTTP + WebSocket server around the hub.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use fanout_core::ClientId;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::hub::{HubHandle, HubRouter};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::{SessionConfig, serve_socket};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Submission side of the router.
    pub hub: HubHandle,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Limits applied to every new session.
    pub session: SessionConfig,
    /// Prometheus handle for `/metrics`, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// `/clients` response body.
#[derive(Debug, Clone, Serialize)]
pub struct ClientsResponse {
    /// Registered identities, sorted.
    pub clients: Vec<ClientId>,
    /// Number of registered identities.
    pub count: usize,
}

/// The fan-out server.
pub struct FanoutServer {
    config: ServerConfig,
    hub: HubHandle,
    router: Mutex<Option<HubRouter>>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl FanoutServer {
    /// Create a server. The hub router is started by [`FanoutServer::listen`].
    pub fn new(config: ServerConfig) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (hub, router) = HubHandle::new(config.command_queue_capacity, shutdown.token());
        Self {
            config,
            hub,
            router: Mutex::new(Some(router)),
            shutdown,
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            session: SessionConfig::from(&self.config),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/ping", get(ping_handler))
            .route("/health", get(health_handler))
            .route("/clients", get(clients_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind, start the hub router and serve until shutdown.
    ///
    /// Returns the bound address (useful with port 0) and a handle that
    /// completes after the listener and the router have both stopped.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        self.config.validate()?;
        let ip: IpAddr = self
            .config
            .host
            .parse()
            .map_err(|_| ServerError::InvalidAddress(self.config.host.clone()))?;
        let addr = SocketAddr::new(ip, self.config.port);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr, e))?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let router_task = self.router.lock().take().map(|r| tokio::spawn(r.run()));
        let app = self.router();
        let token = self.shutdown.token();

        info!(addr = %local_addr, "fanout server listening");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "http server failed");
            }
            if let Some(task) = router_task {
                let _ = task.await;
            }
            info!("fanout server stopped");
        });

        Ok((local_addr, handle))
    }

    /// Submission side of the hub.
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws: upgrade and run a session under a fresh identity.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let client_id = ClientId::new();
    debug!(client_id = %client_id, "upgrading connection");
    let cancel = state.shutdown.session_token();
    let config = state.session;
    ws.max_message_size(config.max_message_size)
        .on_upgrade(move |socket| async move {
            let _ = serve_socket(socket, client_id, state.hub, config, cancel).await;
        })
}

/// GET /ping
async fn ping_handler() -> Json<serde_json::Value> {
    Json(json!({ "message": "pong" }))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.hub.client_count()))
}

/// GET /clients
async fn clients_handler(State(state): State<AppState>) -> Json<ClientsResponse> {
    let clients = state.hub.clients();
    let count = clients.len();
    Json(ClientsResponse { clients, count })
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
