//! `GatewayServer`: Axum HTTP + WebSocket listener and its lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{ServerConfig, SessionConfig};
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::notification::{InProcessSource, NotificationFanOut, NotificationSource, Properties};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::connection::{ClientConnection, ConnectionId};
use crate::websocket::handler::HandlerRegistry;
use crate::websocket::hub::ConnectionHub;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live connections and subscriptions.
    pub hub: Arc<ConnectionHub>,
    /// Command handlers for every session.
    pub registry: Arc<HandlerRegistry>,
    /// Fan-out behind `POST /notify`.
    pub fan_out: Arc<NotificationFanOut>,
    /// Per-session settings.
    pub session: SessionConfig,
    /// Max inbound WebSocket message size.
    pub max_message_size: usize,
    /// Accept loop running flag.
    pub running: Arc<AtomicBool>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the server was constructed.
    pub start_time: Instant,
}

/// The notification gateway.
pub struct GatewayServer {
    config: ServerConfig,
    hub: Arc<ConnectionHub>,
    registry: Arc<HandlerRegistry>,
    source: Arc<InProcessSource>,
    fan_out: Arc<NotificationFanOut>,
    shutdown: ShutdownCoordinator,
    running: Arc<AtomicBool>,
    local_addr: Mutex<Option<SocketAddr>>,
    serve_task: Mutex<Option<JoinHandle<()>>>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl GatewayServer {
    /// Create a server with the default handlers.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry(config, HandlerRegistry::with_defaults())
    }

    /// Create a server with a custom handler registry.
    pub fn with_registry(config: ServerConfig, registry: HandlerRegistry) -> Self {
        let hub = Arc::new(ConnectionHub::new());
        let fan_out = Arc::new(NotificationFanOut::new(hub.clone()));
        let source = Arc::new(InProcessSource::new());
        source.add_message_handler(fan_out.clone());
        Self {
            config,
            hub,
            registry: Arc::new(registry),
            source,
            fan_out,
            shutdown: ShutdownCoordinator::new(),
            running: Arc::new(AtomicBool::new(false)),
            local_addr: Mutex::new(None),
            serve_task: Mutex::new(None),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Bind the listener and start accepting connections.
    ///
    /// Fails with [`ServerError::AlreadyRunning`] if called while running.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        let addr = self.config.bind_addr();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(ServerError::Bind { addr, source });
            }
        };
        let local = match listener.local_addr() {
            Ok(local) => local,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(ServerError::Io(e));
            }
        };

        let token = self.shutdown.reset();
        let app = self.router();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "accept loop failed");
            }
        });

        *self.serve_task.lock() = Some(task);
        *self.local_addr.lock() = Some(local);
        info!(%local, "gateway listening");
        Ok(local)
    }

    /// Stop accepting new connections.
    ///
    /// Open sessions keep running until their clients disconnect.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("stopping gateway");
        }
        self.shutdown.shutdown();
    }

    /// Stop, then wait for the accept loop to finish (bounded by
    /// `shutdown_timeout_secs`).
    pub async fn wait_until_stopped(&self) {
        self.stop();
        let task = self.serve_task.lock().take();
        if let Some(task) = task {
            if !self.shutdown.drain(task, self.config.shutdown_timeout()).await {
                warn!("accept loop did not drain in time");
            }
        }
        *self.local_addr.lock() = None;
        info!("gateway stopped");
    }

    /// Register the fan-out with an external notification source.
    pub fn attach_source(&self, source: &dyn NotificationSource) {
        source.add_message_handler(self.fan_out.clone());
    }

    /// Built-in source; anything published here reaches subscribers.
    pub fn source(&self) -> &Arc<InProcessSource> {
        &self.source
    }

    /// Snapshot of live connections.
    pub fn connections(&self) -> Vec<Arc<ClientConnection>> {
        self.hub.connections()
    }

    /// Connection set and subscription index.
    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.hub
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Whether the accept loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            registry: self.registry.clone(),
            fan_out: self.fan_out.clone(),
            session: self.config.session(),
            max_message_size: self.config.max_message_size,
            running: self.running.clone(),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
        };

        let mut router: Router<AppState> = Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler));
        if self.config.notify_endpoint {
            router = router.route("/notify", post(notify_handler));
        }
        router.layer(TraceLayer::new_for_http()).with_state(state)
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(
                socket,
                ConnectionId::new(),
                state.hub,
                state.registry,
                state.session,
            )
        })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.running.load(Ordering::SeqCst),
        state.hub.connection_count(),
        state.hub.topic_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Body of `POST /notify`.
#[derive(Debug, Deserialize)]
struct NotifyRequest {
    #[serde(default)]
    properties: Properties,
    body: Value,
}

/// POST /notify
async fn notify_handler(
    State(state): State<AppState>,
    Json(request): Json<NotifyRequest>,
) -> Response {
    let Some(report) = state.fan_out.route(&request.properties, &request.body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"accepted": false, "error": "event has no topic"})),
        )
            .into_response();
    };
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "accepted": true,
            "recipients": report.recipients(),
            "delivered": report.delivered,
            "dropped": report.dropped,
        })),
    )
        .into_response()
}
