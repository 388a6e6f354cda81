//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, Utf8Bytes, WebSocket};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::connection::{ClientConnection, ConnectionId};
use super::handler::{HandlerRegistry, SessionContext};
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use super::hub::ConnectionHub;
use crate::config::SessionConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Upper bound on flushing the close frame to a client that stopped reading.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Evicts the connection and stops helper tasks on every exit path.
struct SessionGuard {
    hub: Arc<ConnectionHub>,
    id: ConnectionId,
    cancel: CancellationToken,
    started: Instant,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        let _ = self.hub.remove(&self.id);
        counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        histogram!(WS_CONNECTION_DURATION_SECONDS).record(self.started.elapsed().as_secs_f64());
        info!(conn_id = %self.id, "client disconnected");
    }
}

enum Inbound {
    Frame(WsMessage),
    Closed,
    Idle,
}

async fn next_inbound(
    rx: &mut SplitStream<WebSocket>,
    idle_deadline: Option<time::Instant>,
) -> Inbound {
    let next = match idle_deadline {
        Some(deadline) => match time::timeout_at(deadline, rx.next()).await {
            Ok(next) => next,
            Err(_) => return Inbound::Idle,
        },
        None => rx.next().await,
    };
    match next {
        Some(Ok(frame)) => Inbound::Frame(frame),
        Some(Err(e)) => {
            debug!(error = %e, "websocket receive error");
            Inbound::Closed
        }
        None => Inbound::Closed,
    }
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection with the hub
/// 2. Spawns the writer (outbound queue + periodic pings) and heartbeat tasks
/// 3. Dispatches text and binary frames, one at a time, queueing each reply
/// 4. Ends on close, transport error, heartbeat timeout, or idle timeout
/// 5. Evicts the connection and its subscriptions, even on panic
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: ConnectionId,
    hub: Arc<ConnectionHub>,
    registry: Arc<HandlerRegistry>,
    config: SessionConfig,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));
    let cancel = CancellationToken::new();

    hub.add(connection.clone());
    let _guard = SessionGuard {
        hub: hub.clone(),
        id: conn_id.clone(),
        cancel: cancel.clone(),
        started: connection.connected_at,
    };
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Writer: the only task that touches the sink, so frames leave in queue order.
    let writer_cancel = cancel.clone();
    let ping_every = config.heartbeat_interval;
    let _writer = tokio::spawn(async move {
        let mut ping_interval = time::interval(ping_every);
        let _ = ping_interval.tick().await;
        loop {
            let outbound = tokio::select! {
                frame = send_rx.recv() => {
                    let Some(frame) = frame else { break };
                    WsMessage::Text(Utf8Bytes::from(frame.as_str()))
                }
                _ = ping_interval.tick() => WsMessage::Ping(Bytes::new()),
                () = writer_cancel.cancelled() => break,
            };
            // A client that stops reading blocks the sink; cancellation must still win.
            let sent = tokio::select! {
                sent = ws_tx.send(outbound) => sent.is_ok(),
                () = writer_cancel.cancelled() => false,
            };
            if !sent {
                break;
            }
        }
        let _ = time::timeout(CLOSE_GRACE, ws_tx.close()).await;
    });

    let hb_cancel = cancel.clone();
    let hb_conn = connection.clone();
    let hb_id = conn_id.clone();
    let _heartbeat = tokio::spawn(async move {
        let result = run_heartbeat(
            hb_conn,
            config.heartbeat_interval,
            config.heartbeat_timeout,
            hb_cancel.clone(),
        )
        .await;
        if result == HeartbeatResult::TimedOut {
            warn!(conn_id = %hb_id, "client unresponsive, disconnecting");
            hb_cancel.cancel();
        }
    });

    let ctx = SessionContext {
        connection: connection.clone(),
        hub,
    };
    let idle_after = config.idle_timeout;
    let mut idle_deadline = idle_after.map(deadline_after);

    loop {
        let inbound = tokio::select! {
            () = cancel.cancelled() => break,
            inbound = next_inbound(&mut ws_rx, idle_deadline) => inbound,
        };
        let frame = match inbound {
            Inbound::Frame(frame) => frame,
            Inbound::Closed => break,
            Inbound::Idle => {
                info!("idle timeout, closing session");
                break;
            }
        };
        connection.mark_alive();

        let reply = match frame {
            WsMessage::Text(text) => registry.dispatch(text.as_str(), &ctx).await,
            WsMessage::Binary(data) => registry.dispatch_bytes(&data, &ctx).await,
            WsMessage::Close(_) => {
                info!("client sent close frame");
                break;
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
        };
        idle_deadline = idle_after.map(deadline_after);

        let text = match beacon_protocol::encode(&reply) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "failed to encode reply");
                continue;
            }
        };
        let queued = tokio::select! {
            queued = connection.send_reply(Arc::new(text)) => queued,
            () = cancel.cancelled() => {
                debug!("cancelled while waiting for queue space");
                break;
            }
        };
        if !queued {
            debug!("writer gone, ending session");
            break;
        }
    }
}

fn deadline_after(limit: Duration) -> time::Instant {
    time::Instant::now() + limit
}
