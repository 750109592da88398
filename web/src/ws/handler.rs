use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::*;
use relay::connection::ConnectionId;
use relay::message::{ClientFrame, ServerFrame};
use relay::RouterHandle;
use service::AppState;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};

/// Handshake header some clients send with their logical client id.
pub(crate) const CLIENT_ID_HEADER: &str = "client-id";

/// Upgrades a request to a relay socket. One session per connection; the
/// client binds it to a client id and entities with `REGISTER` afterwards.
pub(crate) async fn socket_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(app_state): State<AppState>,
) -> Response {
    let Some(router) = app_state.router().cloned() else {
        warn!("Rejecting socket upgrade, router not attached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    if let Some(client_id) = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        debug!("Socket handshake carries client id {client_id}");
    }

    let ping_interval = app_state.config.ping_interval();
    let silence_limit = ping_interval + app_state.config.ping_timeout();

    ws.on_upgrade(move |socket| serve_connection(socket, router, ping_interval, silence_limit))
}

async fn serve_connection(
    socket: WebSocket,
    router: RouterHandle,
    ping_interval: Duration,
    silence_limit: Duration,
) {
    let connection_id = ConnectionId::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    if let Err(e) = router.connect(connection_id.clone(), tx) {
        warn!("Dropping socket {connection_id}: {e}");
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut pings = interval(ping_interval);
    pings.set_missed_tick_behavior(MissedTickBehavior::Delay);
    pings.tick().await;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            frame = rx.recv() => {
                // The Router dropped this session's sender.
                let Some(frame) = frame else { break };
                let text = match frame.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode frame for {connection_id}: {e}");
                        continue;
                    }
                };
                let message = Message::Text(text.into());
                if !send_within(&mut ws_tx, message, silence_limit, &connection_id).await {
                    break;
                }
            }
            inbound = ws_rx.next() => {
                let Some(Ok(message)) = inbound else { break };
                last_seen = Instant::now();
                match message {
                    Message::Text(text) => dispatch_frame(&router, &connection_id, text.as_str()),
                    Message::Close(_) => break,
                    // axum answers pings itself; pongs only refresh liveness
                    _ => {}
                }
            }
            _ = pings.tick() => {
                if last_seen.elapsed() > silence_limit {
                    info!("Closing silent connection {connection_id}");
                    break;
                }
                let ping = Message::Ping(Vec::new().into());
                if !send_within(&mut ws_tx, ping, silence_limit, &connection_id).await {
                    break;
                }
                trace!("Sent ping to {connection_id}");
            }
        }
    }

    let _ = timeout(silence_limit, ws_tx.close()).await;
    if let Err(e) = router.disconnect(connection_id.clone()) {
        debug!("Router gone before {connection_id} disconnected: {e}");
    }
}

/// Writes one message to the peer. A peer that has not taken it within `limit`
/// has stopped reading and counts as silent.
async fn send_within(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    message: Message,
    limit: Duration,
    connection_id: &ConnectionId,
) -> bool {
    match timeout(limit, ws_tx.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("Socket write failed for {connection_id}: {e}");
            false
        }
        Err(_) => {
            info!("Closing stalled connection {connection_id}, peer stopped reading");
            false
        }
    }
}

/// Turns one client text frame into the matching Router event. Frames that do
/// not decode are logged and dropped; the connection stays open.
pub(crate) fn dispatch_frame(router: &RouterHandle, connection_id: &ConnectionId, raw: &str) {
    let frame = match ClientFrame::parse(raw) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Ignoring malformed frame from {connection_id}: {e}");
            return;
        }
    };

    let sent = match frame {
        ClientFrame::Register(payload) => match payload.into_registration() {
            Ok(registration) => router.register(connection_id.clone(), registration),
            Err(e) => {
                warn!("Ignoring malformed REGISTER from {connection_id}: {e}");
                return;
            }
        },
        ClientFrame::Message(raw) => router.inbound(connection_id.clone(), raw),
    };

    if let Err(e) = sent {
        warn!("Router unavailable for frame from {connection_id}: {e}");
    }
}
