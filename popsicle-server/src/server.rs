use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{connected, dispatch, AppState};

pub fn app_router(state: AppState) -> Router {
    Router::new().route("/", get(upgrade)).with_state(state)
}

async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, peer, state))
}

/// Serves one client until it disconnects.
///
/// Requests run concurrently; replies go out in completion order through a
/// single writer. Closing the socket cancels whatever is still in flight and
/// waits for it to unwind.
async fn handle_socket(socket: WebSocket, peer: SocketAddr, state: AppState) {
    info!(%peer, "client connected");
    let (mut sink, mut stream) = socket.split();
    let (replies, mut outbox) = mpsc::unbounded_channel::<Value>();
    let cancel = CancellationToken::new();

    let writer = tokio::spawn(async move {
        while let Some(reply) = outbox.recv().await {
            if let Err(err) = sink.send(Message::Text(reply.to_string().into())).await {
                debug!(%err, "socket closed while replying");
                break;
            }
        }
    });

    let _ = replies.send(connected());

    let mut requests = JoinSet::new();
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                warn!(%peer, %err, "socket error");
                break;
            }
        };

        let state = state.clone();
        let replies = replies.clone();
        let cancel = cancel.child_token();
        requests.spawn(async move {
            let reply = dispatch(&state, text.as_str(), &cancel).await;
            let _ = replies.send(reply);
        });
        while requests.try_join_next().is_some() {}
    }

    cancel.cancel();
    if !requests.is_empty() {
        debug!(%peer, pending = requests.len(), "cancelling in-flight requests");
    }
    while requests.join_next().await.is_some() {}

    drop(replies);
    let _ = writer.await;
    info!(%peer, "client disconnected");
}
