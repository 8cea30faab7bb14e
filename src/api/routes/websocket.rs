//! Websocket upgrade into the command bridge

use crate::api::AppState;
use crate::bridge::serve_connection;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt, future};

/// GET /websocket - Upgrade to the command channel
///
/// The connection starts unauthenticated; the first message must be an
/// `authRequest` carrying a token issued by this server.
#[utoipa::path(
    get,
    path = "/websocket",
    tag = "websocket",
    responses(
        (status = 101, description = "Switching to the websocket command channel")
    )
)]
pub async fn websocket(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| bridge_socket(socket, state))
}

async fn bridge_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();

    // Text and binary frames in; a close frame or read error ends the stream
    let inbound = stream
        .take_while(|frame| future::ready(matches!(frame, Ok(m) if !matches!(m, Message::Close(_)))))
        .filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(text),
                // Not UTF-8: pass an empty frame so it fails envelope parsing
                Ok(Message::Binary(bytes)) => Some(String::from_utf8(bytes).unwrap_or_default()),
                _ => None,
            })
        });

    let outbound = sink.with(|text: String| future::ready(Ok::<_, axum::Error>(Message::Text(text))));

    serve_connection(inbound, outbound, state.bridge_context()).await;
}
