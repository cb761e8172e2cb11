use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::state::AppState;
use crate::voice::signaling::{self, Flow};

/// How long the writer gets to flush queued frames after the reader stops.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Run the actor-per-connection pattern for one voice peer.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from the peer's channel
/// - Ping task: pings periodically, closes the socket if no pong comes back
/// - Reader loop: dispatches incoming frames to the signaling hub
///
/// However the loop ends (hangup, close frame, error, pong timeout), the
/// peer goes through the hub's idempotent leave.
pub async fn run_peer(socket: WebSocket, state: AppState, room_id: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Join sends `init` into our channel before the writer starts; it is buffered.
    let peer_id = state.voice.join(&room_id, tx.clone()).peer_id;

    tracing::info!(room_id = %room_id, peer_id = %peer_id, "Voice peer connected");

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    let ping_tx = tx.clone();
    let ping_interval = state.realtime.ping_interval();
    let pong_timeout = state.realtime.pong_timeout();
    let ping_peer = peer_id.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(ping_interval);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died, connection is gone
                break;
            }

            match timeout(pong_timeout, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!(peer_id = %ping_peer, "Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    let flow = signaling::handle_text(&state.voice, &room_id, &peer_id, text.as_str());
                    if flow == Flow::Hangup {
                        tracing::info!(room_id = %room_id, peer_id = %peer_id, "Peer hung up");
                        break;
                    }
                }
                Message::Binary(data) => {
                    let flow = signaling::handle_binary(&state.voice, &room_id, &peer_id, &data);
                    if flow == Flow::Hangup {
                        tracing::info!(room_id = %room_id, peer_id = %peer_id, "Peer hung up");
                        break;
                    }
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        room_id = %room_id,
                        peer_id = %peer_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    room_id = %room_id,
                    peer_id = %peer_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(room_id = %room_id, peer_id = %peer_id, "WebSocket stream ended");
                break;
            }
        }
    }

    ping_handle.abort();

    // No-op if the peer already hung up. Otherwise this queues our close frame.
    state.voice.leave(&room_id, &peer_id);

    // Let the writer flush what is still queued, ending with the close frame.
    drop(tx);
    if timeout(FLUSH_TIMEOUT, &mut writer_handle).await.is_err() {
        writer_handle.abort();
    }

    tracing::info!(room_id = %room_id, peer_id = %peer_id, "Voice peer disconnected");
}

/// Writer task: receives messages from the peer channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed, connection is broken
            break;
        }
        if closing {
            break;
        }
    }
}
