use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::state::AppState;
use crate::ws::actor;

/// First `room` value of the query string. Repeated keys are allowed; later
/// values are ignored.
pub fn room_from_query(pairs: &[(String, String)]) -> Option<String> {
    pairs
        .iter()
        .find(|(key, _)| key == "room")
        .map(|(_, value)| value.clone())
        .filter(|room| !room.is_empty())
}

/// Reasons a voice upgrade is refused before any socket exists.
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    #[error("Expected websocket")]
    NotWebSocket,

    #[error("Missing room identifier")]
    MissingRoom,

    #[error("WebSocket not supported")]
    Unsupported,
}

impl IntoResponse for UpgradeError {
    fn into_response(self) -> Response {
        let status = match self {
            UpgradeError::NotWebSocket | UpgradeError::MissingRoom => StatusCode::BAD_REQUEST,
            UpgradeError::Unsupported => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

impl From<WebSocketUpgradeRejection> for UpgradeError {
    fn from(rejection: WebSocketUpgradeRejection) -> Self {
        match rejection {
            // The connection itself cannot be upgraded: a server-side limitation
            WebSocketUpgradeRejection::ConnectionNotUpgradable(_) => UpgradeError::Unsupported,
            _ => UpgradeError::NotWebSocket,
        }
    }
}

/// GET /api/realtime/voice?room=ROOM
/// WebSocket upgrade endpoint for voice signaling. No session is required;
/// peers are anonymous until they send an `identity` frame.
pub async fn voice_upgrade(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, UpgradeError> {
    let ws = ws.map_err(|rejection| {
        let err = UpgradeError::from(rejection);
        tracing::warn!(error = %err, "Voice upgrade rejected");
        err
    })?;

    let room_id = room_from_query(&params).ok_or_else(|| {
        tracing::warn!("Voice upgrade without room identifier");
        UpgradeError::MissingRoom
    })?;

    Ok(ws.on_upgrade(move |socket| handle_peer(socket, state, room_id)))
}

async fn handle_peer(socket: WebSocket, state: AppState, room_id: String) {
    actor::run_peer(socket, state, room_id).await;
}
