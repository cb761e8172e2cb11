use std::convert::Infallible;

use axum::{
    extract::State,
    http::header,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
};
use futures_util::{Stream, StreamExt};

use crate::auth::middleware::AuthUser;
use crate::notifications::stream::{NotificationStream, StreamFrame};
use crate::state::AppState;

/// GET /api/realtime/notifications
/// Server-Sent-Events stream of the caller's notifications.
///
/// The subscription lives inside the response body: when the client goes away
/// or a write fails, axum drops the body and the listener is unregistered.
pub async fn notification_stream(
    State(state): State<AppState>,
    user: AuthUser,
) -> impl IntoResponse {
    tracing::info!(user_id = %user.user_id, "Opening notification stream");

    let stream = NotificationStream::open(
        &state.notifications,
        &user.user_id,
        state.realtime.heartbeat_interval(),
    );

    (
        [(header::CACHE_CONTROL, "no-cache, no-transform")],
        Sse::new(into_sse_events(stream)),
    )
}

fn into_sse_events(
    stream: NotificationStream,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    stream.map(|frame| {
        Ok(match frame {
            StreamFrame::Data(json) => Event::default().data(json),
            StreamFrame::Heartbeat(millis) => {
                Event::default().comment(format!("heartbeat {}", millis))
            }
        })
    })
}
