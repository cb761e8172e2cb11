use axum::{
    extract::State,
    http::Request,
    middleware::{self, Next},
    body::Body,
    response::Response,
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::middleware::JwtSecret;
use crate::notifications::handler as notification_handler;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the AuthUser extractor can find it.
async fn inject_jwt_secret(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Voice signaling (anonymous, room picked by query param)
    let voice_routes = Router::new().route(
        "/api/realtime/voice",
        get(ws_handler::voice_upgrade),
    );

    // Notification stream (session required, AuthUser extractor validates token)
    let notification_routes = Router::new().route(
        "/api/realtime/notifications",
        get(notification_handler::notification_stream),
    );

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(voice_routes)
        .merge(notification_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
