use crate::config::RealtimeConfig;
use crate::notifications::NotificationRegistry;
use crate::voice::VoiceHub;

/// Shared application state passed to all handlers via axum State extractor.
///
/// The hub and the registry are created once at startup; every clone shares them.
#[derive(Clone)]
pub struct AppState {
    /// Voice rooms and their connected peers
    pub voice: VoiceHub,
    /// Per-user notification listeners
    pub notifications: NotificationRegistry,
    /// HS256 secret for verifying session tokens
    pub jwt_secret: Vec<u8>,
    /// Keep-alive timing for streams and sockets
    pub realtime: RealtimeConfig,
}

impl AppState {
    pub fn new(jwt_secret: impl Into<Vec<u8>>, realtime: RealtimeConfig) -> Self {
        Self {
            voice: VoiceHub::new(),
            notifications: NotificationRegistry::new(),
            jwt_secret: jwt_secret.into(),
            realtime,
        }
    }
}
