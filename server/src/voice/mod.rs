//! Mesh voice signaling: room membership and WebRTC handshake relay.

pub mod protocol;
pub mod signaling;
pub mod state;

pub use protocol::{ClientMessage, PeerMeta, PeerSummary, ServerMessage};
pub use state::{JoinResult, VoiceHub};
