pub mod actor;
pub mod handler;

use tokio::sync::mpsc;

/// Sender half of a peer connection's outbound channel.
/// The hub holds one per participant; the writer task drains the receiver.
pub type PeerSender = mpsc::UnboundedSender<axum::extract::ws::Message>;
