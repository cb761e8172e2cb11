use crate::voice::protocol::{ClientMessage, ProtocolError};
use crate::voice::state::VoiceHub;

/// What the connection loop should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The peer hung up and has already been removed from the room.
    Hangup,
}

/// Handle one text frame from a peer.
///
/// Malformed frames are logged and dropped; the connection stays open.
pub fn handle_text(hub: &VoiceHub, room_id: &str, peer_id: &str, text: &str) -> Flow {
    dispatch(hub, room_id, peer_id, ClientMessage::parse(text))
}

/// Handle one binary frame, read as UTF-8 JSON.
pub fn handle_binary(hub: &VoiceHub, room_id: &str, peer_id: &str, data: &[u8]) -> Flow {
    dispatch(hub, room_id, peer_id, ClientMessage::parse_binary(data))
}

fn dispatch(
    hub: &VoiceHub,
    room_id: &str,
    peer_id: &str,
    parsed: Result<ClientMessage, ProtocolError>,
) -> Flow {
    let message = match parsed {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(
                room_id = %room_id,
                peer_id = %peer_id,
                error = %e,
                "Ignoring invalid signaling frame"
            );
            return Flow::Continue;
        }
    };

    match message {
        ClientMessage::Identity(meta) => {
            hub.identify(room_id, peer_id, meta);
            Flow::Continue
        }
        ClientMessage::Relay {
            kind,
            target,
            payload,
        } => {
            hub.relay(room_id, peer_id, kind, &target, payload);
            Flow::Continue
        }
        ClientMessage::Hangup => {
            hub.leave(room_id, peer_id);
            Flow::Hangup
        }
        ClientMessage::Ignored => {
            tracing::debug!(room_id = %room_id, peer_id = %peer_id, "Ignoring unhandled signaling frame");
            Flow::Continue
        }
    }
}
