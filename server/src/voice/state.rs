use axum::extract::ws::Message;
use dashmap::DashMap;
use rand::Rng;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::voice::protocol::{relayed_frame, PeerMeta, PeerSummary, RelayKind, ServerMessage};
use crate::ws::PeerSender;

/// One live connection inside a room.
#[derive(Debug)]
struct Participant {
    peer_id: String,
    sender: PeerSender,
    meta: Option<PeerMeta>,
}

impl Participant {
    fn summary(&self) -> PeerSummary {
        PeerSummary {
            peer_id: self.peer_id.clone(),
            meta: self.meta.clone(),
        }
    }
}

/// Participants of one room, in join order.
#[derive(Debug, Default)]
struct Room {
    participants: Vec<Participant>,
}

impl Room {
    fn participant_mut(&mut self, peer_id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.peer_id == peer_id)
    }

    fn participant(&self, peer_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.peer_id == peer_id)
    }

    fn take(&mut self, peer_id: &str) -> Option<Participant> {
        let index = self.participants.iter().position(|p| p.peer_id == peer_id)?;
        Some(self.participants.remove(index))
    }

    /// Send to everyone but `exclude`. Returns peers whose channel is closed.
    fn broadcast(&self, room_id: &str, message: &ServerMessage, exclude: Option<&str>) -> Vec<String> {
        let text = message.to_json();
        let mut stale = Vec::new();
        for participant in &self.participants {
            if Some(participant.peer_id.as_str()) == exclude {
                continue;
            }
            if participant.sender.send(Message::Text(text.clone().into())).is_err() {
                tracing::warn!(
                    room_id = %room_id,
                    peer_id = %participant.peer_id,
                    "Failed to send signaling message, peer channel closed"
                );
                stale.push(participant.peer_id.clone());
            }
        }
        stale
    }
}

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct JoinResult {
    /// Id allocated to the new peer.
    pub peer_id: String,
    /// Peers already in the room at join time.
    pub existing_peers: Vec<PeerSummary>,
}

/// In-memory voice signaling hub.
///
/// Rooms are created on first join and evicted as soon as they are empty.
/// All room mutations and the sends they trigger happen under the room's
/// DashMap entry lock, so every participant sees one room's events in the
/// order the hub processed them.
#[derive(Debug, Clone, Default)]
pub struct VoiceHub {
    /// room_id -> Room
    rooms: Arc<DashMap<String, Room>>,
}

/// 128 random bits, hex encoded.
pub fn generate_peer_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

impl VoiceHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new peer to a room, creating the room if needed.
    ///
    /// The new peer gets `init` with every other participant; the others get
    /// `peer-join`.
    pub fn join(&self, room_id: &str, sender: PeerSender) -> JoinResult {
        let peer_id = generate_peer_id();

        let (stale, existing_peers) = {
            let mut room = self.rooms.entry(room_id.to_string()).or_default();
            let existing_peers: Vec<PeerSummary> =
                room.participants.iter().map(Participant::summary).collect();

            let init = ServerMessage::Init {
                peer_id: peer_id.clone(),
                peers: existing_peers.clone(),
            };
            if sender.send(Message::Text(init.to_json().into())).is_err() {
                tracing::warn!(room_id = %room_id, peer_id = %peer_id, "Failed to send init");
            }

            let stale = room.broadcast(
                room_id,
                &ServerMessage::PeerJoin {
                    peer_id: peer_id.clone(),
                },
                None,
            );

            room.participants.push(Participant {
                peer_id: peer_id.clone(),
                sender,
                meta: None,
            });

            tracing::info!(
                room_id = %room_id,
                peer_id = %peer_id,
                participants = room.participants.len(),
                "Peer joined voice room"
            );

            (stale, existing_peers)
        };
        self.evict_stale(room_id, stale);

        JoinResult {
            peer_id,
            existing_peers,
        }
    }

    /// Attach identity to a peer and announce it to the rest of the room.
    /// Unknown rooms or peers are ignored.
    pub fn identify(&self, room_id: &str, peer_id: &str, meta: PeerMeta) {
        let stale = {
            let Some(mut room) = self.rooms.get_mut(room_id) else {
                return;
            };
            let Some(participant) = room.participant_mut(peer_id) else {
                return;
            };
            participant.meta = Some(meta.clone());

            tracing::debug!(
                room_id = %room_id,
                peer_id = %peer_id,
                user_id = %meta.user_id,
                "Peer identified"
            );

            room.broadcast(
                room_id,
                &ServerMessage::PeerInfo {
                    peer_id: peer_id.to_string(),
                    meta,
                },
                Some(peer_id),
            )
        };
        self.evict_stale(room_id, stale);
    }

    /// Forward a handshake frame from one peer to another in the same room.
    ///
    /// Returns true if the frame was handed to the target's channel. Missing
    /// senders or targets are silent drops.
    pub fn relay(
        &self,
        room_id: &str,
        from: &str,
        kind: RelayKind,
        target: &str,
        payload: Map<String, Value>,
    ) -> bool {
        let failed_target = {
            let Some(room) = self.rooms.get(room_id) else {
                return false;
            };
            if room.participant(from).is_none() {
                return false;
            }
            let Some(participant) = room.participant(target) else {
                tracing::debug!(
                    room_id = %room_id,
                    peer_id = %from,
                    target = %target,
                    kind = kind.as_str(),
                    "Relay target not in room, dropping"
                );
                return false;
            };

            let frame = relayed_frame(payload, from);
            match participant.sender.send(Message::Text(frame.into())) {
                Ok(()) => None,
                Err(_) => {
                    tracing::warn!(
                        room_id = %room_id,
                        peer_id = %from,
                        target = %target,
                        kind = kind.as_str(),
                        "Failed to forward signal, target channel closed"
                    );
                    Some(target.to_string())
                }
            }
        };

        match failed_target {
            Some(target) => {
                self.evict_stale(room_id, vec![target]);
                false
            }
            None => true,
        }
    }

    /// Remove a peer, close its channel, tell the rest of the room and evict
    /// the room once empty.
    ///
    /// Safe to call from every disconnect path: only the call that actually
    /// removes the peer broadcasts. Returns whether this call removed it.
    pub fn leave(&self, room_id: &str, peer_id: &str) -> bool {
        let stale = {
            let Some(mut room) = self.rooms.get_mut(room_id) else {
                return false;
            };
            let Some(participant) = room.take(peer_id) else {
                return false;
            };

            // Receiver may already be gone; nothing left to close then.
            let _ = participant.sender.send(Message::Close(None));

            tracing::info!(
                room_id = %room_id,
                peer_id = %peer_id,
                participants = room.participants.len(),
                "Peer left voice room"
            );

            room.broadcast(
                room_id,
                &ServerMessage::PeerLeave {
                    peer_id: peer_id.to_string(),
                },
                Some(peer_id),
            )
        };

        // Checked again under the shard lock so a concurrent join survives.
        if self
            .rooms
            .remove_if(room_id, |_, room| room.participants.is_empty())
            .is_some()
        {
            tracing::debug!(room_id = %room_id, "Voice room evicted");
        }

        self.evict_stale(room_id, stale);
        true
    }

    /// Peers whose channel turned out closed get the normal leave cleanup.
    fn evict_stale(&self, room_id: &str, stale: Vec<String>) {
        for peer_id in stale {
            self.leave(room_id, &peer_id);
        }
    }

    pub fn participant_count(&self, room_id: &str) -> usize {
        self.rooms
            .get(room_id)
            .map(|room| room.participants.len())
            .unwrap_or(0)
    }

    pub fn peers(&self, room_id: &str) -> Vec<PeerSummary> {
        self.rooms
            .get(room_id)
            .map(|room| room.participants.iter().map(Participant::summary).collect())
            .unwrap_or_default()
    }

    pub fn contains_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
