//! JSON text frames exchanged over the voice signaling socket.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity a peer may announce after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerMeta {
    pub user_id: String,
    pub name: String,
}

/// Entry of the `init` peer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSummary {
    pub peer_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub meta: Option<PeerMeta>,
}

/// Messages the hub originates. Relayed offers/answers/candidates are
/// forwarded verbatim and are not modelled here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Init {
        peer_id: String,
        peers: Vec<PeerSummary>,
    },
    #[serde(rename_all = "camelCase")]
    PeerJoin { peer_id: String },
    #[serde(rename_all = "camelCase")]
    PeerInfo { peer_id: String, meta: PeerMeta },
    #[serde(rename_all = "camelCase")]
    PeerLeave { peer_id: String },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        // Plain strings and structs only; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Point-to-point WebRTC handshake messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayKind {
    Offer,
    Answer,
    IceCandidate,
}

impl RelayKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RelayKind::Offer => "offer",
            RelayKind::Answer => "answer",
            RelayKind::IceCandidate => "ice-candidate",
        }
    }
}

/// Messages a peer sends to the hub.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Identity(PeerMeta),
    Relay {
        kind: RelayKind,
        target: String,
        /// The whole original frame, forwarded as-is plus `from`.
        payload: Map<String, Value>,
    },
    Hangup,
    /// Well-formed JSON the hub has no use for: unknown tags, missing fields.
    Ignored,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("binary frame is not valid UTF-8")]
    NotUtf8,
}

impl ClientMessage {
    /// Parse one text frame.
    ///
    /// Only unparseable frames are errors; any object with an unknown or
    /// missing `type`, or missing required fields, is [`ClientMessage::Ignored`].
    pub fn parse(text: &str) -> Result<ClientMessage, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(payload) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let Some(kind) = payload.get("type").and_then(Value::as_str) else {
            return Ok(ClientMessage::Ignored);
        };

        let message = match kind {
            "identity" => {
                match (
                    payload.get("userId").and_then(loose_string),
                    payload.get("name").and_then(loose_string),
                ) {
                    (Some(user_id), Some(name)) => {
                        ClientMessage::Identity(PeerMeta { user_id, name })
                    }
                    _ => ClientMessage::Ignored,
                }
            }
            "offer" => relay(RelayKind::Offer, payload),
            "answer" => relay(RelayKind::Answer, payload),
            "ice-candidate" => relay(RelayKind::IceCandidate, payload),
            "hangup" => ClientMessage::Hangup,
            _ => ClientMessage::Ignored,
        };
        Ok(message)
    }

    pub fn parse_binary(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
        let text = std::str::from_utf8(data).map_err(|_| ProtocolError::NotUtf8)?;
        Self::parse(text)
    }
}

fn relay(kind: RelayKind, payload: Map<String, Value>) -> ClientMessage {
    match payload.get("target").and_then(Value::as_str) {
        Some(target) if !target.is_empty() => ClientMessage::Relay {
            kind,
            target: target.to_string(),
            payload,
        },
        _ => ClientMessage::Ignored,
    }
}

/// Non-empty strings, numbers and `true` are accepted as identity fields.
fn loose_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(number_string(n)),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Whole floats print without a fraction, so `1.0` and `1` name the same user.
fn number_string(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

/// Build the frame forwarded to a relay target: the original fields with
/// `from` set to the sender.
pub fn relayed_frame(mut payload: Map<String, Value>, from: &str) -> String {
    payload.insert("from".to_string(), Value::String(from.to_string()));
    Value::Object(payload).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_identity() {
        let msg = ClientMessage::parse(r#"{"type":"identity","userId":"u1","name":"Hana"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Identity(PeerMeta {
                user_id: "u1".to_string(),
                name: "Hana".to_string(),
            })
        );
    }

    #[test]
    fn test_identity_accepts_numeric_user_id() {
        let msg = ClientMessage::parse(r#"{"type":"identity","userId":42,"name":"Kai"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Identity(meta) if meta.user_id == "42"));
    }

    #[test]
    fn test_identity_whole_float_user_id_has_no_fraction() {
        let msg = ClientMessage::parse(r#"{"type":"identity","userId":1.0,"name":"Kai"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Identity(meta) if meta.user_id == "1"));

        let msg = ClientMessage::parse(r#"{"type":"identity","userId":2.5,"name":"Kai"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Identity(meta) if meta.user_id == "2.5"));
    }

    #[test]
    fn test_identity_without_name_is_ignored() {
        let msg = ClientMessage::parse(r#"{"type":"identity","userId":"u1","name":""}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ignored);
    }

    #[test]
    fn test_parse_offer_keeps_whole_frame() {
        let msg = ClientMessage::parse(r#"{"type":"offer","target":"p2","sdp":"v=0"}"#).unwrap();
        match msg {
            ClientMessage::Relay {
                kind,
                target,
                payload,
            } => {
                assert_eq!(kind, RelayKind::Offer);
                assert_eq!(target, "p2");
                assert_eq!(payload["sdp"], "v=0");
                assert_eq!(payload["type"], "offer");
            }
            other => panic!("expected relay, got {:?}", other),
        }
    }

    #[test]
    fn test_relay_without_target_is_ignored() {
        let msg = ClientMessage::parse(r#"{"type":"ice-candidate","candidate":{}}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ignored);
        let msg = ClientMessage::parse(r#"{"type":"answer","target":7,"sdp":"x"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ignored);
    }

    #[test]
    fn test_unknown_and_untyped_frames_are_ignored() {
        assert_eq!(ClientMessage::parse(r#"{"type":"dance"}"#).unwrap(), ClientMessage::Ignored);
        assert_eq!(ClientMessage::parse(r#"{"hello":1}"#).unwrap(), ClientMessage::Ignored);
        assert_eq!(ClientMessage::parse(r#"{"type":5}"#).unwrap(), ClientMessage::Ignored);
    }

    #[test]
    fn test_malformed_frames_are_errors() {
        assert!(matches!(ClientMessage::parse("not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(ClientMessage::parse("[1,2]"), Err(ProtocolError::NotAnObject)));
        assert!(matches!(
            ClientMessage::parse_binary(&[0xff, 0xfe]),
            Err(ProtocolError::NotUtf8)
        ));
        assert_eq!(
            ClientMessage::parse_binary(br#"{"type":"hangup"}"#).unwrap(),
            ClientMessage::Hangup
        );
    }

    #[test]
    fn test_relayed_frame_overrides_from() {
        let payload = json!({"type":"answer","target":"p1","sdp":"v=0","from":"spoofed"});
        let Value::Object(map) = payload else { unreachable!() };

        let frame: Value = serde_json::from_str(&relayed_frame(map, "p2")).unwrap();
        assert_eq!(frame["from"], "p2");
        assert_eq!(frame["sdp"], "v=0");
        assert_eq!(frame["target"], "p1");
    }

    #[test]
    fn test_server_message_wire_shape() {
        let init = ServerMessage::Init {
            peer_id: "p1".to_string(),
            peers: vec![
                PeerSummary {
                    peer_id: "p0".to_string(),
                    meta: None,
                },
                PeerSummary {
                    peer_id: "p2".to_string(),
                    meta: Some(PeerMeta {
                        user_id: "u2".to_string(),
                        name: "Yui".to_string(),
                    }),
                },
            ],
        };
        let value: Value = serde_json::from_str(&init.to_json()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "init",
                "peerId": "p1",
                "peers": [
                    {"peerId": "p0"},
                    {"peerId": "p2", "meta": {"userId": "u2", "name": "Yui"}}
                ]
            })
        );

        let leave: Value =
            serde_json::from_str(&ServerMessage::PeerLeave { peer_id: "p1".to_string() }.to_json())
                .unwrap();
        assert_eq!(leave, json!({"type": "peer-leave", "peerId": "p1"}));
    }
}
