use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events pushed to a user's open notification streams.
///
/// Serialized with a `type` tag, e.g. `{"type":"badge_awarded", ...}`.
/// New kinds of notification get a new variant here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeNotification {
    /// Handshake written by the stream itself when it opens.
    Connected { timestamp: DateTime<Utc> },

    /// A new direct message in a conversation the recipient belongs to.
    #[serde(rename_all = "camelCase")]
    DirectMessage {
        conversation_id: String,
        message_id: String,
        body: String,
        sender: MessageSender,
        created_at: DateTime<Utc>,
    },

    /// A badge was awarded to the recipient.
    #[serde(rename_all = "camelCase")]
    BadgeAwarded {
        award_id: String,
        badge: BadgeDescriptor,
        #[serde(default)]
        reason: Option<String>,
        awarded_at: DateTime<Utc>,
    },
}

impl RealtimeNotification {
    pub fn connected_now() -> Self {
        RealtimeNotification::Connected {
            timestamp: Utc::now(),
        }
    }

    pub fn is_handshake(&self) -> bool {
        matches!(self, RealtimeNotification::Connected { .. })
    }

    /// Tag used on the wire, handy for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RealtimeNotification::Connected { .. } => "connected",
            RealtimeNotification::DirectMessage { .. } => "direct_message",
            RealtimeNotification::BadgeAwarded { .. } => "badge_awarded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSender {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeDescriptor {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}
