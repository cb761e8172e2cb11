//! Notification producers used by business actions once their records are
//! persisted. Delivery is fire-and-forget; callers never wait on clients.

use chrono::{DateTime, Utc};

use super::events::{BadgeDescriptor, MessageSender, RealtimeNotification};
use super::registry::NotificationRegistry;

/// A one-to-one conversation between two users.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub user_a_id: String,
    pub user_b_id: String,
}

impl Conversation {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.user_a_id == user_id || self.user_b_id == user_id
    }

    /// Members other than `user_id`.
    pub fn others<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        [self.user_a_id.as_str(), self.user_b_id.as_str()]
            .into_iter()
            .filter(move |member| *member != user_id)
    }
}

/// A stored direct message.
#[derive(Debug, Clone)]
pub struct DirectMessage {
    pub id: String,
    pub body: String,
    pub sender: MessageSender,
    pub created_at: DateTime<Utc>,
}

/// A newly created badge award.
#[derive(Debug, Clone)]
pub struct BadgeAward {
    pub id: String,
    pub badge: BadgeDescriptor,
    pub reason: Option<String>,
    pub awarded_at: DateTime<Utc>,
}

/// Notify the other conversation member(s) about a new direct message.
/// Returns the number of listeners reached.
pub fn notify_direct_message(
    registry: &NotificationRegistry,
    conversation: &Conversation,
    message: &DirectMessage,
) -> usize {
    let targets: Vec<&str> = conversation.others(&message.sender.id).collect();
    if targets.is_empty() {
        return 0;
    }

    let event = RealtimeNotification::DirectMessage {
        conversation_id: conversation.id.clone(),
        message_id: message.id.clone(),
        body: message.body.clone(),
        sender: message.sender.clone(),
        created_at: message.created_at,
    };

    let delivered = registry.emit_many(targets, &event);
    tracing::debug!(
        conversation_id = %conversation.id,
        message_id = %message.id,
        delivered,
        "Direct message notification emitted"
    );
    delivered
}

/// Emit one `badge_awarded` event per award to the recipient.
pub fn notify_badges_awarded(
    registry: &NotificationRegistry,
    user_id: &str,
    awards: &[BadgeAward],
) -> usize {
    awards
        .iter()
        .map(|award| {
            let event = RealtimeNotification::BadgeAwarded {
                award_id: award.id.clone(),
                badge: award.badge.clone(),
                reason: award.reason.clone(),
                awarded_at: award.awarded_at,
            };
            registry.emit(user_id, &event)
        })
        .sum()
}
