//! Per-user notification fan-out and its Server-Sent-Events delivery.

pub mod events;
pub mod handler;
pub mod producers;
pub mod registry;
pub mod stream;

pub use events::{BadgeDescriptor, MessageSender, RealtimeNotification};
pub use registry::{Listener, ListenerError, NotificationRegistry};
pub use stream::{NotificationStream, StreamFrame, Subscription};
