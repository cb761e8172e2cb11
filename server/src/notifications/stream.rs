//! One notification subscription turned into a stream of wire frames.
//!
//! The stream starts with a `connected` handshake, then yields each event the
//! registry pushes to its listener, interleaved with heartbeat frames. Dropping
//! the stream (client gone, write failure) unregisters the listener and stops
//! the heartbeat.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::Utc;
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::events::RealtimeNotification;
use super::registry::{Listener, ListenerError, NotificationRegistry};

/// Default keep-alive period for notification streams.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// One frame of the outbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// JSON-encoded [`RealtimeNotification`], sent as a `data:` line.
    Data(String),
    /// Keep-alive comment carrying the current unix time in millis.
    Heartbeat(i64),
}

impl StreamFrame {
    /// Raw event-stream encoding of this frame.
    pub fn to_event_stream(&self) -> String {
        match self {
            StreamFrame::Data(json) => format!("data: {}\n\n", json),
            StreamFrame::Heartbeat(millis) => format!(": heartbeat {}\n\n", millis),
        }
    }
}

/// A registered listener whose events land in a channel.
///
/// Unregisters exactly once, either through [`Subscription::close`] or on drop.
pub struct Subscription {
    registry: NotificationRegistry,
    user_id: String,
    listener: Option<Listener>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl Subscription {
    pub fn open(registry: &NotificationRegistry, user_id: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<String>();

        let listener = Listener::new(move |event| {
            // The handshake belongs to the stream, never to producers
            if event.is_handshake() {
                tracing::debug!("Ignoring connected event pushed through the registry");
                return Ok(());
            }
            let json = serde_json::to_string(event)?;
            tx.send(json).map_err(|_| ListenerError::Closed)
        });
        registry.register(user_id, &listener);

        tracing::info!(user_id = %user_id, "Notification stream subscribed");

        Self {
            registry: registry.clone(),
            user_id: user_id.to_string(),
            listener: Some(listener),
            rx,
        }
    }

    pub fn is_open(&self) -> bool {
        self.listener.is_some()
    }

    /// Unregister the listener. Returns false if it already ran.
    pub fn close(&mut self) -> bool {
        let Some(listener) = self.listener.take() else {
            return false;
        };
        self.registry.unregister(&self.user_id, &listener);
        self.rx.close();
        tracing::info!(user_id = %self.user_id, "Notification stream closed");
        true
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Stream of [`StreamFrame`]s for one open client connection.
pub struct NotificationStream {
    subscription: Subscription,
    handshake: Option<String>,
    heartbeat: Interval,
}

impl NotificationStream {
    pub fn open(registry: &NotificationRegistry, user_id: &str, heartbeat_every: Duration) -> Self {
        let handshake = serde_json::to_string(&RealtimeNotification::connected_now()).ok();
        let subscription = Subscription::open(registry, user_id);

        let mut heartbeat = interval_at(Instant::now() + heartbeat_every, heartbeat_every);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            subscription,
            handshake,
            heartbeat,
        }
    }

    /// Ends the stream early; later polls return `None`.
    pub fn close(&mut self) -> bool {
        self.subscription.close()
    }
}

impl Stream for NotificationStream {
    type Item = StreamFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamFrame>> {
        let this = self.get_mut();

        if let Some(json) = this.handshake.take() {
            return Poll::Ready(Some(StreamFrame::Data(json)));
        }

        if !this.subscription.is_open() {
            return Poll::Ready(None);
        }

        match this.subscription.poll_event(cx) {
            Poll::Ready(Some(json)) => return Poll::Ready(Some(StreamFrame::Data(json))),
            Poll::Ready(None) => {
                this.subscription.close();
                return Poll::Ready(None);
            }
            Poll::Pending => {}
        }

        if this.heartbeat.poll_tick(cx).is_ready() {
            return Poll::Ready(Some(StreamFrame::Heartbeat(Utc::now().timestamp_millis())));
        }

        Poll::Pending
    }
}
