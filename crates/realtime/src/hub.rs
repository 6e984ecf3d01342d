#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use souk_core::RealtimeEvent;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{AuthContext, EventStream, Transport, TransportError};

/// In-process pub/sub keyed by user id. Publishers push, channels subscribe via [`Transport`].
pub struct NotificationHub {
    topics: Mutex<HashMap<String, broadcast::Sender<RealtimeEvent>>>,
    capacity: usize,
}

impl Default for NotificationHub {
    fn default() -> Self { Self::new(1024) }
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        Self { topics: Mutex::new(HashMap::new()), capacity: capacity.max(1) }
    }

    // Subscribes under the lock so a concurrent cleanup never sees the new topic empty.
    fn subscribe(&self, user_id: &str) -> broadcast::Receiver<RealtimeEvent> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.entry(user_id.to_string()).or_insert_with(|| broadcast::channel(self.capacity).0).subscribe()
    }

    /// Deliver to every live connection of `user_id`; returns how many received it.
    /// Topics whose connections have all gone away are dropped here.
    pub fn publish(&self, user_id: &str, event: RealtimeEvent) -> usize {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let live = topics.get(user_id).map(|tx| tx.receiver_count()).unwrap_or(0);
        let delivered = if live == 0 {
            topics.remove(user_id);
            0
        } else {
            topics.get(user_id).and_then(|tx| tx.send(event).ok()).unwrap_or(0)
        };
        debug!(user = %user_id, delivered, "hub: publish");
        delivered
    }

    pub fn subscribers(&self, user_id: &str) -> usize {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let n = topics.get(user_id).map(|tx| tx.receiver_count()).unwrap_or(0);
        if n == 0 {
            topics.remove(user_id);
        }
        n
    }

    /// Number of user topics currently held, after dropping abandoned ones.
    pub fn topics(&self) -> usize {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.retain(|_, tx| tx.receiver_count() > 0);
        topics.len()
    }

    /// Drop the user's topic; open streams end as if the connection was lost.
    pub fn kick(&self, user_id: &str) {
        let removed = self.topics.lock().unwrap_or_else(|e| e.into_inner()).remove(user_id);
        if removed.is_some() {
            debug!(user = %user_id, "hub: topic closed");
        }
    }
}

#[async_trait::async_trait]
impl Transport for NotificationHub {
    async fn open(&self, auth: &AuthContext) -> Result<EventStream, TransportError> {
        let rx = self.subscribe(&auth.user_id);
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => return Some((Ok::<_, TransportError>(ev), rx)),
                    Err(broadcast::error::RecvError::Lagged(n)) => warn!(skipped = n, "hub: subscriber lagged"),
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn auth(user: &str) -> AuthContext {
        AuthContext { user_id: user.into(), endpoint: "inproc://hub".into() }
    }

    #[tokio::test]
    async fn publish_reaches_only_the_addressed_user() {
        let hub = NotificationHub::default();
        let mut a = hub.open(&auth("a")).await.unwrap();
        let _b = hub.open(&auth("b")).await.unwrap();
        assert_eq!(hub.subscribers("a"), 1);

        let delivered = hub.publish("a", RealtimeEvent::new("listing.approved", serde_json::json!({"id": 7})));
        assert_eq!(delivered, 1);
        let ev = a.next().await.unwrap().unwrap();
        assert_eq!(ev.topic, "listing.approved");
        assert_eq!(hub.publish("nobody", RealtimeEvent::new("x", serde_json::Value::Null)), 0);
    }

    #[tokio::test]
    async fn abandoned_topics_are_dropped() {
        let hub = NotificationHub::default();
        let a = hub.open(&auth("a")).await.unwrap();
        let b = hub.open(&auth("b")).await.unwrap();
        let _c = hub.open(&auth("c")).await.unwrap();
        assert_eq!(hub.topics(), 3);
        drop(a);
        drop(b);

        assert_eq!(hub.publish("a", RealtimeEvent::new("x", serde_json::Value::Null)), 0);
        assert_eq!(hub.subscribers("b"), 0);
        assert_eq!(hub.topics(), 1);
        assert_eq!(hub.subscribers("c"), 1);
    }

    #[tokio::test]
    async fn kick_ends_open_streams() {
        let hub = NotificationHub::default();
        let mut s = hub.open(&auth("a")).await.unwrap();
        hub.kick("a");
        assert!(s.next().await.is_none());
        assert_eq!(hub.subscribers("a"), 0);
    }
}
