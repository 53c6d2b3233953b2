//! In-process fan-out for real-time portal events.
//!
//! Whatever receives pushes from the backend (a socket listener, a polling
//! task) publishes them here; views subscribe and stop receiving as soon as
//! their `Subscription` is dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 64;

/// An event pushed to the portal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortalEvent {
    Notification {
        #[serde(default)]
        id: Option<String>,
        title: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    BalanceUpdated {
        account_id: String,
        balance: f64,
        #[serde(default)]
        currency: Option<String>,
    },
    /// Published by the API client when a token refresh fails.
    SessionExpired,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PortalEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventBus { sender }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Delivers `event` to every live subscriber and returns how many there were.
    pub fn publish(&self, event: PortalEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                debug!("No subscribers for {:?}", event);
                0
            }
        }
    }

    /// Parses a raw JSON push (`{"type": "balance_updated", ...}`) and publishes it.
    pub fn publish_json(&self, raw: &str) -> Result<usize, serde_json::Error> {
        let event: PortalEvent = serde_json::from_str(raw)?;
        Ok(self.publish(event))
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<PortalEvent>,
}

impl Subscription {
    /// Waits for the next event. Returns `None` once the bus is gone.
    ///
    /// A subscriber that falls behind loses the oldest events; the gap is
    /// logged and reading resumes with the oldest event still buffered.
    pub async fn next(&mut self) -> Option<PortalEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged; dropped oldest events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns a buffered event without waiting.
    pub fn try_next(&mut self) -> Option<PortalEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged; dropped oldest events");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
