//! Event fan-out: every session's events on one broadcast channel.
//!
//! Subscribers receive all sessions' events and filter by `sessionId`
//! themselves. A subscriber that falls behind by more than the channel
//! capacity loses the oldest messages and is told how many.

use std::time::{SystemTime, UNIX_EPOCH};

use boardcast_client::ClientEvent;
use boardcast_session::SessionId;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{trace, warn};

/// One fanned-out event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanoutMessage {
    pub session_id: SessionId,
    pub event: ClientEvent,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct EventFanout {
    sender: broadcast::Sender<FanoutMessage>,
}

impl EventFanout {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends to every current subscriber. Returns how many received it;
    /// with no subscribers the event is dropped.
    pub fn publish(&self, session_id: &SessionId, event: ClientEvent) -> usize {
        trace!(%session_id, event_type = ?event.event_type(), "fan-out");
        let message = FanoutMessage {
            session_id: session_id.clone(),
            event,
            timestamp: unix_millis(),
        };
        self.sender.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscriber {
        Subscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// One consumer of the fan-out.
#[derive(Debug)]
pub struct Subscriber {
    receiver: broadcast::Receiver<FanoutMessage>,
}

impl Subscriber {
    /// Waits for the next message. `None` once the fan-out is gone.
    pub async fn recv(&mut self) -> Option<FanoutMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Everything available right now, without waiting.
    pub fn poll_events(&mut self) -> Vec<FanoutMessage> {
        let mut messages = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return messages,
            }
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
