//! Peer-to-peer signaling mailbox.
//!
//! Two browsers playing each other directly exchange connection offers
//! through the gateway. Each game code has a mailbox; a peer polls for
//! what the *other* peer posted. Messages are transient: taken on
//! delivery, or dropped once older than the TTL.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::BoardcastError;

#[derive(Debug, Clone)]
pub struct SignalConfig {
    /// Undelivered messages older than this are dropped.
    pub ttl: Duration,
    /// Minimum time between two cleanups.
    pub cleanup_interval: Duration,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// One posted message, e.g. an SDP offer or an ICE candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub from_peer: String,
    pub payload: Value,
    #[serde(skip)]
    posted_at: Instant,
}

#[derive(Debug)]
pub struct SignalMailbox {
    config: SignalConfig,
    queues: HashMap<String, Vec<SignalMessage>>,
    last_cleanup: Instant,
}

impl SignalMailbox {
    pub fn new(config: SignalConfig) -> Self {
        Self {
            config,
            queues: HashMap::new(),
            last_cleanup: Instant::now(),
        }
    }

    /// Stores a message for the other peer of `game_code`.
    ///
    /// # Errors
    /// [`BoardcastError::Signal`] when the game code, kind or sender is
    /// blank.
    pub fn post(
        &mut self,
        game_code: &str,
        kind: &str,
        from_peer: &str,
        payload: Value,
    ) -> Result<(), BoardcastError> {
        for (name, value) in [("gameCode", game_code), ("type", kind), ("fromPeer", from_peer)] {
            if value.trim().is_empty() {
                return Err(BoardcastError::Signal(format!("missing {name}")));
            }
        }

        self.queues
            .entry(game_code.to_string())
            .or_default()
            .push(SignalMessage {
                kind: kind.to_string(),
                from_peer: from_peer.to_string(),
                payload,
                posted_at: Instant::now(),
            });
        debug!(game_code, kind, from_peer, "signal stored");
        Ok(())
    }

    /// Takes every message for `game_code` that was not posted by
    /// `as_peer`. The peer's own messages stay for the other side.
    pub fn poll(&mut self, game_code: &str, as_peer: &str) -> Vec<SignalMessage> {
        let Some(queue) = self.queues.get_mut(game_code) else {
            return Vec::new();
        };
        let (theirs, ours): (Vec<_>, Vec<_>) =
            queue.drain(..).partition(|m| m.from_peer != as_peer);
        *queue = ours;
        if queue.is_empty() {
            self.queues.remove(game_code);
        }
        theirs
    }

    /// Drops expired messages if the cleanup interval has passed.
    pub fn maybe_cleanup(&mut self) -> usize {
        if self.last_cleanup.elapsed() < self.config.cleanup_interval {
            return 0;
        }
        self.cleanup()
    }

    /// Drops expired messages and empty mailboxes now.
    pub fn cleanup(&mut self) -> usize {
        self.last_cleanup = Instant::now();
        let ttl = self.config.ttl;
        let mut removed = 0;
        self.queues.retain(|_, queue| {
            let before = queue.len();
            queue.retain(|m| m.posted_at.elapsed() <= ttl);
            removed += before - queue.len();
            !queue.is_empty()
        });
        if removed > 0 {
            info!(removed, "expired signaling messages dropped");
        }
        removed
    }

    /// Messages waiting across all game codes.
    pub fn pending(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }
}

impl Default for SignalMailbox {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_poll_returns_only_other_peer_messages() {
        let mut mailbox = SignalMailbox::default();
        mailbox.post("ABCD", "offer", "host", json!({"sdp": "v=0"})).unwrap();
        mailbox.post("ABCD", "ice-candidate", "client", json!({"c": 1})).unwrap();

        let for_client = mailbox.poll("ABCD", "client");
        assert_eq!(for_client.len(), 1);
        assert_eq!(for_client[0].kind, "offer");
        assert!(mailbox.poll("ABCD", "client").is_empty(), "delivered once");

        let for_host = mailbox.poll("ABCD", "host");
        assert_eq!(for_host.len(), 1);
        assert_eq!(mailbox.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_unknown_code_is_empty() {
        let mut mailbox = SignalMailbox::default();
        assert!(mailbox.poll("NOPE", "host").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_missing_field_is_rejected() {
        let mut mailbox = SignalMailbox::default();
        let err = mailbox.post("ABCD", "", "host", Value::Null).unwrap_err();
        assert!(matches!(err, BoardcastError::Signal(_)));
        assert_eq!(mailbox.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_maybe_cleanup_drops_expired_after_interval() {
        let mut mailbox = SignalMailbox::default();
        mailbox.post("ABCD", "offer", "host", Value::Null).unwrap();
        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        mailbox.post("ABCD", "answer", "client", Value::Null).unwrap();

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        assert_eq!(mailbox.maybe_cleanup(), 1);
        assert_eq!(mailbox.pending(), 1);
        tokio::time::advance(Duration::from_secs(10 * 60)).await;
        assert_eq!(mailbox.cleanup(), 1);
        // Cleanup just ran, so the throttled variant does nothing.
        assert_eq!(mailbox.maybe_cleanup(), 0);
    }

    #[test]
    fn test_message_serializes_type_field() {
        let msg = SignalMessage {
            kind: "offer".into(),
            from_peer: "host".into(),
            payload: json!({"sdp": "x"}),
            posted_at: Instant::now(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "offer");
        assert_eq!(value["fromPeer"], "host");
        assert!(value.get("postedAt").is_none());
    }
}
