//! A single client session and its identity.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Limits for the [`SessionRegistry`](crate::SessionRegistry).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hard cap on concurrent sessions. Each one owns an upstream
    /// connection, so this stays small.
    pub max_sessions: usize,
    /// A session with no activity for longer than this is reaped.
    pub inactivity_timeout: Duration,
    /// Minimum time between two periodic reaps.
    pub reap_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 3,
            inactivity_timeout: Duration::from_secs(30 * 60),
            reap_interval: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Opaque session identifier: 16 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an id received from a caller. No format check is done; an
    /// unknown id simply won't be found.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id (64 bits).
    pub fn generate() -> Self {
        let bytes: [u8; 8] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One client's session.
///
/// `R` is whatever the session exclusively owns. In the gateway it is
/// the handle of the task running the session's game client; dropping
/// the session drops the handle, which stops that task.
#[derive(Debug)]
pub struct Session<R> {
    pub id: SessionId,
    pub ip: IpAddr,
    pub created_at: Instant,
    pub last_activity: Instant,
    pub message_count: u64,
    pub logging_enabled: bool,
    /// Verbose logging. On by default for remote clients only.
    pub debug_log_enabled: bool,
    /// Set when the client announced a reload. The next session from the
    /// same IP replaces this one.
    pub pending_refresh: bool,
    pub resource: R,
}

impl<R> Session<R> {
    pub(crate) fn new(id: SessionId, ip: IpAddr, resource: R) -> Self {
        let now = Instant::now();
        Self {
            id,
            ip,
            created_at: now,
            last_activity: now,
            message_count: 0,
            logging_enabled: true,
            debug_log_enabled: !is_local(ip),
            pending_refresh: false,
            resource,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.idle_for() > timeout
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            ip: self.ip.to_string(),
            logging_enabled: self.logging_enabled,
            debug_log_enabled: self.debug_log_enabled,
            pending_refresh: self.pending_refresh,
            message_count: self.message_count,
            age_secs: self.age().as_secs(),
            idle_secs: self.idle_for().as_secs(),
        }
    }
}

/// Serializable view of a session for status pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: SessionId,
    pub ip: String,
    pub logging_enabled: bool,
    pub debug_log_enabled: bool,
    pub pending_refresh: bool,
    pub message_count: u64,
    pub age_secs: u64,
    pub idle_secs: u64,
}

/// Loopback, private, link-local and unique-local addresses.
pub fn is_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.is_unique_local() || v6.is_unicast_link_local()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_16_hex_chars() {
        let id = SessionId::generate();
        assert_eq!(id.as_str().len(), 16);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, SessionId::generate());
    }

    #[test]
    fn test_is_local_classifies_addresses() {
        assert!(is_local("127.0.0.1".parse().unwrap()));
        assert!(is_local("192.168.4.2".parse().unwrap()));
        assert!(is_local("fd00::1".parse().unwrap()));
        assert!(!is_local("8.8.8.8".parse().unwrap()));
        assert!(!is_local("2001:db8::1".parse().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_session_debug_log_only_for_remote() {
        let local = Session::new(SessionId::new("a"), "10.0.0.5".parse().unwrap(), ());
        let remote = Session::new(SessionId::new("b"), "203.0.113.9".parse().unwrap(), ());
        assert!(!local.debug_log_enabled);
        assert!(remote.debug_log_enabled);
        assert!(local.logging_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_expired_after_timeout() {
        let s = Session::new(SessionId::new("a"), "10.0.0.5".parse().unwrap(), ());
        let timeout = Duration::from_secs(60);
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!s.is_expired(timeout));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(s.is_expired(timeout));
    }
}
