//! The session registry: owns every live session.
//!
//! The registry is a plain map owned by one task (the gateway holds it
//! behind a mutex). Removing a session hands it back to the caller so
//! the resource it owns can be torn down deterministically.

use std::collections::HashMap;
use std::net::IpAddr;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::{Session, SessionConfig, SessionError, SessionId, SessionSummary};

/// Result of a successful [`SessionRegistry::create`].
#[derive(Debug)]
pub struct Admission<R> {
    pub id: SessionId,
    /// Sessions removed to make room: same-IP sessions pending refresh
    /// and expired ones. The caller tears them down.
    pub evicted: Vec<Session<R>>,
}

pub struct SessionRegistry<R> {
    sessions: HashMap<SessionId, Session<R>>,
    config: SessionConfig,
    last_reap: Option<Instant>,
}

impl<R> SessionRegistry<R> {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
            last_reap: None,
        }
    }

    /// Creates a session for a client at `ip`.
    ///
    /// Sessions from the same IP that are pending refresh are replaced.
    /// At the cap, expired sessions are reaped immediately (ignoring the
    /// reap throttle) before giving up. `make` builds the owned resource
    /// once the id is known.
    ///
    /// # Errors
    /// [`SessionError::CapacityExceeded`] when every slot is held by an
    /// active session. Anything evicted before the check is dropped.
    pub fn create(
        &mut self,
        ip: IpAddr,
        make: impl FnOnce(&SessionId) -> R,
    ) -> Result<Admission<R>, SessionError> {
        let refreshing: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.ip == ip && s.pending_refresh)
            .map(|s| s.id.clone())
            .collect();
        let mut evicted: Vec<Session<R>> = refreshing
            .iter()
            .filter_map(|id| self.sessions.remove(id))
            .inspect(|s| info!(session_id = %s.id, %ip, "replacing session pending refresh"))
            .collect();

        if self.sessions.len() >= self.config.max_sessions {
            evicted.extend(self.reap_now());
        }
        if self.sessions.len() >= self.config.max_sessions {
            info!(%ip, max = self.config.max_sessions, "session rejected, at capacity");
            return Err(SessionError::CapacityExceeded {
                max: self.config.max_sessions,
            });
        }

        let mut id = SessionId::generate();
        while self.sessions.contains_key(&id) {
            id = SessionId::generate();
        }
        let resource = make(&id);
        self.sessions
            .insert(id.clone(), Session::new(id.clone(), ip, resource));

        info!(session_id = %id, %ip, active = self.sessions.len(), "session created");
        Ok(Admission { id, evicted })
    }

    pub fn get(&self, id: &SessionId) -> Result<&Session<R>, SessionError> {
        self.sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Result<&mut Session<R>, SessionError> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    /// Removes a session and returns it for teardown.
    pub fn delete(&mut self, id: &SessionId) -> Result<Session<R>, SessionError> {
        let session = self
            .sessions
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        info!(session_id = %id, "session deleted");
        Ok(session)
    }

    /// Records activity without counting a message.
    pub fn touch(&mut self, id: &SessionId) -> Result<(), SessionError> {
        self.get_mut(id)?.touch();
        Ok(())
    }

    /// Counts one client message and records activity.
    pub fn record_message(&mut self, id: &SessionId) -> Result<u64, SessionError> {
        let session = self.get_mut(id)?;
        session.message_count += 1;
        session.touch();
        Ok(session.message_count)
    }

    pub fn mark_pending_refresh(&mut self, id: &SessionId) -> Result<(), SessionError> {
        self.get_mut(id)?.pending_refresh = true;
        debug!(session_id = %id, "session marked pending refresh");
        Ok(())
    }

    pub fn set_logging(&mut self, id: &SessionId, enabled: bool) -> Result<(), SessionError> {
        self.get_mut(id)?.logging_enabled = enabled;
        Ok(())
    }

    pub fn set_debug_log(&mut self, id: &SessionId, enabled: bool) -> Result<(), SessionError> {
        self.get_mut(id)?.debug_log_enabled = enabled;
        Ok(())
    }

    /// Reaps expired sessions, at most once per reap interval.
    pub fn reap_expired(&mut self) -> Vec<Session<R>> {
        if self
            .last_reap
            .is_some_and(|t| t.elapsed() < self.config.reap_interval)
        {
            return Vec::new();
        }
        self.reap_now()
    }

    /// Reaps expired sessions regardless of when the last reap ran.
    pub fn reap_now(&mut self) -> Vec<Session<R>> {
        self.last_reap = Some(Instant::now());
        let timeout = self.config.inactivity_timeout;
        let expired: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.is_expired(timeout))
            .map(|s| s.id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| self.sessions.remove(id))
            .inspect(|s| {
                info!(
                    session_id = %s.id,
                    idle_secs = s.idle_for().as_secs(),
                    "session expired"
                );
            })
            .collect()
    }

    pub fn sessions_by_ip(&self, ip: IpAddr) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|s| s.ip == ip)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Summaries of every session, oldest first.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let mut sessions: Vec<&Session<R>> = self.sessions.values().collect();
        sessions.sort_by_key(|s| s.created_at);
        sessions.into_iter().map(Session::summary).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session<R>> {
        self.sessions.values()
    }

    /// Removes every session, e.g. at shutdown.
    pub fn drain(&mut self) -> Vec<Session<R>> {
        self.sessions.drain().map(|(_, s)| s).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.max_sessions
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
