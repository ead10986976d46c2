//! The gateway: consumer-facing operations over every session.
//!
//! [`Gateway`] ties the layers together. It owns the session registry
//! (each session's resource is the handle of its actor task), the admin
//! allow-list, the signaling mailbox and the event fan-out. A web layer
//! calls into it; nothing here knows about HTTP routes or sockets.

use std::net::IpAddr;
use std::sync::{Arc, Weak};

use boardcast_client::{
    ClientError, GameClient, GameStatus, MachineDiagnostics, ProtocolMachine, QueuedRequest,
    Submitted,
};
use boardcast_protocol::{Account, CreateGameParams, UciMove};
use boardcast_session::{
    AdminList, Session, SessionId, SessionRegistry, SessionSummary,
};
use boardcast_tick::{TickConfig, TickScheduler};
use boardcast_transport::{HttpsTransport, Transport};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::actor::{SessionLink, spawn_session};
use crate::{
    BoardcastError, EventFanout, GatewayConfig, SessionHandle, SignalMailbox, SignalMessage,
    Subscriber,
};

/// Builds one transport per session.
type TransportFactory<T> = dyn Fn() -> T + Send + Sync;

/// One row of [`Gateway::sessions_overview`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOverview {
    #[serde(flatten)]
    pub summary: SessionSummary,
    /// `None` if the session's task has stopped.
    pub game: Option<GameStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsOverview {
    pub count: usize,
    pub max: usize,
    pub sessions: Vec<SessionOverview>,
}

struct GatewayState<T: Transport> {
    config: GatewayConfig,
    registry: Mutex<SessionRegistry<SessionHandle>>,
    admins: Mutex<AdminList>,
    signal: Mutex<SignalMailbox>,
    fanout: EventFanout,
    factory: Box<TransportFactory<T>>,
}

/// Cheap to clone; clones share the same sessions.
pub struct Gateway<T: Transport> {
    state: Arc<GatewayState<T>>,
}

impl<T: Transport> Clone for Gateway<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl Gateway<HttpsTransport> {
    /// A gateway whose sessions talk to the configured upstream.
    pub fn https(config: GatewayConfig) -> Result<Self, BoardcastError> {
        let transport = config.transport.clone();
        Self::new(config, move || HttpsTransport::new(transport.clone()))
    }
}

impl<T: Transport> Gateway<T> {
    /// Validates `config` and loads the admin list if one is configured.
    /// `factory` is called once per session and once per account check.
    pub fn new(
        config: GatewayConfig,
        factory: impl Fn() -> T + Send + Sync + 'static,
    ) -> Result<Self, BoardcastError> {
        config.validate()?;
        let admins = match &config.admin_list {
            Some(path) => AdminList::load_from_path(path)?,
            None => AdminList::new(),
        };
        info!(
            base_url = %config.transport.base_url,
            max_sessions = config.session.max_sessions,
            admins = admins.len(),
            "gateway ready"
        );

        Ok(Self {
            state: Arc::new(GatewayState {
                registry: Mutex::new(SessionRegistry::new(config.session.clone())),
                admins: Mutex::new(admins),
                signal: Mutex::new(SignalMailbox::new(config.signal.clone())),
                fanout: EventFanout::new(config.event_capacity),
                factory: Box::new(factory),
                config,
            }),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.state.config
    }

    // -----------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------

    /// Opens a session for a client at `ip` and starts its actor.
    ///
    /// # Errors
    /// [`SessionError::CapacityExceeded`](boardcast_session::SessionError)
    /// when every slot is held by an active session.
    pub async fn create_session(&self, ip: IpAddr) -> Result<SessionId, BoardcastError> {
        let admission = {
            let mut registry = self.state.registry.lock().await;
            registry.create(ip, |id| self.spawn_actor(id))?
        };
        stop_all(admission.evicted).await;
        Ok(admission.id)
    }

    fn spawn_actor(&self, id: &SessionId) -> SessionHandle {
        let config = &self.state.config;
        let client = GameClient::new((self.state.factory)(), config.client.clone());
        spawn_session(
            id.clone(),
            client,
            self.state.fanout.clone(),
            config.session_tick,
            config.command_capacity,
        )
    }

    /// Closes a session. Unfinished requests are reported as
    /// `operationFailed` before the actor stops.
    pub async fn delete_session(&self, id: &SessionId) -> Result<(), BoardcastError> {
        let session = self.state.registry.lock().await.delete(id)?;
        session.resource.shutdown().await;
        Ok(())
    }

    /// Flags a session as about to be replaced by a reload from the same
    /// client.
    pub async fn mark_pending_refresh(&self, id: &SessionId) -> Result<(), BoardcastError> {
        self.state.registry.lock().await.mark_pending_refresh(id)?;
        Ok(())
    }

    pub async fn set_logging(&self, id: &SessionId, enabled: bool) -> Result<(), BoardcastError> {
        self.state.registry.lock().await.set_logging(id, enabled)?;
        Ok(())
    }

    pub async fn set_debug_log(&self, id: &SessionId, enabled: bool) -> Result<(), BoardcastError> {
        self.state.registry.lock().await.set_debug_log(id, enabled)?;
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.state.registry.lock().await.len()
    }

    /// Every session with its game status, oldest first.
    pub async fn sessions_overview(&self) -> SessionsOverview {
        let (rows, max) = {
            let registry = self.state.registry.lock().await;
            let links: Vec<(SessionSummary, SessionLink)> = registry
                .summaries()
                .into_iter()
                .filter_map(|summary| {
                    let link = registry.get(&summary.id).ok()?.resource.link();
                    Some((summary, link))
                })
                .collect();
            (links, registry.capacity())
        };

        let mut sessions = Vec::with_capacity(rows.len());
        for (summary, link) in rows {
            let game = link.status().await.ok();
            sessions.push(SessionOverview { summary, game });
        }
        SessionsOverview {
            count: sessions.len(),
            max,
            sessions,
        }
    }

    /// Looks a session up, counting the call as client activity.
    async fn link(&self, id: &SessionId) -> Result<SessionLink, BoardcastError> {
        let mut registry = self.state.registry.lock().await;
        registry.record_message(id)?;
        Ok(registry.get(id)?.resource.link())
    }

    /// Like [`link`](Self::link) but without counting a message.
    async fn link_quiet(&self, id: &SessionId) -> Result<SessionLink, BoardcastError> {
        let mut registry = self.state.registry.lock().await;
        registry.touch(id)?;
        Ok(registry.get(id)?.resource.link())
    }

    // -----------------------------------------------------------------
    // Game operations
    // -----------------------------------------------------------------

    /// Starts an AI game. Queued if the session is busy; the outcome
    /// arrives as `gameCreated` or `gameCreationFailed`.
    pub async fn create_game(
        &self,
        id: &SessionId,
        params: CreateGameParams,
    ) -> Result<Submitted, BoardcastError> {
        params.validate().map_err(ClientError::from)?;
        self.link(id)
            .await?
            .submit(QueuedRequest::CreateGame(params))
            .await
    }

    /// Plays `uci` in the session's active game.
    pub async fn make_move(&self, id: &SessionId, uci: &str) -> Result<Submitted, BoardcastError> {
        let uci: UciMove = uci.parse().map_err(ClientError::from)?;
        self.link(id)
            .await?
            .submit(QueuedRequest::MakeMove { game_id: None, uci })
            .await
    }

    /// Resigns the session's active game.
    pub async fn resign(&self, id: &SessionId) -> Result<Submitted, BoardcastError> {
        self.link(id)
            .await?
            .submit(QueuedRequest::Resign { game_id: None })
            .await
    }

    /// Forgets the session's game and stops its stream.
    pub async fn reset(&self, id: &SessionId) -> Result<(), BoardcastError> {
        self.link(id).await?.reset().await
    }

    pub async fn status(&self, id: &SessionId) -> Result<GameStatus, BoardcastError> {
        self.link_quiet(id).await?.status().await
    }

    pub async fn diagnostics(&self, id: &SessionId) -> Result<MachineDiagnostics, BoardcastError> {
        self.link_quiet(id).await?.diagnostics().await
    }

    /// Verifies the API token on a connection of its own, outside any
    /// session.
    pub async fn check_account(&self) -> Result<Account, BoardcastError> {
        let mut machine =
            ProtocolMachine::new((self.state.factory)(), self.state.config.client.clone());
        let result = machine.check_account().await;
        machine.shutdown();
        Ok(result?)
    }

    // -----------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------

    /// Receives every session's events from now on.
    pub fn subscribe(&self) -> Subscriber {
        self.state.fanout.subscribe()
    }

    pub fn fanout(&self) -> &EventFanout {
        &self.state.fanout
    }

    // -----------------------------------------------------------------
    // Admins
    // -----------------------------------------------------------------

    pub async fn is_admin(&self, ip: IpAddr) -> bool {
        self.state.admins.lock().await.contains(&ip)
    }

    pub async fn add_admin(&self, ip: IpAddr) -> bool {
        let added = self.state.admins.lock().await.add(ip);
        if added {
            info!(%ip, "admin added");
        }
        added
    }

    pub async fn remove_admin(&self, ip: IpAddr) -> bool {
        let removed = self.state.admins.lock().await.remove(&ip);
        if removed {
            info!(%ip, "admin removed");
        }
        removed
    }

    pub async fn admins(&self) -> Vec<IpAddr> {
        self.state.admins.lock().await.to_vec()
    }

    /// Re-reads the configured admin list file. Without one configured
    /// this keeps the current list.
    pub async fn reload_admins(&self) -> Result<usize, BoardcastError> {
        let Some(path) = &self.state.config.admin_list else {
            return Ok(self.state.admins.lock().await.len());
        };
        let list = AdminList::load_from_path(path)?;
        let count = list.len();
        *self.state.admins.lock().await = list;
        Ok(count)
    }

    // -----------------------------------------------------------------
    // Signaling
    // -----------------------------------------------------------------

    pub async fn signal_post(
        &self,
        game_code: &str,
        kind: &str,
        from_peer: &str,
        payload: Value,
    ) -> Result<(), BoardcastError> {
        self.state
            .signal
            .lock()
            .await
            .post(game_code, kind, from_peer, payload)
    }

    pub async fn signal_poll(&self, game_code: &str, as_peer: &str) -> Vec<SignalMessage> {
        self.state.signal.lock().await.poll(game_code, as_peer)
    }

    // -----------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------

    /// Reaps expired sessions (at most once per reap interval) and drops
    /// expired signaling messages. Returns the number of sessions reaped.
    pub async fn run_maintenance(&self) -> usize {
        let reaped = self.state.registry.lock().await.reap_expired();
        let count = reaped.len();
        stop_all(reaped).await;

        let dropped = self.state.signal.lock().await.maybe_cleanup();
        if count > 0 || dropped > 0 {
            debug!(sessions = count, signals = dropped, "maintenance pass");
        }
        count
    }

    /// Runs [`run_maintenance`](Self::run_maintenance) on the maintenance
    /// tick until every clone of this gateway is dropped.
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        let weak: Weak<GatewayState<T>> = Arc::downgrade(&self.state);
        let tick = self.state.config.maintenance_tick;

        tokio::spawn(async move {
            let mut scheduler = TickScheduler::new(TickConfig::every(tick).labeled("maintenance"));
            loop {
                scheduler.wait_for_tick().await;
                let Some(state) = weak.upgrade() else {
                    break;
                };
                Gateway { state }.run_maintenance().await;
                scheduler.record_tick_end();
            }
            debug!("maintenance loop stopped");
        })
    }

    /// Closes every session.
    pub async fn shutdown(&self) {
        let sessions = self.state.registry.lock().await.drain();
        info!(sessions = sessions.len(), "gateway shutting down");
        stop_all(sessions).await;
    }
}

async fn stop_all(sessions: Vec<Session<SessionHandle>>) {
    for session in sessions {
        if session.resource.is_finished() {
            warn!(session_id = %session.id, "session actor had already stopped");
        }
        session.resource.shutdown().await;
    }
}
