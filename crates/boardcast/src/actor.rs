//! Session actor: one tokio task per session that owns its game client.
//!
//! The task advances the client on a fixed tick and serves commands from
//! an mpsc channel in between, so commands and ticks never interleave.
//! Every event the client produces goes straight to the fan-out.

use std::time::Duration;

use boardcast_client::{
    ClientError, GameClient, GameStatus, MachineDiagnostics, QueuedRequest, Submitted,
};
use boardcast_session::SessionId;
use boardcast_tick::{TickConfig, TickScheduler};
use boardcast_transport::Transport;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{BoardcastError, EventFanout};

/// How long [`SessionHandle::shutdown`] waits for the task to finish an
/// in-flight tick before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Commands sent to a session actor.
pub(crate) enum SessionCommand {
    Submit {
        request: QueuedRequest,
        reply: oneshot::Sender<Result<Submitted, ClientError>>,
    },
    Status {
        reply: oneshot::Sender<GameStatus>,
    },
    /// Forget the active game and stop its stream.
    Reset {
        reply: oneshot::Sender<()>,
    },
    Diagnostics {
        reply: oneshot::Sender<MachineDiagnostics>,
    },
    Shutdown,
}

/// Cloneable sender side of a session actor.
///
/// The gateway takes one out of the registry and releases the registry
/// lock before awaiting, so a slow session never blocks the others.
#[derive(Debug, Clone)]
pub(crate) struct SessionLink {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionLink {
    async fn call<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> SessionCommand,
    ) -> Result<R, BoardcastError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| BoardcastError::SessionGone(self.session_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| BoardcastError::SessionGone(self.session_id.clone()))
    }

    pub(crate) async fn submit(
        &self,
        request: QueuedRequest,
    ) -> Result<Submitted, BoardcastError> {
        Ok(self
            .call(|reply| SessionCommand::Submit { request, reply })
            .await??)
    }

    pub(crate) async fn status(&self) -> Result<GameStatus, BoardcastError> {
        self.call(|reply| SessionCommand::Status { reply }).await
    }

    pub(crate) async fn reset(&self) -> Result<(), BoardcastError> {
        self.call(|reply| SessionCommand::Reset { reply }).await
    }

    pub(crate) async fn diagnostics(&self) -> Result<MachineDiagnostics, BoardcastError> {
        self.call(|reply| SessionCommand::Diagnostics { reply }).await
    }
}

/// What the session registry owns for each session.
///
/// Dropping the handle closes the command channel, which also stops the
/// task; [`shutdown`](Self::shutdown) additionally waits for it.
#[derive(Debug)]
pub struct SessionHandle {
    link: SessionLink,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &SessionId {
        &self.link.session_id
    }

    pub(crate) fn link(&self) -> SessionLink {
        self.link.clone()
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the actor and waits for it to report its abandoned work.
    pub async fn shutdown(self) {
        let Self { link, mut task } = self;
        // Err means the actor is already gone.
        let _ = link.sender.send(SessionCommand::Shutdown).await;
        drop(link);

        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
            warn!("session actor did not stop in time, aborting");
            task.abort();
        }
    }
}

/// Spawns the actor for `session_id` and returns its handle.
pub(crate) fn spawn_session<T: Transport>(
    session_id: SessionId,
    client: GameClient<T>,
    fanout: EventFanout,
    tick: Duration,
    command_capacity: usize,
) -> SessionHandle {
    let (sender, receiver) = mpsc::channel(command_capacity.max(1));
    let span = info_span!("session", session_id = %session_id);
    let actor = SessionActor {
        session_id: session_id.clone(),
        client,
        fanout,
        scheduler: TickScheduler::new(TickConfig::every(tick).labeled("session")),
        receiver,
    };
    let task = tokio::spawn(actor.run().instrument(span));

    SessionHandle {
        link: SessionLink { session_id, sender },
        task,
    }
}

struct SessionActor<T: Transport> {
    session_id: SessionId,
    client: GameClient<T>,
    fanout: EventFanout,
    scheduler: TickScheduler,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl<T: Transport> SessionActor<T> {
    async fn run(mut self) {
        info!("session actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                _ = self.scheduler.wait_for_tick() => {
                    self.client.tick().await;
                    self.publish();
                    self.scheduler.record_tick_end();
                }
            }
        }

        self.client.shutdown();
        self.publish();
        info!(ticks = self.scheduler.tick_count(), "session actor stopped");
    }

    fn handle(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Submit { request, reply } => {
                let kind = request.kind();
                let result = self.client.submit(request);
                debug!(?kind, ?result, "request submitted");
                let _ = reply.send(result);
                self.publish();
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(self.client.status());
            }
            SessionCommand::Reset { reply } => {
                self.client.reset();
                let _ = reply.send(());
            }
            SessionCommand::Diagnostics { reply } => {
                let _ = reply.send(self.client.diagnostics());
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn publish(&mut self) {
        for event in self.client.take_events() {
            self.fanout.publish(&self.session_id, event);
        }
    }
}
