//! Queue-fronted game client.
//!
//! [`GameClient`] wraps a [`ProtocolMachine`] with a [`RequestQueue`] so
//! callers never see `Busy`: a request that arrives while an operation
//! is in flight waits its turn. It also tracks the active game and turns
//! machine results into [`ClientEvent`]s, each reported once.

use boardcast_protocol::{Account, Color, GameId};
use boardcast_transport::Transport;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    ClientConfig, ClientError, ClientEvent, MachineDiagnostics, Notice, OperationKind,
    Outcome, ProtocolMachine, QueuedRequest, Recovery, RequestQueue, State,
};

/// How [`GameClient::submit`] handled a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitted {
    /// Dispatched to the machine right away.
    Accepted,
    /// Waiting behind other work, 1-based.
    Queued { position: usize },
}

/// Snapshot of the client for status queries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    pub active: bool,
    pub game_id: Option<GameId>,
    pub color: Option<Color>,
    pub streaming: bool,
    pub state: State,
    pub queued: usize,
}

#[derive(Debug, Default)]
struct GameSlot {
    game_id: Option<GameId>,
    color: Option<Color>,
}

pub struct GameClient<T: Transport> {
    machine: ProtocolMachine<T>,
    queue: RequestQueue,
    slot: GameSlot,
    events: Vec<ClientEvent>,
}

impl<T: Transport> GameClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            queue: RequestQueue::new(config.queue_capacity),
            machine: ProtocolMachine::new(transport, config),
            slot: GameSlot::default(),
            events: Vec::new(),
        }
    }

    /// Dispatches `request` now if the client is free, otherwise queues it.
    ///
    /// # Errors
    /// Invalid game parameters and [`ClientError::NoActiveGame`] are
    /// reported here when the request is dispatched immediately.
    /// [`ClientError::QueueFull`] when the queue has no room.
    pub fn submit(&mut self, request: QueuedRequest) -> Result<Submitted, ClientError> {
        if let QueuedRequest::CreateGame(params) = &request {
            params.validate()?;
        }

        if self.machine.state().is_idle() && self.queue.is_empty() {
            self.dispatch(request)?;
            return Ok(Submitted::Accepted);
        }

        let kind = request.kind();
        let position = self.queue.push(request)?;
        debug!(operation = %kind, position, "request queued");
        Ok(Submitted::Queued { position })
    }

    fn dispatch(&mut self, request: QueuedRequest) -> Result<(), ClientError> {
        match request {
            QueuedRequest::CreateGame(params) => self.machine.create_game(params),
            QueuedRequest::MakeMove { game_id, uci } => {
                let game_id = self.resolve(game_id)?;
                self.machine.make_move(game_id, uci)
            }
            QueuedRequest::Resign { game_id } => {
                let game_id = self.resolve(game_id)?;
                self.machine.resign_game(game_id)
            }
        }
    }

    fn resolve(&self, game_id: Option<GameId>) -> Result<GameId, ClientError> {
        game_id
            .or_else(|| self.slot.game_id.clone())
            .ok_or(ClientError::NoActiveGame)
    }

    /// Advances the machine, collects what it produced, and starts the
    /// next queued request once it is idle.
    pub async fn tick(&mut self) {
        self.machine.tick().await;
        self.collect_results();

        let max = self.machine.config().max_events_per_tick;
        let upstream = self.machine.drain_stream(max);
        self.events
            .extend(upstream.into_iter().map(ClientEvent::Upstream));
        self.collect_stream_loss();

        self.dispatch_next();
    }

    fn collect_results(&mut self) {
        if let Some(outcome) = self.machine.take_outcome() {
            self.apply_outcome(outcome);
        }
        if let Some(recovery) = self.machine.take_recovery() {
            let notice = match recovery {
                Recovery::Resumed { game_id } => Notice::recovered(game_id),
                Recovery::Failed { game_id, error } => Notice::RecoveryFailed { game_id, error },
            };
            self.events.push(notice.into());
        }
        self.collect_stream_loss();
    }

    fn collect_stream_loss(&mut self) {
        if let Some(loss) = self.machine.take_stream_loss() {
            self.events.push(
                Notice::StreamLost {
                    game_id: loss.game_id,
                    reason: loss.reason,
                }
                .into(),
            );
        }
    }

    fn apply_outcome(&mut self, outcome: Outcome) {
        let notice = match outcome {
            Outcome::Created { game_id, color } => {
                info!(%game_id, "tracking new game");
                self.slot = GameSlot {
                    game_id: Some(game_id.clone()),
                    color: Some(color),
                };
                Notice::GameCreated { game_id, color }
            }
            Outcome::CreateFailed { error } => Notice::GameCreationFailed { error },
            Outcome::Moved { .. } => return,
            Outcome::MoveFailed { game_id, error, .. } => Notice::OperationFailed {
                operation: OperationKind::MakeMove,
                game_id: Some(game_id),
                error,
            },
            Outcome::Resigned { game_id } => {
                if self.slot.game_id.as_ref() == Some(&game_id) {
                    self.slot = GameSlot::default();
                }
                Notice::GameResigned { game_id }
            }
            Outcome::ResignFailed { game_id, error } => Notice::OperationFailed {
                operation: OperationKind::Resign,
                game_id: Some(game_id),
                error,
            },
        };
        self.events.push(notice.into());
    }

    fn dispatch_next(&mut self) {
        while self.machine.state().is_idle() {
            let Some(request) = self.queue.pop() else {
                break;
            };
            let operation = request.kind();
            let game_id = request.game_id().cloned();
            if let Err(e) = self.dispatch(request) {
                warn!(%operation, error = %e, "queued request could not start");
                self.events.push(
                    Notice::OperationFailed {
                        operation,
                        game_id,
                        error: e.to_string(),
                    }
                    .into(),
                );
            }
        }
    }

    /// Events produced since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn status(&self) -> GameStatus {
        GameStatus {
            active: self.slot.game_id.is_some(),
            game_id: self.slot.game_id.clone(),
            color: self.slot.color,
            streaming: self.machine.is_streaming(),
            state: self.machine.state(),
            queued: self.queue.len(),
        }
    }

    /// Forgets the active game. The stream is closed unless an operation
    /// is running, in which case it is left to finish.
    pub fn reset(&mut self) {
        info!(game_id = ?self.slot.game_id.as_ref().map(GameId::as_str), "game slot reset");
        self.slot = GameSlot::default();
        self.machine.stop_stream();
    }

    /// Verifies the API token. See [`ProtocolMachine::check_account`].
    pub async fn check_account(&mut self) -> Result<Account, ClientError> {
        self.machine.check_account().await
    }

    /// Tears the client down. Anything not yet finished is reported as
    /// failed.
    pub fn shutdown(&mut self) {
        let abandoned = self
            .machine
            .pending()
            .map(|op| (op.kind(), op.game_id().cloned()))
            .into_iter()
            .chain(self.queue.drain().map(|r| (r.kind(), r.game_id().cloned())))
            .collect::<Vec<_>>();

        for (operation, game_id) in abandoned {
            self.events.push(
                Notice::OperationFailed {
                    operation,
                    game_id,
                    error: "session closed".to_string(),
                }
                .into(),
            );
        }
        self.machine.shutdown();
    }

    pub fn diagnostics(&self) -> MachineDiagnostics {
        self.machine.diagnostics()
    }

    pub fn machine(&self) -> &ProtocolMachine<T> {
        &self.machine
    }
}
