//! The protocol state machine: one game client's lifecycle on a single
//! transport.
//!
//! The transport cannot serve a stream read and a request at the same
//! time, so every operation runs the same cycle: pause the stream, let
//! the transport quiesce, issue exactly one request (retrying only at
//! the transport level), then reopen the stream. Each step is gated on
//! time spent in the current state and advanced by [`ProtocolMachine::tick`];
//! nothing in this module sleeps.
//!
//! Requests and stream opens run on a spawned task that owns the
//! transport until the call lands. A tick never waits on the network: it
//! starts the call, and a later tick collects the answer.

use std::future::Future;
use std::time::Duration;

use boardcast_protocol::{
    Account, Codec, CreateGameParams, CreatedGame, Endpoint, GameId, JsonCodec,
    MoveAck, ProtocolError, StreamLine, UciMove,
};
use boardcast_transport::{
    ConnectionId, ReadLine, Request, Response, StreamHandle, Transport, TransportError,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::{ClientConfig, ClientError, Operation, Outcome, Recovery, State};

/// Transport-level retry bookkeeping for the in-flight request.
#[derive(Debug, Clone, Copy)]
struct Retry {
    /// 1-based number of the attempt about to run.
    attempt: u32,
    /// Backoff to wait in `RetryBackoff`.
    wait: Duration,
}

impl Retry {
    fn fresh() -> Self {
        Self {
            attempt: 1,
            wait: Duration::ZERO,
        }
    }

    /// Schedules the next attempt: 1×, 2×, 4×… the initial backoff.
    fn backoff(&mut self, initial: Duration) -> Duration {
        self.wait = initial.saturating_mul(2u32.saturating_pow(self.attempt - 1));
        self.attempt += 1;
        self.wait
    }
}

/// A call running on its own task, holding the transport.
///
/// The task hands the transport back when the call answers, hits its
/// deadline, or is cancelled. Dropping this cancels the call.
struct InFlight<T, R> {
    task: JoinHandle<(T, Option<Result<R, TransportError>>)>,
    cancel: oneshot::Sender<()>,
    connection: Option<ConnectionId>,
}

impl<T, R> InFlight<T, R> {
    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Runs `call` until it answers, `limit` passes, or `cancelled` fires.
/// `None` unless the call answered.
async fn bounded<R>(
    limit: Duration,
    cancelled: oneshot::Receiver<()>,
    call: impl Future<Output = Result<R, TransportError>>,
) -> Option<Result<R, TransportError>> {
    tokio::select! {
        answered = tokio::time::timeout(limit, call) => answered.ok(),
        _ = cancelled => None,
    }
}

fn spawn_request<T: Transport>(
    mut transport: T,
    request: Request,
    limit: Duration,
) -> InFlight<T, Response> {
    let connection = transport.id();
    let (cancel, cancelled) = oneshot::channel();
    let task = tokio::spawn(async move {
        let result = bounded(limit, cancelled, transport.request(request)).await;
        (transport, result)
    });
    InFlight {
        task,
        cancel,
        connection,
    }
}

fn spawn_stream<T: Transport>(
    mut transport: T,
    path: String,
    limit: Duration,
) -> InFlight<T, T::Stream> {
    let connection = transport.id();
    let (cancel, cancelled) = oneshot::channel();
    let task = tokio::spawn(async move {
        let result = bounded(limit, cancelled, transport.open_stream(&path)).await;
        (transport, result)
    });
    InFlight {
        task,
        cancel,
        connection,
    }
}

/// A stream that ended or could not be reopened while no operation
/// was running. Reported once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLoss {
    pub game_id: GameId,
    pub reason: String,
}

/// Connection health snapshot for status pages and logs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDiagnostics {
    pub state: State,
    pub streaming: bool,
    pub stream_game: Option<GameId>,
    pub heartbeats: u64,
    pub ms_since_heartbeat: Option<u64>,
    pub consecutive_failures: u32,
    pub ms_since_success: Option<u64>,
    pub connection: Option<String>,
    /// A request or stream open is waiting on the server.
    pub call_in_flight: bool,
    /// Stream lines dropped for exceeding the transport's line cap.
    pub line_overflows: u64,
}

/// Drives create/move/resign calls and the game stream over one
/// [`Transport`].
///
/// At most one operation is in flight. Entry points reject with
/// [`ClientError::Busy`] when not idle; queuing is the caller's job
/// (see [`GameClient`](crate::GameClient)).
pub struct ProtocolMachine<T: Transport> {
    /// `None` while a call has it on a background task.
    transport: Option<T>,
    request_task: Option<InFlight<T, Response>>,
    stream_task: Option<InFlight<T, T::Stream>>,
    config: ClientConfig,
    codec: JsonCodec,
    state: State,
    state_entered: Instant,
    pending: Option<Operation>,
    retry: Retry,
    stream: Option<T::Stream>,
    /// Game whose stream is currently open.
    stream_game: Option<GameId>,
    /// Game whose stream was open when the current operation began.
    resume_game: Option<GameId>,
    /// Game to open a stream for in `ResumingStream` / `StartingStream`.
    follow: Option<GameId>,
    /// The pending stream open is the watchdog's recovery attempt.
    recovering: bool,
    consecutive_failures: u32,
    last_success: Option<Instant>,
    outcome: Option<Outcome>,
    recovery: Option<Recovery>,
    lost: Option<StreamLoss>,
    heartbeats: u64,
    last_heartbeat: Option<Instant>,
    line_overflows: u64,
}

impl<T: Transport> ProtocolMachine<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport: Some(transport),
            request_task: None,
            stream_task: None,
            config,
            codec: JsonCodec,
            state: State::Idle,
            state_entered: Instant::now(),
            pending: None,
            retry: Retry::fresh(),
            stream: None,
            stream_game: None,
            resume_game: None,
            follow: None,
            recovering: false,
            consecutive_failures: 0,
            last_success: None,
            outcome: None,
            recovery: None,
            lost: None,
            heartbeats: 0,
            last_heartbeat: None,
            line_overflows: 0,
        }
    }

    // -----------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------

    /// Starts creating an AI game.
    ///
    /// # Errors
    /// [`ClientError::Busy`] when an operation is in flight, or a
    /// protocol error when `params` are out of range.
    pub fn create_game(&mut self, params: CreateGameParams) -> Result<(), ClientError> {
        self.ensure_idle()?;
        params.validate()?;
        self.begin(Operation::CreateGame(params));
        Ok(())
    }

    /// Starts submitting a move.
    pub fn make_move(&mut self, game_id: GameId, uci: UciMove) -> Result<(), ClientError> {
        self.ensure_idle()?;
        self.begin(Operation::MakeMove { game_id, uci });
        Ok(())
    }

    /// Starts resigning a game.
    pub fn resign_game(&mut self, game_id: GameId) -> Result<(), ClientError> {
        self.ensure_idle()?;
        self.begin(Operation::Resign { game_id });
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), ClientError> {
        if self.state.is_idle() {
            Ok(())
        } else {
            Err(ClientError::Busy(self.state))
        }
    }

    fn begin(&mut self, op: Operation) {
        let mut quiesce = matches!(op, Operation::CreateGame(_));
        let resume = self.stream_game.clone();

        if let Some(reason) = self.unhealthy_reason() {
            warn!(reason, "connection unhealthy, resetting before operation");
            self.reconnect();
            quiesce = true;
        }

        let next = if self.stream.is_some() {
            State::PausingStream
        } else if quiesce {
            State::AwaitingTransportQuiesce
        } else {
            op.action_state()
        };

        debug!(
            operation = %op.kind(),
            game_id = ?op.game_id().map(GameId::as_str),
            streaming = self.stream.is_some(),
            "operation started"
        );
        self.resume_game = resume;
        self.follow = None;
        self.retry = Retry::fresh();
        self.pending = Some(op);
        self.enter(next);
    }

    // -----------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------

    /// Advances the machine by one step.
    ///
    /// The timeout watchdog runs first. At most one request or stream
    /// open is started or collected per call, and a call that has not
    /// answered yet is left running.
    pub async fn tick(&mut self) {
        if self.check_timeout().await {
            return;
        }

        let elapsed = self.state_entered.elapsed();
        match self.state {
            State::Idle => {}
            State::PausingStream => {
                if elapsed >= self.config.stream_stop_delay {
                    self.close_stream();
                    self.enter(State::AwaitingTransportQuiesce);
                }
            }
            State::AwaitingTransportQuiesce => {
                if elapsed >= self.config.transport_quiesce {
                    self.enter_action();
                }
            }
            State::RetryBackoff => {
                if elapsed >= self.retry.wait {
                    self.enter_action();
                }
            }
            State::SubmittingMove | State::Resigning | State::CreatingGame => {
                self.run_action().await;
            }
            State::ResumingStream | State::StartingStream => {
                if elapsed >= self.config.stream_resume_delay {
                    self.resume_stream().await;
                }
            }
        }
    }

    fn enter_action(&mut self) {
        let next = self
            .pending
            .as_ref()
            .map_or(State::Idle, Operation::action_state);
        self.enter(next);
    }

    fn enter(&mut self, next: State) {
        if next != self.state {
            trace!(from = %self.state, to = %next, "state transition");
        }
        self.state = next;
        self.state_entered = Instant::now();
    }

    async fn run_action(&mut self) {
        let Some(op) = self.pending.clone() else {
            self.enter(State::Idle);
            return;
        };

        let result = match self.request_task.take() {
            None => match self.lend() {
                Ok(transport) => {
                    trace!(operation = %op.kind(), attempt = self.retry.attempt, "request started");
                    let limit = self.remaining();
                    self.request_task = Some(spawn_request(transport, op.request(), limit));
                    return;
                }
                Err(e) => Err(e),
            },
            Some(call) if !call.is_finished() => {
                self.request_task = Some(call);
                return;
            }
            Some(call) => match self.land(call, false).await {
                Some(Ok(resp)) => {
                    self.note_alive();
                    Ok(resp)
                }
                Some(Err(e)) => {
                    self.consecutive_failures += 1;
                    Err(e)
                }
                None => {
                    // Ceiling reached mid-request; the watchdog takes over next tick.
                    warn!(state = %self.state, "request exceeded operation ceiling");
                    return;
                }
            },
        };

        match result {
            Ok(resp) if resp.is_success() => self.complete(op, resp),
            Ok(resp) => self.fail(
                op,
                ProtocolError::Status {
                    status: resp.status,
                    body: resp.body,
                }
                .into(),
            ),
            Err(e) if e.is_retryable() && self.retry.attempt < self.config.max_attempts => {
                let attempt = self.retry.attempt;
                let wait = self.retry.backoff(self.config.initial_backoff);
                warn!(
                    operation = %op.kind(),
                    attempt,
                    max_attempts = self.config.max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "request failed, backing off"
                );
                self.enter(State::RetryBackoff);
            }
            Err(e) => self.fail(op, e.into()),
        }
    }

    /// Opens the transport and takes it out for a background call. An
    /// open failure counts against health.
    fn lend(&mut self) -> Result<T, TransportError> {
        let opened = match self.transport.as_mut() {
            Some(transport) => transport.open(),
            None => Err(TransportError::NotOpen),
        };
        if let Err(e) = opened {
            self.consecutive_failures += 1;
            return Err(e);
        }
        self.transport.take().ok_or(TransportError::NotOpen)
    }

    /// Collects a background call and puts the transport back. With
    /// `cancel` the call is stopped first and its answer, if any, ignored
    /// by the caller.
    async fn land<R>(
        &mut self,
        call: InFlight<T, R>,
        cancel: bool,
    ) -> Option<Result<R, TransportError>> {
        let InFlight { task, cancel: stop, .. } = call;
        if cancel {
            let _ = stop.send(());
        }
        match task.await {
            Ok((transport, result)) => {
                self.transport = Some(transport);
                result
            }
            Err(e) => {
                warn!(error = %e, "call task ended abnormally, transport lost");
                Some(Err(TransportError::Disconnected(e.to_string())))
            }
        }
    }

    /// Cancels whatever call is running and recovers the transport.
    async fn abandon_calls(&mut self) {
        if let Some(call) = self.request_task.take() {
            self.land(call, true).await;
        }
        if let Some(call) = self.stream_task.take() {
            self.land(call, true).await;
        }
    }

    /// What is left of the current state's ceiling.
    fn remaining(&self) -> Duration {
        self.config
            .operation_timeout
            .saturating_sub(self.state_entered.elapsed())
    }

    fn complete(&mut self, op: Operation, resp: Response) {
        let body = resp.body.as_bytes();
        match op {
            Operation::CreateGame(params) => match self.codec.decode::<CreatedGame>(body) {
                Ok(created) => {
                    info!(game_id = %created.id, color = %params.color, "game created");
                    self.outcome = Some(Outcome::Created {
                        game_id: created.id.clone(),
                        color: params.color,
                    });
                    self.pending = None;
                    self.resume_game = None;
                    self.follow = Some(created.id);
                    self.enter(State::StartingStream);
                }
                Err(e) => self.fail(Operation::CreateGame(params), e.into()),
            },
            Operation::MakeMove { game_id, uci } => match self.codec.decode::<MoveAck>(body) {
                Ok(MoveAck { ok: true }) => {
                    info!(%game_id, %uci, "move accepted");
                    self.outcome = Some(Outcome::Moved { game_id, uci });
                    self.pending = None;
                    self.after_operation();
                }
                Ok(MoveAck { ok: false }) => {
                    let reason = format!("move {uci} rejected by server");
                    self.fail(Operation::MakeMove { game_id, uci }, ProtocolError::Rejected(reason).into());
                }
                Err(e) => self.fail(Operation::MakeMove { game_id, uci }, e.into()),
            },
            Operation::Resign { game_id } => {
                info!(%game_id, "game resigned");
                self.outcome = Some(Outcome::Resigned { game_id });
                self.pending = None;
                self.resume_game = None;
                self.enter(State::Idle);
            }
        }
    }

    fn fail(&mut self, op: Operation, err: ClientError) {
        warn!(operation = %op.kind(), error = %err, "operation failed");
        self.outcome = Some(op.failed(err.to_string()));
        self.pending = None;
        self.after_operation();
    }

    /// Reopens the stream that was paused for the operation, if any.
    fn after_operation(&mut self) {
        match self.resume_game.take() {
            Some(game) => {
                self.follow = Some(game);
                self.enter(State::ResumingStream);
            }
            None => self.enter(State::Idle),
        }
    }

    // -----------------------------------------------------------------
    // Watchdog and health
    // -----------------------------------------------------------------

    /// Forces a reset when the machine has been stuck in one state past
    /// the ceiling, then schedules one attempt to reopen the stream of the
    /// game it was working on. A recovery attempt that itself times out is
    /// reported as failed and not retried.
    async fn check_timeout(&mut self) -> bool {
        if self.state.is_idle() {
            return false;
        }
        let elapsed = self.state_entered.elapsed();
        if elapsed < self.config.operation_timeout {
            return false;
        }

        let stuck = self.state;
        let known_game = self
            .pending
            .as_ref()
            .and_then(Operation::game_id)
            .cloned()
            .or_else(|| self.follow.clone())
            .or_else(|| self.resume_game.clone())
            .or_else(|| self.stream_game.clone());

        warn!(
            state = %stuck,
            elapsed_ms = elapsed.as_millis() as u64,
            game_id = ?known_game.as_ref().map(GameId::as_str),
            "operation timed out, forcing connection reset"
        );

        self.abandon_calls().await;
        if let Some(op) = self.pending.take() {
            self.outcome = Some(op.failed(ClientError::Timeout(stuck).to_string()));
        }
        let was_recovering = self.recovering;
        self.reconnect();

        if let Some(game) = known_game {
            if was_recovering {
                warn!(game_id = %game, "game stream could not be restored");
                self.recovery = Some(Recovery::Failed {
                    game_id: game,
                    error: ClientError::Timeout(stuck).to_string(),
                });
            } else {
                self.follow = Some(game);
                self.recovering = true;
                self.enter(State::ResumingStream);
            }
        }
        true
    }

    fn unhealthy_reason(&self) -> Option<&'static str> {
        if self.consecutive_failures >= self.config.max_consecutive_failures {
            return Some("too many consecutive failures");
        }
        if self
            .last_success
            .is_some_and(|t| t.elapsed() > self.config.stale_after)
        {
            return Some("no success within staleness window");
        }
        None
    }

    /// Whether the next operation can run without a proactive reset.
    pub fn is_healthy(&self) -> bool {
        self.unhealthy_reason().is_none()
    }

    /// Drops the stream and the connection context, reopens a fresh one,
    /// and returns to `Idle` with health counters cleared. A call still
    /// running is cancelled first.
    pub async fn reset_connection(&mut self) {
        self.abandon_calls().await;
        self.reconnect();
    }

    fn reconnect(&mut self) {
        info!(connection = ?self.connection_id().map(|id| id.to_string()), "resetting connection");
        self.close_stream();
        match self.transport.as_mut() {
            Some(transport) => {
                transport.close();
                if let Err(e) = transport.open() {
                    warn!(error = %e, "reopening transport after reset failed");
                }
            }
            None => warn!("no transport to reopen after reset"),
        }
        self.consecutive_failures = 0;
        self.last_success = Some(Instant::now());
        self.pending = None;
        self.resume_game = None;
        self.follow = None;
        self.recovering = false;
        self.enter(State::Idle);
    }

    fn note_alive(&mut self) {
        self.consecutive_failures = 0;
        self.last_success = Some(Instant::now());
    }

    // -----------------------------------------------------------------
    // Stream
    // -----------------------------------------------------------------

    /// Starts, or collects, the stream open for `follow`, then settles in
    /// `Idle`.
    async fn resume_stream(&mut self) {
        let Some(game) = self.follow.clone() else {
            self.recovering = false;
            self.enter(State::Idle);
            return;
        };

        let opened = match self.stream_task.take() {
            None => {
                self.close_stream();
                match self.lend() {
                    Ok(transport) => {
                        let path = Endpoint::GameStream(&game).path();
                        let limit = self.remaining();
                        self.stream_task = Some(spawn_stream(transport, path, limit));
                        return;
                    }
                    Err(e) => Err(e),
                }
            }
            Some(call) if !call.is_finished() => {
                self.stream_task = Some(call);
                return;
            }
            Some(call) => match self.land(call, false).await {
                Some(Ok(stream)) => Ok(stream),
                Some(Err(e)) => {
                    self.consecutive_failures += 1;
                    Err(e)
                }
                None => {
                    warn!(game_id = %game, "stream open exceeded operation ceiling");
                    return;
                }
            },
        };

        self.follow = None;
        let recovering = std::mem::take(&mut self.recovering);
        match opened {
            Ok(stream) => {
                info!(game_id = %game, "game stream open");
                self.stream = Some(stream);
                self.stream_game = Some(game.clone());
                self.note_alive();
                if recovering {
                    info!(game_id = %game, "game stream restored after timeout");
                    self.recovery = Some(Recovery::Resumed { game_id: game });
                }
            }
            Err(e) if recovering => {
                warn!(game_id = %game, error = %e, "game stream could not be restored");
                self.recovery = Some(Recovery::Failed {
                    game_id: game,
                    error: e.to_string(),
                });
            }
            Err(e) => {
                warn!(game_id = %game, error = %e, "could not open game stream");
                self.lost = Some(StreamLoss {
                    game_id: game,
                    reason: e.to_string(),
                });
            }
        }
        self.enter(State::Idle);
    }

    fn close_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            debug!(game_id = ?self.stream_game.as_ref().map(GameId::as_str), "game stream closed");
        }
        self.stream_game = None;
    }

    /// Reads up to `max` events from the open stream without waiting.
    ///
    /// Only reads while idle. Heartbeats are counted and dropped. A JSON
    /// line that fails to parse is surfaced as a string value.
    pub fn drain_stream(&mut self, max: usize) -> Vec<Value> {
        let mut events = Vec::new();
        if !self.state.is_idle() {
            return events;
        }
        let Some(stream) = self.stream.as_mut() else {
            return events;
        };

        let mut closed = None;
        while events.len() < max {
            match stream.read_line() {
                ReadLine::Line(line) => match StreamLine::classify(&line) {
                    StreamLine::Heartbeat => {
                        self.heartbeats += 1;
                        self.last_heartbeat = Some(Instant::now());
                    }
                    StreamLine::Event(value) => events.push(value),
                    StreamLine::Malformed(raw) => events.push(Value::String(raw)),
                },
                ReadLine::Overflow => {
                    self.line_overflows += 1;
                    warn!(
                        game_id = ?self.stream_game.as_ref().map(GameId::as_str),
                        "oversized stream line dropped"
                    );
                }
                ReadLine::WouldBlock => break,
                ReadLine::Closed(reason) => {
                    closed = Some(reason.unwrap_or_else(|| "stream ended".to_string()));
                    break;
                }
            }
        }

        if let Some(reason) = closed {
            if let Some(game_id) = self.stream_game.clone() {
                warn!(%game_id, %reason, "game stream lost");
                self.lost = Some(StreamLoss { game_id, reason });
            }
            self.close_stream();
        }
        events
    }

    /// Closes the stream if no operation is running.
    pub fn stop_stream(&mut self) {
        if self.state.is_idle() {
            self.close_stream();
        }
    }

    // -----------------------------------------------------------------
    // One-shot results
    // -----------------------------------------------------------------

    pub fn take_outcome(&mut self) -> Option<Outcome> {
        self.outcome.take()
    }

    pub fn take_recovery(&mut self) -> Option<Recovery> {
        self.recovery.take()
    }

    pub fn take_stream_loss(&mut self) -> Option<StreamLoss> {
        self.lost.take()
    }

    // -----------------------------------------------------------------
    // Account check
    // -----------------------------------------------------------------

    /// Verifies the API token. A single attempt with no backoff, so an
    /// interactive caller is never held up by retries.
    pub async fn check_account(&mut self) -> Result<Account, ClientError> {
        self.ensure_idle()?;
        if self.stream.is_some() {
            return Err(ClientError::StreamActive);
        }
        let transport = self.transport.as_mut().ok_or(TransportError::NotOpen)?;
        transport.open()?;

        let request = Request::get(Endpoint::Account.path());
        let result = tokio::time::timeout(self.config.operation_timeout, transport.request(request))
            .await
            .map_err(|_| ClientError::Timeout(State::Idle))?;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                self.consecutive_failures += 1;
                return Err(e.into());
            }
        };
        self.note_alive();
        if !resp.is_success() {
            return Err(ProtocolError::Status {
                status: resp.status,
                body: resp.body,
            }
            .into());
        }
        let account: Account = self.codec.decode(resp.body.as_bytes())?;
        info!(username = %account.username, "account verified");
        Ok(account)
    }

    /// Closes everything. The machine is idle and unconnected afterwards.
    ///
    /// A call still running is cancelled without waiting; its task drops
    /// the transport it holds.
    pub fn shutdown(&mut self) {
        let request = self.request_task.take();
        let stream = self.stream_task.take();
        if request.is_some() || stream.is_some() {
            debug!("cancelling call in flight");
        }
        self.close_stream();
        if let Some(transport) = self.transport.as_mut() {
            transport.close();
        }
        self.pending = None;
        self.resume_game = None;
        self.follow = None;
        self.recovering = false;
        self.enter(State::Idle);
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    pub fn state(&self) -> State {
        self.state
    }

    pub fn pending(&self) -> Option<&Operation> {
        self.pending.as_ref()
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stream_game(&self) -> Option<&GameId> {
        self.stream_game.as_ref()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether a request or stream open is waiting on the server.
    pub fn has_call_in_flight(&self) -> bool {
        self.request_task.is_some() || self.stream_task.is_some()
    }

    fn connection_id(&self) -> Option<ConnectionId> {
        self.transport
            .as_ref()
            .and_then(|transport| transport.id())
            .or_else(|| self.request_task.as_ref().and_then(|call| call.connection))
            .or_else(|| self.stream_task.as_ref().and_then(|call| call.connection))
    }

    pub fn diagnostics(&self) -> MachineDiagnostics {
        MachineDiagnostics {
            state: self.state,
            streaming: self.stream.is_some(),
            stream_game: self.stream_game.clone(),
            heartbeats: self.heartbeats,
            ms_since_heartbeat: self.last_heartbeat.map(|t| t.elapsed().as_millis() as u64),
            consecutive_failures: self.consecutive_failures,
            ms_since_success: self.last_success.map(|t| t.elapsed().as_millis() as u64),
            connection: self.connection_id().map(|id| id.to_string()),
            call_in_flight: self.has_call_in_flight(),
            line_overflows: self.line_overflows,
        }
    }
}
