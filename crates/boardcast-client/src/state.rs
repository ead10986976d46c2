//! States of the protocol machine and the operations it carries.

use std::fmt;

use boardcast_protocol::{Color, CreateGameParams, Endpoint, GameId, UciMove};
use boardcast_transport::Request;
use serde::Serialize;

/// Where the protocol machine is in its operation cycle.
///
/// ```text
///              ┌──────────── stream open? ────────────┐
///   Idle ──op──┤                                      ▼
///              │                               PausingStream
///              │                                      │
///              ├─ create / after reset ─▶ AwaitingTransportQuiesce
///              │                                      │
///              └─ move / resign ──────▶ SubmittingMove | Resigning | CreatingGame
///                                          │      ▲
///                            retryable ────┘      └──── RetryBackoff
///                                          │
///                     ResumingStream | StartingStream ──▶ Idle
/// ```
///
/// A watchdog reset lands in `Idle`, then goes through `ResumingStream`
/// when there is a game whose stream should come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum State {
    Idle,
    PausingStream,
    AwaitingTransportQuiesce,
    SubmittingMove,
    ResumingStream,
    Resigning,
    CreatingGame,
    StartingStream,
    RetryBackoff,
}

impl State {
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }

    /// States that own the transport for a request.
    pub fn is_action(self) -> bool {
        matches!(self, Self::SubmittingMove | Self::Resigning | Self::CreatingGame)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::PausingStream => "pausing_stream",
            Self::AwaitingTransportQuiesce => "awaiting_transport_quiesce",
            Self::SubmittingMove => "submitting_move",
            Self::ResumingStream => "resuming_stream",
            Self::Resigning => "resigning",
            Self::CreatingGame => "creating_game",
            Self::StartingStream => "starting_stream",
            Self::RetryBackoff => "retry_backoff",
        };
        f.write_str(name)
    }
}

/// Which kind of operation an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    CreateGame,
    MakeMove,
    Resign,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateGame => "create_game",
            Self::MakeMove => "make_move",
            Self::Resign => "resign",
        })
    }
}

/// The single in-flight operation of a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateGame(CreateGameParams),
    MakeMove { game_id: GameId, uci: UciMove },
    Resign { game_id: GameId },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateGame(_) => OperationKind::CreateGame,
            Self::MakeMove { .. } => OperationKind::MakeMove,
            Self::Resign { .. } => OperationKind::Resign,
        }
    }

    /// The state that issues this operation's request.
    pub fn action_state(&self) -> State {
        match self {
            Self::CreateGame(_) => State::CreatingGame,
            Self::MakeMove { .. } => State::SubmittingMove,
            Self::Resign { .. } => State::Resigning,
        }
    }

    pub fn game_id(&self) -> Option<&GameId> {
        match self {
            Self::CreateGame(_) => None,
            Self::MakeMove { game_id, .. } | Self::Resign { game_id } => Some(game_id),
        }
    }

    pub(crate) fn request(&self) -> Request {
        match self {
            Self::CreateGame(params) => {
                Request::post(Endpoint::CreateAiGame.path(), Some(params.to_form()))
            }
            Self::MakeMove { game_id, uci } => {
                Request::post(Endpoint::Move(game_id, uci).path(), None)
            }
            Self::Resign { game_id } => Request::post(Endpoint::Resign(game_id).path(), None),
        }
    }

    pub(crate) fn failed(self, error: String) -> Outcome {
        match self {
            Self::CreateGame(_) => Outcome::CreateFailed { error },
            Self::MakeMove { game_id, uci } => Outcome::MoveFailed { game_id, uci, error },
            Self::Resign { game_id } => Outcome::ResignFailed { game_id, error },
        }
    }
}

/// Result of the most recently completed operation.
///
/// Held by the machine until taken, and taken exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created { game_id: GameId, color: Color },
    CreateFailed { error: String },
    Moved { game_id: GameId, uci: UciMove },
    MoveFailed { game_id: GameId, uci: UciMove, error: String },
    Resigned { game_id: GameId },
    ResignFailed { game_id: GameId, error: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Moved { .. } | Self::Resigned { .. })
    }
}

/// What the timeout watchdog managed after forcing a reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    Resumed { game_id: GameId },
    Failed { game_id: GameId, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_state_maps_each_operation() {
        let game = GameId::new("g1");
        let uci: UciMove = "e2e4".parse().unwrap();
        assert_eq!(
            Operation::CreateGame(CreateGameParams::default()).action_state(),
            State::CreatingGame
        );
        assert_eq!(
            Operation::MakeMove { game_id: game.clone(), uci }.action_state(),
            State::SubmittingMove
        );
        assert_eq!(Operation::Resign { game_id: game }.action_state(), State::Resigning);
    }

    #[test]
    fn test_request_for_move_has_no_body() {
        let op = Operation::MakeMove {
            game_id: GameId::new("g1"),
            uci: "e7e8q".parse().unwrap(),
        };
        let req = op.request();
        assert_eq!(req.path, "/api/board/game/g1/move/e7e8q");
        assert!(req.body.is_none());
    }

    #[test]
    fn test_failed_keeps_operation_context() {
        let outcome = Operation::Resign { game_id: GameId::new("g1") }.failed("boom".into());
        assert_eq!(
            outcome,
            Outcome::ResignFailed { game_id: GameId::new("g1"), error: "boom".into() }
        );
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_state_display_is_snake_case() {
        assert_eq!(State::AwaitingTransportQuiesce.to_string(), "awaiting_transport_quiesce");
        assert!(State::Idle.is_idle());
        assert!(State::Resigning.is_action());
        assert!(!State::RetryBackoff.is_action());
    }
}
