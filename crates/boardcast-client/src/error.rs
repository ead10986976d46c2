//! Error types for the client layer.

use boardcast_protocol::ProtocolError;
use boardcast_transport::TransportError;

use crate::State;

/// Errors returned by the state machine and the game client.
///
/// Transport and protocol failures are wrapped as-is. The remaining
/// variants are usage errors, rejected synchronously without touching
/// the machine's state.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The operation stayed in one state past the configured ceiling.
    #[error("operation timed out in state {0}")]
    Timeout(State),

    /// Another operation is in flight.
    #[error("busy: operation in progress ({0})")]
    Busy(State),

    /// The call needs the transport to itself but a stream is open.
    #[error("a game stream is active")]
    StreamActive,

    /// The request queue is at capacity. Nothing was enqueued.
    #[error("request queue is full ({0} pending)")]
    QueueFull(usize),

    /// A move or resignation named no game and none is active.
    #[error("no active game")]
    NoActiveGame,
}
