//! FIFO of requests waiting for the machine to go idle.

use std::collections::VecDeque;

use boardcast_protocol::{CreateGameParams, GameId, UciMove};

use crate::{ClientError, OperationKind};

/// A request as submitted by a caller.
///
/// Moves and resignations may leave the game unset; it is bound to the
/// active game when the request is dispatched, not when it is queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuedRequest {
    CreateGame(CreateGameParams),
    MakeMove { game_id: Option<GameId>, uci: UciMove },
    Resign { game_id: Option<GameId> },
}

impl QueuedRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateGame(_) => OperationKind::CreateGame,
            Self::MakeMove { .. } => OperationKind::MakeMove,
            Self::Resign { .. } => OperationKind::Resign,
        }
    }

    pub fn game_id(&self) -> Option<&GameId> {
        match self {
            Self::CreateGame(_) => None,
            Self::MakeMove { game_id, .. } | Self::Resign { game_id } => game_id.as_ref(),
        }
    }
}

/// Bounded FIFO. Entries are never dropped; a full queue refuses new
/// ones instead.
#[derive(Debug)]
pub struct RequestQueue {
    items: VecDeque<QueuedRequest>,
    capacity: usize,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Appends a request and returns its 1-based position.
    pub fn push(&mut self, request: QueuedRequest) -> Result<usize, ClientError> {
        if self.items.len() >= self.capacity {
            return Err(ClientError::QueueFull(self.items.len()));
        }
        self.items.push_back(request);
        Ok(self.items.len())
    }

    pub fn pop(&mut self) -> Option<QueuedRequest> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes everything, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = QueuedRequest> + '_ {
        self.items.drain(..)
    }
}
