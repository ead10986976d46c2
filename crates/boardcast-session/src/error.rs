//! Error types for the session layer.

use crate::SessionId;

/// Errors returned by the [`SessionRegistry`](crate::SessionRegistry)
/// and the [`AdminList`](crate::AdminList).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Every slot is taken by a session that is still active.
    #[error("session limit reached ({max} active)")]
    CapacityExceeded { max: usize },

    /// No session with this id. It may have been deleted or reaped.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The admin list file could not be read.
    #[error("failed to read admin list: {0}")]
    AdminList(#[from] std::io::Error),
}
