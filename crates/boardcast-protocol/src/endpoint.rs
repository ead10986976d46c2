//! Paths of the upstream calls, relative to the service base URL.

use crate::{GameId, UciMove};

/// One upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    /// `GET` the authenticated account.
    Account,
    /// `POST` a challenge against the AI.
    CreateAiGame,
    /// `GET` the NDJSON event stream of a game.
    GameStream(&'a GameId),
    /// `POST` a move.
    Move(&'a GameId, &'a UciMove),
    /// `POST` a resignation.
    Resign(&'a GameId),
}

impl Endpoint<'_> {
    pub fn path(&self) -> String {
        match self {
            Self::Account => "/api/account".to_string(),
            Self::CreateAiGame => "/api/challenge/ai".to_string(),
            Self::GameStream(id) => format!("/api/board/game/stream/{id}"),
            Self::Move(id, mv) => format!("/api/board/game/{id}/move/{mv}"),
            Self::Resign(id) => format!("/api/board/game/{id}/resign"),
        }
    }

    /// Whether the call is a `POST`.
    pub fn is_post(&self) -> bool {
        matches!(self, Self::CreateAiGame | Self::Move(..) | Self::Resign(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_builds_game_scoped_routes() {
        let game = GameId::new("abc123");
        let mv: UciMove = "g1f3".parse().unwrap();
        assert_eq!(Endpoint::GameStream(&game).path(), "/api/board/game/stream/abc123");
        assert_eq!(Endpoint::Move(&game, &mv).path(), "/api/board/game/abc123/move/g1f3");
        assert_eq!(Endpoint::Resign(&game).path(), "/api/board/game/abc123/resign");
    }

    #[test]
    fn test_is_post_only_for_mutations() {
        let game = GameId::new("g");
        assert!(!Endpoint::Account.is_post());
        assert!(!Endpoint::GameStream(&game).is_post());
        assert!(Endpoint::CreateAiGame.is_post());
        assert!(Endpoint::Resign(&game).is_post());
    }
}
