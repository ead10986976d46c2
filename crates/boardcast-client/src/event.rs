//! Events a client hands to its subscribers.

use boardcast_protocol::{Color, GameId};
use serde::Serialize;
use serde_json::Value;

use crate::OperationKind;

/// Message attached to a [`Notice::ConnectionRecovered`].
pub const RECOVERED_MESSAGE: &str = "Connection timeout recovered - game stream restored";

/// Either a stream event as received or a notice the client made up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientEvent {
    /// A game-stream line, passed through untouched.
    Upstream(Value),
    Notice(Notice),
}

impl ClientEvent {
    /// The `type` field, when the event has one.
    pub fn event_type(&self) -> Option<&str> {
        match self {
            Self::Upstream(value) => value.get("type").and_then(Value::as_str),
            Self::Notice(notice) => Some(notice.event_type()),
        }
    }
}

impl From<Notice> for ClientEvent {
    fn from(notice: Notice) -> Self {
        Self::Notice(notice)
    }
}

/// Events synthesized from operation outcomes and connection changes.
///
/// Serialized with a `type` tag, e.g.
/// `{"type":"gameCreated","gameId":"abc","color":"white"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Notice {
    GameCreated {
        game_id: GameId,
        color: Color,
    },
    GameCreationFailed {
        error: String,
    },
    GameResigned {
        game_id: GameId,
    },
    OperationFailed {
        operation: OperationKind,
        game_id: Option<GameId>,
        error: String,
    },
    ConnectionRecovered {
        game_id: GameId,
        message: String,
    },
    RecoveryFailed {
        game_id: GameId,
        error: String,
    },
    StreamLost {
        game_id: GameId,
        reason: String,
    },
}

impl Notice {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::GameCreated { .. } => "gameCreated",
            Self::GameCreationFailed { .. } => "gameCreationFailed",
            Self::GameResigned { .. } => "gameResigned",
            Self::OperationFailed { .. } => "operationFailed",
            Self::ConnectionRecovered { .. } => "connectionRecovered",
            Self::RecoveryFailed { .. } => "recoveryFailed",
            Self::StreamLost { .. } => "streamLost",
        }
    }

    pub fn recovered(game_id: GameId) -> Self {
        Self::ConnectionRecovered {
            game_id,
            message: RECOVERED_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_game_created_serializes_with_type_tag() {
        let event = ClientEvent::from(Notice::GameCreated {
            game_id: GameId::new("abc"),
            color: Color::White,
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "gameCreated", "gameId": "abc", "color": "white"})
        );
    }

    #[test]
    fn test_upstream_serializes_untouched() {
        let raw = json!({"type": "gameState", "moves": "e2e4"});
        let event = ClientEvent::Upstream(raw.clone());
        assert_eq!(serde_json::to_value(&event).unwrap(), raw);
        assert_eq!(event.event_type(), Some("gameState"));
    }

    #[test]
    fn test_recovered_carries_fixed_message() {
        let value = serde_json::to_value(Notice::recovered(GameId::new("g1"))).unwrap();
        assert_eq!(value["type"], "connectionRecovered");
        assert_eq!(value["message"], RECOVERED_MESSAGE);
    }

    #[test]
    fn test_operation_failed_names_operation() {
        let value = serde_json::to_value(Notice::OperationFailed {
            operation: OperationKind::MakeMove,
            game_id: None,
            error: "no active game".into(),
        })
        .unwrap();
        assert_eq!(value["operation"], "makeMove");
        assert!(value["gameId"].is_null());
    }
}
