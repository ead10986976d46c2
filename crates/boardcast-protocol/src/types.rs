//! Types that travel to and from the upstream game service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a game on the upstream service.
///
/// Serialized as the bare string, so `GameId::new("q7ZvsdUF")` becomes
/// `"q7ZvsdUF"` in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

/// A move in UCI long algebraic notation: `e2e4`, `e7e8q`.
///
/// Only the shape is checked (two squares plus an optional promotion
/// piece). Legality is the server's business.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UciMove(String);

impl UciMove {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_square(file: u8, rank: u8) -> bool {
    (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank)
}

impl FromStr for UciMove {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mv = s.trim().to_ascii_lowercase();
        let b = mv.as_bytes();
        let shape_ok = match b.len() {
            4 => is_square(b[0], b[1]) && is_square(b[2], b[3]),
            5 => {
                is_square(b[0], b[1])
                    && is_square(b[2], b[3])
                    && matches!(b[4], b'q' | b'r' | b'b' | b'n')
            }
            _ => false,
        };
        if shape_ok {
            Ok(Self(mv))
        } else {
            Err(ProtocolError::InvalidMessage(format!(
                "not a UCI move: {s:?}"
            )))
        }
    }
}

impl TryFrom<String> for UciMove {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UciMove> for String {
    fn from(mv: UciMove) -> Self {
        mv.0
    }
}

impl fmt::Display for UciMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Game creation
// ---------------------------------------------------------------------------

/// The side the local player asks for when creating a game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
    #[default]
    Random,
}

impl Color {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(Self::White),
            "black" => Ok(Self::Black),
            "random" => Ok(Self::Random),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown color {other:?}"
            ))),
        }
    }
}

/// Parameters for challenging the service's AI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameParams {
    /// AI strength, `1..=8`.
    pub level: u8,
    /// Initial clock per side, in seconds.
    pub clock_limit_secs: u32,
    /// Increment per move, in seconds.
    pub clock_increment_secs: u32,
    pub color: Color,
}

impl CreateGameParams {
    pub const MIN_LEVEL: u8 = 1;
    pub const MAX_LEVEL: u8 = 8;

    /// Checks the parameters before anything is sent.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if !(Self::MIN_LEVEL..=Self::MAX_LEVEL).contains(&self.level) {
            return Err(ProtocolError::InvalidMessage(format!(
                "AI level must be between {} and {}, got {}",
                Self::MIN_LEVEL,
                Self::MAX_LEVEL,
                self.level
            )));
        }
        Ok(())
    }

    /// Form-encoded request body.
    pub fn to_form(&self) -> String {
        format!(
            "level={}&clock.limit={}&clock.increment={}&color={}",
            self.level,
            self.clock_limit_secs,
            self.clock_increment_secs,
            self.color
        )
    }
}

impl Default for CreateGameParams {
    fn default() -> Self {
        Self {
            level: 1,
            clock_limit_secs: 600,
            clock_increment_secs: 0,
            color: Color::Random,
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Body of a successful game creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedGame {
    pub id: GameId,
}

/// Body of a move submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MoveAck {
    pub ok: bool,
}

/// Body of the account endpoint. Only the fields the client reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub username: String,
    #[serde(default)]
    pub id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // UciMove
    // =====================================================================

    #[test]
    fn test_uci_move_parse_plain_and_promotion() {
        assert_eq!("e2e4".parse::<UciMove>().unwrap().as_str(), "e2e4");
        assert_eq!("E7E8Q".parse::<UciMove>().unwrap().as_str(), "e7e8q");
    }

    #[test]
    fn test_uci_move_parse_bad_shape_returns_invalid() {
        for bad in ["", "e2", "e2e9", "i2e4", "e7e8k", "e2e4e5"] {
            assert!(
                matches!(bad.parse::<UciMove>(), Err(ProtocolError::InvalidMessage(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    // =====================================================================
    // Color
    // =====================================================================

    #[test]
    fn test_color_from_str_is_case_insensitive() {
        assert_eq!("White".parse::<Color>().unwrap(), Color::White);
        assert_eq!(" black ".parse::<Color>().unwrap(), Color::Black);
        assert!("green".parse::<Color>().is_err());
    }

    // =====================================================================
    // CreateGameParams
    // =====================================================================

    #[test]
    fn test_validate_level_out_of_range_rejected() {
        let zero = CreateGameParams { level: 0, ..Default::default() };
        let nine = CreateGameParams { level: 9, ..Default::default() };
        assert!(zero.validate().is_err());
        assert!(nine.validate().is_err());
        assert!(CreateGameParams { level: 8, ..Default::default() }.validate().is_ok());
    }

    #[test]
    fn test_to_form_uses_dotted_clock_fields() {
        let params = CreateGameParams {
            level: 3,
            clock_limit_secs: 300,
            clock_increment_secs: 5,
            color: Color::White,
        };
        assert_eq!(
            params.to_form(),
            "level=3&clock.limit=300&clock.increment=5&color=white"
        );
    }
}
