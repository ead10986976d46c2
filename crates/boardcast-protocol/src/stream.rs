//! Classification of lines read from a game event stream.

use serde_json::Value;

/// What one stream line turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamLine {
    /// Keep-alive traffic: blank lines and short non-JSON tokens.
    Heartbeat,
    /// A JSON object or array.
    Event(Value),
    /// Looked like JSON but did not parse. Carries the raw text.
    Malformed(String),
}

impl StreamLine {
    /// Classifies a line that has already had its terminator removed.
    ///
    /// A line is an event candidate only when it is longer than two bytes
    /// and opens with `{` or `[`. Everything else is a heartbeat.
    pub fn classify(line: &str) -> Self {
        let looks_like_json =
            line.len() > 2 && (line.starts_with('{') || line.starts_with('['));
        if !looks_like_json {
            return Self::Heartbeat;
        }
        match serde_json::from_str(line) {
            Ok(value) => Self::Event(value),
            Err(e) => {
                tracing::warn!(error = %e, "malformed stream event");
                Self::Malformed(line.to_string())
            }
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Heartbeat)
    }
}
