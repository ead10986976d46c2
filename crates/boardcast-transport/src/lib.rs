//! Transport layer for boardcast.
//!
//! Provides the [`Transport`] and [`StreamHandle`] traits: one secure
//! connection context per game client, usable either for a single
//! request/response call or for one long-lived line stream.
//!
//! The transport does **not** serialize access itself. Issuing a request
//! while a stream from the same transport is still open is a caller bug;
//! the protocol state machine above is responsible for pausing the
//! stream first.
//!
//! # Feature Flags
//!
//! - `https` (default): HTTPS transport via `reqwest`
//! - `mock`: scripted in-memory transport for tests

mod error;
#[cfg(feature = "https")]
mod https;
mod line;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use error::TransportError;
#[cfg(feature = "https")]
pub use https::{HttpsStream, HttpsTransport, TransportConfig};
pub use line::LineBuffer;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockControl, MockReply, MockStream, MockTransport};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for one opened connection context.
///
/// A fresh id is assigned on every [`Transport::open`], so a reset is
/// visible in logs as a change of id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// HTTP method of a request. Only the two the game protocol uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// A single request/response call.
///
/// `path` is relative to the transport's base URL. A `body`, when
/// present, is sent form-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
}

impl Request {
    /// A `GET` request with no body.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    /// A `POST` request with an optional form body.
    pub fn post(path: impl Into<String>, body: Option<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body,
        }
    }
}

/// The answer to a [`Request`]: status code and full body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    /// `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Result of a non-blocking read from a [`StreamHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLine {
    /// A complete line, without its terminator.
    Line(String),
    /// No complete line is buffered yet.
    WouldBlock,
    /// A line longer than the configured cap was dropped.
    Overflow,
    /// The stream ended. Carries the reason when it ended with an error.
    Closed(Option<String>),
}

/// A connection context that can serve requests or one stream.
///
/// Methods that touch the network return `Send` futures so a transport
/// can live inside a spawned session task.
pub trait Transport: Send + 'static {
    /// The stream type produced by [`open_stream`](Self::open_stream).
    type Stream: StreamHandle;

    /// Establishes the connection context. Cheap to call when already open.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Whether [`open`](Self::open) has succeeded and `close` has not been
    /// called since.
    fn is_open(&self) -> bool;

    /// Performs one request and reads the whole response body.
    fn request(
        &mut self,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;

    /// Starts a long-lived `GET` whose body is read line by line.
    fn open_stream(
        &mut self,
        path: &str,
    ) -> impl Future<Output = Result<Self::Stream, TransportError>> + Send;

    /// Releases the connection context.
    fn close(&mut self);

    /// Identifier of the currently open context, if any.
    fn id(&self) -> Option<ConnectionId>;
}

/// The read side of an open stream.
pub trait StreamHandle: Send + 'static {
    /// Returns the next complete line without waiting.
    fn read_line(&mut self) -> ReadLine;

    /// Stops reading and releases the underlying response.
    fn close(&mut self);
}
