//! Single-channel game client for boardcast.
//!
//! The upstream transport carries either a long-lived game stream or one
//! request, never both. This crate serializes the two:
//!
//! - [`ProtocolMachine`] runs one operation at a time through a
//!   pause → quiesce → request → resume cycle, with transport-level
//!   retries, a per-state timeout watchdog, and connection health checks.
//! - [`RequestQueue`] holds work that arrives while the machine is busy.
//! - [`GameClient`] ties the two together, tracks the active game, and
//!   turns results into [`ClientEvent`]s.
//!
//! Nothing here spawns tasks or sleeps. The owner calls
//! [`GameClient::tick`] on a fixed interval.
//!
//! ```ignore
//! let mut client = GameClient::new(HttpsTransport::new(cfg), ClientConfig::default());
//! client.submit(QueuedRequest::CreateGame(CreateGameParams::default()))?;
//! loop {
//!     scheduler.wait_for_tick().await;
//!     client.tick().await;
//!     for event in client.take_events() { /* publish */ }
//! }
//! ```

mod client;
mod config;
mod error;
mod event;
mod machine;
mod queue;
mod state;

pub use client::{GameClient, GameStatus, Submitted};
pub use config::ClientConfig;
pub use error::ClientError;
pub use event::{ClientEvent, Notice, RECOVERED_MESSAGE};
pub use machine::{MachineDiagnostics, ProtocolMachine, StreamLoss};
pub use queue::{QueuedRequest, RequestQueue};
pub use state::{Operation, OperationKind, Outcome, Recovery, State};
