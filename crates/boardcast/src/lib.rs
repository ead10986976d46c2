//! # Boardcast
//!
//! Multi-session gateway to a turn-based game service.
//!
//! Each client session gets its own game client, running in its own task,
//! with a single upstream connection that is shared between the game
//! stream and moves. The gateway admits at most a few sessions, reaps
//! idle ones, and fans every session's events out to subscribers tagged
//! with the session id.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use boardcast::prelude::*;
//!
//! # async fn run() -> Result<(), BoardcastError> {
//! boardcast::init_tracing("info").ok();
//! let gateway = Gateway::https(GatewayConfig::default())?;
//! let _maintenance = gateway.spawn_maintenance();
//!
//! let mut events = gateway.subscribe();
//! let session = gateway.create_session("127.0.0.1".parse().unwrap()).await?;
//! gateway.create_game(&session, CreateGameParams::default()).await?;
//! while let Some(message) = events.recv().await {
//!     println!("{}", serde_json::to_string(&message).unwrap());
//! }
//! # Ok(())
//! # }
//! ```

mod actor;
mod config;
mod error;
mod fanout;
mod gateway;
mod signaling;
mod telemetry;

pub use actor::SessionHandle;
pub use config::{ENV_API_TOKEN, ENV_BASE_URL, GatewayConfig};
pub use error::BoardcastError;
pub use fanout::{EventFanout, FanoutMessage, Subscriber};
pub use gateway::{Gateway, SessionOverview, SessionsOverview};
pub use signaling::{SignalConfig, SignalMailbox, SignalMessage};
pub use telemetry::init_tracing;

pub use boardcast_client as client;
pub use boardcast_protocol as protocol;
pub use boardcast_session as session;
pub use boardcast_transport as transport;

/// The types most callers need.
pub mod prelude {
    pub use crate::{
        BoardcastError, FanoutMessage, Gateway, GatewayConfig, Subscriber, init_tracing,
    };
    pub use boardcast_client::{ClientEvent, GameStatus, Notice, Submitted};
    pub use boardcast_protocol::{Color, CreateGameParams, GameId};
    pub use boardcast_session::SessionId;
}
