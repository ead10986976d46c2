//! Session management for boardcast.
//!
//! A session is one browser client talking to the gateway. Each one
//! exclusively owns a game client and, through it, an upstream
//! connection, which is why the number of sessions is capped.
//!
//! - [`SessionRegistry`] creates, looks up and deletes sessions, replaces
//!   sessions pending refresh, and reaps inactive ones.
//! - [`AdminList`] is the admin IP allow-list.
//!
//! The registry is generic over the resource a session owns, so this
//! crate knows nothing about game clients or tasks.

mod admin;
mod error;
mod registry;
mod session;

pub use admin::AdminList;
pub use error::SessionError;
pub use registry::{Admission, SessionRegistry};
pub use session::{is_local, Session, SessionConfig, SessionId, SessionSummary};
