//! Wire protocol for boardcast.
//!
//! This crate defines what the game client says to the upstream game
//! service and how to read what comes back:
//!
//! - **Types** ([`GameId`], [`UciMove`], [`CreateGameParams`], response
//!   bodies): the values that cross the wire.
//! - **Endpoints** ([`Endpoint`]): paths of the five upstream calls.
//! - **Stream lines** ([`StreamLine`]): heartbeat vs. event
//!   classification for the NDJSON game stream.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): body decoding.
//! - **Errors** ([`ProtocolError`]): answers that are not what the
//!   protocol expects.
//!
//! It knows nothing about connections or sessions.
//!
//! ```text
//! Transport (lines, bodies) → Protocol (typed values) → Client (state machine)
//! ```

mod codec;
mod endpoint;
mod error;
#[cfg(feature = "json")]
mod stream;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use endpoint::Endpoint;
pub use error::ProtocolError;
#[cfg(feature = "json")]
pub use stream::StreamLine;
pub use types::{
    Account, Color, CreateGameParams, CreatedGame, GameId, MoveAck, UciMove,
};
