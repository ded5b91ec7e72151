//! Connection lifecycle for identity-scoped status channels.
//!
//! The [`ConnectionManager`] is the only owner of a transport connection.
//! It validates the identity, derives the channel, tracks the
//! [`ConnectionState`](crate::core::ConnectionState) and hands decoded
//! transport happenings on as [`ConnectionEvent`]s.

mod identity;
mod manager;

pub use identity::validate_identity;
pub use manager::{ConnectionEvent, ConnectionManager};
