//! Shared types, error definitions, and host-facing traits used across the
//! ocean crates.

pub mod error;
pub mod outbound;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    outbound::{ChannelOutbound, RecordingOutbound},
    types::{ChannelId, ResponseKind, UserId},
};
