//! Identifiers and small value types shared between the command and
//! notification paths.

use serde::{Deserialize, Serialize};

/// Chat-platform user identity.
pub type UserId = String;

/// Chat-platform channel identity.
pub type ChannelId = String;

/// How the host should display a command response.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// Visible only to the caller.
    #[default]
    Ephemeral,
    /// Posted to the channel the command was issued in.
    InChannel,
}
