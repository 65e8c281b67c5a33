//! Slack integration – identifier namespaces, Web API client, message formatting.

pub mod client;
pub mod format;

use thiserror::Error;

/// Raised when a Slack identifier does not belong to a known namespace.
///
/// This is a data error, not a user-input error: ids reach us from Slack
/// itself or from our own job store, so an unknown prefix means something
/// upstream is broken and must not be silently defaulted.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown namespace for Slack id {0:?}")]
pub struct UnknownIdentifier(pub String);

/// What a Slack identifier denotes, derived from its leading character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// `C…` – a channel.
    Channel,
    /// `U…` – an individual user.
    User,
    /// `S…` – a user group (subteam).
    Group,
}

/// Classify a Slack identifier by its namespace prefix.
pub fn classify(id: &str) -> Result<IdKind, UnknownIdentifier> {
    match id.chars().next() {
        Some('C') => Ok(IdKind::Channel),
        Some('U') => Ok(IdKind::User),
        Some('S') => Ok(IdKind::Group),
        _ => Err(UnknownIdentifier(id.to_string())),
    }
}

/// Format an id in Slack's mention syntax for messages.
pub fn mention(id: &str) -> Result<String, UnknownIdentifier> {
    Ok(match classify(id)? {
        IdKind::Channel => format!("<#{}>", id),
        IdKind::User => format!("<@{}>", id),
        IdKind::Group => format!("<!subteam^{}>", id),
    })
}
