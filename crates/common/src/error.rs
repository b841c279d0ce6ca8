//! Error taxonomy shared across the workspace.

/// Failures surfaced by session and send operations.
///
/// Validation variants are raised before the sidecar is ever contacted;
/// `SendFailed` wraps whatever the sidecar reported so diagnostics keep
/// the original cause.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The recipient number contained no digits at all.
    #[error("invalid recipient number")]
    InvalidRecipient,

    /// A required input was missing or empty.
    #[error("missing or empty '{0}'")]
    InvalidInput(&'static str),

    /// A send was attempted before the session finished authenticating.
    #[error("session '{0}' is not connected")]
    NotConnected(String),

    /// The user id was never started.
    #[error("unknown user '{0}'")]
    UnknownUser(String),

    /// The messaging client accepted the request but the send failed.
    #[error("failed to send message")]
    SendFailed(#[source] anyhow::Error),
}

impl Error {
    /// Whether the caller is at fault (as opposed to the backend).
    pub fn is_client_fault(&self) -> bool {
        !matches!(self, Self::SendFailed(_))
    }
}
