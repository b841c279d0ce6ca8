//! Per-session connection lifecycle.

/// Connection state for one user's session.
///
/// The QR payload lives inside `AwaitingQr`, so it cannot survive a
/// transition to `Ready` or `Disconnected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the user to scan a QR code. `qr` is `None` until the
    /// sidecar emits the first code; codes rotate until scanned.
    AwaitingQr { qr: Option<String> },
    /// Authenticated; the session can send messages.
    Ready,
    /// Authentication was lost. A fresh QR event restarts the cycle.
    Disconnected,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::AwaitingQr { qr: None }
    }
}

/// Lifecycle events delivered by the sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A (rendered) QR payload. Replaces any previous one.
    Qr(String),
    Ready,
    Disconnected,
}

impl SessionState {
    /// Apply one lifecycle event.
    ///
    /// Transitions are total: whatever the sidecar reports last wins, so a
    /// session cycles indefinitely through re-authentication without ever
    /// reaching a terminal state.
    pub fn apply(&mut self, event: LifecycleEvent) {
        *self = match event {
            LifecycleEvent::Qr(payload) => Self::AwaitingQr { qr: Some(payload) },
            LifecycleEvent::Ready => Self::Ready,
            LifecycleEvent::Disconnected => Self::Disconnected,
        };
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}
