//! Seams to the opaque messaging client.
//!
//! The WhatsApp Web protocol itself lives in an external sidecar process;
//! this crate only ever talks to it through [`MessagingClient`]. Tests
//! substitute mocks at the same seam.

use std::sync::Arc;

use {anyhow::Result, async_trait::async_trait};

/// One tenant's handle to the messaging backend.
///
/// Implementations are expected to be cheap to clone behind an `Arc` and
/// safe to call concurrently; the registry never serializes calls across
/// different users.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Request asynchronous initialization (login / QR flow). The outcome
    /// surfaces later as lifecycle events, not through this return value.
    async fn initialize(&self) -> Result<()>;

    /// Resolve a normalized digit string to a transport chat id.
    ///
    /// `Ok(None)` means the backend had no answer; callers fall back to
    /// constructing a default chat id themselves.
    async fn resolve_chat_id(&self, number: &str) -> Result<Option<String>>;

    /// Send a text message to an already-resolved chat id.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()>;
}

/// Creates one [`MessagingClient`] per user id.
pub trait ClientFactory: Send + Sync {
    fn create(&self, user_id: &str) -> Arc<dyn MessagingClient>;
}

/// Renders a raw QR string into image data suitable for an HTTP response.
pub trait QrRenderer: Send + Sync {
    fn to_image_data(&self, qr: &str) -> Result<String>;
}
