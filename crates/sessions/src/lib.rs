//! Multi-tenant WhatsApp Web session management.
//!
//! Each logical user owns one session: an opaque messaging-client handle
//! plus its QR/ready/disconnected lifecycle. The [`registry::SessionRegistry`]
//! is the single source of truth for which users exist and whether they can
//! send.

pub mod client;
pub mod registry;
pub mod state;

pub use {
    client::{ClientFactory, MessagingClient, QrRenderer},
    registry::{QrStatus, SessionRegistry},
    state::{LifecycleEvent, SessionState},
};
