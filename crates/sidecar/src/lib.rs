//! WebSocket link to the WhatsApp Web sidecar process.
//!
//! The sidecar (a Node.js process wrapping the actual browser-automation
//! client) owns protocol state and session auth material; this crate only
//! shuttles tagged JSON messages to it and correlates request/reply pairs.

pub mod client;
pub mod connection;
pub mod types;

pub use {
    client::{SidecarClient, SidecarClientFactory},
    connection::{
        DEFAULT_SIDECAR_PORT, MessageCallback, SharedHandle, SidecarHandle, connect_to_sidecar,
        connect_with_retry,
    },
    types::{GatewayMessage, SidecarMessage},
};
