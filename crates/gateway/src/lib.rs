//! HTTP surface for wagate: session start, QR polling, and send.

pub mod qr;
pub mod routes;
pub mod server;

pub use {
    qr::PngRenderer,
    server::{AppState, build_router, serve},
};
