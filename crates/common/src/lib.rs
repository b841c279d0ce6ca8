//! Shared types for wagate: the error taxonomy and the phone normalizer.

pub mod error;
pub mod phone;

pub use {error::Error, phone::normalize};
