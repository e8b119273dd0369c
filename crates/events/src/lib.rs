//! # Meridian Events
//!
//! This crate defines the real-time event structures pushed over WebSocket
//! from the backend to dashboard clients.
//!
//! As a Layer 0 crate, it depends only on `core-types` and provides the
//! definitive language for push-channel messages.

pub mod messages;

// Re-export the core types to provide a clean public API.
pub use messages::{PriceUpdate, WsMessage};
