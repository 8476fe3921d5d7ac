//! Application layer for InkVault.
//!
//! Wraps the vault engine in a command surface a desktop shell or CLI
//! can call directly: one [`App`] instance per process, serializable
//! request and response types, and a single active vault at a time.

pub mod commands;
pub mod state;

pub use commands::{ClipboardImage, UnlockRequest, UnlockResponse, UpdateEntryRequest};
pub use state::App;
