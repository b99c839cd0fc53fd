//! # Revolt API
//!
//! An asynchronous Rust client for the parts of the Revolt API a bot needs:
//! reading channel history, sending messages, resolving users, downloading
//! attachments from Autumn and receiving events over the WebSocket.
//! It uses `tokio` for the async runtime and `reqwest` for HTTP requests.

pub mod api;
pub mod client;
pub mod error;
pub mod types;
pub mod util;
pub mod websocket;

pub use client::*;
pub use error::RevoltError;
pub use types::*;
pub use websocket::*;
