pub mod event_handler;
#[allow(clippy::module_inception)]
pub mod websocket;

pub use websocket::ConnectionState;
