pub mod bulk_message_response;
pub mod channel;
pub mod error_types;
pub mod message;
pub mod user;
pub mod websocket;

// Re-export the main types commonly used
pub use bulk_message_response::BulkMessageResponse;
pub use channel::Channel;
pub use error_types::Error as ApiError;
pub use message::{DataMessageSend, File, Message};
pub use user::User;
pub use websocket::*;
