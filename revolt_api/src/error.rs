use thiserror::Error;

use crate::types::error_types::Error as ApiError;

/// A unified error type for this library.
#[derive(Debug, Error)]
pub enum RevoltError {
    /// HTTP request failed (network or protocol issue).
    #[error("Reqwest Error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// HTTP returned a non-2xx status with a body we could parse as an API error.
    #[error("API Error: {0:?}")]
    ApiError(ApiError),

    /// The server returned an error body we didn't parse as `ApiError`.
    #[error("Non-success HTTP status {code}, body: {body}")]
    HttpStatus { code: u16, body: String },

    /// Serde (de)serialization error.
    #[error("Serde JSON error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// Transport-level WebSocket failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// An operation needed the socket but it is not connected.
    #[error("WebSocket not connected")]
    NotConnected,

    #[error("Other error: {0}")]
    Other(String),
}

/// Convert an `Error` object from the API into a `RevoltError::ApiError`.
pub fn handle_api_error(err: ApiError) -> RevoltError {
    RevoltError::ApiError(err)
}
