#[allow(clippy::module_inception)]
mod client;

pub use client::parse_json_if_ok;
pub use client::{RevoltClient, TokenKind, DEFAULT_AUTUMN_URL, DEFAULT_BASE_URL, DEFAULT_WS_URL};
pub(crate) use client::{error_for_status, WsWriter};

pub use crate::{
    api::{files::FilesApi, messages::MessagesApi, users::UsersApi},
    error::{handle_api_error, RevoltError},
};
