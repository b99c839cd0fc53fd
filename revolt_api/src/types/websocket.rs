use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events the client sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum ClientToServerEvent {
    Authenticate { token: String },
    Ping { data: i64 },
}

/// Server → client events (Bonfire protocol) that this client understands.
///
/// Payloads we only pass through are kept as `serde_json::Value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum ServerToClientEvent {
    /// Server responded with an error on authentication or other issue.
    Error { error: String },
    /// Connection has been authenticated successfully.
    Authenticated,
    /// The current session has been invalidated.
    Logout,
    /// A bulk event containing multiple sub-events.
    Bulk { v: Vec<ServerToClientEvent> },
    Pong { data: Value },

    /// Initial state for the connection.
    Ready {
        #[serde(default)]
        users: Vec<Value>,
        #[serde(default)]
        servers: Vec<Value>,
        #[serde(default)]
        channels: Vec<Value>,
        #[serde(default)]
        members: Vec<Value>,
    },

    Message {
        #[serde(rename = "_id")]
        id: String,
        channel: String,
        author: String,
        content: Option<String>,
        #[serde(flatten)]
        extra: Value,
    },

    ChannelCreate {
        #[serde(flatten)]
        data: Value,
    },
    ChannelUpdate {
        id: String,
        data: Value,
        clear: Option<Vec<String>>,
    },
    ChannelDelete { id: String },

    ServerCreate {
        id: String,
        server: Value,
        #[serde(default)]
        channels: Vec<Value>,
    },
    ServerDelete { id: String },

    UserUpdate {
        id: String,
        data: Value,
        clear: Option<Vec<String>>,
    },

    /// Anything else the server sends; ignored.
    #[serde(other)]
    Unhandled,
}
