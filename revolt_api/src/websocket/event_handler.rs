use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    client::RevoltClient,
    types::{message::Message, websocket::ServerToClientEvent},
};

/// Callbacks for events received over the WebSocket. Every method defaults to
/// a no-op, so implementors only override what they need.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Called for *every* event that the server sends.
    async fn on_event(&self, _client: &RevoltClient, _event: &ServerToClientEvent) {}

    /// Called when an "Error" event is received (e.g. a failed authentication).
    async fn on_error_event(&self, _client: &RevoltClient, _error_id: &str) {}

    /// Called once the connection has been authenticated.
    async fn on_authenticated(&self, _client: &RevoltClient) {}

    /// Called when a "Ready" event is received (**includes full payload**).
    async fn on_ready(&self, _client: &RevoltClient, _ready: &ReadyEvent) {}

    /// Called when the server notifies us of a new message.
    async fn on_message(&self, _client: &RevoltClient, _message: &Message) {}

    async fn on_channel_create(&self, _client: &RevoltClient, _event: &ChannelCreateEvent) {}

    async fn on_channel_update(&self, _client: &RevoltClient, _update: &ChannelUpdateEvent) {}

    async fn on_channel_delete(&self, _client: &RevoltClient, _delete: &ChannelDeleteEvent) {}

    /// Called when we join a server; carries the server's channels.
    async fn on_server_create(&self, _client: &RevoltClient, _event: &ServerCreateEvent) {}

    async fn on_server_delete(&self, _client: &RevoltClient, _server_id: &str) {}
}

/// Data for a "Ready" event.
#[derive(Debug, Clone)]
pub struct ReadyEvent {
    pub users: Vec<Value>,
    pub servers: Vec<Value>,
    pub channels: Vec<Value>,
    pub members: Vec<Value>,
}

/// Data for a "ChannelCreate" event.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelCreateEvent {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub server: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

/// Data for a "ChannelUpdate" event.
///
/// `data` holds only the changed fields; `clear` lists removed fields.
#[derive(Debug, Clone)]
pub struct ChannelUpdateEvent {
    pub id: String,
    pub data: Value,
    pub clear: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ChannelDeleteEvent {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ServerCreateEvent {
    pub id: String,
    pub server: Value,
    pub channels: Vec<Value>,
}
