//! Glue between the Revolt gateway and the tally. Messages are handed to
//! the live counter and the command dispatcher through the history and
//! reply adapters defined here.

use std::sync::Arc;

use async_trait::async_trait;
use revolt_api::{
    api::messages::FetchMessagesOptions,
    types::message::{File, Message},
    websocket::event_handler::{
        ChannelCreateEvent, ChannelDeleteEvent, ChannelUpdateEvent, EventHandler, ReadyEvent,
        ServerCreateEvent,
    },
    FilesApi, MessagesApi, RevoltClient, RevoltError, UsersApi,
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    commands::{Dispatcher, Replier, Request},
    directory::{ChannelDirectory, UserCache},
    ingest::{Attachment, FileFetcher},
    live::{is_ignored, InboundMessage, LiveUploads},
    rescan::{HistoryError, HistoryMessage, HistorySource},
    store::normalize_identity,
};

/// Everything the event handler shares across messages.
#[derive(Clone)]
pub struct TallyHandler {
    live: Arc<LiveUploads>,
    dispatcher: Arc<Dispatcher>,
    channels: ChannelDirectory,
    users: UserCache,
    bot_user_id: Arc<Mutex<Option<String>>>,
}

impl TallyHandler {
    pub fn new(live: Arc<LiveUploads>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            live,
            dispatcher,
            channels: ChannelDirectory::new(),
            users: UserCache::new(),
            bot_user_id: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn set_bot_user_id(&self, id: String) {
        *self.bot_user_id.lock().await = Some(id);
    }

    /// Identity of a message's author: the embedded user, then the cache,
    /// then a REST lookup. Falls back to the raw user ID.
    async fn author_identity(&self, client: &RevoltClient, message: &Message) -> String {
        if let Some(user) = &message.user {
            return self.users.remember(user).await;
        }
        resolve_user(client, &self.users, &message.author).await
    }
}

#[async_trait]
impl EventHandler for TallyHandler {
    async fn on_error_event(&self, _client: &RevoltClient, error_id: &str) {
        error!("[WS] server reported error: {error_id}");
    }

    async fn on_authenticated(&self, _client: &RevoltClient) {
        info!("authenticated with Revolt");
    }

    async fn on_ready(&self, client: &RevoltClient, ready: &ReadyEvent) {
        for user in &ready.users {
            self.users.remember_raw(user).await;
        }
        for channel in &ready.channels {
            self.channels.ingest_raw(channel).await;
        }

        if self.bot_user_id.lock().await.is_none() {
            match client.fetch_self().await {
                Ok(me) => {
                    info!("{} is now running!", me.tag());
                    self.set_bot_user_id(me.id).await;
                }
                Err(e) => warn!("could not fetch own user: {e}"),
            }
        }
        let channel_count = self.channels.len().await;
        info!(
            users = ready.users.len(),
            servers = ready.servers.len(),
            channels = channel_count,
            "ready"
        );
    }

    async fn on_message(&self, client: &RevoltClient, message: &Message) {
        let bot_user_id = self.bot_user_id.lock().await.clone();
        if is_ignored(message.is_system(), &message.author, bot_user_id.as_deref()) {
            return;
        }

        let identity = self.author_identity(client, message).await;
        let channel_name = self
            .channels
            .name_of(&message.channel)
            .await
            .unwrap_or_else(|| message.channel.clone());
        let text = message.content.clone().unwrap_or_default();
        info!("[{channel_name}] {identity}: \"{text}\"");

        let replier = RevoltReplier {
            client: client.clone(),
            message: message.clone(),
        };
        let history = RevoltHistory::new(
            client.clone(),
            self.channels.clone(),
            self.users.clone(),
        );

        let inbound = InboundMessage {
            channel_name,
            author_id: message.author.clone(),
            author: identity.clone(),
            system: message.is_system(),
            attachments: message.attachments().iter().map(attachment_of).collect(),
        };
        self.live
            .handle(&inbound, bot_user_id.as_deref(), &history, &replier)
            .await;

        // Commands run off the read loop so a long rescan does not stall
        // event delivery.
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let request = Request {
                text: &text,
                author: &identity,
                channel_id: Some(&replier.message.channel),
            };
            dispatcher.dispatch(request, &replier, &history).await;
        });
    }

    async fn on_channel_create(&self, _client: &RevoltClient, event: &ChannelCreateEvent) {
        if let Some(name) = &event.name {
            self.channels
                .set(&event.id, name, event.server.as_deref())
                .await;
        }
    }

    async fn on_channel_update(&self, _client: &RevoltClient, update: &ChannelUpdateEvent) {
        if let Some(name) = update.data.get("name").and_then(|v| v.as_str()) {
            self.channels.rename(&update.id, name).await;
        }
    }

    async fn on_channel_delete(&self, _client: &RevoltClient, delete: &ChannelDeleteEvent) {
        self.channels.remove(&delete.id).await;
    }

    async fn on_server_create(&self, _client: &RevoltClient, event: &ServerCreateEvent) {
        for channel in &event.channels {
            self.channels.ingest_raw(channel).await;
        }
    }

    async fn on_server_delete(&self, _client: &RevoltClient, server_id: &str) {
        self.channels.remove_server(server_id).await;
    }
}

fn attachment_of(file: &File) -> Attachment {
    Attachment {
        id: file.id.clone(),
        tag: file.tag.clone(),
        filename: file.filename.clone(),
    }
}

async fn resolve_user(client: &RevoltClient, users: &UserCache, user_id: &str) -> String {
    if let Some(identity) = users.get(user_id).await {
        return identity;
    }
    match client.fetch_user(user_id).await {
        Ok(user) => users.remember(&user).await,
        Err(e) => {
            warn!("could not resolve user {user_id}: {e}");
            normalize_identity(user_id)
        }
    }
}

/// Replies to the message that issued a command.
pub struct RevoltReplier {
    client: RevoltClient,
    message: Message,
}

#[async_trait]
impl Replier for RevoltReplier {
    async fn say(&self, text: &str) -> Result<(), RevoltError> {
        self.message.send_message(text, None, None).await?;
        Ok(())
    }

    async fn whisper(&self, text: &str) -> Result<(), RevoltError> {
        let dm = self.client.open_dm(&self.message.author).await?;
        self.client
            .send_message(dm.id(), text, None, None, None)
            .await?;
        Ok(())
    }
}

/// Channel history read through the REST API.
pub struct RevoltHistory {
    client: RevoltClient,
    channels: ChannelDirectory,
    users: UserCache,
}

impl RevoltHistory {
    pub fn new(client: RevoltClient, channels: ChannelDirectory, users: UserCache) -> Self {
        Self {
            client,
            channels,
            users,
        }
    }
}

#[async_trait]
impl HistorySource for RevoltHistory {
    async fn find_channel(
        &self,
        name: &str,
        near: Option<&str>,
    ) -> Result<Option<String>, HistoryError> {
        Ok(self.channels.find_by_name(name, near).await)
    }

    async fn page_after(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
    ) -> Result<Vec<HistoryMessage>, HistoryError> {
        let options = FetchMessagesOptions::oldest_after(cursor.map(str::to_string));
        let (messages, authors) = self
            .client
            .fetch_messages(channel_id, Some(options))
            .await?
            .into_parts();

        for user in authors.values() {
            self.users.remember(user).await;
        }

        let mut page = Vec::with_capacity(messages.len());
        for message in messages {
            let author = resolve_user(&self.client, &self.users, &message.author).await;
            page.push(HistoryMessage {
                attachments: message.attachments().iter().map(attachment_of).collect(),
                id: message.id,
                author,
            });
        }
        Ok(page)
    }
}

#[async_trait]
impl FileFetcher for RevoltHistory {
    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, HistoryError> {
        Ok(self
            .client
            .fetch_file(&attachment.tag, &attachment.id)
            .await?)
    }
}
