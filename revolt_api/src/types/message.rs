use serde::{Deserialize, Serialize};

use crate::{api::messages::MessagesApi, client::RevoltClient, error::RevoltError};

/// For sending a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataMessageSend {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<ReplyIntent>>,
}

/// A Message object as returned from the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    pub nonce: Option<String>,
    pub channel: String,
    pub author: String,
    #[serde(skip)]
    pub client: Option<RevoltClient>, // injected after deserialization

    #[serde(default)]
    pub user: Option<crate::types::user::User>,
    #[serde(default)]
    pub webhook: Option<MessageWebhook>,
    #[serde(default)]
    pub content: Option<String>,
    /// System messages (joins, renames, ...) carry this instead of content.
    #[serde(default)]
    pub system: Option<serde_json::Value>,
    #[serde(default)]
    pub attachments: Option<Vec<File>>,
    #[serde(default)]
    pub edited: Option<String>, // ISO8601
    #[serde(default)]
    pub mentions: Option<Vec<String>>,
    #[serde(default)]
    pub replies: Option<Vec<String>>,
}

impl Message {
    /// Send a message into this message's channel, optionally as a reply to it.
    pub async fn send_message(
        &self,
        content: &str,
        reply: Option<bool>,
        nonce: Option<String>,
    ) -> Result<Message, RevoltError> {
        let Some(client) = &self.client else {
            return Err(RevoltError::Other("Client not attached".to_string()));
        };

        let replies = reply.unwrap_or(false).then(|| {
            vec![ReplyIntent {
                id: self.id.clone(),
                mention: false,
            }]
        });

        client
            .send_message(&self.channel, content, replies, None, nonce)
            .await
    }

    /// Files uploaded with this message, in upload order.
    pub fn attachments(&self) -> &[File] {
        self.attachments.as_deref().unwrap_or_default()
    }

    pub fn is_system(&self) -> bool {
        self.system.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyIntent {
    pub id: String,
    pub mention: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageWebhook {
    pub name: String,
    pub avatar: Option<String>,
}

/// An uploaded file as stored on Autumn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    #[serde(rename = "_id")]
    pub id: String,
    /// Autumn bucket, e.g. `attachments`.
    pub tag: String,
    pub filename: String,
    pub metadata: Metadata,
    pub content_type: String,
    pub size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "PascalCase")]
pub enum Metadata {
    File,
    Text,
    Image { width: u32, height: u32 },
    Video { width: u32, height: u32 },
    Audio,
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_with_audio_attachment_deserializes() {
        let raw = r#"{
            "_id": "01J0MSG",
            "channel": "01J0CHN",
            "author": "01J0USR",
            "content": "new beat",
            "attachments": [{
                "_id": "abc",
                "tag": "attachments",
                "filename": "loop.wav",
                "metadata": {"type": "Audio"},
                "content_type": "audio/x-wav",
                "size": 1234
            }]
        }"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.attachments().len(), 1);
        assert_eq!(msg.attachments()[0].filename, "loop.wav");
        assert!(matches!(msg.attachments()[0].metadata, Metadata::Audio));
        assert!(!msg.is_system());
    }

    #[test]
    fn missing_attachments_is_empty_slice() {
        let raw = r#"{"_id":"1","channel":"c","author":"a"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert!(msg.attachments().is_empty());
    }
}
