use crate::{
    client::{parse_json_if_ok, RevoltClient},
    error::RevoltError,
    types::{
        bulk_message_response::BulkMessageResponse,
        message::{DataMessageSend, Message, ReplyIntent},
    },
    util::build_url,
};
use async_trait::async_trait;
use serde::Serialize;
use ulid::Ulid;

/// The API caps a single history page at this many messages.
pub const MAX_FETCH_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageSort {
    Relevance,
    Latest,
    Oldest,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct FetchMessagesOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<MessageSort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearby: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_users: Option<bool>,
}

impl FetchMessagesOptions {
    /// One oldest-first page starting after `cursor`, with the authors included.
    pub fn oldest_after(cursor: Option<String>) -> Self {
        Self {
            limit: Some(MAX_FETCH_LIMIT),
            after: cursor,
            sort: Some(MessageSort::Oldest),
            include_users: Some(true),
            ..Default::default()
        }
    }
}

/// Trait that holds the methods for message endpoints.
#[async_trait]
pub trait MessagesApi {
    /// Fetch multiple messages from the given channel.
    async fn fetch_messages(
        &self,
        channel_id: &str,
        opts: Option<FetchMessagesOptions>,
    ) -> Result<BulkMessageResponse, RevoltError>;

    /// Send a message to the given channel.
    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        replies: Option<Vec<ReplyIntent>>,
        idempotency_key: Option<String>,
        nonce: Option<String>,
    ) -> Result<Message, RevoltError>;
}

#[async_trait]
impl MessagesApi for RevoltClient {
    async fn fetch_messages(
        &self,
        channel_id: &str,
        opts: Option<FetchMessagesOptions>,
    ) -> Result<BulkMessageResponse, RevoltError> {
        let mut url = build_url(&self.base_url, &["channels", channel_id, "messages"]);

        if let Some(o) = opts {
            let query = serde_urlencoded::to_string(o)
                .map_err(|e| RevoltError::Other(format!("Failed to encode query: {e}")))?;
            if !query.is_empty() {
                url.push('?');
                url.push_str(&query);
            }
        }

        let resp = self.authed_get(&url, None).await?;
        let mut parsed: BulkMessageResponse = parse_json_if_ok(resp).await?;

        parsed.inject_client(self.clone());
        Ok(parsed)
    }

    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        replies: Option<Vec<ReplyIntent>>,
        idempotency_key: Option<String>,
        nonce: Option<String>,
    ) -> Result<Message, RevoltError> {
        let url = build_url(&self.base_url, &["channels", channel_id, "messages"]);

        let body = DataMessageSend {
            nonce: Some(nonce.unwrap_or_else(|| Ulid::new().to_string())),
            content: Some(content.to_string()),
            attachments: None,
            replies,
        };

        let mut headers = Vec::new();
        if let Some(ref key) = idempotency_key {
            headers.push(("Idempotency-Key", key.as_str()));
        }

        let resp = self.authed_post(&url, &body, Some(&headers)).await?;

        let mut message: Message = parse_json_if_ok(resp).await?;
        message.client = Some(self.clone());
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_page_query_encodes_cursor() {
        let opts = FetchMessagesOptions::oldest_after(Some("01HZZ".into()));
        let query = serde_urlencoded::to_string(opts).unwrap();
        assert_eq!(query, "limit=100&after=01HZZ&sort=Oldest&include_users=true");
    }

    #[test]
    fn first_page_has_no_cursor() {
        let query = serde_urlencoded::to_string(FetchMessagesOptions::oldest_after(None)).unwrap();
        assert!(!query.contains("after="));
    }
}
