use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{message::Message, user::User};

/// Bulk Message Response can be:
/// 1) An array of messages
/// 2) An object: { messages: [...], users: [...], members: [...] }
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BulkMessageResponse {
    Messages(Vec<Message>),
    MessagesWithUsers {
        messages: Vec<Message>,
        users: Vec<User>,
        #[serde(default)]
        members: Option<Vec<serde_json::Value>>,
    },
}

impl BulkMessageResponse {
    /// Utility to inject the client reference into each `Message`.
    pub fn inject_client(&mut self, client: crate::RevoltClient) {
        let messages = match self {
            Self::Messages(vec) => vec,
            Self::MessagesWithUsers { messages, .. } => messages,
        };
        for m in messages {
            m.client = Some(client.clone());
        }
    }

    /// Split into messages and a user lookup keyed by user ID.
    pub fn into_parts(self) -> (Vec<Message>, HashMap<String, User>) {
        match self {
            Self::Messages(vec) => (vec, HashMap::new()),
            Self::MessagesWithUsers {
                messages, users, ..
            } => {
                let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
                (messages, users)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_form_splits_into_users() {
        let raw = r#"{
            "messages": [{"_id":"m1","channel":"c","author":"u1"}],
            "users": [{"_id":"u1","username":"kai","discriminator":"0001"}]
        }"#;
        let resp: BulkMessageResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.messages().len(), 1);
        let (messages, users) = resp.into_parts();
        assert_eq!(messages[0].author, "u1");
        assert_eq!(users["u1"].tag(), "kai#0001");
    }

    #[test]
    fn array_form_has_no_users() {
        let raw = r#"[{"_id":"m1","channel":"c","author":"u1"}]"#;
        let resp: BulkMessageResponse = serde_json::from_str(raw).unwrap();
        let (messages, users) = resp.into_parts();
        assert_eq!(messages.len(), 1);
        assert!(users.is_empty());
    }
}
