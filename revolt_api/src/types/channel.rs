use serde::{Deserialize, Serialize};

/// A channel as returned by the API or carried in the Ready payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "channel_type")]
pub enum Channel {
    SavedMessages {
        #[serde(rename = "_id")]
        id: String,
        user: String,
    },
    DirectMessage {
        #[serde(rename = "_id")]
        id: String,
        #[serde(default)]
        recipients: Vec<String>,
    },
    Group {
        #[serde(rename = "_id")]
        id: String,
        name: String,
    },
    TextChannel {
        #[serde(rename = "_id")]
        id: String,
        server: String,
        name: String,
    },
    VoiceChannel {
        #[serde(rename = "_id")]
        id: String,
        server: String,
        name: String,
    },
}

impl Channel {
    pub fn id(&self) -> &str {
        match self {
            Channel::SavedMessages { id, .. }
            | Channel::DirectMessage { id, .. }
            | Channel::Group { id, .. }
            | Channel::TextChannel { id, .. }
            | Channel::VoiceChannel { id, .. } => id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Channel::Group { name, .. }
            | Channel::TextChannel { name, .. }
            | Channel::VoiceChannel { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn server(&self) -> Option<&str> {
        match self {
            Channel::TextChannel { server, .. } | Channel::VoiceChannel { server, .. } => {
                Some(server)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_channel_exposes_name_and_server() {
        let raw = r#"{"channel_type":"TextChannel","_id":"c1","server":"s1",
            "name":"wip-beats","nsfw":false}"#;
        let channel: Channel = serde_json::from_str(raw).unwrap();
        assert_eq!(channel.id(), "c1");
        assert_eq!(channel.name(), Some("wip-beats"));
        assert_eq!(channel.server(), Some("s1"));
    }

    #[test]
    fn direct_message_has_no_name() {
        let raw = r#"{"channel_type":"DirectMessage","_id":"d1","active":true,
            "recipients":["a","b"]}"#;
        let channel: Channel = serde_json::from_str(raw).unwrap();
        assert_eq!(channel.name(), None);
        assert_eq!(channel.server(), None);
    }
}
