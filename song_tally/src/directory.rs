//! Caches of channel names and user identities, kept current from gateway
//! events so lookups rarely need a REST round trip.

use std::{collections::HashMap, sync::Arc};

use revolt_api::{types::channel::Channel, User};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::store::normalize_identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEntry {
    pub name: String,
    pub server: Option<String>,
}

/// Channel ID → name and owning server.
#[derive(Debug, Clone, Default)]
pub struct ChannelDirectory {
    channels: Arc<Mutex<HashMap<String, ChannelEntry>>>,
}

impl ChannelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, channel_id: &str, name: &str, server: Option<&str>) {
        self.channels.lock().await.insert(
            channel_id.to_string(),
            ChannelEntry {
                name: name.to_string(),
                server: server.map(str::to_string),
            },
        );
    }

    /// Change only the name of a known channel.
    pub async fn rename(&self, channel_id: &str, name: &str) {
        if let Some(entry) = self.channels.lock().await.get_mut(channel_id) {
            entry.name = name.to_string();
        }
    }

    pub async fn remove(&self, channel_id: &str) {
        self.channels.lock().await.remove(channel_id);
    }

    pub async fn remove_server(&self, server_id: &str) {
        self.channels
            .lock()
            .await
            .retain(|_, entry| entry.server.as_deref() != Some(server_id));
    }

    pub async fn get(&self, channel_id: &str) -> Option<ChannelEntry> {
        self.channels.lock().await.get(channel_id).cloned()
    }

    pub async fn name_of(&self, channel_id: &str) -> Option<String> {
        self.get(channel_id).await.map(|entry| entry.name)
    }

    /// Find a server channel called `name`, preferring one on the same server
    /// as `near`. Groups are never matched. Among equals the lowest ID wins so
    /// the answer is stable.
    pub async fn find_by_name(&self, name: &str, near: Option<&str>) -> Option<String> {
        let channels = self.channels.lock().await;
        let home = near
            .and_then(|id| channels.get(id))
            .and_then(|entry| entry.server.clone());

        channels
            .iter()
            .filter(|(_, entry)| entry.server.is_some() && entry.name == name)
            .min_by_key(|(id, entry)| (home.is_some() && entry.server != home, (*id).clone()))
            .map(|(id, _)| id.clone())
    }

    /// Record a raw channel object (Ready payload, server create). Objects
    /// that are not channels, or carry no name, are ignored.
    pub async fn ingest_raw(&self, raw: &Value) {
        match serde_json::from_value::<Channel>(raw.clone()) {
            Ok(channel) => {
                if let Some(name) = channel.name() {
                    self.set(channel.id(), name, channel.server()).await;
                }
            }
            Err(e) => debug!("skipping channel payload: {e}"),
        }
    }

    pub async fn len(&self) -> usize {
        self.channels.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.channels.lock().await.is_empty()
    }
}

/// User ID → normalized identity string.
#[derive(Debug, Clone, Default)]
pub struct UserCache {
    users: Arc<Mutex<HashMap<String, String>>>,
}

impl UserCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn remember(&self, user: &User) -> String {
        let identity = identity_of(user);
        self.users
            .lock()
            .await
            .insert(user.id.clone(), identity.clone());
        identity
    }

    pub async fn remember_raw(&self, raw: &Value) {
        if let Ok(user) = serde_json::from_value::<User>(raw.clone()) {
            if !user.id.is_empty() {
                self.remember(&user).await;
            }
        }
    }

    pub async fn get(&self, user_id: &str) -> Option<String> {
        self.users.lock().await.get(user_id).cloned()
    }
}

/// The stats key for a user: `username#discriminator` with whitespace
/// replaced.
pub fn identity_of(user: &User) -> String {
    normalize_identity(&user.tag())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn lookup_prefers_the_requesting_server() {
        let dir = ChannelDirectory::new();
        dir.set("a", "wip-beats", Some("s1")).await;
        dir.set("b", "wip-beats", Some("s2")).await;
        dir.set("cmd", "general", Some("s2")).await;

        assert_eq!(dir.find_by_name("wip-beats", Some("cmd")).await.as_deref(), Some("b"));
        assert_eq!(dir.find_by_name("wip-beats", None).await.as_deref(), Some("a"));
        assert_eq!(dir.find_by_name("missing", None).await, None);
    }

    #[tokio::test]
    async fn groups_are_never_scan_targets() {
        let dir = ChannelDirectory::new();
        dir.set("0group", "wip-beats", None).await;
        assert_eq!(dir.find_by_name("wip-beats", None).await, None);

        dir.set("z", "wip-beats", Some("s1")).await;
        assert_eq!(dir.find_by_name("wip-beats", None).await.as_deref(), Some("z"));
        assert_eq!(dir.find_by_name("wip-beats", Some("0group")).await.as_deref(), Some("z"));
    }

    #[tokio::test]
    async fn raw_payloads_and_updates() {
        let dir = ChannelDirectory::new();
        dir.ingest_raw(&json!({
            "channel_type": "TextChannel",
            "_id": "c1",
            "server": "s1",
            "name": "beats"
        }))
        .await;
        dir.ingest_raw(&json!({"channel_type":"DirectMessage","_id":"d1","recipients":[]}))
            .await;
        assert_eq!(dir.len().await, 1);

        dir.rename("c1", "wip-beats").await;
        assert_eq!(dir.name_of("c1").await.as_deref(), Some("wip-beats"));

        dir.remove_server("s1").await;
        assert!(dir.is_empty().await);
    }

    #[tokio::test]
    async fn identities_are_normalized() {
        let cache = UserCache::new();
        cache
            .remember_raw(&json!({"_id":"u1","username":"lo fi","discriminator":"0007"}))
            .await;
        assert_eq!(cache.get("u1").await.as_deref(), Some("lo_fi#0007"));
        assert_eq!(cache.get("u2").await, None);
    }
}
