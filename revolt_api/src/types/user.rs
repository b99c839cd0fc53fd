use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)] // Use default values for missing fields
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub discriminator: String,
    pub display_name: Option<String>,
    pub bot: Option<BotInformation>,
    pub online: bool,
}

impl User {
    /// `username#discriminator`, or just the username when no discriminator is set.
    pub fn tag(&self) -> String {
        if self.discriminator.is_empty() {
            self.username.clone()
        } else {
            format!("{}#{}", self.username, self.discriminator)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotInformation {
    pub owner: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_includes_discriminator() {
        let user: User =
            serde_json::from_str(r#"{"_id":"u1","username":"beatmaker","discriminator":"0420"}"#)
                .unwrap();
        assert_eq!(user.tag(), "beatmaker#0420");
    }

    #[test]
    fn tag_without_discriminator() {
        let user = User {
            username: "solo".into(),
            ..Default::default()
        };
        assert_eq!(user.tag(), "solo");
    }
}
