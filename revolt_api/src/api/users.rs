use crate::{
    client::{parse_json_if_ok, RevoltClient},
    error::RevoltError,
    types::{channel::Channel, user::User},
    util::build_url,
};

#[async_trait::async_trait]
pub trait UsersApi {
    /// Fetch the account the token belongs to.
    async fn fetch_self(&self) -> Result<User, RevoltError>;

    /// Fetch a user by ID.
    async fn fetch_user(&self, user_id: &str) -> Result<User, RevoltError>;

    /// Open (or fetch the existing) direct message channel with a user.
    async fn open_dm(&self, user_id: &str) -> Result<Channel, RevoltError>;
}

#[async_trait::async_trait]
impl UsersApi for RevoltClient {
    async fn fetch_self(&self) -> Result<User, RevoltError> {
        let url = build_url(&self.base_url, &["users", "@me"]);
        let resp = self.authed_get(&url, None).await?;
        parse_json_if_ok(resp).await
    }

    async fn fetch_user(&self, user_id: &str) -> Result<User, RevoltError> {
        let url = build_url(&self.base_url, &["users", user_id]);
        let resp = self.authed_get(&url, None).await?;
        parse_json_if_ok(resp).await
    }

    async fn open_dm(&self, user_id: &str) -> Result<Channel, RevoltError> {
        let url = build_url(&self.base_url, &["users", user_id, "dm"]);
        let resp = self.authed_get(&url, None).await?;
        parse_json_if_ok(resp).await
    }
}
