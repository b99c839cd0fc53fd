use crate::{
    client::{error_for_status, RevoltClient},
    error::RevoltError,
    util::build_url,
};

#[async_trait::async_trait]
pub trait FilesApi {
    /// Download the raw bytes of a file stored in Autumn bucket `tag`.
    async fn fetch_file(&self, tag: &str, id: &str) -> Result<Vec<u8>, RevoltError>;
}

#[async_trait::async_trait]
impl FilesApi for RevoltClient {
    async fn fetch_file(&self, tag: &str, id: &str) -> Result<Vec<u8>, RevoltError> {
        let url = build_url(&self.autumn_url, &[tag, id]);
        let resp = self.authed_get(&url, None).await?;
        let resp = error_for_status(resp).await?;
        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }
}
