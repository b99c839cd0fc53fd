//! Revolt HTTP‑and‑WebSocket client.
//!
//! One [`RevoltClient`] is shared (cheaply cloned) between the WebSocket read
//! loop, event handlers and any background tasks. All mutable state sits
//! behind `Arc<Mutex<..>>` so clones observe the same token and socket.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitSink;
use reqwest::{Client, ClientBuilder, Method, Response};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    tungstenite::protocol::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};

use crate::error::{handle_api_error, RevoltError};
use crate::websocket::{event_handler::EventHandler, websocket::ConnectionState};

pub const DEFAULT_BASE_URL: &str = "https://api.revolt.chat";
pub const DEFAULT_WS_URL: &str = "wss://ws.revolt.chat/?version=1&format=json";
pub const DEFAULT_AUTUMN_URL: &str = "https://autumn.revolt.chat";

/// Which header the token is sent in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Bot account token, sent as `X-Bot-Token`.
    #[default]
    Bot,
    /// User session token, sent as `X-Session-Token`.
    Session,
}

impl TokenKind {
    fn header(self) -> &'static str {
        match self {
            TokenKind::Bot => "X-Bot-Token",
            TokenKind::Session => "X-Session-Token",
        }
    }
}

pub(crate) type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// Main client to interact with the Revolt API.
#[derive(Clone)]
pub struct RevoltClient {
    /* ───────────────────────── Public configuration ───────────────────────── */
    pub base_url: String,
    pub ws_url: String,
    /// Autumn file server, used to download attachments.
    pub autumn_url: String,

    /* ───────────────────────── Internal plumbing ──────────────────────────── */
    pub http: Client,
    pub token: Arc<Mutex<Option<(TokenKind, String)>>>,
    pub ws_tx: Arc<Mutex<Option<WsWriter>>>,
    pub event_handler: Arc<Mutex<Option<Arc<dyn EventHandler>>>>,
    pub connection_state: Arc<Mutex<ConnectionState>>,
}

impl Debug for RevoltClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevoltClient")
            .field("base_url", &self.base_url)
            .field("ws_url", &self.ws_url)
            .field("autumn_url", &self.autumn_url)
            .field("http", &"reqwest::Client")
            .field("event_handler", &"Arc<Mutex<Option<Arc<dyn EventHandler>>>>")
            .field("connection_state", &self.connection_state)
            .finish()
    }
}

const USER_AGENT: &str = concat!("revolt_api/", env!("CARGO_PKG_VERSION"));

impl RevoltClient {
    /// Construct a new [`RevoltClient`].
    ///
    /// # Parameters
    /// * `base_url`   – REST endpoint (e.g. `https://api.revolt.chat`).
    /// * `ws_url`     – WebSocket endpoint (`wss://…`).
    /// * `autumn_url` – file server endpoint (e.g. `https://autumn.revolt.chat`).
    pub fn new(base_url: String, ws_url: String, autumn_url: String) -> Result<Self, RevoltError> {
        let http = ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(USER_AGENT)
            .use_rustls_tls()
            .build()?;

        Ok(Self {
            base_url,
            ws_url,
            autumn_url,
            http,
            token: Arc::new(Mutex::new(None)),
            ws_tx: Arc::new(Mutex::new(None)),
            event_handler: Arc::new(Mutex::new(None)),
            connection_state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
        })
    }

    /* ─────────────────────────── Runtime helpers ─────────────────────────── */

    /// Manually set or clear the token.
    pub async fn set_token(&self, token: Option<(TokenKind, String)>) {
        *self.token.lock().await = token;
    }

    /// Build an authenticated `reqwest::RequestBuilder`.
    async fn authed_request(
        &self,
        method: Method,
        url: &str,
        extra_headers: Option<&[(&str, &str)]>,
    ) -> reqwest::RequestBuilder {
        let token_opt = self.token.lock().await.clone();

        let mut req = self
            .http
            .request(method, url)
            .header("Accept", "application/json, text/plain, */*");

        if let Some((kind, t)) = token_opt {
            req = req.header(kind.header(), t);
        }

        if let Some(hdrs) = extra_headers {
            for (k, v) in hdrs {
                req = req.header(*k, *v);
            }
        }

        req
    }

    /* ───────────── Convenience wrappers around HTTP verbs ───────────── */

    pub async fn authed_get(
        &self,
        url: &str,
        extra_headers: Option<&[(&str, &str)]>,
    ) -> Result<Response, RevoltError> {
        self.authed_request(Method::GET, url, extra_headers)
            .await
            .send()
            .await
            .map_err(RevoltError::ReqwestError)
    }

    pub async fn authed_post<T: serde::Serialize>(
        &self,
        url: &str,
        body: &T,
        extra_headers: Option<&[(&str, &str)]>,
    ) -> Result<Response, RevoltError> {
        self.authed_request(Method::POST, url, extra_headers)
            .await
            .json(body)
            .send()
            .await
            .map_err(RevoltError::ReqwestError)
    }
}

/// Turn a non-success response into the matching [`RevoltError`].
pub(crate) async fn error_for_status(resp: Response) -> Result<Response, RevoltError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let bytes = resp.bytes().await.map_err(RevoltError::ReqwestError)?;
    if let Ok(api_err) = serde_json::from_slice::<crate::types::error_types::Error>(&bytes) {
        return Err(handle_api_error(api_err));
    }

    Err(RevoltError::HttpStatus {
        code: status.as_u16(),
        body: String::from_utf8_lossy(&bytes).to_string(),
    })
}

/// Parse the body as JSON **iff** the response status is success.
pub async fn parse_json_if_ok<T: serde::de::DeserializeOwned>(
    resp: Response,
) -> Result<T, RevoltError> {
    let resp = error_for_status(resp).await?;
    let bytes = resp.bytes().await.map_err(RevoltError::ReqwestError)?;
    serde_json::from_slice::<T>(&bytes).map_err(RevoltError::SerdeError)
}
