//! WebSocket event stream.
//!
//! [`RevoltClient::start`] connects, authenticates, spawns a heartbeat and a
//! read loop, and returns. The read loop reconnects with exponential backoff
//! until [`RevoltClient::close_ws`] is called or the retry budget runs out.

use std::{sync::Arc, time::Duration};

use async_recursion::async_recursion;
use futures::{stream::SplitStream, SinkExt, StreamExt};
use rustls::{ClientConfig, RootCertStore};
use tokio::{
    net::TcpStream,
    time::{interval, sleep},
};
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::protocol::{frame::coding::CloseCode, CloseFrame, Message as WsMessage},
    Connector, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::{
    client::{RevoltClient, WsWriter},
    error::RevoltError,
    types::message::Message as RevoltMessage,
    websocket::event_handler::{
        ChannelCreateEvent, ChannelDeleteEvent, ChannelUpdateEvent, EventHandler, ReadyEvent,
        ServerCreateEvent,
    },
    ClientToServerEvent, ServerToClientEvent,
};

type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Connection state for the WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Reconnecting,
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const MAX_RETRY_COUNT: u32 = 10;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

impl RevoltClient {
    /// Register the handler that receives decoded events.
    pub async fn event_handler<E: EventHandler>(&self, handler: E) -> Result<(), RevoltError> {
        *self.event_handler.lock().await = Some(Arc::new(handler));
        Ok(())
    }

    pub async fn start(&self) -> Result<(), RevoltError> {
        if self.ws_tx.lock().await.is_some() {
            return Err(RevoltError::Other(
                "WebSocket is already running on this client!".into(),
            ));
        }

        *self.connection_state.lock().await = ConnectionState::Connecting;

        let (write, read) = match self.connect_ws().await {
            Ok(halves) => halves,
            Err(e) => {
                *self.connection_state.lock().await = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        *self.ws_tx.lock().await = Some(write);
        *self.connection_state.lock().await = ConnectionState::Connected;
        self.authenticate_if_token().await?;

        tokio::spawn({
            let client = self.clone();
            async move { client.heartbeat().await }
        });

        tokio::spawn({
            let client = self.clone();
            async move { client.ws_read_loop_with_reconnect(read).await }
        });

        Ok(())
    }

    /* ────────────────────────── Socket setup ────────────────────────── */

    /// Open the socket over rustls (webpki roots) and split it.
    async fn connect_ws(&self) -> Result<(WsWriter, WsReader), RevoltError> {
        let mut root_cert_store = RootCertStore::empty();
        root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let (ws_stream, _response) = connect_async_tls_with_config(
            self.ws_url.as_str(),
            None,
            false,
            Some(Connector::Rustls(Arc::new(config))),
        )
        .await?;

        debug!(url = %self.ws_url, "WebSocket handshake complete");
        Ok(ws_stream.split())
    }

    async fn authenticate_if_token(&self) -> Result<(), RevoltError> {
        let token = self.token.lock().await.clone();
        if let Some((_, token)) = token {
            self.send_authenticate(&token).await?;
        }
        Ok(())
    }

    /// Ping every 30 seconds until the connection is closed for good.
    async fn heartbeat(&self) {
        let mut ticker = interval(HEARTBEAT_INTERVAL);
        loop {
            ticker.tick().await;
            match self.connection_state().await {
                ConnectionState::Disconnected | ConnectionState::Closing => break,
                ConnectionState::Connected => {
                    if let Err(e) = self.ping(None).await {
                        warn!("[WS] Ping failed: {e}");
                    }
                }
                ConnectionState::Connecting | ConnectionState::Reconnecting => {}
            }
        }
        debug!("[WS] Heartbeat stopped");
    }

    /// Read loop with automatic reconnection handling.
    async fn ws_read_loop_with_reconnect(&self, read: WsReader) {
        self.read_loop(read).await;

        let mut retry_count = 0;
        let mut retry_delay = Duration::from_secs(1);

        loop {
            if self.connection_state().await == ConnectionState::Closing {
                info!("[WS] Closing connection, not reconnecting");
                *self.connection_state.lock().await = ConnectionState::Disconnected;
                break;
            }

            *self.connection_state.lock().await = ConnectionState::Reconnecting;
            warn!(
                "[WS] Connection lost. Attempting to reconnect (attempt {}/{}) in {:?}...",
                retry_count + 1,
                MAX_RETRY_COUNT,
                retry_delay
            );
            sleep(retry_delay).await;

            match self.connect_ws().await {
                Ok((write, read)) => {
                    *self.ws_tx.lock().await = Some(write);
                    *self.connection_state.lock().await = ConnectionState::Connected;

                    if let Err(e) = self.authenticate_if_token().await {
                        error!("[WS] Failed to re-authenticate after reconnection: {e}");
                        *self.ws_tx.lock().await = None;
                        retry_count += 1;
                        retry_delay = std::cmp::min(retry_delay * 2, MAX_RETRY_DELAY);
                        continue;
                    }

                    info!("[WS] Successfully reconnected");
                    retry_count = 0;
                    retry_delay = Duration::from_secs(1);

                    self.read_loop(read).await;
                }
                Err(e) => {
                    warn!("[WS] Reconnection attempt failed: {e}");

                    retry_count += 1;
                    if retry_count >= MAX_RETRY_COUNT {
                        error!("[WS] Maximum reconnection attempts reached. Giving up.");
                        *self.connection_state.lock().await = ConnectionState::Disconnected;
                        break;
                    }

                    retry_delay = std::cmp::min(retry_delay * 2, MAX_RETRY_DELAY);
                }
            }
        }
    }

    /// Receive frames, decode them into events and dispatch them until the
    /// socket closes or errors.
    async fn read_loop(&self, mut read: WsReader) {
        while let Some(msg) = read.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("[WS] Error reading frame: {e}. Terminating read loop.");
                    break;
                }
            };

            match msg {
                WsMessage::Text(txt) => match serde_json::from_str::<ServerToClientEvent>(&txt) {
                    Ok(event) => self.handle_event(event).await,
                    Err(err) => warn!("[WS] Failed to deserialize event: {err}. Raw text: {txt}"),
                },
                WsMessage::Binary(bin) => match rmp_serde::from_slice::<ServerToClientEvent>(&bin) {
                    Ok(event) => self.handle_event(event).await,
                    Err(err) => warn!("[WS] Failed to deserialize MsgPack event: {err:?}"),
                },
                WsMessage::Close(cf) => {
                    info!("[WS] Close frame received: {:?}", cf);
                    break;
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
            }
        }

        *self.ws_tx.lock().await = None;
    }

    /// Get the current WebSocket connection state
    pub async fn connection_state(&self) -> ConnectionState {
        *self.connection_state.lock().await
    }

    /// Dispatch one event to the registered handler, unpacking `Bulk`.
    #[async_recursion]
    async fn handle_event(&self, event: ServerToClientEvent) {
        if let ServerToClientEvent::Bulk { v } = event {
            for sub_event in v {
                self.handle_event(sub_event).await;
            }
            return;
        }

        let maybe_handler = self.event_handler.lock().await.clone();
        let Some(handler) = maybe_handler else {
            return;
        };

        handler.on_event(self, &event).await;

        match event {
            ServerToClientEvent::Error { error } => {
                handler.on_error_event(self, &error).await;
            }
            ServerToClientEvent::Authenticated => {
                handler.on_authenticated(self).await;
            }
            ServerToClientEvent::Ready {
                users,
                servers,
                channels,
                members,
            } => {
                let ready = ReadyEvent {
                    users,
                    servers,
                    channels,
                    members,
                };
                handler.on_ready(self, &ready).await;
            }
            ServerToClientEvent::Message {
                id,
                channel,
                author,
                content,
                extra,
            } => {
                let mut payload = serde_json::json!({
                    "_id": id,
                    "channel": channel,
                    "author": author,
                    "content": content,
                });

                if let (Some(obj), Some(extra_obj)) = (payload.as_object_mut(), extra.as_object()) {
                    for (k, v) in extra_obj {
                        obj.entry(k.clone()).or_insert_with(|| v.clone());
                    }
                }

                let mut message: RevoltMessage = match serde_json::from_value(payload) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("[WS] Could not parse event into `Message`: {e}");
                        return;
                    }
                };
                message.client = Some(self.clone());

                handler.on_message(self, &message).await;
            }
            ServerToClientEvent::ChannelCreate { data } => {
                match serde_json::from_value::<ChannelCreateEvent>(data) {
                    Ok(parsed) => handler.on_channel_create(self, &parsed).await,
                    Err(e) => warn!("[WS] Could not parse ChannelCreate: {e}"),
                }
            }
            ServerToClientEvent::ChannelUpdate { id, data, clear } => {
                let evt = ChannelUpdateEvent {
                    id,
                    data,
                    clear: clear.unwrap_or_default(),
                };
                handler.on_channel_update(self, &evt).await;
            }
            ServerToClientEvent::ChannelDelete { id } => {
                handler
                    .on_channel_delete(self, &ChannelDeleteEvent { id })
                    .await;
            }
            ServerToClientEvent::ServerCreate {
                id,
                server,
                channels,
            } => {
                let evt = ServerCreateEvent {
                    id,
                    server,
                    channels,
                };
                handler.on_server_create(self, &evt).await;
            }
            ServerToClientEvent::ServerDelete { id } => {
                handler.on_server_delete(self, &id).await;
            }
            _ => {}
        }
    }

    /// Send an `Authenticate` event with the given token.
    pub async fn send_authenticate(&self, token: &str) -> Result<(), RevoltError> {
        self.send_ws(ClientToServerEvent::Authenticate {
            token: token.to_string(),
        })
        .await
    }

    /// Send a Ping to the server. If `data` is None, defaults to 0.
    pub async fn ping(&self, data: Option<i64>) -> Result<(), RevoltError> {
        self.send_ws(ClientToServerEvent::Ping {
            data: data.unwrap_or(0),
        })
        .await
    }

    async fn send_ws(&self, payload: ClientToServerEvent) -> Result<(), RevoltError> {
        let mut guard = self.ws_tx.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(RevoltError::NotConnected);
        };

        let text = serde_json::to_string(&payload)?;
        writer.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    pub async fn close_ws(&self, reason: Option<&str>) -> Result<(), RevoltError> {
        *self.connection_state.lock().await = ConnectionState::Closing;

        let mut guard = self.ws_tx.lock().await;
        if let Some(writer) = guard.as_mut() {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: reason.unwrap_or("Closing").to_string().into(),
            };
            writer.send(WsMessage::Close(Some(frame))).await?;
        }
        *guard = None;
        Ok(())
    }
}
