//! # OneBot WebSocket Client
//!
//! Keeps one forward WebSocket connection to a OneBot v11 endpoint open,
//! reconnecting after a fixed delay whenever it fails or closes.
//!
//! Outbound calls are framed as `{"action", "params", "echo"}` and matched to
//! their responses by `echo`. Inbound frames carrying `post_type` are push
//! events; each one is classified and dispatched on its own task so the
//! receive loop never waits for a handler.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::api::{call_failed, Bot, BotApi};
use crate::configs::TransportSettings;
use crate::connections::RedisCache;
use crate::core::Dispatcher;
use crate::error::TransportError;
use crate::events::classify;
use crate::transport::pending::PendingCalls;

pub const MSG_NOT_INITIALIZED: &str = "websocket not initialized";
pub const MSG_NOT_OPEN: &str = "websocket is not open";
pub const MSG_TIMEOUT: &str = "api timeout";

/// Connection state as seen by `call`.
enum Link {
    /// No connection was ever established.
    Uninitialized,
    /// A connection existed and is gone; a reconnect may be pending.
    Closed,
    /// Frames for the writer half of the live session.
    Open(mpsc::UnboundedSender<WsMessage>),
}

pub struct OneBotClient {
    settings: TransportSettings,
    pending: PendingCalls,
    link: Mutex<Link>,
    dispatcher: Arc<Dispatcher>,
    cache: Option<RedisCache>,
}

impl OneBotClient {
    pub fn new(settings: TransportSettings, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            settings,
            pending: PendingCalls::new(),
            link: Mutex::new(Link::Uninitialized),
            dispatcher,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Option<RedisCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Number of calls still waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.pending.outstanding()
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.lock_link(), Link::Open(_))
    }

    /// Handler-facing handle backed by this client.
    pub fn bot(self: &Arc<Self>) -> Bot {
        let api: Arc<dyn BotApi> = Arc::clone(self) as Arc<dyn BotApi>;
        Bot::new(api).with_cache(self.cache.clone())
    }

    fn lock_link(&self) -> std::sync::MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_link(&self, link: Link) {
        *self.lock_link() = link;
    }

    /// Issues one action and waits for its response.
    ///
    /// Never fails with `Err`: a closed socket, a send failure or a missing
    /// response within the call timeout come back as
    /// `{"status": "failed", "retcode": -1, "msg": ...}`.
    pub async fn call(&self, action: &str, params: Value) -> Value {
        let tx = match &*self.lock_link() {
            Link::Uninitialized => return call_failed(MSG_NOT_INITIALIZED),
            Link::Closed => return call_failed(MSG_NOT_OPEN),
            Link::Open(tx) => tx.clone(),
        };

        let params = if params.is_null() { json!({}) } else { params };
        let echo = Uuid::new_v4().to_string();
        let frame = json!({ "action": action, "params": params, "echo": echo });
        let rx = self.pending.register(echo.clone(), self.settings.call_timeout);

        trace!("Sending call {}: {}", echo, frame);
        if tx.send(WsMessage::Text(frame.to_string().into())).is_err() {
            self.pending.remove(&echo);
            return call_failed(MSG_NOT_OPEN);
        }

        match timeout(self.settings.call_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) | Err(_) => {
                self.pending.remove(&echo);
                warn!("API call {} ({}) timed out", action, echo);
                call_failed(MSG_TIMEOUT)
            }
        }
    }

    /// Connects and keeps reconnecting. Never returns.
    pub async fn connect(self: Arc<Self>) {
        loop {
            info!("Connecting to OneBot endpoint: {}", self.settings.uri);
            match self.session().await {
                Ok(()) => warn!("OneBot connection closed by remote host"),
                Err(e) => error!("OneBot connection error: {}", e),
            }
            info!("Reconnecting in {}s", self.settings.reconnect_delay.as_secs_f32());
            sleep(self.settings.reconnect_delay).await;
        }
    }

    /// Like [`OneBotClient::connect`], stopping when `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let client = Arc::clone(&self);
        tokio::select! {
            _ = client.connect() => {}
            _ = shutdown.recv() => {
                info!("OneBot client shutting down...");
            }
        }
        self.set_link(Link::Closed);
    }

    /// One connection lifetime. `Ok` on a clean close.
    async fn session(self: &Arc<Self>) -> Result<(), TransportError> {
        let mut request = self.settings.uri.as_str().into_client_request()?;
        if let Some(token) = &self.settings.token {
            let value =
                HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| TransportError::InvalidToken)?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (ws_stream, _) = connect_async(request).await?;
        info!("Connected to OneBot endpoint");
        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
        self.set_link(Link::Open(tx));

        let result = loop {
            tokio::select! {
                Some(outbound) = rx.recv() => {
                    if let Err(e) = write.send(outbound).await {
                        break Err(TransportError::from(e));
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => self.handle_frame(&text),
                    Some(Ok(WsMessage::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => self.handle_frame(text),
                        Err(_) => warn!("Dropping non UTF-8 binary frame ({} bytes)", data.len()),
                    },
                    Some(Ok(WsMessage::Close(frame))) => {
                        debug!("Close frame received: {:?}", frame);
                        break Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(TransportError::from(e)),
                    None => break Err(TransportError::Closed),
                }
            }
        };

        self.set_link(Link::Closed);
        let _ = write.close().await;
        result
    }

    fn handle_frame(self: &Arc<Self>, text: &str) {
        let mut value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("Malformed frame ({}): {}", e, text);
                return;
            }
        };

        if let Some(echo) = value.get("echo").and_then(Value::as_str).map(str::to_owned) {
            value = match self.pending.resolve(&echo, value) {
                Some(unmatched) => unmatched,
                None => return,
            };
            if value.get("post_type").is_none() {
                trace!("Dropping response for unknown or expired call {}", echo);
                return;
            }
        }

        if value.get("post_type").is_none() {
            warn!("Frame is neither a response nor an event: {}", text);
            return;
        }

        let client = Arc::clone(self);
        tokio::spawn(async move {
            let event = match classify(&value) {
                Ok(event) => Arc::new(event),
                Err(e) => {
                    error!("Failed to classify event: {}", e);
                    return;
                }
            };
            let bot = client.bot();
            if let Err(e) = client.dispatcher.dispatch(&bot, event).await {
                error!("Event handler failed: {:#}", e);
            }
        });
    }
}

impl BotApi for OneBotClient {
    fn call<'a>(&'a self, action: &'a str, params: Value) -> BoxFuture<'a, Value> {
        Self::call(self, action, params).boxed()
    }
}
