//! # Bot Facade
//!
//! [`BotApi`] is the single call-issuing seam; [`Bot`] groups the typed
//! OneBot actions on top of it. Every method returns the endpoint's response
//! verbatim, or a `{"status": "failed", ...}` value on call failure.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::segment::{IntoMessage, MessageSegment};
use crate::connections::RedisCache;
use crate::events::Event;

const LOGIN_INFO_TTL_SECS: u64 = 3600;

/// Anything that can issue a OneBot action and await its response.
///
/// Implementations never fail with `Err`; failures come back as a value
/// built by [`call_failed`].
pub trait BotApi: Send + Sync {
    fn call<'a>(&'a self, action: &'a str, params: Value) -> BoxFuture<'a, Value>;
}

/// The structured failure result of a call.
pub fn call_failed(msg: impl Into<String>) -> Value {
    json!({ "status": "failed", "retcode": -1, "msg": msg.into() })
}

/// `data` of a `get_login_info` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginInfo {
    pub user_id: i64,
    pub nickname: String,
}

#[derive(Clone)]
pub struct Bot {
    api: Arc<dyn BotApi>,
    cache: Option<RedisCache>,
    self_id: i64,
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("self_id", &self.self_id)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl Bot {
    pub fn new(api: Arc<dyn BotApi>) -> Self {
        Self {
            api,
            cache: None,
            self_id: 0,
        }
    }

    pub fn with_cache(mut self, cache: Option<RedisCache>) -> Self {
        self.cache = cache;
        self
    }

    /// A copy bound to the account that received the current event.
    pub fn with_self_id(&self, self_id: i64) -> Self {
        Self {
            self_id,
            ..self.clone()
        }
    }

    pub fn self_id(&self) -> i64 {
        self.self_id
    }

    pub async fn call(&self, action: &str, params: Value) -> Value {
        self.api.call(action, params).await
    }

    pub async fn send_private_msg(&self, user_id: i64, message: impl IntoMessage) -> Value {
        let params = json!({
            "user_id": user_id,
            "message": message.into_message(),
            "auto_escape": false,
        });
        self.call("send_private_msg", params).await
    }

    pub async fn send_group_msg(&self, group_id: i64, message: impl IntoMessage) -> Value {
        let params = json!({
            "group_id": group_id,
            "message": message.into_message(),
            "auto_escape": false,
        });
        self.call("send_group_msg", params).await
    }

    /// Sends to where the event came from: its group if it has one, else its
    /// user.
    pub async fn send(&self, event: &Event, message: impl IntoMessage) -> Value {
        if let Some(group_id) = event.group_id() {
            return self.send_group_msg(group_id, message).await;
        }
        match event.user_id() {
            Some(user_id) => self.send_private_msg(user_id, message).await,
            None => {
                warn!("No reply target for {} event", event.post_type().as_str());
                call_failed("Unknown message target")
            }
        }
    }

    /// Like [`Bot::send`], quoting the triggering message when there is one.
    pub async fn reply(&self, event: &Event, message: impl IntoMessage) -> Value {
        let message_id = event
            .as_message()
            .and_then(|m| m.body())
            .map(|b| b.message_id)
            .filter(|id| *id != 0);
        let Some(message_id) = message_id else {
            return self.send(event, message).await;
        };

        let mut segments = vec![MessageSegment::reply(message_id)];
        match message.into_message() {
            Value::String(text) => segments.push(MessageSegment::text(text)),
            Value::Array(items) => segments.extend(
                items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value::<MessageSegment>(item).ok()),
            ),
            other => segments.push(MessageSegment::text(other.to_string())),
        }
        self.send(event, segments).await
    }

    pub async fn delete_msg(&self, message_id: i64) -> Value {
        self.call("delete_msg", json!({ "message_id": message_id })).await
    }

    pub async fn get_msg(&self, message_id: i64) -> Value {
        self.call("get_msg", json!({ "message_id": message_id })).await
    }

    /// Profile likes; endpoints cap `times` at 10 per day.
    pub async fn send_like(&self, user_id: i64, times: u32) -> Value {
        self.call("send_like", json!({ "user_id": user_id, "times": times }))
            .await
    }

    pub async fn set_friend_add_request(&self, flag: &str, approve: bool, remark: &str) -> Value {
        let params = json!({ "flag": flag, "approve": approve, "remark": remark });
        self.call("set_friend_add_request", params).await
    }

    pub async fn set_group_add_request(&self, flag: &str, sub_type: &str, approve: bool, reason: &str) -> Value {
        let params = json!({
            "flag": flag,
            "sub_type": sub_type,
            "approve": approve,
            "reason": reason,
        });
        self.call("set_group_add_request", params).await
    }

    /// A `duration` of 0 lifts the ban.
    pub async fn set_group_ban(&self, group_id: i64, user_id: i64, duration_secs: u64) -> Value {
        let params = json!({ "group_id": group_id, "user_id": user_id, "duration": duration_secs });
        self.call("set_group_ban", params).await
    }

    pub async fn set_group_kick(&self, group_id: i64, user_id: i64, reject_add_request: bool) -> Value {
        let params = json!({
            "group_id": group_id,
            "user_id": user_id,
            "reject_add_request": reject_add_request,
        });
        self.call("set_group_kick", params).await
    }

    /// Login account info, cached in Redis for an hour when a cache is set.
    pub async fn get_login_info(&self, no_cache: bool) -> Option<LoginInfo> {
        let key = format!("neobot:cache:get_login_info:{}", self.self_id);

        if let (Some(cache), false) = (&self.cache, no_cache) {
            match cache.get(&key).await {
                Ok(Some(raw)) => match serde_json::from_str::<LoginInfo>(&raw) {
                    Ok(info) => return Some(info),
                    Err(e) => warn!("Discarding bad cached login info: {}", e),
                },
                Ok(None) => {}
                Err(e) => warn!("Redis get failed for {}: {}", key, e),
            }
        }

        let res = self.call("get_login_info", json!({})).await;
        let info: LoginInfo = match res.get("data").cloned().map(serde_json::from_value) {
            Some(Ok(info)) => info,
            _ => {
                debug!("get_login_info returned no usable data: {}", res);
                return None;
            }
        };

        if let Some(cache) = &self.cache {
            if let Ok(raw) = serde_json::to_string(&info) {
                if let Err(e) = cache.set_ex(&key, &raw, LOGIN_INFO_TTL_SECS).await {
                    warn!("Redis set failed for {}: {}", key, e);
                }
            }
        }
        Some(info)
    }
}
