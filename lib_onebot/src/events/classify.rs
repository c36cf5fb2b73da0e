//! # Event Classifier
//!
//! Pure mapping from a raw push frame to an [`Event`]. Absent or mistyped
//! optional fields fall back to `0`, `""` or `false`; the endpoint is not
//! assumed to be strict.

use serde_json::{Map, Value};

use crate::api::MessageSegment;
use crate::error::ClassifyError;
use crate::events::model::*;

type Raw = Map<String, Value>;

/// Integer field, accepting numeric strings. Missing or invalid gives `0`.
fn int(raw: &Raw, key: &str) -> i64 {
    match raw.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| u as i64))
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn string(raw: &Raw, key: &str) -> String {
    opt_string(raw, key).unwrap_or_default()
}

fn opt_string(raw: &Raw, key: &str) -> Option<String> {
    match raw.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn opt_bool(raw: &Raw, key: &str) -> Option<bool> {
    raw.get(key).and_then(Value::as_bool)
}

/// Nested object field; an absent or non-object value reads as empty.
fn object<'a>(raw: &'a Raw, key: &str, empty: &'a Raw) -> &'a Raw {
    raw.get(key).and_then(Value::as_object).unwrap_or(empty)
}

/// Classifies one decoded frame.
///
/// # Errors
/// Fails only when the frame is not an object or its `post_type` is missing
/// or outside the known set. Unknown subtypes become `Unknown` variants.
pub fn classify(raw: &Value) -> Result<Event, ClassifyError> {
    let raw = raw.as_object().ok_or(ClassifyError::NotAnObject)?;
    let post_type = match raw.get("post_type") {
        Some(Value::String(s)) => s.as_str(),
        Some(other) => return Err(ClassifyError::UnknownPostType(other.to_string())),
        None => return Err(ClassifyError::MissingPostType),
    };
    let post_type = PostType::from_wire(post_type)
        .ok_or_else(|| ClassifyError::UnknownPostType(post_type.to_string()))?;

    let kind = match post_type {
        PostType::Message => EventKind::Message(build_message(raw)),
        PostType::MessageSent => EventKind::MessageSent(build_message(raw)),
        PostType::Notice => EventKind::Notice(build_notice(raw)),
        PostType::Request => EventKind::Request(build_request(raw)),
        PostType::Meta => EventKind::Meta(build_meta(raw)),
    };

    Ok(Event {
        time: int(raw, "time"),
        self_id: int(raw, "self_id"),
        kind,
    })
}

fn build_segments(raw: &Raw) -> Vec<MessageSegment> {
    let Some(Value::Array(items)) = raw.get("message") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| MessageSegment {
            kind: string(item, "type"),
            data: item
                .get("data")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        })
        .collect()
}

fn build_sender(raw: &Raw) -> Sender {
    let empty = Raw::new();
    let s = object(raw, "sender", &empty);
    Sender {
        user_id: int(s, "user_id"),
        nickname: string(s, "nickname"),
        sex: opt_string(s, "sex").unwrap_or_else(|| "unknown".to_string()),
        age: int(s, "age"),
        card: opt_string(s, "card"),
        area: opt_string(s, "area"),
        level: opt_string(s, "level"),
        role: opt_string(s, "role"),
        title: opt_string(s, "title"),
    }
}

fn build_message(raw: &Raw) -> MessageEvent {
    let message_type = string(raw, "message_type");
    let body = || MessageBody {
        sub_type: string(raw, "sub_type"),
        message_id: int(raw, "message_id"),
        user_id: int(raw, "user_id"),
        message: build_segments(raw),
        raw_message: string(raw, "raw_message"),
        font: int(raw, "font"),
        sender: build_sender(raw),
    };

    match message_type.as_str() {
        "private" => MessageEvent::Private(body()),
        "group" => {
            let anonymous = raw
                .get("anonymous")
                .and_then(Value::as_object)
                .map(|a| Anonymous {
                    id: int(a, "id"),
                    name: string(a, "name"),
                    flag: string(a, "flag"),
                });
            MessageEvent::Group {
                group_id: int(raw, "group_id"),
                anonymous,
                body: body(),
            }
        }
        _ => MessageEvent::Unknown {
            message_type,
            user_id: int(raw, "user_id"),
        },
    }
}

fn build_notice(raw: &Raw) -> NoticeEvent {
    let notice_type = string(raw, "notice_type");
    let empty = Raw::new();

    match notice_type.as_str() {
        "friend_add" => NoticeEvent::FriendAdd {
            user_id: int(raw, "user_id"),
        },
        "friend_recall" => NoticeEvent::FriendRecall {
            user_id: int(raw, "user_id"),
            message_id: int(raw, "message_id"),
        },
        "group_recall" => NoticeEvent::GroupRecall {
            group_id: int(raw, "group_id"),
            user_id: int(raw, "user_id"),
            operator_id: int(raw, "operator_id"),
            message_id: int(raw, "message_id"),
        },
        "group_increase" => NoticeEvent::GroupIncrease {
            group_id: int(raw, "group_id"),
            user_id: int(raw, "user_id"),
            operator_id: int(raw, "operator_id"),
            sub_type: string(raw, "sub_type"),
        },
        "group_decrease" => NoticeEvent::GroupDecrease {
            group_id: int(raw, "group_id"),
            user_id: int(raw, "user_id"),
            operator_id: int(raw, "operator_id"),
            sub_type: string(raw, "sub_type"),
        },
        "group_admin" => NoticeEvent::GroupAdmin {
            group_id: int(raw, "group_id"),
            user_id: int(raw, "user_id"),
            sub_type: string(raw, "sub_type"),
        },
        "group_ban" => NoticeEvent::GroupBan {
            group_id: int(raw, "group_id"),
            user_id: int(raw, "user_id"),
            operator_id: int(raw, "operator_id"),
            duration: int(raw, "duration"),
            sub_type: string(raw, "sub_type"),
        },
        "group_upload" => {
            let f = object(raw, "file", &empty);
            NoticeEvent::GroupUpload {
                group_id: int(raw, "group_id"),
                user_id: int(raw, "user_id"),
                file: GroupFile {
                    id: string(f, "id"),
                    name: string(f, "name"),
                    size: int(f, "size"),
                    busid: int(f, "busid"),
                },
            }
        }
        "notify" => NoticeEvent::Notify(build_notify(raw)),
        "group_card" => NoticeEvent::GroupCard {
            group_id: int(raw, "group_id"),
            user_id: int(raw, "user_id"),
            card_new: string(raw, "card_new"),
            card_old: string(raw, "card_old"),
        },
        "offline_file" => {
            let f = object(raw, "file", &empty);
            NoticeEvent::OfflineFile {
                user_id: int(raw, "user_id"),
                file: OfflineFile {
                    name: string(f, "name"),
                    size: int(f, "size"),
                    url: string(f, "url"),
                },
            }
        }
        "client_status" => {
            let c = object(raw, "client", &empty);
            NoticeEvent::ClientStatus {
                client: ClientStatus {
                    online: opt_bool(c, "online").unwrap_or(false),
                    status: string(c, "status"),
                },
            }
        }
        "essence" => NoticeEvent::Essence {
            sub_type: string(raw, "sub_type"),
            group_id: int(raw, "group_id"),
            sender_id: int(raw, "sender_id"),
            operator_id: int(raw, "operator_id"),
            message_id: int(raw, "message_id"),
        },
        _ => NoticeEvent::Unknown { notice_type },
    }
}

fn build_notify(raw: &Raw) -> NotifyEvent {
    let sub_type = string(raw, "sub_type");
    match sub_type.as_str() {
        "poke" => NotifyEvent::Poke {
            user_id: int(raw, "user_id"),
            target_id: int(raw, "target_id"),
            group_id: int(raw, "group_id"),
        },
        "lucky_king" => NotifyEvent::LuckyKing {
            user_id: int(raw, "user_id"),
            group_id: int(raw, "group_id"),
            target_id: int(raw, "target_id"),
        },
        "honor" => NotifyEvent::Honor {
            user_id: int(raw, "user_id"),
            group_id: int(raw, "group_id"),
            honor_type: string(raw, "honor_type"),
        },
        _ => NotifyEvent::Other {
            sub_type,
            user_id: int(raw, "user_id"),
        },
    }
}

fn build_request(raw: &Raw) -> RequestEvent {
    let request_type = string(raw, "request_type");
    match request_type.as_str() {
        "friend" => RequestEvent::Friend {
            user_id: int(raw, "user_id"),
            comment: string(raw, "comment"),
            flag: string(raw, "flag"),
        },
        "group" => RequestEvent::Group {
            sub_type: string(raw, "sub_type"),
            group_id: int(raw, "group_id"),
            user_id: int(raw, "user_id"),
            comment: string(raw, "comment"),
            flag: string(raw, "flag"),
        },
        _ => RequestEvent::Unknown { request_type },
    }
}

fn build_meta(raw: &Raw) -> MetaEvent {
    let meta_event_type = string(raw, "meta_event_type");
    match meta_event_type.as_str() {
        "heartbeat" => {
            let empty = Raw::new();
            let s = object(raw, "status", &empty);
            MetaEvent::Heartbeat {
                status: HeartbeatStatus {
                    online: opt_bool(s, "online"),
                    good: opt_bool(s, "good").unwrap_or(true),
                },
                interval: int(raw, "interval"),
            }
        }
        "lifecycle" => MetaEvent::Lifecycle {
            sub_type: string(raw, "sub_type"),
        },
        _ => MetaEvent::Unknown { meta_event_type },
    }
}
