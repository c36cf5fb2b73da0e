use crate::api::MessageSegment;

/// Top-level `post_type` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostType {
    Message,
    MessageSent,
    Notice,
    Request,
    Meta,
}

impl PostType {
    /// Parses the wire value; `None` for anything outside the known set.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "message" => Some(Self::Message),
            "message_sent" => Some(Self::MessageSent),
            "notice" => Some(Self::Notice),
            "request" => Some(Self::Request),
            "meta_event" => Some(Self::Meta),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::MessageSent => "message_sent",
            Self::Notice => "notice",
            Self::Request => "request",
            Self::Meta => "meta_event",
        }
    }
}

/// # OneBot Event
///
/// A classified push event. `time` and `self_id` are always present, falling
/// back to `0` when the endpoint omits them.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Unix timestamp (seconds) of the event.
    pub time: i64,
    /// Account id of the bot that received the event.
    pub self_id: i64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Message(MessageEvent),
    /// A message sent by the bot itself, reported back by the endpoint.
    MessageSent(MessageEvent),
    Notice(NoticeEvent),
    Request(RequestEvent),
    Meta(MetaEvent),
}

impl Event {
    pub fn post_type(&self) -> PostType {
        match &self.kind {
            EventKind::Message(_) => PostType::Message,
            EventKind::MessageSent(_) => PostType::MessageSent,
            EventKind::Notice(_) => PostType::Notice,
            EventKind::Request(_) => PostType::Request,
            EventKind::Meta(_) => PostType::Meta,
        }
    }

    /// The message payload for both `message` and `message_sent` events.
    pub fn as_message(&self) -> Option<&MessageEvent> {
        match &self.kind {
            EventKind::Message(m) | EventKind::MessageSent(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_notice(&self) -> Option<&NoticeEvent> {
        match &self.kind {
            EventKind::Notice(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_request(&self) -> Option<&RequestEvent> {
        match &self.kind {
            EventKind::Request(r) => Some(r),
            _ => None,
        }
    }

    /// The category specific subtype string (`message_type`, `notice_type`,
    /// `request_type` or `meta_event_type`).
    pub fn subtype(&self) -> &str {
        match &self.kind {
            EventKind::Message(m) | EventKind::MessageSent(m) => m.message_type(),
            EventKind::Notice(n) => n.notice_type(),
            EventKind::Request(r) => r.request_type(),
            EventKind::Meta(m) => m.meta_event_type(),
        }
    }

    /// The user that triggered the event, when the variant has one.
    pub fn user_id(&self) -> Option<i64> {
        match &self.kind {
            EventKind::Message(m) | EventKind::MessageSent(m) => Some(m.user_id()),
            EventKind::Notice(n) => n.user_id(),
            EventKind::Request(r) => r.user_id(),
            EventKind::Meta(_) => None,
        }
    }

    /// The group the event happened in, when the variant has one.
    pub fn group_id(&self) -> Option<i64> {
        match &self.kind {
            EventKind::Message(m) | EventKind::MessageSent(m) => m.group_id(),
            EventKind::Notice(n) => n.group_id(),
            EventKind::Request(RequestEvent::Group { group_id, .. }) => Some(*group_id),
            _ => None,
        }
    }
}

/// `sender` sub-record of a message event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub user_id: i64,
    pub nickname: String,
    /// `male`, `female` or `unknown`.
    pub sex: String,
    pub age: i64,
    pub card: Option<String>,
    pub area: Option<String>,
    pub level: Option<String>,
    /// `owner`, `admin` or `member`.
    pub role: Option<String>,
    pub title: Option<String>,
}

impl Default for Sender {
    fn default() -> Self {
        Self {
            user_id: 0,
            nickname: String::new(),
            sex: "unknown".to_string(),
            age: 0,
            card: None,
            area: None,
            level: None,
            role: None,
            title: None,
        }
    }
}

/// Anonymous identity of a group message sender.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Anonymous {
    pub id: i64,
    pub name: String,
    pub flag: String,
}

/// Fields shared by every known message type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageBody {
    pub sub_type: String,
    pub message_id: i64,
    pub user_id: i64,
    pub message: Vec<MessageSegment>,
    pub raw_message: String,
    pub font: i64,
    pub sender: Sender,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageEvent {
    Private(MessageBody),
    Group {
        group_id: i64,
        anonymous: Option<Anonymous>,
        body: MessageBody,
    },
    /// A `message_type` this crate does not know about.
    Unknown { message_type: String, user_id: i64 },
}

impl MessageEvent {
    pub fn message_type(&self) -> &str {
        match self {
            Self::Private(_) => "private",
            Self::Group { .. } => "group",
            Self::Unknown { message_type, .. } => message_type,
        }
    }

    /// Sender id, including for unknown message types.
    pub fn user_id(&self) -> i64 {
        match self {
            Self::Private(body) | Self::Group { body, .. } => body.user_id,
            Self::Unknown { user_id, .. } => *user_id,
        }
    }

    pub fn body(&self) -> Option<&MessageBody> {
        match self {
            Self::Private(body) | Self::Group { body, .. } => Some(body),
            Self::Unknown { .. } => None,
        }
    }

    pub fn group_id(&self) -> Option<i64> {
        match self {
            Self::Group { group_id, .. } => Some(*group_id),
            _ => None,
        }
    }

    /// Raw text of the message, empty for unknown message types.
    pub fn raw_message(&self) -> &str {
        self.body().map(|b| b.raw_message.as_str()).unwrap_or("")
    }
}

/// `file` sub-record of a `group_upload` notice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupFile {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub busid: i64,
}

/// `file` sub-record of an `offline_file` notice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OfflineFile {
    pub name: String,
    pub size: i64,
    pub url: String,
}

/// `client` sub-record of a `client_status` notice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientStatus {
    pub online: bool,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NoticeEvent {
    FriendAdd {
        user_id: i64,
    },
    FriendRecall {
        user_id: i64,
        message_id: i64,
    },
    GroupRecall {
        group_id: i64,
        user_id: i64,
        operator_id: i64,
        message_id: i64,
    },
    /// `sub_type` is `approve` or `invite`.
    GroupIncrease {
        group_id: i64,
        user_id: i64,
        operator_id: i64,
        sub_type: String,
    },
    /// `sub_type` is `leave`, `kick`, `kick_me` or `disband`.
    GroupDecrease {
        group_id: i64,
        user_id: i64,
        operator_id: i64,
        sub_type: String,
    },
    GroupAdmin {
        group_id: i64,
        user_id: i64,
        sub_type: String,
    },
    /// A `duration` of 0 lifts the ban.
    GroupBan {
        group_id: i64,
        user_id: i64,
        operator_id: i64,
        duration: i64,
        sub_type: String,
    },
    GroupUpload {
        group_id: i64,
        user_id: i64,
        file: GroupFile,
    },
    Notify(NotifyEvent),
    GroupCard {
        group_id: i64,
        user_id: i64,
        card_new: String,
        card_old: String,
    },
    OfflineFile {
        user_id: i64,
        file: OfflineFile,
    },
    ClientStatus {
        client: ClientStatus,
    },
    Essence {
        sub_type: String,
        group_id: i64,
        sender_id: i64,
        operator_id: i64,
        message_id: i64,
    },
    Unknown {
        notice_type: String,
    },
}

/// Second level of the `notify` notice, keyed by `sub_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyEvent {
    Poke {
        user_id: i64,
        target_id: i64,
        group_id: i64,
    },
    LuckyKing {
        user_id: i64,
        group_id: i64,
        target_id: i64,
    },
    /// `honor_type` is `talkative`, `performer` or `emotion`.
    Honor {
        user_id: i64,
        group_id: i64,
        honor_type: String,
    },
    Other {
        sub_type: String,
        user_id: i64,
    },
}

impl NotifyEvent {
    pub fn sub_type(&self) -> &str {
        match self {
            Self::Poke { .. } => "poke",
            Self::LuckyKing { .. } => "lucky_king",
            Self::Honor { .. } => "honor",
            Self::Other { sub_type, .. } => sub_type,
        }
    }
}

impl NoticeEvent {
    pub fn notice_type(&self) -> &str {
        match self {
            Self::FriendAdd { .. } => "friend_add",
            Self::FriendRecall { .. } => "friend_recall",
            Self::GroupRecall { .. } => "group_recall",
            Self::GroupIncrease { .. } => "group_increase",
            Self::GroupDecrease { .. } => "group_decrease",
            Self::GroupAdmin { .. } => "group_admin",
            Self::GroupBan { .. } => "group_ban",
            Self::GroupUpload { .. } => "group_upload",
            Self::Notify(_) => "notify",
            Self::GroupCard { .. } => "group_card",
            Self::OfflineFile { .. } => "offline_file",
            Self::ClientStatus { .. } => "client_status",
            Self::Essence { .. } => "essence",
            Self::Unknown { notice_type } => notice_type,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::FriendAdd { user_id }
            | Self::FriendRecall { user_id, .. }
            | Self::GroupRecall { user_id, .. }
            | Self::GroupIncrease { user_id, .. }
            | Self::GroupDecrease { user_id, .. }
            | Self::GroupAdmin { user_id, .. }
            | Self::GroupBan { user_id, .. }
            | Self::GroupUpload { user_id, .. }
            | Self::GroupCard { user_id, .. }
            | Self::OfflineFile { user_id, .. } => Some(*user_id),
            Self::Notify(NotifyEvent::Poke { user_id, .. })
            | Self::Notify(NotifyEvent::LuckyKing { user_id, .. })
            | Self::Notify(NotifyEvent::Honor { user_id, .. })
            | Self::Notify(NotifyEvent::Other { user_id, .. }) => Some(*user_id),
            Self::Essence { sender_id, .. } => Some(*sender_id),
            Self::ClientStatus { .. } | Self::Unknown { .. } => None,
        }
    }

    pub fn group_id(&self) -> Option<i64> {
        match self {
            Self::GroupRecall { group_id, .. }
            | Self::GroupIncrease { group_id, .. }
            | Self::GroupDecrease { group_id, .. }
            | Self::GroupAdmin { group_id, .. }
            | Self::GroupBan { group_id, .. }
            | Self::GroupUpload { group_id, .. }
            | Self::GroupCard { group_id, .. }
            | Self::Essence { group_id, .. } => Some(*group_id),
            Self::Notify(NotifyEvent::Poke { group_id, .. })
            | Self::Notify(NotifyEvent::LuckyKing { group_id, .. })
            | Self::Notify(NotifyEvent::Honor { group_id, .. }) => Some(*group_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent {
    Friend {
        user_id: i64,
        comment: String,
        /// Pass back to `set_friend_add_request`.
        flag: String,
    },
    /// `sub_type` is `add` or `invite`.
    Group {
        sub_type: String,
        group_id: i64,
        user_id: i64,
        comment: String,
        flag: String,
    },
    Unknown {
        request_type: String,
    },
}

impl RequestEvent {
    pub fn request_type(&self) -> &str {
        match self {
            Self::Friend { .. } => "friend",
            Self::Group { .. } => "group",
            Self::Unknown { request_type } => request_type,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::Friend { user_id, .. } | Self::Group { user_id, .. } => Some(*user_id),
            Self::Unknown { .. } => None,
        }
    }
}

/// `status` sub-record of a heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatStatus {
    pub online: Option<bool>,
    pub good: bool,
}

impl Default for HeartbeatStatus {
    fn default() -> Self {
        Self {
            online: None,
            good: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetaEvent {
    /// `interval` is in milliseconds.
    Heartbeat {
        status: HeartbeatStatus,
        interval: i64,
    },
    /// `sub_type` is `enable`, `disable` or `connect`.
    Lifecycle { sub_type: String },
    Unknown { meta_event_type: String },
}

impl MetaEvent {
    pub fn meta_event_type(&self) -> &str {
        match self {
            Self::Heartbeat { .. } => "heartbeat",
            Self::Lifecycle { .. } => "lifecycle",
            Self::Unknown { meta_event_type } => meta_event_type,
        }
    }
}
