use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// # Message Segment
///
/// One `{type, data}` element of an array-form OneBot message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageSegment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl MessageSegment {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            kind: kind.into(),
            data,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new("text", json!({ "text": text.into() }))
    }

    /// Mentions a user; `"all"` mentions everyone in the group.
    pub fn at(qq: impl ToString) -> Self {
        Self::new("at", json!({ "qq": qq.to_string() }))
    }

    /// `file` may be a URL, a `file://` path or `base64://` data.
    pub fn image(file: impl Into<String>) -> Self {
        Self::new("image", json!({ "file": file.into() }))
    }

    pub fn face(id: i64) -> Self {
        Self::new("face", json!({ "id": id.to_string() }))
    }

    pub fn reply(message_id: i64) -> Self {
        Self::new("reply", json!({ "id": message_id.to_string() }))
    }

    fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Text content of a `text` segment, empty for every other kind.
    pub fn text_content(&self) -> &str {
        if self.kind == "text" {
            self.data_str("text").unwrap_or("")
        } else {
            ""
        }
    }

    /// `url` of an `image` segment, falling back to its `file` field.
    pub fn image_url(&self) -> Option<&str> {
        if self.kind != "image" {
            return None;
        }
        self.data_str("url").or_else(|| self.data_str("file"))
    }

    /// True for an `at` segment, optionally targeting the given account.
    pub fn is_at(&self, qq: Option<i64>) -> bool {
        if self.kind != "at" {
            return false;
        }
        match qq {
            None => true,
            Some(id) => match self.data.get("qq") {
                Some(Value::String(s)) => s == &id.to_string(),
                Some(Value::Number(n)) => n.as_i64() == Some(id),
                _ => false,
            },
        }
    }
}

/// Anything that can be sent as a message body.
///
/// Strings go out as-is (CQ code form); segments go out as an array.
pub trait IntoMessage {
    fn into_message(self) -> Value;
}

impl IntoMessage for &str {
    fn into_message(self) -> Value {
        Value::String(self.to_string())
    }
}

impl IntoMessage for String {
    fn into_message(self) -> Value {
        Value::String(self)
    }
}

impl IntoMessage for &String {
    fn into_message(self) -> Value {
        Value::String(self.clone())
    }
}

impl IntoMessage for MessageSegment {
    fn into_message(self) -> Value {
        vec![self].into_message()
    }
}

impl IntoMessage for Vec<MessageSegment> {
    fn into_message(self) -> Value {
        Value::Array(
            self.into_iter()
                .map(|s| json!({ "type": s.kind, "data": Value::Object(s.data) }))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_and_accessors() {
        assert_eq!(MessageSegment::text("hi").text_content(), "hi");
        assert_eq!(MessageSegment::image("http://x/a.png").image_url(), Some("http://x/a.png"));
        assert!(MessageSegment::at(123).is_at(Some(123)));
        assert!(!MessageSegment::at(123).is_at(Some(124)));
        assert!(MessageSegment::at("all").is_at(None));
        assert_eq!(MessageSegment::face(1).text_content(), "");
    }

    #[test]
    fn test_wire_shape() {
        let wire = vec![MessageSegment::reply(7), MessageSegment::text("ok")].into_message();
        assert_eq!(
            wire,
            json!([
                {"type": "reply", "data": {"id": "7"}},
                {"type": "text", "data": {"text": "ok"}}
            ])
        );
        assert_eq!("plain".into_message(), json!("plain"));

        let parsed: MessageSegment = serde_json::from_value(json!({"type": "face"})).unwrap();
        assert_eq!(parsed.kind, "face");
        assert!(parsed.data.is_empty());
    }
}
