//! Event model - Dispatcher input and sink payload
//!
//! Wire shape follows the Segment tracking API (camelCase JSON).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form attribute map, passed through opaquely.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[serde(alias = "i")]
    Identify,
    #[serde(alias = "t")]
    Track,
    #[serde(alias = "p")]
    Page,
    #[serde(alias = "s")]
    Screen,
    #[serde(alias = "a")]
    Alias,
    #[serde(alias = "g")]
    Group,
}

impl EventKind {
    /// Full lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identify => "identify",
            Self::Track => "track",
            Self::Page => "page",
            Self::Screen => "screen",
            Self::Alias => "alias",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a kind hint is not a known name or alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind(pub String);

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type '{}'", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identify" | "i" => Ok(Self::Identify),
            "track" | "t" => Ok(Self::Track),
            "page" | "p" => Ok(Self::Page),
            "screen" | "s" => Ok(Self::Screen),
            "alias" | "a" => Ok(Self::Alias),
            "group" | "g" => Ok(Self::Group),
            other => Err(UnknownEventKind(other.to_string())),
        }
    }
}

/// One telemetry record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique id, generated at dispatch when empty
    #[serde(default)]
    pub message_id: String,

    /// Client timestamp, defaults to receipt time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Dispatch timestamp, always overwritten at send time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub write_key: String,

    #[serde(default)]
    pub project_id: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EventKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Attributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Attributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<Attributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrations: Option<Attributes>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub anonymous_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,

    /// Track only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event: String,

    /// Page only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,

    /// Page only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Event {
    /// Create an empty event of the given kind
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    /// True once the dispatcher has populated every required identifier
    pub fn is_dispatchable(&self) -> bool {
        !self.message_id.is_empty() && !self.project_id.is_empty() && self.kind.is_some()
    }
}

/// Ordered group of events sharing an optional context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,

    /// Shared context; overwrites every contained event's context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Attributes>,

    #[serde(rename = "batch", default)]
    pub messages: Vec<Event>,
}

impl Batch {
    /// Wrap one event as a single-element batch envelope
    ///
    /// The write key is stripped from the body; transports carry it as a
    /// credential instead.
    pub fn envelope(event: &Event) -> Self {
        let mut message = event.clone();
        message.write_key.clear();
        Self {
            message_id: event.message_id.clone(),
            timestamp: event.timestamp,
            sent_at: event.sent_at,
            context: event.context.clone(),
            messages: vec![message],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_aliases() {
        for (hint, kind) in [
            ("i", EventKind::Identify),
            ("identify", EventKind::Identify),
            ("t", EventKind::Track),
            ("p", EventKind::Page),
            ("screen", EventKind::Screen),
            ("a", EventKind::Alias),
            ("g", EventKind::Group),
        ] {
            assert_eq!(hint.parse::<EventKind>().unwrap(), kind);
        }
        assert!("tracking".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_event_decode_camel_case() {
        let json = r#"{
            "messageId": "m-1",
            "type": "t",
            "event": "Signed Up",
            "userId": "u-1",
            "timestamp": "2024-01-01T00:00:00Z",
            "properties": { "plan": "pro", "seats": 3 }
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.message_id, "m-1");
        assert_eq!(event.kind, Some(EventKind::Track));
        assert_eq!(event.event, "Signed Up");
        assert_eq!(event.properties.unwrap()["seats"], 3);
        assert!(event.sent_at.is_none());
    }

    #[test]
    fn test_kind_serializes_full_name() {
        let event = Event::new(EventKind::Page);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "page");
        assert!(value.get("writeKey").is_none());
    }

    #[test]
    fn test_batch_decode() {
        let json = r#"{
            "context": { "ip": "10.0.0.1" },
            "batch": [ { "type": "identify", "userId": "u" }, { "type": "track" } ]
        }"#;
        let batch: Batch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.messages.len(), 2);
        assert_eq!(batch.context.unwrap()["ip"], "10.0.0.1");
    }

    #[test]
    fn test_envelope_strips_write_key() {
        let mut event = Event::new(EventKind::Track);
        event.message_id = "m-2".into();
        event.write_key = "secret".into();
        let envelope = Batch::envelope(&event);
        assert_eq!(envelope.message_id, "m-2");
        assert_eq!(envelope.messages.len(), 1);
        assert!(envelope.messages[0].write_key.is_empty());
    }
}
