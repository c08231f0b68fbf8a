//! GCM/FCM legacy HTTP wire format.

use pushgate_core::{MAX_BYTES_PER_FIELD, Notification, truncate_utf8, truncate_value};
use serde_json::{Map, Value};

/// FCM legacy HTTP endpoint.
pub const GCM_URL: &str = "https://fcm.googleapis.com/fcm/send";

/// Delivery priority requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GcmPriority {
    High,
    Normal,
}

impl GcmPriority {
    pub fn for_notification(n: &Notification) -> Self {
        if n.is_low_priority() {
            Self::Normal
        } else {
            Self::High
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
        }
    }
}

/// Request body for one send attempt.
///
/// A single target goes in `to`; several go in `registration_ids`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GcmRequest {
    pub data: Map<String, Value>,
    pub priority: GcmPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_ids: Option<Vec<String>>,
}

impl GcmRequest {
    pub fn new(data: Map<String, Value>, priority: GcmPriority, tokens: &[String]) -> Self {
        let (to, registration_ids) = match tokens {
            [single] => (Some(single.clone()), None),
            many => (None, Some(many.to_vec())),
        };

        Self {
            data,
            priority,
            to,
            registration_ids,
        }
    }

    /// Tokens targeted by this request, in send order.
    pub fn tokens(&self) -> Vec<&str> {
        match (&self.to, &self.registration_ids) {
            (Some(to), _) => vec![to.as_str()],
            (None, Some(ids)) => ids.iter().map(String::as_str).collect(),
            (None, None) => Vec::new(),
        }
    }
}

/// Response body for a 2xx reply.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GcmResponse {
    /// One entry per token sent, in the same order.
    pub results: Vec<GcmResult>,
}

/// Per-token result.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct GcmResult {
    #[serde(default)]
    pub message_id: Option<Value>,

    /// Replacement token to use from now on.
    #[serde(default)]
    pub registration_id: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

/// Build the `data` payload, truncating every textual field.
pub fn build_data(n: &Notification) -> Map<String, Value> {
    let text_fields = [
        ("event_id", &n.event_id),
        ("type", &n.event_type),
        ("sender", &n.sender),
        ("room_name", &n.room_name),
        ("room_alias", &n.room_alias),
        ("membership", &n.membership),
        ("sender_display_name", &n.sender_display_name),
        ("room_id", &n.room_id),
    ];

    let mut data = Map::new();
    for (key, value) in text_fields {
        let value = match value {
            Some(s) => Value::String(truncate_utf8(s, MAX_BYTES_PER_FIELD).to_string()),
            None => Value::Null,
        };
        data.insert(key.to_string(), value);
    }

    let mut content = n.content.clone().unwrap_or(Value::Null);
    truncate_value(&mut content, MAX_BYTES_PER_FIELD);
    data.insert("content".to_string(), content);

    data.insert(
        "prio".to_string(),
        Value::from(GcmPriority::for_notification(n).as_str()),
    );

    let counts = n.counts.clone().unwrap_or_default();
    data.insert("unread".to_string(), Value::from(counts.unread));
    data.insert("missed_calls".to_string(), Value::from(counts.missed_calls));

    data
}
