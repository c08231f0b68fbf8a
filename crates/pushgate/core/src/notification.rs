//! Notification and device types as sent by the homeserver.

/// Priority value that maps to a normal-priority push.
pub const LOW_PRIORITY: &str = "low";

/// A single inbound push request.
///
/// Every descriptive field is optional; only `devices` is required.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub event_id: Option<String>,

    #[serde(default, rename = "type")]
    pub event_type: Option<String>,

    #[serde(default)]
    pub sender: Option<String>,

    #[serde(default)]
    pub sender_display_name: Option<String>,

    #[serde(default)]
    pub room_id: Option<String>,

    #[serde(default)]
    pub room_name: Option<String>,

    #[serde(default)]
    pub room_alias: Option<String>,

    #[serde(default)]
    pub membership: Option<String>,

    #[serde(default)]
    pub user_is_target: Option<bool>,

    /// Event content. Opaque to the gateway.
    #[serde(default)]
    pub content: Option<serde_json::Value>,

    /// `"low"` or anything else, which is treated as high priority.
    #[serde(default)]
    pub prio: Option<String>,

    /// Long form of `prio`, used only when `prio` is absent.
    #[serde(default, skip_serializing)]
    pub priority: Option<String>,

    #[serde(default)]
    pub counts: Option<Counts>,

    pub devices: Vec<Device>,
}

impl Notification {
    /// Whether the sender asked for a low-priority push.
    pub fn is_low_priority(&self) -> bool {
        self.prio.as_deref().or(self.priority.as_deref()) == Some(LOW_PRIORITY)
    }

    /// Devices that belong to the given app ID, in request order.
    pub fn devices_for<'a>(&'a self, app_id: &'a str) -> impl Iterator<Item = &'a Device> + 'a {
        self.devices.iter().filter(move |d| d.app_id == app_id)
    }
}

/// Unread and missed-call badge counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Counts {
    #[serde(default)]
    pub unread: Option<u64>,

    #[serde(default)]
    pub missed_calls: Option<u64>,
}

/// A device registered to receive pushes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Device {
    /// Selects the pushkin that handles this device.
    pub app_id: String,

    /// Provider token. Anyone holding it can push to the device.
    pub pushkey: String,

    /// When the pushkey was last updated (ms since epoch).
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub pushkey_ts: i64,

    /// Provider-specific data from the pusher registration.
    #[serde(default)]
    pub data: Option<serde_json::Value>,

    #[serde(default)]
    pub tweaks: Tweaks,
}

/// Accept any JSON number, truncating fractions. Anything else reads as 0.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize as _;

    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .unwrap_or(0))
}

/// Per-device presentation hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Tweaks {
    #[serde(default)]
    pub sound: Option<String>,
}
