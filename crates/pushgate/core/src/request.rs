//! Push gateway wire format: notify request parsing and response body.

use crate::Notification;

/// Reasons an inbound notify request is refused with a client error.
///
/// The `Display` output is the plain-text body sent back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum InvalidNotification {
    #[error("Expected JSON request body")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Invalid notification: expecting object in 'notification' key")]
    MissingNotification,

    #[error("Invalid notification: {0}")]
    Malformed(String),

    #[error("No devices in notification")]
    NoDevices,
}

/// Response body for a successfully dispatched notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NotifyResponse {
    /// Pushkeys the homeserver should stop using.
    pub rejected: Vec<String>,
}

/// Parse and validate the body of a notify request.
pub fn parse_notify_request(body: &[u8]) -> Result<Notification, InvalidNotification> {
    let mut value: serde_json::Value =
        serde_json::from_slice(body).map_err(InvalidNotification::InvalidJson)?;

    let raw = match value.get_mut("notification") {
        Some(n) if n.is_object() => n.take(),
        _ => return Err(InvalidNotification::MissingNotification),
    };

    let notification: Notification = serde_json::from_value(raw)
        .map_err(|e| InvalidNotification::Malformed(e.to_string()))?;

    if notification.devices.is_empty() {
        return Err(InvalidNotification::NoDevices);
    }

    Ok(notification)
}
