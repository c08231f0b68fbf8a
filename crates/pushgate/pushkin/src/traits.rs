//! Pushkin traits.

use pushgate_core::{Device, Notification, NotificationContext};

use crate::PushkinError;

/// A provider-specific dispatch engine.
#[trait_variant::make(Send)]
pub trait Pushkin: Send + Sync {
    /// App ID this pushkin is configured for.
    fn name(&self) -> &str;

    /// Dispatch `notification` on behalf of `device`.
    ///
    /// Called once per device entry in the notification. Returns the
    /// pushkeys that should be rejected upstream.
    async fn dispatch_notification(
        &self,
        notification: &Notification,
        device: &Device,
        context: &NotificationContext,
    ) -> Result<Vec<String>, PushkinError>;
}
