//! Dummy pushkin for smoke-testing deployments.

use std::time::Duration;

use pushgate_core::{Device, Notification, NotificationContext};

use crate::{Pushkin, PushkinError};

/// Dummy pushkin configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DummyConfig {
    /// Pushkeys starting with this prefix are accepted.
    #[serde(default)]
    pub prefix: String,

    /// Simulated provider latency.
    #[serde(default)]
    pub delay_ms: u64,
}

/// Pushkin that talks to nothing. Accepts pushkeys with the configured
/// prefix and rejects the rest.
#[derive(Debug, Clone)]
pub struct DummyPushkin {
    name: String,
    prefix: String,
    delay: Duration,
}

impl DummyPushkin {
    pub fn new(name: impl Into<String>, config: &DummyConfig) -> Self {
        Self {
            name: name.into(),
            prefix: config.prefix.clone(),
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

impl Pushkin for DummyPushkin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn dispatch_notification(
        &self,
        _notification: &Notification,
        device: &Device,
        context: &NotificationContext,
    ) -> Result<Vec<String>, PushkinError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let accepted = device.pushkey.starts_with(&self.prefix);
        tracing::info!(
            app_id = %self.name,
            request_id = %context.request_id,
            accepted,
            "dummy dispatch"
        );

        if accepted {
            Ok(Vec::new())
        } else {
            Ok(vec![device.pushkey.clone()])
        }
    }
}
