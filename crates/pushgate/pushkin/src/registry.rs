//! App ID to pushkin lookup.

use std::collections::HashMap;
use std::sync::Arc;

use pushgate_core::{Device, Notification, NotificationContext};
use pushgate_storage::CanonicalIdStore;

use crate::{DummyPushkin, GcmPushkin, Pushkin, PushkinError};

/// Every provider kind the gateway can be configured with.
pub enum AppPushkin<S> {
    Gcm(GcmPushkin<S>),
    Dummy(DummyPushkin),
}

impl<S: CanonicalIdStore> Pushkin for AppPushkin<S> {
    fn name(&self) -> &str {
        match self {
            Self::Gcm(p) => p.name(),
            Self::Dummy(p) => p.name(),
        }
    }

    async fn dispatch_notification(
        &self,
        notification: &Notification,
        device: &Device,
        context: &NotificationContext,
    ) -> Result<Vec<String>, PushkinError> {
        match self {
            Self::Gcm(p) => p.dispatch_notification(notification, device, context).await,
            Self::Dummy(p) => p.dispatch_notification(notification, device, context).await,
        }
    }
}

/// Pushkins keyed by app ID. Built once at startup and read-only afterwards.
pub struct PushkinRegistry<P> {
    pushkins: HashMap<String, Arc<P>>,
}

impl<P: Pushkin> PushkinRegistry<P> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            pushkins: HashMap::new(),
        }
    }

    /// Add a pushkin under its own app ID, replacing any previous one.
    pub fn with_pushkin(mut self, pushkin: P) -> Self {
        self.pushkins
            .insert(pushkin.name().to_string(), Arc::new(pushkin));
        self
    }

    /// Look up the pushkin for an app ID.
    pub fn get(&self, app_id: &str) -> Option<&Arc<P>> {
        self.pushkins.get(app_id)
    }

    /// Configured app IDs, sorted.
    pub fn app_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.pushkins.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.pushkins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pushkins.is_empty()
    }
}

impl<P: Pushkin> Default for PushkinRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Pushkin> FromIterator<P> for PushkinRegistry<P> {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |registry, pushkin| registry.with_pushkin(pushkin))
    }
}
