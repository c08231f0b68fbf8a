//! Fan a notification out to pushkins and join the results.

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::StatusCode;
use pushgate_core::{Notification, NotificationContext};
use pushgate_pushkin::{DispatchError, Pushkin, PushkinError, PushkinRegistry};
use tracing::Instrument as _;

/// Why a notification could not be dispatched.
#[derive(Debug, thiserror::Error)]
pub enum FanOutError {
    #[error("failed to dispatch notification: {0}")]
    Dispatch(DispatchError),

    #[error("exception whilst dispatching notification: {0}")]
    Internal(color_eyre::eyre::Report),
}

impl FanOutError {
    /// HTTP status reported to the homeserver.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Dispatch(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PushkinError> for FanOutError {
    fn from(e: PushkinError) -> Self {
        match e {
            PushkinError::Dispatch(e) => Self::Dispatch(e),
            PushkinError::Internal(e) => Self::Internal(e),
        }
    }
}

/// Dispatch `notification` to every device concurrently and merge the
/// rejected pushkeys.
///
/// Waits for every dispatch to finish before deciding. If any of them
/// failed, the first failure in device order is returned and no pushkeys
/// are reported.
pub async fn fan_out<P>(
    registry: &PushkinRegistry<P>,
    notification: Arc<Notification>,
    context: &NotificationContext,
) -> Result<Vec<String>, FanOutError>
where
    P: Pushkin + 'static,
{
    let mut rejected = Vec::new();
    let mut started = HashSet::new();
    let mut handles = Vec::new();

    for (index, device) in notification.devices.iter().enumerate() {
        let Some(pushkin) = registry.get(&device.app_id) else {
            tracing::warn!(app_id = %device.app_id, "got notification for unknown app ID");
            rejected.push(device.pushkey.clone());
            continue;
        };

        // Repeated entries for the same device are dispatched once.
        if !started.insert((device.app_id.clone(), device.pushkey.clone())) {
            continue;
        }

        tracing::debug!(app_id = %device.app_id, "sending push to pushkin");

        let pushkin = Arc::clone(pushkin);
        let notification = Arc::clone(&notification);
        let context = context.clone();
        let span = context.span.clone();

        handles.push(tokio::spawn(
            async move {
                let device = &notification.devices[index];
                pushkin
                    .dispatch_notification(&notification, device, &context)
                    .await
            }
            .instrument(span),
        ));
    }

    let mut first_error: Option<FanOutError> = None;

    for handle in handles {
        let error = match handle.await {
            Ok(Ok(pushkeys)) => {
                rejected.extend(pushkeys);
                continue;
            }
            Ok(Err(e)) => FanOutError::from(e),
            Err(e) => FanOutError::Internal(color_eyre::eyre::eyre!("dispatch task failed: {e}")),
        };

        match first_error {
            None => first_error = Some(error),
            Some(_) => tracing::warn!(error = %error, "additional dispatch failure"),
        }
    }

    if let Some(error) = first_error {
        return Err(error);
    }

    let mut seen = HashSet::new();
    rejected.retain(|pushkey| seen.insert(pushkey.clone()));

    Ok(rejected)
}
