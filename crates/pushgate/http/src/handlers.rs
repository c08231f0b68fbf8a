//! Notify and metrics endpoint handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use pushgate_core::{NotificationContext, NotifyResponse, parse_notify_request};
use pushgate_pushkin::{Pushkin, PushkinRegistry};

use crate::{FanOutError, NotifyOutcome, fan_out};

/// Handle a push gateway notify request.
///
/// Expects the [`NotificationContext`] installed by
/// [`notify_context_middleware`](crate::notify_context_middleware).
pub async fn notify_handler<P>(
    State(registry): State<Arc<PushkinRegistry<P>>>,
    Extension(context): Extension<NotificationContext>,
    body: Bytes,
) -> Response
where
    P: Pushkin + 'static,
{
    let notification = match parse_notify_request(&body) {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "invalid notification");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    tracing::info!(num_devices = notification.devices.len(), "received notification");

    match fan_out(&registry, Arc::new(notification), &context).await {
        Ok(rejected) => {
            let outcome = NotifyOutcome {
                num_rejected: rejected.len(),
            };
            let mut response = (StatusCode::OK, Json(NotifyResponse { rejected })).into_response();
            response.extensions_mut().insert(outcome);
            response
        }
        Err(e @ FanOutError::Dispatch(_)) => {
            tracing::warn!(error = %e, "failed to dispatch notification");
            e.status().into_response()
        }
        Err(e @ FanOutError::Internal(_)) => {
            tracing::error!(error = %e, "exception whilst dispatching notification");
            e.status().into_response()
        }
    }
}

/// Serve every registered metric in the Prometheus text format.
pub async fn metrics_handler() -> Response {
    match pushgate_pushkin::metrics::encode_metrics() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
