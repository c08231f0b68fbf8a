//! HTTP middleware.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use pushgate_core::NotificationContext;
use tracing::Instrument as _;

/// Result summary a handler attaches to its response for logging.
#[derive(Debug, Clone, Copy)]
pub struct NotifyOutcome {
    pub num_rejected: usize,
}

/// Give each request a fresh [`NotificationContext`] and log how it ended.
///
/// The context is stored in the request extensions; the rest of the request
/// runs inside its span.
pub async fn notify_context_middleware(mut request: Request, next: Next) -> Response {
    let context = NotificationContext::new();
    let span = context.span.clone();
    request.extensions_mut().insert(context);

    let started = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;

    let num_rejected = response
        .extensions()
        .get::<NotifyOutcome>()
        .map(|outcome| outcome.num_rejected);

    span.in_scope(|| {
        tracing::info!(
            status = %response.status(),
            num_rejected = ?num_rejected,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "processed notification"
        );
    });

    response
}
