//! Push Gateway HTTP Layer
//!
//! Axum handlers for the push gateway notify endpoint and metrics scraping.

mod fanout;
mod handlers;
mod middleware;

pub use fanout::*;
pub use handlers::*;
pub use middleware::*;

use std::sync::Arc;

use axum::Router;
use pushgate_pushkin::{Pushkin, PushkinRegistry};

/// Path of the notify endpoint.
pub const NOTIFY_PATH: &str = "/_matrix/push/v1/notify";

/// Path of the Prometheus scrape endpoint.
pub const METRICS_PATH: &str = "/metrics";

/// Create the push gateway router.
pub fn gateway_router<P>(registry: Arc<PushkinRegistry<P>>) -> Router
where
    P: Pushkin + 'static,
{
    use axum::routing::post;

    Router::new()
        .route(NOTIFY_PATH, post(handlers::notify_handler::<P>))
        .layer(axum::middleware::from_fn(middleware::notify_context_middleware))
        .with_state(registry)
}

/// Create the router serving Prometheus metrics, meant for its own listener.
pub fn metrics_router() -> Router {
    use axum::routing::get;

    pushgate_pushkin::metrics::init_metrics();

    Router::new().route(METRICS_PATH, get(handlers::metrics_handler))
}
