//! Per-request notification context.

/// Correlation data for one inbound push request.
///
/// Created once by the ingress layer and handed unchanged to every pushkin
/// invoked for that request.
#[derive(Debug, Clone)]
pub struct NotificationContext {
    /// Unique ID used to correlate log lines for this request.
    pub request_id: String,

    /// Request span; pushkin spans are created as its children.
    pub span: tracing::Span,
}

impl NotificationContext {
    /// Create a context with a fresh request ID and its own span.
    pub fn new() -> Self {
        let request_id = uuid::Uuid::new_v4().simple().to_string();
        let span = tracing::info_span!("notify", request_id = %request_id);
        Self { request_id, span }
    }
}

impl Default for NotificationContext {
    fn default() -> Self {
        Self::new()
    }
}
