//! Dispatch error types.

/// Provider-side failure that aborts dispatch for the whole notification.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("provider rejected the request as invalid: {0}")]
    BadRequest(String),

    #[error("not authorised to push: {0}")]
    Unauthorized(String),

    #[error("unexpected status {0} from provider")]
    UnexpectedStatus(u16),

    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),
}

/// Error returned by a pushkin.
#[derive(Debug, thiserror::Error)]
pub enum PushkinError {
    /// The provider refused the request; reported upstream as a gateway failure.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Anything else, such as a storage failure.
    #[error("internal error: {0}")]
    Internal(color_eyre::eyre::Report),
}

impl From<color_eyre::eyre::Report> for PushkinError {
    fn from(report: color_eyre::eyre::Report) -> Self {
        Self::Internal(report)
    }
}

/// Failure to get a response out of the provider at all.
///
/// Always treated as temporary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(String),
}
