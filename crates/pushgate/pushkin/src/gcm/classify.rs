//! Per-token result classification.

use super::wire::GcmResult;

/// Error codes meaning the registration ID will never work again.
pub const BAD_PUSHKEY_FAILURE_CODES: &[&str] = &[
    "MissingRegistration",
    "InvalidRegistration",
    "NotRegistered",
    "InvalidPackageName",
    "MismatchSenderId",
];

/// Error codes meaning this message will never be delivered, although the
/// registration ID itself is fine.
pub const BAD_MESSAGE_FAILURE_CODES: &[&str] = &["MessageTooBig", "InvalidDataKey", "InvalidTtl"];

/// What to do with one token after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOutcome {
    /// Accepted by the provider.
    Delivered,
    /// Send again on the next attempt.
    Retry,
    /// Token is permanently invalid; report it upstream.
    RejectToken,
    /// Message is undeliverable; drop it but keep the token.
    RejectMessage,
}

impl TokenOutcome {
    pub fn from_result(result: &GcmResult) -> Self {
        match &result.error {
            Some(code) => classify_error(code),
            None => Self::Delivered,
        }
    }
}

/// Classify a provider error code. Unknown codes are retried.
pub fn classify_error(code: &str) -> TokenOutcome {
    if BAD_PUSHKEY_FAILURE_CODES.contains(&code) {
        TokenOutcome::RejectToken
    } else if BAD_MESSAGE_FAILURE_CODES.contains(&code) {
        TokenOutcome::RejectMessage
    } else {
        TokenOutcome::Retry
    }
}
