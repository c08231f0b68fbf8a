//! Push Gateway Core Types
//!
//! Notification model, request parsing, and per-request context shared by
//! the ingress layer and every pushkin.

mod context;
mod notification;
mod request;
mod truncate;

pub use context::*;
pub use notification::*;
pub use request::*;
pub use truncate::*;
