//! Push Gateway Pushkins
//!
//! Provider-specific dispatch engines. Each pushkin turns a notification into
//! outbound provider calls and reports which pushkeys should be rejected.

mod dummy;
mod error;
pub mod gcm;
pub mod metrics;
mod registry;
mod throttle;
mod traits;

pub use dummy::*;
pub use error::*;
pub use gcm::{GcmConfig, GcmPushkin};
pub use registry::*;
pub use throttle::*;
pub use traits::*;

// Re-export for convenience
pub use pushgate_storage;
