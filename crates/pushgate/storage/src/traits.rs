//! Storage traits.

use std::collections::HashMap;

/// Persistent mapping from a registration ID to the provider's current one.
///
/// Implementations must be safe to share between pushkins and requests.
/// Concurrent writes for the same ID may race; the last write wins.
#[trait_variant::make(Send)]
pub trait CanonicalIdStore: Send + Sync {
    /// Return the canonical ID for `reg_id`, or `reg_id` itself if none is stored.
    async fn resolve(&self, reg_id: &str) -> color_eyre::eyre::Result<String>;

    /// Resolve several IDs at once. The result has one entry per unique input.
    async fn resolve_batch(
        &self,
        reg_ids: &[String],
    ) -> color_eyre::eyre::Result<HashMap<String, String>>;

    /// Record that `reg_id` has been replaced by `canonical_reg_id`.
    async fn record_canonical(
        &self,
        reg_id: &str,
        canonical_reg_id: &str,
    ) -> color_eyre::eyre::Result<()>;
}
