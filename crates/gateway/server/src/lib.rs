//! Push Gateway Server - configuration and startup wiring.

pub mod config;

use color_eyre::eyre::WrapErr as _;
use pushgate_pushkin::{AppPushkin, DummyPushkin, GcmPushkin, PushkinRegistry};
use pushgate_storage::SqliteStorage;

use crate::config::{AppConfig, Config};

/// Instantiate one pushkin per configured app.
pub fn build_registry(
    config: &Config,
    storage: SqliteStorage,
) -> color_eyre::eyre::Result<PushkinRegistry<AppPushkin<SqliteStorage>>> {
    let mut registry = PushkinRegistry::new();

    for (app_id, app) in &config.apps {
        let pushkin = match app {
            AppConfig::Gcm(gcm) => AppPushkin::Gcm(
                GcmPushkin::new(app_id.as_str(), gcm, storage.clone())
                    .wrap_err_with(|| format!("failed to set up pushkin for {app_id}"))?,
            ),
            AppConfig::Dummy(dummy) => AppPushkin::Dummy(DummyPushkin::new(app_id.as_str(), dummy)),
        };

        tracing::info!(app_id = %app_id, kind = kind(app), "configured pushkin");
        registry = registry.with_pushkin(pushkin);
    }

    Ok(registry)
}

fn kind(app: &AppConfig) -> &'static str {
    match app {
        AppConfig::Gcm(_) => "gcm",
        AppConfig::Dummy(_) => "dummy",
    }
}
