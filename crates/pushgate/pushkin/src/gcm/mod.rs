//! GCM/FCM pushkin.
//!
//! Sends one batched request per notification to every device registered
//! under the app ID, retrying temporary failures with exponential backoff.

mod classify;
mod transport;
mod wire;

pub use classify::*;
pub use transport::*;
pub use wire::*;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use pushgate_core::{Device, Notification, NotificationContext};
use pushgate_storage::CanonicalIdStore;
use tokio::time::Instant;
use tracing::Instrument as _;

use crate::{DispatchError, OutboundThrottle, Pushkin, PushkinError};

/// Pushkin configuration for one GCM app.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GcmConfig {
    pub api_key: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Maximum concurrent outbound requests.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_retry_delay_base_secs")]
    pub retry_delay_base_secs: u64,

    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
}

fn default_endpoint() -> String {
    GCM_URL.to_string()
}

fn default_max_connections() -> usize {
    crate::DEFAULT_MAX_CONNECTIONS
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_retry_delay_base_secs() -> u64 {
    10
}

fn default_max_tries() -> u32 {
    3
}

impl GcmConfig {
    /// Configuration with defaults for everything but the API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: default_endpoint(),
            max_connections: default_max_connections(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_delay_base_secs: default_retry_delay_base_secs(),
            max_tries: default_max_tries(),
        }
    }
}

/// Pushkin relaying notifications to Firebase Cloud Messaging.
pub struct GcmPushkin<S, T = ReqwestTransport> {
    name: String,
    store: S,
    transport: T,
    throttle: OutboundThrottle,
    retry_delay_base: Duration,
    max_tries: u32,
}

impl<S: CanonicalIdStore> GcmPushkin<S> {
    /// Create a pushkin talking to the configured endpoint over HTTP.
    pub fn new(
        name: impl Into<String>,
        config: &GcmConfig,
        store: S,
    ) -> color_eyre::eyre::Result<Self> {
        if config.api_key.is_empty() {
            color_eyre::eyre::bail!("no API key set in config");
        }

        let transport = ReqwestTransport::new(
            &config.endpoint,
            &config.api_key,
            Duration::from_secs(config.request_timeout_secs),
            config.max_connections,
        )?;

        Ok(Self::with_transport(name, config, store, transport))
    }
}

/// How a single attempt ended when it did not fail outright.
struct AttemptOutcome {
    /// Canonical tokens to report as rejected.
    rejected: Vec<String>,
    /// Canonical tokens to send again.
    retry: Vec<String>,
}

enum AttemptError {
    /// Whole batch failed but may succeed later.
    Temporary {
        reason: String,
        retry_after: Option<Duration>,
    },
    Failed(PushkinError),
}

impl From<DispatchError> for AttemptError {
    fn from(e: DispatchError) -> Self {
        Self::Failed(e.into())
    }
}

impl From<color_eyre::eyre::Report> for AttemptError {
    fn from(e: color_eyre::eyre::Report) -> Self {
        Self::Failed(e.into())
    }
}

impl<S, T> GcmPushkin<S, T>
where
    S: CanonicalIdStore,
    T: GcmTransport,
{
    /// Create a pushkin with a custom transport.
    pub fn with_transport(
        name: impl Into<String>,
        config: &GcmConfig,
        store: S,
        transport: T,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            transport,
            throttle: OutboundThrottle::new(config.max_connections),
            retry_delay_base: Duration::from_secs(config.retry_delay_base_secs),
            max_tries: config.max_tries.max(1),
        }
    }

    pub fn throttle(&self) -> &OutboundThrottle {
        &self.throttle
    }

    /// Backoff before retrying after attempt `attempt` (zero-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_delay_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    async fn dispatch_batch(
        &self,
        n: &Notification,
        pushkeys: Vec<String>,
    ) -> Result<Vec<String>, PushkinError> {
        let mappings = self.store.resolve_batch(&pushkeys).await?;

        let remapped = mappings.iter().filter(|(k, v)| k != v).count();
        tracing::Span::current().record("num_remapped", remapped);

        // Several pushkeys may share one canonical ID; each is sent once and
        // every original is reported if it is rejected.
        let mut inverse: HashMap<String, Vec<String>> = HashMap::new();
        let mut pending: Vec<String> = Vec::with_capacity(pushkeys.len());
        for pushkey in &pushkeys {
            let canonical = mappings.get(pushkey).unwrap_or(pushkey);
            let originals = inverse.entry(canonical.clone()).or_default();
            if originals.is_empty() {
                pending.push(canonical.clone());
            }
            originals.push(pushkey.clone());
        }

        let data = build_data(n);
        let priority = GcmPriority::for_notification(n);
        let mut rejected = Vec::new();

        for attempt in 0..self.max_tries {
            let request = GcmRequest::new(data.clone(), priority, &pending);
            tracing::info!(attempt, num_tokens = pending.len(), "sending");

            let span = tracing::info_span!(
                "gcm_dispatch_try",
                retry_num = attempt,
                http_status = tracing::field::Empty,
            );

            match self.attempt(&request, &pending, &inverse).instrument(span).await {
                Ok(outcome) => {
                    for canonical in outcome.rejected {
                        rejected.extend(originals(&inverse, &canonical).iter().cloned());
                    }
                    pending = outcome.retry;
                    if pending.is_empty() {
                        break;
                    }
                }
                Err(AttemptError::Temporary {
                    reason,
                    retry_after,
                }) => {
                    if attempt + 1 >= self.max_tries {
                        tracing::warn!(reason = %reason, "temporary failure on final attempt");
                        break;
                    }

                    let delay = retry_after.unwrap_or_else(|| self.retry_delay(attempt));
                    tracing::warn!(
                        reason = %reason,
                        retry_in_secs = delay.as_secs_f64(),
                        "temporary failure, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(AttemptError::Failed(e)) => {
                    tracing::error!(error = %e, "dispatch failed");
                    return Err(e);
                }
            }
        }

        if !pending.is_empty() {
            tracing::info!(num_tokens = pending.len(), "gave up retrying reg IDs");
            tracing::debug!(reg_ids = ?pending, "gave up");
        }

        tracing::Span::current().record("num_failed", rejected.len());
        Ok(rejected)
    }

    /// Send one request and classify every token in the reply.
    async fn attempt(
        &self,
        request: &GcmRequest,
        tokens: &[String],
        inverse: &HashMap<String, Vec<String>>,
    ) -> Result<AttemptOutcome, AttemptError> {
        let started = Instant::now();
        let sent = self.throttle.run(self.transport.send(request)).await?;

        let status = sent.as_ref().ok().map(|response| response.status);
        crate::metrics::record_gcm_request(&self.name, status, started.elapsed());

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                return Err(AttemptError::Temporary {
                    reason: e.to_string(),
                    retry_after: None,
                });
            }
        };

        tracing::Span::current().record("http_status", response.status);

        match response.status {
            200..=299 => {}
            500..=599 => {
                return Err(AttemptError::Temporary {
                    reason: format!("{} from server", response.status),
                    retry_after: response.retry_after,
                });
            }
            400 => {
                tracing::error!(
                    body = %response.body,
                    "400 from server, we sent something invalid"
                );
                return Err(DispatchError::BadRequest(response.body).into());
            }
            401 => {
                tracing::error!(body = %response.body, "401 from server, is the API key valid?");
                return Err(DispatchError::Unauthorized(response.body).into());
            }
            status => return Err(DispatchError::UnexpectedStatus(status).into()),
        }

        let parsed: GcmResponse = serde_json::from_str(&response.body)
            .map_err(|e| DispatchError::InvalidResponse(e.to_string()))?;

        if parsed.results.len() != tokens.len() {
            tracing::warn!(
                num_sent = tokens.len(),
                num_results = parsed.results.len(),
                "result count does not match tokens sent"
            );
        }

        let mut outcome = AttemptOutcome {
            rejected: Vec::new(),
            retry: Vec::new(),
        };

        for (i, token) in tokens.iter().enumerate() {
            // Missing results are treated as temporary.
            let Some(result) = parsed.results.get(i) else {
                outcome.retry.push(token.clone());
                continue;
            };

            if let Some(replacement) = &result.registration_id {
                for original in originals(inverse, token) {
                    self.store.record_canonical(original, replacement).await?;
                }
            }

            match TokenOutcome::from_result(result) {
                TokenOutcome::Delivered => {}
                TokenOutcome::Retry => {
                    tracing::info!(code = ?result.error, "reg ID temporarily failed");
                    outcome.retry.push(token.clone());
                }
                TokenOutcome::RejectToken => {
                    tracing::info!(
                        code = ?result.error,
                        "reg ID permanently failed, rejecting upstream"
                    );
                    outcome.rejected.push(token.clone());
                }
                TokenOutcome::RejectMessage => {
                    tracing::info!(code = ?result.error, "message permanently failed for reg ID");
                }
            }
        }

        Ok(outcome)
    }
}

/// Pushkeys the homeserver sent that resolved to `canonical`.
fn originals<'a>(
    inverse: &'a HashMap<String, Vec<String>>,
    canonical: &'a String,
) -> &'a [String] {
    inverse
        .get(canonical)
        .map(Vec::as_slice)
        .unwrap_or(std::slice::from_ref(canonical))
}

impl<S, T> Pushkin for GcmPushkin<S, T>
where
    S: CanonicalIdStore,
    T: GcmTransport,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn dispatch_notification(
        &self,
        n: &Notification,
        device: &Device,
        context: &NotificationContext,
    ) -> Result<Vec<String>, PushkinError> {
        // Invoked once per matching device; only the first one sends, to all of them.
        match n.devices_for(&self.name).next() {
            Some(first) if first.pushkey == device.pushkey => {}
            _ => return Ok(Vec::new()),
        }

        let mut seen = HashSet::new();
        let pushkeys: Vec<String> = n
            .devices_for(&self.name)
            .filter(|d| seen.insert(d.pushkey.as_str()))
            .map(|d| d.pushkey.clone())
            .collect();

        let span = tracing::info_span!(
            parent: &context.span,
            "gcm_dispatch",
            app_id = %self.name,
            request_id = %context.request_id,
            num_devices = pushkeys.len(),
            num_remapped = tracing::field::Empty,
            num_failed = tracing::field::Empty,
        );

        self.dispatch_batch(n, pushkeys).instrument(span).await
    }
}
