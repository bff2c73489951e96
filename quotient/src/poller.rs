//! Poll scheduler for submitted quotes.
//!
//! One tokio task per quote drives repeated status queries at a fixed
//! cadence until the backend reports a terminal status, the attempt
//! budget runs out, or the loop is cancelled. Failed queries back off and
//! retry the same tick; only successful non-terminal ticks consume the
//! attempt budget. The registry guarantees a single loop per id.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::analysis::analyze;
use crate::client::QuoteApi;
use crate::quote::QuoteStatus;
use crate::registry::PollRegistry;
use crate::store::QuoteStore;

#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Base interval between successful ticks.
    pub interval: Duration,
    /// Successful non-terminal ticks allowed before giving up.
    /// 150 ticks at the 2-second default is about five minutes.
    pub max_attempts: u32,
    /// Ceiling for the error backoff (double the base interval otherwise).
    pub backoff_cap: Duration,
    /// Surface the attempt-budget timeout as the subsystem error instead
    /// of stopping silently.
    pub error_on_timeout: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(
                std::env::var("QUOTIENT_POLL_INTERVAL")
                    .ok()
                    .and_then(|s| s.parse::<f64>().ok())
                    .map(|s| (s * 1000.0) as u64)
                    .unwrap_or(2000),
            ),
            max_attempts: std::env::var("QUOTIENT_POLL_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(150),
            backoff_cap: Duration::from_secs(30),
            error_on_timeout: false,
        }
    }
}

impl PollConfig {
    pub fn backoff(&self) -> Duration {
        (self.interval * 2).min(self.backoff_cap)
    }
}

pub(crate) struct QuotePoller {
    api: Arc<dyn QuoteApi>,
    store: Arc<QuoteStore>,
    registry: Arc<PollRegistry>,
    config: PollConfig,
}

impl QuotePoller {
    pub(crate) fn new(
        api: Arc<dyn QuoteApi>,
        store: Arc<QuoteStore>,
        registry: Arc<PollRegistry>,
        config: PollConfig,
    ) -> Self {
        Self {
            api,
            store,
            registry,
            config,
        }
    }

    /// Spawn the poll loop for `id` unless one is already registered.
    /// Returns whether a new loop was started.
    pub(crate) fn spawn(self: &Arc<Self>, id: &str, cancel: CancellationToken) -> bool {
        if !self.registry.register(id) {
            tracing::debug!(quote_id = %id, "poll loop already active, skipping");
            return false;
        }

        let poller = Arc::clone(self);
        let id = id.to_string();
        tokio::spawn(async move {
            poller.run(&id, cancel).await;
            poller.registry.unregister(&id);
        });
        true
    }

    async fn run(&self, id: &str, cancel: CancellationToken) {
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                tracing::debug!(quote_id = %id, "poll loop cancelled");
                return;
            }

            let record = match self.api.status(id).await {
                Ok(record) => record,
                Err(e) => {
                    // Transient: retry the same tick after the backoff
                    // without touching the attempt budget.
                    tracing::warn!(quote_id = %id, error = %e, "status query failed, backing off");
                    if self.wait(self.config.backoff(), &cancel).await {
                        return;
                    }
                    continue;
                }
            };

            tracing::debug!(quote_id = %id, status = record.status.as_str(), "poll tick");
            self.store.apply_snapshot(&record);

            match record.status {
                QuoteStatus::Completed => {
                    self.load_analysis(id).await;
                    return;
                }
                QuoteStatus::Error => {
                    let message = record
                        .parsing_error
                        .unwrap_or_else(|| "quote processing failed".to_string());
                    tracing::error!(quote_id = %id, error = %message, "quote processing failed");
                    self.store.set_error(message);
                    return;
                }
                QuoteStatus::Uploading | QuoteStatus::Parsing | QuoteStatus::Matching => {
                    attempts += 1;
                    if attempts >= self.config.max_attempts {
                        tracing::warn!(
                            quote_id = %id,
                            attempts,
                            "attempt budget exhausted, quote may still be processing"
                        );
                        if self.config.error_on_timeout {
                            self.store
                                .set_error(format!("timed out waiting for quote {id}"));
                        }
                        return;
                    }
                    if self.wait(self.config.interval, &cancel).await {
                        return;
                    }
                }
            }
        }
    }

    /// Fetch the detail record and swap in the normalized analysis.
    /// On failure the entry keeps its last reconciled snapshot.
    async fn load_analysis(&self, id: &str) {
        match self.api.detail(id).await {
            Ok(detail) => {
                self.store.replace(analyze(detail));
                tracing::info!(quote_id = %id, "quote analysis complete");
            }
            Err(e) => {
                tracing::error!(quote_id = %id, error = %e, "failed to load completed quote");
            }
        }
    }

    /// Returns true if cancelled while waiting.
    async fn wait(&self, period: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(period) => false,
        }
    }
}
