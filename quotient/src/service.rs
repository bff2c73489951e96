//! QuoteService: transport-agnostic quote lifecycle management.
//!
//! This service owns:
//! - The shared quote collection (ordered, newest first)
//! - Poll loop bookkeeping (one loop per quote id)
//! - The root cancellation token (clearing the collection stops loops)
//!
//! Hosts hold one service per session and drive it from whatever surface
//! they have; all state observation goes through the store.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::analysis::{QuoteStats, analyze};
use crate::client::{ApiError, QuoteApi};
use crate::poller::{PollConfig, QuotePoller};
use crate::protocol::QuoteRecord;
use crate::quote::QuoteAnalysis;
use crate::registry::PollRegistry;
use crate::store::QuoteStore;

pub struct QuoteService {
    api: Arc<dyn QuoteApi>,
    store: Arc<QuoteStore>,
    registry: Arc<PollRegistry>,
    poller: Arc<QuotePoller>,
    cancel: RwLock<CancellationToken>,
    current: RwLock<Option<QuoteAnalysis>>,
}

impl QuoteService {
    pub fn new(api: Arc<dyn QuoteApi>, config: PollConfig) -> Self {
        let store = QuoteStore::new();
        let registry = Arc::new(PollRegistry::new());
        let poller = Arc::new(QuotePoller::new(
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::clone(&registry),
            config,
        ));

        Self {
            api,
            store,
            registry,
            poller,
            cancel: RwLock::new(CancellationToken::new()),
            current: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<QuoteStore> {
        &self.store
    }

    pub fn quotes(&self) -> Vec<QuoteAnalysis> {
        self.store.all()
    }

    /// The most recently fetched full analysis, if any.
    pub fn current_quote(&self) -> Option<QuoteAnalysis> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn error(&self) -> Option<String> {
        self.store.error()
    }

    pub fn watch_revision(&self) -> watch::Receiver<u64> {
        self.store.watch_revision()
    }

    pub fn active_polls(&self) -> usize {
        self.registry.len()
    }

    /// Submit a quote document. On success the new entry goes to the
    /// front of the collection and a poll loop starts for it.
    pub async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        demo_mode: bool,
    ) -> Result<QuoteAnalysis, ApiError> {
        if bytes.is_empty() {
            let message = "no file provided";
            self.store.set_error(message);
            return Err(ApiError::Application(message.to_string()));
        }

        self.store.clear_error();
        match self.api.upload(filename, bytes, demo_mode).await {
            Ok(submitted) => {
                tracing::info!(quote_id = %submitted.id, filename, "quote submitted");
                let quote = QuoteAnalysis::from_submission(submitted);
                self.store.insert_front(quote.clone());
                self.start_polling(&quote.id);
                Ok(quote)
            }
            Err(e) => {
                tracing::error!(filename, error = %e, "quote upload failed");
                self.store.set_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Submit a quote document read from disk.
    pub async fn upload_file(&self, path: &Path, demo_mode: bool) -> Result<QuoteAnalysis, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ApiError::Application(format!("failed to read {}: {e}", path.display()))
        })?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("quote");
        self.upload(filename, bytes, demo_mode).await
    }

    /// Begin polling `id` unless a loop is already active for it.
    /// Either way, returns the currently-known snapshot.
    pub fn start_polling(&self, id: &str) -> Option<QuoteAnalysis> {
        let cancel = self
            .cancel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token();
        self.poller.spawn(id, cancel);
        self.store.get(id)
    }

    /// One manual status query, reconciled into the collection. Errors
    /// are logged and swallowed; callers only see the fresh record.
    pub async fn check_status(&self, id: &str) -> Option<QuoteRecord> {
        match self.api.status(id).await {
            Ok(record) => {
                self.store.apply_snapshot(&record);
                Some(record)
            }
            Err(e) => {
                tracing::error!(quote_id = %id, error = %e, "status check failed");
                None
            }
        }
    }

    /// Fetch the full detail record and normalize it. The result replaces
    /// the collection entry (when present) and becomes the current quote.
    pub async fn fetch_analysis(&self, id: &str) -> Result<QuoteAnalysis, ApiError> {
        self.store.clear_error();
        match self.api.detail(id).await {
            Ok(detail) => {
                let analysis = analyze(detail);
                self.store.replace(analysis.clone());
                *self
                    .current
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Some(analysis.clone());
                Ok(analysis)
            }
            Err(e) => {
                tracing::error!(quote_id = %id, error = %e, "failed to fetch quote analysis");
                self.store.set_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Refresh the collection from the backend listing.
    pub async fn fetch_quotes(&self) -> Result<Vec<QuoteAnalysis>, ApiError> {
        self.store.clear_error();
        match self.api.list().await {
            Ok(records) => {
                let quotes: Vec<QuoteAnalysis> =
                    records.iter().map(QuoteAnalysis::from_record).collect();
                self.store.set_all(quotes.clone());
                Ok(quotes)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch quote listing");
                self.store.set_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Derived stats for the current quote.
    pub fn current_stats(&self) -> Option<QuoteStats> {
        self.current_quote()
            .map(|quote| QuoteStats::for_analysis(&quote))
    }

    /// Empty the collection, cancel every in-flight poll loop, and re-arm
    /// for future submissions.
    pub fn clear(&self) {
        {
            let mut cancel = self.cancel.write().unwrap_or_else(PoisonError::into_inner);
            cancel.cancel();
            *cancel = CancellationToken::new();
        }
        self.store.clear();
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        tracing::debug!("quote collection cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{QuoteDetailRecord, SubmittedQuote};
    use crate::quote::QuoteStatus;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Backend double: uploads always succeed, status is fixed, detail is
    /// a one-item completed record.
    struct FixedApi {
        status: QuoteStatus,
        fail_uploads: AtomicBool,
        status_calls: AtomicUsize,
    }

    impl FixedApi {
        fn new(status: QuoteStatus) -> Arc<Self> {
            Arc::new(Self {
                status,
                fail_uploads: AtomicBool::new(false),
                status_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl QuoteApi for FixedApi {
        async fn upload(
            &self,
            filename: &str,
            _bytes: Vec<u8>,
            _demo_mode: bool,
        ) -> Result<SubmittedQuote, ApiError> {
            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(ApiError::Application("unsupported file type".to_string()));
            }
            Ok(SubmittedQuote {
                id: "q-1".to_string(),
                status: QuoteStatus::Uploading,
                original_filename: Some(filename.to_string()),
                created_at: Some("2024-03-01T10:00:00Z".to_string()),
            })
        }

        async fn status(&self, id: &str) -> Result<QuoteRecord, ApiError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(serde_json::json!({
                "id": id,
                "status": self.status.as_str(),
                "itemCount": 3,
            }))
            .unwrap())
        }

        async fn detail(&self, id: &str) -> Result<QuoteDetailRecord, ApiError> {
            Ok(serde_json::from_value(serde_json::json!({
                "id": id,
                "status": "completed",
                "total": "100.00",
                "createdAt": "2024-03-01T10:00:00Z",
                "updatedAt": "2024-03-01T10:05:00Z",
                "processedAt": "2024-03-01T10:05:00Z",
                "items": [{
                    "id": "i-1",
                    "partNumber": "PN-1",
                    "description": "Bolt",
                    "totalPrice": 100,
                    "matches": [{ "id": "m-1", "priceDifference": -20 }]
                }]
            }))
            .unwrap())
        }

        async fn list(&self) -> Result<Vec<QuoteRecord>, ApiError> {
            Ok(vec![
                serde_json::from_value(serde_json::json!({
                    "id": "q-10",
                    "status": "completed",
                    "total": 120,
                }))
                .unwrap(),
                serde_json::from_value(serde_json::json!({
                    "id": "q-11",
                    "status": "parsing",
                }))
                .unwrap(),
            ])
        }
    }

    fn fast_config() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(5),
            max_attempts: 150,
            backoff_cap: Duration::from_millis(10),
            error_on_timeout: false,
        }
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn upload_prepends_and_starts_polling() {
        let api = FixedApi::new(QuoteStatus::Completed);
        let service = QuoteService::new(api, fast_config());

        let quote = service
            .upload("vendor.pdf", b"%PDF".to_vec(), false)
            .await
            .unwrap();

        assert_eq!(quote.id, "q-1");
        assert_eq!(service.quotes()[0].id, "q-1");

        // The loop runs to completion and swaps in the analysis.
        wait_until(|| service.active_polls() == 0).await;
        let finished = service.store().get("q-1").unwrap();
        assert_eq!(finished.status, QuoteStatus::Completed);
        assert_eq!(finished.items.len(), 1);
    }

    #[tokio::test]
    async fn upload_file_reads_from_disk() {
        let api = FixedApi::new(QuoteStatus::Completed);
        let service = QuoteService::new(api, fast_config());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vendor.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let quote = service.upload_file(&path, false).await.unwrap();
        assert_eq!(quote.original_filename.as_deref(), Some("vendor.pdf"));
        wait_until(|| service.active_polls() == 0).await;
    }

    #[tokio::test]
    async fn upload_file_missing_path_fails_without_a_request() {
        let api = FixedApi::new(QuoteStatus::Completed);
        let service = QuoteService::new(api, fast_config());

        let result = service
            .upload_file(Path::new("/nonexistent/vendor.pdf"), false)
            .await;
        assert!(matches!(result, Err(ApiError::Application(_))));
        assert!(service.quotes().is_empty());
    }

    #[tokio::test]
    async fn upload_with_empty_payload_never_hits_the_backend() {
        let api = FixedApi::new(QuoteStatus::Uploading);
        let service = QuoteService::new(api, fast_config());

        let err = service.upload("empty.pdf", Vec::new(), false).await;
        assert!(matches!(err, Err(ApiError::Application(_))));
        assert_eq!(service.error().as_deref(), Some("no file provided"));
        assert!(service.quotes().is_empty());
    }

    #[tokio::test]
    async fn upload_failure_records_the_backend_message() {
        let api = FixedApi::new(QuoteStatus::Uploading);
        api.fail_uploads.store(true, Ordering::SeqCst);
        let service = QuoteService::new(api, fast_config());

        let err = service.upload("notes.txt", vec![1], false).await;
        assert!(err.is_err());
        assert_eq!(service.error().as_deref(), Some("unsupported file type"));
        assert!(service.quotes().is_empty());
        assert_eq!(service.active_polls(), 0);
    }

    #[tokio::test]
    async fn start_polling_twice_returns_snapshot_without_second_loop() {
        let api = FixedApi::new(QuoteStatus::Parsing);
        let service = QuoteService::new(api, fast_config());

        service
            .upload("vendor.pdf", b"%PDF".to_vec(), false)
            .await
            .unwrap();

        let snapshot = service.start_polling("q-1");
        assert_eq!(snapshot.unwrap().id, "q-1");
        assert_eq!(service.active_polls(), 1);

        service.clear();
        wait_until(|| service.active_polls() == 0).await;
    }

    #[tokio::test]
    async fn check_status_reconciles_into_the_store() {
        let api = FixedApi::new(QuoteStatus::Matching);
        let service = QuoteService::new(Arc::clone(&api) as Arc<dyn QuoteApi>, fast_config());

        service.store().insert_front(QuoteAnalysis::from_submission(
            SubmittedQuote {
                id: "q-1".to_string(),
                status: QuoteStatus::Uploading,
                original_filename: None,
                created_at: None,
            },
        ));

        let record = service.check_status("q-1").await.unwrap();
        assert_eq!(record.status, QuoteStatus::Matching);
        assert_eq!(service.store().get("q-1").unwrap().item_count, Some(3));
    }

    #[tokio::test]
    async fn fetch_analysis_sets_current_and_stats() {
        let api = FixedApi::new(QuoteStatus::Completed);
        let service = QuoteService::new(api, fast_config());

        let analysis = service.fetch_analysis("q-7").await.unwrap();
        assert_eq!(analysis.summary.potential_savings, 20.0);

        let stats = service.current_stats().unwrap();
        assert_eq!(stats.total_items, 1);
        assert_eq!(stats.matched_items, 1);
        assert_eq!(stats.match_rate, 100.0);
    }

    #[tokio::test]
    async fn fetch_quotes_replaces_the_collection() {
        let api = FixedApi::new(QuoteStatus::Completed);
        let service = QuoteService::new(api, fast_config());

        let quotes = service.fetch_quotes().await.unwrap();
        assert_eq!(quotes.len(), 2);

        let ids: Vec<String> = service.quotes().into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec!["q-10", "q-11"]);
        assert_eq!(
            service.store().get("q-10").unwrap().financials.total,
            Some(120.0)
        );
    }

    #[tokio::test]
    async fn clear_cancels_inflight_loops_and_rearms() {
        let api = FixedApi::new(QuoteStatus::Parsing);
        let service = QuoteService::new(Arc::clone(&api) as Arc<dyn QuoteApi>, fast_config());

        service
            .upload("vendor.pdf", b"%PDF".to_vec(), false)
            .await
            .unwrap();
        assert_eq!(service.active_polls(), 1);

        service.clear();
        wait_until(|| service.active_polls() == 0).await;
        assert!(service.quotes().is_empty());

        // A fresh submission after clearing polls again.
        service
            .upload("second.pdf", b"%PDF".to_vec(), false)
            .await
            .unwrap();
        assert_eq!(service.active_polls(), 1);
        service.clear();
        wait_until(|| service.active_polls() == 0).await;
    }
}
