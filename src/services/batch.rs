//! Batch extraction runner
//!
//! Runs the orchestrator over many meetings in waves of bounded size. Each
//! wave is settled completely before the next starts, and one meeting's
//! failure never affects its neighbours.

use crate::domain::models::{BatchJobResult, BatchMode, ExtractionStatus};
use crate::error::Result;
use crate::ports::storage::StoragePort;
use crate::services::orchestrator::ExtractionService;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_CONCURRENCY: usize = 10;

/// Where a batch item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Pending,
    Retried,
}

pub struct BatchRunner {
    extraction: Arc<ExtractionService>,
    storage: Arc<dyn StoragePort>,
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(extraction: Arc<ExtractionService>, storage: Arc<dyn StoragePort>) -> Self {
        Self {
            extraction,
            storage,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Wave size; zero is treated as one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn select(&self, mode: BatchMode) -> Result<Vec<(i64, Origin)>> {
        let mut items = Vec::new();
        if matches!(mode, BatchMode::AllPending | BatchMode::PendingAndFailed) {
            items.extend(
                self.storage
                    .list_pending_meeting_ids()
                    .await?
                    .into_iter()
                    .map(|id| (id, Origin::Pending)),
            );
        }
        if matches!(mode, BatchMode::PendingAndFailed | BatchMode::OnlyFailed) {
            items.extend(
                self.storage
                    .list_failed_unresolved_meeting_ids()
                    .await?
                    .into_iter()
                    .map(|id| (id, Origin::Retried)),
            );
        }

        // A meeting is processed once per batch, tagged by its first origin
        let mut seen = HashSet::new();
        items.retain(|(id, _)| seen.insert(*id));
        Ok(items)
    }

    /// Extract every meeting selected by `mode`.
    ///
    /// Only the selection query can fail the whole batch; per-meeting errors
    /// are counted as failures.
    pub async fn run_batch(&self, mode: BatchMode) -> Result<BatchJobResult> {
        let items = self.select(mode).await?;
        let mut result = BatchJobResult {
            total: items.len(),
            pending: items.iter().filter(|(_, o)| *o == Origin::Pending).count(),
            retried: items.iter().filter(|(_, o)| *o == Origin::Retried).count(),
            ..Default::default()
        };

        if items.is_empty() {
            log::info!("Batch ({}): nothing to extract", mode);
            return Ok(result);
        }

        let waves = items.len().div_ceil(self.concurrency);
        log::info!(
            "Batch ({}): {} meeting(s), {} pending, {} retried, {} wave(s) of up to {}",
            mode,
            result.total,
            result.pending,
            result.retried,
            waves,
            self.concurrency
        );

        for (index, wave) in items.chunks(self.concurrency).enumerate() {
            let outcomes =
                join_all(wave.iter().map(|(id, _)| self.extraction.run_extraction(*id))).await;

            let mut wave_success = 0;
            for ((id, _), outcome) in wave.iter().zip(outcomes) {
                match outcome {
                    Ok(outcome) if outcome.status == ExtractionStatus::Succeeded => {
                        wave_success += 1;
                    }
                    Ok(_) => {}
                    Err(e) => log::error!("Batch: meeting {} errored: {}", id, e),
                }
            }

            result.success += wave_success;
            result.failed += wave.len() - wave_success;
            log::info!(
                "Batch wave {}/{}: {}/{} succeeded",
                index + 1,
                waves,
                wave_success,
                wave.len()
            );
        }

        log::info!(
            "Batch ({}) complete: {} succeeded, {} failed",
            mode,
            result.success,
            result.failed
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ExtractionFields, ExtractionRecord, Industry};
    use crate::ports::extraction::ExtractionPort;
    use crate::ports::mocks::{ConcurrencyGauge, MockProvider, MockStorage};
    use crate::services::retry::RetryPolicy;
    use std::time::Duration;
    use tokio::time::Instant;

    fn fields() -> ExtractionFields {
        ExtractionFields {
            industry: Some(Industry::Retail),
            ..Default::default()
        }
    }

    fn runner(storage: &MockStorage, provider: MockProvider, concurrency: usize) -> BatchRunner {
        let providers: Vec<Arc<dyn ExtractionPort>> = vec![Arc::new(provider)];
        let extraction = Arc::new(ExtractionService::new(
            Arc::new(storage.clone()),
            providers,
            RetryPolicy::none(),
        ));
        BatchRunner::new(extraction, Arc::new(storage.clone())).with_concurrency(concurrency)
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_in_bounded_waves() {
        let storage = MockStorage::new();
        for i in 0..25 {
            storage.seed(&format!("meeting {}", i)).await;
        }
        let gauge = ConcurrencyGauge::default();
        let provider = MockProvider::succeeding("a", "model-a", fields())
            .with_delay(Duration::from_secs(1))
            .with_gauge(gauge.clone());
        let runner = runner(&storage, provider, 10);

        let started = Instant::now();
        let result = runner.run_batch(BatchMode::AllPending).await.unwrap();

        assert_eq!(result.total, 25);
        assert_eq!(result.success, 25);
        assert_eq!(result.pending, 25);
        assert_eq!(gauge.peak(), 10);
        // Three waves (10, 10, 5), each as long as one call
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(storage.list_pending_meeting_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_the_batch() {
        let storage = MockStorage::new();
        for i in 0..7 {
            let marker = if i % 3 == 0 { "BROKEN" } else { "fine" };
            storage.seed(&format!("{} {}", marker, i)).await;
        }
        let provider = MockProvider::succeeding("a", "model-a", fields()).failing_on("BROKEN");
        let result = runner(&storage, provider, 3)
            .run_batch(BatchMode::AllPending)
            .await
            .unwrap();

        assert_eq!(result.total, 7);
        assert_eq!(result.failed, 3);
        assert_eq!(result.success, 4);
        assert_eq!(result.success + result.failed, result.total);
    }

    #[tokio::test]
    async fn test_mode_selection_and_counts() {
        let storage = MockStorage::new();
        let pending = storage.seed("new meeting").await;
        let failed = storage.seed("old meeting").await;
        storage
            .upsert_extraction(&ExtractionRecord::failed(failed, "quota".to_string()))
            .await
            .unwrap();
        let done = storage.seed("done meeting").await;
        storage
            .upsert_extraction(&ExtractionRecord::succeeded(done, "m".to_string(), fields()))
            .await
            .unwrap();

        let provider = MockProvider::succeeding("a", "model-a", fields());
        let result = runner(&storage, provider, 10)
            .run_batch(BatchMode::PendingAndFailed)
            .await
            .unwrap();

        assert_eq!(result.total, 2);
        assert_eq!(result.pending, 1);
        assert_eq!(result.retried, 1);
        assert_eq!(result.success, 2);
        for id in [pending, failed] {
            assert_eq!(
                storage.get_extraction(id).await.unwrap().unwrap().status,
                ExtractionStatus::Succeeded
            );
        }
    }

    #[tokio::test]
    async fn test_only_failed_skips_pending() {
        let storage = MockStorage::new();
        storage.seed("new meeting").await;
        let failed = storage.seed("old meeting").await;
        storage
            .upsert_extraction(&ExtractionRecord::failed(failed, "timeout".to_string()))
            .await
            .unwrap();

        let provider = MockProvider::succeeding("a", "model-a", fields());
        let result = runner(&storage, provider, 10)
            .run_batch(BatchMode::OnlyFailed)
            .await
            .unwrap();

        assert_eq!(result.total, 1);
        assert_eq!(result.retried, 1);
        assert_eq!(result.pending, 0);
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let storage = MockStorage::new();
        let provider = MockProvider::succeeding("a", "model-a", fields());
        let result = runner(&storage, provider, 10)
            .run_batch(BatchMode::AllPending)
            .await
            .unwrap();
        assert_eq!(result, BatchJobResult::default());
    }

    #[test]
    fn test_zero_concurrency_is_one() {
        let storage = MockStorage::new();
        let provider = MockProvider::succeeding("a", "model-a", fields());
        assert_eq!(runner(&storage, provider, 0).concurrency, 1);
    }
}
