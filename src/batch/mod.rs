//! Bounded-concurrency, cancellable, quota-aware batch resolution.
//!
//! A fixed set of worker futures shares one queue of record indexes and is
//! driven by `join_all` on the caller's task. Results land in index-addressed
//! slots, so output order always matches input order.

mod pause;
mod progress;
mod rate_limit;

use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BatchConfig;
use crate::engine::Engine;
use crate::models::{AddressRecord, ResolutionResult, Sentinel};

pub use pause::PauseGate;
pub use progress::{NoProgress, ProgressSink};
pub use rate_limit::RateLimiter;

use progress::Throttled;

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub concurrency: usize,
    pub request_delay: Duration,
    pub record_timeout: Duration,
    pub quota_pause: Duration,
    /// Quota pauses one record may trigger before it is given up
    pub max_quota_pauses: u32,
    pub progress_interval: Duration,
}

impl BatchSettings {
    /// Higher concurrency and a shorter delay with a paid provider; one worker
    /// and a longer delay when only the free rate-limited provider is available.
    pub fn for_providers(config: &BatchConfig, paid: bool) -> Self {
        let (concurrency, delay_ms) = if paid {
            (config.paid_concurrency, config.paid_request_delay_ms)
        } else {
            (config.free_concurrency, config.free_request_delay_ms)
        };
        Self {
            concurrency: concurrency.max(1),
            request_delay: Duration::from_millis(delay_ms),
            record_timeout: Duration::from_millis(config.record_timeout_ms),
            quota_pause: Duration::from_secs(config.quota_pause_secs),
            max_quota_pauses: config.max_quota_pauses,
            progress_interval: Duration::from_millis(config.progress_interval_ms),
        }
    }
}

/// Results in input order plus run statistics.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub results: Vec<ResolutionResult>,
    pub cancelled: bool,
    /// Records that got a final result (everything not `SIN_PROCESAR`)
    pub processed: usize,
    pub quota_pauses: u32,
}

impl BatchReport {
    pub fn count(&self, sentinel: Sentinel) -> usize {
        self.results
            .iter()
            .filter(|r| r.sentinel_kind() == Some(sentinel))
            .count()
    }

    pub fn resolved(&self) -> usize {
        self.results.iter().filter(|r| r.is_resolved()).count()
    }
}

pub struct BatchProcessor {
    settings: BatchSettings,
}

impl BatchProcessor {
    pub fn new(settings: BatchSettings) -> Self {
        Self { settings }
    }

    pub fn for_engine(config: &BatchConfig, engine: &Engine) -> Self {
        Self::new(BatchSettings::for_providers(config, engine.has_paid_provider()))
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Resolve every record. The report always holds one result per record;
    /// records never attempted because of cancellation get `SIN_PROCESAR`.
    pub async fn run(
        &self,
        engine: &Engine,
        records: &[AddressRecord],
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> BatchReport {
        let total = records.len();
        let workers = self.settings.concurrency.min(total).max(1);
        info!(
            "Resolving {} records with {} workers ({:?} between requests)",
            total, workers, self.settings.request_delay
        );

        let run = Run {
            engine,
            records,
            settings: &self.settings,
            cancel,
            queue: Mutex::new((0..total).collect()),
            slots: Mutex::new(vec![None; total]),
            quota_hits: Mutex::new(vec![0; total]),
            gate: PauseGate::new(),
            limiter: RateLimiter::new(self.settings.request_delay),
            done: AtomicUsize::new(0),
            quota_pauses: AtomicU32::new(0),
            progress: Throttled::new(progress, self.settings.progress_interval),
        };

        join_all((0..workers).map(|id| run.worker(id))).await;

        let processed = run.done.load(Ordering::SeqCst);
        let quota_pauses = run.quota_pauses.load(Ordering::SeqCst);
        let results: Vec<ResolutionResult> = run
            .slots
            .into_inner()
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| ResolutionResult::sentinel(Sentinel::NotProcessed)))
            .collect();

        let cancelled = processed < total && cancel.is_cancelled();
        if cancelled {
            warn!("Batch cancelled after {} of {} records", processed, total);
        } else {
            info!("Batch finished: {} records", total);
        }

        BatchReport {
            results,
            cancelled,
            processed,
            quota_pauses,
        }
    }
}

/// State shared by the workers of one run
struct Run<'a> {
    engine: &'a Engine,
    records: &'a [AddressRecord],
    settings: &'a BatchSettings,
    cancel: &'a CancellationToken,
    queue: Mutex<VecDeque<usize>>,
    slots: Mutex<Vec<Option<ResolutionResult>>>,
    quota_hits: Mutex<Vec<u32>>,
    gate: PauseGate,
    limiter: RateLimiter,
    done: AtomicUsize,
    quota_pauses: AtomicU32,
    progress: Throttled<'a>,
}

impl Run<'_> {
    async fn worker(&self, id: usize) {
        loop {
            if self.cancel.is_cancelled() || !self.gate.wait(self.cancel).await {
                break;
            }
            let Some(index) = self.queue.lock().pop_front() else {
                break;
            };

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.requeue(index);
                    break;
                }
                _ = self.limiter.wait() => {}
            }
            // a pause started while this worker was pacing
            if self.gate.is_paused() {
                self.requeue(index);
                continue;
            }

            let record = &self.records[index];
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.requeue(index);
                    break;
                }
                outcome = timeout(self.settings.record_timeout, self.engine.resolve(record)) => outcome,
            };

            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(err)) if err.is_quota() => {
                    if self.register_quota_hit(index) {
                        self.requeue(index);
                        continue;
                    }
                    warn!(index, "record kept hitting the quota, giving up");
                    ResolutionResult::sentinel(Sentinel::GeocodingError)
                }
                Ok(Err(err)) => {
                    warn!(index, ?err, "record failed");
                    ResolutionResult::sentinel(Sentinel::GeocodingError)
                }
                Err(_) => {
                    warn!(index, "record timed out after {:?}", self.settings.record_timeout);
                    ResolutionResult::sentinel(Sentinel::AddressNotFound)
                }
            };

            debug!(worker = id, index, code = result.code(), "record resolved");
            self.slots.lock()[index] = Some(result);
            let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
            self.progress.report(done, self.records.len());
        }
    }

    fn requeue(&self, index: usize) {
        self.queue.lock().push_front(index);
    }

    /// Count a quota rejection for `index` and pause the pool. Returns false once
    /// the record has used up its pauses.
    fn register_quota_hit(&self, index: usize) -> bool {
        let hits = {
            let mut hits = self.quota_hits.lock();
            hits[index] += 1;
            hits[index]
        };
        if hits > self.settings.max_quota_pauses {
            return false;
        }

        if self.gate.pause(self.settings.quota_pause) {
            self.quota_pauses.fetch_add(1, Ordering::SeqCst);
            warn!(
                index,
                "provider quota exhausted; pausing all workers for {:?}", self.settings.quota_pause
            );
            self.progress.paused(self.settings.quota_pause);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_scale_with_providers() {
        let config = BatchConfig::default();
        let paid = BatchSettings::for_providers(&config, true);
        let free = BatchSettings::for_providers(&config, false);
        assert!(paid.concurrency > free.concurrency);
        assert_eq!(free.concurrency, 1);
        assert!(free.request_delay > paid.request_delay);
        assert_eq!(paid.record_timeout, Duration::from_secs(8));
        assert_eq!(paid.quota_pause, Duration::from_secs(30));
    }

    #[test]
    fn test_report_counts() {
        let report = BatchReport {
            results: vec![
                ResolutionResult::sentinel(Sentinel::AddressNotFound),
                ResolutionResult::sentinel(Sentinel::AddressNotFound),
                ResolutionResult::postal_code("760212", None, None, crate::models::ResolvedBy::Containment),
            ],
            cancelled: false,
            processed: 3,
            quota_pauses: 0,
        };
        assert_eq!(report.count(Sentinel::AddressNotFound), 2);
        assert_eq!(report.count(Sentinel::NotProcessed), 0);
        assert_eq!(report.resolved(), 1);
    }
}
