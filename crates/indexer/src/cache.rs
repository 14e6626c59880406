//! Cached primary job listing.
//!
//! The visible set lives behind an `Arc<BTreeMap>` that is replaced, never
//! mutated, at the end of every scanned window. Readers clone the `Arc` and
//! see a consistent set that only ever grows during one fetch.

use std::collections::BTreeMap;
use std::pin::pin;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use contract_client::{EscrowChain, EscrowEvent, EventFilter};
use escrow_core::enums::JobStatus;
use escrow_core::ids::JobId;
use escrow_core::job::Job;
use futures::StreamExt;
use serde::Serialize;

use crate::clock::Clock;
use crate::config::IndexerConfig;
use crate::error::{PartialScanError, ReadError};
use crate::reconstruct::{entity_ids, Reconstructor};
use crate::scanner::{lookback_start, LogScanner, Progress, Window};

/// Whether the listing reflects a finished scan. Lets callers tell "no jobs"
/// apart from "scan failed" or "still loading".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanStatus {
    Idle,
    Loading,
    Complete,
    Failed,
}

#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub jobs: Arc<BTreeMap<JobId, Job>>,
    pub status: ScanStatus,
    pub progress: String,
    /// Last block known to be fully scanned.
    pub watermark: Option<u64>,
}

impl JobSnapshot {
    /// Jobs ordered newest id first.
    pub fn newest_first(&self) -> Vec<Job> {
        self.jobs.values().rev().cloned().collect()
    }
}

#[derive(Debug)]
pub enum FetchOutcome {
    /// Cache was fresh; nothing was read from the chain.
    CacheHit,
    Refreshed {
        jobs: Arc<BTreeMap<JobId, Job>>,
        partial: PartialScanError,
    },
    /// An unforced fetch found another one running and left it alone.
    InFlight,
    /// A newer fetch started while this one ran; its results were discarded.
    Superseded,
}

struct State {
    jobs: Arc<BTreeMap<JobId, Job>>,
    status: ScanStatus,
    watermark: Option<u64>,
    last_fetch: Option<Instant>,
    generation: u64,
}

pub struct JobCache<C> {
    chain: Arc<C>,
    scanner: LogScanner<C>,
    reconstructor: Reconstructor<C>,
    config: IndexerConfig,
    clock: Arc<dyn Clock>,
    progress: Progress,
    state: RwLock<State>,
}

impl<C> JobCache<C> {
    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks its generation failed if dropped while still loading, so a
/// cancelled fetch does not leave the cache stuck in `Loading`.
struct Attempt<'a, C> {
    cache: &'a JobCache<C>,
    generation: u64,
}

impl<C> Drop for Attempt<'_, C> {
    fn drop(&mut self) {
        let mut state = self.cache.write();
        if state.generation == self.generation && state.status == ScanStatus::Loading {
            state.status = ScanStatus::Failed;
            drop(state);
            self.cache.progress.clear();
        }
    }
}

impl<C: EscrowChain> JobCache<C> {
    pub fn new(
        chain: Arc<C>,
        config: IndexerConfig,
        clock: Arc<dyn Clock>,
        progress: Progress,
    ) -> Self {
        Self {
            scanner: LogScanner::new(Arc::clone(&chain), config.window_size, progress.clone()),
            reconstructor: Reconstructor::new(Arc::clone(&chain), config.reconstruct_concurrency),
            chain,
            config,
            clock,
            progress,
            state: RwLock::new(State {
                jobs: Arc::new(BTreeMap::new()),
                status: ScanStatus::Idle,
                watermark: None,
                last_fetch: None,
                generation: 0,
            }),
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.read();
        JobSnapshot {
            jobs: Arc::clone(&state.jobs),
            status: state.status,
            progress: self.progress.current(),
            watermark: state.watermark,
        }
    }

    /// True unless the set is non-empty and younger than the TTL.
    pub fn needs_refresh(&self) -> bool {
        let state = self.read();
        let fresh = state.last_fetch.is_some_and(|at| {
            self.clock.now().saturating_duration_since(at) < self.config.cache_ttl
        });
        !fresh || state.jobs.is_empty()
    }

    /// Overwrite a cached job's status ahead of the next scan. The next point
    /// read of that job replaces it. Returns false if the job is not cached
    /// or is already completed or cancelled.
    pub fn apply_optimistic_status(&self, job_id: JobId, status: JobStatus) -> bool {
        let mut state = self.write();
        match state.jobs.get(&job_id) {
            Some(job) if !job.status.is_final() => {}
            _ => return false,
        }

        let mut next = (*state.jobs).clone();
        if let Some(job) = next.get_mut(&job_id) {
            job.status = status;
        }
        state.jobs = Arc::new(next);
        true
    }

    /// Refresh the listing unless it is fresh and `force` is false.
    ///
    /// An unforced fetch never interrupts one already running. A forced
    /// fetch supersedes it, and the older one's results are discarded.
    ///
    /// The first fetch scans a bounded lookback; later ones resume a few
    /// blocks under the watermark and re-read every job already cached so
    /// status changes without a new event are picked up. Only a failing
    /// head query is an error; failed windows and reads are logged and
    /// reported in `partial`.
    pub async fn fetch(&self, force: bool) -> Result<FetchOutcome, ReadError> {
        if !force && !self.needs_refresh() {
            tracing::debug!("job cache fresh, skipping fetch");
            return Ok(FetchOutcome::CacheHit);
        }

        let Some(generation) = self.begin(force) else {
            tracing::debug!("job fetch already running, skipping");
            return Ok(FetchOutcome::InFlight);
        };
        let _attempt = Attempt {
            cache: self,
            generation,
        };

        let head = match self.chain.block_number().await {
            Ok(head) => head,
            Err(e) => {
                let mut state = self.write();
                if state.generation == generation {
                    state.status = ScanStatus::Failed;
                    self.progress.clear();
                }
                tracing::warn!(error = %e, "job fetch failed at head query");
                return Err(e.into());
            }
        };

        let (from, known) = {
            let state = self.read();
            match state.watermark {
                Some(watermark) => (
                    watermark.saturating_sub(self.config.reorg_overlap),
                    state.jobs.keys().map(|id| id.0).collect::<Vec<_>>(),
                ),
                None => (lookback_start(head, self.config.listing_lookback), Vec::new()),
            }
        };

        tracing::info!(from, head, known = known.len(), generation, "fetching jobs");

        let mut partial = PartialScanError::default();

        if !known.is_empty() {
            let hydrated = self.reconstructor.jobs(known).await;
            partial.dropped_ids.extend(hydrated.dropped);
            self.commit(generation, hydrated.entities);
        }

        let filter = EventFilter::new(EscrowEvent::JobCreated);
        let mut first_failed: Option<Window> = None;
        let mut batches = pin!(self.scanner.windows(&filter, from, head));

        while let Some(batch) = batches.next().await {
            if batch.failed {
                first_failed.get_or_insert(batch.window);
                partial.failed_windows.push(batch.window);
                continue;
            }

            let (ids, oversized) = entity_ids(&batch.logs);
            partial.dropped_ids.extend(oversized);
            let hydrated = self.reconstructor.jobs(ids).await;
            partial.dropped_ids.extend(hydrated.dropped);
            self.commit(generation, hydrated.entities);
        }

        let watermark = match first_failed {
            Some(window) => window.from.checked_sub(1),
            None => Some(head),
        };

        let jobs = {
            let mut state = self.write();
            if state.generation != generation {
                tracing::debug!(generation, "fetch superseded, discarding");
                return Ok(FetchOutcome::Superseded);
            }
            state.watermark = watermark;
            state.last_fetch = Some(self.clock.now());
            state.status = ScanStatus::Complete;
            Arc::clone(&state.jobs)
        };
        self.progress.clear();

        partial.log("fetch_jobs");
        tracing::info!(jobs = jobs.len(), ?watermark, "job fetch complete");

        Ok(FetchOutcome::Refreshed { jobs, partial })
    }

    /// Claim a new generation. `None` if unforced and one is already loading.
    fn begin(&self, force: bool) -> Option<u64> {
        let mut state = self.write();
        if !force && state.status == ScanStatus::Loading {
            return None;
        }
        state.generation += 1;
        state.status = ScanStatus::Loading;
        Some(state.generation)
    }

    /// Merge `entities` into the visible set if `generation` is still current.
    fn commit(&self, generation: u64, entities: BTreeMap<JobId, Job>) -> bool {
        let mut state = self.write();
        if state.generation != generation {
            return false;
        }
        if entities.is_empty() {
            return true;
        }

        let mut next = (*state.jobs).clone();
        next.extend(entities);
        state.jobs = Arc::new(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use alloy::primitives::{Address, U256};
    use contract_client::mock::{job_record, MockChain};

    use super::*;
    use crate::clock::ManualClock;

    fn poster() -> Address {
        Address::repeat_byte(0x01)
    }

    fn cache_over(chain: &Arc<MockChain>, clock: &ManualClock) -> JobCache<MockChain> {
        JobCache::new(
            Arc::clone(chain),
            IndexerConfig::default(),
            Arc::new(clock.clone()),
            Progress::default(),
        )
    }

    fn chain_with_jobs(head: u64, jobs: &[(u64, u64)]) -> Arc<MockChain> {
        let chain = Arc::new(MockChain::new().with_head(head));
        for (id, block) in jobs {
            chain.add_job(*id, job_record(poster(), "job", U256::from(1u64)), *block);
        }
        chain
    }

    #[tokio::test]
    async fn second_fetch_within_ttl_is_free() {
        let chain = chain_with_jobs(1_000, &[(1, 10), (2, 20)]);
        let clock = ManualClock::new();
        let cache = cache_over(&chain, &clock);

        cache.fetch(false).await.unwrap();
        let calls = chain.network_calls();
        clock.advance(Duration::from_secs(60));

        let outcome = cache.fetch(false).await.unwrap();

        assert!(matches!(outcome, FetchOutcome::CacheHit));
        assert_eq!(chain.network_calls(), calls);
        assert_eq!(cache.snapshot().jobs.len(), 2);
    }

    #[tokio::test]
    async fn force_and_expiry_both_rescan() {
        let chain = chain_with_jobs(1_000, &[(1, 10)]);
        let clock = ManualClock::new();
        let cache = cache_over(&chain, &clock);

        cache.fetch(false).await.unwrap();
        let calls = chain.network_calls();
        assert!(matches!(
            cache.fetch(true).await.unwrap(),
            FetchOutcome::Refreshed { .. }
        ));
        assert!(chain.network_calls() > calls);

        let calls = chain.network_calls();
        clock.advance(Duration::from_secs(301));
        assert!(cache.needs_refresh());
        cache.fetch(false).await.unwrap();
        assert!(chain.network_calls() > calls);
    }

    #[tokio::test]
    async fn empty_listing_is_never_considered_fresh() {
        let chain = chain_with_jobs(1_000, &[]);
        let clock = ManualClock::new();
        let cache = cache_over(&chain, &clock);

        cache.fetch(false).await.unwrap();
        assert!(cache.needs_refresh());
        assert_eq!(cache.snapshot().status, ScanStatus::Complete);
    }

    #[tokio::test]
    async fn status_change_without_event_is_picked_up() {
        let chain = chain_with_jobs(1_000, &[(3, 50)]);
        let clock = ManualClock::new();
        let cache = cache_over(&chain, &clock);

        cache.fetch(false).await.unwrap();
        assert_eq!(cache.snapshot().jobs[&JobId(3)].status, JobStatus::Open);

        chain.set_job_status(3, JobStatus::Completed as u8);
        chain.set_head(1_200);
        cache.fetch(true).await.unwrap();

        assert_eq!(cache.snapshot().jobs[&JobId(3)].status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn incremental_fetch_resumes_under_watermark() {
        let chain = chain_with_jobs(1_000, &[(1, 10)]);
        let clock = ManualClock::new();
        let cache = cache_over(&chain, &clock);

        cache.fetch(false).await.unwrap();
        assert_eq!(cache.snapshot().watermark, Some(1_000));

        chain.set_head(1_100);
        chain.add_job(2, job_record(poster(), "late", U256::from(1u64)), 1_050);
        cache.fetch(true).await.unwrap();

        assert_eq!(chain.log_queries().last(), Some(&(990, 1_100)));
        assert_eq!(cache.snapshot().jobs.len(), 2);
        assert_eq!(cache.snapshot().watermark, Some(1_100));
    }

    #[tokio::test]
    async fn visible_set_grows_window_by_window() {
        let chain = chain_with_jobs(1_199, &[(1, 10), (2, 500), (3, 900)]);
        let clock = ManualClock::new();
        let cache = Arc::new(cache_over(&chain, &clock));

        let sizes = Arc::new(Mutex::new(Vec::new()));
        let observed = Arc::clone(&sizes);
        let weak = Arc::downgrade(&cache);
        chain.on_logs(move |_, _| {
            if let Some(cache) = weak.upgrade() {
                observed.lock().unwrap().push(cache.snapshot().jobs.len());
            }
        });

        cache.fetch(false).await.unwrap();

        assert_eq!(*sizes.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(cache.snapshot().jobs.len(), 3);
    }

    #[tokio::test]
    async fn failed_head_keeps_previous_set() {
        let chain = chain_with_jobs(1_000, &[(1, 10)]);
        let clock = ManualClock::new();
        let cache = cache_over(&chain, &clock);
        cache.fetch(false).await.unwrap();

        chain.fail_head();
        let err = cache.fetch(true).await.unwrap_err();

        assert!(err.to_string().contains("connection refused"));
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.jobs.len(), 1);
        assert_eq!(snapshot.status, ScanStatus::Failed);
        assert_eq!(snapshot.progress, "");
    }

    #[tokio::test]
    async fn failed_window_holds_watermark_below_it() {
        let chain = chain_with_jobs(1_199, &[(1, 10), (2, 500)]);
        chain.fail_logs_at(500);
        let clock = ManualClock::new();
        let cache = cache_over(&chain, &clock);

        let outcome = cache.fetch(false).await.unwrap();

        let FetchOutcome::Refreshed { jobs, partial } = outcome else {
            panic!("expected a refresh");
        };
        assert_eq!(jobs.len(), 1);
        assert_eq!(partial.failed_windows, vec![Window { from: 400, to: 799 }]);
        assert_eq!(cache.snapshot().watermark, Some(399));

        cache.fetch(true).await.unwrap();
        assert_eq!(chain.log_queries()[3], (389, 788));
    }

    #[test]
    fn superseded_generation_cannot_commit() {
        let chain = Arc::new(MockChain::new());
        let cache = cache_over(&chain, &ManualClock::new());
        let job = Job {
            id: JobId(1),
            poster: poster(),
            title: "stale".to_string(),
            description: String::new(),
            reward: U256::ZERO,
            deadline: 0,
            status: JobStatus::Open,
            assigned_freelancer: Address::ZERO,
        };

        let stale = cache.begin(false).unwrap();
        assert_eq!(cache.begin(false), None);
        let current = cache.begin(true).unwrap();

        assert!(!cache.commit(stale, BTreeMap::from([(job.id, job.clone())])));
        assert!(cache.snapshot().jobs.is_empty());
        assert!(cache.commit(current, BTreeMap::from([(job.id, job)])));
        assert_eq!(cache.snapshot().jobs.len(), 1);
    }

    #[tokio::test]
    async fn optimistic_status_is_overwritten_by_next_read() {
        let chain = chain_with_jobs(1_000, &[(5, 10)]);
        let cache = cache_over(&chain, &ManualClock::new());
        cache.fetch(false).await.unwrap();

        assert!(cache.apply_optimistic_status(JobId(5), JobStatus::Cancelled));
        assert!(!cache.apply_optimistic_status(JobId(6), JobStatus::Cancelled));
        assert_eq!(cache.snapshot().jobs[&JobId(5)].status, JobStatus::Cancelled);

        assert!(!cache.apply_optimistic_status(JobId(5), JobStatus::Open));
        assert_eq!(cache.snapshot().jobs[&JobId(5)].status, JobStatus::Cancelled);

        cache.fetch(true).await.unwrap();
        assert_eq!(cache.snapshot().jobs[&JobId(5)].status, JobStatus::Open);
    }

    #[tokio::test]
    async fn final_job_ignores_status_hint() {
        let chain = chain_with_jobs(1_000, &[(4, 10)]);
        chain.set_job_status(4, JobStatus::Completed as u8);
        let cache = cache_over(&chain, &ManualClock::new());
        cache.fetch(false).await.unwrap();

        assert!(!cache.apply_optimistic_status(JobId(4), JobStatus::Cancelled));
        assert_eq!(cache.snapshot().jobs[&JobId(4)].status, JobStatus::Completed);
    }

    async fn wait_for_loading(cache: &JobCache<MockChain>) {
        while cache.snapshot().status != ScanStatus::Loading {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn unforced_fetch_leaves_running_scan_alone() {
        let chain = chain_with_jobs(1_000, &[(1, 10)]);
        let gate = chain.gate_logs();
        let cache = Arc::new(cache_over(&chain, &ManualClock::new()));

        let running = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.fetch(false).await }
        });
        wait_for_loading(&cache).await;

        let calls = chain.network_calls();
        assert!(matches!(
            cache.fetch(false).await.unwrap(),
            FetchOutcome::InFlight
        ));
        assert_eq!(chain.network_calls(), calls);

        gate.add_permits(16);
        let outcome = running.await.unwrap().unwrap();

        assert!(matches!(outcome, FetchOutcome::Refreshed { .. }));
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.status, ScanStatus::Complete);
        assert_eq!(snapshot.watermark, Some(1_000));
        assert_eq!(snapshot.jobs.len(), 1);
    }

    #[tokio::test]
    async fn forced_fetch_supersedes_running_scan() {
        let chain = chain_with_jobs(1_000, &[(1, 10)]);
        let gate = chain.gate_logs();
        let cache = Arc::new(cache_over(&chain, &ManualClock::new()));

        let running = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.fetch(false).await }
        });
        wait_for_loading(&cache).await;

        gate.add_permits(64);
        let forced = cache.fetch(true).await.unwrap();
        let stale = running.await.unwrap().unwrap();

        assert!(matches!(forced, FetchOutcome::Refreshed { .. }));
        assert!(matches!(stale, FetchOutcome::Superseded));
        assert_eq!(cache.snapshot().status, ScanStatus::Complete);
    }

    #[tokio::test]
    async fn stale_head_failure_keeps_current_progress() {
        let chain = chain_with_jobs(1_000, &[(1, 10)]);
        let head_gate = chain.gate_head();
        let cache = Arc::new(cache_over(&chain, &ManualClock::new()));

        let stale = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.fetch(false).await }
        });
        wait_for_loading(&cache).await;
        let current = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.fetch(true).await }
        });
        while cache.read().generation < 2 {
            tokio::task::yield_now().await;
        }

        cache.progress.set("Scanned blocks 0 to 399 of 1000: 1 JobCreated event(s) found");
        chain.fail_head();
        head_gate.add_permits(1);
        assert!(stale.await.unwrap().is_err());

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.status, ScanStatus::Loading);
        assert!(snapshot.progress.starts_with("Scanned blocks 0 to 399"));

        chain.set_head(1_000);
        head_gate.add_permits(1);
        assert!(matches!(
            current.await.unwrap().unwrap(),
            FetchOutcome::Refreshed { .. }
        ));
        assert_eq!(cache.snapshot().status, ScanStatus::Complete);
    }

    #[tokio::test]
    async fn cancelled_fetch_does_not_stay_loading() {
        let chain = chain_with_jobs(1_000, &[(1, 10)]);
        let _gate = chain.gate_logs();
        let cache = cache_over(&chain, &ManualClock::new());

        {
            let mut fetch = pin!(cache.fetch(false));
            assert!(futures::poll!(fetch.as_mut()).is_pending());
            assert_eq!(cache.snapshot().status, ScanStatus::Loading);
        }

        assert_eq!(cache.snapshot().status, ScanStatus::Failed);
        assert_eq!(cache.snapshot().progress, "");
    }
}
