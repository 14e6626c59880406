use std::collections::BTreeSet;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use contract_client::{ChainError, EscrowChain, EscrowEvent, EventFilter};
use escrow_core::ids::{JobId, SubmissionId};
use escrow_core::job::{Application, Job, Submission};

use crate::cache::{FetchOutcome, JobCache, JobSnapshot, ScanStatus};
use crate::clock::{Clock, SystemClock};
use crate::config::IndexerConfig;
use crate::error::{PartialScanError, ReadError};
use crate::reconstruct::{entity_ids, Reconstructor};
use crate::scanner::{lookback_start, LogScanner, Progress};

/// Query side of the marketplace. Job listings come from the shared
/// [`JobCache`]; everything else is read from the chain on demand.
pub struct EscrowReader<C> {
    chain: Arc<C>,
    config: IndexerConfig,
    cache: Arc<JobCache<C>>,
    scanner: LogScanner<C>,
    reconstructor: Reconstructor<C>,
    progress: Progress,
}

impl<C: EscrowChain + 'static> EscrowReader<C> {
    pub fn new(chain: Arc<C>, config: IndexerConfig) -> Self {
        Self::with_clock(chain, config, Arc::new(SystemClock))
    }

    pub fn with_clock(chain: Arc<C>, config: IndexerConfig, clock: Arc<dyn Clock>) -> Self {
        let cache = Arc::new(JobCache::new(
            Arc::clone(&chain),
            config.clone(),
            clock,
            Progress::default(),
        ));
        let progress = Progress::default();

        Self {
            scanner: LogScanner::new(Arc::clone(&chain), config.window_size, progress.clone()),
            reconstructor: Reconstructor::new(Arc::clone(&chain), config.reconstruct_concurrency),
            chain,
            config,
            cache,
            progress,
        }
    }

    pub fn cache(&self) -> &Arc<JobCache<C>> {
        &self.cache
    }

    /// Progress of the user-history scan currently running, if any. The
    /// listing keeps its own in [`JobSnapshot::progress`].
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>, ReadError> {
        Ok(self.reconstructor.read_job(id).await?)
    }

    /// Current listing snapshot. Starts a background fetch when forced, or
    /// when the cache is stale and no fetch is already running.
    pub fn list_jobs(&self, force: bool) -> JobSnapshot {
        let snapshot = self.cache.snapshot();

        let stale = self.cache.needs_refresh() && snapshot.status != ScanStatus::Loading;
        if force || stale {
            let cache = Arc::clone(&self.cache);
            tokio::spawn(async move {
                if let Err(e) = cache.fetch(force).await {
                    tracing::warn!(error = %e, "background job fetch failed");
                }
            });
        }

        snapshot
    }

    /// Fetch into the cache and wait for it to finish.
    pub async fn refresh_jobs(&self, force: bool) -> Result<FetchOutcome, ReadError> {
        self.cache.fetch(force).await
    }

    /// Applications for one job, ordered by id.
    pub async fn list_applications_for_job(
        &self,
        job_id: JobId,
    ) -> Result<Vec<Application>, ReadError> {
        let ids = self.chain.job_applications(job_id).await?;

        let mut partial = PartialScanError::default();
        let mut narrowed = BTreeSet::new();
        for id in ids {
            match u64::try_from(id) {
                Ok(id) => {
                    narrowed.insert(id);
                }
                Err(_) => partial.dropped_ids.push(id),
            }
        }

        let hydrated = self.reconstructor.applications(narrowed).await;
        partial.dropped_ids.extend(hydrated.dropped);
        partial.log("list_applications_for_job");

        Ok(hydrated.entities.into_values().collect())
    }

    pub async fn list_user_applications(
        &self,
        freelancer: Address,
    ) -> Result<Vec<Application>, ReadError> {
        let (ids, mut partial) = self
            .user_scan(EscrowEvent::ApplicationSubmitted, freelancer)
            .await?;
        let hydrated = self.reconstructor.applications(ids).await;
        partial.dropped_ids.extend(hydrated.dropped);
        partial.log("list_user_applications");

        Ok(hydrated.entities.into_values().collect())
    }

    pub async fn list_user_posted_jobs(&self, poster: Address) -> Result<Vec<Job>, ReadError> {
        let (ids, mut partial) = self.user_scan(EscrowEvent::JobCreated, poster).await?;
        let hydrated = self.reconstructor.jobs(ids).await;
        partial.dropped_ids.extend(hydrated.dropped);
        partial.log("list_user_posted_jobs");

        Ok(hydrated.entities.into_values().collect())
    }

    pub async fn list_user_submissions(
        &self,
        freelancer: Address,
    ) -> Result<Vec<Submission>, ReadError> {
        self.submissions_for(EscrowEvent::WorkSubmitted, freelancer, "list_user_submissions")
            .await
    }

    pub async fn list_ai_verified_submissions(
        &self,
        freelancer: Address,
    ) -> Result<Vec<Submission>, ReadError> {
        self.submissions_for(
            EscrowEvent::WorkVerifiedByAI,
            freelancer,
            "list_ai_verified_submissions",
        )
        .await
    }

    pub async fn get_submission(&self, id: SubmissionId) -> Result<Option<Submission>, ReadError> {
        Ok(self.reconstructor.read_submission(id).await?)
    }

    /// The submission recorded for `job_id`, if any. The contract maps jobs
    /// without a submission to id 0.
    pub async fn get_job_submission(&self, job_id: JobId) -> Result<Option<Submission>, ReadError> {
        let id = self.chain.job_to_submission(job_id).await?;
        if id.is_zero() {
            return Ok(None);
        }
        let Ok(id) = u64::try_from(id) else {
            tracing::warn!(%job_id, %id, "submission id out of range");
            return Ok(None);
        };

        self.get_submission(SubmissionId(id)).await
    }

    /// Platform fee in percent.
    pub async fn platform_fee(&self) -> f64 {
        let bps = self.chain.platform_fee_bps().await;
        percent(bps, "platform_fee", self.config.fallback_platform_fee)
    }

    /// Share of the reward released on AI verification, in percent.
    pub async fn ai_release_percentage(&self) -> f64 {
        let bps = self.chain.ai_release_bps().await;
        percent(bps, "ai_release_percentage", self.config.fallback_ai_release)
    }

    pub async fn is_owner(&self, address: Address) -> bool {
        match self.chain.owner().await {
            Ok(owner) => owner == address,
            Err(e) => {
                tracing::warn!(%address, error = %e, "owner lookup failed");
                false
            }
        }
    }

    async fn submissions_for(
        &self,
        event: EscrowEvent,
        freelancer: Address,
        operation: &'static str,
    ) -> Result<Vec<Submission>, ReadError> {
        let (ids, mut partial) = self.user_scan(event, freelancer).await?;
        let hydrated = self.reconstructor.submissions(ids).await;
        partial.dropped_ids.extend(hydrated.dropped);
        partial.log(operation);

        Ok(hydrated.entities.into_values().collect())
    }

    /// Distinct entity ids of `event` logs indexed by `account` over the user
    /// lookback.
    async fn user_scan(
        &self,
        event: EscrowEvent,
        account: Address,
    ) -> Result<(BTreeSet<u64>, PartialScanError), ReadError> {
        let head = self.chain.block_number().await?;
        let from = lookback_start(head, self.config.user_lookback);
        let filter = EventFilter::new(event).by_account(account);

        tracing::debug!(event = event.name(), %account, from, head, "scanning user history");
        let outcome = self.scanner.scan(&filter, from, head).await;
        self.progress.clear();

        let (ids, oversized) = entity_ids(&outcome.logs);
        Ok((
            ids,
            PartialScanError {
                failed_windows: outcome.failed,
                dropped_ids: oversized,
            },
        ))
    }
}

fn percent(bps: Result<U256, ChainError>, setting: &'static str, fallback: f64) -> f64 {
    match bps {
        Ok(bps) => match u64::try_from(bps) {
            Ok(bps) => bps as f64 / 100.0,
            Err(_) => {
                tracing::warn!(setting, %bps, "setting out of range, using fallback");
                fallback
            }
        },
        Err(e) => {
            tracing::warn!(setting, error = %e, fallback, "setting read failed, using fallback");
            fallback
        }
    }
}
