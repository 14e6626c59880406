//! Turns event ids into fully read entities.
//!
//! Events only carry indexed ids, so every entity is hydrated with one point
//! read of its canonical accessor. An id whose read fails, returns the
//! all-zero struct, or holds a value that does not fit the domain type is
//! dropped rather than emitted half-filled.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use contract_client::{
    ApplicationRecord, ChainError, EscrowChain, EventLog, JobRecord, SubmissionRecord,
};
use escrow_core::enums::{ApplicationStatus, JobStatus};
use escrow_core::ids::{ApplicationId, JobId, SubmissionId};
use escrow_core::job::{Application, Job, Submission};
use futures::{stream, StreamExt};

/// Entities read in one batch plus the ids that had to be dropped.
#[derive(Debug, Clone)]
pub struct Hydrated<K, V> {
    pub entities: BTreeMap<K, V>,
    pub dropped: Vec<U256>,
}

impl<K, V> Default for Hydrated<K, V> {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            dropped: Vec::new(),
        }
    }
}

/// Distinct entity ids carried by `logs`, with any id too large for `u64`
/// reported separately.
pub fn entity_ids(logs: &[EventLog]) -> (BTreeSet<u64>, Vec<U256>) {
    let mut ids = BTreeSet::new();
    let mut oversized = Vec::new();

    for log in logs {
        match u64::try_from(log.entity_id) {
            Ok(id) => {
                ids.insert(id);
            }
            Err(_) => oversized.push(log.entity_id),
        }
    }

    (ids, oversized)
}

fn narrow(value: U256) -> Option<u64> {
    u64::try_from(value).ok()
}

fn job_from_record(id: JobId, record: JobRecord) -> Option<Job> {
    if record.poster == Address::ZERO {
        return None;
    }

    Some(Job {
        id,
        poster: record.poster,
        title: record.title,
        description: record.description,
        reward: record.reward,
        deadline: narrow(record.deadline)?,
        status: JobStatus::try_from(record.status).ok()?,
        assigned_freelancer: record.assigned_freelancer,
    })
}

/// Everything but the job title, which needs a second read.
fn application_from_record(id: ApplicationId, record: ApplicationRecord) -> Option<Application> {
    if record.id.is_zero() || record.freelancer == Address::ZERO || narrow(record.id)? != id.0 {
        return None;
    }

    Some(Application {
        id,
        job_id: JobId(narrow(record.job_id)?),
        job_title: String::new(),
        freelancer: record.freelancer,
        proposal: record.proposal,
        status: ApplicationStatus::try_from(record.status).ok()?,
        timestamp: narrow(record.timestamp)?,
    })
}

fn submission_from_record(id: SubmissionId, record: SubmissionRecord) -> Option<Submission> {
    if record.freelancer == Address::ZERO {
        return None;
    }

    Some(Submission {
        id,
        job_id: JobId(narrow(record.job_id)?),
        job_title: String::new(),
        freelancer: record.freelancer,
        deliverable: record.deliverable,
        ai_verified: record.ai_verified,
        poster_approved: record.poster_approved,
        timestamp: narrow(record.timestamp)?,
    })
}

pub struct Reconstructor<C> {
    chain: Arc<C>,
    concurrency: usize,
}

impl<C: EscrowChain> Reconstructor<C> {
    pub fn new(chain: Arc<C>, concurrency: usize) -> Self {
        Self {
            chain,
            concurrency: concurrency.max(1),
        }
    }

    /// Point read of one job. `Ok(None)` for an unknown or malformed job.
    pub async fn read_job(&self, id: JobId) -> Result<Option<Job>, ChainError> {
        let record = self.chain.job_details(id).await?;
        Ok(job_from_record(id, record))
    }

    pub async fn read_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, ChainError> {
        let record = self.chain.application(id).await?;
        let Some(mut application) = application_from_record(id, record) else {
            return Ok(None);
        };
        application.job_title = self.job_title(application.job_id).await;
        Ok(Some(application))
    }

    pub async fn read_submission(
        &self,
        id: SubmissionId,
    ) -> Result<Option<Submission>, ChainError> {
        let record = self.chain.submission_details(id).await?;
        let Some(mut submission) = submission_from_record(id, record) else {
            return Ok(None);
        };
        submission.job_title = self.job_title(submission.job_id).await;
        Ok(Some(submission))
    }

    /// Title from a fresh read of the job, or `Job #<id>` if that read fails.
    pub async fn job_title(&self, job_id: JobId) -> String {
        match self.read_job(job_id).await {
            Ok(Some(job)) => job.title,
            Ok(None) => job_id.placeholder_title(),
            Err(e) => {
                tracing::debug!(%job_id, error = %e, "job title unavailable, using placeholder");
                job_id.placeholder_title()
            }
        }
    }

    pub async fn jobs(&self, ids: impl IntoIterator<Item = u64>) -> Hydrated<JobId, Job> {
        self.hydrate("job", ids, |id| async move {
            self.read_job(JobId(id))
                .await
                .map(|job| job.map(|job| (job.id, job)))
        })
        .await
    }

    pub async fn applications(
        &self,
        ids: impl IntoIterator<Item = u64>,
    ) -> Hydrated<ApplicationId, Application> {
        self.hydrate("application", ids, |id| async move {
            self.read_application(ApplicationId(id))
                .await
                .map(|application| application.map(|a| (a.id, a)))
        })
        .await
    }

    pub async fn submissions(
        &self,
        ids: impl IntoIterator<Item = u64>,
    ) -> Hydrated<SubmissionId, Submission> {
        self.hydrate("submission", ids, |id| async move {
            self.read_submission(SubmissionId(id))
                .await
                .map(|submission| submission.map(|s| (s.id, s)))
        })
        .await
    }

    /// One read per distinct id, at most `concurrency` in flight.
    async fn hydrate<K, V, F, Fut>(
        &self,
        kind: &'static str,
        ids: impl IntoIterator<Item = u64>,
        read: F,
    ) -> Hydrated<K, V>
    where
        K: Ord,
        F: Fn(u64) -> Fut,
        Fut: Future<Output = Result<Option<(K, V)>, ChainError>>,
    {
        let ids: BTreeSet<u64> = ids.into_iter().collect();
        let read = &read;

        let results: Vec<_> = stream::iter(ids)
            .map(|id| async move { (id, read(id).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut hydrated = Hydrated::default();
        for (id, result) in results {
            match result {
                Ok(Some((key, value))) => {
                    hydrated.entities.insert(key, value);
                }
                Ok(None) => {
                    tracing::warn!(kind, id, "empty or malformed record, dropping");
                    hydrated.dropped.push(U256::from(id));
                }
                Err(e) => {
                    tracing::warn!(kind, id, error = %e, "point read failed, dropping");
                    hydrated.dropped.push(U256::from(id));
                }
            }
        }

        hydrated
    }
}
