//! In-memory [`EscrowChain`] for tests. Logs are answered from a list of
//! recorded events, point reads from maps, and any call can be made to fail.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use escrow_core::ids::{ApplicationId, JobId, SubmissionId, TxHash};
use tokio::sync::Semaphore;

use crate::chain::{
    ApplicationRecord, EscrowCall, EscrowChain, EscrowEvent, EventFilter, EventLog, JobRecord,
    SubmissionRecord,
};
use crate::ChainError;

type LogObserver = Box<dyn Fn(u64, u64) + Send + Sync>;

#[derive(Default)]
struct State {
    head: Option<u64>,
    account: Option<Address>,
    events: Vec<EventLog>,
    failing_blocks: HashSet<u64>,
    jobs: HashMap<u64, JobRecord>,
    failing_jobs: HashSet<u64>,
    applications: HashMap<u64, ApplicationRecord>,
    job_applications: HashMap<u64, Vec<u64>>,
    failing_applications: HashSet<u64>,
    submissions: HashMap<u64, SubmissionRecord>,
    job_to_submission: HashMap<u64, u64>,
    owner: Option<Address>,
    platform_fee_bps: Option<U256>,
    ai_release_bps: Option<U256>,
    send_error: Option<String>,
    sent: Vec<EscrowCall>,
    log_queries: Vec<(u64, u64)>,
    head_gate: Option<Arc<Semaphore>>,
    log_gate: Option<Arc<Semaphore>>,
    job_reads: HashMap<u64, usize>,
}

pub struct MockChain {
    state: Mutex<State>,
    calls: AtomicUsize,
    send_attempts: AtomicUsize,
    yield_reads: AtomicBool,
    reads_in_flight: AtomicUsize,
    peak_reads: AtomicUsize,
    on_logs: Mutex<Option<LogObserver>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

pub fn job_record(poster: Address, title: &str, reward: U256) -> JobRecord {
    JobRecord {
        poster,
        title: title.to_string(),
        description: format!("{title} description"),
        reward,
        deadline: U256::from(1_900_000_000u64),
        status: 0,
        assigned_freelancer: Address::ZERO,
    }
}

pub fn application_record(id: u64, job_id: u64, freelancer: Address, proposal: &str) -> ApplicationRecord {
    ApplicationRecord {
        id: U256::from(id),
        job_id: U256::from(job_id),
        freelancer,
        proposal: proposal.to_string(),
        status: 0,
        timestamp: U256::from(1_700_000_000u64 + id),
    }
}

pub fn submission_record(job_id: u64, freelancer: Address, deliverable: &str) -> SubmissionRecord {
    SubmissionRecord {
        job_id: U256::from(job_id),
        freelancer,
        deliverable: deliverable.to_string(),
        ai_verified: false,
        poster_approved: false,
        timestamp: U256::from(1_700_000_500u64),
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                head: Some(0),
                ..State::default()
            }),
            calls: AtomicUsize::new(0),
            send_attempts: AtomicUsize::new(0),
            yield_reads: AtomicBool::new(false),
            reads_in_flight: AtomicUsize::new(0),
            peak_reads: AtomicUsize::new(0),
            on_logs: Mutex::new(None),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_head(self, head: u64) -> Self {
        self.set_head(head);
        self
    }

    pub fn with_account(self, account: Address) -> Self {
        self.state().account = Some(account);
        self
    }

    pub fn set_head(&self, head: u64) {
        self.state().head = Some(head);
    }

    /// Make `eth_blockNumber` fail.
    pub fn fail_head(&self) {
        self.state().head = None;
    }

    /// Register a job and its `JobCreated` event at `block`.
    pub fn add_job(&self, id: u64, record: JobRecord, block: u64) {
        let mut state = self.state();
        state.events.push(EventLog {
            event: EscrowEvent::JobCreated,
            entity_id: U256::from(id),
            job_id: U256::from(id),
            account: record.poster,
            block_number: Some(block),
        });
        state.jobs.insert(id, record);
    }

    pub fn set_job_status(&self, id: u64, status: u8) {
        if let Some(job) = self.state().jobs.get_mut(&id) {
            job.status = status;
        }
    }

    pub fn fail_job(&self, id: u64) {
        self.state().failing_jobs.insert(id);
    }

    pub fn add_application(&self, record: ApplicationRecord, block: u64) {
        let id = record.id.to::<u64>();
        let job_id = record.job_id.to::<u64>();
        let mut state = self.state();
        state.events.push(EventLog {
            event: EscrowEvent::ApplicationSubmitted,
            entity_id: record.id,
            job_id: record.job_id,
            account: record.freelancer,
            block_number: Some(block),
        });
        state.job_applications.entry(job_id).or_default().push(id);
        state.applications.insert(id, record);
    }

    pub fn fail_application(&self, id: u64) {
        self.state().failing_applications.insert(id);
    }

    pub fn add_submission(&self, id: u64, record: SubmissionRecord, block: u64) {
        let job_id = record.job_id.to::<u64>();
        let mut state = self.state();
        state.events.push(EventLog {
            event: EscrowEvent::WorkSubmitted,
            entity_id: U256::from(id),
            job_id: record.job_id,
            account: record.freelancer,
            block_number: Some(block),
        });
        state.job_to_submission.insert(job_id, id);
        state.submissions.insert(id, record);
    }

    /// Flag a submission as AI-verified and emit `WorkVerifiedByAI`.
    pub fn verify_submission(&self, id: u64, block: u64) {
        let mut state = self.state();
        let Some(submission) = state.submissions.get_mut(&id) else {
            return;
        };
        submission.ai_verified = true;
        let log = EventLog {
            event: EscrowEvent::WorkVerifiedByAI,
            entity_id: U256::from(id),
            job_id: submission.job_id,
            account: submission.freelancer,
            block_number: Some(block),
        };
        state.events.push(log);
    }

    /// Any log query whose range covers `block` fails.
    pub fn fail_logs_at(&self, block: u64) {
        self.state().failing_blocks.insert(block);
    }

    pub fn set_owner(&self, owner: Address) {
        self.state().owner = Some(owner);
    }

    pub fn set_platform_fee_bps(&self, bps: u64) {
        self.state().platform_fee_bps = Some(U256::from(bps));
    }

    pub fn set_ai_release_bps(&self, bps: u64) {
        self.state().ai_release_bps = Some(U256::from(bps));
    }

    pub fn reject_sends(&self, message: &str) {
        self.state().send_error = Some(message.to_string());
    }

    /// Hold every later log query until a permit is added to the returned
    /// semaphore. Each query consumes one permit.
    pub fn gate_logs(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state().log_gate = Some(Arc::clone(&gate));
        gate
    }

    /// Like [`MockChain::gate_logs`], for `eth_blockNumber`.
    pub fn gate_head(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state().head_gate = Some(Arc::clone(&gate));
        gate
    }

    /// Point reads yield once to the runtime so concurrent callers overlap.
    /// See [`MockChain::peak_reads`].
    pub fn with_yielding_reads(self) -> Self {
        self.yield_reads.store(true, Ordering::SeqCst);
        self
    }

    /// Most point reads ever in flight at once.
    pub fn peak_reads(&self) -> usize {
        self.peak_reads.load(Ordering::SeqCst)
    }

    /// Called synchronously at the start of every log query.
    pub fn on_logs(&self, observer: impl Fn(u64, u64) + Send + Sync + 'static) {
        *self.on_logs.lock().unwrap_or_else(|p| p.into_inner()) = Some(Box::new(observer));
    }

    pub fn sent(&self) -> Vec<EscrowCall> {
        self.state().sent.clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    /// Every call that would have reached the provider.
    pub fn network_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.state().log_queries.clone()
    }

    pub fn job_reads(&self, id: u64) -> usize {
        self.state().job_reads.get(&id).copied().unwrap_or(0)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn point_read(&self) {
        self.count();
        if !self.yield_reads.load(Ordering::SeqCst) {
            return;
        }

        let now = self.reads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_reads.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.reads_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn pass(gate: Option<Arc<Semaphore>>) {
    if let Some(gate) = gate {
        if let Ok(permit) = gate.acquire().await {
            permit.forget();
        }
    }
}

#[async_trait]
impl EscrowChain for MockChain {
    async fn block_number(&self) -> Result<u64, ChainError> {
        self.count();
        let gate = self.state().head_gate.clone();
        pass(gate).await;
        self.state()
            .head
            .ok_or_else(|| ChainError::Provider("eth_blockNumber: connection refused".to_string()))
    }

    async fn logs(
        &self,
        filter: &EventFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<EventLog>, ChainError> {
        self.count();
        let gate = self.state().log_gate.clone();
        pass(gate).await;
        if let Some(observer) = self.on_logs.lock().unwrap_or_else(|p| p.into_inner()).as_ref() {
            observer(from_block, to_block);
        }

        let mut state = self.state();
        state.log_queries.push((from_block, to_block));

        if state
            .failing_blocks
            .iter()
            .any(|block| (from_block..=to_block).contains(block))
        {
            return Err(ChainError::Provider(format!(
                "eth_getLogs {from_block}-{to_block}: query timeout"
            )));
        }

        Ok(state
            .events
            .iter()
            .filter(|log| filter.matches(log))
            .filter(|log| {
                log.block_number
                    .is_some_and(|block| (from_block..=to_block).contains(&block))
            })
            .cloned()
            .collect())
    }

    async fn job_details(&self, job_id: JobId) -> Result<JobRecord, ChainError> {
        self.point_read().await;
        let mut state = self.state();
        *state.job_reads.entry(job_id.0).or_default() += 1;

        if state.failing_jobs.contains(&job_id.0) {
            return Err(ChainError::Provider(format!("getJobDetails({job_id}): execution reverted")));
        }

        // Unknown ids read back as the all-zero struct, like a Solidity mapping.
        Ok(state.jobs.get(&job_id.0).cloned().unwrap_or(JobRecord {
            poster: Address::ZERO,
            title: String::new(),
            description: String::new(),
            reward: U256::ZERO,
            deadline: U256::ZERO,
            status: 0,
            assigned_freelancer: Address::ZERO,
        }))
    }

    async fn submission_details(
        &self,
        submission_id: SubmissionId,
    ) -> Result<SubmissionRecord, ChainError> {
        self.point_read().await;
        Ok(self
            .state()
            .submissions
            .get(&submission_id.0)
            .cloned()
            .unwrap_or(SubmissionRecord {
                job_id: U256::ZERO,
                freelancer: Address::ZERO,
                deliverable: String::new(),
                ai_verified: false,
                poster_approved: false,
                timestamp: U256::ZERO,
            }))
    }

    async fn job_applications(&self, job_id: JobId) -> Result<Vec<U256>, ChainError> {
        self.count();
        Ok(self
            .state()
            .job_applications
            .get(&job_id.0)
            .map(|ids| ids.iter().map(|id| U256::from(*id)).collect())
            .unwrap_or_default())
    }

    async fn application(
        &self,
        application_id: ApplicationId,
    ) -> Result<ApplicationRecord, ChainError> {
        self.point_read().await;
        let state = self.state();
        if state.failing_applications.contains(&application_id.0) {
            return Err(ChainError::Provider(format!(
                "applications({application_id}): execution reverted"
            )));
        }
        Ok(state
            .applications
            .get(&application_id.0)
            .cloned()
            .unwrap_or(ApplicationRecord {
                id: U256::ZERO,
                job_id: U256::ZERO,
                freelancer: Address::ZERO,
                proposal: String::new(),
                status: 0,
                timestamp: U256::ZERO,
            }))
    }

    async fn job_to_submission(&self, job_id: JobId) -> Result<U256, ChainError> {
        self.count();
        Ok(self
            .state()
            .job_to_submission
            .get(&job_id.0)
            .map(|id| U256::from(*id))
            .unwrap_or(U256::ZERO))
    }

    async fn owner(&self) -> Result<Address, ChainError> {
        self.count();
        self.state()
            .owner
            .ok_or_else(|| ChainError::Provider("owner(): execution reverted".to_string()))
    }

    async fn platform_fee_bps(&self) -> Result<U256, ChainError> {
        self.count();
        self.state()
            .platform_fee_bps
            .ok_or_else(|| ChainError::Provider("platformFeeBps(): execution reverted".to_string()))
    }

    async fn ai_release_bps(&self) -> Result<U256, ChainError> {
        self.count();
        self.state().ai_release_bps.ok_or_else(|| {
            ChainError::Provider("aiVerificationReleaseBps(): execution reverted".to_string())
        })
    }

    fn account(&self) -> Option<Address> {
        self.state().account
    }

    async fn send(&self, call: EscrowCall) -> Result<TxHash, ChainError> {
        self.count();
        self.send_attempts.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        if state.account.is_none() {
            return Err(ChainError::NotConnected);
        }
        if let Some(message) = &state.send_error {
            return Err(ChainError::Provider(message.clone()));
        }

        state.sent.push(call);
        let nonce = state.sent.len() as u8;
        Ok(TxHash([nonce; 32]))
    }
}
