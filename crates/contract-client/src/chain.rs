use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use escrow_core::ids::{ApplicationId, JobId, SubmissionId, TxHash};

use crate::{ChainError, FreelanceEscrow};

/// Events the aggregator reads back from the escrow contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EscrowEvent {
    JobCreated,
    ApplicationSubmitted,
    WorkSubmitted,
    WorkVerifiedByAI,
}

impl EscrowEvent {
    pub fn signature_hash(self) -> B256 {
        match self {
            EscrowEvent::JobCreated => FreelanceEscrow::JobCreated::SIGNATURE_HASH,
            EscrowEvent::ApplicationSubmitted => {
                FreelanceEscrow::ApplicationSubmitted::SIGNATURE_HASH
            }
            EscrowEvent::WorkSubmitted => FreelanceEscrow::WorkSubmitted::SIGNATURE_HASH,
            EscrowEvent::WorkVerifiedByAI => FreelanceEscrow::WorkVerifiedByAI::SIGNATURE_HASH,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EscrowEvent::JobCreated => "JobCreated",
            EscrowEvent::ApplicationSubmitted => "ApplicationSubmitted",
            EscrowEvent::WorkSubmitted => "WorkSubmitted",
            EscrowEvent::WorkVerifiedByAI => "WorkVerifiedByAI",
        }
    }

    /// Topic position of the indexed address argument (poster or freelancer).
    /// Topic 0 is the signature hash.
    pub fn account_topic(self) -> usize {
        match self {
            EscrowEvent::JobCreated => 2,
            _ => 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventFilter {
    pub event: EscrowEvent,
    pub account: Option<Address>,
}

impl EventFilter {
    pub fn new(event: EscrowEvent) -> Self {
        Self {
            event,
            account: None,
        }
    }

    pub fn by_account(mut self, account: Address) -> Self {
        self.account = Some(account);
        self
    }

    pub fn matches(&self, log: &EventLog) -> bool {
        log.event == self.event && self.account.is_none_or(|account| account == log.account)
    }
}

/// Indexed arguments of one decoded escrow event.
///
/// `entity_id` is the id the event is about (job, application or submission);
/// for `JobCreated` it equals `job_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventLog {
    pub event: EscrowEvent,
    pub entity_id: U256,
    pub job_id: U256,
    pub account: Address,
    pub block_number: Option<u64>,
}

/// Raw `getJobDetails` result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobRecord {
    pub poster: Address,
    pub title: String,
    pub description: String,
    pub reward: U256,
    pub deadline: U256,
    pub status: u8,
    pub assigned_freelancer: Address,
}

/// Raw `applications(id)` result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationRecord {
    pub id: U256,
    pub job_id: U256,
    pub freelancer: Address,
    pub proposal: String,
    pub status: u8,
    pub timestamp: U256,
}

/// Raw `getSubmissionDetails` result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub job_id: U256,
    pub freelancer: Address,
    pub deliverable: String,
    pub ai_verified: bool,
    pub poster_approved: bool,
    pub timestamp: U256,
}

/// State-mutating escrow calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscrowCall {
    CreateJob {
        title: String,
        description: String,
        deadline: u64,
        reward: U256,
    },
    ApplyForJob {
        job_id: JobId,
        proposal: String,
    },
    AcceptApplication {
        application_id: ApplicationId,
    },
    SubmitWork {
        job_id: JobId,
        deliverable: String,
    },
    VerifyWorkByAi {
        submission_id: SubmissionId,
        verified: bool,
    },
    ApproveWork {
        submission_id: SubmissionId,
    },
    CancelJob {
        job_id: JobId,
    },
    UpdatePlatformFee {
        bps: u64,
    },
    UpdateAiReleaseBps {
        bps: u64,
    },
}

impl EscrowCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            EscrowCall::CreateJob { .. } => "createJob",
            EscrowCall::ApplyForJob { .. } => "applyForJob",
            EscrowCall::AcceptApplication { .. } => "acceptApplication",
            EscrowCall::SubmitWork { .. } => "submitWork",
            EscrowCall::VerifyWorkByAi { .. } => "verifyWorkByAI",
            EscrowCall::ApproveWork { .. } => "approveWork",
            EscrowCall::CancelJob { .. } => "cancelJob",
            EscrowCall::UpdatePlatformFee { .. } => "updatePlatformFee",
            EscrowCall::UpdateAiReleaseBps { .. } => "updateAIVerificationReleaseBps",
        }
    }
}

/// Everything the aggregator needs from the chain: block height, bounded log
/// queries, point reads and transaction submission.
#[async_trait]
pub trait EscrowChain: Send + Sync {
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Logs matching `filter` in `[from_block, to_block]`, in provider order.
    async fn logs(
        &self,
        filter: &EventFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<EventLog>, ChainError>;

    async fn job_details(&self, job_id: JobId) -> Result<JobRecord, ChainError>;

    async fn submission_details(
        &self,
        submission_id: SubmissionId,
    ) -> Result<SubmissionRecord, ChainError>;

    async fn job_applications(&self, job_id: JobId) -> Result<Vec<U256>, ChainError>;

    async fn application(
        &self,
        application_id: ApplicationId,
    ) -> Result<ApplicationRecord, ChainError>;

    /// Current submission for a job, zero when there is none.
    async fn job_to_submission(&self, job_id: JobId) -> Result<U256, ChainError>;

    async fn owner(&self) -> Result<Address, ChainError>;

    async fn platform_fee_bps(&self) -> Result<U256, ChainError>;

    async fn ai_release_bps(&self) -> Result<U256, ChainError>;

    /// Signing account, `None` when no wallet is connected.
    fn account(&self) -> Option<Address>;

    /// Broadcast a call and return its hash without waiting for a receipt.
    async fn send(&self, call: EscrowCall) -> Result<TxHash, ChainError>;
}
