use std::sync::Arc;

use alloy::primitives::{Address, U256};
use escrow_core::ids::{ApplicationId, JobId, SubmissionId, TxHash};

use crate::chain::{EscrowCall, EscrowChain};
use crate::ChainError;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("wallet not connected")]
    NotConnected,

    #[error("{function} failed: {source}")]
    ChainWrite {
        function: &'static str,
        #[source]
        source: ChainError,
    },
}

/// Mutating side of the escrow contract. Every method is exactly one
/// transaction; nothing is retried and no local state is touched.
pub struct ContractClient<C> {
    chain: Arc<C>,
}

impl<C> Clone for ContractClient<C> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
        }
    }
}

impl<C: EscrowChain> ContractClient<C> {
    pub fn new(chain: Arc<C>) -> Self {
        Self { chain }
    }

    pub fn account(&self) -> Option<Address> {
        self.chain.account()
    }

    /// `reward` is attached as the transaction value.
    pub async fn create_job(
        &self,
        title: &str,
        description: &str,
        deadline: u64,
        reward: U256,
    ) -> Result<TxHash, WriteError> {
        self.submit(EscrowCall::CreateJob {
            title: title.to_string(),
            description: description.to_string(),
            deadline,
            reward,
        })
        .await
    }

    pub async fn apply_for_job(&self, job_id: JobId, proposal: &str) -> Result<TxHash, WriteError> {
        self.submit(EscrowCall::ApplyForJob {
            job_id,
            proposal: proposal.to_string(),
        })
        .await
    }

    pub async fn accept_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<TxHash, WriteError> {
        self.submit(EscrowCall::AcceptApplication { application_id })
            .await
    }

    pub async fn submit_work(&self, job_id: JobId, deliverable: &str) -> Result<TxHash, WriteError> {
        self.submit(EscrowCall::SubmitWork {
            job_id,
            deliverable: deliverable.to_string(),
        })
        .await
    }

    /// Owner-only on the contract side; not checked here.
    pub async fn verify_work_by_ai(
        &self,
        submission_id: SubmissionId,
        verified: bool,
    ) -> Result<TxHash, WriteError> {
        self.submit(EscrowCall::VerifyWorkByAi {
            submission_id,
            verified,
        })
        .await
    }

    pub async fn approve_work(&self, submission_id: SubmissionId) -> Result<TxHash, WriteError> {
        self.submit(EscrowCall::ApproveWork { submission_id }).await
    }

    pub async fn cancel_job(&self, job_id: JobId) -> Result<TxHash, WriteError> {
        self.submit(EscrowCall::CancelJob { job_id }).await
    }

    pub async fn update_platform_fee(&self, bps: u64) -> Result<TxHash, WriteError> {
        self.submit(EscrowCall::UpdatePlatformFee { bps }).await
    }

    pub async fn update_ai_release_bps(&self, bps: u64) -> Result<TxHash, WriteError> {
        self.submit(EscrowCall::UpdateAiReleaseBps { bps }).await
    }

    async fn submit(&self, call: EscrowCall) -> Result<TxHash, WriteError> {
        let Some(account) = self.chain.account() else {
            return Err(WriteError::NotConnected);
        };
        let function = call.function_name();

        match self.chain.send(call).await {
            Ok(tx_hash) => {
                tracing::info!(function, %account, %tx_hash, "transaction sent");
                Ok(tx_hash)
            }
            Err(ChainError::NotConnected) => Err(WriteError::NotConnected),
            Err(source) => {
                tracing::warn!(function, %account, error = %source, "transaction rejected");
                Err(WriteError::ChainWrite { function, source })
            }
        }
    }
}
