use std::fmt::Display;
use std::future::Future;
use std::str::FromStr;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use escrow_core::ids::{ApplicationId, JobId, SubmissionId, TxHash};

use crate::chain::{
    ApplicationRecord, EscrowCall, EscrowChain, EscrowEvent, EventFilter, EventLog, JobRecord,
    SubmissionRecord,
};
use crate::{ChainError, FreelanceEscrow};

const DEFAULT_RPC_URL: &str = "https://sepolia.base.org";

#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Tried in order for reads; the first one also carries writes.
    pub rpc_urls: Vec<String>,
    pub contract_address: Address,
    pub private_key: Option<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_urls: vec![DEFAULT_RPC_URL.to_string()],
            contract_address: Address::ZERO,
            private_key: None,
        }
    }
}

impl ChainConfig {
    /// Reads `RPC_URLS` (comma separated), `ESCROW_ADDRESS` and `PRIVATE_KEY`.
    pub fn from_env() -> Result<Self, ChainError> {
        let mut config = Self::default();

        if let Ok(urls) = std::env::var("RPC_URLS") {
            let urls: Vec<String> = urls
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect();
            if !urls.is_empty() {
                config.rpc_urls = urls;
            }
        }

        if let Ok(address) = std::env::var("ESCROW_ADDRESS") {
            config.contract_address = address
                .parse()
                .map_err(|e| ChainError::InvalidConfig(format!("ESCROW_ADDRESS: {e}")))?;
        }

        config.private_key = std::env::var("PRIVATE_KEY")
            .ok()
            .filter(|key| !key.is_empty());

        Ok(config)
    }
}

/// JSON-RPC backed [`EscrowChain`] with read fallback across endpoints.
#[derive(Clone)]
pub struct RpcChain {
    contract_address: Address,
    readers: Vec<DynProvider>,
    writer: Option<(DynProvider, Address)>,
}

impl RpcChain {
    pub fn connect(config: &ChainConfig) -> Result<Self, ChainError> {
        let urls = config
            .rpc_urls
            .iter()
            .map(|url| {
                url.parse::<Url>()
                    .map_err(|e| ChainError::InvalidConfig(format!("invalid rpc url {url}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let Some(primary) = urls.first().cloned() else {
            return Err(ChainError::InvalidConfig("no rpc urls configured".to_string()));
        };

        let readers = urls
            .into_iter()
            .map(|url| ProviderBuilder::new().connect_http(url).erased())
            .collect();

        let writer = match &config.private_key {
            Some(key) => {
                let signer = PrivateKeySigner::from_str(key)
                    .map_err(|e| ChainError::InvalidConfig(e.to_string()))?;
                let account = signer.address();
                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect_http(primary)
                    .erased();
                Some((provider, account))
            }
            None => None,
        };

        tracing::info!(
            contract = %config.contract_address,
            endpoints = config.rpc_urls.len(),
            wallet = writer.is_some(),
            "escrow chain client ready"
        );

        Ok(Self {
            contract_address: config.contract_address,
            readers,
            writer,
        })
    }

    async fn with_fallback<T, E, F, Fut>(&self, call: &'static str, op: F) -> Result<T, ChainError>
    where
        E: Display,
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut last_error = None;

        for (endpoint, provider) in self.readers.iter().enumerate() {
            match op(provider.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::debug!(call, endpoint, error = %e, "rpc call failed");
                    last_error = Some(e.to_string());
                }
            }
        }

        Err(ChainError::Provider(format!(
            "{call}: {}",
            last_error.unwrap_or_else(|| "no rpc endpoints".to_string())
        )))
    }
}

fn decode_log(event: EscrowEvent, log: &Log) -> Result<EventLog, ChainError> {
    let decode_err = |e: alloy::sol_types::Error| ChainError::Decode(format!("{}: {e}", event.name()));

    let (entity_id, job_id, account) = match event {
        EscrowEvent::JobCreated => {
            let data = log.log_decode::<FreelanceEscrow::JobCreated>().map_err(decode_err)?.inner.data;
            (data.jobId, data.jobId, data.poster)
        }
        EscrowEvent::ApplicationSubmitted => {
            let data = log
                .log_decode::<FreelanceEscrow::ApplicationSubmitted>()
                .map_err(decode_err)?
                .inner
                .data;
            (data.applicationId, data.jobId, data.freelancer)
        }
        EscrowEvent::WorkSubmitted => {
            let data = log.log_decode::<FreelanceEscrow::WorkSubmitted>().map_err(decode_err)?.inner.data;
            (data.submissionId, data.jobId, data.freelancer)
        }
        EscrowEvent::WorkVerifiedByAI => {
            let data = log
                .log_decode::<FreelanceEscrow::WorkVerifiedByAI>()
                .map_err(decode_err)?
                .inner
                .data;
            (data.submissionId, data.jobId, data.freelancer)
        }
    };

    Ok(EventLog {
        event,
        entity_id,
        job_id,
        account,
        block_number: log.block_number,
    })
}

#[async_trait]
impl EscrowChain for RpcChain {
    async fn block_number(&self) -> Result<u64, ChainError> {
        self.with_fallback("eth_blockNumber", |provider| async move {
            provider.get_block_number().await
        })
        .await
    }

    async fn logs(
        &self,
        filter: &EventFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<EventLog>, ChainError> {
        let mut query = Filter::new()
            .address(self.contract_address)
            .event_signature(filter.event.signature_hash())
            .from_block(from_block)
            .to_block(to_block);

        if let Some(account) = filter.account {
            query = match filter.event.account_topic() {
                2 => query.topic2(account.into_word()),
                _ => query.topic3(account.into_word()),
            };
        }

        let raw = self
            .with_fallback("eth_getLogs", |provider| {
                let query = query.clone();
                async move { provider.get_logs(&query).await }
            })
            .await?;

        let mut logs = Vec::with_capacity(raw.len());
        for log in &raw {
            match decode_log(filter.event, log) {
                Ok(decoded) => logs.push(decoded),
                Err(e) => tracing::warn!(error = %e, "skipping undecodable log"),
            }
        }

        Ok(logs)
    }

    async fn job_details(&self, job_id: JobId) -> Result<JobRecord, ChainError> {
        let address = self.contract_address;
        let id = U256::from(job_id.0);

        let details = self
            .with_fallback("getJobDetails", |provider| async move {
                let contract = FreelanceEscrow::new(address, provider);
                contract.getJobDetails(id).call().await
            })
            .await?;

        Ok(JobRecord {
            poster: details.poster,
            title: details.title,
            description: details.description,
            reward: details.reward,
            deadline: details.deadline,
            status: details.status,
            assigned_freelancer: details.assignedFreelancer,
        })
    }

    async fn submission_details(
        &self,
        submission_id: SubmissionId,
    ) -> Result<SubmissionRecord, ChainError> {
        let address = self.contract_address;
        let id = U256::from(submission_id.0);

        let details = self
            .with_fallback("getSubmissionDetails", |provider| async move {
                let contract = FreelanceEscrow::new(address, provider);
                contract.getSubmissionDetails(id).call().await
            })
            .await?;

        Ok(SubmissionRecord {
            job_id: details.jobId,
            freelancer: details.freelancer,
            deliverable: details.deliverable,
            ai_verified: details.aiVerified,
            poster_approved: details.posterApproved,
            timestamp: details.timestamp,
        })
    }

    async fn job_applications(&self, job_id: JobId) -> Result<Vec<U256>, ChainError> {
        let address = self.contract_address;
        let id = U256::from(job_id.0);

        self.with_fallback("getJobApplications", |provider| async move {
            let contract = FreelanceEscrow::new(address, provider);
            contract.getJobApplications(id).call().await
        })
        .await
    }

    async fn application(
        &self,
        application_id: ApplicationId,
    ) -> Result<ApplicationRecord, ChainError> {
        let address = self.contract_address;
        let id = U256::from(application_id.0);

        let application = self
            .with_fallback("applications", |provider| async move {
                let contract = FreelanceEscrow::new(address, provider);
                contract.applications(id).call().await
            })
            .await?;

        Ok(ApplicationRecord {
            id: application.id,
            job_id: application.jobId,
            freelancer: application.freelancer,
            proposal: application.proposal,
            status: application.status,
            timestamp: application.timestamp,
        })
    }

    async fn job_to_submission(&self, job_id: JobId) -> Result<U256, ChainError> {
        let address = self.contract_address;
        let id = U256::from(job_id.0);

        self.with_fallback("jobToSubmission", |provider| async move {
            let contract = FreelanceEscrow::new(address, provider);
            contract.jobToSubmission(id).call().await
        })
        .await
    }

    async fn owner(&self) -> Result<Address, ChainError> {
        let address = self.contract_address;

        self.with_fallback("owner", |provider| async move {
            let contract = FreelanceEscrow::new(address, provider);
            contract.owner().call().await
        })
        .await
    }

    async fn platform_fee_bps(&self) -> Result<U256, ChainError> {
        let address = self.contract_address;

        self.with_fallback("platformFeeBps", |provider| async move {
            let contract = FreelanceEscrow::new(address, provider);
            contract.platformFeeBps().call().await
        })
        .await
    }

    async fn ai_release_bps(&self) -> Result<U256, ChainError> {
        let address = self.contract_address;

        self.with_fallback("aiVerificationReleaseBps", |provider| async move {
            let contract = FreelanceEscrow::new(address, provider);
            contract.aiVerificationReleaseBps().call().await
        })
        .await
    }

    fn account(&self) -> Option<Address> {
        self.writer.as_ref().map(|(_, account)| *account)
    }

    async fn send(&self, call: EscrowCall) -> Result<TxHash, ChainError> {
        let (provider, _) = self.writer.as_ref().ok_or(ChainError::NotConnected)?;
        let contract = FreelanceEscrow::new(self.contract_address, provider.clone());

        // Writes go to the primary endpoint only.
        let pending = match call {
            EscrowCall::CreateJob {
                title,
                description,
                deadline,
                reward,
            } => {
                contract
                    .createJob(title, description, U256::from(deadline))
                    .value(reward)
                    .send()
                    .await
            }
            EscrowCall::ApplyForJob { job_id, proposal } => {
                contract
                    .applyForJob(U256::from(job_id.0), proposal)
                    .send()
                    .await
            }
            EscrowCall::AcceptApplication { application_id } => {
                contract
                    .acceptApplication(U256::from(application_id.0))
                    .send()
                    .await
            }
            EscrowCall::SubmitWork {
                job_id,
                deliverable,
            } => {
                contract
                    .submitWork(U256::from(job_id.0), deliverable)
                    .send()
                    .await
            }
            EscrowCall::VerifyWorkByAi {
                submission_id,
                verified,
            } => {
                contract
                    .verifyWorkByAI(U256::from(submission_id.0), verified)
                    .send()
                    .await
            }
            EscrowCall::ApproveWork { submission_id } => {
                contract
                    .approveWork(U256::from(submission_id.0))
                    .send()
                    .await
            }
            EscrowCall::CancelJob { job_id } => {
                contract.cancelJob(U256::from(job_id.0)).send().await
            }
            EscrowCall::UpdatePlatformFee { bps } => {
                contract.updatePlatformFee(U256::from(bps)).send().await
            }
            EscrowCall::UpdateAiReleaseBps { bps } => {
                contract
                    .updateAIVerificationReleaseBps(U256::from(bps))
                    .send()
                    .await
            }
        }
        .map_err(|e| ChainError::Provider(e.to_string()))?;

        Ok(TxHash::from(*pending.tx_hash()))
    }
}
