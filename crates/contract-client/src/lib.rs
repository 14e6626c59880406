pub mod chain;
pub mod client;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod rpc;

use alloy::sol;

pub use chain::{
    ApplicationRecord, EscrowCall, EscrowChain, EscrowEvent, EventFilter, EventLog, JobRecord,
    SubmissionRecord,
};
pub use client::{ContractClient, WriteError};
pub use rpc::{ChainConfig, RpcChain};

sol! {
    #[sol(rpc)]
    contract FreelanceEscrow {
        function createJob(string memory title, string memory description, uint256 deadline) external payable returns (uint256);
        function applyForJob(uint256 jobId, string memory proposal) external;
        function acceptApplication(uint256 applicationId) external;
        function submitWork(uint256 jobId, string memory deliverable) external;
        function verifyWorkByAI(uint256 submissionId, bool verified) external;
        function approveWork(uint256 submissionId) external;
        function cancelJob(uint256 jobId) external;
        function updatePlatformFee(uint256 newFeeBps) external;
        function updateAIVerificationReleaseBps(uint256 newReleaseBps) external;

        function getJobDetails(uint256 jobId) external view returns (address poster, string memory title, string memory description, uint256 reward, uint256 deadline, uint8 status, address assignedFreelancer);
        function getSubmissionDetails(uint256 submissionId) external view returns (uint256 jobId, address freelancer, string memory deliverable, bool aiVerified, bool posterApproved, uint256 timestamp);
        function getJobApplications(uint256 jobId) external view returns (uint256[] memory);
        function applications(uint256 applicationId) external view returns (uint256 id, uint256 jobId, address freelancer, string memory proposal, uint8 status, uint256 timestamp);
        function jobToSubmission(uint256 jobId) external view returns (uint256);
        function owner() external view returns (address);
        function platformFeeBps() external view returns (uint256);
        function aiVerificationReleaseBps() external view returns (uint256);

        event JobCreated(uint256 indexed jobId, address indexed poster, uint256 reward);
        event ApplicationSubmitted(uint256 indexed applicationId, uint256 indexed jobId, address indexed freelancer);
        event WorkSubmitted(uint256 indexed submissionId, uint256 indexed jobId, address indexed freelancer);
        event WorkVerifiedByAI(uint256 indexed submissionId, uint256 indexed jobId, address indexed freelancer);
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("no wallet connected")]
    NotConnected,
}
