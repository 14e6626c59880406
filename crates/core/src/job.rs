use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{
    enums::{ApplicationStatus, JobStatus, VerificationState},
    ids::{ApplicationId, JobId, SubmissionId},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub poster: Address,
    pub title: String,
    pub description: String,
    /// Reward in wei, kept at full precision.
    pub reward: U256,
    pub deadline: u64,
    pub status: JobStatus,
    /// `Address::ZERO` while nobody is assigned.
    pub assigned_freelancer: Address,
}

impl Job {
    pub fn assignee(&self) -> Option<Address> {
        (self.assigned_freelancer != Address::ZERO).then_some(self.assigned_freelancer)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub job_title: String,
    pub freelancer: Address,
    pub proposal: String,
    pub status: ApplicationStatus,
    pub timestamp: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub job_id: JobId,
    pub job_title: String,
    pub freelancer: Address,
    pub deliverable: String,
    pub ai_verified: bool,
    pub poster_approved: bool,
    pub timestamp: u64,
}

impl Submission {
    /// The contract only stores a boolean; a submission the poster approved
    /// without AI sign-off will never be verified.
    pub fn verification(&self) -> VerificationState {
        if self.ai_verified {
            VerificationState::Verified
        } else if self.poster_approved {
            VerificationState::NotVerified
        } else {
            VerificationState::Pending
        }
    }
}
