use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} discriminant {value}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: u8,
}

/// Lifecycle of a job as stored by the escrow contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Open,
    Assigned,
    Submitted,
    AiVerified,
    Completed,
    Cancelled,
}

impl JobStatus {
    /// Completed and cancelled jobs never change again.
    pub fn is_final(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }

    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Open => "Open",
            JobStatus::Assigned => "Assigned",
            JobStatus::Submitted => "Submitted",
            JobStatus::AiVerified => "AI Verified",
            JobStatus::Completed => "Completed",
            JobStatus::Cancelled => "Cancelled",
        }
    }
}

impl TryFrom<u8> for JobStatus {
    type Error = UnknownStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => JobStatus::Open,
            1 => JobStatus::Assigned,
            2 => JobStatus::Submitted,
            3 => JobStatus::AiVerified,
            4 => JobStatus::Completed,
            5 => JobStatus::Cancelled,
            _ => {
                return Err(UnknownStatus {
                    kind: "job status",
                    value,
                })
            }
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl TryFrom<u8> for ApplicationStatus {
    type Error = UnknownStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => ApplicationStatus::Pending,
            1 => ApplicationStatus::Accepted,
            2 => ApplicationStatus::Rejected,
            _ => {
                return Err(UnknownStatus {
                    kind: "application status",
                    value,
                })
            }
        })
    }
}

/// AI verification state of a submission as presented to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationState {
    Pending,
    Verified,
    NotVerified,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_follows_contract_ordering() {
        assert_eq!(JobStatus::try_from(0), Ok(JobStatus::Open));
        assert_eq!(JobStatus::try_from(3), Ok(JobStatus::AiVerified));
        assert_eq!(JobStatus::try_from(5), Ok(JobStatus::Cancelled));
        assert!(JobStatus::try_from(6).is_err());
    }

    #[test]
    fn only_completed_and_cancelled_are_final() {
        assert!(JobStatus::Completed.is_final());
        assert!(JobStatus::Cancelled.is_final());
        assert!(!JobStatus::Submitted.is_final());
    }

    #[test]
    fn unknown_application_status_is_rejected() {
        let err = ApplicationStatus::try_from(9).unwrap_err();
        assert_eq!(err.to_string(), "unknown application status discriminant 9");
    }
}
