use contract_client::{ContractClient, EscrowChain};
use escrow_core::ids::{JobId, SubmissionId, TxHash};
use serde::Serialize;

use crate::client::{EvidenceClient, EvidenceImage};
use crate::verdict::{parse_verdict, Verdict};
use crate::EvidenceError;

#[derive(Debug, Clone)]
pub struct AutoVerifyRequest<'a> {
    pub job_id: JobId,
    pub job_title: &'a str,
    pub job_description: &'a str,
    pub deliverable: &'a str,
    pub image: Option<&'a EvidenceImage>,
    /// Submission to mark as verified on chain when the verdict is positive.
    pub submission_id: Option<SubmissionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoVerification {
    #[serde(flatten)]
    pub verdict: Verdict,
    pub verified_on_chain: bool,
    pub tx_hash: Option<TxHash>,
}

/// Ask the verifier about a submission and, on a positive verdict, record it
/// on chain through `writer`.
///
/// Returns `Ok(None)` when there is no evidence image. A failed on-chain
/// write does not fail the call; it is logged and reported as
/// `verified_on_chain == false`.
pub async fn auto_verify<C: EscrowChain>(
    evidence: &EvidenceClient,
    writer: Option<&ContractClient<C>>,
    request: AutoVerifyRequest<'_>,
) -> Result<Option<AutoVerification>, EvidenceError> {
    let Some(image) = request.image else {
        tracing::info!(job_id = %request.job_id, "no evidence image, skipping auto-verification");
        return Ok(None);
    };

    let description = format!(
        "Job Description: {}\n\nDeliverable Submitted: {}",
        request.job_description, request.deliverable
    );

    let answer = evidence
        .verify(request.job_title, &description, image)
        .await?;
    let verdict = parse_verdict(&answer);
    tracing::info!(
        job_id = %request.job_id,
        verified = verdict.verified,
        explanation = %verdict.explanation,
        "auto-verification verdict"
    );

    let mut outcome = AutoVerification {
        verdict,
        verified_on_chain: false,
        tx_hash: None,
    };

    let submission_id = request.submission_id.filter(|id| id.0 != 0);
    if let (true, Some(submission_id), Some(writer)) =
        (outcome.verdict.verified, submission_id, writer)
    {
        match writer.verify_work_by_ai(submission_id, true).await {
            Ok(tx_hash) => {
                outcome.verified_on_chain = true;
                outcome.tx_hash = Some(tx_hash);
            }
            Err(e) => {
                tracing::warn!(%submission_id, error = %e, "on-chain verification failed");
            }
        }
    }

    Ok(Some(outcome))
}
