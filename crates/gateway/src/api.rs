use std::sync::Arc;

use alloy::primitives::Address;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use contract_client::EscrowChain;
use escrow_core::enums::VerificationState;
use escrow_core::format::format_reward;
use escrow_core::ids::{JobId, SubmissionId};
use escrow_core::job::{Application, Job, Submission};
use indexer::{ReadError, ScanStatus};
use serde::{Deserialize, Serialize};

use crate::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn router<C: EscrowChain + 'static>(state: Arc<AppState<C>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs", get(list_jobs::<C>))
        .route("/jobs/{id}", get(get_job::<C>))
        .route("/jobs/{id}/applications", get(job_applications::<C>))
        .route("/jobs/{id}/submission", get(job_submission::<C>))
        .route("/submissions/{id}", get(get_submission::<C>))
        .route("/users/{address}/jobs", get(user_jobs::<C>))
        .route("/users/{address}/applications", get(user_applications::<C>))
        .route("/users/{address}/submissions", get(user_submissions::<C>))
        .route("/settings", get(settings::<C>))
        .route("/owner/{address}", get(owner::<C>))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Serialize, Deserialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    /// Reward in ether, four decimals.
    pub reward_eth: String,
    pub status_label: String,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            reward_eth: format_reward(job.reward),
            status_label: job.status.label().to_string(),
            job,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    pub verification: VerificationState,
}

impl From<Submission> for SubmissionView {
    fn from(submission: Submission) -> Self {
        Self {
            verification: submission.verification(),
            submission,
        }
    }
}

#[derive(Serialize)]
pub struct JobsResponse {
    pub status: ScanStatus,
    pub progress: String,
    pub watermark: Option<u64>,
    pub jobs: Vec<JobView>,
}

#[derive(Serialize, Deserialize)]
pub struct SettingsResponse {
    pub platform_fee: f64,
    pub ai_release_percentage: f64,
}

#[derive(Serialize, Deserialize)]
pub struct OwnerResponse {
    pub address: Address,
    pub is_owner: bool,
}

#[derive(Deserialize)]
pub struct JobsQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Deserialize)]
pub struct SubmissionsQuery {
    /// Only submissions the AI verifier approved.
    #[serde(default)]
    pub verified: bool,
}

fn upstream(e: ReadError) -> (StatusCode, String) {
    (StatusCode::BAD_GATEWAY, e.to_string())
}

fn not_found(what: String) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}

fn parse_address(raw: &str) -> Result<Address, (StatusCode, String)> {
    raw.parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid address {raw}: {e}")))
}

async fn list_jobs<C: EscrowChain + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Query(query): Query<JobsQuery>,
) -> Json<JobsResponse> {
    let snapshot = state.reader.list_jobs(query.refresh);

    Json(JobsResponse {
        status: snapshot.status,
        progress: snapshot.progress.clone(),
        watermark: snapshot.watermark,
        jobs: snapshot.newest_first().into_iter().map(JobView::from).collect(),
    })
}

async fn get_job<C: EscrowChain + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(id): Path<u64>,
) -> ApiResult<JobView> {
    let job = state
        .reader
        .get_job(JobId(id))
        .await
        .map_err(upstream)?
        .ok_or_else(|| not_found(format!("job {id}")))?;

    Ok(Json(job.into()))
}

async fn job_applications<C: EscrowChain + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(id): Path<u64>,
) -> ApiResult<Vec<Application>> {
    let applications = state
        .reader
        .list_applications_for_job(JobId(id))
        .await
        .map_err(upstream)?;

    Ok(Json(applications))
}

async fn job_submission<C: EscrowChain + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(id): Path<u64>,
) -> ApiResult<SubmissionView> {
    let submission = state
        .reader
        .get_job_submission(JobId(id))
        .await
        .map_err(upstream)?
        .ok_or_else(|| not_found(format!("submission for job {id}")))?;

    Ok(Json(submission.into()))
}

async fn get_submission<C: EscrowChain + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(id): Path<u64>,
) -> ApiResult<SubmissionView> {
    let submission = state
        .reader
        .get_submission(SubmissionId(id))
        .await
        .map_err(upstream)?
        .ok_or_else(|| not_found(format!("submission {id}")))?;

    Ok(Json(submission.into()))
}

async fn user_jobs<C: EscrowChain + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(address): Path<String>,
) -> ApiResult<Vec<JobView>> {
    let poster = parse_address(&address)?;
    let jobs = state
        .reader
        .list_user_posted_jobs(poster)
        .await
        .map_err(upstream)?;

    Ok(Json(jobs.into_iter().map(JobView::from).collect()))
}

async fn user_applications<C: EscrowChain + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(address): Path<String>,
) -> ApiResult<Vec<Application>> {
    let freelancer = parse_address(&address)?;
    let applications = state
        .reader
        .list_user_applications(freelancer)
        .await
        .map_err(upstream)?;

    Ok(Json(applications))
}

async fn user_submissions<C: EscrowChain + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(address): Path<String>,
    Query(query): Query<SubmissionsQuery>,
) -> ApiResult<Vec<SubmissionView>> {
    let freelancer = parse_address(&address)?;
    let submissions = if query.verified {
        state.reader.list_ai_verified_submissions(freelancer).await
    } else {
        state.reader.list_user_submissions(freelancer).await
    }
    .map_err(upstream)?;

    Ok(Json(
        submissions.into_iter().map(SubmissionView::from).collect(),
    ))
}

async fn settings<C: EscrowChain + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> Json<SettingsResponse> {
    let (platform_fee, ai_release_percentage) = tokio::join!(
        state.reader.platform_fee(),
        state.reader.ai_release_percentage()
    );

    Json(SettingsResponse {
        platform_fee,
        ai_release_percentage,
    })
}

async fn owner<C: EscrowChain + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(address): Path<String>,
) -> ApiResult<OwnerResponse> {
    let address = parse_address(&address)?;
    let is_owner = state.reader.is_owner(address).await;

    Ok(Json(OwnerResponse { address, is_owner }))
}
