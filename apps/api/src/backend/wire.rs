//! Request and response shapes of the recruiting REST backend, and their
//! conversion into domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::invitation::{
    CandidateSummary, Invitation, InvitationId, InvitationStatus, JobSummary,
};
use crate::models::lenient_datetime;
use crate::models::recommendation::{
    CandidateCard, JobCard, Recommendation, RecommendationItem, SubjectId, UnlockLevel,
};

/// Recommendation lists come either wrapped or as a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Envelope<T> {
    Wrapped { recommendations: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Envelope<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Envelope::Wrapped { recommendations } => recommendations,
            Envelope::Bare(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobRecommendation {
    job: JobCard,
    #[serde(default)]
    match_score: Option<f64>,
    #[serde(default)]
    match_reasons: Vec<String>,
    #[serde(default)]
    unlock_level: Option<UnlockLevel>,
}

impl From<JobRecommendation> for Recommendation {
    fn from(raw: JobRecommendation) -> Self {
        Recommendation::Job(RecommendationItem {
            subject: raw.job,
            match_score: raw.match_score.unwrap_or(0.0),
            match_reasons: raw.match_reasons,
            unlock_level: raw.unlock_level.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateRecommendation {
    candidate: CandidateCard,
    #[serde(default)]
    match_score: Option<f64>,
    #[serde(default)]
    match_reasons: Vec<String>,
    #[serde(default)]
    unlock_level: Option<UnlockLevel>,
}

impl From<CandidateRecommendation> for Recommendation {
    fn from(raw: CandidateRecommendation) -> Self {
        Recommendation::Candidate(RecommendationItem {
            subject: raw.candidate,
            match_score: raw.match_score.unwrap_or(0.0),
            match_reasons: raw.match_reasons,
            unlock_level: raw.unlock_level.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CandidateActionBody {
    pub candidate_id: SubjectId,
    pub job_id: SubjectId,
    pub action: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RecruiterActionBody<'a> {
    pub recruiter_id: SubjectId,
    pub candidate_id: SubjectId,
    pub job_id: SubjectId,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RespondBody {
    pub match_state_id: InvitationId,
    pub accept: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PendingAsks {
    #[serde(default)]
    pending_asks: Vec<PendingAsk>,
}

#[derive(Debug, Deserialize)]
struct PendingAsk {
    match_state_id: InvitationId,
    job: JobSummary,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime::deserialize")]
    asked_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime::deserialize")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    match_score: Option<f64>,
}

impl PendingAsks {
    pub(crate) fn into_invitations(self, candidate_id: SubjectId) -> Vec<Invitation> {
        self.pending_asks
            .into_iter()
            .map(|ask| Invitation {
                id: ask.match_state_id,
                job: ask.job,
                candidate: CandidateSummary {
                    id: candidate_id,
                    name: None,
                    headline: None,
                },
                message: ask.message,
                sent_at: ask.asked_at,
                expires_at: ask.expires_at,
                status: InvitationStatus::Pending,
                match_score: ask.match_score,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SentRequest {
    id: InvitationId,
    candidate: CandidateSummary,
    job: JobSummary,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime::deserialize")]
    sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    status: InvitationStatus,
    #[serde(default, deserialize_with = "lenient_datetime::deserialize")]
    expires_at: Option<DateTime<Utc>>,
}

impl From<SentRequest> for Invitation {
    fn from(raw: SentRequest) -> Self {
        Invitation {
            id: raw.id,
            job: raw.job,
            candidate: raw.candidate,
            message: raw.message,
            sent_at: raw.sent_at,
            expires_at: raw.expires_at,
            status: raw.status,
            match_score: None,
        }
    }
}

/// FastAPI-style error body: `{"detail": "..."}`, where detail may also be a
/// structured validation list.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    detail: Value,
}

impl ErrorBody {
    pub(crate) fn message(body: &str) -> String {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody {
                detail: Value::String(detail),
            }) => detail,
            Ok(ErrorBody { detail }) => detail.to_string(),
            Err(_) => body.to_string(),
        }
    }
}
