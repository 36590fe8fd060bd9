use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::recommendation::{SubjectId, UnlockLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Candidate,
    Recruiter,
}

/// A committed decision on a card, as sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchAction {
    Like,
    Pass,
    Apply,
    AskToApply,
}

impl MatchAction {
    pub fn allowed_for(self, role: ActorRole) -> bool {
        match role {
            ActorRole::Candidate => matches!(self, Self::Like | Self::Pass | Self::Apply),
            ActorRole::Recruiter => matches!(self, Self::Like | Self::Pass | Self::AskToApply),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "LIKE",
            Self::Pass => "PASS",
            Self::Apply => "APPLY",
            Self::AskToApply => "ASK_TO_APPLY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateAction {
    #[default]
    None,
    Like,
    Pass,
    Apply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecruiterAction {
    #[default]
    None,
    Like,
    Pass,
    AskToApply,
}

/// One action as sent to the backend. For a candidate the subject is the job
/// itself; for a recruiter it is the candidate being evaluated for `job_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub role: ActorRole,
    pub actor_id: SubjectId,
    pub subject_id: SubjectId,
    pub job_id: SubjectId,
    pub action: MatchAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionRequest {
    pub fn candidate_id(&self) -> SubjectId {
        match self.role {
            ActorRole::Candidate => self.actor_id,
            ActorRole::Recruiter => self.subject_id,
        }
    }
}

/// Server-owned interaction record for one (candidate, job) pair.
/// Read for display only; this service never writes it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub id: i64,
    pub candidate_id: SubjectId,
    #[serde(alias = "job_post_id")]
    pub job_id: SubjectId,
    #[serde(default)]
    pub candidate_action: CandidateAction,
    #[serde(default)]
    pub recruiter_action: RecruiterAction,
    #[serde(default)]
    pub unlock_level: UnlockLevel,
    #[serde(default)]
    pub initial_match_score: Option<f64>,
    #[serde(default, deserialize_with = "crate::models::lenient_datetime::deserialize")]
    pub updated_at: Option<DateTime<Utc>>,
}
