use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::invitations::sent::{build_sent_view, SentInvitationsView};
use crate::invitations::workflow::RespondOutcome;
use crate::models::invitation::{Invitation, InvitationId, InvitationStatus};
use crate::models::match_state::MatchState;
use crate::models::recommendation::SubjectId;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CandidateQuery {
    pub candidate_id: SubjectId,
}

#[derive(Deserialize)]
pub struct SentQuery {
    pub recruiter_id: SubjectId,
    #[serde(default)]
    pub status: Option<InvitationStatus>,
}

#[derive(Deserialize)]
pub struct BadgeQuery {
    #[serde(default)]
    pub candidate_id: Option<SubjectId>,
    #[serde(default)]
    pub recruiter_id: Option<SubjectId>,
}

#[derive(Deserialize)]
pub struct RespondRequest {
    pub candidate_id: SubjectId,
    pub accept: bool,
}

#[derive(Serialize)]
pub struct PendingInvitation {
    #[serde(flatten)]
    pub invitation: Invitation,
    pub summary: String,
}

#[derive(Serialize)]
pub struct PendingResponse {
    pub candidate_id: SubjectId,
    pub count: usize,
    pub invitations: Vec<PendingInvitation>,
}

#[derive(Serialize)]
pub struct RespondResponse {
    #[serde(flatten)]
    pub outcome: RespondOutcome,
    /// Open stacks of the candidate that were re-read after an accept.
    pub refreshed_stacks: usize,
}

#[derive(Serialize, Default)]
pub struct BadgeCounts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_invitations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_sent: Option<usize>,
}

fn summary(invitation: &Invitation) -> String {
    let company = invitation
        .job
        .company_name
        .as_deref()
        .unwrap_or("A recruiter");
    format!("{company} invited you to apply for {}", invitation.job.title)
}

/// GET /api/v1/invitations/pending
pub async fn handle_pending(
    State(state): State<AppState>,
    Query(params): Query<CandidateQuery>,
) -> Result<Json<PendingResponse>, AppError> {
    let invitations = state.invitations.load_pending(params.candidate_id).await?;
    let invitations: Vec<PendingInvitation> = invitations
        .into_iter()
        .map(|invitation| PendingInvitation {
            summary: summary(&invitation),
            invitation,
        })
        .collect();
    Ok(Json(PendingResponse {
        candidate_id: params.candidate_id,
        count: invitations.len(),
        invitations,
    }))
}

/// POST /api/v1/invitations/:id/respond
pub async fn handle_respond(
    State(state): State<AppState>,
    Path(id): Path<InvitationId>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<RespondResponse>, AppError> {
    let outcome = state
        .invitations
        .respond(req.candidate_id, id, req.accept)
        .await?;
    let refreshed_stacks = if outcome.refresh_required {
        state.sessions.refresh_candidate(req.candidate_id).await
    } else {
        0
    };
    Ok(Json(RespondResponse {
        outcome,
        refreshed_stacks,
    }))
}

/// GET /api/v1/invitations/sent
pub async fn handle_sent(
    State(state): State<AppState>,
    Query(params): Query<SentQuery>,
) -> Result<Json<SentInvitationsView>, AppError> {
    let invitations = state.backend.sent_invitations(params.recruiter_id).await?;
    Ok(Json(build_sent_view(invitations, params.status, Utc::now())))
}

/// GET /api/v1/badges
pub async fn handle_badges(
    State(state): State<AppState>,
    Query(params): Query<BadgeQuery>,
) -> Result<Json<BadgeCounts>, AppError> {
    if params.candidate_id.is_none() && params.recruiter_id.is_none() {
        return Err(AppError::Validation(
            "candidate_id or recruiter_id is required".to_string(),
        ));
    }
    let mut counts = BadgeCounts::default();
    if let Some(candidate_id) = params.candidate_id {
        counts.pending_invitations = Some(state.invitations.pending_count(candidate_id).await?);
    }
    if let Some(recruiter_id) = params.recruiter_id {
        let sent = state.backend.sent_invitations(recruiter_id).await?;
        counts.pending_sent = Some(build_sent_view(sent, None, Utc::now()).counts.pending);
    }
    Ok(Json(counts))
}

/// GET /api/v1/matches/:candidate_id/:job_id
pub async fn handle_match_state(
    State(state): State<AppState>,
    Path((candidate_id, job_id)): Path<(SubjectId, SubjectId)>,
) -> Result<Json<MatchState>, AppError> {
    state
        .backend
        .match_state(candidate_id, job_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No match state for candidate {candidate_id} and job {job_id}"
            ))
        })
}
