//! Recruiting backend: the single point of entry for every call to the REST
//! service that owns recommendations, match state and invitations.
//!
//! `AppState` holds an `Arc<dyn MatchBackend>`: `HttpBackend` in production,
//! `InMemoryBackend` in local mode and tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::invitation::{Invitation, InvitationId};
use crate::models::match_state::{ActionRequest, ActorRole, MatchState};
use crate::models::recommendation::{Recommendation, SubjectId};

pub mod http;
pub mod memory;
mod wire;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Backend unavailable after {retries} retries")]
    Unavailable { retries: u32 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Parameters of `GET recommendations(forRole, limit)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationQuery {
    pub role: ActorRole,
    /// Candidate id for candidates; recruiter id for recruiters.
    pub actor_id: SubjectId,
    /// The job a recruiter is reviewing candidates for.
    pub job_id: Option<SubjectId>,
    pub limit: usize,
}

#[async_trait]
pub trait MatchBackend: Send + Sync {
    /// Ordered, scored recommendations for the actor.
    async fn recommendations(
        &self,
        query: &RecommendationQuery,
    ) -> Result<Vec<Recommendation>, BackendError>;

    async fn match_action(&self, request: &ActionRequest) -> Result<(), BackendError>;

    async fn pending_invitations(
        &self,
        candidate_id: SubjectId,
    ) -> Result<Vec<Invitation>, BackendError>;

    async fn respond_invitation(
        &self,
        invitation_id: InvitationId,
        accept: bool,
    ) -> Result<(), BackendError>;

    async fn sent_invitations(&self, recruiter_id: SubjectId)
        -> Result<Vec<Invitation>, BackendError>;

    async fn match_state(
        &self,
        candidate_id: SubjectId,
        job_id: SubjectId,
    ) -> Result<Option<MatchState>, BackendError>;
}
