use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::wire::{
    CandidateActionBody, CandidateRecommendation, Envelope, ErrorBody, JobRecommendation,
    PendingAsks, RecruiterActionBody, RespondBody, SentRequest,
};
use super::{BackendError, MatchBackend, RecommendationQuery};
use crate::models::invitation::{Invitation, InvitationId};
use crate::models::match_state::{ActionRequest, ActorRole, MatchState};
use crate::models::recommendation::{Recommendation, SubjectId};

const MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// REST client for the recruiting backend.
///
/// Reads retry on 429 and 5xx with exponential backoff. Mutations are sent
/// exactly once: a retried LIKE or ASK_TO_APPLY could land twice.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
    backoff: Duration,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            backoff: DEFAULT_BACKOFF,
        })
    }

    #[cfg(test)]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, BackendError> {
        let mut last_error: Option<BackendError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.backoff * (1 << (attempt - 1));
                warn!(
                    "GET {} attempt {} failed, retrying after {}ms...",
                    path,
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.request(Method::GET, path).query(query).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(BackendError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Backend returned {} for GET {}: {}", status, path, body);
                last_error = Some(BackendError::Api {
                    status: status.as_u16(),
                    message: ErrorBody::message(&body),
                });
                continue;
            }
            if !status.is_success() {
                return Err(classify(response).await);
            }

            let body = response.text().await?;
            debug!("GET {} succeeded ({} bytes)", path, body.len());
            return serde_json::from_str(&body).map_err(BackendError::Parse);
        }

        Err(last_error.unwrap_or(BackendError::Unavailable {
            retries: MAX_RETRIES,
        }))
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<(), BackendError> {
        let response = self.request(Method::POST, path).json(body).send().await?;
        if !response.status().is_success() {
            return Err(classify(response).await);
        }
        debug!("POST {} succeeded", path);
        Ok(())
    }
}

/// Maps a non-success response onto the error taxonomy.
async fn classify(response: Response) -> BackendError {
    let status = response.status().as_u16();
    let message = ErrorBody::message(&response.text().await.unwrap_or_default());
    match status {
        404 => BackendError::NotFound(message),
        409 => BackendError::Conflict(message),
        400 | 422 if is_state_conflict(&message) => BackendError::Conflict(message),
        400 | 422 => BackendError::Rejected(message),
        _ => BackendError::Api { status, message },
    }
}

/// The backend reports resolved or expired invitations as plain 400s.
fn is_state_conflict(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("already responded") || lower.contains("expired")
}

#[async_trait]
impl MatchBackend for HttpBackend {
    async fn recommendations(
        &self,
        query: &RecommendationQuery,
    ) -> Result<Vec<Recommendation>, BackendError> {
        let params = [("top_n", query.limit.to_string()), ("offset", "0".to_string())];
        match (query.role, query.job_id) {
            (ActorRole::Candidate, _) => {
                let raw: Envelope<JobRecommendation> = self
                    .get_json("/candidates/me/recommendations", &params)
                    .await?;
                Ok(raw.into_vec().into_iter().map(Recommendation::from).collect())
            }
            (ActorRole::Recruiter, Some(job_id)) => {
                let raw: Envelope<CandidateRecommendation> = self
                    .get_json(&format!("/jobs/recommendations/{job_id}"), &params)
                    .await?;
                Ok(raw.into_vec().into_iter().map(Recommendation::from).collect())
            }
            (ActorRole::Recruiter, None) => Err(BackendError::Rejected(
                "Recruiter recommendations require a job id".to_string(),
            )),
        }
    }

    async fn match_action(&self, request: &ActionRequest) -> Result<(), BackendError> {
        match request.role {
            ActorRole::Candidate => {
                let body = CandidateActionBody {
                    candidate_id: request.actor_id,
                    job_id: request.job_id,
                    action: request.action.as_str(),
                };
                self.post_json("/matches/candidate/action", &body).await
            }
            ActorRole::Recruiter => {
                let body = RecruiterActionBody {
                    recruiter_id: request.actor_id,
                    candidate_id: request.subject_id,
                    job_id: request.job_id,
                    action: request.action.as_str(),
                    message: request.message.as_deref(),
                };
                self.post_json("/matches/recruiter/action", &body).await
            }
        }
    }

    async fn pending_invitations(
        &self,
        candidate_id: SubjectId,
    ) -> Result<Vec<Invitation>, BackendError> {
        let raw: PendingAsks = self
            .get_json(&format!("/matches/candidate/pending-asks/{candidate_id}"), &[])
            .await?;
        Ok(raw.into_invitations(candidate_id))
    }

    async fn respond_invitation(
        &self,
        invitation_id: InvitationId,
        accept: bool,
    ) -> Result<(), BackendError> {
        let body = RespondBody {
            match_state_id: invitation_id,
            accept,
        };
        self.post_json("/matches/candidate/respond-to-ask", &body).await
    }

    async fn sent_invitations(
        &self,
        recruiter_id: SubjectId,
    ) -> Result<Vec<Invitation>, BackendError> {
        let raw: Vec<SentRequest> = self
            .get_json(
                "/matches/recruiter/sent-requests",
                &[("recruiter_id", recruiter_id.to_string())],
            )
            .await?;
        Ok(raw.into_iter().map(Invitation::from).collect())
    }

    async fn match_state(
        &self,
        candidate_id: SubjectId,
        job_id: SubjectId,
    ) -> Result<Option<MatchState>, BackendError> {
        match self
            .get_json(&format!("/matches/state/{candidate_id}/{job_id}"), &[])
            .await
        {
            Err(BackendError::NotFound(_)) => Ok(None),
            other => other,
        }
    }
}
