//! In-memory recruiting backend.
//!
//! Holds the same semantics the REST service applies: unlock level derived
//! from both sides' actions, ask-to-apply records with a TTL, and exactly-once
//! invitation responses. Used in local mode (no `BACKEND_URL`) and by tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;

use super::{BackendError, MatchBackend, RecommendationQuery};
use crate::invitations::InvitationError;
use crate::models::invitation::{
    CandidateSummary, Invitation, InvitationId, InvitationStatus, JobSummary,
};
use crate::models::match_state::{
    ActionRequest, ActorRole, CandidateAction, MatchAction, MatchState, RecruiterAction,
};
use crate::models::recommendation::{
    CandidateCard, JobCard, Recommendation, RecommendationItem, SubjectId, UnlockLevel,
};

#[derive(Debug, Clone)]
struct AskRecord {
    recruiter_id: SubjectId,
    message: Option<String>,
    sent_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    status: InvitationStatus,
}

#[derive(Debug, Clone)]
struct MatchRecord {
    id: i64,
    candidate_id: SubjectId,
    job_id: SubjectId,
    candidate_action: CandidateAction,
    recruiter_action: RecruiterAction,
    initial_match_score: Option<f64>,
    updated_at: DateTime<Utc>,
    ask: Option<AskRecord>,
}

impl MatchRecord {
    /// APPLY or an accepted ask → FULL, mutual LIKE → PARTIAL, else PREVIEW.
    fn unlock_level(&self) -> UnlockLevel {
        let accepted = matches!(
            self.ask.as_ref().map(|a| a.status),
            Some(InvitationStatus::Accepted)
        );
        if self.candidate_action == CandidateAction::Apply || accepted {
            UnlockLevel::Full
        } else if self.candidate_action == CandidateAction::Like
            && self.recruiter_action == RecruiterAction::Like
        {
            UnlockLevel::Partial
        } else {
            UnlockLevel::Preview
        }
    }

    fn to_match_state(&self) -> MatchState {
        MatchState {
            id: self.id,
            candidate_id: self.candidate_id,
            job_id: self.job_id,
            candidate_action: self.candidate_action,
            recruiter_action: self.recruiter_action,
            unlock_level: self.unlock_level(),
            initial_match_score: self.initial_match_score,
            updated_at: Some(self.updated_at),
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    job_feeds: HashMap<SubjectId, Vec<RecommendationItem<JobCard>>>,
    candidate_feeds: HashMap<SubjectId, Vec<RecommendationItem<CandidateCard>>>,
    jobs: HashMap<SubjectId, JobSummary>,
    candidates: HashMap<SubjectId, CandidateSummary>,
    matches: Vec<MatchRecord>,
    applications: HashSet<(SubjectId, SubjectId)>,
    actions: Vec<ActionRequest>,
    next_id: i64,
    offline: bool,
}

impl Store {
    fn record(&self, candidate_id: SubjectId, job_id: SubjectId) -> Option<&MatchRecord> {
        self.matches
            .iter()
            .find(|m| m.candidate_id == candidate_id && m.job_id == job_id)
    }

    fn record_mut_or_create(
        &mut self,
        candidate_id: SubjectId,
        job_id: SubjectId,
        score: Option<f64>,
    ) -> &mut MatchRecord {
        let index = match self
            .matches
            .iter()
            .position(|m| m.candidate_id == candidate_id && m.job_id == job_id)
        {
            Some(index) => index,
            None => {
                self.next_id += 1;
                self.matches.push(MatchRecord {
                    id: self.next_id,
                    candidate_id,
                    job_id,
                    candidate_action: CandidateAction::None,
                    recruiter_action: RecruiterAction::None,
                    initial_match_score: score,
                    updated_at: Utc::now(),
                    ask: None,
                });
                self.matches.len() - 1
            }
        };
        &mut self.matches[index]
    }

    fn score_for(&self, candidate_id: SubjectId, job_id: SubjectId) -> Option<f64> {
        let from_job_feed = self
            .job_feeds
            .get(&candidate_id)
            .and_then(|feed| feed.iter().find(|i| i.subject.id == job_id))
            .map(|i| i.match_score);
        from_job_feed.or_else(|| {
            self.candidate_feeds
                .get(&job_id)
                .and_then(|feed| feed.iter().find(|i| i.subject.id == candidate_id))
                .map(|i| i.match_score)
        })
    }

    fn to_invitation(&self, record: &MatchRecord, ask: &AskRecord) -> Invitation {
        Invitation {
            id: record.id,
            job: self.jobs.get(&record.job_id).cloned().unwrap_or(JobSummary {
                id: record.job_id,
                title: format!("Job {}", record.job_id),
                company_name: None,
                location: None,
            }),
            candidate: self
                .candidates
                .get(&record.candidate_id)
                .cloned()
                .unwrap_or(CandidateSummary {
                    id: record.candidate_id,
                    name: None,
                    headline: None,
                }),
            message: ask.message.clone(),
            sent_at: Some(ask.sent_at),
            expires_at: Some(ask.expires_at),
            status: ask.status,
            match_score: record.initial_match_score,
        }
    }

    fn ensure_online(&self) -> Result<(), BackendError> {
        if self.offline {
            return Err(BackendError::Api {
                status: 503,
                message: "Backend offline".to_string(),
            });
        }
        Ok(())
    }
}

/// Local-mode fixture file. Feeds are keyed by the candidate or job they
/// are recommended to; JSON object keys carry the ids as strings.
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub job_feeds: HashMap<SubjectId, Vec<RecommendationItem<JobCard>>>,
    #[serde(default)]
    pub candidate_feeds: HashMap<SubjectId, Vec<RecommendationItem<CandidateCard>>>,
}

pub struct InMemoryBackend {
    store: Mutex<Store>,
    invitation_ttl: Duration,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(30)
    }
}

impl InMemoryBackend {
    pub fn new(invitation_ttl_days: i64) -> Self {
        Self {
            store: Mutex::new(Store::default()),
            invitation_ttl: Duration::days(invitation_ttl_days),
        }
    }

    /// Loads every feed in `seed`. Returns the number of feeds loaded.
    pub async fn load_seed(&self, seed: Seed) -> usize {
        let feeds = seed.job_feeds.len() + seed.candidate_feeds.len();
        for (candidate_id, items) in seed.job_feeds {
            self.seed_job_feed(candidate_id, items).await;
        }
        for (job_id, items) in seed.candidate_feeds {
            self.seed_candidate_feed(job_id, items).await;
        }
        info!("Loaded {feeds} seed feeds");
        feeds
    }

    /// Jobs recommended to `candidate_id`, in ranked order.
    pub async fn seed_job_feed(
        &self,
        candidate_id: SubjectId,
        items: Vec<RecommendationItem<JobCard>>,
    ) {
        let mut store = self.store.lock().await;
        for item in &items {
            store.jobs.insert(
                item.subject.id,
                JobSummary {
                    id: item.subject.id,
                    title: item.subject.title.clone(),
                    company_name: item.subject.company_name.clone(),
                    location: item.subject.location.clone(),
                },
            );
        }
        store.job_feeds.insert(candidate_id, items);
    }

    /// Candidates recommended for `job_id`, in ranked order.
    pub async fn seed_candidate_feed(
        &self,
        job_id: SubjectId,
        items: Vec<RecommendationItem<CandidateCard>>,
    ) {
        let mut store = self.store.lock().await;
        for item in &items {
            store.candidates.insert(
                item.subject.id,
                CandidateSummary {
                    id: item.subject.id,
                    name: Some(item.subject.name.clone()),
                    headline: item.subject.headline.clone(),
                },
            );
        }
        store.candidate_feeds.insert(job_id, items);
    }

    /// While offline every call fails with a 503.
    #[cfg(test)]
    pub async fn set_offline(&self, offline: bool) {
        self.store.lock().await.offline = offline;
    }

    /// Every action accepted so far, in arrival order.
    #[cfg(test)]
    pub async fn actions(&self) -> Vec<ActionRequest> {
        self.store.lock().await.actions.clone()
    }

    #[cfg(test)]
    pub async fn has_application(&self, candidate_id: SubjectId, job_id: SubjectId) -> bool {
        self.store
            .lock()
            .await
            .applications
            .contains(&(candidate_id, job_id))
    }

    /// Moves an invitation's expiry, for exercising time-outs.
    #[cfg(test)]
    pub async fn set_invitation_expiry(&self, invitation_id: InvitationId, expires_at: DateTime<Utc>) {
        let mut store = self.store.lock().await;
        if let Some(ask) = store
            .matches
            .iter_mut()
            .find(|m| m.id == invitation_id)
            .and_then(|m| m.ask.as_mut())
        {
            ask.expires_at = expires_at;
        }
    }
}

#[async_trait]
impl MatchBackend for InMemoryBackend {
    async fn recommendations(
        &self,
        query: &RecommendationQuery,
    ) -> Result<Vec<Recommendation>, BackendError> {
        let store = self.store.lock().await;
        store.ensure_online()?;

        let items: Vec<Recommendation> = match (query.role, query.job_id) {
            (ActorRole::Candidate, _) => store
                .job_feeds
                .get(&query.actor_id)
                .into_iter()
                .flatten()
                .filter_map(|item| {
                    let record = store.record(query.actor_id, item.subject.id);
                    if record.is_some_and(|r| r.candidate_action != CandidateAction::None) {
                        return None;
                    }
                    let mut item = item.clone();
                    item.unlock_level = record.map(MatchRecord::unlock_level).unwrap_or_default();
                    Some(Recommendation::Job(item))
                })
                .collect(),
            (ActorRole::Recruiter, Some(job_id)) => store
                .candidate_feeds
                .get(&job_id)
                .into_iter()
                .flatten()
                .filter_map(|item| {
                    let record = store.record(item.subject.id, job_id);
                    if record.is_some_and(|r| r.recruiter_action != RecruiterAction::None) {
                        return None;
                    }
                    let mut item = item.clone();
                    item.unlock_level = record.map(MatchRecord::unlock_level).unwrap_or_default();
                    Some(Recommendation::Candidate(item))
                })
                .collect(),
            (ActorRole::Recruiter, None) => {
                return Err(BackendError::Rejected(
                    "Recruiter recommendations require a job id".to_string(),
                ))
            }
        };

        Ok(items.into_iter().take(query.limit).collect())
    }

    async fn match_action(&self, request: &ActionRequest) -> Result<(), BackendError> {
        let mut store = self.store.lock().await;
        store.ensure_online()?;
        if !request.action.allowed_for(request.role) {
            return Err(BackendError::Rejected(format!(
                "Invalid action {} for {:?}",
                request.action.as_str(),
                request.role
            )));
        }

        let candidate_id = request.candidate_id();
        let score = store.score_for(candidate_id, request.job_id);
        let now = Utc::now();
        let ttl = self.invitation_ttl;
        let record = store.record_mut_or_create(candidate_id, request.job_id, score);
        record.updated_at = now;

        match (request.role, request.action) {
            (ActorRole::Candidate, action) => {
                record.candidate_action = match action {
                    MatchAction::Like => CandidateAction::Like,
                    MatchAction::Pass => CandidateAction::Pass,
                    _ => CandidateAction::Apply,
                };
            }
            (ActorRole::Recruiter, action) => {
                record.recruiter_action = match action {
                    MatchAction::Like => RecruiterAction::Like,
                    MatchAction::Pass => RecruiterAction::Pass,
                    _ => RecruiterAction::AskToApply,
                };
                if action == MatchAction::AskToApply {
                    record.ask = Some(AskRecord {
                        recruiter_id: request.actor_id,
                        message: request.message.clone(),
                        sent_at: now,
                        expires_at: now + ttl,
                        status: InvitationStatus::Pending,
                    });
                    info!(
                        "Invitation sent: recruiter {} -> candidate {} for job {} ({} chars)",
                        request.actor_id,
                        candidate_id,
                        request.job_id,
                        request.message.as_deref().map_or(0, str::len)
                    );
                }
            }
        }

        if request.role == ActorRole::Candidate && request.action == MatchAction::Apply {
            store.applications.insert((candidate_id, request.job_id));
        }
        store.actions.push(request.clone());
        Ok(())
    }

    async fn pending_invitations(
        &self,
        candidate_id: SubjectId,
    ) -> Result<Vec<Invitation>, BackendError> {
        let store = self.store.lock().await;
        store.ensure_online()?;
        let now = Utc::now();
        Ok(store
            .matches
            .iter()
            .filter(|m| m.candidate_id == candidate_id)
            .filter_map(|m| m.ask.as_ref().map(|ask| store.to_invitation(m, ask)))
            .filter(|inv| inv.observed_status(now) == InvitationStatus::Pending)
            .collect())
    }

    async fn respond_invitation(
        &self,
        invitation_id: InvitationId,
        accept: bool,
    ) -> Result<(), BackendError> {
        let mut store = self.store.lock().await;
        store.ensure_online()?;

        let index = store
            .matches
            .iter()
            .position(|m| m.id == invitation_id && m.ask.is_some())
            .ok_or_else(|| BackendError::NotFound(format!("Invitation {invitation_id} not found")))?;
        let mut invitation = match &store.matches[index].ask {
            Some(ask) => store.to_invitation(&store.matches[index], ask),
            None => return Err(BackendError::NotFound(format!("Invitation {invitation_id} not found"))),
        };

        let outcome = invitation.resolve(accept, Utc::now());
        let record = &mut store.matches[index];
        let status = match outcome {
            Ok(status) => status,
            Err(InvitationError::Expired(_)) => {
                if let Some(ask) = record.ask.as_mut() {
                    ask.status = InvitationStatus::Expired;
                }
                return Err(BackendError::Conflict("This invitation has expired".to_string()));
            }
            Err(_) => {
                return Err(BackendError::Conflict(
                    "Already responded to this invitation".to_string(),
                ))
            }
        };

        if let Some(ask) = record.ask.as_mut() {
            ask.status = status;
        }
        record.updated_at = Utc::now();
        let (candidate_id, job_id) = (record.candidate_id, record.job_id);
        if accept {
            // Accepting an invitation is applying.
            record.candidate_action = CandidateAction::Apply;
            store.applications.insert((candidate_id, job_id));
            info!("Invitation {invitation_id} accepted: candidate {candidate_id} applied to job {job_id}");
        } else {
            info!("Invitation {invitation_id} declined by candidate {candidate_id}");
        }
        Ok(())
    }

    async fn sent_invitations(
        &self,
        recruiter_id: SubjectId,
    ) -> Result<Vec<Invitation>, BackendError> {
        let store = self.store.lock().await;
        store.ensure_online()?;
        let now = Utc::now();
        let mut sent: Vec<Invitation> = store
            .matches
            .iter()
            .filter_map(|m| {
                m.ask
                    .as_ref()
                    .filter(|ask| ask.recruiter_id == recruiter_id)
                    .map(|ask| {
                        let mut inv = store.to_invitation(m, ask);
                        inv.status = inv.observed_status(now);
                        inv
                    })
            })
            .collect();
        sent.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(sent)
    }

    async fn match_state(
        &self,
        candidate_id: SubjectId,
        job_id: SubjectId,
    ) -> Result<Option<MatchState>, BackendError> {
        let store = self.store.lock().await;
        store.ensure_online()?;
        Ok(store
            .record(candidate_id, job_id)
            .map(MatchRecord::to_match_state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recommendation::fixtures::{candidate_item, job_item};
    use crate::models::recommendation::Identified;

    fn action(
        role: ActorRole,
        actor: SubjectId,
        subject: SubjectId,
        job: SubjectId,
        action: MatchAction,
    ) -> ActionRequest {
        ActionRequest {
            role,
            actor_id: actor,
            subject_id: subject,
            job_id: job,
            action,
            message: None,
        }
    }

    async fn seeded() -> InMemoryBackend {
        let backend = InMemoryBackend::default();
        backend.seed_job_feed(1, vec![job_item(100, 64.0), job_item(101, 64.0)]).await;
        backend
            .seed_candidate_feed(100, vec![candidate_item(1), candidate_item(2)])
            .await;
        backend
    }

    fn recruiter_query() -> RecommendationQuery {
        RecommendationQuery {
            role: ActorRole::Recruiter,
            actor_id: 9,
            job_id: Some(100),
            limit: 10,
        }
    }

    #[tokio::test]
    async fn test_load_seed_from_json() {
        let seed: Seed = serde_json::from_str(
            r#"{
                "job_feeds": {
                    "1": [{
                        "subject": {"id": 100, "title": "Backend Engineer", "company_name": "Acme"},
                        "match_score": 81.0,
                        "match_reasons": ["Rust"]
                    }]
                },
                "candidate_feeds": {
                    "100": [{
                        "subject": {"id": 1, "name": "Ada", "primary_role": "Engineer"},
                        "match_score": 77.5
                    }]
                }
            }"#,
        )
        .unwrap();

        let backend = InMemoryBackend::default();
        assert_eq!(backend.load_seed(seed).await, 2);

        let jobs = backend
            .recommendations(&RecommendationQuery {
                role: ActorRole::Candidate,
                actor_id: 1,
                job_id: None,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(jobs.iter().map(|i| i.id()).collect::<Vec<_>>(), vec![100]);

        let candidates = backend.recommendations(&recruiter_query()).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(matches!(
            &candidates[0],
            Recommendation::Candidate(item) if item.unlock_level == UnlockLevel::Preview
        ));
    }

    #[tokio::test]
    async fn test_mutual_like_raises_unlock_to_partial() {
        let backend = seeded().await;
        backend
            .match_action(&action(ActorRole::Candidate, 1, 100, 100, MatchAction::Like))
            .await
            .unwrap();

        let state = backend.match_state(1, 100).await.unwrap().unwrap();
        assert_eq!(state.unlock_level, UnlockLevel::Preview);

        backend
            .match_action(&action(ActorRole::Recruiter, 9, 1, 100, MatchAction::Like))
            .await
            .unwrap();
        let state = backend.match_state(1, 100).await.unwrap().unwrap();
        assert_eq!(state.unlock_level, UnlockLevel::Partial);
    }

    #[tokio::test]
    async fn test_acted_items_leave_the_feed() {
        let backend = seeded().await;
        backend
            .match_action(&action(ActorRole::Recruiter, 9, 1, 100, MatchAction::Pass))
            .await
            .unwrap();
        let items = backend.recommendations(&recruiter_query()).await.unwrap();
        assert_eq!(items.iter().map(|i| i.id()).collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn test_apply_creates_application_and_full_unlock() {
        let backend = seeded().await;
        backend
            .match_action(&action(ActorRole::Candidate, 1, 101, 101, MatchAction::Apply))
            .await
            .unwrap();
        assert!(backend.has_application(1, 101).await);
        let state = backend.match_state(1, 101).await.unwrap().unwrap();
        assert_eq!(state.unlock_level, UnlockLevel::Full);
        assert_eq!(state.initial_match_score, Some(64.0));
    }

    #[tokio::test]
    async fn test_invalid_action_for_role_is_rejected() {
        let backend = seeded().await;
        let err = backend
            .match_action(&action(ActorRole::Candidate, 1, 100, 100, MatchAction::AskToApply))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_respond_twice_is_conflict() {
        let backend = seeded().await;
        let mut ask = action(ActorRole::Recruiter, 9, 2, 100, MatchAction::AskToApply);
        ask.message = Some("Let's talk".to_string());
        backend.match_action(&ask).await.unwrap();

        let pending = backend.pending_invitations(2).await.unwrap();
        assert_eq!(pending.len(), 1);
        let id = pending[0].id;

        backend.respond_invitation(id, false).await.unwrap();
        let err = backend.respond_invitation(id, true).await.unwrap_err();
        assert!(matches!(err, BackendError::Conflict(_)));

        let sent = backend.sent_invitations(9).await.unwrap();
        assert_eq!(sent[0].status, InvitationStatus::Declined);
        assert!(!backend.has_application(2, 100).await);
    }

    #[tokio::test]
    async fn test_expired_invitation_cannot_be_accepted() {
        let backend = seeded().await;
        backend
            .match_action(&action(ActorRole::Recruiter, 9, 2, 100, MatchAction::AskToApply))
            .await
            .unwrap();
        let id = backend.pending_invitations(2).await.unwrap()[0].id;
        backend
            .set_invitation_expiry(id, Utc::now() - Duration::hours(1))
            .await;

        assert!(backend.pending_invitations(2).await.unwrap().is_empty());
        let err = backend.respond_invitation(id, true).await.unwrap_err();
        assert!(matches!(err, BackendError::Conflict(_)));
        let sent = backend.sent_invitations(9).await.unwrap();
        assert_eq!(sent[0].status, InvitationStatus::Expired);
    }

    #[tokio::test]
    async fn test_offline_backend_fails_every_call() {
        let backend = seeded().await;
        backend.set_offline(true).await;
        assert!(backend.recommendations(&recruiter_query()).await.is_err());
        assert!(backend.pending_invitations(1).await.is_err());
        backend.set_offline(false).await;
        assert!(backend.recommendations(&recruiter_query()).await.is_ok());
    }
}
