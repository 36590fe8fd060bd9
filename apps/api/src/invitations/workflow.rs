use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::InvitationError;
use crate::backend::MatchBackend;
use crate::errors::AppError;
use crate::models::invitation::{Invitation, InvitationId, InvitationStatus};
use crate::models::recommendation::SubjectId;

/// A candidate's local to-do list of invitations.
///
/// Responses take a per-invitation guard, so a double click cannot submit
/// twice. A successful response removes the invitation; a failed one leaves
/// it in place so it stays actionable. The list is a snapshot of the last
/// read and is re-read whenever it may be behind the backend.
#[derive(Debug)]
pub struct InvitationInbox {
    candidate_id: SubjectId,
    pending: Vec<Invitation>,
    responding: HashSet<InvitationId>,
}

impl InvitationInbox {
    pub fn new(candidate_id: SubjectId) -> Self {
        Self {
            candidate_id,
            pending: Vec::new(),
            responding: HashSet::new(),
        }
    }

    pub fn pending(&self) -> &[Invitation] {
        &self.pending
    }

    /// Nothing pending and no response in flight.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.responding.is_empty()
    }

    /// Replaces the list with a fresh read. Only this candidate's invitations
    /// that still read as PENDING are kept.
    pub fn replace(&mut self, invitations: Vec<Invitation>, now: DateTime<Utc>) {
        let candidate_id = self.candidate_id;
        self.pending = invitations
            .into_iter()
            .filter(|inv| inv.candidate.id == candidate_id)
            .filter(|inv| inv.observed_status(now) == InvitationStatus::Pending)
            .collect();
    }

    pub fn begin_response(
        &mut self,
        id: InvitationId,
        now: DateTime<Utc>,
    ) -> Result<Invitation, InvitationError> {
        if self.responding.contains(&id) {
            return Err(InvitationError::ResponseInFlight(id));
        }
        let invitation = self
            .pending
            .iter()
            .find(|inv| inv.id == id)
            .ok_or(InvitationError::NotPending(id))?;
        match invitation.observed_status(now) {
            InvitationStatus::Pending => {}
            InvitationStatus::Expired => return Err(InvitationError::Expired(id)),
            status => return Err(InvitationError::AlreadyResolved { id, status }),
        }
        let invitation = invitation.clone();
        self.responding.insert(id);
        Ok(invitation)
    }

    /// Releases the guard; on success the invitation leaves the pending list.
    pub fn finish_response(&mut self, id: InvitationId, succeeded: bool) -> Option<Invitation> {
        self.responding.remove(&id);
        if !succeeded {
            return None;
        }
        let index = self.pending.iter().position(|inv| inv.id == id)?;
        Some(self.pending.remove(index))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RespondOutcome {
    pub invitation_id: InvitationId,
    pub job_id: SubjectId,
    pub status: InvitationStatus,
    /// Accepting is applying: the caller's profile and stacks must be re-read.
    pub refresh_required: bool,
    pub notice: String,
}

pub struct InvitationWorkflow {
    backend: Arc<dyn MatchBackend>,
    inboxes: Mutex<HashMap<SubjectId, Arc<Mutex<InvitationInbox>>>>,
}

impl InvitationWorkflow {
    pub fn new(backend: Arc<dyn MatchBackend>) -> Self {
        Self {
            backend,
            inboxes: Mutex::new(HashMap::new()),
        }
    }

    async fn inbox(&self, candidate_id: SubjectId) -> Arc<Mutex<InvitationInbox>> {
        let mut inboxes = self.inboxes.lock().await;
        Arc::clone(
            inboxes
                .entry(candidate_id)
                .or_insert_with(|| Arc::new(Mutex::new(InvitationInbox::new(candidate_id)))),
        )
    }

    /// Drops the inbox of `candidate_id` once it holds nothing. A locked
    /// inbox is in use and stays.
    async fn release_if_idle(&self, candidate_id: SubjectId) {
        let mut inboxes = self.inboxes.lock().await;
        let idle = inboxes
            .get(&candidate_id)
            .and_then(|inbox| inbox.try_lock().ok().map(|inbox| inbox.is_idle()))
            .unwrap_or(false);
        if idle {
            inboxes.remove(&candidate_id);
        }
    }

    #[cfg(test)]
    async fn tracked_inboxes(&self) -> usize {
        self.inboxes.lock().await.len()
    }

    /// `GET pendingInvitations(candidateId)` into the local list.
    pub async fn load_pending(&self, candidate_id: SubjectId) -> Result<Vec<Invitation>, AppError> {
        let invitations = self.backend.pending_invitations(candidate_id).await?;
        let pending = {
            let inbox = self.inbox(candidate_id).await;
            let mut inbox = inbox.lock().await;
            inbox.replace(invitations, Utc::now());
            inbox.pending().to_vec()
        };
        info!(
            "Loaded {} pending invitation(s) for candidate {}",
            pending.len(),
            candidate_id
        );
        self.release_if_idle(candidate_id).await;
        Ok(pending)
    }

    /// Exactly-once PENDING -> ACCEPTED | DECLINED.
    pub async fn respond(
        &self,
        candidate_id: SubjectId,
        invitation_id: InvitationId,
        accept: bool,
    ) -> Result<RespondOutcome, AppError> {
        // An invitation missing from the snapshot may have arrived since the
        // last read; re-read once before rejecting.
        let begun = self
            .inbox(candidate_id)
            .await
            .lock()
            .await
            .begin_response(invitation_id, Utc::now());
        let invitation = match begun {
            Err(InvitationError::NotPending(_)) => {
                self.load_pending(candidate_id).await?;
                self.inbox(candidate_id)
                    .await
                    .lock()
                    .await
                    .begin_response(invitation_id, Utc::now())?
            }
            other => other?,
        };

        let inbox = self.inbox(candidate_id).await;
        let result = self.backend.respond_invitation(invitation_id, accept).await;
        inbox
            .lock()
            .await
            .finish_response(invitation_id, result.is_ok());

        if let Err(e) = result {
            warn!("Response to invitation {invitation_id} failed, keeping it pending: {e}");
            return Err(e.into());
        }
        self.release_if_idle(candidate_id).await;

        let (status, notice) = if accept {
            (InvitationStatus::Accepted, "Application submitted successfully!")
        } else {
            (InvitationStatus::Declined, "Invitation declined.")
        };
        info!(
            "Invitation {} {:?} by candidate {} (job {})",
            invitation_id, status, candidate_id, invitation.job.id
        );

        Ok(RespondOutcome {
            invitation_id,
            job_id: invitation.job.id,
            status,
            refresh_required: accept,
            notice: notice.to_string(),
        })
    }

    /// Badge number for navigation chrome. Always a fresh read, so asks sent
    /// after the last load are counted.
    pub async fn pending_count(&self, candidate_id: SubjectId) -> Result<usize, AppError> {
        Ok(self.load_pending(candidate_id).await?.len())
    }
}
