use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::invitation::{Invitation, InvitationStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub all: usize,
    pub pending: usize,
    pub accepted: usize,
    pub declined: usize,
    pub expired: usize,
}

impl StatusCounts {
    fn add(&mut self, status: InvitationStatus) {
        self.all += 1;
        match status {
            InvitationStatus::Pending => self.pending += 1,
            InvitationStatus::Accepted => self.accepted += 1,
            InvitationStatus::Declined => self.declined += 1,
            InvitationStatus::Expired => self.expired += 1,
        }
    }
}

/// The recruiter's sent invitations, newest first, with per-status tab counts.
#[derive(Debug, Clone, Serialize)]
pub struct SentInvitationsView {
    pub invitations: Vec<Invitation>,
    pub counts: StatusCounts,
    pub filter: Option<InvitationStatus>,
}

pub fn build_sent_view(
    invitations: Vec<Invitation>,
    filter: Option<InvitationStatus>,
    now: DateTime<Utc>,
) -> SentInvitationsView {
    let mut invitations: Vec<Invitation> = invitations
        .into_iter()
        .map(|mut inv| {
            inv.status = inv.observed_status(now);
            inv
        })
        .collect();
    // Unsent (no timestamp) sorts last.
    invitations.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));

    let mut counts = StatusCounts::default();
    for inv in &invitations {
        counts.add(inv.status);
    }

    if let Some(status) = filter {
        invitations.retain(|inv| inv.status == status);
    }

    SentInvitationsView {
        invitations,
        counts,
        filter,
    }
}
