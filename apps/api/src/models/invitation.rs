use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::invitations::InvitationError;
use crate::models::recommendation::SubjectId;

pub type InvitationId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
    /// Reached by server-side time-out only.
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: SubjectId,
    pub title: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub id: SubjectId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
}

/// A recruiter's "ask to apply" for one job, addressed to one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub job: JobSummary,
    pub candidate: CandidateSummary,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: InvitationStatus,
    #[serde(default)]
    pub match_score: Option<f64>,
}

impl Invitation {
    /// Status as the user should see it. A pending invitation past its expiry
    /// reads as EXPIRED, but the record itself is left untouched.
    pub fn observed_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        match (self.status, self.expires_at) {
            (InvitationStatus::Pending, Some(expires_at)) if now > expires_at => {
                InvitationStatus::Expired
            }
            (status, _) => status,
        }
    }

    /// PENDING -> ACCEPTED | DECLINED, exactly once.
    pub fn resolve(
        &mut self,
        accept: bool,
        now: DateTime<Utc>,
    ) -> Result<InvitationStatus, InvitationError> {
        match self.observed_status(now) {
            InvitationStatus::Pending => {
                self.status = if accept {
                    InvitationStatus::Accepted
                } else {
                    InvitationStatus::Declined
                };
                Ok(self.status)
            }
            InvitationStatus::Expired => Err(InvitationError::Expired(self.id)),
            status => Err(InvitationError::AlreadyResolved {
                id: self.id,
                status,
            }),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::invitation;
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_resolve_accept_is_terminal() {
        let mut inv = invitation(1, 10, 20);
        assert_eq!(inv.resolve(true, Utc::now()).unwrap(), InvitationStatus::Accepted);
        assert_eq!(inv.status, InvitationStatus::Accepted);
    }

    #[test]
    fn test_second_resolve_does_not_alter_status() {
        let mut inv = invitation(1, 10, 20);
        inv.resolve(false, Utc::now()).unwrap();
        let err = inv.resolve(true, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            InvitationError::AlreadyResolved {
                status: InvitationStatus::Declined,
                ..
            }
        ));
        assert_eq!(inv.status, InvitationStatus::Declined);
    }

    #[test]
    fn test_expired_is_observed_not_set() {
        let mut inv = invitation(1, 10, 20);
        inv.expires_at = Some(Utc::now() - Duration::minutes(1));
        assert_eq!(inv.observed_status(Utc::now()), InvitationStatus::Expired);
        assert_eq!(inv.status, InvitationStatus::Pending);
        assert!(matches!(
            inv.resolve(true, Utc::now()),
            Err(InvitationError::Expired(1))
        ));
        assert_eq!(inv.status, InvitationStatus::Pending);
    }

    #[test]
    fn test_no_expiry_never_expires() {
        let mut inv = invitation(1, 10, 20);
        inv.expires_at = None;
        let far_future = Utc::now() + Duration::days(3650);
        assert_eq!(inv.observed_status(far_future), InvitationStatus::Pending);
    }
}
