// Ask-to-apply handshake: the candidate's pending inbox, exactly-once
// responses, and the recruiter's sent view.

use thiserror::Error;

use crate::models::invitation::{InvitationId, InvitationStatus};

pub mod handlers;
pub mod sent;
pub mod workflow;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvitationError {
    #[error("Invitation {0} is not in the pending list")]
    NotPending(InvitationId),

    #[error("Invitation {id} was already resolved ({status:?})")]
    AlreadyResolved {
        id: InvitationId,
        status: InvitationStatus,
    },

    #[error("Invitation {0} has expired")]
    Expired(InvitationId),

    #[error("A response to invitation {0} is already in flight")]
    ResponseInFlight(InvitationId),
}
