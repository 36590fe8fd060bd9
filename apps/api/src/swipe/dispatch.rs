use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::MatchBackend;
use crate::errors::AppError;
use crate::models::match_state::{ActionRequest, MatchAction};
use crate::models::recommendation::{SubjectId, SubjectKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub action: MatchAction,
    pub subject_id: SubjectId,
    /// APPLY changes server-side unlock levels and counts.
    pub refresh_required: bool,
}

/// Turns a committed decision into one backend mutation.
#[derive(Clone)]
pub struct ActionDispatcher {
    backend: Arc<dyn MatchBackend>,
}

impl ActionDispatcher {
    pub fn new(backend: Arc<dyn MatchBackend>) -> Self {
        Self { backend }
    }

    pub async fn dispatch(&self, mut request: ActionRequest) -> Result<DispatchOutcome, AppError> {
        if !request.action.allowed_for(request.role) {
            return Err(AppError::Validation(format!(
                "{} is not a {:?} action",
                request.action.as_str(),
                request.role
            )));
        }
        request.message = match request.action {
            MatchAction::AskToApply => normalize_message(request.message.take()),
            _ => None,
        };

        if let Err(e) = self.backend.match_action(&request).await {
            warn!(
                "{:?} {} {} on {} (job {}) failed: {}",
                request.role,
                request.actor_id,
                request.action.as_str(),
                request.subject_id,
                request.job_id,
                e
            );
            return Err(e.into());
        }

        info!(
            "{:?} {} {} on {} (job {})",
            request.role,
            request.actor_id,
            request.action.as_str(),
            request.subject_id,
            request.job_id
        );
        Ok(DispatchOutcome {
            action: request.action,
            subject_id: request.subject_id,
            refresh_required: request.action == MatchAction::Apply,
        })
    }
}

/// Blank invitation messages are sent as no message at all.
pub fn normalize_message(message: Option<String>) -> Option<String> {
    message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

pub fn failure_notice(action: MatchAction, kind: SubjectKind, err: &AppError) -> String {
    let noun = match kind {
        SubjectKind::Job => "job",
        SubjectKind::Candidate => "candidate",
    };
    match action {
        MatchAction::Like => format!("Failed to like {noun}. Please try again."),
        MatchAction::Pass => format!("Failed to pass {noun}. Please try again."),
        MatchAction::Apply => "Failed to apply. Please try again.".to_string(),
        MatchAction::AskToApply => format!("Failed to send invitation: {err}"),
    }
}

pub fn success_notice(action: MatchAction) -> Option<&'static str> {
    match action {
        MatchAction::Apply => Some("Application submitted successfully!"),
        MatchAction::AskToApply => Some("Invitation sent successfully!"),
        MatchAction::Like | MatchAction::Pass => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::InMemoryBackend;
    use crate::models::match_state::ActorRole;

    fn request(role: ActorRole, action: MatchAction, message: Option<&str>) -> ActionRequest {
        ActionRequest {
            role,
            actor_id: 1,
            subject_id: 2,
            job_id: 3,
            action,
            message: message.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_apply_requires_refresh() {
        let backend = Arc::new(InMemoryBackend::default());
        let dispatcher = ActionDispatcher::new(backend.clone());

        let outcome = dispatcher
            .dispatch(request(ActorRole::Candidate, MatchAction::Apply, None))
            .await
            .unwrap();
        assert!(outcome.refresh_required);

        let outcome = dispatcher
            .dispatch(request(ActorRole::Candidate, MatchAction::Like, None))
            .await
            .unwrap();
        assert!(!outcome.refresh_required);
    }

    #[tokio::test]
    async fn test_role_mismatch_never_reaches_backend() {
        let backend = Arc::new(InMemoryBackend::default());
        let dispatcher = ActionDispatcher::new(backend.clone());

        let err = dispatcher
            .dispatch(request(ActorRole::Candidate, MatchAction::AskToApply, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(backend.actions().await.is_empty());
    }

    #[tokio::test]
    async fn test_message_only_travels_with_ask_to_apply() {
        let backend = Arc::new(InMemoryBackend::default());
        let dispatcher = ActionDispatcher::new(backend.clone());

        dispatcher
            .dispatch(request(ActorRole::Recruiter, MatchAction::Like, Some("hello")))
            .await
            .unwrap();
        dispatcher
            .dispatch(request(ActorRole::Recruiter, MatchAction::AskToApply, Some("  Let's talk ")))
            .await
            .unwrap();

        let actions = backend.actions().await;
        assert_eq!(actions[0].message, None);
        assert_eq!(actions[1].message.as_deref(), Some("Let's talk"));
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_as_backend_error() {
        let backend = Arc::new(InMemoryBackend::default());
        backend.set_offline(true).await;
        let dispatcher = ActionDispatcher::new(backend);

        let err = dispatcher
            .dispatch(request(ActorRole::Candidate, MatchAction::Pass, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Backend(_)));
        assert_eq!(
            failure_notice(MatchAction::Pass, SubjectKind::Job, &err),
            "Failed to pass job. Please try again."
        );
    }

    #[test]
    fn test_blank_message_is_dropped() {
        assert_eq!(normalize_message(Some("   ".to_string())), None);
        assert_eq!(normalize_message(None), None);
    }
}
