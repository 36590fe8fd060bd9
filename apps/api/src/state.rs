use std::sync::Arc;

use crate::backend::MatchBackend;
use crate::config::Config;
use crate::invitations::workflow::InvitationWorkflow;
use crate::swipe::registry::SessionRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Recruiting REST backend, or the in-memory one in local mode.
    pub backend: Arc<dyn MatchBackend>,
    pub sessions: Arc<SessionRegistry>,
    pub invitations: Arc<InvitationWorkflow>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn MatchBackend>) -> Self {
        Self {
            invitations: Arc::new(InvitationWorkflow::new(Arc::clone(&backend))),
            sessions: Arc::new(SessionRegistry::new()),
            backend,
            config,
        }
    }
}
