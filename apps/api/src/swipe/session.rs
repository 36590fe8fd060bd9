//! One open stack view.
//!
//! A session owns a [`CardStack`] over the recommendations of one actor and
//! runs each commit as a background task: the dispatch starts right away, the
//! item is removed once the settle delay elapses, and the outcome is applied
//! when the dispatch resolves. A failed dispatch restores the card and queues
//! a failure notice.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::dispatch::{failure_notice, success_notice, ActionDispatcher, DispatchOutcome};
use super::keys::KeyEvent;
use super::render::{render_card, CardView};
use super::stack::{
    CardStack, CommitTicket, NavDirection, StackError, StackRender, SwipeDirection,
};
use crate::backend::{MatchBackend, RecommendationQuery};
use crate::errors::AppError;
use crate::models::match_state::{ActionRequest, ActorRole, MatchAction};
use crate::models::recommendation::{Identified, Recommendation, SubjectId};

pub const EMPTY_TITLE: &str = "You've reviewed all recommendations!";

const KEY_CHANNEL_CAPACITY: usize = 16;

/// Who is swiping, and on what.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionContext {
    pub role: ActorRole,
    pub actor_id: SubjectId,
    /// Only set for recruiters, who review candidates for one job.
    pub job_id: Option<SubjectId>,
    pub limit: usize,
}

impl SessionContext {
    pub fn new(
        role: ActorRole,
        actor_id: SubjectId,
        job_id: Option<SubjectId>,
        limit: usize,
    ) -> Result<Self, AppError> {
        if limit == 0 {
            return Err(AppError::Validation("limit must be positive".to_string()));
        }
        let job_id = match role {
            ActorRole::Candidate => None,
            ActorRole::Recruiter => Some(job_id.ok_or_else(|| {
                AppError::Validation("job_id is required for recruiter stacks".to_string())
            })?),
        };
        Ok(Self {
            role,
            actor_id,
            job_id,
            limit,
        })
    }

    /// Left passes, right likes.
    pub fn action_for(direction: SwipeDirection) -> MatchAction {
        match direction {
            SwipeDirection::Left => MatchAction::Pass,
            SwipeDirection::Right => MatchAction::Like,
        }
    }

    pub fn request_for(
        &self,
        subject_id: SubjectId,
        action: MatchAction,
        message: Option<String>,
    ) -> ActionRequest {
        ActionRequest {
            role: self.role,
            actor_id: self.actor_id,
            subject_id,
            // Candidates act on the job itself.
            job_id: self.job_id.unwrap_or(subject_id),
            action,
            message,
        }
    }

    pub fn query(&self) -> RecommendationQuery {
        RecommendationQuery {
            role: self.role,
            actor_id: self.actor_id,
            job_id: self.job_id,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// A pending ask-to-apply confirmation, bound to the card it was opened on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskDraft {
    pub subject_id: SubjectId,
}

#[derive(Debug)]
struct SessionState {
    stack: CardStack<Recommendation>,
    /// Bumped on every refresh so commits from a replaced stack are dropped.
    generation: u64,
    draft: Option<AskDraft>,
    notices: Vec<Notice>,
}

/// What the browser renders for the session.
#[derive(Debug, Clone, Serialize)]
pub struct StackView {
    pub session_id: Uuid,
    pub role: ActorRole,
    pub job_id: Option<SubjectId>,
    pub position: usize,
    pub total: usize,
    pub progress: Option<String>,
    pub can_prev: bool,
    pub can_next: bool,
    pub busy: bool,
    pub transient_direction: Option<SwipeDirection>,
    pub empty: bool,
    pub empty_message: Option<&'static str>,
    pub card: Option<CardView>,
    pub ask_draft: Option<AskDraft>,
    pub notices: Vec<Notice>,
}

pub struct SwipeSession {
    id: Uuid,
    context: SessionContext,
    backend: Arc<dyn MatchBackend>,
    dispatcher: ActionDispatcher,
    settle_delay: Duration,
    state: Mutex<SessionState>,
    keys: broadcast::Sender<KeyEvent>,
}

impl SwipeSession {
    /// Loads the first batch of recommendations and builds the stack.
    pub async fn open(
        context: SessionContext,
        backend: Arc<dyn MatchBackend>,
        settle_delay: Duration,
    ) -> Result<Arc<Self>, AppError> {
        let items = backend.recommendations(&context.query()).await?;
        let id = Uuid::new_v4();
        info!(
            "Opened {:?} stack {} for {} with {} recommendation(s)",
            context.role,
            id,
            context.actor_id,
            items.len()
        );
        let (keys, _) = broadcast::channel(KEY_CHANNEL_CAPACITY);

        Ok(Arc::new(Self {
            id,
            dispatcher: ActionDispatcher::new(Arc::clone(&backend)),
            backend,
            context,
            settle_delay,
            state: Mutex::new(SessionState {
                stack: CardStack::new(items),
                generation: 0,
                draft: None,
                notices: Vec::new(),
            }),
            keys,
        }))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub async fn view(&self) -> StackView {
        let state = self.state.lock().await;
        self.view_of(&state)
    }

    fn view_of(&self, state: &SessionState) -> StackView {
        let stack = &state.stack;
        let card = match stack.render(render_card) {
            StackRender::Card(card) => Some(card),
            StackRender::Empty => None,
        };
        let empty = stack.is_empty();

        StackView {
            session_id: self.id,
            role: self.context.role,
            job_id: self.context.job_id,
            position: stack.position(),
            total: stack.len(),
            progress: (!empty).then(|| format!("{} / {}", stack.position() + 1, stack.len())),
            can_prev: stack.can_navigate(NavDirection::Prev),
            can_next: stack.can_navigate(NavDirection::Next),
            busy: stack.is_busy(),
            transient_direction: stack.transient_direction(),
            empty,
            empty_message: empty.then_some(EMPTY_TITLE),
            card,
            ask_draft: state.draft.clone(),
            notices: state.notices.clone(),
        }
    }

    pub async fn navigate(&self, direction: NavDirection) -> StackView {
        let mut state = self.state.lock().await;
        state.stack.navigate(direction);
        self.view_of(&state)
    }

    /// Swipe on the current card. Returns the optimistic view.
    pub async fn commit(self: &Arc<Self>, direction: SwipeDirection) -> Result<StackView, AppError> {
        self.start_commit(None, direction, SessionContext::action_for(direction), None)
            .await?;
        Ok(self.view().await)
    }

    /// Candidate primary call to action on the current card.
    pub async fn apply(self: &Arc<Self>) -> Result<StackView, AppError> {
        self.require_role(ActorRole::Candidate, MatchAction::Apply)?;
        self.start_commit(None, SwipeDirection::Right, MatchAction::Apply, None)
            .await?;
        Ok(self.view().await)
    }

    pub async fn open_ask(&self) -> Result<StackView, AppError> {
        self.require_role(ActorRole::Recruiter, MatchAction::AskToApply)?;
        let mut state = self.state.lock().await;
        if let Some(draft) = &state.draft {
            return Err(AppError::Conflict(format!(
                "An invitation draft for {} is already open",
                draft.subject_id
            )));
        }
        let subject_id = state
            .stack
            .current()
            .map(Identified::id)
            .ok_or(StackError::Empty)?;
        state.draft = Some(AskDraft { subject_id });
        Ok(self.view_of(&state))
    }

    pub async fn confirm_ask(
        self: &Arc<Self>,
        message: Option<String>,
    ) -> Result<StackView, AppError> {
        self.require_role(ActorRole::Recruiter, MatchAction::AskToApply)?;
        let subject_id = {
            let state = self.state.lock().await;
            state
                .draft
                .as_ref()
                .map(|d| d.subject_id)
                .ok_or_else(|| AppError::Conflict("No invitation draft is open".to_string()))?
        };
        self.start_commit(
            Some(subject_id),
            SwipeDirection::Right,
            MatchAction::AskToApply,
            message,
        )
        .await?;
        Ok(self.view().await)
    }

    /// Discards the draft. Nothing is sent and the card stays.
    pub async fn cancel_ask(&self) -> StackView {
        let mut state = self.state.lock().await;
        state.draft = None;
        self.view_of(&state)
    }

    pub async fn dismiss_notices(&self) -> StackView {
        let mut state = self.state.lock().await;
        state.notices.clear();
        self.view_of(&state)
    }

    /// Re-reads recommendations into a fresh stack.
    pub async fn refresh(&self) -> Result<StackView, AppError> {
        let items = self.backend.recommendations(&self.context.query()).await?;
        let mut state = self.state.lock().await;
        info!("Refreshed stack {} ({} recommendation(s))", self.id, items.len());
        state.stack = CardStack::new(items);
        state.generation += 1;
        state.draft = None;
        Ok(self.view_of(&state))
    }

    pub fn subscribe_keys(&self) -> broadcast::Receiver<KeyEvent> {
        self.keys.subscribe()
    }

    /// Delivers a key event to the bound listener. Returns false when the
    /// key is not a swipe key or nothing is listening.
    pub fn press_key(&self, event: KeyEvent) -> bool {
        if event.swipe_direction().is_none() {
            return false;
        }
        self.keys.send(event).is_ok()
    }

    fn require_role(&self, role: ActorRole, action: MatchAction) -> Result<(), AppError> {
        if self.context.role != role {
            return Err(AppError::Validation(format!(
                "{} is not available to {:?} stacks",
                action.as_str(),
                self.context.role
            )));
        }
        Ok(())
    }

    /// Takes the loading guard and spawns the settle/dispatch task.
    pub(crate) async fn start_commit(
        self: &Arc<Self>,
        target: Option<SubjectId>,
        direction: SwipeDirection,
        action: MatchAction,
        message: Option<String>,
    ) -> Result<JoinHandle<()>, AppError> {
        let (ticket, generation) = {
            let mut state = self.state.lock().await;
            let begun = match target {
                Some(id) => state.stack.begin_commit_item(id, direction),
                None => state.stack.begin_commit(direction),
            };
            let ticket = match begun {
                Ok(ticket) => ticket,
                Err(e) => {
                    warn!("Rejected {} on stack {}: {}", action.as_str(), self.id, e);
                    if target.is_some() && matches!(e, StackError::UnknownItem(_)) {
                        state.draft = None;
                    }
                    return Err(e.into());
                }
            };
            if action == MatchAction::AskToApply {
                state.draft = None;
            }
            (ticket, state.generation)
        };

        let request = self.context.request_for(ticket.item.id(), action, message);
        let session = Arc::clone(self);
        Ok(tokio::spawn(async move {
            session.run_commit(ticket, generation, request).await;
        }))
    }

    async fn run_commit(
        self: Arc<Self>,
        ticket: CommitTicket<Recommendation>,
        generation: u64,
        request: ActionRequest,
    ) {
        let action = request.action;
        let dispatcher = self.dispatcher.clone();
        let dispatch = tokio::spawn(async move { dispatcher.dispatch(request).await });

        tokio::time::sleep(self.settle_delay).await;
        {
            let mut state = self.state.lock().await;
            if state.generation == generation {
                if let Err(e) = state.stack.settle(&ticket) {
                    warn!("Settle on stack {} skipped: {}", self.id, e);
                }
            }
        }

        let result = match dispatch.await {
            Ok(result) => result,
            Err(e) => Err(AppError::Internal(anyhow::anyhow!("Dispatch task failed: {e}"))),
        };
        self.complete(ticket, generation, action, result).await;
    }

    async fn complete(
        &self,
        ticket: CommitTicket<Recommendation>,
        generation: u64,
        action: MatchAction,
        result: Result<DispatchOutcome, AppError>,
    ) {
        let refresh = {
            let mut state = self.state.lock().await;
            if state.generation == generation {
                match state.stack.finish(&ticket, result.is_ok()) {
                    Ok(true) => warn!(
                        "Restored item {} at {} on stack {} after failed {:?} swipe",
                        ticket.item.id(),
                        ticket.index,
                        self.id,
                        ticket.direction
                    ),
                    Ok(false) => {}
                    Err(e) => warn!("Finish on stack {} skipped: {}", self.id, e),
                }
            }
            match result {
                Ok(outcome) => {
                    if let Some(notice) = success_notice(outcome.action) {
                        state.notices.push(Notice::success(notice));
                    }
                    outcome.refresh_required
                }
                Err(e) => {
                    state
                        .notices
                        .push(Notice::error(failure_notice(action, ticket.item.kind(), &e)));
                    false
                }
            }
        };

        if refresh {
            if let Err(e) = self.refresh().await {
                warn!("Refresh of stack {} failed: {}", self.id, e);
            }
        }
    }
}
