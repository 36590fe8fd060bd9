use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::keys::KeyBinding;
use super::session::SwipeSession;
use crate::models::match_state::ActorRole;
use crate::models::recommendation::SubjectId;

const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

struct StackEntry {
    session: Arc<SwipeSession>,
    _keys: KeyBinding,
    last_seen: Instant,
}

/// Open stack sessions, each with its key listener bound.
///
/// A tab that goes away without closing its stack leaves the entry behind;
/// entries not looked up within the idle TTL are reaped.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, StackEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Arc<SwipeSession>) {
        let keys = KeyBinding::bind(&session);
        self.sessions.write().await.insert(
            session.id(),
            StackEntry {
                session,
                _keys: keys,
                last_seen: Instant::now(),
            },
        );
    }

    /// Looks up a session and marks it as in use.
    pub async fn get(&self, id: Uuid) -> Option<Arc<SwipeSession>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.session))
    }

    /// Teardown: the key binding is released with the entry.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id);
        if removed.is_some() {
            info!("Closed stack {id}");
        }
        removed.is_some()
    }

    /// Removes every session idle for at least `ttl`, releasing its key
    /// binding. Returns how many were reaped.
    pub async fn reap_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep = entry.last_seen.elapsed() < ttl;
            if !keep {
                info!("Reaped idle stack {id}");
            }
            keep
        });
        before - sessions.len()
    }

    /// Sweeps idle sessions every half TTL until the registry is dropped.
    pub fn spawn_reaper(self: &Arc<Self>, ttl: Duration) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        let period = (ttl / 2).max(MIN_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(live) = registry.upgrade() else {
                    break;
                };
                let reaped = live.reap_idle(ttl).await;
                if reaped > 0 {
                    debug!("Idle sweep removed {reaped} stack(s)");
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Re-reads every open candidate stack of `candidate_id`. Returns how
    /// many were refreshed.
    pub async fn refresh_candidate(&self, candidate_id: SubjectId) -> usize {
        let sessions: Vec<Arc<SwipeSession>> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|entry| {
                let context = entry.session.context();
                context.role == ActorRole::Candidate && context.actor_id == candidate_id
            })
            .map(|entry| Arc::clone(&entry.session))
            .collect();

        let mut refreshed = 0;
        for session in sessions {
            match session.refresh().await {
                Ok(_) => refreshed += 1,
                Err(e) => warn!("Refresh of stack {} failed: {}", session.id(), e),
            }
        }
        refreshed
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::memory::InMemoryBackend;
    use crate::backend::MatchBackend;
    use crate::models::match_state::{ActionRequest, MatchAction};
    use crate::models::recommendation::fixtures::{candidate_item, job_item};
    use crate::swipe::keys::KeyEvent;
    use crate::swipe::session::SessionContext;

    async fn backend() -> Arc<InMemoryBackend> {
        let backend = Arc::new(InMemoryBackend::default());
        backend
            .seed_job_feed(1, vec![job_item(101, 70.0), job_item(102, 70.0)])
            .await;
        backend.seed_candidate_feed(101, vec![candidate_item(1)]).await;
        backend
    }

    async fn open(
        backend: &Arc<InMemoryBackend>,
        role: ActorRole,
        actor_id: SubjectId,
        job_id: Option<SubjectId>,
    ) -> Arc<SwipeSession> {
        let context = SessionContext::new(role, actor_id, job_id, 10).unwrap();
        SwipeSession::open(context, backend.clone(), Duration::from_millis(300))
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_releases_key_binding() {
        let backend = backend().await;
        let registry = SessionRegistry::new();
        let session = open(&backend, ActorRole::Candidate, 1, None).await;
        registry.insert(Arc::clone(&session)).await;
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(session.id()).await.is_some());

        assert!(registry.remove(session.id()).await);
        assert!(!registry.remove(session.id()).await);
        assert!(registry.get(session.id()).await.is_none());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!session.press_key(KeyEvent::new("ArrowRight")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_candidate_only_touches_their_stacks() {
        let backend = backend().await;
        let registry = SessionRegistry::new();
        let first = open(&backend, ActorRole::Candidate, 1, None).await;
        let second = open(&backend, ActorRole::Candidate, 1, None).await;
        let recruiter = open(&backend, ActorRole::Recruiter, 9, Some(101)).await;
        for session in [&first, &second, &recruiter] {
            registry.insert(Arc::clone(session)).await;
        }

        backend
            .match_action(&ActionRequest {
                role: ActorRole::Candidate,
                actor_id: 1,
                subject_id: 101,
                job_id: 101,
                action: MatchAction::Apply,
                message: None,
            })
            .await
            .unwrap();

        assert_eq!(registry.refresh_candidate(1).await, 2);
        assert_eq!(first.view().await.total, 1);
        assert_eq!(second.view().await.total, 1);
        assert_eq!(recruiter.view().await.total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_idle_spares_recently_used_sessions() {
        let backend = backend().await;
        let registry = SessionRegistry::new();
        let active = open(&backend, ActorRole::Candidate, 1, None).await;
        let abandoned = open(&backend, ActorRole::Candidate, 1, None).await;
        registry.insert(Arc::clone(&active)).await;
        registry.insert(Arc::clone(&abandoned)).await;

        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(registry.get(active.id()).await.is_some());
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(registry.reap_idle(Duration::from_secs(60)).await, 1);
        assert!(registry.get(active.id()).await.is_some());
        assert!(registry.get(abandoned.id()).await.is_none());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!abandoned.press_key(KeyEvent::new("ArrowRight")));
        assert!(active.press_key(KeyEvent::new("ArrowRight")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_task_releases_abandoned_sessions() {
        let backend = backend().await;
        let registry = Arc::new(SessionRegistry::new());
        let reaper = registry.spawn_reaper(Duration::from_secs(60));
        let session = open(&backend, ActorRole::Candidate, 1, None).await;
        registry.insert(Arc::clone(&session)).await;

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(registry.len().await, 0);
        assert!(!session.press_key(KeyEvent::new("ArrowRight")));

        drop(registry);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(reaper.is_finished());
    }
}
