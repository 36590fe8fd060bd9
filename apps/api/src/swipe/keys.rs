use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::session::SwipeSession;
use super::stack::SwipeDirection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: String,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn swipe_direction(&self) -> Option<SwipeDirection> {
        match self.key.as_str() {
            "ArrowLeft" => Some(SwipeDirection::Left),
            "ArrowRight" => Some(SwipeDirection::Right),
            _ => None,
        }
    }
}

/// Arrow-key listener for one session. Held for the lifetime of the stack
/// view; dropping it stops the listener.
pub struct KeyBinding {
    task: JoinHandle<()>,
}

impl KeyBinding {
    pub fn bind(session: &Arc<SwipeSession>) -> Self {
        let mut events = session.subscribe_keys();
        let session_id = session.id();
        let session = Arc::downgrade(session);

        let task = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Stack {session_id} dropped {skipped} key event(s)");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(direction) = event.swipe_direction() else {
                    continue;
                };
                let Some(session) = session.upgrade() else {
                    break;
                };
                // A key press during an unsettled commit is simply ignored.
                if let Err(e) = session.commit(direction).await {
                    debug!("Key {} on stack {} ignored: {}", event.key, session_id, e);
                }
            }
            debug!("Key listener for stack {session_id} stopped");
        });

        Self { task }
    }
}

impl Drop for KeyBinding {
    fn drop(&mut self) {
        self.task.abort();
    }
}
