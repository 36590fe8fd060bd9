//! Card stack controller.
//!
//! Owns the recommendation queue and the current slot. A commit moves through
//! three steps: `begin_commit` (loading guard taken, transient direction set),
//! `settle` (item removed after the visual delay) and `finish` (network outcome
//! known). The guard is released once both `settle` and `finish` have run, so
//! at most one action is in flight per stack.
//!
//! Removal, not increment, advances the view: the next item slides into the
//! same slot.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::recommendation::{Identified, SubjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavDirection {
    Prev,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Left,
    Right,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackError {
    #[error("A commit on item {0} has not settled yet")]
    CommitInFlight(SubjectId),

    #[error("All recommendations have been reviewed")]
    Empty,

    #[error("Item {0} is not in the stack")]
    UnknownItem(SubjectId),

    #[error("Commit {0} is not the commit in flight")]
    StaleTicket(u64),
}

/// Handle for one in-flight commit. Carries a shadow copy of the item so a
/// failed dispatch can splice it back in.
#[derive(Debug, Clone)]
pub struct CommitTicket<T> {
    seq: u64,
    pub item: T,
    pub index: usize,
    pub direction: SwipeDirection,
}

#[derive(Debug)]
struct InFlight {
    seq: u64,
    id: SubjectId,
    settled: bool,
    succeeded: Option<bool>,
    removed_at: Option<usize>,
}

/// What the caller renders for the current slot.
#[derive(Debug, PartialEq)]
pub enum StackRender<R> {
    Card(R),
    Empty,
}

#[derive(Debug)]
pub struct CardStack<T> {
    items: Vec<T>,
    position: usize,
    transient: Option<SwipeDirection>,
    in_flight: Option<InFlight>,
    next_seq: u64,
}

impl<T: Identified + Clone> CardStack<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            position: 0,
            transient: None,
            in_flight: None,
            next_seq: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn transient_direction(&self) -> Option<SwipeDirection> {
        self.transient
    }

    /// True while a commit holds the loading guard.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Terminal "all reviewed" state.
    pub fn is_empty(&self) -> bool {
        self.position >= self.items.len()
    }

    pub fn current(&self) -> Option<&T> {
        self.items.get(self.position)
    }

    pub fn can_navigate(&self, direction: NavDirection) -> bool {
        if self.is_busy() || self.is_empty() {
            return false;
        }
        match direction {
            NavDirection::Prev => self.position > 0,
            NavDirection::Next => self.position + 1 < self.items.len(),
        }
    }

    /// Preview-only move. Returns whether the position changed; never errors.
    pub fn navigate(&mut self, direction: NavDirection) -> bool {
        if !self.can_navigate(direction) {
            return false;
        }
        match direction {
            NavDirection::Prev => self.position -= 1,
            NavDirection::Next => self.position += 1,
        }
        true
    }

    /// Starts a commit on the item in the current slot.
    pub fn begin_commit(&mut self, direction: SwipeDirection) -> Result<CommitTicket<T>, StackError> {
        let id = self.current().map(Identified::id).ok_or(StackError::Empty)?;
        self.begin_commit_item(id, direction)
    }

    /// Starts a commit on a specific item, e.g. the card an ask-to-apply
    /// draft was opened on.
    pub fn begin_commit_item(
        &mut self,
        id: SubjectId,
        direction: SwipeDirection,
    ) -> Result<CommitTicket<T>, StackError> {
        if let Some(in_flight) = &self.in_flight {
            return Err(StackError::CommitInFlight(in_flight.id));
        }
        if self.items.is_empty() {
            return Err(StackError::Empty);
        }
        let index = self
            .index_of(id)
            .ok_or(StackError::UnknownItem(id))?;

        let seq = self.next_seq;
        self.next_seq += 1;
        self.transient = Some(direction);
        self.in_flight = Some(InFlight {
            seq,
            id,
            settled: false,
            succeeded: None,
            removed_at: None,
        });

        Ok(CommitTicket {
            seq,
            item: self.items[index].clone(),
            index,
            direction,
        })
    }

    /// The visual delay elapsed: drop the committed item from the queue.
    /// If the dispatch already failed, the item is simply kept.
    pub fn settle(&mut self, ticket: &CommitTicket<T>) -> Result<(), StackError> {
        let in_flight = self.in_flight_for(ticket)?;
        let keep = in_flight.succeeded == Some(false);
        let id = in_flight.id;

        self.transient = None;
        if !keep {
            if let Some(index) = self.index_of(id) {
                self.items.remove(index);
                self.clamp_position();
                if let Some(in_flight) = self.in_flight.as_mut() {
                    in_flight.removed_at = Some(index);
                }
            }
        }
        self.mark(|f| f.settled = true);
        Ok(())
    }

    /// The dispatch resolved. On failure the shadow copy goes back where it
    /// was. Returns true when the item was restored.
    pub fn finish(&mut self, ticket: &CommitTicket<T>, succeeded: bool) -> Result<bool, StackError> {
        let in_flight = self.in_flight_for(ticket)?;
        let removed_at = in_flight.removed_at;

        let mut restored = false;
        if !succeeded {
            if let Some(index) = removed_at {
                let index = index.min(self.items.len());
                self.items.insert(index, ticket.item.clone());
                restored = true;
                if let Some(in_flight) = self.in_flight.as_mut() {
                    in_flight.removed_at = None;
                }
            }
            self.transient = None;
        }
        self.mark(|f| f.succeeded = Some(succeeded));
        Ok(restored)
    }

    pub fn render<R>(&self, render: impl FnOnce(&T) -> R) -> StackRender<R> {
        match self.current() {
            Some(item) => StackRender::Card(render(item)),
            None => StackRender::Empty,
        }
    }

    fn index_of(&self, id: SubjectId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn in_flight_for(&self, ticket: &CommitTicket<T>) -> Result<&InFlight, StackError> {
        match &self.in_flight {
            Some(in_flight) if in_flight.seq == ticket.seq => Ok(in_flight),
            _ => Err(StackError::StaleTicket(ticket.seq)),
        }
    }

    /// Applies `update` and releases the guard once both halves have run.
    fn mark(&mut self, update: impl FnOnce(&mut InFlight)) {
        if let Some(in_flight) = self.in_flight.as_mut() {
            update(in_flight);
            if in_flight.settled && in_flight.succeeded.is_some() {
                self.in_flight = None;
            }
        }
    }

    fn clamp_position(&mut self) {
        // Only an exhausted queue reaches the terminal state.
        if self.position >= self.items.len() {
            self.position = self.items.len().saturating_sub(1);
        }
    }
}
