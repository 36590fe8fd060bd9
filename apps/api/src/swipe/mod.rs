//! Swipe matching engine: the card stack, the unlock gate applied at render
//! time, the action dispatcher and the per-view session that ties them to a
//! backend.

pub mod dispatch;
pub mod handlers;
pub mod keys;
pub mod registry;
pub mod render;
pub mod session;
pub mod stack;
pub mod unlock;
