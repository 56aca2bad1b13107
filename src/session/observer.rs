//! Structured session observation.

use crate::protocol::inbound::ServerEvent;

use super::coordinator::SessionState;

/// Receives a notification for every inbound event and every lifecycle
/// transition, regardless of how the event was classified.
///
/// Callbacks run on the inbound task and must not block; anything slow
/// belongs behind a channel.
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, _event: &ServerEvent) {}

    fn on_state(&self, _state: SessionState) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {}
