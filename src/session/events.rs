use serde::{Deserialize, Serialize};

use super::state::MatchSession;

/// Compact roster view carried on session events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSummary {
    pub joined: u16,
    pub submitted: u16,
    pub capacity: u16,
}

/// State changes the presentation layer consumes. Delivery is best-effort:
/// a dropped receiver never blocks the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A fresh observation of a room was reconciled.
    SessionUpdated {
        session: MatchSession,
        roster: RosterSummary,
    },
    /// The completion watcher saw the room reach `Completed`.
    MatchCompleted { session: MatchSession },
}
