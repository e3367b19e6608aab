pub mod config;
pub mod engine;
pub mod ledger;
pub mod registry;
pub mod session;
pub mod watch;

pub use config::EngineConfig;
pub use engine::{compute_prize, PrizeBreakdown, SubmissionGate};
pub use ledger::{InMemoryLedger, LedgerClient, LedgerError};
pub use registry::RoomRegistry;
pub use session::{MatchClient, MatchSession, SessionEvent};
pub use watch::CompletionWatcher;
