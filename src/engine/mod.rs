pub mod errors;
pub mod gate;
pub mod prize;
pub mod roster;
pub mod rules;

#[cfg(test)]
mod tests;

pub use errors::{CancelError, ClaimError, CreateError, JoinError, SubmitError};
pub use gate::SubmissionGate;
pub use prize::{compute_prize, PrizeBreakdown};
pub use roster::{Roster, RosterResolver};
pub use rules::{check_cancel, check_claim, check_join, check_submit, validate_create, JoinCheck};
