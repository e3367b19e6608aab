use std::sync::Arc;

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::ledger::{Address, LedgerClient, LedgerError, RejectReason, RoomId, RoomStatus, Score};

use super::errors::SubmitError;
use super::roster::RosterResolver;
use super::rules::check_submit;

const LOG_TARGET: &str = "stake_arena::gate";

/// Validates a score submission against fresh ledger reads before letting it
/// anywhere near a mutating call. Completion detection is not its job; the
/// watcher runs as a follow-up.
pub struct SubmissionGate {
    ledger: Arc<dyn LedgerClient>,
    roster: RosterResolver,
}

impl SubmissionGate {
    pub fn new(ledger: Arc<dyn LedgerClient>, cfg: &EngineConfig) -> Self {
        let roster = RosterResolver::new(Arc::clone(&ledger), cfg);
        Self { ledger, roster }
    }

    /// Precondition chain on fresh reads, in order: room Active, submitter on
    /// the roster, no prior submission. Only then does the ledger write run.
    pub async fn try_submit(
        &self,
        room_id: RoomId,
        player: &Address,
        score: Score,
    ) -> Result<(), SubmitError> {
        let room = self.ledger.get_room(room_id).await?;
        let roster = self.roster.resolve(room_id).await;
        check_submit(&room, &roster, player)?;

        match self.ledger.submit_score(room_id, player, score).await {
            Ok(()) => {
                info!(
                    target: LOG_TARGET,
                    room_id,
                    player = %player,
                    score,
                    "score accepted"
                );
                Ok(())
            }
            Err(LedgerError::Rejected(reason)) => {
                Err(self.map_rejection(room_id, player, reason).await)
            }
            Err(other) => Err(other.into()),
        }
    }

    /// The write raced a concurrent transition: the preconditions held on our
    /// read but the ledger refused. Re-read where the refusal needs fresh
    /// status context; otherwise fold into the client-side taxonomy.
    async fn map_rejection(
        &self,
        room_id: RoomId,
        player: &Address,
        reason: RejectReason,
    ) -> SubmitError {
        debug!(
            target: LOG_TARGET,
            room_id,
            player = %player,
            reason = %reason,
            "submission rejected by ledger after local checks passed"
        );
        match reason {
            RejectReason::AlreadySubmitted => SubmitError::AlreadySubmitted { room_id },
            RejectReason::NotMember => SubmitError::NotPlayer {
                room_id,
                address: player.clone(),
            },
            RejectReason::NotActive => match self.ledger.get_room(room_id).await {
                Ok(room) if room.status == RoomStatus::Filling => SubmitError::StillFilling {
                    room_id,
                    current: room.current_players,
                    capacity: room.max_players,
                },
                Ok(room) => SubmitError::NotAcceptingScores {
                    room_id,
                    status: room.status,
                },
                Err(_) => LedgerError::Rejected(RejectReason::NotActive).into(),
            },
            other => LedgerError::Rejected(other).into(),
        }
    }
}
