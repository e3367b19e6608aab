pub mod events;
pub mod state;

pub use events::{RosterSummary, SessionEvent};
pub use state::{reconcile, ClaimStanding, MatchResult, MatchSession, UserAction};

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine::errors::{CancelError, ClaimError, CreateError, JoinError, SubmitError};
use crate::engine::gate::SubmissionGate;
use crate::engine::prize::{compute_prize, PrizeBreakdown};
use crate::engine::roster::{Roster, RosterResolver};
use crate::engine::rules::{check_cancel, check_claim, check_join, validate_create, JoinCheck};
use crate::ledger::{
    Address, Bps, CreateRoomParams, LedgerClient, LedgerError, RejectReason, Room, RoomId,
    RoomStatus, Score,
};
use crate::registry::RoomRegistry;
use crate::watch::{spawn_named_task, CompletionWatcher};

const LOG_TARGET: &str = "stake_arena::session";

/// Result of a successful prize claim: the refreshed session plus the
/// settlement figures shown in the claim flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub session: MatchSession,
    pub prize: PrizeBreakdown,
}

/// Session state shared with watcher follow-up tasks.
struct SessionCore {
    me: Address,
    commission_rate_bps: Bps,
    sessions: DashMap<RoomId, MatchSession>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionCore {
    /// Reconcile a fresh `(room, roster)` observation, store it, and publish
    /// it. This is the only writer of the session map, so every stored
    /// session traces back to a fresh read.
    fn reconcile_and_publish(&self, room: &Room, roster: &Roster) -> MatchSession {
        let prior = self
            .sessions
            .get(&room.id)
            .map(|entry| entry.value().clone());
        let session = reconcile(room, roster, &self.me, prior.as_ref(), self.commission_rate_bps);
        self.sessions.insert(room.id, session.clone());
        let _ = self.events.send(SessionEvent::SessionUpdated {
            session: session.clone(),
            roster: RosterSummary {
                joined: room.current_players,
                submitted: roster.submitted_count() as u16,
                capacity: room.max_players,
            },
        });
        session
    }
}

/// The engine facade the presentation layer drives. One instance per
/// observing user; all room state flows from fresh ledger reads, with the
/// local session map as an advisory cache only.
pub struct MatchClient {
    core: Arc<SessionCore>,
    ledger: Arc<dyn LedgerClient>,
    registry: RoomRegistry,
    roster: RosterResolver,
    gate: SubmissionGate,
    watcher: CompletionWatcher,
}

impl MatchClient {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        cfg: &EngineConfig,
        me: Address,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let client = Arc::new(Self {
            core: Arc::new(SessionCore {
                me,
                commission_rate_bps: cfg.commission_rate_bps,
                sessions: DashMap::new(),
                events,
            }),
            registry: RoomRegistry::new(Arc::clone(&ledger), cfg),
            roster: RosterResolver::new(Arc::clone(&ledger), cfg),
            gate: SubmissionGate::new(Arc::clone(&ledger), cfg),
            watcher: CompletionWatcher::new(Arc::clone(&ledger), cfg),
            ledger,
        });
        (client, receiver)
    }

    pub fn me(&self) -> &Address {
        &self.core.me
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Last reconciled session for a room, if any. Advisory only.
    pub fn session(&self, room_id: RoomId) -> Option<MatchSession> {
        self.core
            .sessions
            .get(&room_id)
            .map(|entry| entry.value().clone())
    }

    /// Create a room and observe it. The balance pre-flight is advisory; a
    /// transient balance read skips the check and lets the ledger decide.
    pub async fn create_room(&self, params: CreateRoomParams) -> Result<MatchSession, CreateError> {
        validate_create(&params)?;
        if let Ok(balance) = self.ledger.get_player_balance(&self.core.me).await {
            if balance < params.entry_fee {
                return Err(CreateError::InsufficientBalance {
                    balance,
                    entry_fee: params.entry_fee,
                });
            }
        }
        let room_id = self.ledger.create_room(&self.core.me, params).await?;
        info!(target: LOG_TARGET, room_id, creator = %self.core.me, "room created");
        self.refresh(room_id).await.map_err(CreateError::Ledger)
    }

    /// Join a room. Rejoining a room this address is already seated in is a
    /// no-op success, whether detected locally or by the ledger.
    pub async fn join(
        &self,
        room_id: RoomId,
        invite_code: Option<&str>,
    ) -> Result<MatchSession, JoinError> {
        let room = self.ledger.get_room(room_id).await?;
        let roster = self.roster.resolve(room_id).await;

        if check_join(&room, &roster, &self.core.me, invite_code)? == JoinCheck::CanJoin {
            if let Ok(balance) = self.ledger.get_player_balance(&self.core.me).await {
                if balance < room.entry_fee {
                    return Err(JoinError::InsufficientBalance {
                        balance,
                        entry_fee: room.entry_fee,
                    });
                }
            }
            match self
                .ledger
                .join_room(room_id, &self.core.me, invite_code)
                .await
            {
                Ok(()) => {
                    info!(target: LOG_TARGET, room_id, player = %self.core.me, "joined room");
                }
                // The roster read was stale; we were already seated.
                Err(LedgerError::Rejected(RejectReason::AlreadyJoined)) => {}
                Err(LedgerError::Rejected(RejectReason::AlreadyFull)) => {
                    return Err(JoinError::Full {
                        room_id,
                        capacity: room.max_players,
                    })
                }
                Err(LedgerError::Rejected(RejectReason::BadInviteCode)) => {
                    return Err(JoinError::BadInviteCode)
                }
                Err(err) => return Err(JoinError::Ledger(err)),
            }
        }
        self.refresh(room_id).await.map_err(JoinError::Ledger)
    }

    /// Submit a score through the gate. On acceptance the completion watcher
    /// is started as a follow-up; the gate itself never waits for results.
    pub async fn submit_score(
        &self,
        room_id: RoomId,
        score: Score,
    ) -> Result<MatchSession, SubmitError> {
        match self.gate.try_submit(room_id, &self.core.me, score).await {
            Ok(()) => {
                // Record the score locally before confirmation shows up.
                if let Some(mut session) = self.core.sessions.get_mut(&room_id) {
                    session.game_score = Some(score);
                }
                let session = self.refresh(room_id).await.map_err(SubmitError::Ledger)?;
                if session.status != RoomStatus::Completed {
                    self.spawn_completion_forwarder(room_id);
                }
                Ok(session)
            }
            Err(err) => {
                if err.marks_session_played() {
                    // A prior submission exists; the local gate must reflect it.
                    if let Some(mut session) = self.core.sessions.get_mut(&room_id) {
                        session.has_played = true;
                    }
                    let _ = self.refresh(room_id).await;
                }
                Err(err)
            }
        }
    }

    /// Callback from the mini-game component, invoked once per play attempt.
    pub async fn on_game_over(
        &self,
        room_id: RoomId,
        score: Score,
    ) -> Result<MatchSession, SubmitError> {
        debug!(target: LOG_TARGET, room_id, score, "game over");
        self.submit_score(room_id, score).await
    }

    /// Claim the prize for a completed, won, unclaimed room.
    pub async fn claim_prize(&self, room_id: RoomId) -> Result<ClaimOutcome, ClaimError> {
        let room = self.ledger.get_room(room_id).await?;
        check_claim(&room, &self.core.me)?;
        match self.ledger.claim_prize(room_id, &self.core.me).await {
            Ok(()) => {}
            Err(LedgerError::Rejected(RejectReason::AlreadyClaimed)) => {
                return Err(ClaimError::AlreadyClaimed { room_id })
            }
            Err(LedgerError::Rejected(RejectReason::NotWinner)) => {
                return Err(ClaimError::NotWinner {
                    room_id,
                    address: self.core.me.clone(),
                })
            }
            Err(LedgerError::Rejected(RejectReason::NotCompleted)) => {
                return Err(ClaimError::NotCompleted {
                    room_id,
                    status: room.status,
                })
            }
            Err(err) => return Err(ClaimError::Ledger(err)),
        }
        let prize = compute_prize(
            room.entry_fee,
            room.max_players,
            self.core.commission_rate_bps,
        );
        info!(
            target: LOG_TARGET,
            room_id,
            winner = %self.core.me,
            net_prize = prize.net_prize,
            "prize claimed"
        );
        let session = self.refresh(room_id).await.map_err(ClaimError::Ledger)?;
        Ok(ClaimOutcome { session, prize })
    }

    /// Cancel a room this user created while it is still filling.
    pub async fn cancel_room(&self, room_id: RoomId) -> Result<MatchSession, CancelError> {
        let room = self.ledger.get_room(room_id).await?;
        check_cancel(&room, &self.core.me)?;
        match self.ledger.cancel_room(room_id, &self.core.me).await {
            Ok(()) => {
                info!(target: LOG_TARGET, room_id, "room canceled");
            }
            Err(LedgerError::Rejected(RejectReason::NotFilling)) => {
                return Err(CancelError::NotFilling {
                    room_id,
                    status: room.status,
                })
            }
            Err(LedgerError::Rejected(RejectReason::NotCreator)) => {
                return Err(CancelError::NotCreator { room_id })
            }
            Err(err) => return Err(CancelError::Ledger(err)),
        }
        self.refresh(room_id).await.map_err(CancelError::Ledger)
    }

    /// Re-read the room and roster and reconcile. This is the only path that
    /// updates the local session map, so every observation is a fresh one.
    pub async fn refresh(&self, room_id: RoomId) -> Result<MatchSession, LedgerError> {
        let room = self.ledger.get_room(room_id).await?;
        let roster = self.roster.resolve(room_id).await;
        Ok(self.core.reconcile_and_publish(&room, &roster))
    }

    /// Drop local state for one room and stop its watcher.
    pub fn reset_session(&self, room_id: RoomId) {
        self.core.sessions.remove(&room_id);
        self.watcher.cancel(room_id);
        debug!(target: LOG_TARGET, room_id, "session reset");
    }

    /// Drop all local state, e.g. on navigation away from the arena.
    pub fn reset_all(&self) {
        self.core.sessions.clear();
        self.watcher.cancel_all();
        debug!(target: LOG_TARGET, "all sessions reset");
    }

    #[cfg(test)]
    pub(crate) fn watcher(&self) -> &CompletionWatcher {
        &self.watcher
    }

    fn spawn_completion_forwarder(&self, room_id: RoomId) {
        let rx = self.watcher.watch(room_id);
        let core = Arc::clone(&self.core);
        let roster = self.roster.clone();
        spawn_named_task(format!("completion-forward-{room_id}"), async move {
            // A dropped sender is a silent abandon: cancelled, replaced, or
            // timed out. The next explicit read re-checks the status.
            if let Ok(room) = rx.await {
                let facts = roster.resolve(room.id).await;
                let session = core.reconcile_and_publish(&room, &facts);
                let _ = core.events.send(SessionEvent::MatchCompleted { session });
            }
        });
    }
}
