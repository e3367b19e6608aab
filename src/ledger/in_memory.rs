use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use crate::engine::prize::compute_prize;

use super::error::{LedgerError, RejectReason};
use super::types::{
    Address, Bps, CreateRoomParams, PlayerInRoom, Points, Room, RoomId, RoomStatus, Score,
};
use super::LedgerClient;

const LOG_TARGET: &str = "stake_arena::ledger::in_memory";

const DEFAULT_COMMISSION_BPS: Bps = 1_000;

struct SeatedPlayer {
    address: Address,
    score: Option<Score>,
    /// Global submission order, used by this ledger's tie policy: the
    /// earliest of the tied top submissions wins.
    submitted_seq: Option<u64>,
}

struct StoredRoom {
    room: Room,
    invite_code: Option<String>,
    roster: Vec<SeatedPlayer>,
}

struct Inner {
    rooms: HashMap<RoomId, StoredRoom>,
    balances: HashMap<Address, Points>,
    next_room_id: RoomId,
    next_submission_seq: u64,
    /// Remaining reads to fail with `Unavailable`, for exercising the
    /// unreliable-observation paths.
    read_failures: u32,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            rooms: HashMap::new(),
            balances: HashMap::new(),
            next_room_id: 1,
            next_submission_seq: 1,
            read_failures: 0,
        }
    }
}

/// Authoritative ledger stand-in used by tests and the demo binary. It
/// enforces the room lifecycle the way the real ledger does: atomic joins
/// with capacity checks, activation at capacity, completion once every
/// roster member has submitted, and reject-on-repeat claims.
pub struct InMemoryLedger {
    inner: Arc<RwLock<Inner>>,
    commission_rate_bps: Bps,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_commission(DEFAULT_COMMISSION_BPS)
    }

    pub fn with_commission(commission_rate_bps: Bps) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            commission_rate_bps,
        }
    }

    /// Seed a player balance.
    pub fn credit(&self, player: &Address, amount: Points) {
        let mut inner = self.inner.write();
        *inner.balances.entry(player.clone()).or_insert(0) += amount;
    }

    /// Make the next `count` reads fail with `Unavailable`.
    pub fn fail_next_reads(&self, count: u32) {
        self.inner.write().read_failures = count;
    }

    fn take_read_failure(inner: &mut Inner) -> Result<(), LedgerError> {
        if inner.read_failures > 0 {
            inner.read_failures -= 1;
            return Err(LedgerError::Unavailable("injected read failure".into()));
        }
        Ok(())
    }

    /// Time-based escape transitions, applied lazily on access.
    fn sweep_expiry(stored: &mut StoredRoom) {
        let room = &mut stored.room;
        if !room.status.is_terminal() && Utc::now() > room.expires_at {
            debug!(target: LOG_TARGET, room_id = room.id, from = %room.status, "room expired");
            room.status = RoomStatus::Expired;
        }
    }

    fn room_mut<'a>(
        inner: &'a mut Inner,
        room_id: RoomId,
    ) -> Result<&'a mut StoredRoom, LedgerError> {
        let stored = inner.rooms.get_mut(&room_id).ok_or(LedgerError::NotFound)?;
        Self::sweep_expiry(stored);
        Ok(stored)
    }

    fn debit(inner: &mut Inner, player: &Address, amount: Points) -> Result<(), LedgerError> {
        let balance = inner.balances.entry(player.clone()).or_insert(0);
        if *balance < amount {
            return Err(LedgerError::Rejected(RejectReason::InsufficientBalance));
        }
        *balance -= amount;
        Ok(())
    }

    fn settle_if_complete(stored: &mut StoredRoom) {
        if stored.room.status != RoomStatus::Active {
            return;
        }
        if stored.roster.iter().any(|seat| seat.score.is_none()) {
            return;
        }
        let mut best: Option<(usize, Score, u64)> = None;
        for (index, seat) in stored.roster.iter().enumerate() {
            if let (Some(score), Some(seq)) = (seat.score, seat.submitted_seq) {
                let better = match best {
                    None => true,
                    Some((_, best_score, best_seq)) => {
                        score > best_score || (score == best_score && seq < best_seq)
                    }
                };
                if better {
                    best = Some((index, score, seq));
                }
            }
        }
        if let Some((index, score, _)) = best {
            let winner = stored.roster[index].address.clone();
            debug!(
                target: LOG_TARGET,
                room_id = stored.room.id,
                winner = %winner,
                score,
                "room completed"
            );
            stored.room.winner = Some(winner);
            stored.room.status = RoomStatus::Completed;
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn create_room(
        &self,
        creator: &Address,
        params: CreateRoomParams,
    ) -> Result<RoomId, LedgerError> {
        if params.max_players < 2 {
            return Err(LedgerError::RejectedRaw(
                "max_players must be at least 2".into(),
            ));
        }
        let mut inner = self.inner.write();
        Self::debit(&mut inner, creator, params.entry_fee)?;

        let id = inner.next_room_id;
        inner.next_room_id += 1;

        let room = Room {
            id,
            creator: creator.clone(),
            entry_fee: params.entry_fee,
            max_players: params.max_players,
            current_players: 1,
            game_kind: params.game_kind,
            visibility: params.visibility,
            status: RoomStatus::Filling,
            prize_pool: params.entry_fee,
            winner: None,
            prize_claimed: false,
            created_at: Utc::now(),
            expires_at: params.expires_at,
        };
        inner.rooms.insert(
            id,
            StoredRoom {
                room,
                invite_code: params.invite_code,
                roster: vec![SeatedPlayer {
                    address: creator.clone(),
                    score: None,
                    submitted_seq: None,
                }],
            },
        );
        debug!(target: LOG_TARGET, room_id = id, creator = %creator, "room created");
        Ok(id)
    }

    async fn join_room(
        &self,
        room_id: RoomId,
        player: &Address,
        invite_code: Option<&str>,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();
        let stored = Self::room_mut(&mut inner, room_id)?;

        if stored.roster.iter().any(|seat| seat.address == *player) {
            return Err(LedgerError::Rejected(RejectReason::AlreadyJoined));
        }
        match stored.room.status {
            RoomStatus::Filling => {}
            RoomStatus::Expired => return Err(LedgerError::Rejected(RejectReason::Expired)),
            RoomStatus::Canceled => return Err(LedgerError::Rejected(RejectReason::Canceled)),
            RoomStatus::Completed => return Err(LedgerError::Rejected(RejectReason::Completed)),
            // An active room is a full room.
            RoomStatus::Active => return Err(LedgerError::Rejected(RejectReason::AlreadyFull)),
        }
        if stored.room.is_full() {
            return Err(LedgerError::Rejected(RejectReason::AlreadyFull));
        }
        if let Some(required) = stored.invite_code.as_deref() {
            if invite_code != Some(required) {
                return Err(LedgerError::Rejected(RejectReason::BadInviteCode));
            }
        }

        let entry_fee = stored.room.entry_fee;
        Self::debit(&mut inner, player, entry_fee)?;
        // Re-borrow after the balance mutation; the room cannot have vanished.
        let stored = Self::room_mut(&mut inner, room_id)?;
        stored.roster.push(SeatedPlayer {
            address: player.clone(),
            score: None,
            submitted_seq: None,
        });
        stored.room.current_players += 1;
        stored.room.prize_pool = stored.room.entry_fee * Points::from(stored.room.current_players);
        if stored.room.is_full() {
            stored.room.status = RoomStatus::Active;
            debug!(target: LOG_TARGET, room_id, "room filled, now active");
        }
        Ok(())
    }

    async fn submit_score(
        &self,
        room_id: RoomId,
        player: &Address,
        score: Score,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();
        let seq = inner.next_submission_seq;
        let stored = Self::room_mut(&mut inner, room_id)?;

        if stored.room.status != RoomStatus::Active {
            return Err(LedgerError::Rejected(RejectReason::NotActive));
        }
        let seat = stored
            .roster
            .iter_mut()
            .find(|seat| seat.address == *player)
            .ok_or(LedgerError::Rejected(RejectReason::NotMember))?;
        if seat.score.is_some() {
            return Err(LedgerError::Rejected(RejectReason::AlreadySubmitted));
        }
        seat.score = Some(score);
        seat.submitted_seq = Some(seq);
        Self::settle_if_complete(stored);
        inner.next_submission_seq = seq + 1;
        Ok(())
    }

    async fn claim_prize(&self, room_id: RoomId, player: &Address) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();
        let commission_rate_bps = self.commission_rate_bps;
        let stored = Self::room_mut(&mut inner, room_id)?;

        if stored.room.status != RoomStatus::Completed {
            return Err(LedgerError::Rejected(RejectReason::NotCompleted));
        }
        if stored.room.winner.as_ref() != Some(player) {
            return Err(LedgerError::Rejected(RejectReason::NotWinner));
        }
        if stored.room.prize_claimed {
            return Err(LedgerError::Rejected(RejectReason::AlreadyClaimed));
        }
        stored.room.prize_claimed = true;
        let breakdown = compute_prize(
            stored.room.entry_fee,
            stored.room.max_players,
            commission_rate_bps,
        );
        *inner.balances.entry(player.clone()).or_insert(0) += breakdown.net_prize;
        debug!(
            target: LOG_TARGET,
            room_id,
            winner = %player,
            net_prize = breakdown.net_prize,
            "prize claimed"
        );
        Ok(())
    }

    async fn cancel_room(&self, room_id: RoomId, caller: &Address) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();
        let stored = Self::room_mut(&mut inner, room_id)?;

        if stored.room.creator != *caller {
            return Err(LedgerError::Rejected(RejectReason::NotCreator));
        }
        if stored.room.status != RoomStatus::Filling {
            return Err(LedgerError::Rejected(RejectReason::NotFilling));
        }
        stored.room.status = RoomStatus::Canceled;
        let entry_fee = stored.room.entry_fee;
        let refunds: Vec<Address> = stored
            .roster
            .iter()
            .map(|seat| seat.address.clone())
            .collect();
        for address in refunds {
            *inner.balances.entry(address).or_insert(0) += entry_fee;
        }
        debug!(target: LOG_TARGET, room_id, "room canceled, stakes refunded");
        Ok(())
    }

    async fn get_room(&self, room_id: RoomId) -> Result<Room, LedgerError> {
        let mut inner = self.inner.write();
        Self::take_read_failure(&mut inner)?;
        let stored = Self::room_mut(&mut inner, room_id)?;
        Ok(stored.room.clone())
    }

    async fn get_players(&self, room_id: RoomId) -> Result<Vec<Address>, LedgerError> {
        let mut inner = self.inner.write();
        Self::take_read_failure(&mut inner)?;
        let stored = Self::room_mut(&mut inner, room_id)?;
        Ok(stored
            .roster
            .iter()
            .map(|seat| seat.address.clone())
            .collect())
    }

    async fn get_room_player(
        &self,
        room_id: RoomId,
        player: &Address,
    ) -> Result<PlayerInRoom, LedgerError> {
        let mut inner = self.inner.write();
        Self::take_read_failure(&mut inner)?;
        let stored = Self::room_mut(&mut inner, room_id)?;
        let seat = stored
            .roster
            .iter()
            .find(|seat| seat.address == *player)
            .ok_or(LedgerError::NotFound)?;
        Ok(PlayerInRoom {
            address: seat.address.clone(),
            has_submitted_score: seat.score.is_some(),
            score: seat.score.unwrap_or(0),
        })
    }

    async fn get_player_balance(&self, player: &Address) -> Result<Points, LedgerError> {
        let mut inner = self.inner.write();
        Self::take_read_failure(&mut inner)?;
        Ok(inner.balances.get(player).copied().unwrap_or(0))
    }
}
