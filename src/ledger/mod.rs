pub mod error;
pub mod in_memory;
pub mod types;

pub use error::{LedgerError, RejectReason};
pub use in_memory::InMemoryLedger;
pub use types::{
    Address, Bps, CreateRoomParams, GameKind, PlayerInRoom, Points, Room, RoomId, RoomStatus,
    RoomSummary, RoomVisibility, Score,
};

use async_trait::async_trait;

/// The external authoritative ledger, specified only at its boundary. It
/// provides atomicity and ordering for mutating operations; the engine's job
/// is client-side correctness under slow, occasionally-failing reads of it.
///
/// Every mutation must be followed by a fresh read before the client treats
/// the new state as real; results of mutating calls are never cached as
/// ground truth.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn create_room(
        &self,
        creator: &Address,
        params: CreateRoomParams,
    ) -> Result<RoomId, LedgerError>;

    async fn join_room(
        &self,
        room_id: RoomId,
        player: &Address,
        invite_code: Option<&str>,
    ) -> Result<(), LedgerError>;

    async fn submit_score(
        &self,
        room_id: RoomId,
        player: &Address,
        score: Score,
    ) -> Result<(), LedgerError>;

    async fn claim_prize(&self, room_id: RoomId, player: &Address) -> Result<(), LedgerError>;

    async fn cancel_room(&self, room_id: RoomId, caller: &Address) -> Result<(), LedgerError>;

    async fn get_room(&self, room_id: RoomId) -> Result<Room, LedgerError>;

    async fn get_players(&self, room_id: RoomId) -> Result<Vec<Address>, LedgerError>;

    /// Per-player membership and submission facts for one room.
    async fn get_room_player(
        &self,
        room_id: RoomId,
        player: &Address,
    ) -> Result<PlayerInRoom, LedgerError>;

    /// Advisory pre-flight read; the ledger re-validates on every mutation.
    async fn get_player_balance(&self, player: &Address) -> Result<Points, LedgerError>;
}
