use std::collections::HashSet;
use std::sync::Arc;

use futures::{stream, StreamExt};
use tracing::debug;

use crate::config::EngineConfig;
use crate::ledger::{LedgerClient, LedgerError, Room, RoomId, RoomStatus, RoomSummary};

const LOG_TARGET: &str = "stake_arena::registry";

/// Read-side catalog over the ledger's room records. No state of its own;
/// every listing is a fresh bounded scan.
pub struct RoomRegistry {
    ledger: Arc<dyn LedgerClient>,
    scan_ceiling: RoomId,
    fetch_batch: usize,
}

impl RoomRegistry {
    pub fn new(ledger: Arc<dyn LedgerClient>, cfg: &EngineConfig) -> Self {
        Self {
            ledger,
            scan_ceiling: cfg.scan_ceiling,
            fetch_batch: cfg.fetch_batch.max(1),
        }
    }

    /// Scan the bounded id range and keep rooms still filling. Unreachable or
    /// erroring ids are treated as absent, never fatal. Results are deduped
    /// by id and ordered by descending creation time.
    pub async fn list_filling_rooms(&self, limit: usize) -> Vec<RoomSummary> {
        let ledger = &self.ledger;
        let fetched: Vec<Result<Room, LedgerError>> = stream::iter(1..=self.scan_ceiling)
            .map(|id| {
                let ledger = Arc::clone(ledger);
                async move { ledger.get_room(id).await }
            })
            .buffer_unordered(self.fetch_batch)
            .collect()
            .await;

        let scanned = fetched.len();
        let mut seen: HashSet<RoomId> = HashSet::new();
        let mut rooms: Vec<RoomSummary> = fetched
            .into_iter()
            .filter_map(|result| result.ok())
            .filter(|room| room.status == RoomStatus::Filling)
            .filter(|room| seen.insert(room.id))
            .map(|room| room.summary())
            .collect();

        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rooms.truncate(limit);

        debug!(
            target: LOG_TARGET,
            scanned,
            kept = rooms.len(),
            "filling-room scan finished"
        );
        rooms
    }

    /// Single-room read. Ids outside the scanned range are `NotFound`;
    /// transient failures propagate for the caller to retry.
    pub async fn get_room(&self, room_id: RoomId) -> Result<Room, LedgerError> {
        if room_id == 0 || room_id > self.scan_ceiling {
            return Err(LedgerError::NotFound);
        }
        self.ledger.get_room(room_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Address, CreateRoomParams, GameKind, InMemoryLedger, RoomVisibility};
    use chrono::{Duration, Utc};

    fn setup() -> (Arc<InMemoryLedger>, RoomRegistry) {
        let ledger = Arc::new(InMemoryLedger::new());
        let registry = RoomRegistry::new(
            Arc::clone(&ledger) as Arc<dyn LedgerClient>,
            &EngineConfig::default(),
        );
        (ledger, registry)
    }

    fn params(entry_fee: u64, max_players: u16) -> CreateRoomParams {
        CreateRoomParams {
            entry_fee,
            max_players,
            game_kind: GameKind::ArcadePhysics,
            visibility: RoomVisibility::Public,
            invite_code: None,
            expires_at: Utc::now() + Duration::minutes(30),
        }
    }

    async fn seeded_room(ledger: &InMemoryLedger, name: &str, max_players: u16) -> RoomId {
        let creator = Address::from(name);
        ledger.credit(&creator, 10);
        ledger.create_room(&creator, params(10, max_players)).await.unwrap()
    }

    #[tokio::test]
    async fn keeps_only_filling_rooms_newest_first() {
        let (ledger, registry) = setup();
        let first = seeded_room(&ledger, "alice", 3).await;
        let second = seeded_room(&ledger, "bob", 3).await;

        // Fill a third room so it goes Active and drops out of the listing.
        let active = seeded_room(&ledger, "carol", 2).await;
        let dave = Address::from("dave");
        ledger.credit(&dave, 10);
        ledger.join_room(active, &dave, None).await.unwrap();

        let rooms = registry.list_filling_rooms(10).await;
        let ids: Vec<RoomId> = rooms.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn respects_limit() {
        let (ledger, registry) = setup();
        for i in 0..4 {
            seeded_room(&ledger, &format!("p{i}"), 3).await;
        }
        assert_eq!(registry.list_filling_rooms(2).await.len(), 2);
    }

    #[tokio::test]
    async fn erroring_ids_are_absent_not_fatal() {
        let (ledger, registry) = setup();
        seeded_room(&ledger, "alice", 3).await;
        seeded_room(&ledger, "bob", 3).await;

        // Poison a handful of reads mid-scan; the scan keeps going.
        ledger.fail_next_reads(3);
        let rooms = registry.list_filling_rooms(10).await;
        assert!(rooms.len() <= 2);

        let rooms = registry.list_filling_rooms(10).await;
        assert_eq!(rooms.len(), 2);
    }

    #[tokio::test]
    async fn get_room_distinguishes_out_of_range() {
        let (ledger, registry) = setup();
        let id = seeded_room(&ledger, "alice", 3).await;

        assert!(registry.get_room(id).await.is_ok());
        assert_eq!(registry.get_room(0).await.unwrap_err(), LedgerError::NotFound);
        assert_eq!(
            registry.get_room(9_999).await.unwrap_err(),
            LedgerError::NotFound
        );

        ledger.fail_next_reads(1);
        assert!(registry.get_room(id).await.unwrap_err().is_transient());
    }
}
