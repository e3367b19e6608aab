use std::sync::Arc;

use futures::{stream, StreamExt, TryStreamExt};
use tracing::warn;

use crate::config::EngineConfig;
use crate::ledger::{Address, LedgerClient, LedgerError, PlayerInRoom, Room, RoomId};

const LOG_TARGET: &str = "stake_arena::roster";

/// Membership and submission facts for one room, as of one read. An empty
/// roster for a room with players means the read failed, not that nobody is
/// seated; `is_known_for` makes that distinction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Roster {
    players: Vec<PlayerInRoom>,
}

impl Roster {
    pub fn new(players: Vec<PlayerInRoom>) -> Self {
        Self { players }
    }

    pub fn players(&self) -> &[PlayerInRoom] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_member(&self, address: &Address) -> bool {
        self.players.iter().any(|p| p.address == *address)
    }

    pub fn has_submitted(&self, address: &Address) -> bool {
        self.players
            .iter()
            .any(|p| p.address == *address && p.has_submitted_score)
    }

    pub fn all_submitted(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.has_submitted_score)
    }

    pub fn submitted_count(&self) -> usize {
        self.players.iter().filter(|p| p.has_submitted_score).count()
    }

    /// Whether this roster can be trusted for `room`. Empty-while-occupied
    /// means the read failed and the facts are unknown.
    pub fn is_known_for(&self, room: &Room) -> bool {
        !(self.players.is_empty() && room.current_players > 0)
    }
}

/// Resolves the roster for a room from the ledger, tolerating partial
/// failure: any read error yields an empty (unknown) roster instead of
/// propagating.
#[derive(Clone)]
pub struct RosterResolver {
    ledger: Arc<dyn LedgerClient>,
    fetch_batch: usize,
}

impl RosterResolver {
    pub fn new(ledger: Arc<dyn LedgerClient>, cfg: &EngineConfig) -> Self {
        Self {
            ledger,
            fetch_batch: cfg.fetch_batch.max(1),
        }
    }

    pub async fn resolve(&self, room_id: RoomId) -> Roster {
        match self.try_resolve(room_id).await {
            Ok(roster) => roster,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    room_id,
                    error = %err,
                    "roster read failed; treating as unknown"
                );
                Roster::default()
            }
        }
    }

    async fn try_resolve(&self, room_id: RoomId) -> Result<Roster, LedgerError> {
        let addresses = self.ledger.get_players(room_id).await?;
        let players: Vec<PlayerInRoom> = stream::iter(addresses)
            .map(|address| {
                let ledger = Arc::clone(&self.ledger);
                async move { ledger.get_room_player(room_id, &address).await }
            })
            .buffered(self.fetch_batch)
            .try_collect()
            .await?;
        Ok(Roster::new(players))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CreateRoomParams, GameKind, InMemoryLedger, RoomVisibility};
    use chrono::{Duration, Utc};

    async fn two_player_room() -> (Arc<InMemoryLedger>, RoomId, Address, Address) {
        let ledger = Arc::new(InMemoryLedger::new());
        let alice = Address::from("alice");
        let bob = Address::from("bob");
        ledger.credit(&alice, 50);
        ledger.credit(&bob, 50);
        let id = ledger
            .create_room(
                &alice,
                CreateRoomParams {
                    entry_fee: 50,
                    max_players: 2,
                    game_kind: GameKind::ArcadePhysics,
                    visibility: RoomVisibility::Public,
                    invite_code: None,
                    expires_at: Utc::now() + Duration::minutes(30),
                },
            )
            .await
            .unwrap();
        ledger.join_room(id, &bob, None).await.unwrap();
        (ledger, id, alice, bob)
    }

    #[tokio::test]
    async fn resolves_membership_and_submission_facts() {
        let (ledger, id, alice, bob) = two_player_room().await;
        ledger.submit_score(id, &alice, 40).await.unwrap();

        let resolver = RosterResolver::new(
            Arc::clone(&ledger) as Arc<dyn LedgerClient>,
            &EngineConfig::default(),
        );
        let roster = resolver.resolve(id).await;

        assert_eq!(roster.len(), 2);
        assert!(roster.is_member(&alice));
        assert!(roster.is_member(&bob));
        assert!(roster.has_submitted(&alice));
        assert!(!roster.has_submitted(&bob));
        assert!(!roster.all_submitted());
        assert_eq!(roster.submitted_count(), 1);
    }

    #[tokio::test]
    async fn read_failure_yields_unknown_not_error() {
        let (ledger, id, _alice, _bob) = two_player_room().await;
        let resolver = RosterResolver::new(
            Arc::clone(&ledger) as Arc<dyn LedgerClient>,
            &EngineConfig::default(),
        );

        ledger.fail_next_reads(1);
        let roster = resolver.resolve(id).await;
        assert!(roster.is_empty());

        let room = ledger.get_room(id).await.unwrap();
        assert!(!roster.is_known_for(&room));

        // A fresh resolve recovers.
        let roster = resolver.resolve(id).await;
        assert!(roster.is_known_for(&room));
        assert_eq!(roster.len(), 2);
    }
}
