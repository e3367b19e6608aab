use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ledger-assigned room identifier, unique and immutable.
pub type RoomId = u64;
/// Fungible stake denomination.
pub type Points = u64;
/// Mini-game outcome; non-negative by construction.
pub type Score = u64;
/// Basis points (1/100th of a percent).
pub type Bps = u16;

/// Opaque player identity as the ledger reports it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    ArcadePhysics,
    AdversarialChat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomVisibility {
    Public,
    Private,
    Tournament,
}

/// Room lifecycle status. Transitions are forward-only and decided by the
/// ledger; the client only predicts and validates against its last read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Filling,
    Active,
    Completed,
    Expired,
    Canceled,
}

impl RoomStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RoomStatus::Filling | RoomStatus::Active)
    }

    /// Forward transitions the ledger may perform from `self`.
    pub fn can_transition_to(self, next: RoomStatus) -> bool {
        matches!(
            (self, next),
            (RoomStatus::Filling, RoomStatus::Active)
                | (RoomStatus::Filling, RoomStatus::Canceled)
                | (RoomStatus::Filling, RoomStatus::Expired)
                | (RoomStatus::Active, RoomStatus::Completed)
                | (RoomStatus::Active, RoomStatus::Expired)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoomStatus::Filling => "filling",
            RoomStatus::Active => "active",
            RoomStatus::Completed => "completed",
            RoomStatus::Expired => "expired",
            RoomStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One match instance as the ledger reports it. The ledger exclusively owns
/// this record; the engine only requests mutations and re-reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub creator: Address,
    pub entry_fee: Points,
    pub max_players: u16,
    pub current_players: u16,
    pub game_kind: GameKind,
    pub visibility: RoomVisibility,
    pub status: RoomStatus,
    /// Authoritative value; never assume it matches a local recomputation
    /// until confirmed by a read.
    pub prize_pool: Points,
    pub winner: Option<Address>,
    pub prize_claimed: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Room {
    pub fn is_full(&self) -> bool {
        self.current_players >= self.max_players
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id,
            creator: self.creator.clone(),
            entry_fee: self.entry_fee,
            max_players: self.max_players,
            current_players: self.current_players,
            game_kind: self.game_kind,
            visibility: self.visibility,
            created_at: self.created_at,
        }
    }
}

/// Listing projection served by the room registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub creator: Address,
    pub entry_fee: Points,
    pub max_players: u16,
    pub current_players: u16,
    pub game_kind: GameKind,
    pub visibility: RoomVisibility,
    pub created_at: DateTime<Utc>,
}

/// Membership record for one player in one room. `score` is meaningful only
/// once `has_submitted_score` is true.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInRoom {
    pub address: Address,
    pub has_submitted_score: bool,
    pub score: Score,
}

/// Request to create a room. The creator auto-joins, so `current_players`
/// starts at 1 on the ledger side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomParams {
    pub entry_fee: Points,
    pub max_players: u16,
    pub game_kind: GameKind,
    pub visibility: RoomVisibility,
    pub invite_code: Option<String>,
    pub expires_at: DateTime<Utc>,
}
