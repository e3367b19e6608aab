use crate::ledger::{Address, LedgerError, Points, RoomId, RoomStatus};

/// Client-side rejection for room creation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreateError {
    #[error("rooms need at least 2 players")]
    TooFewPlayers,
    #[error("private rooms require an invite code")]
    MissingInviteCode,
    #[error("balance {balance} is below the entry fee {entry_fee}")]
    InsufficientBalance { balance: Points, entry_fee: Points },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Client-side rejection for joining a room.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("room {room_id} is {status} and can no longer be joined")]
    NotJoinable { room_id: RoomId, status: RoomStatus },
    #[error("room {room_id} is full ({capacity} players)")]
    Full { room_id: RoomId, capacity: u16 },
    #[error("room {room_id} is private; an invite code is required")]
    InviteRequired { room_id: RoomId },
    #[error("invite code does not match")]
    BadInviteCode,
    #[error("balance {balance} is below the entry fee {entry_fee}")]
    InsufficientBalance { balance: Points, entry_fee: Points },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Rejection reasons for score submission. Only `AlreadySubmitted` proves a
/// prior submission exists, so it alone marks the local session as played;
/// every other reason leaves the session retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error(
        "room {room_id} is still filling ({current}/{capacity} players); scores are not accepted yet"
    )]
    StillFilling {
        room_id: RoomId,
        current: u16,
        capacity: u16,
    },
    #[error("room {room_id} is {status} and no longer accepts scores")]
    NotAcceptingScores { room_id: RoomId, status: RoomStatus },
    #[error("{address} is not a player in room {room_id}")]
    NotPlayer { room_id: RoomId, address: Address },
    #[error("a score was already submitted for room {room_id}")]
    AlreadySubmitted { room_id: RoomId },
    #[error("the roster for room {room_id} could not be read; submission state unknown")]
    RosterUnknown { room_id: RoomId },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl SubmitError {
    pub fn marks_session_played(&self) -> bool {
        matches!(self, SubmitError::AlreadySubmitted { .. })
    }
}

/// Client-side rejection for prize claiming.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    #[error("room {room_id} is {status}; prizes settle only once completed")]
    NotCompleted { room_id: RoomId, status: RoomStatus },
    #[error("{address} did not win room {room_id}")]
    NotWinner { room_id: RoomId, address: Address },
    #[error("the prize for room {room_id} was already claimed")]
    AlreadyClaimed { room_id: RoomId },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Client-side rejection for room cancellation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CancelError {
    #[error("only the creator may cancel room {room_id}")]
    NotCreator { room_id: RoomId },
    #[error("room {room_id} is {status}; only filling rooms can be canceled")]
    NotFilling { room_id: RoomId, status: RoomStatus },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
