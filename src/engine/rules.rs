//! Transition legality for the room lifecycle. These checks run against the
//! freshest read available; the ledger re-validates everything, so a pass
//! here is a prediction, never a guarantee.

use crate::ledger::{Address, CreateRoomParams, Room, RoomStatus, RoomVisibility};

use super::errors::{CancelError, ClaimError, CreateError, JoinError, SubmitError};
use super::roster::Roster;

pub fn validate_create(params: &CreateRoomParams) -> Result<(), CreateError> {
    if params.max_players < 2 {
        return Err(CreateError::TooFewPlayers);
    }
    if params.visibility == RoomVisibility::Private && params.invite_code.is_none() {
        return Err(CreateError::MissingInviteCode);
    }
    Ok(())
}

/// Outcome of a join legality check. Rejoining an address already on the
/// roster is a no-op success, not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinCheck {
    CanJoin,
    AlreadyMember,
}

pub fn check_join(
    room: &Room,
    roster: &Roster,
    player: &Address,
    invite_code: Option<&str>,
) -> Result<JoinCheck, JoinError> {
    if roster.is_member(player) || room.creator == *player {
        return Ok(JoinCheck::AlreadyMember);
    }
    if room.status != RoomStatus::Filling {
        return Err(JoinError::NotJoinable {
            room_id: room.id,
            status: room.status,
        });
    }
    if room.is_full() {
        return Err(JoinError::Full {
            room_id: room.id,
            capacity: room.max_players,
        });
    }
    // Only presence is checkable client-side; the ledger owns the match.
    if room.visibility == RoomVisibility::Private && invite_code.is_none() {
        return Err(JoinError::InviteRequired { room_id: room.id });
    }
    Ok(JoinCheck::CanJoin)
}

/// Score submission preconditions, checked in order before any ledger write.
pub fn check_submit(room: &Room, roster: &Roster, player: &Address) -> Result<(), SubmitError> {
    match room.status {
        RoomStatus::Active => {}
        RoomStatus::Filling => {
            return Err(SubmitError::StillFilling {
                room_id: room.id,
                current: room.current_players,
                capacity: room.max_players,
            })
        }
        status => {
            return Err(SubmitError::NotAcceptingScores {
                room_id: room.id,
                status,
            })
        }
    }
    if !roster.is_known_for(room) {
        return Err(SubmitError::RosterUnknown { room_id: room.id });
    }
    if !roster.is_member(player) {
        return Err(SubmitError::NotPlayer {
            room_id: room.id,
            address: player.clone(),
        });
    }
    if roster.has_submitted(player) {
        return Err(SubmitError::AlreadySubmitted { room_id: room.id });
    }
    Ok(())
}

pub fn check_claim(room: &Room, player: &Address) -> Result<(), ClaimError> {
    if room.status != RoomStatus::Completed {
        return Err(ClaimError::NotCompleted {
            room_id: room.id,
            status: room.status,
        });
    }
    if room.winner.as_ref() != Some(player) {
        return Err(ClaimError::NotWinner {
            room_id: room.id,
            address: player.clone(),
        });
    }
    if room.prize_claimed {
        return Err(ClaimError::AlreadyClaimed { room_id: room.id });
    }
    Ok(())
}

pub fn check_cancel(room: &Room, caller: &Address) -> Result<(), CancelError> {
    if room.creator != *caller {
        return Err(CancelError::NotCreator { room_id: room.id });
    }
    if room.status != RoomStatus::Filling {
        return Err(CancelError::NotFilling {
            room_id: room.id,
            status: room.status,
        });
    }
    Ok(())
}
