use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::prize::{compute_prize, PrizeBreakdown};
use crate::engine::roster::Roster;
use crate::ledger::{Address, Bps, Room, RoomId, RoomStatus, Score};

/// What the observing user can do with the room right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    Join,
    Wait,
    Play,
    Spectate,
    Claim,
    None,
}

/// Prize standing for the observing user once a room completes, independent
/// of any local score bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStanding {
    Claimable,
    AlreadyClaimed,
    NotWon,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner: Option<Address>,
    pub standing: ClaimStanding,
    pub prize: PrizeBreakdown,
}

/// Client-local, ephemeral view of one room for one observing user. Advisory
/// only: recomputed from a fresh `(room, roster, address)` read on every
/// observation, never patched incrementally, and never consulted for
/// settlement decisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSession {
    pub session_id: Uuid,
    pub room_id: RoomId,
    pub status: RoomStatus,
    pub is_creator: bool,
    /// Local gate against double play. Monotonic per room within a session:
    /// once true it stays true until an explicit session reset.
    pub has_played: bool,
    /// Last score recorded locally before ledger confirmation.
    pub game_score: Option<Score>,
    /// Payout estimate for this room's stake schedule.
    pub prize_estimate: PrizeBreakdown,
    /// Derived once the room reaches `Completed`.
    pub result: Option<MatchResult>,
    pub action: UserAction,
    pub message: String,
}

/// Derive the session for one observation. Every fact comes from the fresh
/// `(room, roster)` tuple; `prior` contributes only the monotonic played
/// flag, the locally recorded score, and a stable session id.
pub fn reconcile(
    room: &Room,
    roster: &Roster,
    me: &Address,
    prior: Option<&MatchSession>,
    commission_rate_bps: Bps,
) -> MatchSession {
    let prior_played = prior.map(|s| s.has_played).unwrap_or(false);
    let is_creator = room.creator == *me;
    let roster_known = roster.is_known_for(room);
    let member = roster.is_member(me) || is_creator;
    let submitted = roster.has_submitted(me);
    let prize_estimate = compute_prize(room.entry_fee, room.max_players, commission_rate_bps);

    let mut result = None;
    let (derived_played, action, message) = match room.status {
        RoomStatus::Filling => {
            if member {
                (
                    false,
                    UserAction::Wait,
                    format!(
                        "Waiting for players ({}/{})",
                        room.current_players, room.max_players
                    ),
                )
            } else {
                (
                    false,
                    UserAction::Join,
                    format!(
                        "Room is filling ({}/{}); winner takes {} points",
                        room.current_players, room.max_players, prize_estimate.net_prize
                    ),
                )
            }
        }
        RoomStatus::Active if !roster_known => {
            // Facts unknown; never guess membership or submission state.
            (
                prior_played,
                UserAction::Wait,
                "Syncing room state...".to_owned(),
            )
        }
        RoomStatus::Active => {
            if !member {
                (
                    true,
                    UserAction::Spectate,
                    "Match in progress; you are not seated".to_owned(),
                )
            } else if submitted {
                (
                    true,
                    UserAction::Wait,
                    "Score submitted; waiting for the other players".to_owned(),
                )
            } else {
                (
                    false,
                    UserAction::Play,
                    "Match is live; play and submit your score".to_owned(),
                )
            }
        }
        RoomStatus::Completed => {
            let standing = if room.winner.as_ref() == Some(me) {
                if room.prize_claimed {
                    ClaimStanding::AlreadyClaimed
                } else {
                    ClaimStanding::Claimable
                }
            } else {
                ClaimStanding::NotWon
            };
            let message = match standing {
                ClaimStanding::Claimable => {
                    format!("You won! {} points claimable", prize_estimate.net_prize)
                }
                ClaimStanding::AlreadyClaimed => "Prize already claimed".to_owned(),
                ClaimStanding::NotWon => match &room.winner {
                    Some(winner) => format!("Match over; winner: {winner}"),
                    None => "Match over".to_owned(),
                },
            };
            let action = if standing == ClaimStanding::Claimable {
                UserAction::Claim
            } else {
                UserAction::None
            };
            result = Some(MatchResult {
                winner: room.winner.clone(),
                standing,
                prize: prize_estimate,
            });
            (true, action, message)
        }
        RoomStatus::Expired => (
            true,
            UserAction::None,
            "Room expired before completion".to_owned(),
        ),
        RoomStatus::Canceled => (
            true,
            UserAction::None,
            "Room was canceled; stakes refunded".to_owned(),
        ),
    };

    MatchSession {
        session_id: prior.map(|s| s.session_id).unwrap_or_else(Uuid::new_v4),
        room_id: room.id,
        status: room.status,
        is_creator,
        has_played: prior_played || derived_played,
        game_score: prior.and_then(|s| s.game_score),
        prize_estimate,
        result,
        action,
        message,
    }
}
