//! End-to-end lifecycle scenarios driven through the client facade against
//! the in-memory ledger.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::config::EngineConfig;
use crate::engine::errors::{ClaimError, SubmitError};
use crate::ledger::{
    Address, CreateRoomParams, GameKind, InMemoryLedger, LedgerClient, LedgerError, RejectReason,
    RoomStatus, RoomVisibility,
};
use crate::session::{ClaimStanding, MatchClient, SessionEvent, UserAction};

fn fast_config() -> EngineConfig {
    EngineConfig {
        poll_interval: Duration::from_millis(20),
        watch_timeout: Duration::from_secs(2),
        ..EngineConfig::default()
    }
}

fn room_params(entry_fee: u64, max_players: u16) -> CreateRoomParams {
    CreateRoomParams {
        entry_fee,
        max_players,
        game_kind: GameKind::ArcadePhysics,
        visibility: RoomVisibility::Public,
        invite_code: None,
        expires_at: Utc::now() + ChronoDuration::minutes(30),
    }
}

struct Player {
    client: Arc<MatchClient>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    address: Address,
}

fn player(ledger: &Arc<InMemoryLedger>, name: &str, balance: u64) -> Player {
    let address = Address::from(name);
    ledger.credit(&address, balance);
    let (client, events) = MatchClient::new(
        Arc::clone(ledger) as Arc<dyn LedgerClient>,
        &fast_config(),
        address.clone(),
    );
    Player {
        client,
        events,
        address,
    }
}

#[tokio::test]
async fn two_player_match_settles_end_to_end() {
    let ledger = Arc::new(InMemoryLedger::new());
    let mut alice = player(&ledger, "alice", 50);
    let bob = player(&ledger, "bob", 50);

    // Pre-game estimate (display call site one).
    let session = alice
        .client
        .create_room(room_params(50, 2))
        .await
        .expect("create");
    let room_id = session.room_id;
    assert_eq!(session.status, RoomStatus::Filling);
    assert!(session.is_creator);
    assert_eq!(session.action, UserAction::Wait);
    let estimate = session.prize_estimate;
    assert_eq!(estimate.gross_pool, 100);
    assert_eq!(estimate.commission, 10);
    assert_eq!(estimate.net_prize, 90);

    // Filling rooms are listed until the second join activates the room.
    let listed = alice.client.registry().list_filling_rooms(10).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, room_id);

    let session = bob.client.join(room_id, None).await.expect("join");
    assert_eq!(session.status, RoomStatus::Active);
    assert_eq!(session.action, UserAction::Play);
    assert!(alice.client.registry().list_filling_rooms(10).await.is_empty());

    // Alice plays first and waits on the watcher; Bob's score completes the
    // room.
    let session = alice.client.on_game_over(room_id, 40).await.expect("submit");
    assert_eq!(session.action, UserAction::Wait);
    assert!(session.has_played);
    assert_eq!(session.game_score, Some(40));

    let session = bob.client.on_game_over(room_id, 75).await.expect("submit");
    assert_eq!(session.status, RoomStatus::Completed);

    // Alice's watcher delivers exactly one completion event.
    let completed = timeout(Duration::from_secs(2), async {
        loop {
            match alice.events.recv().await.expect("event stream open") {
                SessionEvent::MatchCompleted { session } => break session,
                SessionEvent::SessionUpdated { .. } => {}
            }
        }
    })
    .await
    .expect("completion event");
    assert_eq!(completed.status, RoomStatus::Completed);
    let result = completed.result.expect("result derived");
    assert_eq!(result.winner, Some(bob.address.clone()));
    assert_eq!(result.standing, ClaimStanding::NotWon);
    // Post-win confirmation (display call site two).
    assert_eq!(result.prize, estimate);

    // Claim flow (display call site three).
    let session = bob.client.refresh(room_id).await.expect("refresh");
    assert_eq!(session.action, UserAction::Claim);
    let outcome = bob.client.claim_prize(room_id).await.expect("claim");
    assert_eq!(outcome.prize, estimate);
    assert_eq!(
        outcome.session.result.expect("result").standing,
        ClaimStanding::AlreadyClaimed
    );
    assert_eq!(ledger.get_player_balance(&bob.address).await.unwrap(), 90);
}

#[tokio::test]
async fn submitting_before_activation_is_rejected_with_filling_context() {
    let ledger = Arc::new(InMemoryLedger::new());
    let alice = player(&ledger, "alice", 50);

    let session = alice
        .client
        .create_room(room_params(50, 2))
        .await
        .expect("create");
    let room_id = session.room_id;

    let err = alice.client.submit_score(room_id, 42).await.unwrap_err();
    assert!(matches!(err, SubmitError::StillFilling { .. }));
    assert!(err.to_string().contains("filling"));

    // The rejection is retryable: the session stays unplayed.
    let session = alice.client.session(room_id).expect("session");
    assert!(!session.has_played);
}

#[tokio::test]
async fn duplicate_submission_marks_and_keeps_the_session_played() {
    let ledger = Arc::new(InMemoryLedger::new());
    let alice = player(&ledger, "alice", 50);
    let bob = player(&ledger, "bob", 50);

    let room_id = alice
        .client
        .create_room(room_params(50, 2))
        .await
        .expect("create")
        .room_id;
    bob.client.join(room_id, None).await.expect("join");

    alice.client.submit_score(room_id, 40).await.expect("first");

    // Simulate a stale client retrying: the ledger already holds a score.
    let err = alice.client.submit_score(room_id, 99).await.unwrap_err();
    assert!(matches!(err, SubmitError::AlreadySubmitted { .. }));
    assert!(err.marks_session_played());

    let session = alice.client.session(room_id).expect("session");
    assert!(session.has_played);

    // Later observations never clear the flag.
    let session = alice.client.refresh(room_id).await.expect("refresh");
    assert!(session.has_played);
}

#[tokio::test]
async fn claiming_twice_reports_already_claimed() {
    let ledger = Arc::new(InMemoryLedger::new());
    let alice = player(&ledger, "alice", 50);
    let bob = player(&ledger, "bob", 50);

    let room_id = alice
        .client
        .create_room(room_params(50, 2))
        .await
        .expect("create")
        .room_id;
    bob.client.join(room_id, None).await.expect("join");
    alice.client.submit_score(room_id, 10).await.expect("submit");
    bob.client.submit_score(room_id, 90).await.expect("submit");

    bob.client.claim_prize(room_id).await.expect("first claim");
    let err = bob.client.claim_prize(room_id).await.unwrap_err();
    assert!(matches!(err, ClaimError::AlreadyClaimed { .. }));

    // The reconciler renders "already claimed", not "claimable".
    let session = bob.client.refresh(room_id).await.expect("refresh");
    assert_eq!(session.action, UserAction::None);
    assert_eq!(
        session.result.expect("result").standing,
        ClaimStanding::AlreadyClaimed
    );
    assert!(session.message.to_lowercase().contains("already claimed"));
}

#[tokio::test]
async fn join_is_idempotent_through_the_client() {
    let ledger = Arc::new(InMemoryLedger::new());
    let alice = player(&ledger, "alice", 100);
    let bob = player(&ledger, "bob", 100);

    let room_id = alice
        .client
        .create_room(room_params(50, 3))
        .await
        .expect("create")
        .room_id;

    bob.client.join(room_id, None).await.expect("join");
    // Second join is a no-op success and charges nothing.
    bob.client.join(room_id, None).await.expect("rejoin");
    assert_eq!(ledger.get_player_balance(&bob.address).await.unwrap(), 50);

    let room = ledger.get_room(room_id).await.unwrap();
    assert_eq!(room.current_players, 2);

    // The creator rejoining their own room is equally a no-op.
    alice.client.join(room_id, None).await.expect("creator rejoin");
    assert_eq!(
        ledger.get_room(room_id).await.unwrap().current_players,
        2
    );
}

#[tokio::test]
async fn concurrent_joins_never_exceed_capacity() {
    let ledger = Arc::new(InMemoryLedger::new());
    let alice = Address::from("alice");
    ledger.credit(&alice, 10);
    let room_id = ledger
        .create_room(&alice, room_params(10, 3))
        .await
        .expect("create");

    let mut tasks = Vec::new();
    for i in 0..6 {
        let ledger = Arc::clone(&ledger);
        let joiner = Address::from(format!("joiner-{i}").as_str());
        ledger.credit(&joiner, 10);
        tasks.push(tokio::spawn(async move {
            ledger.join_room(room_id, &joiner, None).await
        }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.expect("join task") {
            Ok(()) => accepted += 1,
            // Late joiners see an explicit ledger rejection, never a
            // silently capped count.
            Err(LedgerError::Rejected(
                RejectReason::AlreadyFull | RejectReason::Completed,
            )) => rejected += 1,
            Err(other) => panic!("unexpected join failure: {other}"),
        }
    }
    assert_eq!(accepted, 2);
    assert_eq!(rejected, 4);

    let room = ledger.get_room(room_id).await.unwrap();
    assert_eq!(room.current_players, room.max_players);
    assert_eq!(room.status, RoomStatus::Active);
}

#[tokio::test]
async fn watcher_restart_keeps_a_single_poll_loop() {
    let ledger = Arc::new(InMemoryLedger::new());
    let alice = player(&ledger, "alice", 50);
    let bob = player(&ledger, "bob", 50);

    let room_id = alice
        .client
        .create_room(room_params(50, 2))
        .await
        .expect("create")
        .room_id;
    bob.client.join(room_id, None).await.expect("join");

    // Submitting spawns a watcher; a stale retry of the submit flow must not
    // stack a second loop for the same room.
    alice.client.submit_score(room_id, 40).await.expect("submit");
    assert_eq!(alice.client.watcher().active_count(), 1);
    let _ = alice.client.submit_score(room_id, 40).await.unwrap_err();
    assert_eq!(alice.client.watcher().active_count(), 1);

    alice.client.reset_session(room_id);
    assert_eq!(alice.client.watcher().active_count(), 0);
}

#[tokio::test]
async fn cancel_flow_refunds_and_renders_terminal_state() {
    let ledger = Arc::new(InMemoryLedger::new());
    let alice = player(&ledger, "alice", 50);
    let bob = player(&ledger, "bob", 50);

    let room_id = alice
        .client
        .create_room(room_params(50, 3))
        .await
        .expect("create")
        .room_id;
    bob.client.join(room_id, None).await.expect("join");

    let err = bob.client.cancel_room(room_id).await.unwrap_err();
    assert!(matches!(
        err,
        crate::engine::errors::CancelError::NotCreator { .. }
    ));

    let session = alice.client.cancel_room(room_id).await.expect("cancel");
    assert_eq!(session.status, RoomStatus::Canceled);
    assert_eq!(session.action, UserAction::None);
    assert_eq!(ledger.get_player_balance(&alice.address).await.unwrap(), 50);
    assert_eq!(ledger.get_player_balance(&bob.address).await.unwrap(), 50);
}
