use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::ledger::{LedgerClient, Room, RoomId, RoomStatus};

const LOG_TARGET: &str = "stake_arena::watch";

pub(crate) fn spawn_named_task<F, S>(name: S, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Into<String>,
{
    let name_owned = name.into();
    #[cfg(tokio_unstable)]
    {
        tokio::task::Builder::new().name(&name_owned).spawn(future)
    }
    #[cfg(not(tokio_unstable))]
    {
        use tracing::Instrument;
        let span = tracing::info_span!("task", task_name = %name_owned);
        tokio::spawn(future.instrument(span))
    }
}

struct ActiveWatch {
    generation: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Bridges the gap between "submission accepted" and "result observable":
/// polls a room until it completes, with a bounded give-up. At most one
/// watcher per room is active; starting another for the same room replaces
/// the first, so a result is never reported twice.
pub struct CompletionWatcher {
    ledger: Arc<dyn LedgerClient>,
    poll_interval: Duration,
    watch_timeout: Duration,
    active: Arc<Mutex<HashMap<RoomId, ActiveWatch>>>,
    next_generation: AtomicU64,
}

impl CompletionWatcher {
    pub fn new(ledger: Arc<dyn LedgerClient>, cfg: &EngineConfig) -> Self {
        Self {
            ledger,
            poll_interval: cfg.poll_interval,
            watch_timeout: cfg.watch_timeout,
            active: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Start (or restart) watching a room. The receiver resolves with the
    /// completed room; it is dropped without a value if the watcher is
    /// cancelled, replaced, or gives up — a silent abandon, since the room
    /// may still complete later and the next explicit read re-checks.
    pub fn watch(&self, room_id: RoomId) -> oneshot::Receiver<Room> {
        let (tx, rx) = oneshot::channel();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        // Hold the registry lock across the spawn so the new task's exit
        // cleanup cannot observe the map before its own entry lands.
        let mut active = self.active.lock();
        let task = spawn_named_task(
            format!("completion-watch-{room_id}"),
            Self::poll_loop(
                Arc::clone(&self.ledger),
                Arc::clone(&self.active),
                room_id,
                generation,
                self.poll_interval,
                self.watch_timeout,
                cancel.clone(),
                tx,
            ),
        );
        if let Some(previous) = active.insert(
            room_id,
            ActiveWatch {
                generation,
                cancel,
                task,
            },
        ) {
            debug!(target: LOG_TARGET, room_id, "replacing existing watcher");
            previous.cancel.cancel();
            previous.task.abort();
        }
        rx
    }

    #[allow(clippy::too_many_arguments)]
    async fn poll_loop(
        ledger: Arc<dyn LedgerClient>,
        active: Arc<Mutex<HashMap<RoomId, ActiveWatch>>>,
        room_id: RoomId,
        generation: u64,
        poll_interval: Duration,
        watch_timeout: Duration,
        cancel: CancellationToken,
        tx: oneshot::Sender<Room>,
    ) {
        let deadline = tokio::time::Instant::now() + watch_timeout;
        let mut ticker = tokio::time::interval(poll_interval);
        let mut completed: Option<Room> = None;
        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break "cancelled",
                _ = tokio::time::sleep_until(deadline) => break "timed out",
                _ = ticker.tick() => {
                    match ledger.get_room(room_id).await {
                        Ok(room) if room.status == RoomStatus::Completed => {
                            completed = Some(room);
                            break "completed";
                        }
                        // Canceled/expired rooms will never complete.
                        Ok(room) if room.status.is_terminal() => break "terminal",
                        Ok(_) => {}
                        Err(err) if err.is_transient() => {
                            warn!(
                                target: LOG_TARGET,
                                room_id,
                                error = %err,
                                "poll read failed; retrying on next tick"
                            );
                        }
                        Err(err) => {
                            debug!(target: LOG_TARGET, room_id, error = %err, "room unreadable");
                            break "unreadable";
                        }
                    }
                }
            }
        };
        debug!(target: LOG_TARGET, room_id, outcome, "watcher stopped");
        if let Some(room) = completed {
            let _ = tx.send(room);
        }

        let mut map = active.lock();
        if map.get(&room_id).map(|watch| watch.generation) == Some(generation) {
            map.remove(&room_id);
        }
    }

    /// Stop watching a room. Returns whether a watcher was active.
    pub fn cancel(&self, room_id: RoomId) -> bool {
        let removed = self.active.lock().remove(&room_id);
        match removed {
            Some(watch) => {
                watch.cancel.cancel();
                watch.task.abort();
                true
            }
            None => false,
        }
    }

    /// Stop every watcher; used on session reset and navigation away.
    pub fn cancel_all(&self) {
        let drained: Vec<(RoomId, ActiveWatch)> = self.active.lock().drain().collect();
        for (room_id, watch) in drained {
            debug!(target: LOG_TARGET, room_id, "cancelling watcher");
            watch.cancel.cancel();
            watch.task.abort();
        }
    }

    pub fn is_watching(&self, room_id: RoomId) -> bool {
        self.active.lock().contains_key(&room_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

impl Drop for CompletionWatcher {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Address, CreateRoomParams, GameKind, InMemoryLedger, RoomVisibility};
    use chrono::{Duration as ChronoDuration, Utc};
    use tokio::time::timeout;

    fn fast_config(watch_timeout: Duration) -> EngineConfig {
        EngineConfig {
            poll_interval: Duration::from_millis(20),
            watch_timeout,
            ..EngineConfig::default()
        }
    }

    async fn active_room(ledger: &InMemoryLedger) -> (RoomId, Address, Address) {
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
                    expires_at: Utc::now() + ChronoDuration::minutes(30),
                },
            )
            .await
            .unwrap();
        ledger.join_room(id, &bob, None).await.unwrap();
        (id, alice, bob)
    }

    #[tokio::test]
    async fn notifies_once_the_room_completes() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (id, alice, bob) = active_room(&ledger).await;
        let watcher = CompletionWatcher::new(
            Arc::clone(&ledger) as Arc<dyn LedgerClient>,
            &fast_config(Duration::from_secs(2)),
        );

        ledger.submit_score(id, &alice, 10).await.unwrap();
        let rx = watcher.watch(id);
        ledger.submit_score(id, &bob, 90).await.unwrap();

        let room = timeout(Duration::from_secs(2), rx)
            .await
            .expect("watcher should notice completion")
            .expect("sender must not be dropped");
        assert_eq!(room.status, RoomStatus::Completed);
        assert_eq!(room.winner, Some(bob));

        // The finished watcher removed itself.
        timeout(Duration::from_secs(1), async {
            while watcher.is_watching(id) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("watcher entry should be cleaned up");
    }

    #[tokio::test]
    async fn restart_replaces_the_prior_watcher() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (id, alice, bob) = active_room(&ledger).await;
        let watcher = CompletionWatcher::new(
            Arc::clone(&ledger) as Arc<dyn LedgerClient>,
            &fast_config(Duration::from_secs(2)),
        );

        ledger.submit_score(id, &alice, 10).await.unwrap();
        let first = watcher.watch(id);
        let second = watcher.watch(id);
        assert_eq!(watcher.active_count(), 1);

        ledger.submit_score(id, &bob, 90).await.unwrap();

        // Exactly one notification: the replaced watcher's sender is dropped,
        // the live one delivers.
        assert!(timeout(Duration::from_secs(2), first)
            .await
            .expect("first receiver should resolve promptly")
            .is_err());
        let room = timeout(Duration::from_secs(2), second)
            .await
            .expect("second watcher should notice completion")
            .expect("second sender must deliver");
        assert_eq!(room.status, RoomStatus::Completed);
    }

    #[tokio::test]
    async fn gives_up_silently_after_the_timeout() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (id, alice, _bob) = active_room(&ledger).await;
        let watcher = CompletionWatcher::new(
            Arc::clone(&ledger) as Arc<dyn LedgerClient>,
            &fast_config(Duration::from_millis(80)),
        );

        ledger.submit_score(id, &alice, 10).await.unwrap();
        let rx = watcher.watch(id);

        // The room never completes; the receiver resolves to an error.
        assert!(timeout(Duration::from_secs(2), rx)
            .await
            .expect("watcher should give up within its bound")
            .is_err());
        assert!(!watcher.is_watching(id));
        assert_eq!(watcher.active_count(), 0);
    }

    #[tokio::test]
    async fn explicit_cancel_stops_the_loop() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (id, alice, _bob) = active_room(&ledger).await;
        let watcher = CompletionWatcher::new(
            Arc::clone(&ledger) as Arc<dyn LedgerClient>,
            &fast_config(Duration::from_secs(2)),
        );

        ledger.submit_score(id, &alice, 10).await.unwrap();
        let rx = watcher.watch(id);
        assert!(watcher.cancel(id));
        assert!(!watcher.is_watching(id));

        assert!(timeout(Duration::from_secs(1), rx)
            .await
            .expect("cancelled watcher should drop its sender")
            .is_err());
        assert!(!watcher.cancel(id));
    }

    #[tokio::test]
    async fn tolerates_transient_poll_failures() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (id, alice, bob) = active_room(&ledger).await;
        let watcher = CompletionWatcher::new(
            Arc::clone(&ledger) as Arc<dyn LedgerClient>,
            &fast_config(Duration::from_secs(2)),
        );

        ledger.submit_score(id, &alice, 10).await.unwrap();
        ledger.fail_next_reads(2);
        let rx = watcher.watch(id);
        ledger.submit_score(id, &bob, 90).await.unwrap();

        let room = timeout(Duration::from_secs(2), rx)
            .await
            .expect("watcher should ride out transient failures")
            .expect("sender must deliver");
        assert_eq!(room.status, RoomStatus::Completed);
    }
}
