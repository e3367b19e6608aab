use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use stake_arena::ledger::{
    Address, CreateRoomParams, GameKind, InMemoryLedger, LedgerClient, RoomVisibility,
};
use stake_arena::session::{ClaimStanding, MatchClient, SessionEvent};
use stake_arena::EngineConfig;

const LOG_TARGET: &str = "bin::arena_demo";

#[derive(Debug, Parser)]
#[command(name = "arena_demo")]
#[command(about = "Run a scripted match against the in-memory ledger", long_about = None)]
struct Args {
    /// Stake per player, in points
    #[arg(long, env = "ARENA_ENTRY_FEE", default_value_t = 50)]
    entry_fee: u64,

    /// Number of players (first one creates the room)
    #[arg(long, env = "ARENA_PLAYERS", default_value_t = 2)]
    players: u16,

    /// Platform commission in basis points
    #[arg(long, env = "ARENA_COMMISSION_BPS", default_value_t = 1_000)]
    commission_bps: u16,

    /// Optional RNG seed for reproducible scores
    #[arg(long, env = "ARENA_RNG_SEED")]
    rng_seed: Option<u64>,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "ARENA_LOG_JSON", default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    init_tracing(args.json);
    run_demo(args).await
}

fn load_dotenv() {
    let manifest_env = env!("CARGO_MANIFEST_DIR");
    let manifest_env_path = PathBuf::from(manifest_env).join(".env");
    dotenv::from_filename(manifest_env_path).ok();
    dotenv::dotenv().ok();
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }
}

struct DemoPlayer {
    address: Address,
    client: Arc<MatchClient>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

async fn run_demo(args: Args) -> Result<()> {
    anyhow::ensure!(args.players >= 2, "a match needs at least 2 players");

    let mut cfg = EngineConfig::from_env();
    cfg.commission_rate_bps = args.commission_bps;
    // The in-memory ledger settles instantly; poll briskly so the demo ends
    // quickly.
    cfg.poll_interval = Duration::from_millis(100);

    let mut rng = match args.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let ledger = Arc::new(InMemoryLedger::with_commission(args.commission_bps));
    let mut players: Vec<DemoPlayer> = (0..args.players)
        .map(|i| {
            let address = Address::new(format!("player-{i}"));
            ledger.credit(&address, args.entry_fee);
            let (client, events) = MatchClient::new(
                Arc::clone(&ledger) as Arc<dyn LedgerClient>,
                &cfg,
                address.clone(),
            );
            DemoPlayer {
                address,
                client,
                events,
            }
        })
        .collect();

    let creator = &players[0];
    let session = creator
        .client
        .create_room(CreateRoomParams {
            entry_fee: args.entry_fee,
            max_players: args.players,
            game_kind: GameKind::ArcadePhysics,
            visibility: RoomVisibility::Public,
            invite_code: None,
            expires_at: Utc::now() + ChronoDuration::minutes(10),
        })
        .await
        .context("creating the room")?;
    let room_id = session.room_id;
    info!(
        target: LOG_TARGET,
        room_id,
        creator = %creator.address,
        net_prize = session.prize_estimate.net_prize,
        "room created"
    );

    for joiner in players.iter().skip(1) {
        let session = joiner
            .client
            .join(room_id, None)
            .await
            .with_context(|| format!("{} joining room {room_id}", joiner.address))?;
        info!(
            target: LOG_TARGET,
            room_id,
            player = %joiner.address,
            status = %session.status,
            "joined"
        );
    }

    for entrant in players.iter() {
        let score: u64 = rng.gen_range(0..=100);
        let session = entrant
            .client
            .on_game_over(room_id, score)
            .await
            .with_context(|| format!("{} submitting a score", entrant.address))?;
        info!(
            target: LOG_TARGET,
            room_id,
            player = %entrant.address,
            score,
            status = %session.status,
            "score submitted"
        );
    }

    // The first submitter's watcher bridges the gap to the observable
    // result.
    let completed = timeout(Duration::from_secs(10), async {
        loop {
            match players[0].events.recv().await {
                Some(SessionEvent::MatchCompleted { session }) => break Some(session),
                Some(SessionEvent::SessionUpdated { session, .. })
                    if session.result.is_some() =>
                {
                    break Some(session)
                }
                Some(_) => {}
                None => break None,
            }
        }
    })
    .await
    .context("waiting for completion")?
    .context("event stream closed before completion")?;

    let result = completed
        .result
        .clone()
        .context("completed session carries a result")?;
    let winner_address = result.winner.clone().context("completed room has a winner")?;
    info!(
        target: LOG_TARGET,
        room_id,
        winner = %winner_address,
        gross_pool = result.prize.gross_pool,
        commission = result.prize.commission,
        net_prize = result.prize.net_prize,
        "match completed"
    );

    let winner = players
        .iter()
        .find(|p| p.address == winner_address)
        .context("winner is one of the demo players")?;
    let outcome = winner
        .client
        .claim_prize(room_id)
        .await
        .context("claiming the prize")?;
    let standing = outcome
        .session
        .result
        .as_ref()
        .map(|r| r.standing)
        .unwrap_or(ClaimStanding::NotWon);
    info!(
        target: LOG_TARGET,
        room_id,
        winner = %winner.address,
        net_prize = outcome.prize.net_prize,
        standing = ?standing,
        balance = ledger.get_player_balance(&winner.address).await?,
        "prize claimed"
    );

    println!(
        "{}",
        serde_json::to_string_pretty(&outcome.session).context("rendering final session")?
    );
    Ok(())
}
