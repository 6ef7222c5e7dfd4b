//! Demo driver - walks one event through the full escrow lifecycle.
//!
//! Runs against an in-memory store with a simulated clock: create an event,
//! fund and reserve participants, confirm the ones who showed up, then jump
//! past the grace period and sweep what the no-shows left behind. Expected
//! rejections along the way (wrong deposit, full event, premature sweep,
//! anything after settlement) are logged, and the final indexer view is
//! printed as JSON.
//!
//! Usage:
//!   cargo run --release --bin demo
//!
//! Options:
//!   -d, --deposit       Deposit per reservation (default: 1000000)
//!   -c, --capacity      Maximum attendees (default: 3)
//!   -g, --grace-period  Seconds past the scheduled start before sweeping opens
//!   -l, --lead          Seconds between creation and the scheduled start (default: 86400)
//!   -p, --participants  Accounts attempting to reserve (default: 4)

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use commonware_cryptography::ed25519::PublicKey;
use commonware_runtime::{tokio, Runner};
use muster_client::{account_hex, Indexer};
use muster_ledger::mocks::create_account;
use muster_ledger::{balance, Layer, Memory, State};
use muster_types::escrow::DEFAULT_GRACE_PERIOD;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Walk one event through the escrow lifecycle")]
struct Args {
    #[arg(short, long, default_value = "1000000")]
    deposit: u64,

    #[arg(short, long, default_value = "3")]
    capacity: u32,

    #[arg(short, long, default_value_t = DEFAULT_GRACE_PERIOD)]
    grace_period: u64,

    #[arg(short, long, default_value = "86400")]
    lead: u64,

    #[arg(short, long, default_value = "4")]
    participants: u64,
}

async fn run(args: Args) -> Result<()> {
    if args.participants == 0 || args.capacity == 0 {
        return Err(anyhow!("need at least one participant and a capacity of one"));
    }

    let organizer = create_account(0);
    let participants: Vec<PublicKey> = (1..=args.participants).map(create_account).collect();

    let mut state = Memory::default();
    let mut indexer = Indexer::new();
    let mut now = 1_000u64;
    let scheduled_at = now + args.lead;

    // Create the event, fund everyone, and fill the slots.
    let mut layer = Layer::new(&state, now, args.grace_period);
    let event = layer
        .create_event(
            &organizer,
            scheduled_at,
            args.deposit,
            args.capacity,
            "team offsite".to_string(),
        )
        .await?;
    info!(
        event,
        scheduled_at,
        deposit = args.deposit,
        capacity = args.capacity,
        "event created"
    );

    let funding = args.deposit.saturating_mul(2);
    layer.fund(&organizer, funding).await?;
    for participant in &participants {
        layer.fund(participant, funding).await?;
    }
    if args.deposit > 0 {
        if let Err(err) = layer
            .reserve(&participants[0], event, args.deposit - 1)
            .await
        {
            warn!(?err, "reservation with the wrong deposit rejected");
        }
    }
    for participant in &participants {
        match layer.reserve(participant, event, args.deposit).await {
            Ok(()) => {
                info!(participant = %account_hex(participant), "reservation accepted")
            }
            Err(err) => {
                warn!(?err, participant = %account_hex(participant), "reservation rejected")
            }
        }
    }
    let (changes, notifications) = layer.commit();
    state.apply(changes).await.context("apply reservations")?;
    indexer.handle_all(&notifications);

    // Confirm everyone who showed up. The last admitted participant is the
    // no-show whose deposit the sweep will claim.
    now += 10;
    let mut layer = Layer::new(&state, now, args.grace_period);
    if let Err(err) = layer
        .confirm_attendee(&participants[0], event, &participants[0])
        .await
    {
        warn!(?err, "non-organizer confirmation rejected");
    }
    layer
        .confirm_attendee(&organizer, event, &participants[0])
        .await?;
    info!(participant = %account_hex(&participants[0]), "attendance confirmed");
    let admitted = participants.len().min(args.capacity as usize);
    if admitted > 2 {
        let batch: Vec<PublicKey> = participants[1..admitted - 1].to_vec();
        layer
            .confirm_all_attendees(&organizer, event, &batch)
            .await?;
        info!(confirmed = batch.len(), "attendance confirmed in a batch");
    }
    // Only demonstrate the early rejection while the sweep is actually
    // still closed; tiny --lead/--grace-period values can open it here.
    if now < scheduled_at.saturating_add(args.grace_period) {
        if let Err(err) = layer.withdraw_unclaimed_deposits(&organizer, event).await {
            warn!(?err, "premature sweep rejected");
        }
    }
    let (changes, notifications) = layer.commit();
    state.apply(changes).await.context("apply confirmations")?;
    indexer.handle_all(&notifications);

    // Jump past the grace period and settle.
    now = scheduled_at.saturating_add(args.grace_period);
    let mut layer = Layer::new(&state, now, args.grace_period);
    let swept = layer.withdraw_unclaimed_deposits(&organizer, event).await?;
    info!(swept, "unclaimed deposits swept to the organizer");
    if let Some(latecomer) = participants.get(args.capacity as usize) {
        if let Err(err) = layer.reserve(latecomer, event, args.deposit).await {
            warn!(?err, "reservation after settlement rejected");
        }
    }
    if let Err(err) = layer.withdraw_unclaimed_deposits(&organizer, event).await {
        warn!(?err, "second sweep rejected");
    }
    let (changes, notifications) = layer.commit();
    state.apply(changes).await.context("apply settlement")?;
    indexer.handle_all(&notifications);

    let organizer_balance = balance(&state, &organizer).await?;
    info!(
        organizer = %account_hex(&organizer),
        balance = organizer_balance,
        "final organizer balance"
    );
    for participant in &participants {
        let participant_balance = balance(&state, participant).await?;
        info!(
            participant = %account_hex(participant),
            balance = participant_balance,
            "final participant balance"
        );
    }

    println!("{}", serde_json::to_string_pretty(&indexer.view())?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let executor = tokio::Runner::new(tokio::Config::default());
    executor.start(|_| async move { run(args).await })
}
