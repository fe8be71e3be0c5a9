//! Pumpore Game Client
//!
//! Off-chain client for the Pumpore mining game. Reads and watches the
//! board, active round, treasury and wallet miner accounts, and submits
//! deploy/claim/stake transactions to the on-chain program.
//!
//! The program itself owns all state transitions; this client only decodes
//! account state and requests changes via instructions.

mod config;
mod error;
mod submitter;
mod view;
mod watcher;

use clap::Parser;
use config::{Command, Config};
use pumpore::consts::{sol_to_lamports, BOARD_SIZE};
use pumpore::instruction;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::Signer;
use std::sync::Arc;
use submitter::TxSubmitter;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use view::Snapshot;
use watcher::GameWatcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::parse();

    info!("Pumpore Game Client");
    info!("RPC URL: {}", config.rpc_url);

    let rpc = Arc::new(RpcClient::new_with_commitment(
        config.rpc_url.clone(),
        CommitmentConfig::confirmed(),
    ));

    // Read-only commands work without a wallet; signing commands re-check.
    let authority = config.load_keypair().ok().map(|keypair| keypair.pubkey());
    if let Some(authority) = authority {
        info!("Wallet: {}", authority);
    }

    let watcher = GameWatcher::new(rpc.clone(), config.ws_url.clone(), authority);
    let submitter = TxSubmitter::new(rpc, config.priority_fee);

    match config.command.clone().unwrap_or(Command::Watch) {
        Command::Watch => {
            run_watch(&watcher).await?;
        }
        Command::Stats => {
            let game = watcher.fetch_all().await?;
            info!("Round {}", game.round_id);
            info!("  Time remaining: {}s", game.time_remaining);
            info!("  Total deployed: {:.4} SOL", game.total_deployed);
            info!("  Motherlode: {:.4} ORE", game.motherlode);
            match game.winning_square {
                Some(square) => info!("  Winning square: {}", square),
                None => info!("  Winning square: not yet revealed"),
            }
            for square in game.squares.iter().filter(|s| s.players > 0) {
                info!(
                    "  Square {:>2}: {:.4} SOL, {} miners",
                    square.id, square.sol, square.players
                );
            }
            info!(
                "Treasury: {:.4} SOL, motherlode {:.4} ORE",
                game.treasury_balance, game.treasury_motherlode
            );

            if authority.is_some() {
                let miner = watcher.fetch_miner_stats().await?;
                info!(
                    "Miner: {:.4} SOL deployed, claimable {:.4} SOL / {:.4} ORE",
                    miner.total_deployed, miner.rewards_sol, miner.rewards_ore
                );
                let stake = watcher.fetch_stake().await?;
                info!(
                    "Stake: {:.4} SOL staked, {:.4} ORE rewards",
                    stake.staked, stake.rewards
                );
            }
        }
        Command::Deploy { amount, squares } => {
            let payer = config.load_keypair()?;
            let mut selection = [false; BOARD_SIZE];
            for id in &squares {
                if !(1..=BOARD_SIZE as u8).contains(id) {
                    return Err(format!("square ids must be 1-25, got {}", id).into());
                }
                selection[(id - 1) as usize] = true;
            }

            let lamports = sol_to_lamports(amount);
            let (board, _) = watcher.fetch_board().await?;
            info!(
                "Deploying {} lamports to {} squares in round {}",
                lamports,
                squares.len(),
                board.round_id
            );

            let ix = instruction::deploy(
                payer.pubkey(),
                payer.pubkey(),
                lamports,
                board.round_id,
                selection,
            );
            match submitter.submit(&payer, ix).await {
                Ok(signature) => info!("✓ Deploy confirmed: {}", signature),
                Err(e) => {
                    error!("✗ Deploy failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Command::Claim => {
            let payer = config.load_keypair()?;
            let round_id = watcher.current_round_id().await?;
            let ix = instruction::claim(payer.pubkey(), round_id);
            match submitter.submit(&payer, ix).await {
                Ok(signature) => info!("✓ Claim confirmed: {}", signature),
                Err(e) => {
                    error!("✗ Claim failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Command::Stake { amount } => {
            let payer = config.load_keypair()?;
            let ix = instruction::stake(payer.pubkey(), sol_to_lamports(amount));
            match submitter.submit(&payer, ix).await {
                Ok(signature) => info!("✓ Stake confirmed: {}", signature),
                Err(e) => {
                    error!("✗ Stake failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Command::Unstake { amount } => {
            let payer = config.load_keypair()?;
            let ix = instruction::unstake(payer.pubkey(), sol_to_lamports(amount));
            match submitter.submit(&payer, ix).await {
                Ok(signature) => info!("✓ Unstake confirmed: {}", signature),
                Err(e) => {
                    error!("✗ Unstake failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Command::Initialize => {
            let payer = config.load_keypair()?;
            let ix = instruction::initialize(payer.pubkey());
            match submitter.submit(&payer, ix).await {
                Ok(signature) => info!("✓ Initialize confirmed: {}", signature),
                Err(e) => {
                    error!("✗ Initialize failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Command::StartRound { round_id } => {
            let payer = config.load_keypair()?;
            let ix = instruction::start_round(payer.pubkey(), round_id);
            match submitter.submit(&payer, ix).await {
                Ok(signature) => info!("✓ StartRound confirmed: {}", signature),
                Err(e) => {
                    error!("✗ StartRound failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Command::Reveal => {
            let payer = config.load_keypair()?;
            let round_id = watcher.current_round_id().await?;
            let ix = instruction::reveal(payer.pubkey(), round_id);
            match submitter.submit(&payer, ix).await {
                Ok(signature) => info!("✓ Reveal confirmed: {}", signature),
                Err(e) => {
                    error!("✗ Reveal failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

/// Follow live updates until interrupted, then release every subscription.
async fn run_watch(watcher: &GameWatcher) -> Result<(), error::ClientError> {
    let subscription = watcher.subscribe().await?;
    let mut views = subscription.views();

    log_snapshot(&views.borrow().clone(), None);
    info!("Watching for updates (ctrl-c to stop)");

    let mut last: Option<Snapshot> = None;
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = views.borrow_and_update().clone();
                log_snapshot(&snapshot, last.as_ref());
                last = Some(snapshot);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    subscription.shutdown().await;
    Ok(())
}

fn log_snapshot(snapshot: &Snapshot, last: Option<&Snapshot>) {
    let game = &snapshot.game;

    let new_round = last.map_or(true, |l| l.game.round_id != game.round_id);
    if new_round {
        info!(
            "Round {} | {}s remaining | {:.4} SOL deployed | motherlode {:.4} ORE",
            game.round_id, game.time_remaining, game.total_deployed, game.motherlode
        );
    }

    if !game.changed_squares.is_empty() {
        info!(
            "Squares changed: {:?} | total now {:.4} SOL",
            game.changed_squares, game.total_deployed
        );
    }

    if let Some(square) = game.winning_square {
        let already_shown = last
            .map_or(false, |l| l.game.winning_square == Some(square) && l.game.round_id == game.round_id);
        if !already_shown {
            info!("Round {} revealed: winning square {}", game.round_id, square);
        }
    }

    if last.map_or(false, |l| l.miner != snapshot.miner) {
        info!(
            "Miner update: {:.4} SOL deployed, claimable {:.4} SOL / {:.4} ORE",
            snapshot.miner.total_deployed, snapshot.miner.rewards_sol, snapshot.miner.rewards_ore
        );
    }
}
