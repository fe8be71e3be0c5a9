//! Configuration for the client binary

use clap::{Parser, Subcommand};
use solana_sdk::signature::Keypair;
use std::path::PathBuf;

use crate::error::ClientError;

/// Pumpore mining game client
#[derive(Parser, Debug, Clone)]
#[command(name = "pumpore-client")]
#[command(about = "Off-chain client for the Pumpore mining game", long_about = None)]
pub struct Config {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// RPC URL
    #[arg(long, env = "RPC_URL", default_value = "https://api.mainnet-beta.solana.com")]
    pub rpc_url: String,

    /// Websocket URL for account change subscriptions
    #[arg(long, env = "WS_URL", default_value = "wss://api.mainnet-beta.solana.com")]
    pub ws_url: String,

    /// Wallet keypair path (JSON byte array). Optional for read-only commands.
    #[arg(long, env = "KEYPAIR_PATH")]
    pub keypair_path: Option<PathBuf>,

    /// Priority fee in microlamports per compute unit (0 = none)
    #[arg(long, env = "PRIORITY_FEE", default_value = "0")]
    pub priority_fee: u64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Subscribe to board/round/treasury/miner changes and log view updates
    Watch,
    /// One-shot fetch of the composed game view and wallet stats
    Stats,
    /// Deploy SOL to the selected squares of the active round
    Deploy {
        /// Amount of SOL per square
        #[arg(long)]
        amount: f64,
        /// Square ids to deploy to, 1-25, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        squares: Vec<u8>,
    },
    /// Claim winnings for the active round
    Claim,
    /// Stake SOL with the protocol
    Stake {
        /// Amount of SOL
        #[arg(long)]
        amount: f64,
    },
    /// Withdraw staked SOL
    Unstake {
        /// Amount of SOL
        #[arg(long)]
        amount: f64,
    },
    /// Bootstrap the board account (admin)
    Initialize,
    /// Open a new round (admin)
    StartRound {
        #[arg(long)]
        round_id: u64,
    },
    /// Reveal the active round's slot hash (admin)
    Reveal,
}

impl Config {
    /// Load the wallet keypair from the configured path. Any failure means
    /// there is no usable signing capability.
    pub fn load_keypair(&self) -> Result<Keypair, ClientError> {
        let path = self.keypair_path.as_ref().ok_or(ClientError::NotConnected)?;
        let keypair_data = std::fs::read_to_string(path).map_err(|_| ClientError::NotConnected)?;
        let keypair_bytes: Vec<u8> =
            serde_json::from_str(&keypair_data).map_err(|_| ClientError::NotConnected)?;
        Keypair::from_bytes(&keypair_bytes).map_err(|_| ClientError::NotConnected)
    }
}
