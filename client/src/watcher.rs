//! State fetch and subscribe adapter
//!
//! Maintains the latest known view of {board, active round, treasury,
//! wallet miner} and recomputes derived state whenever an underlying
//! account changes. Subscription tasks decode change notifications into
//! typed events; a single view-owner task merges them and republishes the
//! composed snapshot, so transport and state-merge logic stay decoupled.

use std::sync::Arc;

use bytemuck::Zeroable;
use futures::StreamExt;
use pumpore::consts::BOARD_SIZE;
use pumpore::pda::{board_pda, miner_pda, round_pda, stake_pda, treasury_pda};
use pumpore::state::{AccountData, Board, Miner, Round, Stake, Treasury};
use solana_account_decoder::{UiAccount, UiAccountEncoding};
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcAccountInfoConfig;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::ClientError;
use crate::view::{self, GameView, MinerStats, Snapshot, StakeView};

const EVENT_CHANNEL_SIZE: usize = 256;

/// Typed change events emitted by the subscription tasks.
#[derive(Debug, Clone)]
enum AccountEvent {
    Board(Board),
    Round(Round),
    Treasury(Treasury),
    Miner(Miner),
    Slot(u64),
}

/// Latest decoded accounts plus the previous deployed array for change
/// detection. Owned by one task at a time; subscription callbacks never
/// touch it directly.
struct RawState {
    board: Board,
    round: Round,
    treasury: Treasury,
    miner: Option<Miner>,
    current_slot: u64,
    last_deployed: [u64; BOARD_SIZE],
}

impl RawState {
    fn snapshot(&mut self) -> Snapshot {
        let game = view::compose(
            &self.board,
            &self.round,
            &self.treasury,
            self.current_slot,
            &self.last_deployed,
        );
        self.last_deployed = self.round.deployed;
        Snapshot {
            game,
            miner: MinerStats::from_account(self.miner.as_ref()),
        }
    }
}

/// Read and subscribe adapter over an injected RPC connection.
pub struct GameWatcher {
    rpc: Arc<RpcClient>,
    ws_url: String,
    authority: Option<Pubkey>,
}

impl GameWatcher {
    pub fn new(rpc: Arc<RpcClient>, ws_url: String, authority: Option<Pubkey>) -> Self {
        Self {
            rpc,
            ws_url,
            authority,
        }
    }

    /// One-shot read of the composed game view.
    pub async fn fetch_all(&self) -> Result<GameView, ClientError> {
        let mut state = self.fetch_state().await?;
        Ok(state.snapshot().game)
    }

    /// Board plus the current slot, in the order callers need them to
    /// derive the active round address.
    pub async fn fetch_board(&self) -> Result<(Board, u64), ClientError> {
        let board_account = self
            .fetch_optional(&board_pda().0)
            .await?
            .ok_or(ClientError::AccountNotFound { account: "board" })?;
        let board = Board::try_from_bytes(&board_account.data)
            .map_err(|e| ClientError::decode("board", e))?;
        let current_slot = self.get_slot().await?;
        Ok((board, current_slot))
    }

    pub async fn current_round_id(&self) -> Result<u64, ClientError> {
        Ok(self.fetch_board().await?.0.round_id)
    }

    /// The round account, or None if it has not been created yet.
    pub async fn fetch_round(&self, round_id: u64) -> Result<Option<Round>, ClientError> {
        match self.fetch_optional(&round_pda(round_id).0).await? {
            Some(account) => Ok(Some(
                Round::try_from_bytes(&account.data).map_err(|e| ClientError::decode("round", e))?,
            )),
            None => Ok(None),
        }
    }

    /// Wallet mining stats. An absent miner account is the normal state
    /// for a wallet that has never deployed, not an error.
    pub async fn fetch_miner_stats(&self) -> Result<MinerStats, ClientError> {
        Ok(MinerStats::from_account(self.fetch_miner().await?.as_ref()))
    }

    /// Wallet staking position, zero-valued before the first stake.
    pub async fn fetch_stake(&self) -> Result<StakeView, ClientError> {
        let Some(authority) = self.authority else {
            return Ok(StakeView::default());
        };
        match self.fetch_optional(&stake_pda(authority).0).await? {
            Some(account) => {
                let stake = Stake::try_from_bytes(&account.data)
                    .map_err(|e| ClientError::decode("stake", e))?;
                Ok(StakeView::from_account(Some(&stake)))
            }
            None => Ok(StakeView::default()),
        }
    }

    /// Subscribe to change notifications for every tracked account and
    /// republish composed snapshots through the returned handle. The round
    /// subscription follows `round_id` as the board advances.
    pub async fn subscribe(&self) -> Result<Subscription, ClientError> {
        // Seed from a full read so subscribers start on live state.
        let mut state = self.fetch_state().await?;
        state.miner = self.fetch_miner().await?;
        let initial_round_id = state.board.round_id;

        let pubsub = Arc::new(
            PubsubClient::new(&self.ws_url)
                .await
                .map_err(|e| ClientError::Subscribe(e.to_string()))?,
        );

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let (round_changed_tx, _) = broadcast::channel(16);
        let (shutdown_tx, _) = broadcast::channel(1);
        let (view_tx, view_rx) = watch::channel(state.snapshot());

        let mut tasks = Vec::new();

        tasks.push(spawn_account_watcher(
            "board",
            board_pda().0,
            pubsub.clone(),
            event_tx.clone(),
            shutdown_tx.subscribe(),
            AccountEvent::Board,
        ));
        tasks.push(spawn_account_watcher(
            "treasury",
            treasury_pda().0,
            pubsub.clone(),
            event_tx.clone(),
            shutdown_tx.subscribe(),
            AccountEvent::Treasury,
        ));
        if let Some(authority) = self.authority {
            tasks.push(spawn_account_watcher(
                "miner",
                miner_pda(authority).0,
                pubsub.clone(),
                event_tx.clone(),
                shutdown_tx.subscribe(),
                AccountEvent::Miner,
            ));
        }
        tasks.push(spawn_round_watcher(
            self.rpc.clone(),
            pubsub.clone(),
            event_tx.clone(),
            round_changed_tx.subscribe(),
            shutdown_tx.subscribe(),
            initial_round_id,
        ));
        tasks.push(spawn_slot_watcher(
            pubsub,
            event_tx,
            shutdown_tx.subscribe(),
        ));
        tasks.push(spawn_view_task(
            state,
            event_rx,
            view_tx,
            round_changed_tx,
            shutdown_tx.subscribe(),
        ));

        Ok(Subscription {
            views: view_rx,
            shutdown: shutdown_tx,
            tasks,
        })
    }

    async fn fetch_state(&self) -> Result<RawState, ClientError> {
        let board_address = board_pda().0;
        let treasury_address = treasury_pda().0;

        let addresses = [board_address, treasury_address];
        let (accounts, current_slot) = tokio::try_join!(
            self.get_multiple(&addresses),
            self.get_slot(),
        )?;

        let board = match accounts.first().and_then(|a| a.as_ref()) {
            Some(account) => Board::try_from_bytes(&account.data)
                .map_err(|e| ClientError::decode("board", e))?,
            None => return Err(ClientError::AccountNotFound { account: "board" }),
        };
        let treasury = match accounts.get(1).and_then(|a| a.as_ref()) {
            Some(account) => Treasury::try_from_bytes(&account.data)
                .map_err(|e| ClientError::decode("treasury", e))?,
            None => return Err(ClientError::AccountNotFound { account: "treasury" }),
        };

        // The round account may not exist yet right after a reset; show an
        // empty board rather than failing.
        let round = self
            .fetch_round(board.round_id)
            .await?
            .unwrap_or_else(Round::zeroed);

        Ok(RawState {
            board,
            round,
            treasury,
            miner: None,
            current_slot,
            last_deployed: [0; BOARD_SIZE],
        })
    }

    async fn fetch_miner(&self) -> Result<Option<Miner>, ClientError> {
        let Some(authority) = self.authority else {
            return Ok(None);
        };
        match self.fetch_optional(&miner_pda(authority).0).await? {
            Some(account) => Ok(Some(
                Miner::try_from_bytes(&account.data).map_err(|e| ClientError::decode("miner", e))?,
            )),
            None => Ok(None),
        }
    }

    async fn fetch_optional(&self, address: &Pubkey) -> Result<Option<Account>, ClientError> {
        self.rpc
            .get_account_with_commitment(address, self.rpc.commitment())
            .await
            .map(|response| response.value)
            .map_err(|e| ClientError::Rpc(e.to_string()))
    }

    async fn get_multiple(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Account>>, ClientError> {
        self.rpc
            .get_multiple_accounts(addresses)
            .await
            .map_err(|e| ClientError::Rpc(e.to_string()))
    }

    async fn get_slot(&self) -> Result<u64, ClientError> {
        self.rpc
            .get_slot()
            .await
            .map_err(|e| ClientError::Rpc(e.to_string()))
    }
}

/// Handle over a live subscription set. Dropping without calling
/// `shutdown` detaches the tasks; `shutdown` releases every underlying
/// subscription and waits for the tasks to wind down.
pub struct Subscription {
    views: watch::Receiver<Snapshot>,
    shutdown: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl Subscription {
    pub fn views(&self) -> watch::Receiver<Snapshot> {
        self.views.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

fn account_subscribe_config() -> RpcAccountInfoConfig {
    RpcAccountInfoConfig {
        encoding: Some(UiAccountEncoding::Base64),
        commitment: Some(CommitmentConfig::confirmed()),
        ..Default::default()
    }
}

fn decode_ui_account<T: AccountData>(ui: &UiAccount) -> Result<T, String> {
    let account: Account = ui
        .decode()
        .ok_or_else(|| "unsupported account encoding".to_string())?;
    T::try_from_bytes(&account.data).map_err(|e| e.to_string())
}

/// Watch one fixed account address and forward decoded updates. Malformed
/// buffers are logged and skipped so the previous view stays intact.
fn spawn_account_watcher<T, F>(
    name: &'static str,
    address: Pubkey,
    pubsub: Arc<PubsubClient>,
    events: mpsc::Sender<AccountEvent>,
    mut shutdown: broadcast::Receiver<()>,
    wrap: F,
) -> JoinHandle<()>
where
    T: AccountData + Send + 'static,
    F: Fn(T) -> AccountEvent + Send + 'static,
{
    tokio::spawn(async move {
        let (mut stream, unsubscribe) = match pubsub
            .account_subscribe(&address, Some(account_subscribe_config()))
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                error!("{} subscription failed: {}", name, e);
                return;
            }
        };
        debug!("{} subscription active", name);

        loop {
            tokio::select! {
                response = stream.next() => {
                    let Some(response) = response else {
                        warn!("{} subscription stream closed", name);
                        break;
                    };
                    match decode_ui_account::<T>(&response.value) {
                        Ok(value) => {
                            let _ = events.send(wrap(value)).await;
                        }
                        Err(e) => warn!("ignoring malformed {} update: {}", name, e),
                    }
                }
                _ = shutdown.recv() => break,
            }
        }

        drop(stream);
        unsubscribe().await;
    })
}

/// Watch the active round account. When the board advances to a new round
/// id, the old subscription is torn down before the new round address is
/// subscribed; board and treasury subscriptions are untouched.
fn spawn_round_watcher(
    rpc: Arc<RpcClient>,
    pubsub: Arc<PubsubClient>,
    events: mpsc::Sender<AccountEvent>,
    mut round_changed: broadcast::Receiver<u64>,
    mut shutdown: broadcast::Receiver<()>,
    initial_round_id: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut round_id = initial_round_id;

        'resubscribe: loop {
            let address = round_pda(round_id).0;
            let (mut stream, unsubscribe) = match pubsub
                .account_subscribe(&address, Some(account_subscribe_config()))
                .await
            {
                Ok(subscription) => subscription,
                Err(e) => {
                    error!("round {} subscription failed: {}", round_id, e);
                    return;
                }
            };
            debug!("round {} subscription active", round_id);

            // The subscription only fires on the next change; pull the
            // current contents so an already-populated round shows up at
            // once.
            match rpc
                .get_account_with_commitment(&address, CommitmentConfig::confirmed())
                .await
            {
                Ok(response) => {
                    if let Some(account) = response.value {
                        match Round::try_from_bytes(&account.data) {
                            Ok(round) => {
                                let _ = events.send(AccountEvent::Round(round)).await;
                            }
                            Err(e) => warn!("ignoring malformed round account: {}", e),
                        }
                    }
                }
                Err(e) => warn!("round {} read failed: {}", round_id, e),
            }

            loop {
                tokio::select! {
                    response = stream.next() => {
                        let Some(response) = response else {
                            warn!("round subscription stream closed");
                            break;
                        };
                        match decode_ui_account::<Round>(&response.value) {
                            Ok(round) => {
                                let _ = events.send(AccountEvent::Round(round)).await;
                            }
                            Err(e) => warn!("ignoring malformed round update: {}", e),
                        }
                    }
                    changed = round_changed.recv() => {
                        match changed {
                            Ok(new_id) if new_id != round_id => {
                                round_id = new_id;
                                drop(stream);
                                unsubscribe().await;
                                continue 'resubscribe;
                            }
                            Ok(_) => {}
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!("round change signal lagged by {}", skipped);
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }

            drop(stream);
            unsubscribe().await;
            return;
        }
    })
}

/// Track the cluster slot so time-remaining stays current between account
/// changes.
fn spawn_slot_watcher(
    pubsub: Arc<PubsubClient>,
    events: mpsc::Sender<AccountEvent>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (mut stream, unsubscribe) = match pubsub.slot_subscribe().await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!("slot subscription failed: {}", e);
                return;
            }
        };

        loop {
            tokio::select! {
                slot_info = stream.next() => {
                    let Some(slot_info) = slot_info else {
                        warn!("slot subscription stream closed");
                        break;
                    };
                    let _ = events.send(AccountEvent::Slot(slot_info.slot)).await;
                }
                _ = shutdown.recv() => break,
            }
        }

        drop(stream);
        unsubscribe().await;
    })
}

/// Single owner of the composed view: merges events, recomputes derived
/// state and republishes. Board and treasury updates for the same slot may
/// arrive in either order; each merges independently.
fn spawn_view_task(
    mut state: RawState,
    mut events: mpsc::Receiver<AccountEvent>,
    view_tx: watch::Sender<Snapshot>,
    round_changed: broadcast::Sender<u64>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    match event {
                        AccountEvent::Board(board) => {
                            let new_round = board.round_id != state.board.round_id;
                            state.board = board;
                            if new_round {
                                info!("new round detected: {}", board.round_id);
                                // Stale square data must not bleed into the
                                // new round; the round watcher refills it.
                                state.round = Round::zeroed();
                                state.last_deployed = [0; BOARD_SIZE];
                                let _ = round_changed.send(board.round_id);
                            }
                        }
                        AccountEvent::Round(round) => {
                            // Updates for an outgoing round can still be in
                            // flight while re-subscription happens.
                            if round.id == state.board.round_id {
                                state.round = round;
                            } else {
                                debug!("dropping update for inactive round {}", round.id);
                            }
                        }
                        AccountEvent::Treasury(treasury) => state.treasury = treasury,
                        AccountEvent::Miner(miner) => state.miner = Some(miner),
                        AccountEvent::Slot(slot) => state.current_slot = slot,
                    }

                    let snapshot = state.snapshot();
                    if !snapshot.game.changed_squares.is_empty() {
                        debug!("squares changed: {:?}", snapshot.game.changed_squares);
                    }
                    let _ = view_tx.send(snapshot);
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}
