//! Derived view state
//!
//! Pure composition of decoded accounts into the state the presentation
//! layer consumes. Nothing here touches the network.

use pumpore::consts::{lamports_to_sol, token_to_ore, BOARD_SIZE, SLOT_DURATION_MS};
use pumpore::state::{Board, Miner, Round, Stake, Treasury};
use serde::Serialize;

/// One square of the 5x5 grid. Ids are 1-indexed for display; the wire is
/// 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SquareInfo {
    pub id: u8,
    pub sol: f64,
    pub players: u64,
}

/// Composed view over the board, active round and treasury.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameView {
    pub round_id: u64,

    /// Seconds until the round ends, floored. Zero before the round clock
    /// starts and after it ends.
    pub time_remaining: u64,

    pub total_deployed: f64,

    /// Motherlode jackpot in whole ORE.
    pub motherlode: f64,

    /// 1-indexed winning square, None until the round has been revealed.
    pub winning_square: Option<u8>,

    pub squares: Vec<SquareInfo>,

    /// 1-indexed squares whose deployed amount changed since the previous
    /// view. Transient feedback only; does not affect the persisted view.
    pub changed_squares: Vec<u8>,

    pub treasury_balance: f64,
    pub treasury_motherlode: f64,
}

/// Per-wallet mining stats. Zero-valued when the miner account does not
/// exist yet, which is the normal state for a fresh wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct MinerStats {
    pub total_deployed: f64,
    pub rewards_sol: f64,
    pub rewards_ore: f64,
    pub deployed: [f64; BOARD_SIZE],
}

impl MinerStats {
    pub fn from_account(miner: Option<&Miner>) -> Self {
        match miner {
            None => Self::default(),
            Some(miner) => Self {
                total_deployed: lamports_to_sol(miner.total_deployed()),
                rewards_sol: lamports_to_sol(miner.rewards_sol),
                rewards_ore: token_to_ore(miner.rewards_ore),
                deployed: miner.deployed.map(lamports_to_sol),
            },
        }
    }
}

/// Per-wallet staking position, zero-valued before the first stake.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct StakeView {
    pub staked: f64,
    pub rewards: f64,
}

impl StakeView {
    pub fn from_account(stake: Option<&Stake>) -> Self {
        match stake {
            None => Self::default(),
            Some(stake) => Self {
                staked: lamports_to_sol(stake.balance),
                rewards: token_to_ore(stake.rewards),
            },
        }
    }
}

/// Everything the presentation layer needs in one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub game: GameView,
    pub miner: MinerStats,
}

/// Seconds until the round ends, floored to whole seconds.
pub fn time_remaining(board: &Board, current_slot: u64) -> u64 {
    if !board.has_started() {
        return 0;
    }
    let slots_remaining = board.end_slot.saturating_sub(current_slot);
    slots_remaining * SLOT_DURATION_MS / 1000
}

/// 1-indexed squares whose deployed amount differs between two reads.
pub fn changed_squares(previous: &[u64; BOARD_SIZE], current: &[u64; BOARD_SIZE]) -> Vec<u8> {
    previous
        .iter()
        .zip(current.iter())
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, _)| (i + 1) as u8)
        .collect()
}

pub fn compose(
    board: &Board,
    round: &Round,
    treasury: &Treasury,
    current_slot: u64,
    last_deployed: &[u64; BOARD_SIZE],
) -> GameView {
    let squares = (0..BOARD_SIZE)
        .map(|i| SquareInfo {
            id: (i + 1) as u8,
            sol: lamports_to_sol(round.deployed[i]),
            players: round.count[i],
        })
        .collect();

    GameView {
        round_id: board.round_id,
        time_remaining: time_remaining(board, current_slot),
        total_deployed: lamports_to_sol(round.total_deployed),
        motherlode: token_to_ore(round.motherlode),
        winning_square: round
            .rng()
            .map(|rng| (round.winning_square(rng) + 1) as u8),
        squares,
        changed_squares: changed_squares(last_deployed, &round.deployed),
        treasury_balance: lamports_to_sol(treasury.balance),
        treasury_motherlode: token_to_ore(treasury.motherlode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;
    use pumpore::consts::LAMPORTS_PER_SOL;

    fn board(round_id: u64, end_slot: u64) -> Board {
        Board {
            round_id,
            start_slot: 0,
            end_slot,
        }
    }

    #[test]
    fn time_remaining_floors_slot_delta() {
        // 100 slots at 0.4s per slot.
        assert_eq!(time_remaining(&board(42, 1_100), 1_000), 40);
        // Floored, not rounded.
        assert_eq!(time_remaining(&board(42, 1_001), 1_000), 0);
        assert_eq!(time_remaining(&board(42, 1_004), 1_000), 1);
    }

    #[test]
    fn time_remaining_is_zero_outside_the_round() {
        // Round clock not started yet.
        assert_eq!(time_remaining(&board(42, u64::MAX), 1_000), 0);
        // Round already over.
        assert_eq!(time_remaining(&board(42, 500), 1_000), 0);
    }

    #[test]
    fn compose_builds_25_one_indexed_squares() {
        let mut round = Round::zeroed();
        round.deployed[0] = 2 * LAMPORTS_PER_SOL;
        round.count[0] = 3;
        round.total_deployed = 2 * LAMPORTS_PER_SOL;

        let view = compose(
            &board(7, 1_100),
            &round,
            &Treasury::zeroed(),
            1_000,
            &[0; BOARD_SIZE],
        );

        assert_eq!(view.round_id, 7);
        assert_eq!(view.squares.len(), BOARD_SIZE);
        assert_eq!(view.squares[0].id, 1);
        assert_eq!(view.squares[0].sol, 2.0);
        assert_eq!(view.squares[0].players, 3);
        assert_eq!(view.squares[24].id, 25);
        assert_eq!(view.total_deployed, 2.0);
        assert_eq!(view.winning_square, None);
    }

    #[test]
    fn winning_square_is_one_indexed() {
        let mut round = Round::zeroed();
        // XOR of the four words is 15, so square index 15 wins and the view
        // reports 16.
        round.slot_hash[0..8].copy_from_slice(&1u64.to_le_bytes());
        round.slot_hash[8..16].copy_from_slice(&2u64.to_le_bytes());
        round.slot_hash[16..24].copy_from_slice(&4u64.to_le_bytes());
        round.slot_hash[24..32].copy_from_slice(&8u64.to_le_bytes());

        let view = compose(
            &board(1, 100),
            &round,
            &Treasury::zeroed(),
            0,
            &[0; BOARD_SIZE],
        );
        assert_eq!(view.winning_square, Some(16));
    }

    #[test]
    fn changed_squares_are_elementwise_and_one_indexed() {
        let previous = [0u64; BOARD_SIZE];
        let mut current = [0u64; BOARD_SIZE];
        current[0] = 5;
        current[12] = 1;
        current[24] = 9;
        assert_eq!(changed_squares(&previous, &current), vec![1, 13, 25]);
        assert!(changed_squares(&current, &current).is_empty());
    }

    #[test]
    fn absent_miner_is_a_zero_stats_record() {
        let stats = MinerStats::from_account(None);
        assert_eq!(stats, MinerStats::default());
        assert_eq!(stats.total_deployed, 0.0);
        assert_eq!(stats.rewards_sol, 0.0);
    }

    #[test]
    fn miner_stats_convert_to_display_units() {
        let mut miner = Miner::zeroed();
        miner.deployed[3] = LAMPORTS_PER_SOL / 2;
        miner.deployed[4] = LAMPORTS_PER_SOL / 2;
        miner.rewards_sol = LAMPORTS_PER_SOL;
        let stats = MinerStats::from_account(Some(&miner));
        assert_eq!(stats.total_deployed, 1.0);
        assert_eq!(stats.rewards_sol, 1.0);
        assert_eq!(stats.deployed[3], 0.5);
    }

    #[test]
    fn absent_stake_is_a_zero_position() {
        assert_eq!(StakeView::from_account(None), StakeView::default());
    }

    #[test]
    fn zeroed_round_substitutes_for_a_missing_account() {
        let view = compose(
            &board(1, u64::MAX),
            &Round::zeroed(),
            &Treasury::zeroed(),
            0,
            &[0; BOARD_SIZE],
        );
        assert!(view.squares.iter().all(|s| s.sol == 0.0 && s.players == 0));
        assert_eq!(view.time_remaining, 0);
        assert!(view.changed_squares.is_empty());
    }
}
