use solana_program::pubkey;
use steel::Pubkey;

pub const PROGRAM_ID: Pubkey = pubkey!("B1ETcSDAmhsESxL3R3Sc9at1PLiyr4riRD2ss9TRYUa8");

/// The seed of the board account PDA.
pub const BOARD: &[u8] = b"board";

/// The seed of the round account PDA.
pub const ROUND: &[u8] = b"round";

/// The seed of the miner account PDA.
pub const MINER: &[u8] = b"miner";

/// The seed of the treasury account PDA.
pub const TREASURY: &[u8] = b"treasury";

/// The seed of the automation account PDA.
pub const AUTOMATION: &[u8] = b"automation";

/// The seed of the stake account PDA.
pub const STAKE: &[u8] = b"stake";

/// The seed of the config account PDA.
pub const CONFIG: &[u8] = b"config";

/// The number of squares on the board (5x5 grid).
pub const BOARD_SIZE: usize = 25;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Smallest indivisible token units per whole ORE. Fixed by the deployed
/// mint; not derived at runtime.
pub const TOKEN_UNITS_PER_ORE: u64 = 100_000_000_000;

/// Target slot duration on the cluster, used to turn slot deltas into
/// wall-clock estimates.
pub const SLOT_DURATION_MS: u64 = 400;

/// Convert a SOL amount to lamports, flooring to the nearest whole
/// lamport. Amounts destined for instruction data must pass through this
/// exactly once.
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64).floor() as u64
}

/// Convert lamports to SOL for display. Never feed the result back into
/// instruction data.
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Convert raw token units to whole ORE for display.
pub fn token_to_ore(units: u64) -> f64 {
    units as f64 / TOKEN_UNITS_PER_ORE as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sol_to_lamports_floors() {
        assert_eq!(sol_to_lamports(0.015), 15_000_000);
        assert_eq!(sol_to_lamports(1.0), LAMPORTS_PER_SOL);
        assert_eq!(sol_to_lamports(0.0000000019), 1);
        assert_eq!(sol_to_lamports(0.0), 0);
    }

    #[test]
    fn lamports_to_sol_is_exact_for_display() {
        assert_eq!(lamports_to_sol(15_000_000), 0.015);
        assert_eq!(lamports_to_sol(1_500_000_000), 1.5);
    }

    #[test]
    fn token_to_ore_uses_protocol_scale() {
        assert_eq!(token_to_ore(TOKEN_UNITS_PER_ORE), 1.0);
        assert_eq!(token_to_ore(TOKEN_UNITS_PER_ORE / 2), 0.5);
    }
}
