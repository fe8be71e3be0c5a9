use serde::{Deserialize, Serialize};
use steel::*;

use crate::consts::BOARD_SIZE;
use crate::error::DecodeError;
use crate::pda::{board_pda, miner_pda, round_pda, treasury_pda};

/// Length of the account header. Only the first byte carries the
/// discriminator; the remainder is zero padding.
pub const ACCOUNT_HEADER_LEN: usize = 8;

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
pub enum GameAccount {
    Miner = 103,
    Treasury = 104,
    Board = 105,
    Stake = 108,
    Round = 109,
}

/// Fixed-layout account data owned by the mining program.
///
/// The Pod struct is the schema: the decoder and the fixture encoder are
/// both derived from it, so every field offset lives in exactly one place.
pub trait AccountData: Pod {
    const KIND: GameAccount;

    /// Minimum valid account length: header plus the fixed body.
    fn min_len() -> usize {
        ACCOUNT_HEADER_LEN + std::mem::size_of::<Self>()
    }

    /// Decode an on-chain account buffer.
    ///
    /// Trailing bytes beyond the fixed body are ignored; live accounts may
    /// carry fields this client does not consume.
    fn try_from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let min = Self::min_len();
        if data.len() < min {
            return Err(DecodeError::TooShort { len: data.len(), min });
        }
        let expected = Self::KIND as u8;
        if data[0] != expected {
            return Err(DecodeError::Discriminator { found: data[0], expected });
        }
        Ok(bytemuck::pod_read_unaligned(&data[ACCOUNT_HEADER_LEN..min]))
    }

    /// Encode as a full account buffer (8-byte discriminator + body).
    fn to_account_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(Self::min_len());
        data.extend_from_slice(&(Self::KIND as u64).to_le_bytes());
        data.extend_from_slice(bytemuck::bytes_of(self));
        data
    }
}

/// Singleton account identifying the active round.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Board {
    /// The current round number.
    pub round_id: u64,

    /// The slot at which the current round starts mining.
    pub start_slot: u64,

    /// The slot at which the current round ends mining. Holds u64::MAX
    /// until the round's first deploy lands.
    pub end_slot: u64,
}

impl Board {
    pub fn pda(&self) -> (Pubkey, u8) {
        board_pda()
    }

    /// Whether the round clock is running yet.
    pub fn has_started(&self) -> bool {
        self.end_slot != u64::MAX
    }
}

impl AccountData for Board {
    const KIND: GameAccount = GameAccount::Board;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Round {
    /// The round number.
    pub id: u64,

    /// The amount of SOL deployed in each square.
    pub deployed: [u64; BOARD_SIZE],

    /// The hash of the end slot, used for random number generation.
    /// All zeroes until the round has been revealed.
    pub slot_hash: [u8; 32],

    /// The count of miners on each square.
    pub count: [u64; BOARD_SIZE],

    /// The slot at which claims for this round account end.
    pub expires_at: u64,

    /// The amount of ORE in the motherlode.
    pub motherlode: u64,

    /// The account to which rent should be returned when this account is closed.
    pub rent_payer: Pubkey,

    /// The top miner of the round.
    pub top_miner: Pubkey,

    /// The amount of ORE to distribute to the top miner.
    pub top_miner_reward: u64,

    /// The total amount of SOL deployed in the round.
    pub total_deployed: u64,

    /// The total amount of SOL put in the ORE vault.
    pub total_vaulted: u64,

    /// The total amount of SOL won by miners for the round.
    pub total_winnings: u64,
}

impl AccountData for Round {
    const KIND: GameAccount = GameAccount::Round;
}

impl Round {
    pub fn pda(&self) -> (Pubkey, u8) {
        round_pda(self.id)
    }

    /// The round's random number, or None if the round has not been
    /// revealed yet.
    pub fn rng(&self) -> Option<u64> {
        if self.slot_hash == [0; 32] {
            return None;
        }
        let r1 = u64::from_le_bytes(self.slot_hash[0..8].try_into().unwrap());
        let r2 = u64::from_le_bytes(self.slot_hash[8..16].try_into().unwrap());
        let r3 = u64::from_le_bytes(self.slot_hash[16..24].try_into().unwrap());
        let r4 = u64::from_le_bytes(self.slot_hash[24..32].try_into().unwrap());
        Some(r1 ^ r2 ^ r3 ^ r4)
    }

    /// The 0-indexed winning square for a revealed round.
    pub fn winning_square(&self, rng: u64) -> usize {
        (rng % BOARD_SIZE as u64) as usize
    }
}

/// Per-wallet mining stats, created by the program on first deploy.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Miner {
    /// The authority of this miner account.
    pub authority: Pubkey,

    /// The miner's SOL deployed on each square in the current round.
    pub deployed: [u64; BOARD_SIZE],

    /// The cumulative amount of SOL deployed on each square prior to this
    /// miner's move.
    pub cumulative: [u64; BOARD_SIZE],

    /// The amount of SOL this miner can claim.
    pub rewards_sol: u64,

    /// The amount of ORE this miner can claim.
    pub rewards_ore: u64,
}

impl AccountData for Miner {
    const KIND: GameAccount = GameAccount::Miner;
}

impl Miner {
    pub fn pda(&self) -> (Pubkey, u8) {
        miner_pda(self.authority)
    }

    /// Total SOL deployed across all squares this round.
    pub fn total_deployed(&self) -> u64 {
        self.deployed.iter().sum()
    }
}

/// Singleton vault account. The live account carries reward-factor fields
/// after `motherlode` that this client does not read.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Treasury {
    /// The amount of SOL collected by the protocol.
    pub balance: u64,

    /// The amount of ORE in the motherlode rewards pool.
    pub motherlode: u64,
}

impl AccountData for Treasury {
    const KIND: GameAccount = GameAccount::Treasury;
}

impl Treasury {
    pub fn pda(&self) -> (Pubkey, u8) {
        treasury_pda()
    }
}

/// Per-wallet staking position, created lazily on first stake.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Stake {
    /// The staked balance.
    pub balance: u64,

    /// The amount of ORE this staker can claim.
    pub rewards: u64,
}

impl AccountData for Stake {
    const KIND: GameAccount = GameAccount::Stake;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_round_trips_through_account_bytes() {
        let board = Board {
            round_id: 42,
            start_slot: 1_000,
            end_slot: 2_500,
        };
        let data = board.to_account_bytes();
        assert_eq!(data.len(), 32);
        assert_eq!(Board::try_from_bytes(&data).unwrap(), board);
    }

    #[test]
    fn u64_le_round_trips_exactly() {
        for value in [0, 1, u64::MAX, u64::MAX - 1, 1 << 53, (1 << 53) + 1] {
            let bytes = value.to_le_bytes();
            assert_eq!(u64::from_le_bytes(bytes), value);
        }
    }

    #[test]
    fn short_buffer_is_a_decode_error() {
        let board = Board {
            round_id: 1,
            start_slot: 2,
            end_slot: 3,
        };
        let data = board.to_account_bytes();
        assert_eq!(
            Board::try_from_bytes(&data[..31]),
            Err(DecodeError::TooShort { len: 31, min: 32 })
        );
        assert_eq!(
            Board::try_from_bytes(&[]),
            Err(DecodeError::TooShort { len: 0, min: 32 })
        );
    }

    #[test]
    fn wrong_discriminator_is_a_decode_error() {
        let round = Round::zeroed();
        let data = round.to_account_bytes();
        assert_eq!(
            Board::try_from_bytes(&data),
            Err(DecodeError::Discriminator {
                found: GameAccount::Round as u8,
                expected: GameAccount::Board as u8,
            })
        );
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let treasury = Treasury {
            balance: 5,
            motherlode: 9,
        };
        let mut data = treasury.to_account_bytes();
        // The live treasury carries reward factors after the fields we read.
        data.extend_from_slice(&[0xAA; 48]);
        assert_eq!(Treasury::try_from_bytes(&data).unwrap(), treasury);
    }

    /// Builds a Round buffer by writing each field at its wire offset,
    /// independent of the struct layout, and checks the decoder agrees.
    #[test]
    fn round_decodes_at_documented_offsets() {
        let mut data = vec![0u8; 560];
        data[0] = GameAccount::Round as u8;

        let put = |data: &mut [u8], offset: usize, value: u64| {
            data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        };

        put(&mut data, 8, 77); // id
        for i in 0..25 {
            put(&mut data, 16 + i * 8, 1_000 + i as u64); // deployed
            put(&mut data, 248 + i * 8, i as u64); // count
        }
        data[216..248].copy_from_slice(&[3u8; 32]); // slot_hash
        put(&mut data, 448, 90_000); // expires_at
        put(&mut data, 456, 123_456); // motherlode
        let rent_payer = Pubkey::new_unique();
        let top_miner = Pubkey::new_unique();
        data[464..496].copy_from_slice(&rent_payer.to_bytes());
        data[496..528].copy_from_slice(&top_miner.to_bytes());
        put(&mut data, 528, 42); // top_miner_reward
        put(&mut data, 536, 25_000); // total_deployed
        put(&mut data, 544, 600); // total_vaulted
        put(&mut data, 552, 24_400); // total_winnings

        let round = Round::try_from_bytes(&data).unwrap();
        assert_eq!(round.id, 77);
        assert_eq!(round.deployed[0], 1_000);
        assert_eq!(round.deployed[24], 1_024);
        assert_eq!(round.slot_hash, [3u8; 32]);
        assert_eq!(round.count[24], 24);
        assert_eq!(round.expires_at, 90_000);
        assert_eq!(round.motherlode, 123_456);
        assert_eq!(round.rent_payer, rent_payer);
        assert_eq!(round.top_miner, top_miner);
        assert_eq!(round.top_miner_reward, 42);
        assert_eq!(round.total_deployed, 25_000);
        assert_eq!(round.total_vaulted, 600);
        assert_eq!(round.total_winnings, 24_400);
    }

    #[test]
    fn miner_decodes_at_documented_offsets() {
        let mut data = vec![0u8; 456];
        data[0] = GameAccount::Miner as u8;
        let authority = Pubkey::new_unique();
        data[8..40].copy_from_slice(&authority.to_bytes());
        data[40..48].copy_from_slice(&7u64.to_le_bytes()); // deployed[0]
        data[240..248].copy_from_slice(&11u64.to_le_bytes()); // cumulative[0]
        data[440..448].copy_from_slice(&13u64.to_le_bytes()); // rewards_sol
        data[448..456].copy_from_slice(&17u64.to_le_bytes()); // rewards_ore

        let miner = Miner::try_from_bytes(&data).unwrap();
        assert_eq!(miner.authority, authority);
        assert_eq!(miner.deployed[0], 7);
        assert_eq!(miner.cumulative[0], 11);
        assert_eq!(miner.rewards_sol, 13);
        assert_eq!(miner.rewards_ore, 17);
        assert_eq!(miner.total_deployed(), 7);
    }

    #[test]
    fn unrevealed_round_has_no_rng() {
        let round = Round::zeroed();
        assert_eq!(round.rng(), None);
    }

    #[test]
    fn winning_square_is_xor_of_hash_words_mod_25() {
        let mut round = Round::zeroed();
        round.slot_hash[0..8].copy_from_slice(&0x1111u64.to_le_bytes());
        round.slot_hash[8..16].copy_from_slice(&0x2222u64.to_le_bytes());
        round.slot_hash[16..24].copy_from_slice(&0x4444u64.to_le_bytes());
        round.slot_hash[24..32].copy_from_slice(&0x8888u64.to_le_bytes());

        let rng = round.rng().unwrap();
        assert_eq!(rng, 0x1111 ^ 0x2222 ^ 0x4444 ^ 0x8888);
        assert_eq!(round.winning_square(rng), (rng % 25) as usize);
        assert!(round.winning_square(rng) < 25);
    }
}
