use steel::*;

use crate::consts::{BOARD_SIZE, PROGRAM_ID};
use crate::pda::{automation_pda, board_pda, miner_pda, round_pda};

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
pub enum Instructions {
    Initialize = 0,
    StartRound = 1,
    Reveal = 2,
    Claim = 3,
    Stake = 4,
    Unstake = 5,
    Deploy = 6,
}

/// Pack 25 per-square selections into the low bits of a 32-bit mask,
/// bit i selecting square index i (0-indexed).
pub fn pack_squares(squares: &[bool; BOARD_SIZE]) -> u32 {
    let mut mask = 0u32;
    for (i, &square) in squares.iter().enumerate() {
        if square {
            mask |= 1 << i;
        }
    }
    mask
}

pub fn unpack_squares(mask: u32) -> [bool; BOARD_SIZE] {
    let mut squares = [false; BOARD_SIZE];
    for (i, square) in squares.iter_mut().enumerate() {
        *square = mask & (1 << i) != 0;
    }
    squares
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Initialize {}

instruction!(Instructions, Initialize);

/// Creates the board and bootstraps the protocol. One-time admin operation.
pub fn initialize(signer: Pubkey) -> Instruction {
    let board_address = board_pda().0;
    Instruction {
        program_id: PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(signer, true),
            AccountMeta::new(board_address, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: Initialize {}.to_bytes(),
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct StartRound {
    pub round_id: [u8; 8],
}

instruction!(Instructions, StartRound);

pub fn start_round(signer: Pubkey, round_id: u64) -> Instruction {
    let board_address = board_pda().0;
    let round_address = round_pda(round_id).0;
    Instruction {
        program_id: PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(signer, true),
            AccountMeta::new(board_address, false),
            AccountMeta::new(round_address, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: StartRound {
            round_id: round_id.to_le_bytes(),
        }
        .to_bytes(),
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Reveal {}

instruction!(Instructions, Reveal);

/// Locks in the round's slot hash so the winning square can be derived.
pub fn reveal(signer: Pubkey, round_id: u64) -> Instruction {
    let board_address = board_pda().0;
    let round_address = round_pda(round_id).0;
    Instruction {
        program_id: PROGRAM_ID,
        accounts: vec![
            AccountMeta::new_readonly(signer, true),
            AccountMeta::new(board_address, false),
            AccountMeta::new(round_address, false),
            AccountMeta::new_readonly(sysvar::clock::ID, false),
        ],
        data: Reveal {}.to_bytes(),
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Claim {}

instruction!(Instructions, Claim);

pub fn claim(signer: Pubkey, round_id: u64) -> Instruction {
    let board_address = board_pda().0;
    let round_address = round_pda(round_id).0;
    let miner_address = miner_pda(signer).0;
    Instruction {
        program_id: PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(signer, true),
            AccountMeta::new(board_address, false),
            AccountMeta::new(round_address, false),
            AccountMeta::new(miner_address, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: Claim {}.to_bytes(),
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Stake {
    pub amount: [u8; 8],
}

instruction!(Instructions, Stake);

pub fn stake(signer: Pubkey, amount: u64) -> Instruction {
    let board_address = board_pda().0;
    let miner_address = miner_pda(signer).0;
    Instruction {
        program_id: PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(signer, true),
            AccountMeta::new(board_address, false),
            AccountMeta::new(miner_address, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: Stake {
            amount: amount.to_le_bytes(),
        }
        .to_bytes(),
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Unstake {
    pub amount: [u8; 8],
}

instruction!(Instructions, Unstake);

pub fn unstake(signer: Pubkey, amount: u64) -> Instruction {
    let board_address = board_pda().0;
    let miner_address = miner_pda(signer).0;
    Instruction {
        program_id: PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(signer, true),
            AccountMeta::new(board_address, false),
            AccountMeta::new(miner_address, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: Unstake {
            amount: amount.to_le_bytes(),
        }
        .to_bytes(),
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Deploy {
    pub amount: [u8; 8],
    pub squares: [u8; 4],
}

instruction!(Instructions, Deploy);

/// Deploys `amount` lamports to each selected square of the active round.
pub fn deploy(
    signer: Pubkey,
    authority: Pubkey,
    amount: u64,
    round_id: u64,
    squares: [bool; BOARD_SIZE],
) -> Instruction {
    let automation_address = automation_pda(authority).0;
    let board_address = board_pda().0;
    let miner_address = miner_pda(authority).0;
    let round_address = round_pda(round_id).0;

    let mask = pack_squares(&squares);

    Instruction {
        program_id: PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(signer, true),
            AccountMeta::new(authority, false),
            AccountMeta::new(automation_address, false),
            AccountMeta::new(board_address, false),
            AccountMeta::new(miner_address, false),
            AccountMeta::new(round_address, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: Deploy {
            amount: amount.to_le_bytes(),
            squares: mask.to_le_bytes(),
        }
        .to_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_payload_is_opcode_amount_mask() {
        let mut squares = [false; BOARD_SIZE];
        squares[0] = true;
        squares[24] = true;
        let ix = deploy(Pubkey::new_unique(), Pubkey::new_unique(), 15_000_000, 3, squares);

        assert_eq!(ix.data.len(), 13);
        assert_eq!(ix.data[0], Instructions::Deploy as u8);
        assert_eq!(&ix.data[1..9], &15_000_000u64.to_le_bytes());
        assert_eq!(&ix.data[9..13], &((1u32 << 24) | 1).to_le_bytes());
    }

    #[test]
    fn deploy_targets_expected_accounts() {
        let signer = Pubkey::new_unique();
        let ix = deploy(signer, signer, 1, 7, [true; BOARD_SIZE]);

        assert_eq!(ix.program_id, PROGRAM_ID);
        assert_eq!(ix.accounts.len(), 7);
        assert_eq!(ix.accounts[0].pubkey, signer);
        assert!(ix.accounts[0].is_signer);
        assert_eq!(ix.accounts[2].pubkey, automation_pda(signer).0);
        assert_eq!(ix.accounts[3].pubkey, board_pda().0);
        assert_eq!(ix.accounts[4].pubkey, miner_pda(signer).0);
        assert_eq!(ix.accounts[5].pubkey, round_pda(7).0);
        assert_eq!(ix.accounts[6].pubkey, system_program::ID);
        assert!(!ix.accounts[6].is_writable);
    }

    #[test]
    fn amount_payloads_are_opcode_plus_le_amount() {
        let signer = Pubkey::new_unique();

        let ix = stake(signer, 250_000_000);
        assert_eq!(ix.data.len(), 9);
        assert_eq!(ix.data[0], Instructions::Stake as u8);
        assert_eq!(&ix.data[1..9], &250_000_000u64.to_le_bytes());

        let ix = unstake(signer, u64::MAX);
        assert_eq!(ix.data[0], Instructions::Unstake as u8);
        assert_eq!(&ix.data[1..9], &u64::MAX.to_le_bytes());

        let ix = start_round(signer, 99);
        assert_eq!(ix.data.len(), 9);
        assert_eq!(ix.data[0], Instructions::StartRound as u8);
        assert_eq!(&ix.data[1..9], &99u64.to_le_bytes());
    }

    #[test]
    fn bare_payloads_are_a_single_opcode_byte() {
        let signer = Pubkey::new_unique();
        assert_eq!(initialize(signer).data, vec![Instructions::Initialize as u8]);
        assert_eq!(reveal(signer, 1).data, vec![Instructions::Reveal as u8]);
        assert_eq!(claim(signer, 1).data, vec![Instructions::Claim as u8]);
    }

    #[test]
    fn square_mask_round_trips() {
        let subsets: [&[usize]; 5] = [&[], &[0], &[24], &[0, 12, 24], &[1, 3, 5, 7, 9, 11]];
        for subset in subsets {
            let mut squares = [false; BOARD_SIZE];
            for &i in subset {
                squares[i] = true;
            }
            assert_eq!(unpack_squares(pack_squares(&squares)), squares);
        }

        let all = [true; BOARD_SIZE];
        assert_eq!(pack_squares(&all), 0x1FF_FFFF);
        assert_eq!(unpack_squares(0x1FF_FFFF), all);
        // Bits above the board are not reflected back.
        assert_eq!(unpack_squares(0xFFFF_FFFF), all);
    }
}
