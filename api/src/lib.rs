pub mod consts;
pub mod error;
pub mod instruction;
pub mod pda;
pub mod state;

use steel::Pubkey;

pub fn id() -> Pubkey {
    consts::PROGRAM_ID
}
