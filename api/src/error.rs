use thiserror::Error;

/// Failure to interpret an on-chain account buffer. The whole decode is
/// discarded; callers never see a partially filled struct.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("account data too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("unexpected account discriminator {found}, expected {expected}")]
    Discriminator { found: u8, expected: u8 },
}
