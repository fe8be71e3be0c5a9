use pumpore::error::DecodeError;
use solana_sdk::signature::Signature;
use thiserror::Error;

/// Client failure taxonomy. Decode failures inside subscription callbacks
/// are logged and absorbed; everything here surfaces from user-initiated
/// calls as a typed result.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to decode {account} account: {source}")]
    Decode {
        account: &'static str,
        #[source]
        source: DecodeError,
    },

    /// The protocol is not initialized, or the caller asked for state that
    /// legitimately requires the account to exist.
    #[error("{account} account not found")]
    AccountNotFound { account: &'static str },

    /// Signing was requested without a usable wallet keypair.
    #[error("wallet not connected: set KEYPAIR_PATH or --keypair-path")]
    NotConnected,

    /// The cluster refused the transaction. The underlying message is
    /// passed through verbatim.
    #[error("transaction rejected: {0}")]
    SubmissionRejected(String),

    /// The blockhash validity window elapsed before confirmation. The
    /// transaction's fate is unknown; callers must not assume it settled.
    #[error("confirmation timed out for {signature}: blockhash expired")]
    ConfirmationTimeout { signature: Signature },

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("subscription error: {0}")]
    Subscribe(String),
}

impl ClientError {
    pub fn decode(account: &'static str, source: DecodeError) -> Self {
        Self::Decode { account, source }
    }
}
