//! Transaction submission
//!
//! Builds, signs and sends a single-instruction transaction, then polls
//! for confirmation until the blockhash expires.

use std::sync::Arc;
use std::time::Duration;

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::instruction::Instruction;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use tracing::info;

use crate::error::ClientError;

/// How often to poll signature status while waiting for confirmation.
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct TxSubmitter {
    rpc: Arc<RpcClient>,
    priority_fee: u64,
}

impl TxSubmitter {
    pub fn new(rpc: Arc<RpcClient>, priority_fee: u64) -> Self {
        Self { rpc, priority_fee }
    }

    /// Submit one instruction and wait for confirmation.
    ///
    /// A cluster refusal surfaces as SubmissionRejected with the underlying
    /// message; blockhash expiry before confirmation surfaces as
    /// ConfirmationTimeout. A timed-out transaction's fate is unknown and
    /// it is never re-sent from here. Local view state is not touched;
    /// callers observe the result through the account subscriptions.
    pub async fn submit(
        &self,
        payer: &Keypair,
        ix: Instruction,
    ) -> Result<Signature, ClientError> {
        let (blockhash, last_valid_block_height) = self
            .rpc
            .get_latest_blockhash_with_commitment(CommitmentConfig::confirmed())
            .await
            .map_err(|e| ClientError::Rpc(e.to_string()))?;

        let mut instructions = Vec::with_capacity(2);
        if self.priority_fee > 0 {
            instructions.push(ComputeBudgetInstruction::set_compute_unit_price(
                self.priority_fee,
            ));
        }
        instructions.push(ix);

        let tx = Transaction::new_signed_with_payer(
            &instructions,
            Some(&payer.pubkey()),
            &[payer],
            blockhash,
        );

        let signature = self
            .rpc
            .send_transaction(&tx)
            .await
            .map_err(|e| ClientError::SubmissionRejected(e.to_string()))?;

        info!("Sent transaction: {}", signature);
        self.confirm(signature, last_valid_block_height).await
    }

    async fn confirm(
        &self,
        signature: Signature,
        last_valid_block_height: u64,
    ) -> Result<Signature, ClientError> {
        loop {
            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;

            let statuses = self
                .rpc
                .get_signature_statuses(&[signature])
                .await
                .map_err(|e| ClientError::Rpc(e.to_string()))?;

            if let Some(status) = statuses.value.first().and_then(|s| s.as_ref()) {
                if let Some(err) = &status.err {
                    return Err(ClientError::SubmissionRejected(err.to_string()));
                }
                if status.satisfies_commitment(CommitmentConfig::confirmed()) {
                    return Ok(signature);
                }
            }

            let block_height = self
                .rpc
                .get_block_height()
                .await
                .map_err(|e| ClientError::Rpc(e.to_string()))?;
            if block_height > last_valid_block_height {
                return Err(ClientError::ConfirmationTimeout { signature });
            }
        }
    }
}
