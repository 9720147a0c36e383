//! Ledger collaborator stub
//!
//! Fabricates transaction ids and fixed fees in place of a real chain
//! client. Escrow and dispute state held by the services is the source of
//! truth; submissions here are best-effort and callers must treat a
//! failure as log-and-continue, never as the operation's failure.

use crate::error::EscrowError;
use crate::{validation, EscrowResult};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Configuration for the chain client stub
#[derive(Debug, Clone)]
pub struct ChainClientConfig {
    pub node_url: String,
    pub network_identifier: String,
    /// Fallback fee in beddows when no per-type fee applies
    pub min_fee: u64,
}

impl Default for ChainClientConfig {
    fn default() -> Self {
        Self {
            node_url: "ws://localhost:8080/ws".to_string(),
            network_identifier: "devnet".to_string(),
            min_fee: 1_000_000,
        }
    }
}

/// Chain operations the escrow platform submits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainTransactionType {
    CreateEscrow,
    ReleaseEscrow,
    DisputeEscrow,
}

/// Transaction payload handed to the (mock) chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub id: String,
    pub transaction_type: ChainTransactionType,
    pub sender_public_key: String,
    /// Fee in beddows
    pub fee: String,
    pub escrow_id: String,
    pub amount: String,
}

/// Mock chain client
pub struct ChainClient {
    config: ChainClientConfig,
    connected: AtomicBool,
}

impl ChainClient {
    pub fn new(config: ChainClientConfig) -> Self {
        Self {
            config,
            connected: AtomicBool::new(false),
        }
    }

    /// Simulate connecting to a node
    pub async fn connect(&self) -> EscrowResult<()> {
        info!(
            node_url = %self.config.node_url,
            network = %self.config.network_identifier,
            "Connecting chain client"
        );
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Fixed per-operation fee in beddows
    pub fn estimate_fee(&self, transaction_type: ChainTransactionType) -> U256 {
        let fee = match transaction_type {
            ChainTransactionType::CreateEscrow => 2_000_000,
            ChainTransactionType::ReleaseEscrow => 1_500_000,
            ChainTransactionType::DisputeEscrow => 3_000_000,
        };
        U256::from(fee.max(self.config.min_fee))
    }

    /// Submit a transaction, returning its fabricated 64-hex id
    pub async fn submit_transaction(
        &self,
        transaction_type: ChainTransactionType,
        sender_public_key: &str,
        escrow_id: &str,
        amount: &str,
    ) -> EscrowResult<String> {
        if !self.is_connected() {
            self.connect().await?;
        }

        if !validation::is_valid_hex_key(sender_public_key) {
            return Err(EscrowError::chain(format!(
                "Malformed sender public key: {}",
                sender_public_key
            )));
        }

        let transaction = ChainTransaction {
            id: validation::new_transaction_hash(),
            transaction_type,
            sender_public_key: sender_public_key.to_string(),
            fee: self.estimate_fee(transaction_type).to_string(),
            escrow_id: escrow_id.to_string(),
            amount: amount.to_string(),
        };

        info!(
            tx_id = %transaction.id,
            tx_type = ?transaction.transaction_type,
            escrow_id,
            "Submitted chain transaction"
        );

        Ok(transaction.id)
    }
}

impl Default for ChainClient {
    fn default() -> Self {
        Self::new(ChainClientConfig::default())
    }
}
