//! Domain traits defining contracts for external systems.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::{AppError, ChainError};
use super::types::{
    AddressCheck, BroadcastOutcome, Chain, MessageRecord, NewMessage, PreparedTransaction,
};

/// Repository trait for the append-only message store.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Check database connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Insert a confirmed message. Fails with `DatabaseError::Duplicate` when
    /// a row with the same transaction signature already exists.
    async fn insert_message(&self, message: &NewMessage) -> Result<MessageRecord, AppError>;

    /// Exact lookup by transaction signature (at most one row).
    async fn find_by_signature(&self, tx_signature: &str)
        -> Result<Option<MessageRecord>, AppError>;

    /// Messages sent by a wallet, newest first.
    async fn sent_by(&self, wallet: &str, limit: i64) -> Result<Vec<MessageRecord>, AppError>;

    /// Messages received by a wallet, newest first.
    async fn received_by(&self, wallet: &str, limit: i64) -> Result<Vec<MessageRecord>, AppError>;

    /// Messages sent or received by a wallet, newest first.
    async fn sent_or_received(
        &self,
        wallet: &str,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, AppError>;

    /// Count of messages sent by a wallet.
    async fn count_sent(&self, wallet: &str) -> Result<i64, AppError>;

    /// Count of messages received by a wallet.
    async fn count_received(&self, wallet: &str) -> Result<i64, AppError>;
}

/// Per-chain strategy for address checks, fee estimation, transaction
/// assembly, and broadcast.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Which chain this client serves.
    fn chain(&self) -> Chain;

    /// Check chain RPC connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Syntactic address check. Malformed input is a `valid: false` answer,
    /// never an `Err`.
    async fn validate_address(&self, address: &str) -> AddressCheck;

    /// Estimate the fee for one message in the chain's native unit. Falls
    /// back to a conservative default when the RPC is unreachable; never
    /// fails the flow.
    async fn estimate_fee(&self) -> f64;

    /// Build the unsigned (or partially signed) transaction for the given
    /// message, base64-encoded for client-side signing.
    async fn build_transaction(
        &self,
        sender: &str,
        receiver: &str,
        message: &str,
    ) -> Result<PreparedTransaction, AppError>;

    /// Broadcast a signed transaction exactly once and wait for confirmation.
    /// Rejection and confirmation timeout surface as distinct errors; neither
    /// triggers a retry here.
    async fn broadcast_and_confirm(
        &self,
        signed_transaction: &str,
    ) -> Result<BroadcastOutcome, AppError>;

    /// Public explorer link for a confirmed transaction.
    fn explorer_link(&self, tx_signature: &str) -> String;
}

/// Best-effort token metadata upload. A `None` means the upload is disabled
/// or failed; the send continues with an empty on-chain URI either way.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn upload(&self, name: &str, description: &str) -> Option<String>;
}

/// Chain dispatch table. Replaces string-keyed branching with an explicit
/// registry of injected clients.
#[derive(Clone, Default)]
pub struct ChainRegistry {
    clients: HashMap<Chain, Arc<dyn ChainClient>>,
}

impl ChainRegistry {
    #[must_use]
    pub fn new(clients: Vec<Arc<dyn ChainClient>>) -> Self {
        let clients = clients.into_iter().map(|c| (c.chain(), c)).collect();
        Self { clients }
    }

    pub fn get(&self, chain: Chain) -> Result<&Arc<dyn ChainClient>, AppError> {
        self.clients
            .get(&chain)
            .ok_or_else(|| AppError::Chain(ChainError::Unsupported(chain.to_string())))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Chain, &Arc<dyn ChainClient>)> {
        self.clients.iter()
    }
}
