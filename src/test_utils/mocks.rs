//! Mock implementations for testing.
//!
//! In-memory implementations of the domain traits, configurable to simulate
//! success, duplicate signatures, broadcast rejection, and confirmation
//! timeouts.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::{
    AddressCheck, AppError, BroadcastOutcome, Chain, ChainClient, ChainError, DatabaseError,
    MessageRecord, MessageRepository, NewMessage, PreparedTransaction, TokenIdentity,
};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// If true, operations will fail.
    pub should_fail: bool,
    /// Custom error message for failures.
    pub error_message: Option<String>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that always fails.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }
}

/// Mock message repository for testing.
///
/// Stores rows in memory in insertion order and enforces the same
/// signature-uniqueness rule as the Postgres store.
///
/// # Example
///
/// ```ignore
/// let mock = MockMessageRepository::new();
/// let failing = MockMessageRepository::failing("connection lost");
/// ```
pub struct MockMessageRepository {
    storage: Arc<Mutex<Vec<MessageRecord>>>,
    config: MockConfig,
    call_count: AtomicU64,
    is_healthy: AtomicBool,
}

impl MockMessageRepository {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    /// Creates a new mock with the given configuration.
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            storage: Arc::new(Mutex::new(Vec::new())),
            config,
            call_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
        }
    }

    /// Creates a mock that always fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Gets the number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Gets all stored records in insertion order.
    pub fn records(&self) -> Vec<MessageRecord> {
        self.storage.lock().unwrap().clone()
    }

    /// Clears all stored records.
    pub fn clear(&self) {
        self.storage.lock().unwrap().clear();
    }

    fn increment_call_count(&self) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock database error".to_string());
            return Err(AppError::Database(DatabaseError::Query(msg)));
        }
        Ok(())
    }

    fn filtered(
        &self,
        predicate: impl Fn(&MessageRecord) -> bool,
        limit: i64,
    ) -> Vec<MessageRecord> {
        // Newest first, like the real store's ORDER BY created_at DESC.
        self.storage
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| predicate(r))
            .take(limit.max(0) as usize)
            .cloned()
            .collect()
    }
}

impl Default for MockMessageRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageRepository for MockMessageRepository {
    async fn health_check(&self) -> Result<(), AppError> {
        self.increment_call_count();

        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Mock database unhealthy".to_string(),
            )));
        }

        self.check_should_fail()
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<MessageRecord, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let mut storage = self.storage.lock().unwrap();
        if storage
            .iter()
            .any(|r| r.tx_signature == message.tx_signature)
        {
            return Err(AppError::Database(DatabaseError::Duplicate(format!(
                "duplicate key value violates unique constraint: {}",
                message.tx_signature
            ))));
        }

        let record = MessageRecord {
            id: uuid::Uuid::new_v4(),
            chain: message.chain,
            sender: message.sender.clone(),
            receiver: message.receiver.clone(),
            message: message.message.clone(),
            tx_signature: message.tx_signature.clone(),
            token_address: message.token_address.clone(),
            fee_paid: message.fee_paid,
            created_at: Utc::now(),
        };
        storage.push(record.clone());

        Ok(record)
    }

    async fn find_by_signature(
        &self,
        tx_signature: &str,
    ) -> Result<Option<MessageRecord>, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let storage = self.storage.lock().unwrap();
        Ok(storage
            .iter()
            .find(|r| r.tx_signature == tx_signature)
            .cloned())
    }

    async fn sent_by(&self, wallet: &str, limit: i64) -> Result<Vec<MessageRecord>, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;
        Ok(self.filtered(|r| r.sender == wallet, limit))
    }

    async fn received_by(&self, wallet: &str, limit: i64) -> Result<Vec<MessageRecord>, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;
        Ok(self.filtered(|r| r.receiver == wallet, limit))
    }

    async fn sent_or_received(
        &self,
        wallet: &str,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;
        Ok(self.filtered(|r| r.sender == wallet || r.receiver == wallet, limit))
    }

    async fn count_sent(&self, wallet: &str) -> Result<i64, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;
        let storage = self.storage.lock().unwrap();
        Ok(storage.iter().filter(|r| r.sender == wallet).count() as i64)
    }

    async fn count_received(&self, wallet: &str) -> Result<i64, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;
        let storage = self.storage.lock().unwrap();
        Ok(storage.iter().filter(|r| r.receiver == wallet).count() as i64)
    }
}

/// Mock chain client for testing.
///
/// Addresses shorter than 32 characters, or containing `"Short"`, are
/// reported invalid. Broadcasts are recorded and answered with
/// deterministic signatures.
///
/// # Example
///
/// ```ignore
/// let solana = MockChainClient::new(Chain::Solana);
/// let rejecting = MockChainClient::rejecting(Chain::Solana, "blockhash not found");
/// ```
pub struct MockChainClient {
    chain: Chain,
    failure: Option<ChainError>,
    fixed_signature: Option<String>,
    broadcasts: Arc<Mutex<Vec<String>>>,
    call_count: AtomicU64,
    is_healthy: AtomicBool,
}

impl MockChainClient {
    /// Creates a new mock that succeeds.
    #[must_use]
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            failure: None,
            fixed_signature: None,
            broadcasts: Arc::new(Mutex::new(Vec::new())),
            call_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
        }
    }

    /// Creates a mock whose broadcasts are rejected by the chain.
    #[must_use]
    pub fn rejecting(chain: Chain, message: impl Into<String>) -> Self {
        let mut mock = Self::new(chain);
        mock.failure = Some(ChainError::Rejected(message.into()));
        mock
    }

    /// Creates a mock whose broadcasts never confirm in time.
    #[must_use]
    pub fn timing_out(chain: Chain) -> Self {
        let mut mock = Self::new(chain);
        mock.failure = Some(ChainError::ConfirmationTimeout(
            "mock transaction not confirmed within 60s".to_string(),
        ));
        mock
    }

    /// Creates a mock that fails every chain operation.
    #[must_use]
    pub fn failing(chain: Chain, message: impl Into<String>) -> Self {
        let mut mock = Self::new(chain);
        mock.failure = Some(ChainError::Rpc(message.into()));
        mock
    }

    /// Creates a mock whose broadcasts always yield the same signature.
    /// Useful for exercising duplicate-signature handling.
    #[must_use]
    pub fn with_fixed_signature(chain: Chain, signature: impl Into<String>) -> Self {
        let mut mock = Self::new(chain);
        mock.fixed_signature = Some(signature.into());
        mock
    }

    /// Gets the number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Gets all broadcast payloads.
    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().unwrap().clone()
    }

    fn increment_call_count(&self) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        match &self.failure {
            Some(error) => Err(AppError::Chain(error.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.increment_call_count();

        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Chain(ChainError::Connection(
                "Mock chain unhealthy".to_string(),
            )));
        }

        Ok(())
    }

    async fn validate_address(&self, address: &str) -> AddressCheck {
        self.increment_call_count();

        if address.len() >= 32 && !address.contains("Short") {
            AddressCheck::valid()
        } else {
            AddressCheck::invalid(format!(
                "Invalid {} wallet address",
                self.chain.display_name()
            ))
        }
    }

    async fn estimate_fee(&self) -> f64 {
        self.increment_call_count();
        0.002
    }

    async fn build_transaction(
        &self,
        _sender: &str,
        _receiver: &str,
        _message: &str,
    ) -> Result<PreparedTransaction, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let token_identity = (self.chain == Chain::Solana).then(|| TokenIdentity {
            public_key: "MockMint1111111111111111111111111111111111".to_string(),
            secret_key: "MockMintSecret".to_string(),
        });

        Ok(PreparedTransaction {
            transaction: "bW9jay10cmFuc2FjdGlvbg==".to_string(),
            token_identity,
            metadata_uri: None,
            estimated_fee: 0.002,
            chain: self.chain,
        })
    }

    async fn broadcast_and_confirm(
        &self,
        signed_transaction: &str,
    ) -> Result<BroadcastOutcome, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let mut broadcasts = self.broadcasts.lock().unwrap();
        broadcasts.push(signed_transaction.to_string());

        let tx_signature = self
            .fixed_signature
            .clone()
            .unwrap_or_else(|| format!("mock_sig_{}", broadcasts.len()));

        Ok(BroadcastOutcome {
            tx_signature,
            fee_paid: 0.000005,
        })
    }

    fn explorer_link(&self, tx_signature: &str) -> String {
        format!(
            "https://explorer.test/{}/tx/{tx_signature}",
            self.chain.as_str()
        )
    }
}
