//! Application service layer.
//!
//! Orchestrates the message flow between the repository and the per-chain
//! clients: validate, build, broadcast, persist, query. Holds only trait
//! abstractions so every dependency can be injected.

use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AddressCheck, AppError, Chain, ChainError, ChainRegistry, ConfirmMessageRequest,
    CreateTransactionRequest, DatabaseError, HealthResponse, HealthStatus, MessageList, MessageRecord, MessageRepository,
    MessageSummary, MessageTotals, MessagesOverview, NewMessage, PreparedTransaction,
    ValidationError,
};

const DEFAULT_QUERY_LIMIT: i64 = 100;

/// Message service containing the core business logic.
///
/// # Example
///
/// ```ignore
/// let repository = Arc::new(PostgresMessageStore::with_defaults(&url).await?);
/// let chains = ChainRegistry::new(vec![solana, bnb]);
/// let service = MessageService::new(repository, chains);
///
/// let prepared = service.create_transaction(&request).await?;
/// ```
pub struct MessageService {
    repository: Arc<dyn MessageRepository>,
    chains: ChainRegistry,
}

impl MessageService {
    #[must_use]
    pub fn new(repository: Arc<dyn MessageRepository>, chains: ChainRegistry) -> Self {
        Self { repository, chains }
    }

    /// Checks whether an address is syntactically valid for the given chain.
    ///
    /// # Errors
    ///
    /// Returns an `AppError` only when the chain itself is unsupported; a
    /// malformed address is a `valid: false` answer.
    #[instrument(skip(self))]
    pub async fn validate_address(
        &self,
        address: &str,
        chain: Chain,
    ) -> Result<AddressCheck, AppError> {
        let client = self.chains.get(chain)?;
        Ok(client.validate_address(address).await)
    }

    /// Estimates the fee for sending one message on the given chain.
    ///
    /// # Errors
    ///
    /// Returns an `AppError` only when the chain is unsupported; RPC trouble
    /// degrades to a conservative fallback fee inside the client.
    #[instrument(skip(self))]
    pub async fn estimated_fee(&self, chain: Chain) -> Result<f64, AppError> {
        let client = self.chains.get(chain)?;
        Ok(client.estimate_fee().await)
    }

    /// Builds an unsigned (or partially signed) message transaction.
    ///
    /// The workflow:
    /// 1. Validates the request payload (message length, field presence)
    /// 2. Validates the receiver address, then the sender address
    /// 3. Delegates transaction assembly to the chain client
    ///
    /// No chain call happens until the payload itself is valid.
    ///
    /// # Errors
    ///
    /// Returns an `AppError` if validation fails or the chain client cannot
    /// assemble the transaction.
    #[instrument(skip(self, request), fields(chain = %request.chain))]
    pub async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<PreparedTransaction, AppError> {
        request.validate().map_err(|e| {
            warn!(error = %e, "Validation failed for create transaction request");
            AppError::Validation(ValidationError::Multiple(e.to_string()))
        })?;

        let client = self.chains.get(request.chain)?;

        // Receiver first, then sender, so the caller sees receiver problems
        // even when both are wrong.
        let receiver_check = client.validate_address(&request.receiver_address).await;
        if !receiver_check.valid {
            return Err(AppError::Validation(ValidationError::InvalidField {
                field: "receiverAddress".to_string(),
                message: receiver_check
                    .error
                    .unwrap_or_else(|| "Invalid receiver address".to_string()),
            }));
        }

        let sender_check = client.validate_address(&request.sender_public_key).await;
        if !sender_check.valid {
            return Err(AppError::Validation(ValidationError::InvalidField {
                field: "senderPublicKey".to_string(),
                message: "Invalid sender address".to_string(),
            }));
        }

        info!("Building message transaction");
        client
            .build_transaction(
                &request.sender_public_key,
                &request.receiver_address,
                &request.message,
            )
            .await
    }

    /// Broadcasts a signed transaction, waits for confirmation, and persists
    /// the message.
    ///
    /// The broadcast happens exactly once. A duplicate signature on insert is
    /// treated as an idempotent replay: the existing row is returned instead
    /// of an error. A persistence failure after a confirmed broadcast is the
    /// worst case (the fee is spent, the record is missing) and is logged and
    /// counted before being propagated.
    ///
    /// # Errors
    ///
    /// Returns an `AppError` if validation fails, the chain rejects the
    /// transaction, confirmation times out, or persistence fails.
    #[instrument(skip(self, request), fields(chain = %request.chain))]
    pub async fn confirm_message(
        &self,
        request: &ConfirmMessageRequest,
    ) -> Result<MessageSummary, AppError> {
        request.validate().map_err(|e| {
            warn!(error = %e, "Validation failed for confirm message request");
            AppError::Validation(ValidationError::Multiple(e.to_string()))
        })?;

        let client = self.chains.get(request.chain)?;

        let outcome = match client
            .broadcast_and_confirm(&request.signed_transaction)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(e, AppError::Chain(ChainError::Rejected(_))) {
                    counter!("messages_rejected_total").increment(1);
                }
                return Err(e);
            }
        };
        info!(tx_signature = %outcome.tx_signature, "Transaction confirmed on-chain");

        let new_message = NewMessage {
            chain: request.chain,
            sender: request.sender_public_key.clone(),
            receiver: request.receiver_address.clone(),
            message: request.message.clone(),
            tx_signature: outcome.tx_signature.clone(),
            token_address: request.token_address.clone(),
            fee_paid: outcome.fee_paid,
        };

        let record = match self.repository.insert_message(&new_message).await {
            Ok(record) => {
                counter!("messages_confirmed_total").increment(1);
                record
            }
            Err(AppError::Database(DatabaseError::Duplicate(_))) => {
                warn!(
                    tx_signature = %outcome.tx_signature,
                    "Signature already recorded, returning existing row"
                );
                self.repository
                    .find_by_signature(&outcome.tx_signature)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(
                            "Duplicate signature reported but row is missing".to_string(),
                        )
                    })?
            }
            Err(e) => {
                error!(
                    tx_signature = %outcome.tx_signature,
                    error = ?e,
                    "Transaction confirmed on-chain but persistence failed"
                );
                counter!("messages_persist_failures_total").increment(1);
                return Err(e);
            }
        };

        Ok(self.summarize(record))
    }

    /// Messages sent by a wallet, newest first.
    #[instrument(skip(self))]
    pub async fn sent_messages(
        &self,
        wallet: &str,
        limit: Option<i64>,
    ) -> Result<Vec<MessageSummary>, AppError> {
        let records = self
            .repository
            .sent_by(wallet, normalize_limit(limit))
            .await?;
        Ok(records.into_iter().map(|r| self.summarize(r)).collect())
    }

    /// Messages received by a wallet, newest first.
    #[instrument(skip(self))]
    pub async fn received_messages(
        &self,
        wallet: &str,
        limit: Option<i64>,
    ) -> Result<Vec<MessageSummary>, AppError> {
        let records = self
            .repository
            .received_by(wallet, normalize_limit(limit))
            .await?;
        Ok(records.into_iter().map(|r| self.summarize(r)).collect())
    }

    /// Messages sent or received by a wallet, newest first.
    #[instrument(skip(self))]
    pub async fn all_messages(
        &self,
        wallet: &str,
        limit: Option<i64>,
    ) -> Result<MessageList, AppError> {
        let records = self
            .repository
            .sent_or_received(wallet, normalize_limit(limit))
            .await?;
        Ok(MessageList {
            messages: records.into_iter().map(|r| self.summarize(r)).collect(),
        })
    }

    /// Recent activity plus sent/received/combined totals for a wallet.
    #[instrument(skip(self))]
    pub async fn overview(
        &self,
        wallet: &str,
        recent_limit: i64,
    ) -> Result<MessagesOverview, AppError> {
        let (recent, sent, received) = tokio::try_join!(
            self.repository
                .sent_or_received(wallet, recent_limit.clamp(1, DEFAULT_QUERY_LIMIT)),
            self.repository.count_sent(wallet),
            self.repository.count_received(wallet),
        )?;

        Ok(MessagesOverview {
            recent: recent.into_iter().map(|r| self.summarize(r)).collect(),
            totals: MessageTotals {
                sent,
                received,
                combined: sent + received,
            },
        })
    }

    /// Exact lookup by transaction signature.
    #[instrument(skip(self))]
    pub async fn message_by_signature(
        &self,
        tx_signature: &str,
    ) -> Result<Option<MessageSummary>, AppError> {
        let record = self.repository.find_by_signature(tx_signature).await?;
        Ok(record.map(|r| self.summarize(r)))
    }

    /// Performs a health check on the repository and every registered chain.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let database = match self.repository.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "Database health check failed");
                HealthStatus::Unhealthy
            }
        };

        let mut chains = BTreeMap::new();
        for (chain, client) in self.chains.iter() {
            let status = match client.health_check().await {
                Ok(()) => HealthStatus::Healthy,
                Err(e) => {
                    warn!(chain = %chain, error = ?e, "Chain health check failed");
                    HealthStatus::Unhealthy
                }
            };
            chains.insert(chain.as_str().to_string(), status);
        }

        HealthResponse::new(database, chains)
    }

    fn summarize(&self, record: MessageRecord) -> MessageSummary {
        let explorer_link = self
            .chains
            .get(record.chain)
            .map(|client| client.explorer_link(&record.tx_signature))
            .unwrap_or_default();
        MessageSummary::from_record(record, explorer_link)
    }
}

fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_QUERY_LIMIT).clamp(1, DEFAULT_QUERY_LIMIT)
}
