//! Core domain types for wallet-to-wallet token messages.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// The chains a message token can be minted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Solana,
    Bnb,
}

impl Chain {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Bnb => "bnb",
        }
    }

    /// Human-readable name used in validation error messages.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Chain::Solana => "Solana",
            Chain::Bnb => "BNB",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solana" => Ok(Chain::Solana),
            "bnb" => Ok(Chain::Bnb),
            other => Err(format!("unknown chain: {other}")),
        }
    }
}

/// A confirmed message as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRecord {
    pub id: Uuid,
    pub chain: Chain,
    pub sender: String,
    pub receiver: String,
    pub message: String,
    pub tx_signature: String,
    pub token_address: Option<String>,
    pub fee_paid: f64,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a confirmed message. The id and timestamp are
/// assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chain: Chain,
    pub sender: String,
    pub receiver: String,
    pub message: String,
    pub tx_signature: String,
    pub token_address: Option<String>,
    pub fee_paid: f64,
}

/// API-facing view of a message, with the explorer link derived per chain.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub id: Uuid,
    pub chain: Chain,
    pub sender: String,
    pub receiver: String,
    pub message: String,
    pub tx_signature: String,
    pub token_address: Option<String>,
    pub fee_paid: f64,
    pub created_at: DateTime<Utc>,
    pub explorer_link: String,
}

impl MessageSummary {
    #[must_use]
    pub fn from_record(record: MessageRecord, explorer_link: String) -> Self {
        Self {
            id: record.id,
            chain: record.chain,
            sender: record.sender,
            receiver: record.receiver,
            message: record.message,
            tx_signature: record.tx_signature,
            token_address: record.token_address,
            fee_paid: record.fee_paid,
            created_at: record.created_at,
            explorer_link,
        }
    }
}

/// Outcome of a syntactic address check. Malformed input is a `valid: false`
/// answer, never an error.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AddressCheck {
    #[must_use]
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    #[must_use]
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Keypair material for the single-use mint, handed to the client so it can
/// reconstruct the token identity. Solana only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenIdentity {
    /// Base58-encoded mint public key.
    pub public_key: String,
    /// Base58-encoded 64-byte mint keypair (seed + public key).
    pub secret_key: String,
}

/// An unsigned (or partially signed) transaction prepared for client-side
/// signing, base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreparedTransaction {
    pub transaction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_identity: Option<TokenIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_uri: Option<String>,
    pub estimated_fee: f64,
    pub chain: Chain,
}

/// Result of broadcasting a signed transaction and waiting for confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastOutcome {
    pub tx_signature: String,
    /// Actual fee paid in the chain's native unit (SOL / BNB), read from the
    /// confirmed transaction.
    pub fee_paid: f64,
}

/// Per-wallet message counts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageTotals {
    pub sent: i64,
    pub received: i64,
    pub combined: i64,
}

/// Dashboard payload: recent traffic plus counts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessagesOverview {
    pub recent: Vec<MessageSummary>,
    pub totals: MessageTotals,
}

/// List wrapper returned by the combined query.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    pub messages: Vec<MessageSummary>,
}

fn validate_not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank")
            .with_message("Message cannot be empty".into()));
    }
    Ok(())
}

/// Request payload for building an unsigned message transaction.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    #[validate(length(min = 32, max = 64))]
    pub sender_public_key: String,
    #[validate(length(min = 32, max = 64))]
    pub receiver_address: String,
    #[validate(
        length(max = 500, message = "Message must be at most 500 characters"),
        custom(function = validate_not_blank)
    )]
    pub message: String,
    pub chain: Chain,
}

/// Request payload for broadcasting a signed transaction and persisting the
/// confirmed message.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmMessageRequest {
    #[validate(length(min = 32, max = 64))]
    pub sender_public_key: String,
    #[validate(length(min = 32, max = 64))]
    pub receiver_address: String,
    #[validate(
        length(max = 500, message = "Message must be at most 500 characters"),
        custom(function = validate_not_blank)
    )]
    pub message: String,
    /// Base64-encoded fully signed transaction.
    #[validate(length(min = 1, message = "Signed transaction is required"))]
    pub signed_transaction: String,
    /// Mint address for Solana messages; absent for BNB.
    pub token_address: Option<String>,
    pub chain: Chain,
}

/// Query parameters for address validation.
#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ValidateAddressQuery {
    #[validate(length(min = 32, max = 64))]
    pub address: String,
    pub chain: Chain,
}

/// Query parameters for fee estimation.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedFeeQuery {
    pub chain: Chain,
}

/// Query parameters for per-wallet message listings.
#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct WalletQuery {
    #[validate(length(min = 32, max = 64))]
    pub wallet_address: String,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

fn default_recent_limit() -> i64 {
    5
}

/// Query parameters for the wallet overview.
#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct OverviewQuery {
    #[validate(length(min = 32, max = 64))]
    pub wallet_address: String,
    #[serde(default = "default_recent_limit")]
    #[validate(range(min = 1, max = 100))]
    pub recent_limit: i64,
}

/// Fee estimate response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeeResponse {
    pub fee: f64,
}

/// Health check status for services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check response for the application.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub database: HealthStatus,
    pub chains: BTreeMap<String, HealthStatus>,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    #[must_use]
    pub fn new(database: HealthStatus, chains: BTreeMap<String, HealthStatus>) -> Self {
        let any_unhealthy = database == HealthStatus::Unhealthy
            || chains.values().any(|s| *s == HealthStatus::Unhealthy);
        let all_healthy = database == HealthStatus::Healthy
            && chains.values().all(|s| *s == HealthStatus::Healthy);

        let status = if all_healthy {
            HealthStatus::Healthy
        } else if any_unhealthy && database == HealthStatus::Unhealthy {
            HealthStatus::Unhealthy
        } else if any_unhealthy {
            // An unreachable chain degrades the service but reads still work.
            HealthStatus::Degraded
        } else {
            HealthStatus::Degraded
        };

        Self {
            status,
            database,
            chains,
            timestamp: Utc::now(),
        }
    }
}

/// Structured error detail for API responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub r#type: String,
    pub message: String,
}

/// Standard error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Rate limit error response with retry hint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RateLimitResponse {
    pub error: ErrorDetail,
    pub retry_after: u64,
}
