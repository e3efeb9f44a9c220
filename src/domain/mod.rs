//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    AppError, ChainError, ConfigError, DatabaseError, ExternalServiceError, ValidationError,
};
pub use traits::{ChainClient, ChainRegistry, MessageRepository, MetadataStore};
pub use types::{
    AddressCheck, BroadcastOutcome, Chain, ConfirmMessageRequest, CreateTransactionRequest,
    ErrorDetail, ErrorResponse, EstimatedFeeQuery, FeeResponse, HealthResponse, HealthStatus,
    MessageList, MessageRecord, MessageSummary, MessageTotals, MessagesOverview, NewMessage,
    OverviewQuery, PreparedTransaction, RateLimitResponse, TokenIdentity, ValidateAddressQuery,
    WalletQuery,
};
