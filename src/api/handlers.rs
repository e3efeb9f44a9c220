//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use utoipa::OpenApi;
use validator::Validate;

use crate::app::AppState;
use crate::domain::{
    AddressCheck, AppError, ChainError, ConfirmMessageRequest, CreateTransactionRequest,
    DatabaseError, ErrorDetail, ErrorResponse, EstimatedFeeQuery, ExternalServiceError,
    FeeResponse, HealthResponse, HealthStatus, MessageList, MessageSummary, MessagesOverview,
    OverviewQuery, PreparedTransaction, RateLimitResponse, TokenIdentity, ValidateAddressQuery,
    WalletQuery,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tokenpost API",
        version = "0.1.0",
        description = "Wallet-to-wallet messaging API that mints a one-off token per message on Solana or BNB Chain",
        license(
            name = "MIT"
        )
    ),
    paths(
        validate_address_handler,
        estimated_fee_handler,
        create_transaction_handler,
        confirm_message_handler,
        sent_messages_handler,
        received_messages_handler,
        all_messages_handler,
        overview_handler,
        by_signature_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            crate::domain::Chain,
            AddressCheck,
            FeeResponse,
            CreateTransactionRequest,
            ConfirmMessageRequest,
            PreparedTransaction,
            TokenIdentity,
            MessageSummary,
            MessageList,
            MessagesOverview,
            crate::domain::MessageTotals,
            HealthResponse,
            HealthStatus,
            ErrorResponse,
            ErrorDetail,
            RateLimitResponse,
        )
    ),
    tags(
        (name = "messages", description = "Message minting and query endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Check whether an address is valid for a chain
#[utoipa::path(
    get,
    path = "/api/messages/validate-address",
    tag = "messages",
    params(ValidateAddressQuery),
    responses(
        (status = 200, description = "Address check result", body = AddressCheck),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse)
    )
)]
pub async fn validate_address_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ValidateAddressQuery>,
) -> Result<Json<AddressCheck>, AppError> {
    params.validate()?;
    let check = state
        .service
        .validate_address(&params.address, params.chain)
        .await?;
    Ok(Json(check))
}

/// Estimate the fee for sending one message
#[utoipa::path(
    get,
    path = "/api/messages/estimated-fee",
    tag = "messages",
    params(EstimatedFeeQuery),
    responses(
        (status = 200, description = "Estimated fee in the chain's native unit", body = FeeResponse),
        (status = 400, description = "Unsupported chain", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse)
    )
)]
pub async fn estimated_fee_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EstimatedFeeQuery>,
) -> Result<Json<FeeResponse>, AppError> {
    let fee = state.service.estimated_fee(params.chain).await?;
    Ok(Json(FeeResponse { fee }))
}

/// Build an unsigned message transaction for client-side signing
#[utoipa::path(
    post,
    path = "/api/messages/transaction",
    tag = "messages",
    request_body = CreateTransactionRequest,
    responses(
        (status = 200, description = "Transaction prepared", body = PreparedTransaction),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
        (status = 503, description = "Chain unavailable", body = ErrorResponse)
    )
)]
pub async fn create_transaction_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTransactionRequest>,
) -> Result<Json<PreparedTransaction>, AppError> {
    let prepared = state.service.create_transaction(&payload).await?;
    Ok(Json(prepared))
}

/// Broadcast a signed transaction and persist the confirmed message
#[utoipa::path(
    post,
    path = "/api/messages/confirm",
    tag = "messages",
    request_body = ConfirmMessageRequest,
    responses(
        (status = 200, description = "Message confirmed and persisted", body = MessageSummary),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 402, description = "Insufficient funds", body = ErrorResponse),
        (status = 422, description = "Transaction rejected by the chain", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
        (status = 504, description = "Confirmation timed out", body = ErrorResponse)
    )
)]
pub async fn confirm_message_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ConfirmMessageRequest>,
) -> Result<Json<MessageSummary>, AppError> {
    let summary = state.service.confirm_message(&payload).await?;
    Ok(Json(summary))
}

/// Messages sent by a wallet, newest first
#[utoipa::path(
    get,
    path = "/api/messages/sent",
    tag = "messages",
    params(WalletQuery),
    responses(
        (status = 200, description = "Sent messages", body = [MessageSummary]),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse)
    )
)]
pub async fn sent_messages_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WalletQuery>,
) -> Result<Json<Vec<MessageSummary>>, AppError> {
    params.validate()?;
    let messages = state
        .service
        .sent_messages(&params.wallet_address, params.limit)
        .await?;
    Ok(Json(messages))
}

/// Messages received by a wallet, newest first
#[utoipa::path(
    get,
    path = "/api/messages/received",
    tag = "messages",
    params(WalletQuery),
    responses(
        (status = 200, description = "Received messages", body = [MessageSummary]),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse)
    )
)]
pub async fn received_messages_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WalletQuery>,
) -> Result<Json<Vec<MessageSummary>>, AppError> {
    params.validate()?;
    let messages = state
        .service
        .received_messages(&params.wallet_address, params.limit)
        .await?;
    Ok(Json(messages))
}

/// Messages sent or received by a wallet, newest first
#[utoipa::path(
    get,
    path = "/api/messages/all",
    tag = "messages",
    params(WalletQuery),
    responses(
        (status = 200, description = "Combined message traffic", body = MessageList),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse)
    )
)]
pub async fn all_messages_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WalletQuery>,
) -> Result<Json<MessageList>, AppError> {
    params.validate()?;
    let list = state
        .service
        .all_messages(&params.wallet_address, params.limit)
        .await?;
    Ok(Json(list))
}

/// Recent activity and totals for a wallet
#[utoipa::path(
    get,
    path = "/api/messages/overview",
    tag = "messages",
    params(OverviewQuery),
    responses(
        (status = 200, description = "Wallet overview", body = MessagesOverview),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse)
    )
)]
pub async fn overview_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OverviewQuery>,
) -> Result<Json<MessagesOverview>, AppError> {
    params.validate()?;
    let overview = state
        .service
        .overview(&params.wallet_address, params.recent_limit)
        .await?;
    Ok(Json(overview))
}

/// Look up a message by transaction signature
#[utoipa::path(
    get,
    path = "/api/messages/by-signature/{tx_signature}",
    tag = "messages",
    params(
        ("tx_signature" = String, Path, description = "On-chain transaction signature")
    ),
    responses(
        (status = 200, description = "Message when found, null otherwise", body = Option<MessageSummary>),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse)
    )
)]
pub async fn by_signature_handler(
    State(state): State<Arc<AppState>>,
    Path(tx_signature): Path<String>,
) -> Result<Json<Option<MessageSummary>>, AppError> {
    // An unknown signature is an empty answer, not a 404.
    let found = state.service.message_by_signature(&tx_signature).await?;
    Ok(Json(found))
}

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health_check().await;
    Json(health)
}

/// Kubernetes liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Application is not ready")
    )
)]
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    let health = state.service.health_check().await;
    match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus scrape endpoint
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> axum::response::Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type, message) = match &self {
            AppError::Database(db_err) => match db_err {
                DatabaseError::Connection(_) | DatabaseError::PoolExhausted(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "database_error",
                    self.to_string(),
                ),
                DatabaseError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", self.to_string())
                }
                DatabaseError::Duplicate(_) => {
                    (StatusCode::CONFLICT, "duplicate", self.to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    self.to_string(),
                ),
            },
            AppError::Chain(chain_err) => match chain_err {
                ChainError::Connection(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "chain_error",
                    self.to_string(),
                ),
                ChainError::Rejected(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "transaction_rejected",
                    self.to_string(),
                ),
                ChainError::InvalidTransaction(_) => (
                    StatusCode::BAD_REQUEST,
                    "invalid_transaction",
                    self.to_string(),
                ),
                ChainError::InsufficientFunds => (
                    StatusCode::PAYMENT_REQUIRED,
                    "insufficient_funds",
                    self.to_string(),
                ),
                ChainError::ConfirmationTimeout(_) => (
                    StatusCode::GATEWAY_TIMEOUT,
                    "confirmation_timeout",
                    self.to_string(),
                ),
                ChainError::Unsupported(_) => (
                    StatusCode::BAD_REQUEST,
                    "unsupported_chain",
                    self.to_string(),
                ),
                ChainError::Rpc(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "chain_error",
                    self.to_string(),
                ),
            },
            AppError::ExternalService(ext_err) => match ext_err {
                ExternalServiceError::Timeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "timeout", self.to_string())
                }
                _ => (
                    StatusCode::BAD_GATEWAY,
                    "external_service_error",
                    self.to_string(),
                ),
            },
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                self.to_string(),
            ),
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                self.to_string(),
            ),
            AppError::Serialization(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "serialization_error",
                self.to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                self.to_string(),
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Rate limit exceeded".to_string(),
            ),
        };

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
