//! Application state management.
//!
//! This module provides the shared application state that is
//! accessible to all request handlers via Axum's State extractor.

use std::sync::Arc;

use crate::domain::{ChainRegistry, MessageRepository};
use crate::infra::observability::PrometheusHandle;

use super::service::MessageService;

/// Shared application state for the Axum web server.
///
/// All contained types are wrapped in `Arc` and implement `Send + Sync`,
/// making `AppState` safe to share across async tasks.
///
/// # Example
///
/// ```ignore
/// let repository = Arc::new(PostgresMessageStore::with_defaults(&url).await?);
/// let chains = ChainRegistry::new(vec![solana, bnb]);
/// let state = AppState::new(repository, chains, None);
///
/// let router = create_router(state);
/// ```
#[derive(Clone)]
pub struct AppState {
    /// The message service containing business logic.
    pub service: Arc<MessageService>,

    /// Message repository for persistence operations.
    pub repository: Arc<dyn MessageRepository>,

    /// Registered chain clients.
    pub chains: ChainRegistry,

    /// Prometheus handle for rendering GET /metrics, when installed.
    pub metrics: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Creates a new `AppState`, wiring the service to the provided
    /// repository and chain registry.
    #[must_use]
    pub fn new(
        repository: Arc<dyn MessageRepository>,
        chains: ChainRegistry,
        metrics: Option<Arc<PrometheusHandle>>,
    ) -> Self {
        let service = Arc::new(MessageService::new(
            Arc::clone(&repository),
            chains.clone(),
        ));

        Self {
            service,
            repository,
            chains,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Chain;
    use crate::test_utils::{MockChainClient, MockMessageRepository};

    fn test_state() -> AppState {
        let repository = Arc::new(MockMessageRepository::new());
        let chains = ChainRegistry::new(vec![Arc::new(MockChainClient::new(Chain::Solana))]);
        AppState::new(repository, chains, None)
    }

    #[test]
    fn test_app_state_creation() {
        let state = test_state();
        assert!(Arc::strong_count(&state.service) >= 1);
        assert!(state.metrics.is_none());
    }

    #[test]
    fn test_app_state_is_clone() {
        let state = test_state();
        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.service, &cloned.service));
    }
}
