//! Tokenpost
//!
//! A wallet-to-wallet messaging API that records each message on-chain by
//! minting a one-off token carrying the message text, then persists the
//! confirmed transaction for later retrieval.
//!
//! # Architecture Overview
//!
//! This crate is organized into four main layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │  HTTP handlers, routing, request validation  │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │    Business logic, service orchestration     │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │   Traits, types, errors (no dependencies)    │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │  Database adapters, blockchain clients, etc. │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Key Features
//!
//! - **Multi-chain**: Solana and BNB clients behind one [`domain::ChainClient`]
//!   trait, selected per request through a [`domain::ChainRegistry`]
//! - **Dependency injection**: Components receive their dependencies through constructors
//! - **Testability**: Mock implementations enable fast, isolated unit tests
//! - **Error handling**: Hierarchical error types with proper context preservation
//! - **Validation**: Input validation using the `validator` crate
//! - **Logging**: Structured logging with `tracing`
//! - **Security**: Secret management with `secrecy` crate
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tokenpost::api::create_router;
//! use tokenpost::app::AppState;
//! use tokenpost::domain::ChainRegistry;
//! use tokenpost::infra::{PostgresMessageStore, SolanaChainClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(PostgresMessageStore::with_defaults(&database_url).await?);
//!     let solana = Arc::new(SolanaChainClient::with_defaults(&rpc_url, "devnet"));
//!     let chains = ChainRegistry::new(vec![solana]);
//!
//!     let state = Arc::new(AppState::new(store, chains, None));
//!
//!     let router = create_router(state);
//!     axum::serve(listener, router).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

// Test utilities are available in tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
