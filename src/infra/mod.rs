//! Infrastructure layer implementations.

pub mod blockchain;
pub mod database;
pub mod observability;

pub use blockchain::{
    BnbChainClient, NftStorageClient, RpcClientConfig, SolanaChainClient,
    signing_key_from_base58,
};
pub use database::{PostgresConfig, PostgresMessageStore};
pub use observability::{PrometheusHandle, init_metrics, init_metrics_handle};
