//! Chain client implementations and transaction encoding.

pub mod bnb;
pub mod metadata_store;
pub mod solana;
pub mod spl;
pub mod wire;

pub use bnb::BnbChainClient;
pub use metadata_store::NftStorageClient;
pub use solana::{RpcClientConfig, SolanaChainClient, signing_key_from_base58};
