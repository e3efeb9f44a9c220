//! Runtime configuration loaded from the environment.

use secrecy::SecretString;

use crate::domain::{AppError, ConfigError};

/// Server and chain configuration resolved at startup.
///
/// Every field except `database_url` has a sensible development default,
/// so a local `.env` with just `DATABASE_URL` is enough to boot.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string (required).
    pub database_url: String,
    /// Interface to bind the HTTP server to.
    pub host: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Solana JSON-RPC endpoint.
    pub solana_rpc_url: String,
    /// Solana network name used for explorer links (`devnet`, `mainnet-beta`, ...).
    pub solana_network: String,
    /// Base58 private key of the fee-paying service wallet, if sponsoring fees.
    pub solana_payer_private_key: Option<SecretString>,
    /// BNB chain JSON-RPC endpoint.
    pub bnb_rpc_url: String,
    /// BNB network name used for explorer links (`testnet` or `mainnet`).
    pub bnb_network: String,
    /// API key for the nft.storage metadata uploads, if configured.
    pub nft_storage_api_key: Option<SecretString>,
    /// Override for the IPFS gateway used in metadata URIs.
    pub nft_storage_gateway_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` when `DATABASE_URL` is unset and
    /// `ConfigError::InvalidValue` when `PORT` is not a valid port number.
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("'{raw}' is not a valid port number"),
            })?,
            Err(_) => 3000,
        };

        let solana_rpc_url = std::env::var("SOLANA_RPC_URL")
            .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string());
        let solana_network =
            std::env::var("SOLANA_NETWORK").unwrap_or_else(|_| "devnet".to_string());
        let solana_payer_private_key = std::env::var("SOLANA_PAYER_PRIVATE_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from);

        let bnb_rpc_url = std::env::var("BNB_RPC_URL")
            .unwrap_or_else(|_| "https://data-seed-prebsc-1-s1.binance.org:8545".to_string());
        let bnb_network = std::env::var("BNB_NETWORK").unwrap_or_else(|_| "testnet".to_string());

        let nft_storage_api_key = std::env::var("NFT_STORAGE_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from);
        let nft_storage_gateway_url = std::env::var("NFT_STORAGE_GATEWAY_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url,
            host,
            port,
            solana_rpc_url,
            solana_network,
            solana_payer_private_key,
            bnb_rpc_url,
            bnb_network,
            nft_storage_api_key,
            nft_storage_gateway_url,
        })
    }

    /// Socket address string for the HTTP listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
