use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tokenpost::api::{create_router_with_rate_limit, router::RateLimitConfig};
use tokenpost::app::AppState;
use tokenpost::config::Config;
use tokenpost::domain::{ChainRegistry, MetadataStore};
use tokenpost::infra::{
    BnbChainClient, NftStorageClient, PostgresMessageStore, RpcClientConfig, SolanaChainClient,
    init_metrics_handle, signing_key_from_base58,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let metrics = init_metrics_handle();
    if metrics.is_none() {
        warn!("Prometheus recorder unavailable, GET /metrics will return 404");
    }

    // Database
    let store = PostgresMessageStore::with_defaults(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    store
        .run_migrations()
        .await
        .context("failed to run database migrations")?;
    let repository = Arc::new(store);

    // Solana client, optionally with a fee-paying service wallet and a
    // metadata store for token metadata uploads.
    let payer = match &config.solana_payer_private_key {
        Some(secret) => {
            let key = signing_key_from_base58(secret)
                .context("SOLANA_PAYER_PRIVATE_KEY is not a valid base58 ed25519 key")?;
            let pubkey = bs58::encode(key.verifying_key().as_bytes()).into_string();
            info!(payer = %pubkey, "fee payer wallet configured, transaction fees are sponsored");
            Some(key)
        }
        None => {
            info!("no fee payer configured, senders pay their own fees");
            None
        }
    };

    let metadata_store: Option<Arc<dyn MetadataStore>> = match &config.nft_storage_api_key {
        Some(api_key) => {
            let client =
                NftStorageClient::new(api_key.clone(), config.nft_storage_gateway_url.as_deref())
                    .context("failed to create nft.storage client")?;
            Some(Arc::new(client))
        }
        None => {
            info!("no nft.storage API key configured, tokens are minted without metadata URIs");
            None
        }
    };

    let solana = Arc::new(
        SolanaChainClient::new(
            &config.solana_rpc_url,
            &config.solana_network,
            payer,
            metadata_store,
            RpcClientConfig::default(),
        )
        .context("failed to create Solana chain client")?,
    );
    let bnb = Arc::new(
        BnbChainClient::new(
            &config.bnb_rpc_url,
            &config.bnb_network,
            RpcClientConfig::default(),
        )
        .context("failed to create BNB chain client")?,
    );

    let chains = ChainRegistry::new(vec![solana, bnb]);

    let app_state = Arc::new(AppState::new(repository, chains, metrics));

    let router = create_router_with_rate_limit(app_state, RateLimitConfig::from_env());

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to install Ctrl+C handler");
        return;
    }
    info!("shutdown signal received");
}
