//! Solana chain client: address checks, fee estimation, mint transaction
//! assembly, and broadcast over plain JSON-RPC.
//!
//! Every message becomes a fresh zero-decimal SPL mint. The server builds
//! the transaction, signs for the mint keypair (and the fee payer when one
//! is configured), and returns it base64-encoded for the sender's wallet to
//! complete.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    AddressCheck, AppError, BroadcastOutcome, Chain, ChainClient, ChainError, MetadataStore,
    PreparedTransaction, TokenIdentity,
};

use super::spl::{
    self, MINT_ACCOUNT_LEN, MESSAGE_TOKEN_SYMBOL, TOKEN_PROGRAM_ID,
    build_create_account, build_create_associated_token_account, build_create_metadata_v3,
    build_initialize_mint2, build_mint_to, derive_associated_token_address,
    derive_metadata_address,
};
use super::wire::{Instruction, compile_transaction, serialize_partially_signed};

/// Lamports per signature, the fixed Solana transaction fee component.
const LAMPORTS_PER_SIGNATURE: u64 = 5_000;

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Fee quoted when the RPC node cannot be reached.
const FALLBACK_FEE_SOL: f64 = 0.002;

/// Configuration for the RPC client
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub confirmation_timeout: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            confirmation_timeout: Duration::from_secs(60),
        }
    }
}

/// Solana JSON-RPC chain client
pub struct SolanaChainClient {
    http_client: Client,
    rpc_url: String,
    network: String,
    /// When set, the service pays transaction fees instead of the sender.
    payer: Option<SigningKey>,
    metadata_store: Option<Arc<dyn MetadataStore>>,
    config: RpcClientConfig,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<T: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    params: T,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BlockhashResponse {
    blockhash: String,
    #[serde(rename = "lastValidBlockHeight")]
    #[allow(dead_code)]
    last_valid_block_height: u64,
}

#[derive(Debug, Deserialize)]
struct BlockhashResult {
    value: BlockhashResponse,
}

#[derive(Debug, Deserialize)]
struct SignatureStatus {
    err: Option<serde_json::Value>,
    #[serde(rename = "confirmationStatus")]
    confirmation_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignatureStatusResult {
    value: Vec<Option<SignatureStatus>>,
}

#[derive(Debug, Deserialize)]
struct TransactionMeta {
    fee: u64,
}

#[derive(Debug, Deserialize)]
struct TransactionResult {
    meta: Option<TransactionMeta>,
}

impl SolanaChainClient {
    /// Create a new Solana chain client with custom configuration
    pub fn new(
        rpc_url: &str,
        network: &str,
        payer: Option<SigningKey>,
        metadata_store: Option<Arc<dyn MetadataStore>>,
        config: RpcClientConfig,
    ) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Chain(ChainError::Connection(e.to_string())))?;
        info!(rpc_url = %rpc_url, network = %network, "Created Solana chain client");
        Ok(Self {
            http_client,
            rpc_url: rpc_url.to_string(),
            network: network.to_string(),
            payer,
            metadata_store,
            config,
        })
    }

    /// Create a new Solana chain client with default configuration
    pub fn with_defaults(rpc_url: &str, network: &str) -> Result<Self, AppError> {
        Self::new(rpc_url, network, None, None, RpcClientConfig::default())
    }

    /// Make a read-only RPC call with retries
    #[instrument(skip(self, params))]
    async fn rpc_call<P: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, AppError> {
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay).await;
            }
            match self.do_rpc_call(method, &params).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!(attempt = attempt, error = ?e, method = %method, "RPC call failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| AppError::Chain(ChainError::Rpc("Unknown error".to_string()))))
    }

    /// Execute a single RPC call
    async fn do_rpc_call<P: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<R, AppError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: method.to_string(),
            params,
        };

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Chain(ChainError::Connection(e.to_string())))?;

        let rpc_response: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| AppError::Chain(ChainError::Rpc(e.to_string())))?;

        if let Some(error) = rpc_response.error {
            if error.message.contains("insufficient") || error.code == -32002 {
                return Err(AppError::Chain(ChainError::InsufficientFunds));
            }
            return Err(AppError::Chain(ChainError::Rpc(format!(
                "{}: {}",
                error.code, error.message
            ))));
        }

        rpc_response
            .result
            .ok_or_else(|| AppError::Chain(ChainError::Rpc("Empty response".to_string())))
    }

    async fn latest_blockhash(&self) -> Result<[u8; 32], AppError> {
        let result: BlockhashResult = self
            .rpc_call("getLatestBlockhash", Vec::<()>::new())
            .await?;
        decode_pubkey(&result.value.blockhash)
            .map_err(|_| AppError::Chain(ChainError::Rpc("Malformed blockhash".to_string())))
    }

    async fn mint_rent_lamports(&self) -> Result<u64, AppError> {
        self.rpc_call(
            "getMinimumBalanceForRentExemption",
            serde_json::json!([MINT_ACCOUNT_LEN]),
        )
        .await
    }

    /// Best-effort metadata upload. Failures degrade to an empty URI.
    async fn upload_metadata(&self, message: &str) -> Option<String> {
        let store = self.metadata_store.as_ref()?;
        let name = spl::metadata_name(message);
        store.upload(&name, message).await
    }

    async fn confirmed_fee_sol(&self, signature: &str) -> f64 {
        let params = serde_json::json!([
            signature,
            {"encoding": "json", "maxSupportedTransactionVersion": 0}
        ]);
        match self
            .do_rpc_call::<_, Option<TransactionResult>>("getTransaction", &params)
            .await
        {
            Ok(Some(TransactionResult { meta: Some(meta) })) => {
                meta.fee as f64 / LAMPORTS_PER_SOL
            }
            Ok(_) => {
                warn!(signature = %signature, "Confirmed transaction has no fee metadata");
                0.0
            }
            Err(e) => {
                warn!(signature = %signature, error = ?e, "Could not fetch transaction fee");
                0.0
            }
        }
    }

    /// Poll signature status until confirmed, rejected, or timed out.
    async fn wait_for_confirmation(&self, signature: &str) -> Result<(), AppError> {
        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(500);

        while start.elapsed() < self.config.confirmation_timeout {
            let params = serde_json::json!([[signature], {"searchTransactionHistory": true}]);
            match self
                .do_rpc_call::<_, SignatureStatusResult>("getSignatureStatuses", &params)
                .await
            {
                Ok(result) => {
                    if let Some(Some(status)) = result.value.first() {
                        if let Some(err) = &status.err {
                            return Err(AppError::Chain(ChainError::Rejected(format!(
                                "{err:?}"
                            ))));
                        }
                        let confirmed = matches!(
                            status.confirmation_status.as_deref(),
                            Some("confirmed") | Some("finalized")
                        );
                        if confirmed {
                            info!(signature = %signature, "Transaction confirmed");
                            return Ok(());
                        }
                    }
                    debug!(signature = %signature, "Transaction not yet confirmed");
                }
                Err(e) => {
                    warn!(signature = %signature, error = ?e, "Error checking signature status");
                }
            }
            tokio::time::sleep(poll_interval).await;
        }

        Err(AppError::Chain(ChainError::ConfirmationTimeout(format!(
            "transaction {} not confirmed within {}s",
            signature,
            self.config.confirmation_timeout.as_secs()
        ))))
    }
}

#[async_trait]
impl ChainClient for SolanaChainClient {
    fn chain(&self) -> Chain {
        Chain::Solana
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let _: u64 = self.rpc_call("getSlot", Vec::<()>::new()).await?;
        Ok(())
    }

    async fn validate_address(&self, address: &str) -> AddressCheck {
        match decode_pubkey(address) {
            Ok(bytes) if spl::is_on_curve(&bytes) => AddressCheck::valid(),
            _ => AddressCheck::invalid("Invalid Solana wallet address"),
        }
    }

    #[instrument(skip(self))]
    async fn estimate_fee(&self) -> f64 {
        // With a service payer the sender pays nothing.
        if self.payer.is_some() {
            return 0.0;
        }
        match self.mint_rent_lamports().await {
            // Mint rent plus two signatures (sender + mint keypair).
            Ok(rent) => (rent + 2 * LAMPORTS_PER_SIGNATURE) as f64 / LAMPORTS_PER_SOL,
            Err(e) => {
                warn!(error = ?e, "Fee estimation failed, using fallback");
                FALLBACK_FEE_SOL
            }
        }
    }

    #[instrument(skip(self, message))]
    async fn build_transaction(
        &self,
        sender: &str,
        receiver: &str,
        message: &str,
    ) -> Result<PreparedTransaction, AppError> {
        let sender_key = decode_pubkey(sender).map_err(|_| {
            AppError::Chain(ChainError::InvalidTransaction(
                "Invalid sender public key".to_string(),
            ))
        })?;
        let receiver_key = decode_pubkey(receiver).map_err(|_| {
            AppError::Chain(ChainError::InvalidTransaction(
                "Invalid receiver public key".to_string(),
            ))
        })?;

        let mint = SigningKey::generate(&mut OsRng);
        let mint_pubkey = mint.verifying_key().to_bytes();

        let metadata_uri = self.upload_metadata(message).await;

        let rent = self.mint_rent_lamports().await?;
        let blockhash = self.latest_blockhash().await?;

        let fee_payer = self
            .payer
            .as_ref()
            .map_or(sender_key, |p| p.verifying_key().to_bytes());

        let receiver_ata = derive_associated_token_address(&receiver_key, &mint_pubkey)?;
        let metadata_account = derive_metadata_address(&mint_pubkey)?;

        let instructions: Vec<Instruction> = vec![
            build_create_account(
                &fee_payer,
                &mint_pubkey,
                rent,
                MINT_ACCOUNT_LEN,
                &TOKEN_PROGRAM_ID,
            ),
            build_initialize_mint2(&mint_pubkey, 0, &sender_key, &sender_key),
            build_create_metadata_v3(
                &metadata_account,
                &mint_pubkey,
                &sender_key,
                &fee_payer,
                &sender_key,
                &spl::metadata_name(message),
                MESSAGE_TOKEN_SYMBOL,
                metadata_uri.as_deref().unwrap_or(""),
            ),
            build_create_associated_token_account(
                &fee_payer,
                &receiver_ata,
                &receiver_key,
                &mint_pubkey,
            ),
            build_mint_to(&mint_pubkey, &receiver_ata, &sender_key, 1),
        ];

        let tx = compile_transaction(&instructions, &fee_payer, &blockhash)?;

        let mut signers: Vec<&SigningKey> = vec![&mint];
        if let Some(payer) = &self.payer {
            signers.push(payer);
        }
        let wire = serialize_partially_signed(&tx, &signers)?;

        let estimated_fee = if self.payer.is_some() {
            0.0
        } else {
            (rent + 2 * LAMPORTS_PER_SIGNATURE) as f64 / LAMPORTS_PER_SOL
        };

        debug!(
            mint = %bs58::encode(mint_pubkey).into_string(),
            instructions = instructions.len(),
            "Built mint transaction"
        );

        Ok(PreparedTransaction {
            transaction: BASE64.encode(&wire),
            token_identity: Some(mint_identity(&mint)),
            metadata_uri,
            estimated_fee,
            chain: Chain::Solana,
        })
    }

    #[instrument(skip(self, signed_transaction))]
    async fn broadcast_and_confirm(
        &self,
        signed_transaction: &str,
    ) -> Result<BroadcastOutcome, AppError> {
        BASE64.decode(signed_transaction).map_err(|e| {
            AppError::Chain(ChainError::InvalidTransaction(e.to_string()))
        })?;

        // One attempt only. A retried broadcast could double-spend if the
        // first send landed but the response was lost.
        let params = serde_json::json!([signed_transaction, {"encoding": "base64"}]);
        let signature: String = self
            .do_rpc_call("sendTransaction", &params)
            .await
            .map_err(|e| match e {
                AppError::Chain(ChainError::Rpc(message)) => {
                    AppError::Chain(ChainError::Rejected(message))
                }
                other => other,
            })?;
        info!(signature = %signature, "Transaction broadcast");

        self.wait_for_confirmation(&signature).await?;
        let fee_paid = self.confirmed_fee_sol(&signature).await;

        Ok(BroadcastOutcome {
            tx_signature: signature,
            fee_paid,
        })
    }

    fn explorer_link(&self, tx_signature: &str) -> String {
        if self.network == "mainnet-beta" {
            format!("https://solscan.io/tx/{tx_signature}")
        } else {
            format!("https://solscan.io/tx/{tx_signature}?cluster={}", self.network)
        }
    }
}

fn decode_pubkey(address: &str) -> Result<[u8; 32], ()> {
    let bytes = bs58::decode(address).into_vec().map_err(|_| ())?;
    bytes.try_into().map_err(|_| ())
}

fn mint_identity(mint: &SigningKey) -> TokenIdentity {
    // 64-byte Solana keypair format: seed followed by public key.
    let mut keypair = mint.to_bytes().to_vec();
    keypair.extend_from_slice(mint.verifying_key().as_bytes());
    TokenIdentity {
        public_key: bs58::encode(mint.verifying_key().as_bytes()).into_string(),
        secret_key: bs58::encode(&keypair).into_string(),
    }
}

/// Parse a base58-encoded private key into a SigningKey
pub fn signing_key_from_base58(secret: &SecretString) -> Result<SigningKey, AppError> {
    let key_bytes = bs58::decode(secret.expose_secret())
        .into_vec()
        .map_err(|e| AppError::Chain(ChainError::InvalidTransaction(e.to_string())))?;

    // Handle both 32-byte (seed) and 64-byte (keypair) formats
    let key_array: [u8; 32] = if key_bytes.len() == 64 {
        // Solana keypair format: first 32 bytes are the secret key
        key_bytes[..32].try_into().map_err(|_| {
            AppError::Chain(ChainError::InvalidTransaction(
                "Invalid keypair format".to_string(),
            ))
        })?
    } else if key_bytes.len() == 32 {
        key_bytes.try_into().map_err(|v: Vec<u8>| {
            AppError::Chain(ChainError::InvalidTransaction(format!(
                "Key must be 32 bytes, got {}",
                v.len()
            )))
        })?
    } else {
        return Err(AppError::Chain(ChainError::InvalidTransaction(format!(
            "Key must be 32 or 64 bytes, got {}",
            key_bytes.len()
        ))));
    };

    Ok(SigningKey::from_bytes(&key_array))
}
