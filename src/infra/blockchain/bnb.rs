//! BNB Smart Chain client over Ethereum JSON-RPC.
//!
//! No token mint here: the message rides in the transaction's calldata as
//! UTF-8, attached to a small fixed-value transfer. The server prepares the
//! unsigned call as JSON; the sender's wallet fills in nonce and signature
//! and returns the raw signed transaction for broadcast.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    AddressCheck, AppError, BroadcastOutcome, Chain, ChainClient, ChainError,
    PreparedTransaction,
};

use super::solana::RpcClientConfig;

/// Gas budget for a value transfer with a short calldata payload.
const MESSAGE_GAS_LIMIT: u128 = 26_000;

/// Value attached to every message: 0.0001 BNB in wei.
const MESSAGE_VALUE_WEI: u128 = 100_000_000_000_000;

const WEI_PER_BNB: f64 = 1e18;

/// Fee quoted when the RPC node cannot be reached.
const FALLBACK_FEE_BNB: f64 = 0.001;

/// BNB Smart Chain JSON-RPC client
pub struct BnbChainClient {
    http_client: Client,
    rpc_url: String,
    network: String,
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
struct TransactionReceipt {
    status: Option<String>,
    #[serde(rename = "gasUsed")]
    gas_used: Option<String>,
    #[serde(rename = "effectiveGasPrice")]
    effective_gas_price: Option<String>,
}

/// The unsigned call handed to the sender's wallet, JSON inside base64.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnsignedCall {
    to: String,
    /// Wei, decimal string.
    value: String,
    /// Message bytes, 0x-prefixed hex.
    data: String,
    gas_limit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas_price: Option<String>,
}

impl BnbChainClient {
    /// Create a new BNB chain client with custom configuration
    pub fn new(rpc_url: &str, network: &str, config: RpcClientConfig) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Chain(ChainError::Connection(e.to_string())))?;
        info!(rpc_url = %rpc_url, network = %network, "Created BNB chain client");
        Ok(Self {
            http_client,
            rpc_url: rpc_url.to_string(),
            network: network.to_string(),
            config,
        })
    }

    /// Create a new BNB chain client with default configuration
    pub fn with_defaults(rpc_url: &str, network: &str) -> Result<Self, AppError> {
        Self::new(rpc_url, network, RpcClientConfig::default())
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
            if error.message.contains("insufficient funds") {
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

    async fn gas_price_wei(&self) -> Result<u128, AppError> {
        let hex: String = self.rpc_call("eth_gasPrice", Vec::<()>::new()).await?;
        parse_hex_quantity(&hex)
    }

    /// Poll for the transaction receipt until mined, reverted, or timed out.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, AppError> {
        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(500);

        while start.elapsed() < self.config.confirmation_timeout {
            let params = serde_json::json!([tx_hash]);
            match self
                .do_rpc_call::<_, Option<TransactionReceipt>>("eth_getTransactionReceipt", &params)
                .await
            {
                Ok(Some(receipt)) => {
                    if receipt.status.as_deref() == Some("0x0") {
                        return Err(AppError::Chain(ChainError::Rejected(
                            "execution reverted".to_string(),
                        )));
                    }
                    info!(tx_hash = %tx_hash, "Transaction mined");
                    return Ok(receipt);
                }
                Ok(None) => {
                    debug!(tx_hash = %tx_hash, "Transaction not yet mined");
                }
                Err(e) => {
                    warn!(tx_hash = %tx_hash, error = ?e, "Error fetching receipt");
                }
            }
            tokio::time::sleep(poll_interval).await;
        }

        Err(AppError::Chain(ChainError::ConfirmationTimeout(format!(
            "transaction {} not mined within {}s",
            tx_hash,
            self.config.confirmation_timeout.as_secs()
        ))))
    }
}

#[async_trait]
impl ChainClient for BnbChainClient {
    fn chain(&self) -> Chain {
        Chain::Bnb
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let _: String = self.rpc_call("eth_blockNumber", Vec::<()>::new()).await?;
        Ok(())
    }

    async fn validate_address(&self, address: &str) -> AddressCheck {
        if is_valid_bnb_address(address) {
            AddressCheck::valid()
        } else {
            AddressCheck::invalid("Invalid BNB wallet address")
        }
    }

    #[instrument(skip(self))]
    async fn estimate_fee(&self) -> f64 {
        match self.gas_price_wei().await {
            Ok(gas_price) => {
                (gas_price * MESSAGE_GAS_LIMIT + MESSAGE_VALUE_WEI) as f64 / WEI_PER_BNB
            }
            Err(e) => {
                warn!(error = ?e, "Fee estimation failed, using fallback");
                FALLBACK_FEE_BNB
            }
        }
    }

    #[instrument(skip(self, message))]
    async fn build_transaction(
        &self,
        _sender: &str,
        receiver: &str,
        message: &str,
    ) -> Result<PreparedTransaction, AppError> {
        if !is_valid_bnb_address(receiver) {
            return Err(AppError::Chain(ChainError::InvalidTransaction(
                "Invalid receiver address".to_string(),
            )));
        }

        // Gas price is advisory; the wallet may override it at signing time.
        let gas_price = match self.gas_price_wei().await {
            Ok(price) => Some(format!("0x{price:x}")),
            Err(e) => {
                warn!(error = ?e, "Could not fetch gas price for unsigned call");
                None
            }
        };

        let call = UnsignedCall {
            to: receiver.to_string(),
            value: MESSAGE_VALUE_WEI.to_string(),
            data: format!("0x{}", hex::encode(message.as_bytes())),
            gas_limit: MESSAGE_GAS_LIMIT.to_string(),
            gas_price,
        };
        let payload = serde_json::to_vec(&call)?;

        let estimated_fee = self.estimate_fee().await;

        Ok(PreparedTransaction {
            transaction: BASE64.encode(&payload),
            token_identity: None,
            metadata_uri: None,
            estimated_fee,
            chain: Chain::Bnb,
        })
    }

    #[instrument(skip(self, signed_transaction))]
    async fn broadcast_and_confirm(
        &self,
        signed_transaction: &str,
    ) -> Result<BroadcastOutcome, AppError> {
        let raw = BASE64.decode(signed_transaction).map_err(|e| {
            AppError::Chain(ChainError::InvalidTransaction(e.to_string()))
        })?;
        let raw_hex = String::from_utf8(raw).map_err(|_| {
            AppError::Chain(ChainError::InvalidTransaction(
                "Signed transaction is not hex-encoded".to_string(),
            ))
        })?;
        if !raw_hex.starts_with("0x") {
            return Err(AppError::Chain(ChainError::InvalidTransaction(
                "Signed transaction must be 0x-prefixed".to_string(),
            )));
        }

        // One attempt only, same as Solana.
        let params = serde_json::json!([raw_hex]);
        let tx_hash: String = self
            .do_rpc_call("eth_sendRawTransaction", &params)
            .await
            .map_err(|e| match e {
                AppError::Chain(ChainError::Rpc(message)) => {
                    AppError::Chain(ChainError::Rejected(message))
                }
                other => other,
            })?;
        info!(tx_hash = %tx_hash, "Transaction broadcast");

        let receipt = self.wait_for_receipt(&tx_hash).await?;

        let gas_used = receipt
            .gas_used
            .as_deref()
            .and_then(|h| parse_hex_quantity(h).ok())
            .unwrap_or(0);
        let gas_price = receipt
            .effective_gas_price
            .as_deref()
            .and_then(|h| parse_hex_quantity(h).ok())
            .unwrap_or(0);
        let fee_paid = (gas_used * gas_price + MESSAGE_VALUE_WEI) as f64 / WEI_PER_BNB;

        Ok(BroadcastOutcome {
            tx_signature: tx_hash,
            fee_paid,
        })
    }

    fn explorer_link(&self, tx_signature: &str) -> String {
        if self.network == "mainnet" {
            format!("https://bscscan.com/tx/{tx_signature}")
        } else {
            format!("https://testnet.bscscan.com/tx/{tx_signature}")
        }
    }
}

fn parse_hex_quantity(hex: &str) -> Result<u128, AppError> {
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    u128::from_str_radix(digits, 16)
        .map_err(|e| AppError::Chain(ChainError::Rpc(format!("Malformed hex quantity: {e}"))))
}

/// Syntactic address check with EIP-55 checksum verification.
///
/// All-lowercase and all-uppercase hex are accepted without a checksum;
/// mixed case must match the Keccak-derived casing exactly.
fn is_valid_bnb_address(address: &str) -> bool {
    let Some(hex_part) = address.strip_prefix("0x") else {
        return false;
    };
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }

    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    if !(has_upper && has_lower) {
        return true;
    }

    let lowercase = hex_part.to_ascii_lowercase();
    let hash = Keccak256::digest(lowercase.as_bytes());

    hex_part.chars().enumerate().all(|(i, c)| {
        if c.is_ascii_digit() {
            return true;
        }
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if nibble >= 8 {
            c.is_ascii_uppercase()
        } else {
            c.is_ascii_lowercase()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> BnbChainClient {
        BnbChainClient::with_defaults(
            "https://data-seed-prebsc-1-s1.binance.org:8545",
            "testnet",
        )
        .unwrap()
    }

    #[test]
    fn test_valid_checksummed_address() {
        // EIP-55 reference vectors.
        assert!(is_valid_bnb_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(is_valid_bnb_address("0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359"));
    }

    #[test]
    fn test_all_lowercase_accepted_without_checksum() {
        assert!(is_valid_bnb_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        // First letter's case flipped.
        assert!(!is_valid_bnb_address("0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
    }

    #[test]
    fn test_malformed_addresses_rejected() {
        assert!(!is_valid_bnb_address(""));
        assert!(!is_valid_bnb_address("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
        assert!(!is_valid_bnb_address("0x5aaeb6"));
        assert!(!is_valid_bnb_address("0xzzzzb6053f3e94c9b9a09f33669435e7ef1beaed"));
    }

    #[tokio::test]
    async fn test_validate_address_error_message() {
        let client = test_client();
        let check = client.validate_address("nonsense").await;
        assert!(!check.valid);
        assert_eq!(check.error.as_deref(), Some("Invalid BNB wallet address"));
    }

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_hex_quantity("0x5208").unwrap(), 21_000);
        assert_eq!(parse_hex_quantity("5208").unwrap(), 21_000);
        assert!(parse_hex_quantity("0xnope").is_err());
    }

    #[test]
    fn test_explorer_link_per_network() {
        let testnet = test_client();
        assert_eq!(
            testnet.explorer_link("0xabc"),
            "https://testnet.bscscan.com/tx/0xabc"
        );

        let mainnet =
            BnbChainClient::with_defaults("https://bsc-dataseed.binance.org", "mainnet").unwrap();
        assert_eq!(mainnet.explorer_link("0xabc"), "https://bscscan.com/tx/0xabc");
    }

    #[test]
    fn test_unsigned_call_serializes_camel_case() {
        let call = UnsignedCall {
            to: "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".to_string(),
            value: MESSAGE_VALUE_WEI.to_string(),
            data: "0x68656c6c6f".to_string(),
            gas_limit: MESSAGE_GAS_LIMIT.to_string(),
            gas_price: None,
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["gasLimit"], "26000");
        assert_eq!(json["value"], "100000000000000");
        assert!(json.get("gasPrice").is_none());
    }

    #[test]
    fn test_message_hex_encoding_roundtrip() {
        let message = "gm, here is a token";
        let encoded = format!("0x{}", hex::encode(message.as_bytes()));
        let decoded = hex::decode(encoded.strip_prefix("0x").unwrap()).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), message);
    }
}
