//! Token metadata uploads via the NFT.Storage HTTP API.
//!
//! Uploads are strictly best-effort: a missing API key, a network error, or
//! a non-ok response all degrade to `None` and the mint proceeds with an
//! empty on-chain URI.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{AppError, ChainError, MetadataStore};

use super::spl::MESSAGE_TOKEN_SYMBOL;

const UPLOAD_URL: &str = "https://api.nft.storage/upload";
const DEFAULT_GATEWAY: &str = "https://nftstorage.link/ipfs/";

/// NFT.Storage-backed metadata store
pub struct NftStorageClient {
    http_client: Client,
    upload_url: String,
    api_key: SecretString,
    gateway_base_url: String,
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    name: &'a str,
    symbol: &'a str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    ok: bool,
    value: Option<UploadValue>,
}

#[derive(Debug, Deserialize)]
struct UploadValue {
    cid: String,
}

impl NftStorageClient {
    pub fn new(api_key: SecretString, gateway_base_url: Option<&str>) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Chain(ChainError::Connection(e.to_string())))?;
        let gateway_base_url = gateway_base_url.unwrap_or(DEFAULT_GATEWAY).to_string();
        info!(gateway = %gateway_base_url, "Created NFT.Storage client");
        Ok(Self {
            http_client,
            upload_url: UPLOAD_URL.to_string(),
            api_key,
            gateway_base_url,
        })
    }

    fn gateway_link(&self, cid: &str) -> String {
        if self.gateway_base_url.ends_with('/') {
            format!("{}{cid}", self.gateway_base_url)
        } else {
            format!("{}/{cid}", self.gateway_base_url)
        }
    }
}

#[async_trait]
impl MetadataStore for NftStorageClient {
    async fn upload(&self, name: &str, description: &str) -> Option<String> {
        let body = UploadRequest {
            name,
            symbol: MESSAGE_TOKEN_SYMBOL,
            description,
        };

        let response = match self
            .http_client
            .post(&self.upload_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Metadata upload request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Metadata upload rejected");
            return None;
        }

        let parsed: UploadResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Malformed metadata upload response");
                return None;
            }
        };

        match parsed {
            UploadResponse {
                ok: true,
                value: Some(value),
            } => {
                let link = self.gateway_link(&value.cid);
                debug!(cid = %value.cid, "Metadata uploaded");
                Some(link)
            }
            _ => {
                warn!("Metadata upload reported failure");
                None
            }
        }
    }
}
