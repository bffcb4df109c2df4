//! Bitcoin Core JSON-RPC source
//!
//! Range and block lookups are sent as a single JSON-RPC batch per call. Replies
//! are matched back to their requests by id, so a node answering out of order
//! still yields results in request order.

use async_trait::async_trait;
use chainetl_common::{EtlError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::NodeSource;
use crate::config::IngestConfig;
use crate::types::{Block, BlockHash};

/// Default timeout for RPC requests in seconds.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
    #[serde(default)]
    id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC client for a Bitcoin Core compatible node
#[derive(Debug, Clone)]
pub struct RpcSource {
    client: Client,
    url: String,
    user: Option<String>,
    password: Option<String>,
}

impl RpcSource {
    pub fn new(
        url: impl Into<String>,
        user: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(source_error)?;

        Ok(Self {
            client,
            url: url.into(),
            user,
            password,
        })
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        Self::new(
            config.rpc_url.clone(),
            config.rpc_user.clone(),
            config.rpc_password.clone(),
            config.rpc_timeout(),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue a single call.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: 0,
            method,
            params,
        };
        let reply: RpcResponse = self.post(&request).await?;
        decode_reply(method, reply)
    }

    /// Issue every call in one batch and return the results in call order.
    pub async fn batch<T: DeserializeOwned>(
        &self,
        method: &str,
        params: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<T>> {
        let requests: Vec<RpcRequest<'_>> = params
            .into_iter()
            .enumerate()
            .map(|(id, params)| RpcRequest {
                jsonrpc: "1.0",
                id: id as u64,
                method,
                params,
            })
            .collect();
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        debug!(method, calls = requests.len(), url = %self.url, "sending RPC batch");
        let mut replies: Vec<RpcResponse> = self.post(&requests).await?;
        if replies.len() != requests.len() {
            return Err(EtlError::Source(format!(
                "{method}: expected {} replies, got {}",
                requests.len(),
                replies.len()
            )));
        }

        replies.sort_by_key(|reply| reply.id);
        replies
            .into_iter()
            .enumerate()
            .map(|(index, reply)| {
                if reply.id != Some(index as u64) {
                    return Err(EtlError::Source(format!(
                        "{method}: missing reply for request {index}"
                    )));
                }
                decode_reply(method, reply)
            })
            .collect()
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(&self, body: &B) -> Result<R> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref());
        }

        let response = request.send().await.map_err(source_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(source_error)?;

        // Bitcoin Core reports RPC errors with a JSON body and a non-2xx status,
        // so the body is decoded before the status is considered.
        serde_json::from_slice(&bytes).map_err(|err| {
            if status.is_success() {
                EtlError::Source(format!("invalid RPC response: {err}"))
            } else {
                EtlError::Source(format!("RPC request failed with HTTP {status}"))
            }
        })
    }
}

fn decode_reply<T: DeserializeOwned>(method: &str, reply: RpcResponse) -> Result<T> {
    if let Some(error) = reply.error {
        return Err(EtlError::Source(format!(
            "{method} failed: {} (code {})",
            error.message, error.code
        )));
    }
    serde_json::from_value(reply.result).map_err(EtlError::from)
}

fn source_error(err: reqwest::Error) -> EtlError {
    EtlError::Source(err.to_string())
}

#[async_trait]
impl NodeSource for RpcSource {
    async fn block_hashes_by_range(&self, min: i64, max: i64) -> Result<Vec<BlockHash>> {
        if min > max {
            return Err(EtlError::Validation(format!(
                "min block number ({min}) must be less than or equal to max block number ({max})"
            )));
        }
        self.batch("getblockhash", (min..=max).map(|height| json!([height])))
            .await
    }

    async fn blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Block>> {
        self.batch(
            "getblock",
            hashes.iter().map(|hash| json!([hash.as_str(), 2])),
        )
        .await
    }

    async fn block_count(&self) -> Result<i64> {
        self.call("getblockcount", json!([])).await
    }
}
