//! JSON-RPC transport for contract reads and writes.

use async_trait::async_trait;
use num_bigint::BigUint;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::abi::{decode_uint, ContractCall};
use super::{ContractReader, ContractWriter, WriteError};
use crate::error::VaultError;
use crate::models::{Address, TxHandle};

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    pub code: Option<i64>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorObject>,
}

/// Failure modes of a single JSON-RPC exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcFailure {
    /// HTTP-level failure or non-2xx status.
    Transport(String),
    /// The node answered with an `error` object.
    Node { code: Option<i64>, message: String },
    /// The body was not a JSON-RPC response of the expected shape.
    Malformed(String),
}

impl RpcFailure {
    fn into_read_error(self) -> VaultError {
        match self {
            RpcFailure::Transport(msg) => VaultError::NetworkError(msg),
            RpcFailure::Node { message, .. } => VaultError::ReadUnavailable(message),
            RpcFailure::Malformed(msg) => VaultError::ReadUnavailable(msg),
        }
    }

    fn into_write_error(self) -> WriteError {
        match self {
            RpcFailure::Transport(msg) | RpcFailure::Malformed(msg) => WriteError(msg),
            RpcFailure::Node { message, .. } => WriteError(message),
        }
    }
}

/// Node client speaking `eth_call` / `eth_sendTransaction`.
///
/// Writes rely on the node (or a wallet-backed RPC endpoint) to hold the
/// signing key for `from`.
#[derive(Clone)]
pub struct JsonRpcClient {
    http: Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(format!("{} request failed: {}", method, e)))?;

        if !resp.status().is_success() {
            return Err(RpcFailure::Transport(format!(
                "{} returned HTTP {}",
                method,
                resp.status()
            )));
        }

        let rpc = resp
            .json::<RpcResponse<T>>()
            .await
            .map_err(|e| RpcFailure::Malformed(format!("{} response: {}", method, e)))?;

        if let Some(err) = rpc.error {
            return Err(RpcFailure::Node {
                code: err.code,
                message: err
                    .message
                    .unwrap_or_else(|| format!("{} failed without a message", method)),
            });
        }

        rpc.result
            .ok_or_else(|| RpcFailure::Malformed(format!("{} response has no result", method)))
    }

    /// `eth_chainId`, used to sanity-check configuration at startup.
    pub async fn chain_id(&self) -> Result<u64, VaultError> {
        let hex: String = self
            .call("eth_chainId", json!([]))
            .await
            .map_err(RpcFailure::into_read_error)?;
        u64::from_str_radix(hex.trim_start_matches("0x"), 16)
            .map_err(|_| VaultError::ReadUnavailable(format!("bad chain id '{}'", hex)))
    }

    /// `eth_accounts`: accounts the endpoint can sign for.
    pub async fn accounts(&self) -> Result<Vec<Address>, VaultError> {
        let raw: Vec<String> = self
            .call("eth_accounts", json!([]))
            .await
            .map_err(RpcFailure::into_read_error)?;
        Ok(raw.iter().filter_map(|a| a.parse().ok()).collect())
    }
}

#[async_trait]
impl ContractReader for JsonRpcClient {
    async fn read(&self, call: &ContractCall, from: Option<Address>) -> Result<BigUint, VaultError> {
        let data = call.encode()?;
        let mut tx = json!({ "to": call.to.to_string(), "data": data });
        if let Some(from) = from {
            tx["from"] = json!(from.to_string());
        }

        let result: String = self
            .call("eth_call", json!([tx, "latest"]))
            .await
            .map_err(|e| {
                debug!(function = call.function.signature(), to = %call.to, error = ?e, "eth_call failed");
                e.into_read_error()
            })?;

        decode_uint(&result)
    }
}

#[async_trait]
impl ContractWriter for JsonRpcClient {
    async fn submit(&self, from: Address, call: &ContractCall) -> Result<TxHandle, WriteError> {
        let data = call.encode().map_err(|e| WriteError(e.to_string()))?;
        let tx = json!({
            "from": from.to_string(),
            "to": call.to.to_string(),
            "data": data,
        });

        let hash: String = self
            .call("eth_sendTransaction", json!([tx]))
            .await
            .map_err(|e| {
                warn!(function = call.function.signature(), to = %call.to, error = ?e, "eth_sendTransaction failed");
                e.into_write_error()
            })?;

        Ok(TxHandle(hash))
    }
}
