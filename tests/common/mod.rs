//! Fake Base node and Morpho indexer served by axum on an ephemeral port.
//!
//! The node understands just enough of ERC-20 and ERC-4626 to enforce
//! allowances, so the full approve -> deposit -> withdraw flow can run over
//! real HTTP.

#![allow(dead_code)]

use axum::{extract::State, routing::post, Json, Router};
use num_bigint::BigUint;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use earnvault_backend::chain::{JsonRpcClient, WalletSession};
use earnvault_backend::config::{VaultConfig, DEFAULT_VAULT_ADDRESS};
use earnvault_backend::indexer::MorphoIndexer;
use earnvault_backend::models::Address;
use earnvault_backend::VaultTeller;

pub const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";

#[derive(Default)]
pub struct NodeState {
    pub balance: BigUint,
    pub allowance: BigUint,
    pub shares: BigUint,
    /// `eth_sendTransaction` payloads in arrival order.
    pub sent: Vec<Value>,
    /// GraphQL `variables` in arrival order.
    pub indexer_queries: Vec<Value>,
    pub fail_reads: bool,
    pub indexer_errors: bool,
}

pub type SharedNode = Arc<Mutex<NodeState>>;

pub struct Harness {
    pub node: SharedNode,
    pub addr: SocketAddr,
    pub session: Arc<WalletSession>,
    pub rpc: JsonRpcClient,
    pub teller: Arc<VaultTeller>,
}

pub async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub fn account() -> Address {
    ACCOUNT.parse().unwrap()
}

pub fn usdc(units: u64) -> BigUint {
    BigUint::from(units) * BigUint::from(1_000_000u32)
}

/// Fake node plus a teller wired to it through the real HTTP clients.
pub async fn harness(balance: BigUint) -> Harness {
    let node: SharedNode = Arc::new(Mutex::new(NodeState {
        balance,
        ..Default::default()
    }));
    let router = Router::new()
        .route("/rpc", post(rpc))
        .route("/graphql", post(graphql))
        .with_state(node.clone());
    let addr = spawn(router).await;

    let config = VaultConfig {
        rpc_url: format!("http://{}/rpc", addr),
        indexer_url: format!("http://{}/graphql", addr),
        ..VaultConfig::default()
    };
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .unwrap();
    let rpc = JsonRpcClient::new(http.clone(), config.rpc_url.clone());
    let indexer = MorphoIndexer::new(
        http,
        config.indexer_url.clone(),
        config.share_decimals(),
        config.asset_decimals,
    );
    let session = Arc::new(WalletSession::new(Some(account())));
    let rpc_arc = Arc::new(rpc.clone());
    let teller = Arc::new(VaultTeller::new(
        &config,
        session.clone(),
        rpc_arc.clone(),
        rpc_arc,
        Arc::new(indexer),
    ));

    Harness {
        node,
        addr,
        session,
        rpc,
        teller,
    }
}

fn word(v: &BigUint) -> String {
    format!("0x{:0>64}", v.to_str_radix(16))
}

fn arg(data: &str, index: usize) -> BigUint {
    let start = 10 + 64 * index;
    BigUint::parse_bytes(data[start..start + 64].as_bytes(), 16).unwrap()
}

fn reply(id: &Value, result: Value) -> Json<Value> {
    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

fn revert(id: &Value, message: &str) -> Json<Value> {
    Json(json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": -32000, "message": message },
    }))
}

fn is_vault(to: &str) -> bool {
    to.eq_ignore_ascii_case(DEFAULT_VAULT_ADDRESS)
}

async fn rpc(State(node): State<SharedNode>, Json(req): Json<Value>) -> Json<Value> {
    let id = req["id"].clone();
    let method = req["method"].as_str().unwrap_or_default();
    let tx = &req["params"][0];
    let to = tx["to"].as_str().unwrap_or_default();
    let data = tx["data"].as_str().unwrap_or_default();
    let selector = data.get(2..10).unwrap_or_default();

    let mut node = node.lock();
    match method {
        "eth_chainId" => reply(&id, json!("0x2105")),
        "eth_accounts" => reply(&id, json!([ACCOUNT])),
        "eth_call" => {
            if node.fail_reads {
                return revert(&id, "execution reverted");
            }
            let value = match selector {
                "313ce567" => BigUint::from(6u32),
                "70a08231" if is_vault(to) => node.shares.clone(),
                "70a08231" => node.balance.clone(),
                "dd62ed3e" => node.allowance.clone(),
                // 1:1 share price
                "ef8b30f7" | "0a28a477" => arg(data, 0),
                _ => return revert(&id, "unknown selector"),
            };
            reply(&id, json!(word(&value)))
        }
        "eth_sendTransaction" => {
            node.sent.push(tx.clone());
            match selector {
                "095ea7b3" => node.allowance = arg(data, 1),
                "6e553f65" => {
                    let assets = arg(data, 0);
                    if assets > node.allowance {
                        return revert(&id, "execution reverted: ERC20: insufficient allowance");
                    }
                    node.allowance -= &assets;
                    node.balance -= &assets;
                    node.shares += &assets;
                }
                "b460af94" => {
                    let assets = arg(data, 0);
                    if assets > node.shares {
                        return revert(&id, "execution reverted: ERC4626: withdraw more than max");
                    }
                    node.shares -= &assets;
                    node.balance += &assets;
                }
                _ => return revert(&id, "unknown selector"),
            }
            let hash = BigUint::from(node.sent.len());
            reply(&id, json!(word(&hash)))
        }
        _ => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": "method not found" },
        })),
    }
}

async fn graphql(State(node): State<SharedNode>, Json(req): Json<Value>) -> Json<Value> {
    let mut node = node.lock();
    node.indexer_queries.push(req["variables"].clone());

    if node.indexer_errors {
        return Json(json!({ "data": null, "errors": [{ "message": "rate limited" }] }));
    }

    let assets = node.shares.clone() * 102u32 / 100u32;
    Json(json!({
        "data": {
            "vaultPositions": {
                "items": [
                    {
                        "vault": { "address": "0x0000000000000000000000000000000000000bad" },
                        "shares": "1",
                        "assets": "1",
                        "assetsUsd": 0.000001
                    },
                    {
                        "vault": { "address": DEFAULT_VAULT_ADDRESS.to_ascii_uppercase().replace("0X", "0x") },
                        "shares": node.shares.to_string(),
                        "assets": assets.to_string(),
                        "assetsUsd": "1.0199"
                    }
                ]
            }
        }
    }))
}
