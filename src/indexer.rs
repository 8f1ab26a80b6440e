//! Vault position indexer (Morpho GraphQL API)
//!
//! Positions are fetched out of band from contract reads. The response is run
//! through a typed schema; anything that does not fit is dropped so callers
//! see "unknown" instead of an error.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::amount::{AssetAmount, UsdValue};
use crate::error::VaultError;
use crate::models::Address;

const VAULT_POSITIONS_QUERY: &str = r#"
query VaultPositions($chainId: Int!, $userAddress: String!) {
  vaultPositions(where: { chainId_in: [$chainId], userAddress_in: [$userAddress] }) {
    items {
      vault { address }
      shares
      assets
      assetsUsd
    }
  }
}
"#;

/// One vault entry as reported by the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedPosition {
    pub vault_address: String,
    pub shares: Option<AssetAmount>,
    pub assets: Option<AssetAmount>,
    pub assets_usd: Option<UsdValue>,
}

#[async_trait]
pub trait PositionIndexer: Send + Sync {
    /// All vault positions held by `account` on `chain_id`, in indexer order.
    async fn positions(
        &self,
        chain_id: u64,
        account: Address,
    ) -> Result<Vec<IndexedPosition>, VaultError>;
}

/// First entry whose vault address matches `vault`, ignoring case.
pub fn select_vault(positions: &[IndexedPosition], vault: Address) -> Option<&IndexedPosition> {
    positions.iter().find(|p| vault.matches(&p.vault_address))
}

// ===== Wire schema =====

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<PositionsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionsData {
    vault_positions: Option<PositionPage>,
}

#[derive(Debug, Deserialize)]
struct PositionPage {
    items: Option<Vec<RawPosition>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPosition {
    vault: Option<RawVault>,
    shares: Option<Value>,
    assets: Option<Value>,
    assets_usd: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawVault {
    address: Option<String>,
}

/// BigInt scalars arrive as JSON strings or integers depending on size.
fn integer_amount(value: Option<&Value>, decimals: u8) -> Option<AssetAmount> {
    match value? {
        Value::String(s) => AssetAmount::from_raw_str(s, decimals),
        Value::Number(n) => n
            .as_u64()
            .map(|v| AssetAmount::from_raw(v, decimals))
            .or_else(|| AssetAmount::from_raw_str(&n.to_string(), decimals)),
        _ => None,
    }
}

fn usd_amount(value: Option<&Value>) -> Option<UsdValue> {
    match value? {
        Value::String(s) => UsdValue::parse(s),
        Value::Number(n) => UsdValue::parse(&n.to_string()),
        _ => None,
    }
}

/// Convert a raw indexer body into typed positions.
///
/// Entries without a vault address are skipped; malformed numeric fields
/// become `None`. A body that is not a positions response at all is
/// `ReadUnavailable`.
pub fn parse_positions(
    body: &str,
    share_decimals: u8,
    asset_decimals: u8,
) -> Result<Vec<IndexedPosition>, VaultError> {
    let resp: GraphQlResponse = serde_json::from_str(body)
        .map_err(|e| VaultError::ReadUnavailable(format!("malformed indexer response: {}", e)))?;

    let Some(data) = resp.data else {
        let message = resp
            .errors
            .iter()
            .filter_map(|e| e.message.as_deref())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(VaultError::ReadUnavailable(if message.is_empty() {
            "indexer response has no data".to_string()
        } else {
            message
        }));
    };

    if !resp.errors.is_empty() {
        debug!(errors = resp.errors.len(), "Indexer returned partial data with errors");
    }

    let items = data
        .vault_positions
        .and_then(|page| page.items)
        .unwrap_or_default();

    let positions = items
        .into_iter()
        .filter_map(|raw| {
            let vault_address = raw.vault?.address?;
            Some(IndexedPosition {
                vault_address,
                shares: integer_amount(raw.shares.as_ref(), share_decimals),
                assets: integer_amount(raw.assets.as_ref(), asset_decimals),
                assets_usd: usd_amount(raw.assets_usd.as_ref()),
            })
        })
        .collect();

    Ok(positions)
}

/// HTTP client for the Morpho vault positions API.
#[derive(Clone)]
pub struct MorphoIndexer {
    http: Client,
    url: String,
    share_decimals: u8,
    asset_decimals: u8,
}

impl MorphoIndexer {
    pub fn new(http: Client, url: impl Into<String>, share_decimals: u8, asset_decimals: u8) -> Self {
        Self {
            http,
            url: url.into(),
            share_decimals,
            asset_decimals,
        }
    }
}

#[async_trait]
impl PositionIndexer for MorphoIndexer {
    async fn positions(
        &self,
        chain_id: u64,
        account: Address,
    ) -> Result<Vec<IndexedPosition>, VaultError> {
        let body = json!({
            "query": VAULT_POSITIONS_QUERY,
            "variables": {
                "chainId": chain_id,
                "userAddress": account.to_string(),
            },
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Indexer request failed");
                VaultError::NetworkError(format!("indexer request failed: {}", e))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(%status, "Indexer returned non-success status");
            return Err(VaultError::NetworkError(format!("indexer returned HTTP {}", status)));
        }

        let text = resp.text().await?;
        parse_positions(&text, self.share_decimals, self.asset_decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VAULT: &str = "0x7BfA7C4f149E7415b73bdeDfe609237e29CBF34A";

    fn vault() -> Address {
        VAULT.parse().unwrap()
    }

    #[test]
    fn test_parse_and_select_case_insensitive() {
        let body = json!({
            "data": {
                "vaultPositions": {
                    "items": [
                        {
                            "vault": { "address": "0x0000000000000000000000000000000000000001" },
                            "shares": "1", "assets": "1", "assetsUsd": 1.0
                        },
                        {
                            "vault": { "address": VAULT.to_ascii_uppercase().replacen("0X", "0x", 1) },
                            "shares": "2500000",
                            "assets": 2512345,
                            "assetsUsd": 2.5123449
                        }
                    ]
                }
            }
        })
        .to_string();

        let positions = parse_positions(&body, 6, 6).unwrap();
        assert_eq!(positions.len(), 2);

        let hit = select_vault(&positions, vault()).unwrap();
        assert_eq!(hit.shares.as_ref().unwrap().format(), "2.5");
        assert_eq!(hit.assets.as_ref().unwrap().format(), "2.512345");
        assert_eq!(hit.assets_usd.as_ref().unwrap().to_string(), "2.512345");
    }

    #[test]
    fn test_no_matching_vault_is_unknown() {
        let body = json!({
            "data": { "vaultPositions": { "items": [
                { "vault": { "address": "0x0000000000000000000000000000000000000001" },
                  "shares": "1", "assets": "1", "assetsUsd": null }
            ] } }
        })
        .to_string();

        let positions = parse_positions(&body, 6, 6).unwrap();
        assert!(select_vault(&positions, vault()).is_none());
    }

    #[test]
    fn test_shape_mismatch_fails_closed() {
        // Wrong top-level type.
        assert!(matches!(
            parse_positions("[1,2,3]", 6, 6),
            Err(VaultError::ReadUnavailable(_))
        ));
        // Not JSON.
        assert!(matches!(
            parse_positions("<html>bad gateway</html>", 6, 6),
            Err(VaultError::ReadUnavailable(_))
        ));
        // GraphQL error without data.
        let body = json!({ "errors": [{ "message": "rate limited" }] }).to_string();
        assert_eq!(
            parse_positions(&body, 6, 6),
            Err(VaultError::ReadUnavailable("rate limited".to_string()))
        );
    }

    #[test]
    fn test_malformed_entries_degrade_per_field() {
        let body = json!({
            "data": { "vaultPositions": { "items": [
                { "vault": null, "shares": "1" },
                { "vault": { "address": VAULT }, "shares": "-5", "assets": { "x": 1 }, "assetsUsd": "n/a" }
            ] } }
        })
        .to_string();

        let positions = parse_positions(&body, 6, 6).unwrap();
        assert_eq!(positions.len(), 1);
        let hit = select_vault(&positions, vault()).unwrap();
        assert!(hit.shares.is_none());
        assert!(hit.assets.is_none());
        assert!(hit.assets_usd.is_none());
    }

    #[test]
    fn test_empty_page_is_empty_list() {
        let body = json!({ "data": { "vaultPositions": null } }).to_string();
        assert!(parse_positions(&body, 6, 6).unwrap().is_empty());
    }
}
