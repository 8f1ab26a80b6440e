use std::sync::Arc;
use tracing::{debug, warn};

use crate::amount::AssetAmount;
use crate::chain::{ContractCall, ContractReader};
use crate::indexer::{select_vault, IndexedPosition, PositionIndexer};
use crate::models::{Address, VaultPosition};

/// Share balance and previews from the vault contract, plus the indexed
/// asset/USD value of the user's position.
#[derive(Clone)]
pub struct VaultReader {
    reader: Arc<dyn ContractReader>,
    indexer: Arc<dyn PositionIndexer>,
    vault: Address,
    chain_id: u64,
    share_decimals: u8,
    asset_decimals: u8,
}

impl VaultReader {
    pub fn new(
        reader: Arc<dyn ContractReader>,
        indexer: Arc<dyn PositionIndexer>,
        vault: Address,
        chain_id: u64,
        share_decimals: u8,
        asset_decimals: u8,
    ) -> Self {
        Self {
            reader,
            indexer,
            vault,
            chain_id,
            share_decimals,
            asset_decimals,
        }
    }

    pub fn vault(&self) -> Address {
        self.vault
    }

    pub async fn share_balance(&self, account: Option<Address>) -> Option<AssetAmount> {
        let owner = account?;
        let call = ContractCall::balance_of(self.vault, owner);
        match self.reader.read(&call, Some(owner)).await {
            Ok(raw) => Some(AssetAmount::new(raw, self.share_decimals)),
            Err(e) => {
                debug!(vault = %self.vault, error = %e, "Share balance degraded to unknown");
                None
            }
        }
    }

    /// Shares minted for depositing `assets` at the current price.
    pub async fn preview_deposit(&self, assets: &AssetAmount) -> Option<AssetAmount> {
        let assets = assets.rescale(self.asset_decimals)?;
        let call = ContractCall::preview_deposit(self.vault, assets.raw().clone());
        self.read_shares(call).await
    }

    /// Shares burned to withdraw `assets` at the current price.
    pub async fn preview_withdraw(&self, assets: &AssetAmount) -> Option<AssetAmount> {
        let assets = assets.rescale(self.asset_decimals)?;
        let call = ContractCall::preview_withdraw(self.vault, assets.raw().clone());
        self.read_shares(call).await
    }

    async fn read_shares(&self, call: ContractCall) -> Option<AssetAmount> {
        match self.reader.read(&call, None).await {
            Ok(raw) => Some(AssetAmount::new(raw, self.share_decimals)),
            Err(e) if e.is_degradable() => {
                debug!(
                    function = call.function.signature(),
                    error = %e,
                    "Preview degraded to unknown"
                );
                None
            }
            Err(e) => {
                warn!(function = call.function.signature(), error = %e, "Preview could not be issued");
                None
            }
        }
    }

    /// Indexer entry for this vault. No connection, indexer failure or no
    /// matching entry all mean unknown.
    pub async fn indexed_position(&self, account: Option<Address>) -> Option<IndexedPosition> {
        let owner = account?;
        match self.indexer.positions(self.chain_id, owner).await {
            Ok(positions) => {
                let hit = select_vault(&positions, self.vault).cloned();
                if hit.is_none() {
                    debug!(
                        vault = %self.vault,
                        entries = positions.len(),
                        "No indexed position for vault"
                    );
                }
                hit
            }
            Err(e) => {
                debug!(vault = %self.vault, error = %e, "Indexer degraded to unknown");
                None
            }
        }
    }

    /// On-chain share balance merged with the indexed position value.
    /// `None` when the share balance itself is unknown.
    pub async fn position(&self, account: Option<Address>) -> Option<VaultPosition> {
        let (shares, indexed) =
            tokio::join!(self.share_balance(account), self.indexed_position(account));

        let share_balance = shares?;
        let (underlying_assets, underlying_assets_usd) = match indexed {
            Some(p) => (p.assets, p.assets_usd),
            None => (None, None),
        };

        Some(VaultPosition {
            share_balance,
            underlying_assets,
            underlying_assets_usd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::UsdValue;
    use crate::chain::ContractFn;
    use crate::error::VaultError;
    use async_trait::async_trait;
    use num_bigint::BigUint;

    const VAULT: &str = "0x7BfA7C4f149E7415b73bdeDfe609237e29CBF34A";

    struct ShareReader;

    #[async_trait]
    impl ContractReader for ShareReader {
        async fn read(
            &self,
            call: &ContractCall,
            _from: Option<Address>,
        ) -> Result<BigUint, VaultError> {
            match call.function {
                ContractFn::BalanceOf => Ok(BigUint::from(2_000_000u32)),
                // 1 asset unit -> 2 shares (price below 1).
                ContractFn::PreviewDeposit | ContractFn::PreviewWithdraw => match &call.args[0] {
                    crate::chain::AbiValue::Uint(v) => Ok(v.clone() * 2u32),
                    _ => Err(VaultError::ReadUnavailable("bad args".into())),
                },
                _ => Err(VaultError::ReadUnavailable("unexpected".into())),
            }
        }
    }

    struct StaticIndexer(Result<Vec<IndexedPosition>, VaultError>);

    #[async_trait]
    impl PositionIndexer for StaticIndexer {
        async fn positions(
            &self,
            _chain_id: u64,
            _account: Address,
        ) -> Result<Vec<IndexedPosition>, VaultError> {
            self.0.clone()
        }
    }

    fn reader_with(indexer: StaticIndexer) -> VaultReader {
        VaultReader::new(
            Arc::new(ShareReader),
            Arc::new(indexer),
            VAULT.parse().unwrap(),
            8453,
            6,
            6,
        )
    }

    fn account() -> Option<Address> {
        Some("0x1111111111111111111111111111111111111111".parse().unwrap())
    }

    fn entry(address: &str) -> IndexedPosition {
        IndexedPosition {
            vault_address: address.to_string(),
            shares: Some(AssetAmount::from_raw(2_000_000, 6)),
            assets: Some(AssetAmount::from_raw(2_050_000, 6)),
            assets_usd: UsdValue::parse("2.0499"),
        }
    }

    #[tokio::test]
    async fn test_position_merges_indexer_entry() {
        let r = reader_with(StaticIndexer(Ok(vec![entry(&VAULT.to_ascii_lowercase())])));
        let pos = r.position(account()).await.unwrap();
        assert_eq!(pos.share_balance.format(), "2");
        assert_eq!(pos.underlying_assets.unwrap().format(), "2.05");
        assert_eq!(pos.underlying_assets_usd.unwrap().to_string(), "2.049900");
    }

    #[tokio::test]
    async fn test_unmatched_indexer_entry_is_unknown() {
        let r = reader_with(StaticIndexer(Ok(vec![entry(
            "0x0000000000000000000000000000000000000001",
        )])));
        assert!(r.indexed_position(account()).await.is_none());

        let pos = r.position(account()).await.unwrap();
        assert!(pos.underlying_assets.is_none());
        assert!(pos.underlying_assets_usd.is_none());
    }

    #[tokio::test]
    async fn test_indexer_failure_is_unknown() {
        let r = reader_with(StaticIndexer(Err(VaultError::NetworkError("offline".into()))));
        assert!(r.indexed_position(account()).await.is_none());
        assert!(r.position(account()).await.unwrap().underlying_assets.is_none());
    }

    #[tokio::test]
    async fn test_disconnected_reads_unknown() {
        let r = reader_with(StaticIndexer(Ok(vec![entry(VAULT)])));
        assert!(r.share_balance(None).await.is_none());
        assert!(r.indexed_position(None).await.is_none());
        assert!(r.position(None).await.is_none());
    }

    #[tokio::test]
    async fn test_previews() {
        let r = reader_with(StaticIndexer(Ok(Vec::new())));
        let amount = AssetAmount::parse("1.5", 6).unwrap();
        assert_eq!(r.preview_deposit(&amount).await.unwrap().format(), "3");
        assert_eq!(r.preview_withdraw(&amount).await.unwrap().format(), "3");
    }
}
