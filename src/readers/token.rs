use num_bigint::BigUint;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::amount::AssetAmount;
use crate::chain::{ContractCall, ContractReader};
use crate::models::Address;

/// Balance, allowance and decimals of a fungible token.
#[derive(Clone)]
pub struct TokenLedgerReader {
    reader: Arc<dyn ContractReader>,
    token: Address,
    decimals: u8,
}

impl TokenLedgerReader {
    pub fn new(reader: Arc<dyn ContractReader>, token: Address, decimals: u8) -> Self {
        Self {
            reader,
            token,
            decimals,
        }
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub async fn balance_of(&self, account: Option<Address>) -> Option<AssetAmount> {
        let owner = account?;
        self.read_amount(ContractCall::balance_of(self.token, owner), owner)
            .await
    }

    /// Amount `owner` currently lets `spender` transfer.
    pub async fn allowance(&self, owner: Option<Address>, spender: Address) -> Option<AssetAmount> {
        let owner = owner?;
        self.read_amount(ContractCall::allowance(self.token, owner, spender), owner)
            .await
    }

    /// Decimals reported by the token contract itself.
    pub async fn onchain_decimals(&self) -> Option<u8> {
        let call = ContractCall::decimals(self.token);
        match self.reader.read(&call, None).await {
            Ok(value) => small_uint(&value),
            Err(e) => {
                debug!(token = %self.token, error = %e, "decimals() unavailable");
                None
            }
        }
    }

    async fn read_amount(&self, call: ContractCall, from: Address) -> Option<AssetAmount> {
        match self.reader.read(&call, Some(from)).await {
            Ok(raw) => Some(AssetAmount::new(raw, self.decimals)),
            Err(e) if e.is_degradable() => {
                debug!(
                    token = %self.token,
                    function = call.function.signature(),
                    error = %e,
                    "Token read degraded to unknown"
                );
                None
            }
            Err(e) => {
                warn!(
                    token = %self.token,
                    function = call.function.signature(),
                    error = %e,
                    "Token read could not be issued"
                );
                None
            }
        }
    }
}

fn small_uint(value: &BigUint) -> Option<u8> {
    match value.to_u32_digits().as_slice() {
        [] => Some(0),
        [d] => u8::try_from(*d).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ContractFn;
    use crate::error::VaultError;
    use async_trait::async_trait;

    struct FixedReader;

    #[async_trait]
    impl ContractReader for FixedReader {
        async fn read(
            &self,
            call: &ContractCall,
            _from: Option<Address>,
        ) -> Result<BigUint, VaultError> {
            match call.function {
                ContractFn::BalanceOf => Ok(BigUint::from(12_500_000u32)),
                ContractFn::Allowance => Err(VaultError::ReadUnavailable("timeout".into())),
                ContractFn::Decimals => Ok(BigUint::from(6u32)),
                _ => Err(VaultError::ReadUnavailable("unexpected".into())),
            }
        }
    }

    fn reader() -> TokenLedgerReader {
        let token = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".parse().unwrap();
        TokenLedgerReader::new(Arc::new(FixedReader), token, 6)
    }

    fn account() -> Address {
        "0x1111111111111111111111111111111111111111".parse().unwrap()
    }

    #[tokio::test]
    async fn test_balance_known_when_connected() {
        let balance = reader().balance_of(Some(account())).await.unwrap();
        assert_eq!(balance.format(), "12.5");
    }

    #[tokio::test]
    async fn test_reads_unknown_without_account() {
        let r = reader();
        assert!(r.balance_of(None).await.is_none());
        assert!(r.allowance(None, account()).await.is_none());
    }

    #[tokio::test]
    async fn test_failed_read_is_unknown_not_zero() {
        assert!(reader().allowance(Some(account()), account()).await.is_none());
    }

    #[tokio::test]
    async fn test_onchain_decimals() {
        assert_eq!(reader().onchain_decimals().await, Some(6));
    }

    #[test]
    fn test_small_uint_bounds() {
        assert_eq!(small_uint(&BigUint::from(0u32)), Some(0));
        assert_eq!(small_uint(&BigUint::from(18u32)), Some(18));
        assert_eq!(small_uint(&BigUint::from(256u32)), None);
        assert_eq!(small_uint(&(BigUint::from(1u32) << 40usize)), None);
    }
}
