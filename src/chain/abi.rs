//! Minimal ABI encoding for the handful of ERC-20 / ERC-4626 functions the
//! vault flow touches. Every argument and return value is a single 32-byte
//! word, so no dynamic types are needed.

use num_bigint::BigUint;

use crate::error::VaultError;
use crate::models::Address;

const WORD_BYTES: usize = 32;
const WORD_HEX: usize = WORD_BYTES * 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractFn {
    Decimals,
    BalanceOf,
    Allowance,
    Approve,
    Deposit,
    Withdraw,
    PreviewDeposit,
    PreviewWithdraw,
}

impl ContractFn {
    pub fn signature(&self) -> &'static str {
        match self {
            ContractFn::Decimals => "decimals()",
            ContractFn::BalanceOf => "balanceOf(address)",
            ContractFn::Allowance => "allowance(address,address)",
            ContractFn::Approve => "approve(address,uint256)",
            ContractFn::Deposit => "deposit(uint256,address)",
            ContractFn::Withdraw => "withdraw(uint256,address,address)",
            ContractFn::PreviewDeposit => "previewDeposit(uint256)",
            ContractFn::PreviewWithdraw => "previewWithdraw(uint256)",
        }
    }

    /// First four bytes of keccak256(signature).
    pub fn selector(&self) -> [u8; 4] {
        match self {
            ContractFn::Decimals => [0x31, 0x3c, 0xe5, 0x67],
            ContractFn::BalanceOf => [0x70, 0xa0, 0x82, 0x31],
            ContractFn::Allowance => [0xdd, 0x62, 0xed, 0x3e],
            ContractFn::Approve => [0x09, 0x5e, 0xa7, 0xb3],
            ContractFn::Deposit => [0x6e, 0x55, 0x3f, 0x65],
            ContractFn::Withdraw => [0xb4, 0x60, 0xaf, 0x94],
            ContractFn::PreviewDeposit => [0xef, 0x8b, 0x30, 0xf7],
            ContractFn::PreviewWithdraw => [0x0a, 0x28, 0xa4, 0x77],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint(BigUint),
}

impl AbiValue {
    fn encode_into(&self, out: &mut String) -> Result<(), VaultError> {
        match self {
            AbiValue::Address(addr) => {
                out.push_str(&format!("{:0>64}", addr.to_hex()));
            }
            AbiValue::Uint(value) => {
                check_uint256(value)?;
                out.push_str(&format!("{:0>64}", value.to_str_radix(16)));
            }
        }
        Ok(())
    }
}

/// Reject values that do not fit a `uint256` word.
pub fn check_uint256(value: &BigUint) -> Result<(), VaultError> {
    if value.bits() > 256 {
        return Err(VaultError::invalid_amount(
            "amount does not fit in a uint256",
        ));
    }
    Ok(())
}

/// One contract function invocation: target, function and positional args.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub function: ContractFn,
    pub args: Vec<AbiValue>,
}

impl ContractCall {
    pub fn new(to: Address, function: ContractFn, args: Vec<AbiValue>) -> Self {
        Self { to, function, args }
    }

    pub fn decimals(token: Address) -> Self {
        Self::new(token, ContractFn::Decimals, Vec::new())
    }

    pub fn balance_of(token: Address, owner: Address) -> Self {
        Self::new(token, ContractFn::BalanceOf, vec![AbiValue::Address(owner)])
    }

    pub fn allowance(token: Address, owner: Address, spender: Address) -> Self {
        Self::new(
            token,
            ContractFn::Allowance,
            vec![AbiValue::Address(owner), AbiValue::Address(spender)],
        )
    }

    pub fn approve(token: Address, spender: Address, amount: BigUint) -> Self {
        Self::new(
            token,
            ContractFn::Approve,
            vec![AbiValue::Address(spender), AbiValue::Uint(amount)],
        )
    }

    pub fn deposit(vault: Address, assets: BigUint, receiver: Address) -> Self {
        Self::new(
            vault,
            ContractFn::Deposit,
            vec![AbiValue::Uint(assets), AbiValue::Address(receiver)],
        )
    }

    pub fn withdraw(vault: Address, assets: BigUint, receiver: Address, owner: Address) -> Self {
        Self::new(
            vault,
            ContractFn::Withdraw,
            vec![
                AbiValue::Uint(assets),
                AbiValue::Address(receiver),
                AbiValue::Address(owner),
            ],
        )
    }

    pub fn preview_deposit(vault: Address, assets: BigUint) -> Self {
        Self::new(vault, ContractFn::PreviewDeposit, vec![AbiValue::Uint(assets)])
    }

    pub fn preview_withdraw(vault: Address, assets: BigUint) -> Self {
        Self::new(vault, ContractFn::PreviewWithdraw, vec![AbiValue::Uint(assets)])
    }

    /// `0x`-prefixed calldata.
    pub fn encode(&self) -> Result<String, VaultError> {
        let mut out = String::with_capacity(2 + 8 + self.args.len() * WORD_HEX);
        out.push_str("0x");
        out.push_str(&hex::encode(self.function.selector()));
        for arg in &self.args {
            arg.encode_into(&mut out)?;
        }
        Ok(out)
    }
}

/// Decode a single `uint256` return word from `eth_call` output.
pub fn decode_uint(result: &str) -> Result<BigUint, VaultError> {
    let hex = result.trim().trim_start_matches("0x");
    if hex.is_empty() {
        // Calls to an address with no code come back as bare "0x".
        return Err(VaultError::ReadUnavailable("empty return data".to_string()));
    }
    if !hex.is_ascii() {
        return Err(VaultError::ReadUnavailable(format!("non-hex return data '{}'", result)));
    }
    let word = &hex[..hex.len().min(WORD_HEX)];
    BigUint::parse_bytes(word.as_bytes(), 16)
        .ok_or_else(|| VaultError::ReadUnavailable(format!("non-hex return data '{}'", result)))
}
