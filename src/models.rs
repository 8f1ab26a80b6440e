use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

use crate::amount::{AssetAmount, UsdValue};

/// 20-byte EVM account or contract address.
///
/// Parsing is case-insensitive and the canonical rendering is lowercase, so
/// two spellings of the same address always compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex without the `0x` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Case-insensitive match against an address string from an external source.
    pub fn matches(&self, other: &str) -> bool {
        other.parse::<Address>().map(|a| a == *self).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParseError(pub String);

impl std::fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid address '{}': expected 0x followed by 40 hex digits", self.0)
    }
}

impl std::error::Error for AddressParseError {}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressParseError(s.to_string()))?;
        if body.len() != 40 {
            return Err(AddressParseError(s.to_string()));
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(body, &mut out).map_err(|_| AddressParseError(s.to_string()))?;
        Ok(Self(out))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address(0x{})", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The three user-initiated vault operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Approve,
    Deposit,
    Withdraw,
}

impl TxKind {
    pub const ALL: [TxKind; 3] = [TxKind::Approve, TxKind::Deposit, TxKind::Withdraw];

    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Approve => "approve",
            TxKind::Deposit => "deposit",
            TxKind::Withdraw => "withdraw",
        }
    }

    /// Noun used in status lines ("Approval transaction sent!").
    pub fn label(&self) -> &'static str {
        match self {
            TxKind::Approve => "Approval",
            TxKind::Deposit => "Deposit",
            TxKind::Withdraw => "Withdraw",
        }
    }

    /// Prefix used in the per-operation error panel ("Approve Error: ...").
    pub fn error_label(&self) -> &'static str {
        match self {
            TxKind::Approve => "Approve",
            TxKind::Deposit => "Deposit",
            TxKind::Withdraw => "Withdraw",
        }
    }

    pub fn pending_label(&self) -> &'static str {
        match self {
            TxKind::Approve => "Approving...",
            TxKind::Deposit => "Depositing...",
            TxKind::Withdraw => "Withdrawing...",
        }
    }

    pub fn sent_message(&self) -> String {
        format!("{} transaction sent!", self.label())
    }
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle returned by the write capability (a transaction hash for RPC).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHandle(pub String);

impl std::fmt::Display for TxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub kind: TxKind,
    pub amount: AssetAmount,
    pub account: Address,
}

/// Result of one submitted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TransactionOutcome {
    Pending,
    Submitted(TxHandle),
    Failed(String),
}

/// User's holding in the vault. Indexer-derived fields stay `None` until the
/// indexer answers with a matching entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultPosition {
    pub share_balance: AssetAmount,
    pub underlying_assets: Option<AssetAmount>,
    pub underlying_assets_usd: Option<UsdValue>,
}
