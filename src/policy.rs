//! Approval gating for deposits.

use serde::{Deserialize, Serialize};

use crate::amount::AssetAmount;
use crate::error::VaultError;

/// What to do when the current allowance has not been read yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownAllowance {
    /// Do not block on missing data (the page's historical behaviour).
    #[default]
    Permit,
    /// Treat an unknown allowance as insufficient.
    Require,
}

impl std::str::FromStr for UnknownAllowance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permit" => Ok(Self::Permit),
            "require" => Ok(Self::Require),
            other => Err(format!("unknown allowance mode '{}' (expected permit|require)", other)),
        }
    }
}

/// True iff an approval must be sent before depositing `requested`.
///
/// An unknown allowance never requires approval. This lets a deposit reach
/// the write capability without a confirmed allowance; see
/// [`ApprovalPolicy`] for the stricter mode.
pub fn needs_approval(requested: &AssetAmount, current: Option<&AssetAmount>) -> bool {
    match current {
        Some(allowance) => requested > allowance,
        None => false,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalPolicy {
    pub unknown_allowance: UnknownAllowance,
}

impl ApprovalPolicy {
    pub fn new(unknown_allowance: UnknownAllowance) -> Self {
        Self { unknown_allowance }
    }

    pub fn needs_approval(&self, requested: &AssetAmount, current: Option<&AssetAmount>) -> bool {
        match (current, self.unknown_allowance) {
            (None, UnknownAllowance::Require) => true,
            _ => needs_approval(requested, current),
        }
    }

    /// Parse user input with the asset exponent, then apply the policy.
    pub fn check_input(
        &self,
        input: &str,
        decimals: u8,
        current: Option<&AssetAmount>,
    ) -> Result<bool, VaultError> {
        let requested = AssetAmount::parse(input, decimals)?;
        Ok(self.needs_approval(&requested, current))
    }
}
