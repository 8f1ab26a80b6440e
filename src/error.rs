//! Error taxonomy for the vault flow.
//!
//! Nothing here is fatal: callers either reject input before a write is
//! attempted, turn a rejection into status text, or degrade a read to unknown.

use crate::models::TxKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// User input could not be turned into a positive on-chain amount.
    InvalidAmount(String),
    /// The wallet/provider declined a transaction (user cancel, gas, node error).
    SubmissionRejected { kind: TxKind, reason: String },
    /// A contract read or indexer call did not resolve to a usable value.
    ReadUnavailable(String),
    /// Transport-level failure talking to the indexer or RPC node.
    NetworkError(String),
    /// No wallet account is connected.
    NotConnected,
    /// A transaction of this kind is still being submitted.
    Busy { kind: TxKind },
}

impl VaultError {
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn rejected(kind: TxKind, reason: impl Into<String>) -> Self {
        Self::SubmissionRejected {
            kind,
            reason: reason.into(),
        }
    }

    /// Errors that should be rendered as "unknown" data rather than surfaced.
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::ReadUnavailable(_) | Self::NetworkError(_))
    }
}

impl std::fmt::Display for VaultError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAmount(msg) => write!(f, "invalid amount: {}", msg),
            Self::SubmissionRejected { kind, reason } => {
                write!(f, "{} failed: {}", kind.label(), reason)
            }
            Self::ReadUnavailable(msg) => write!(f, "read unavailable: {}", msg),
            Self::NetworkError(msg) => write!(f, "network error: {}", msg),
            Self::NotConnected => write!(f, "wallet not connected"),
            Self::Busy { kind } => write!(f, "{} already in progress", kind.label()),
        }
    }
}

impl std::error::Error for VaultError {}

impl From<reqwest::Error> for VaultError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_is_prefixed_by_kind() {
        let err = VaultError::rejected(TxKind::Approve, "User rejected the request.");
        assert_eq!(err.to_string(), "Approval failed: User rejected the request.");

        let err = VaultError::rejected(TxKind::Withdraw, "execution reverted");
        assert_eq!(err.to_string(), "Withdraw failed: execution reverted");
    }

    #[test]
    fn test_degradable_errors() {
        assert!(VaultError::ReadUnavailable("x".into()).is_degradable());
        assert!(VaultError::NetworkError("x".into()).is_degradable());
        assert!(!VaultError::NotConnected.is_degradable());
        assert!(!VaultError::invalid_amount("x").is_degradable());
    }
}
