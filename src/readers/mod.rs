//! Read side of the vault flow.
//!
//! Every read answers `None` for "unknown" (no account, or the read did not
//! resolve) so callers never confuse a missing value with a zero balance.

pub mod token;
pub mod vault;

pub use token::TokenLedgerReader;
pub use vault::VaultReader;
