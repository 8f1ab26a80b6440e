//! EarnVault Backend Library
//!
//! Deposit into and withdraw from a single ERC-4626 vault on behalf of a
//! connected account, and report the account's balances and position value.
//! Exposes the core modules for the `earnvault` binary and tests.

pub mod amount;
pub mod api;
pub mod chain;
pub mod config;
pub mod error;
pub mod indexer;
pub mod middleware;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod presenter;
pub mod readers;
pub mod teller;

pub use error::VaultError;
pub use teller::VaultTeller;
