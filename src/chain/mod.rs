//! Chain access seams.
//!
//! The vault flow only needs three capabilities from the outside world: who
//! is connected, how to read a contract and how to submit a transaction.
//! Each is a trait so the orchestration can run against a JSON-RPC node in
//! production and against fakes in tests.

pub mod abi;
pub mod rpc;
pub mod wallet;

use async_trait::async_trait;
use num_bigint::BigUint;

use crate::error::VaultError;
use crate::models::{Address, TxHandle};

pub use abi::{AbiValue, ContractCall, ContractFn};
pub use rpc::JsonRpcClient;
pub use wallet::WalletSession;

/// Current wallet account, if any.
pub trait AccountProvider: Send + Sync {
    fn current_account(&self) -> Option<Address>;

    fn is_connected(&self) -> bool {
        self.current_account().is_some()
    }
}

#[async_trait]
pub trait ContractReader: Send + Sync {
    /// Execute a view call and decode its single `uint256` result.
    async fn read(&self, call: &ContractCall, from: Option<Address>) -> Result<BigUint, VaultError>;
}

/// Why a write was refused. The text is surfaced to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteError(pub String);

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for WriteError {}

#[async_trait]
pub trait ContractWriter: Send + Sync {
    async fn submit(&self, from: Address, call: &ContractCall) -> Result<TxHandle, WriteError>;
}
