use parking_lot::RwLock;
use tracing::info;

use super::AccountProvider;
use crate::models::Address;

/// In-process record of the connected wallet account.
///
/// Connect/disconnect come from the outer surface (CLI flag, HTTP session
/// endpoint); everything else only reads it.
#[derive(Debug, Default)]
pub struct WalletSession {
    account: RwLock<Option<Address>>,
}

impl WalletSession {
    pub fn new(account: Option<Address>) -> Self {
        Self {
            account: RwLock::new(account),
        }
    }

    pub fn connect(&self, account: Address) {
        let previous = self.account.write().replace(account);
        if previous != Some(account) {
            info!(account = %account, "Wallet connected");
        }
    }

    pub fn disconnect(&self) {
        if let Some(previous) = self.account.write().take() {
            info!(account = %previous, "Wallet disconnected");
        }
    }
}

impl AccountProvider for WalletSession {
    fn current_account(&self) -> Option<Address> {
        *self.account.read()
    }
}
