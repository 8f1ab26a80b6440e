//! Vault teller: the single entry point the CLI and HTTP API drive.
//!
//! Wires the current account, both readers, the approval policy, the
//! orchestrator and the presenter for one configured vault.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::amount::AssetAmount;
use crate::chain::{AccountProvider, ContractReader, ContractWriter};
use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::indexer::PositionIndexer;
use crate::models::{Address, TxKind};
use crate::orchestrator::{OperationStatus, Submission, TransactionOrchestrator};
use crate::policy::ApprovalPolicy;
use crate::presenter::{FormInput, FormMode, PositionPresenter, PositionSnapshot, PositionView, StatusBoard};
use crate::readers::{TokenLedgerReader, VaultReader};

/// Result of checking a deposit amount against the current allowance.
#[derive(Debug, Clone, Serialize)]
pub struct DepositPlan {
    pub amount: AssetAmount,
    pub allowance: Option<AssetAmount>,
    pub needs_approval: bool,
}

/// Shares expected for depositing or withdrawing `assets` right now.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub mode: FormMode,
    pub assets: AssetAmount,
    pub shares: Option<AssetAmount>,
}

pub struct VaultTeller {
    accounts: Arc<dyn AccountProvider>,
    token: TokenLedgerReader,
    vault: VaultReader,
    policy: ApprovalPolicy,
    orchestrator: TransactionOrchestrator,
    presenter: PositionPresenter,
    asset_decimals: u8,
    approval_timeout: Duration,
    approval_poll: Duration,
}

impl VaultTeller {
    pub fn new(
        config: &VaultConfig,
        accounts: Arc<dyn AccountProvider>,
        reader: Arc<dyn ContractReader>,
        writer: Arc<dyn ContractWriter>,
        indexer: Arc<dyn PositionIndexer>,
    ) -> Self {
        let policy = ApprovalPolicy::new(config.unknown_allowance);
        Self {
            accounts,
            token: TokenLedgerReader::new(reader.clone(), config.asset_address, config.asset_decimals),
            vault: VaultReader::new(
                reader,
                indexer,
                config.vault_address,
                config.chain_id,
                config.share_decimals(),
                config.asset_decimals,
            ),
            policy,
            orchestrator: TransactionOrchestrator::new(
                writer,
                config.asset_address,
                config.vault_address,
                config.asset_decimals,
            ),
            presenter: PositionPresenter::new(
                config.asset_symbol.clone(),
                config.asset_decimals,
                policy,
            ),
            asset_decimals: config.asset_decimals,
            approval_timeout: config.approval_timeout(),
            approval_poll: config.approval_poll(),
        }
    }

    pub fn account(&self) -> Option<Address> {
        self.accounts.current_account()
    }

    pub fn token(&self) -> &TokenLedgerReader {
        &self.token
    }

    pub fn vault(&self) -> &VaultReader {
        &self.vault
    }

    fn require_account(&self) -> Result<Address, VaultError> {
        self.accounts.current_account().ok_or(VaultError::NotConnected)
    }

    fn parse(&self, input: &str) -> Result<AssetAmount, VaultError> {
        AssetAmount::parse(input, self.asset_decimals)
    }

    /// Fresh snapshot for whoever is connected right now.
    pub async fn snapshot(&self) -> PositionSnapshot {
        PositionSnapshot::fetch(self.account(), &self.token, &self.vault).await
    }

    pub fn statuses(&self) -> StatusBoard {
        StatusBoard {
            approve: self.orchestrator.slot(TxKind::Approve).status(),
            deposit: self.orchestrator.slot(TxKind::Deposit).status(),
            withdraw: self.orchestrator.slot(TxKind::Withdraw).status(),
        }
    }

    pub fn subscribe(&self, kind: TxKind) -> watch::Receiver<OperationStatus> {
        self.orchestrator.slot(kind).subscribe()
    }

    pub async fn view(&self, form: &FormInput) -> PositionView {
        let snapshot = self.snapshot().await;
        self.presenter.render(&snapshot, &self.statuses(), form)
    }

    /// Parse `input` and decide whether an approval has to go first.
    pub async fn plan_deposit(&self, input: &str) -> Result<DepositPlan, VaultError> {
        let account = self.require_account()?;
        let amount = self.parse(input)?;
        let allowance = self.token.allowance(Some(account), self.vault.vault()).await;
        let needs_approval = self.policy.needs_approval(&amount, allowance.as_ref());
        debug!(
            %account,
            amount = %amount,
            allowance = allowance.as_ref().map(|a| a.format()).unwrap_or_else(|| "unknown".into()),
            needs_approval,
            "Deposit plan"
        );
        Ok(DepositPlan {
            amount,
            allowance,
            needs_approval,
        })
    }

    /// Re-read the allowance until it covers `amount`.
    ///
    /// A sent approval may not be mined yet. Gives up with `ReadUnavailable`
    /// once the configured approval timeout has passed.
    pub async fn await_allowance(&self, amount: &AssetAmount) -> Result<AssetAmount, VaultError> {
        let account = self.require_account()?;
        let deadline = Instant::now() + self.approval_timeout;
        loop {
            let allowance = self.token.allowance(Some(account), self.vault.vault()).await;
            match allowance {
                Some(current) if current >= *amount => {
                    info!(%account, allowance = %current, "Allowance confirmed");
                    return Ok(current);
                }
                current => {
                    if Instant::now() >= deadline {
                        warn!(%account, amount = %amount, "Allowance not confirmed before deadline");
                        return Err(VaultError::ReadUnavailable(format!(
                            "allowance still below {} after {}s",
                            amount,
                            self.approval_timeout.as_secs()
                        )));
                    }
                    debug!(
                        %account,
                        allowance = current.map(|a| a.format()).unwrap_or_else(|| "unknown".into()),
                        "Waiting for approval to land"
                    );
                }
            }
            tokio::time::sleep(self.approval_poll).await;
        }
    }

    /// Approve the vault to spend exactly `input` of the asset.
    pub fn approve(&self, input: &str) -> Result<Submission, VaultError> {
        let account = self.require_account()?;
        let amount = self.parse(input)?;
        self.orchestrator
            .submit_approval(account, self.vault.vault(), amount)
    }

    /// Submit a deposit as-is. The allowance is not checked here; call
    /// [`Self::plan_deposit`] first to sequence an approval.
    pub fn deposit(&self, input: &str) -> Result<Submission, VaultError> {
        let account = self.require_account()?;
        let amount = self.parse(input)?;
        self.orchestrator.submit_deposit(account, amount)
    }

    pub fn withdraw(&self, input: &str) -> Result<Submission, VaultError> {
        let account = self.require_account()?;
        let amount = self.parse(input)?;
        self.orchestrator.submit_withdraw(account, amount)
    }

    pub async fn quote(&self, mode: FormMode, input: &str) -> Result<Quote, VaultError> {
        let assets = self.parse(input)?;
        let shares = match mode {
            FormMode::Deposit => self.vault.preview_deposit(&assets).await,
            FormMode::Withdraw => self.vault.preview_withdraw(&assets).await,
        };
        Ok(Quote {
            mode,
            assets,
            shares,
        })
    }

    /// Compare the configured exponent against the token's own `decimals()`.
    pub async fn verify_decimals(&self) -> Option<u8> {
        let onchain = self.token.onchain_decimals().await;
        match onchain {
            Some(d) if d == self.asset_decimals => {
                info!(token = %self.token.token(), decimals = d, "Asset decimals confirmed");
            }
            Some(d) => warn!(
                token = %self.token.token(),
                configured = self.asset_decimals,
                onchain = d,
                "Configured asset decimals differ from token contract"
            ),
            None => debug!(token = %self.token.token(), "Could not confirm asset decimals"),
        }
        onchain
    }
}
