//! Position Presenter
//!
//! Turns an immutable [`PositionSnapshot`] plus the operation statuses into
//! display-ready text. Unknown values always render as a neutral placeholder,
//! never as zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::{AssetAmount, UsdValue};
use crate::models::{Address, TxKind, VaultPosition};
use crate::orchestrator::{OperationState, OperationStatus};
use crate::policy::ApprovalPolicy;
use crate::readers::{TokenLedgerReader, VaultReader};

pub const PLACEHOLDER: &str = "-";

/// Everything read for one account in one refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct PositionSnapshot {
    pub account: Option<Address>,
    pub asset_balance: Option<AssetAmount>,
    pub allowance: Option<AssetAmount>,
    pub position: Option<VaultPosition>,
    pub fetched_at: DateTime<Utc>,
}

impl PositionSnapshot {
    pub fn disconnected() -> Self {
        Self {
            account: None,
            asset_balance: None,
            allowance: None,
            position: None,
            fetched_at: Utc::now(),
        }
    }

    /// Issue every read for `account` concurrently and collect the results.
    pub async fn fetch(
        account: Option<Address>,
        token: &TokenLedgerReader,
        vault: &VaultReader,
    ) -> Self {
        if account.is_none() {
            return Self::disconnected();
        }

        let (asset_balance, allowance, position) = tokio::join!(
            token.balance_of(account),
            token.allowance(account, vault.vault()),
            vault.position(account),
        );

        Self {
            account,
            asset_balance,
            allowance,
            position,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }

    pub fn share_balance(&self) -> Option<&AssetAmount> {
        self.position.as_ref().map(|p| &p.share_balance)
    }
}

pub fn format_amount(amount: Option<&AssetAmount>) -> String {
    amount
        .map(AssetAmount::format)
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

pub fn format_usd(value: Option<&UsdValue>) -> String {
    value
        .map(|v| v.format_fixed(UsdValue::DISPLAY_DIGITS))
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Status lines mentioning "fail" (any case) are shown as errors. This is a
/// text heuristic, not a result code.
pub fn is_error_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("fail")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub text: String,
    pub is_error: bool,
}

impl StatusLine {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let is_error = is_error_message(&text);
        Self { text, is_error }
    }
}

/// Current status of all three operation slots.
#[derive(Debug, Clone, Serialize)]
pub struct StatusBoard {
    pub approve: OperationStatus,
    pub deposit: OperationStatus,
    pub withdraw: OperationStatus,
}

impl StatusBoard {
    pub fn get(&self, kind: TxKind) -> &OperationStatus {
        match kind {
            TxKind::Approve => &self.approve,
            TxKind::Deposit => &self.deposit,
            TxKind::Withdraw => &self.withdraw,
        }
    }

    /// Message of the most recently touched slot. A slot that has just
    /// started submitting clears the line until it resolves.
    pub fn latest_message(&self) -> Option<StatusLine> {
        TxKind::ALL
            .iter()
            .map(|k| self.get(*k))
            .filter(|s| s.state != OperationState::Idle)
            .max_by_key(|s| s.updated_at)
            .and_then(|s| s.message.as_deref())
            .map(StatusLine::new)
    }

    /// "Approve Error: ..." style lines for every slot that was rejected.
    pub fn error_lines(&self) -> Vec<String> {
        TxKind::ALL
            .iter()
            .filter_map(|k| {
                self.get(*k)
                    .error()
                    .map(|reason| format!("{} Error: {}", k.error_label(), reason))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormMode {
    #[default]
    Deposit,
    Withdraw,
}

/// What the user has typed and which tab is active.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormInput {
    #[serde(default)]
    pub mode: FormMode,
    #[serde(default)]
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionState {
    pub mode: FormMode,
    pub needs_approval: bool,
    pub show_approve: bool,
    pub approve_enabled: bool,
    pub approve_label: String,
    pub submit_enabled: bool,
    pub submit_label: String,
    pub input_error: Option<String>,
}

/// Display-ready page state.
#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub asset_symbol: String,
    pub account: String,
    pub connected: bool,
    pub asset_balance: String,
    pub vault_shares: String,
    pub position_assets: String,
    pub position_usd: String,
    pub allowance: String,
    pub status: Option<StatusLine>,
    pub errors: Vec<String>,
    pub actions: ActionState,
}

impl PositionView {
    /// Plain-text rendering for terminals.
    pub fn lines(&self) -> Vec<String> {
        let mut out = vec![
            format!("Account: {}", self.account),
            format!("Your {} balance: {}", self.asset_symbol, self.asset_balance),
            format!("Your vault shares: {}", self.vault_shares),
            format!("Position value ({}): {}", self.asset_symbol, self.position_assets),
            format!("Position value (USD): {}", self.position_usd),
            format!("Vault allowance: {}", self.allowance),
        ];
        if let Some(status) = &self.status {
            let tag = if status.is_error { "error" } else { "ok" };
            out.push(format!("Status [{}]: {}", tag, status.text));
        }
        out.extend(self.errors.iter().cloned());
        out
    }
}

#[derive(Debug, Clone)]
pub struct PositionPresenter {
    asset_symbol: String,
    asset_decimals: u8,
    policy: ApprovalPolicy,
}

impl PositionPresenter {
    pub fn new(asset_symbol: impl Into<String>, asset_decimals: u8, policy: ApprovalPolicy) -> Self {
        Self {
            asset_symbol: asset_symbol.into(),
            asset_decimals,
            policy,
        }
    }

    pub fn actions(
        &self,
        snapshot: &PositionSnapshot,
        statuses: &StatusBoard,
        form: &FormInput,
    ) -> ActionState {
        let connected = snapshot.is_connected();
        let approving = statuses.approve.is_pending();
        let depositing = statuses.deposit.is_pending();
        let withdrawing = statuses.withdraw.is_pending();

        // An empty field counts as zero so the buttons render before typing.
        let parsed = if form.amount.trim().is_empty() {
            Ok(AssetAmount::zero(self.asset_decimals))
        } else {
            AssetAmount::parse(&form.amount, self.asset_decimals)
        };
        let input_error = parsed.as_ref().err().map(|e| e.to_string());
        let has_amount = parsed.as_ref().map(|a| !a.is_zero()).unwrap_or(false);

        let needs_approval = match &parsed {
            Ok(amount) => self
                .policy
                .needs_approval(amount, snapshot.allowance.as_ref()),
            Err(_) => false,
        };

        let (submit_enabled, submit_label) = match form.mode {
            FormMode::Deposit => (
                connected && has_amount && !depositing && !needs_approval,
                if depositing {
                    TxKind::Deposit.pending_label()
                } else {
                    "Deposit"
                },
            ),
            FormMode::Withdraw => (
                connected && has_amount && !withdrawing,
                if withdrawing {
                    TxKind::Withdraw.pending_label()
                } else {
                    "Withdraw"
                },
            ),
        };

        let show_approve = form.mode == FormMode::Deposit && needs_approval;
        let approve_label = if approving {
            TxKind::Approve.pending_label().to_string()
        } else {
            format!("Approve {}", self.asset_symbol)
        };

        ActionState {
            mode: form.mode,
            needs_approval,
            show_approve,
            approve_enabled: show_approve && connected && has_amount && !approving,
            approve_label,
            submit_enabled,
            submit_label: submit_label.to_string(),
            input_error,
        }
    }

    pub fn render(
        &self,
        snapshot: &PositionSnapshot,
        statuses: &StatusBoard,
        form: &FormInput,
    ) -> PositionView {
        let position = snapshot.position.as_ref();

        PositionView {
            asset_symbol: self.asset_symbol.clone(),
            account: snapshot
                .account
                .map(|a| a.to_string())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            connected: snapshot.is_connected(),
            asset_balance: format_amount(snapshot.asset_balance.as_ref()),
            vault_shares: format_amount(snapshot.share_balance()),
            position_assets: format_amount(position.and_then(|p| p.underlying_assets.as_ref())),
            position_usd: format_usd(position.and_then(|p| p.underlying_assets_usd.as_ref())),
            allowance: format_amount(snapshot.allowance.as_ref()),
            status: statuses.latest_message(),
            errors: statuses.error_lines(),
            actions: self.actions(snapshot, statuses, form),
        }
    }
}
