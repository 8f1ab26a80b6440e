//! Transaction Orchestrator
//!
//! Each operation kind (approve, deposit, withdraw) owns an independent
//! [`OperationSlot`]: its own `Idle -> Submitting -> Settled | Rejected`
//! state, published on a `watch` channel. A failed approval never blocks a
//! withdraw and vice versa.
//!
//! Submissions are fire-and-forget for the caller: the write runs on a
//! spawned task and the returned [`Submission`] future resolves exactly once
//! with the outcome. Status is published after the write has resolved.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{oneshot, watch};
use tracing::{info, warn};
use uuid::Uuid;

use crate::amount::AssetAmount;
use crate::chain::abi::check_uint256;
use crate::chain::{ContractCall, ContractWriter, WriteError};
use crate::error::VaultError;
use crate::models::{Address, TransactionOutcome, TransactionRequest, TxHandle, TxKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OperationState {
    Idle,
    Submitting,
    Settled { handle: TxHandle },
    Rejected { reason: String },
}

/// Snapshot of one operation slot.
#[derive(Debug, Clone, Serialize)]
pub struct OperationStatus {
    pub kind: TxKind,
    #[serde(flatten)]
    pub state: OperationState,
    /// User-facing status line ("Deposit transaction sent!", "Deposit failed: ...").
    pub message: Option<String>,
    pub request_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl OperationStatus {
    fn idle(kind: TxKind) -> Self {
        Self {
            kind,
            state: OperationState::Idle,
            message: None,
            request_id: None,
            updated_at: Utc::now(),
        }
    }

    fn submitting(kind: TxKind, request_id: Uuid) -> Self {
        Self {
            kind,
            state: OperationState::Submitting,
            message: None,
            request_id: Some(request_id),
            updated_at: Utc::now(),
        }
    }

    fn settled(kind: TxKind, request_id: Uuid, handle: TxHandle) -> Self {
        Self {
            kind,
            state: OperationState::Settled { handle },
            message: Some(kind.sent_message()),
            request_id: Some(request_id),
            updated_at: Utc::now(),
        }
    }

    fn rejected(kind: TxKind, request_id: Uuid, reason: String) -> Self {
        let message = VaultError::rejected(kind, reason.clone()).to_string();
        Self {
            kind,
            state: OperationState::Rejected { reason },
            message: Some(message),
            request_id: Some(request_id),
            updated_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, OperationState::Submitting)
    }

    /// Underlying rejection reason, verbatim.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            OperationState::Rejected { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Pending result of one submitted operation.
#[derive(Debug)]
pub struct Submission {
    pub request_id: Uuid,
    pub kind: TxKind,
    rx: oneshot::Receiver<TransactionOutcome>,
}

impl Submission {
    /// Resolve to the transaction handle, or `SubmissionRejected` carrying
    /// the writer's reason.
    pub async fn wait(self) -> Result<TxHandle, VaultError> {
        let kind = self.kind;
        match self.await {
            TransactionOutcome::Submitted(handle) => Ok(handle),
            TransactionOutcome::Failed(reason) => Err(VaultError::rejected(kind, reason)),
            TransactionOutcome::Pending => Err(VaultError::rejected(kind, "no outcome reported")),
        }
    }
}

impl Future for Submission {
    type Output = TransactionOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // Only reachable if the runtime dropped the submit task.
            Poll::Ready(Err(_)) => Poll::Ready(TransactionOutcome::Failed(
                "submission task ended without a result".to_string(),
            )),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Pending/settled/failed state for a single operation kind.
pub struct OperationSlot {
    kind: TxKind,
    writer: Arc<dyn ContractWriter>,
    status: Arc<watch::Sender<OperationStatus>>,
}

impl OperationSlot {
    pub fn new(kind: TxKind, writer: Arc<dyn ContractWriter>) -> Self {
        let (tx, _rx) = watch::channel(OperationStatus::idle(kind));
        Self {
            kind,
            writer,
            status: Arc::new(tx),
        }
    }

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    pub fn status(&self) -> OperationStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationStatus> {
        self.status.subscribe()
    }

    /// Mark the slot as submitting and hand the write to a task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(
        &self,
        request: TransactionRequest,
        call: ContractCall,
    ) -> Result<Submission, VaultError> {
        let kind = self.kind;
        let request_id = Uuid::new_v4();

        let mut busy = false;
        self.status.send_if_modified(|current| {
            if current.is_pending() {
                busy = true;
                return false;
            }
            *current = OperationStatus::submitting(kind, request_id);
            true
        });
        if busy {
            return Err(VaultError::Busy { kind });
        }

        info!(
            kind = kind.as_str(),
            %request_id,
            account = %request.account,
            amount = %request.amount,
            to = %call.to,
            "Submitting transaction"
        );

        let (tx, rx) = oneshot::channel();
        let writer = self.writer.clone();
        let status = self.status.clone();
        let account = request.account;

        tokio::spawn(async move {
            // A panicking writer must still release the slot.
            let write = tokio::spawn(async move { writer.submit(account, &call).await });
            let result = match write.await {
                Ok(result) => result,
                Err(e) => Err(WriteError(format!("writer task failed: {}", e))),
            };
            let outcome = match result {
                Ok(handle) => {
                    info!(kind = kind.as_str(), %request_id, handle = %handle, "Transaction sent");
                    status.send_replace(OperationStatus::settled(kind, request_id, handle.clone()));
                    TransactionOutcome::Submitted(handle)
                }
                Err(e) => {
                    warn!(kind = kind.as_str(), %request_id, reason = %e, "Transaction rejected");
                    status.send_replace(OperationStatus::rejected(kind, request_id, e.0.clone()));
                    TransactionOutcome::Failed(e.0)
                }
            };
            let _ = tx.send(outcome);
        });

        Ok(Submission {
            request_id,
            kind,
            rx,
        })
    }
}

/// Builds approve/deposit/withdraw calls and routes them to their slots.
pub struct TransactionOrchestrator {
    asset: Address,
    vault: Address,
    asset_decimals: u8,
    approve: OperationSlot,
    deposit: OperationSlot,
    withdraw: OperationSlot,
}

impl TransactionOrchestrator {
    pub fn new(
        writer: Arc<dyn ContractWriter>,
        asset: Address,
        vault: Address,
        asset_decimals: u8,
    ) -> Self {
        Self {
            asset,
            vault,
            asset_decimals,
            approve: OperationSlot::new(TxKind::Approve, writer.clone()),
            deposit: OperationSlot::new(TxKind::Deposit, writer.clone()),
            withdraw: OperationSlot::new(TxKind::Withdraw, writer),
        }
    }

    pub fn slot(&self, kind: TxKind) -> &OperationSlot {
        match kind {
            TxKind::Approve => &self.approve,
            TxKind::Deposit => &self.deposit,
            TxKind::Withdraw => &self.withdraw,
        }
    }

    /// Normalize to asset units and reject anything that cannot be sent.
    fn validate(&self, amount: AssetAmount) -> Result<AssetAmount, VaultError> {
        let amount = amount.rescale(self.asset_decimals).ok_or_else(|| {
            VaultError::invalid_amount(format!(
                "more than {} decimal places",
                self.asset_decimals
            ))
        })?;
        if amount.is_zero() {
            return Err(VaultError::invalid_amount("amount must be greater than zero"));
        }
        check_uint256(amount.raw())?;
        Ok(amount)
    }

    /// Approve `spender` for exactly `amount` of the asset.
    pub fn submit_approval(
        &self,
        account: Address,
        spender: Address,
        amount: AssetAmount,
    ) -> Result<Submission, VaultError> {
        let amount = self.validate(amount)?;
        let call = ContractCall::approve(self.asset, spender, amount.raw().clone());
        self.approve.submit(
            TransactionRequest {
                kind: TxKind::Approve,
                amount,
                account,
            },
            call,
        )
    }

    /// `deposit(amount, account)`. Approval sequencing is the caller's job;
    /// the amount is forwarded as-is even if it exceeds the allowance.
    pub fn submit_deposit(
        &self,
        account: Address,
        amount: AssetAmount,
    ) -> Result<Submission, VaultError> {
        let amount = self.validate(amount)?;
        let call = ContractCall::deposit(self.vault, amount.raw().clone(), account);
        self.deposit.submit(
            TransactionRequest {
                kind: TxKind::Deposit,
                amount,
                account,
            },
            call,
        )
    }

    /// `withdraw(amount, account, account)`: the account receives the assets
    /// and owns the burned shares.
    pub fn submit_withdraw(
        &self,
        account: Address,
        amount: AssetAmount,
    ) -> Result<Submission, VaultError> {
        let amount = self.validate(amount)?;
        let call = ContractCall::withdraw(self.vault, amount.raw().clone(), account, account);
        self.withdraw.submit(
            TransactionRequest {
                kind: TxKind::Withdraw,
                amount,
                account,
            },
            call,
        )
    }
}
