//! End-to-end vault flow over JSON-RPC and GraphQL.
//!
//! A fake node and indexer run in-process; the teller talks to them through
//! the production `JsonRpcClient` and `MorphoIndexer`.

mod common;

use common::{account, harness, usdc, ACCOUNT};
use earnvault_backend::models::TxKind;
use earnvault_backend::presenter::{FormInput, FormMode};
use earnvault_backend::VaultError;

#[tokio::test]
async fn test_snapshot_reads_through_rpc_and_indexer() {
    let h = harness(usdc(100)).await;
    h.node.lock().shares = usdc(50);

    let snapshot = h.teller.snapshot().await;
    assert_eq!(snapshot.account, Some(account()));
    assert_eq!(snapshot.asset_balance.as_ref().unwrap().format(), "100");
    assert_eq!(snapshot.allowance.as_ref().unwrap().format(), "0");

    let position = snapshot.position.unwrap();
    assert_eq!(position.share_balance.format(), "50");
    // Mixed-case vault address in the indexer still matches.
    assert_eq!(position.underlying_assets.unwrap().format(), "51");
    assert_eq!(position.underlying_assets_usd.unwrap().to_string(), "1.019900");

    let queries = h.node.lock().indexer_queries.clone();
    assert_eq!(queries[0]["chainId"], 8453);
    assert_eq!(queries[0]["userAddress"], ACCOUNT);
}

#[tokio::test]
async fn test_approve_then_deposit_then_withdraw() {
    let h = harness(usdc(100)).await;

    let plan = h.teller.plan_deposit("25").await.unwrap();
    assert!(plan.needs_approval);

    h.teller.approve("25").unwrap().wait().await.unwrap();
    {
        let node = h.node.lock();
        let approve = &node.sent[0];
        assert_eq!(approve["from"], ACCOUNT);
        assert!(approve["data"].as_str().unwrap().starts_with("0x095ea7b3"));
        assert_eq!(node.allowance, usdc(25));
    }

    assert!(!h.teller.plan_deposit("25").await.unwrap().needs_approval);
    h.teller.deposit("25").unwrap().wait().await.unwrap();

    let snapshot = h.teller.snapshot().await;
    assert_eq!(snapshot.asset_balance.as_ref().unwrap().format(), "75");
    assert_eq!(snapshot.share_balance().unwrap().format(), "25");

    h.teller.withdraw("10.5").unwrap().wait().await.unwrap();
    let snapshot = h.teller.snapshot().await;
    assert_eq!(snapshot.asset_balance.as_ref().unwrap().format(), "85.5");
    assert_eq!(snapshot.share_balance().unwrap().format(), "14.5");

    let statuses = h.teller.statuses();
    assert_eq!(
        statuses.latest_message().unwrap().text,
        "Withdraw transaction sent!"
    );
    assert!(statuses.error_lines().is_empty());
}

#[tokio::test]
async fn test_deposit_above_allowance_surfaces_node_reason() {
    let h = harness(usdc(100)).await;
    h.node.lock().allowance = usdc(5);

    let err = h.teller.deposit("10").unwrap().wait().await.unwrap_err();
    assert_eq!(
        err,
        VaultError::SubmissionRejected {
            kind: TxKind::Deposit,
            reason: "execution reverted: ERC20: insufficient allowance".into(),
        }
    );

    let view = h.teller.view(&FormInput::default()).await;
    let status = view.status.unwrap();
    assert!(status.is_error);
    assert_eq!(
        status.text,
        "Deposit failed: execution reverted: ERC20: insufficient allowance"
    );
    assert_eq!(
        view.errors,
        vec!["Deposit Error: execution reverted: ERC20: insufficient allowance".to_string()]
    );
    // Balances were not touched.
    assert_eq!(view.asset_balance, "100");
    assert_eq!(view.allowance, "5");
}

#[tokio::test]
async fn test_failed_reads_render_placeholders() {
    let h = harness(usdc(100)).await;
    {
        let mut node = h.node.lock();
        node.fail_reads = true;
        node.indexer_errors = true;
    }

    let view = h
        .teller
        .view(&FormInput {
            mode: FormMode::Deposit,
            amount: "1".into(),
        })
        .await;
    assert!(view.connected);
    assert_eq!(view.asset_balance, "-");
    assert_eq!(view.vault_shares, "-");
    assert_eq!(view.allowance, "-");
    assert_eq!(view.position_usd, "-");
    // Unknown allowance does not force an approval by default.
    assert!(!view.actions.needs_approval);
    assert!(view.actions.submit_enabled);
}

#[tokio::test]
async fn test_indexer_outage_keeps_share_balance() {
    let h = harness(usdc(1)).await;
    {
        let mut node = h.node.lock();
        node.shares = usdc(3);
        node.indexer_errors = true;
    }

    let position = h.teller.snapshot().await.position.unwrap();
    assert_eq!(position.share_balance.format(), "3");
    assert!(position.underlying_assets.is_none());
    assert!(position.underlying_assets_usd.is_none());
}

#[tokio::test]
async fn test_unreachable_endpoints_degrade_to_unknown() {
    let h = harness(usdc(1)).await;
    let dead = earnvault_backend::chain::JsonRpcClient::new(reqwest::Client::new(), "http://127.0.0.1:1/rpc");
    assert!(matches!(dead.chain_id().await, Err(VaultError::NetworkError(_))));

    h.session.disconnect();
    let snapshot = h.teller.snapshot().await;
    assert!(snapshot.asset_balance.is_none());
    assert!(snapshot.position.is_none());
    assert_eq!(h.teller.deposit("1").unwrap_err(), VaultError::NotConnected);
}

#[tokio::test]
async fn test_chain_metadata() {
    let h = harness(usdc(0)).await;
    assert_eq!(h.rpc.chain_id().await.unwrap(), 8453);
    assert_eq!(h.rpc.accounts().await.unwrap(), vec![account()]);
    assert_eq!(h.teller.verify_decimals().await, Some(6));

    let quote = h.teller.quote(FormMode::Deposit, "12.34").await.unwrap();
    assert_eq!(quote.shares.unwrap().format(), "12.34");
}
