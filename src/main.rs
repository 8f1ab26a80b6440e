//! EarnVault - deposit/withdraw client for a single ERC-4626 vault
//!
//! Usage:
//!   earnvault status --account 0x...
//!   earnvault approve 25 --account 0x...
//!   earnvault deposit 25 --account 0x...
//!   earnvault serve
//!
//! Environment:
//!   EARNVAULT_CONFIG_PATH - TOML config file (default: earnvault.toml if present)
//!   EARNVAULT_ACCOUNT - Account to act for
//!   EARNVAULT_RPC_URL - JSON-RPC endpoint (must be able to sign for the account)
//!   EARNVAULT_INDEXER_URL - Morpho GraphQL endpoint
//!   EARNVAULT_APPROVAL_TIMEOUT_SECS - How long `deposit --approve` waits for the allowance

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use earnvault_backend::{
    api::{self, AppState},
    chain::{AccountProvider, JsonRpcClient, WalletSession},
    config::VaultConfig,
    indexer::MorphoIndexer,
    models::Address,
    orchestrator::Submission,
    presenter::{FormInput, FormMode},
    VaultTeller,
};

#[derive(Parser, Debug)]
#[command(name = "earnvault")]
#[command(about = "Deposit into and withdraw from an ERC-4626 yield vault")]
struct Args {
    /// Account to read for and submit from
    #[arg(long, global = true, env = "EARNVAULT_ACCOUNT")]
    account: Option<String>,

    /// JSON-RPC endpoint (overrides config)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Indexer GraphQL endpoint (overrides config)
    #[arg(long, global = true)]
    indexer_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show balances, allowance and position value
    Status,
    /// Preview shares for a deposit or withdraw
    Quote {
        amount: String,
        #[arg(long)]
        withdraw: bool,
    },
    /// Approve the vault to spend exactly AMOUNT of the asset
    Approve { amount: String },
    /// Deposit AMOUNT of the asset into the vault
    Deposit {
        amount: String,
        /// Send the approval first when the allowance is too low
        #[arg(long)]
        approve: bool,
    },
    /// Withdraw AMOUNT of the asset from the vault
    Withdraw { amount: String },
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let args = Args::parse();

    let mut config = VaultConfig::from_env().context("Failed to load vault config")?;
    if let Some(url) = args.rpc_url.clone() {
        config.rpc_url = url;
    }
    if let Some(url) = args.indexer_url.clone() {
        config.indexer_url = url;
    }

    let account = args
        .account
        .as_deref()
        .map(|a| a.parse::<Address>())
        .transpose()
        .context("Invalid --account")?;

    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let rpc = Arc::new(JsonRpcClient::new(http_client.clone(), config.rpc_url.clone()));
    let indexer = Arc::new(MorphoIndexer::new(
        http_client,
        config.indexer_url.clone(),
        config.share_decimals(),
        config.asset_decimals,
    ));
    let session = Arc::new(WalletSession::new(account));
    let teller = Arc::new(VaultTeller::new(
        &config,
        session.clone(),
        rpc.clone(),
        rpc.clone(),
        indexer,
    ));

    info!(
        chain_id = config.chain_id,
        vault = %config.vault_address,
        asset = %config.asset_address,
        rpc = rpc.url(),
        "EarnVault starting"
    );
    check_chain(&rpc, config.chain_id).await;
    teller.verify_decimals().await;

    match args.command {
        Command::Status => print_status(&teller).await,
        Command::Quote { amount, withdraw } => {
            let mode = if withdraw {
                FormMode::Withdraw
            } else {
                FormMode::Deposit
            };
            let quote = teller.quote(mode, &amount).await?;
            let shares = quote
                .shares
                .map(|s| s.format())
                .unwrap_or_else(|| "-".to_string());
            println!("{} {} -> {} shares", config.asset_symbol, quote.assets, shares);
            Ok(())
        }
        Command::Approve { amount } => {
            require_account(&session)?;
            settle(teller.approve(&amount)?).await
        }
        Command::Deposit { amount, approve } => {
            require_account(&session)?;
            let plan = teller.plan_deposit(&amount).await?;
            if plan.needs_approval {
                if !approve {
                    bail!(
                        "Allowance {} is below {}; run `earnvault approve {}` or pass --approve",
                        plan.allowance.map(|a| a.format()).unwrap_or_else(|| "-".into()),
                        plan.amount,
                        amount
                    );
                }
                settle(teller.approve(&amount)?).await?;
                teller
                    .await_allowance(&plan.amount)
                    .await
                    .context("Approval sent but not yet confirmed; retry the deposit later")?;
            }
            settle(teller.deposit(&amount)?).await
        }
        Command::Withdraw { amount } => {
            require_account(&session)?;
            settle(teller.withdraw(&amount)?).await
        }
        Command::Serve { bind } => {
            let addr = bind.unwrap_or_else(|| config.bind_addr.clone());
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            api::serve(listener, AppState::new(teller, session)).await
        }
    }
}

fn require_account(session: &WalletSession) -> Result<()> {
    if !session.is_connected() {
        bail!("No account connected; pass --account or set EARNVAULT_ACCOUNT");
    }
    Ok(())
}

async fn settle(submission: Submission) -> Result<()> {
    let kind = submission.kind;
    let handle = submission.wait().await?;
    println!("{} ({})", kind.sent_message(), handle);
    Ok(())
}

async fn print_status(teller: &VaultTeller) -> Result<()> {
    let view = teller.view(&FormInput::default()).await;
    for line in view.lines() {
        println!("{}", line);
    }
    Ok(())
}

async fn check_chain(rpc: &JsonRpcClient, expected: u64) {
    match rpc.chain_id().await {
        Ok(id) if id == expected => {}
        Ok(id) => warn!(expected, actual = id, "RPC endpoint is on a different chain"),
        Err(e) => warn!(error = %e, "Could not read chain id"),
    }
}

/// Initialize tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "earnvault_backend=debug,earnvault=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate root .env when run from elsewhere.
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
