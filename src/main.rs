//! bank_ledger operator CLI
//!
//! ```text
//! bank_ledger [--env <name>] migrate
//! bank_ledger [--env <name>] open-account <owner> <currency> [balance]
//! bank_ledger [--env <name>] transfer <from> <to> <amount>
//! bank_ledger [--env <name>] issue-token <username>
//! bank_ledger [--env <name>] verify-token <token>
//! ```
//!
//! Uses PostgreSQL when `postgres_url` is configured, otherwise an in-memory
//! store that lives only for this invocation.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};

use bank_ledger::config::AppConfig;
use bank_ledger::db::Database;
use bank_ledger::ledger::{CreateAccountParams, LedgerStore, MemoryLedgerStore, PgLedgerStore};
use bank_ledger::token::build_token_maker;
use bank_ledger::transfer::{TransferEngine, TransferTxParams};

const USAGE: &str = "usage: bank_ledger [--env <name>] \
<migrate | open-account <owner> <currency> [balance] | transfer <from> <to> <amount> | \
issue-token <username> | verify-token <token>>";

/// Split `--env`/`-e` off the argument list. Defaults to `dev`.
fn parse_args(args: Vec<String>) -> Result<(String, Vec<String>)> {
    let mut env = "dev".to_string();
    let mut rest = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--env" || arg == "-e" {
            env = iter.next().ok_or_else(|| anyhow!("{arg} needs a value"))?;
        } else {
            rest.push(arg);
        }
    }
    Ok((env, rest))
}

fn parse_i64(value: &str, what: &str) -> Result<i64> {
    value
        .parse()
        .with_context(|| format!("{what} must be an integer, got {value:?}"))
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn LedgerStore>> {
    match &config.postgres_url {
        Some(url) => {
            let db = Database::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            Ok(Arc::new(PgLedgerStore::new(db.pool().clone())))
        }
        None => {
            tracing::warn!("postgres_url not set, using in-memory ledger store");
            Ok(Arc::new(MemoryLedgerStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (env, args) = parse_args(std::env::args().skip(1).collect())?;
    let app_config = AppConfig::load(&env)?;
    let _log_guard = bank_ledger::logging::init_logging(&app_config);

    tracing::info!("Starting bank_ledger in {} mode", env);

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["migrate"] => {
            let url = app_config
                .postgres_url
                .as_deref()
                .context("migrate needs postgres_url in config")?;
            let db = Database::connect(url).await?;
            db.health_check().await?;
            db.migrate().await?;
            println!("migrations applied");
        }
        ["open-account", owner, currency, rest @ ..] => {
            let balance = match rest {
                [] => 0,
                [balance] => parse_i64(balance, "balance")?,
                _ => bail!(USAGE),
            };
            let store = open_store(&app_config).await?;
            let account = store
                .create_account(CreateAccountParams {
                    owner: owner.to_string(),
                    balance,
                    currency: currency.to_string(),
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&account)?);
        }
        ["transfer", from, to, amount] => {
            let params = TransferTxParams {
                from_account_id: parse_i64(from, "from")?,
                to_account_id: parse_i64(to, "to")?,
                amount: parse_i64(amount, "amount")?,
            };
            let engine = TransferEngine::new(open_store(&app_config).await?);
            let result = engine
                .transfer(params)
                .await
                .map_err(|e| anyhow!("{} ({})", e.public_message(), e.code()))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        ["issue-token", username] => {
            let maker = build_token_maker(&app_config.token)?;
            let duration = app_config.token.access_token_duration()?;
            let token = maker.create_token(username, duration)?;
            println!("{token}");
        }
        ["verify-token", token] => {
            let maker = build_token_maker(&app_config.token)?;
            let payload = maker.verify_token(token)?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
