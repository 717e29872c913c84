// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Shardwallet CLI
//!
//! Entry point for the `shardwallet` binary. Parses CLI arguments, sets up
//! logging, loads the seed and config, and runs one wallet operation against
//! the configured partition.
//!
//! - `init`         — create a seed file
//! - `send`         — pay another owner
//! - `collect-dust` — consolidate small units
//! - `lock`/`unlock`, `mint`
//! - `units`, `fees` — read-only queries
//! - `version`      — print build version information

mod cli;
mod logging;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use shardwallet::accounts::{AccountManager, AccountSelector, KeyRing};
use shardwallet::config::WalletConfig;
use shardwallet::crypto::sha256;
use shardwallet::dust::AccountDustResult;
use shardwallet::predicate::PredicateInput;
use shardwallet::rpc::JsonRpcClient;
use shardwallet::txsubmitter::TxSubmission;
use shardwallet::{SendRequest, Wallet};

use cli::{Commands, GlobalArgs, PredicateArg, ShardwalletCli};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ShardwalletCli::parse();
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&cli.global.log_format),
    );

    match cli.command {
        Commands::Init => init_seed(&cli.global.seed_file, cli.global.accounts),
        Commands::Version => {
            print_version();
            Ok(())
        }
        command => run_command(&cli.global, command).await,
    }
}

/// Commands that talk to the partition.
async fn run_command(global: &GlobalArgs, command: Commands) -> Result<()> {
    let config = load_config(global)?;
    let ring = Arc::new(load_key_ring(&global.seed_file, global.accounts)?);
    let client = Arc::new(
        JsonRpcClient::new(&config.rpc_url, config.request_timeout())
            .with_context(|| format!("failed to create RPC client for {}", config.rpc_url))?,
    );
    tracing::debug!(rpc_url = %config.rpc_url, partition = config.partition_id, "wallet ready");

    let mut wallet = Wallet::new(client, ring.clone(), config);
    if global.no_confirm {
        wallet = wallet.without_confirmation();
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received, cancelling");
        on_signal.cancel();
    });

    match command {
        Commands::Send(args) => {
            let account_index = account_index(args.account.key)?;
            let request = SendRequest {
                account_index,
                receiver: sha256(&args.address),
                amount: args.amount,
                type_id: args.type_id,
                invariants: resolve_inputs(&args.invariant_proofs, ring.as_ref(), account_index)?,
            };
            let submissions = wallet.send(&cancel, &request).await?;
            print_submissions(&submissions);
        }
        Commands::CollectDust(args) => {
            let (selector, default_index) = match args.key {
                0 => (AccountSelector::All, 0),
                key => {
                    let index = account_index(key)?;
                    (AccountSelector::Index(index), index)
                }
            };
            let invariants = resolve_inputs(&args.invariant_proofs, ring.as_ref(), default_index)?;
            match wallet
                .collect_dust(&cancel, selector, &args.types, &invariants)
                .await
            {
                Ok(results) => print_dust_results(&results),
                Err(err) => {
                    print_dust_results(&err.results);
                    return Err(err.into());
                }
            }
        }
        Commands::Lock(args) => {
            let submission = wallet
                .lock(
                    &cancel,
                    account_index(args.target.account.key)?,
                    &args.target.unit,
                    args.status,
                )
                .await?;
            print_submissions(std::slice::from_ref(&submission));
        }
        Commands::Unlock(args) => {
            let submission = wallet
                .unlock(&cancel, account_index(args.account.key)?, &args.unit)
                .await?;
            print_submissions(std::slice::from_ref(&submission));
        }
        Commands::Mint(args) => {
            let account_index = account_index(args.account.key)?;
            let mint_input = resolve_input(&args.mint_input, ring.as_ref(), account_index)?;
            let submission = wallet
                .mint(
                    &cancel,
                    account_index,
                    &args.type_id,
                    args.amount,
                    Some(&mint_input),
                )
                .await?;
            print_submissions(std::slice::from_ref(&submission));
        }
        Commands::Units(args) => {
            let units = wallet.list_units(account_index(args.account.key)?).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&units)?);
            } else if units.is_empty() {
                println!("No units.");
            } else {
                for unit in &units {
                    println!(
                        "{}  type={}  amount={}  counter={}  lock={}",
                        unit.id, unit.type_id, unit.amount, unit.counter, unit.lock_status
                    );
                }
            }
        }
        Commands::Fees(args) => match wallet.fee_credit(account_index(args.key)?).await? {
            Some(record) => println!("Fee credit {}: {}", record.id, record.balance),
            None => println!("No fee credit."),
        },
        Commands::Init | Commands::Version => {
            bail!("init and version do not talk to the partition")
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Defaults, then the config file, then command-line overrides.
fn load_config(global: &GlobalArgs) -> Result<WalletConfig> {
    let mut config = match &global.config {
        Some(path) => WalletConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => WalletConfig::default(),
    };
    if let Some(url) = &global.rpc_url {
        config.rpc_url = url.clone();
    }
    config.validate().context("invalid wallet configuration")?;
    Ok(config)
}

fn load_key_ring(path: &Path, accounts: usize) -> Result<KeyRing> {
    let raw = std::fs::read_to_string(path).with_context(|| {
        format!(
            "failed to read seed file {} (run `shardwallet init` first)",
            path.display()
        )
    })?;
    KeyRing::from_hex_seed(&raw, accounts.max(1))
        .with_context(|| format!("invalid seed in {}", path.display()))
}

/// Creates a new seed file. Never overwrites an existing one.
fn init_seed(path: &Path, accounts: usize) -> Result<()> {
    if path.exists() {
        bail!("seed file {} already exists", path.display());
    }
    let seed: [u8; 32] = rand::random();
    std::fs::write(path, hex::encode(seed))
        .with_context(|| format!("failed to write seed to {}", path.display()))?;

    // Restrict permissions on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    let ring = KeyRing::from_seed(seed, accounts.max(1));
    tracing::info!(seed_file = %path.display(), accounts = ring.account_count(), "seed created");

    println!("Wallet initialized.");
    println!("  Seed file : {}", path.display());
    for (i, key) in ring.account_keys().iter().enumerate() {
        println!("  Account {} : {}", i + 1, key.public_key_hex());
    }
    Ok(())
}

/// Converts a 1-based account number to the library's 0-based index.
fn account_index(key: u64) -> Result<u64> {
    key.checked_sub(1)
        .ok_or_else(|| anyhow!("account numbers start at 1"))
}

fn resolve_input(
    arg: &PredicateArg,
    accounts: &dyn AccountManager,
    default_index: u64,
) -> Result<PredicateInput> {
    Ok(match arg {
        PredicateArg::AlwaysTrue => PredicateInput::AlwaysTrue,
        PredicateArg::Argument(bytes) => PredicateInput::Argument(bytes.clone()),
        PredicateArg::AccountKey(None) => {
            PredicateInput::AccountKey(accounts.account_key(default_index)?)
        }
        PredicateArg::AccountKey(Some(n)) => {
            PredicateInput::AccountKey(accounts.account_key(account_index(*n)?)?)
        }
    })
}

fn resolve_inputs(
    args: &[PredicateArg],
    accounts: &dyn AccountManager,
    default_index: u64,
) -> Result<Vec<PredicateInput>> {
    args.iter()
        .map(|arg| resolve_input(arg, accounts, default_index))
        .collect()
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_submissions(submissions: &[TxSubmission]) {
    for sub in submissions {
        match &sub.proof {
            Some(proof) => println!(
                "{}  unit={}  round={}  fee={}  {}",
                sub.tx_hash,
                sub.unit_id,
                proof.round,
                proof.actual_fee(),
                if proof.is_successful() { "ok" } else { "failed" }
            ),
            None => println!("{}  unit={}  sent", sub.tx_hash, sub.unit_id),
        }
    }
}

fn print_dust_results(results: &[AccountDustResult]) {
    if results.is_empty() {
        println!("Nothing to collect.");
        return;
    }
    for account in results {
        println!(
            "Account {}: {} type(s), fees {}",
            account.account_index + 1,
            account.results.len(),
            account.fee_sum()
        );
        for r in &account.results {
            println!(
                "  type={}  target={}  amount={}  burned={}  chunks={}  fees={}",
                r.type_id, r.target_unit_id, r.target_amount, r.burned_units, r.chunks, r.fee_sum
            );
        }
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("shardwallet {}", env!("CARGO_PKG_VERSION"));
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. A handler that fails to
/// install never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_numbers_are_one_based() {
        assert_eq!(account_index(1).unwrap(), 0);
        assert_eq!(account_index(3).unwrap(), 2);
        assert!(account_index(0).is_err());
    }

    #[test]
    fn init_writes_a_loadable_seed_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.seed");

        init_seed(&path, 2).unwrap();
        let ring = load_key_ring(&path, 2).unwrap();
        assert_eq!(ring.account_count(), 2);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let before = std::fs::read_to_string(&path).unwrap();
        assert!(init_seed(&path, 1).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn missing_seed_file_mentions_init() {
        let dir = tempfile::tempdir().unwrap();
        let Err(err) = load_key_ring(&dir.path().join("absent.seed"), 1) else {
            panic!("loading a missing seed file succeeded");
        };
        assert!(format!("{err:#}").contains("shardwallet init"));
    }

    #[test]
    fn predicate_args_resolve_against_the_key_ring() {
        let ring = KeyRing::from_seed([5; 32], 2);

        let own = resolve_input(&PredicateArg::AccountKey(None), &ring, 1).unwrap();
        let PredicateInput::AccountKey(key) = own else {
            panic!("expected account key");
        };
        assert_eq!(key.public_key(), ring.account_key(1).unwrap().public_key());

        let first = resolve_input(&PredicateArg::AccountKey(Some(1)), &ring, 1).unwrap();
        let PredicateInput::AccountKey(key) = first else {
            panic!("expected account key");
        };
        assert_eq!(key.public_key(), ring.account_key(0).unwrap().public_key());

        assert!(resolve_input(&PredicateArg::AccountKey(Some(3)), &ring, 0).is_err());
        assert!(matches!(
            resolve_input(&PredicateArg::AlwaysTrue, &ring, 0).unwrap(),
            PredicateInput::AlwaysTrue
        ));
    }

    #[test]
    fn rpc_url_flag_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        std::fs::write(&path, r#"{"rpc_url": "http://file:1/rpc", "partition_id": 7}"#).unwrap();

        let global = GlobalArgs {
            config: Some(path),
            rpc_url: Some("http://flag:2/rpc".into()),
            seed_file: dir.path().join("unused.seed"),
            accounts: 1,
            log_format: "pretty".into(),
            no_confirm: false,
        };
        let config = load_config(&global).unwrap();
        assert_eq!(config.rpc_url, "http://flag:2/rpc");
        assert_eq!(config.partition_id, 7);
    }
}
