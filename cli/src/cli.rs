//! # CLI Interface
//!
//! Command-line structure for `shardwallet` using `clap` derive.
//!
//! Account numbers are 1-based on the command line. `collect-dust` also
//! accepts `0`, meaning every account in the wallet.
//!
//! Predicate inputs (`--mint-input`, `--invariant-proof`) take one of:
//!
//! ```text
//! true       always-true predicate, empty proof
//! ptpkh      sign with the account the command runs as
//! ptpkh:N    sign with account N
//! 0x<hex>    literal proof bytes
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use shardwallet::config::LOCK_STATUS_MANUAL;
use shardwallet::types::UnitId;

/// Partition wallet.
///
/// Builds, signs and submits transactions to a partition over JSON-RPC and
/// waits for inclusion proofs.
#[derive(Parser, Debug)]
#[command(
    name = "shardwallet",
    about = "Partition wallet",
    version,
    propagate_version = true
)]
pub struct ShardwalletCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Wallet configuration file (JSON). Flags override its values.
    #[arg(long, short = 'c', global = true, env = "SHARDWALLET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Partition JSON-RPC endpoint.
    #[arg(long, global = true, env = "SHARDWALLET_RPC_URL")]
    pub rpc_url: Option<String>,

    /// File holding the hex-encoded 32-byte master seed.
    #[arg(
        long,
        global = true,
        env = "SHARDWALLET_SEED_FILE",
        default_value = "shardwallet.seed"
    )]
    pub seed_file: PathBuf,

    /// Number of accounts derived from the seed.
    #[arg(long, global = true, env = "SHARDWALLET_ACCOUNTS", default_value_t = 1)]
    pub accounts: usize,

    /// Log format: pretty or json.
    #[arg(long, global = true, env = "SHARDWALLET_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Return as soon as transactions are sent, without waiting for proofs.
    #[arg(long, global = true)]
    pub no_confirm: bool,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new master seed file.
    Init,
    /// Send value to another owner.
    Send(SendArgs),
    /// Consolidate small units of the same type.
    CollectDust(CollectDustArgs),
    /// Lock a unit.
    Lock(LockArgs),
    /// Unlock a unit.
    Unlock(UnitArgs),
    /// Mint new units of a token type.
    Mint(MintArgs),
    /// List units owned by an account.
    Units(ListArgs),
    /// Show an account's fee-credit balance.
    Fees(AccountArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct AccountArgs {
    /// Account number (1-based).
    #[arg(long, short = 'k', default_value_t = 1)]
    pub key: u64,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub account: AccountArgs,

    /// Print units as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub account: AccountArgs,

    /// Receiver's hex-encoded Ed25519 public key.
    #[arg(long, short = 'a', value_parser = parse_public_key)]
    pub address: [u8; 32],

    /// Amount to send.
    #[arg(long)]
    pub amount: u64,

    /// Unit type id (hex).
    #[arg(long = "type", value_parser = parse_unit_id)]
    pub type_id: UnitId,

    /// Proofs for the type's invariant predicates, in order.
    #[arg(long = "invariant-proof", value_parser = parse_predicate_arg)]
    pub invariant_proofs: Vec<PredicateArg>,
}

#[derive(Args, Debug)]
pub struct CollectDustArgs {
    /// Account number (1-based); 0 collects for every account.
    #[arg(long, short = 'k', default_value_t = 0)]
    pub key: u64,

    /// Restrict collection to these type ids (hex). Repeatable.
    #[arg(long = "type", value_parser = parse_unit_id)]
    pub types: Vec<UnitId>,

    /// Proofs for the types' invariant predicates, in order.
    #[arg(long = "invariant-proof", value_parser = parse_predicate_arg)]
    pub invariant_proofs: Vec<PredicateArg>,
}

#[derive(Args, Debug)]
pub struct UnitArgs {
    #[command(flatten)]
    pub account: AccountArgs,

    /// Unit id (hex).
    #[arg(long, value_parser = parse_unit_id)]
    pub unit: UnitId,
}

#[derive(Args, Debug)]
pub struct LockArgs {
    #[command(flatten)]
    pub target: UnitArgs,

    /// Lock status code (non-zero).
    #[arg(long, default_value_t = LOCK_STATUS_MANUAL)]
    pub status: u64,
}

#[derive(Args, Debug)]
pub struct MintArgs {
    #[command(flatten)]
    pub account: AccountArgs,

    /// Token type id (hex).
    #[arg(long = "type", value_parser = parse_unit_id)]
    pub type_id: UnitId,

    /// Amount to mint.
    #[arg(long)]
    pub amount: u64,

    /// Input satisfying the type's minting predicate.
    #[arg(long, default_value = "ptpkh", value_parser = parse_predicate_arg)]
    pub mint_input: PredicateArg,
}

// ---------------------------------------------------------------------------
// Value parsers
// ---------------------------------------------------------------------------

/// A predicate input as written on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateArg {
    AlwaysTrue,
    /// Sign with the given 1-based account, or the command's own account.
    AccountKey(Option<u64>),
    Argument(Vec<u8>),
}

pub fn parse_predicate_arg(s: &str) -> Result<PredicateArg, String> {
    match s {
        "true" => Ok(PredicateArg::AlwaysTrue),
        "ptpkh" => Ok(PredicateArg::AccountKey(None)),
        _ => {
            if let Some(n) = s.strip_prefix("ptpkh:") {
                let account: u64 = n.parse().map_err(|e| format!("bad account number: {e}"))?;
                if account == 0 {
                    return Err("account numbers start at 1".into());
                }
                Ok(PredicateArg::AccountKey(Some(account)))
            } else if let Some(hex_arg) = s.strip_prefix("0x") {
                hex::decode(hex_arg)
                    .map(PredicateArg::Argument)
                    .map_err(|e| format!("bad hex argument: {e}"))
            } else {
                Err(format!(
                    "unknown predicate input {s:?}: expected true, ptpkh, ptpkh:N or 0x<hex>"
                ))
            }
        }
    }
}

pub fn parse_unit_id(s: &str) -> Result<UnitId, String> {
    UnitId::from_hex(s).map_err(|e| format!("bad unit id: {e}"))
}

pub fn parse_public_key(s: &str) -> Result<[u8; 32], String> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| format!("bad public key: {e}"))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("public key must be 32 bytes, got {}", b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        ShardwalletCli::command().debug_assert();
    }

    #[test]
    fn predicate_inputs_parse() {
        assert_eq!(parse_predicate_arg("true"), Ok(PredicateArg::AlwaysTrue));
        assert_eq!(parse_predicate_arg("ptpkh"), Ok(PredicateArg::AccountKey(None)));
        assert_eq!(
            parse_predicate_arg("ptpkh:3"),
            Ok(PredicateArg::AccountKey(Some(3)))
        );
        assert_eq!(
            parse_predicate_arg("0x0a0b"),
            Ok(PredicateArg::Argument(vec![0x0a, 0x0b]))
        );
        assert!(parse_predicate_arg("ptpkh:0").is_err());
        assert!(parse_predicate_arg("0xzz").is_err());
        assert!(parse_predicate_arg("maybe").is_err());
    }

    #[test]
    fn send_arguments_parse() {
        let pk = "11".repeat(32);
        let cli = ShardwalletCli::try_parse_from([
            "shardwallet",
            "--no-confirm",
            "send",
            "-k",
            "2",
            "--address",
            &pk,
            "--amount",
            "60",
            "--type",
            "0xaa",
        ])
        .unwrap();

        assert!(cli.global.no_confirm);
        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.account.key, 2);
        assert_eq!(args.address, [0x11; 32]);
        assert_eq!(args.amount, 60);
        assert_eq!(args.type_id, UnitId::new(vec![0xaa]));
        assert!(args.invariant_proofs.is_empty());
    }

    #[test]
    fn collect_dust_defaults_to_all_accounts() {
        let cli = ShardwalletCli::try_parse_from([
            "shardwallet",
            "collect-dust",
            "--type",
            "01",
            "--type",
            "02",
        ])
        .unwrap();
        let Commands::CollectDust(args) = cli.command else {
            panic!("expected collect-dust");
        };
        assert_eq!(args.key, 0);
        assert_eq!(args.types.len(), 2);
    }

    #[test]
    fn short_public_key_is_rejected() {
        assert!(parse_public_key("abcd").is_err());
        assert!(parse_public_key(&format!("0x{}", "ab".repeat(32))).is_ok());
    }
}
