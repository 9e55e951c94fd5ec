//! walletctl CLI - wallet controller operations as JSON
//!
//!   walletctl unspent [--all]               → spendable (or all) outputs
//!   walletctl pubkey <addr>                 → {"address", "pubkey"}
//!   walletctl tx-status <txid> <script-hex> → {"status", "block_height", ...}
//!   walletctl sign-message <addr> <msg>     → BIP322 witness
//!   walletctl unlock <secs>                 → unlock the wallet
//!
//! Configuration comes from WALLETCTL_* environment variables (see `WalletControllerConfig::from_env`).

use anyhow::{anyhow, bail, Context, Result};
use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network, ScriptBuf, Txid};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use tracing::debug;
use walletctl::logging::init_logging;
use walletctl::{RpcWalletController, WalletController, WalletControllerConfig};

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }
    if opts.version {
        println!("walletctl {}", env!("CARGO_PKG_VERSION"));
        return;
    }
    let Some(command) = opts.command.clone() else {
        print_usage();
        return;
    };

    let result = run(&command, &opts);
    let pretty = opts.pretty || std::io::stdout().is_terminal();
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{e:#}")}), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

fn run(command: &str, opts: &ParsedArgs) -> Result<Value> {
    let mut config = WalletControllerConfig::from_env()?;
    if let Some(network) = &opts.network {
        config.network = walletctl::config::parse_network(network)?;
    }
    debug!(?config, command, "starting");
    let controller = RpcWalletController::connect(&config)?;

    match command {
        "unspent" => cmd_unspent(&controller, opts),
        "pubkey" => cmd_pubkey(&controller, opts),
        "tx-status" => cmd_tx_status(&controller, opts),
        "sign-message" => cmd_sign_message(&controller, opts),
        "unlock" => cmd_unlock(&controller, opts),
        other => bail!("Unknown command: {other}"),
    }
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    args: Vec<String>,
    network: Option<String>,
    all: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--pretty" => opts.pretty = true,
                "--all" | "-a" => opts.all = true,
                "--network" | "-n" => {
                    if i + 1 < args.len() {
                        opts.network = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }
        opts.args = positional;
        opts
    }

    fn arg(&self, index: usize, name: &str) -> Result<&str> {
        self.args.get(index).map(String::as_str).ok_or_else(|| anyhow!("missing <{name}>"))
    }
}

fn parse_address(raw: &str, network: Network) -> Result<Address> {
    let unchecked: Address<NetworkUnchecked> = raw.parse().with_context(|| format!("invalid address {raw}"))?;
    Ok(unchecked.require_network(network).with_context(|| format!("address {raw} is not for {network}"))?)
}

fn cmd_unspent<C: WalletController>(controller: &C, opts: &ParsedArgs) -> Result<Value> {
    let utxos = controller.list_unspent_outputs(!opts.all)?;
    Ok(serde_json::to_value(utxos)?)
}

fn cmd_pubkey<C: WalletController>(controller: &C, opts: &ParsedArgs) -> Result<Value> {
    let address = parse_address(opts.arg(0, "addr")?, controller.network())?;
    let key = controller.resolve_public_key(&address)?;
    Ok(json!({"address": address.to_string(), "pubkey": key.to_string()}))
}

fn cmd_tx_status<C: WalletController>(controller: &C, opts: &ParsedArgs) -> Result<Value> {
    let txid: Txid = opts.arg(0, "txid")?.parse().context("invalid txid")?;
    let script = ScriptBuf::from_hex(opts.arg(1, "script-hex")?).context("invalid script hex")?;
    let (conf, status) = controller.query_confirmation(&txid, &script)?;
    let mut out = json!({"txid": txid.to_string(), "status": status});
    if let Some(conf) = conf {
        out["block_hash"] = json!(conf.block_hash.to_string());
        out["block_height"] = json!(conf.block_height);
        out["tx_index"] = json!(conf.tx_index);
    }
    Ok(out)
}

fn cmd_sign_message<C: WalletController>(controller: &C, opts: &ParsedArgs) -> Result<Value> {
    let address = parse_address(opts.arg(0, "addr")?, controller.network())?;
    let message = opts.arg(1, "msg")?;
    let witness = controller.sign_ownership_proof(message.as_bytes(), &address)?;
    let items: Vec<String> = witness.iter().map(hex::encode).collect();
    Ok(json!({"address": address.to_string(), "witness": items}))
}

fn cmd_unlock<C: WalletController>(controller: &C, opts: &ParsedArgs) -> Result<Value> {
    let secs: u64 = opts.arg(0, "secs")?.parse().context("invalid timeout")?;
    controller.unlock_wallet(secs)?;
    Ok(json!({"unlocked": true, "timeout_secs": secs, "network": controller.network_name()}))
}

fn print_usage() {
    println!(
        r#"walletctl - wallet controller over bitcoind / btcwallet RPC

USAGE:
    walletctl <command> [args] [options]

COMMANDS:
    unspent [--all]               List spendable outputs (--all includes unspendable)
    pubkey <addr>                 Public key behind a wallet address
    tx-status <txid> <script-hex> Confirmation status (requires txindex)
    sign-message <addr> <msg>     BIP322 ownership proof (p2wpkh only)
    unlock <secs>                 Unlock the wallet for <secs> seconds

OPTIONS:
    --network, -n <net>           Override WALLETCTL_NETWORK
    --pretty                      Pretty-print JSON
    --help, -h                    Show this help
    --version, -V                 Show version

ENVIRONMENT:
    WALLETCTL_RPC_HOST, WALLETCTL_RPC_USER, WALLETCTL_RPC_PASS, WALLETCTL_DISABLE_TLS,
    WALLETCTL_RPC_CERT, WALLETCTL_RPC_CERT_PATH, WALLETCTL_NETWORK, WALLETCTL_WALLET_PASS,
    WALLETCTL_BACKEND (bitcoind|btcwallet), WALLETCTL_LOG_JSON, RUST_LOG"#
    );
}
