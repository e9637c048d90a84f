//! wallet-bridge CLI - the command port over stdio
//!
//!   wallet-bridge serve     → read `{"port": .., "data": ..}` lines on stdin,
//!                             write `connectResponse`/`claimResponse`/`clearWallet` lines on stdout
//!   wallet-bridge flags     → print the boot flags as JSON
//!
//! The injected provider is a JSON-RPC WebSocket endpoint (`--provider`).
//! Logs go to stderr so stdout carries only the protocol.

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use serde_json::{json, Value};
use std::env;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use wallet_bridge::logging::init_logging;
use wallet_bridge::{
    install_signal_handlers, BridgeConfig, ChainId, Command, Eip1193Provider, WalletBridge, WsProvider,
};

fn main() {
    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);
    init_logging();

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("wallet-bridge {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("serve") => cmd_serve(&opts),
        Some("flags") => cmd_flags(&opts),
        Some(cmd) => Err(anyhow!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    match result {
        Ok(Some(output)) => {
            let formatted = if opts.pretty || io::stdout().is_terminal() {
                serde_json::to_string_pretty(&output)
            } else {
                serde_json::to_string(&output)
            };
            println!("{}", formatted.unwrap_or_else(|_| output.to_string()));
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("{}", json!({"error": format!("{:#}", e)}));
            std::process::exit(1);
        }
    }
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    config: Option<PathBuf>,
    chain_id: Option<String>,
    contract: Option<String>,
    provider_url: Option<String>,
    bridge_url: Option<String>,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        load_dotenv();

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--pretty" => opts.pretty = true,
                "--config" | "-c" => opts.config = iter.next().map(PathBuf::from),
                "--chain-id" => opts.chain_id = iter.next().cloned(),
                "--contract" => opts.contract = iter.next().cloned(),
                "--provider" | "-p" => opts.provider_url = iter.next().cloned(),
                "--bridge-url" => opts.bridge_url = iter.next().cloned(),
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
        }

        opts.command = positional.into_iter().next();
        opts
    }

    /// File and environment first, flags on top.
    fn config(&self) -> Result<BridgeConfig> {
        let mut config = BridgeConfig::load(self.config.as_deref()).context("loading config")?;
        if let Some(chain_id) = &self.chain_id {
            let chain_id: ChainId = chain_id.parse().map_err(|e| anyhow!("--chain-id: {}", e))?;
            config = config.with_chain_id(chain_id);
        }
        if let Some(contract) = &self.contract {
            config = config.with_contract(contract.clone());
        }
        if let Some(url) = &self.provider_url {
            config = config.with_provider_url(url.clone());
        }
        if let Some(url) = &self.bridge_url {
            config = config.with_bridge_url(url.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

/// Load `.env` from the working directory without overriding set variables
fn load_dotenv() {
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() && env::var(key.trim()).is_err() {
                env::set_var(key.trim(), value);
            }
        }
    }
}

fn print_usage() {
    println!(
        r#"wallet-bridge - connect/claim port over an injected wallet provider

USAGE:
    wallet-bridge <command> [options]

COMMANDS:
    serve                   Run the command port on stdin/stdout (NDJSON)
    flags                   Print boot flags

OPTIONS:
    --config, -c <path>     Config file (default: <config_dir>/wallet-bridge/config.json)
    --chain-id <id>         Required chain, decimal or 0x hex (env: WALLET_BRIDGE_CHAIN_ID)
    --contract <address>    Claim contract (env: WALLET_BRIDGE_CONTRACT)
    --provider, -p <url>    JSON-RPC WebSocket provider (env: WALLET_BRIDGE_PROVIDER_URL)
    --bridge-url <url>      Pairing relay (env: WALLET_BRIDGE_BRIDGE_URL)
    --pretty                Pretty-print JSON
    --version, -V           Print version

PORTS (serve):
    → {{"port":"connect"}}                 ← {{"port":"connectResponse","data":"0x.."|null}}
    → {{"port":"wConnect"}}                ← {{"port":"connectResponse",..}}
    → {{"port":"disconnect"}}
    → {{"port":"claim","data":{{..tx..}}}}   ← {{"port":"claimResponse","data":..}}
    → {{"port":"log","data":..}}
                                          ← {{"port":"clearWallet","data":null}}

ENVIRONMENT:
    RUST_LOG                 Log filter (default: info)
    WALLET_BRIDGE_LOG_JSON   Set to 1 for JSON logs on stderr"#
    );
}

fn local_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create runtime")
}

/// Connect the configured provider. An unreachable one boots as "no wallet".
async fn connect_provider(config: &BridgeConfig) -> Option<Rc<WsProvider>> {
    let url = config.provider_url.as_deref()?;
    match WsProvider::connect(url).await {
        Ok(provider) => {
            if let Err(e) = provider.watch().await {
                warn!(error = %e, "provider does not support subscriptions; account changes go unnoticed");
            }
            Some(Rc::new(provider))
        }
        Err(e) => {
            warn!(error = %e, "provider unreachable, booting without a wallet");
            None
        }
    }
}

fn cmd_flags(opts: &ParsedArgs) -> Result<Option<Value>> {
    let config = opts.config()?;
    let rt = local_runtime()?;
    let has_wallet = rt.block_on(connect_provider(&config)).is_some();
    Ok(Some(serde_json::to_value(config.boot_flags(has_wallet))?))
}

fn cmd_serve(opts: &ParsedArgs) -> Result<Option<Value>> {
    let config = opts.config()?;
    let rt = local_runtime()?;
    let local = tokio::task::LocalSet::new();

    local.block_on(&rt, async move {
        let shutdown = install_signal_handlers();
        let mut shutdown_rx = shutdown.subscribe();

        let provider = connect_provider(&config)
            .await
            .map(|p| p as Rc<dyn Eip1193Provider>);
        let (bridge, mut outbound) = WalletBridge::boot(config, provider, None);

        let writer = tokio::task::spawn_local(async move {
            let mut stdout = io::stdout();
            while let Some(message) = outbound.next().await {
                debug!(port = message.port(), "outbound");
                if writeln!(stdout, "{}", message.to_json()).and_then(|_| stdout.flush()).is_err() {
                    break;
                }
            }
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        info!("wallet bridge serving on stdio");
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match Command::parse(&line) {
                        Ok(command) => bridge.send(command),
                        Err(e) => warn!(error = %e, "ignoring malformed command"),
                    },
                    Ok(None) => {
                        info!("stdin closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                },
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping...");
                    break;
                }
            }
        }

        // In-flight commands still answer; the writer ends once every responder is gone.
        bridge.shutdown();
        drop(bridge);
        if tokio::time::timeout(Duration::from_secs(5), writer).await.is_err() {
            warn!("pending responses dropped at exit");
        }
        Ok(None)
    })
}
