//! Burn-forwarder CLI
//!
//! ```sh
//! burn-forwarder quote --amount 1.00 --domain 3
//! burn-forwarder transfer --amount 25 --domain 3 --recipient 0x742d35Cc6634C0532925a3b8D23C1FDDd3B6d0E4
//! burn-forwarder history --page 0 --page-size 20
//! ```

use alloy::primitives::{Address, Bytes};
use clap::{Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use forwarder::config::{self, Config};
use forwarder::evm::EvmChain;
use forwarder::units::{format_units, parse_units};
use forwarder::{
    cancel_pair, metrics, ChainReader, FeeCalculator, HistoryLedger, JsonFileStore,
    OrchestrationOutcome, RunOptions, TransferOrchestrator, TransferRequest,
};

#[derive(Parser)]
#[command(name = "burn-forwarder")]
#[command(about = "Burn tokens on the source chain and forward them to a destination domain", long_about = None)]
struct Cli {
    /// .env file loaded before reading the environment
    #[arg(long, value_name = "PATH", default_value = ".env", global = true)]
    env_file: PathBuf,
    /// Print Prometheus metrics when the command finishes
    #[arg(long, global = true)]
    metrics: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the fee ceiling for a transfer without touching the chain
    Quote {
        /// Amount in whole tokens, e.g. 1.25
        #[arg(long)]
        amount: String,
        /// Destination domain
        #[arg(long)]
        domain: u32,
    },
    /// Burn and forward tokens to a destination domain
    Transfer {
        /// Amount in whole tokens, e.g. 1.25
        #[arg(long)]
        amount: String,
        /// Destination domain
        #[arg(long)]
        domain: u32,
        /// Recipient on the destination chain (defaults to the sender)
        #[arg(long, value_name = "ADDRESS")]
        recipient: Option<String>,
        /// Memo as text, or hex with a 0x prefix
        #[arg(long)]
        memo: Option<String>,
    },
    /// List confirmed transfers, most recent first
    History {
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        page_size: usize,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();
    config::load_env_file(&cli.env_file)?;
    init_logging();

    let result = match cli.command {
        Commands::Quote { amount, domain } => quote(&amount, domain),
        Commands::Transfer {
            amount,
            domain,
            recipient,
            memo,
        } => transfer(&amount, domain, recipient, memo).await,
        Commands::History { page, page_size } => history(page, page_size).await,
    };

    if cli.metrics {
        print!("{}", metrics::gather_text());
    }

    result
}

fn quote(amount: &str, domain: u32) -> Result<()> {
    let decimals = config::token_decimals_from_env()?;
    let calculator = FeeCalculator::new(config::fees_from_env()?);
    let amount = parse_units(amount, decimals)?;

    let quote = calculator
        .compute_max_fee(amount, domain)
        .map_err(|e| eyre!("Cannot quote: {}", e))?;

    println!("amount:       {}", format_units(quote.amount, decimals)?);
    println!("max fee:      {}", format_units(quote.max_fee, decimals)?);
    println!("min received: {}", format_units(quote.min_received(), decimals)?);
    Ok(())
}

async fn transfer(
    amount: &str,
    domain: u32,
    recipient: Option<String>,
    memo: Option<String>,
) -> Result<()> {
    let config = Config::load_from_env()?;
    tracing::info!(
        chain_id = config.chain_id,
        router = %config.router_address,
        "Configuration loaded"
    );

    let chain = Arc::new(
        EvmChain::new(&config.rpc_url, config.chain_id, config.require_private_key()?)?
            .with_poll_interval(config.confirmation_poll_interval),
    );
    chain.verify_chain_id().await?;
    warn_on_decimals_mismatch(&chain, &config).await;

    let mut request = TransferRequest::new(parse_units(amount, config.token_decimals)?, domain);
    if let Some(recipient) = recipient {
        request = request.with_recipient(recipient);
    }
    if let Some(memo) = memo {
        request = request.with_memo(parse_memo(&memo)?);
    }

    let history = Arc::new(HistoryLedger::new(Arc::new(JsonFileStore::new(
        config.history_path.clone(),
    ))));
    let orchestrator = TransferOrchestrator::new(
        chain.clone(),
        chain.clone(),
        FeeCalculator::new(config.fees.clone()),
        history,
        config.orchestrator(),
    );

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let progress = tokio::spawn(async move {
        while let Some(state) = progress_rx.recv().await {
            println!("  {}", state);
        }
    });

    let (cancel, signal) = cancel_pair();
    let shutdown = tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        cancel.cancel();
    });

    let options = RunOptions {
        progress: Some(progress_tx),
        cancel: Some(signal),
    };
    let outcome = orchestrator.execute_with(&request, &options).await;
    drop(options);
    shutdown.abort();
    let _ = progress.await;

    match outcome {
        OrchestrationOutcome::Success { tx_hash } => {
            println!("confirmed: {}", tx_hash);
            Ok(())
        }
        OrchestrationOutcome::Failure { stage, error } => Err(eyre!(
            "transfer failed at {} ({}): {}",
            stage,
            error.kind(),
            error
        )),
    }
}

async fn history(page: usize, page_size: usize) -> Result<()> {
    let decimals = config::token_decimals_from_env()?;
    let path = config::history_path_from_env();
    let ledger = HistoryLedger::new(Arc::new(JsonFileStore::new(path)));

    let records = ledger
        .list(page, page_size)
        .await
        .wrap_err("Failed to read transfer history")?;
    if records.is_empty() {
        println!("no transfers");
        return Ok(());
    }

    for record in records {
        println!(
            "{}  {}  {} -> {} (domain {})  {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            format_units(record.amount, decimals)?,
            record.from,
            record.to,
            record.destination_domain,
            record.tx_hash
        );
    }
    Ok(())
}

fn parse_memo(memo: &str) -> Result<Bytes> {
    match memo.strip_prefix("0x") {
        Some(hex_memo) => Ok(Bytes::from(
            hex::decode(hex_memo).wrap_err("Memo is not valid hex")?,
        )),
        None => Ok(Bytes::copy_from_slice(memo.as_bytes())),
    }
}

async fn warn_on_decimals_mismatch(chain: &EvmChain, config: &Config) {
    let token: Option<Address> = match chain.read_router_config(config.router_address).await {
        Ok(router) => router.token.get(),
        Err(_) => None,
    };
    let Some(token) = token else {
        return;
    };

    match chain.read_decimals(token).await {
        Ok(decimals) if decimals != config.token_decimals => tracing::warn!(
            token = %token,
            on_chain = decimals,
            configured = config.token_decimals,
            "TOKEN_DECIMALS does not match the token"
        ),
        Ok(_) => {}
        Err(e) => tracing::debug!(error = %e, "Could not read token decimals"),
    }
}

/// Initialize tracing/logging with structured output
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,forwarder=debug"));
    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json().with_target(true)))
        .with((!json).then(|| fmt::layer().with_target(true)))
        .with(filter)
        .init();
}

/// Wait for shutdown signals (SIGINT/SIGTERM)
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, cancelling after the current step");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, cancelling after the current step");
        }
    }
}
