//! FxWallet Simulator
//!
//! Drives an in-process wallet through scripted scenarios or random load,
//! then audits the ledger against the transaction journal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use rust_decimal_macros::dec;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod controller;
mod metrics;
mod scenario;

use controller::SimulationController;
use fxwallet_common::{AccountKey, Currency};
use fxwallet_engine::{LogNotifier, Wallet, WalletConfig};
use fxwallet_fx::{FxEngine, FxEngineConfig, HttpRateSource, SharedRateSource, StaticRateSource};
use fxwallet_ledger::{Account, AccountManager, InMemoryStore, TransactionJournal};
use scenario::Scenario;

/// FxWallet Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "FxWallet scenario runner and load simulator")]
struct Args {
    /// Number of simulated users for random load
    #[arg(short, long, default_value = "5")]
    users: usize,

    /// Number of random operations to submit
    #[arg(short, long, default_value = "200")]
    operations: usize,

    /// Built-in scenario to run instead of random load
    #[arg(short, long, conflicts_with = "scenario_file")]
    scenario: Option<String>,

    /// Scenario JSON file to run instead of random load
    #[arg(long)]
    scenario_file: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Fetch live rates from this endpoint instead of the built-in static table
    #[arg(long)]
    rate_url: Option<String>,

    /// Settlement speed multiplier (divides the gateway delays)
    #[arg(long, default_value = "1.0")]
    speed: f64,

    /// Print wallet metrics in Prometheus text format as well
    #[arg(long)]
    prometheus: bool,
}

fn init_tracing(config: &WalletConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = WalletConfig::from_env();
    if let Some(url) = &args.rate_url {
        config.rate.api_url = url.clone();
    }
    if args.speed > 0.0 && args.speed != 1.0 {
        config.settlement.deposit_delay = config.settlement.deposit_delay.div_f64(args.speed);
        config.settlement.withdraw_delay = config.settlement.withdraw_delay.div_f64(args.speed);
    }
    config.validate().map_err(|e| anyhow!("invalid configuration: {}", e))?;

    init_tracing(&config);
    info!(users = args.users, speed = args.speed, "Starting FxWallet Simulator");

    let (source, static_rates) = match &args.rate_url {
        Some(_) => {
            let http: SharedRateSource = Arc::new(HttpRateSource::new(
                config.rate.api_url.clone(),
                config.rate.request_timeout,
            )?);
            (http, None)
        }
        None => {
            let rates = Arc::new(
                StaticRateSource::new()
                    .with_rate(Currency::Usd, Currency::Try, dec!(30.0))
                    .with_rate(Currency::Try, Currency::Usd, dec!(0.037)),
            );
            let shared: SharedRateSource = rates.clone();
            (shared, Some(rates))
        }
    };

    let accounts = Arc::new(AccountManager::with_max_attempts(
        Arc::new(InMemoryStore::<AccountKey, Account>::new()),
        config.ledger.max_cas_attempts,
    ));
    let journal = Arc::new(TransactionJournal::in_memory());
    let fx = Arc::new(FxEngine::new(
        source,
        FxEngineConfig {
            cache_ttl: config.rate.cache_ttl,
        },
    ));
    let drain_timeout = config.settlement.drain_timeout;
    let wallet = Arc::new(Wallet::new(config, accounts, journal, fx, Arc::new(LogNotifier)));

    let mut controller =
        SimulationController::new(wallet.clone(), static_rates, args.users, args.seed);

    let scenario = match (&args.scenario, &args.scenario_file) {
        (Some(name), _) => Some(Scenario::load(name)?),
        (None, Some(path)) => Some(Scenario::from_file(path)?),
        (None, None) => None,
    };

    let run = async {
        match &scenario {
            Some(scenario) => controller.run_scenario(scenario).await,
            None => controller.run_load(args.operations).await,
        }
    };

    let outcome = tokio::select! {
        result = run => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
            Err(anyhow!("interrupted"))
        }
    };

    let audit = match &outcome {
        Ok(()) => Some(controller.audit().await?),
        Err(e) => {
            warn!(error = %e, "Simulation did not complete");
            None
        }
    };

    info!(pending = wallet.pending_settlements(), "Shutting down wallet");
    wallet.shutdown(drain_timeout).await;

    let snapshot = wallet.metrics();
    let report = json!({
        "wallet": &snapshot,
        "rate_cache": wallet.fx().cache().stats(),
        "simulation": controller.metrics().summary(),
        "audit": audit,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.prometheus {
        print!("{}", snapshot.to_prometheus());
    }

    info!("Simulation complete");
    outcome
}
