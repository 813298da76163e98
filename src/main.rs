use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use gateway_watch::config::{DEFAULT_HOST, DEFAULT_PORT};
use gateway_watch::gateway::{SecurityFirm, TrdEnv, TrdMarket};
use gateway_watch::{
    ChangeWatcher, ConnectionPolicy, GatewayClient, GatewayConfig, Session, Trader, WatchConfig,
    WatchEvent,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Trading gateway host
    #[arg(long, env = "FUTU_TRADING_ADDR", default_value = DEFAULT_HOST)]
    host: String,

    /// Trading gateway port
    #[arg(long, env = "FUTU_TRADING_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Market of the default session (HK, US, CN, HKCC, SG, JP)
    #[arg(long, env = "FUTU_TRADING_MARKET", default_value = "HK")]
    market: TrdMarket,

    /// Trading environment (REAL or SIMULATE)
    #[arg(long = "trd-env", env = "FUTU_TRADING_ENV", default_value = "REAL")]
    trd_env: TrdEnv,

    /// Broker entity of the gateway login
    #[arg(long, env = "FUTU_SECURITY_FIRM", default_value = "FUTUSECURITIES")]
    security_firm: SecurityFirm,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Trade unlock password
    #[arg(long, env = "FUTU_TRADING_PSWD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch account info and positions for changes (default)
    Watch(WatchArgs),
    /// List trading accounts
    Accounts,
    /// Show account funds
    AccountInfo,
    /// Show positions
    Positions,
    /// Show trading rule, best quote and holding for a security
    Quote {
        /// Security code, e.g. HK.00700
        code: String,
    },
    /// Buy at the best ask
    Buy {
        /// Security code, e.g. HK.00700
        code: String,

        /// Quantity to buy
        #[arg(long, default_value = "100")]
        qty: f64,

        /// Order remark
        #[arg(long)]
        remark: Option<String>,
    },
    /// Sell a position down in whole lots at the best bid
    SellDown {
        /// Security code, e.g. HK.09618
        code: String,

        /// Lot size (defaults to the security's trading rule)
        #[arg(long)]
        lot: Option<u32>,

        /// Delay between attempts in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,

        /// Run a single attempt and exit
        #[arg(long)]
        once: bool,
    },
}

#[derive(Args, Debug, Default)]
struct WatchArgs {
    /// Account ids to watch, one session each (comma-separated)
    #[arg(long, value_delimiter = ',')]
    accounts: Vec<u64>,

    /// Markets to watch, one session each (comma-separated)
    #[arg(long, value_delimiter = ',')]
    markets: Vec<TrdMarket>,

    /// Polling interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Poll all sessions of a cycle concurrently
    #[arg(long)]
    concurrent: bool,

    /// Exit on the first gateway connection failure instead of backing off
    #[arg(long)]
    fail_fast: bool,

    /// Upper bound for the retry backoff in seconds
    #[arg(long)]
    max_backoff_secs: Option<u64>,

    /// Stop after this many polling cycles
    #[arg(long)]
    cycles: Option<usize>,
}

impl WatchArgs {
    fn watch_config(&self) -> WatchConfig {
        let defaults = WatchConfig::default();
        let connection_policy = if self.fail_fast {
            ConnectionPolicy::FailFast
        } else {
            match self.max_backoff_secs {
                Some(secs) => ConnectionPolicy::Retry {
                    max_backoff: Duration::from_secs(secs),
                },
                None => defaults.connection_policy,
            }
        };

        WatchConfig {
            poll_interval: self
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            concurrent: self.concurrent,
            connection_policy,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,gateway_watch=info")),
        )
        .init();

    let cli = Cli::parse();

    let gateway_config = GatewayConfig {
        host: cli.host.clone(),
        port: cli.port,
        market: cli.market,
        env: cli.trd_env,
        security_firm: cli.security_firm,
        timeout: Duration::from_secs(cli.timeout_secs),
    };

    info!("Gateway: {}", gateway_config.base_url());
    info!("Market: {} ({})", gateway_config.market, gateway_config.env);

    let password = cli.password.as_deref();
    match cli.command.unwrap_or_else(|| Command::Watch(WatchArgs::default())) {
        Command::Watch(args) => run_watch(&gateway_config, args).await?,
        Command::Accounts => {
            let ids = connect_trader(&gateway_config).await?.list_accounts().await?;
            info!("Account ids: {:?}", ids);
        }
        Command::AccountInfo => {
            connect_trader(&gateway_config).await?.account_info().await?;
        }
        Command::Positions => {
            connect_trader(&gateway_config).await?.list_positions().await?;
        }
        Command::Quote { code } => {
            let trader = connect_trader(&gateway_config).await?;
            let rule = trader.price_step(&code).await?;
            let quote = trader.best_quote(&code).await?;
            let held = trader.holding_position(&code).await?;
            info!(
                "{}: ask {} bid {} | lot {} step {} | holding {}",
                code, quote.ask, quote.bid, rule.lot_size, rule.price_step, held
            );
        }
        Command::Buy { code, qty, remark } => {
            let trader = connect_trader(&gateway_config).await?;
            ensure_unlocked(&trader, password).await?;
            if trader.buy_at_ask(&code, qty, remark).await?.is_none() {
                warn!("No order placed for {}", code);
            }
        }
        Command::SellDown {
            code,
            lot,
            interval_ms,
            once,
        } => {
            let trader = connect_trader(&gateway_config).await?;
            ensure_unlocked(&trader, password).await?;
            run_sell_down(&trader, &code, lot, Duration::from_millis(interval_ms), once).await?;
        }
    }

    Ok(())
}

/// One session per (market, account) combination asked for on the command line
async fn build_sessions(
    gateway_config: &GatewayConfig,
    args: &WatchArgs,
) -> Result<Vec<Session<GatewayClient>>> {
    if args.accounts.is_empty() && args.markets.is_empty() {
        return Ok(Vec::new());
    }

    let base = GatewayClient::connect(gateway_config)
        .await
        .context("Failed to connect to trading gateway")?;

    let markets = if args.markets.is_empty() {
        vec![gateway_config.market]
    } else {
        args.markets.clone()
    };

    let mut sessions = Vec::new();
    for market in markets {
        let client = base.for_market(market);
        if args.accounts.is_empty() {
            sessions.push(Session::from_client(client));
        } else {
            for acc_id in &args.accounts {
                sessions.push(Session::from_client(client.for_account(*acc_id)));
            }
        }
    }
    Ok(sessions)
}

async fn run_watch(gateway_config: &GatewayConfig, args: WatchArgs) -> Result<()> {
    let sessions = build_sessions(gateway_config, &args).await?;
    let mut watcher =
        ChangeWatcher::with_default_session(sessions, gateway_config, args.watch_config())
            .await
            .context("Failed to connect to trading gateway")?;

    for i in 0..watcher.session_count() {
        if let Some(client) = watcher.gateway(i) {
            info!("Session {}: {}", i, client.label());
        }
    }

    if let Some(cycles) = args.cycles {
        return match watcher.run_cycles(cycles).await {
            Ok(events) => {
                for event in events {
                    info!("{}", event);
                }
                info!("Completed {} cycle(s)", cycles);
                Ok(())
            }
            Err(mut e) => {
                for event in e.take_events() {
                    info!("{}", event);
                }
                error!("Change watcher stopped: {}", e);
                Err(e.into())
            }
        };
    }

    // Events are printed by their own task so a slow console never delays polling
    let (event_tx, mut event_rx) = mpsc::channel::<WatchEvent>(1000);
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            info!("{}", event);
        }
    });

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    spawn_signal_handler(shutdown_tx.clone());

    info!("Watching for changes. Press Ctrl+C to stop.");
    let result = watcher.run(event_tx, shutdown_tx.subscribe()).await;

    // Watcher dropped its sender; let the printer drain what is left
    let _ = printer.await;

    match result {
        Ok(()) => {
            info!("Shutdown complete after {} cycle(s)", watcher.cycles());
            Ok(())
        }
        Err(e) => {
            error!("Change watcher stopped: {}", e);
            Err(e.into())
        }
    }
}

async fn connect_trader(gateway_config: &GatewayConfig) -> Result<Trader<GatewayClient>> {
    let client = GatewayClient::connect(gateway_config)
        .await
        .context("Failed to connect to trading gateway")?;
    Ok(Trader::new(client, gateway_config.env))
}

async fn run_sell_down(
    trader: &Trader<GatewayClient>,
    code: &str,
    lot: Option<u32>,
    interval: Duration,
    once: bool,
) -> Result<()> {
    let lot = match lot {
        Some(lot) => lot,
        None => trader.price_step(code).await?.lot_size,
    };

    if once {
        if trader.sell_down_step(code, lot).await?.is_none() {
            info!("Nothing to sell for {}", code);
        }
        return Ok(());
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    spawn_signal_handler(shutdown_tx.clone());
    trader
        .sell_down(code, lot, interval, shutdown_tx.subscribe())
        .await
}

async fn ensure_unlocked(trader: &Trader<GatewayClient>, password: Option<&str>) -> Result<()> {
    if !trader.unlock_trade(password).await? {
        anyhow::bail!("Trading is locked; set FUTU_TRADING_PSWD to unlock");
    }
    Ok(())
}

/// Fire `shutdown` on Ctrl+C (and SIGTERM on unix)
fn spawn_signal_handler(shutdown: broadcast::Sender<()>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Cannot listen for SIGTERM: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    let _ = shutdown.send(());
                    return;
                }
            };
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C");
        }

        info!("Initiating graceful shutdown...");
        let _ = shutdown.send(());
    });
}
