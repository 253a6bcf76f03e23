//! Roulette ledger entry point.
//!
//! Loads configuration, initialises structured logging, opens the balance
//! store, and serves the HTTP API until Ctrl+C. With the server disabled,
//! reads `<user_id> <message>` lines from stdin instead and prints replies.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use roulette_ledger::commands::CommandHandler;
use roulette_ledger::config::AppConfig;
use roulette_ledger::engine::{RandomWheel, SeededWheel, SpinSource, WagerEngine};
use roulette_ledger::server::{self, ServerState};
use roulette_ledger::store;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("LEDGER_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = AppConfig::load_or_default(&config_path)?;

    init_logging();

    info!(
        config = %config_path,
        starting_balance = cfg.ledger.starting_balance,
        max_attempts = cfg.ledger.max_attempts,
        bet_timeout_ms = cfg.ledger.bet_timeout_ms,
        "Roulette ledger starting up"
    );

    let balances = store::open(
        &cfg.storage.database_url,
        cfg.ledger.starting_balance,
        cfg.storage.max_connections,
        cfg.storage.busy_timeout_ms,
    )
    .await
    .with_context(|| format!("Failed to open store {}", cfg.storage.database_url))?;
    info!(backend = balances.name(), "Balance store opened");

    let wheel: Arc<dyn SpinSource> = match std::env::var("LEDGER_SEED") {
        Ok(seed) => {
            let seed: u64 = seed
                .parse()
                .with_context(|| format!("LEDGER_SEED is not a u64: {seed}"))?;
            warn!(seed, "Using a seeded wheel; outcomes are reproducible");
            Arc::new(SeededWheel::new(seed))
        }
        Err(_) => Arc::new(RandomWheel),
    };

    let engine = Arc::new(WagerEngine::new(balances.clone(), wheel, cfg.engine_config()));
    let commands = CommandHandler::new(
        engine.clone(),
        cfg.commands.prefix.clone(),
        cfg.commands.channel_id.clone(),
    );

    if cfg.server.enabled {
        let state = Arc::new(ServerState::new(engine, commands));
        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received.");
        };
        server::serve(state, &cfg.server.host, cfg.server.port, shutdown).await?;
    } else {
        run_console(&commands).await?;
    }

    balances.close().await;
    info!("Roulette ledger shut down cleanly.");
    Ok(())
}

/// Read `<user_id> <message>` lines from stdin until EOF or Ctrl+C.
async fn run_console(commands: &CommandHandler) -> Result<()> {
    info!(prefix = commands.prefix(), "Console mode. Enter `<user_id> <message>` lines.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let Some((user_id, content)) = line.trim().split_once(char::is_whitespace) else {
                    continue;
                };
                if let Some(reply) = commands.handle(user_id, commands.channel_id(), content).await {
                    println!("{reply}");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("roulette_ledger=info"));

    let json_logging = std::env::var("LEDGER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
