use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trading_agent::application::cycle::{CycleServices, CycleSettings, TradingCycle};
use trading_agent::config::AgentConfig;
use trading_agent::infrastructure::birdeye_client::{BirdeyeClient, BirdeyeConfig};
use trading_agent::infrastructure::swap_gateway::SwapGatewayFactory;
use trading_agent::persistence::init_database;
use trading_agent::persistence::models::StrategySeed;
use trading_agent::persistence::repository::{
    MemoryRepository, PositionRepository, StrategyRepository, TransactionRepository,
};
use trading_agent::rate_limit::create_rate_limiter;
use trading_agent::secrets::{load_api_key, EnvSecretService};

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trading_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env();
    info!(
        "Trading agent {} starting (cycle every {}s)",
        config.agent_id,
        config.cycle_interval.as_secs()
    );

    let pool = init_database(&config.database).await?;
    let strategies = Arc::new(StrategyRepository::new(pool.clone()));

    if let Some(path) = &config.strategy_file {
        info!("Loading strategy file {}", path.display());
        let raw = tokio::fs::read_to_string(path).await?;
        let seed: StrategySeed = serde_json::from_str(&raw)?;
        if seed.agent_id != config.agent_id {
            warn!(
                "Strategy file targets agent {} but this agent is {}",
                seed.agent_id, config.agent_id
            );
        }
        strategies.seed(seed).await?;
    }

    let api_key = load_api_key(
        &config.birdeye_api_key_op_reference,
        &config.birdeye_api_key_env_var,
        &config.secrets,
    )?;
    let birdeye = Arc::new(BirdeyeClient::new(
        BirdeyeConfig {
            api_base: config.birdeye_api_base.clone(),
            api_key,
            ..BirdeyeConfig::default()
        },
        create_rate_limiter(&config.rate_limit),
    )?);

    let services = CycleServices {
        secrets: Arc::new(EnvSecretService::new(config.wallet.clone(), config.secrets.clone())),
        strategies,
        prices: birdeye.clone(),
        wallets: birdeye,
        swaps: Arc::new(SwapGatewayFactory::new(
            config.swap_gateway.clone(),
            create_rate_limiter(&config.rate_limit),
        )),
        positions: Arc::new(PositionRepository::new(pool.clone())),
        transactions: Arc::new(TransactionRepository::new(pool.clone())),
        memory: Arc::new(MemoryRepository::new(pool.clone())),
    };
    let cycle = TradingCycle::new(
        services,
        CycleSettings {
            agent_id: config.agent_id.clone(),
            trading_limits: config.trading_limits,
            retry: config.retry.clone(),
            force: config.force,
        },
    );

    let mut interval = tokio::time::interval(config.cycle_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    // A started cycle always runs to completion; shutdown is checked between cycles.
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {
                let outcome = cycle.run_cycle().await;
                match &outcome.error {
                    Some(e) => warn!("Cycle {} aborted: {}", outcome.cycle, e),
                    None => info!(
                        "Cycle {}: {} decisions, {}/{} trades succeeded",
                        outcome.cycle,
                        outcome.decisions,
                        outcome.succeeded_trades(),
                        outcome.results.len()
                    ),
                }
            }
        }
    }

    info!("Shutting down after {} cycles", cycle.cycles_run());
    pool.close().await;
    Ok(())
}
