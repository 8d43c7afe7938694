use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use sea_orm_migration::MigratorTrait;

use infra::{
    EnvSettings, LogConfig, LogStack, OtelTracer, PayloadValidator, RedisCache, SqlDatabase,
};
use ingress::HttpGateway;
use svckit::{shutdown, Database as _, HttpServer as _, Manager};
use users::{Migrator, UserHandlers};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// userd - user CRUD service over a managed subsystem lifecycle
#[derive(Parser)]
#[command(name = "userd")]
#[command(about = "User service with managed subsystem lifecycle")]
#[command(version)]
struct Cli {
    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the service
    Run,
    /// Apply database migrations and exit
    Migrate,
    /// Probe subsystem health and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_service(cli.verbose).await,
        Commands::Migrate => run_migrations(cli.verbose).await,
        Commands::Check => check_health(cli.verbose).await,
    }
}

fn log_config(verbose: u8) -> LogConfig {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    LogConfig {
        default_level: default_level.to_string(),
        ..LogConfig::default()
    }
}

/// Every slot filled with its production subsystem.
fn full_manager(verbose: u8) -> (Manager, Arc<HttpGateway>) {
    let gateway = Arc::new(HttpGateway::new());
    let manager = Manager::new()
        .with_environment(Arc::new(EnvSettings::new()))
        .with_logger(Arc::new(LogStack::new(log_config(verbose))))
        .with_database(Arc::new(SqlDatabase::new()))
        .with_cache(Arc::new(RedisCache::new()))
        .with_validator(Arc::new(PayloadValidator::new()))
        .with_handlers(Arc::new(UserHandlers::new()))
        .with_http_server(gateway.clone())
        .with_tracer(Arc::new(OtelTracer::new()));
    (manager, gateway)
}

/// Init with rollback: a failed startup still releases whatever the earlier
/// subsystems already acquired.
async fn init_or_unwind(manager: &mut Manager) -> Result<()> {
    if let Err(err) = manager.init().await {
        tracing::error!(error = %err, "subsystem init failed");
        if let Err(close_err) = manager.close().await {
            tracing::error!(error = %close_err, "rollback close reported failures");
        }
        return Err(err.into());
    }
    Ok(())
}

async fn run_service(verbose: u8) -> Result<()> {
    let (mut manager, gateway) = full_manager(verbose);
    init_or_unwind(&mut manager).await?;

    let Some(ctx) = manager.ctx() else {
        anyhow::bail!("manager context missing after init");
    };

    let serving = gateway.clone();
    let mut server = tokio::spawn(async move { serving.run(&ctx).await });

    let mut server_died = false;
    tokio::select! {
        signal = shutdown::wait_for_shutdown() => {
            let signal = signal?;
            tracing::info!(%signal, "shutdown requested");
        }
        served = &mut server => {
            server_died = true;
            match served {
                Ok(Ok(())) => tracing::warn!("http server exited before shutdown was requested"),
                Ok(Err(err)) => tracing::error!(error = %err, "http server failed"),
                Err(err) => tracing::error!(error = %err, "http server task panicked"),
            }
        }
    }

    match manager.close().await {
        Ok(()) => tracing::info!("shutdown complete"),
        Err(err) => tracing::error!(error = %err, "close reported failures"),
    }

    if server_died {
        anyhow::bail!("http server terminated unexpectedly");
    }

    // close() has already drained the listener; collect the task's verdict.
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "http server exited with error"),
        Err(err) => tracing::warn!(error = %err, "http server task panicked"),
    }
    Ok(())
}

/// Partial assembly: environment + logger + database only, everything else
/// stays a no-op default.
async fn run_migrations(verbose: u8) -> Result<()> {
    let mut manager = Manager::new()
        .with_environment(Arc::new(EnvSettings::new()))
        .with_logger(Arc::new(LogStack::new(log_config(verbose))))
        .with_database(Arc::new(SqlDatabase::new()));
    init_or_unwind(&mut manager).await?;

    let handle = manager.database().handle();
    let result = match handle {
        Some(handle) => Migrator::up(&handle.sea(), None).await.map_err(Into::into),
        None => Err(anyhow::anyhow!("database is not connected")),
    };
    match &result {
        Ok(()) => tracing::info!("migrations applied"),
        Err(err) => tracing::error!(error = %err, "migrations failed"),
    }

    if let Err(err) = manager.close().await {
        tracing::error!(error = %err, "close reported failures");
    }
    result
}

async fn check_health(verbose: u8) -> Result<()> {
    let (mut manager, _gateway) = full_manager(verbose);
    init_or_unwind(&mut manager).await?;

    let verdict = manager.health().await;
    match &verdict {
        Ok(()) => tracing::info!("health probe passed"),
        Err(err) => tracing::error!(error = %err, "health probe failed"),
    }

    if let Err(err) = manager.close().await {
        tracing::error!(error = %err, "close reported failures");
    }
    verdict.map_err(Into::into)
}
