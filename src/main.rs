use actix_web::{web, App, HttpServer};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};
mod api;
use crate::api::{
    health::health_config,
    job::{
        handlers::{admin_config, job_config},
        JobService,
    },
    validation,
};
mod cache;
mod cli;
mod config;
mod fetcher;
mod filter;
mod format;
mod shutdown;
mod worker;
use crate::cache::JobCache;
use crate::cli::{Cli, Command};
use crate::fetcher::{FetchOutcome, JobFetcher};
use crate::shutdown::ShutdownCoordinator;
use crate::worker::Scheduler;

/// Console plus daily rotating per-level files.
/// Log files are created as: logs/info.log.2024-12-22, logs/error.log.2024-12-22, etc.
fn init_logging(log_dir: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let info_file = tracing_appender::rolling::daily(log_dir, "info.log");
    let warn_file = tracing_appender::rolling::daily(log_dir, "warn.log");
    let error_file = tracing_appender::rolling::daily(log_dir, "error.log");
    let debug_file = tracing_appender::rolling::daily(log_dir, "debug.log");

    let info_layer = tracing_subscriber::fmt::layer()
        .with_writer(info_file)
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let warn_layer = tracing_subscriber::fmt::layer()
        .with_writer(warn_file)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_file)
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    let debug_layer = tracing_subscriber::fmt::layer()
        .with_writer(debug_file)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .with(debug_layer)
        .init();

    Ok(())
}

fn other_error(err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = config::Config::from_env().map_err(other_error)?;
    init_logging(&config.log_dir)?;

    let cache = Arc::new(JobCache::new(&config.cache_file));
    let fetcher = Arc::new(JobFetcher::new(config.fetcher_settings(), cache.clone()).map_err(other_error)?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Fetch => {
            return match fetcher.fetch_and_cache().await {
                Ok(FetchOutcome::Updated { fetched, removed, stored }) => {
                    info!("Cache updated with {} jobs ({} fetched, {} filtered)", stored, fetched, removed);
                    Ok(())
                }
                Ok(FetchOutcome::Empty { .. }) => {
                    info!("No jobs returned, cache left unchanged");
                    Ok(())
                }
                Ok(FetchOutcome::AlreadyRunning(_)) => Ok(()),
                Err(e) => Err(other_error(e)),
            };
        }
        Command::CleanCache => {
            cli::clean_cache(&cache).await.map_err(other_error)?;
            return Ok(());
        }
        Command::Serve => {}
    }

    info!("Starting go9ja-jobs application");
    info!("Configuration loaded successfully:");
    info!("  - Cache file: {}", config.cache_file);
    info!("  - Cache max age: {} hours", config.cache_max_age.num_hours());
    info!(
        "  - Schedule: {} (UTC{})",
        config
            .schedule
            .times
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        config.schedule.offset
    );
    info!("  - Upstream API: {}", if config.api_url.is_some() { "configured" } else { "not configured" });
    info!("  - Admin secret: {}", if config.cache_secret.is_some() { "set" } else { "not set" });
    info!("  - Max payload size: {} bytes", config.max_payload_size);

    // watch channel allows multiple receivers to get the same value
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let scheduler = Scheduler::new(fetcher.clone(), config.schedule.clone(), config.cache_max_age);
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(shutdown_rx).await;
    });

    // Built once so every HTTP worker shares the same fetcher and in-flight flag
    let job_service = web::Data::new(JobService::new(
        fetcher.clone(),
        config.cache_secret.clone(),
        config.cache_max_age,
    ));
    let fetcher_data = web::Data::from(fetcher.clone());
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        // Configure payload size limits globally
        let payload_config = web::PayloadConfig::default()
            .limit(max_payload_size);

        App::new()
            .app_data(job_service.clone())
            .app_data(fetcher_data.clone())
            .app_data(payload_config)
            .app_data(validation::json_config().limit(max_payload_size))
            .app_data(validation::query_config())
            .configure(health_config)
            .service(
                web::scope("/api")
                    .configure(job_config)
                    .configure(admin_config),
            )
    });

    info!("Server starting on http://{}:{}", config.bind_address, config.port);

    let server = server
        .bind((config.bind_address.as_str(), config.port))
        .map_err(|e| {
            error!("Failed to bind {}:{}: {}", config.bind_address, config.port, e);
            e
        })?
        .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let coordinator = ShutdownCoordinator::new(
        server_handle,
        server_task,
        scheduler_handle,
        shutdown_tx,
    );

    coordinator.wait_for_shutdown().await
}
