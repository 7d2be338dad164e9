use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use sensor_logger_rs::config::LoggerConfig;
use sensor_logger_rs::dashboard;
use sensor_logger_rs::status::{run_status_writer, StatusBoard};
use sensor_logger_rs::transport::WsConnector;
use sensor_logger_rs::Supervisor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "sensor_logger")]
#[command(about = "Log main-controller and thermal camera streams to CSV", long_about = None)]
struct Args {
    /// JSON config file (defaults are used for anything it leaves out)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for the CSV files
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Only run these endpoints (repeatable)
    #[arg(long = "endpoint", value_name = "NAME")]
    endpoints: Vec<String>,

    /// Override an endpoint URL, e.g. cam3=ws://192.168.1.20:85 (repeatable)
    #[arg(long = "url", value_name = "NAME=URL")]
    urls: Vec<String>,

    /// Flush and print a status line every N messages
    #[arg(long)]
    print_every: Option<u64>,

    #[arg(long)]
    reconnect_delay_ms: Option<u64>,

    /// Serve /status and /ws on this port
    #[arg(long)]
    dashboard_port: Option<u16>,
}

fn load_config(args: &Args) -> Result<LoggerConfig> {
    let mut config = match &args.config {
        Some(path) => LoggerConfig::load(path)?,
        None => LoggerConfig::default(),
    };

    if let Some(dir) = &args.out_dir {
        config.out_dir = dir.clone();
    }
    if let Some(n) = args.print_every {
        config.print_every = n;
    }
    if let Some(ms) = args.reconnect_delay_ms {
        config.reconnect_delay_ms = ms;
    }
    for spec in &args.urls {
        config.override_url(spec)?;
    }
    config.restrict_to(&args.endpoints)?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args).context("invalid configuration")?;

    log::info!("Sensor logger starting");
    log::info!("  Output dir: {}", config.out_dir.display());
    log::info!("  Print every: {} messages", config.print_every);
    for endpoint in config.enabled_endpoints() {
        log::info!("  {} -> {} ({:?})", endpoint.name, endpoint.url, endpoint.role);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Exiting...");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                log::warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    let status = StatusBoard::new();
    if let Some(port) = args.dashboard_port {
        let board = status.clone();
        tokio::spawn(async move {
            if let Err(e) = dashboard::start_dashboard(board, port).await {
                log::warn!("Dashboard stopped: {}", e);
            }
        });
    }

    let supervisor = Supervisor::new(
        config.clone(),
        Arc::new(WsConnector::new(config.keepalive())),
        status.clone(),
    );
    std::fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("cannot create {}", config.out_dir.display()))?;
    let writer = tokio::spawn(run_status_writer(
        status,
        config.out_dir.join("live_status.json"),
        Duration::from_secs(config.status_interval_secs),
        shutdown_rx.clone(),
    ));

    supervisor.run(shutdown_rx).await?;
    writer.await.context("status writer task failed")?;
    Ok(())
}
