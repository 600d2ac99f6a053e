use std::net::SocketAddr;

use anyhow::Context as _;
use clap::Parser;

use sitebrief::app::queue::InProcessQueue;
use sitebrief::app::server::{AppState, router};
use sitebrief::config::Settings;
use sitebrief::pipeline::BriefingService;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Pipeline runs allowed in flight at once (one browser session each).
    #[arg(long, default_value_t = 1)]
    max_concurrency: usize,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let args = AppArgs::parse();
    let settings = Settings::from_env().context("load settings")?;
    sitebrief::logging::init(&settings.log_level)?;
    tracing::info!(?args, ?settings, "starting sitebrief-app");

    let state = AppState {
        service: BriefingService::from_settings(&settings)?,
        queue: InProcessQueue::new(args.max_concurrency),
        report_dir: settings.ensure_report_dir()?,
    };

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(?err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
