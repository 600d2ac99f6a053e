use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = sitebrief::cli::Cli::parse();
    let settings = sitebrief::config::Settings::from_env().context("load settings")?;
    sitebrief::logging::init(&settings.log_level).context("init logging")?;
    tracing::debug!(?cli, ?settings, "parsed cli");

    match cli.command {
        sitebrief::cli::Command::Analyze(args) => {
            sitebrief::pipeline::run(args, settings)
                .await
                .context("analyze")?;
        }
        sitebrief::cli::Command::Crawl(args) => {
            sitebrief::crawl::run(args, settings).await.context("crawl")?;
        }
    }

    Ok(())
}
