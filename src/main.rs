use anyhow::Context;
use clap::Parser;
use nyc_shows::fetch::ReqwestFetcher;
use nyc_shows::{logging, Config, CrawlOrchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "nyc_shows")]
#[command(about = "Harvests NYC concert listings into one JSON snapshot")]
#[command(version = "0.1.0")]
struct Cli {
    /// Where to write the JSON document
    outfile: PathBuf,

    /// TOML file with harvest settings and sources (defaults to the built-in catalog)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source names to harvest (comma-separated). Defaults to all configured sources
    #[arg(long, value_delimiter = ',')]
    sources: Vec<String>,

    /// Overall deadline; whatever was collected by then is written, marked incomplete
    #[arg(long)]
    deadline_secs: Option<u64>,

    #[arg(long)]
    max_in_flight: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Harvest failed: {e:#}");
            eprintln!("❌ Harvest failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => Config::builtin(),
    };
    let mut config = config.select(&cli.sources)?;
    if let Some(secs) = cli.deadline_secs {
        config.harvest.deadline_secs = Some(secs);
    }
    if let Some(max_in_flight) = cli.max_in_flight {
        config.harvest.max_in_flight = max_in_flight;
    }

    let settings = config.harvest.clone();
    let fetcher = ReqwestFetcher::new(
        &settings.user_agent,
        settings.request_timeout(),
        settings.requests_per_min,
    )
    .context("Failed to build HTTP client")?;
    let orchestrator = CrawlOrchestrator::new(Arc::new(fetcher), settings);

    let harvest = orchestrator.harvest(&config.sources).await?;
    let json = serde_json::to_string_pretty(&harvest.result)?;
    tokio::fs::write(&cli.outfile, json)
        .await
        .with_context(|| format!("Failed to write '{}'", cli.outfile.display()))?;

    let failed = harvest.reports.iter().filter(|r| r.events == 0).count();
    info!(
        outfile = %cli.outfile.display(),
        venues = harvest.result.shows.len(),
        events = harvest.result.total_events(),
        empty_sources = failed,
        incomplete = harvest.result.incomplete,
        "Snapshot written"
    );
    println!(
        "📊 {} events across {} venues written to {}",
        harvest.result.total_events(),
        harvest.result.shows.len(),
        cli.outfile.display()
    );
    Ok(())
}
