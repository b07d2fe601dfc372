// Entry point for the variant tracker CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use variant_tracker::{
    Config, HttpFetcher, MarkerExtractor, Monitor, OpenAIModel, SiteCrawler, SnapshotStore,
    SqliteStore,
};

#[derive(Parser)]
#[command(name = "variant-tracker")]
#[command(about = "Track A/B test markup changes across storefront pages")]
struct Cli {
    /// Seed URL; repeat for several. Overrides SEED_URLS
    #[arg(long = "seed", global = true)]
    seeds: Vec<String>,

    /// Crawl depth. Overrides CRAWL_DEPTH
    #[arg(long, global = true)]
    depth: Option<usize>,

    /// Overrides DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover pages from the seeds and print them
    Crawl,

    /// Crawl, then poll the discovered pages until Ctrl-C
    Monitor {
        /// Watch the seed URLs themselves instead of crawling
        #[arg(long)]
        no_crawl: bool,

        /// Seconds between cycles. Overrides MONITOR_INTERVAL_SECS
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Print stored snapshots for a page as JSON, newest first
    History {
        #[arg(long)]
        url: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,variant_tracker=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if !cli.seeds.is_empty() {
        config.seed_urls = cli.seeds.clone();
    }
    if let Some(depth) = cli.depth {
        config.crawl_depth = depth;
    }
    if let Some(url) = &cli.database_url {
        config.database_url = url.clone();
    }

    match cli.command {
        Commands::Crawl => {
            let fetcher = HttpFetcher::with_timeout(config.fetch_timeout)?;
            for page in discover(&fetcher, &config).await {
                println!("{page}");
            }
        }
        Commands::Monitor { no_crawl, interval } => {
            if let Some(secs) = interval {
                config.monitor_interval = Duration::from_secs(secs);
            }
            monitor(&config, no_crawl).await?;
        }
        Commands::History { url, limit } => {
            let store = SqliteStore::open(&config.database_url)
                .await
                .context("Failed to open snapshot database")?;
            let history = store.history(&url, limit).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
            store.close().await;
        }
    }

    Ok(())
}

/// Crawl every seed and return the union, sorted so cycles visit pages in a
/// stable order.
async fn discover(fetcher: &HttpFetcher, config: &Config) -> Vec<String> {
    let crawler = SiteCrawler::new(fetcher);
    let mut pages: Vec<String> = crawler
        .crawl_all(&config.seed_urls, config.crawl_depth)
        .await
        .into_iter()
        .collect();
    pages.sort();
    pages
}

async fn monitor(config: &Config, no_crawl: bool) -> Result<()> {
    let fetcher = HttpFetcher::with_timeout(config.fetch_timeout)?;

    let pages = if no_crawl {
        let mut seen = HashSet::new();
        let mut seeds = config.seed_urls.clone();
        seeds.retain(|s| seen.insert(s.clone()));
        seeds
    } else {
        discover(&fetcher, config).await
    };
    tracing::info!(pages = pages.len(), "Pages to monitor");
    for page in &pages {
        tracing::info!(url = %page, "Monitoring");
    }

    tracing::info!("Opening snapshot database...");
    let store = SqliteStore::open(&config.database_url)
        .await
        .context("Failed to open snapshot database")?;

    let model = build_model(config)?;
    let extractor = MarkerExtractor::new(config.marker_attribute.clone())?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, stopping after the current cycle");
            on_signal.cancel();
        }
    });

    let mut monitor = Monitor::new(pages, &fetcher, &store, model)
        .with_interval(config.monitor_interval)
        .with_extractor(extractor)
        .with_analysis_diff(config.analysis_diff);
    monitor.run(cancel).await;

    store.close().await;
    Ok(())
}

fn build_model(config: &Config) -> Result<OpenAIModel> {
    let mut model = match &config.openai_api_key {
        Some(key) => OpenAIModel::new(key.clone()),
        None => {
            tracing::warn!("OPENAI_API_KEY not set, change summaries will report failure");
            OpenAIModel::unconfigured()
        }
    }
    .with_model(config.openai_model.clone());

    if let Some(base_url) = &config.openai_base_url {
        model = model.with_base_url(base_url.clone());
    }
    if let Some(timeout) = config.summary_timeout {
        model = model.with_timeout(timeout)?;
    }
    Ok(model)
}
