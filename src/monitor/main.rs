use core::time::Duration;
use std::path::PathBuf;

use rvmon::{
    db::{DbConfig, PgStore},
    scrape::{BrowserOptions, GoogleMaps},
    store::{MemoryStore, ReviewStore},
    sync::{Orchestrator, RunSummary},
    util::{parse_cutoff, read_businesses},
};

#[derive(clap::Parser)]
#[command(about = "Incrementally store new Google Maps reviews of tracked businesses")]
struct Args {
    /// File with one business URL or name per line
    #[arg(short, long = "input", value_name = "file", default_value = "input/urls.txt")]
    input: PathBuf,
    /// Earliest review date to keep (YYYY-MM-DD, UTC)
    #[arg(long, default_value = "2022-01-01")]
    from_date: String,
    /// Show the browser window
    #[arg(long)]
    headful: bool,
    #[arg(long, env = "PROXY_SERVER")]
    proxy: Option<String>,
    /// Seconds to wait for page elements
    #[arg(long, default_value_t = 5)]
    wait_secs: u64,
    /// Scrape and evaluate without touching the database
    #[arg(long)]
    dry_run: bool,
    #[command(flatten)]
    db: DbConfig,
}

async fn sync<S: ReviewStore>(args: &Args, store: S) -> anyhow::Result<RunSummary> {
    let cutoff = parse_cutoff(&args.from_date)?;
    let businesses = read_businesses(&args.input)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", args.input.display()))?;
    tracing::info!(target: "main", "{} businesses, cutoff {}", businesses.len(), args.from_date);

    let source = GoogleMaps::launch(BrowserOptions {
        headless: !args.headful,
        proxy: args.proxy.clone(),
        wait: Duration::from_secs(args.wait_secs),
        ..BrowserOptions::default()
    })
    .await?;

    Ok(Orchestrator::new(source, store).run(&businesses, cutoff).await)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();

    let summary = if args.dry_run {
        let store = MemoryStore::new();
        let summary = sync(&args, store.clone()).await?;
        tracing::info!(target: "main", "dry run: {} reviews would be stored", store.len());
        summary
    } else {
        let store = PgStore::connect(&args.db).await?;
        store.bootstrap().await?;
        sync(&args, store).await?
    };

    let failed = summary.failures().count();
    tracing::info!(
        target: "main",
        "\x1b[1;36m{} new reviews\x1b[0m from {} businesses, {failed} failed",
        summary.total_inserted(),
        summary.reports.len(),
    );

    Ok(())
}
