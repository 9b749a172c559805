use std::io::{self, Write, stdin, stdout};

use rvmon::{
    db::{DbConfig, PgStore},
    util::format_time,
};

#[derive(clap::Parser)]
#[command(about = "Inspect or clear the stored reviews")]
struct Args {
    #[command(subcommand)]
    command: Commands,
    #[command(flatten)]
    db: DbConfig,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Totals, date range and rating distribution
    Info,
    /// Most recent reviews
    Recent {
        #[arg(long)]
        business: Option<String>,
        #[arg(short = 'n', long, default_value_t = 20, value_parser = clap::value_parser!(i64).range(1..))]
        limit: i64,
        /// Number of reviews to skip, for paging through the listing
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..))]
        offset: i64,
    },
    /// Delete reviews, all of them or those of one business
    Clear {
        #[arg(long)]
        business: Option<String>,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

fn confirm(question: &str) -> io::Result<bool> {
    let mut stdout = stdout();
    write!(stdout, "{question} (y/n): ")?;
    stdout.flush()?;
    let mut answer = String::with_capacity(8);
    stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

async fn info(store: &PgStore) -> anyhow::Result<()> {
    let info = store.info().await?;

    println!("Total reviews:     {}", info.total);
    println!("Unique businesses: {}", info.businesses);
    println!("Unique reviewers:  {}", info.reviewers);
    match info.oldest.zip(info.newest) {
        Some((oldest, newest)) => println!("Date range:        {} to {}", format_time(oldest), format_time(newest)),
        None => println!("Date range:        no data"),
    }
    if !info.per_business.is_empty() {
        println!("\nReviews per business:");
        for (business, count) in &info.per_business {
            println!("  {}: {count}", business.as_deref().unwrap_or("?"));
        }
    }
    if !info.ratings.is_empty() {
        println!("\nRating  Count");
        for (rating, count) in info.ratings {
            match rating {
                Some(rating) => println!("{rating:<6.1}  {count}"),
                None => println!("{:<6}  {count}", "-"),
            }
        }
    }
    Ok(())
}

async fn recent(store: &PgStore, business: Option<&str>, limit: i64, offset: i64) -> anyhow::Result<()> {
    let reviews = store.recent(business, limit, offset).await?;
    if reviews.is_empty() {
        println!("No reviews found.");
    }
    for r in reviews {
        println!(
            "[{}] {} {} ({}) {}",
            r.resolved.map(format_time).unwrap_or_default(),
            r.rating.map(|x| format!("{x:.1}")).unwrap_or_else(|| "-".to_owned()),
            r.author.as_deref().unwrap_or("?"),
            r.relative_date.as_deref().unwrap_or("?"),
            r.business.as_deref().unwrap_or("?"),
        );
        if let Some(caption) = r.caption.filter(|c| !c.is_empty()) {
            println!("    {caption}");
        }
        tracing::debug!(target: "review-db", "id = {}", r.id);
    }
    Ok(())
}

async fn clear(store: &PgStore, business: Option<&str>, yes: bool) -> anyhow::Result<()> {
    let count = store.count(business).await?;
    if count == 0 {
        println!("No reviews to delete.");
        return Ok(());
    }

    let question = match business {
        Some(business) => format!("Delete {count} reviews for {business}?"),
        None => format!("Delete ALL {count} reviews?"),
    };
    if !yes && !confirm(&question)? {
        println!("Operation cancelled.");
        return Ok(());
    }

    let n = store.clear(business).await?;
    println!("{n} reviews deleted.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();

    let store = PgStore::connect(&args.db).await?;
    store.bootstrap().await?;

    match args.command {
        Commands::Info => info(&store).await,
        Commands::Recent { business, limit, offset } => recent(&store, business.as_deref(), limit, offset).await,
        Commands::Clear { business, yes } => clear(&store, business.as_deref(), yes).await,
    }
}
