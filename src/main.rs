use feedvault::archive::Archiver;
use feedvault::config::Config;
use feedvault::db::{ArchiveScope, Repository};
use feedvault::error::Result;
use feedvault::feed::{add_feed_with_discovery, FeedFetcher};
use feedvault::scheduler::Scheduler;

enum Command {
    Serve,
    Refresh,
    AddFeed(String),
    Search(String),
    Stats,
}

fn parse_args(args: &[String]) -> Command {
    match (args.get(1).map(String::as_str), args.get(2)) {
        (Some("--refresh"), _) => Command::Refresh,
        (Some("--add-feed"), Some(url)) => Command::AddFeed(url.clone()),
        (Some("--search"), _) => Command::Search(args[2..].join(" ")),
        (Some("--stats"), _) => Command::Stats,
        _ => Command::Serve,
    }
}

fn init_logging() {
    let mut env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // html5ever is very chatty about malformed pages
    if let Ok(directive) = "html5ever=error".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let command = parse_args(&args);

    let config = Config::load()?;
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let repo = Repository::new(config.db_path.to_string_lossy().as_ref()).await?;
    let client = config.http_client()?;
    let fetcher = FeedFetcher::new(client.clone());
    let archiver = Archiver::new(client);

    match command {
        Command::Refresh => {
            let scheduler = Scheduler::new(repo, fetcher, archiver, &config);
            let (summary, report) = scheduler.run_pass(0).await;
            if let Some(summary) = summary {
                println!(
                    "Synced {} feeds: {} updated, {} unchanged, {} unreachable, {} new articles",
                    summary.feeds,
                    summary.updated,
                    summary.unchanged,
                    summary.unreachable,
                    summary.articles_added
                );
            }
            if let Some(report) = report {
                println!(
                    "Archived {} articles, {} dead links",
                    report.archived, report.dead_links
                );
            }
        }
        Command::AddFeed(url) => {
            let feed = add_feed_with_discovery(&repo, &fetcher, &url).await?;
            println!("Added {} ({})", feed.title, feed.url);
        }
        Command::Search(query) => {
            for article in repo.search_articles(&query).await? {
                println!(
                    "{}  {}  [{}]  {}",
                    article.published_at.format("%Y-%m-%d"),
                    article.title,
                    article.tags.join(", "),
                    article.url
                );
            }
        }
        Command::Stats => {
            let stats = repo.stats().await?;
            println!(
                "{} feeds, {} articles, {} comment links, {} archived, {} dead links",
                stats.feeds, stats.articles, stats.comment_links, stats.archived, stats.dead_links
            );
            let pending = repo.archive_candidates(ArchiveScope::Pending).await?;
            println!("{} articles waiting for archival", pending.len());
        }
        Command::Serve => {
            let handle = Scheduler::new(repo, fetcher, archiver, &config).spawn();
            tracing::info!(interval_secs = config.sync_interval_secs, "scheduler started");
            tokio::signal::ctrl_c().await?;
            handle.stop().await?;
        }
    }

    Ok(())
}
