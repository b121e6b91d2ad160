use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trawl_client::{HtmlParser, ReqwestFetcher};
use trawl_core::{CrawlConfig, Crawler, DEFAULT_USER_AGENT, RunStats};
use trawl_store::{FileStore, MemoryStore, OutputFormat};

#[derive(Parser)]
#[command(name = "trawl", version, about = "Polite, bounded web crawler")]
struct Cli {
    /// Log every fetch, skip and failure
    #[arg(short, long, global = true, env = "TRAWL_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl from one or more seed URLs and write the pages to a file
    Crawl(CrawlArgs),

    /// Fetch a single page and print it as JSON
    Scrape {
        /// Page to fetch
        #[arg(short, long)]
        url: String,

        /// Extract article text instead of every paragraph
        #[arg(long)]
        news: bool,

        /// Request timeout in seconds
        #[arg(long, env = "TRAWL_TIMEOUT", default_value = "10", value_parser = parse_seconds)]
        timeout: Duration,

        /// User-Agent header and robots.txt agent
        #[arg(long, env = "TRAWL_AGENT", default_value = DEFAULT_USER_AGENT)]
        agent: String,
    },
}

#[derive(Args)]
struct CrawlArgs {
    /// Seed URL (repeatable)
    #[arg(short, long = "seed", required = true)]
    seeds: Vec<String>,

    /// Output file
    #[arg(short, long, env = "TRAWL_OUTPUT", default_value = "results.json")]
    output: PathBuf,

    /// Output format (json or csv); inferred from the output extension if omitted
    #[arg(short, long, env = "TRAWL_FORMAT")]
    format: Option<OutputFormat>,

    /// Number of concurrent workers
    #[arg(short, long, env = "TRAWL_WORKERS", default_value_t = 2)]
    workers: usize,

    /// Maximum link depth from the seeds
    #[arg(short, long, env = "TRAWL_DEPTH", default_value_t = 1)]
    depth: u32,

    /// Minimum seconds between requests to the same host
    #[arg(long, env = "TRAWL_DELAY", default_value = "1", value_parser = parse_seconds)]
    delay: Duration,

    /// Request timeout in seconds
    #[arg(long, env = "TRAWL_TIMEOUT", default_value = "10", value_parser = parse_seconds)]
    timeout: Duration,

    /// Respect robots.txt
    #[arg(long, env = "TRAWL_ROBOTS", default_value_t = true, action = ArgAction::Set)]
    robots: bool,

    /// Extract article text instead of every paragraph
    #[arg(long, env = "TRAWL_NEWS")]
    news: bool,

    /// Maximum pages to crawl (0 for no limit)
    #[arg(short, long, env = "TRAWL_MAX", default_value_t = 20)]
    max: u64,

    /// User-Agent header and robots.txt agent
    #[arg(long, env = "TRAWL_AGENT", default_value = DEFAULT_USER_AGENT)]
    agent: String,

    /// Only follow links on the same host as the page they were found on
    #[arg(long, env = "TRAWL_STAY_DOMAIN", default_value_t = true, action = ArgAction::Set)]
    stay_domain: bool,

    /// Only follow links containing this substring
    #[arg(long, env = "TRAWL_FILTER")]
    filter: Option<String>,

    /// Fetch the seeds only, do not follow links
    #[arg(long, env = "TRAWL_SEED_ONLY")]
    seed_only: bool,

    /// Store discovered links with each page
    #[arg(long, env = "TRAWL_EXTRACT_LINKS")]
    extract_links: bool,
}

impl CrawlArgs {
    fn crawl_config(&self, verbose: bool) -> CrawlConfig {
        CrawlConfig::default()
            .with_workers(self.workers)
            .with_max_depth(self.depth)
            .with_delay(self.delay)
            .with_timeout(self.timeout)
            .with_respect_robots(self.robots)
            .with_news_mode(self.news)
            .with_max_pages(self.max)
            .with_user_agent(self.agent.clone())
            .with_verbose(verbose)
            .with_stay_on_domain(self.stay_domain)
            .with_url_filter(self.filter.clone())
            .with_seed_only(self.seed_only)
            .with_extract_links(self.extract_links)
    }

    /// Explicit format, else the output extension, else JSON.
    fn output_format(&self) -> OutputFormat {
        if let Some(format) = self.format {
            return format;
        }
        OutputFormat::from_path(&self.output).unwrap_or_else(|| {
            tracing::warn!(
                output = %self.output.display(),
                "Unknown output extension, writing JSON"
            );
            OutputFormat::Json
        })
    }
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("'{value}' is not a valid duration"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let directive = if cli.verbose { "trawl=debug" } else { "trawl=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Crawl(args) => cmd_crawl(&args, cli.verbose).await,
        Commands::Scrape {
            url,
            news,
            timeout,
            agent,
        } => cmd_scrape(&url, news, timeout, &agent, cli.verbose).await,
    }
}

async fn cmd_crawl(args: &CrawlArgs, verbose: bool) -> Result<()> {
    let config = args.crawl_config(verbose);
    let format = args.output_format();

    let store = FileStore::create(&args.output, format)
        .with_context(|| format!("Failed to create output file: {}", args.output.display()))?;
    let fetcher = ReqwestFetcher::from_config(&config)
        .context("Failed to create HTTP client")?
        .allow_private_urls();
    let parser = HtmlParser::new()?;

    let handle = Crawler::new(config, fetcher, parser, store.clone()).start(&args.seeds)?;

    let stats = tokio::select! {
        stats = handle.wait() => stats,
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            tracing::warn!("Interrupt received, finishing in-flight pages");
            handle.cancel();
            handle.wait().await
        }
    };

    print_summary(&stats, store.path(), format);
    Ok(())
}

async fn cmd_scrape(
    url: &str,
    news: bool,
    timeout: Duration,
    agent: &str,
    verbose: bool,
) -> Result<()> {
    let config = CrawlConfig::default()
        .with_seed_only(true)
        .with_max_pages(1)
        .with_workers(1)
        .with_delay(Duration::ZERO)
        .with_news_mode(news)
        .with_timeout(timeout)
        .with_user_agent(agent)
        .with_verbose(verbose)
        .with_extract_links(true);

    let fetcher = ReqwestFetcher::from_config(&config)
        .context("Failed to create HTTP client")?
        .allow_private_urls();
    let store = MemoryStore::new();

    tracing::info!("Fetching {}", url);
    Crawler::new(config, fetcher, HtmlParser::new()?, store.clone())
        .run([url])
        .await?;

    let record = store
        .records()
        .into_iter()
        .next()
        .with_context(|| format!("Could not scrape {url} (run with --verbose for details)"))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn print_summary(stats: &RunStats, output: &Path, format: OutputFormat) {
    println!("Crawl finished in {:.1}s", stats.elapsed().as_secs_f64());
    println!("  Pages crawled:    {}", stats.pages_crawled);
    println!("  Links discovered: {}", stats.links_discovered);
    println!("  Failed:           {}", stats.pages_failed);
    println!("  Disallowed:       {}", stats.pages_disallowed);
    println!("  Output:           {} ({format})", output.display());
}
