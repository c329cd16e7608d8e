//! Command-line interface for the finance data collection system
//!
//! # Usage
//!
//! ```bash
//! # Credentials and settings are read from the environment or a .env file
//! export FINNHUB_API_KEY="your-key"
//!
//! finance-agent fetch --symbol AAPL --source yahoo --start 2024-01-01 --end 2024-01-31
//! finance-agent collect --symbol AAPL --start 2024-01-01 --end 2024-01-31
//! finance-agent news --keyword "Apple earnings" --rounds 2
//! ```

mod table;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use finance_data::sources::{SourceContext, build_source};
use finance_data::{
    CREDENTIAL_KEYS, CnbcSource, Collector, DataConfig, DateRange, ExecutionMode, FetchRequest,
    OutputFormat, SourceKind, Symbol, default_output_path, sink_for, write_articles,
};
use finance_utils::{KeyReport, LogOptions, Settings, init_tracing, load_dotenv};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "finance-agent", version)]
#[command(about = "Collect market data, news, posts and filings for a ticker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch records from a single source
    Fetch(FetchArgs),
    /// Fetch from several sources and merge the results
    Collect(CollectArgs),
    /// Download CNBC news for a keyword
    News(NewsArgs),
    /// Show settings and which credentials are present
    Config,
    /// List sources and whether each is usable
    Sources,
    /// Fetch a month of AAPL prices, then one page of AAPL news
    Demo,
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// Ticker symbol (e.g. AAPL)
    #[arg(short, long)]
    symbol: Symbol,

    /// First day, YYYY-MM-DD
    #[arg(long)]
    start: NaiveDate,

    /// Last day (inclusive), YYYY-MM-DD
    #[arg(long)]
    end: NaiveDate,

    /// Keep at most this many records per source (most recent)
    #[arg(long)]
    limit: Option<usize>,
}

impl RangeArgs {
    fn request(&self) -> anyhow::Result<FetchRequest> {
        let range = DateRange::new(self.start, self.end)?;
        let request = FetchRequest::new(self.symbol.clone(), range);
        Ok(match self.limit {
            Some(limit) => request.with_limit(limit),
            None => request,
        })
    }
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Output format
    #[arg(long, default_value = "csv")]
    format: OutputFormat,

    /// Output file (defaults to a name under DATA_DIR)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FetchArgs {
    #[command(flatten)]
    range: RangeArgs,

    /// Source to query
    #[arg(long, default_value = "yahoo")]
    source: SourceKind,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct CollectArgs {
    #[command(flatten)]
    range: RangeArgs,

    /// Comma-separated sources (default: all)
    #[arg(long, value_delimiter = ',')]
    sources: Vec<SourceKind>,

    /// Query sources one at a time instead of concurrently
    #[arg(long)]
    sequential: bool,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct NewsArgs {
    /// Search keyword
    #[arg(short, long)]
    keyword: String,

    /// Result pages to download (defaults to CNBC_ROUNDS)
    #[arg(long)]
    rounds: Option<u32>,

    #[command(flatten)]
    output: OutputArgs,
}

/// File-name-safe form of a search keyword
fn slug(keyword: &str) -> String {
    let slug: String = keyword
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() { "news".to_string() } else { slug }
}

async fn run_fetch(args: FetchArgs, settings: &Settings, config: Arc<DataConfig>) -> anyhow::Result<()> {
    let request = args.range.request()?;
    let collector = Collector::with_sources(config, &[args.source])?;
    if let Some(reason) = collector.unavailable().get(&args.source) {
        bail!("{} is unavailable: {reason}", args.source);
    }

    let records = collector
        .fetch(args.source, &request)
        .await
        .with_context(|| format!("{} fetch failed for {}", args.source, request.symbol))?;

    table::print_records(&records);

    let path = args.output.output.unwrap_or_else(|| {
        default_output_path(
            &settings.data_dir,
            &request.symbol,
            args.source.as_str(),
            &request.range,
            args.output.format,
        )
    });
    let summary = sink_for(args.output.format, path).write(&records)?;
    println!("Wrote {} records to {}", summary.records, summary.path.display());
    Ok(())
}

async fn run_collect(
    args: CollectArgs,
    settings: &Settings,
    config: Arc<DataConfig>,
) -> anyhow::Result<ExitCode> {
    let request = args.range.request()?;
    let mode = if args.sequential {
        ExecutionMode::Sequential
    } else {
        ExecutionMode::Concurrent
    };

    let collector = Collector::with_sources(config, &args.sources)?.with_mode(mode);
    let report = collector.collect(&request, &args.sources).await;

    table::print_outcomes(&report);
    table::print_records(&report.records);

    let path = args.output.output.unwrap_or_else(|| {
        default_output_path(
            &settings.data_dir,
            &request.symbol,
            "combined",
            &request.range,
            args.output.format,
        )
    });
    let summary = sink_for(args.output.format, path).write(&report.records)?;
    println!(
        "Run {}: wrote {} records to {}",
        report.run_id,
        summary.records,
        summary.path.display()
    );

    if report.all_failed() {
        error!("every source failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_news(args: NewsArgs, settings: &Settings, config: Arc<DataConfig>) -> anyhow::Result<()> {
    let rounds = args.rounds.unwrap_or(config.cnbc_rounds);
    let context = SourceContext::new(config)?;
    let source = CnbcSource::new(&context);

    let articles = source.cnbc_news(&args.keyword, rounds).await?;
    table::print_articles(&articles);

    let path = args.output.output.unwrap_or_else(|| {
        settings.data_dir.join(format!(
            "{}_cnbc_news.{}",
            slug(&args.keyword),
            args.output.format.extension()
        ))
    });
    let summary = write_articles(path, args.output.format, &articles)?;
    println!("Wrote {} articles to {}", summary.records, summary.path.display());
    Ok(())
}

fn run_config(settings: &Settings, config: &DataConfig) {
    let keys = KeyReport::from_env(&CREDENTIAL_KEYS);
    table::print_settings(settings, config);
    table::print_keys(&keys);

    if keys.missing().contains(&"FINNHUB_API_KEY") {
        warn!("FINNHUB_API_KEY is not set; Finnhub news will be unavailable");
    }
}

fn run_sources(config: Arc<DataConfig>) -> anyhow::Result<()> {
    let context = SourceContext::new(config)?;
    let rows: Vec<_> = SourceKind::ALL
        .iter()
        .map(|&kind| (kind, build_source(kind, &context).err().map(|e| e.to_string())))
        .collect();
    table::print_sources(&rows);
    Ok(())
}

/// Each step logs its own failure and the demo carries on
async fn run_demo(settings: &Settings, config: Arc<DataConfig>) -> anyhow::Result<()> {
    info!("starting data collection demo");

    let request = FetchRequest::new(
        Symbol::new("AAPL")?,
        DateRange::parse("2024-01-01", "2024-01-31")?,
    );

    match Collector::with_sources(Arc::clone(&config), &[SourceKind::Yahoo]) {
        Ok(collector) => match collector.fetch(SourceKind::Yahoo, &request).await {
            Ok(records) => match (records.first(), records.last()) {
                (Some(first), Some(last)) => info!(
                    records = records.len(),
                    from = %first.timestamp.date_naive(),
                    to = %last.timestamp.date_naive(),
                    "collected AAPL price history"
                ),
                _ => warn!("no AAPL price data returned"),
            },
            Err(e) => error!(error = %e, "error collecting price data"),
        },
        Err(e) => error!(error = %e, "could not set up Yahoo Finance"),
    }

    info!("collecting news data");
    let news = async {
        let context = SourceContext::new(config)?;
        let articles = CnbcSource::new(&context).cnbc_news("AAPL", 1).await?;
        let path = settings.data_dir.join("aapl_news_demo.csv");
        write_articles(path, OutputFormat::Csv, &articles)
    };
    match news.await {
        Ok(summary) if summary.records > 0 => info!(
            articles = summary.records,
            path = %summary.path.display(),
            "collected news articles"
        ),
        Ok(_) => warn!("no news data collected"),
        Err(e) => {
            error!(error = %e, "error collecting news data");
            info!("this might be due to network issues or API limitations");
        }
    }

    Ok(())
}

fn init_logging(settings: &Settings) -> anyhow::Result<()> {
    let mut options = LogOptions::from(settings);
    if let Some(dir) = options.file.as_deref().and_then(Path::parent) {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        }
    }
    // A log file we can't open shouldn't stop the command
    if let Err(e) = init_tracing(&options) {
        options.file = None;
        init_tracing(&options)?;
        warn!(error = %e, "file logging disabled");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let dotenv_path = load_dotenv();
    let settings = Settings::from_env();
    init_logging(&settings)?;

    if let Some(path) = dotenv_path {
        info!(path = %path.display(), "loaded environment file");
    }
    info!(environment = %settings.environment, "starting finance-agent");

    let config = Arc::new(DataConfig::from_env().context("invalid configuration")?);

    match cli.command {
        Command::Fetch(args) => run_fetch(args, &settings, config).await?,
        Command::Collect(args) => return run_collect(args, &settings, config).await,
        Command::News(args) => run_news(args, &settings, config).await?,
        Command::Config => run_config(&settings, &config),
        Command::Sources => run_sources(config)?,
        Command::Demo => run_demo(&settings, config).await?,
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_collect() {
        let cli = Cli::try_parse_from([
            "finance-agent",
            "collect",
            "--symbol",
            "aapl",
            "--start",
            "2024-01-01",
            "--end",
            "2024-01-31",
            "--sources",
            "yahoo,sec",
            "--sequential",
            "--format",
            "json",
        ])
        .unwrap();

        let Command::Collect(args) = cli.command else {
            panic!("expected collect");
        };
        assert_eq!(args.range.symbol.as_str(), "AAPL");
        assert_eq!(args.sources, vec![SourceKind::Yahoo, SourceKind::SecEdgar]);
        assert!(args.sequential);
        assert_eq!(args.output.format, OutputFormat::Json);
        assert!(args.range.request().is_ok());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let base = ["finance-agent", "fetch", "--start", "2024-01-01", "--end", "2024-01-31"];

        let bad_symbol = [&base[..], &["--symbol", "not a ticker"]].concat();
        assert!(Cli::try_parse_from(bad_symbol).is_err());

        let bad_source = [&base[..], &["--symbol", "AAPL", "--source", "bloomberg"]].concat();
        assert!(Cli::try_parse_from(bad_source).is_err());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let cli = Cli::try_parse_from([
            "finance-agent",
            "fetch",
            "--symbol",
            "AAPL",
            "--start",
            "2024-02-01",
            "--end",
            "2024-01-01",
        ])
        .unwrap();

        let Command::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.source, SourceKind::Yahoo);
        assert!(args.range.request().is_err());
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Apple earnings"), "apple_earnings");
        assert_eq!(slug("  AAPL "), "aapl");
        assert_eq!(slug("???"), "news");
    }
}
