use clap::Parser;
use nc_core::{DedupConfig, DedupReport, NewsItem, Result};
use nc_dedup::DedupPipeline;
use nc_inference::ProviderConfig;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq)]
struct HumanDuration(Duration);

fn unit_seconds(unit: char) -> Option<u64> {
    match unit {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(3600),
        'd' => Some(86_400),
        _ => None,
    }
}

/// Parses `90`, `30s`, `2m`, `1h15m30s`. A trailing bare number counts as seconds.
impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let overflow = || format!("Duration too large: {}", s);
        let mut total_seconds = 0u64;
        let mut digits = String::new();
        let mut parts = 0usize;

        let chars = s.chars().filter(|c| !c.is_whitespace()).map(Some).chain([None]);
        for c in chars {
            match c {
                Some(c) if c.is_ascii_digit() => digits.push(c),
                _ if digits.is_empty() => match c {
                    Some(c) => return Err(format!("Expected a number before '{}'", c)),
                    None if parts == 0 => return Err("Duration must include a number".to_string()),
                    None => {}
                },
                _ => {
                    let multiplier = match c {
                        Some(unit) => unit_seconds(unit).ok_or_else(|| format!("Invalid duration unit: {}", unit))?,
                        None => 1,
                    };
                    let seconds = digits
                        .parse::<u64>()
                        .ok()
                        .and_then(|n| n.checked_mul(multiplier))
                        .ok_or_else(overflow)?;
                    total_seconds = total_seconds.checked_add(seconds).ok_or_else(overflow)?;
                    digits.clear();
                    parts += 1;
                }
            }
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Deduplicate a daily batch of news items", long_about = None)]
pub struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Cluster near-duplicate stories and write the merged clusters as JSON
    Dedup(DedupArgs),
}

#[derive(clap::Args, Debug)]
struct DedupArgs {
    /// JSON array of news items
    #[arg(short, long)]
    input: PathBuf,
    /// Where to write the report. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Cosine similarity above which two items are merged
    #[arg(long, env = "SIMILARITY_THRESHOLD", default_value_t = nc_core::config::DEFAULT_SIMILARITY_THRESHOLD)]
    threshold: f32,
    #[arg(long, default_value = "hashing", help = "Embedding provider. Available providers: hashing (default), openai")]
    provider: String,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "OPENAI_API_BASE")]
    base_url: Option<String>,
    #[arg(long, env = "EMBEDDING_MODEL")]
    model: Option<String>,
    /// Expected embedding dimensionality; other lengths are rejected per item
    #[arg(long)]
    dimensions: Option<usize>,
    /// Maximum concurrent embedding requests
    #[arg(long, default_value_t = nc_core::config::DEFAULT_MAX_CONCURRENT)]
    concurrency: usize,
    /// Deadline for the embedding phase (e.g. 30s, 2m, 1m30s)
    #[arg(long, default_value = "60s")]
    timeout: HumanDuration,
}

impl DedupArgs {
    fn provider_config(&self) -> ProviderConfig {
        let mut config = ProviderConfig::new(self.provider.clone())
            .with_api_key(self.api_key.clone())
            .with_base_url(self.base_url.clone())
            .with_dimensions(self.dimensions);
        config.model_name = self.model.clone();
        config
    }

    fn dedup_config(&self) -> DedupConfig {
        let mut config = DedupConfig::default()
            .with_threshold(self.threshold)
            .with_max_concurrent(self.concurrency)
            .with_fetch_timeout(self.timeout.0);
        config.expected_dimensions = self.dimensions;
        config
    }
}

fn read_items(path: &Path) -> Result<Vec<NewsItem>> {
    let data = std::fs::read_to_string(path)?;
    let mut items: Vec<NewsItem> = serde_json::from_str(&data)?;
    for item in items.iter_mut().filter(|item| item.id.is_empty()) {
        item.id = NewsItem::derive_id(&item.source, &item.title, item.url.as_ref());
    }
    Ok(items)
}

fn write_report(report: &DedupReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, json)?;
            info!("💾 Saved report to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn run_dedup(args: DedupArgs) -> Result<DedupReport> {
    let started = Instant::now();

    let items = read_items(&args.input)?;
    let load_time = started.elapsed();
    info!("📥 Loaded {} items from {}", items.len(), args.input.display());

    let provider = nc_inference::create_provider(&args.provider_config())?;
    info!("🧠 Embedding provider initialized (using {})", provider.name());

    let pipeline = DedupPipeline::new(provider, args.dedup_config())?;
    let dedup_started = Instant::now();
    let report = pipeline.run(items).await?;
    let dedup_time = dedup_started.elapsed();

    for warning in &report.warnings {
        warn!("⚠️ {}", warning);
    }

    write_report(&report, args.output.as_deref())?;

    let total = started.elapsed().as_secs_f64();
    info!("Timing summary:");
    for (step, duration) in [("load", load_time), ("dedup", dedup_time)] {
        let secs = duration.as_secs_f64();
        let percentage = if total > 0.0 { secs / total * 100.0 } else { 0.0 };
        info!("  {:<8}: {:6.2}s ({:5.1}%)", step, secs, percentage);
    }
    info!("  {:<8}: {:6.2}s", "total", total);

    Ok(report)
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Dedup(args) => {
            let report = run_dedup(args).await?;
            info!(
                "✅ {} clusters, {} degraded items",
                report.clusters.len(),
                report.degraded_items().len()
            );
        }
    }

    Ok(())
}
