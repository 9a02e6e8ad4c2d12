//! Web of Science Harvester - Entry Point
//!
//! Subcommands: list organizations, fetch tables to files, serve them over
//! HTTP, or ask questions about them.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use wos_harvest::{
    Config, PipelineError, WosClient,
    ask::{ChatCompletionAgent, KeywordClassifier, QuestionLoop},
    config::{self, LlmConfig, SPREADSHEET_ROW_LIMIT},
    export::{self, COMBINED_STEM, OutputFormat},
    models::{BatchReport, Organization, YearRange},
    pipeline::{self, PipelineOptions},
    server::{self, DirectorySource, LiveSource, TableCache, TableSource},
};

#[derive(Parser, Debug)]
#[command(name = "wos-harvest")]
#[command(about = "Harvest, flatten and serve Web of Science publications per organization")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the supported organizations
    Organizations,

    /// Harvest organizations and write their tables to files
    Fetch(FetchArgs),

    /// Serve tables over HTTP
    Serve(ServeArgs),

    /// Ask questions about harvested tables
    Ask(AskArgs),
}

/// Upstream API settings shared by `fetch` and `serve --live`.
#[derive(clap::Args, Debug)]
struct ApiArgs {
    /// Web of Science Starter API key
    #[arg(long, env = "WOS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Starter API base URL
    #[arg(long, env = "WOS_BASE_URL")]
    base_url: Option<String>,

    /// First publication year
    #[arg(long, default_value_t = config::api::FIRST_YEAR)]
    from: u16,

    /// Last publication year
    #[arg(long, default_value_t = config::api::LAST_YEAR)]
    to: u16,

    /// Organizations harvested at the same time
    #[arg(long, default_value_t = config::api::MAX_CONCURRENT_ORGS)]
    max_concurrent_orgs: usize,

    /// Drop repeated (publication, author) rows
    #[arg(long)]
    dedupe: bool,
}

impl ApiArgs {
    fn config(&self) -> Config {
        let mut config = Config::new(self.api_key.clone());
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        config.year_range = YearRange::new(self.from, self.to);
        config.max_concurrent_orgs = self.max_concurrent_orgs.max(1);
        config
    }

    const fn options(&self) -> PipelineOptions {
        PipelineOptions { dedupe: self.dedupe }
    }
}

#[derive(clap::Args, Debug)]
struct FetchArgs {
    #[command(flatten)]
    api: ApiArgs,

    /// Organization (query or display name); repeatable
    #[arg(long = "org", value_name = "NAME")]
    organizations: Vec<String>,

    /// Harvest every supported organization
    #[arg(long, conflicts_with = "organizations")]
    all: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Output directory
    #[arg(long, default_value = "data")]
    output: PathBuf,

    /// Append today's date to file names
    #[arg(long)]
    dated: bool,

    /// Write one table holding every organization
    #[arg(long)]
    combined: bool,

    /// Maximum rows per file before splitting into parts
    #[arg(long, default_value_t = SPREADSHEET_ROW_LIMIT)]
    row_ceiling: usize,
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    api: ApiArgs,

    /// Bind address
    #[arg(long, default_value = "127.0.0.1", env = "HOST")]
    host: String,

    /// Port
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Directory of tables written by `fetch`
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Harvest from the API at startup instead of reading files
    #[arg(long)]
    live: bool,
}

#[derive(clap::Args, Debug)]
struct AskArgs {
    /// Directory of tables written by `fetch`
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Restrict questions to one organization
    #[arg(long = "org", value_name = "NAME")]
    organization: Option<String>,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting wos-harvest");

    match cli.command {
        Command::Organizations => {
            for org in config::organizations() {
                println!("{}\t{}\t{}", org.query_name, org.display_name, org.file_stem());
            }
            Ok(())
        }
        Command::Fetch(args) => fetch(args).await,
        Command::Serve(args) => serve(args).await,
        Command::Ask(args) => ask(args).await,
    }
}

fn resolve_organizations(names: &[String], all: bool) -> anyhow::Result<Vec<Organization>> {
    if all {
        return Ok(config::organizations());
    }
    if names.is_empty() {
        bail!("pass --org <NAME> at least once, or --all");
    }
    names
        .iter()
        .map(|name| {
            config::find_organization(name)
                .ok_or_else(|| PipelineError::UnknownOrganization(name.clone()).into())
        })
        .collect()
}

async fn fetch(args: FetchArgs) -> anyhow::Result<()> {
    let organizations = resolve_organizations(&args.organizations, args.all)?;
    let config = args.api.config();
    let client = WosClient::new(&config).context("cannot build API client")?;

    tracing::info!(
        organizations = organizations.len(),
        years = %config.year_range,
        format = ?args.format,
        "Fetching"
    );

    let batch = pipeline::run_batch(&client, &config, organizations, args.api.options()).await;
    let suffix = if args.dated { format!("_{}", chrono::Local::now().format("%Y_%m_%d")) } else { String::new() };

    if args.combined {
        let rows: Vec<_> = batch.tables.iter().flat_map(|t| t.rows.iter().cloned()).collect();
        export::write_table(&rows, &args.output, &format!("{COMBINED_STEM}{suffix}"), args.format, args.row_ceiling)?;
    } else {
        for table in &batch.tables {
            let stem = format!("{}{suffix}", table.organization.file_stem());
            export::write_table(&table.rows, &args.output, &stem, args.format, args.row_ceiling)?;
        }
    }

    print_report(&batch);

    if batch.tables.is_empty() && !batch.failed.is_empty() {
        bail!("every organization failed");
    }
    Ok(())
}

fn print_report(batch: &BatchReport) {
    for table in &batch.tables {
        let report = &table.report;
        println!(
            "{}: {} rows, {} records, {}/{} pages, {} backoff waits",
            table.organization.display_name,
            table.rows.len(),
            report.total_records,
            report.fetched_pages,
            report.total_pages,
            report.backoff_waits,
        );
        for failed in &report.failed_pages {
            println!("  page {} dropped: {}", failed.page, failed.reason);
        }
    }
    for (organization, reason) in &batch.failed {
        println!("{}: FAILED: {reason}", organization.display_name);
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", args.host, args.port))?;

    let source: Arc<dyn TableSource> = if args.live {
        let config = args.api.config();
        let client = WosClient::new(&config).context("cannot build API client")?;
        Arc::new(LiveSource::new(client, config, args.api.options()))
    } else {
        ensure_dir(&args.data_dir)?;
        Arc::new(DirectorySource::new(&args.data_dir))
    };

    let cache = Arc::new(TableCache::new(config::organizations()));
    server::serve(addr, cache, source).await
}

async fn ask(args: AskArgs) -> anyhow::Result<()> {
    ensure_dir(&args.data_dir)?;
    let llm = LlmConfig::from_env()?;

    let tables = export::load_directory(&args.data_dir)?;
    let rows: Vec<_> = match &args.organization {
        Some(name) => {
            let org = config::find_organization(name)
                .ok_or_else(|| PipelineError::UnknownOrganization(name.clone()))?;
            tables.get(&org.display_name).cloned().unwrap_or_default()
        }
        None => tables.into_values().flatten().collect(),
    };
    if rows.is_empty() {
        bail!("no rows found in {}", args.data_dir.display());
    }

    tracing::info!(rows = rows.len(), model = %llm.model, "Question loop ready");

    let question_loop = QuestionLoop::new(
        rows,
        Box::new(KeywordClassifier::new()),
        Box::new(ChatCompletionAgent::new(llm)?),
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let answered = question_loop.run(stdin, tokio::io::stdout()).await?;
    tracing::info!(answered, "Question loop finished");
    Ok(())
}

fn ensure_dir(dir: &Path) -> anyhow::Result<()> {
    if !dir.is_dir() {
        bail!("data directory {} does not exist", dir.display());
    }
    Ok(())
}
