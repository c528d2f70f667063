use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use eks_addons::aws::http::format_aws_error;
use eks_addons::aws::regions::{list_regions, validate_region, RegionMatrix};
use eks_addons::config::Config;
use eks_addons::output::{ndjson_line, OutputFormat, QueryResult};
use eks_addons::pipeline::streamer::DEFAULT_CAPACITY;
use eks_addons::pipeline::{parse_columns, Column, Evaluator, Query, Streamer};
use eks_addons::resource::EksClientFactory;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// List EKS cluster add-ons across regions
#[derive(Parser, Debug)]
#[command(name = "eks-addons", version, about, long_about = None)]
struct Args {
    /// Region to query (repeatable); defaults to the configured regions
    #[arg(short, long)]
    region: Vec<String>,

    /// Query every region where EKS is available
    #[arg(long, conflicts_with = "region")]
    all_regions: bool,

    /// Only add-ons of this cluster (repeatable)
    #[arg(short, long)]
    cluster: Vec<String>,

    /// Only add-ons with this name (repeatable); with --cluster, skips listing
    #[arg(short, long)]
    addon: Vec<String>,

    /// Comma-separated columns to output, `*` for all
    #[arg(long, default_value = "cluster_name,addon_name,addon_version,status,region")]
    columns: String,

    /// Stop after this many rows
    #[arg(short, long)]
    limit: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// EKS endpoint template, `{region}` is replaced
    #[arg(long)]
    endpoint: Option<String>,

    /// Maximum cluster listings in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Retries for throttled or transient calls
    #[arg(long)]
    max_retries: Option<u32>,

    /// Error code treated as "add-on deleted" (repeatable, replaces the defaults)
    #[arg(long = "ignore-error")]
    ignore_errors: Vec<String>,

    /// Print the column catalogue and exit
    #[arg(long)]
    list_columns: bool,

    /// Persist --region and --endpoint to the config file
    #[arg(long)]
    save_config: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("eks-addons {} started with log level: {:?}", eks_addons::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("eks-addons").join("eks-addons.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".eks-addons").join("eks-addons.log");
    }
    PathBuf::from("eks-addons.log")
}

fn print_columns() {
    for column in Column::ALL {
        let marker = if column.requires_hydration() { "*" } else { " " };
        println!("{} {:<26} {}", marker, column.name(), column.description());
    }
    println!("\n* requires a DescribeAddon call per add-on");
}

/// Region matrix for this run: every known region when asked for, or when
/// --region narrows the query, otherwise the configured set
fn region_matrix(args: &Args, config: &Config) -> RegionMatrix {
    if args.all_regions || !args.region.is_empty() {
        let mut regions = config.regions.clone();
        regions.extend(list_regions());
        regions.extend(args.region.iter().cloned());
        return RegionMatrix::new(regions);
    }
    RegionMatrix::new(config.effective_regions())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_guard = setup_logging(args.log_level)?;

    if args.list_columns {
        print_columns();
        return Ok(());
    }

    if let Some(bad) = args.region.iter().find(|r| !validate_region(r)) {
        anyhow::bail!("Invalid region: {}", bad);
    }

    let mut config = Config::load();
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    if let Some(concurrency) = args.concurrency {
        config.max_concurrency = concurrency;
    }
    if let Some(retries) = args.max_retries {
        config.max_retries = retries;
    }
    if args.save_config {
        if args.region.is_empty() {
            config.save()
        } else {
            config.set_regions(args.region.clone())
        }
        .context("Failed to save configuration")?;
        tracing::info!("Configuration saved");
    }

    let columns = parse_columns(&args.columns)?;
    let query = Query::new(columns.clone())
        .with_clusters(args.cluster.iter().cloned())
        .with_addons(args.addon.iter().cloned())
        .with_regions(args.region.iter().cloned());

    if !args.ignore_errors.is_empty() {
        config.ignore_error_codes = Some(args.ignore_errors.clone());
    }

    let factory = Arc::new(EksClientFactory::new(config.endpoint.clone())?);
    let evaluator = Evaluator::from_config(factory, &config).with_matrix(region_matrix(&args, &config));
    tracing::debug!(regions = ?evaluator.matrix().regions(), "Region matrix");

    // Rows go through the caller-side predicate here; the limit applies after it
    let (streamer, mut rx) = Streamer::channel(DEFAULT_CAPACITY, None);
    let output = args.output;
    let limit = args.limit;
    let quals = query.quals.clone();
    let consume = async move {
        let mut result = QueryResult::new(columns);
        let mut seen = 0usize;
        while let Some(row) = rx.recv().await {
            if !quals.matches(&row.identity.cluster_name, &row.identity.addon_name) {
                continue;
            }
            if output == OutputFormat::Ndjson {
                println!("{}", ndjson_line(&row, &result.columns));
            } else {
                result.push(&row);
            }
            seen += 1;
            if limit.is_some_and(|l| seen >= l) {
                break;
            }
        }
        // Dropping the receiver cancels whatever is still in flight
        drop(rx);
        (result, seen)
    };

    let (outcome, (result, seen)) = tokio::join!(evaluator.run(&query, streamer), consume);

    if output != OutputFormat::Ndjson {
        println!("{}", result.format(output));
    }

    match outcome {
        Ok(summary) => {
            tracing::info!(rows = seen, suppressed = summary.suppressed, "Done");
            Ok(())
        }
        Err(err) => {
            let err = match err.api() {
                Some(api) => anyhow::Error::new(api.clone()),
                None => anyhow::Error::new(err),
            };
            eprintln!("Error: {}", format_aws_error(&err));
            tracing::error!("{:#}", err);
            // exit skips destructors, flush the log writer first
            drop(log_guard);
            std::process::exit(1);
        }
    }
}
