use clap::{Args, Parser, Subcommand, ValueEnum};
use es_app::{
    AppResult, BatchConfig, BatchProgressEvent, BatchServices, BatchStage, BatchSummary,
    energyplus_factory, index_weather_artifacts, list_simulation_artifacts,
};
use es_core::{SimulationArtifactRef, file_name, matrix_years};
use es_results::{MatrixStore, MetricKind, ResultMatrix};
use es_storage::FsObjectStore;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "es-cli")]
#[command(about = "energy-sweep CLI - batch building-energy simulation runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Directory backing the object store (one subdirectory per bucket)
    #[arg(long, env = "STORAGE_ROOT", default_value = "./storage")]
    storage_root: PathBuf,
    /// YAML file layered over environment configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Bucket holding artifacts and result matrices
    #[arg(long)]
    bucket: Option<String>,
    /// Only use weather files of this locale
    #[arg(long)]
    locale: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate every artifact and update the result matrices
    Run {
        #[command(flatten)]
        store: StoreArgs,
        /// Per-simulation timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Keep each scratch directory for inspection
        #[arg(long)]
        keep_outputs: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which weather file each simulation artifact would run against
    Plan {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print a result matrix
    Show {
        #[command(flatten)]
        store: StoreArgs,
        /// Which matrix to print
        #[arg(long, value_enum, default_value_t = Metric::Total)]
        metric: Metric,
        /// Only print this year
        #[arg(long)]
        year: Option<i32>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Metric {
    Total,
    PerArea,
}

impl From<Metric> for MetricKind {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::Total => MetricKind::TotalSiteEnergy,
            Metric::PerArea => MetricKind::SiteEnergyPerArea,
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("es_cli=info,es_app=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            store,
            timeout,
            keep_outputs,
            json,
        } => {
            let mut overrides = serde_json::Map::new();
            if let Some(timeout) = timeout {
                overrides.insert("timeout_secs".into(), timeout.into());
            }
            if keep_outputs {
                overrides.insert("keep_outputs".into(), true.into());
            }
            cmd_run(&store, overrides, json).await
        }
        Commands::Plan { store } => cmd_plan(&store).await,
        Commands::Show {
            store,
            metric,
            year,
        } => cmd_show(&store, metric.into(), year).await,
    }
}

fn resolve_config(
    args: &StoreArgs,
    mut overrides: serde_json::Map<String, serde_json::Value>,
) -> AppResult<BatchConfig> {
    let mut config = BatchConfig::from_env()?;
    if let Some(path) = &args.config {
        tracing::debug!(path = %path.display(), "overlaying config file");
        config = config.overlay_yaml(path)?;
    }
    if let Some(bucket) = &args.bucket {
        overrides.insert("bucket".into(), bucket.clone().into());
    }
    if let Some(locale) = &args.locale {
        overrides.insert("weather_locale".into(), locale.clone().into());
    }
    config.with_overrides(&serde_json::Value::Object(overrides))
}

async fn cmd_run(
    args: &StoreArgs,
    overrides: serde_json::Map<String, serde_json::Value>,
    json: bool,
) -> AppResult<()> {
    let config = resolve_config(args, overrides)?;
    println!(
        "Running batch: bucket={} simulations={} weather={}",
        config.bucket, config.simulation_prefix, config.weather_prefix
    );

    tracing::info!(storage_root = %args.storage_root.display(), "using filesystem store");
    let store = Arc::new(FsObjectStore::new(&args.storage_root));
    let orchestrator =
        BatchServices::new(store, energyplus_factory()).orchestrator(Arc::new(config));

    let mut last_emit = Instant::now();
    let mut last_stage = None;
    let summary = orchestrator
        .run_with_progress(Some(&mut |event: BatchProgressEvent| {
            let emit_now =
                last_stage != Some(event.stage) || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = Some(event.stage);
                last_emit = Instant::now();
            }
        }))
        .await?;
    clear_progress_line();

    if json {
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{text}"),
            Err(e) => tracing::error!(error = %e, "failed to serialize summary"),
        }
    } else {
        print_summary(&summary);
    }
    Ok(())
}

async fn cmd_plan(args: &StoreArgs) -> AppResult<()> {
    let config = resolve_config(args, serde_json::Map::new())?;
    let store = FsObjectStore::new(&args.storage_root);

    let weather = index_weather_artifacts(
        &store,
        &config.bucket,
        &config.weather_prefix,
        config.weather_locale.as_deref(),
        config.duplicate_weather,
    )
    .await?;
    let mut keys =
        list_simulation_artifacts(&store, &config.bucket, &config.simulation_prefix).await?;
    keys.sort();

    let mut matched = 0;
    for key in &keys {
        match SimulationArtifactRef::parse(key) {
            Ok(artifact) => match weather.get(&(artifact.scenario, artifact.year)) {
                Some(w) => {
                    matched += 1;
                    println!("  ✓ {} -> {}", artifact.file_name(), w.file_name());
                }
                None => println!(
                    "  ✗ {}: no weather for {} {}",
                    artifact.file_name(),
                    artifact.scenario,
                    artifact.year
                ),
            },
            Err(e) => println!("  ✗ {}: {e}", file_name(key)),
        }
    }
    println!(
        "{matched}/{} simulation artifacts matched ({} weather files indexed)",
        keys.len(),
        weather.len()
    );
    Ok(())
}

async fn cmd_show(args: &StoreArgs, kind: MetricKind, only_year: Option<i32>) -> AppResult<()> {
    let config = resolve_config(args, serde_json::Map::new())?;
    let store = Arc::new(FsObjectStore::new(&args.storage_root));
    let key = config.matrix_key(kind);
    let matrix = MatrixStore::new(store).load(&config.bucket, key).await?;

    let columns = matrix.columns();
    if columns.is_empty() {
        println!("No results in {}/{key}", config.bucket);
        return Ok(());
    }

    println!("{} ({}/{key})", kind.label(), config.bucket);
    let header: Vec<String> = columns.iter().map(|(s, a)| format!("{s} {a}")).collect();
    println!("{:>6}  {}", "Year", header.join("  "));

    let years: Vec<i32> = match only_year {
        Some(year) => vec![year],
        None => matrix_years().collect(),
    };
    for year in years {
        let row = ResultMatrix::row_for_year(year)?;
        let cells: Vec<String> = (0..columns.len())
            .map(|i| match matrix.cell(row, i + 2).as_number() {
                Some(v) => format!("{v:>w$.2}", w = header[i].len()),
                None => format!("{:>w$}", "-", w = header[i].len()),
            })
            .collect();
        if only_year.is_none() && cells.iter().all(|c| c.trim() == "-") {
            continue;
        }
        println!("{year:>6}  {}", cells.join("  "));
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "✓ Batch completed: {} succeeded, {} failed, {} total",
        summary.counts.success, summary.counts.failed, summary.counts.total
    );
    println!("  Total site energy: {}", summary.results_total_key);
    println!("  Site energy per area: {}", summary.results_per_area_key);
    for failure in &summary.failures {
        let first_line = failure.reason.lines().next().unwrap_or_default();
        println!("  ✗ {}: {first_line}", file_name(&failure.key));
    }
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &BatchProgressEvent) {
    match (&event.stage, &event.artifact) {
        (BatchStage::Simulating, Some(a)) => {
            let width = 28usize;
            let fraction = a.index.saturating_sub(1) as f64 / a.total.max(1) as f64;
            let filled = ((fraction * width as f64).round() as usize).min(width);
            print!(
                "\r[{}{}] {}/{}  ok={} failed={}  {}  elapsed={:.1}s",
                "#".repeat(filled),
                "-".repeat(width - filled),
                a.index,
                a.total,
                a.succeeded,
                a.failed,
                file_name(&a.key),
                event.elapsed_wall_s
            );
        }
        _ => {
            let spinner = ['|', '/', '-', '\\'];
            let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
            print!(
                "\r{} {}  elapsed={:.2}s",
                spinner[spin_idx],
                event.stage.label(),
                event.elapsed_wall_s
            );
        }
    }
    let _ = io::stdout().flush();
}
