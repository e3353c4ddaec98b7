use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use geodump::config::{self, PipelineConfig};
use geodump::import::{ImportConfig, Neo4jSink};
use geodump::sink::{DocumentSink, JsonLinesSink, MemorySink};
use geodump::stats::RunReport;
use geodump::{DumpFiles, Pipeline};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "geodump")]
#[command(about = "Resolve GeoNames dumps into cross-referenced documents and bulk load them")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the GeoNames dump files
    Fetch(FetchArgs),
    /// Resolve the dumps and load the documents into a sink
    Load(LoadArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// Directory the dump files are written to
    #[arg(short, long)]
    output: PathBuf,

    /// Base URL of the GeoNames export
    #[arg(long, default_value = config::DEFAULT_BASE_URL)]
    base_url: String,
}

#[derive(Args)]
struct LoadArgs {
    /// Directory containing the dump files
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for JSON lines files
    #[arg(short, long, required_unless_present_any = ["neo4j", "dry_run"])]
    output: Option<PathBuf>,

    /// Documents per sink batch
    #[arg(long, default_value_t = config::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Title-case all-uppercase postal names longer than this (0 disables)
    #[arg(long, default_value_t = config::DEFAULT_TITLE_THRESHOLD)]
    title_threshold: usize,

    /// Load into Neo4j instead of writing files
    #[arg(long)]
    neo4j: bool,

    /// Neo4j Bolt URI
    #[arg(long, default_value = config::DEFAULT_BOLT_URI)]
    bolt_uri: String,

    /// Neo4j user
    #[arg(long, default_value = "")]
    user: String,

    /// Neo4j password
    #[arg(long, default_value = "")]
    password: String,

    /// Clear existing nodes (Neo4j) or output files before loading
    #[arg(long)]
    clean: bool,

    /// Resolve everything but keep documents in memory only
    #[arg(long)]
    dry_run: bool,
}

fn run_fetch(args: FetchArgs) -> Result<()> {
    let start = Instant::now();
    let errors = geodump::fetch::fetch_all(&args.output, &args.base_url);
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("    FAILED: {e:#}");
        }
        bail!("{} of {} downloads failed", errors.len(), config::DUMP_SOURCES.len());
    }
    info!(
        duration_secs = start.elapsed().as_secs_f64(),
        "All dumps fetched"
    );
    Ok(())
}

fn run_load(args: LoadArgs) -> Result<()> {
    let files = DumpFiles::new(&args.input);
    for path in files.all_paths() {
        if !path.exists() {
            bail!(
                "Missing dump file: {path:?}\n\
                 Run 'geodump fetch' first."
            );
        }
    }

    let pipeline_config = PipelineConfig {
        batch_size: args.batch_size,
        title_threshold: args.title_threshold,
        show_progress: true,
    };

    let mut sink: Box<dyn DocumentSink> = if args.dry_run {
        info!("Dry run, documents stay in memory");
        Box::new(MemorySink::new())
    } else if args.neo4j {
        let import_config = ImportConfig {
            bolt_uri: args.bolt_uri,
            user: args.user,
            password: args.password,
            clean: args.clean,
        };
        Box::new(Neo4jSink::connect(&import_config)?)
    } else {
        let output = args.output.context("--output is required for JSON lines")?;
        if args.clean && output.exists() {
            info!("Cleaning output directory: {:?}", output);
            fs::remove_dir_all(&output)
                .with_context(|| format!("Failed to clean output directory: {:?}", output))?;
        }
        Box::new(JsonLinesSink::new(&output)?)
    };

    let report = Pipeline::new(files, pipeline_config).run(sink.as_mut())?;
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!();
    println!("=== Summary ===");
    for stage in &report.stages {
        println!(
            "{:<12} {:>10} records {:>10} documents {:>6} batches {:>8} unresolved  {:.2}s",
            stage.collection.name(),
            stage.records_read,
            stage.documents_emitted,
            stage.batches,
            stage.unresolved.total(),
            stage.duration.as_secs_f64()
        );
    }
    println!();
    println!("Countries indexed:  {}", report.index.countries);
    println!("Admins indexed:     {}", report.index.admins);
    println!("Features indexed:   {}", report.index.features);
    println!("Timezones indexed:  {}", report.index.timezones);
    println!("Documents written:  {}", report.documents());
    println!("Total time:         {:.2}s", report.duration().as_secs_f64());
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Fetch(args) => run_fetch(args),
        Commands::Load(args) => run_load(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
