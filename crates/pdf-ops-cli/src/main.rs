//! PDF Ops CLI - run PDF operations against storage or local files.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pdf_ops_core::{
    AppConfig, Operation, OperationRequest, RequestOptions, StorageBackend, StorageConfig,
    apply_to_bytes, create_pipeline,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "pdf-ops")]
#[command(author, version, about = "Merge, split, rotate, watermark, protect and unlock PDFs", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one request through the storage-backed pipeline
    Process(ProcessArgs),
    /// Apply an operation to local files, no storage involved
    Local(LocalArgs),
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Operation name (merge, split, rotate, watermark, protect, unlock, ...)
    #[arg(short, long, required_unless_present = "request")]
    operation: Option<String>,

    /// Source identifier in storage (repeat for merge)
    #[arg(short, long = "source")]
    sources: Vec<String>,

    /// Read the whole request from a JSON file instead
    #[arg(long, conflicts_with_all = ["operation", "sources"])]
    request: Option<PathBuf>,

    #[command(flatten)]
    options: OptionArgs,

    /// Storage base URL
    #[arg(long, env = "PDF_OPS_STORAGE_URL")]
    storage_url: Option<String>,

    /// Storage API key
    #[arg(long, env = "PDF_OPS_STORAGE_KEY", hide_env_values = true)]
    storage_key: Option<String>,

    /// Use a local directory as storage
    #[arg(long, conflicts_with = "storage_url")]
    storage_dir: Option<PathBuf>,

    /// Also print the stage trail and resource counters
    #[arg(long)]
    report: bool,
}

#[derive(Args, Debug)]
struct LocalArgs {
    /// Operation name
    operation: String,

    /// Input PDF files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    options: OptionArgs,
}

#[derive(Args, Debug)]
struct OptionArgs {
    /// Pages to keep for split, 0-indexed (e.g., "0,2,5")
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pages: Option<Vec<i64>>,

    /// Rotation angle in degrees, a multiple of 90
    #[arg(long, allow_negative_numbers = true)]
    angle: Option<i64>,

    /// Watermark text
    #[arg(long)]
    watermark_text: Option<String>,

    /// Password for protect / unlock
    #[arg(long, env = "PDF_OPS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Target format for convert-from (jpg, docx, pptx)
    #[arg(long)]
    format: Option<String>,
}

impl From<OptionArgs> for RequestOptions {
    fn from(args: OptionArgs) -> Self {
        Self {
            pages: args.pages,
            angle: args.angle,
            watermark_text: args.watermark_text,
            password: args.password,
            format: args.format,
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path).context("Failed to load config file"),
        None => Ok(AppConfig::load()),
    }
}

async fn run_process(args: ProcessArgs, mut config: AppConfig) -> Result<ExitCode> {
    if let Some(dir) = args.storage_dir {
        config.storage = StorageConfig {
            root_dir: Some(dir),
            backend: StorageBackend::Directory,
            ..config.storage
        };
    } else if let Some(url) = args.storage_url {
        config.storage.backend = StorageBackend::Http;
        config.storage.base_url = Some(url);
    }
    if args.storage_key.is_some() {
        config.storage.api_key = args.storage_key;
    }

    let request = match args.request {
        Some(path) => {
            let body = tokio::fs::read_to_string(&path)
                .await
                .context(format!("Failed to read request: {}", path.display()))?;
            OperationRequest::from_json(&body)?
        }
        None => OperationRequest::new(args.operation.unwrap_or_default(), args.sources)
            .with_options(args.options.into()),
    };

    let pipeline = create_pipeline(&config).context("Failed to initialize pipeline")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            on_interrupt.cancel();
        }
    });

    let report = pipeline.run(&request, &cancel).await;
    let output = if args.report {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string_pretty(&report.response)?
    };

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("{output}");
    }

    Ok(if report.response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_local(args: LocalArgs, config: &AppConfig) -> Result<ExitCode> {
    config.validate()?;
    let sources = args.inputs.iter().map(|p| p.display().to_string()).collect();
    let request = OperationRequest::new(args.operation, sources).with_options(args.options.into());
    let job = Operation::from_request(&request)?;

    let inputs = if job.operation.takes_all_sources() {
        &args.inputs[..]
    } else {
        &args.inputs[..1]
    };
    let mut buffers = Vec::with_capacity(inputs.len());
    for path in inputs {
        info!("Loading PDF: {}", path.display());
        buffers.push(
            tokio::fs::read(path)
                .await
                .context(format!("Failed to read input: {}", path.display()))?,
        );
    }

    let style = config.watermark;
    let operation = job.operation;
    let output = tokio::task::spawn_blocking(move || apply_to_bytes(&operation, &buffers, &style))
        .await
        .context("Worker failed")??;

    tokio::fs::write(&args.output, output)
        .await
        .context(format!("Failed to write output: {}", args.output.display()))?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("Saved to: {}", args.output.display());
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Process(args) => run_process(args, config).await,
        Command::Local(args) => run_local(args, &config).await,
    }
}
