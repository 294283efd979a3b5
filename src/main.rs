use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use folder_publisher::{
    config::Config,
    ledger::{LedgerAdmin, LedgerHandle},
    pipeline::{UploadOutcome, UploadPipeline},
    publisher::build_publisher,
    scanner::FolderScanner,
    scheduler::Scheduler,
    services::FolderConfigService,
    utils::RateLimiter,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "folder-publisher")]
#[command(version)]
#[command(about = "Publishes prepared media folders on a per-folder schedule")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until interrupted
    Run,
    /// Manage watched folders
    #[command(subcommand)]
    Folder(FolderCommand),
    /// Publish one item directory right away
    Upload {
        /// Folder configuration the item belongs to
        #[arg(long)]
        folder: Uuid,
        item_dir: PathBuf,
    },
    /// List recorded failures
    Failures {
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },
}

#[derive(Subcommand)]
enum FolderCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        cron: String,
    },
    List,
    Enable { id: Uuid },
    Disable { id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    let config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    match cli.command {
        Command::Run => run(config).await,
        Command::Folder(command) => folder(config, command).await,
        Command::Upload { folder, item_dir } => upload(config, folder, item_dir).await,
        Command::Failures { limit } => failures(config, limit).await,
    }
}

fn init_logging(level: &str, format: LogFormat) {
    let log_filter = if level == "trace" {
        format!("folder_publisher={level},tower_http=trace")
    } else {
        format!("folder_publisher={level}")
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

fn build_pipeline(config: &Config, ledger: &LedgerHandle) -> Result<Arc<UploadPipeline>> {
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit.max_requests,
        config.rate_limit.window,
    ));
    info!(
        "Rate limit: {} publishing call(s) per {:?}",
        rate_limiter.max_requests(),
        rate_limiter.window()
    );
    let publisher = build_publisher(&config.publisher)?;
    info!("Using {} publisher", publisher.name());

    Ok(Arc::new(UploadPipeline::new(
        ledger.ledger(),
        publisher,
        rate_limiter,
        FolderScanner::new(&config.scanner),
        &config.pipeline,
    )))
}

async fn run(config: Config) -> Result<()> {
    info!("Starting folder publisher v{}", env!("CARGO_PKG_VERSION"));

    let ledger = LedgerHandle::open(&config.database).await?;
    let pipeline = build_pipeline(&config, &ledger)?;
    let scheduler = Arc::new(Scheduler::new(
        ledger.folder_provider(),
        FolderScanner::new(&config.scanner),
        pipeline,
        &config.scheduler,
    ));

    scheduler.initialize().await?;
    let reporter = scheduler.spawn_status_reporter();

    let web = if config.web.enabled {
        let server = WebServer::new(
            &config.web,
            AppState {
                scheduler: Arc::clone(&scheduler),
            },
        )?;
        info!("Starting status server on {}:{}", server.host(), server.port());
        let token = scheduler.shutdown_token();
        Some(tokio::spawn(async move {
            if let Err(e) = server.serve(token).await {
                error!("Status server failed: {}", e);
            }
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    scheduler.shutdown().await;
    if let Err(e) = reporter.await {
        error!("Status reporter ended abnormally: {}", e);
    }
    if let Some(web) = web
        && let Err(e) = web.await
    {
        error!("Status server ended abnormally: {}", e);
    }

    info!("Folder publisher stopped");
    Ok(())
}

async fn folder(config: Config, command: FolderCommand) -> Result<()> {
    let ledger = LedgerHandle::open(&config.database).await?;
    let service = FolderConfigService::new(ledger.admin());

    match command {
        FolderCommand::Add { name, path, cron } => {
            let folder = service.validate_and_create(&name, &path, &cron).await?;
            println!("{}  {}  {}  {}", folder.id, folder.name, folder.path, folder.cron_expression);
        }
        FolderCommand::List => {
            for folder in service.list().await? {
                println!(
                    "{}  {:<20}  {:<8}  {:<16}  {}",
                    folder.id,
                    folder.name,
                    if folder.is_active { "active" } else { "inactive" },
                    folder.cron_expression,
                    folder.path
                );
            }
        }
        FolderCommand::Enable { id } => {
            service.set_active(id, true).await?;
        }
        FolderCommand::Disable { id } => {
            service.set_active(id, false).await?;
        }
    }
    Ok(())
}

async fn upload(config: Config, folder_id: Uuid, item_dir: PathBuf) -> Result<()> {
    let ledger = LedgerHandle::open(&config.database).await?;
    let folder = FolderConfigService::new(ledger.admin()).get(folder_id).await?;
    let item_dir = tokio::fs::canonicalize(&item_dir)
        .await
        .with_context(|| format!("Item directory {} is not accessible", item_dir.display()))?;

    let pipeline = build_pipeline(&config, &ledger)?;
    match pipeline.process_dir(&folder, &item_dir).await? {
        UploadOutcome::Completed { record, archived } => {
            println!(
                "Published {} as {}{}",
                record.item_name,
                record.external_id.unwrap_or_default(),
                if archived { "" } else { " (not archived)" }
            );
        }
        UploadOutcome::AlreadyPublished { record, .. } => {
            println!(
                "{} was already published as {}",
                record.item_name,
                record.external_id.unwrap_or_default()
            );
        }
        UploadOutcome::Failed { kind, message, attempts, .. } => {
            bail!("Upload failed ({kind}) after {attempts} attempt(s): {message}");
        }
        UploadOutcome::QuotaSuspended { resume_at, message } => {
            bail!("Publishing quota exceeded, retry after {resume_at}: {message}");
        }
    }
    Ok(())
}

async fn failures(config: Config, limit: u64) -> Result<()> {
    let ledger = LedgerHandle::open(&config.database).await?;
    for failure in ledger.admin().list_failures(limit).await? {
        println!(
            "{}  {}  retries={}  {}",
            failure.created_at.format("%Y-%m-%d %H:%M:%S"),
            failure.item_path,
            failure.retry_count,
            failure.error_message
        );
    }
    Ok(())
}
