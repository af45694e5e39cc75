use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trimbee_core::{
    download_ref, load_config, load_config_from_env, validate_config, BrowserNavigator, Config,
    DownloadManager, HttpTrimService, LocalVideo, ProcessingStatus, TargetDuration, TrimService,
    Workflow, WorkflowState,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Trim long videos down to their highlights with a remote AI service.
#[derive(Parser)]
#[command(name = "trimbee", version, about)]
struct Cli {
    /// Configuration file; defaults and TRIMBEE_* variables apply when omitted
    #[arg(long, env = "TRIMBEE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a video, process it and save the trimmed result
    Run {
        /// Video file to trim
        file: PathBuf,
        /// Target length in minutes (1-30)
        #[arg(long, default_value_t = TargetDuration::DEFAULT_MINUTES)]
        minutes: u32,
        /// Override the media type guessed from the file extension
        #[arg(long)]
        media_type: Option<String>,
        /// Directory to save the result in
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Show the remote status of a job
    Status {
        /// Server-assigned file id
        file_id: String,
    },
    /// Save the finished artifact of a job
    Download {
        /// Server-assigned file id
        file_id: String,
        /// Original file name, used to name the saved file
        #[arg(long)]
        name: Option<String>,
        /// Directory to save the result in
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = load(cli.config.as_ref())?;
    info!("Starting trimbee v{}", VERSION);
    info!("Service: {}", config.service.base_url);

    match cli.command {
        Commands::Run {
            file,
            minutes,
            media_type,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.download.output_dir = dir;
            }
            run_workflow(config, file, minutes, media_type).await
        }
        Commands::Status { file_id } => {
            let service = HttpTrimService::new(&config.service)
                .context("Failed to create HTTP client")?;
            let status = service
                .job_status(&file_id)
                .await
                .with_context(|| format!("Failed to query status of {}", file_id))?;
            println!("{}", status.summary());
            Ok(())
        }
        Commands::Download {
            file_id,
            name,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.download.output_dir = dir;
            }
            let service: Arc<dyn TrimService> = Arc::new(
                HttpTrimService::new(&config.service).context("Failed to create HTTP client")?,
            );
            let manager =
                DownloadManager::new(config.download, service, Arc::new(BrowserNavigator));
            let path = manager
                .fetch_and_save(&download_ref(&file_id), name.as_deref())
                .await
                .context("Download failed")?;
            println!("Saved {}", path.display());
            Ok(())
        }
    }
}

fn load(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => load_config_from_env().context("Failed to load config from environment")?,
    };
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

async fn run_workflow(
    config: Config,
    file: PathBuf,
    minutes: u32,
    media_type: Option<String>,
) -> Result<()> {
    let target = TargetDuration::from_minutes(minutes)?;
    let mut video = LocalVideo::from_path(&file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;
    if let Some(media_type) = media_type {
        video = video.with_media_type(media_type);
    }

    let service: Arc<dyn TrimService> =
        Arc::new(HttpTrimService::new(&config.service).context("Failed to create HTTP client")?);
    let workflow = Workflow::new(config, service, Arc::new(BrowserNavigator));
    let printer = tokio::spawn(print_updates(workflow.subscribe(), std::io::stdout()));

    let result = process(&workflow, &video, target).await;

    // The printer stops once the last sender is gone, after the final line.
    drop(workflow);
    if let Err(e) = printer.await {
        warn!("Status printer failed: {}", e);
    }

    let path = result?;
    println!("Saved {}", path.display());
    Ok(())
}

async fn process(workflow: &Workflow, video: &LocalVideo, target: TargetDuration) -> Result<PathBuf> {
    let record = workflow.submit(video).await?;
    info!(file_id = %record.id, "Uploaded {}", record.display_name);

    let handle = workflow.start(target).await?;
    let shutdown = handle.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling processing");
            shutdown.cancel();
        }
    });

    let status = handle.wait().await;
    if status.state != WorkflowState::Completed {
        bail!("{}", status.message);
    }
    workflow.download().await.context("Download failed")
}

/// Write one line per record change until the channel closes.
async fn print_updates<W: Write>(mut rx: watch::Receiver<ProcessingStatus>, mut out: W) -> W {
    while rx.changed().await.is_ok() {
        let status = rx.borrow_and_update().clone();
        if let Err(e) = writeln!(out, "[{:>3}%] {}", status.progress_percent, status.message) {
            warn!("Failed to print status: {}", e);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: WorkflowState, progress_percent: u8, message: &str) -> ProcessingStatus {
        ProcessingStatus {
            file_id: "abc".to_string(),
            state,
            progress_percent,
            message: message.to_string(),
            output_ref: None,
            stats: None,
        }
    }

    #[tokio::test]
    async fn test_printer_keeps_final_line() {
        let (tx, rx) = watch::channel(status(WorkflowState::Idle, 0, "Waiting"));
        let printer = tokio::spawn(print_updates(rx, Vec::new()));

        tx.send_replace(status(WorkflowState::Processing, 40, "Trimming"));
        tx.send_replace(status(WorkflowState::Failed, 40, "Processing failed: boom"));
        drop(tx);

        let out = String::from_utf8(printer.await.unwrap()).unwrap();
        assert_eq!(out.lines().last(), Some("[ 40%] Processing failed: boom"));
    }
}
