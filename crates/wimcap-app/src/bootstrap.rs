use std::future;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wimcap_config::apply_process_env;
use wimcap_core::UpstreamArtifact;
use wimcap_fsops::service_for_backend;
use wimcap_telemetry::{GlobalContextGuard, LoggingConfig, init_logging};
use wimcap_wimlib::{ArchiveWriter, default_engine};

use crate::artifact::{Artifact, remove_tree};
use crate::cli::{CaptureArgs, CleanupArgs, Cli, Command};
use crate::error::{AppError, AppResult};
use crate::pipeline::CapturePipeline;
use crate::progress::ConsoleSink;

/// Parse the process arguments and run the selected command.
///
/// # Errors
///
/// Returns an error if logging cannot be installed or the command fails.
pub async fn run_cli() -> AppResult<()> {
    run(Cli::parse()).await
}

/// Run an already parsed command line.
///
/// # Errors
///
/// Returns an error if logging cannot be installed or the command fails.
pub async fn run(cli: Cli) -> AppResult<()> {
    let mut logging = LoggingConfig::default();
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    init_logging(&logging).map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new(cli.command.label());

    match cli.command {
        Command::Capture(args) => capture(args).await,
        Command::Cleanup(args) => cleanup(&args),
    }
}

async fn capture(args: CaptureArgs) -> AppResult<()> {
    let profile = args.resolve_profile(apply_process_env)?;
    let upstream = UpstreamArtifact::new(args.builder_id.clone(), args.files.clone());

    let writer = ArchiveWriter::new(default_engine());
    info!(
        engine = writer.engine_name(),
        mount_backend = %profile.mount_backend,
        output_dir = %profile.output_dir.display(),
        "starting capture"
    );
    let pipeline = CapturePipeline::new(service_for_backend(profile.mount_backend), writer)
        .with_progress(Arc::new(ConsoleSink));

    let cancel = CancellationToken::new();
    let watcher = spawn_cancel_watcher(cancel.clone(), args.timeout_secs.map(Duration::from_secs));
    let result = pipeline
        .run(&upstream, &profile.output_dir, &profile, &cancel)
        .await;
    watcher.abort();

    let artifact = result.map_err(|source| AppError::Capture { source })?;
    println!("{artifact}");
    if let Some(path) = &args.manifest {
        artifact.write_manifest(path)?;
    }
    Ok(())
}

fn cleanup(args: &CleanupArgs) -> AppResult<()> {
    if let Some(manifest) = &args.manifest {
        return Artifact::read_manifest(manifest)?.destroy();
    }
    args.output_dir.as_deref().map_or(Ok(()), remove_tree)
}

/// Cancel `cancel` on Ctrl-C or once `timeout` elapses.
fn spawn_cancel_watcher(cancel: CancellationToken, timeout: Option<Duration>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interrupted = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "interrupt handler unavailable");
                future::pending::<()>().await;
            }
        };
        let deadline = async {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => future::pending::<()>().await,
            }
        };
        tokio::select! {
            () = interrupted => warn!("interrupt received; cancelling capture"),
            () = deadline => warn!(
                timeout_secs = timeout.map_or(0, |limit| limit.as_secs()),
                "capture timed out; cancelling"
            ),
        }
        cancel.cancel();
    })
}
