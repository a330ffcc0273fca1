//! Audio edit worker binary.
//!
//! Usage: `aedit-worker <request.json> <input> <output>`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aedit_models::EditRequest;
use aedit_worker::{metrics, EditPipeline, TempFileSweeper, TracingReporter, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    match run().await {
        Ok(()) => {}
        Err(e) => {
            error!("aedit-worker failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "aedit=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    // Logs go to stderr; stdout carries the report.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [request_path, input, output] = args.as_slice() else {
        bail!("usage: aedit-worker <request.json> <input> <output>");
    };

    info!("Starting aedit-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    metrics::init_metrics(config.metrics_addr)?;

    let body = tokio::fs::read_to_string(request_path)
        .await
        .with_context(|| format!("reading request {}", request_path))?;
    let request = EditRequest::from_json(&body)?;

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("creating work dir {}", config.work_dir.display()))?;

    let pipeline = EditPipeline::new(config.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = TempFileSweeper::from_config(&config).with_registry(pipeline.registry().clone());
    let sweeper_task = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    let mut handle = pipeline
        .submit(request, PathBuf::from(input), PathBuf::from(output))
        .await;
    let job_id = handle.job_id.clone();
    let forwarder = handle
        .events()
        .map(|events| events.forward_to(Arc::new(TracingReporter)));

    // Cancel on Ctrl-C; the job reports Cancelled once FFmpeg is gone.
    let cancel_pipeline = pipeline.clone();
    let cancel_job = job_id.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(job_id = %cancel_job, "Received shutdown signal, cancelling job");
            if let Err(e) = cancel_pipeline.cancel(&cancel_job).await {
                warn!(job_id = %cancel_job, "Cancel rejected: {}", e);
            }
        }
    });

    let result = handle.wait().await;

    if let Some(forwarder) = forwarder {
        forwarder.await.ok();
    }
    signal_task.abort();
    shutdown_tx.send(true).ok();
    sweeper_task.await.ok();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(job_id = %job_id, kind = e.kind(), "{}", e.user_message());
            return Err(e.into());
        }
    };

    if !outcome.report.passed() {
        warn!(
            job_id = %job_id,
            delta = outcome.report.duration_delta_seconds,
            tolerance = outcome.report.tolerance_seconds,
            "Output produced but failed duration verification"
        );
    }

    println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    info!("Worker shutdown complete");
    Ok(())
}
