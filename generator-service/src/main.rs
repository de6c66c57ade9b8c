use anyhow::Result;
use generator_service::{
    config::AppConfig,
    cycle::{CycleController, CycleSettings},
    metrics_server, observability,
    producer::BatchProducer,
    upload::{S3BlobStore, Uploader},
};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing(observability::DEFAULT_DIRECTIVE);

    // Missing or malformed configuration stops the process before any cycle runs.
    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let store = Arc::new(S3BlobStore::new(&cfg.s3));
    let uploader = Uploader::new(store, cfg.s3.key_prefix.clone());
    let rejected_uploader = cfg
        .diagnostics
        .rejected_key_prefix
        .as_ref()
        .filter(|_| cfg.diagnostics.write_rejected)
        .map(|prefix| uploader.with_prefix(prefix.clone()));

    let producer = BatchProducer::new(&cfg.cycle.staging_dir, cfg.generator.sensor_failure_rate)
        .keep_rejected(cfg.diagnostics.write_rejected);

    let controller = CycleController::new(
        producer,
        uploader,
        CycleSettings {
            inverters_num: cfg.generator.inverters_num,
            num_files: cfg.generator.num_files,
            interval: cfg.cycle.interval(),
            drain_poll: cfg.cycle.drain_poll(),
        },
    )
    .with_rejected_uploader(rejected_uploader);

    tracing::info!(
        bucket = %cfg.s3.bucket,
        region = %cfg.s3.region,
        staging_dir = %cfg.cycle.staging_dir.display(),
        "inverter generator started, press Ctrl+C to exit"
    );

    controller.run(shutdown_signal()).await;

    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = signal::ctrl_c() => {},
        _ = terminate() => {},
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
