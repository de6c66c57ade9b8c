use anyhow::{bail, Context, Result};
use generator_service::{
    observability, producer::BatchProducer,
    sources::simulated_inverter::DEFAULT_SENSOR_FAILURE_RATE,
};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing(&observability::directive_for_binary("generate_batch"));

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: generate_batch <out_dir> [inverters=60] [files=4]");
    }
    let out_dir = &args[1];
    let count: usize = match args.get(2) {
        Some(v) => v.parse().with_context(|| format!("invalid inverter count {v:?}"))?,
        None => 60,
    };
    let files: usize = match args.get(3) {
        Some(v) => v.parse().with_context(|| format!("invalid file count {v:?}"))?,
        None => 4,
    };
    if files == 0 {
        bail!("file count must be at least 1");
    }

    // Local run only: batches and rejected records stay in `out_dir`.
    let report = BatchProducer::new(out_dir, DEFAULT_SENSOR_FAILURE_RATE)
        .keep_rejected(true)
        .produce(count, files)
        .await?;

    for path in &report.files {
        println!("{}", path.display());
    }
    if let Some(path) = &report.rejected_file {
        println!("{}", path.display());
    }

    Ok(())
}
