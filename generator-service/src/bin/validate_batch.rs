use anyhow::{bail, Context, Result};
use generator_service::{observability, transform::validate_inverter_record};
use inverter_model::domain::InverterRecord;
use std::{env, fs};

fn main() -> Result<()> {
    observability::init_tracing(&observability::directive_for_binary("validate_batch"));

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: validate_batch <batch_file.json>");
    }
    let path = &args[1];

    let bytes = fs::read(path).with_context(|| format!("failed to read {path}"))?;
    let records: Vec<InverterRecord> =
        serde_json::from_slice(&bytes).with_context(|| format!("{path} is not an inverter batch"))?;

    let mut invalid = 0usize;
    for record in &records {
        let violations = validate_inverter_record(record);
        if !violations.is_empty() {
            invalid += 1;
            println!("{}: {}", record.id, violations.join("; "));
        }
    }

    tracing::info!(file = %path, records = records.len(), invalid, "batch checked");
    if invalid > 0 {
        bail!("{invalid} of {} records failed validation", records.len());
    }

    Ok(())
}
