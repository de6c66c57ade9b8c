use std::{path::PathBuf, sync::Arc};

use inverter_model::domain::InverterRecord;

use crate::{
    pipeline::{Pipeline, PipelineError, Transform},
    sinks::{BatchFileSink, BatchReport},
    sources::SimulatedInverterSource,
    timestamp,
    transform::InverterValidation,
};

type RecordTransform = Arc<dyn Transform<InverterRecord, InverterRecord> + Send + Sync>;

/// Generates, validates and stages one run of inverter batch files.
pub struct BatchProducer {
    staging_dir: PathBuf,
    failure_rate: f64,
    keep_rejected: bool,
    seed: Option<u64>,
    transforms: Vec<RecordTransform>,
}

impl BatchProducer {
    pub fn new<P: Into<PathBuf>>(staging_dir: P, failure_rate: f64) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            failure_rate,
            keep_rejected: false,
            seed: None,
            transforms: vec![Arc::new(InverterValidation)],
        }
    }

    pub fn keep_rejected(mut self, keep: bool) -> Self {
        self.keep_rejected = keep;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replace the validation chain. An empty chain accepts every record.
    pub fn with_transforms(mut self, transforms: Vec<RecordTransform>) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn staging_dir(&self) -> &PathBuf {
        &self.staging_dir
    }

    /// Generate `count` records and write the accepted ones into `file_count`
    /// batch files in the staging directory.
    pub async fn produce(
        &self,
        count: usize,
        file_count: usize,
    ) -> Result<BatchReport, PipelineError> {
        tokio::fs::create_dir_all(&self.staging_dir).await.map_err(|e| {
            PipelineError::Sink(format!(
                "failed to create staging dir {}: {e}",
                self.staging_dir.display()
            ))
        })?;

        let mut source = SimulatedInverterSource::new(count, self.failure_rate);
        if let Some(seed) = self.seed {
            source = source.with_seed(seed);
        }

        let stamp = timestamp::run_stamp(timestamp::now());
        let sink = BatchFileSink::new(&self.staging_dir, file_count, stamp)
            .keep_rejected(self.keep_rejected);

        let pipeline: Pipeline<_, InverterRecord, _> = Pipeline {
            source,
            transforms: self.transforms.clone(),
            sink,
        };

        let report = pipeline.run().await?;
        tracing::info!(
            valid = report.valid,
            rejected = report.rejected,
            files = report.files.len(),
            "generated valid records"
        );
        Ok(report)
    }
}
