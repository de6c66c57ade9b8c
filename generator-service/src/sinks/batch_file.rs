use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use futures::StreamExt;
use inverter_model::domain::InverterRecord;
use serde::Serialize;

use crate::pipeline::{join_violations, Envelope, PipelineError, Sink};

/// Name prefix of every accepted-record batch file.
pub const BATCH_FILE_PREFIX: &str = "inverter-data";
/// Name prefix of the optional rejected-record diagnostic file.
pub const REJECTED_FILE_PREFIX: &str = "invalid-inverter-data";

pub fn batch_file_name(index: usize, timestamp: &str) -> String {
    format!("{BATCH_FILE_PREFIX}-{index}_{timestamp}.json")
}

pub fn rejected_file_name(timestamp: &str) -> String {
    format!("{REJECTED_FILE_PREFIX}_{timestamp}.json")
}

/// Split `len` records across `file_count` files.
///
/// Every file gets `max(1, len / file_count)` records; the last file also takes
/// whatever does not divide evenly. Ranges past the end of the data come back
/// empty.
pub fn partition_ranges(len: usize, file_count: usize) -> Vec<Range<usize>> {
    let file_count = file_count.max(1);
    let batch_size = (len / file_count).max(1);

    (0..file_count)
        .map(|i| {
            let start = (i * batch_size).min(len);
            let end = if i + 1 == file_count {
                len
            } else {
                (start + batch_size).min(len)
            };
            start..end
        })
        .collect()
}

#[derive(Serialize)]
struct RejectedRecord<'a> {
    #[serde(flatten)]
    record: &'a InverterRecord,
    invalid_description: String,
}

/// What a `BatchFileSink` run produced.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub valid: usize,
    pub rejected: usize,
    pub files: Vec<PathBuf>,
    pub rejected_file: Option<PathBuf>,
}

/// Collects accepted records and writes them as `file_count` JSON array files
/// into the staging directory once the input stream ends.
pub struct BatchFileSink {
    dir: PathBuf,
    file_count: usize,
    timestamp: String,
    keep_rejected: bool,
}

impl BatchFileSink {
    pub fn new<P: Into<PathBuf>>(dir: P, file_count: usize, timestamp: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_count,
            timestamp: timestamp.into(),
            keep_rejected: false,
        }
    }

    /// Also write rejected records, with their violations, to a diagnostic file.
    pub fn keep_rejected(mut self, keep: bool) -> Self {
        self.keep_rejected = keep;
        self
    }

    async fn write_json<T: Serialize + ?Sized>(
        path: &Path,
        value: &T,
    ) -> Result<(), PipelineError> {
        let mut buf = Vec::new();
        {
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
            value.serialize(&mut ser).map_err(|e| {
                PipelineError::Sink(format!("failed to encode {}: {e}", path.display()))
            })?;
        }

        tokio::fs::write(path, buf)
            .await
            .map_err(|e| PipelineError::Sink(format!("failed to write {}: {e}", path.display())))
    }
}

#[async_trait::async_trait]
impl Sink<InverterRecord> for BatchFileSink {
    type Output = BatchReport;

    async fn run<S>(&self, mut input: S) -> Result<BatchReport, PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<InverterRecord>, PipelineError>>
            + Send
            + Unpin
            + 'static,
    {
        let mut valid: Vec<InverterRecord> = Vec::new();
        let mut rejected: Vec<(InverterRecord, Vec<String>)> = Vec::new();
        let mut rejected_count = 0;

        while let Some(item) = input.next().await {
            match item {
                Ok(env) => valid.push(env.payload),
                Err(PipelineError::Rejected { id, record, violations }) => {
                    rejected_count += 1;
                    tracing::debug!(
                        inverter = %id,
                        reasons = %join_violations(&violations),
                        "record dropped"
                    );
                    if self.keep_rejected {
                        rejected.push((*record, violations));
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "error in upstream pipeline for BatchFileSink");
                }
            }
        }

        let mut report = BatchReport {
            valid: valid.len(),
            rejected: rejected_count,
            ..Default::default()
        };

        for (i, range) in partition_ranges(valid.len(), self.file_count).into_iter().enumerate() {
            if range.is_empty() {
                continue;
            }
            let path = self.dir.join(batch_file_name(i + 1, &self.timestamp));
            let batch = &valid[range];
            Self::write_json(&path, batch).await?;
            metrics::counter!("batch_files_written_total").increment(1);
            tracing::info!(file = %path.display(), records = batch.len(), "batch file written");
            report.files.push(path);
        }

        if !rejected.is_empty() {
            let rows: Vec<RejectedRecord<'_>> = rejected
                .iter()
                .map(|(record, violations)| RejectedRecord {
                    record,
                    invalid_description: join_violations(violations),
                })
                .collect();
            let path = self.dir.join(rejected_file_name(&self.timestamp));
            Self::write_json(&path, &rows).await?;
            tracing::info!(
                file = %path.display(),
                records = rows.len(),
                "rejected records written"
            );
            report.rejected_file = Some(path);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split_gives_equal_files() {
        assert_eq!(partition_ranges(60, 4), vec![0..15, 15..30, 30..45, 45..60]);
    }

    #[test]
    fn remainder_goes_to_last_file() {
        let ranges = partition_ranges(62, 4);
        assert_eq!(ranges, vec![0..15, 15..30, 30..45, 45..62]);
        assert_eq!(ranges.iter().map(|r| r.len()).sum::<usize>(), 62);
    }

    #[test]
    fn fewer_records_than_files_leaves_trailing_files_empty() {
        assert_eq!(partition_ranges(2, 4), vec![0..1, 1..2, 2..2, 2..2]);
    }

    #[test]
    fn no_records_means_no_ranges_with_data() {
        assert!(partition_ranges(0, 4).iter().all(|r| r.is_empty()));
    }

    #[test]
    fn file_names_follow_pattern() {
        assert_eq!(
            batch_file_name(1, "2024-05-01-10-00-00"),
            "inverter-data-1_2024-05-01-10-00-00.json"
        );
        assert!(!rejected_file_name("x").starts_with(BATCH_FILE_PREFIX));
    }
}
